//! Upload input sources.
//!
//! The request-parsing layer that receives uploads lives outside this crate. It is modelled by
//! [`UploadInputSource`], which maps a form field name to an [`UploadDescriptor`] and answers
//! whether a temp path was genuinely written by the upload mechanism.
//!
//! [`StagedUploads`] is the in-process implementation used by the CLI and by tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Raw, untrusted description of one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    /// Where the uploaded bytes currently live
    pub temp_path: PathBuf,

    /// Original filename as sent by the client
    pub declared_name: String,

    /// Size in bytes as sent by the client
    pub declared_size_bytes: u64,
}

impl UploadDescriptor {
    pub fn new(
        temp_path: impl Into<PathBuf>,
        declared_name: impl Into<String>,
        declared_size_bytes: u64,
    ) -> Self {
        Self {
            temp_path: temp_path.into(),
            declared_name: declared_name.into(),
            declared_size_bytes,
        }
    }
}

/// Source of uploaded files for the current request.
pub trait UploadInputSource {
    /// Returns the descriptor submitted under `field_name`, if any.
    fn descriptor(&self, field_name: &str) -> Option<UploadDescriptor>;

    /// Returns true if `temp_path` was produced by the upload mechanism for this request.
    ///
    /// This is the anti-spoofing check: a descriptor whose temp path points at an arbitrary
    /// file on disk must be rejected here.
    fn is_genuine_upload(&self, temp_path: &Path) -> bool;
}

/// In-memory upload source backed by files already staged on disk.
///
/// A temp path is genuine when it is an existing regular file and, if a staging directory is
/// configured, it resolves to a location inside that directory.
#[derive(Debug, Clone, Default)]
pub struct StagedUploads {
    staging_dir: Option<PathBuf>,
    uploads: HashMap<String, UploadDescriptor>,
}

impl StagedUploads {
    /// Creates a source that accepts any existing regular file as genuine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source that only accepts files inside `staging_dir`.
    pub fn with_staging_dir(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: Some(staging_dir.into()),
            uploads: HashMap::new(),
        }
    }

    /// Registers `descriptor` under `field_name`, replacing any previous entry.
    pub fn insert(&mut self, field_name: impl Into<String>, descriptor: UploadDescriptor) {
        self.uploads.insert(field_name.into(), descriptor);
    }

    /// Stages the file at `path` under `field_name`, using its on-disk name and size as the
    /// declared values.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file metadata cannot be read.
    pub fn stage_file(
        &mut self,
        field_name: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> std::io::Result<()> {
        let path = path.into();
        let size = std::fs::metadata(&path)?.len();
        let declared_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.insert(field_name, UploadDescriptor::new(path, declared_name, size));
        Ok(())
    }

    pub fn staging_dir(&self) -> Option<&Path> {
        self.staging_dir.as_deref()
    }
}

impl UploadInputSource for StagedUploads {
    fn descriptor(&self, field_name: &str) -> Option<UploadDescriptor> {
        self.uploads.get(field_name).cloned()
    }

    fn is_genuine_upload(&self, temp_path: &Path) -> bool {
        if !temp_path.is_file() {
            return false;
        }

        let Some(staging_dir) = &self.staging_dir else {
            return true;
        };

        match (temp_path.canonicalize(), staging_dir.canonicalize()) {
            (Ok(file), Ok(dir)) => file.starts_with(dir),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_descriptor_lookup() {
        let mut source = StagedUploads::new();
        source.insert("avatar", UploadDescriptor::new("/tmp/php1", "pic.png", 10));

        let found = source.descriptor("avatar").unwrap();
        assert_eq!(found.declared_name, "pic.png");
        assert_eq!(found.declared_size_bytes, 10);
        assert!(source.descriptor("resume").is_none());
    }

    #[test]
    fn test_insert_replaces_field() {
        let mut source = StagedUploads::new();
        source.insert("avatar", UploadDescriptor::new("/tmp/php1", "a.png", 1));
        source.insert("avatar", UploadDescriptor::new("/tmp/php2", "b.png", 2));

        assert_eq!(source.descriptor("avatar").unwrap().declared_name, "b.png");
    }

    #[test]
    fn test_stage_file_uses_disk_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("report.PDF");
        fs::write(&path, b"%PDF-1.4 body").unwrap();

        let mut source = StagedUploads::new();
        source.stage_file("doc", &path).unwrap();

        let descriptor = source.descriptor("doc").unwrap();
        assert_eq!(descriptor.declared_name, "report.PDF");
        assert_eq!(descriptor.declared_size_bytes, 13);
        assert_eq!(descriptor.temp_path, path);
    }

    #[test]
    fn test_stage_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        let mut source = StagedUploads::new();

        assert!(source.stage_file("doc", temp.path().join("nope")).is_err());
        assert!(source.descriptor("doc").is_none());
    }

    #[test]
    fn test_genuine_without_staging_dir() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("upload.tmp");
        fs::write(&path, b"data").unwrap();

        let source = StagedUploads::new();
        assert!(source.is_genuine_upload(&path));
        assert!(!source.is_genuine_upload(&temp.path().join("missing.tmp")));
        assert!(!source.is_genuine_upload(temp.path()));
    }

    #[test]
    fn test_genuine_requires_staging_dir_membership() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("staging");
        fs::create_dir_all(&staging).unwrap();

        let inside = staging.join("php123");
        fs::write(&inside, b"data").unwrap();
        let outside = temp.path().join("passwd");
        fs::write(&outside, b"root:x:0:0").unwrap();

        let source = StagedUploads::with_staging_dir(&staging);
        assert!(source.is_genuine_upload(&inside));
        assert!(!source.is_genuine_upload(&outside));
    }

    #[test]
    fn test_traversal_out_of_staging_dir_is_rejected() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("staging");
        fs::create_dir_all(&staging).unwrap();
        fs::write(temp.path().join("secret"), b"s3cr3t").unwrap();

        let source = StagedUploads::with_staging_dir(&staging);
        assert!(!source.is_genuine_upload(&staging.join("../secret")));
    }
}
