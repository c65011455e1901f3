//! Upload runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into validators. Nothing
//! in this crate reads environment variables; binaries read them and hand the raw values to
//! the `*_from_env_value` helpers below.

use crate::policy::ContentCategory;
use crate::size::parse_max_size;
use crate::source::StagedUploads;
use crate::validator::UploadOptions;
use crate::ConfigError;
use std::path::{Path, PathBuf};

/// Upload configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    destination_dir: PathBuf,
    max_size: Option<String>,
    allowed_mimes: Vec<String>,
    categories: Vec<ContentCategory>,
    staging_dir: Option<PathBuf>,
    abort_on_path_error: bool,
}

impl UploadConfig {
    /// Create a new `UploadConfig` targeting `destination_dir` with no policy configured.
    pub fn new(destination_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let destination_dir = destination_dir.into();
        if destination_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidInput(
                "destination directory cannot be empty".into(),
            ));
        }

        Ok(Self {
            destination_dir,
            max_size: None,
            allowed_mimes: Vec::new(),
            categories: Vec::new(),
            staging_dir: None,
            abort_on_path_error: false,
        })
    }

    /// Sets the maximum size, rejecting malformed values up front.
    ///
    /// An empty or whitespace-only value clears the setting.
    pub fn with_max_size(mut self, max_size: Option<String>) -> Result<Self, ConfigError> {
        let max_size = max_size
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        if let Some(size) = &max_size {
            parse_max_size(size)?;
        }

        self.max_size = max_size;
        Ok(self)
    }

    pub fn with_allowed_mimes(mut self, allowed_mimes: Vec<String>) -> Self {
        self.allowed_mimes = allowed_mimes;
        self
    }

    pub fn with_categories(mut self, categories: Vec<ContentCategory>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_staging_dir(mut self, staging_dir: Option<PathBuf>) -> Self {
        self.staging_dir = staging_dir;
        self
    }

    pub fn with_abort_on_path_error(mut self, abort_on_path_error: bool) -> Self {
        self.abort_on_path_error = abort_on_path_error;
        self
    }

    pub fn destination_dir(&self) -> &Path {
        &self.destination_dir
    }

    pub fn max_size(&self) -> Option<&str> {
        self.max_size.as_deref()
    }

    pub fn allowed_mimes(&self) -> &[String] {
        &self.allowed_mimes
    }

    pub fn categories(&self) -> &[ContentCategory] {
        &self.categories
    }

    pub fn staging_dir(&self) -> Option<&Path> {
        self.staging_dir.as_deref()
    }

    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            abort_on_path_error: self.abort_on_path_error,
        }
    }

    /// Creates an empty upload source honouring the configured staging directory.
    pub fn staged_uploads(&self) -> StagedUploads {
        match &self.staging_dir {
            Some(dir) => StagedUploads::with_staging_dir(dir),
            None => StagedUploads::new(),
        }
    }
}

/// Parse a comma-separated list from an optional string value.
///
/// Entries are trimmed and empty entries dropped; `None` yields an empty list.
pub fn list_from_env_value(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a comma-separated list of content-type categories.
pub fn categories_from_env_value(
    value: Option<String>,
) -> Result<Vec<ContentCategory>, ConfigError> {
    list_from_env_value(value)
        .iter()
        .map(|name| name.parse())
        .collect()
}

/// Parse a boolean flag. Missing or empty values are `false`.
pub fn bool_from_env_value(value: Option<String>) -> Result<bool, ConfigError> {
    let value = value
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty());

    match value.as_deref() {
        None | Some("0" | "false" | "no" | "off") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some(other) => Err(ConfigError::InvalidInput(format!(
            "expected a boolean, got {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::UploadDescriptor;
    use crate::validator::UploadValidator;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_new_rejects_empty_destination() {
        assert!(matches!(
            UploadConfig::new(""),
            Err(ConfigError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_with_max_size_validates_eagerly() {
        let config = UploadConfig::new("uploads").unwrap();
        let result = config.with_max_size(Some("ten megs".into()));

        assert!(matches!(result, Err(ConfigError::InvalidMaxSize(_))));
    }

    #[test]
    fn test_with_max_size_blank_clears() {
        let config = UploadConfig::new("uploads")
            .unwrap()
            .with_max_size(Some("5K".into()))
            .unwrap()
            .with_max_size(Some("   ".into()))
            .unwrap();

        assert_eq!(config.max_size(), None);
    }

    #[test]
    fn test_list_from_env_value() {
        assert!(list_from_env_value(None).is_empty());
        assert_eq!(
            list_from_env_value(Some(" image/png, ,application/pdf ,".into())),
            vec!["image/png".to_string(), "application/pdf".to_string()]
        );
    }

    #[test]
    fn test_categories_from_env_value() {
        assert_eq!(
            categories_from_env_value(Some("image, audio".into())).unwrap(),
            vec![ContentCategory::Image, ContentCategory::Audio]
        );
        assert!(categories_from_env_value(None).unwrap().is_empty());
        assert!(matches!(
            categories_from_env_value(Some("image,pictures".into())),
            Err(ConfigError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_bool_from_env_value() {
        assert!(!bool_from_env_value(None).unwrap());
        assert!(!bool_from_env_value(Some(" ".into())).unwrap());
        assert!(bool_from_env_value(Some("TRUE".into())).unwrap());
        assert!(bool_from_env_value(Some("1".into())).unwrap());
        assert!(!bool_from_env_value(Some("off".into())).unwrap());
        assert!(bool_from_env_value(Some("maybe".into())).is_err());
    }

    #[test]
    fn test_upload_options_follow_config() {
        let config = UploadConfig::new("uploads")
            .unwrap()
            .with_abort_on_path_error(true);

        assert!(config.upload_options().abort_on_path_error);
    }

    #[test]
    fn test_validator_from_config() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("staging");
        fs::create_dir_all(&staging).unwrap();
        let temp_path = staging.join("php1");
        fs::write(&temp_path, b"%PDF-1.5 content").unwrap();

        let config = UploadConfig::new(temp.path().join("docs"))
            .unwrap()
            .with_max_size(Some("1K".into()))
            .unwrap()
            .with_categories(vec![ContentCategory::File])
            .with_allowed_mimes(vec!["text/plain".into()])
            .with_staging_dir(Some(staging.clone()));

        let mut source = config.staged_uploads();
        source.insert("doc", UploadDescriptor::new(&temp_path, "Report.PDF", 16));

        let mut validator = UploadValidator::from_config(&source, "doc", &config).unwrap();

        assert_eq!(validator.policy().max_size_bytes(), 1024);
        assert!(validator.policy().permits_mime("text/plain"));
        assert!(validator.policy().permits_mime("application/zip"));
        assert!(validator.is_valid());
        assert!(validator.upload_with_options(config.upload_options()));
        assert!(temp.path().join("docs").join("Report.pdf").is_file());
    }

    #[test]
    fn test_staged_uploads_without_staging_dir() {
        let config = UploadConfig::new("uploads").unwrap();
        assert!(config.staged_uploads().staging_dir().is_none());
    }
}
