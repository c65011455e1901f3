//! Filesystem side of an upload: destination directory creation and the final move.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Prefix of the sibling file a cross-device copy is written to before it is renamed into place.
pub(crate) const PARTIAL_UPLOAD_PREFIX: &str = ".upload-";

static PARTIAL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Ensures `path` exists as a directory, creating missing ancestors.
///
/// A directory that already exists at any level, including one created concurrently by
/// another process, counts as success.
///
/// # Errors
///
/// Returns an I/O error if a component cannot be created (for example permission denied on an
/// ancestor) or if `path` exists but is not a directory.
pub fn ensure_directory(path: &Path) -> io::Result<()> {
    if path.as_os_str().is_empty() || path.is_dir() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Moves the file at `from` to `to`, replacing any existing file at `to`.
///
/// A plain rename is attempted first. If that fails (for example because the paths are on
/// different filesystems) the file is copied to a hidden sibling of `to`, renamed over `to`,
/// and the source removed. A failed copy never leaves a truncated file at `to` and never
/// touches an existing file there.
///
/// # Errors
///
/// Returns an I/O error if neither strategy succeeds. The source is left in place unless the
/// copy completed.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    let rename_error = match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    if !from.is_file() {
        return Err(rename_error);
    }

    tracing::debug!(
        "rename {} -> {} failed ({}), falling back to copy",
        from.display(),
        to.display(),
        rename_error
    );

    let partial = partial_path(to);
    if let Err(e) = fs::copy(from, &partial).and_then(|_| fs::rename(&partial, to)) {
        if partial.exists() {
            if let Err(cleanup) = fs::remove_file(&partial) {
                tracing::warn!(
                    "could not remove partial copy {}: {}",
                    partial.display(),
                    cleanup
                );
            }
        }
        return Err(e);
    }

    if let Err(e) = fs::remove_file(from) {
        tracing::warn!(
            "copied upload to {} but could not remove {}: {}",
            to.display(),
            from.display(),
            e
        );
    }

    Ok(())
}

// Unique within the process (counter) and across processes (pid).
fn partial_path(to: &Path) -> PathBuf {
    let name = to
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let n = PARTIAL_COUNTER.fetch_add(1, Ordering::Relaxed);

    to.with_file_name(format!(
        "{}{}.{}.{}",
        PARTIAL_UPLOAD_PREFIX,
        name,
        std::process::id(),
        n
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftover_partials(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(PARTIAL_UPLOAD_PREFIX))
            })
            .collect()
    }

    #[test]
    fn test_ensure_directory_creates_nested() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("a").join("b").join("c");

        ensure_directory(&target).unwrap();

        assert!(target.is_dir());
    }

    #[test]
    fn test_ensure_directory_existing_is_ok() {
        let temp = TempDir::new().unwrap();

        ensure_directory(temp.path()).unwrap();
        ensure_directory(temp.path()).unwrap();

        assert!(temp.path().is_dir());
    }

    #[test]
    fn test_ensure_directory_trailing_separator() {
        let temp = TempDir::new().unwrap();
        let target = format!("{}/x/y/", temp.path().display());

        ensure_directory(Path::new(&target)).unwrap();

        assert!(temp.path().join("x").join("y").is_dir());
    }

    #[test]
    fn test_ensure_directory_blocked_by_file() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        assert!(ensure_directory(&blocker).is_err());
        assert!(ensure_directory(&blocker.join("child")).is_err());
    }

    #[test]
    fn test_ensure_directory_concurrent_callers() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("shared").join("uploads").join("2024");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let target = target.clone();
                std::thread::spawn(move || ensure_directory(&target))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert!(target.is_dir());
    }

    #[test]
    fn test_move_file_success() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("php123");
        let to = temp.path().join("pic.png");
        fs::write(&from, b"pixels").unwrap();

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"pixels");
    }

    #[test]
    fn test_move_file_overwrites_destination() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("php123");
        let to = temp.path().join("pic.png");
        fs::write(&from, b"new").unwrap();
        fs::write(&to, b"old").unwrap();

        move_file(&from, &to).unwrap();

        assert_eq!(fs::read(&to).unwrap(), b"new");
    }

    #[test]
    fn test_move_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let result = move_file(&temp.path().join("gone"), &temp.path().join("dest"));

        assert!(result.is_err());
        assert!(!temp.path().join("dest").exists());
    }

    #[test]
    fn test_move_into_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("php123");
        fs::write(&from, b"data").unwrap();

        let result = move_file(&from, &temp.path().join("nope").join("dest"));

        assert!(result.is_err());
        assert!(from.exists());
    }

    #[test]
    fn test_partial_paths_are_unique_siblings() {
        let to = Path::new("/srv/uploads/pic.png");

        let first = partial_path(to);
        let second = partial_path(to);

        assert_ne!(first, second);
        assert_eq!(first.parent(), to.parent());
        assert!(first
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(".upload-pic.png.")));
    }

    #[test]
    fn test_failed_copy_keeps_existing_destination() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("php123");
        fs::write(&from, b"new").unwrap();
        // A directory at the target makes both the rename and the final rename of the copy fail.
        let to = temp.path().join("pic.png");
        fs::create_dir(&to).unwrap();
        fs::write(to.join("keep"), b"old").unwrap();

        assert!(move_file(&from, &to).is_err());

        assert!(from.is_file());
        assert_eq!(fs::read(to.join("keep")).unwrap(), b"old");
        assert!(leftover_partials(temp.path()).is_empty());
    }

    #[test]
    fn test_successful_move_leaves_no_partial() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("php123");
        let to = temp.path().join("pic.png");
        fs::write(&from, b"pixels").unwrap();

        move_file(&from, &to).unwrap();

        assert!(leftover_partials(temp.path()).is_empty());
    }
}
