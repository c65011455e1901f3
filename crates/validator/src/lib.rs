//! Upload Validator
//!
//! This crate validates a single uploaded file and relocates it from its transient upload
//! location into a destination directory.
//!
//! ## Pipeline
//!
//! - The upload descriptor (temp path, declared name, declared size) is looked up in an
//!   injected [`UploadInputSource`], which also answers whether the temp path is a genuine upload
//! - Metadata is derived once: lower-cased extension, base name, and a MIME type sniffed from
//!   the file content (the client-declared content type is never consulted)
//! - A [`Policy`] (maximum size, MIME allow-list) is applied and violations are accumulated in
//!   [`ValidationErrors`] rather than raised
//! - [`UploadValidator::upload`] re-validates, creates the destination directory and moves the file
//!
//! A missing or spoofed upload is a state, not an error: every operation reports it through the
//! `file` error key. Only malformed *policy* (for example an unparseable maximum size) fails
//! with a [`ConfigError`].
//!
//! ## Example Usage
//!
//! ```no_run
//! use upload_validator::{ContentCategory, StagedUploads, UploadDescriptor, UploadValidator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut source = StagedUploads::with_staging_dir("/tmp/uploads");
//! source.insert("avatar", UploadDescriptor::new("/tmp/uploads/php1234", "pic.PNG", 3000));
//!
//! let mut validator = UploadValidator::new(
//!     &source,
//!     "avatar",
//!     "public/avatars",
//!     Some("5K"),
//!     None,
//!     Some(&[ContentCategory::Image]),
//! )?;
//!
//! if !validator.upload() {
//!     for (key, message) in validator.errors().iter() {
//!         eprintln!("{key}: {message}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod constants;
mod policy;
mod size;
mod sniff;
mod source;
mod transfer;
mod validation;
mod validator;

pub use config::{
    bool_from_env_value, categories_from_env_value, list_from_env_value, UploadConfig,
};
pub use constants::{
    AUDIO_MIMES, FILE_MIMES, IMAGE_MIMES, MAX_SIZE_EXCEEDED_MESSAGE, MIME_NOT_ALLOWED_MESSAGE,
    NOT_FOUND_MESSAGE, PATH_NOT_CREATED_MESSAGE, VIDEO_MIMES,
};
pub use policy::{ContentCategory, Policy, DEFAULT_MAX_SIZE_BYTES};
pub use size::parse_max_size;
pub use sniff::detect_mime;
pub use source::{StagedUploads, UploadDescriptor, UploadInputSource};
pub use transfer::{ensure_directory, move_file};
pub use validation::{ErrorKey, ValidationErrors};
pub use validator::{MissingReason, UploadOptions, UploadValidator};

/// Errors raised by malformed policy configuration.
///
/// These indicate a defect in the calling code, never a bad upload.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The maximum size string is not `<integer>[G|M|K]`
    #[error("format of maxSize is not correct: {0:?}")]
    InvalidMaxSize(String),

    /// A content-type category name outside `image`, `video`, `audio`, `file`
    #[error("unknown content-type category: {0:?}")]
    UnknownCategory(String),

    /// Any other malformed configuration value
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
