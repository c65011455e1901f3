//! Constants used throughout the upload validator.
//!
//! The MIME tables are part of the external contract: callers configure policy by category
//! name and rely on these exact expansions.

/// MIME types accepted by the `image` category.
pub const IMAGE_MIMES: &[&str] = &[
    "image/bmp",
    "image/jpeg",
    "image/pipeg",
    "image/svg+xml",
    "image/tiff",
    "image/x-icon",
    "image/vnd.microsoft.icon",
];

/// MIME types accepted by the `video` category.
pub const VIDEO_MIMES: &[&str] = &[
    "video/mpeg",
    "video/mp4",
    "video/x-msvideo",
    "video/ogg",
    "video/webm",
];

/// MIME types accepted by the `audio` category.
pub const AUDIO_MIMES: &[&str] = &[
    "audio/basic",
    "audio/mid",
    "audio/mpeg",
    "audio/x-wav",
    "audio/aac",
    "audio/ogg",
    "audio/wav",
    "audio/webm",
];

/// MIME types accepted by the `file` category.
pub const FILE_MIMES: &[&str] = &[
    "application/pdf",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.rar",
    "application/zip",
    "application/x-7z-compressed",
];

/// Message recorded under the `file` key.
pub const NOT_FOUND_MESSAGE: &str = "file not found";

/// Message recorded under the `validMimes` key.
pub const MIME_NOT_ALLOWED_MESSAGE: &str = "selected file mime is not in allowed ones";

/// Prefix of the message recorded under the `maxSize` key; the limit in KB follows.
pub const MAX_SIZE_EXCEEDED_MESSAGE: &str = "selected file size is bigger than";

/// Message recorded under the `pathToSave` key.
pub const PATH_NOT_CREATED_MESSAGE: &str = "couldn't create path";

/// Number of leading bytes read from the temp file for MIME sniffing.
pub(crate) const SNIFF_LIMIT_BYTES: u64 = 8192;
