//! Accumulated validation errors.
//!
//! Validation never stops at the first problem. Each failed check records a message under a
//! fixed [`ErrorKey`]; recording the same key again overwrites the previous message.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fixed vocabulary of validation error keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKey {
    /// No genuine upload was found for the field
    File,
    /// The sniffed MIME type is not in the allow-list
    ValidMimes,
    /// The declared size exceeds the configured limit
    MaxSize,
    /// The destination directory could not be created
    PathToSave,
}

impl ErrorKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::ValidMimes => "validMimes",
            Self::MaxSize => "maxSize",
            Self::PathToSave => "pathToSave",
        }
    }
}

impl fmt::Display for ErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from error key to a human-readable message.
///
/// Any entry means the upload is invalid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<ErrorKey, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` under `key`, replacing any earlier message for that key.
    pub fn set(&mut self, key: ErrorKey, message: impl Into<String>) {
        self.0.insert(key, message.into());
    }

    pub fn get(&self, key: ErrorKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: ErrorKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = ErrorKey> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ErrorKey, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}
