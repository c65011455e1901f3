//! Size and MIME-type policy.
//!
//! A [`Policy`] holds the maximum accepted size and the MIME allow-list. Every setter replaces
//! the previous value; allow-lists from separate calls are never merged.

use crate::constants::{AUDIO_MIMES, FILE_MIMES, IMAGE_MIMES, VIDEO_MIMES};
use crate::size::parse_max_size;
use crate::ConfigError;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Effective size limit when none has been configured.
///
/// Deliberately restrictive so that callers must configure a real limit.
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 1;

/// Named group of MIME types that expands to a fixed allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentCategory {
    Image,
    Video,
    Audio,
    File,
}

impl ContentCategory {
    /// All categories, in declaration order.
    pub const ALL: [ContentCategory; 4] = [Self::Image, Self::Video, Self::Audio, Self::File];

    /// Returns the fixed MIME types this category expands to.
    pub fn mimes(self) -> &'static [&'static str] {
        match self {
            Self::Image => IMAGE_MIMES,
            Self::Video => VIDEO_MIMES,
            Self::Audio => AUDIO_MIMES,
            Self::File => FILE_MIMES,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentCategory {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownCategory(s.to_owned()))
    }
}

/// Maximum size and MIME allow-list applied by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    max_size_bytes: u64,
    allowed_mimes: BTreeSet<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            allowed_mimes: BTreeSet::new(),
        }
    }
}

impl Policy {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Returns the MIME allow-list; empty means no restriction.
    pub fn allowed_mimes(&self) -> &BTreeSet<String> {
        &self.allowed_mimes
    }

    /// Returns true if `mime` passes the allow-list.
    pub fn permits_mime(&self, mime: &str) -> bool {
        self.allowed_mimes.is_empty() || self.allowed_mimes.contains(mime)
    }

    /// Applies an optional size limit, explicit MIME list, and category list in one call.
    ///
    /// Categories expand to their fixed MIME sets and are unioned with the explicit list. A
    /// non-empty result replaces the current allow-list; when neither list is supplied the
    /// allow-list is left as it was. An empty or missing size string leaves the limit as it was.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidMaxSize` if `max_size` is malformed; nothing is changed in
    /// that case.
    pub fn set_validations(
        &mut self,
        max_size: Option<&str>,
        allowed_mimes: Option<&[&str]>,
        categories: Option<&[ContentCategory]>,
    ) -> Result<(), ConfigError> {
        if let Some(size) = max_size.filter(|s| !s.trim().is_empty()) {
            self.set_max_size(size)?;
        }

        let mut mimes: BTreeSet<String> = BTreeSet::new();

        for category in categories.unwrap_or_default() {
            mimes.extend(category.mimes().iter().map(|m| (*m).to_owned()));
        }
        if let Some(explicit) = allowed_mimes {
            mimes.extend(explicit.iter().map(|m| (*m).to_owned()));
        }

        if !mimes.is_empty() {
            self.allowed_mimes = mimes;
        }

        Ok(())
    }

    /// Replaces the size limit with the parsed value of `size`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidMaxSize` if `size` is not `<integer>[G|M|K]`; the current
    /// limit is kept in that case.
    pub fn set_max_size(&mut self, size: &str) -> Result<(), ConfigError> {
        self.max_size_bytes = parse_max_size(size)?;
        Ok(())
    }

    /// Replaces the MIME allow-list.
    pub fn set_valid_mimes<I, S>(&mut self, mimes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_mimes = mimes.into_iter().map(Into::into).collect();
    }
}
