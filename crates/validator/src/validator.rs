//! Single-upload validator
//!
//! This module provides [`UploadValidator`], which owns one upload from resolution through
//! validation to the final move.
//!
//! # Lifecycle
//!
//! 1. Construction resolves the descriptor for a field name, checks that the temp path is a
//!    genuine upload, derives metadata, and applies the initial policy
//! 2. Policy and the target filename may be changed freely before validation
//! 3. [`UploadValidator::is_valid`] runs every check and records all violations
//! 4. [`UploadValidator::upload`] re-validates, creates the destination directory, and moves
//!    the temp file to `<destination>/<name>.<extension>`
//!
//! # Missing uploads
//!
//! A field that is absent, points at a file not produced by the upload mechanism, or cannot be
//! read is not an error at construction time. The validator enters a "no file" state, exposed
//! through [`UploadValidator::is_exist`] and reported as the `file` error by validation.
//!
//! # Directory creation
//!
//! Failure to create the destination directory is recorded under `pathToSave` but, by default,
//! the move is still attempted. [`UploadOptions::abort_on_path_error`] stops at that point
//! instead.

use crate::config::UploadConfig;
use crate::constants::{
    IMAGE_MIMES, MAX_SIZE_EXCEEDED_MESSAGE, MIME_NOT_ALLOWED_MESSAGE, NOT_FOUND_MESSAGE,
    PATH_NOT_CREATED_MESSAGE,
};
use crate::policy::{ContentCategory, Policy};
use crate::sniff::detect_mime;
use crate::source::UploadInputSource;
use crate::transfer::{ensure_directory, move_file};
use crate::validation::{ErrorKey, ValidationErrors};
use crate::ConfigError;
use chrono::Utc;
use std::path::{Path, PathBuf};

const KIB: f64 = 1024.0;

/// Why no upload is available for the requested field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
    /// The input source has no entry for the field
    FieldAbsent,
    /// The temp path was not produced by the upload mechanism
    NotGenuineUpload,
    /// The temp file could not be read for content inspection
    Unreadable,
}

/// Options controlling [`UploadValidator::upload_with_options`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Stop before the move when the destination directory cannot be created
    pub abort_on_path_error: bool,
}

#[derive(Debug, Clone)]
struct ResolvedUpload {
    temp_path: PathBuf,
    base_name: String,
    extension: String,
    mime: String,
    size_bytes: u64,
}

impl ResolvedUpload {
    fn name_with_extension(&self) -> String {
        if self.extension.is_empty() {
            self.base_name.clone()
        } else {
            format!("{}.{}", self.base_name, self.extension)
        }
    }
}

#[derive(Debug, Clone)]
enum Resolution {
    Resolved(ResolvedUpload),
    Missing(MissingReason),
}

/// Validates one uploaded file and moves it into its destination directory.
///
/// Each instance owns exactly one upload, its policy, and its error collection. Nothing is
/// shared between instances.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    field_name: String,
    destination: PathBuf,
    resolution: Resolution,
    policy: Policy,
    errors: ValidationErrors,
}

impl UploadValidator {
    /// Resolves the upload submitted under `field_name` and applies the initial policy.
    ///
    /// # Arguments
    ///
    /// * `source` - Where uploads for the current request are looked up
    /// * `field_name` - Form field the file was submitted under
    /// * `destination` - Directory the file is moved into; created on upload if missing
    /// * `max_size` - Optional `<integer>[G|M|K]` limit
    /// * `allowed_mimes` - Optional explicit MIME allow-list
    /// * `categories` - Optional content-type categories expanded into the allow-list
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidMaxSize` if `max_size` is malformed. A missing or spoofed
    /// upload is not an error; see [`UploadValidator::is_exist`].
    pub fn new<I: UploadInputSource + ?Sized>(
        source: &I,
        field_name: &str,
        destination: impl Into<PathBuf>,
        max_size: Option<&str>,
        allowed_mimes: Option<&[&str]>,
        categories: Option<&[ContentCategory]>,
    ) -> Result<Self, ConfigError> {
        let resolution = resolve(source, field_name);

        let mut validator = Self {
            field_name: field_name.to_owned(),
            destination: destination.into(),
            resolution,
            policy: Policy::default(),
            errors: ValidationErrors::new(),
        };

        validator.set_validations(max_size, allowed_mimes, categories)?;
        Ok(validator)
    }

    /// Builds a validator from configuration resolved at startup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidMaxSize` if the configured size is malformed.
    pub fn from_config<I: UploadInputSource + ?Sized>(
        source: &I,
        field_name: &str,
        config: &UploadConfig,
    ) -> Result<Self, ConfigError> {
        let mimes: Vec<&str> = config.allowed_mimes().iter().map(String::as_str).collect();

        Self::new(
            source,
            field_name,
            config.destination_dir(),
            config.max_size(),
            Some(mimes.as_slice()),
            Some(config.categories()),
        )
    }

    /// Replaces policy values; see [`Policy::set_validations`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidMaxSize` if `max_size` is malformed.
    pub fn set_validations(
        &mut self,
        max_size: Option<&str>,
        allowed_mimes: Option<&[&str]>,
        categories: Option<&[ContentCategory]>,
    ) -> Result<(), ConfigError> {
        self.policy
            .set_validations(max_size, allowed_mimes, categories)
    }

    /// Replaces the size limit.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidMaxSize` if `size` is not `<integer>[G|M|K]`.
    pub fn set_max_size(&mut self, size: &str) -> Result<(), ConfigError> {
        self.policy.set_max_size(size)
    }

    /// Replaces the MIME allow-list.
    pub fn set_valid_mimes<I, S>(&mut self, mimes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.set_valid_mimes(mimes);
    }

    /// Runs every check and reports whether the upload is acceptable.
    ///
    /// The error collection is rebuilt on each call, so it always reflects the current policy.
    /// A missing upload records only the `file` error and skips the remaining checks.
    pub fn is_valid(&mut self) -> bool {
        self.errors.clear();

        let upload = match &self.resolution {
            Resolution::Resolved(upload) => upload,
            Resolution::Missing(reason) => {
                tracing::debug!("no upload for field {:?}: {:?}", self.field_name, reason);
                self.errors.set(ErrorKey::File, NOT_FOUND_MESSAGE);
                return false;
            }
        };

        if !self.policy.permits_mime(&upload.mime) {
            self.errors.set(ErrorKey::ValidMimes, MIME_NOT_ALLOWED_MESSAGE);
        }

        let max_size = self.policy.max_size_bytes();
        if upload.size_bytes > max_size {
            let limit_kb = (max_size as f64 / KIB).round();
            self.errors.set(
                ErrorKey::MaxSize,
                format!("{} {} KB", MAX_SIZE_EXCEEDED_MESSAGE, limit_kb),
            );
        }

        tracing::debug!(
            "validated field {:?} ({}, {} bytes): {} error(s)",
            self.field_name,
            upload.mime,
            upload.size_bytes,
            self.errors.len()
        );

        self.errors.is_empty()
    }

    /// Validates and moves the upload using default options.
    ///
    /// Returns true only if the file now lives at `<destination>/<name>.<extension>`.
    pub fn upload(&mut self) -> bool {
        self.upload_with_options(UploadOptions::default())
    }

    /// Validates and moves the upload.
    ///
    /// On failure the temp file is left where it was and the reason, when it is a validation
    /// or directory problem, is available from [`UploadValidator::errors`].
    pub fn upload_with_options(&mut self, options: UploadOptions) -> bool {
        if !self.is_valid() {
            return false;
        }

        let Resolution::Resolved(upload) = &self.resolution else {
            return false;
        };

        if let Err(e) = ensure_directory(&self.destination) {
            tracing::warn!(
                "could not create upload directory {}: {}",
                self.destination.display(),
                e
            );
            self.errors
                .set(ErrorKey::PathToSave, PATH_NOT_CREATED_MESSAGE);

            if options.abort_on_path_error {
                return false;
            }
        }

        let target = self.destination.join(upload.name_with_extension());
        match move_file(&upload.temp_path, &target) {
            Ok(()) => {
                tracing::info!(
                    "moved upload {:?} to {}",
                    self.field_name,
                    target.display()
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    "failed to move upload {} to {}: {}",
                    upload.temp_path.display(),
                    target.display(),
                    e
                );
                false
            }
        }
    }

    /// Overwrites the base name used for the destination file.
    ///
    /// The name is used verbatim; callers are responsible for making it filesystem-safe.
    pub fn set_filename(&mut self, name: impl Into<String>) {
        if let Resolution::Resolved(upload) = &mut self.resolution {
            upload.base_name = name.into();
        }
    }

    /// Appends `_<unix seconds>` to the current base name.
    pub fn set_filename_with_time(&mut self) {
        if let Resolution::Resolved(upload) = &mut self.resolution {
            upload.base_name = format!("{}_{}", upload.base_name, Utc::now().timestamp());
        }
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Returns true if a genuine upload was resolved for the field.
    pub fn is_exist(&self) -> bool {
        matches!(self.resolution, Resolution::Resolved(_))
    }

    /// Returns why no upload is available, or `None` if one was resolved.
    pub fn missing_reason(&self) -> Option<MissingReason> {
        match self.resolution {
            Resolution::Resolved(_) => None,
            Resolution::Missing(reason) => Some(reason),
        }
    }

    /// Base name without extension.
    pub fn name(&self) -> Option<&str> {
        self.resolved().map(|u| u.base_name.as_str())
    }

    /// Destination filename: base name plus lower-cased extension.
    pub fn name_with_extension(&self) -> Option<String> {
        self.resolved().map(ResolvedUpload::name_with_extension)
    }

    /// Lower-cased extension; empty when the declared name has no `.`.
    pub fn extension(&self) -> Option<&str> {
        self.resolved().map(|u| u.extension.as_str())
    }

    /// MIME type sniffed from the file content.
    pub fn mime(&self) -> Option<&str> {
        self.resolved().map(|u| u.mime.as_str())
    }

    pub fn is_image(&self) -> bool {
        self.mime().is_some_and(|mime| IMAGE_MIMES.contains(&mime))
    }

    /// Declared size in bytes.
    pub fn size_bytes(&self) -> Option<u64> {
        self.resolved().map(|u| u.size_bytes)
    }

    /// Declared size in kilobytes, rounded to one decimal.
    pub fn size_in_kb(&self) -> Option<f64> {
        self.size_bytes().map(|size| round_one_decimal(size as f64 / KIB))
    }

    /// Declared size in megabytes, rounded to one decimal.
    pub fn size_in_mb(&self) -> Option<f64> {
        self.size_bytes()
            .map(|size| round_one_decimal(size as f64 / (KIB * KIB)))
    }

    pub fn temp_path(&self) -> Option<&Path> {
        self.resolved().map(|u| u.temp_path.as_path())
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    fn resolved(&self) -> Option<&ResolvedUpload> {
        match &self.resolution {
            Resolution::Resolved(upload) => Some(upload),
            Resolution::Missing(_) => None,
        }
    }
}

fn resolve<I: UploadInputSource + ?Sized>(source: &I, field_name: &str) -> Resolution {
    let Some(descriptor) = source.descriptor(field_name) else {
        return Resolution::Missing(MissingReason::FieldAbsent);
    };

    if !source.is_genuine_upload(&descriptor.temp_path) {
        tracing::warn!(
            "rejected upload for field {:?}: {} is not a genuine upload",
            field_name,
            descriptor.temp_path.display()
        );
        return Resolution::Missing(MissingReason::NotGenuineUpload);
    }

    let mime = match detect_mime(&descriptor.temp_path) {
        Ok(mime) => mime,
        Err(e) => {
            tracing::warn!(
                "could not inspect upload {}: {}",
                descriptor.temp_path.display(),
                e
            );
            return Resolution::Missing(MissingReason::Unreadable);
        }
    };

    let (base_name, extension) = split_declared_name(&descriptor.declared_name);

    Resolution::Resolved(ResolvedUpload {
        temp_path: descriptor.temp_path,
        base_name,
        extension,
        mime,
        size_bytes: descriptor.declared_size_bytes,
    })
}

/// Splits a client-declared filename into base name and lower-cased extension.
///
/// Only the final path segment is considered. The extension is everything after the last `.`;
/// a name without `.` has an empty extension.
fn split_declared_name(declared: &str) -> (String, String) {
    let file_name = declared
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(declared);

    match file_name.rsplit_once('.') {
        Some((base, extension)) => (base.to_owned(), extension.to_lowercase()),
        None => (file_name.to_owned(), String::new()),
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
