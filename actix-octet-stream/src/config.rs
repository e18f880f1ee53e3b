//! [`OctetStream`](crate::OctetStream) configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Name of the file part produced by [`DiskTokenizer`](crate::DiskTokenizer) unless configured.
pub const DEFAULT_FIELD_NAME: &str = "file";

/// Configuration for the [`OctetStream`](crate::OctetStream) middleware and its tokenizer.
///
/// Can be built with the builder methods or deserialized from a settings file. Unknown keys are
/// rejected during deserialization.
///
/// # Examples
/// ```
/// use actix_octet_stream::OctetStreamConfig;
///
/// let config = OctetStreamConfig::default()
///     .upload_dir("/var/uploads")
///     .max_file_size(10 * 1024 * 1024)
///     .keep_extensions(true);
///
/// let same = OctetStreamConfig::from_json(serde_json::json!({
///     "upload_dir": "/var/uploads",
///     "max_file_size": 10485760,
///     "keep_extensions": true,
/// }))
/// .unwrap();
///
/// assert_eq!(config, same);
/// assert!(OctetStreamConfig::from_json(serde_json::json!({ "uploadDir": "/tmp" })).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OctetStreamConfig {
    upload_dir: Option<PathBuf>,
    keep_extensions: bool,
    max_file_size: u64,
    field_name: String,
    hash: bool,
    defer: bool,
}

impl OctetStreamConfig {
    /// Deserializes configuration from a JSON value.
    ///
    /// # Errors
    /// Fails on unknown keys or mistyped values.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Sets the directory uploads are written to.
    ///
    /// The default location is the platform's temporary directory.
    pub fn upload_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.upload_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Keeps the extension of the client supplied file name on the written file.
    pub fn keep_extensions(mut self, keep_extensions: bool) -> Self {
        self.keep_extensions = keep_extensions;
        self
    }

    /// Sets the maximum accepted upload size in bytes. By default this limit is 200MiB.
    pub fn max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Sets the name the uploaded file is recorded under. Defaults to `file`.
    ///
    /// Bracket paths such as `uploads[]` are expanded when files are decoded.
    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    /// Computes a SHA-256 digest of each upload.
    pub fn hash(mut self, hash: bool) -> Self {
        self.hash = hash;
        self
    }

    /// Resumes the handler chain before the upload is consumed.
    ///
    /// Handlers then receive a [`DeferredUpload`](crate::DeferredUpload) instead of populated
    /// [`Files`](crate::Files), and parse errors are only reported through that handle.
    pub fn defer(mut self, defer: bool) -> Self {
        self.defer = defer;
        self
    }

    /// Returns the configured upload directory, if any.
    pub fn get_upload_dir(&self) -> Option<&Path> {
        self.upload_dir.as_deref()
    }

    pub(crate) fn keeps_extensions(&self) -> bool {
        self.keep_extensions
    }

    pub(crate) fn file_size_limit(&self) -> u64 {
        self.max_file_size
    }

    pub(crate) fn file_field_name(&self) -> &str {
        &self.field_name
    }

    pub(crate) fn hashes(&self) -> bool {
        self.hash
    }

    /// Returns true if deferred mode is enabled.
    pub fn is_deferred(&self) -> bool {
        self.defer
    }
}

impl Default for OctetStreamConfig {
    fn default() -> Self {
        Self {
            upload_dir: None,
            keep_extensions: false,
            max_file_size: 209_715_200, // 200 MiB
            field_name: DEFAULT_FIELD_NAME.to_owned(),
            hash: false,
            defer: false,
        }
    }
}
