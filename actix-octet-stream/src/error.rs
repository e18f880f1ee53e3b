//! Error and Result module

use actix_web::{error::PayloadError, http::StatusCode, ResponseError};
use derive_more::{Display, Error, From};

/// A set of errors that can occur while consuming an octet-stream upload.
#[derive(Debug, Display, From, Error)]
#[non_exhaustive]
pub enum OctetStreamError {
    /// Payload error, e.g. the connection was closed before the body was complete.
    #[display("{}", _0)]
    Payload(PayloadError),

    /// Uploaded file is larger than the configured limit.
    #[display("File size limit of {} bytes exceeded", limit)]
    #[from(ignore)]
    FileTooLarge { limit: u64 },

    /// File I/O error while writing the upload to disk.
    #[display("File I/O error: {}", _0)]
    FileIo(std::io::Error),

    /// Uploaded parts could not be arranged into a structured value.
    #[display("{}", _0)]
    Decode(DecodeError),
}

/// Return `BadRequest` for `OctetStreamError`.
///
/// A malformed, oversized or unwritable upload is reported against the request.
impl ResponseError for OctetStreamError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

/// Errors raised while decoding bracket-style part names into nested values.
#[derive(Debug, Display, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// Two part names describe incompatible shapes at the same path.
    #[display("Conflicting values for `{}`", _0)]
    Conflict(#[error(not(source))] String),
}
