//! Stream tokenizer interface.

use actix_web::{
    dev::Payload,
    http::header::{self, HeaderMap},
    HttpRequest,
};
use futures_core::stream::LocalBoxStream;

use crate::{OctetStreamConfig, OctetStreamError, UploadedFile};

/// Events emitted while a payload is consumed.
///
/// The stream ending is the successful end of the upload. An `Err` item is terminal; the stream
/// is not polled again after it.
pub type Events = LocalBoxStream<'static, Result<Event, OctetStreamError>>;

/// A single tokenizer event.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Event {
    /// A file part was fully received.
    File {
        /// Name the part is recorded under, possibly a bracket path.
        name: String,

        /// The received file.
        file: UploadedFile,
    },

    /// More of the payload was consumed.
    Progress(Progress),
}

/// Upload progress in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Bytes consumed so far.
    pub received: u64,

    /// Value of the `Content-Length` header, if sent.
    pub expected: Option<u64>,
}

/// Turns a request payload into a stream of [`Event`]s.
///
/// A tokenizer is shared by all requests passing through one [`OctetStream`] middleware; each
/// call to [`tokenize`](Self::tokenize) starts an independent stream for one request.
///
/// [`OctetStream`]: crate::OctetStream
pub trait Tokenizer {
    /// Starts consuming `payload`.
    fn tokenize(
        &self,
        req: &HttpRequest,
        payload: Payload,
        config: &OctetStreamConfig,
    ) -> Events;
}

/// Parses the `Content-Length` header, if present and valid.
pub(crate) fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|len| len.to_str().ok())
        .and_then(|len| len.parse().ok())
}
