//! Writes the request payload to a file on disk.

use std::{
    io,
    path::{Path, PathBuf},
};

use actix_web::{
    dev::Payload,
    http::header::HeaderName,
    HttpMessage as _, HttpRequest,
};
use futures_util::{stream, StreamExt as _};
use mime::Mime;
use serde::{Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt as _;

use crate::{
    tokenizer::{content_length, Event, Events, Progress, Tokenizer},
    OctetStreamConfig, OctetStreamError,
};

/// Header carrying the client side name of the uploaded file.
pub const X_FILE_NAME: HeaderName = HeaderName::from_static("x-file-name");

/// A file received from an octet-stream upload.
///
/// The file is kept at `path` after the request completes; removing it is up to the application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedFile {
    /// Location of the file on disk.
    pub path: PathBuf,

    /// The value of the `X-File-Name` header.
    pub file_name: Option<String>,

    /// The value of the `Content-Type` header.
    #[serde(serialize_with = "serialize_mime")]
    pub content_type: Option<Mime>,

    /// The size in bytes of the file.
    pub size: u64,

    /// Hex encoded SHA-256 digest, when hashing is enabled.
    pub hash: Option<String>,
}

fn serialize_mime<S: Serializer>(mime: &Option<Mime>, ser: S) -> Result<S::Ok, S::Error> {
    match mime {
        Some(mime) => ser.serialize_some(mime.as_ref()),
        None => ser.serialize_none(),
    }
}

/// Default [`Tokenizer`] that streams the whole payload into a single file.
///
/// One [`Event::Progress`] is emitted per received chunk and one [`Event::File`] once the payload
/// is complete. The file is created in the configured upload directory, or the platform's
/// temporary directory if none is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskTokenizer;

impl Tokenizer for DiskTokenizer {
    fn tokenize(
        &self,
        req: &HttpRequest,
        payload: Payload,
        config: &OctetStreamConfig,
    ) -> Events {
        let file_name = req
            .headers()
            .get(&X_FILE_NAME)
            .and_then(|name| name.to_str().ok())
            .map(ToOwned::to_owned);

        let suffix = file_name
            .as_deref()
            .filter(|_| config.keeps_extensions())
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"));

        let upload = Upload {
            payload,
            name: config.file_field_name().to_owned(),
            file_name,
            content_type: req.mime_type().ok().flatten(),
            expected: content_length(req.headers()),
            received: 0,
            limit: config.file_size_limit(),
            dir: config.get_upload_dir().map(ToOwned::to_owned),
            suffix,
            hasher: config.hashes().then(Sha256::new),
            sink: None,
        };

        Box::pin(stream::try_unfold(Some(upload), step))
    }
}

struct Upload {
    payload: Payload,
    name: String,
    file_name: Option<String>,
    content_type: Option<Mime>,
    expected: Option<u64>,
    received: u64,
    limit: u64,
    dir: Option<PathBuf>,
    suffix: Option<String>,
    hasher: Option<Sha256>,
    sink: Option<Sink>,
}

struct Sink {
    temp: NamedTempFile,
    file: tokio::fs::File,
}

impl Sink {
    fn create(dir: Option<&Path>, suffix: Option<&str>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("upload_");

        if let Some(suffix) = suffix {
            builder.suffix(suffix);
        }

        let temp = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let file = tokio::fs::File::from_std(temp.reopen()?);

        Ok(Sink { temp, file })
    }
}

impl Upload {
    fn progress(&self) -> Progress {
        Progress {
            received: self.received,
            expected: self.expected,
        }
    }
}

/// Advances an upload by one chunk. Returns `None` once the file event has been emitted.
async fn step(
    state: Option<Upload>,
) -> Result<Option<(Event, Option<Upload>)>, OctetStreamError> {
    let Some(mut upload) = state else {
        return Ok(None);
    };

    let mut sink = match upload.sink.take() {
        Some(sink) => sink,
        None => Sink::create(upload.dir.as_deref(), upload.suffix.as_deref())?,
    };

    match upload.payload.next().await {
        Some(chunk) => {
            let chunk = chunk?;

            upload.received += chunk.len() as u64;
            if upload.received > upload.limit {
                return Err(OctetStreamError::FileTooLarge {
                    limit: upload.limit,
                });
            }

            if let Some(hasher) = upload.hasher.as_mut() {
                hasher.update(&chunk);
            }

            sink.file.write_all(&chunk).await?;
            upload.sink = Some(sink);

            let progress = upload.progress();
            Ok(Some((Event::Progress(progress), Some(upload))))
        }

        None => {
            sink.file.flush().await?;
            let (_, path) = sink.temp.keep().map_err(io::Error::from)?;

            log::debug!("upload of {} bytes written to {}", upload.received, path.display());

            let file = UploadedFile {
                path,
                file_name: upload.file_name,
                content_type: upload.content_type,
                size: upload.received,
                hash: upload.hasher.map(|hasher| hex::encode(hasher.finalize())),
            };

            Ok(Some((
                Event::File {
                    name: upload.name,
                    file,
                },
                None,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{http::header, test::TestRequest};
    use assert_matches::assert_matches;
    use futures_util::TryStreamExt as _;

    use super::*;

    fn octet_request(body: &'static str) -> (HttpRequest, Payload) {
        TestRequest::default()
            .insert_header((header::CONTENT_TYPE, "application/octet-stream"))
            .insert_header((X_FILE_NAME, "photo.png"))
            .set_payload(body)
            .to_http_parts()
    }

    async fn tokenize_all(
        req: &HttpRequest,
        payload: Payload,
        config: &OctetStreamConfig,
    ) -> Result<Vec<Event>, OctetStreamError> {
        DiskTokenizer.tokenize(req, payload, config).try_collect().await
    }

    fn last_file(events: Vec<Event>) -> (String, UploadedFile) {
        match events.into_iter().last() {
            Some(Event::File { name, file }) => (name, file),
            other => panic!("expected a file event, got {other:?}"),
        }
    }

    #[actix_rt::test]
    async fn writes_payload_to_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = OctetStreamConfig::default().upload_dir(dir.path());

        let (req, payload) = octet_request("hello");
        let events = tokenize_all(&req, payload, &config).await.unwrap();

        assert_eq!(
            events[0],
            Event::Progress(Progress {
                received: 5,
                expected: None,
            })
        );

        let (name, file) = last_file(events);
        assert_eq!(name, "file");
        assert_eq!(file.size, 5);
        assert_eq!(file.file_name.as_deref(), Some("photo.png"));
        assert_eq!(file.content_type, Some(mime::APPLICATION_OCTET_STREAM));
        assert!(file.hash.is_none());
        assert!(file.path.starts_with(dir.path()));
        assert_eq!(tokio::fs::read(&file.path).await.unwrap(), b"hello");
    }

    #[actix_rt::test]
    async fn computes_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let config = OctetStreamConfig::default()
            .upload_dir(dir.path())
            .hash(true);

        let (req, payload) = octet_request("hello");
        let (_, file) = last_file(tokenize_all(&req, payload, &config).await.unwrap());

        assert_eq!(
            file.hash.as_deref(),
            Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
    }

    #[actix_rt::test]
    async fn size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let config = OctetStreamConfig::default()
            .upload_dir(dir.path())
            .max_file_size(3);

        let (req, payload) = octet_request("hello");
        let res = tokenize_all(&req, payload, &config).await;

        assert_matches!(res, Err(OctetStreamError::FileTooLarge { limit: 3 }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[actix_rt::test]
    async fn keep_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let config = OctetStreamConfig::default()
            .upload_dir(dir.path())
            .keep_extensions(true);

        let (req, payload) = octet_request("png");
        let (_, file) = last_file(tokenize_all(&req, payload, &config).await.unwrap());
        assert_eq!(file.path.extension().unwrap(), "png");

        let config = config.keep_extensions(false);
        let (req, payload) = octet_request("png");
        let (_, file) = last_file(tokenize_all(&req, payload, &config).await.unwrap());
        assert!(file.path.extension().is_none());
    }

    #[actix_rt::test]
    async fn empty_payload() {
        let dir = tempfile::tempdir().unwrap();
        let config = OctetStreamConfig::default()
            .upload_dir(dir.path())
            .field_name("upload");

        let (req, payload) = TestRequest::default()
            .insert_header((header::CONTENT_TYPE, "application/octet-stream"))
            .insert_header((header::CONTENT_LENGTH, "0"))
            .to_http_parts();
        let events = tokenize_all(&req, payload, &config).await.unwrap();
        assert_eq!(events.len(), 1);

        let (name, file) = last_file(events);
        assert_eq!(name, "upload");
        assert_eq!(file.size, 0);
        assert!(file.file_name.is_none());
        assert!(file.path.exists());
    }

    #[test]
    fn serializes_mime_as_string() {
        let file = UploadedFile {
            path: PathBuf::from("/tmp/upload_1"),
            file_name: None,
            content_type: Some(mime::IMAGE_PNG),
            size: 1,
            hash: None,
        };

        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["content_type"], "image/png");
        assert_eq!(json["file_name"], serde_json::Value::Null);
    }
}
