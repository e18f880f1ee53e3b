//! Octet-stream upload support for Actix Web.
//!
//! The [`OctetStream`] middleware receives requests whose body is a raw
//! `application/octet-stream` upload, writes the body to disk, and hands the received file to
//! handlers through the [`Files`] extractor. Requests of any other content type pass through
//! untouched.
//!
//! # Examples
//!
//! ```no_run
//! use actix_octet_stream::{Files, OctetStream, OctetStreamConfig};
//! use actix_web::{middleware::Logger, post, App, HttpResponse, HttpServer, Responder};
//!
//! #[post("/upload")]
//! async fn upload(files: Files) -> impl Responder {
//!     match files.get("file").and_then(|node| node.as_leaf()) {
//!         Some(file) => HttpResponse::Ok().body(format!(
//!             "stored {:?} ({} bytes) at {}",
//!             file.file_name,
//!             file.size,
//!             file.path.display(),
//!         )),
//!         None => HttpResponse::BadRequest().body("no upload received"),
//!     }
//! }
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     HttpServer::new(|| {
//!         App::new()
//!             .wrap(OctetStream::new(
//!                 OctetStreamConfig::default()
//!                     .upload_dir("./uploads")
//!                     .keep_extensions(true),
//!             ))
//!             .wrap(Logger::default())
//!             .service(upload)
//!     })
//!     .bind(("127.0.0.1", 8080))?
//!     .run()
//!     .await
//! }
//! ```
//!
//! `curl -H 'Content-Type: application/octet-stream' -H 'X-File-Name: photo.png' \
//! --data-binary @photo.png http://localhost:8080/upload`
//!
//! # Deferred Uploads
//!
//! With [`OctetStreamConfig::defer`], handlers run before the body has been received and take a
//! [`DeferredUpload`] to follow progress and await the result. Upload errors are then reported
//! only through [`DeferredUpload::finish`].
//!
//! # Custom Tokenizers
//!
//! How the payload is turned into files is decided by a [`Tokenizer`]. [`DiskTokenizer`] is used
//! by default; [`OctetStream::with_tokenizer`] accepts any other implementation. Part names
//! emitted by a tokenizer may use bracket paths (`photos[]`, `avatar[small]`), which are expanded
//! into nested values by [`decode`].

#![doc(html_logo_url = "https://actix.rs/img/logo.png")]
#![doc(html_favicon_url = "https://actix.rs/favicon.ico")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod aggregate;
mod config;
mod decode;
mod deferred;
mod disk;
mod error;
mod extract;
mod middleware;
mod tokenizer;

pub use self::aggregate::{Aggregate, AggregateMap};
pub use self::config::{OctetStreamConfig, DEFAULT_FIELD_NAME};
pub use self::decode::{decode, Node, Tree};
pub use self::deferred::DeferredUpload;
pub use self::disk::{DiskTokenizer, UploadedFile, X_FILE_NAME};
pub use self::error::{DecodeError, OctetStreamError};
pub use self::extract::{Body, Files};
pub use self::middleware::{OctetStream, OctetStreamMiddleware};
pub use self::tokenizer::{Event, Events, Progress, Tokenizer};
