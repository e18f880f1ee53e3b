//! For middleware documentation, see [`OctetStream`].

use std::rc::Rc;

use actix_utils::future::{ready, Ready};
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{
        header::{HeaderMap, CONTENT_TYPE},
        Method,
    },
    Error, HttpMessage as _,
};
use futures_core::future::LocalBoxFuture;

use crate::{
    deferred,
    extract::{Body, Files, Parsed},
    tokenizer::{content_length, Tokenizer},
    DiskTokenizer, OctetStreamConfig,
};

const OCTET_STREAM: &str = "application/octet-stream";

/// Middleware for receiving `application/octet-stream` uploads.
///
/// Every request passing through is given [`Body`] and [`Files`] extensions. For `POST`, `PUT`
/// and other non-`GET`/`HEAD` requests with an `application/octet-stream` content type, the
/// payload is handed to the middleware's [`Tokenizer`] and the received files are decoded into
/// [`Files`] before the rest of the chain runs. Any upload error aborts the request with
/// `400 Bad Request`.
///
/// With [`defer(true)`](OctetStreamConfig::defer), the chain runs immediately and handlers read
/// the upload through a [`DeferredUpload`](crate::DeferredUpload) instead.
///
/// A request is only ever parsed once, even if the middleware is registered more than once.
///
/// # Examples
/// ```
/// use actix_octet_stream::{Files, OctetStream, OctetStreamConfig};
/// use actix_web::{web, App, HttpResponse};
///
/// let app = App::new()
///     .wrap(OctetStream::new(
///         OctetStreamConfig::default().upload_dir("/var/uploads"),
///     ))
///     .route(
///         "/upload",
///         web::post().to(|files: Files| async move { HttpResponse::Ok().json(files) }),
///     );
/// ```
#[derive(Debug)]
pub struct OctetStream<T = DiskTokenizer> {
    config: Rc<OctetStreamConfig>,
    tokenizer: Rc<T>,
}

impl OctetStream {
    /// Constructs middleware writing uploads to disk with the given configuration.
    pub fn new(config: OctetStreamConfig) -> Self {
        Self::with_tokenizer(config, DiskTokenizer)
    }
}

impl<T: Tokenizer> OctetStream<T> {
    /// Constructs middleware that consumes uploads with a custom tokenizer.
    pub fn with_tokenizer(config: OctetStreamConfig, tokenizer: T) -> Self {
        Self {
            config: Rc::new(config),
            tokenizer: Rc::new(tokenizer),
        }
    }
}

impl Default for OctetStream {
    fn default() -> Self {
        Self::new(OctetStreamConfig::default())
    }
}

impl<T> Clone for OctetStream<T> {
    fn clone(&self) -> Self {
        Self {
            config: Rc::clone(&self.config),
            tokenizer: Rc::clone(&self.tokenizer),
        }
    }
}

impl<S, B, T> Transform<S, ServiceRequest> for OctetStream<T>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    T: Tokenizer + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = OctetStreamMiddleware<S, T>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(OctetStreamMiddleware {
            service: Rc::new(service),
            config: Rc::clone(&self.config),
            tokenizer: Rc::clone(&self.tokenizer),
        }))
    }
}

pub struct OctetStreamMiddleware<S, T = DiskTokenizer> {
    service: Rc<S>,
    config: Rc<OctetStreamConfig>,
    tokenizer: Rc<T>,
}

impl<S, B, T> Service<ServiceRequest> for OctetStreamMiddleware<S, T>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    T: Tokenizer + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let config = Rc::clone(&self.config);
        let tokenizer = Rc::clone(&self.tokenizer);

        Box::pin(async move {
            if !mark_parsed(&req) {
                return service.call(req).await;
            }

            if matches!(*req.method(), Method::GET | Method::HEAD) {
                return service.call(req).await;
            }

            if !is_octet_stream(req.headers()) {
                return service.call(req).await;
            }

            log::debug!("receiving octet-stream upload for {}", req.path());

            let payload = req.take_payload();
            let events = tokenizer.tokenize(req.request(), payload, &config);

            if config.is_deferred() {
                let upload = deferred::spawn(events, content_length(req.headers()));
                req.extensions_mut().insert(upload);
                return service.call(req).await;
            }

            let files = deferred::drive(events).await.map_err(|err| {
                log::debug!("octet-stream upload for {} failed: {}", req.path(), err);
                err
            })?;

            log::debug!("received {} upload part(s) for {}", files.len(), req.path());

            {
                let mut extensions = req.extensions_mut();
                extensions.insert(Body::null());
                extensions.insert(files);
            }

            service.call(req).await
        })
    }
}

/// Marks the request as parsed and attaches empty upload data.
///
/// Returns false if the request was already marked, leaving its extensions untouched.
fn mark_parsed(req: &ServiceRequest) -> bool {
    let mut extensions = req.extensions_mut();

    if extensions.contains::<Parsed>() {
        return false;
    }

    extensions.insert(Parsed);

    if !extensions.contains::<Body>() {
        extensions.insert(Body::default());
    }

    if !extensions.contains::<Files>() {
        extensions.insert(Files::default());
    }

    true
}

/// Compares the media type, without parameters, to `application/octet-stream` exactly.
fn is_octet_stream(headers: &HeaderMap) -> bool {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .unwrap_or("");

    content_type.split(';').next() == Some(OCTET_STREAM)
}
