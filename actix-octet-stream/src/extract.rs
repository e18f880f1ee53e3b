//! Request extensions attached by [`OctetStream`](crate::OctetStream) and their extractors.

use std::{any::type_name, ops::Deref};

use actix_utils::future::{err, ok, Ready};
use actix_web::{
    dev::Payload, error::ErrorInternalServerError, Error, FromRequest, HttpMessage as _,
    HttpRequest,
};
use serde::Serialize;

use crate::{decode::Tree, UploadedFile};

/// Marks a request as already handled by an [`OctetStream`](crate::OctetStream) middleware.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Parsed;

/// Uploaded files, keyed by part name.
///
/// Empty for requests that were not octet-stream uploads, and in deferred mode until the upload
/// is read through a [`DeferredUpload`](crate::DeferredUpload).
///
/// # Examples
/// ```
/// use actix_octet_stream::Files;
/// use actix_web::{post, HttpResponse, Responder};
///
/// #[post("/upload")]
/// async fn upload(files: Files) -> impl Responder {
///     match files.get("file").and_then(|node| node.as_leaf()) {
///         Some(file) => HttpResponse::Ok().body(format!("stored {} bytes", file.size)),
///         None => HttpResponse::BadRequest().finish(),
///     }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Files(Tree<UploadedFile>);

impl Files {
    /// Consumes the `Files`, returning the decoded tree.
    pub fn into_inner(self) -> Tree<UploadedFile> {
        self.0
    }
}

impl From<Tree<UploadedFile>> for Files {
    fn from(tree: Tree<UploadedFile>) -> Self {
        Files(tree)
    }
}

impl Deref for Files {
    type Target = Tree<UploadedFile>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for Files {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        from_extensions(req)
    }
}

/// Non-file fields of the request body.
///
/// An empty map until an octet-stream upload completes, after which it is null (`None`), as such
/// uploads carry no fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Body(Option<Tree<String>>);

impl Body {
    pub(crate) fn null() -> Self {
        Body(None)
    }

    /// Returns true if the body was replaced by an octet-stream upload.
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Consumes the `Body`, returning the field tree, if any.
    pub fn into_inner(self) -> Option<Tree<String>> {
        self.0
    }
}

impl Default for Body {
    fn default() -> Self {
        Body(Some(Tree::new()))
    }
}

impl Deref for Body {
    type Target = Option<Tree<String>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for Body {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        from_extensions(req)
    }
}

fn from_extensions<T: Clone + 'static>(req: &HttpRequest) -> Ready<Result<T, Error>> {
    if let Some(data) = req.extensions().get::<T>() {
        ok(data.clone())
    } else {
        log::debug!(
            "Failed to extract upload data; is the OctetStream middleware registered? \
             Request path: {:?} (type: {})",
            req.path(),
            type_name::<T>(),
        );
        err(ErrorInternalServerError(
            "Missing expected request extension data",
        ))
    }
}
