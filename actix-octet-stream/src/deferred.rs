//! Event driving and the deferred upload handle.

use std::{cell::Cell, rc::Rc};

use actix_utils::future::{err, ok, Ready};
use actix_web::{
    dev::Payload,
    error::{ErrorInternalServerError, PayloadError},
    Error, FromRequest, HttpMessage as _, HttpRequest,
};
use futures_util::StreamExt as _;
use tokio::sync::{mpsc, oneshot};

use crate::{
    aggregate::AggregateMap,
    decode::decode,
    extract::Files,
    tokenizer::{Event, Events, Progress},
    OctetStreamError,
};

/// Listener side of a deferred upload.
struct Feed {
    progress: Rc<Cell<Progress>>,
    events: mpsc::UnboundedSender<Event>,
}

impl Feed {
    fn publish(&self, event: &Event) {
        if let Event::Progress(progress) = event {
            self.progress.set(*progress);
        }

        // handle may have been dropped
        let _ = self.events.send(event.clone());
    }
}

/// Consumes `events` to completion and decodes the received files.
///
/// Stops at the first error; the stream is not polled again after it.
pub(crate) async fn drive(mut events: Events) -> Result<Files, OctetStreamError> {
    drive_with(&mut events, None).await
}

async fn drive_with(
    events: &mut Events,
    feed: Option<&Feed>,
) -> Result<Files, OctetStreamError> {
    let mut files = AggregateMap::new();

    while let Some(event) = events.next().await {
        let event = event?;

        if let Some(feed) = feed {
            feed.publish(&event);
        }

        match event {
            Event::File { name, file } => {
                log::debug!("received file part `{}` at {}", name, file.path.display());
                files.insert(name, file);
            }

            Event::Progress(Progress { received, expected }) => {
                log::trace!("upload progress: {} of {:?} bytes", received, expected);
            }
        }
    }

    Ok(Files::from(decode(files)?))
}

/// Starts driving `events` on the current thread's runtime and returns a handle to its outcome.
pub(crate) fn spawn(mut events: Events, expected: Option<u64>) -> DeferredUpload {
    let progress = Rc::new(Cell::new(Progress {
        received: 0,
        expected,
    }));
    let finished = Rc::new(Cell::new(false));

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (outcome_tx, outcome_rx) = oneshot::channel();

    let feed = Feed {
        progress: Rc::clone(&progress),
        events: event_tx,
    };
    let done = Rc::clone(&finished);

    actix_web::rt::spawn(async move {
        let outcome = drive_with(&mut events, Some(&feed)).await;
        done.set(true);

        if let Err(err) = &outcome {
            log::debug!("deferred upload failed: {err}");
        }

        if let Err(Err(err)) = outcome_tx.send(outcome) {
            log::warn!("deferred upload failed and its outcome was never read: {err}");
        }
    });

    DeferredUpload {
        progress,
        finished,
        events: event_rx,
        outcome: outcome_rx,
    }
}

/// Handle to an upload that is still being received.
///
/// Attached to requests instead of populated [`Files`] when the middleware is configured with
/// [`defer(true)`](crate::OctetStreamConfig::defer). The handler chain runs while the payload is
/// consumed in the background; upload errors are only observable through [`finish`].
///
/// The handle can be extracted once per request.
///
/// [`finish`]: Self::finish
///
/// # Examples
/// ```
/// use actix_octet_stream::DeferredUpload;
/// use actix_web::{error, post, Error, HttpResponse};
///
/// #[post("/upload")]
/// async fn upload(upload: DeferredUpload) -> Result<HttpResponse, Error> {
///     let files = upload.finish().await.map_err(error::ErrorBadRequest)?;
///     Ok(HttpResponse::Ok().body(format!("{} part(s)", files.len())))
/// }
/// ```
#[derive(Debug)]
pub struct DeferredUpload {
    progress: Rc<Cell<Progress>>,
    finished: Rc<Cell<bool>>,
    events: mpsc::UnboundedReceiver<Event>,
    outcome: oneshot::Receiver<Result<Files, OctetStreamError>>,
}

impl DeferredUpload {
    /// Returns the most recent progress report.
    pub fn progress(&self) -> Progress {
        self.progress.get()
    }

    /// Returns true once the upload has ended, successfully or not.
    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }

    /// Waits for the next file or progress event.
    ///
    /// Events are yielded in the order they were received. Returns `None` once the upload has
    /// ended and every event has been yielded.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Waits for the upload to end and returns the decoded files.
    ///
    /// # Errors
    /// Returns the error that ended the upload. If the background task was dropped before
    /// finishing, e.g. on runtime shutdown, the upload is reported as incomplete.
    pub async fn finish(self) -> Result<Files, OctetStreamError> {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => Err(PayloadError::Incomplete(None).into()),
        }
    }
}

impl FromRequest for DeferredUpload {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions_mut().remove::<DeferredUpload>() {
            Some(upload) => ok(upload),
            None => {
                log::debug!(
                    "No deferred upload on request; is the OctetStream middleware registered \
                     with `defer(true)`, and was the handle already taken? Request path: {:?}",
                    req.path(),
                );
                err(ErrorInternalServerError("Missing deferred upload"))
            }
        }
    }
}
