//! Download orchestration for streamget
//!
//! A download session drives one logical download across its redirect hops
//! inside a single tokio task and reports everything through an event channel.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::header::{HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING, LOCATION};
use reqwest::{Response, StatusCode};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::core::error::{Error, Result};
use crate::core::options::{DownloadOptions, NormalizedOptions};
use crate::core::progress::{parse_declared_size, progress};
use crate::core::redirect::{resolve_location, Origin};
use crate::core::request::{build_request_on, AbortHandle, RequestHandle, Route, TransportConfig};
use crate::core::sink::WriteSink;

/// Redirect count at which a download gives up
pub const MAX_REDIRECTS: u32 = 10;

/// Message carried by the `End` event
pub const FINISHED_MESSAGE: &str = "Finished writing to disk";

/// Lifecycle events of a download
#[derive(Debug)]
pub enum DownloadEvent {
    /// Headers of the final 200 response arrived; carries the declared size
    Start(Option<u64>),
    /// Ratio of the body received so far
    Progress(f64),
    /// Total bytes received from the wire so far
    Bytes(u64),
    /// Body fully written and flushed
    End(String),
    /// The download failed; nothing follows
    Error(Error),
}

impl DownloadEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadEvent::End(_) | DownloadEvent::Error(_))
    }
}

/// What to do with a response, decided once per exchange
#[derive(Debug, PartialEq, Eq)]
enum Disposition {
    Redirect(Option<String>),
    Success,
    Unhandled(u16),
}

fn classify(response: &Response) -> Disposition {
    match response.status() {
        StatusCode::OK => Disposition::Success,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::TEMPORARY_REDIRECT => {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            Disposition::Redirect(location)
        }
        other => Disposition::Unhandled(other.as_u16()),
    }
}

fn is_gzip(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"))
}

/// Per-download state threaded through every redirect hop
struct DownloadSession {
    destination: PathBuf,
    options: NormalizedOptions,
    route: Route,
    /// Authority of the first hop; origin credentials never leave it
    first_origin: Option<Origin>,
    redirect_count: u32,
    events: UnboundedSender<DownloadEvent>,
    abort: AbortHandle,
}

impl DownloadSession {
    fn emit(&self, event: DownloadEvent) {
        // A dropped receiver just means nobody is listening
        let _ = self.events.send(event);
    }

    /// Normalize and build the request for one hop
    fn prepare(&self, source: &str) -> Result<RequestHandle> {
        let mut desc = self.options.descriptor_for(source)?;
        if let Some(first) = &self.first_origin {
            if *first != desc.origin() && desc.auth.take().is_some() {
                debug!("Dropping origin credentials for cross-origin hop to {}", desc.origin());
            }
        }
        let mut handle = build_request_on(&desc, &self.route, self.abort.clone())?;
        if self.options.gunzip {
            handle
                .headers_mut()
                .insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        }
        Ok(handle)
    }

    async fn run(mut self, first: RequestHandle) {
        match self.drive(first).await {
            Ok(()) => {
                self.emit(DownloadEvent::Progress(1.0));
                self.emit(DownloadEvent::End(FINISHED_MESSAGE.to_string()));
            }
            Err(err) => {
                warn!("Download to {} failed: {err}", self.destination.display());
                self.emit(DownloadEvent::Error(err));
            }
        }
    }

    async fn drive(&mut self, first: RequestHandle) -> Result<()> {
        let mut handle = first;

        loop {
            let origin = handle.origin().clone();
            debug!("Requesting {}", handle.url());
            let response = handle.send().await?;
            let status = response.status().as_u16();

            match classify(&response) {
                Disposition::Redirect(location) => {
                    self.redirect_count += 1;
                    if self.redirect_count >= MAX_REDIRECTS {
                        return Err(Error::RedirectLoop);
                    }
                    let location = location.ok_or(Error::MissingLocation(status))?;
                    let next = resolve_location(&origin, &location);
                    debug!("Redirect {} ({status}) to {next}", self.redirect_count);
                    drop(response);
                    handle = self.prepare(&next)?;
                }
                Disposition::Success => return self.receive(response).await,
                Disposition::Unhandled(code) => return Err(Error::ServerStatus(code)),
            }
        }
    }

    /// Stream a 200 response body into the destination
    async fn receive(&self, response: Response) -> Result<()> {
        let declared = parse_declared_size(response.headers());
        let gunzip = self.options.gunzip && is_gzip(&response);

        let mut sink = WriteSink::create(&self.destination, gunzip).await?;
        info!(
            "Receiving {} into {} (size: {}, gunzip: {gunzip})",
            response.url(),
            self.destination.display(),
            declared.map_or_else(|| "unknown".to_string(), |size| size.to_string()),
        );
        self.emit(DownloadEvent::Start(declared));

        let mut transferred = 0u64;
        let mut body = response.bytes_stream();

        loop {
            let next = tokio::select! {
                _ = self.abort.aborted() => {
                    // Keep what has arrived so far
                    sink.close().await?;
                    return Err(Error::Aborted);
                }
                next = body.next() => next,
            };
            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(err)) => {
                    sink.close().await?;
                    return Err(err.into());
                }
                None => break,
            };

            sink.write_chunk(&chunk).await?;
            transferred += chunk.len() as u64;
            self.emit(DownloadEvent::Bytes(transferred));
            self.emit(DownloadEvent::Progress(progress(declared, transferred)));
        }

        let written = sink.finish().await?;
        debug!("Wrote {written} bytes from {transferred} received");
        Ok(())
    }
}

/// A running download
///
/// Events arrive in order and end with exactly one `End` or `Error`. Dropping
/// the handle does not stop the transfer; call [`Download::abort`] for that.
pub struct Download {
    events: UnboundedReceiver<DownloadEvent>,
    abort: AbortHandle,
    finished: bool,
}

impl Download {
    /// Start downloading `source` into `destination`
    ///
    /// Bad schemes and invalid proxy options are returned as errors right
    /// away. Everything else, including a source URL that cannot be parsed,
    /// is reported through the event channel. Outside of a tokio runtime this
    /// fails with [`Error::NoRuntime`].
    pub fn start(
        source: &str,
        destination: impl AsRef<Path>,
        options: &DownloadOptions,
        transport: TransportConfig,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let normalized = options.normalize()?;
        let route = Route::new(normalized.proxy.as_ref(), &transport)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let abort = AbortHandle::new();

        let mut session = DownloadSession {
            destination: destination.as_ref().to_path_buf(),
            options: normalized,
            route,
            first_origin: None,
            redirect_count: 0,
            events: tx,
            abort: abort.clone(),
        };

        match session.prepare(source) {
            Ok(first) => {
                session.first_origin = Some(first.origin().clone());
                runtime.spawn(session.run(first));
            }
            Err(err) if err.is_runtime() => session.emit(DownloadEvent::Error(err)),
            Err(err) => return Err(err),
        }

        Ok(Self {
            events: rx,
            abort,
            finished: false,
        })
    }

    /// Next event, or `None` once the terminal event has been returned
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        if self.finished {
            return None;
        }
        let event = self.events.recv().await;
        self.track(&event);
        event
    }

    fn track(&mut self, event: &Option<DownloadEvent>) {
        match event {
            Some(event) if !event.is_terminal() => {}
            _ => self.finished = true,
        }
    }

    /// Cancel the download; it ends with `Error(Aborted)` unless already done
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Wait for the terminal event, discarding intermediate ones
    pub async fn finish(mut self) -> Result<String> {
        while let Some(event) = self.next_event().await {
            match event {
                DownloadEvent::End(message) => return Ok(message),
                DownloadEvent::Error(err) => return Err(err),
                _ => {}
            }
        }
        Err(Error::Transport(
            "download task stopped without reporting a result".to_string(),
        ))
    }
}

impl Stream for Download {
    type Item = DownloadEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.events.poll_recv(cx) {
            Poll::Ready(event) => {
                self.track(&event);
                Poll::Ready(event)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
