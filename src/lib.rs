//! # streamget
//!
//! A streaming HTTP/HTTPS file downloader. A download follows redirects,
//! optionally tunnels through an HTTP or HTTPS proxy, optionally gunzips the
//! body on the fly, and reports its lifecycle as a stream of events.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let download = streamget::download(
//!         "https://example.com/archive.tar",
//!         "archive.tar",
//!         streamget::DownloadOptions::default(),
//!     )?;
//!
//!     let message = download.finish().await?;
//!     println!("{message}");
//!     Ok(())
//! }
//! ```
//!
//! ## Events
//!
//! ```rust,no_run
//! use streamget::{DownloadEvent, DownloadOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = DownloadOptions {
//!         gunzip: true,
//!         proxy: Some("http://proxy.local:3128".into()),
//!         ..Default::default()
//!     };
//!     let mut download = streamget::download("http://example.com/log.txt", "log.txt", options)?;
//!
//!     while let Some(event) = download.next_event().await {
//!         match event {
//!             DownloadEvent::Start(size) => println!("size: {size:?}"),
//!             DownloadEvent::Progress(ratio) => println!("{:.1}%", ratio * 100.0),
//!             DownloadEvent::Bytes(_) => {}
//!             DownloadEvent::End(message) => println!("{message}"),
//!             DownloadEvent::Error(err) => return Err(err.into()),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use std::path::Path;

// Re-export core types that users might need
pub use crate::core::downloader::{Download, DownloadEvent, FINISHED_MESSAGE, MAX_REDIRECTS};
pub use crate::core::error::{Error, Result};
pub use crate::core::options::{
    normalize_download, normalize_request, Credential, DownloadOptions, ProxyConfig,
    ProxyDescriptor, ProxySetting, RequestDescriptor, RequestOptions, Scheme, USER_AGENT,
};
pub use crate::core::progress::progress;
pub use crate::core::redirect::{resolve_location, Origin};
pub use crate::core::request::{AbortHandle, RequestHandle, TransportConfig, TunnelKind};

// Internal modules
mod core;

/// Download `source` into `destination`
///
/// Returns synchronously with [`Error::UnsupportedScheme`] or
/// [`Error::Validation`] when the request can be rejected before any I/O.
/// All later failures, including a source without a parseable scheme, arrive
/// as a [`DownloadEvent::Error`].
///
/// Outside of a tokio runtime it fails with [`Error::NoRuntime`].
///
/// # Examples
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let download = streamget::download("http://example.com/a.bin", "a.bin", Default::default())?;
/// let abort = download.abort_handle();
/// // abort.abort() from anywhere stops the transfer
/// download.finish().await?;
/// # drop(abort);
/// # Ok(())
/// # }
/// ```
pub fn download(
    source: &str,
    destination: impl AsRef<Path>,
    options: DownloadOptions,
) -> Result<Download> {
    Download::start(source, destination, &options, TransportConfig::default())
}

/// Download with custom transport settings
pub fn download_with_transport(
    source: &str,
    destination: impl AsRef<Path>,
    options: DownloadOptions,
    transport: TransportConfig,
) -> Result<Download> {
    Download::start(source, destination, &options, transport)
}

/// Build a single request without following redirects or streaming the body
///
/// A missing `protocol` defaults to `http`. The returned handle is sent with
/// [`RequestHandle::send`], which yields the raw response.
///
/// # Examples
/// ```rust,no_run
/// use streamget::RequestOptions;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let handle = streamget::request(RequestOptions {
///     host: "example.com".to_string(),
///     path: "/index.html".to_string(),
///     ..Default::default()
/// })?;
/// let response = handle.send().await?;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
pub fn request(options: RequestOptions) -> Result<RequestHandle> {
    let desc = normalize_request(&options)?;
    crate::core::request::build_request(&desc)
}
