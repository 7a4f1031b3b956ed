//! Fetch sources.
//!
//! [`FetchSource`] is the seam between the navigator and the outside world:
//! it turns a URL into text. Implementations:
//! - [`HttpSource`]: `reqwest` GET with bounded retries and backoff;
//! - [`FileSource`]: local paths and `file://` URLs;
//! - [`MemorySource`]: in-memory fixtures with request counting;
//! - [`AutoSource`]: picks HTTP or file by scheme.
//!
//! Every fetch races against a [`CancellationToken`]. Bytes are decoded as
//! UTF-8 lossily so binary targets still come back as text.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::error::{HlsvError, HlsvResult};
use crate::settings::Settings;

/// Retrieves the raw text behind a URL.
#[async_trait]
pub trait FetchSource: Send + Sync {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> HlsvResult<String>;
}

#[async_trait]
impl<T: FetchSource + ?Sized> FetchSource for std::sync::Arc<T> {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> HlsvResult<String> {
        (**self).fetch(url, cancel).await
    }
}

#[async_trait]
impl<T: FetchSource + ?Sized> FetchSource for Box<T> {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> HlsvResult<String> {
        (**self).fetch(url, cancel).await
    }
}

fn into_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// HTTP(S) source.
///
/// `request_timeout` bounds connecting and every idle gap while reading the
/// body; a whole attempt is additionally bounded by `request_timeout * (max_retries + 1)`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    settings: Settings,
}

impl HttpSource {
    pub fn new(settings: Settings) -> HlsvResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(settings.request_timeout)
            .build()
            .map_err(|e| HlsvError::msg(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn retry_with_backoff<T, F, Fut>(
        &self,
        url: &str,
        cancel: &CancellationToken,
        mut f: F,
    ) -> HlsvResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = HlsvResult<T>>,
    {
        let mut last_error: Option<HlsvError> = None;
        let mut delay = self.settings.retry_base_delay;

        for attempt in 0..=self.settings.max_retries {
            if cancel.is_cancelled() {
                return Err(HlsvError::Cancelled);
            }

            match f().await {
                Ok(v) => {
                    if attempt > 0 {
                        debug!(url = url, attempts = attempt + 1, "fetch succeeded after retry");
                    }
                    return Ok(v);
                }
                Err(e) => {
                    debug!(
                        url = url,
                        attempt = attempt + 1,
                        max_attempts = self.settings.max_retries + 1,
                        "fetch attempt failed: {}",
                        e
                    );
                    if !Self::is_retryable(&e) {
                        return Err(e);
                    }
                    last_error = Some(e);

                    if attempt < self.settings.max_retries {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(HlsvError::Cancelled),
                            _ = tokio::time::sleep(delay) => {},
                        }
                        delay = (delay * 2).min(self.settings.max_retry_delay);
                    }
                }
            }
        }

        debug!(
            url = url,
            attempts = self.settings.max_retries + 1,
            "fetch giving up after retries"
        );
        Err(last_error.unwrap_or_else(|| HlsvError::request(url, "fetch failed with no error")))
    }

    /// Client errors and cancellation are final; everything else may be transient.
    fn is_retryable(err: &HlsvError) -> bool {
        match err {
            HlsvError::Http { status, .. } => *status >= 500 || *status == 429,
            HlsvError::Cancelled => false,
            _ => true,
        }
    }

    async fn try_fetch_once(&self, url: &str, cancel: &CancellationToken) -> HlsvResult<Bytes> {
        let send = timeout(self.settings.request_timeout, self.client.get(url).send());

        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HlsvError::Cancelled),
            res = send => res,
        };

        let response = match res {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(HlsvError::request(url, e)),
            Err(_) => return Err(HlsvError::Timeout(url.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(HlsvError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let collect = collect_stream_to_bytes(
            response.bytes_stream(),
            cancel,
            self.settings.request_timeout,
            self.settings.max_body_bytes,
            url,
        );
        match timeout(self.settings.attempt_timeout(), collect).await {
            Ok(res) => res,
            Err(_) => Err(HlsvError::Timeout(url.to_string())),
        }
    }
}

#[async_trait]
impl FetchSource for HttpSource {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> HlsvResult<String> {
        let bytes = self
            .retry_with_backoff(url, cancel, || self.try_fetch_once(url, cancel))
            .await?;
        debug!(url = url, bytes = bytes.len(), "fetched");
        Ok(into_text(&bytes))
    }
}

/// Read a chunked body into memory, observing cancellation, an idle timeout
/// and a size cap. Bytes past `max_bytes` are dropped.
async fn collect_stream_to_bytes<S, E>(
    stream: S,
    cancel: &CancellationToken,
    idle_timeout: std::time::Duration,
    max_bytes: usize,
    url: &str,
) -> HlsvResult<Bytes>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut buf = BytesMut::with_capacity(16 * 1024);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HlsvError::Cancelled),
            item = timeout(idle_timeout, stream.next()) => match item {
                Ok(v) => v,
                Err(_) => return Err(HlsvError::Timeout(url.to_string())),
            },
        };

        match next {
            Some(Ok(chunk)) => {
                let room = max_bytes.saturating_sub(buf.len());
                if chunk.len() > room {
                    buf.extend_from_slice(&chunk[..room]);
                    debug!(url = url, max_bytes = max_bytes, "body truncated");
                    break;
                }
                buf.extend_from_slice(&chunk);
            }
            Some(Err(e)) => return Err(HlsvError::request(url, e)),
            None => break,
        }
    }

    Ok(buf.freeze())
}

/// Local file source. Accepts plain paths and `file://` URLs.
#[derive(Debug, Clone)]
pub struct FileSource {
    max_body_bytes: usize,
}

impl FileSource {
    pub fn new(settings: &Settings) -> Self {
        Self {
            max_body_bytes: settings.max_body_bytes,
        }
    }

    fn path_of(url: &str) -> HlsvResult<PathBuf> {
        if !url.starts_with("file:") {
            return Ok(PathBuf::from(url));
        }
        let parsed = Url::parse(url).map_err(|e| HlsvError::request(url, e))?;
        parsed
            .to_file_path()
            .map_err(|_| HlsvError::request(url, "not a local file path"))
    }

    async fn read_capped(path: PathBuf, max_bytes: usize) -> std::io::Result<Vec<u8>> {
        let file = tokio::fs::File::open(path).await?;
        let mut buf = Vec::new();
        file.take(max_bytes as u64).read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

impl Default for FileSource {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

#[async_trait]
impl FetchSource for FileSource {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> HlsvResult<String> {
        let path = Self::path_of(url)?;
        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HlsvError::Cancelled),
            res = Self::read_capped(path, self.max_body_bytes) => res?,
        };
        debug!(url = url, bytes = bytes.len(), "read local file");
        Ok(into_text(&bytes))
    }
}

/// In-memory fixture source.
///
/// Unknown URLs fail with a 404 [`HlsvError::Http`]. Contents can be replaced
/// between fetches to simulate a changing remote.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: Mutex<HashMap<String, String>>,
    requests: Mutex<HashMap<String, usize>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(url, text);
        self
    }

    pub fn insert(&self, url: impl Into<String>, text: impl Into<String>) {
        self.files.lock().insert(url.into(), text.into());
    }

    pub fn remove(&self, url: &str) -> Option<String> {
        self.files.lock().remove(url)
    }

    /// Number of fetches seen for `url`, including failed ones.
    pub fn requests(&self, url: &str) -> usize {
        self.requests.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().values().sum()
    }
}

#[async_trait]
impl FetchSource for MemorySource {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> HlsvResult<String> {
        if cancel.is_cancelled() {
            return Err(HlsvError::Cancelled);
        }
        *self.requests.lock().entry(url.to_string()).or_insert(0) += 1;
        self.files
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| HlsvError::Http {
                status: 404,
                url: url.to_string(),
            })
    }
}

/// `http(s)://` goes to [`HttpSource`], everything else to [`FileSource`].
#[derive(Debug, Clone)]
pub struct AutoSource {
    http: HttpSource,
    file: FileSource,
}

impl AutoSource {
    pub fn new(settings: Settings) -> HlsvResult<Self> {
        let file = FileSource::new(&settings);
        let http = HttpSource::new(settings)?;
        Ok(Self { http, file })
    }

    fn is_http(url: &str) -> bool {
        let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }
}

#[async_trait]
impl FetchSource for AutoSource {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> HlsvResult<String> {
        if Self::is_http(url) {
            self.http.fetch(url, cancel).await
        } else {
            self.file.fetch(url, cancel).await
        }
    }
}
