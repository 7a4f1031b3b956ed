//! Local playlist server for integration tests.
//!
//! Layout (paths relative to the server root):
//! - `master.m3u8`: variants `720p`, `1080p` (URI carries a query), `480p`
//!   (never served), plus an `audio/aac.m3u8` rendition shared by all of them;
//! - `720p/index.m3u8`: VOD with a relative key, an absolute key, an init
//!   segment and three segments;
//! - `1080p/index.m3u8`: live playlist with two segments;
//! - `720p/seg1.ts`: binary payload;
//! - `big.bin`: 64 KiB payload for body-cap checks.
//!
//! Contents can be replaced while the server runs, and individual paths can be
//! delayed to simulate slow origins.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::Path;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;

pub const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:4
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aac\",NAME=\"English\",URI=\"audio/aac.m3u8\"
#EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1280x720,AUDIO=\"aac\"
720p/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2560000,RESOLUTION=1920x1080,AUDIO=\"aac\"
1080p/index.m3u8?token=abc
#EXT-X-STREAM-INF:BANDWIDTH=640000,RESOLUTION=854x480,AUDIO=\"aac\"
480p/index.m3u8
";

pub const MEDIA_720: &str = "#EXTM3U
#EXT-X-VERSION:7
#EXT-X-TARGETDURATION:6
#EXT-X-MEDIA-SEQUENCE:0
#EXT-X-PLAYLIST-TYPE:VOD
#EXT-X-MAP:URI=\"init.mp4\"
#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"
#EXTINF:6,
seg1.ts
#EXT-X-KEY:METHOD=AES-128,URI=\"https://cdn.example/key.bin\"
#EXTINF:6,
seg2.ts
#EXTINF:4,
seg3.ts
#EXT-X-ENDLIST
";

pub const MEDIA_720_UPDATED: &str = "#EXTM3U
#EXT-X-VERSION:7
#EXT-X-TARGETDURATION:6
#EXT-X-MEDIA-SEQUENCE:0
#EXT-X-PLAYLIST-TYPE:VOD
#EXT-X-MAP:URI=\"init.mp4\"
#EXTINF:6,
seg1.ts
#EXTINF:6,
seg2.ts
#EXTINF:6,
seg3.ts
#EXTINF:6,
seg4.ts
#EXT-X-ENDLIST
";

pub const MEDIA_1080: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:6
#EXT-X-MEDIA-SEQUENCE:41
#EXTINF:6.0,
seg41.ts
#EXTINF:6.0,
seg42.ts
";

pub const AUDIO: &str = "#EXTM3U
#EXT-X-TARGETDURATION:6
#EXTINF:6,
aac1.aac
#EXT-X-ENDLIST
";

pub const SEGMENT: &[u8] = b"G\x40\x00\x10\xff\xfe\x1b[2Jpayload";

pub struct PlaylistFixture {
    blobs: Arc<Mutex<HashMap<String, Bytes>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    request_counts: Arc<Mutex<HashMap<String, u64>>>,
}

impl Default for PlaylistFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaylistFixture {
    pub fn new() -> Self {
        let mut blobs = HashMap::new();
        blobs.insert("master.m3u8".to_string(), Bytes::from_static(MASTER.as_bytes()));
        blobs.insert(
            "720p/index.m3u8".to_string(),
            Bytes::from_static(MEDIA_720.as_bytes()),
        );
        blobs.insert(
            "1080p/index.m3u8".to_string(),
            Bytes::from_static(MEDIA_1080.as_bytes()),
        );
        blobs.insert(
            "audio/aac.m3u8".to_string(),
            Bytes::from_static(AUDIO.as_bytes()),
        );
        blobs.insert("720p/seg1.ts".to_string(), Bytes::from_static(SEGMENT));
        blobs.insert("big.bin".to_string(), Bytes::from(vec![b'x'; 64 * 1024]));

        Self {
            blobs: Arc::new(Mutex::new(blobs)),
            delays: Arc::new(Mutex::new(HashMap::new())),
            request_counts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Serve `body` at `path` from now on.
    pub fn put(&self, path: &str, body: impl Into<Bytes>) {
        self.blobs
            .lock()
            .expect("blobs mutex poisoned")
            .insert(path.trim_start_matches('/').to_string(), body.into());
    }

    /// Delay every response for `path`.
    pub fn with_delay(self, path: &str, delay: Duration) -> Self {
        self.delays
            .lock()
            .expect("delays mutex poisoned")
            .insert(path.trim_start_matches('/').to_string(), delay);
        self
    }

    /// How many times `path` was requested, 404s included.
    pub fn request_count_for(&self, path: &str) -> u64 {
        let key = path.trim_start_matches('/');
        *self
            .request_counts
            .lock()
            .expect("request_counts mutex poisoned")
            .get(key)
            .unwrap_or(&0)
    }

    /// Copy every blob under `dir`, keeping the relative layout.
    pub fn write_to(&self, dir: &FsPath) -> std::io::Result<()> {
        let blobs = self.blobs.lock().expect("blobs mutex poisoned");
        for (path, body) in blobs.iter() {
            let target = dir.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, body)?;
        }
        Ok(())
    }

    /// Start the server and return its base URL (ending with `/`).
    ///
    /// - bind a `std::net::TcpListener` on `127.0.0.1:0`,
    /// - mark it non-blocking,
    /// - hand it off to `tokio::net::TcpListener::from_std`,
    /// - spawn `axum::serve` in the background.
    pub async fn start(&self) -> String {
        let app = self.build_router();

        let listener = std::net::TcpListener::bind("127.0.0.1:0")
            .expect("failed to bind local fixture server");
        listener
            .set_nonblocking(true)
            .expect("failed to set nonblocking on fixture listener");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener)
                .expect("failed to convert fixture listener to tokio listener");
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}/", addr)
    }

    fn build_router(&self) -> Router {
        let blobs = self.blobs.clone();
        let delays = self.delays.clone();
        let request_counts = self.request_counts.clone();

        async fn serve_blob(
            key: String,
            blobs: Arc<Mutex<HashMap<String, Bytes>>>,
            delays: Arc<Mutex<HashMap<String, Duration>>>,
            request_counts: Arc<Mutex<HashMap<String, u64>>>,
        ) -> impl IntoResponse {
            if let Ok(mut lock) = request_counts.lock() {
                *lock.entry(key.clone()).or_insert(0) += 1;
            }

            let delay = delays.lock().ok().and_then(|d| d.get(&key).copied());
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let body = blobs.lock().ok().and_then(|b| b.get(&key).cloned());
            let Some(bytes) = body else {
                return (StatusCode::NOT_FOUND, HeaderMap::new(), Bytes::new());
            };

            let mut headers = HeaderMap::new();
            headers.insert(
                axum::http::header::CONTENT_TYPE,
                HeaderValue::from_static(if key.ends_with(".m3u8") {
                    "application/vnd.apple.mpegurl"
                } else {
                    "application/octet-stream"
                }),
            );
            (StatusCode::OK, headers, bytes)
        }

        // Query strings never reach the key: `Path` only sees the path.
        Router::new().route(
            "/{*path}",
            get(move |Path(path): Path<String>| {
                serve_blob(
                    path.trim_start_matches('/').to_string(),
                    blobs.clone(),
                    delays.clone(),
                    request_counts.clone(),
                )
            }),
        )
    }
}
