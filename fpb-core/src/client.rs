//! Device server access.
//!
//! Sessions only see the [`DeviceClient`] trait: open a streaming request and
//! get back the raw body as a stream of byte chunks, or create a remote
//! directory. [`HttpDeviceClient`] is the production implementation over the
//! device server's HTTP API.
//!
//! ```text
//! POST /api/file/upload        multipart(file, path)  → event stream
//! POST /api/file/download      {"path"}               → event stream
//! POST /api/fpb/inject/stream  InjectRequest          → event stream
//! POST /api/file/mkdir         {"path"}               → {"success","error"}
//! GET  /api/status                                    → DeviceStatus
//! GET  /api/fpb/info                                  → {"slots":[SlotInfo]}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FpbError;

/// Raw response body, one chunk per network read.
pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

// ── Requests ─────────────────────────────────────────────────────

/// The body of a streaming request.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamRequest {
    Upload {
        /// File name sent with the multipart part.
        file_name: String,
        content: Vec<u8>,
        /// Full destination path on the device.
        remote_path: String,
    },
    Download {
        remote_path: String,
    },
    Inject(InjectRequest),
}

impl StreamRequest {
    fn endpoint(&self) -> &'static str {
        match self {
            Self::Upload { .. } => "/api/file/upload",
            Self::Download { .. } => "/api/file/download",
            Self::Inject(_) => "/api/fpb/inject/stream",
        }
    }
}

/// Compile-and-inject request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InjectRequest {
    pub source_content: String,
    pub patch_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_func: Option<String>,
    pub inject_all: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<u32>,
}

#[derive(Serialize)]
struct PathBody<'a> {
    path: &'a str,
}

// ── Responses ────────────────────────────────────────────────────

/// Answer of `GET /api/status`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeviceStatus {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub port: Option<String>,
}

/// One patch slot as reported by `GET /api/fpb/info`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SlotInfo {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub occupied: bool,
    #[serde(default)]
    pub func: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SlotList {
    #[serde(default)]
    slots: Vec<SlotInfo>,
}

#[derive(Debug, Deserialize)]
struct Ack {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

// ── DeviceClient ─────────────────────────────────────────────────

/// What a session needs from the network.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Send `request` and return its body once the response head is in.
    ///
    /// An `Err` here is a connection-level failure.
    async fn open_stream(&self, request: StreamRequest) -> Result<ByteStream, FpbError>;

    /// Create `path` on the device filesystem.
    async fn mkdir(&self, path: &str) -> Result<(), FpbError>;
}

/// Join a remote directory and a relative path with exactly one `/`.
pub fn join_remote(dir: &str, rel: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let rel = rel.trim_start_matches('/');
    if dir.is_empty() {
        format!("/{rel}")
    } else {
        format!("{dir}/{rel}")
    }
}

// ── HttpDeviceClient ─────────────────────────────────────────────

/// [`DeviceClient`] over the device server's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpDeviceClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpDeviceClient {
    /// Build a client for `base_url` (e.g. `http://127.0.0.1:5500`).
    ///
    /// Only connection establishment is bounded by `connect_timeout`; an
    /// open stream may stay idle indefinitely.
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Result<Self, FpbError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into [`FpbError::HttpStatus`].
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, FpbError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(FpbError::HttpStatus {
            status: status.as_u16(),
            body,
        })
    }

    /// Query the bridge's connection state.
    pub async fn status(&self) -> Result<DeviceStatus, FpbError> {
        let resp = self.http.get(self.url("/api/status")).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Query patch slot occupancy.
    pub async fn slots(&self) -> Result<Vec<SlotInfo>, FpbError> {
        let resp = self.http.get(self.url("/api/fpb/info")).send().await?;
        let list: SlotList = Self::check(resp).await?.json().await?;
        Ok(list.slots)
    }
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn open_stream(&self, request: StreamRequest) -> Result<ByteStream, FpbError> {
        let url = self.url(request.endpoint());
        debug!("POST {url}");

        let builder = match request {
            StreamRequest::Upload {
                file_name,
                content,
                remote_path,
            } => {
                let part = reqwest::multipart::Part::bytes(content).file_name(file_name);
                let form = reqwest::multipart::Form::new()
                    .text("path", remote_path)
                    .part("file", part);
                self.http.post(&url).multipart(form)
            }
            StreamRequest::Download { remote_path } => {
                self.http.post(&url).json(&PathBody { path: &remote_path })
            }
            StreamRequest::Inject(req) => self.http.post(&url).json(&req),
        };

        let resp = Self::check(builder.send().await?).await?;
        Ok(resp.bytes_stream().map_err(std::io::Error::other).boxed())
    }

    async fn mkdir(&self, path: &str) -> Result<(), FpbError> {
        let resp = self
            .http
            .post(self.url("/api/file/mkdir"))
            .json(&PathBody { path })
            .send()
            .await?;
        let ack: Ack = Self::check(resp).await?.json().await?;
        if ack.success {
            Ok(())
        } else {
            Err(FpbError::Other(
                ack.error.unwrap_or_else(|| format!("mkdir {path} failed")),
            ))
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
