//! Upload and download sessions.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};

use crate::cancel::SessionGuard;
use crate::client::{DeviceClient, StreamRequest, join_remote};
use crate::collab::{FilePosition, ProgressSink};
use crate::error::FpbError;
use crate::frame::{Frame, TransferResult, TransferStats};
use crate::session::{ProgressTracker, open, pump};

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Upload,
    Download,
}

// ── TransferOutcome ──────────────────────────────────────────────

/// Terminal record of one transfer session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub stats: Option<TransferStats>,
    /// File content; only set for completed downloads.
    pub payload: Option<Vec<u8>>,
}

impl TransferOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        !self.success && self.error.as_deref() == Some("cancelled")
    }
}

impl From<FpbError> for TransferOutcome {
    fn from(e: FpbError) -> Self {
        Self::failed(e.to_string())
    }
}

// ── TransferSession ──────────────────────────────────────────────

/// Drives one upload or download.
///
/// The caller owns the [`SessionGuard`]; a folder upload runs many sessions
/// under a single guard.
pub struct TransferSession<'a> {
    client: &'a dyn DeviceClient,
    guard: &'a SessionGuard,
    progress: &'a dyn ProgressSink,
    file: Option<FilePosition>,
}

impl<'a> TransferSession<'a> {
    pub fn new(
        client: &'a dyn DeviceClient,
        guard: &'a SessionGuard,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            client,
            guard,
            progress,
            file: None,
        }
    }

    /// Tag every progress notification with the file's position in a batch.
    pub fn with_file(mut self, file: FilePosition) -> Self {
        self.file = Some(file);
        self
    }

    /// Upload `local` into the remote directory `remote_dir`.
    pub async fn upload(self, local: &Path, remote_dir: &str) -> TransferOutcome {
        let Some(name) = local.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return TransferOutcome::failed("No file selected");
        };
        let remote_path = join_remote(remote_dir, &name);
        self.upload_to(local, &remote_path).await
    }

    /// Upload `local` to the exact remote path `remote_path`.
    pub async fn upload_to(self, local: &Path, remote_path: &str) -> TransferOutcome {
        let content = match read_local(local).await {
            Ok(c) => c,
            Err(e) => return e.into(),
        };
        let file_name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.upload_bytes(file_name, content, remote_path).await
    }

    /// Upload an in-memory buffer.
    pub async fn upload_bytes(
        self,
        file_name: String,
        content: Vec<u8>,
        remote_path: &str,
    ) -> TransferOutcome {
        info!("upload {} bytes -> {remote_path}", content.len());
        let request = StreamRequest::Upload {
            file_name,
            content,
            remote_path: remote_path.to_string(),
        };
        self.run(TransferKind::Upload, request).await
    }

    /// Download `remote_path`; the content lands in `payload`.
    pub async fn download(self, remote_path: &str) -> TransferOutcome {
        info!("download {remote_path}");
        let request = StreamRequest::Download {
            remote_path: remote_path.to_string(),
        };
        self.run(TransferKind::Download, request).await
    }

    async fn run(self, kind: TransferKind, request: StreamRequest) -> TransferOutcome {
        if let Err(e) = self.guard.check() {
            return e.into();
        }

        let body = match open(self.client, self.guard, request).await {
            Ok(body) => body,
            Err(e) => return e.into(),
        };

        let progress = self.progress;
        let mut tracker = ProgressTracker::new(self.file);
        let result = pump::<TransferResult, _>(body, self.guard, |frame| match frame {
            Frame::Status(status) => progress.on_stage(status.label()),
            Frame::Progress(p) => progress.on_progress(&tracker.update(&p)),
            Frame::Result(_) | Frame::Unknown => {}
        })
        .await;

        let outcome = match result {
            Ok(result) => finish(kind, result, tracker.stats()),
            Err(e) => TransferOutcome {
                stats: tracker.stats(),
                ..e.into()
            },
        };
        debug!(
            "{kind:?} finished: success={} error={:?}",
            outcome.success, outcome.error
        );
        outcome
    }
}

/// Read a local file, mapping "nothing there" to a precondition failure.
async fn read_local(path: &Path) -> Result<Vec<u8>, FpbError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(tokio::fs::read(path).await?),
        _ => Err(FpbError::Precondition(format!(
            "No file selected: {}",
            path.display()
        ))),
    }
}

/// Build the outcome from a `result` frame.
fn finish(
    kind: TransferKind,
    result: TransferResult,
    running: Option<TransferStats>,
) -> TransferOutcome {
    let stats = result.stats.or(running);
    if !result.success {
        return TransferOutcome {
            success: false,
            error: Some(
                result
                    .error
                    .or(result.message)
                    .unwrap_or_else(|| "Transfer failed".to_string()),
            ),
            stats,
            payload: None,
        };
    }

    let payload = match kind {
        TransferKind::Upload => None,
        TransferKind::Download => match decode_payload(result.data.as_deref()) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                return TransferOutcome {
                    stats,
                    ..e.into()
                };
            }
        },
    };

    TransferOutcome {
        success: true,
        error: None,
        stats,
        payload,
    }
}

fn decode_payload(data: Option<&str>) -> Result<Vec<u8>, FpbError> {
    let data = data.ok_or_else(|| {
        FpbError::ProtocolViolation("download result carried no data".to_string())
    })?;
    Ok(STANDARD.decode(data.trim())?)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_prefers_error_then_message() {
        let r = TransferResult {
            success: false,
            message: Some("disk full".into()),
            ..Default::default()
        };
        let o = finish(TransferKind::Upload, r, None);
        assert_eq!(o.error.as_deref(), Some("disk full"));

        let o = finish(TransferKind::Upload, TransferResult::default(), None);
        assert_eq!(o.error.as_deref(), Some("Transfer failed"));
    }

    #[test]
    fn download_payload_is_base64_decoded() {
        let r = TransferResult {
            success: true,
            data: Some("aGVsbG8=".into()),
            ..Default::default()
        };
        let o = finish(TransferKind::Download, r, None);
        assert!(o.success);
        assert_eq!(o.payload.as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn download_without_data_fails() {
        let r = TransferResult {
            success: true,
            ..Default::default()
        };
        let o = finish(TransferKind::Download, r, None);
        assert!(!o.success);
        assert!(o.error.unwrap().contains("no data"));
    }

    #[test]
    fn running_stats_fill_in_when_result_has_none() {
        let running = TransferStats {
            crc_error_count: 2,
            ..Default::default()
        };
        let r = TransferResult {
            success: true,
            ..Default::default()
        };
        let o = finish(TransferKind::Upload, r, Some(running));
        assert_eq!(o.stats, Some(running));
        assert!(o.payload.is_none());
    }

    #[test]
    fn cancelled_outcome_is_recognised() {
        let o: TransferOutcome = FpbError::Cancelled.into();
        assert!(o.is_cancelled());
        assert!(!TransferOutcome::failed("boom").is_cancelled());
    }
}
