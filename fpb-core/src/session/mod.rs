//! Session drivers: one request, one event stream, one outcome.
//!
//! Both session kinds share [`pump`], which reads frames until a `result`
//! arrives, the stream ends or the cancel gate trips, and [`ProgressTracker`],
//! which turns cumulative `progress` frames into sink notifications.

pub mod inject;
pub mod transfer;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;

use crate::cancel::SessionGuard;
use crate::client::{ByteStream, DeviceClient, StreamRequest};
use crate::codec::FrameCodec;
use crate::collab::{FilePosition, ProgressUpdate};
use crate::error::FpbError;
use crate::frame::{Frame, ProgressFrame, TransferStats};
use crate::stats::{RateWindow, format_eta, format_speed};

/// Open `request`, giving up as soon as the session is cancelled.
pub(crate) async fn open(
    client: &dyn DeviceClient,
    guard: &SessionGuard,
    request: StreamRequest,
) -> Result<ByteStream, FpbError> {
    tokio::select! {
        biased;
        _ = guard.cancelled() => Err(FpbError::Cancelled),
        body = client.open_stream(request) => body,
    }
}

/// Consume `body` until it yields a `result` frame.
///
/// Every read races the guard's cancellation, and the gate is checked again
/// once a frame arrives, so after a cancel no further frame reaches
/// `on_frame` and a stalled body does not hold the session open. Returns
/// [`FpbError::Cancelled`] in that case and [`FpbError::StreamEnded`] when the
/// body finishes without a result.
pub(crate) async fn pump<R, F>(
    body: ByteStream,
    guard: &SessionGuard,
    mut on_frame: F,
) -> Result<R, FpbError>
where
    R: DeserializeOwned,
    F: FnMut(Frame<R>),
{
    let mut frames = FramedRead::new(StreamReader::new(body), FrameCodec::<R>::new());
    loop {
        let next = tokio::select! {
            biased;
            _ = guard.cancelled() => return Err(FpbError::Cancelled),
            next = frames.next() => next,
        };
        // A cancel may land while the read completes.
        guard.check()?;
        match next {
            Some(Ok(Frame::Result(result))) => return Ok(result),
            Some(Ok(Frame::Unknown)) => continue,
            Some(Ok(frame)) => on_frame(frame),
            Some(Err(FpbError::Io(e))) => return Err(FpbError::Connection(e.to_string())),
            Some(Err(e)) => return Err(e),
            None => return Err(FpbError::StreamEnded),
        }
    }
}

// ── ProgressTracker ──────────────────────────────────────────────

/// Rate window plus the most recent link statistics of one session.
#[derive(Debug, Default)]
pub(crate) struct ProgressTracker {
    window: RateWindow,
    stats: Option<TransferStats>,
    file: Option<FilePosition>,
}

impl ProgressTracker {
    pub(crate) fn new(file: Option<FilePosition>) -> Self {
        Self {
            file,
            ..Self::default()
        }
    }

    pub(crate) fn stats(&self) -> Option<TransferStats> {
        self.stats
    }

    /// Record `frame` and build the matching notification.
    pub(crate) fn update(&mut self, frame: &ProgressFrame) -> ProgressUpdate {
        self.window.record(frame.transferred, frame.total);
        if frame.stats.is_some() {
            self.stats = frame.stats;
        }

        let rate = self.window.rate();
        ProgressUpdate {
            transferred: frame.transferred,
            total: frame.total,
            percent: frame.percent(),
            speed: rate.map(format_speed),
            eta: self.window.eta().map(format_eta),
            stats: self.stats,
            file: self.file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_has_no_speed() {
        let mut t = ProgressTracker::new(None);
        let u = t.update(&ProgressFrame {
            transferred: 10,
            total: 100,
            percent: None,
            stats: None,
        });
        assert_eq!(u.percent, 10.0);
        assert!(u.speed.is_none());
        assert!(u.eta.is_none());
    }

    #[test]
    fn stats_persist_between_frames() {
        let mut t = ProgressTracker::new(None);
        let stats = TransferStats {
            retry_count: 1,
            ..Default::default()
        };
        t.update(&ProgressFrame {
            transferred: 10,
            total: 100,
            percent: None,
            stats: Some(stats),
        });
        let u = t.update(&ProgressFrame {
            transferred: 20,
            total: 100,
            percent: None,
            stats: None,
        });
        assert_eq!(u.stats, Some(stats));
        assert!(u.speed.is_some());
    }

    // ── pump over a live body ────────────────────────────────────

    use std::time::Duration;

    use bytes::Bytes;
    use futures::channel::mpsc;

    use crate::cancel::{CancelGate, Category};
    use crate::frame::TransferResult;

    type Chunk = Result<Bytes, std::io::Error>;

    fn progress(transferred: u64) -> Chunk {
        Ok(Bytes::from(format!(
            "data: {{\"type\":\"progress\",\"uploaded\":{transferred},\"total\":100}}\n"
        )))
    }

    /// Run `pump` on its own task over a channel-fed body. Every dispatched
    /// progress value is forwarded to the returned receiver.
    fn spawn_pump(
        guard: SessionGuard,
    ) -> (
        mpsc::UnboundedSender<Chunk>,
        tokio::sync::mpsc::UnboundedReceiver<u64>,
        tokio::task::JoinHandle<Result<TransferResult, FpbError>>,
    ) {
        let (body_tx, body_rx) = mpsc::unbounded::<Chunk>();
        let (seen_tx, seen_rx) = tokio::sync::mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            pump::<TransferResult, _>(body_rx.boxed(), &guard, |frame| {
                if let Frame::Progress(p) = frame {
                    let _ = seen_tx.send(p.transferred);
                }
            })
            .await
        });
        (body_tx, seen_rx, task)
    }

    #[tokio::test]
    async fn frame_arriving_after_cancel_is_not_dispatched() {
        let gate = CancelGate::new();
        let (body, mut seen, task) = spawn_pump(gate.begin(Category::Transfer));

        body.unbounded_send(progress(10)).unwrap();
        assert_eq!(seen.recv().await, Some(10));

        // The pump is now waiting on the body.
        assert!(gate.cancel(Category::Transfer));
        body.unbounded_send(progress(20)).unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(FpbError::Cancelled)));
        assert_eq!(seen.recv().await, None);
    }

    #[tokio::test]
    async fn cancel_unblocks_a_stalled_body() {
        let gate = CancelGate::new();
        let (body, mut seen, task) = spawn_pump(gate.begin(Category::Transfer));

        body.unbounded_send(progress(10)).unwrap();
        assert_eq!(seen.recv().await, Some(10));
        gate.cancel(Category::Transfer);

        // The sender stays open: nothing else will ever arrive.
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("cancelled session should resolve")
            .unwrap();
        assert!(matches!(result, Err(FpbError::Cancelled)));
        assert!(!gate.is_in_progress(Category::Transfer));
        drop(body);
    }
}
