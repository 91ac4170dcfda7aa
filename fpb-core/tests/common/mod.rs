//! Shared test doubles: a scripted in-memory device and recording sinks.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::channel::mpsc;

use fpb_core::{
    ByteStream, Confirm, DeviceClient, DeviceLink, FixedAnswer, FpbError, OutputSink,
    ProgressSink, ProgressUpdate, Severity, SlotTable, SourceProvider, StreamRequest, Workbench,
};

// ── Scripted device ──────────────────────────────────────────────

/// What the device answers to the next streaming request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Body delivered as these exact chunks.
    Chunks(Vec<Bytes>),
    /// Body whose final read fails.
    Broken(Vec<Bytes>),
    /// The request cannot be opened.
    Refused(String),
    /// Body fed chunk by chunk through a [`LiveBody`]; stays open until the
    /// sender is dropped.
    Live(Arc<Mutex<Option<mpsc::UnboundedReceiver<Result<Bytes, std::io::Error>>>>>),
}

impl Reply {
    /// Whole body in one chunk.
    pub fn body(text: &str) -> Self {
        Self::Chunks(vec![Bytes::copy_from_slice(text.as_bytes())])
    }
}

impl Reply {
    /// A reply whose body the test writes while the session runs.
    pub fn live() -> (LiveBody, Self) {
        let (tx, rx) = mpsc::unbounded();
        (LiveBody(tx), Self::Live(Arc::new(Mutex::new(Some(rx)))))
    }
}

/// Writing end of a [`Reply::Live`] body.
pub struct LiveBody(mpsc::UnboundedSender<Result<Bytes, std::io::Error>>);

impl LiveBody {
    /// Send one `data:` line carrying `json`.
    pub fn frame(&self, json: &str) {
        self.0
            .unbounded_send(Ok(Bytes::from(format!("data: {json}\n"))))
            .unwrap();
    }
}

pub const UPLOAD_OK: &str = "data: {\"type\":\"result\",\"success\":true}\n";

/// In-memory [`DeviceClient`] that replays queued replies and records every
/// request it sees.
#[derive(Default)]
pub struct MockDevice {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    /// When set, injection requests take this instead of the queue.
    inject_reply: Mutex<Option<Reply>>,
    pub requests: Mutex<Vec<StreamRequest>>,
    pub mkdirs: Mutex<Vec<String>>,
}

impl MockDevice {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        })
    }

    /// Answer every request with `reply`.
    pub fn always(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            fallback: Some(reply),
            ..Self::default()
        })
    }

    /// Answer transfers with `transfer` and injections with `inject`,
    /// whatever order the requests arrive in.
    pub fn routed(transfer: Reply, inject: Reply) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from([transfer])),
            inject_reply: Mutex::new(Some(inject)),
            ..Self::default()
        })
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn mkdirs(&self) -> Vec<String> {
        self.mkdirs.lock().unwrap().clone()
    }

    /// Remote paths of every upload request, in order.
    pub fn upload_paths(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                StreamRequest::Upload { remote_path, .. } => Some(remote_path),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl DeviceClient for MockDevice {
    async fn open_stream(&self, request: StreamRequest) -> Result<ByteStream, FpbError> {
        let routed = match request {
            StreamRequest::Inject(_) => self.inject_reply.lock().unwrap().take(),
            _ => None,
        };
        self.requests.lock().unwrap().push(request);
        let reply = routed
            .or_else(|| self.replies.lock().unwrap().pop_front())
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| Reply::Refused("no scripted reply".into()));

        match reply {
            Reply::Chunks(chunks) => Ok(futures::stream::iter(chunks.into_iter().map(Ok)).boxed()),
            Reply::Broken(chunks) => {
                let items = chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(std::io::Error::other("connection reset"))));
                Ok(futures::stream::iter(items).boxed())
            }
            Reply::Refused(msg) => Err(FpbError::Connection(msg)),
            Reply::Live(rx) => match rx.lock().unwrap().take() {
                Some(rx) => Ok(rx.boxed()),
                None => Err(FpbError::Connection("live body already taken".into())),
            },
        }
    }

    async fn mkdir(&self, path: &str) -> Result<(), FpbError> {
        self.mkdirs.lock().unwrap().push(path.to_string());
        Ok(())
    }
}

// ── Sinks ────────────────────────────────────────────────────────

/// Records every progress update and stage label.
#[derive(Default)]
pub struct RecordingProgress {
    pub updates: Mutex<Vec<ProgressUpdate>>,
    pub stages: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn stages(&self) -> Vec<String> {
        self.stages.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn on_stage(&self, stage: &str) {
        self.stages.lock().unwrap().push(stage.to_string());
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        self.updates.lock().unwrap().push(update.clone());
    }
}

#[derive(Default)]
pub struct RecordingOutput {
    pub lines: Mutex<Vec<(Severity, String)>>,
}

impl RecordingOutput {
    pub fn lines(&self) -> Vec<(Severity, String)> {
        self.lines.lock().unwrap().clone()
    }
}

impl OutputSink for RecordingOutput {
    fn emit(&self, severity: Severity, text: &str) {
        self.lines.lock().unwrap().push((severity, text.to_string()));
    }
}

// ── Preconditions ────────────────────────────────────────────────

pub struct Link(pub bool);

impl DeviceLink for Link {
    fn is_connected(&self) -> bool {
        self.0
    }
}

pub struct Slots(pub usize);

impl SlotTable for Slots {
    fn free_slots(&self) -> usize {
        self.0
    }
}

pub struct Editor(pub Option<String>);

impl SourceProvider for Editor {
    fn source(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Counts prompts so tests can assert whether one was shown.
#[derive(Default)]
pub struct CountingConfirm {
    pub answer: bool,
    pub asked: Mutex<usize>,
}

impl Confirm for CountingConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        *self.asked.lock().unwrap() += 1;
        self.answer
    }
}

/// A connected workbench with one free slot and some source in the editor.
pub fn workbench(device: Arc<MockDevice>) -> (Workbench, Arc<RecordingOutput>) {
    let output = Arc::new(RecordingOutput::default());
    let bench = Workbench::new(
        device,
        Arc::new(Link(true)),
        Arc::new(Slots(1)),
        Arc::new(FixedAnswer(false)),
        Arc::new(Editor(Some("void patch(void) {}".into()))),
        output.clone(),
    );
    (bench, output)
}

/// Concatenate `data:` lines for the given JSON payloads.
pub fn sse(frames: &[&str]) -> String {
    frames.iter().map(|f| format!("data: {f}\n\n")).collect()
}
