//! Compile-and-inject sessions.
//!
//! The device server compiles the supplied source, uploads the binary into a
//! patch slot and reports through the same event stream as file transfers:
//! `status` frames name the stage, `progress` frames count bytes of the
//! injected binary, and the `result` frame describes what landed where.

use tracing::{debug, info};

use crate::cancel::SessionGuard;
use crate::client::{DeviceClient, InjectRequest, StreamRequest};
use crate::collab::{Confirm, DeviceLink, OutputSink, ProgressSink, Severity, SlotTable, SourceProvider};
use crate::error::FpbError;
use crate::frame::{Frame, FunctionInjection, InjectionResult};
use crate::session::{ProgressTracker, open, pump};

/// Default patch mode understood by the device server.
pub const DEFAULT_PATCH_MODE: &str = "trampoline";

// ── InjectOptions ────────────────────────────────────────────────

/// Caller-selected parameters of one injection.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectOptions {
    /// Function to replace; `None` lets the server pick from the source.
    pub target_func: Option<String>,
    pub patch_mode: String,
    /// Inject every patch function found in the source.
    pub inject_all: bool,
    /// Explicit slot; `None` lets the server choose a free one.
    pub slot: Option<u32>,
}

impl Default for InjectOptions {
    fn default() -> Self {
        Self {
            target_func: None,
            patch_mode: DEFAULT_PATCH_MODE.to_string(),
            inject_all: true,
            slot: None,
        }
    }
}

// ── InjectionOutcome ─────────────────────────────────────────────

/// Terminal record of one injection session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InjectionOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub target_func: Option<String>,
    pub inject_func: Option<String>,
    pub target_addr: Option<String>,
    pub inject_addr: Option<String>,
    pub slot: Option<u32>,
    /// Seconds spent compiling.
    pub compile_time: Option<f64>,
    /// Seconds spent uploading the binary.
    pub upload_time: Option<f64>,
    pub code_size: Option<u64>,
    /// Per-function outcomes of a multi-function injection.
    pub functions: Vec<FunctionInjection>,
}

impl InjectionOutcome {
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

    /// One-line description for the output sink.
    pub fn summary(&self) -> String {
        if !self.success {
            return format!(
                "Injection failed: {}",
                self.error.as_deref().unwrap_or("unknown error")
            );
        }
        if !self.functions.is_empty() {
            let ok = self.functions.iter().filter(|f| f.success).count();
            return format!("Injected {ok}/{} functions", self.functions.len());
        }

        let mut text = format!(
            "Injected {}",
            self.target_func.as_deref().unwrap_or("patch")
        );
        if let Some(slot) = self.slot {
            text.push_str(&format!(" into slot {slot}"));
        }
        if let Some(size) = self.code_size {
            text.push_str(&format!(": {size} bytes"));
        }
        if let (Some(c), Some(u)) = (self.compile_time, self.upload_time) {
            text.push_str(&format!(" (compile {c:.2}s, upload {u:.2}s)"));
        }
        text
    }
}

impl From<FpbError> for InjectionOutcome {
    fn from(e: FpbError) -> Self {
        Self::failed(e.to_string())
    }
}

impl From<InjectionResult> for InjectionOutcome {
    fn from(r: InjectionResult) -> Self {
        let error = if r.success {
            None
        } else {
            Some(r.error.unwrap_or_else(|| "Injection failed".to_string()))
        };
        Self {
            success: r.success,
            error,
            target_func: r.target_func,
            inject_func: r.inject_func,
            target_addr: r.target_addr,
            inject_addr: r.inject_addr,
            slot: r.slot,
            compile_time: r.compile_time,
            upload_time: r.upload_time,
            code_size: r.code_size,
            functions: r.injections,
        }
    }
}

// ── Preconditions ────────────────────────────────────────────────

/// Everything an injection checks before it touches the network.
pub struct Preconditions<'a> {
    pub link: &'a dyn DeviceLink,
    pub slots: &'a dyn SlotTable,
    pub confirm: &'a dyn Confirm,
    pub source: &'a dyn SourceProvider,
}

impl Preconditions<'_> {
    /// Check connection, slot availability and source text, in that order.
    ///
    /// Returns the source text to inject.
    pub fn check(&self) -> Result<String, FpbError> {
        if !self.link.is_connected() {
            return Err(FpbError::Precondition("Device not connected".into()));
        }
        if self.slots.free_slots() == 0
            && !self
                .confirm
                .confirm("All patch slots are occupied. Overwrite an existing patch?")
        {
            return Err(FpbError::Precondition(
                "All patch slots are occupied and overwrite was not confirmed".into(),
            ));
        }
        match self.source.source() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(FpbError::Precondition(
                "No source code available in the active editor".into(),
            )),
        }
    }
}

// ── InjectionSession ─────────────────────────────────────────────

/// Drives one compile-and-inject request.
pub struct InjectionSession<'a> {
    client: &'a dyn DeviceClient,
    guard: &'a SessionGuard,
    progress: &'a dyn ProgressSink,
    output: &'a dyn OutputSink,
}

impl<'a> InjectionSession<'a> {
    pub fn new(
        client: &'a dyn DeviceClient,
        guard: &'a SessionGuard,
        progress: &'a dyn ProgressSink,
        output: &'a dyn OutputSink,
    ) -> Self {
        Self {
            client,
            guard,
            progress,
            output,
        }
    }

    /// Check `pre`, then inject. A failed precondition makes no network call.
    pub async fn run(self, pre: &Preconditions<'_>, options: InjectOptions) -> InjectionOutcome {
        match pre.check() {
            Ok(source) => self.inject(source, options).await,
            Err(e) => e.into(),
        }
    }

    /// Inject `source` without precondition checks.
    pub async fn inject(self, source: String, options: InjectOptions) -> InjectionOutcome {
        if let Err(e) = self.guard.check() {
            return e.into();
        }

        info!(
            "inject {} ({} bytes of source, mode {})",
            options.target_func.as_deref().unwrap_or("<all>"),
            source.len(),
            options.patch_mode
        );
        let request = StreamRequest::Inject(InjectRequest {
            source_content: source,
            patch_mode: options.patch_mode,
            target_func: options.target_func,
            inject_all: options.inject_all,
            slot: options.slot,
        });

        let body = match open(self.client, self.guard, request).await {
            Ok(body) => body,
            Err(e) => return e.into(),
        };

        let (progress, output) = (self.progress, self.output);
        let mut tracker = ProgressTracker::new(None);
        let result = pump::<InjectionResult, _>(body, self.guard, |frame| match frame {
            Frame::Status(status) => {
                progress.on_stage(&status.stage);
                output.emit(Severity::Info, status.label());
            }
            Frame::Progress(p) => progress.on_progress(&tracker.update(&p)),
            Frame::Result(_) | Frame::Unknown => {}
        })
        .await;

        let outcome: InjectionOutcome = match result {
            Ok(result) => result.into(),
            Err(e) => e.into(),
        };
        debug!(
            "injection finished: success={} error={:?}",
            outcome.success, outcome.error
        );
        outcome
    }
}

// ── Tests ────────────────────────────────────────────────────────
