//! Seams to the surrounding application.
//!
//! Sessions never reach for ambient UI state. Everything they read or report
//! goes through one of these traits, passed in explicitly.

use std::fmt;

use crate::frame::TransferStats;

// ── Progress ─────────────────────────────────────────────────────

/// Position of the current file inside a multi-file operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePosition {
    /// Zero-based index of the file being transferred.
    pub index: usize,
    pub count: usize,
    pub relative_path: String,
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub transferred: u64,
    pub total: u64,
    pub percent: f64,
    /// Formatted speed; `None` until a rate can be computed.
    pub speed: Option<String>,
    /// Formatted ETA; `None` unless the rate is positive.
    pub eta: Option<String>,
    /// Running link statistics, if the device reported any.
    pub stats: Option<TransferStats>,
    /// Set during folder uploads.
    pub file: Option<FilePosition>,
}

/// Receives progress from a running session, on the session's own task.
pub trait ProgressSink: Send + Sync {
    /// A stage label from a `status` frame.
    fn on_stage(&self, _stage: &str) {}

    fn on_progress(&self, update: &ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn on_progress(&self, update: &ProgressUpdate) {
        self(update)
    }
}

/// Sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}

// ── Output ───────────────────────────────────────────────────────

/// Severity tag attached to output lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Terminal/log collaborator. Receives plain text only.
pub trait OutputSink: Send + Sync {
    fn emit(&self, severity: Severity, text: &str);
}

/// Forwards output lines to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingOutput;

impl OutputSink for TracingOutput {
    fn emit(&self, severity: Severity, text: &str) {
        match severity {
            Severity::Info | Severity::Success => tracing::info!("{text}"),
            Severity::Warning => tracing::warn!("{text}"),
            Severity::Error => tracing::error!("{text}"),
        }
    }
}

// ── Preconditions ────────────────────────────────────────────────

/// Synchronous yes/no prompt.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answers every prompt the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

/// "Is a device currently connected?"
pub trait DeviceLink: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Patch slot occupancy on the target.
pub trait SlotTable: Send + Sync {
    fn free_slots(&self) -> usize;
}

/// The text of the active editor, if any.
pub trait SourceProvider: Send + Sync {
    fn source(&self) -> Option<String>;
}
