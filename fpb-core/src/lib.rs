//! # fpb-core
//!
//! Streaming transfer and code-injection client for the fpb device server.
//!
//! This crate contains:
//! - **Frames**: `Frame`, the `status` / `progress` / `result` event vocabulary
//! - **Codec**: `FrameCodec`, a `tokio_util` decoder for `data:` event lines
//! - **Stats**: `RateWindow` plus speed / ETA / link-quality formatting
//! - **Sessions**: `TransferSession` and `InjectionSession`, one outcome each
//! - **Walk**: `walk_dir`, folder expansion for folder uploads
//! - **Cancel**: `CancelGate`, cooperative per-category cancellation
//! - **Client**: `DeviceClient` trait and its HTTP implementation
//! - **Workbench**: the `start_*` / `cancel` / `is_in_progress` entry points
//! - **Error**: `FpbError`, a `thiserror`-based error hierarchy

pub mod cancel;
pub mod client;
pub mod codec;
pub mod collab;
pub mod error;
pub mod frame;
pub mod session;
pub mod stats;
pub mod walk;
pub mod workbench;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use cancel::{CancelGate, Category, SessionGuard};
pub use client::{
    ByteStream, DeviceClient, DeviceStatus, HttpDeviceClient, InjectRequest, SlotInfo,
    StreamRequest,
};
pub use codec::{DecodeState, FrameCodec};
pub use collab::{
    Confirm, DeviceLink, FilePosition, FixedAnswer, NullProgress, OutputSink, ProgressSink,
    ProgressUpdate, Severity, SlotTable, SourceProvider, TracingOutput,
};
pub use error::FpbError;
pub use frame::{
    Frame, FunctionInjection, InjectionResult, ProgressFrame, StatusFrame, TransferResult,
    TransferStats,
};
pub use session::inject::{InjectOptions, InjectionOutcome, InjectionSession, Preconditions};
pub use session::transfer::{TransferKind, TransferOutcome, TransferSession};
pub use stats::{ProgressSample, RateWindow, format_eta, format_speed, format_stats};
pub use walk::{FileWorkItem, SkippedEntry, WalkReport, walk_dir};
pub use workbench::{FolderOutcome, Workbench};
