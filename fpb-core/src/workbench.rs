//! Entry points exposed to the application.
//!
//! A [`Workbench`] owns the injected collaborators and the shared
//! [`CancelGate`]. Each `start_*` call opens a session of its category,
//! resolves to exactly one outcome and reports a one-line summary to the
//! output sink. Cancellations are reported quietly.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::cancel::{CancelGate, Category};
use crate::client::{DeviceClient, join_remote};
use crate::collab::{
    Confirm, DeviceLink, FilePosition, OutputSink, ProgressSink, Severity, SlotTable,
    SourceProvider,
};
use crate::error::FpbError;
use crate::session::inject::{InjectOptions, InjectionOutcome, InjectionSession, Preconditions};
use crate::session::transfer::{TransferOutcome, TransferSession};
use crate::stats::format_stats;
use crate::walk::{SkippedEntry, walk_dir};

// ── FolderOutcome ────────────────────────────────────────────────

/// Terminal record of a folder upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderOutcome {
    /// Remote paths written successfully.
    pub uploaded: Vec<String>,
    /// `(remote path, error)` of every file that failed.
    pub failed: Vec<(String, String)>,
    /// Local entries the walk could not read.
    pub skipped: Vec<SkippedEntry>,
    pub directories_created: Vec<String>,
    pub cancelled: bool,
    /// Set when the upload could not start at all.
    pub error: Option<String>,
}

impl FolderOutcome {
    pub fn success(&self) -> bool {
        self.error.is_none() && !self.cancelled && self.failed.is_empty()
    }

    fn aborted(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

// ── Workbench ────────────────────────────────────────────────────

/// Collaborators and shared state behind the session entry points.
pub struct Workbench {
    client: Arc<dyn DeviceClient>,
    link: Arc<dyn DeviceLink>,
    slots: Arc<dyn SlotTable>,
    confirm: Arc<dyn Confirm>,
    source: Arc<dyn SourceProvider>,
    output: Arc<dyn OutputSink>,
    gate: CancelGate,
}

impl Workbench {
    pub fn new(
        client: Arc<dyn DeviceClient>,
        link: Arc<dyn DeviceLink>,
        slots: Arc<dyn SlotTable>,
        confirm: Arc<dyn Confirm>,
        source: Arc<dyn SourceProvider>,
        output: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            client,
            link,
            slots,
            confirm,
            source,
            output,
            gate: CancelGate::new(),
        }
    }

    /// A handle to the gate, e.g. for a Ctrl-C handler on another task.
    pub fn gate(&self) -> CancelGate {
        self.gate.clone()
    }

    /// Cancel the running session of `category`; no-op when idle.
    pub fn cancel(&self, category: Category) -> bool {
        self.gate.cancel(category)
    }

    pub fn is_in_progress(&self, category: Category) -> bool {
        self.gate.is_in_progress(category)
    }

    fn ensure_connected(&self) -> Result<(), FpbError> {
        if self.link.is_connected() {
            Ok(())
        } else {
            Err(FpbError::Precondition("Device not connected".into()))
        }
    }

    fn report_transfer(&self, what: &str, outcome: &TransferOutcome) {
        if outcome.success {
            self.output.emit(Severity::Success, &format!("{what} complete"));
        } else if outcome.is_cancelled() {
            self.output.emit(Severity::Warning, &format!("{what} cancelled"));
        } else {
            let mut text = format!(
                "{what} failed: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            );
            if let Some(stats) = outcome.stats.as_ref().and_then(|s| format_stats(s, false)) {
                text.push_str(&format!(" [{stats}]"));
            }
            self.output.emit(Severity::Error, &text);
        }
    }

    // ── Transfers ────────────────────────────────────────────────

    /// Upload `local` into `remote_dir`.
    pub async fn start_upload(
        &self,
        local: &Path,
        remote_dir: &str,
        progress: &dyn ProgressSink,
    ) -> TransferOutcome {
        let guard = self.gate.begin(Category::Transfer);
        let outcome = match self.ensure_connected() {
            Ok(()) => {
                TransferSession::new(self.client.as_ref(), &guard, progress)
                    .upload(local, remote_dir)
                    .await
            }
            Err(e) => e.into(),
        };
        self.report_transfer(&format!("Upload of {}", local.display()), &outcome);
        outcome
    }

    /// Download `remote_path`; the content is in the outcome's `payload`.
    pub async fn start_download(
        &self,
        remote_path: &str,
        progress: &dyn ProgressSink,
    ) -> TransferOutcome {
        let guard = self.gate.begin(Category::Transfer);
        let outcome = match self.ensure_connected() {
            Ok(()) => {
                TransferSession::new(self.client.as_ref(), &guard, progress)
                    .download(remote_path)
                    .await
            }
            Err(e) => e.into(),
        };
        self.report_transfer(&format!("Download of {remote_path}"), &outcome);
        outcome
    }

    /// Upload the folder `local` and everything below it to
    /// `remote_root/<folder name>/...`.
    ///
    /// Remote subdirectories are created once each, right before the first
    /// file that needs them.
    pub async fn start_folder_upload(
        &self,
        local: &Path,
        remote_root: &str,
        progress: &dyn ProgressSink,
    ) -> FolderOutcome {
        let guard = self.gate.begin(Category::Transfer);
        if let Err(e) = self.ensure_connected() {
            self.output.emit(Severity::Error, &e.to_string());
            return FolderOutcome::aborted(e.to_string());
        }

        let root = local.to_path_buf();
        let report = match tokio::task::spawn_blocking(move || walk_dir(&root, None)).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                self.output.emit(Severity::Error, &e.to_string());
                return FolderOutcome::aborted(e.to_string());
            }
            Err(e) => return FolderOutcome::aborted(format!("folder scan failed: {e}")),
        };

        for skipped in &report.skipped {
            self.output
                .emit(Severity::Warning, &format!("Skipped: {}", skipped.reason));
        }
        info!(
            "folder upload: {} files, {} skipped",
            report.items.len(),
            report.skipped.len()
        );

        let mut outcome = FolderOutcome {
            skipped: report.skipped.clone(),
            ..FolderOutcome::default()
        };
        let mut ensured: HashSet<String> = HashSet::new();
        let count = report.items.len();

        for (index, item) in report.items.iter().enumerate() {
            if guard.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            for dir in item.parent_dirs() {
                let remote_dir = join_remote(remote_root, &dir);
                if !ensured.insert(remote_dir.clone()) {
                    continue;
                }
                match self.client.mkdir(&remote_dir).await {
                    Ok(()) => outcome.directories_created.push(remote_dir),
                    Err(e) => self
                        .output
                        .emit(Severity::Warning, &format!("mkdir {remote_dir}: {e}")),
                }
            }

            let remote_path = join_remote(remote_root, &item.relative_path);
            let position = FilePosition {
                index,
                count,
                relative_path: item.relative_path.clone(),
            };
            let result = TransferSession::new(self.client.as_ref(), &guard, progress)
                .with_file(position)
                .upload_to(&item.path, &remote_path)
                .await;

            if result.success {
                self.output.emit(
                    Severity::Info,
                    &format!("[{}/{count}] {remote_path}", index + 1),
                );
                outcome.uploaded.push(remote_path);
            } else if result.is_cancelled() {
                outcome.cancelled = true;
                break;
            } else {
                let error = result.error.unwrap_or_default();
                self.output
                    .emit(Severity::Error, &format!("{remote_path}: {error}"));
                outcome.failed.push((remote_path, error));
            }
        }

        let summary = format!(
            "Folder upload: {} uploaded, {} failed, {} skipped",
            outcome.uploaded.len(),
            outcome.failed.len(),
            outcome.skipped.len()
        );
        let severity = if outcome.success() && outcome.skipped.is_empty() {
            Severity::Success
        } else {
            Severity::Warning
        };
        self.output.emit(severity, &summary);
        outcome
    }

    // ── Injection ────────────────────────────────────────────────

    /// Compile and inject the active editor's source.
    pub async fn start_injection(
        &self,
        options: InjectOptions,
        progress: &dyn ProgressSink,
    ) -> InjectionOutcome {
        let guard = self.gate.begin(Category::Injection);
        let pre = Preconditions {
            link: self.link.as_ref(),
            slots: self.slots.as_ref(),
            confirm: self.confirm.as_ref(),
            source: self.source.as_ref(),
        };
        let outcome = InjectionSession::new(
            self.client.as_ref(),
            &guard,
            progress,
            self.output.as_ref(),
        )
        .run(&pre, options)
        .await;

        let severity = if outcome.success {
            Severity::Success
        } else if outcome.is_cancelled() {
            Severity::Warning
        } else {
            Severity::Error
        };
        self.output.emit(severity, &outcome.summary());
        outcome
    }
}
