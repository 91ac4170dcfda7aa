//! Terminal implementations of the workbench collaborators.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use fpb_core::{
    Confirm, OutputSink, ProgressSink, ProgressUpdate, Severity, SourceProvider, format_stats,
};

// ── Progress ─────────────────────────────────────────────────────

/// Prints one status line per progress update to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleProgress;

/// Render `update` as a single line.
pub fn progress_line(update: &ProgressUpdate) -> String {
    let mut line = String::new();
    if let Some(file) = &update.file {
        line.push_str(&format!(
            "[{}/{}] {} ",
            file.index + 1,
            file.count,
            file.relative_path
        ));
    }
    line.push_str(&format!(
        "{:5.1}% {}/{} B",
        update.percent, update.transferred, update.total
    ));
    if let Some(speed) = &update.speed {
        line.push_str(&format!("  {speed}"));
    }
    if let Some(eta) = &update.eta {
        line.push_str(&format!("  ETA {eta}"));
    }
    // Mid-transfer the loss rate is shown even when everything is zero.
    if let Some(stats) = update.stats.as_ref().and_then(|s| format_stats(s, true)) {
        line.push_str(&format!("  [{stats}]"));
    }
    line
}

impl ProgressSink for ConsoleProgress {
    fn on_stage(&self, stage: &str) {
        eprintln!("  > {stage}");
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        eprintln!("  {}", progress_line(update));
    }
}

// ── Output ───────────────────────────────────────────────────────

/// Prints `[SEVERITY] text` lines to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOutput;

impl OutputSink for ConsoleOutput {
    fn emit(&self, severity: Severity, text: &str) {
        println!("[{severity}] {text}");
    }
}

// ── Confirmation ─────────────────────────────────────────────────

/// Yes/no prompt on stdin, or a fixed "yes" with `--yes`.
#[derive(Debug, Clone, Copy)]
pub struct StdinConfirm {
    pub assume_yes: bool,
}

/// `y` / `yes` in any case; everything else is "no".
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("{prompt} [y/N] ");
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(_) => false,
        }
    }
}

// ── Source ───────────────────────────────────────────────────────

/// Patch source read from a file on disk.
#[derive(Debug, Clone)]
pub struct FileSource(pub PathBuf);

impl SourceProvider for FileSource {
    fn source(&self) -> Option<String> {
        std::fs::read_to_string(&self.0).ok()
    }
}

// ── Tests ────────────────────────────────────────────────────────
