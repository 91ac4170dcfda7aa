//! Throughput and ETA estimation for streamed transfers.
//!
//! Keeps only the two most recent cumulative samples and derives the
//! instantaneous rate from them. Formatting helpers turn the numbers into the
//! short labels shown next to a progress bar.

use std::time::{Duration, Instant};

use crate::frame::TransferStats;

/// Lower bound on the interval between two samples.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

// ── ProgressSample ───────────────────────────────────────────────

/// A cumulative progress reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub transferred: u64,
    pub total: u64,
    pub at: Instant,
}

impl ProgressSample {
    pub fn new(transferred: u64, total: u64, at: Instant) -> Self {
        Self {
            transferred,
            total,
            at,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.transferred)
    }
}

// ── RateWindow ───────────────────────────────────────────────────

/// Two-sample window: current and previous.
#[derive(Debug, Clone, Default)]
pub struct RateWindow {
    current: Option<ProgressSample>,
    previous: Option<ProgressSample>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample taken now.
    pub fn record(&mut self, transferred: u64, total: u64) {
        self.record_at(ProgressSample::new(transferred, total, Instant::now()));
    }

    /// Record with an explicit timestamp (useful for testing).
    pub fn record_at(&mut self, sample: ProgressSample) {
        self.previous = self.current.replace(sample);
    }

    pub fn current(&self) -> Option<&ProgressSample> {
        self.current.as_ref()
    }

    /// Bytes per second between the two retained samples.
    ///
    /// `None` until two samples exist; callers must then hide speed and ETA.
    pub fn rate(&self) -> Option<f64> {
        let (cur, prev) = (self.current?, self.previous?);
        let dt = cur.at.saturating_duration_since(prev.at).max(MIN_INTERVAL);
        let delta = cur.transferred.saturating_sub(prev.transferred);
        Some(delta as f64 / dt.as_secs_f64())
    }

    /// Seconds left at the current rate. Only defined for a positive rate.
    pub fn eta(&self) -> Option<f64> {
        let rate = self.rate().filter(|r| *r > 0.0)?;
        let cur = self.current?;
        Some(cur.remaining() as f64 / rate)
    }
}

// ── Formatting ───────────────────────────────────────────────────

/// Render a byte rate with binary thresholds: `B/s`, `KB/s` or `MB/s`.
pub fn format_speed(bytes_per_sec: f64) -> String {
    let bytes = bytes_per_sec.max(0.0);
    // Thresholds apply to the figure as printed.
    if bytes.round() < KIB {
        format!("{bytes:.0} B/s")
    } else if (bytes / KIB * 10.0).round() / 10.0 < KIB {
        format!("{:.1} KB/s", bytes / KIB)
    } else {
        format!("{:.2} MB/s", bytes / MIB)
    }
}

/// Render remaining seconds as `<1s`, `Ns`, `MmSs` or `HhMm`.
pub fn format_eta(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 1.0 {
        return "<1s".to_string();
    }
    let secs = seconds.round() as u64;
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Render link-quality counters.
///
/// With `force` unset an all-zero block renders as `None`, so a failure alert
/// can omit it. A forced panel always shows at least the loss rate.
pub fn format_stats(stats: &TransferStats, force: bool) -> Option<String> {
    if stats.is_clean() && !force {
        return None;
    }
    let mut parts = vec![format!("loss {:.1}%", stats.packet_loss_rate_percent)];
    if stats.retry_count > 0 {
        parts.push(format!("retries {}", stats.retry_count));
    }
    if stats.crc_error_count > 0 {
        parts.push(format!("CRC errors {}", stats.crc_error_count));
    }
    if stats.timeout_error_count > 0 {
        parts.push(format!("timeouts {}", stats.timeout_error_count));
    }
    Some(parts.join(", "))
}

// ── Tests ────────────────────────────────────────────────────────
