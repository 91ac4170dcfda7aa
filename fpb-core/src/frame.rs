//! Streamed frame vocabulary — status, progress and result events.
//!
//! # Wire Protocol
//!
//! Every long-running operation answers with a single HTTP body in which each
//! logical line is one event:
//!
//! ```text
//! data: {"type":"status","stage":"compiling"}
//! data: {"type":"progress","uploaded":512,"total":2048,"percent":25}
//! data: {"type":"result","success":true,"compile_time":1.2,"code_size":256}
//! ```
//!
//! The `result` payload differs per operation, so [`Frame`] is generic over it:
//! transfers decode [`TransferResult`], injections decode [`InjectionResult`].
//! Unknown `type` values land in [`Frame::Unknown`] and are ignored by every
//! consumer.

use serde::{Deserialize, Deserializer, Serialize};

// ── Frame ─────────────────────────────────────────────────────────

/// One decoded protocol unit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame<R> {
    /// A human readable stage marker (`compiling`, `uploading`, ...).
    Status(StatusFrame),
    /// Cumulative byte counters.
    Progress(ProgressFrame),
    /// The terminal record of the operation.
    Result(R),
    /// Any `type` this client does not know about.
    #[serde(other)]
    Unknown,
}

impl<R> Frame<R> {
    /// Whether this is the terminal frame of a stream.
    pub fn is_result(&self) -> bool {
        matches!(self, Self::Result(_))
    }
}

/// Payload of a `status` frame.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusFrame {
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl StatusFrame {
    /// The text to show for this stage: the explicit message if the device
    /// sent one, the bare stage otherwise.
    pub fn label(&self) -> &str {
        match &self.message {
            Some(m) if !m.is_empty() => m,
            _ => &self.stage,
        }
    }
}

/// Payload of a `progress` frame.
///
/// Uploads report `uploaded`, downloads report `downloaded`; both land in
/// `transferred`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgressFrame {
    #[serde(default, rename = "uploaded", alias = "downloaded", alias = "transferred")]
    pub transferred: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub stats: Option<TransferStats>,
}

impl ProgressFrame {
    /// Percentage complete, preferring the device's own figure.
    pub fn percent(&self) -> f64 {
        match self.percent {
            Some(p) => p,
            None if self.total > 0 => self.transferred as f64 * 100.0 / self.total as f64,
            None => 0.0,
        }
    }
}

// ── TransferStats ─────────────────────────────────────────────────

/// Link-quality counters reported by the serial bridge.
///
/// All-zero means "no anomalies"; an absent value (`Option::None` at the
/// holder) means "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferStats {
    #[serde(default, alias = "retries")]
    pub retry_count: u32,
    #[serde(default, alias = "crc_errors")]
    pub crc_error_count: u32,
    #[serde(default, alias = "timeout_errors")]
    pub timeout_error_count: u32,
    #[serde(default, alias = "packet_loss_rate")]
    pub packet_loss_rate_percent: f64,
}

impl TransferStats {
    /// True when every counter is exactly zero.
    pub fn is_clean(&self) -> bool {
        self.retry_count == 0
            && self.crc_error_count == 0
            && self.timeout_error_count == 0
            && self.packet_loss_rate_percent == 0.0
    }
}

// ── Results ───────────────────────────────────────────────────────

/// `result` payload of an upload or download stream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransferResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stats: Option<TransferStats>,
    /// Base64 file content; only present on completed downloads.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// `result` payload of an injection stream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InjectionResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub target_func: Option<String>,
    #[serde(default)]
    pub inject_func: Option<String>,
    #[serde(default, deserialize_with = "de_address")]
    pub target_addr: Option<String>,
    #[serde(default, deserialize_with = "de_address")]
    pub inject_addr: Option<String>,
    #[serde(default)]
    pub slot: Option<u32>,
    #[serde(default)]
    pub compile_time: Option<f64>,
    #[serde(default)]
    pub upload_time: Option<f64>,
    #[serde(default)]
    pub code_size: Option<u64>,
    /// Per-function outcomes of a multi-function injection.
    #[serde(default)]
    pub injections: Vec<FunctionInjection>,
}

/// One entry of a multi-function injection result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionInjection {
    #[serde(default)]
    pub target_func: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub slot: Option<u32>,
    #[serde(default)]
    pub code_size: Option<u64>,
    #[serde(default, deserialize_with = "de_address")]
    pub inject_addr: Option<String>,
}

/// Addresses arrive either as `"0x0800_1234"`-style strings or as plain
/// integers depending on the firmware build; normalise both to hex text.
fn de_address<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Num(n)) => Some(format!("0x{n:08X}")),
        Some(Raw::Text(s)) => Some(s),
        None => None,
    })
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse<R: for<'de> Deserialize<'de>>(json: &str) -> Frame<R> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn status_frame() {
        let f: Frame<TransferResult> = parse(r#"{"type":"status","stage":"compiling"}"#);
        match f {
            Frame::Status(s) => assert_eq!(s.label(), "compiling"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn progress_accepts_upload_and_download_counters() {
        let up: Frame<TransferResult> =
            parse(r#"{"type":"progress","uploaded":512,"total":2048,"percent":25}"#);
        let down: Frame<TransferResult> =
            parse(r#"{"type":"progress","downloaded":512,"total":2048}"#);

        for f in [up, down] {
            match f {
                Frame::Progress(p) => {
                    assert_eq!(p.transferred, 512);
                    assert_eq!(p.total, 2048);
                    assert_eq!(p.percent(), 25.0);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn progress_stats_aliases() {
        let f: Frame<TransferResult> = parse(
            r#"{"type":"progress","uploaded":1,"total":2,
                "stats":{"retries":3,"crc_errors":1,"timeout_errors":0,"packet_loss_rate":1.5}}"#,
        );
        let Frame::Progress(p) = f else { panic!() };
        let stats = p.stats.unwrap();
        assert_eq!(stats.retry_count, 3);
        assert_eq!(stats.crc_error_count, 1);
        assert_eq!(stats.packet_loss_rate_percent, 1.5);
        assert!(!stats.is_clean());
    }

    #[test]
    fn unknown_type_is_accepted() {
        let f: Frame<TransferResult> = parse(r#"{"type":"heartbeat","seq":4}"#);
        assert_eq!(f, Frame::Unknown);
    }

    #[test]
    fn injection_result_with_numeric_addresses() {
        let f: Frame<InjectionResult> = parse(
            r#"{"type":"result","success":true,"compile_time":1.2,"upload_time":0.4,
                "code_size":256,"target_addr":134222388,"inject_addr":"0x20001000","slot":2}"#,
        );
        let Frame::Result(r) = f else { panic!() };
        assert!(r.success);
        assert_eq!(r.code_size, Some(256));
        assert_eq!(r.target_addr.as_deref(), Some("0x08001234"));
        assert_eq!(r.inject_addr.as_deref(), Some("0x20001000"));
        assert_eq!(r.slot, Some(2));
    }

    #[test]
    fn injection_result_multi_function() {
        let f: Frame<InjectionResult> = parse(
            r#"{"type":"result","success":false,"injections":[
                {"target_func":"foo","success":true,"slot":0},
                {"target_func":"bar","success":false,"error":"no slot"}]}"#,
        );
        let Frame::Result(r) = f else { panic!() };
        assert_eq!(r.injections.len(), 2);
        assert_eq!(r.injections[1].error.as_deref(), Some("no slot"));
    }
}
