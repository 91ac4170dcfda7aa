//! CLI client configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the CLI client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Device server settings.
    pub device: DeviceConfig,
    /// File transfer defaults.
    pub transfer: TransferConfig,
    /// Injection defaults.
    pub inject: InjectConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Device server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Base URL of the device server.
    pub base_url: String,
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// How many times to probe the device before giving up.
    pub connect_retries: u32,
    /// Pause between probes in milliseconds.
    pub retry_delay_ms: u64,
}

/// File transfer defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Remote directory used when none is given on the command line.
    pub remote_root: String,
}

/// Injection defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectConfig {
    /// Patch mode sent to the server.
    pub patch_mode: String,
    /// Answer "yes" to overwrite prompts.
    pub assume_yes: bool,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5500".into(),
            connect_timeout_ms: 5000,
            connect_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            remote_root: "/".into(),
        }
    }
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            patch_mode: fpb_core::session::inject::DEFAULT_PATCH_MODE.into(),
            assume_yes: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl DeviceConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl CliConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
