//! Device probe with a capped retry.
//!
//! Sessions only ask "is a device connected?" and "how many slots are free?"
//! synchronously, so the CLI queries the device server once up front and
//! hands the resulting snapshot to the workbench.

use tracing::{info, warn};

use fpb_core::{DeviceLink, HttpDeviceClient, SlotTable};

use crate::config::DeviceConfig;

/// Device state captured before a session starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub connected: bool,
    pub port: Option<String>,
    pub free_slots: usize,
    pub total_slots: usize,
}

impl DeviceLink for DeviceSnapshot {
    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl SlotTable for DeviceSnapshot {
    fn free_slots(&self) -> usize {
        self.free_slots
    }
}

/// Ask the server for the device state, retrying up to
/// `connect_retries` times while it is unreachable or reports no device.
pub async fn probe(client: &HttpDeviceClient, config: &DeviceConfig) -> DeviceSnapshot {
    let attempts = config.connect_retries.max(1);

    for attempt in 1..=attempts {
        match client.status().await {
            Ok(status) if status.connected => {
                info!(
                    "device connected{}",
                    status
                        .port
                        .as_deref()
                        .map(|p| format!(" on {p}"))
                        .unwrap_or_default()
                );
                let (free_slots, total_slots) = match client.slots().await {
                    Ok(slots) => (
                        slots.iter().filter(|s| !s.occupied).count(),
                        slots.len(),
                    ),
                    Err(e) => {
                        warn!("could not read slot table: {e}");
                        (0, 0)
                    }
                };
                return DeviceSnapshot {
                    connected: true,
                    port: status.port,
                    free_slots,
                    total_slots,
                };
            }
            Ok(_) => warn!("attempt {attempt}/{attempts}: no device attached"),
            Err(e) => warn!("attempt {attempt}/{attempts}: {e}"),
        }
        if attempt < attempts {
            tokio::time::sleep(config.retry_delay()).await;
        }
    }

    DeviceSnapshot::default()
}
