//! Connectivity probe
//!
//! Answers "does the device currently have a usable link?" by checking the
//! wired interface for carrier and the wireless interface for an associated
//! SSID. Pure read; any query error counts as "not connected" so the
//! supervisor never believes it is online when it cannot verify that.

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Read-only link status check.
#[async_trait]
pub trait LinkProbe: Send + Sync {
    async fn is_connected(&self) -> bool;
}

/// Probe backed by `iwgetid` and `ip link`.
pub struct SystemProbe {
    wired_interface: String,
    command_timeout: Duration,
}

impl SystemProbe {
    pub fn new(wired_interface: impl Into<String>, command_timeout: Duration) -> Self {
        Self {
            wired_interface: wired_interface.into(),
            command_timeout,
        }
    }

    /// Associated SSID on the wireless interface, if any.
    async fn wireless_associated(&self) -> bool {
        let output = tokio::time::timeout(
            self.command_timeout,
            Command::new("iwgetid").arg("-r").output(),
        )
        .await;

        match output {
            Ok(Ok(out)) => {
                let ssid = String::from_utf8_lossy(&out.stdout);
                out.status.success() && !ssid.trim().is_empty()
            }
            Ok(Err(e)) => {
                warn!("iwgetid failed to launch: {e}");
                false
            }
            Err(_) => {
                warn!("iwgetid timed out");
                false
            }
        }
    }

    /// Carrier on the wired interface.
    async fn wired_carrier(&self) -> bool {
        let output = tokio::time::timeout(
            self.command_timeout,
            Command::new("ip")
                .args(["link", "show", &self.wired_interface])
                .output(),
        )
        .await;

        match output {
            Ok(Ok(out)) if out.status.success() => {
                link_has_carrier(&String::from_utf8_lossy(&out.stdout))
            }
            Ok(Ok(_)) => false,
            Ok(Err(e)) => {
                warn!("ip link failed to launch: {e}");
                false
            }
            Err(_) => {
                warn!("ip link timed out");
                false
            }
        }
    }
}

#[async_trait]
impl LinkProbe for SystemProbe {
    async fn is_connected(&self) -> bool {
        if self.wired_carrier().await {
            debug!("Wired carrier present");
            return true;
        }
        if self.wireless_associated().await {
            debug!("Wireless association present");
            return true;
        }
        false
    }
}

/// `ip link show` reports `LOWER_UP` in the flags when the physical link is
/// up; administrative UP alone does not mean a cable is plugged in.
fn link_has_carrier(output: &str) -> bool {
    output
        .lines()
        .next()
        .map(|first| first.contains("LOWER_UP"))
        .unwrap_or(false)
}
