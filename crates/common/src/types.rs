//! Core types for netkeeper

use serde::{Deserialize, Serialize};

/// Password length bounds imposed by WPA-PSK passphrases.
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 63;

/// Connection phase of the supervisor state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    Unknown,
    Disconnected,
    ApActive,
    ManualConnecting,
    Connected,
    Monitoring,
    ReconnectingAfterDrop,
    BackoffWait,
}

impl Default for ConnectionPhase {
    fn default() -> Self {
        Self::Unknown
    }
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionPhase::Unknown => write!(f, "unknown"),
            ConnectionPhase::Disconnected => write!(f, "disconnected"),
            ConnectionPhase::ApActive => write!(f, "ap_active"),
            ConnectionPhase::ManualConnecting => write!(f, "manual_connecting"),
            ConnectionPhase::Connected => write!(f, "connected"),
            ConnectionPhase::Monitoring => write!(f, "monitoring"),
            ConnectionPhase::ReconnectingAfterDrop => write!(f, "reconnecting_after_drop"),
            ConnectionPhase::BackoffWait => write!(f, "backoff_wait"),
        }
    }
}

/// A WiFi network visible in a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiNetwork {
    pub ssid: String,
    /// Signal strength in percent (0-100), as reported by the scanner
    pub signal: u8,
    /// Security descriptor, e.g. "WPA2" (empty for open networks)
    #[serde(default)]
    pub security: String,
}

/// Outcome of a network controller operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub ok: bool,
    /// Human-readable, credential-redacted detail
    pub detail: String,
}

impl Outcome {
    pub fn success(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

/// A manual connection request submitted by the operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub ssid: String,
    pub password: String,
}

impl ConnectRequest {
    /// Validate the request before it is allowed anywhere near the radio.
    pub fn validate(&self) -> crate::Result<()> {
        let ssid = self.ssid.trim();
        if ssid.is_empty() {
            return Err(crate::Error::Validation("SSID must not be empty".into()));
        }
        if ssid.len() > 32 {
            return Err(crate::Error::Validation(
                "SSID must be at most 32 characters".into(),
            ));
        }
        let len = self.password.len();
        if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
            return Err(crate::Error::Validation(format!(
                "password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// Result of submitting a manual connection request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitResult {
    Accepted,
    Busy,
}

/// Snapshot of supervisor state, read by the web layer.
///
/// Written only by the supervisor, always as a whole, so readers never
/// observe a half-updated view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Device currently has a usable link (wired or wireless)
    pub connected: bool,
    /// A manual connection attempt is running
    pub in_progress: bool,
    /// Target of the in-flight attempt
    pub current_ssid: Option<String>,
    /// Target of the most recent attempt
    pub last_ssid: Option<String>,
    /// Outcome of the most recent manual attempt
    pub success: Option<bool>,
    pub error: Option<String>,
    pub phase: ConnectionPhase,
    /// The self-hosted access point is up
    pub ap_mode: bool,
    /// Periodic health checks are running
    pub monitoring: bool,
    /// Seconds the circuit breaker is suppressing AP restarts (0 = closed)
    pub restart_backoff_seconds: u64,
    /// Most recent scan results, refreshed before the AP is raised
    #[serde(default)]
    pub networks: Vec<WifiNetwork>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_wpa_psk_range() {
        let req = ConnectRequest {
            ssid: "home".into(),
            password: "12345678".into(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_password() {
        let req = ConnectRequest {
            ssid: "home".into(),
            password: "1234567".into(),
        };
        assert!(matches!(
            req.validate(),
            Err(crate::Error::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_long_password() {
        let req = ConnectRequest {
            ssid: "home".into(),
            password: "x".repeat(64),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_ssid() {
        let req = ConnectRequest {
            ssid: "  ".into(),
            password: "12345678".into(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionPhase::ReconnectingAfterDrop).unwrap();
        assert_eq!(json, "\"reconnecting_after_drop\"");
    }
}
