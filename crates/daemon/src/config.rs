//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Web UI listen address
    pub web_listen: String,

    /// Access point configuration
    pub ap: ApConfig,

    /// Supervisor timing configuration
    pub timing: TimingConfig,

    /// Circuit breaker configuration
    pub breaker: BreakerConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            web_listen: "0.0.0.0:8080".to_string(),
            ap: ApConfig::default(),
            timing: TimingConfig::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

/// Access point configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApConfig {
    /// SSID broadcast in AP mode
    pub name: String,

    /// WPA-PSK passphrase for the AP
    pub password: String,

    /// Managed WiFi interface
    pub wifi_interface: String,

    /// Wired interface checked for carrier
    pub wired_interface: String,
}

impl Default for ApConfig {
    fn default() -> Self {
        Self {
            name: "netkeeper".to_string(),
            password: "raspberry".to_string(),
            wifi_interface: "wlan0".to_string(),
            wired_interface: "eth0".to_string(),
        }
    }
}

/// Supervisor timing configuration, all values in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// How long to wait for a link after a connect command succeeds
    pub connection_wait_secs: u64,

    /// Interval between health checks while monitoring
    pub monitor_interval_secs: u64,

    /// Total time allowed for automatic re-association after a drop
    pub reconnect_window_secs: u64,

    /// Probe interval inside the reconnection window
    pub reconnect_poll_secs: u64,

    /// How long the AP stays up before the client path is retried
    pub ap_duration_secs: u64,

    /// Delay before retrying a failed AP activation at startup
    pub ap_retry_delay_secs: u64,

    /// Upper bound for any single external command
    pub command_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            connection_wait_secs: 20,
            monitor_interval_secs: 30,
            reconnect_window_secs: 60,
            reconnect_poll_secs: 5,
            ap_duration_secs: 300,
            ap_retry_delay_secs: 10,
            command_timeout_secs: 15,
        }
    }
}

impl TimingConfig {
    pub fn connection_wait(&self) -> Duration {
        Duration::from_secs(self.connection_wait_secs)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    pub fn reconnect_window(&self) -> Duration {
        Duration::from_secs(self.reconnect_window_secs)
    }

    pub fn reconnect_poll(&self) -> Duration {
        Duration::from_secs(self.reconnect_poll_secs)
    }

    pub fn ap_duration(&self) -> Duration {
        Duration::from_secs(self.ap_duration_secs)
    }

    pub fn ap_retry_delay(&self) -> Duration {
        Duration::from_secs(self.ap_retry_delay_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Restarts tolerated inside the window before backoff kicks in
    pub max_restarts_per_window: usize,

    /// Sliding window length in seconds
    pub restart_window_secs: u64,

    /// Base backoff in seconds; grows geometrically with each excess restart
    pub backoff_base_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_restarts_per_window: 3,
            restart_window_secs: 600,
            backoff_base_secs: 6,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from file
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roundtrips_through_toml() {
        let config = DaemonConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: DaemonConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.ap.name, config.ap.name);
        assert_eq!(
            parsed.timing.monitor_interval_secs,
            config.timing.monitor_interval_secs
        );
        assert_eq!(
            parsed.breaker.max_restarts_per_window,
            config.breaker.max_restarts_per_window
        );
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = DaemonConfig::load(std::path::Path::new("/nonexistent/netkeeper.toml"))
            .unwrap();
        assert_eq!(config.web_listen, "0.0.0.0:8080");
    }
}
