//! NetworkManager integration
//!
//! Wraps the nmcli command line tool behind the capability interface the
//! supervisor consumes: scan, connect, start/stop the self-hosted hotspot.
//! Every invocation is bounded by a timeout and every diagnostic string is
//! credential-redacted before it leaves this module.

use async_trait::async_trait;
use netkeeper_common::{Outcome, WifiNetwork, MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Connection profile name used for the self-hosted hotspot.
const HOTSPOT_CON_NAME: &str = "hotspot";

/// Capability interface over the system network manager.
///
/// Mutating operations must only be driven from the supervisor task; they
/// are not safe to interleave against a single radio.
#[async_trait]
pub trait NetworkControl: Send + Sync {
    /// Best-effort scan. Duplicate SSIDs collapsed, strongest signal wins.
    async fn list_networks(&self) -> Vec<WifiNetwork>;

    /// Join a network. Validates the password length class locally before
    /// anything touches the radio.
    async fn connect(&self, ssid: &str, password: &str) -> Outcome;

    /// Bring up the hotspot. No-op success when it is already active.
    async fn start_ap(&self, name: &str, password: &str) -> Outcome;

    /// Tear down the hotspot. No-op success when it is already gone.
    async fn stop_ap(&self) -> Outcome;
}

/// Process execution seam, so controller behavior is testable without a
/// real NetworkManager on the box.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> std::io::Result<Output>;
}

/// Runs commands on the host.
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> std::io::Result<Output> {
        Command::new(program).args(args).output().await
    }
}

/// nmcli-backed controller.
pub struct NmcliController {
    wifi_interface: String,
    command_timeout: Duration,
    runner: Arc<dyn CommandRunner>,
}

struct CmdOutput {
    ok: bool,
    stdout: String,
    stderr: String,
}

impl NmcliController {
    pub fn new(wifi_interface: impl Into<String>, command_timeout: Duration) -> Self {
        Self::with_runner(wifi_interface, command_timeout, Arc::new(SystemRunner))
    }

    pub fn with_runner(
        wifi_interface: impl Into<String>,
        command_timeout: Duration,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            wifi_interface: wifi_interface.into(),
            command_timeout,
            runner,
        }
    }

    /// Run nmcli with a timeout. `secret`, if present, is scrubbed from all
    /// captured output before it is logged or returned.
    async fn nmcli(&self, args: &[&str], secret: Option<&str>) -> Result<CmdOutput, Outcome> {
        let output =
            tokio::time::timeout(self.command_timeout, self.runner.run("nmcli", args)).await;

        let output = match output {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => {
                warn!("nmcli failed to launch: {e}");
                return Err(Outcome::failure(format!("nmcli failed to launch: {e}")));
            }
            Err(_) => {
                warn!(
                    "nmcli {} timed out after {:?}",
                    args.first().unwrap_or(&""),
                    self.command_timeout
                );
                return Err(Outcome::failure("timed out"));
            }
        };

        let stdout = redact(&String::from_utf8_lossy(&output.stdout), secret);
        let stderr = redact(&String::from_utf8_lossy(&output.stderr), secret);
        if !stdout.is_empty() {
            debug!("nmcli stdout: {}", stdout.trim());
        }
        if !stderr.is_empty() {
            warn!("nmcli stderr: {}", stderr.trim());
        }

        Ok(CmdOutput {
            ok: output.status.success(),
            stdout,
            stderr,
        })
    }

    async fn hotspot_active(&self) -> bool {
        match self
            .nmcli(&["-t", "-f", "NAME", "con", "show", "--active"], None)
            .await
        {
            Ok(out) if out.ok => out.stdout.lines().any(|l| l.trim() == HOTSPOT_CON_NAME),
            _ => false,
        }
    }
}

#[async_trait]
impl NetworkControl for NmcliController {
    async fn list_networks(&self) -> Vec<WifiNetwork> {
        let out = match self
            .nmcli(
                &[
                    "-t",
                    "-f",
                    "SSID,SIGNAL,SECURITY",
                    "dev",
                    "wifi",
                    "list",
                    "ifname",
                    &self.wifi_interface,
                ],
                None,
            )
            .await
        {
            Ok(out) if out.ok => out,
            _ => return Vec::new(),
        };
        parse_scan_output(&out.stdout)
    }

    async fn connect(&self, ssid: &str, password: &str) -> Outcome {
        let len = password.len();
        if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
            return Outcome::failure(format!(
                "password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
            ));
        }

        info!("Connecting to network: {ssid}");
        let result = self
            .nmcli(
                &[
                    "dev",
                    "wifi",
                    "connect",
                    ssid,
                    "password",
                    password,
                    "ifname",
                    &self.wifi_interface,
                ],
                Some(password),
            )
            .await;

        match result {
            Ok(out) if out.ok => Outcome::success(format!("connected to {ssid}")),
            Ok(out) => {
                let detail = first_nonempty(&out.stderr, &out.stdout);
                Outcome::failure(if detail.is_empty() {
                    format!("failed to connect to {ssid}")
                } else {
                    detail
                })
            }
            Err(outcome) => outcome,
        }
    }

    async fn start_ap(&self, name: &str, password: &str) -> Outcome {
        if self.hotspot_active().await {
            debug!("Hotspot already active");
            return Outcome::success("hotspot already active");
        }

        info!("Starting access point: {name}");

        // A stale profile from a previous run would make `con add` fail.
        let _ = self.nmcli(&["con", "delete", HOTSPOT_CON_NAME], None).await;

        let iface = self.wifi_interface.clone();
        let steps: [&[&str]; 5] = [
            &[
                "con", "add", "con-name", HOTSPOT_CON_NAME, "ifname", &iface, "type", "wifi",
                "ssid", name,
            ],
            &[
                "con",
                "modify",
                HOTSPOT_CON_NAME,
                "wifi-sec.key-mgmt",
                "wpa-psk",
            ],
            &["con", "modify", HOTSPOT_CON_NAME, "wifi-sec.psk", password],
            &[
                "con",
                "modify",
                HOTSPOT_CON_NAME,
                "802-11-wireless.mode",
                "ap",
                "802-11-wireless.band",
                "bg",
                "ipv4.method",
                "shared",
            ],
            &["con", "up", HOTSPOT_CON_NAME],
        ];

        for args in steps {
            match self.nmcli(args, Some(password)).await {
                Ok(out) if out.ok => {}
                Ok(out) => {
                    let detail = first_nonempty(&out.stderr, &out.stdout);
                    return Outcome::failure(if detail.is_empty() {
                        "failed to start access point".to_string()
                    } else {
                        detail
                    });
                }
                Err(outcome) => return outcome,
            }
        }

        Outcome::success("access point up")
    }

    async fn stop_ap(&self) -> Outcome {
        info!("Stopping access point");
        // Both steps are allowed to fail: a missing profile means there is
        // nothing to tear down.
        let _ = self.nmcli(&["con", "down", HOTSPOT_CON_NAME], None).await;
        let _ = self.nmcli(&["con", "delete", HOTSPOT_CON_NAME], None).await;
        Outcome::success("access point down")
    }
}

fn first_nonempty(a: &str, b: &str) -> String {
    let a = a.trim();
    if !a.is_empty() {
        return a.to_string();
    }
    b.trim().to_string()
}

/// Scrub a secret from diagnostic text.
fn redact(text: &str, secret: Option<&str>) -> String {
    match secret {
        Some(s) if !s.is_empty() => text.replace(s, "[redacted]"),
        _ => text.to_string(),
    }
}

/// Parse `nmcli -t -f SSID,SIGNAL,SECURITY dev wifi list` output.
///
/// Terse mode separates fields with `:` and escapes literal colons in the
/// SSID as `\:`. Hidden networks (empty SSID) are dropped; duplicate SSIDs
/// keep the strongest signal.
fn parse_scan_output(output: &str) -> Vec<WifiNetwork> {
    let mut networks: Vec<WifiNetwork> = Vec::new();

    for line in output.lines() {
        let fields = split_terse(line);
        if fields.len() < 2 {
            continue;
        }
        let ssid = fields[0].trim();
        if ssid.is_empty() {
            continue;
        }
        let signal: u8 = fields[1].trim().parse().unwrap_or(0);
        let security = fields.get(2).map(|s| s.trim()).unwrap_or("").to_string();

        match networks.iter_mut().find(|n| n.ssid == ssid) {
            Some(existing) => {
                if signal > existing.signal {
                    existing.signal = signal;
                    existing.security = security;
                }
            }
            None => networks.push(WifiNetwork {
                ssid: ssid.to_string(),
                signal,
                security,
            }),
        }
    }

    networks.sort_by(|a, b| b.signal.cmp(&a.signal));
    networks
}

/// Split one line of nmcli terse output, honoring `\:` escapes.
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for ch in line.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == ':' {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    fields.push(current);
    fields
}
