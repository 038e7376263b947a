//! Connectivity supervisor
//!
//! The long-lived control loop that owns all network-mutating calls. It
//! decides whether the device runs as a WiFi client or as its own access
//! point, executes manual connection requests from the operator, watches an
//! established link, and consults the restart breaker before every
//! failure-driven AP activation.

use crate::breaker::CircuitBreaker;
use crate::config::DaemonConfig;
use crate::nm::NetworkControl;
use crate::probe::LinkProbe;
use crate::status::SharedStatus;
use netkeeper_common::{ConnectRequest, ConnectionPhase, StatusSnapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Poll interval while confirming a freshly requested connection.
const CONFIRM_POLL: Duration = Duration::from_secs(2);

/// What ended a supervisor wait.
enum Wake {
    Elapsed,
    Request(ConnectRequest),
    Shutdown,
}

/// Next step of the control loop. Mirrors the public [`ConnectionPhase`]
/// but carries the computed backoff.
enum Step {
    Monitoring,
    ApActive,
    Reconnecting,
    Backoff(Duration),
    /// A manual request arrived while the AP was still being raised.
    Manual(ConnectRequest),
    Shutdown,
}

/// Handle the web layer uses to observe and drive the supervisor.
///
/// Submitting never blocks: a request is either accepted or rejected as
/// busy, it is never queued behind an in-flight attempt.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<ConnectRequest>,
    status: SharedStatus,
    busy: Arc<AtomicBool>,
}

impl SupervisorHandle {
    /// Whole-snapshot read for the web layer.
    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    /// Enqueue a manual connection request.
    ///
    /// The attempt slot is claimed atomically with the busy check. The
    /// snapshot's `in_progress` flag lags behind the dequeue, so checking
    /// it here would let a second request slip in and be queued behind one
    /// the supervisor has picked up but not yet started.
    pub fn submit(&self, request: ConnectRequest) -> netkeeper_common::Result<()> {
        request.validate()?;
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(netkeeper_common::Error::Busy);
        }
        match self.tx.try_send(request) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.busy.store(false, Ordering::SeqCst);
                match e {
                    mpsc::error::TrySendError::Full(_) => Err(netkeeper_common::Error::Busy),
                    mpsc::error::TrySendError::Closed(_) => Err(
                        netkeeper_common::Error::Internal("supervisor is not running".into()),
                    ),
                }
            }
        }
    }
}

/// The connectivity state machine.
pub struct Supervisor {
    controller: Arc<dyn NetworkControl>,
    probe: Arc<dyn LinkProbe>,
    status: SharedStatus,
    breaker: CircuitBreaker,
    config: DaemonConfig,
    requests: mpsc::Receiver<ConnectRequest>,
    busy: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(
        controller: Arc<dyn NetworkControl>,
        probe: Arc<dyn LinkProbe>,
        config: DaemonConfig,
        shutdown: CancellationToken,
    ) -> (Self, SupervisorHandle) {
        // Capacity 1: a second request while one is pending is "busy".
        let (tx, requests) = mpsc::channel(1);
        let status = SharedStatus::new();
        let busy = Arc::new(AtomicBool::new(false));
        let handle = SupervisorHandle {
            tx,
            status: status.clone(),
            busy: busy.clone(),
        };
        let supervisor = Self {
            controller,
            probe,
            status,
            breaker: CircuitBreaker::new(config.breaker.clone()),
            config,
            requests,
            busy,
            shutdown,
        };
        (supervisor, handle)
    }

    /// Run until the shutdown token fires.
    pub async fn run(mut self) {
        info!("Connectivity supervisor started");

        let mut step = self.startup().await;
        loop {
            step = match step {
                Step::Monitoring => self.monitor_tick().await,
                Step::ApActive => self.ap_window().await,
                Step::Reconnecting => self.reconnect_window().await,
                Step::Backoff(delay) => self.backoff_wait(delay).await,
                Step::Manual(request) => self.manual_connect(request).await,
                Step::Shutdown => break,
            };
        }

        info!("Connectivity supervisor stopped");
    }

    /// Initial transition: monitor if already online, otherwise raise the AP.
    async fn startup(&mut self) -> Step {
        if self.probe.is_connected().await {
            info!("Already connected at startup");
            self.enter_monitoring();
            return Step::Monitoring;
        }

        info!("No connectivity at startup, raising access point");
        self.status.update(|s| {
            s.phase = ConnectionPhase::Disconnected;
            s.connected = false;
        });
        self.bring_up_ap().await
    }

    /// Sleep that a manual request or shutdown can interrupt.
    async fn wait(&mut self, duration: Duration) -> Wake {
        tokio::select! {
            _ = self.shutdown.cancelled() => Wake::Shutdown,
            request = self.requests.recv() => match request {
                Some(request) => Wake::Request(request),
                None => Wake::Shutdown,
            },
            _ = tokio::time::sleep(duration) => Wake::Elapsed,
        }
    }

    /// One monitoring interval. Transition 3 of the state machine.
    async fn monitor_tick(&mut self) -> Step {
        match self.wait(self.config.timing.monitor_interval()).await {
            Wake::Shutdown => Step::Shutdown,
            Wake::Request(request) => self.manual_connect(request).await,
            Wake::Elapsed => {
                if self.probe.is_connected().await {
                    Step::Monitoring
                } else {
                    warn!("Connectivity lost, entering reconnection window");
                    self.status.update(|s| {
                        s.connected = false;
                        s.monitoring = false;
                        s.phase = ConnectionPhase::ReconnectingAfterDrop;
                    });
                    Step::Reconnecting
                }
            }
        }
    }

    /// Bounded wait for the stack to reassociate on its own. Transition 4.
    async fn reconnect_window(&mut self) -> Step {
        let deadline = Instant::now() + self.config.timing.reconnect_window();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let slice = remaining.min(self.config.timing.reconnect_poll());
            match self.wait(slice).await {
                Wake::Shutdown => return Step::Shutdown,
                Wake::Request(request) => return self.manual_connect(request).await,
                Wake::Elapsed => {
                    if self.probe.is_connected().await {
                        info!("Link recovered within the reconnection window");
                        self.enter_monitoring();
                        return Step::Monitoring;
                    }
                }
            }
        }

        let backoff = self.breaker.current_backoff(Instant::now().into_std());
        if backoff > Duration::ZERO {
            warn!(
                "Restart breaker open, delaying AP restart by {}s",
                backoff.as_secs()
            );
            self.status.update(|s| {
                s.phase = ConnectionPhase::BackoffWait;
                s.restart_backoff_seconds = backoff.as_secs();
            });
            return Step::Backoff(backoff);
        }

        self.record_restart();
        self.bring_up_ap().await
    }

    /// Breaker-imposed delay before the next AP restart. Transition 5.
    async fn backoff_wait(&mut self, delay: Duration) -> Step {
        match self.wait(delay).await {
            Wake::Shutdown => Step::Shutdown,
            Wake::Request(request) => self.manual_connect(request).await,
            Wake::Elapsed => {
                if self.probe.is_connected().await {
                    info!("Link recovered during backoff wait");
                    self.enter_monitoring();
                    return Step::Monitoring;
                }
                self.record_restart();
                self.bring_up_ap().await
            }
        }
    }

    /// AP stays up accepting requests for the configured duration, then the
    /// client path is retried. Transition 6.
    async fn ap_window(&mut self) -> Step {
        match self.wait(self.config.timing.ap_duration()).await {
            Wake::Shutdown => Step::Shutdown,
            Wake::Request(request) => self.manual_connect(request).await,
            Wake::Elapsed => {
                info!("AP window elapsed, retrying client path");
                let connected = self.probe.is_connected().await;
                let outcome = self.controller.stop_ap().await;
                if !outcome.ok {
                    warn!("Failed to stop access point: {}", outcome.detail);
                }
                if connected {
                    // Out-of-band link (e.g. wired) appeared while the AP
                    // was up.
                    self.enter_monitoring();
                    return Step::Monitoring;
                }
                self.status.update(|s| {
                    s.ap_mode = false;
                    s.phase = ConnectionPhase::ReconnectingAfterDrop;
                });
                Step::Reconnecting
            }
        }
    }

    /// Execute one manual connection request end to end. Transition 2.
    /// Not preemptible: the handle rejects concurrent submissions as busy.
    async fn manual_connect(&mut self, request: ConnectRequest) -> Step {
        info!("Manual connect requested for SSID {}", request.ssid);

        let ap_was_active = self.status.snapshot().ap_mode;
        self.status.update(|s| {
            s.in_progress = true;
            s.phase = ConnectionPhase::ManualConnecting;
            s.current_ssid = Some(request.ssid.clone());
            s.last_ssid = Some(request.ssid.clone());
            s.success = None;
            s.error = None;
            s.monitoring = false;
        });

        if ap_was_active {
            let outcome = self.controller.stop_ap().await;
            if outcome.ok {
                self.status.update(|s| s.ap_mode = false);
            } else {
                warn!("Failed to stop access point: {}", outcome.detail);
            }
        }

        let outcome = self
            .controller
            .connect(&request.ssid, &request.password)
            .await;

        // A clean nmcli exit does not guarantee association and DHCP
        // finished; confirm the link before reporting success.
        let confirmed = outcome.ok && self.confirm_link().await;

        if confirmed {
            info!("Connected to {}", request.ssid);
            self.breaker.reset();
            self.status.update(|s| {
                s.in_progress = false;
                s.current_ssid = None;
                s.success = Some(true);
                s.error = None;
            });
            self.busy.store(false, Ordering::SeqCst);
            self.enter_monitoring();
            return Step::Monitoring;
        }

        let detail = if outcome.ok {
            "connection did not come up in time".to_string()
        } else {
            outcome.detail
        };
        warn!("Manual connect to {} failed: {detail}", request.ssid);
        self.status.update(|s| {
            s.in_progress = false;
            s.current_ssid = None;
            s.success = Some(false);
            s.error = Some(detail);
            s.connected = false;
        });
        self.busy.store(false, Ordering::SeqCst);

        // Raise the AP again immediately so the operator can retry without
        // delay. Operator-triggered failures are not breaker-counted.
        self.bring_up_ap().await
    }

    /// Re-probe until the link is confirmed or the wait runs out.
    async fn confirm_link(&mut self) -> bool {
        let deadline = Instant::now() + self.config.timing.connection_wait();
        loop {
            if self.probe.is_connected().await {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = tokio::time::sleep(remaining.min(CONFIRM_POLL)) => {}
            }
        }
    }

    /// Raise the AP, retrying until it is up. Without the AP the device is
    /// unreachable, so an activation failure is retryable, never fatal.
    async fn bring_up_ap(&mut self) -> Step {
        loop {
            self.refresh_scan().await;

            let outcome = self
                .controller
                .start_ap(&self.config.ap.name, &self.config.ap.password)
                .await;

            if outcome.ok {
                info!("Access point active: {}", self.config.ap.name);
                let pending = self.breaker.current_backoff(Instant::now().into_std());
                self.status.update(|s| {
                    s.phase = ConnectionPhase::ApActive;
                    s.ap_mode = true;
                    s.connected = false;
                    s.monitoring = false;
                    s.restart_backoff_seconds = pending.as_secs();
                });
                return Step::ApActive;
            }

            error!("Failed to start access point: {}", outcome.detail);
            match self.wait(self.config.timing.ap_retry_delay()).await {
                Wake::Elapsed => continue,
                // Handled by the main loop; calling manual_connect here
                // would make the two futures mutually recursive.
                Wake::Request(request) => return Step::Manual(request),
                Wake::Shutdown => return Step::Shutdown,
            }
        }
    }

    /// Scan while the radio can still see other networks, so the operator
    /// page has a list to offer once the AP is up.
    async fn refresh_scan(&mut self) {
        let networks = self.controller.list_networks().await;
        debug!("Scan found {} networks", networks.len());
        self.status.update(|s| s.networks = networks);
    }

    fn record_restart(&mut self) {
        let now = Instant::now().into_std();
        self.breaker.record_restart(now);
        let pending = self.breaker.current_backoff(now);
        self.status
            .update(|s| s.restart_backoff_seconds = pending.as_secs());
    }

    fn enter_monitoring(&mut self) {
        self.status.update(|s| {
            s.connected = true;
            s.monitoring = true;
            s.ap_mode = false;
            s.phase = ConnectionPhase::Monitoring;
            s.restart_backoff_seconds = 0;
        });
    }
}
