//! Refresh controller — single-flight scheduling of refresh cycles.
//!
//! The controller owns the refresh timer and a one-permit gate. The
//! first tick fires immediately at startup. On every tick a cycle starts
//! only if the gate permit is free; otherwise the tick is dropped and
//! counted. A slow platform therefore stretches the effective refresh
//! interval instead of stacking concurrent cycles.
//!
//! Each cycle runs under an optional deadline. A cycle that misses it is
//! dropped (its workers are aborted), nothing is written, and the gate is
//! released for the next tick. A publish failure stops the controller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use cfsd_core::RefreshConfig;
use cfsd_platform::PlatformApi;

use crate::cycle::Refresher;
use crate::error::RefreshError;
use crate::status::{CycleState, RefreshStatus};

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new cycle was started with this number.
    Started(u64),
    /// The previous cycle still holds the gate.
    Skipped,
}

/// Drives refresh cycles on a timer, at most one at a time.
pub struct RefreshController<P> {
    launcher: CycleLauncher<P>,
    interval: Duration,
    fatal_rx: mpsc::Receiver<RefreshError>,
}

/// Gate, status and spawn handle for individual cycles.
struct CycleLauncher<P> {
    refresher: Arc<Refresher<P>>,
    cycle_timeout: Option<Duration>,
    gate: Arc<Semaphore>,
    status: Arc<watch::Sender<RefreshStatus>>,
    fatal_tx: mpsc::Sender<RefreshError>,
    /// Handle to the in-flight (or most recent) cycle task.
    current: Option<JoinHandle<()>>,
    last_cycle: u64,
}

impl<P: PlatformApi> RefreshController<P> {
    pub fn new(refresher: Refresher<P>, config: &RefreshConfig) -> Self {
        let (status, _) = watch::channel(RefreshStatus::default());
        let (fatal_tx, fatal_rx) = mpsc::channel(1);

        Self {
            launcher: CycleLauncher {
                refresher: Arc::new(refresher),
                cycle_timeout: config.cycle_timeout,
                gate: Arc::new(Semaphore::new(1)),
                status: Arc::new(status),
                fatal_tx,
                current: None,
                last_cycle: 0,
            },
            interval: config.interval,
            fatal_rx,
        }
    }

    /// Receiver for status updates.
    pub fn subscribe(&self) -> watch::Receiver<RefreshStatus> {
        self.launcher.status.subscribe()
    }

    /// Whether no cycle currently holds the gate.
    pub fn is_idle(&self) -> bool {
        self.launcher.gate.available_permits() == 1
    }

    /// Start a cycle if the gate is free.
    pub fn tick(&mut self) -> TickOutcome {
        self.launcher.tick()
    }

    /// Run the timer loop until shutdown or a publish failure.
    ///
    /// Any in-flight cycle is aborted on exit.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), RefreshError> {
        let Self {
            mut launcher,
            interval,
            mut fatal_rx,
        } = self;

        info!(
            interval_secs = interval.as_secs(),
            timeout_secs = launcher.cycle_timeout.map(|t| t.as_secs()),
            "refresh controller started"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    launcher.tick();
                }
                Some(err) = fatal_rx.recv() => {
                    error!(error = %err, "refresh controller stopping");
                    break Err(err);
                }
                _ = shutdown.changed() => {
                    info!("refresh controller shutting down");
                    break Ok(());
                }
            }
        };

        if let Some(handle) = launcher.current.take() {
            handle.abort();
        }
        result
    }
}

impl<P: PlatformApi> CycleLauncher<P> {
    fn tick(&mut self) -> TickOutcome {
        let permit = match self.gate.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("previous run not finished, skipping");
                self.status.send_modify(|s| s.ticks_skipped += 1);
                return TickOutcome::Skipped;
            }
        };

        self.last_cycle += 1;
        let cycle = self.last_cycle;
        self.status.send_modify(|s| {
            s.state = CycleState::Running { cycle };
            s.cycles_started += 1;
        });

        let refresher = self.refresher.clone();
        let status = self.status.clone();
        let fatal = self.fatal_tx.clone();
        let timeout = self.cycle_timeout;

        self.current = Some(tokio::spawn(async move {
            // Dropped in reverse order: the state is reset before the
            // permit is released, even on panic or abort.
            let _permit = permit;
            let _running = RunningGuard {
                status: status.clone(),
                cycle,
            };
            run_guarded(refresher, cycle, timeout, &status, &fatal).await;
        }));

        TickOutcome::Started(cycle)
    }
}

/// Resets a cycle's `Running` state if the task ends without doing so.
struct RunningGuard {
    status: Arc<watch::Sender<RefreshStatus>>,
    cycle: u64,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let cycle = self.cycle;
        let reset = self.status.send_if_modified(|s| {
            if s.state != (CycleState::Running { cycle }) {
                return false;
            }
            s.state = CycleState::Idle;
            true
        });
        if reset {
            if std::thread::panicking() {
                error!(cycle, "refresh cycle panicked");
            } else {
                warn!(cycle, "refresh cycle aborted");
            }
        }
    }
}

/// Run one cycle under the deadline and record how it ended.
async fn run_guarded<P: PlatformApi>(
    refresher: Arc<Refresher<P>>,
    cycle: u64,
    timeout: Option<Duration>,
    status: &watch::Sender<RefreshStatus>,
    fatal: &mpsc::Sender<RefreshError>,
) {
    let outcome = match timeout {
        Some(limit) => tokio::time::timeout(limit, refresher.run_cycle(cycle)).await.ok(),
        None => Some(refresher.run_cycle(cycle).await),
    };

    match outcome {
        Some(Ok(report)) => status.send_modify(|s| {
            s.state = CycleState::Idle;
            s.cycles_completed += 1;
            s.last_cycle = Some(report);
        }),
        Some(Err(source)) => {
            error!(cycle, error = %source, "failed to publish target list");
            status.send_modify(|s| s.state = CycleState::Idle);
            let _ = fatal.try_send(RefreshError::Publish { cycle, source });
        }
        None => {
            warn!(
                cycle,
                timeout_secs = timeout.map(|t| t.as_secs()),
                "refresh cycle timed out, abandoning it"
            );
            status.send_modify(|s| {
                s.state = CycleState::Idle;
                s.cycles_timed_out += 1;
            });
        }
    }
}
