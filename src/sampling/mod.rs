//! # Sampling Loop
//!
//! Drives acquisition, filtering and persistence on a fixed cadence.
//!
//! ## Control Flow
//!
//! Each cycle:
//!
//! 1. Stop if a stop has been requested
//! 2. Get a fix (fresh with a deadline, or the cached one)
//! 3. Read the registered cell
//! 4. Run the filter: store on accept, nudge on a stale timing advance,
//!    do nothing when the device has not moved far enough
//! 5. Sleep for the configured interval, waking early on stop
//!
//! A missing fix or cell skips straight to the sleep. Store failures are
//! logged and the loop carries on; the only way out is the stop signal.
//! A stop requested mid-cycle takes effect once that cycle has finished.
//!
//! ## Lifecycle
//!
//! `Idle` → `Running` → `Stopping` → `Stopped`, tracked by ownership rather
//! than a field. A constructed [`SamplingLoop`] is idle. [`SamplingLoop::run`]
//! consumes it and drives it until the stop check at the top of an iteration
//! fires; the returned [`LoopReport`] is all that remains. A stopped loop
//! cannot be restarted; build a new one.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::cell::sampler::CellSampler;
use crate::cell::Technology;
use crate::config::{AcquireMode, SamplingConfig};
use crate::error::StoreError;
use crate::filter::{Decision, RejectReason, SampleFilter};
use crate::location::{Fix, LocationSource};
use crate::nudge::NetworkNudge;
use crate::record::MeasurementRecord;
use crate::store::{MeasurementStore, RowId};

mod stop;

pub use stop::StopSignal;

/// State owned by exactly one loop instance.
///
/// The stop flag lives in the [`StopSignal`] so it can be set from outside.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopState {
    /// Replaced (never merged) every time a sample is accepted
    pub last_accepted_fix: Option<Fix>,
}

impl LoopState {
    fn new() -> Self {
        Self { last_accepted_fix: None }
    }
}

/// What a single cycle ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No location fix this cycle
    NoFix,
    /// No registered (or no supported) serving cell
    NoCell,
    /// Sample accepted and written
    Stored { technology: Technology, row_id: RowId },
    /// Sample accepted but the write failed
    StoreFailed { technology: Technology },
    /// Timing advance unresolved; nudge fired
    Stale { technology: Technology },
    /// Too close to the last accepted fix
    NotMoved { technology: Technology },
}

/// Per-outcome counters of one loop run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopReport {
    pub cycles: u64,
    pub stored: u64,
    pub store_failures: u64,
    pub stale: u64,
    pub not_moved: u64,
    pub no_fix: u64,
    pub no_cell: u64,
}

impl LoopReport {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::NoFix => self.no_fix += 1,
            CycleOutcome::NoCell => self.no_cell += 1,
            CycleOutcome::Stored { .. } => self.stored += 1,
            CycleOutcome::StoreFailed { .. } => self.store_failures += 1,
            CycleOutcome::Stale { .. } => self.stale += 1,
            CycleOutcome::NotMoved { .. } => self.not_moved += 1,
        }
    }
}

/// The measurement acquisition-and-logging loop.
pub struct SamplingLoop {
    config: SamplingConfig,
    location: Box<dyn LocationSource>,
    sampler: Box<dyn CellSampler>,
    filter: SampleFilter,
    store: Arc<dyn MeasurementStore>,
    nudge: Box<dyn NetworkNudge>,
    state: LoopState,
    report: LoopReport,
}

impl std::fmt::Debug for SamplingLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplingLoop")
            .field("config", &self.config)
            .field("filter", &self.filter)
            .field("state", &self.state)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl SamplingLoop {
    /// Build an idle loop. Nothing runs until [`run`](Self::run) or [`spawn`](Self::spawn).
    pub fn new(
        config: SamplingConfig,
        location: Box<dyn LocationSource>,
        sampler: Box<dyn CellSampler>,
        filter: SampleFilter,
        store: Arc<dyn MeasurementStore>,
        nudge: Box<dyn NetworkNudge>,
    ) -> Self {
        Self {
            config,
            location,
            sampler,
            filter,
            store,
            nudge,
            state: LoopState::new(),
            report: LoopReport::default(),
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn report(&self) -> &LoopReport {
        &self.report
    }

    /// Run until `stop` is signalled, then return the run's counters.
    pub async fn run(mut self, stop: StopSignal) -> LoopReport {
        let interval = Duration::from_millis(self.config.interval_ms);
        info!("Sampling loop running ({:?} fixes every {:?})", self.config.mode, interval);

        loop {
            if stop.is_stopped() {
                debug!("Stop requested, leaving sampling loop");
                break;
            }

            let outcome = self.run_cycle().await;
            self.report.record(&outcome);
            debug!("Cycle {}: {:?}", self.report.cycles, outcome);

            // Zero disables the periodic summary
            if self.report.cycles.checked_rem(self.config.summary_interval_cycles) == Some(0) {
                self.log_summary();
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = stop.stopped() => {}
            }
        }

        info!("Sampling loop stopped");
        self.log_summary();
        self.report
    }

    /// Run the loop on its own tokio task.
    pub fn spawn(self) -> LoopHandle {
        self.spawn_with(StopSignal::new())
    }

    /// Run on its own task, stopping on an existing signal (e.g. one a trace
    /// replay trips when it runs dry).
    pub fn spawn_with(self, stop: StopSignal) -> LoopHandle {
        let task = tokio::spawn(self.run(stop.clone()));
        LoopHandle { stop, task }
    }

    /// One acquire → read → filter → persist-or-nudge pass, without the sleep.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let fix = match self.config.mode {
            AcquireMode::Current => {
                let timeout = Duration::from_millis(self.config.acquire_timeout_ms);
                self.location.acquire(timeout).await
            }
            AcquireMode::LastKnown => self.location.last_known().await,
        };
        let Some(fix) = fix else {
            return CycleOutcome::NoFix;
        };

        let Some(cell) = self.sampler.read_serving_cell() else {
            return CycleOutcome::NoCell;
        };
        let technology = cell.technology();

        match self.filter.evaluate(self.state.last_accepted_fix.as_ref(), fix, cell) {
            Decision::Accept(record) => {
                let accepted_fix = record.fix;
                let outcome = match self.persist(record).await {
                    Ok(row_id) => {
                        info!(
                            "Logged {} sample at ({:.6}, {:.6})",
                            technology, accepted_fix.latitude, accepted_fix.longitude
                        );
                        CycleOutcome::Stored { technology, row_id }
                    }
                    Err(e) => {
                        warn!("Failed to store {} sample: {}", technology, e);
                        CycleOutcome::StoreFailed { technology }
                    }
                };
                // Displacement is measured from the last accepted fix, stored or not
                self.state.last_accepted_fix = Some(accepted_fix);
                outcome
            }
            Decision::Reject(RejectReason::StaleRadioState { timing_advance }) => {
                debug!("{} timing advance {} unresolved, nudging network", technology, timing_advance);
                self.nudge.fire();
                CycleOutcome::Stale { technology }
            }
            Decision::Reject(RejectReason::InsufficientDisplacement { distance_m, threshold_m }) => {
                debug!("Moved {:.1} m of {:.1} m needed for {}", distance_m, threshold_m, technology);
                CycleOutcome::NotMoved { technology }
            }
        }
    }

    async fn persist(&self, record: MeasurementRecord) -> std::result::Result<RowId, StoreError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.append(&record))
            .await
            .map_err(|e| StoreError::Worker(e.to_string()))?
    }

    fn log_summary(&self) {
        let r = &self.report;
        info!(
            "{} cycles: {} stored, {} store failures, {} stale, {} not moved, {} without fix, {} without cell",
            r.cycles, r.stored, r.store_failures, r.stale, r.not_moved, r.no_fix, r.no_cell
        );
    }
}

/// Handle to a loop running on its own task.
#[derive(Debug)]
pub struct LoopHandle {
    stop: StopSignal,
    task: JoinHandle<LoopReport>,
}

impl LoopHandle {
    /// Signal that stops this loop, e.g. to hand to a trace replay.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Request a stop and wait for the current cycle to finish.
    pub async fn stop(self) -> std::result::Result<LoopReport, JoinError> {
        self.stop.stop();
        self.task.await
    }

    /// Wait for the loop to stop on its own (someone else holds the signal).
    pub async fn join(self) -> std::result::Result<LoopReport, JoinError> {
        self.task.await
    }
}
