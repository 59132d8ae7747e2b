// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Orchestrator execution logic

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{OrchestratorConfig, RunConfig};
use crate::error::{BenchError, Result};
use crate::sampler::{MetricsSampler, SampleObserver};
use crate::sink::ResultSink;
use crate::stats::StatsAggregator;
use crate::telemetry::{SystemInfoProvider, TelemetryFactory};
use crate::types::{BenchmarkResult, RunStatus};
use crate::workload::{WorkloadOutcome, WorkloadRunner};

use super::state::{Progress, RunState};

/// Coordinates one benchmark run at a time.
///
/// Cloning is cheap; clones share the same run slot, so a clone can be
/// handed to a signal handler to call [`BenchmarkOrchestrator::cancel`].
#[derive(Clone)]
pub struct BenchmarkOrchestrator {
    inner: Arc<Shared>,
}

struct Shared {
    config: OrchestratorConfig,
    sampler: MetricsSampler,
    sink: Arc<dyn ResultSink>,
    telemetry: TelemetryFactory,
    system_info: Arc<dyn SystemInfoProvider>,
    slot: Mutex<RunSlot>,
    progress: watch::Sender<Progress>,
    #[cfg(test)]
    runner_fault: Option<u64>,
}

/// Everything guarded by the single-run state guard.
#[derive(Default)]
struct RunSlot {
    state: RunState,
    cancel: Option<CancellationToken>,
    result: Option<BenchmarkResult>,
}

impl BenchmarkOrchestrator {
    /// Create an orchestrator from its collaborators.
    ///
    /// Use [`super::OrchestratorBuilder`] for defaults.
    pub fn new(
        config: OrchestratorConfig,
        sink: Arc<dyn ResultSink>,
        telemetry: TelemetryFactory,
        system_info: Arc<dyn SystemInfoProvider>,
    ) -> Result<Self> {
        let sampler = MetricsSampler::new(config.sample_interval())?;
        let (progress, _) = watch::channel(Progress::default());

        Ok(Self {
            inner: Arc::new(Shared {
                config,
                sampler,
                sink,
                telemetry,
                system_info,
                slot: Mutex::new(RunSlot::default()),
                progress,
                #[cfg(test)]
                runner_fault: None,
            }),
        })
    }

    /// The configuration this orchestrator was built with.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.inner.lock().state
    }

    /// Result of the last run once it is terminal.
    ///
    /// `None` while a run is in flight and after a workload fault. After a
    /// persistence failure this is the unsaved result, with status `Failed`.
    pub fn result(&self) -> Option<BenchmarkResult> {
        let slot = self.inner.lock();
        if slot.state.is_terminal() {
            slot.result.clone()
        } else {
            None
        }
    }

    /// Observe progress snapshots. The receiver always holds the latest one.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.inner.progress.subscribe()
    }

    /// Make every runner of this orchestrator panic once it has completed
    /// `after` iterations. Only effective before the orchestrator is cloned.
    #[cfg(test)]
    pub(crate) fn with_runner_fault(mut self, after: u64) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.inner) {
            shared.runner_fault = Some(after);
        }
        self
    }

    /// Start a run and return a handle to await it.
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// `InvalidArgument` before anything starts if `config` is invalid, and
    /// with `Conflict` if a run is already starting or running.
    pub fn start(&self, config: RunConfig) -> Result<RunHandle> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| BenchError::execution("runs must be started from within a tokio runtime"))?;

        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        {
            let mut slot = self.inner.lock();
            if slot.state.is_active() {
                tracing::warn!(state = %slot.state, "Rejected start while a run is in flight");
                return Err(BenchError::Conflict { state: slot.state });
            }
            slot.state = RunState::Starting;
            slot.cancel = Some(cancel.clone());
            slot.result = None;
        }
        self.inner
            .progress
            .send_replace(Progress::starting(run_id, config.iterations));

        let span = tracing::info_span!(
            "benchmark_run",
            run_id = %run_id,
            workload = %config.workload,
            iterations = config.iterations,
        );
        let shared = Arc::clone(&self.inner);
        let task = runtime.spawn(
            async move { shared.drive(run_id, config, cancel).await }.instrument(span),
        );

        Ok(RunHandle { run_id, task })
    }

    /// Start a run and wait for it to finish.
    pub async fn run(&self, config: RunConfig) -> Result<BenchmarkResult> {
        self.start(config)?.wait().await
    }

    /// Signal the in-flight run to stop.
    ///
    /// Returns `true` if this call issued the signal. Repeated calls, and
    /// calls when no run is in flight, do nothing and return `false`.
    pub fn cancel(&self) -> bool {
        let slot = self.inner.lock();
        match (&slot.state, &slot.cancel) {
            (state, Some(token)) if state.is_active() && !token.is_cancelled() => {
                token.cancel();
                tracing::info!(state = %state, "Cancellation requested");
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for BenchmarkOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkOrchestrator")
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .finish()
    }
}

/// Handle to a started run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    task: JoinHandle<Result<BenchmarkResult>>,
}

impl RunHandle {
    /// Identifier the result will carry.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Wait for the run to reach a terminal state.
    ///
    /// `Ok` for `Completed` and `Cancelled` runs. A workload fault returns
    /// `Execution`; a store failure returns `Persistence` carrying the
    /// unsaved result.
    pub async fn wait(self) -> Result<BenchmarkResult> {
        self.task
            .await
            .map_err(|e| BenchError::execution(format!("run task did not finish: {e}")))?
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RunSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, state: RunState) {
        self.lock().state = state;
        self.progress.send_modify(|p| p.state = state);
    }

    async fn drive(
        self: Arc<Self>,
        run_id: Uuid,
        config: RunConfig,
        cancel: CancellationToken,
    ) -> Result<BenchmarkResult> {
        let started_at = Utc::now();
        let clock = Instant::now();
        tracing::info!(timeout_ms = ?config.timeout.map(|t| t.as_millis()), "Starting benchmark run");

        let provider = Arc::clone(&self.system_info);
        let factory = Arc::clone(&self.telemetry);
        let setup = tokio::task::spawn_blocking(move || (provider.snapshot(), (*factory)()));
        let (system_info, source) = match setup.await {
            Ok(setup) => setup,
            Err(e) => return Err(self.fail(BenchError::execution(format!("run setup failed: {e}")))),
        };

        let observer_target = Arc::clone(&self);
        let observer: SampleObserver = Box::new(move |sample| {
            let sample = sample.clone();
            observer_target.progress.send_modify(|p| p.latest_sample = Some(sample));
        });
        let sampler = self.sampler.start_with(source, CancellationToken::new(), Some(observer));
        self.transition(RunState::Running);

        let runner_task = self.spawn_runner(&config, &cancel, clock);
        let deadline = config.timeout.map(|timeout| spawn_deadline(timeout, cancel.clone()));

        // Join barrier: the sampler is stopped whatever the runner did.
        let joined = runner_task.await;
        if let Some(deadline) = deadline {
            deadline.abort();
        }
        let samples = sampler.stop().await;

        let outcome = match joined {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return Err(self.fail(e)),
            Err(e) => return Err(self.fail(BenchError::execution(format!("runner task failed: {e}")))),
        };

        let status = if outcome.cancelled {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };

        let summary = match StatsAggregator::aggregate(&outcome.timing, &samples) {
            Ok(summary) => summary,
            Err(e) => return Err(self.fail(e)),
        };

        let built = BenchmarkResult::builder()
            .id(run_id)
            .workload(config.workload)
            .requested_iterations(config.iterations)
            .started_at(started_at)
            .finished_at(Utc::now())
            .raw_timing(outcome.timing)
            .sample_series(samples)
            .summary_stats(summary)
            .status(status)
            .system_info(system_info)
            .build();
        let result = match built {
            Ok(result) => result,
            Err(e) => return Err(self.fail(e)),
        };

        self.persist(result).await
    }

    fn spawn_runner(
        self: &Arc<Self>,
        config: &RunConfig,
        cancel: &CancellationToken,
        clock: Instant,
    ) -> JoinHandle<Result<WorkloadOutcome>> {
        let runner = WorkloadRunner::new(config.workload, self.config.cancel_check_every());
        #[cfg(test)]
        let runner = match self.runner_fault {
            Some(after) => runner.fail_after(after),
            None => runner,
        };
        let iterations = config.iterations;
        let publish_every = self.config.progress_every();
        let cancel = cancel.clone();
        let shared = Arc::clone(self);

        tokio::task::spawn_blocking(move || {
            let mut last_publish = Instant::now();
            let outcome = runner.run_with_progress(iterations, &cancel, |done| {
                let now = Instant::now();
                if done == iterations || now.duration_since(last_publish) >= publish_every {
                    last_publish = now;
                    shared.progress.send_modify(|p| {
                        p.iterations_done = done;
                        p.elapsed = clock.elapsed();
                    });
                }
            });
            // The last block of a cancelled run may fall inside the throttle window.
            if let Ok(outcome) = &outcome {
                shared.progress.send_modify(|p| {
                    p.iterations_done = outcome.timing.iterations;
                    p.elapsed = clock.elapsed();
                });
            }
            outcome
        })
    }

    async fn persist(&self, result: BenchmarkResult) -> Result<BenchmarkResult> {
        let sink = Arc::clone(&self.sink);
        let pending = result.clone();
        let appended = match tokio::task::spawn_blocking(move || sink.append(&pending)).await {
            Ok(appended) => appended,
            Err(e) => Err(Box::new(e) as crate::error::SinkError),
        };

        match appended {
            Ok(()) => {
                let state = RunState::from(result.status);
                tracing::info!(
                    status = %result.status,
                    iterations = result.raw_timing.iterations,
                    ops_per_second = result.raw_timing.ops_per_second,
                    samples = result.sample_series.len(),
                    "Benchmark run finished"
                );
                self.finish(state, Some(result.clone()));
                Ok(result)
            }
            Err(source) => {
                tracing::error!(error = %source, "Failed to persist benchmark result");
                let mut result = result;
                result.status = RunStatus::Failed;
                self.finish(RunState::Failed, Some(result.clone()));
                Err(BenchError::Persistence {
                    source,
                    result: Box::new(result),
                })
            }
        }
    }

    fn fail(&self, error: BenchError) -> BenchError {
        tracing::error!(error = %error, "Benchmark run failed");
        self.finish(RunState::Failed, None);
        error
    }

    fn finish(&self, state: RunState, result: Option<BenchmarkResult>) {
        {
            let mut slot = self.lock();
            slot.state = state;
            slot.cancel = None;
            slot.result = result;
        }
        self.progress.send_modify(|p| p.state = state);
    }
}

/// Cancel `token` once `timeout` elapses, unless it is cancelled first.
fn spawn_deadline(timeout: Duration, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                tracing::info!(timeout_ms = timeout.as_millis() as u64, "Deadline reached, cancelling run");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}
