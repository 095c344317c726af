use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::models::{RunEvent, RunOutcome, RunSummary, RunUpdate};
use super::reporter::RunReporter;
use super::sequencer::ExecutionContext;
use crate::config::RunnerConfig;
use crate::desktop::{Devices, Failsafe};
use crate::error::{Result, RunnerError};
use crate::models::{validate, MacroProgram};

/// Owns the single active macro run.
pub struct MacroRunner {
    devices: Devices,
    config: RunnerConfig,
    failsafe: Option<Arc<dyn Failsafe>>,
    running: Arc<AtomicBool>,
    active: Arc<DashMap<String, CancellationToken>>,
    updates: broadcast::Sender<RunUpdate>,
}

impl MacroRunner {
    pub fn new(devices: Devices, config: RunnerConfig) -> Self {
        let (updates, _) = broadcast::channel(1024);
        Self {
            devices,
            config,
            failsafe: None,
            running: Arc::new(AtomicBool::new(false)),
            active: Arc::new(DashMap::new()),
            updates,
        }
    }

    /// Probe `failsafe` while a run is active; tripping it cancels the run.
    pub fn with_failsafe(mut self, failsafe: Arc<dyn Failsafe>) -> Self {
        self.failsafe = Some(failsafe);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Events of every run, tagged with the run id.
    pub fn subscribe(&self) -> broadcast::Receiver<RunUpdate> {
        self.updates.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Validate `program` and start running it in the background.
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// [`RunnerError::Invalid`] before any side effect if validation finds
    /// problems, and with [`RunnerError::AlreadyRunning`] if a run is active.
    pub fn start<F>(&self, program: MacroProgram, on_event: F) -> Result<RunHandle>
    where
        F: Fn(RunEvent) + Send + Sync + 'static,
    {
        let problems = validate(&program);
        if !problems.is_empty() {
            return Err(RunnerError::Invalid(problems));
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RunnerError::AlreadyRunning);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        let reporter = RunReporter::new(id.clone(), Arc::new(on_event))
            .with_broadcast(self.updates.clone());

        self.active.insert(id.clone(), cancel.clone());
        let guard = RunGuard {
            id: id.clone(),
            running: Arc::clone(&self.running),
            active: Arc::clone(&self.active),
            done: done.clone(),
            reporter: reporter.clone(),
            outcome: None,
        };

        if let Some(failsafe) = self.failsafe.clone() {
            tokio::spawn(watch_failsafe(
                failsafe,
                cancel.clone(),
                done,
                reporter.clone(),
                self.config.failsafe_poll,
            ));
        }

        tracing::info!(
            run_id = %id,
            actions = program.action_count(),
            loops = program.loop_count,
            "Starting macro run"
        );

        let mut context = ExecutionContext::new(
            self.devices.clone(),
            self.config.clone(),
            cancel.clone(),
            reporter,
        );
        let run_id = id.clone();
        let join = tokio::spawn(async move {
            // The guard drops with the task
            let mut guard = guard;
            let outcome = context.run(&program).await;
            guard.outcome = Some(outcome);
            RunSummary {
                id: run_id,
                outcome,
                started_at,
                finished_at: Utc::now(),
                dispatched: context.dispatched(),
                error: context.error().map(str::to_string),
            }
        });

        Ok(RunHandle {
            id,
            started_at,
            cancel,
            join,
        })
    }

    /// Request cancellation of the run behind `handle`.
    pub fn cancel(&self, handle: &RunHandle) -> bool {
        self.cancel_run(handle.id())
    }

    /// Request cancellation by run id. Returns false if no such run is active.
    pub fn cancel_run(&self, run_id: &str) -> bool {
        match self.active.get(run_id) {
            Some(token) => {
                tracing::info!(run_id, "Cancel requested");
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Caller's view of a started run
#[derive(Debug)]
pub struct RunHandle {
    id: String,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    join: JoinHandle<RunSummary>,
}

impl RunHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Request cancellation. The run stops at its next check point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the run to end.
    pub async fn wait(self) -> RunSummary {
        match self.join.await {
            Ok(summary) => summary,
            Err(e) => RunSummary::aborted(self.id, self.started_at, e.to_string()),
        }
    }
}

/// Releases the active-run slot and sends the single `Finished` event,
/// whether the run task returns or panics.
struct RunGuard {
    id: String,
    running: Arc<AtomicBool>,
    active: Arc<DashMap<String, CancellationToken>>,
    done: CancellationToken,
    reporter: RunReporter,
    outcome: Option<RunOutcome>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.active.remove(&self.id);
        self.done.cancel();
        self.running.store(false, Ordering::Release);

        let outcome = match self.outcome {
            Some(outcome) => outcome,
            None => {
                self.reporter.error("Macro run ended unexpectedly");
                RunOutcome::Failed
            }
        };
        self.reporter.finished(outcome);
    }
}

async fn watch_failsafe(
    failsafe: Arc<dyn Failsafe>,
    cancel: CancellationToken,
    done: CancellationToken,
    reporter: RunReporter,
    every: Duration,
) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
    loop {
        tokio::select! {
            biased;
            _ = done.cancelled() => return,
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let probe = Arc::clone(&failsafe);
        let tripped = tokio::task::spawn_blocking(move || probe.tripped())
            .await
            .unwrap_or(false);
        if tripped && !done.is_cancelled() {
            reporter.warning("Failsafe triggered, stopping macro");
            cancel.cancel();
            return;
        }
    }
}
