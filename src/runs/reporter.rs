use std::sync::Arc;
use tokio::sync::broadcast;

use super::models::{RunEvent, RunOutcome, RunUpdate};

/// Caller-supplied sink for run events.
pub type StatusCallback = Arc<dyn Fn(RunEvent) + Send + Sync>;

/// Delivers a run's events to its callback and to broadcast subscribers,
/// and mirrors each one into `tracing`.
#[derive(Clone)]
pub struct RunReporter {
    run_id: String,
    callback: StatusCallback,
    broadcast: Option<broadcast::Sender<RunUpdate>>,
}

impl RunReporter {
    pub fn new(run_id: impl Into<String>, callback: StatusCallback) -> Self {
        Self {
            run_id: run_id.into(),
            callback,
            broadcast: None,
        }
    }

    pub fn with_broadcast(mut self, sender: broadcast::Sender<RunUpdate>) -> Self {
        self.broadcast = Some(sender);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(run_id = %self.run_id, "{}", message);
        self.emit(RunEvent::Info(message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(run_id = %self.run_id, "{}", message);
        self.emit(RunEvent::Warning(message));
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(run_id = %self.run_id, "{}", message);
        self.emit(RunEvent::Error(message));
    }

    /// Terminal event. The run guard is the only caller.
    pub(crate) fn finished(&self, outcome: RunOutcome) {
        tracing::info!(run_id = %self.run_id, outcome = %outcome, "Run finished");
        self.emit(RunEvent::Finished(outcome));
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.broadcast {
            // No subscribers is fine
            let _ = tx.send(RunUpdate {
                run_id: self.run_id.clone(),
                event: event.clone(),
            });
        }
        (self.callback)(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_events_reach_callback_and_subscribers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let (tx, mut rx) = broadcast::channel(8);

        let reporter = RunReporter::new("run-1", Arc::new(move |e: RunEvent| sink.lock().unwrap().push(e)))
            .with_broadcast(tx);
        reporter.info("hello");
        reporter.finished(RunOutcome::Completed);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                RunEvent::Info("hello".into()),
                RunEvent::Finished(RunOutcome::Completed)
            ]
        );
        let update = rx.try_recv().unwrap();
        assert_eq!(update.run_id, "run-1");
        assert_eq!(update.event, RunEvent::Info("hello".into()));
    }
}
