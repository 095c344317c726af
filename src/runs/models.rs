use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Cancelled,
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::Failed => "failed",
        }
    }
}

impl FromStr for RunOutcome {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(RunOutcome::Completed),
            "cancelled" => Ok(RunOutcome::Cancelled),
            "failed" => Ok(RunOutcome::Failed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status events delivered to the caller's callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RunEvent {
    Info(String),
    Warning(String),
    Error(String),
    /// Always the last event of a run, sent exactly once.
    Finished(RunOutcome),
}

impl RunEvent {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunEvent::Finished(_))
    }
}

/// An event tagged with the run that produced it, for broadcast subscribers
#[derive(Debug, Clone)]
pub struct RunUpdate {
    pub run_id: String,
    pub event: RunEvent,
}

/// What a finished run did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: String,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Leaf actions handed to a collaborator (or slept, for delays).
    pub dispatched: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    /// Summary for a run whose task died before reporting.
    pub fn aborted(id: String, started_at: DateTime<Utc>, error: String) -> Self {
        Self {
            id,
            outcome: RunOutcome::Failed,
            started_at,
            finished_at: Utc::now(),
            dispatched: 0,
            error: Some(error),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_round_trips_through_str() {
        for outcome in [RunOutcome::Completed, RunOutcome::Cancelled, RunOutcome::Failed] {
            assert_eq!(outcome.as_str().parse::<RunOutcome>(), Ok(outcome));
        }
        assert!("paused".parse::<RunOutcome>().is_err());
    }

    #[test]
    fn test_event_wire_shape() {
        let value = serde_json::to_value(RunEvent::Finished(RunOutcome::Cancelled)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "kind": "finished", "value": "cancelled" })
        );
    }
}
