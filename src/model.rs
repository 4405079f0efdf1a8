use crate::error::WorkFault;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the work runner, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of work units to execute per run.
    pub target: u64,
    /// Simulated cost of one work unit.
    #[serde(with = "humantime_serde")]
    pub step_delay: Duration,
    /// Whether `request_cancel` has any effect.
    pub supports_cancellation: bool,
    /// Whether progress events are emitted while working.
    pub reports_progress: bool,
}

/// Terminal outcome of one run. Exactly one is delivered per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The work loop reached its target.
    Completed,
    /// Cancellation was observed at an iteration boundary.
    Cancelled,
    /// The work loop raised a fault; it never escapes to the observer raw.
    Failed(WorkFault),
}

impl Outcome {
    /// Short lowercase tag for summaries and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Cancelled => "cancelled",
            Outcome::Failed(_) => "failed",
        }
    }
}

/// Events emitted by the runner and consumed by observer layers (TUI/CLI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// A run was accepted and its worker spawned.
    RunStarted { run_id: String },
    /// One work unit finished; percent is in `[0, 100]` and non-decreasing.
    Progress { percent: u8 },
    Info(InfoEvent),
    /// Terminal event: always last for its run, sent exactly once.
    RunCompleted { outcome: Outcome },
}

/// Structured info events surfaced by the controller; the core never logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    Message(String),
    CancelRequested,
    FaultArmed,
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::CancelRequested => "Cancellation requested.".to_string(),
            InfoEvent::FaultArmed => "Fault armed: the next work unit will fail.".to_string(),
        }
    }
}

/// Observer-side summary of a finished run, for text/JSON output.
/// Built from drained events; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp_utc: String,
    pub run_id: String,
    pub target: u64,
    /// Progress events observed; equals executed work units when progress
    /// reporting is enabled.
    pub progress_events: u64,
    pub last_percent: u8,
    pub duration_ms: u64,
    pub outcome: Outcome,
}
