use crate::error::WorkFault;
use crate::model::Outcome;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

/// Deterministic message carried by an injected fault.
pub(crate) const INJECTED_FAULT_MESSAGE: &str = "simulated exception";

/// Parameters for one run of the work loop.
pub(crate) struct WorkParams<F: FnMut(u8)> {
    pub target: u64,
    pub step_delay: Duration,
    /// Cooperative cancellation flag, checked once per iteration boundary.
    pub cancel: Arc<AtomicBool>,
    /// Fault-injection toggle, read-and-cleared once per activation.
    pub fault: Arc<AtomicBool>,
    pub on_progress: F,
}

/// Run the bounded work loop.
///
/// Pure with respect to its parameters: no knowledge of channels, UI state,
/// or who is observing. Each iteration checks cancellation first (no progress
/// event is emitted for a cancelled iteration), then the fault toggle, then
/// performs one simulated work unit and reports `executed * 100 / target`.
/// A target of zero completes immediately without touching the sink.
pub(crate) async fn run_work<F: FnMut(u8)>(params: WorkParams<F>) -> Outcome {
    let WorkParams {
        target,
        step_delay,
        cancel,
        fault,
        mut on_progress,
    } = params;

    let mut executed = 0u64;
    while executed < target {
        if cancel.load(Ordering::Relaxed) {
            return Outcome::Cancelled;
        }
        // swap clears the toggle so exactly one run fails per activation.
        if fault.swap(false, Ordering::Relaxed) {
            return Outcome::Failed(WorkFault::new(INJECTED_FAULT_MESSAGE));
        }

        tokio::time::sleep(step_delay).await;
        executed += 1;
        on_progress((executed * 100 / target) as u8);
    }

    Outcome::Completed
}
