//! Run lifecycle core.
//!
//! Owns the worker task, the cancellation and fault flags, and event delivery
//! to observer layers. Exactly one run is in flight at a time; all events for
//! a run travel through one FIFO channel, terminal event last.

mod work;

use crate::error::{RunnerError, WorkFault};
use crate::model::{Outcome, RunConfig, RunEvent};
use rand::RngCore;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc::UnboundedSender;

/// Background work runner. Constructed once and reused across runs; clones
/// share the same run state, so any clone can start, cancel, or arm a fault.
#[derive(Clone)]
pub struct TaskRunner {
    cfg: RunConfig,
    event_tx: UnboundedSender<RunEvent>,
    running: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    fault: Arc<AtomicBool>,
}

impl TaskRunner {
    pub fn new(cfg: RunConfig, event_tx: UnboundedSender<RunEvent>) -> Self {
        Self {
            cfg,
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            fault: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True from a successful `start` until the terminal event is sent.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start a new run. Non-blocking: spawns the work loop and returns.
    ///
    /// Rejects with `AlreadyRunning` while a run is in flight; the
    /// compare-exchange on `running` guarantees a second concurrent worker
    /// can never start.
    pub fn start(&self) -> Result<(), RunnerError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RunnerError::AlreadyRunning);
        }
        self.cancel.store(false, Ordering::Relaxed);

        let run_id = gen_run_id();
        let _ = self.event_tx.send(RunEvent::RunStarted { run_id });

        let progress_tx = self.event_tx.clone();
        let reports_progress = self.cfg.reports_progress;
        let params = work::WorkParams {
            target: self.cfg.target,
            step_delay: self.cfg.step_delay,
            cancel: self.cancel.clone(),
            fault: self.fault.clone(),
            on_progress: move |percent| {
                if reports_progress {
                    let _ = progress_tx.send(RunEvent::Progress { percent });
                }
            },
        };

        let running = self.running.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            // The work loop runs in its own task so a panic inside it is
            // contained here as a JoinError and surfaced as a Failed outcome,
            // never crashing the observer's context.
            let outcome = match tokio::spawn(work::run_work(params)).await {
                Ok(outcome) => outcome,
                Err(e) => Outcome::Failed(WorkFault::new(format!("worker task failed: {e}"))),
            };
            // `running` must read false before the observer sees the terminal
            // event, so a start() issued from completion handling is accepted.
            running.store(false, Ordering::Release);
            let _ = event_tx.send(RunEvent::RunCompleted { outcome });
        });

        Ok(())
    }

    /// Request cooperative cancellation of the active run.
    ///
    /// No-op (never errors) when cancellation is unsupported or nothing is
    /// running. Advisory: the work loop observes the flag at iteration
    /// boundaries only, with no latency bound. Idempotent.
    pub fn request_cancel(&self) {
        if self.cfg.supports_cancellation && self.is_running() {
            self.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Arm the fault toggle: the next work unit that observes it fails its
    /// run. Consumed exactly once per activation. If armed mid-iteration the
    /// fault lands one iteration later; that race is benign and accepted.
    pub fn inject_fault(&self) {
        self.fault.store(true, Ordering::Relaxed);
    }
}

/// Generate a random id for one run, for log correlation only.
fn gen_run_id() -> String {
    let mut b = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut b);
    u64::from_le_bytes(b).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};

    fn config(target: u64) -> RunConfig {
        RunConfig {
            target,
            step_delay: Duration::from_millis(200),
            supports_cancellation: true,
            reports_progress: true,
        }
    }

    fn runner(target: u64) -> (TaskRunner, UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TaskRunner::new(config(target), tx), rx)
    }

    /// Drain events until the terminal one, returning (percents, outcome).
    async fn drain_run(rx: &mut UnboundedReceiver<RunEvent>) -> (Vec<u8>, Outcome) {
        let mut percents = Vec::new();
        loop {
            match rx.recv().await.expect("runner dropped mid-run") {
                RunEvent::Progress { percent } => percents.push(percent),
                RunEvent::RunCompleted { outcome } => return (percents, outcome),
                RunEvent::RunStarted { .. } | RunEvent::Info(_) => {}
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_delivers_increasing_progress_then_one_completion() {
        let (runner, mut rx) = runner(5);
        runner.start().unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(RunEvent::RunStarted { .. })
        ));
        let (percents, outcome) = drain_run(&mut rx).await;
        assert_eq!(percents, vec![20, 40, 60, 80, 100]);
        assert_eq!(outcome, Outcome::Completed);
        assert!(!runner.is_running());
        // Nothing may follow the terminal event.
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_is_rejected_without_second_worker() {
        let (runner, mut rx) = runner(5);
        runner.start().unwrap();
        assert!(runner.is_running());
        assert!(matches!(runner.start(), Err(RunnerError::AlreadyRunning)));

        let (percents, outcome) = drain_run(&mut rx).await;
        // A second worker would have doubled the progress events.
        assert_eq!(percents.len(), 5);
        assert_eq!(outcome, Outcome::Completed);
        // Exactly one terminal event.
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_third_progress_event_ends_cancelled() {
        let (runner, mut rx) = runner(100);
        runner.start().unwrap();

        let mut seen = 0;
        while seen < 3 {
            if let Some(RunEvent::Progress { .. }) = rx.recv().await {
                seen += 1;
            }
        }
        runner.request_cancel();
        // Idempotent: a second request changes nothing.
        runner.request_cancel();

        let (percents, outcome) = drain_run(&mut rx).await;
        assert_eq!(outcome, Outcome::Cancelled);
        assert!(percents.iter().all(|&p| p < 100));
        assert!(!runner.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_idle_is_a_no_op() {
        let (runner, mut rx) = runner(3);
        runner.request_cancel();

        // The next run must be unaffected.
        runner.start().unwrap();
        let (percents, outcome) = drain_run(&mut rx).await;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(percents.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn injected_fault_fails_run_with_no_progress_and_clears() {
        let (runner, mut rx) = runner(100);
        runner.inject_fault();
        runner.start().unwrap();

        let (percents, outcome) = drain_run(&mut rx).await;
        assert!(percents.is_empty());
        match outcome {
            Outcome::Failed(fault) => assert_eq!(fault.message, "simulated exception"),
            other => panic!("expected Failed, got {other:?}"),
        }

        // Toggle was consumed: the following run completes normally, with
        // strictly increasing percents ending at 100.
        runner.start().unwrap();
        let (percents, outcome) = drain_run(&mut rx).await;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(percents.len(), 100);
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(percents.last(), Some(&100));
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_accepted_from_completion_handling() {
        let (runner, mut rx) = runner(2);
        runner.start().unwrap();
        let (_, outcome) = drain_run(&mut rx).await;
        assert_eq!(outcome, Outcome::Completed);

        // The terminal event is only sent after `running` reads false, so a
        // restart issued right after observing it must succeed.
        runner.start().unwrap();
        let (percents, outcome) = drain_run(&mut rx).await;
        assert_eq!(percents, vec![50, 100]);
        assert_eq!(outcome, Outcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_is_suppressed_when_reporting_disabled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = TaskRunner::new(
            RunConfig {
                reports_progress: false,
                ..config(4)
            },
            tx,
        );
        runner.start().unwrap();

        let (percents, outcome) = drain_run(&mut rx).await;
        assert!(percents.is_empty());
        assert_eq!(outcome, Outcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_ignored_when_unsupported() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = TaskRunner::new(
            RunConfig {
                supports_cancellation: false,
                ..config(3)
            },
            tx,
        );
        runner.start().unwrap();
        runner.request_cancel();

        let (percents, outcome) = drain_run(&mut rx).await;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(percents.len(), 3);
    }
}
