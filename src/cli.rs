use crate::model::{Outcome, RunConfig, RunEvent, RunReport};
use crate::runner::TaskRunner;
use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "bgwork-cli",
    version,
    about = "Cancelable background work runner with optional TUI"
)]
pub struct Cli {
    /// Number of work units to execute per run
    #[arg(long, default_value_t = 100)]
    pub target: u64,

    /// Simulated duration of one work unit
    #[arg(long, default_value = "200ms")]
    pub step_delay: humantime::Duration,

    /// Print a JSON report and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print timestamped log lines and a text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Allow cooperative cancellation of a running work loop
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub supports_cancellation: bool,

    /// Emit progress events while working
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub reports_progress: bool,

    /// Automatically start a run when the app launches (TUI mode)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub start_on_launch: bool,

    /// Request cancellation this long after the run starts (text/json modes)
    #[arg(long)]
    pub cancel_after: Option<humantime::Duration>,

    /// Arm the fault toggle this long after the run starts (text/json modes)
    #[arg(long)]
    pub fault_after: Option<humantime::Duration>,
}

pub async fn run(args: Cli) -> Result<()> {
    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args).await;
        }
    }

    if args.json {
        return run_json(args).await;
    }

    run_text(args).await
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> RunConfig {
    RunConfig {
        target: args.target,
        step_delay: Duration::from(args.step_delay),
        supports_cancellation: args.supports_cancellation,
        reports_progress: args.reports_progress,
    }
}

/// Prefix a message with an RFC 3339 timestamp, log-line style.
pub(crate) fn log_line(msg: &str) -> String {
    let ts = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into());
    format!("[{ts}] {msg}")
}

/// Schedule the scripted cancel/fault triggers, if requested.
fn schedule_triggers(args: &Cli, runner: &TaskRunner) {
    if let Some(after) = args.cancel_after {
        let runner = runner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after.into()).await;
            runner.request_cancel();
        });
    }
    if let Some(after) = args.fault_after {
        let runner = runner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after.into()).await;
            runner.inject_fault();
        });
    }
}

/// Ctrl-C requests cooperative cancellation instead of killing the process,
/// so the terminal outcome still reaches the drain loop.
fn cancel_on_ctrl_c(runner: &TaskRunner) {
    let runner = runner.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            runner.request_cancel();
        }
    });
}

/// Tracks one run from drained events and folds it into a `RunReport`.
#[derive(Default)]
struct RunTracker {
    run_id: String,
    progress_events: u64,
    last_percent: u8,
}

impl RunTracker {
    fn observe(&mut self, percent: u8) {
        self.progress_events += 1;
        self.last_percent = percent;
    }

    fn into_report(self, args: &Cli, outcome: Outcome, elapsed: Duration) -> RunReport {
        RunReport {
            timestamp_utc: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "now".into()),
            run_id: self.run_id,
            target: args.target,
            progress_events: self.progress_events,
            last_percent: self.last_percent,
            duration_ms: elapsed.as_millis() as u64,
            outcome,
        }
    }
}

/// Run one work cycle and fold its events into a report. `quiet` suppresses
/// the per-event log lines (JSON mode).
async fn drive_run(args: &Cli, quiet: bool) -> Result<RunReport> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RunEvent>();
    let runner = TaskRunner::new(build_config(args), event_tx);
    runner.start()?;
    schedule_triggers(args, &runner);
    cancel_on_ctrl_c(&runner);

    let started = std::time::Instant::now();
    let mut tracker = RunTracker::default();
    loop {
        // The runner outlives this loop, so the channel cannot close before
        // the terminal event arrives.
        let Some(ev) = event_rx.recv().await else {
            anyhow::bail!("event channel closed before the run completed");
        };
        match ev {
            RunEvent::RunStarted { run_id } => {
                if !quiet {
                    eprintln!("{}", log_line(&format!("Work started (run {run_id})...")));
                }
                tracker.run_id = run_id;
            }
            RunEvent::Progress { percent } => {
                tracker.observe(percent);
                if !quiet {
                    eprintln!("{}", log_line(&format!("Progress: {percent}%")));
                }
            }
            RunEvent::Info(info) => {
                if !quiet {
                    eprintln!("{}", log_line(&info.to_message()));
                }
            }
            RunEvent::RunCompleted { outcome } => {
                return Ok(tracker.into_report(args, outcome, started.elapsed()));
            }
        }
    }
}

async fn run_text(args: Cli) -> Result<()> {
    let report = drive_run(&args, false).await?;
    match &report.outcome {
        Outcome::Completed => eprintln!("{}", log_line("Work completed.")),
        Outcome::Cancelled => eprintln!("{}", log_line("Work was cancelled.")),
        Outcome::Failed(fault) => {
            eprintln!("{}", log_line(&format!("Work failed ==> {fault}")));
        }
    }
    let summary = crate::text_summary::build_text_summary(&report);
    for line in summary.lines {
        println!("{line}");
    }
    Ok(())
}

async fn run_json(args: Cli) -> Result<()> {
    let report = drive_run(&args, true).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
