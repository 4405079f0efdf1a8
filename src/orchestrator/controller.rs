//! Run lifecycle controller.
//!
//! Routes observer commands to the runner and emits info events for
//! presentation layers.

use crate::cli::{build_config, Cli};
use crate::model::{InfoEvent, RunEvent};
use crate::runner::TaskRunner;
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::Duration;

/// Commands emitted by UI layers to control the runner.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Start,
    Cancel,
    InjectFault,
    Quit,
}

/// Drive the runner from observer commands until quit.
///
/// Quit is serialized: the active run is cancelled and the controller waits
/// for it to finish, so the terminal outcome still reaches the UI before
/// shutdown.
pub(crate) async fn run_controller(
    args: &Cli,
    event_tx: UnboundedSender<RunEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let runner = TaskRunner::new(build_config(args), event_tx.clone());

    if args.start_on_launch {
        if let Err(e) = runner.start() {
            let _ = event_tx.send(RunEvent::Info(InfoEvent::Message(format!(
                "Start failed: {e}"
            ))));
        }
    }

    let mut quit_pending = false;
    let mut shutdown_poll = tokio::time::interval(Duration::from_millis(50));

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Start) => {
                        if let Err(e) = runner.start() {
                            let _ = event_tx.send(RunEvent::Info(InfoEvent::Message(format!(
                                "Start rejected: {e}"
                            ))));
                        }
                    }
                    Some(UiCommand::Cancel) => {
                        runner.request_cancel();
                        if runner.is_running() {
                            let _ = event_tx.send(RunEvent::Info(InfoEvent::CancelRequested));
                        }
                    }
                    Some(UiCommand::InjectFault) => {
                        runner.inject_fault();
                        let _ = event_tx.send(RunEvent::Info(InfoEvent::FaultArmed));
                    }
                    Some(UiCommand::Quit) | None => {
                        quit_pending = true;
                        runner.request_cancel();
                        if !runner.is_running() {
                            break;
                        }
                    }
                }
            }
            _ = shutdown_poll.tick() => {
                if quit_pending && !runner.is_running() {
                    break;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Outcome;
    use clap::Parser;
    use tokio::sync::mpsc;

    fn test_args(target: &str) -> Cli {
        Cli::parse_from([
            "bgwork-cli",
            "--target",
            target,
            "--step-delay",
            "200ms",
            "--text",
        ])
    }

    #[tokio::test(start_paused = true)]
    async fn quit_cancels_active_run_and_waits_for_terminal_event() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let args = test_args("1000");

        let controller =
            tokio::spawn(async move { run_controller(&args, event_tx, cmd_rx).await });

        cmd_tx.send(UiCommand::Quit).unwrap();
        controller.await.unwrap().unwrap();

        let mut terminal = None;
        while let Ok(ev) = event_rx.try_recv() {
            if let RunEvent::RunCompleted { outcome } = ev {
                terminal = Some(outcome);
            }
        }
        assert_eq!(terminal, Some(Outcome::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_surfaces_an_info_message() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let args = test_args("1000");

        let controller =
            tokio::spawn(async move { run_controller(&args, event_tx, cmd_rx).await });

        cmd_tx.send(UiCommand::Start).unwrap();
        cmd_tx.send(UiCommand::Quit).unwrap();
        controller.await.unwrap().unwrap();

        let mut saw_rejection = false;
        while let Ok(ev) = event_rx.try_recv() {
            if let RunEvent::Info(InfoEvent::Message(msg)) = ev {
                saw_rejection |= msg.contains("already in progress");
            }
        }
        assert!(saw_rejection);
    }
}
