use crate::cli::Cli;
use crate::model::{Outcome, RunEvent};
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame, Terminal,
};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const LOG_CAPACITY: usize = 500;

struct UiState {
    percent: u8,
    work_count: u64,
    running: bool,
    info: String,
    log: Vec<String>,
    last_outcome: Option<Outcome>,
    supports_cancellation: bool,
    reports_progress: bool,
}

impl UiState {
    fn new(args: &Cli) -> Self {
        Self {
            percent: 0,
            work_count: 0,
            running: false,
            info: String::new(),
            log: Vec::new(),
            last_outcome: None,
            supports_cancellation: args.supports_cancellation,
            reports_progress: args.reports_progress,
        }
    }

    fn push_log(&mut self, msg: &str) {
        self.log.push(crate::cli::log_line(msg));
        if self.log.len() > LOG_CAPACITY {
            self.log.remove(0);
        }
    }
}

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels avoid backpressure between the worker and the UI drain loop.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<RunEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_args, event_rx, cmd_tx));

    let res = orchestrator::run_controller(&args, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    args: Cli,
    mut event_rx: UnboundedReceiver<RunEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::new(&args);
    state.push_log("Press 's' to start a run.");

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('s')) => {
                        // Mirrors a disabled start button; the controller
                        // rejection remains as a backstop.
                        if state.running {
                            state.info = "A run is already active.".into();
                        } else {
                            let _ = cmd_tx.send(UiCommand::Start);
                        }
                    }
                    (_, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Cancel);
                    }
                    (_, KeyCode::Char('e')) => {
                        let _ = cmd_tx.send(UiCommand::InjectFault);
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    res
}

fn apply_event(state: &mut UiState, ev: RunEvent) {
    match ev {
        RunEvent::RunStarted { run_id } => {
            state.running = true;
            state.percent = 0;
            state.work_count = 0;
            state.last_outcome = None;
            state.info.clear();
            state.push_log(&format!("Work started (run {run_id})..."));
        }
        RunEvent::Progress { percent } => {
            state.percent = percent;
            state.work_count += 1;
        }
        RunEvent::Info(info) => {
            let msg = info.to_message();
            state.info = msg.clone();
            state.push_log(&msg);
        }
        RunEvent::RunCompleted { outcome } => {
            state.running = false;
            let msg = match &outcome {
                Outcome::Completed => "Work completed.".to_string(),
                Outcome::Cancelled => "Work was cancelled.".to_string(),
                Outcome::Failed(fault) => format!("Work failed ==> {fault}"),
            };
            state.push_log(&msg);
            state.last_outcome = Some(outcome);
        }
    }
}

fn draw(area: Rect, f: &mut Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(area);

    f.render_widget(status_line(state), chunks[0]);
    f.render_widget(log_panel(state, chunks[1]), chunks[1]);
    f.render_widget(progress_gauge(state), chunks[2]);
}

fn status_line(state: &UiState) -> Paragraph<'_> {
    let run_style = if state.running {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let mut spans = vec![
        Span::styled(if state.running { "RUNNING" } else { "idle" }, run_style),
        Span::raw(format!("  work count: {}", state.work_count)),
    ];
    if !state.supports_cancellation {
        spans.push(Span::styled(
            "  [cancel disabled]",
            Style::default().fg(Color::Yellow),
        ));
    }
    if !state.reports_progress {
        spans.push(Span::styled(
            "  [progress disabled]",
            Style::default().fg(Color::Yellow),
        ));
    }
    if !state.info.is_empty() {
        spans.push(Span::styled(
            format!("  {}", state.info),
            Style::default().fg(Color::Yellow),
        ));
    }
    Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("bgwork | s start | c cancel | e inject fault | q quit"),
    )
}

fn log_panel(state: &UiState, area: Rect) -> Paragraph<'_> {
    let visible = (area.height as usize).saturating_sub(2);
    let start = state.log.len().saturating_sub(visible);
    let lines: Vec<Line> = state.log[start..]
        .iter()
        .map(|l| Line::from(l.as_str()))
        .collect();
    Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Log"))
}

fn progress_gauge(state: &UiState) -> Gauge<'_> {
    let color = match &state.last_outcome {
        Some(Outcome::Failed(_)) => Color::Red,
        Some(Outcome::Cancelled) => Color::Yellow,
        _ => Color::Green,
    };
    Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Style::default().fg(color))
        .ratio(f64::from(state.percent) / 100.0)
        .label(format!("{}%", state.percent))
}
