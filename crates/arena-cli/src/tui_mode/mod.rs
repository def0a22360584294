//! Interactive dashboard for plan execution.
//!
//! Provides a live terminal UI showing:
//! - Elapsed time and overall completion
//! - Per-run status with durations
//! - The selected run's conversation or error
//! - Recent log lines (stderr is intercepted while the dashboard is up)
//!
//! The executor runs on its own thread with a private tokio runtime. Leaving
//! the dashboard early does not stop it: the thread is never joined, so runs
//! keep going for as long as the process lives, and the runs observed so far
//! are returned.

// TUI-specific lint allowances - ratatui layouts have fixed indices
#![allow(clippy::indexing_slicing)]

use arena::executor::{ExecutionOutcome, Executor};
use arena::logging::LogInterceptor;
use arena::mode::TerminalProbe;
use arena::model::{ExecutionParams, RunId, RunPlan, RunStatus};
use arena::observer::{ChannelObserver, Mailbox, Observer, ProgressEvent};
use arena::progress::{ProgressModel, RenderState, RunRecord};
use arena::summary::format_duration;
use arena::ArenaError;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, Level};

/// Terminal size from crossterm, `None` when stdout is not a terminal.
pub struct CrosstermProbe;

impl TerminalProbe for CrosstermProbe {
    fn size(&self) -> Option<(u16, u16)> {
        if !io::stdout().is_terminal() {
            return None;
        }
        crossterm::terminal::size().ok()
    }
}

/// Width for the boxed summary printed after the dashboard closes.
pub fn summary_width() -> u16 {
    crossterm::terminal::size().map_or(80, |(width, _)| width.min(100))
}

/// Result of a dashboard session.
pub struct DashboardRun {
    pub outcome: ExecutionOutcome,
    pub model: ProgressModel,
}

type Done = oneshot::Receiver<ExecutionOutcome>;

/// Run `plan` behind the dashboard until the user quits.
pub fn run_dashboard(
    executor: Executor,
    plan: Arc<RunPlan>,
    params: &ExecutionParams,
) -> Result<DashboardRun, ArenaError> {
    let mut app = App::new(plan.len());
    let (observer, mut mailbox) = ChannelObserver::channel();
    let observer: Arc<dyn Observer> = Arc::new(observer);

    let mut interceptor = LogInterceptor::stderr();
    if let Some(path) = params.log_file() {
        interceptor = interceptor.with_log_file(&path)?;
    }
    let guard = interceptor.start_intercepting();
    let dispatch = interceptor.dispatch(
        crate::log_filter(params.verbose),
        Some(Arc::clone(&observer)),
    );
    let render_default = tracing::dispatcher::set_default(&dispatch);

    let executor = executor
        .with_observer(observer)
        .with_log_dispatch(dispatch.clone());
    let mut done = spawn_executor(executor, plan, params.concurrency, dispatch)?;
    app.transition(RenderState::Running);

    let loop_result = with_terminal(|terminal| run_app(terminal, &mut app, &mut mailbox, &mut done));
    let outcome = resolve_outcome(&mut app, &mut mailbox, &mut done);

    app.transition(RenderState::Finalizing);
    drop(render_default);
    if let Err(err) = guard.finish() {
        eprintln!("warning: {err}");
    }
    app.transition(RenderState::Terminated);

    loop_result?;
    Ok(DashboardRun {
        outcome,
        model: app.model,
    })
}

/// Start `execute_runs` on a dedicated thread that owns its runtime.
///
/// The thread is detached. The returned receiver fires once the executor
/// finishes; dropping it does not stop the runs.
fn spawn_executor(
    executor: Executor,
    plan: Arc<RunPlan>,
    concurrency: usize,
    dispatch: Dispatch,
) -> Result<Done, ArenaError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| ArenaError::presentation("failed to start runtime", err))?;
    let (done_tx, done_rx) = oneshot::channel();
    thread::Builder::new()
        .name("arena-executor".to_string())
        .spawn(move || {
            let outcome = runtime.block_on(
                async move {
                    executor
                        .execute_runs(CancellationToken::new(), plan, concurrency)
                        .await
                }
                .with_subscriber(dispatch),
            );
            // Ignore send error if the dashboard already gave up on us
            let _ = done_tx.send(outcome);
        })
        .map_err(|err| ArenaError::presentation("failed to start executor thread", err))?;
    Ok(done_rx)
}

/// Settle what the dashboard reports once its loop ended, without blocking.
///
/// Prefers the executor's own outcome (with any fatal error). If the
/// executor is still running, the runs completed so far are returned with
/// no error.
fn resolve_outcome(app: &mut App, mailbox: &mut Mailbox, done: &mut Done) -> ExecutionOutcome {
    while let Ok(event) = mailbox.try_recv() {
        app.apply(&event);
    }
    if let Some(outcome) = app.outcome.take() {
        return outcome;
    }
    if let Ok(outcome) = done.try_recv() {
        return outcome;
    }
    tracing::info!(
        completed = app.model.completed_count(),
        total = app.model.total(),
        "dashboard closed before execution finished"
    );
    ExecutionOutcome {
        run_ids: app.model.completed_run_ids(),
        error: None,
    }
}

/// Enter the alternate screen, run `body`, and always restore the terminal.
fn with_terminal<F>(body: F) -> Result<(), ArenaError>
where
    F: FnOnce(&mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<(), ArenaError>,
{
    let setup = |err| ArenaError::presentation("failed to set up terminal", err);
    enable_raw_mode().map_err(setup)?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(setup)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout)).map_err(setup)?;

    let result = body(&mut terminal);

    let restore = |err| ArenaError::presentation("failed to restore terminal", err);
    disable_raw_mode().map_err(restore)?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).map_err(restore)?;
    terminal.show_cursor().map_err(restore)?;
    result
}

/// Pane receiving arrow keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pane {
    Runs,
    Logs,
    Detail,
}

impl Pane {
    fn next(self) -> Self {
        match self {
            Self::Runs => Self::Logs,
            Self::Logs => Self::Detail,
            Self::Detail => Self::Runs,
        }
    }
}

/// Application state for the dashboard.
struct App {
    model: ProgressModel,
    state: RenderState,
    outcome: Option<ExecutionOutcome>,
    focus: Pane,
    /// Position in the runs list, in plan order.
    cursor: usize,
    selected: Option<RunId>,
    /// Lines scrolled back from the newest log line.
    log_scroll: usize,
    detail_scroll: u16,
}

impl App {
    fn new(total: usize) -> Self {
        Self {
            model: ProgressModel::new(total),
            state: RenderState::Initializing,
            outcome: None,
            focus: Pane::Runs,
            cursor: 0,
            selected: None,
            log_scroll: 0,
            detail_scroll: 0,
        }
    }

    fn transition(&mut self, next: RenderState) {
        if self.state.can_transition_to(next) {
            self.state = next;
        } else {
            tracing::debug!(from = ?self.state, to = ?next, "ignoring render state change");
        }
    }

    fn apply(&mut self, event: &ProgressEvent) {
        if self.state != RenderState::Terminated {
            self.model.apply(event);
        }
    }

    fn complete(&mut self, outcome: ExecutionOutcome) {
        self.outcome = Some(outcome);
        self.transition(RenderState::Completed);
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.quit();
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.quit(),
            KeyCode::Esc if self.selected.is_some() => self.deselect(),
            KeyCode::Esc => self.quit(),
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::Enter if self.focus == Pane::Runs => self.toggle_selection(),
            KeyCode::Up | KeyCode::Char('k') => self.scroll_up(),
            KeyCode::Down | KeyCode::Char('j') => self.scroll_down(),
            _ => {}
        }
    }

    fn scroll_up(&mut self) {
        match self.focus {
            Pane::Runs => self.cursor = self.cursor.saturating_sub(1),
            Pane::Logs => {
                let oldest = self.model.logs().len().saturating_sub(1);
                self.log_scroll = (self.log_scroll + 1).min(oldest);
            }
            Pane::Detail => self.detail_scroll = self.detail_scroll.saturating_sub(1),
        }
    }

    fn scroll_down(&mut self) {
        match self.focus {
            Pane::Runs => {
                let last = self.model.started_count().saturating_sub(1);
                self.cursor = (self.cursor + 1).min(last);
            }
            Pane::Logs => self.log_scroll = self.log_scroll.saturating_sub(1),
            Pane::Detail => self.detail_scroll = self.detail_scroll.saturating_add(1),
        }
    }

    /// Select the run under the cursor, or clear the selection if it is
    /// already the selected one.
    fn toggle_selection(&mut self) {
        let Some(run_id) = self
            .model
            .records_in_plan_order()
            .get(self.cursor)
            .map(|record| record.run_id)
        else {
            return;
        };
        if self.selected == Some(run_id) {
            self.deselect();
        } else {
            self.selected = Some(run_id);
            self.detail_scroll = 0;
        }
    }

    fn deselect(&mut self) {
        self.selected = None;
        self.detail_scroll = 0;
        self.focus = Pane::Runs;
    }

    fn selected_record(&self) -> Option<&RunRecord> {
        self.selected.as_ref().and_then(|id| self.model.record(id))
    }

    fn quit(&mut self) {
        match self.state {
            RenderState::Running => self.transition(RenderState::UserExit),
            RenderState::Completed => self.transition(RenderState::Finalizing),
            _ => {}
        }
    }

    fn should_exit(&self) -> bool {
        matches!(self.state, RenderState::UserExit) || self.state.is_done()
    }
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mailbox: &mut Mailbox,
    done: &mut Done,
) -> Result<(), ArenaError> {
    let io_err = |err| ArenaError::presentation("terminal i/o failed", err);
    loop {
        terminal.draw(|f| ui(f, app)).map_err(io_err)?;

        // Handle incoming events from the executor
        while let Ok(event) = mailbox.try_recv() {
            app.apply(&event);
        }
        if app.outcome.is_none() && app.state == RenderState::Running {
            if let Ok(outcome) = done.try_recv() {
                app.complete(outcome);
            }
        }

        // Handle keyboard input
        if event::poll(Duration::from_millis(50)).map_err(io_err)? {
            if let Event::Key(key) = event::read().map_err(io_err)? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if app.should_exit() {
            return Ok(());
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(f.area());
    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[2]);

    render_header(f, chunks[0], app);
    render_gauge(f, chunks[1], app);
    render_runs(f, middle[0], app);
    render_detail(f, middle[1], app);
    render_logs(f, chunks[3], app);
    render_footer(f, chunks[4], app);
}

fn pane_block(title: &str, focused: bool) -> Block<'_> {
    let color = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let content = Line::from(vec![
        Span::styled(" Arena ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::raw(format!("{} combinations", app.model.total())),
        Span::raw(" │ "),
        Span::styled(
            format!("elapsed {}", format_duration(app.model.elapsed())),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    f.render_widget(Paragraph::new(content).block(block), area);
}

fn render_gauge(f: &mut Frame, area: Rect, app: &App) {
    let total = app.model.total();
    let completed = app.model.completed_count();
    let percent = if total == 0 {
        100
    } else {
        u16::try_from(completed * 100 / total).unwrap_or(100)
    };
    let color = if app.model.failed_count() > 0 {
        Color::Yellow
    } else {
        Color::Green
    };
    let gauge = Gauge::default()
        .block(Block::default().title(" Progress ").borders(Borders::ALL))
        .gauge_style(Style::default().fg(color))
        .percent(percent.min(100))
        .label(format!("{completed}/{total}"));
    f.render_widget(gauge, area);
}

fn status_style(status: RunStatus) -> (&'static str, Style) {
    match status {
        RunStatus::Running => ("▶", Style::default().fg(Color::Yellow)),
        RunStatus::Completed => ("✓", Style::default().fg(Color::Green)),
        RunStatus::Failed => ("✗", Style::default().fg(Color::Red)),
    }
}

fn render_runs(f: &mut Frame, area: Rect, app: &App) {
    let block = pane_block(" Runs ", app.focus == Pane::Runs);
    // Keep the cursor row on screen
    let visible = usize::from(area.height.saturating_sub(2)).max(1);
    let skip = app.cursor.saturating_sub(visible - 1);

    let items: Vec<ListItem> = app
        .model
        .records_in_plan_order()
        .into_iter()
        .enumerate()
        .skip(skip)
        .map(|(row, record)| {
            let (icon, style) = status_style(record.status);
            let duration_str = record
                .duration
                .map(|d| format!(" ({})", format_duration(d)))
                .unwrap_or_default();
            let marker = if app.selected == Some(record.run_id) { "● " } else { "  " };

            let mut item = ListItem::new(Line::from(vec![
                Span::raw(marker),
                Span::styled(format!("{icon} "), style),
                Span::styled(record.combination.to_string(), style),
                Span::styled(duration_str, Style::default().fg(Color::DarkGray)),
            ]));
            if row == app.cursor {
                item = item.style(Style::default().add_modifier(Modifier::REVERSED));
            }
            item
        })
        .collect();

    f.render_widget(List::new(items).block(block), area);
}

/// Text shown in the detail pane for one run.
fn detail_lines(record: &RunRecord) -> Vec<Line<'static>> {
    let (icon, style) = status_style(record.status);
    let mut lines = vec![
        Line::from(Span::styled(
            record.combination.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled(format!("{icon} {:?}", record.status), style),
            Span::styled(
                record
                    .duration
                    .map(|d| format!("  {}", format_duration(d)))
                    .unwrap_or_default(),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(Span::styled(
            format!("run {}", record.run_id),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    if let Some(error) = &record.error {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            format!("error: {error}"),
            Style::default().fg(Color::Red),
        )));
    }
    for message in &record.messages {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            format!("{}:", message.role),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        lines.extend(message.content.lines().map(|text| Line::raw(text.to_string())));
    }
    if record.status == RunStatus::Running {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            "waiting for the provider...",
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

fn render_detail(f: &mut Frame, area: Rect, app: &App) {
    let block = pane_block(" Result ", app.focus == Pane::Detail);
    let lines = match app.selected_record() {
        Some(record) => detail_lines(record),
        None => vec![Line::from(Span::styled(
            "Select a run with Enter to see its conversation",
            Style::default().fg(Color::DarkGray),
        ))],
    };
    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll, 0));
    f.render_widget(paragraph, area);
}

fn render_logs(f: &mut Frame, area: Rect, app: &App) {
    let block = pane_block(" Logs ", app.focus == Pane::Logs);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines: Vec<Line> = app
        .model
        .logs()
        .rev()
        .skip(app.log_scroll)
        .take(usize::from(inner.height))
        .map(|log| {
            let color = match log.level {
                Level::ERROR => Color::Red,
                Level::WARN => Color::Yellow,
                Level::INFO => Color::Reset,
                _ => Color::DarkGray,
            };
            Line::from(vec![
                Span::styled(format!("{:>5} ", log.level.as_str()), Style::default().fg(color)),
                Span::raw(log.text.clone()),
            ])
        })
        .collect();
    lines.reverse();
    f.render_widget(Paragraph::new(lines), inner);
}

fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let status = match app.state {
        RenderState::Completed => match app.outcome.as_ref().and_then(|o| o.error.as_ref()) {
            Some(err) => Span::styled(
                format!("Stopped: {}", err.message.chars().take(50).collect::<String>()),
                Style::default().fg(Color::Red),
            ),
            None => Span::styled("Completed", Style::default().fg(Color::Green)),
        },
        _ => Span::styled("Running", Style::default().fg(Color::Yellow)),
    };

    let counts = format!(
        "{}/{} done │ {} failed │ {} running",
        app.model.completed_count(),
        app.model.total(),
        app.model.failed_count(),
        app.model.in_flight()
    );

    let hints = if app.selected.is_some() {
        "[q]uit [esc]back [tab]focus [↑↓]scroll"
    } else {
        "[q]uit [enter]open [tab]focus [↑↓]scroll"
    };

    let content = Line::from(vec![
        Span::raw(" "),
        status,
        Span::raw(" │ "),
        Span::raw(counts),
        Span::raw(" │ "),
        Span::styled(hints, Style::default().fg(Color::DarkGray)),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    f.render_widget(Paragraph::new(content).block(block), area);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use arena::model::{Combination, Message, RunResult};
    use arena::observer::{RunCompleted, RunStarted};
    use arena::provider::{MockConfig, MockProvider};
    use arena::store::{MemoryResultStore, ResultStore};
    use arena::ErrorCode;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn running_app(total: usize) -> App {
        let mut app = App::new(total);
        app.transition(RenderState::Running);
        app
    }

    fn started(index: usize, total: usize) -> RunStarted {
        RunStarted {
            index,
            total,
            run_id: RunId::new(),
            combination: Combination::new("us", "mock", format!("s{index}")),
        }
    }

    fn completed(event: &RunStarted, outcome: Result<Vec<Message>, String>) -> RunCompleted {
        let result = RunResult::new(
            event.run_id,
            &event.combination,
            outcome,
            0,
            Duration::from_millis(5),
        );
        RunCompleted {
            index: event.index,
            result: Arc::new(result),
        }
    }

    fn start_and_finish(app: &mut App, index: usize) -> RunId {
        let event = started(index, app.model.total());
        app.apply(&ProgressEvent::RunStarted(event.clone()));
        let done = completed(&event, Ok(vec![Message::assistant(format!("reply {index}"))]));
        app.apply(&ProgressEvent::RunCompleted(done));
        event.run_id
    }

    // =========================================================================
    // Keys
    // =========================================================================

    #[test]
    fn quitting_while_running_is_a_user_exit() {
        let mut app = running_app(3);
        let first = start_and_finish(&mut app, 0);
        app.handle_key(key(KeyCode::Char('q')));

        assert_eq!(app.state, RenderState::UserExit);
        assert!(app.should_exit());
        assert!(app.outcome.is_none());
        assert_eq!(app.model.completed_run_ids(), vec![first]);
    }

    #[test]
    fn ctrl_c_exits_like_q() {
        let mut app = running_app(1);
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(app.state, RenderState::UserExit);
    }

    #[test]
    fn completed_dashboard_waits_for_the_user() {
        let mut app = running_app(1);
        let only = start_and_finish(&mut app, 0);
        app.complete(ExecutionOutcome {
            run_ids: vec![only],
            error: None,
        });

        assert_eq!(app.state, RenderState::Completed);
        assert!(!app.should_exit());

        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.state, RenderState::Finalizing);
        assert!(app.should_exit());
    }

    #[test]
    fn cursor_stays_within_started_runs() {
        let mut app = running_app(3);
        start_and_finish(&mut app, 0);
        start_and_finish(&mut app, 1);

        app.handle_key(key(KeyCode::Up));
        assert_eq!(app.cursor, 0);
        for _ in 0..5 {
            app.handle_key(key(KeyCode::Char('j')));
        }
        assert_eq!(app.cursor, 1);
    }

    #[test]
    fn tab_cycles_runs_logs_result() {
        let mut app = running_app(1);
        assert_eq!(app.focus, Pane::Runs);
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.focus, Pane::Logs);
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.focus, Pane::Detail);
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.focus, Pane::Runs);
    }

    #[test]
    fn enter_opens_the_run_and_esc_goes_back() {
        let mut app = running_app(2);
        start_and_finish(&mut app, 0);
        let second = start_and_finish(&mut app, 1);

        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.selected, Some(second));
        let record = app.selected_record().unwrap();
        assert_eq!(record.messages, vec![Message::assistant("reply 1")]);

        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.selected, None);
        assert_eq!(app.focus, Pane::Runs);
        assert_eq!(app.state, RenderState::Running);

        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.state, RenderState::UserExit);
    }

    #[test]
    fn enter_on_the_selected_run_closes_it() {
        let mut app = running_app(1);
        start_and_finish(&mut app, 0);
        app.handle_key(key(KeyCode::Enter));
        assert!(app.selected.is_some());
        app.handle_key(key(KeyCode::Enter));
        assert!(app.selected.is_none());
    }

    #[test]
    fn detail_shows_error_or_conversation() {
        let event = started(0, 1);
        let mut model = ProgressModel::new(1);
        model.apply(&ProgressEvent::RunStarted(event.clone()));
        model.apply(&ProgressEvent::RunCompleted(completed(
            &event,
            Err("quota exceeded".to_string()),
        )));

        let text: Vec<String> = detail_lines(model.record(&event.run_id).unwrap())
            .iter()
            .map(ToString::to_string)
            .collect();
        assert!(text.iter().any(|line| line == "error: quota exceeded"));
        assert!(text.iter().any(|line| line == "mock/s0/us"));
    }

    // =========================================================================
    // Outcome after the loop ends
    // =========================================================================

    #[test]
    fn early_exit_returns_runs_completed_so_far() {
        let mut app = running_app(3);
        let (observer, mut mailbox) = ChannelObserver::channel();
        let (_done_tx, mut done_rx) = oneshot::channel::<ExecutionOutcome>();

        let first = started(0, 3);
        let second = started(1, 3);
        observer.on_run_start(first.clone());
        observer.on_run_complete(completed(&first, Ok(vec![Message::assistant("hi")])));
        observer.on_run_start(second);
        app.handle_key(key(KeyCode::Char('q')));

        let outcome = resolve_outcome(&mut app, &mut mailbox, &mut done_rx);

        assert_eq!(outcome.run_ids, vec![first.run_id]);
        assert!(outcome.error.is_none());
        assert_eq!(app.model.started_count(), 2);
        assert_eq!(app.model.in_flight(), 1);
    }

    #[test]
    fn finished_executor_outcome_wins() {
        let mut app = running_app(2);
        let (_observer, mut mailbox) = ChannelObserver::channel();
        let (done_tx, mut done_rx) = oneshot::channel();
        let finished = RunId::new();
        done_tx
            .send(ExecutionOutcome {
                run_ids: vec![finished],
                error: Some(ArenaError::unreachable_provider("provider down")),
            })
            .unwrap();
        app.handle_key(key(KeyCode::Char('q')));

        let outcome = resolve_outcome(&mut app, &mut mailbox, &mut done_rx);

        assert_eq!(outcome.run_ids, vec![finished]);
        assert_eq!(outcome.error.unwrap().code, ErrorCode::ProviderUnreachable);
    }

    #[test]
    fn executor_keeps_running_after_the_dashboard_returns() {
        let store = Arc::new(MemoryResultStore::new());
        let config = MockConfig {
            latency_ms: 50,
            ..MockConfig::default()
        };
        let executor = Executor::new(
            Arc::new(MockProvider::new(config)),
            Arc::clone(&store) as Arc<dyn ResultStore>,
        );
        let scenarios: Vec<String> = (0..4).map(|i| format!("s{i}")).collect();
        let plan = Arc::new(RunPlan::from_filters(
            &["us".to_string()],
            &["mock".to_string()],
            &scenarios,
        ));

        let mut done_rx = spawn_executor(executor, plan, 1, Dispatch::none()).unwrap();
        thread::sleep(Duration::from_millis(75));

        let mut app = running_app(4);
        app.handle_key(key(KeyCode::Char('q')));
        let (_observer, mut mailbox) = ChannelObserver::channel();
        let early = resolve_outcome(&mut app, &mut mailbox, &mut done_rx);
        assert!(early.error.is_none());
        assert!(store.len() < 4);

        let mut outcome = None;
        for _ in 0..150 {
            if let Ok(finished) = done_rx.try_recv() {
                outcome = Some(finished);
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        let outcome = outcome.unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.run_ids.len(), 4);
        assert_eq!(store.len(), 4);
    }
}
