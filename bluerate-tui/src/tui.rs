use crate::{
    command::{Command, parse_command},
    feeders::spawn_tui_feeders,
    report,
    session::{RateView, Session, SessionContext},
    styles,
    transcript::Transcript,
    view::{self, Activity, ChartPanel, ViewSnap},
};
use anyhow::Result;
use bluerate_common::ChartHistory;
use crossterm::{
    event::{Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const BRAILLE_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const MAILBOX: usize = 256;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub enum TuiMsg {
    InputEvent(CtEvent),
    Tick,
    RatesDone(bluerate_common::Result<RateView>),
    HistoryStarted,
    HistoryDone(bluerate_common::Result<ChartHistory>),
    OpError(String),
    Shutdown,
}

/// What the event loop must do after the state absorbed a message.
#[derive(Debug, PartialEq)]
enum Action {
    Start(SessionContext),
    Quit,
}

/// Everything on screen, independent of the terminal.
struct UiState {
    ctx: SessionContext,
    input: String,
    input_cursor: usize,
    transcript: Transcript,
    scroll: usize,
    chart: ChartPanel,
    activity: Activity,
    spin_idx: usize,
    dirty: bool,
}

impl UiState {
    fn new(ctx: SessionContext) -> Self {
        let mut transcript = Transcript::default();
        transcript.push(
            "Enter the dollars you would like to exchange and press Enter.",
            styles::system(),
        );
        transcript.push("Type /help for commands.", styles::dim());
        transcript.blank();
        Self {
            ctx,
            input: String::new(),
            input_cursor: 0,
            transcript,
            scroll: 0,
            chart: ChartPanel::Empty,
            activity: Activity::Idle,
            spin_idx: 0,
            dirty: true,
        }
    }

    fn busy(&self) -> bool {
        self.activity != Activity::Idle
    }

    fn spinner(&self) -> &'static str {
        if self.busy() {
            BRAILLE_FRAMES[self.spin_idx % BRAILLE_FRAMES.len()]
        } else {
            " "
        }
    }

    fn step_spinner(&mut self) {
        if self.busy() {
            self.spin_idx = (self.spin_idx + 1) % BRAILLE_FRAMES.len();
            self.dirty = true;
        }
    }

    fn settings_label(&self) -> String {
        format!("${:.2} • chart: {}", self.ctx.dollars, self.ctx.mode)
    }

    fn push<S: Into<String>>(&mut self, s: S, style: ratatui::style::Style) {
        self.transcript.push(s, style);
        self.scroll = 0;
        self.dirty = true;
    }

    fn push_blank(&mut self) {
        self.transcript.blank();
        self.dirty = true;
    }

    fn cursor_left(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        self.input_cursor -= 1;
        while self.input_cursor > 0 && !self.input.is_char_boundary(self.input_cursor) {
            self.input_cursor -= 1;
        }
    }

    fn cursor_right(&mut self) {
        if self.input_cursor >= self.input.len() {
            return;
        }
        self.input_cursor += 1;
        while self.input_cursor < self.input.len()
            && !self.input.is_char_boundary(self.input_cursor)
        {
            self.input_cursor += 1;
        }
    }

    fn insert_char(&mut self, ch: char) {
        self.input.insert(self.input_cursor, ch);
        self.input_cursor += ch.len_utf8();
    }

    fn backspace(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        let mut prev = self.input_cursor - 1;
        while prev > 0 && !self.input.is_char_boundary(prev) {
            prev -= 1;
        }
        self.input.drain(prev..self.input_cursor);
        self.input_cursor = prev;
    }

    fn delete(&mut self) {
        if self.input_cursor >= self.input.len() {
            return;
        }
        let start = self.input_cursor;
        let mut end = start + 1;
        while end < self.input.len() && !self.input.is_char_boundary(end) {
            end += 1;
        }
        self.input.drain(start..end);
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL)
            | (KeyCode::Char('q'), KeyModifiers::CONTROL) => return Some(Action::Quit),
            (KeyCode::PageUp, _) => self.scroll = self.scroll.saturating_add(5),
            (KeyCode::PageDown, _) => self.scroll = self.scroll.saturating_sub(5),
            (KeyCode::Up, _) => self.scroll = self.scroll.saturating_add(1),
            (KeyCode::Down, _) => self.scroll = self.scroll.saturating_sub(1),
            (KeyCode::Enter, _) => {
                let line = std::mem::take(&mut self.input);
                self.input_cursor = 0;
                self.dirty = true;
                return self.submit(&line);
            }
            (KeyCode::Left, _) => self.cursor_left(),
            (KeyCode::Right, _) => self.cursor_right(),
            (KeyCode::Home, _) => self.input_cursor = 0,
            (KeyCode::End, _) => self.input_cursor = self.input.len(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Esc, _) => {
                self.input.clear();
                self.input_cursor = 0;
            }
            (KeyCode::Char(ch), _) => self.insert_char(ch),
            _ => return None,
        }
        self.dirty = true;
        None
    }

    fn submit(&mut self, line: &str) -> Option<Action> {
        let s = line.trim();
        if s.is_empty() {
            return None;
        }
        match parse_command(s) {
            Command::Quit => Some(Action::Quit),
            Command::Fetch => self.start(),
            Command::AmountAndFetch(dollars) => {
                self.ctx.dollars = dollars;
                self.start()
            }
            Command::Amount(dollars) => {
                self.ctx.dollars = dollars;
                self.push(format!("✓ Amount set to ${dollars:.2}."), styles::system());
                self.push_blank();
                None
            }
            Command::Mode(mode) => {
                self.ctx.mode = mode;
                self.push(format!("✓ Chart mode set to {mode}."), styles::system());
                self.push_blank();
                None
            }
            Command::Help => {
                self.push("Commands:", styles::label());
                for (usage, what) in [
                    ("<dollars>", "set the amount and fetch"),
                    ("/fetch", "fetch rates and chart for the current amount"),
                    ("/amount <n>", "set the amount without fetching"),
                    ("/mode <m>", "chart as structured data or screenshot"),
                    ("/quit", "exit"),
                ] {
                    self.push(format!("  {usage:<12} {what}"), styles::value());
                }
                self.push_blank();
                None
            }
            Command::Invalid(msg) => {
                self.push(format!("× {msg}"), styles::error());
                self.push_blank();
                None
            }
            Command::Unknown(text) => {
                self.push(format!("× Unknown input: {text}"), styles::error());
                self.push("Try `/help`.", styles::dim());
                self.push_blank();
                None
            }
        }
    }

    /// Begin an interaction unless one is already in flight.
    fn start(&mut self) -> Option<Action> {
        if self.busy() {
            self.push(
                "× Still fetching; wait for the current request to finish.",
                styles::error(),
            );
            self.push_blank();
            return None;
        }
        self.push("→ [You]", styles::user_header());
        self.push(
            format!("  Exchange ${:.2} (chart: {})", self.ctx.dollars, self.ctx.mode),
            styles::value(),
        );
        self.push_blank();
        self.activity = Activity::FetchingRates;
        self.chart = ChartPanel::Loading;
        Some(Action::Start(self.ctx.clone()))
    }

    fn on_rates(&mut self, rates: bluerate_common::Result<RateView>) {
        match rates {
            Ok(view) => {
                self.push("← [Rates]", styles::rate_header());
                let lines = report::rate_lines(&view);
                let last = lines.len().saturating_sub(1);
                for (i, line) in lines.into_iter().enumerate() {
                    let style = if i == last {
                        styles::emphasis()
                    } else {
                        styles::rate_text()
                    };
                    self.push(format!("  {line}"), style);
                }
            }
            Err(e) => self.push(format!("× {}", report::rate_error_line(&e)), styles::error()),
        }
        self.push_blank();
    }

    fn on_history(&mut self, history: bluerate_common::Result<ChartHistory>) {
        match history {
            Ok(history) => {
                self.push(format!("← [{}]", report::CHART_CAPTION), styles::chart_header());
                for line in report::history_lines(&history) {
                    self.push(format!("  {line}"), styles::value());
                }
                self.chart = ChartPanel::Ready(history);
            }
            Err(e) => {
                let line = report::history_error_line(&e);
                self.push(format!("× {line}"), styles::error());
                self.chart = ChartPanel::Failed(line);
            }
        }
        self.push_blank();
        self.activity = Activity::Idle;
    }
}

/// Terminal front end: owns the screen and runs interactions in the
/// background, one at a time.
pub struct TuiApp {
    session: Session,
    state: UiState,
    tx: mpsc::Sender<TuiMsg>,
    rx: mpsc::Receiver<TuiMsg>,
    cancel: CancellationToken,
    interaction: Option<JoinHandle<()>>,
    term: Terminal<CrosstermBackend<Stdout>>,
}

impl TuiApp {
    pub fn new(session: Session, ctx: SessionContext, cancel: CancellationToken) -> Result<Self> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut term = Terminal::new(backend)?;
        term.clear()?;

        let (tx, rx) = mpsc::channel(MAILBOX);
        Ok(Self {
            session,
            state: UiState::new(ctx),
            tx,
            rx,
            cancel,
            interaction: None,
            term,
        })
    }

    /// Run until the user quits or `cancel` fires.
    pub async fn run(mut self) -> Result<()> {
        spawn_tui_feeders(self.tx.clone(), self.cancel.clone());
        self.draw()?;
        loop {
            let msg = tokio::select! {
                _ = self.cancel.cancelled() => TuiMsg::Shutdown,
                msg = self.rx.recv() => msg.unwrap_or(TuiMsg::Shutdown),
            };
            if !self.handle(msg)? {
                break;
            }
        }
        info!(target: "tui", "shutting down");
        self.finish_interaction().await;
        Ok(())
    }

    /// Give a cancelled interaction time to close its browser session.
    async fn finish_interaction(&mut self) {
        let Some(mut handle) = self.interaction.take() else {
            return;
        };
        if handle.is_finished() {
            return;
        }
        self.state.push("Closing browser session…", styles::dim());
        self.draw().ok();
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
            warn!(
                target: "tui",
                grace_s = SHUTDOWN_GRACE.as_secs(),
                "interaction did not stop in time"
            );
            handle.abort();
        }
    }

    /// Returns `false` once the loop should stop.
    fn handle(&mut self, msg: TuiMsg) -> Result<bool> {
        let action = match msg {
            TuiMsg::InputEvent(CtEvent::Key(k)) => self.state.handle_key(k),
            TuiMsg::InputEvent(CtEvent::Resize(..)) => {
                self.state.dirty = true;
                None
            }
            TuiMsg::InputEvent(_) => None,
            TuiMsg::RatesDone(rates) => {
                self.state.on_rates(rates);
                None
            }
            TuiMsg::HistoryStarted => {
                self.state.activity = Activity::FetchingHistory;
                self.state.dirty = true;
                None
            }
            TuiMsg::HistoryDone(history) => {
                self.state.on_history(history);
                self.interaction = None;
                None
            }
            TuiMsg::OpError(e) => {
                self.state.push(format!("× Error: {e}"), styles::error());
                self.state.push_blank();
                None
            }
            TuiMsg::Tick => {
                self.state.step_spinner();
                if self.state.dirty {
                    self.draw()?;
                }
                None
            }
            TuiMsg::Shutdown => Some(Action::Quit),
        };

        match action {
            Some(Action::Start(ctx)) => self.spawn_interaction(ctx),
            Some(Action::Quit) => {
                self.cancel.cancel();
                return Ok(false);
            }
            None => {}
        }
        Ok(true)
    }

    fn spawn_interaction(&mut self, ctx: SessionContext) {
        debug!(target: "tui", dollars = ctx.dollars, mode = %ctx.mode, "interaction started");
        let session = self.session.clone();
        let tx = self.tx.clone();
        self.interaction = Some(tokio::spawn(async move {
            let rates = session.quote(&ctx).await;
            if tx.send(TuiMsg::RatesDone(rates)).await.is_err() {
                return;
            }
            let _ = tx.send(TuiMsg::HistoryStarted).await;
            let history = session.history(&ctx).await;
            let _ = tx.send(TuiMsg::HistoryDone(history)).await;
        }));
    }

    fn draw(&mut self) -> Result<()> {
        let s = &self.state;
        let snap = ViewSnap {
            input: &s.input,
            input_cursor: s.input_cursor,
            lines: s.transcript.lines(),
            scroll: s.scroll,
            activity: s.activity,
            spinner: s.spinner(),
            chart: &s.chart,
            settings: s.settings_label(),
            source: s.ctx.source_url.as_str(),
        };
        view::draw(&mut self.term, &snap)?;
        self.state.dirty = false;
        Ok(())
    }
}

impl Drop for TuiApp {
    fn drop(&mut self) {
        disable_raw_mode().ok();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}
