/// Ratatui-based control panel.
///
/// Architecture:
///   main thread:  event loop: crossterm keyboard events + mpsc UiEvent drain
///   action task:  tokio::spawn per dispatched action: sends the completion back
///
/// Layout:
///   ┌────────────────────────────────────────────────┐
///   │  tab bar (1 line)                              │
///   ├────────────────────────────────────────────────┤
///   │  active tab panel                              │
///   ├────────────────────────────────────────────────┤
///   │  response console                              │
///   ├────────────────────────────────────────────────┤
///   │  status bar + key hints (2 lines)              │
///   └────────────────────────────────────────────────┘
pub mod forms;
pub mod render;
pub mod stacks_view;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing::info;

use crate::actions::{ActionCompletion, ActionId, ActionTrigger, Dispatcher};
use crate::client::HttpTransport;
use crate::config::ResolvedConfig;
use crate::panel::tabs::{Cycle, Tab};
use crate::panel::{Field, PanelState};
use crate::prefs::PreferenceStore;

// ── UiEvent: typed events from action tasks → TUI ───────────────────────────

#[derive(Debug)]
pub enum UiEvent {
    ActionDone(ActionCompletion),
}

// ── Modes ─────────────────────────────────────────────────────────────────────

/// In-progress edit of one form field. Committed on Enter (single-line) or Esc.
#[derive(Debug, Clone, PartialEq)]
pub struct EditBuffer {
    pub field: Field,
    pub text: String,
    /// Byte offset into `text`
    pub cursor: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Normal,
    Editing(EditBuffer),
}

/// Fields that can take focus on each tab, top to bottom.
pub fn tab_fields(tab: Tab) -> &'static [Field] {
    match tab {
        Tab::Settings => &[Field::BaseUrl, Field::ApiKey],
        Tab::Create => &[Field::TargetPort, Field::PodSpec],
        Tab::Inspect => &[Field::StackId],
        Tab::Stacks | Tab::Service => &[],
    }
}

// ── AppState ──────────────────────────────────────────────────────────────────

pub struct AppState {
    pub panel: PanelState,
    pub mode: Mode,
    /// Index into `tab_fields(active tab)`
    pub focus: usize,
    pub spinner_tick: u64,
    pub console_scroll: u16,
    pub log_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(panel: PanelState, log_path: Option<PathBuf>) -> Self {
        Self {
            panel,
            mode: Mode::Normal,
            focus: 0,
            spinner_tick: 0,
            console_scroll: 0,
            log_path,
        }
    }

    pub fn focused_field(&self) -> Option<Field> {
        tab_fields(self.panel.tabs.active()).get(self.focus).copied()
    }

    fn apply_event(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::ActionDone(completion) => {
                self.panel.complete(completion);
                self.console_scroll = 0;
            }
        }
    }

    fn switch_tab(&mut self, tab: Tab) {
        self.panel.activate_tab(tab);
        self.focus = 0;
    }

    fn cycle_tab(&mut self, dir: Cycle) {
        self.panel.cycle_tab(dir);
        self.focus = 0;
    }

    fn move_focus(&mut self, down: bool) {
        if self.panel.tabs.active() == Tab::Stacks {
            if down {
                self.panel.stacks.select_next();
            } else {
                self.panel.stacks.select_prev();
            }
            return;
        }
        let n = tab_fields(self.panel.tabs.active()).len();
        if n == 0 {
            return;
        }
        self.focus = if down { (self.focus + 1).min(n - 1) } else { self.focus.saturating_sub(1) };
    }

    fn begin_edit(&mut self) {
        if let Some(field) = self.focused_field() {
            let text = self.panel.inputs.get(field).to_string();
            let cursor = text.len();
            self.mode = Mode::Editing(EditBuffer { field, text, cursor });
        }
    }

    fn commit_edit(&mut self) {
        if let Mode::Editing(buf) = std::mem::replace(&mut self.mode, Mode::Normal) {
            self.panel.set_input(buf.field, buf.text);
        }
    }
}

// ── Commands (normal mode) ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Quit,
    CycleTab(Cycle),
    GoTab(Tab),
    FocusUp,
    FocusDown,
    Edit,
    ToggleApiKey,
    ScrollConsole(i16),
    Run(ActionTrigger),
}

/// Map a key press in normal mode to a command for the active tab.
pub fn command_for(state: &AppState, key: KeyEvent) -> Option<Command> {
    let tab = state.panel.tabs.active();
    let run = |id: ActionId| Some(Command::Run(ActionTrigger::new(id)));

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Command::Quit),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Char('q') => Some(Command::Quit),
        KeyCode::Left => Some(Command::CycleTab(Cycle::Left)),
        KeyCode::Right | KeyCode::Tab => Some(Command::CycleTab(Cycle::Right)),
        KeyCode::BackTab => Some(Command::CycleTab(Cycle::Left)),
        KeyCode::Char(c @ '1'..='5') => {
            let idx = c as usize - '1' as usize;
            Tab::ALL.get(idx).copied().map(Command::GoTab)
        }
        KeyCode::Up | KeyCode::Char('k') => Some(Command::FocusUp),
        KeyCode::Down | KeyCode::Char('j') => Some(Command::FocusDown),
        KeyCode::PageUp => Some(Command::ScrollConsole(-10)),
        KeyCode::PageDown => Some(Command::ScrollConsole(10)),
        KeyCode::Char('x') => run(ActionId::ClearConsole),
        KeyCode::Enter | KeyCode::Char('e') if !tab_fields(tab).is_empty() => Some(Command::Edit),
        KeyCode::Char(c) => match (tab, c) {
            (Tab::Settings, ' ' | 'a') => Some(Command::ToggleApiKey),
            (Tab::Service, 'h') => run(ActionId::Health),
            (Tab::Service, 's') => run(ActionId::Stats),
            (Tab::Service, 'l') => run(ActionId::ListStacks),
            (Tab::Stacks, 'r') => run(ActionId::RefreshList),
            (Tab::Stacks, 'd') => state
                .panel
                .stacks
                .selected_card()
                .map(|card| Command::Run(card.delete.trigger())),
            (Tab::Inspect, 'g') => run(ActionId::GetStack),
            (Tab::Inspect, 't') => run(ActionId::GetStatus),
            (Tab::Inspect, 'D') => run(ActionId::DeleteStack),
            (Tab::Create, 'n') => run(ActionId::CreateStack),
            _ => None,
        },
        _ => None,
    }
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(resolved: ResolvedConfig, prefs: PreferenceStore, log_path: Option<PathBuf>) -> Result<()> {
    let mut terminal = setup_terminal()?;

    // Panic hook: restore terminal before printing panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        orig_hook(info);
    }));

    let panel = PanelState::new(&resolved, prefs);
    let state = AppState::new(panel, log_path);
    let dispatcher = Dispatcher::new(Arc::new(HttpTransport::new()));

    let result = event_loop(&mut terminal, state, dispatcher).await;

    restore_terminal(&mut terminal);
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut state: AppState,
    dispatcher: Dispatcher,
) -> Result<()> {
    // Channel: action tasks → TUI
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();

    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(120));

    info!(tab = state.panel.tabs.active().id(), "panel opened");
    terminal.draw(|f| render::draw(f, &state))?;

    loop {
        tokio::select! {
            // ── Spinner tick ──────────────────────────────────────────────────
            _ = ticker.tick() => {
                if state.panel.busy.is_engaged() {
                    state.spinner_tick = state.spinner_tick.wrapping_add(1);
                    terminal.draw(|f| render::draw(f, &state))?;
                }
            }

            // ── Drain completions from action tasks ───────────────────────────
            Some(ev) = ui_rx.recv() => {
                state.apply_event(ev);
                terminal.draw(|f| render::draw(f, &state))?;
            }

            // ── Keyboard/resize events ────────────────────────────────────────
            Some(Ok(ev)) = crossterm_events.next() => {
                if let Event::Key(key) = ev {
                    if key.kind == KeyEventKind::Press
                        && !handle_key(key, &mut state, &dispatcher, &ui_tx)
                    {
                        break;
                    }
                }
                terminal.draw(|f| render::draw(f, &state))?;
            }
        }
    }

    info!("panel closed");
    Ok(())
}

// ── Key handler ───────────────────────────────────────────────────────────────

/// Returns false when the panel should close.
fn handle_key(
    key: KeyEvent,
    state: &mut AppState,
    dispatcher: &Dispatcher,
    ui_tx: &mpsc::UnboundedSender<UiEvent>,
) -> bool {
    if let Mode::Editing(buf) = &mut state.mode {
        if edit_key(buf, key) {
            state.commit_edit();
        }
        return true;
    }

    let Some(command) = command_for(state, key) else {
        return true;
    };
    match command {
        Command::Quit => return false,
        Command::CycleTab(dir) => state.cycle_tab(dir),
        Command::GoTab(tab) => state.switch_tab(tab),
        Command::FocusUp => state.move_focus(false),
        Command::FocusDown => state.move_focus(true),
        Command::Edit => state.begin_edit(),
        Command::ToggleApiKey => state.panel.toggle_api_key_enabled(),
        Command::ScrollConsole(delta) => {
            state.console_scroll = state.console_scroll.saturating_add_signed(delta);
        }
        Command::Run(trigger) => launch_action(state, dispatcher, trigger, ui_tx.clone()),
    }
    true
}

/// Dispatch synchronously (busy lock + interim record), then run the network
/// part on a task so the panel keeps redrawing.
fn launch_action(
    state: &mut AppState,
    dispatcher: &Dispatcher,
    trigger: ActionTrigger,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
) {
    state.console_scroll = 0;
    if let Some(pending) = dispatcher.dispatch(&mut state.panel, trigger) {
        tokio::spawn(async move {
            let completion = pending.execute().await;
            let _ = ui_tx.send(UiEvent::ActionDone(completion));
        });
    }
}

/// Apply one key to an edit buffer. Returns true when the edit is finished.
fn edit_key(buf: &mut EditBuffer, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => return true,
        KeyCode::Enter if !buf.field.multiline() => return true,
        KeyCode::Enter => {
            buf.text.insert(buf.cursor, '\n');
            buf.cursor += 1;
        }
        KeyCode::Char('w') if ctrl => input_delete_word(&mut buf.text, &mut buf.cursor),
        KeyCode::Char('u') if ctrl => {
            buf.text.clear();
            buf.cursor = 0;
        }
        KeyCode::Char(c) if !ctrl => {
            buf.text.insert(buf.cursor, c);
            buf.cursor += c.len_utf8();
        }
        KeyCode::Backspace => input_backspace(&mut buf.text, &mut buf.cursor),
        KeyCode::Delete => input_delete_forward(&mut buf.text, &mut buf.cursor),
        KeyCode::Left => buf.cursor = prev_char_boundary(&buf.text, buf.cursor),
        KeyCode::Right => buf.cursor = next_char_boundary(&buf.text, buf.cursor),
        KeyCode::Home => buf.cursor = 0,
        KeyCode::End => buf.cursor = buf.text.len(),
        _ => {}
    }
    false
}

// ── Input editing helpers ─────────────────────────────────────────────────────

fn input_backspace(input: &mut String, cursor: &mut usize) {
    if *cursor == 0 {
        return;
    }
    let prev = prev_char_boundary(input, *cursor);
    input.drain(prev..*cursor);
    *cursor = prev;
}

fn input_delete_forward(input: &mut String, cursor: &mut usize) {
    if *cursor >= input.len() {
        return;
    }
    let next = next_char_boundary(input, *cursor);
    input.drain(*cursor..next);
}

/// Delete back to the previous whitespace boundary.
fn input_delete_word(input: &mut String, cursor: &mut usize) {
    let bytes = input.as_bytes();
    let mut start = *cursor;
    while start > 0 && bytes[start - 1].is_ascii_whitespace() {
        start -= 1;
    }
    while start > 0 && !bytes[start - 1].is_ascii_whitespace() {
        start -= 1;
    }
    input.drain(start..*cursor);
    *cursor = start;
}

fn prev_char_boundary(s: &str, pos: usize) -> usize {
    s[..pos.min(s.len())]
        .char_indices()
        .next_back()
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn next_char_boundary(s: &str, pos: usize) -> usize {
    s[pos.min(s.len())..]
        .chars()
        .next()
        .map(|c| pos + c.len_utf8())
        .unwrap_or(s.len())
}
