/// Ratatui draw entry-point.
/// Thin dispatcher: tab panels live in forms.rs and stacks_view.rs.
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use super::{AppState, Mode};
use crate::panel::console::RecordState;
use crate::panel::tabs::Tab;

pub const SPINNER_GLYPHS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub const LABEL: Color = Color::Rgb(100, 95, 140);
pub const DIM: Color = Color::Rgb(65, 60, 95);

// ── Main draw entry point ─────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),       // tab bar
            Constraint::Percentage(50),  // tab panel
            Constraint::Min(5),          // response console
            Constraint::Length(1),       // status bar
            Constraint::Length(1),       // key hints
        ])
        .split(f.area());

    draw_tab_bar(f, state, chunks[0]);

    match state.panel.tabs.active() {
        Tab::Stacks => super::stacks_view::draw(f, state, chunks[1]),
        tab => super::forms::draw(f, state, tab, chunks[1]),
    }

    draw_console(f, state, chunks[2]);
    draw_status_bar(f, state, chunks[3]);
    draw_hints(f, state, chunks[4]);
}

// ── Tab bar ───────────────────────────────────────────────────────────────────

fn draw_tab_bar(f: &mut Frame, state: &AppState, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in Tab::ALL.iter().enumerate() {
        let style = if state.panel.tabs.is_active(*tab) {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::Rgb(60, 55, 90))
        };
        spans.push(Span::styled(format!("[{}] {}", i + 1, tab.title()), style));
        spans.push(Span::raw("  "));
    }

    f.render_widget(
        Paragraph::new(Line::from(spans))
            .style(Style::default().bg(Color::Rgb(6, 6, 12))),
        area,
    );
}

// ── Response console ──────────────────────────────────────────────────────────

fn draw_console(f: &mut Frame, state: &AppState, area: Rect) {
    let record = state.panel.console.record();
    let (border, title_color) = match record.state {
        RecordState::Idle => (Color::Rgb(40, 40, 60), Color::DarkGray),
        RecordState::Running => (Color::Rgb(40, 60, 80), Color::Cyan),
        RecordState::Ok => (Color::Rgb(30, 80, 50), Color::Rgb(0, 200, 120)),
        RecordState::Error => (Color::Rgb(110, 40, 40), Color::Rgb(230, 80, 80)),
    };

    let mut lines = Vec::new();
    if let Some(ts) = record.timestamp {
        lines.push(Line::from(vec![
            Span::styled(
                format!("[{}] ", ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(record.title.clone(), Style::default().fg(title_color).add_modifier(Modifier::BOLD)),
        ]));
        if let Some(kind) = record.kind_line() {
            lines.push(Line::from(Span::styled(kind, Style::default().fg(Color::Rgb(200, 120, 120)))));
        }
        lines.push(Line::raw(""));
    }
    let body_color = if record.state == RecordState::Idle { Color::DarkGray } else { Color::White };
    lines.extend(
        record
            .body
            .lines()
            .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(body_color)))),
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(" response ", Style::default().fg(LABEL)));

    f.render_widget(
        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((state.console_scroll, 0)),
        area,
    );
}

// ── Status bar ────────────────────────────────────────────────────────────────

fn draw_status_bar(f: &mut Frame, state: &AppState, area: Rect) {
    let panel = &state.panel;
    let busy = panel.busy.is_engaged();
    let (glyph, glyph_color) = if busy {
        let g = SPINNER_GLYPHS[(state.spinner_tick as usize) % SPINNER_GLYPHS.len()];
        (g, Color::Cyan)
    } else {
        ("▲", Color::White)
    };

    let settings = panel.connection();
    let (key_label, key_color) = match (&settings.api_key, panel.inputs.api_key_enabled) {
        (Some(_), _) => ("key on", Color::Rgb(0, 200, 120)),
        (None, true) => ("key empty", Color::Rgb(200, 160, 50)),
        (None, false) => ("key off", Color::DarkGray),
    };

    let mut spans = vec![
        Span::raw(" "),
        Span::styled(glyph, Style::default().fg(glyph_color).add_modifier(Modifier::BOLD)),
        Span::styled(" cpdash", Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(settings.base_url, Style::default().fg(Color::Rgb(100, 180, 220))),
        Span::styled("  ·  ", Style::default().fg(Color::DarkGray)),
        Span::styled(key_label, Style::default().fg(key_color)),
    ];
    if !panel.inputs.last_stack_id.is_empty() {
        spans.push(Span::styled("  ·  last ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(
            panel.inputs.last_stack_id.clone(),
            Style::default().fg(Color::Rgb(140, 120, 220)),
        ));
    }
    if !panel.prefs.is_available() {
        spans.push(Span::styled("  ·  prefs not saved", Style::default().fg(Color::Rgb(200, 160, 50))));
    }
    if let Some(path) = &state.log_path {
        spans.push(Span::styled(format!("  log {}", path.display()), Style::default().fg(Color::Rgb(55, 50, 90))));
    }

    let bar_style = if busy {
        Style::default().bg(Color::Rgb(15, 15, 25))
    } else {
        Style::default().bg(Color::Rgb(10, 10, 18))
    };
    f.render_widget(Paragraph::new(Line::from(spans)).style(bar_style), area);
}

// ── Key hints ─────────────────────────────────────────────────────────────────

fn draw_hints(f: &mut Frame, state: &AppState, area: Rect) {
    let enabled = state.panel.busy.controls_enabled();
    let hint = |keys: &'static str, label: &'static str, action: bool| -> Vec<Span<'static>> {
        let disabled = action && !enabled;
        let key_color = if disabled { Color::Rgb(50, 50, 60) } else { Color::Cyan };
        let label_color = if disabled { Color::Rgb(50, 50, 60) } else { LABEL };
        vec![
            Span::styled(keys, Style::default().fg(key_color).add_modifier(Modifier::BOLD)),
            Span::styled(format!(" {label}   "), Style::default().fg(label_color)),
        ]
    };

    let mut spans = vec![Span::raw(" ")];
    if let Mode::Editing(buf) = &state.mode {
        spans.push(Span::styled(
            format!("editing {}  ", buf.field.label()),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
        if buf.field.multiline() {
            spans.extend(hint("Enter", "newline", false));
        } else {
            spans.extend(hint("Enter", "done", false));
        }
        spans.extend(hint("Esc", "done", false));
        spans.extend(hint("Ctrl+U", "clear", false));
    } else {
        match state.panel.tabs.active() {
            Tab::Settings => {
                spans.extend(hint("↑↓", "field", false));
                spans.extend(hint("Enter", "edit", false));
                spans.extend(hint("a", "toggle key", false));
            }
            Tab::Stacks => {
                spans.extend(hint("r", "refresh", true));
                spans.extend(hint("↑↓", "select", false));
                spans.extend(hint("d", "delete", true));
            }
            Tab::Create => {
                spans.extend(hint("↑↓", "field", false));
                spans.extend(hint("Enter", "edit", false));
                spans.extend(hint("n", "create", true));
            }
            Tab::Inspect => {
                spans.extend(hint("Enter", "edit", false));
                spans.extend(hint("g", "get", true));
                spans.extend(hint("t", "status", true));
                spans.extend(hint("D", "delete", true));
            }
            Tab::Service => {
                spans.extend(hint("h", "health", true));
                spans.extend(hint("s", "stats", true));
                spans.extend(hint("l", "list", true));
            }
        }
        spans.extend(hint("x", "clear", true));
        spans.extend(hint("←→", "tabs", false));
        spans.extend(hint("q", "quit", false));
    }

    f.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Rgb(7, 7, 14))),
        area,
    );
}
