/// Form panels: Settings, Create, Inspect, Service.
///
/// Each field row is `  ▸ label      value`; the focused row gets the marker and
/// the edit buffer replaces the value while editing.
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use unicode_width::UnicodeWidthStr;

use super::render::{DIM, LABEL};
use super::{AppState, Mode};
use crate::panel::Field;
use crate::panel::tabs::Tab;
use crate::stack::{MAX_TARGET_PORTS, PortEncoding};

const LABEL_W: usize = 14;
/// "  ▸ " plus the padded label
const VALUE_X: u16 = 4 + LABEL_W as u16;

pub fn draw(f: &mut Frame, state: &AppState, tab: Tab, area: Rect) {
    match tab {
        Tab::Settings => draw_settings(f, state, area),
        Tab::Create => draw_create(f, state, area),
        Tab::Inspect => draw_inspect(f, state, area),
        Tab::Service => draw_service(f, state, area),
        Tab::Stacks => {}
    }
}

// ── Settings ──────────────────────────────────────────────────────────────────

fn draw_settings(f: &mut Frame, state: &AppState, area: Rect) {
    let inputs = &state.panel.inputs;
    let effective = state.panel.connection().base_url;
    let mut lines = vec![
        Line::raw(""),
        heading("Connection"),
        Line::raw(""),
    ];
    lines.push(field_line(state, Field::BaseUrl, &inputs.base_url, "(blank uses the configured origin)"));
    lines.push(note(format!("requests go to {effective}")));
    lines.push(Line::raw(""));
    lines.push(field_line(state, Field::ApiKey, &inputs.api_key, "(none)"));
    lines.push(Line::from(vec![
        Span::styled(format!("    {:<LABEL_W$}", "send key"), Style::default().fg(LABEL)),
        if inputs.api_key_enabled {
            Span::styled("[x] X-API-KEY header", Style::default().fg(Color::Rgb(0, 200, 120)))
        } else {
            Span::styled("[ ] X-API-KEY header", Style::default().fg(Color::DarkGray))
        },
    ]));

    let rows = [(Field::BaseUrl, 3u16), (Field::ApiKey, 6u16)];
    render_panel(f, state, area, " settings ", lines, &rows);
}

// ── Create ────────────────────────────────────────────────────────────────────

fn draw_create(f: &mut Frame, state: &AppState, area: Rect) {
    let inputs = &state.panel.inputs;
    let encoding_note = match state.panel.encoding() {
        PortEncoding::List => format!("PORT[/tcp|udp], comma-separated, up to {MAX_TARGET_PORTS}"),
        PortEncoding::Integer => "one TCP port (integer encoding)".to_string(),
    };

    let mut lines = vec![Line::raw(""), heading("New stack"), Line::raw("")];
    lines.push(field_line(state, Field::TargetPort, &inputs.target_port, "(required)"));
    lines.push(note(encoding_note));
    lines.push(Line::raw(""));

    let pod_focused = state.focused_field() == Some(Field::PodSpec);
    let editing_pod = matches!(&state.mode, Mode::Editing(b) if b.field == Field::PodSpec);
    lines.push(Line::from(vec![
        marker(pod_focused),
        Span::styled(format!("{:<LABEL_W$}", Field::PodSpec.label()), Style::default().fg(LABEL)),
        Span::styled(
            if editing_pod { "editing" } else { "YAML" },
            Style::default().fg(DIM),
        ),
    ]));
    let pod_text = match &state.mode {
        Mode::Editing(b) if b.field == Field::PodSpec => b.text.as_str(),
        _ => inputs.pod_spec.as_str(),
    };
    let pod_color = if editing_pod { Color::White } else { Color::Rgb(180, 200, 140) };
    for l in pod_text.lines() {
        lines.push(Line::from(vec![
            Span::raw("      "),
            Span::styled(l.to_string(), Style::default().fg(pod_color)),
        ]));
    }

    render_panel(f, state, area, " create ", lines, &[(Field::TargetPort, 3)]);

    // Cursor inside the multi-line pod spec
    if let Mode::Editing(buf) = &state.mode {
        if buf.field == Field::PodSpec {
            let before = &buf.text[..buf.cursor.min(buf.text.len())];
            let row = before.matches('\n').count() as u16;
            let col = before.rsplit('\n').next().unwrap_or("").width() as u16;
            let x = area.x + 1 + 6 + col;
            let y = area.y + 1 + 7 + row;
            if x < area.x + area.width && y < area.y + area.height {
                f.set_cursor_position((x, y));
            }
        }
    }
}

// ── Inspect ───────────────────────────────────────────────────────────────────

fn draw_inspect(f: &mut Frame, state: &AppState, area: Rect) {
    let inputs = &state.panel.inputs;
    let mut lines = vec![Line::raw(""), heading("Single stack"), Line::raw("")];
    lines.push(field_line(state, Field::StackId, &inputs.stack_id, "(required)"));
    lines.push(Line::from(vec![
        Span::styled(format!("    {:<LABEL_W$}", "last created"), Style::default().fg(LABEL)),
        if inputs.last_stack_id.is_empty() {
            Span::styled("-", Style::default().fg(DIM))
        } else {
            Span::styled(inputs.last_stack_id.clone(), Style::default().fg(Color::Rgb(140, 120, 220)))
        },
    ]));
    lines.push(Line::raw(""));
    lines.push(note("g  GET /stacks/{stack_id}".to_string()));
    lines.push(note("t  GET /stacks/{stack_id}/status".to_string()));
    lines.push(note("D  DELETE /stacks/{stack_id}".to_string()));

    render_panel(f, state, area, " inspect ", lines, &[(Field::StackId, 3)]);
}

// ── Service ───────────────────────────────────────────────────────────────────

fn draw_service(f: &mut Frame, state: &AppState, area: Rect) {
    let lines = vec![
        Line::raw(""),
        heading("Service"),
        Line::raw(""),
        note("h  GET /healthz".to_string()),
        note("s  GET /stats".to_string()),
        note("l  GET /stacks (also refreshes the Stacks tab)".to_string()),
    ];
    render_panel(f, state, area, " service ", lines, &[]);
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn heading(s: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(s.to_string(), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
    ])
}

fn note(s: String) -> Line<'static> {
    Line::from(vec![
        Span::raw(" ".repeat(VALUE_X as usize)),
        Span::styled(s, Style::default().fg(DIM)),
    ])
}

fn marker(focused: bool) -> Span<'static> {
    if focused {
        Span::styled("  ▸ ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
    } else {
        Span::raw("    ")
    }
}

fn field_line(state: &AppState, field: Field, value: &str, empty: &str) -> Line<'static> {
    let focused = state.focused_field() == Some(field);
    let value = match &state.mode {
        Mode::Editing(buf) if buf.field == field => Span::styled(
            shown_text(field, &buf.text),
            Style::default().fg(Color::White).bg(Color::Rgb(20, 20, 35)),
        ),
        _ if value.is_empty() => Span::styled(empty.to_string(), Style::default().fg(DIM)),
        _ => Span::styled(shown_text(field, value), Style::default().fg(Color::White)),
    };
    Line::from(vec![
        marker(focused),
        Span::styled(format!("{:<LABEL_W$}", field.label()), Style::default().fg(LABEL)),
        value,
    ])
}

/// The API key is masked, edit buffer included.
fn shown_text(field: Field, text: &str) -> String {
    match field {
        Field::ApiKey => "•".repeat(text.chars().count()),
        _ => text.to_string(),
    }
}

/// Render `lines` inside a bordered block and place the cursor when one of the
/// single-line `rows` (field, line index) is being edited.
fn render_panel(
    f: &mut Frame,
    state: &AppState,
    area: Rect,
    title: &'static str,
    lines: Vec<Line<'static>>,
    rows: &[(Field, u16)],
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Rgb(40, 40, 60)))
        .title(Span::styled(title, Style::default().fg(LABEL)));
    f.render_widget(Paragraph::new(lines).block(block), area);

    if let Mode::Editing(buf) = &state.mode {
        if let Some((_, row)) = rows.iter().find(|(field, _)| *field == buf.field) {
            let before = &buf.text[..buf.cursor.min(buf.text.len())];
            let x = area.x + 1 + VALUE_X + shown_text(buf.field, before).width() as u16;
            let y = area.y + 1 + row;
            if x < area.x + area.width && y < area.y + area.height {
                f.set_cursor_position((x, y));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_is_masked_including_cursor_width() {
        assert_eq!(shown_text(Field::ApiKey, "sëcret"), "••••••");
        // Wide chars in the key must not shift the cursor past the mask.
        assert_eq!(shown_text(Field::ApiKey, "日本").width(), 2);
        assert_eq!(shown_text(Field::BaseUrl, "http://h"), "http://h");
    }
}
