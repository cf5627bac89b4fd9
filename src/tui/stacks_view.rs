/// Stacks tab: one card per stack from the latest completed list fetch.
///
/// Shortcuts:
///   r: refresh (GET /stacks)
///   j/↓ k/↑: select card
///   d: delete the selected card's stack, then refresh
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::AppState;
use super::render::{DIM, LABEL};
use crate::panel::stack_list::{ListContent, StackCard};
use crate::stack::StatusClass;

const COL_LABEL_W: usize = 10;

pub fn status_color(class: StatusClass) -> Color {
    match class {
        StatusClass::Creating => Color::Rgb(220, 180, 40),
        StatusClass::Running => Color::Rgb(0, 200, 120),
        StatusClass::Stopped => Color::Rgb(130, 130, 150),
        StatusClass::Failed => Color::Rgb(230, 80, 80),
        StatusClass::NodeDeleted => Color::Rgb(200, 110, 220),
        StatusClass::Unknown => Color::DarkGray,
    }
}

pub fn draw(f: &mut Frame, state: &AppState, area: Rect) {
    let view = &state.panel.stacks;
    let count = view.cards().len();
    let title = if count > 0 { format!(" stacks ({count}) ") } else { " stacks ".to_string() };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Rgb(40, 40, 60)))
        .title(Span::styled(title, Style::default().fg(LABEL)));

    let cards = match view.content() {
        ListContent::Placeholder(msg) => {
            let lines = vec![
                Line::raw(""),
                Line::from(Span::styled(format!("  {msg}"), Style::default().fg(DIM))),
            ];
            f.render_widget(Paragraph::new(lines).block(block), area);
            return;
        }
        ListContent::Cards(cards) => cards,
    };

    let inner_w = area.width.saturating_sub(2) as usize;
    let col_w = (inner_w.saturating_sub(4) / 2).max(COL_LABEL_W + 4);

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut selected_span = (0usize, 0usize);
    for (i, card) in cards.iter().enumerate() {
        let start = lines.len();
        card_lines(card, i == view.selected(), col_w, &mut lines);
        if i == view.selected() {
            selected_span = (start, lines.len());
        }
    }

    // Keep the selected card in view.
    let visible = area.height.saturating_sub(2) as usize;
    let scroll = selected_span.1.saturating_sub(visible).min(selected_span.0);

    f.render_widget(Paragraph::new(lines).block(block).scroll((scroll as u16, 0)), area);
}

fn card_lines(card: &StackCard, selected: bool, col_w: usize, out: &mut Vec<Line<'static>>) {
    let color = status_color(card.status_class);
    let (marker, id_style) = if selected {
        ("▸ ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
    } else {
        ("  ", Style::default().fg(Color::White).add_modifier(Modifier::BOLD))
    };
    let mut header = vec![
        Span::styled(format!(" {marker}"), Style::default().fg(Color::Cyan)),
        Span::styled(card.stack_id.clone(), id_style),
        Span::raw("  "),
        Span::styled(format!("● {}", card.status), Style::default().fg(color)),
    ];
    if selected {
        header.push(Span::styled("   [d] delete", Style::default().fg(Color::Rgb(150, 70, 70))));
    }
    out.push(Line::from(header));

    for pair in card.fields.chunks(2) {
        let mut spans = vec![Span::raw("    ")];
        for (label, value) in pair {
            let value_w = col_w.saturating_sub(COL_LABEL_W + 1);
            let shown = truncate(value, value_w);
            let pad = value_w.saturating_sub(shown.width());
            spans.push(Span::styled(format!("{label:<COL_LABEL_W$} "), Style::default().fg(LABEL)));
            spans.push(Span::styled(shown, Style::default().fg(Color::Rgb(200, 200, 215))));
            spans.push(Span::raw(" ".repeat(pad + 2)));
        }
        out.push(Line::from(spans));
    }
    out.push(Line::raw(""));
}

/// Cut to `max` display columns, marking the cut with `…`.
fn truncate(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    let mut w = 0;
    for c in s.chars() {
        let cw = c.width().unwrap_or(0);
        if w + cw + 1 > max {
            break;
        }
        out.push(c);
        w += cw;
    }
    out.push('…');
    out
}
