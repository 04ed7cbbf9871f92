//! Modal overlays for confirmations and alerts

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::{centered, styles, Mode, RenderState};

const POPUP_WIDTH: u16 = 56;

/// Draw whichever overlay the current mode calls for
pub fn draw_prompt(frame: &mut Frame, state: &RenderState) {
    match state.mode {
        Mode::ConfirmDelete(_) => {
            let lines = vec![
                Line::from(""),
                Line::from(Span::styled("  Delete this task?", styles::task_style())),
                Line::from(""),
                Line::from(vec![
                    Span::styled("  y ", styles::key_hint_style()),
                    Span::styled("delete   ", styles::status_style()),
                    Span::styled("n ", styles::key_hint_style()),
                    Span::styled("keep", styles::status_style()),
                ]),
            ];
            draw_popup(frame, " Confirm ", styles::border_style(), lines);
        }
        Mode::Alert(message) => {
            let lines = vec![
                Line::from(""),
                Line::from(Span::styled(format!("  {}", message), styles::error_style())),
                Line::from(""),
                Line::from(Span::styled("  Press any key", styles::placeholder_style())),
            ];
            draw_popup(frame, " Error ", styles::error_style(), lines);
        }
        Mode::Renaming { .. } => {
            // Editing happens inline; only the hint lives here
            let area = frame.area();
            if area.height < 2 {
                return;
            }
            let hint = Rect::new(area.x, area.y + area.height - 2, area.width, 1);
            let line = Line::from(vec![
                Span::styled(" Enter ", styles::key_hint_style()),
                Span::styled("save   ", styles::status_style()),
                Span::styled("Esc ", styles::key_hint_style()),
                Span::styled("cancel", styles::status_style()),
            ]);
            frame.render_widget(Clear, hint);
            frame.render_widget(Paragraph::new(line), hint);
        }
        Mode::Normal => {}
    }
}

fn draw_popup(frame: &mut Frame, title: &str, border: Style, lines: Vec<Line>) {
    let height = lines.len() as u16 + 3;
    let area = centered(frame.area(), POPUP_WIDTH, height);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(title.to_string());

    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}
