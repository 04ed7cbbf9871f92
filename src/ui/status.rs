//! Status bar widget

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::recorder::Phase;

use super::{format_elapsed, styles, RenderState};

/// Draw the status bar
pub fn draw_status(frame: &mut Frame, area: Rect, state: &RenderState) {
    let mut spans = vec![];

    // Phase
    match state.phase {
        Phase::Idle => spans.push(Span::styled(" Ready", styles::ready_style())),
        Phase::Recording => spans.push(Span::styled(
            format!(
                " Recording {}",
                format_elapsed(state.elapsed.unwrap_or_default())
            ),
            styles::recording_style(),
        )),
        Phase::Previewing => spans.push(Span::styled(" Preview", styles::preview_style())),
        Phase::Uploading => {
            let percent = state
                .progress
                .map(|p| p.percent_complete())
                .unwrap_or_default();
            spans.push(Span::styled(
                format!(" Uploading {}%", percent),
                styles::busy_style(),
            ));
        }
    }

    // Status message
    if let Some(msg) = state.status_message {
        spans.push(Span::styled(" | ", styles::status_style()));
        spans.push(Span::styled(msg, styles::status_style()));
    }

    let server_info = format!("{} ", state.server_url);

    // Calculate padding to right-align
    let left_len: usize = spans.iter().map(|s| s.content.chars().count()).sum();
    let padding = (area.width as usize).saturating_sub(left_len + server_info.len());
    if padding > 0 {
        spans.push(Span::raw(" ".repeat(padding)));
    }
    spans.push(Span::styled(server_info, styles::server_style()));

    let line = Line::from(spans);
    let paragraph = Paragraph::new(line);

    frame.render_widget(paragraph, area);
}
