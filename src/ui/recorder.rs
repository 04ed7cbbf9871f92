//! Recorder panel: prompt, live spectrum, preview and upload progress

use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Gauge, Paragraph},
    Frame,
};
use std::time::Duration;

use crate::recorder::Phase;

use super::{styles, RenderState};

/// Draw the recorder area
pub fn draw_recorder(frame: &mut Frame, area: Rect, state: &RenderState) {
    let (title, border_style) = match state.phase {
        Phase::Idle => (" Recorder ".to_string(), styles::border_style()),
        Phase::Recording => (
            format!(
                " ● Recording {} (r to stop) ",
                format_elapsed(state.elapsed.unwrap_or_default())
            ),
            styles::recording_style(),
        ),
        Phase::Previewing => (" Preview ".to_string(), styles::preview_style()),
        Phase::Uploading => (" Uploading ".to_string(), styles::busy_style()),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    match state.phase {
        Phase::Idle => draw_idle(frame, inner),
        Phase::Recording => draw_spectrum(frame, inner, state.spectrum),
        Phase::Previewing => draw_preview(frame, inner, state),
        Phase::Uploading => draw_progress(frame, inner, state),
    }
}

fn draw_idle(frame: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  r ", styles::key_hint_style()),
            Span::styled("start recording a voice note", styles::status_style()),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_spectrum(frame: &mut Frame, area: Rect, spectrum: &[u64]) {
    if spectrum.is_empty() || area.width == 0 {
        return;
    }

    let bar_width = (area.width as usize / spectrum.len()).max(1) as u16;
    let bars: Vec<Bar> = spectrum
        .iter()
        .map(|&v| Bar::default().value(v).text_value(String::new()))
        .collect();

    let chart = BarChart::default()
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width.saturating_sub(1).max(1))
        .bar_gap(if bar_width > 1 { 1 } else { 0 })
        .bar_style(styles::spectrum_style())
        .max(100);

    frame.render_widget(chart, area);
}

fn draw_preview(frame: &mut Frame, area: Rect, state: &RenderState) {
    let Some(preview) = state.preview else {
        return;
    };

    let length = preview
        .duration
        .map(format_elapsed)
        .unwrap_or_else(|| "?".to_string());

    let lines = vec![
        Line::from(vec![
            Span::styled(format!("  {} ", length), styles::preview_style()),
            Span::styled(format_bytes(preview.bytes), styles::status_style()),
        ]),
        Line::from(Span::styled(
            format!("  {}", preview.path.display()),
            styles::status_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  u ", styles::key_hint_style()),
            Span::styled("process   ", styles::status_style()),
            Span::styled("x ", styles::key_hint_style()),
            Span::styled("discard", styles::status_style()),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_progress(frame: &mut Frame, area: Rect, state: &RenderState) {
    let progress = state.progress.unwrap_or_default();
    let percent = progress.percent_complete();

    let [_, row, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Fill(1),
    ])
    .areas(area);

    let gauge = Gauge::default()
        .gauge_style(styles::gauge_style())
        .percent(percent)
        .label(format!(
            "{}% of {}",
            percent,
            format_bytes(progress.total as usize)
        ));
    frame.render_widget(gauge, row);
}

/// mm:ss
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn format_bytes(bytes: usize) -> String {
    if bytes >= 1_000_000 {
        format!("{:.1} MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1} KB", bytes as f64 / 1_000.0)
    } else {
        format!("{} B", bytes)
    }
}
