//! Layout definitions

use ratatui::layout::{Constraint, Direction, Flex, Layout, Rect};

/// Recorder panel on top, task list below, status bar last
pub fn create_layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8), // Recorder
            Constraint::Min(5),    // Tasks (expandable)
            Constraint::Length(1), // Status bar
        ])
        .split(area)
        .to_vec()
}

/// Rectangle of the given size centered in `area`
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height.min(area.height))])
        .flex(Flex::Center)
        .areas(area);
    let [rect] = Layout::horizontal([Constraint::Length(width.min(area.width))])
        .flex(Flex::Center)
        .areas(row);
    rect
}
