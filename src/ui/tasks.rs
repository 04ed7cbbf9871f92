//! Task list view

use chrono::NaiveDate;
use ratatui::{
    layout::Rect,
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::tasks::{BoardView, TaskId};

use super::{styles, Mode, RenderState};

/// One line of the task pane, independent of any widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardRow {
    Loading,
    Unavailable(String),
    Empty,
    Header(String),
    Item {
        id: TaskId,
        content: String,
        done: bool,
    },
}

/// Map the board onto display rows
pub fn board_rows(view: &BoardView) -> Vec<BoardRow> {
    let groups = match view {
        BoardView::Loading => return vec![BoardRow::Loading],
        BoardView::Unavailable(reason) => return vec![BoardRow::Unavailable(reason.clone())],
        BoardView::Ready(groups) if groups.is_empty() => return vec![BoardRow::Empty],
        BoardView::Ready(groups) => groups,
    };

    let mut rows = Vec::new();
    for group in groups {
        rows.push(BoardRow::Header(display_date(group.date)));
        for task in &group.tasks {
            rows.push(BoardRow::Item {
                id: task.id.clone(),
                content: task.content.clone(),
                done: task.done,
            });
        }
    }
    rows
}

/// Long human form, e.g. "Monday, January 1, 2024"
pub fn display_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// Draw the task area
pub fn draw_tasks(frame: &mut Frame, area: Rect, state: &RenderState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style())
        .title(" Tasks ");
    let inner = block.inner(area);

    let editing = match state.mode {
        Mode::Renaming { id, editor } => Some((id, editor)),
        _ => None,
    };

    let mut lines: Vec<Line> = Vec::new();
    let mut selected_line = None;

    for row in board_rows(state.board) {
        match row {
            BoardRow::Loading => {
                lines.push(Line::from(Span::styled(
                    "  Loading tasks...",
                    styles::placeholder_style(),
                )));
            }
            BoardRow::Unavailable(reason) => {
                lines.push(Line::from(Span::styled(
                    "  Could not load tasks.",
                    styles::error_style(),
                )));
                lines.push(Line::from(Span::styled(
                    format!("  {}", reason),
                    styles::placeholder_style(),
                )));
                lines.push(Line::from(Span::styled(
                    "  Press g to try again.",
                    styles::placeholder_style(),
                )));
            }
            BoardRow::Empty => {
                lines.push(Line::from(Span::styled(
                    "  No tasks yet. Record a note to get started.",
                    styles::placeholder_style(),
                )));
            }
            BoardRow::Header(date) => {
                if !lines.is_empty() {
                    lines.push(Line::from(""));
                }
                lines.push(Line::from(Span::styled(date, styles::date_header_style())));
            }
            BoardRow::Item { id, content, done } => {
                let is_selected = state.selected == Some(&id);
                if is_selected {
                    selected_line = Some(lines.len());
                }

                let checkbox = if done { " [x] " } else { " [ ] " };
                let mut spans = vec![Span::styled(checkbox, styles::task_style())];

                match editing {
                    Some((edit_id, editor)) if edit_id == &id => {
                        let (before, after) = editor.split();
                        spans.push(Span::styled(before.to_string(), styles::input_style()));
                        spans.push(Span::styled("│", styles::cursor_style()));
                        spans.push(Span::styled(after.to_string(), styles::input_style()));
                    }
                    _ => {
                        let style = if done {
                            styles::done_task_style()
                        } else {
                            styles::task_style()
                        };
                        spans.push(Span::styled(content, style));
                    }
                }

                let mut line = Line::from(spans);
                if is_selected {
                    line = line.style(styles::selected_style());
                }
                lines.push(line);
            }
        }
    }

    // Keep the selection in view
    let visible_height = inner.height as usize;
    let scroll = match selected_line {
        Some(idx) if idx >= visible_height => idx + 1 - visible_height,
        _ => 0,
    };

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((scroll as u16, 0));

    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{Task, TaskGroup};

    fn group(date: &str, tasks: Vec<Task>) -> TaskGroup {
        TaskGroup {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            tasks,
        }
    }

    #[test]
    fn test_single_task_rendering() {
        let view = BoardView::Ready(vec![group(
            "2024-01-01",
            vec![Task {
                id: TaskId::new("1"),
                content: "Buy milk".to_string(),
                done: false,
            }],
        )]);

        assert_eq!(
            board_rows(&view),
            vec![
                BoardRow::Header("Monday, January 1, 2024".to_string()),
                BoardRow::Item {
                    id: TaskId::new("1"),
                    content: "Buy milk".to_string(),
                    done: false,
                },
            ]
        );
    }

    #[test]
    fn test_group_order_is_preserved() {
        let view = BoardView::Ready(vec![
            group("2024-02-10", vec![]),
            group("2023-12-31", vec![]),
        ]);
        assert_eq!(
            board_rows(&view),
            vec![
                BoardRow::Header("Saturday, February 10, 2024".to_string()),
                BoardRow::Header("Sunday, December 31, 2023".to_string()),
            ]
        );
    }

    #[test]
    fn test_placeholder_rows() {
        assert_eq!(board_rows(&BoardView::Loading), vec![BoardRow::Loading]);
        assert_eq!(board_rows(&BoardView::Ready(vec![])), vec![BoardRow::Empty]);
        assert_eq!(
            board_rows(&BoardView::Unavailable("timeout".into())),
            vec![BoardRow::Unavailable("timeout".into())]
        );
    }
}
