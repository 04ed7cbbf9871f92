//! UI components using ratatui

mod layout;
mod prompt;
mod recorder;
mod status;
mod styles;
mod tasks;

pub use layout::*;
pub use prompt::*;
pub use recorder::*;
pub use status::*;
pub use styles::*;
pub use tasks::*;

use ratatui::Frame;
use std::path::Path;
use std::time::Duration;

use crate::editor::LineEditor;
use crate::recorder::{Phase, UploadProgress};
use crate::tasks::{BoardView, TaskId};

/// What keys currently drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// Editing a task's content in place
    Renaming { id: TaskId, editor: LineEditor },
    /// Waiting for y/n before deleting
    ConfirmDelete(TaskId),
    /// Blocking message; any key dismisses
    Alert(String),
}

/// Finished recording shown before upload
#[derive(Debug, Clone, Copy)]
pub struct PreviewInfo<'a> {
    pub path: &'a Path,
    pub bytes: usize,
    pub duration: Option<Duration>,
}

/// State needed for rendering (borrowed references)
pub struct RenderState<'a> {
    pub phase: Phase,
    pub elapsed: Option<Duration>,
    pub preview: Option<PreviewInfo<'a>>,
    pub progress: Option<UploadProgress>,
    pub spectrum: &'a [u64],
    pub board: &'a BoardView,
    pub selected: Option<&'a TaskId>,
    pub mode: &'a Mode,
    pub status_message: Option<&'a str>,
    pub server_url: &'a str,
}

/// Main draw function
pub fn draw(frame: &mut Frame, state: &RenderState) {
    let chunks = create_layout(frame.area());

    draw_recorder(frame, chunks[0], state);
    draw_tasks(frame, chunks[1], state);
    draw_status(frame, chunks[2], state);

    draw_prompt(frame, state);
}
