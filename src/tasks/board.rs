//! Local view of the server's tasks

use super::types::{Task, TaskGroup, TaskId};

/// What the task pane currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardView {
    /// First fetch has not settled yet
    Loading,
    Ready(Vec<TaskGroup>),
    /// Last fetch failed; nothing stale is kept
    Unavailable(String),
}

/// Latest server snapshot plus any optimistic edits made since
#[derive(Debug, Clone)]
pub struct TaskBoard {
    view: BoardView,
}

impl Default for TaskBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskBoard {
    pub fn new() -> Self {
        Self {
            view: BoardView::Loading,
        }
    }

    pub fn view(&self) -> &BoardView {
        &self.view
    }

    pub fn groups(&self) -> &[TaskGroup] {
        match &self.view {
            BoardView::Ready(groups) => groups,
            _ => &[],
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.view, BoardView::Ready(_))
    }

    /// All task ids in render order
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.groups()
            .iter()
            .flat_map(|g| g.tasks.iter().map(|t| t.id.clone()))
            .collect()
    }

    pub fn find(&self, id: &TaskId) -> Option<&Task> {
        self.groups()
            .iter()
            .flat_map(|g| g.tasks.iter())
            .find(|t| &t.id == id)
    }

    fn find_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        match &mut self.view {
            BoardView::Ready(groups) => groups
                .iter_mut()
                .flat_map(|g| g.tasks.iter_mut())
                .find(|t| &t.id == id),
            _ => None,
        }
    }

    pub fn set_loading(&mut self) {
        self.view = BoardView::Loading;
    }

    /// Replace everything with a fresh snapshot
    pub fn replace(&mut self, groups: Vec<TaskGroup>) {
        self.view = BoardView::Ready(groups);
    }

    pub fn mark_unavailable(&mut self, reason: impl Into<String>) {
        self.view = BoardView::Unavailable(reason.into());
    }

    /// Set the done flag, returning the previous value
    pub fn set_done(&mut self, id: &TaskId, done: bool) -> Option<bool> {
        let task = self.find_mut(id)?;
        Some(std::mem::replace(&mut task.done, done))
    }

    /// Move the task so done tasks follow pending ones in its group.
    /// Relative order within each half is kept.
    pub fn relocate(&mut self, id: &TaskId) {
        if let BoardView::Ready(groups) = &mut self.view {
            if let Some(group) = groups
                .iter_mut()
                .find(|g| g.tasks.iter().any(|t| &t.id == id))
            {
                group.tasks.sort_by_key(|t| t.done);
            }
        }
    }

    /// Replace the content, returning the previous text
    pub fn set_content(&mut self, id: &TaskId, content: impl Into<String>) -> Option<String> {
        let task = self.find_mut(id)?;
        Some(std::mem::replace(&mut task.content, content.into()))
    }

    /// Drop the task; groups left empty disappear as they would on refetch
    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let BoardView::Ready(groups) = &mut self.view else {
            return None;
        };

        let (gi, ti) = groups.iter().enumerate().find_map(|(gi, g)| {
            g.tasks.iter().position(|t| &t.id == id).map(|ti| (gi, ti))
        })?;

        let task = groups[gi].tasks.remove(ti);
        if groups[gi].tasks.is_empty() {
            groups.remove(gi);
        }
        Some(task)
    }
}
