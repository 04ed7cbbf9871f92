//! Optimistic task edits reconciled against the backend
//!
//! Every operation applies its local change right away and hands back a
//! [`PendingSync`]. The owner drives that future (inline or on a spawned
//! task) and passes the resulting [`SyncOutcome`] to
//! [`TaskSynchronizer::settle`]. Outcomes are applied in the order they
//! settle, so for overlapping edits of one task the last response wins.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;

use super::api::TaskApi;
use super::board::{BoardView, TaskBoard};
use super::error::SyncError;
use super::types::{TaskGroup, TaskId, TaskPatch};

/// Network half of an operation
pub type PendingSync = BoxFuture<'static, SyncOutcome>;

/// User's answer to the delete prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

/// Settled network result, carrying what is needed to reconcile
#[derive(Debug)]
pub enum SyncOutcome {
    Fetched(Result<Vec<TaskGroup>, SyncError>),
    DoneSet {
        id: TaskId,
        done: bool,
        previous: bool,
        result: Result<(), SyncError>,
    },
    Renamed {
        id: TaskId,
        content: String,
        previous: String,
        result: Result<(), SyncError>,
    },
    Removed {
        id: TaskId,
        result: Result<(), SyncError>,
    },
}

impl SyncOutcome {
    /// Whether the server's order must be fetched after settling.
    ///
    /// A confirmed done change is relocated locally at once, but only the
    /// backend knows where the task sits among the others.
    pub fn needs_refetch(&self) -> bool {
        matches!(self, SyncOutcome::DoneSet { result: Ok(()), .. })
    }
}

pub struct TaskSynchronizer<A> {
    api: Arc<A>,
    board: TaskBoard,
}

impl<A: TaskApi> TaskSynchronizer<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            board: TaskBoard::new(),
        }
    }

    pub fn board(&self) -> &TaskBoard {
        &self.board
    }

    pub fn view(&self) -> &BoardView {
        self.board.view()
    }

    /// Reload the whole list
    pub fn fetch_all(&mut self) -> PendingSync {
        if !self.board.is_ready() {
            self.board.set_loading();
        }
        self.api.list().map(SyncOutcome::Fetched).boxed()
    }

    /// Flip the done flag locally and send it
    pub fn set_done(&mut self, id: &TaskId, done: bool) -> Option<PendingSync> {
        let previous = self.board.set_done(id, done)?;
        let id = id.clone();

        Some(
            self.api
                .update(&id, TaskPatch::done(done))
                .map(move |result| SyncOutcome::DoneSet {
                    id,
                    done,
                    previous,
                    result,
                })
                .boxed(),
        )
    }

    /// Commit an edit. Empty or unchanged text is a no-op with no request.
    pub fn rename(&mut self, id: &TaskId, new_content: &str) -> Option<PendingSync> {
        let content = new_content.trim();
        let current = self.board.find(id)?;
        if content.is_empty() || content == current.content {
            return None;
        }

        let content = content.to_string();
        let previous = self.board.set_content(id, content.clone())?;
        let id = id.clone();

        Some(
            self.api
                .update(&id, TaskPatch::content(content.clone()))
                .map(move |result| SyncOutcome::Renamed {
                    id,
                    content,
                    previous,
                    result,
                })
                .boxed(),
        )
    }

    /// Delete after the user confirmed. The task stays visible until the
    /// server agrees.
    pub fn remove(&mut self, id: &TaskId, confirmation: Confirmation) -> Option<PendingSync> {
        if confirmation == Confirmation::Declined {
            return None;
        }
        self.board.find(id)?;
        let id = id.clone();

        Some(
            self.api
                .delete(&id)
                .map(move |result| SyncOutcome::Removed { id, result })
                .boxed(),
        )
    }

    /// Reconcile a settled operation, returning its error for display
    pub fn settle(&mut self, outcome: SyncOutcome) -> Result<(), SyncError> {
        match outcome {
            SyncOutcome::Fetched(Ok(groups)) => {
                self.board.replace(groups);
                Ok(())
            }
            SyncOutcome::Fetched(Err(e)) => {
                tracing::warn!("{}", e);
                self.board.mark_unavailable(e.to_string());
                Err(e)
            }
            SyncOutcome::DoneSet {
                id, result: Ok(()), ..
            } => {
                self.board.relocate(&id);
                Ok(())
            }
            SyncOutcome::DoneSet {
                id,
                done,
                previous,
                result: Err(e),
            } => {
                tracing::warn!("{}", e);
                // Leave it alone if a newer toggle already changed it
                if self.board.find(&id).map(|t| t.done) == Some(done) {
                    self.board.set_done(&id, previous);
                }
                Err(e)
            }
            SyncOutcome::Renamed { result: Ok(()), .. } => Ok(()),
            SyncOutcome::Renamed {
                id,
                content,
                previous,
                result: Err(e),
            } => {
                tracing::warn!("{}", e);
                if self.board.find(&id).map(|t| t.content.as_str()) == Some(content.as_str()) {
                    self.board.set_content(&id, previous);
                }
                Err(e)
            }
            SyncOutcome::Removed { id, result: Ok(()) } => {
                self.board.remove(&id);
                Ok(())
            }
            SyncOutcome::Removed { result: Err(e), .. } => {
                tracing::warn!("{}", e);
                Err(e)
            }
        }
    }
}
