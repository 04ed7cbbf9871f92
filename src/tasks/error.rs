//! Task synchronization errors

use thiserror::Error;

use super::types::TaskId;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Could not load tasks: {0}")]
    FetchFailed(String),

    #[error("Could not update task {id}: {reason}")]
    MutationFailed { id: TaskId, reason: String },
}

impl SyncError {
    pub fn mutation(id: &TaskId, reason: impl ToString) -> Self {
        SyncError::MutationFailed {
            id: id.clone(),
            reason: reason.to_string(),
        }
    }
}
