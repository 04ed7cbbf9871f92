//! HTTP client for the task backend

use futures::future::BoxFuture;
use reqwest::{Client, Url};

use super::error::SyncError;
use super::types::{TaskGroup, TaskId, TaskListing, TaskPatch};

/// Remote store of tasks
pub trait TaskApi: Send + Sync + 'static {
    fn list(&self) -> BoxFuture<'static, Result<Vec<TaskGroup>, SyncError>>;

    fn update(&self, id: &TaskId, patch: TaskPatch) -> BoxFuture<'static, Result<(), SyncError>>;

    fn delete(&self, id: &TaskId) -> BoxFuture<'static, Result<(), SyncError>>;
}

/// `GET/PUT/DELETE {server}/api/tasks[/{id}]`
#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: Client,
    tasks_url: String,
}

impl HttpTaskApi {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            tasks_url: format!("{}/api/tasks", base_url.trim_end_matches('/')),
        }
    }

    /// Task URL with the id escaped as a single path segment
    pub fn task_url(&self, id: &TaskId) -> Result<Url, String> {
        let mut url = Url::parse(&self.tasks_url).map_err(|e| e.to_string())?;
        url.path_segments_mut()
            .map_err(|_| format!("{} cannot take a path", self.tasks_url))?
            .push(id.as_str());
        Ok(url)
    }
}

impl TaskApi for HttpTaskApi {
    fn list(&self) -> BoxFuture<'static, Result<Vec<TaskGroup>, SyncError>> {
        let client = self.client.clone();
        let url = self.tasks_url.clone();

        Box::pin(async move {
            let fail = |e: reqwest::Error| SyncError::FetchFailed(e.to_string());

            let response = client.get(&url).send().await.map_err(fail)?;
            let status = response.status();
            if !status.is_success() {
                return Err(SyncError::FetchFailed(format!("server returned {}", status)));
            }

            let listing: TaskListing = response.json().await.map_err(fail)?;
            let groups = listing.into_groups().map_err(SyncError::FetchFailed)?;
            tracing::debug!("Fetched {} task groups", groups.len());
            Ok(groups)
        })
    }

    fn update(&self, id: &TaskId, patch: TaskPatch) -> BoxFuture<'static, Result<(), SyncError>> {
        let client = self.client.clone();
        let url = self.task_url(id);
        let id = id.clone();

        Box::pin(async move {
            let url = url.map_err(|e| SyncError::mutation(&id, e))?;
            let response = client
                .put(url)
                .json(&patch)
                .send()
                .await
                .map_err(|e| SyncError::mutation(&id, e))?;
            check_status(&id, response.status())
        })
    }

    fn delete(&self, id: &TaskId) -> BoxFuture<'static, Result<(), SyncError>> {
        let client = self.client.clone();
        let url = self.task_url(id);
        let id = id.clone();

        Box::pin(async move {
            let url = url.map_err(|e| SyncError::mutation(&id, e))?;
            let response = client
                .delete(url)
                .send()
                .await
                .map_err(|e| SyncError::mutation(&id, e))?;
            check_status(&id, response.status())
        })
    }
}

fn check_status(id: &TaskId, status: reqwest::StatusCode) -> Result<(), SyncError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(SyncError::mutation(id, format!("server returned {}", status)))
    }
}
