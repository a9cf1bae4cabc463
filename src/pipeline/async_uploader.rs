use std::sync::Arc;
use std::time::Duration;

use log::warn;
use tokio::task::JoinError;
use tokio::time::timeout;

use crate::constants::DEFAULT_ASYNC_DEADLINE_SECS;
use crate::error::{Result, UploadError};
use crate::pipeline::{DeleteOutcome, StoredFileRef, Uploader};

/// Runs [`Uploader`] calls on tokio's blocking pool with an overall deadline.
///
/// The session's own timeout still bounds each blocking SSH call. When the
/// deadline fires first the caller gets a transfer error right away; the
/// blocking task keeps running until its current call returns and then
/// releases its session as usual.
#[derive(Clone)]
pub struct AsyncUploader {
    inner: Arc<Uploader>,
    deadline: Duration,
}

impl AsyncUploader {
    pub fn new(uploader: Uploader) -> Self {
        Self {
            inner: Arc::new(uploader),
            deadline: Duration::from_secs(DEFAULT_ASYNC_DEADLINE_SECS),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub async fn store_bytes(
        &self,
        content: Vec<u8>,
        logical_path: &str,
        file_name: &str,
    ) -> Result<StoredFileRef> {
        let inner = Arc::clone(&self.inner);
        let logical_path = logical_path.to_string();
        let file_name = file_name.to_string();
        self.run("store", move || {
            inner.store_bytes(&content, &logical_path, &file_name)
        })
        .await
    }

    pub async fn fetch(&self, relative_path: &str) -> Result<Option<Vec<u8>>> {
        let inner = Arc::clone(&self.inner);
        let relative_path = relative_path.to_string();
        self.run("fetch", move || inner.fetch(&relative_path)).await
    }

    pub async fn delete(&self, relative_path: &str) -> Result<DeleteOutcome> {
        let inner = Arc::clone(&self.inner);
        let relative_path = relative_path.to_string();
        self.run("delete", move || inner.delete(&relative_path)).await
    }

    async fn run<T, F>(&self, operation: &str, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(job);
        match timeout(self.deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(join_failure(operation, join_err)),
            Err(_) => {
                warn!("{} did not finish within {:?}", operation, self.deadline);
                Err(UploadError::Transfer(format!(
                    "{} timed out after {:?}",
                    operation, self.deadline
                )))
            }
        }
    }
}

fn join_failure(operation: &str, err: JoinError) -> UploadError {
    if err.is_panic() {
        UploadError::Transfer(format!("{} task panicked", operation))
    } else {
        UploadError::Transfer(format!("{} task was cancelled", operation))
    }
}
