//! Scheduler-side access to the queue: claiming work and recording progress.

use super::UploadQueue;
use crate::registry::FileHandle;
use crate::store::QueueStore;
use crate::task::{TaskId, TaskStatus, UploadTask};

impl<S: QueueStore> UploadQueue<S> {
    /// Claim the first claimable task in queue order and mark it `uploading`.
    ///
    /// A claimable task whose file handle is gone is moved to
    /// `waiting_for_file` and skipped. Returns `None` when nothing can run.
    pub(crate) async fn claim_next(&mut self) -> Option<(UploadTask, FileHandle)> {
        let mut changed = false;
        let mut claimed = None;
        for task in &mut self.tasks {
            if !task.status.is_claimable() {
                continue;
            }
            match self.registry.resolve(&task.id) {
                Some(file) => {
                    task.status = TaskStatus::Uploading;
                    task.last_error = None;
                    claimed = Some((task.clone(), file));
                    changed = true;
                    break;
                }
                None => {
                    tracing::debug!(task = %task.id, "no file handle, waiting for file");
                    task.status = TaskStatus::WaitingForFile;
                    changed = true;
                }
            }
        }
        if changed {
            self.persist_logged(true).await;
        }
        claimed
    }

    /// Persist from a worker. A failed write is logged and the pipeline
    /// carries on; the next mutation rewrites the whole snapshot anyway.
    pub(crate) async fn persist_logged(&self, render: bool) {
        let res = if render {
            self.persist().await
        } else {
            self.persist_quiet().await
        };
        if let Err(e) = res {
            tracing::warn!(error = %e, "queue snapshot write failed");
        }
    }

    pub(crate) fn task_mut(&mut self, id: &TaskId) -> Option<&mut UploadTask> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    pub(crate) fn release_file(&mut self, id: &TaskId) {
        self.registry.release(id);
    }

    /// True if any task is queued or paused and still has its file.
    pub(crate) fn has_claimable(&self) -> bool {
        self.tasks
            .iter()
            .any(|t| t.status.is_claimable() && self.registry.contains(&t.id))
    }
}
