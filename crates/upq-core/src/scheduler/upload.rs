//! One claimed task, driven chunk by chunk from its recorded offset.

use std::fmt;

use super::Shared;
use crate::control::ClaimTicket;
use crate::registry::{ChunkReadError, FileHandle, MissingFileError};
use crate::retry::RetryDecision;
use crate::store::QueueStore;
use crate::task::{TaskStatus, UploadTask};
use crate::transport::ChunkTransport;

pub(super) struct Claim {
    pub(super) task: UploadTask,
    pub(super) file: FileHandle,
    pub(super) ticket: ClaimTicket,
}

/// How a drive ended.
#[derive(Debug)]
pub(super) enum Outcome {
    Done,
    /// Global pause or shutdown reached a chunk boundary.
    Paused,
    /// The task was removed or restarted; the queue entry is no longer ours.
    Abandoned,
    MissingFile(MissingFileError),
    Failed(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Done => f.write_str("done"),
            Outcome::Paused => f.write_str("paused"),
            Outcome::Abandoned => f.write_str("abandoned"),
            Outcome::MissingFile(e) => write!(f, "{}", e),
            Outcome::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

pub(super) struct UploadRun<'a, T, S: QueueStore> {
    shared: &'a Shared<T, S>,
    task: UploadTask,
    file: FileHandle,
    ticket: ClaimTicket,
    /// Session this run is using, including one started but not yet recorded.
    session: Option<String>,
}

impl<'a, T: ChunkTransport, S: QueueStore> UploadRun<'a, T, S> {
    pub(super) fn new(shared: &'a Shared<T, S>, claim: Claim) -> Self {
        let session = claim.task.session_id.clone();
        Self {
            shared,
            task: claim.task,
            file: claim.file,
            ticket: claim.ticket,
            session,
        }
    }

    pub(super) async fn drive(&mut self) -> Outcome {
        let chunk_size = self.shared.chunk_size;
        let session_id = match self.session.clone() {
            Some(sid) => sid,
            None => match self.start().await {
                Ok(sid) => sid,
                Err(outcome) => return outcome,
            },
        };

        let total_chunks = self.task.total_chunks(chunk_size);
        let mut index = self.task.next_chunk_index(chunk_size);
        let mut progress = self.task.progress;
        if index > 0 {
            tracing::info!(
                task = %self.task.id,
                chunk = index,
                total_chunks,
                "resuming upload"
            );
        }

        while index < total_chunks {
            if let Some(stop) = self.checkpoint() {
                return stop;
            }
            let (start, end) = self.task.chunk_range(index, chunk_size);
            let bytes = match self.file.read_chunk(start, end).await {
                Ok(bytes) => bytes,
                Err(ChunkReadError::Missing(e)) => return Outcome::MissingFile(e),
                Err(e) => return Outcome::Failed(e.to_string()),
            };
            let pct = match self
                .shared
                .transport
                .append_chunk(&session_id, index, bytes, total_chunks)
                .await
            {
                Ok(pct) => pct,
                Err(e) => return Outcome::Failed(e.to_string()),
            };
            // A resumed run re-sends chunks the server may already hold; only
            // an acknowledgement beyond the claim-time offset clears failures.
            let fresh = pct.min(99) > self.task.progress;
            progress = progress.max(pct.min(99));
            index += 1;

            let mut queue = self.shared.queue.lock().await;
            if self.ticket.token.is_cancelled() {
                return Outcome::Abandoned;
            }
            if let Some(task) = queue.task_mut(&self.task.id) {
                task.progress = progress;
                if fresh {
                    task.retries = 0;
                }
            }
            queue.persist_logged(self.shared.throttle.ready()).await;
        }

        if let Some(stop) = self.checkpoint() {
            return stop;
        }
        match self
            .shared
            .transport
            .finish_session(&session_id, &self.task.name)
            .await
        {
            Ok(()) => Outcome::Done,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }

    /// Open a session and record it on the task.
    async fn start(&mut self) -> Result<String, Outcome> {
        let started = self
            .shared
            .transport
            .start_session(&self.task.name, self.task.size, &self.task.media_type)
            .await
            .map_err(|e| Outcome::Failed(e.to_string()))?;
        let sid = started.session_id;
        self.session = Some(sid.clone());
        if let Some(recommended) = started.recommended_chunk_size {
            if recommended != self.shared.chunk_size {
                tracing::debug!(
                    recommended,
                    configured = self.shared.chunk_size,
                    "server recommends a different chunk size"
                );
            }
        }

        let mut queue = self.shared.queue.lock().await;
        if self.ticket.token.is_cancelled() {
            return Err(Outcome::Abandoned);
        }
        if let Some(task) = queue.task_mut(&self.task.id) {
            task.session_id = Some(sid.clone());
            task.retries = 0;
        }
        queue.persist_logged(true).await;
        tracing::debug!(task = %self.task.id, session = %sid, "session started");
        Ok(sid)
    }

    fn checkpoint(&self) -> Option<Outcome> {
        let control = &self.shared.control;
        if self.ticket.token.is_cancelled() {
            Some(Outcome::Abandoned)
        } else if control.is_paused() || control.shutdown_token().is_cancelled() {
            Some(Outcome::Paused)
        } else {
            None
        }
    }

    /// Apply the outcome to the queue and release the claim.
    pub(super) async fn settle(self, outcome: Outcome) {
        let id = self.task.id.clone();
        let mut queue = self.shared.queue.lock().await;
        let abandoned = self.ticket.token.is_cancelled() || matches!(outcome, Outcome::Abandoned);
        if abandoned || queue.get(&id).is_none() {
            drop(queue);
            tracing::info!(task = %id, "upload abandoned");
            if let Some(sid) = &self.session {
                self.shared.transport.cancel_session(sid).await;
            }
            self.shared.control.unregister(&id, &self.ticket);
            return;
        }

        match outcome {
            Outcome::Done => {
                if let Some(task) = queue.task_mut(&id) {
                    task.progress = 100;
                    task.status = TaskStatus::Done;
                    task.retries = 0;
                    task.last_error = None;
                }
                queue.release_file(&id);
                queue.persist_logged(true).await;
                tracing::info!("upload {} completed: {}", id, self.task.name);
            }
            Outcome::Paused => {
                if let Some(task) = queue.task_mut(&id) {
                    task.status = TaskStatus::Paused;
                }
                queue.persist_logged(true).await;
                tracing::info!("upload {} paused", id);
            }
            Outcome::MissingFile(e) => {
                if let Some(task) = queue.task_mut(&id) {
                    task.status = TaskStatus::WaitingForFile;
                }
                queue.release_file(&id);
                queue.persist_logged(true).await;
                tracing::warn!(task = %id, "{}", e);
            }
            Outcome::Failed(msg) => {
                let mut decision = RetryDecision::GiveUp;
                let mut retries = 0;
                if let Some(task) = queue.task_mut(&id) {
                    task.retries += 1;
                    retries = task.retries;
                    decision = self.shared.policy.decide(retries);
                    match decision {
                        RetryDecision::GiveUp => {
                            task.status = TaskStatus::Failed;
                            task.last_error = Some(msg.clone());
                        }
                        RetryDecision::RetryAfter(_) => task.status = TaskStatus::Retrying,
                    }
                }
                queue.persist_logged(true).await;
                match decision {
                    RetryDecision::GiveUp => {
                        tracing::warn!(task = %id, retries, "upload failed: {}", msg);
                    }
                    RetryDecision::RetryAfter(delay) => {
                        drop(queue);
                        tracing::info!(task = %id, retries, ?delay, "upload attempt failed, retrying: {}", msg);
                        return self.backoff(delay).await;
                    }
                }
            }
            Outcome::Abandoned => {}
        }
        self.shared.control.unregister(&id, &self.ticket);
    }

    /// Hold the slot for `delay`, then requeue. Remove, restart, and
    /// shutdown cut the wait short.
    async fn backoff(self, delay: std::time::Duration) {
        let shutdown = self.shared.control.shutdown_token();
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.ticket.token.cancelled() => {}
            _ = shutdown.cancelled() => {}
        }

        let id = self.task.id.clone();
        let mut queue = self.shared.queue.lock().await;
        if self.ticket.token.is_cancelled() {
            drop(queue);
            if let Some(sid) = &self.session {
                self.shared.transport.cancel_session(sid).await;
            }
            self.shared.control.unregister(&id, &self.ticket);
            return;
        }
        if let Some(task) = queue.task_mut(&id) {
            task.status = if shutdown.is_cancelled() {
                TaskStatus::Paused
            } else {
                TaskStatus::Queued
            };
        }
        queue.persist_logged(true).await;
        self.shared.control.unregister(&id, &self.ticket);
        self.shared.wake(&queue);
    }
}
