//! Ordered upload queue: task metadata, the file registry, and the durable
//! snapshot that is rewritten on every mutation.
//!
//! The queue itself never talks to the network. The scheduler mutates tasks
//! only through the crate-internal accessors in `claim`.

mod claim;

use anyhow::Result;
use std::sync::Arc;

use crate::registry::{FileHandle, FileRegistry};
use crate::store::QueueStore;
use crate::task::{generate_task_id, TaskId, TaskStatus, UploadTask};
use crate::view::QueueView;

/// Errors from user intents against the queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("no task with id {0}")]
    NotFound(TaskId),
    #[error("task {id} is {status}, only tasks waiting for their file can be re-attached")]
    NotWaiting { id: TaskId, status: TaskStatus },
    #[error("file {name} has {found} bytes but task {id} expects {expected}")]
    SizeMismatch {
        id: TaskId,
        name: String,
        expected: u64,
        found: u64,
    },
}

pub struct UploadQueue<S: QueueStore> {
    tasks: Vec<UploadTask>,
    registry: FileRegistry,
    store: S,
    view: Arc<dyn QueueView>,
}

impl<S: QueueStore> UploadQueue<S> {
    /// Empty queue; nothing is read from or written to `store` yet.
    pub fn new(store: S, view: Arc<dyn QueueView>) -> Self {
        Self {
            tasks: Vec::new(),
            registry: FileRegistry::new(),
            store,
            view,
        }
    }

    /// Restore the queue from `store`.
    ///
    /// File handles never survive a restart, so every task that is not `done`
    /// or `failed` comes back as `waiting_for_file` with its progress intact.
    pub async fn load(store: S, view: Arc<dyn QueueView>) -> Result<Self> {
        let mut tasks = store.load().await?;
        let mut waiting = 0usize;
        for task in &mut tasks {
            if !task.status.is_terminal() {
                task.status = TaskStatus::WaitingForFile;
                task.last_error = None;
                waiting += 1;
            }
        }
        tracing::debug!(tasks = tasks.len(), waiting, "queue loaded");
        Ok(Self {
            tasks,
            registry: FileRegistry::new(),
            store,
            view,
        })
    }

    /// Write the snapshot and refresh the view.
    pub async fn persist(&self) -> Result<()> {
        self.store.save(&self.tasks).await?;
        self.view.render(&self.tasks);
        Ok(())
    }

    /// Write the snapshot without a view refresh (throttled progress updates).
    pub(crate) async fn persist_quiet(&self) -> Result<()> {
        self.store.save(&self.tasks).await
    }

    /// Append one `queued` task per file. An empty list changes nothing.
    pub async fn enqueue(&mut self, files: Vec<FileHandle>) -> Result<Vec<TaskId>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let id = generate_task_id(&file.name, file.size, file.last_modified, |candidate| {
                self.tasks.iter().any(|t| &t.id == candidate)
            });
            self.tasks.push(UploadTask::new(id.clone(), &file));
            tracing::info!(task = %id, name = %file.name, size = file.size, "queued upload");
            self.registry.register(id.clone(), file);
            ids.push(id);
        }
        self.persist().await?;
        Ok(ids)
    }

    /// Drop a task and its file handle. Returns the removed task so the
    /// caller can clean up a remote session.
    pub async fn remove(&mut self, id: &TaskId) -> Result<UploadTask> {
        let pos = self
            .position(id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        let task = self.tasks.remove(pos);
        self.registry.release(id);
        self.persist().await?;
        tracing::info!(task = %id, "removed from queue");
        Ok(task)
    }

    /// Remove every `done` task; returns how many were removed.
    pub async fn clear_completed(&mut self) -> Result<usize> {
        let before = self.tasks.len();
        let registry = &mut self.registry;
        self.tasks.retain(|t| {
            if t.status == TaskStatus::Done {
                registry.release(&t.id);
                false
            } else {
                true
            }
        });
        let removed = before - self.tasks.len();
        if removed > 0 {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Reset every task to a fresh upload. Tasks without a file handle stay
    /// `waiting_for_file`. Returns the session ids that were dropped.
    pub async fn restart_all(&mut self) -> Result<Vec<String>> {
        let mut dropped = Vec::new();
        for task in &mut self.tasks {
            if let Some(sid) = task.session_id.take() {
                dropped.push(sid);
            }
            let has_file = self.registry.contains(&task.id);
            task.reset(has_file);
        }
        self.persist().await?;
        tracing::info!(tasks = self.tasks.len(), "queue restarted");
        Ok(dropped)
    }

    /// Re-supply the file of a `waiting_for_file` task. Progress and session
    /// are kept so the upload resumes from its recorded offset.
    pub async fn attach(&mut self, id: &TaskId, file: FileHandle) -> Result<()> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        if task.status != TaskStatus::WaitingForFile {
            return Err(QueueError::NotWaiting {
                id: id.clone(),
                status: task.status,
            }
            .into());
        }
        if file.size != task.size {
            return Err(QueueError::SizeMismatch {
                id: id.clone(),
                name: file.name.clone(),
                expected: task.size,
                found: file.size,
            }
            .into());
        }
        task.status = TaskStatus::Queued;
        self.registry.register(id.clone(), file);
        self.persist().await?;
        tracing::info!(task = %id, "file re-attached");
        Ok(())
    }

    /// First waiting task that `file` looks like (same name, size, mtime).
    pub fn find_waiting_match(&self, file: &FileHandle) -> Option<TaskId> {
        self.tasks
            .iter()
            .find(|t| t.status == TaskStatus::WaitingForFile && t.matches_file(file))
            .map(|t| t.id.clone())
    }

    /// Ordered copy of all tasks.
    pub fn snapshot(&self) -> Vec<UploadTask> {
        self.tasks.clone()
    }

    pub fn get(&self, id: &TaskId) -> Option<&UploadTask> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.id == id)
    }
}
