//! Upload manager: owns the queue, runs the worker pool, and applies user
//! intents (enqueue, attach, remove, clear, restart, pause, resume).
//!
//! Up to `max_active_uploads` workers each claim one task at a time in queue
//! order and drive it chunk by chunk. Every queue mutation, from a user or a
//! worker, happens under one async mutex.

mod progress;
mod reconcile;
mod upload;
mod worker;

use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::UpqConfig;
use crate::control::UploadControl;
use crate::queue::UploadQueue;
use crate::registry::FileHandle;
use crate::retry::RetryPolicy;
use crate::store::QueueStore;
use crate::task::{TaskId, UploadTask};
use crate::transport::ChunkTransport;
use crate::view::QueueView;

use progress::RenderThrottle;

/// Tunables of one manager instance.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub max_active_uploads: usize,
    pub chunk_size: u64,
    pub render_interval: Duration,
    pub retry: RetryPolicy,
    /// Query the server for every stored session on startup. Commands that
    /// only edit the queue turn this off to stay offline.
    pub reconcile: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self::from_config(&UpqConfig::default())
    }
}

impl ManagerOptions {
    pub fn from_config(cfg: &UpqConfig) -> Self {
        Self {
            max_active_uploads: cfg.max_active_uploads,
            chunk_size: cfg.chunk_size,
            render_interval: cfg.render_interval(),
            retry: cfg.retry_policy(),
            reconcile: true,
        }
    }
}

/// State shared by the manager handle and its workers.
pub(crate) struct Shared<T, S: QueueStore> {
    pub(crate) queue: Mutex<UploadQueue<S>>,
    pub(crate) transport: T,
    pub(crate) control: UploadControl,
    pub(crate) policy: RetryPolicy,
    pub(crate) chunk_size: u64,
    pub(crate) throttle: RenderThrottle,
}

impl<T, S: QueueStore> Shared<T, S> {
    /// Wake the workers after a mutation that may have made work claimable.
    /// Call with the queue lock held so `wait_idle` cannot observe a stale idle flag.
    pub(crate) fn wake(&self, queue: &UploadQueue<S>) {
        if !self.control.is_paused() && queue.has_claimable() {
            self.control.set_idle(false);
        }
        self.control.kick();
    }
}

pub struct UploadManager<T: ChunkTransport, S: QueueStore> {
    shared: Arc<Shared<T, S>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: ChunkTransport, S: QueueStore> UploadManager<T, S> {
    /// Load the persisted queue, reconcile remote sessions when
    /// `options.reconcile` is set, and start the worker pool. Must be called
    /// inside a tokio runtime.
    pub async fn create(
        options: ManagerOptions,
        transport: T,
        store: S,
        view: Arc<dyn QueueView>,
    ) -> Result<Self> {
        if options.chunk_size == 0 {
            return Err(anyhow!("chunk_size must be greater than zero"));
        }
        let mut queue = UploadQueue::load(store, view).await?;
        let realigned = if options.reconcile {
            reconcile::reconcile_sessions(&mut queue, &transport).await
        } else {
            0
        };
        queue.persist().await?;
        tracing::info!(
            tasks = queue.len(),
            realigned,
            workers = options.max_active_uploads.max(1),
            "upload manager started"
        );

        let shared = Arc::new(Shared {
            queue: Mutex::new(queue),
            transport,
            control: UploadControl::new(),
            policy: options.retry,
            chunk_size: options.chunk_size,
            throttle: RenderThrottle::new(options.render_interval),
        });
        let workers = (0..options.max_active_uploads.max(1))
            .map(|n| tokio::spawn(worker::run(Arc::clone(&shared), n)))
            .collect();
        Ok(Self { shared, workers })
    }

    /// Queue files for upload; returns the new task ids in order.
    pub async fn enqueue(&self, files: Vec<FileHandle>) -> Result<Vec<TaskId>> {
        let mut queue = self.shared.queue.lock().await;
        let ids = queue.enqueue(files).await?;
        if !ids.is_empty() {
            self.shared.wake(&queue);
        }
        Ok(ids)
    }

    /// Re-supply the file of a task restored as `waiting_for_file`.
    pub async fn attach(&self, id: &TaskId, file: FileHandle) -> Result<()> {
        let mut queue = self.shared.queue.lock().await;
        queue.attach(id, file).await?;
        self.shared.wake(&queue);
        Ok(())
    }

    /// Remove a task. An in-flight upload is abandoned at its next chunk
    /// boundary and its session cancelled by the worker; otherwise the
    /// session, if any, is cancelled here.
    pub async fn remove(&self, id: &TaskId) -> Result<UploadTask> {
        let (task, active) = {
            let mut queue = self.shared.queue.lock().await;
            let task = queue.remove(id).await?;
            (task, self.shared.control.abort(id))
        };
        if !active {
            if let Some(sid) = &task.session_id {
                self.shared.transport.cancel_session(sid).await;
            }
        }
        Ok(task)
    }

    /// Drop every finished task; returns how many were removed.
    pub async fn clear_completed(&self) -> Result<usize> {
        self.shared.queue.lock().await.clear_completed().await
    }

    /// Abandon active uploads and reset every task to a fresh upload.
    /// Dropped sessions get a best-effort remote cancel.
    pub async fn restart_all(&self) -> Result<()> {
        let stale = {
            let mut queue = self.shared.queue.lock().await;
            let active = self.shared.control.abort_all();
            // Workers cancel the sessions they were driving themselves.
            let owned: HashSet<String> = active
                .iter()
                .filter_map(|id| queue.get(id).and_then(|t| t.session_id.clone()))
                .collect();
            let dropped = queue.restart_all().await?;
            self.shared.wake(&queue);
            dropped
                .into_iter()
                .filter(|sid| !owned.contains(sid))
                .collect::<Vec<_>>()
        };
        for sid in stale {
            self.shared.transport.cancel_session(&sid).await;
        }
        Ok(())
    }

    /// Stop claiming new tasks. Active uploads finish their in-flight chunk
    /// and become `paused`.
    pub async fn pause(&self) {
        let _queue = self.shared.queue.lock().await;
        self.shared.control.set_paused(true);
        self.shared.control.kick();
        tracing::info!("uploads paused");
    }

    pub async fn resume(&self) {
        let queue = self.shared.queue.lock().await;
        self.shared.control.set_paused(false);
        self.shared.wake(&queue);
        tracing::info!("uploads resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.shared.control.is_paused()
    }

    pub async fn snapshot(&self) -> Vec<UploadTask> {
        self.shared.queue.lock().await.snapshot()
    }

    /// Id of a `waiting_for_file` task that `file` can be re-attached to.
    pub async fn find_waiting(&self, file: &FileHandle) -> Option<TaskId> {
        self.shared.queue.lock().await.find_waiting_match(file)
    }

    /// Resolves once no task is active and none can be claimed.
    pub async fn wait_idle(&self) -> Result<()> {
        let mut idle = self.shared.control.subscribe_idle();
        idle.wait_for(|idle| *idle)
            .await
            .map_err(|_| anyhow!("upload manager stopped"))?;
        Ok(())
    }

    /// Stop the workers (active tasks stop at their next chunk boundary as
    /// `paused`) and write the final snapshot.
    pub async fn dispose(self) -> Result<()> {
        self.shared.control.shutdown();
        for handle in self.workers {
            if let Err(e) = handle.await {
                tracing::warn!("upload worker join: {}", e);
            }
        }
        self.shared.queue.lock().await.persist().await?;
        tracing::info!("upload manager stopped");
        Ok(())
    }
}
