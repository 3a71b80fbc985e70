//! Realign restored tasks with the server's view of their sessions.

use crate::queue::UploadQueue;
use crate::store::QueueStore;
use crate::task::TaskId;
use crate::transport::ChunkTransport;

/// Query every unfinished task that still has a session id.
///
/// A live session sets progress to what the server has acknowledged (below
/// 100 until finish). A vanished session is dropped and progress reset, so
/// the next claim starts over. Transport failures leave the task as it was.
/// Returns how many tasks changed.
pub(crate) async fn reconcile_sessions<S: QueueStore, T: ChunkTransport>(
    queue: &mut UploadQueue<S>,
    transport: &T,
) -> usize {
    let pending: Vec<(TaskId, String)> = queue
        .snapshot()
        .into_iter()
        .filter(|t| !t.status.is_terminal())
        .filter_map(|t| t.session_id.map(|sid| (t.id, sid)))
        .collect();

    let mut changed = 0;
    for (id, sid) in pending {
        let status = match transport.query_status(&sid).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(task = %id, error = %e, "session status unavailable, keeping local progress");
                continue;
            }
        };
        let Some(task) = queue.task_mut(&id) else {
            continue;
        };
        if status.exists {
            let progress = status.progress();
            if task.progress != progress {
                tracing::debug!(task = %id, local = task.progress, server = progress, "progress realigned");
                task.progress = progress;
                changed += 1;
            }
        } else {
            tracing::info!("session {} for task {} expired, upload will start over", sid, id);
            task.session_id = None;
            task.progress = 0;
            changed += 1;
        }
    }
    changed
}
