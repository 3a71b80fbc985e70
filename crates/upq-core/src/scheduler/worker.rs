//! Worker loop: claim the next eligible task, drive it, repeat; sleep on the
//! wake channel when there is nothing to do.

use std::sync::Arc;

use super::upload::{Claim, UploadRun};
use super::Shared;
use crate::store::QueueStore;
use crate::transport::ChunkTransport;

pub(super) async fn run<T: ChunkTransport, S: QueueStore>(shared: Arc<Shared<T, S>>, worker: usize) {
    let mut wake = shared.control.subscribe_wake();
    let shutdown = shared.control.shutdown_token().clone();
    loop {
        wake.borrow_and_update();
        if shutdown.is_cancelled() {
            break;
        }
        if let Some(claim) = claim(&shared).await {
            tracing::debug!(worker, task = %claim.task.id, "claimed");
            let mut run = UploadRun::new(&shared, claim);
            let outcome = run.drive().await;
            tracing::debug!(worker, outcome = %outcome, "drive finished");
            run.settle(outcome).await;
            continue;
        }
        tokio::select! {
            changed = wake.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }
    tracing::debug!(worker, "worker stopped");
}

/// Claim under the queue lock. When nothing is claimable and no other worker
/// is busy, the manager is marked idle.
async fn claim<T: ChunkTransport, S: QueueStore>(shared: &Shared<T, S>) -> Option<Claim> {
    let mut queue = shared.queue.lock().await;
    let control = &shared.control;
    if !control.is_paused() && !control.shutdown_token().is_cancelled() {
        if let Some((task, file)) = queue.claim_next().await {
            let ticket = control.register(&task.id);
            control.set_idle(false);
            return Some(Claim { task, file, ticket });
        }
    }
    if control.busy() == 0 {
        control.set_idle(true);
    }
    None
}
