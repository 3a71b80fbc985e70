//! Durable storage of the queue snapshot (task metadata only).
//!
//! The whole ordered task list is written as one JSON array on every
//! mutation; binary content is never part of it.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use anyhow::{Context, Result};
use std::future::Future;

use crate::task::UploadTask;

/// Backend that keeps the latest queue snapshot.
pub trait QueueStore: Send + Sync + 'static {
    /// Replace the stored snapshot with `tasks`.
    fn save(&self, tasks: &[UploadTask]) -> impl Future<Output = Result<()>> + Send;

    /// The last saved snapshot, or an empty list if nothing was saved yet.
    fn load(&self) -> impl Future<Output = Result<Vec<UploadTask>>> + Send;
}

pub(crate) fn encode_snapshot(tasks: &[UploadTask]) -> Result<String> {
    serde_json::to_string(tasks).context("serialize queue snapshot")
}

pub(crate) fn decode_snapshot(json: &str) -> Result<Vec<UploadTask>> {
    serde_json::from_str(json).context("parse queue snapshot")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_snapshot_written_by_older_client() {
        // Older snapshots have no lastError and use the old status name.
        let json = r#"[{"id":"a.mp3-10-1-2","name":"a.mp3","size":10,"type":"audio/mpeg",
            "sessionId":null,"progress":40,"status":"waiting_file","retries":0,"lastModified":1}]"#;
        let tasks = decode_snapshot(json).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].progress, 40);
        assert_eq!(tasks[0].status, crate::task::TaskStatus::WaitingForFile);
        assert!(tasks[0].last_error.is_none());
    }
}
