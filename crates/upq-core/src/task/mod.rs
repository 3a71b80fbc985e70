//! Upload task model: the persistable metadata of one file's upload.
//!
//! Binary content never lives here; the readable handle is kept in the
//! [`FileRegistry`](crate::registry::FileRegistry) under the same id.

mod id;

pub use id::{generate_task_id, TaskId};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::registry::FileHandle;

/// Lifecycle state of an upload task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Uploading,
    Paused,
    Retrying,
    #[serde(alias = "waiting_file")]
    WaitingForFile,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Uploading => "uploading",
            TaskStatus::Paused => "paused",
            TaskStatus::Retrying => "retrying",
            TaskStatus::WaitingForFile => "waiting_for_file",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }

    /// `done` and `failed`: no automatic transition leaves these.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }

    /// States a worker may claim.
    pub fn is_claimable(self) -> bool {
        matches!(self, TaskStatus::Queued | TaskStatus::Paused)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata of one upload. This is exactly what gets persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTask {
    pub id: TaskId,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub media_type: String,
    pub session_id: Option<String>,
    /// Percent, 0..=100. 100 only once the session is finished.
    pub progress: u8,
    pub status: TaskStatus,
    pub retries: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Source file modification time in ms since the Unix epoch.
    #[serde(default)]
    pub last_modified: u64,
}

impl UploadTask {
    pub fn new(id: TaskId, file: &FileHandle) -> Self {
        Self {
            id,
            name: file.name.clone(),
            size: file.size,
            media_type: file.media_type.clone(),
            session_id: None,
            progress: 0,
            status: TaskStatus::Queued,
            retries: 0,
            last_error: None,
            last_modified: file.last_modified,
        }
    }

    /// Number of chunks the file splits into (0 for an empty file).
    pub fn total_chunks(&self, chunk_size: u64) -> u64 {
        self.size.div_ceil(chunk_size.max(1))
    }

    /// Index of the first chunk not yet covered by `progress`.
    ///
    /// `floor(progress * size / 100 / chunk_size)`: resuming re-sends at most
    /// the partially acknowledged chunk, never the whole file.
    pub fn next_chunk_index(&self, chunk_size: u64) -> u64 {
        let uploaded = (u128::from(self.progress) * u128::from(self.size) / 100) as u64;
        uploaded / chunk_size.max(1)
    }

    /// Byte range `[start, end)` of chunk `index`.
    pub fn chunk_range(&self, index: u64, chunk_size: u64) -> (u64, u64) {
        let start = index.saturating_mul(chunk_size).min(self.size);
        let end = start.saturating_add(chunk_size).min(self.size);
        (start, end)
    }

    /// Back to a fresh, never-started upload.
    pub(crate) fn reset(&mut self, has_file: bool) {
        self.progress = 0;
        self.session_id = None;
        self.retries = 0;
        self.last_error = None;
        self.status = if has_file {
            TaskStatus::Queued
        } else {
            TaskStatus::WaitingForFile
        };
    }

    /// True when `file` looks like the file this task was created from.
    pub fn matches_file(&self, file: &FileHandle) -> bool {
        self.name == file.name && self.size == file.size && self.last_modified == file.last_modified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FileHandle;

    const MIB: u64 = 1024 * 1024;

    fn task(size: u64, progress: u8) -> UploadTask {
        let file = FileHandle::from_bytes("a.bin", vec![0u8; 0]);
        let mut t = UploadTask::new(TaskId::from("t1"), &file);
        t.size = size;
        t.progress = progress;
        t
    }

    #[test]
    fn next_chunk_index_from_progress() {
        assert_eq!(task(10 * MIB, 0).next_chunk_index(MIB), 0);
        assert_eq!(task(10 * MIB, 20).next_chunk_index(MIB), 2);
        assert_eq!(task(10 * MIB, 99).next_chunk_index(MIB), 9);
        // 7 MiB at 50%: 3.5 MiB acknowledged -> chunk 3 is re-sent.
        assert_eq!(task(7 * MIB, 50).next_chunk_index(MIB), 3);
    }

    #[test]
    fn total_chunks_rounds_up() {
        assert_eq!(task(10 * MIB, 0).total_chunks(MIB), 10);
        assert_eq!(task(10 * MIB + 1, 0).total_chunks(MIB), 11);
        assert_eq!(task(0, 0).total_chunks(MIB), 0);
    }

    #[test]
    fn last_chunk_range_is_short() {
        let t = task(MIB + 10, 0);
        assert_eq!(t.chunk_range(0, MIB), (0, MIB));
        assert_eq!(t.chunk_range(1, MIB), (MIB, MIB + 10));
    }

    #[test]
    fn status_serializes_snake_case_and_accepts_legacy_name() {
        let s = serde_json::to_string(&TaskStatus::WaitingForFile).unwrap();
        assert_eq!(s, "\"waiting_for_file\"");
        let legacy: TaskStatus = serde_json::from_str("\"waiting_file\"").unwrap();
        assert_eq!(legacy, TaskStatus::WaitingForFile);
    }

    #[test]
    fn persisted_field_names() {
        let t = task(42, 10);
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["type"], "application/octet-stream");
        assert!(v["sessionId"].is_null());
        assert_eq!(v["lastModified"], 0);
        assert_eq!(v["status"], "queued");
    }

    #[test]
    fn reset_without_file_waits() {
        let mut t = task(42, 60);
        t.session_id = Some("s".into());
        t.retries = 2;
        t.status = TaskStatus::Failed;
        t.last_error = Some("boom".into());
        t.reset(false);
        assert_eq!(t.status, TaskStatus::WaitingForFile);
        assert_eq!(t.progress, 0);
        assert!(t.session_id.is_none());
        assert_eq!(t.retries, 0);
        assert!(t.last_error.is_none());
    }
}
