//! Rendering boundary: the core pushes ordered task snapshots out through
//! [`QueueView`]; views never touch task fields themselves.

use crate::task::{TaskStatus, UploadTask};

/// Receives the full ordered snapshot after queue mutations.
pub trait QueueView: Send + Sync {
    fn render(&self, tasks: &[UploadTask]);
}

/// View that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopView;

impl QueueView for NoopView {
    fn render(&self, _tasks: &[UploadTask]) {}
}

impl<F> QueueView for F
where
    F: Fn(&[UploadTask]) + Send + Sync,
{
    fn render(&self, tasks: &[UploadTask]) {
        self(tasks)
    }
}

/// Mean progress over all tasks (0 for an empty queue).
pub fn overall_progress(tasks: &[UploadTask]) -> u8 {
    if tasks.is_empty() {
        return 0;
    }
    let sum: u64 = tasks.iter().map(|t| u64::from(t.progress)).sum();
    (sum / tasks.len() as u64) as u8
}

/// Per-status counts for a status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSummary {
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    pub waiting_for_file: usize,
    pub pending: usize,
}

impl QueueSummary {
    pub fn of(tasks: &[UploadTask]) -> Self {
        let mut s = QueueSummary {
            total: tasks.len(),
            ..Default::default()
        };
        for t in tasks {
            match t.status {
                TaskStatus::Done => s.done += 1,
                TaskStatus::Failed => s.failed += 1,
                TaskStatus::WaitingForFile => s.waiting_for_file += 1,
                _ => s.pending += 1,
            }
        }
        s
    }
}

/// Human-readable size with two decimals (`1.5 MB`, `0 Bytes`), base 1024.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", text, UNITS[unit])
}
