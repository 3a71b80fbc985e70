//! Terminal rendering of queue snapshots: one line per status change and a
//! rewritten overall progress line.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;
use upq_core::task::{TaskId, TaskStatus, UploadTask};
use upq_core::view::{format_bytes, overall_progress, QueueSummary, QueueView};

#[derive(Default)]
struct ViewState {
    seen: HashMap<TaskId, TaskStatus>,
    progress_line: bool,
}

#[derive(Default)]
pub struct TerminalView {
    state: Mutex<ViewState>,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    /// End the in-place progress line so following output starts clean.
    pub fn finish_line(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.progress_line {
            eprintln!();
            state.progress_line = false;
        }
    }
}

impl QueueView for TerminalView {
    fn render(&self, tasks: &[UploadTask]) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for t in tasks {
            if state.seen.get(&t.id) == Some(&t.status) {
                continue;
            }
            state.seen.insert(t.id.clone(), t.status);
            if state.progress_line {
                eprintln!();
                state.progress_line = false;
            }
            eprintln!("{:<16} {} ({})", t.status.as_str(), t.name, format_bytes(t.size));
        }

        let summary = QueueSummary::of(tasks);
        if summary.total == 0 {
            return;
        }
        let active = tasks
            .iter()
            .find(|t| t.status == TaskStatus::Uploading)
            .map(|t| format!("  {} {}%", t.name, t.progress))
            .unwrap_or_default();
        eprint!(
            "\r[{:>3}%] {}/{} done{}    ",
            overall_progress(tasks),
            summary.done,
            summary.total,
            active
        );
        let _ = std::io::stderr().flush();
        state.progress_line = true;
    }
}
