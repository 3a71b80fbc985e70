//! `upq run` – queue files and upload until nothing is left to do.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use upq_core::config::UpqConfig;
use upq_core::registry::FileHandle;
use upq_core::view::QueueSummary;

use super::open_manager;
use crate::cli::view::TerminalView;

pub async fn run_uploads(cfg: &UpqConfig, files: &[PathBuf], restart: bool) -> Result<()> {
    let view = Arc::new(TerminalView::new());
    let manager = open_manager(cfg, view.clone()).await?;
    if restart {
        manager.restart_all().await?;
    }

    let mut fresh = Vec::new();
    for path in files {
        let file = FileHandle::open(path)
            .await
            .with_context(|| format!("open {}", path.display()))?;
        match manager.find_waiting(&file).await {
            Some(id) => {
                manager.attach(&id, file).await?;
                println!("Resuming {}", id);
            }
            None => fresh.push(file),
        }
    }
    let added = manager.enqueue(fresh).await?;
    if !added.is_empty() {
        tracing::info!("queued {} file(s)", added.len());
    }

    tokio::select! {
        res = manager.wait_idle() => res?,
        _ = tokio::signal::ctrl_c() => {
            view.finish_line();
            println!("Pausing; interrupted uploads resume on the next `upq run` with the same files.");
            manager.pause().await;
            manager.wait_idle().await?;
        }
    }

    let tasks = manager.snapshot().await;
    manager.dispose().await?;
    view.finish_line();

    let summary = QueueSummary::of(&tasks);
    if summary.total == 0 {
        println!("Queue is empty.");
        return Ok(());
    }
    println!(
        "{} done, {} failed, {} waiting for file, {} pending",
        summary.done, summary.failed, summary.waiting_for_file, summary.pending
    );
    for t in tasks.iter().filter(|t| t.last_error.is_some()) {
        if let Some(err) = &t.last_error {
            println!("  {} ({}): {}", t.name, t.status, err);
        }
    }
    Ok(())
}
