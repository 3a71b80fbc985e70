//! `upq status` – show all tasks.

use anyhow::Result;
use upq_core::store::{QueueStore, SqliteStore};
use upq_core::view::{format_bytes, overall_progress};

pub async fn run_status() -> Result<()> {
    let store = SqliteStore::open_default().await?;
    let tasks = store.load().await?;
    if tasks.is_empty() {
        println!("No uploads in queue.");
        return Ok(());
    }
    println!(
        "{:<18} {:>5} {:>10}  {:<24} {}",
        "STATUS", "PCT", "SIZE", "NAME", "ID"
    );
    for t in &tasks {
        println!(
            "{:<18} {:>4}% {:>10}  {:<24} {}",
            t.status.as_str(),
            t.progress,
            format_bytes(t.size),
            t.name,
            t.id
        );
    }
    println!("Overall: {}%", overall_progress(&tasks));
    Ok(())
}
