//! `upq remove <id>` – remove a task and cancel its remote session.

use anyhow::Result;
use upq_core::config::UpqConfig;
use upq_core::task::TaskId;

use super::open_for_edit;

pub async fn run_remove(cfg: &UpqConfig, id: &str) -> Result<()> {
    let manager = open_for_edit(cfg).await?;
    let result = manager.remove(&TaskId::from(id)).await;
    manager.dispose().await?;
    let task = result?;
    println!("Removed {} ({})", task.id, task.name);
    Ok(())
}
