//! `upq restart` – reset all tasks; files must be supplied again with `upq run`.

use anyhow::Result;
use upq_core::config::UpqConfig;

use super::open_for_edit;

pub async fn run_restart(cfg: &UpqConfig) -> Result<()> {
    let manager = open_for_edit(cfg).await?;
    let result = manager.restart_all().await;
    let count = manager.snapshot().await.len();
    manager.dispose().await?;
    result?;
    println!("Restarted {} upload(s)", count);
    Ok(())
}
