//! CLI for the UPQ upload queue.

mod commands;
mod view;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use upq_core::config;

use commands::{run_clear, run_remove, run_restart, run_status, run_uploads};

/// Top-level CLI for the UPQ upload queue.
#[derive(Debug, Parser)]
#[command(name = "upq")]
#[command(about = "UPQ: resumable chunked upload queue", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue files (re-attaching interrupted uploads) and upload until the queue is idle.
    Run {
        /// Files to upload. A file matching an interrupted task resumes that task.
        files: Vec<PathBuf>,
        /// Reset every task to a fresh upload before starting.
        #[arg(long)]
        restart: bool,
        /// Upload up to N files concurrently (default from config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
    },

    /// Show all tasks and overall progress.
    Status,

    /// Remove a task by its ID (the remote session is cancelled best-effort).
    Remove {
        /// Task identifier as shown by `upq status`.
        id: String,
    },

    /// Drop all completed tasks from the queue.
    Clear,

    /// Reset every task to a fresh upload.
    Restart,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                files,
                restart,
                jobs,
            } => {
                if let Some(jobs) = jobs {
                    cfg.max_active_uploads = jobs.max(1);
                }
                run_uploads(&cfg, &files, restart).await?;
            }
            CliCommand::Status => run_status().await?,
            CliCommand::Remove { id } => run_remove(&cfg, &id).await?,
            CliCommand::Clear => run_clear(&cfg).await?,
            CliCommand::Restart => run_restart(&cfg).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
