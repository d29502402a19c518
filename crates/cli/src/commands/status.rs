//! Status command.

use algo_trade_orchestrator::{JsonFileStateStore, StateStore};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::print_json;

/// Arguments for the status command.
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Session snapshot written by `run --state-file`
    #[arg(long)]
    pub state_file: PathBuf,

    /// Also print the decision audit log
    #[arg(long)]
    pub decisions: bool,
}

pub async fn run_status(args: &StatusArgs) -> Result<()> {
    let store = JsonFileStateStore::new(&args.state_file);
    let snapshot = store
        .load()
        .await
        .with_context(|| format!("Failed to read snapshot {}", args.state_file.display()))?
        .with_context(|| format!("No session snapshot at {}", args.state_file.display()))?;
    print_json(&snapshot)?;

    if args.decisions {
        let decisions = store
            .decisions()
            .await
            .with_context(|| format!("Failed to read audit log {}", store.audit_path().display()))?;
        print_json(&decisions)?;
    }
    Ok(())
}
