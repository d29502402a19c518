//! CLI commands for the signal desk.

pub mod classify;
pub mod evaluate;
pub mod run;
pub mod status;

pub use classify::{run_classify, ClassifyArgs};
pub use evaluate::{run_evaluate, EvaluateArgs};
pub use run::{run_session, RunArgs};
pub use status::{run_status, StatusArgs};

use anyhow::{Context, Result};
use serde::Serialize;

/// Writes `value` to stdout as pretty JSON.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
