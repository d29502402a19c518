//! Evaluate command.
//!
//! Runs one signal through the pure gate pipeline. No market data is
//! fetched, so options evaluation skips the primary-leg validation and
//! selects a strategy at neutral IV rank.

use algo_trade_core::{classify, ConfigLoader, Signal};
use algo_trade_decision::{GateEngine, OptionsGateEngine};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use std::path::{Path, PathBuf};

use super::print_json;

/// Arguments for the evaluate command.
#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// Signal JSON file
    #[arg(long)]
    pub signal: PathBuf,

    /// Evaluate through the options gates even if the signal is not flagged
    #[arg(long)]
    pub options: bool,

    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: PathBuf,

    /// Evaluation time in RFC 3339 (defaults to now)
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,

    /// Explicit days to expiration for classification
    #[arg(long)]
    pub dte: Option<i64>,
}

/// Reads and validates a signal file.
pub(crate) fn load_signal(path: &Path) -> Result<Signal> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read signal file {}", path.display()))?;
    let signal: Signal = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse signal from {}", path.display()))?;
    signal
        .validate()
        .with_context(|| format!("Signal in {} failed validation", path.display()))?;
    Ok(signal)
}

pub fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let config = ConfigLoader::load_from(&args.config)?;
    let signal = load_signal(&args.signal)?;
    let now = args.at.unwrap_or_else(Utc::now);
    let regime = classify(signal.resolution.as_deref(), args.dte);

    tracing::info!(
        symbol = %signal.symbol,
        regime = %regime,
        options = args.options || signal.is_options,
        "Evaluating signal"
    );

    if args.options || signal.is_options {
        let engine = OptionsGateEngine::new(config.account);
        let evaluated = engine.evaluate(&signal, regime, None, &[], now);
        print_json(&evaluated)
    } else {
        let engine = GateEngine::new(config.account);
        print_json(&engine.evaluate(&signal, regime, now))
    }
}
