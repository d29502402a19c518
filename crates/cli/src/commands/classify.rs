//! Classify command.

use algo_trade_core::{classify, TimeframeConfig};
use anyhow::Result;
use clap::Args;

use super::print_json;

/// Arguments for the classify command.
#[derive(Args, Debug, Clone)]
pub struct ClassifyArgs {
    /// Chart resolution, e.g. "5m", "1H", "1D", "1W"
    #[arg(long)]
    pub resolution: Option<String>,

    /// Explicit days to expiration; takes precedence over the resolution
    #[arg(long, allow_negative_numbers = true)]
    pub dte: Option<i64>,
}

/// Prints the regime and its threshold bundle.
pub fn run_classify(args: &ClassifyArgs) -> Result<()> {
    let regime = classify(args.resolution.as_deref(), args.dte);
    let config: TimeframeConfig = regime.config();
    tracing::debug!(resolution = ?args.resolution, dte = ?args.dte, regime = %regime, "Classified");
    print_json(&config)
}
