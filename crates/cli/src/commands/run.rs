//! Run command.
//!
//! Replays a JSONL file of signals through a paper or shadow orchestrator
//! session against static market data seeded from the signals themselves.

use algo_trade_core::{ConfigLoader, ConfigWatcher, RunMode, Signal, StaticMarketData};
use algo_trade_orchestrator::{
    Dependencies, JsonFileStateStore, Orchestrator, OrchestratorEvent, OrchestratorHandle,
};
use anyhow::{bail, Context, Result};
use clap::Args;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use super::print_json;

/// Arguments for the run command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Signals file, one JSON object per line
    #[arg(long)]
    pub signals: PathBuf,

    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: PathBuf,

    /// Persist the session snapshot and decision audit here
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Evaluate and log decisions without executing
    #[arg(long)]
    pub shadow: bool,

    /// Start even if `orchestrator.enabled` is false in config
    #[arg(long)]
    pub enable: bool,

    /// VIX level served to the volatility guard
    #[arg(long)]
    pub vix: Option<Decimal>,

    /// Reload the config file while the session runs
    #[arg(long)]
    pub watch_config: bool,
}

/// Parses a JSONL signal file. Blank lines are skipped.
pub(crate) fn read_signals(path: &Path) -> Result<Vec<Signal>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read signals file {}", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Invalid signal on line {} of {}", i + 1, path.display()))
        })
        .collect()
}

/// Market data priced at each symbol's first entry price.
pub(crate) fn seed_market(signals: &[Signal], vix: Option<Decimal>) -> StaticMarketData {
    let mut market = StaticMarketData::new();
    let mut seeded = std::collections::HashSet::new();
    for signal in signals {
        if seeded.insert(signal.symbol.as_str()) {
            market = market.with_price(&signal.symbol, signal.entry_price);
        }
    }
    if let Some(vix) = vix {
        market = market.with_vix(vix);
    }
    market
}

/// Waits for one outcome event per submitted signal.
async fn await_outcomes(events: &mut broadcast::Receiver<OrchestratorEvent>, expected: usize) -> Result<()> {
    let mut seen = 0;
    while seen < expected {
        match events.recv().await {
            Ok(OrchestratorEvent::DecisionMade(_) | OrchestratorEvent::SignalRejected { .. }) => {
                seen += 1;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event stream lagged; counting skipped events as outcomes");
                seen += usize::try_from(skipped).unwrap_or(usize::MAX);
            }
            Err(RecvError::Closed) => bail!("Orchestrator stopped before all signals were processed"),
        }
    }
    Ok(())
}

fn spawn_config_watcher(path: PathBuf, handle: OrchestratorHandle, initial: algo_trade_core::AppConfig) {
    let (watcher, mut updates) = ConfigWatcher::new(initial);
    tokio::spawn(async move {
        if let Err(e) = watcher.watch(&path).await {
            tracing::error!("Config watcher stopped: {:#}", e);
        }
    });
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let config = updates.borrow_and_update().clone();
            if handle.update_config(config).await.is_err() {
                break;
            }
        }
    });
}

pub async fn run_session(args: RunArgs) -> Result<()> {
    let mut config = ConfigLoader::load_from(&args.config)?;
    if args.enable {
        config.orchestrator.enabled = true;
    }
    if args.shadow {
        config.orchestrator.mode = RunMode::Shadow;
    }

    let signals = read_signals(&args.signals)?;
    let market = Arc::new(seed_market(&signals, args.vix));

    let mut deps = Dependencies::paper(&config, market);
    if let Some(path) = &args.state_file {
        deps = deps.with_store(Arc::new(JsonFileStateStore::new(path)));
    }

    let mut orchestrator = Orchestrator::new(config.clone(), deps);
    if args.state_file.is_some() && orchestrator.restore().await.context("Failed to restore session")? {
        tracing::info!("Restored previous session snapshot");
    }
    let (handle, task) = orchestrator.spawn();

    if args.watch_config {
        spawn_config_watcher(args.config.clone(), handle.clone(), config);
    }

    let mut events = handle.subscribe();
    handle
        .start()
        .await
        .context("Failed to start session (set orchestrator.enabled or pass --enable)")?;

    tracing::info!(count = signals.len(), path = %args.signals.display(), "Submitting signals");
    let expected = signals.len();
    for signal in signals {
        handle.submit_signal(signal).await?;
    }
    await_outcomes(&mut events, expected).await?;

    let closed = handle.monitor().await?;
    if !closed.is_empty() {
        tracing::info!(closed = closed.len(), "Final monitoring pass closed positions");
    }

    let status = handle.stop().await?;
    handle.shutdown().await?;
    task.await.context("Orchestrator task panicked")?;

    print_json(&status)
}
