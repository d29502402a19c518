//! Status snapshots and the event stream published by the actor.

use crate::commands::SessionState;
use algo_trade_core::{Decision, OrchestratorConfig, RunMode};
use algo_trade_decision::DailyRecord;
use algo_trade_execution::{ExitReason, OrderReport};
use algo_trade_options::{ExitAction, ExitTrigger, PortfolioGreeks};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-session counters. Reset on start, kept after stop for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    pub signals_generated: u64,
    /// Signals that failed schema validation.
    pub signals_rejected: u64,
    pub trades_executed: u64,
    pub trades_blocked: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStatus {
    pub date: NaiveDate,
    pub daily_pnl: Decimal,
    pub daily_trades: u32,
    pub max_daily_trades: u32,
    pub trades_remaining: u32,
    pub current_drawdown: Decimal,
    pub max_drawdown: Decimal,
    pub max_daily_loss: Decimal,
    pub max_drawdown_reached: bool,
    pub daily_limit_reached: bool,
}

impl DailyStatus {
    #[must_use]
    pub fn from_record(record: DailyRecord, max_daily_trades: u32, max_daily_loss: Decimal) -> Self {
        Self {
            date: record.date,
            daily_pnl: record.daily_pnl,
            daily_trades: record.trades_count,
            max_daily_trades,
            trades_remaining: max_daily_trades.saturating_sub(record.trades_count),
            current_drawdown: record.daily_pnl.min(Decimal::ZERO),
            max_drawdown: record.max_drawdown,
            max_daily_loss,
            max_drawdown_reached: record.daily_pnl <= -max_daily_loss,
            daily_limit_reached: record.trades_count >= max_daily_trades,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionsStatus {
    pub open_positions: usize,
    pub total_exposure: Decimal,
    pub portfolio_greeks: PortfolioGreeks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionFailure {
    pub position_id: String,
    pub symbol: String,
    pub error: String,
    /// Units still open after the last close attempt.
    #[serde(default)]
    pub remaining_quantity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSwitchReport {
    pub closed: Vec<String>,
    pub failures: Vec<PositionFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub enabled: bool,
    pub mode: RunMode,
    pub state: SessionState,
    pub running: bool,
    pub paused: bool,
    pub algorithm_version: String,
    pub session_started_at: Option<DateTime<Utc>>,
    pub counters: SessionCounters,
    pub daily: DailyStatus,
    pub positions: PositionsStatus,
    pub last_kill_switch: Option<KillSwitchReport>,
    pub updated_at: DateTime<Utc>,
}

impl OrchestratorStatus {
    /// Status of a session that has not started.
    #[must_use]
    pub fn stopped(config: &OrchestratorConfig, daily: DailyStatus, at: DateTime<Utc>) -> Self {
        Self {
            enabled: config.enabled,
            mode: config.mode,
            state: SessionState::Stopped,
            running: false,
            paused: false,
            algorithm_version: config.algorithm_version.clone(),
            session_started_at: None,
            counters: SessionCounters::default(),
            daily,
            positions: PositionsStatus::default(),
            last_kill_switch: None,
            updated_at: at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrchestratorEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
        at: DateTime<Utc>,
    },

    /// Failed schema validation before the gates ran.
    SignalRejected { symbol: String, reason: String },

    DecisionMade(Box<Decision>),

    /// An advisory check could not run and admitted the trade.
    GuardDegraded { guard: String, reason: String },

    OrderSubmitted(OrderReport),

    ExitRuleTriggered {
        position_id: String,
        trigger: ExitTrigger,
        action: ExitAction,
    },

    PositionClosed {
        position_id: String,
        symbol: String,
        reason: ExitReason,
        pnl: Decimal,
    },

    KillSwitch(KillSwitchReport),

    Error {
        message: String,
        at: DateTime<Utc>,
    },
}
