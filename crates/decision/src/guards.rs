//! Session-scoped admission guards.
//!
//! These run after the pure gate pipeline because they read mutable session
//! state. Each appends its own gate to the decision through
//! [`Decision::append_gate`], so the audit trail stays complete when a TRADE
//! is turned into a BLOCK.

use crate::gates::{GATE_DAILY_LIMITS, GATE_POSITION_LIMITS};
use algo_trade_core::{AccountConfig, Decision, GateResult, OrchestratorConfig};
use chrono::NaiveDate;
use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Outcome
// =============================================================================

/// Result of an advisory check that may fail open.
///
/// `Degraded` admits the trade like `Allowed` but records that the check
/// could not actually run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum GuardOutcome {
    Allowed,
    Blocked { reason: String },
    Degraded { reason: String },
}

impl GuardOutcome {
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self::Blocked {
            reason: reason.into(),
        }
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            reason: reason.into(),
        }
    }

    /// Whether the trade may proceed.
    #[must_use]
    pub const fn admits(&self) -> bool {
        !self.is_blocked()
    }

    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allowed => None,
            Self::Blocked { reason } | Self::Degraded { reason } => Some(reason),
        }
    }
}

/// Formats whole dollars with thousands separators, e.g. `-$2,500`.
#[must_use]
pub fn format_usd(value: Decimal) -> String {
    let whole = value.round().to_i64().unwrap_or(0);
    let digits = whole.unsigned_abs().to_string();

    let grouped: String = digits
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![',', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    if whole < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

// =============================================================================
// Daily limits
// =============================================================================

/// Running counters for one UTC calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub trades_count: u32,
    pub daily_pnl: Decimal,
    /// Lowest daily P&L seen today, never above zero.
    pub max_drawdown: Decimal,
}

impl DailyRecord {
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self {
            date,
            trades_count: 0,
            daily_pnl: Decimal::ZERO,
            max_drawdown: Decimal::ZERO,
        }
    }
}

/// Trade-count and drawdown ceilings for the current day.
///
/// Counters reset the first time they are touched on a new date.
pub struct DailyLimitGuard {
    max_daily_trades: RwLock<u32>,
    max_daily_loss: RwLock<Decimal>,
    state: RwLock<DailyRecord>,
}

impl DailyLimitGuard {
    #[must_use]
    pub fn new(max_daily_trades: u32, max_daily_loss: Decimal, today: NaiveDate) -> Self {
        Self {
            max_daily_trades: RwLock::new(max_daily_trades),
            max_daily_loss: RwLock::new(max_daily_loss),
            state: RwLock::new(DailyRecord::new(today)),
        }
    }

    #[must_use]
    pub fn from_config(config: &OrchestratorConfig, today: NaiveDate) -> Self {
        Self::new(config.max_daily_trades, config.max_daily_loss, today)
    }

    /// Applies new ceilings without touching today's counters.
    pub fn set_limits(&self, max_daily_trades: u32, max_daily_loss: Decimal) {
        *self.max_daily_trades.write() = max_daily_trades;
        *self.max_daily_loss.write() = max_daily_loss;
    }

    #[must_use]
    pub fn max_daily_trades(&self) -> u32 {
        *self.max_daily_trades.read()
    }

    #[must_use]
    pub fn max_daily_loss(&self) -> Decimal {
        *self.max_daily_loss.read()
    }

    fn roll(&self, today: NaiveDate) {
        let mut state = self.state.write();
        if state.date != today {
            tracing::info!(
                previous = %state.date,
                trades = state.trades_count,
                pnl = %state.daily_pnl,
                "Daily counters reset"
            );
            *state = DailyRecord::new(today);
        }
    }

    /// Today's counters.
    #[must_use]
    pub fn record(&self, today: NaiveDate) -> DailyRecord {
        self.roll(today);
        *self.state.read()
    }

    /// Replaces the counters, e.g. from a persisted snapshot.
    pub fn restore(&self, record: DailyRecord) {
        *self.state.write() = record;
    }

    pub fn record_trade(&self, today: NaiveDate) {
        self.roll(today);
        let mut state = self.state.write();
        state.trades_count = state.trades_count.saturating_add(1);
    }

    /// Adds realised P&L and tracks the day's low.
    pub fn record_pnl(&self, today: NaiveDate, pnl: Decimal) {
        self.roll(today);
        let mut state = self.state.write();
        state.daily_pnl += pnl;
        state.max_drawdown = state.max_drawdown.min(state.daily_pnl);
    }

    #[must_use]
    pub fn trades_remaining(&self, today: NaiveDate) -> u32 {
        self.max_daily_trades()
            .saturating_sub(self.record(today).trades_count)
    }

    #[must_use]
    pub fn trade_limit_reached(&self, today: NaiveDate) -> bool {
        self.record(today).trades_count >= self.max_daily_trades()
    }

    #[must_use]
    pub fn drawdown_reached(&self, today: NaiveDate) -> bool {
        self.record(today).daily_pnl <= -self.max_daily_loss()
    }

    /// Appends the Daily Limits gate to a TRADE decision.
    ///
    /// BLOCK decisions are left untouched.
    pub fn admit(&self, decision: &mut Decision, today: NaiveDate) {
        if !decision.is_trade() {
            return;
        }
        let max_trades = self.max_daily_trades();
        let max_loss = self.max_daily_loss();

        if self.trade_limit_reached(today) {
            decision.append_gate(GateResult::fail(
                GATE_DAILY_LIMITS,
                "Daily trade limit reached",
            ));
            decision.set_block_reason(format!("Daily trade limit reached ({max_trades} trades)"));
        } else if self.drawdown_reached(today) {
            decision.append_gate(GateResult::fail(
                GATE_DAILY_LIMITS,
                "Daily drawdown limit reached",
            ));
            decision.set_block_reason(format!(
                "Daily drawdown limit reached ({})",
                format_usd(-max_loss)
            ));
        } else {
            decision.append_gate(GateResult::pass(GATE_DAILY_LIMITS));
            return;
        }

        tracing::warn!(
            symbol = %decision.symbol,
            reason = ?decision.block_reason,
            "Daily limit blocked trade"
        );
    }

    /// Clears today's counters.
    pub fn reset(&self, today: NaiveDate) {
        *self.state.write() = DailyRecord::new(today);
    }
}

impl fmt::Debug for DailyLimitGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("DailyLimitGuard")
            .field("max_daily_trades", &self.max_daily_trades())
            .field("max_daily_loss", &self.max_daily_loss())
            .field("date", &state.date)
            .field("trades_count", &state.trades_count)
            .field("daily_pnl", &state.daily_pnl)
            .finish()
    }
}

// =============================================================================
// Position limits
// =============================================================================

/// Open notional by symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureSnapshot {
    pub open_positions: usize,
    pub by_symbol: HashMap<String, Decimal>,
    pub total: Decimal,
}

impl ExposureSnapshot {
    /// Adds one open position.
    pub fn add(&mut self, symbol: &str, notional: Decimal) {
        self.open_positions += 1;
        *self.by_symbol.entry(symbol.to_string()).or_default() += notional;
        self.total += notional;
    }

    #[must_use]
    pub fn symbol(&self, symbol: &str) -> Decimal {
        self.by_symbol.get(symbol).copied().unwrap_or_default()
    }
}

/// Open-position count, per-symbol notional and aggregate exposure ceilings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionLimitGuard {
    account_size: Decimal,
    max_open_positions: usize,
    max_position_size: Decimal,
    max_total_exposure: Decimal,
}

impl PositionLimitGuard {
    #[must_use]
    pub const fn new(
        account_size: Decimal,
        max_open_positions: usize,
        max_position_size: Decimal,
        max_total_exposure: Decimal,
    ) -> Self {
        Self {
            account_size,
            max_open_positions,
            max_position_size,
            max_total_exposure,
        }
    }

    #[must_use]
    pub fn from_config(account: &AccountConfig, config: &OrchestratorConfig) -> Self {
        Self::new(
            account.size,
            config.max_open_positions,
            config.max_position_size,
            config.max_total_exposure,
        )
    }

    /// Appends the Position Limits gate to a TRADE decision.
    ///
    /// `proposed_notional` is the entry value of the new position.
    pub fn admit(&self, decision: &mut Decision, exposure: &ExposureSnapshot, proposed_notional: Decimal) {
        if !decision.is_trade() {
            return;
        }

        let symbol_value = exposure.symbol(&decision.symbol) + proposed_notional;
        let total_value = exposure.total + proposed_notional;

        let (gate_reason, block_reason) = if exposure.open_positions >= self.max_open_positions {
            (
                "Max open positions reached",
                format!(
                    "Maximum open positions reached ({}/{})",
                    exposure.open_positions, self.max_open_positions
                ),
            )
        } else if symbol_value > self.max_position_size {
            let pct = if self.account_size.is_zero() {
                Decimal::ZERO
            } else {
                symbol_value / self.account_size * Decimal::ONE_HUNDRED
            };
            (
                "Max position size per symbol exceeded",
                format!(
                    "Position size limit exceeded for {} ({:.1}% of account)",
                    decision.symbol, pct
                ),
            )
        } else if total_value > self.max_total_exposure {
            (
                "Max total exposure exceeded",
                format!(
                    "Total exposure limit exceeded ({} of {})",
                    format_usd(total_value),
                    format_usd(self.max_total_exposure)
                ),
            )
        } else {
            decision.append_gate(GateResult::pass(GATE_POSITION_LIMITS));
            return;
        };

        decision.append_gate(GateResult::fail(GATE_POSITION_LIMITS, gate_reason));
        decision.set_block_reason(block_reason);
        tracing::warn!(
            symbol = %decision.symbol,
            reason = ?decision.block_reason,
            "Position limit blocked trade"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algo_trade_core::{DecisionOutcome, Regime, RiskCalculation, ScoreBreakdown, SignalRoles, TradeMode};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn make_trade(symbol: &str) -> Decision {
        Decision {
            symbol: symbol.to_string(),
            outcome: DecisionOutcome::Trade,
            regime: Regime::Swing,
            trade_mode: Some(TradeMode::Trend),
            gate_results: Vec::new(),
            score_breakdown: ScoreBreakdown::default(),
            roles: SignalRoles::default(),
            risk: RiskCalculation::default(),
            block_reason: None,
        }
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(dec!(-2500)), "-$2,500");
        assert_eq!(format_usd(dec!(1234567.4)), "$1,234,567");
        assert_eq!(format_usd(dec!(999)), "$999");
    }

    #[test]
    fn test_trade_limit_blocks_with_counts() {
        let guard = DailyLimitGuard::from_config(&OrchestratorConfig::default(), day(14));
        for _ in 0..5 {
            guard.record_trade(day(14));
        }
        let mut decision = make_trade("SPY");
        guard.admit(&mut decision, day(14));

        assert!(!decision.is_trade());
        assert_eq!(
            decision.block_reason.as_deref(),
            Some("Daily trade limit reached (5 trades)")
        );
        let gate = decision.gate(GATE_DAILY_LIMITS).unwrap();
        assert_eq!(gate.reason.as_deref(), Some("Daily trade limit reached"));
    }

    #[test]
    fn test_drawdown_blocks_at_limit() {
        let guard = DailyLimitGuard::from_config(&OrchestratorConfig::default(), day(14));
        guard.record_pnl(day(14), dec!(-1000));
        guard.record_pnl(day(14), dec!(-1500));

        let mut decision = make_trade("SPY");
        guard.admit(&mut decision, day(14));
        assert_eq!(
            decision.block_reason.as_deref(),
            Some("Daily drawdown limit reached (-$2,500)")
        );
        assert_eq!(guard.record(day(14)).max_drawdown, dec!(-2500));
    }

    #[test]
    fn test_counters_reset_on_new_day() {
        let guard = DailyLimitGuard::new(2, dec!(500), day(14));
        guard.record_trade(day(14));
        guard.record_trade(day(14));
        guard.record_pnl(day(14), dec!(-200));
        assert!(guard.trade_limit_reached(day(14)));

        let tomorrow = guard.record(day(15));
        assert_eq!(tomorrow, DailyRecord::new(day(15)));
        assert_eq!(guard.trades_remaining(day(15)), 2);

        let mut decision = make_trade("SPY");
        guard.admit(&mut decision, day(15));
        assert!(decision.is_trade());
        assert!(decision.gate(GATE_DAILY_LIMITS).unwrap().passed);
    }

    #[test]
    fn test_drawdown_tracks_intraday_low() {
        let guard = DailyLimitGuard::new(5, dec!(2500), day(14));
        guard.record_pnl(day(14), dec!(-800));
        guard.record_pnl(day(14), dec!(1200));
        let record = guard.record(day(14));
        assert_eq!(record.daily_pnl, dec!(400));
        assert_eq!(record.max_drawdown, dec!(-800));
    }

    #[test]
    fn test_blocked_decision_is_not_touched() {
        let guard = DailyLimitGuard::new(0, dec!(2500), day(14));
        let mut decision = make_trade("SPY");
        decision.append_gate(GateResult::fail("Signal Integrity", "Confidence too low"));
        guard.admit(&mut decision, day(14));
        assert_eq!(decision.gate_results.len(), 1);
    }

    #[test]
    fn test_position_limits() {
        let guard = PositionLimitGuard::from_config(&AccountConfig::default(), &OrchestratorConfig::default());

        let mut exposure = ExposureSnapshot::default();
        exposure.add("SPY", dec!(15000));

        let mut ok = make_trade("QQQ");
        guard.admit(&mut ok, &exposure, dec!(10000));
        assert!(ok.is_trade());

        let mut concentrated = make_trade("SPY");
        guard.admit(&mut concentrated, &exposure, dec!(10000));
        assert_eq!(
            concentrated.block_reason.as_deref(),
            Some("Position size limit exceeded for SPY (25.0% of account)")
        );

        exposure.add("IWM", dec!(18000));
        exposure.add("DIA", dec!(12000));
        let mut crowded = make_trade("QQQ");
        guard.admit(&mut crowded, &exposure, dec!(10000));
        assert_eq!(
            crowded.block_reason.as_deref(),
            Some("Total exposure limit exceeded ($55,000 of $50,000)")
        );
    }

    #[test]
    fn test_max_open_positions() {
        let guard = PositionLimitGuard::new(dec!(100000), 2, dec!(20000), dec!(50000));
        let mut exposure = ExposureSnapshot::default();
        exposure.add("SPY", dec!(1000));
        exposure.add("QQQ", dec!(1000));

        let mut decision = make_trade("IWM");
        guard.admit(&mut decision, &exposure, dec!(1000));
        assert_eq!(
            decision.block_reason.as_deref(),
            Some("Maximum open positions reached (2/2)")
        );
        assert_eq!(
            decision.gate(GATE_POSITION_LIMITS).unwrap().reason.as_deref(),
            Some("Max open positions reached")
        );
    }

    #[test]
    fn test_guard_outcome_admission() {
        assert!(GuardOutcome::Allowed.admits());
        assert!(GuardOutcome::degraded("store down").admits());
        assert!(!GuardOutcome::blocked("cooldown").admits());
        assert_eq!(GuardOutcome::degraded("store down").reason(), Some("store down"));
    }
}
