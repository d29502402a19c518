//! Directional gate pipeline.
//!
//! Gates run in a fixed order and short-circuit on the first failure. The
//! returned [`Decision`] always carries every gate evaluated up to and
//! including the failing one. Gate failures are outcomes, never errors.

use crate::scorer::{assign_roles, risk_reward, roles_confirmed, score, trade_mode};
use crate::session::in_session;
use algo_trade_core::{
    AccountConfig, Decision, DecisionOutcome, GateResult, Regime, RiskCalculation, ScoreBreakdown,
    Signal, SignalRoles, TradeMode,
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const GATE_TIMEFRAME: &str = "Timeframe Classification";
pub const GATE_INTEGRITY: &str = "Signal Integrity";
pub const GATE_SESSION: &str = "Session & Volatility";
pub const GATE_OPTIONS: &str = "Options Validation";
pub const GATE_FACTORIZATION: &str = "Signal Factorization";
pub const GATE_ROLES: &str = "Role Assignment";
pub const GATE_MODE: &str = "Weighted Score & Mode";
pub const GATE_SIZING: &str = "Risk & Position Sizing";
pub const GATE_DAILY_LIMITS: &str = "Daily Limits";
pub const GATE_POSITION_LIMITS: &str = "Position Limits";
pub const GATE_VOLATILITY: &str = "Volatility";
pub const GATE_EVENTS: &str = "Event Calendar";
pub const GATE_DUPLICATE: &str = "Duplicate Check";
pub const GATE_COOLDOWN: &str = "Cooldown";
pub const GATE_STRIKES: &str = "Strike Selection";
pub const GATE_PORTFOLIO: &str = "Portfolio Greeks";

const MIN_CONFIDENCE: Decimal = dec!(5.5);
const MIN_CONFLUENCE: i64 = 2;

// ============================================================================
// Gate trail
// ============================================================================

/// Accumulates gate results for one signal and builds the BLOCK decision
/// at the first failure.
pub(crate) struct GateTrail<'a> {
    signal: &'a Signal,
    regime: Regime,
    gates: Vec<GateResult>,
}

impl<'a> GateTrail<'a> {
    pub(crate) const fn new(signal: &'a Signal, regime: Regime) -> Self {
        Self {
            signal,
            regime,
            gates: Vec::new(),
        }
    }

    /// Records `result`. Returns the BLOCK decision if it failed.
    pub(crate) fn record(&mut self, result: GateResult) -> Option<Decision> {
        tracing::debug!(
            symbol = %self.signal.symbol,
            gate = %result.gate,
            passed = result.passed,
            reason = ?result.reason,
            "Gate evaluated"
        );
        if result.passed {
            self.gates.push(result);
            return None;
        }
        let reason = result
            .reason
            .clone()
            .unwrap_or_else(|| format!("{} failed", result.gate));
        self.gates.push(result);
        Some(self.block(reason))
    }

    /// BLOCK decision carrying everything recorded so far.
    pub(crate) fn block(&mut self, reason: impl Into<String>) -> Decision {
        Decision::block(
            self.signal.symbol.clone(),
            self.regime,
            std::mem::take(&mut self.gates),
            self.signal.active_signals.first().cloned(),
            reason,
        )
    }

    pub(crate) fn into_gates(self) -> Vec<GateResult> {
        self.gates
    }

    pub(crate) fn into_trade(self, scored: Scored, risk: RiskCalculation) -> Decision {
        Decision {
            symbol: self.signal.symbol.clone(),
            outcome: DecisionOutcome::Trade,
            regime: self.regime,
            trade_mode: Some(scored.mode),
            gate_results: self.gates,
            score_breakdown: scored.breakdown,
            roles: scored.roles,
            risk,
            block_reason: None,
        }
    }
}

/// Scoring context carried from factorization through sizing.
pub(crate) struct Scored {
    pub(crate) breakdown: ScoreBreakdown,
    pub(crate) roles: SignalRoles,
    pub(crate) mode: TradeMode,
}

// ============================================================================
// Shared gates
// ============================================================================

pub(crate) fn integrity_gate(signal: &Signal) -> GateResult {
    let prices_present = [signal.entry_price, signal.stop_loss, signal.take_profit_1]
        .iter()
        .all(|p| *p > Decimal::ZERO);

    let reason = if signal.confidence < MIN_CONFIDENCE {
        Some("Confidence too low")
    } else if signal.confluence_count < MIN_CONFLUENCE {
        Some("Insufficient confluence")
    } else if signal.active_signals.is_empty() {
        Some("No active signals")
    } else if !prices_present {
        Some("Missing required fields")
    } else {
        None
    };

    match reason {
        Some(reason) => GateResult::fail(GATE_INTEGRITY, reason),
        None => GateResult::pass(GATE_INTEGRITY),
    }
}

pub(crate) fn session_gate(regime: Regime, now: DateTime<Utc>) -> GateResult {
    if in_session(regime, now) {
        GateResult::pass(GATE_SESSION)
    } else {
        GateResult::fail(GATE_SESSION, "Outside market hours for timeframe")
    }
}

pub(crate) fn factorization_gate(signal: &Signal, regime: Regime) -> (GateResult, ScoreBreakdown) {
    let breakdown = score(&signal.active_signals, regime);
    let threshold = regime.config().score_threshold;
    let result = if breakdown.total >= threshold {
        GateResult::pass(GATE_FACTORIZATION)
    } else {
        GateResult::fail(
            GATE_FACTORIZATION,
            format!(
                "Total score {:.2} below threshold {:.1}",
                breakdown.total, threshold
            ),
        )
    };
    (result.with_score(breakdown.total), breakdown)
}

pub(crate) fn role_gate(signal: &Signal, regime: Regime) -> (GateResult, SignalRoles) {
    let roles = assign_roles(&signal.active_signals, regime);
    let result = if roles_confirmed(&roles) {
        GateResult::pass(GATE_ROLES)
    } else {
        GateResult::fail(GATE_ROLES, "Insufficient confirmations from different families")
    };
    (result, roles)
}

pub(crate) fn mode_gate(rr: Decimal, min_rr: Decimal) -> GateResult {
    let result = if rr >= min_rr {
        GateResult::pass(GATE_MODE)
    } else {
        GateResult::fail(
            GATE_MODE,
            format!("Risk/reward {rr:.2} below minimum {min_rr:.1}"),
        )
    };
    result.with_score(rr)
}

/// Risk-budget sizing on the underlying: `floor(adjusted / |entry - stop|)`.
pub(crate) fn sizing_gate(
    signal: &Signal,
    base_risk: Decimal,
    risk_multiplier: Decimal,
    mode: TradeMode,
    rr: Decimal,
) -> (GateResult, RiskCalculation) {
    let mode_multiplier = if mode == TradeMode::Reversal {
        dec!(0.5)
    } else {
        Decimal::ONE
    };
    let adjusted_risk = base_risk * risk_multiplier * mode_multiplier;
    let price_diff = (signal.entry_price - signal.stop_loss).abs();
    let quantity = if price_diff.is_zero() {
        0
    } else {
        (adjusted_risk / price_diff).floor().to_u32().unwrap_or(0)
    };

    let result = if quantity > 0 {
        GateResult::pass(GATE_SIZING)
    } else {
        GateResult::fail(GATE_SIZING, "Invalid position size calculated")
    };
    let risk = RiskCalculation {
        base_risk,
        adjusted_risk,
        quantity,
        risk_reward: rr,
    };
    (result, risk)
}

// ============================================================================
// Directional engine
// ============================================================================

/// Gate pipeline for directional (underlying) trades.
#[derive(Debug, Clone, Default)]
pub struct GateEngine {
    account: AccountConfig,
}

impl GateEngine {
    #[must_use]
    pub const fn new(account: AccountConfig) -> Self {
        Self { account }
    }

    /// Runs the directional gates for `signal` at `now`.
    ///
    /// Sizing does not apply the regime risk multiplier. REVERSAL demands a
    /// 3.0 reward/risk, every other mode 2.0.
    #[must_use]
    pub fn evaluate(&self, signal: &Signal, regime: Regime, now: DateTime<Utc>) -> Decision {
        let mut trail = GateTrail::new(signal, regime);

        if let Some(blocked) = trail.record(integrity_gate(signal)) {
            return blocked;
        }
        if let Some(blocked) = trail.record(session_gate(regime, now)) {
            return blocked;
        }

        let (factorization, breakdown) = factorization_gate(signal, regime);
        if let Some(blocked) = trail.record(factorization) {
            return blocked;
        }

        let (roles_result, roles) = role_gate(signal, regime);
        if let Some(blocked) = trail.record(roles_result) {
            return blocked;
        }

        let mode = trade_mode(&breakdown);
        let min_rr = if mode == TradeMode::Reversal {
            dec!(3.0)
        } else {
            dec!(2.0)
        };
        let rr = risk_reward(signal);
        if let Some(blocked) = trail.record(mode_gate(rr, min_rr)) {
            return blocked;
        }

        let (sizing, risk) = sizing_gate(signal, self.account.base_risk(), Decimal::ONE, mode, rr);
        if let Some(blocked) = trail.record(sizing) {
            return blocked;
        }

        tracing::info!(
            symbol = %signal.symbol,
            regime = %regime,
            mode = %mode,
            quantity = risk.quantity,
            "Signal cleared directional gates"
        );

        trail.into_trade(
            Scored {
                breakdown,
                roles,
                mode,
            },
            risk,
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use algo_trade_core::Direction;
    use chrono::TimeZone;

    /// Tuesday 2025-01-14 11:00 EST.
    pub(crate) fn market_open() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 14, 16, 0, 0).unwrap()
    }

    pub(crate) fn make_signal() -> Signal {
        Signal {
            symbol: "SPX".to_string(),
            resolution: Some("1D".to_string()),
            timestamp: 1_736_870_400,
            signal_type: "FVG_BOS".to_string(),
            direction: Direction::Long,
            confidence: dec!(8),
            signal_strength: None,
            confluence_count: 4,
            entry_price: dec!(4500),
            stop_loss: dec!(4490),
            take_profit_1: dec!(4520),
            active_signals: vec!["FVG".to_string(), "DISPLACEMENT".to_string(), "BOS".to_string()],
            is_options: false,
        }
    }

    fn engine() -> GateEngine {
        GateEngine::default()
    }

    #[test]
    fn test_swing_scenario_trades() {
        let decision = engine().evaluate(&make_signal(), Regime::Swing, market_open());

        assert!(decision.is_trade(), "blocked: {:?}", decision.block_reason);
        assert_eq!(decision.gate_results.len(), 6);
        assert_eq!(decision.score_breakdown.total, dec!(7.5));
        assert_eq!(decision.trade_mode, Some(TradeMode::Trend));
        assert_eq!(decision.risk.risk_reward, dec!(2));
        assert_eq!(decision.risk.quantity, 100);
        assert_eq!(decision.roles.primary.as_deref(), Some("FVG"));
    }

    #[test]
    fn test_low_confidence_blocks_at_first_gate() {
        let mut signal = make_signal();
        signal.confidence = dec!(4.0);
        let decision = engine().evaluate(&signal, Regime::Swing, market_open());

        assert_eq!(decision.outcome, DecisionOutcome::Block);
        assert!(decision.block_reason.as_deref().unwrap().contains("Confidence too low"));
        assert_eq!(decision.gate_results.len(), 1);
        assert_eq!(decision.gate_results[0].gate, GATE_INTEGRITY);
    }

    #[test]
    fn test_block_zeroes_scores_and_reports_first_tag() {
        let mut signal = make_signal();
        signal.confluence_count = 1;
        let decision = engine().evaluate(&signal, Regime::Swing, market_open());

        assert_eq!(decision.block_reason.as_deref(), Some("Insufficient confluence"));
        assert_eq!(decision.score_breakdown, ScoreBreakdown::default());
        assert_eq!(decision.risk, RiskCalculation::default());
        assert_eq!(decision.roles.primary.as_deref(), Some("FVG"));
        assert!(decision.roles.confirmations.is_empty());
    }

    #[test]
    fn test_outside_session_blocks_after_integrity() {
        let evening = Utc.with_ymd_and_hms(2025, 1, 14, 23, 0, 0).unwrap();
        let decision = engine().evaluate(&make_signal(), Regime::Swing, evening);

        assert_eq!(decision.gate_results.len(), 2);
        assert!(decision.gate_results[0].passed);
        assert_eq!(
            decision.block_reason.as_deref(),
            Some("Outside market hours for timeframe")
        );
    }

    #[test]
    fn test_low_score_blocks() {
        let mut signal = make_signal();
        signal.active_signals = vec!["ORB".to_string(), "SMT".to_string()];
        let decision = engine().evaluate(&signal, Regime::Swing, market_open());

        assert_eq!(
            decision.block_reason.as_deref(),
            Some("Total score 4.00 below threshold 6.0")
        );
        assert_eq!(decision.gate_results.last().unwrap().score, Some(dec!(4.0)));
    }

    #[test]
    fn test_single_family_fails_role_assignment() {
        let mut signal = make_signal();
        signal.active_signals = vec![
            "FVG".to_string(),
            "DISPLACEMENT".to_string(),
            "BREAKER".to_string(),
        ];
        let decision = engine().evaluate(&signal, Regime::Swing, market_open());
        assert_eq!(
            decision.block_reason.as_deref(),
            Some("Insufficient confirmations from different families")
        );
        assert_eq!(decision.gate_results.len(), 4);
    }

    #[test]
    fn test_reversal_demands_three_to_one() {
        let mut signal = make_signal();
        signal.active_signals = vec![
            "SWEEP_LOW".to_string(),
            "SMT".to_string(),
            "BOS".to_string(),
        ];
        let decision = engine().evaluate(&signal, Regime::Swing, market_open());
        assert_eq!(
            decision.block_reason.as_deref(),
            Some("Risk/reward 2.00 below minimum 3.0")
        );

        signal.take_profit_1 = dec!(4530);
        let decision = engine().evaluate(&signal, Regime::Swing, market_open());
        assert!(decision.is_trade());
        assert_eq!(decision.trade_mode, Some(TradeMode::Reversal));
        assert_eq!(decision.risk.adjusted_risk, dec!(500));
        assert_eq!(decision.risk.quantity, 50);
    }

    #[test]
    fn test_short_risk_reward_and_wrong_side_stop() {
        let mut signal = make_signal();
        signal.direction = Direction::Short;
        signal.entry_price = dec!(4500);
        signal.stop_loss = dec!(4510);
        signal.take_profit_1 = dec!(4470);
        let decision = engine().evaluate(&signal, Regime::Swing, market_open());
        assert!(decision.is_trade());
        assert_eq!(decision.risk.risk_reward, dec!(3));

        // Stop below entry on a short: no risk distance, R/R collapses to zero.
        signal.stop_loss = dec!(4490);
        let decision = engine().evaluate(&signal, Regime::Swing, market_open());
        assert_eq!(
            decision.block_reason.as_deref(),
            Some("Risk/reward 0.00 below minimum 2.0")
        );
    }

    #[test]
    fn test_wide_stop_fails_sizing() {
        let mut signal = make_signal();
        signal.entry_price = dec!(5000);
        signal.stop_loss = dec!(2000);
        signal.take_profit_1 = dec!(11000);
        let decision = engine().evaluate(&signal, Regime::Swing, market_open());
        assert_eq!(
            decision.block_reason.as_deref(),
            Some("Invalid position size calculated")
        );
        assert_eq!(decision.gate_results.len(), 6);
    }

    #[test]
    fn test_trade_gate_sequence_is_fixed() {
        let decision = engine().evaluate(&make_signal(), Regime::Swing, market_open());
        let names: Vec<&str> = decision.gate_results.iter().map(|g| g.gate.as_str()).collect();
        assert_eq!(
            names,
            vec![
                GATE_INTEGRITY,
                GATE_SESSION,
                GATE_FACTORIZATION,
                GATE_ROLES,
                GATE_MODE,
                GATE_SIZING
            ]
        );
    }
}
