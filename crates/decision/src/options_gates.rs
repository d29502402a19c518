//! Options-aware gate pipeline.
//!
//! Extends the directional gates with a timeframe classification record, a
//! structural validation of the primary leg, regime thresholds for score and
//! reward/risk, strategy selection and an event-calendar review.

use crate::gates::{
    factorization_gate, integrity_gate, mode_gate, role_gate, session_gate, sizing_gate,
    GateTrail, Scored, GATE_EVENTS, GATE_OPTIONS, GATE_TIMEFRAME,
};
use crate::scorer::{risk_reward, trade_mode};
use crate::session::trading_date;
use algo_trade_core::{
    AccountConfig, Decision, Direction, GateResult, Greeks, OptionType, Regime, Signal,
    NEUTRAL_IV_RANK,
};
use algo_trade_options::{
    adjust_for_events, select_strategy, Conviction, EventAdjustment, LiquidityScreen, MarketEvent,
    OptionLeg, OptionStrategy,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Primary-leg snapshot checked by the Options Validation gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsGateInput {
    pub option_type: OptionType,
    pub strike: Decimal,
    pub expiration: NaiveDate,
    /// Option premium per share.
    pub option_price: Decimal,
    pub iv_rank: Decimal,
    pub greeks: Greeks,
    /// `(ask - bid) / mid`.
    pub bid_ask_spread: Decimal,
    pub open_interest: u64,
    pub volume: u64,
}

impl OptionsGateInput {
    #[must_use]
    pub fn from_leg(leg: &OptionLeg, iv_rank: Decimal) -> Self {
        Self {
            option_type: leg.option_type,
            strike: leg.strike,
            expiration: leg.expiration,
            option_price: leg.entry_price,
            iv_rank,
            greeks: leg.greeks,
            bid_ask_spread: leg.quote().spread_pct(),
            open_interest: leg.open_interest,
            volume: leg.volume,
        }
    }
}

/// One sub-check of the validation gate.
struct Check {
    passed: bool,
    reason: String,
}

/// Runs the structural checks in order and reports the first failure.
#[must_use]
pub fn validate_options(
    input: &OptionsGateInput,
    regime: Regime,
    direction: Direction,
    today: NaiveDate,
) -> GateResult {
    let config = regime.config();
    let screen = LiquidityScreen::for_regime(regime);
    let mut checks = Vec::with_capacity(5);

    let liquidity =
        Decimal::from(input.volume) * dec!(0.4) + Decimal::from(input.open_interest) * dec!(0.6);
    checks.push(Check {
        passed: liquidity >= screen.min_liquidity_score
            && input.bid_ask_spread <= screen.max_spread_pct,
        reason: format!(
            "OI: {}, Vol: {}, Spread: {:.1}%",
            input.open_interest,
            input.volume,
            input.bid_ask_spread * dec!(100)
        ),
    });

    checks.push(Check {
        passed: config.iv_rank.contains(input.iv_rank),
        reason: format!(
            "IV Rank {} outside [{}-{}]",
            input.iv_rank.normalize(),
            config.iv_rank.min,
            config.iv_rank.max
        ),
    });

    // Only bought premium bleeds theta against the position.
    if direction == Direction::Long {
        let tolerance_pct = (config.theta_tolerance * dec!(100)).normalize();
        checks.push(if input.option_price > Decimal::ZERO {
            let burn = input.greeks.theta.abs() / input.option_price;
            Check {
                passed: burn <= config.theta_tolerance,
                reason: format!(
                    "Daily decay: {:.2}% vs max {}%",
                    burn * dec!(100),
                    tolerance_pct
                ),
            }
        } else {
            Check {
                passed: false,
                reason: format!("Daily decay: no option price vs max {tolerance_pct}%"),
            }
        });
    }

    let abs_delta = input.greeks.delta.abs();
    checks.push(Check {
        passed: config.delta.contains(abs_delta),
        reason: format!(
            "Delta {:.2} outside [{}-{}]",
            abs_delta, config.delta.min, config.delta.max
        ),
    });

    let dte = (input.expiration - today).num_days();
    checks.push(Check {
        passed: config.target_dte.contains(Decimal::from(dte)),
        reason: format!(
            "{dte} DTE outside [{}-{}]",
            config.target_dte.min, config.target_dte.max
        ),
    });

    match checks.into_iter().find(|c| !c.passed) {
        Some(failed) => GateResult::fail(GATE_OPTIONS, failed.reason),
        None => GateResult::pass(GATE_OPTIONS).with_reason("All options checks passed"),
    }
}

/// Options decision plus the planning context the caller needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsDecision {
    pub decision: Decision,
    /// Set on TRADE.
    pub strategy: Option<OptionStrategy>,
    /// Set once the event review has run.
    pub event_adjustment: Option<EventAdjustment>,
}

impl OptionsDecision {
    fn blocked(decision: Decision) -> Self {
        Self {
            decision,
            strategy: None,
            event_adjustment: None,
        }
    }
}

/// Outcome of the gates that need no market data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
    /// Gates passed so far, in evaluation order.
    Cleared(Vec<GateResult>),
    Blocked(Decision),
}

/// Timeframe, Integrity and Session gates, in that order.
fn screen_into(
    trail: &mut GateTrail<'_>,
    signal: &Signal,
    regime: Regime,
    now: DateTime<Utc>,
) -> Option<Decision> {
    // Classification always passes; it documents the regime in the audit.
    let _ = trail.record(
        GateResult::pass(GATE_TIMEFRAME).with_reason(format!("Classified as {regime}")),
    );
    if let Some(blocked) = trail.record(integrity_gate(signal)) {
        return Some(blocked);
    }
    trail.record(session_gate(regime, now))
}

/// Gate pipeline for options structures.
#[derive(Debug, Clone, Default)]
pub struct OptionsGateEngine {
    account: AccountConfig,
}

impl OptionsGateEngine {
    #[must_use]
    pub const fn new(account: AccountConfig) -> Self {
        Self { account }
    }

    /// Runs the gates that precede options validation.
    ///
    /// These depend on the signal and the clock only, so callers run them
    /// before fetching quotes or chains for the structure.
    #[must_use]
    pub fn screen(&self, signal: &Signal, regime: Regime, now: DateTime<Utc>) -> Screening {
        let mut trail = GateTrail::new(signal, regime);
        match screen_into(&mut trail, signal, regime, now) {
            Some(blocked) => Screening::Blocked(blocked),
            None => Screening::Cleared(trail.into_gates()),
        }
    }

    /// Runs the options gates.
    ///
    /// `options` is the primary-leg snapshot; without one the structural
    /// validation is skipped and strategy selection assumes a neutral IV rank.
    /// `events` are candidates for the event review and are filtered to the
    /// regime's holding period here.
    #[must_use]
    pub fn evaluate(
        &self,
        signal: &Signal,
        regime: Regime,
        options: Option<&OptionsGateInput>,
        events: &[MarketEvent],
        now: DateTime<Utc>,
    ) -> OptionsDecision {
        let config = regime.config();
        let mut trail = GateTrail::new(signal, regime);

        if let Some(blocked) = screen_into(&mut trail, signal, regime, now) {
            return OptionsDecision::blocked(blocked);
        }
        if let Some(input) = options {
            let validation = validate_options(input, regime, signal.direction, trading_date(now));
            if let Some(blocked) = trail.record(validation) {
                return OptionsDecision::blocked(blocked);
            }
        }

        let (factorization, breakdown) = factorization_gate(signal, regime);
        if let Some(blocked) = trail.record(factorization) {
            return OptionsDecision::blocked(blocked);
        }

        let (roles_result, roles) = role_gate(signal, regime);
        if let Some(blocked) = trail.record(roles_result) {
            return OptionsDecision::blocked(blocked);
        }

        let mode = trade_mode(&breakdown);
        let iv_rank = options.map_or(NEUTRAL_IV_RANK, |o| o.iv_rank);
        let strategy = select_strategy(
            signal.direction,
            mode,
            regime,
            iv_rank,
            Conviction::from_confidence(signal.confidence),
        );
        let rr = risk_reward(signal);
        if let Some(blocked) = trail.record(mode_gate(rr, config.min_risk_reward)) {
            return OptionsDecision::blocked(blocked);
        }

        let (sizing, risk) = sizing_gate(
            signal,
            self.account.base_risk(),
            config.risk_multiplier,
            mode,
            rr,
        );
        if let Some(blocked) = trail.record(sizing) {
            return OptionsDecision::blocked(blocked);
        }

        let adjustment = adjust_for_events(&signal.symbol, signal.direction, regime, events, now);
        if adjustment.has_concerns() {
            let reason = if adjustment.warnings.is_empty() {
                "Event adjustments required".to_string()
            } else {
                adjustment.warnings.join("; ")
            };
            let mut gate = GateResult::pass(GATE_EVENTS).with_reason(reason);
            gate.passed = adjustment.approved;
            if let Some(mut blocked) = trail.record(gate) {
                // The failing gate carries the warnings; the block names the cause.
                blocked.block_reason = Some("Too many event concerns".to_string());
                return OptionsDecision {
                    decision: blocked,
                    strategy: None,
                    event_adjustment: Some(adjustment),
                };
            }
        }

        tracing::info!(
            symbol = %signal.symbol,
            regime = %regime,
            mode = %mode,
            strategy = %strategy,
            "Signal cleared options gates"
        );

        OptionsDecision {
            decision: trail.into_trade(
                Scored {
                    breakdown,
                    roles,
                    mode,
                },
                risk,
            ),
            strategy: Some(strategy),
            event_adjustment: Some(adjustment),
        }
    }
}
