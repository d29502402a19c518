//! Declarative exit rules for option positions.
//!
//! Rules are generated once at entry and scanned in declaration order on
//! every monitoring tick; the first match wins.

use crate::strategy::OptionStrategy;
use algo_trade_core::Regime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitTrigger {
    /// P&L fraction at or above the trigger.
    ProfitTarget,
    /// P&L fraction at or below the (negative) trigger.
    StopLoss,
    /// Hours held at or above the trigger.
    TimeStop,
    /// Days to expiration at or below the trigger.
    ThetaStop,
    /// Relative IV change at or below the (negative) trigger.
    IvCrush,
    /// Reserved; never fires.
    DeltaHedge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitAction {
    CloseFull,
    CloseHalf,
    Roll,
    Hedge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRule {
    #[serde(rename = "type")]
    pub trigger_type: ExitTrigger,
    pub trigger: Decimal,
    pub action: ExitAction,
}

impl ExitRule {
    #[must_use]
    pub const fn new(trigger_type: ExitTrigger, trigger: Decimal, action: ExitAction) -> Self {
        Self {
            trigger_type,
            trigger,
            action,
        }
    }
}

/// Position state sampled on a monitoring tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitSnapshot {
    /// Unrealised P&L as a fraction of cost (0.5 is +50%).
    pub pnl_pct: Decimal,
    pub dte: i64,
    pub iv: Decimal,
    pub entry_iv: Decimal,
    pub hours_held: Decimal,
}

/// Rule set for a new position.
#[must_use]
pub fn generate_exit_rules(regime: Regime, strategy: OptionStrategy) -> Vec<ExitRule> {
    use ExitAction::{CloseFull, CloseHalf, Roll};
    use ExitTrigger::{IvCrush, ProfitTarget, StopLoss, ThetaStop, TimeStop};

    let mut rules = vec![
        ExitRule::new(ProfitTarget, dec!(0.50), CloseHalf),
        ExitRule::new(ProfitTarget, dec!(1.00), CloseFull),
    ];

    match regime {
        Regime::Intraday => {
            rules.push(ExitRule::new(StopLoss, dec!(-0.30), CloseFull));
            rules.push(ExitRule::new(TimeStop, dec!(4), CloseFull));
        }
        Regime::Swing => {
            rules.push(ExitRule::new(StopLoss, dec!(-0.40), CloseFull));
            rules.push(ExitRule::new(ThetaStop, dec!(14), Roll));
        }
        Regime::Monthly => {
            rules.push(ExitRule::new(StopLoss, dec!(-0.50), CloseFull));
            rules.push(ExitRule::new(ThetaStop, dec!(21), Roll));
            rules.push(ExitRule::new(IvCrush, dec!(-0.20), CloseHalf));
        }
        Regime::Leaps => {
            rules.push(ExitRule::new(StopLoss, dec!(-0.35), CloseHalf));
            rules.push(ExitRule::new(ThetaStop, dec!(90), Roll));
        }
    }

    if strategy.is_volatility_play() {
        rules.push(ExitRule::new(IvCrush, dec!(-0.15), CloseFull));
    }
    if strategy.is_credit() {
        rules.push(ExitRule::new(ProfitTarget, dec!(0.50), CloseFull));
    }

    rules
}

/// First rule triggered by `snapshot`, in declaration order.
#[must_use]
pub fn check_exit_rules<'a>(rules: &'a [ExitRule], snapshot: &ExitSnapshot) -> Option<&'a ExitRule> {
    rules.iter().find(|rule| match rule.trigger_type {
        ExitTrigger::ProfitTarget => snapshot.pnl_pct >= rule.trigger,
        ExitTrigger::StopLoss => snapshot.pnl_pct <= rule.trigger,
        ExitTrigger::TimeStop => snapshot.hours_held >= rule.trigger,
        ExitTrigger::ThetaStop => Decimal::from(snapshot.dte) <= rule.trigger,
        ExitTrigger::IvCrush => {
            if snapshot.entry_iv.is_zero() {
                return false;
            }
            (snapshot.iv - snapshot.entry_iv) / snapshot.entry_iv <= rule.trigger
        }
        ExitTrigger::DeltaHedge => false,
    })
}
