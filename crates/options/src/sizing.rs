//! Greeks-aware position sizing.
//!
//! Sizing starts from the risk budget divided by the structure's max loss,
//! then intersects independent delta, theta and vega ceilings and a hard
//! contract cap. The binding ceiling wins.

use crate::legs::StrategyPlan;
use algo_trade_core::{Greeks, Regime, TradeMode, CONTRACT_MULTIPLIER};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Account fractions behind each Greek ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingLimits {
    /// Notional delta exposure, as a fraction of the account.
    pub delta_pct: Decimal,
    /// Daily theta burn, as a fraction of the account.
    pub theta_pct: Decimal,
    /// Exposure per IV point, as a fraction of the account.
    pub vega_pct: Decimal,
    pub max_contracts: u32,
}

impl Default for SizingLimits {
    fn default() -> Self {
        Self {
            delta_pct: dec!(0.05),
            theta_pct: dec!(0.005),
            vega_pct: dec!(0.02),
            max_contracts: 50,
        }
    }
}

/// Each independent ceiling for one sizing run. `None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingCeilings {
    pub risk: Option<u32>,
    pub delta: Option<u32>,
    pub theta: Option<u32>,
    pub vega: Option<u32>,
    pub hard_cap: u32,
}

impl SizingCeilings {
    /// Smallest bounded ceiling.
    #[must_use]
    pub fn binding(&self) -> u32 {
        [self.risk, self.delta, self.theta, self.vega]
            .into_iter()
            .flatten()
            .fold(self.hard_cap, u32::min)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSizing {
    pub contracts: u32,
    pub adjusted_risk: Decimal,
    pub max_loss_per_contract: Decimal,
    /// Position totals: delta and gamma in share terms, theta and vega per contract sum.
    pub total_greeks: Greeks,
    pub max_loss: Decimal,
    pub notional_exposure: Decimal,
    pub ceilings: SizingCeilings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSizer {
    account_size: Decimal,
    risk_percent: Decimal,
    limits: SizingLimits,
}

impl PositionSizer {
    #[must_use]
    pub fn new(account_size: Decimal, risk_percent: Decimal) -> Self {
        Self {
            account_size,
            risk_percent,
            limits: SizingLimits::default(),
        }
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: SizingLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Risk budget after regime and mode scaling. REVERSAL halves it.
    #[must_use]
    pub fn adjusted_risk(&self, regime: Regime, trade_mode: TradeMode) -> Decimal {
        let mode_multiplier = if trade_mode == TradeMode::Reversal {
            dec!(0.5)
        } else {
            Decimal::ONE
        };
        self.account_size * self.risk_percent * regime.config().risk_multiplier * mode_multiplier
    }

    /// Sizes `plan`, whose legs are expressed per contract.
    ///
    /// Never returns fewer than one contract.
    #[must_use]
    pub fn size(&self, plan: &StrategyPlan, regime: Regime, trade_mode: TradeMode) -> PositionSizing {
        let adjusted_risk = self.adjusted_risk(regime, trade_mode);
        let max_loss_per_contract = plan.max_loss();
        let greeks = plan.aggregate_greeks();

        let ceilings = SizingCeilings {
            risk: ceiling(adjusted_risk, max_loss_per_contract),
            delta: ceiling(
                self.account_size * self.limits.delta_pct,
                greeks.delta * CONTRACT_MULTIPLIER,
            ),
            theta: ceiling(self.account_size * self.limits.theta_pct, greeks.theta),
            vega: ceiling(self.account_size * self.limits.vega_pct, greeks.vega),
            hard_cap: self.limits.max_contracts,
        };
        let contracts = ceilings.binding().max(1);
        let units = Decimal::from(contracts);

        let total_greeks = Greeks {
            delta: greeks.delta * units * CONTRACT_MULTIPLIER,
            gamma: greeks.gamma * units * CONTRACT_MULTIPLIER,
            theta: greeks.theta * units,
            vega: greeks.vega * units,
        };

        tracing::debug!(
            strategy = %plan.strategy,
            contracts,
            risk_ceiling = ?ceilings.risk,
            delta_ceiling = ?ceilings.delta,
            theta_ceiling = ?ceilings.theta,
            vega_ceiling = ?ceilings.vega,
            "Position sized"
        );

        PositionSizing {
            contracts,
            adjusted_risk,
            max_loss_per_contract,
            total_greeks,
            max_loss: max_loss_per_contract * units,
            notional_exposure: plan.underlying_price()
                * greeks.delta.abs()
                * units
                * CONTRACT_MULTIPLIER,
            ceilings,
        }
    }
}

/// `floor(budget / |per_unit|)`, unbounded when the per-unit exposure is zero.
fn ceiling(budget: Decimal, per_unit: Decimal) -> Option<u32> {
    let per_unit = per_unit.abs();
    if per_unit.is_zero() {
        return None;
    }
    let units = (budget / per_unit).floor();
    if units <= Decimal::ZERO {
        return Some(0);
    }
    Some(units.to_u32().unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legs::tests::make_leg;
    use crate::strategy::OptionStrategy;
    use algo_trade_core::OptionType;

    fn sizer() -> PositionSizer {
        PositionSizer::new(dec!(100000), dec!(0.01))
    }

    fn long_call(premium: Decimal, greeks: Greeks) -> StrategyPlan {
        StrategyPlan::new(
            OptionStrategy::LongCall,
            vec![make_leg(OptionType::Call, dec!(500), 1, premium, greeks)],
        )
    }

    #[test]
    fn test_adjusted_risk_scaling() {
        assert_eq!(sizer().adjusted_risk(Regime::Swing, TradeMode::Trend), dec!(1000));
        assert_eq!(sizer().adjusted_risk(Regime::Intraday, TradeMode::Trend), dec!(500));
        assert_eq!(sizer().adjusted_risk(Regime::Leaps, TradeMode::Reversal), dec!(750));
    }

    #[test]
    fn test_risk_budget_binds() {
        // 4.00 premium -> 400 max loss; 1000 / 400 = 2.
        let plan = long_call(dec!(4.00), Greeks::new(dec!(0.5), dec!(0.02), dec!(-0.05), dec!(0.10)));
        let sizing = sizer().size(&plan, Regime::Swing, TradeMode::Trend);

        assert_eq!(sizing.ceilings.risk, Some(2));
        assert_eq!(sizing.ceilings.delta, Some(100));
        assert_eq!(sizing.ceilings.theta, Some(10000));
        assert_eq!(sizing.contracts, 2);
        assert_eq!(sizing.max_loss, dec!(800));
        assert_eq!(sizing.total_greeks.delta, dec!(100));
        assert_eq!(sizing.total_greeks.theta, dec!(-0.10));
        assert_eq!(sizing.notional_exposure, dec!(50000));
    }

    #[test]
    fn test_theta_ceiling_binds() {
        // 500 / 100 theta = 5 contracts, cheaper than the risk budget allows.
        let plan = long_call(dec!(0.50), Greeks::new(dec!(0.1), dec!(0.01), dec!(-100), dec!(1)));
        let sizing = sizer().size(&plan, Regime::Swing, TradeMode::Trend);
        assert_eq!(sizing.ceilings.theta, Some(5));
        assert_eq!(sizing.contracts, 5);
    }

    #[test]
    fn test_hard_cap_binds() {
        let plan = long_call(dec!(0.05), Greeks::new(dec!(0.01), dec!(0), dec!(-0.001), dec!(0.001)));
        let sizing = sizer().size(&plan, Regime::Swing, TradeMode::Trend);
        assert_eq!(sizing.contracts, 50);
    }

    #[test]
    fn test_zero_greek_is_unbounded() {
        let plan = long_call(dec!(4.00), Greeks::new(dec!(0.5), dec!(0.02), dec!(0), dec!(0)));
        let sizing = sizer().size(&plan, Regime::Swing, TradeMode::Trend);
        assert_eq!(sizing.ceilings.theta, None);
        assert_eq!(sizing.ceilings.vega, None);
        assert_eq!(sizing.contracts, 2);
    }

    #[test]
    fn test_minimum_one_contract() {
        // Premium far above the budget.
        let plan = long_call(dec!(50.00), Greeks::new(dec!(0.5), dec!(0.02), dec!(-0.05), dec!(0.10)));
        let sizing = sizer().size(&plan, Regime::Swing, TradeMode::Trend);
        assert_eq!(sizing.ceilings.risk, Some(0));
        assert_eq!(sizing.contracts, 1);
    }

    #[test]
    fn test_never_exceeds_positive_ceilings() {
        let cases = [
            (dec!(1.00), dec!(0.9), dec!(-2), dec!(3)),
            (dec!(7.50), dec!(0.4), dec!(-0.2), dec!(0.5)),
            (dec!(0.20), dec!(0.05), dec!(-0.01), dec!(40)),
            (dec!(12.00), dec!(0.7), dec!(-9), dec!(0.01)),
        ];
        for (premium, delta, theta, vega) in cases {
            let plan = long_call(premium, Greeks::new(delta, dec!(0.01), theta, vega));
            for regime in [Regime::Intraday, Regime::Swing, Regime::Monthly, Regime::Leaps] {
                let sizing = sizer().size(&plan, regime, TradeMode::Trend);
                let c = sizing.ceilings;
                assert!(sizing.contracts >= 1);
                for limit in [c.risk, c.delta, c.theta, c.vega].into_iter().flatten() {
                    if limit > 0 {
                        assert!(sizing.contracts <= limit);
                    }
                }
                assert!(sizing.contracts <= c.hard_cap);
            }
        }
    }
}
