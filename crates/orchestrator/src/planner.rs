//! Builds an options plan for a signal from live market data.
//!
//! Everything after the provider calls is delegated to the pure planners in
//! `algo-trade-options`; this module only sequences them and keeps the
//! context the pipeline needs to gate, size and later monitor the position.

use algo_trade_core::{
    iv_rank_or_neutral, retry_with_backoff, MarketDataProvider, OptionsChain, ProviderError,
    Regime, RetryConfig, Signal, TradeMode, CONTRACT_MULTIPLIER,
};
use algo_trade_decision::{score, trade_mode, OptionsGateInput};
use algo_trade_options::{
    generate_exit_rules, requested_expiration, select_strategy, select_strikes, Conviction,
    ExitRule, OptionLeg, PositionSizer, PositionSizing, StrategyPlan, StrikeCriteria,
    StrikeSelection, StrikeSelectionError,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Strikes(#[from] StrikeSelectionError),

    #[error("Strike selection returned no legs")]
    NoLegs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionsPlan {
    pub underlying_price: Decimal,
    pub iv_rank: Decimal,
    pub trade_mode: TradeMode,
    pub selection: StrikeSelection,
    pub plan: StrategyPlan,
    pub gate_input: OptionsGateInput,
    pub sizing: PositionSizing,
    pub exit_rules: Vec<ExitRule>,
}

impl OptionsPlan {
    /// Instrument key for the structure, distinct from the underlying's.
    ///
    /// `SPY 2025-02-07 CALL_DEBIT_SPREAD 520/540`
    #[must_use]
    pub fn instrument(&self, symbol: &str) -> String {
        let strikes = self
            .selection
            .legs
            .iter()
            .map(|leg| leg.strike.normalize().to_string())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{symbol} {} {} {strikes}",
            self.selection.expiration, self.selection.strategy
        )
    }

    /// Per-share premium paid (debit) or received (credit).
    #[must_use]
    pub fn entry_premium(&self) -> Decimal {
        self.selection.net_premium.abs()
    }

    /// Premium committed at entry, measured like an open position's notional.
    #[must_use]
    pub fn entry_cost(&self) -> Decimal {
        self.entry_premium() * Decimal::from(self.sizing.contracts) * CONTRACT_MULTIPLIER
    }

    /// Implied volatility of the primary leg at entry.
    #[must_use]
    pub fn entry_iv(&self) -> Decimal {
        self.plan
            .primary()
            .map_or(Decimal::ZERO, |leg| leg.implied_volatility)
    }
}

/// Context kept per open option position for exit monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsPositionMeta {
    pub underlying: String,
    pub regime: Regime,
    pub expiration: NaiveDate,
    pub entry_iv: Decimal,
    pub legs: Vec<OptionLeg>,
    pub exit_rules: Vec<ExitRule>,
}

impl OptionsPositionMeta {
    #[must_use]
    pub fn from_plan(symbol: &str, regime: Regime, plan: &OptionsPlan) -> Self {
        Self {
            underlying: symbol.to_string(),
            regime,
            expiration: plan.selection.expiration,
            entry_iv: plan.entry_iv(),
            legs: plan.plan.legs.clone(),
            exit_rules: plan.exit_rules.clone(),
        }
    }

    /// Current per-share value of one structure from a fresh chain.
    ///
    /// `None` when a leg's strike or side is missing from the chain.
    #[must_use]
    pub fn mark(&self, chain: &OptionsChain) -> Option<Decimal> {
        let mut net = Decimal::ZERO;
        for leg in &self.legs {
            let quote = chain
                .strikes
                .iter()
                .find(|row| row.strike == leg.strike)?
                .quote(leg.option_type)?;
            net += Decimal::from(leg.quantity) * quote.mid();
        }
        Some(net.abs())
    }

    /// Primary-leg implied volatility from a fresh chain.
    #[must_use]
    pub fn current_iv(&self, chain: &OptionsChain) -> Option<Decimal> {
        let primary = self.legs.first()?;
        chain
            .strikes
            .iter()
            .find(|row| row.strike == primary.strike)?
            .quote(primary.option_type)
            .map(|q| q.implied_volatility)
    }
}

/// Fetches market data and plans an options structure for `signal`.
///
/// IV rank degrades to neutral; a missing price or chain aborts.
///
/// # Errors
/// Provider failures after retries, and strike searches with no candidate.
pub async fn plan_options(
    provider: &dyn MarketDataProvider,
    retry: &RetryConfig,
    sizer: &PositionSizer,
    signal: &Signal,
    regime: Regime,
    today: NaiveDate,
) -> Result<OptionsPlan, PlanError> {
    let symbol = signal.symbol.as_str();
    let underlying_price =
        retry_with_backoff(retry, "current_price", || provider.current_price(symbol)).await?;
    let iv_rank = iv_rank_or_neutral(provider, symbol).await;

    let mode = trade_mode(&score(&signal.active_signals, regime));
    let strategy = select_strategy(
        signal.direction,
        mode,
        regime,
        iv_rank,
        Conviction::from_confidence(signal.confidence),
    );

    let expiration = requested_expiration(today, regime, None);
    let chain = retry_with_backoff(retry, "options_chain", || {
        provider.options_chain(symbol, Some(expiration))
    })
    .await?;

    let criteria = StrikeCriteria::new(underlying_price, signal.direction, regime, strategy, today);
    let selection = select_strikes(&chain, &criteria)?;
    let plan = selection.to_plan(symbol, underlying_price);
    let gate_input = plan
        .primary()
        .map(|leg| OptionsGateInput::from_leg(leg, iv_rank))
        .ok_or(PlanError::NoLegs)?;
    let sizing = sizer.size(&plan, regime, mode);
    let exit_rules = generate_exit_rules(regime, strategy);

    tracing::debug!(
        symbol,
        strategy = %strategy,
        expiration = %selection.expiration,
        contracts = sizing.contracts,
        iv_rank = %iv_rank,
        "Options plan built"
    );

    Ok(OptionsPlan {
        underlying_price,
        iv_rank,
        trade_mode: mode,
        selection,
        plan,
        gate_input,
        sizing,
        exit_rules,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use algo_trade_core::{Direction, Greeks, OptionQuote, StaticMarketData, StrikeRow};
    use algo_trade_options::OptionStrategy;
    use rust_decimal_macros::dec;

    fn quote(last: Decimal, delta: Decimal, open_interest: u64, volume: u64) -> OptionQuote {
        OptionQuote {
            bid: last - dec!(0.05),
            ask: last + dec!(0.05),
            last,
            volume,
            open_interest,
            implied_volatility: dec!(0.22),
            greeks: Greeks::new(delta, dec!(0.02), dec!(-0.04), dec!(0.12)),
        }
    }

    fn row(strike: Decimal, call: OptionQuote, put: OptionQuote) -> StrikeRow {
        StrikeRow {
            strike,
            call: Some(call),
            put: Some(put),
        }
    }

    /// SPY around 500, expiring 2025-02-07.
    pub(crate) fn make_chain() -> OptionsChain {
        OptionsChain {
            symbol: "SPY".to_string(),
            expiration: NaiveDate::from_ymd_opt(2025, 2, 7).unwrap(),
            strikes: vec![
                row(dec!(460), quote(dec!(44.00), dec!(0.80), 3000, 800), quote(dec!(3.50), dec!(-0.20), 4000, 900)),
                row(dec!(480), quote(dec!(28.00), dec!(0.65), 3000, 800), quote(dec!(8.00), dec!(-0.35), 4000, 900)),
                row(dec!(500), quote(dec!(16.00), dec!(0.50), 6000, 1500), quote(dec!(15.00), dec!(-0.50), 6000, 1500)),
                row(dec!(520), quote(dec!(8.00), dec!(0.35), 3000, 800), quote(dec!(27.00), dec!(-0.65), 3000, 800)),
                row(dec!(540), quote(dec!(4.00), dec!(0.20), 3000, 800), quote(dec!(43.00), dec!(-0.80), 3000, 800)),
            ],
        }
    }

    pub(crate) fn make_options_signal() -> Signal {
        Signal {
            symbol: "SPY".to_string(),
            resolution: Some("1D".to_string()),
            timestamp: 1_736_870_400,
            signal_type: "FVG".to_string(),
            direction: Direction::Long,
            confidence: dec!(6.5),
            signal_strength: None,
            confluence_count: 3,
            entry_price: dec!(500),
            stop_loss: dec!(495),
            take_profit_1: dec!(512),
            active_signals: vec!["FVG".to_string(), "DISPLACEMENT".to_string(), "BOS".to_string()],
            is_options: true,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 14).unwrap()
    }

    #[tokio::test]
    async fn test_plan_low_iv_swing_buys_debit_spread() {
        let data = StaticMarketData::new()
            .with_price("SPY", dec!(500))
            .with_chain(make_chain())
            .with_iv_rank("SPY", dec!(40));
        let sizer = PositionSizer::new(dec!(100000), dec!(0.01));

        let plan = plan_options(
            &data,
            &RetryConfig::immediate(1),
            &sizer,
            &make_options_signal(),
            Regime::Swing,
            today(),
        )
        .await
        .unwrap();

        assert_eq!(plan.selection.strategy, OptionStrategy::CallDebitSpread);
        assert_eq!(plan.iv_rank, dec!(40));
        assert!(plan.sizing.contracts >= 1);
        assert!(!plan.exit_rules.is_empty());
        assert_eq!(plan.entry_iv(), dec!(0.22));
        assert!(plan.instrument("SPY").starts_with("SPY 2025-02-07 CALL_DEBIT_SPREAD "));
        assert_eq!(
            plan.entry_cost(),
            plan.entry_premium() * Decimal::from(plan.sizing.contracts) * dec!(100)
        );
    }

    #[tokio::test]
    async fn test_missing_chain_aborts() {
        let data = StaticMarketData::new().with_price("SPY", dec!(500));
        let err = plan_options(
            &data,
            &RetryConfig::immediate(2),
            &PositionSizer::new(dec!(100000), dec!(0.01)),
            &make_options_signal(),
            Regime::Swing,
            today(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PlanError::Provider(ProviderError::ChainUnavailable { .. })));
    }

    #[test]
    fn test_structure_mark_nets_legs() {
        let chain = make_chain();
        let leg = |strike: Decimal, quantity: i32| OptionLeg {
            quantity,
            ..make_leg(strike)
        };
        let meta = OptionsPositionMeta {
            underlying: "SPY".to_string(),
            regime: Regime::Swing,
            expiration: chain.expiration,
            entry_iv: dec!(0.22),
            legs: vec![leg(dec!(520), 1), leg(dec!(540), -1)],
            exit_rules: Vec::new(),
        };
        // Mids 8.00 and 4.00.
        assert_eq!(meta.mark(&chain), Some(dec!(4.00)));
        assert_eq!(meta.current_iv(&chain), Some(dec!(0.22)));

        let mut missing = meta;
        missing.legs[1].strike = dec!(530);
        assert_eq!(missing.mark(&chain), None);
    }

    fn make_leg(strike: Decimal) -> OptionLeg {
        OptionLeg::from_quote(
            "SPY",
            strike,
            NaiveDate::from_ymd_opt(2025, 2, 7).unwrap(),
            algo_trade_core::OptionType::Call,
            1,
            &quote(dec!(8.00), dec!(0.35), 3000, 800),
            dec!(500),
        )
    }
}
