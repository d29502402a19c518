//! Strike and expiration selection over a chain snapshot.
//!
//! Candidates are screened on delta and liquidity, then scored. Single legs
//! blend liquidity, delta fit and premium affordability; spreads search
//! adjacent strike pairs around a target width of 5% of the underlying.
//! Finding nothing is an error, never a silent default.

use crate::legs::{OptionLeg, StrategyPlan};
use crate::strategy::OptionStrategy;
use algo_trade_core::{Direction, OptionQuote, OptionType, OptionsChain, Regime};
use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Target spread width as a fraction of the underlying.
const TARGET_WIDTH_PCT: Decimal = dec!(0.05);
/// Delta distance at which the delta score reaches zero.
const DELTA_SCORE_SPAN: Decimal = dec!(0.5);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StrikeSelectionError {
    #[error("No suitable strikes found matching criteria")]
    NoSuitableStrikes,

    #[error("Not enough strikes for spread")]
    NotEnoughStrikes,

    #[error("No suitable spread found")]
    NoSuitableSpread,
}

/// Per-regime liquidity floors and spread ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityScreen {
    pub min_open_interest: u64,
    pub min_volume: u64,
    /// Maximum `(ask - bid) / mid`.
    pub max_spread_pct: Decimal,
    /// Minimum `volume * 0.4 + open_interest * 0.6`, used by options validation.
    pub min_liquidity_score: Decimal,
}

impl LiquidityScreen {
    #[must_use]
    pub fn for_regime(regime: Regime) -> Self {
        if regime.is_intraday() {
            Self {
                min_open_interest: 1000,
                min_volume: 200,
                max_spread_pct: dec!(0.10),
                min_liquidity_score: dec!(1000),
            }
        } else {
            Self {
                min_open_interest: 500,
                min_volume: 50,
                max_spread_pct: dec!(0.15),
                min_liquidity_score: dec!(500),
            }
        }
    }
}

/// Composite liquidity of one quote, 0..1.
#[must_use]
pub fn liquidity_score(quote: &OptionQuote) -> Decimal {
    let volume = (Decimal::from(quote.volume) / dec!(1000)).min(Decimal::ONE);
    let open_interest = (Decimal::from(quote.open_interest) / dec!(5000)).min(Decimal::ONE);
    let spread = Decimal::ONE - (quote.spread_pct() / dec!(0.20)).min(Decimal::ONE);
    volume * dec!(0.4) + open_interest * dec!(0.4) + spread * dec!(0.2)
}

/// Expiration to request from the provider: today plus the minimum target DTE.
#[must_use]
pub fn requested_expiration(today: NaiveDate, regime: Regime, target_dte: Option<i64>) -> NaiveDate {
    let min_dte = target_dte
        .unwrap_or_else(|| regime.config().target_dte.min.to_i64().unwrap_or_default());
    today + Duration::days(min_dte)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrikeCriteria {
    pub underlying_price: Decimal,
    pub direction: Direction,
    pub regime: Regime,
    pub strategy: OptionStrategy,
    pub today: NaiveDate,
    /// Overrides the regime's delta midpoint.
    pub target_delta: Option<Decimal>,
    /// Premium cap per share; absent means every premium scores 1.
    pub max_premium: Option<Decimal>,
    /// Minimum debit-spread reward/risk.
    pub min_risk_reward: Option<Decimal>,
}

impl StrikeCriteria {
    #[must_use]
    pub fn new(
        underlying_price: Decimal,
        direction: Direction,
        regime: Regime,
        strategy: OptionStrategy,
        today: NaiveDate,
    ) -> Self {
        Self {
            underlying_price,
            direction,
            regime,
            strategy,
            today,
            target_delta: None,
            max_premium: None,
            min_risk_reward: None,
        }
    }

    #[must_use]
    pub const fn with_target_delta(mut self, delta: Decimal) -> Self {
        self.target_delta = Some(delta);
        self
    }

    #[must_use]
    pub const fn with_max_premium(mut self, premium: Decimal) -> Self {
        self.max_premium = Some(premium);
        self
    }

    #[must_use]
    pub const fn with_min_risk_reward(mut self, rr: Decimal) -> Self {
        self.min_risk_reward = Some(rr);
        self
    }

    fn target_delta(&self) -> Decimal {
        self.target_delta
            .unwrap_or_else(|| self.regime.config().delta.midpoint())
    }

    /// Option type traded: fixed by the spread family, else by direction.
    fn option_type(&self) -> OptionType {
        match self.strategy {
            OptionStrategy::CallDebitSpread
            | OptionStrategy::CallCreditSpread
            | OptionStrategy::Pmcc => OptionType::Call,
            OptionStrategy::PutDebitSpread | OptionStrategy::PutCreditSpread => OptionType::Put,
            _ => match self.direction {
                Direction::Long => OptionType::Call,
                Direction::Short => OptionType::Put,
            },
        }
    }
}

/// One selected contract and its signed unit quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedLeg {
    pub strike: Decimal,
    pub quantity: i32,
    pub quote: OptionQuote,
    pub liquidity_score: Decimal,
}

/// Outcome of a strike search. The first leg is the primary leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrikeSelection {
    pub strategy: OptionStrategy,
    pub option_type: OptionType,
    pub expiration: NaiveDate,
    pub dte: i64,
    pub legs: Vec<SelectedLeg>,
    /// Premium paid (positive) or collected (negative) per share.
    pub net_premium: Decimal,
    /// Per-share worst case.
    pub max_loss: Decimal,
    /// Per-share best case; `None` when unbounded.
    pub max_gain: Option<Decimal>,
    pub risk_reward: Option<Decimal>,
    pub breakeven: Decimal,
    pub liquidity_score: Decimal,
    pub score: Decimal,
    pub reason: String,
}

impl StrikeSelection {
    #[must_use]
    pub fn primary(&self) -> Option<&SelectedLeg> {
        self.legs.first()
    }

    /// Per-contract plan for sizing and persistence.
    #[must_use]
    pub fn to_plan(&self, symbol: &str, underlying_price: Decimal) -> StrategyPlan {
        let legs = self
            .legs
            .iter()
            .map(|leg| {
                OptionLeg::from_quote(
                    symbol,
                    leg.strike,
                    self.expiration,
                    self.option_type,
                    leg.quantity,
                    &leg.quote,
                    underlying_price,
                )
            })
            .collect();
        StrategyPlan::new(self.strategy, legs)
    }
}

/// Selects strikes for `criteria.strategy` from a single-expiration chain.
///
/// # Errors
/// Returns a [`StrikeSelectionError`] when no candidate survives screening.
pub fn select_strikes(
    chain: &OptionsChain,
    criteria: &StrikeCriteria,
) -> Result<StrikeSelection, StrikeSelectionError> {
    let selection = if criteria.strategy.is_debit_spread() {
        select_debit_spread(chain, criteria)
    } else if criteria.strategy.is_credit_spread() {
        select_credit_spread(chain, criteria)
    } else {
        select_single_leg(chain, criteria)
    };

    match &selection {
        Ok(s) => tracing::debug!(
            symbol = %chain.symbol,
            strategy = %s.strategy,
            expiration = %s.expiration,
            score = %s.score,
            "Strikes selected"
        ),
        Err(e) => tracing::debug!(
            symbol = %chain.symbol,
            strategy = %criteria.strategy,
            error = %e,
            "Strike selection failed"
        ),
    }

    selection
}

fn select_single_leg(
    chain: &OptionsChain,
    criteria: &StrikeCriteria,
) -> Result<StrikeSelection, StrikeSelectionError> {
    let option_type = criteria.option_type();
    let screen = LiquidityScreen::for_regime(criteria.regime);
    let band = criteria.regime.config().delta;
    let target = criteria.target_delta();

    // (strike, quote, score, delta distance, liquidity)
    let mut best: Option<(Decimal, &OptionQuote, Decimal, Decimal, Decimal)> = None;

    for row in &chain.strikes {
        let Some(quote) = row.quote(option_type) else {
            continue;
        };
        let abs_delta = quote.greeks.delta.abs();
        if !band.contains(abs_delta)
            || quote.open_interest < screen.min_open_interest
            || quote.volume < screen.min_volume
            || quote.spread_pct() > screen.max_spread_pct
        {
            continue;
        }

        let liquidity = liquidity_score(quote);
        let distance = (abs_delta - target).abs();
        let delta_score = Decimal::ONE - distance / DELTA_SCORE_SPAN;
        let premium_score = match criteria.max_premium {
            Some(cap) if cap > Decimal::ZERO => {
                (Decimal::ONE - quote.last / cap).max(Decimal::ZERO)
            }
            _ => Decimal::ONE,
        };
        let score = liquidity * dec!(0.4) + delta_score * dec!(0.3) + premium_score * dec!(0.3);

        let better = match &best {
            None => true,
            Some((_, _, best_score, best_distance, _)) => {
                score > *best_score || (score == *best_score && distance < *best_distance)
            }
        };
        if better {
            best = Some((row.strike, quote, score, distance, liquidity));
        }
    }

    let (strike, quote, score, _, liquidity) = best.ok_or(StrikeSelectionError::NoSuitableStrikes)?;
    let premium = quote.last;
    let breakeven = match option_type {
        OptionType::Call => strike + premium,
        OptionType::Put => strike - premium,
    };

    Ok(StrikeSelection {
        strategy: criteria.strategy,
        option_type,
        expiration: chain.expiration,
        dte: chain.days_to_expiry(criteria.today),
        legs: vec![SelectedLeg {
            strike,
            quantity: 1,
            quote: quote.clone(),
            liquidity_score: liquidity,
        }],
        net_premium: premium,
        max_loss: premium,
        max_gain: None,
        risk_reward: None,
        breakeven,
        liquidity_score: liquidity,
        score,
        reason: format!(
            "Delta: {:.2}, Liquidity: {:.2}",
            quote.greeks.delta, liquidity
        ),
    })
}

/// Screened rows for a spread search, sorted by strike.
fn spread_candidates<'a>(
    chain: &'a OptionsChain,
    option_type: OptionType,
    regime: Regime,
) -> Vec<(Decimal, &'a OptionQuote)> {
    let screen = LiquidityScreen::for_regime(regime);
    let mut rows: Vec<(Decimal, &OptionQuote)> = chain
        .strikes
        .iter()
        .filter_map(|row| row.quote(option_type).map(|q| (row.strike, q)))
        .filter(|(_, q)| {
            q.open_interest >= screen.min_open_interest && q.spread_pct() <= screen.max_spread_pct
        })
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
}

fn width_bounds(underlying_price: Decimal) -> (Decimal, Decimal) {
    let target = underlying_price * TARGET_WIDTH_PCT;
    (target * dec!(0.5), target * dec!(2))
}

struct SpreadCandidate<'a> {
    long: (Decimal, &'a OptionQuote),
    short: (Decimal, &'a OptionQuote),
    width: Decimal,
    premium: Decimal,
    risk_reward: Decimal,
    liquidity: Decimal,
    score: Decimal,
}

fn select_debit_spread(
    chain: &OptionsChain,
    criteria: &StrikeCriteria,
) -> Result<StrikeSelection, StrikeSelectionError> {
    let option_type = criteria.option_type();
    let rows = spread_candidates(chain, option_type, criteria.regime);
    if rows.len() < 2 {
        return Err(StrikeSelectionError::NotEnoughStrikes);
    }
    let (min_width, max_width) = width_bounds(criteria.underlying_price);

    let mut best: Option<SpreadCandidate<'_>> = None;
    for pair in rows.windows(2) {
        let (lower, upper) = (pair[0], pair[1]);
        // Calls buy the lower strike; puts buy the higher.
        let (long, short) = match option_type {
            OptionType::Call => (lower, upper),
            OptionType::Put => (upper, lower),
        };
        let width = (short.0 - long.0).abs();
        if width <= Decimal::ZERO || width < min_width || width > max_width {
            continue;
        }

        let debit = long.1.last - short.1.last;
        if debit <= Decimal::ZERO {
            continue;
        }
        let risk_reward = (width - debit) / debit;
        if criteria.min_risk_reward.is_some_and(|min| risk_reward < min) {
            continue;
        }

        let liquidity = (liquidity_score(long.1) + liquidity_score(short.1)) / dec!(2);
        let score = risk_reward * dec!(0.5)
            + liquidity * dec!(0.3)
            + (Decimal::ONE - debit / width) * dec!(0.2);

        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(SpreadCandidate {
                long,
                short,
                width,
                premium: debit,
                risk_reward,
                liquidity,
                score,
            });
        }
    }

    let spread = best.ok_or(StrikeSelectionError::NoSuitableSpread)?;
    let breakeven = match option_type {
        OptionType::Call => spread.long.0 + spread.premium,
        OptionType::Put => spread.long.0 - spread.premium,
    };
    let reason = format!(
        "Debit spread: {:.0} width, R:R {:.2}",
        spread.width, spread.risk_reward
    );

    Ok(StrikeSelection {
        strategy: criteria.strategy,
        option_type,
        expiration: chain.expiration,
        dte: chain.days_to_expiry(criteria.today),
        legs: vec![
            selected(spread.long, 1),
            selected(spread.short, -1),
        ],
        net_premium: spread.premium,
        max_loss: spread.premium,
        max_gain: Some(spread.width - spread.premium),
        risk_reward: Some(spread.risk_reward),
        breakeven,
        liquidity_score: spread.liquidity,
        score: spread.score,
        reason,
    })
}

fn select_credit_spread(
    chain: &OptionsChain,
    criteria: &StrikeCriteria,
) -> Result<StrikeSelection, StrikeSelectionError> {
    let option_type = criteria.option_type();
    let rows = spread_candidates(chain, option_type, criteria.regime);
    if rows.len() < 2 {
        return Err(StrikeSelectionError::NotEnoughStrikes);
    }
    let (min_width, max_width) = width_bounds(criteria.underlying_price);

    let mut best: Option<SpreadCandidate<'_>> = None;
    for pair in rows.windows(2) {
        let (lower, upper) = (pair[0], pair[1]);
        // Calls sell the lower strike; puts sell the higher.
        let (short, long) = match option_type {
            OptionType::Call => (lower, upper),
            OptionType::Put => (upper, lower),
        };
        let width = (short.0 - long.0).abs();
        if width <= Decimal::ZERO || width < min_width || width > max_width {
            continue;
        }

        let credit = short.1.last - long.1.last;
        let risk = width - credit;
        if credit <= Decimal::ZERO || risk <= Decimal::ZERO {
            continue;
        }
        let risk_reward = credit / risk;

        let liquidity = (liquidity_score(long.1) + liquidity_score(short.1)) / dec!(2);
        let score =
            risk_reward * dec!(0.5) + liquidity * dec!(0.3) + (credit / width) * dec!(0.2);

        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(SpreadCandidate {
                long,
                short,
                width,
                premium: credit,
                risk_reward,
                liquidity,
                score,
            });
        }
    }

    let spread = best.ok_or(StrikeSelectionError::NoSuitableSpread)?;
    let breakeven = match option_type {
        OptionType::Call => spread.short.0 + spread.premium,
        OptionType::Put => spread.short.0 - spread.premium,
    };
    let reason = format!(
        "Credit spread: {:.0} width, credit {:.2}",
        spread.width, spread.premium
    );

    Ok(StrikeSelection {
        strategy: criteria.strategy,
        option_type,
        expiration: chain.expiration,
        dte: chain.days_to_expiry(criteria.today),
        legs: vec![
            selected(spread.short, -1),
            selected(spread.long, 1),
        ],
        net_premium: -spread.premium,
        max_loss: spread.width - spread.premium,
        max_gain: Some(spread.premium),
        risk_reward: Some(spread.risk_reward),
        breakeven,
        liquidity_score: spread.liquidity,
        score: spread.score,
        reason,
    })
}

fn selected((strike, quote): (Decimal, &OptionQuote), quantity: i32) -> SelectedLeg {
    SelectedLeg {
        strike,
        quantity,
        quote: quote.clone(),
        liquidity_score: liquidity_score(quote),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algo_trade_core::{Greeks, StrikeRow};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
    }

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

    /// SPY-like chain around 500 with 20-point strikes, 28 DTE.
    fn make_chain() -> OptionsChain {
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

    fn criteria(strategy: OptionStrategy, direction: Direction) -> StrikeCriteria {
        StrikeCriteria::new(dec!(500), direction, Regime::Swing, strategy, today())
    }

    #[test]
    fn test_requested_expiration_uses_min_target_dte() {
        assert_eq!(
            requested_expiration(today(), Regime::Swing, None),
            NaiveDate::from_ymd_opt(2025, 1, 24).unwrap()
        );
        assert_eq!(requested_expiration(today(), Regime::Intraday, None), today());
        assert_eq!(
            requested_expiration(today(), Regime::Swing, Some(3)),
            NaiveDate::from_ymd_opt(2025, 1, 13).unwrap()
        );
    }

    #[test]
    fn test_long_call_prefers_liquid_near_target_delta() {
        let selection =
            select_strikes(&make_chain(), &criteria(OptionStrategy::LongCall, Direction::Long))
                .unwrap();

        // Target delta 0.45; 500 is closest and most liquid.
        assert_eq!(selection.primary().unwrap().strike, dec!(500));
        assert_eq!(selection.option_type, OptionType::Call);
        assert_eq!(selection.dte, 28);
        assert_eq!(selection.breakeven, dec!(516.00));
        assert!(selection.max_gain.is_none());
    }

    #[test]
    fn test_long_put_uses_absolute_delta() {
        let selection =
            select_strikes(&make_chain(), &criteria(OptionStrategy::LongPut, Direction::Short))
                .unwrap();
        assert_eq!(selection.option_type, OptionType::Put);
        assert_eq!(selection.primary().unwrap().strike, dec!(500));
        assert_eq!(selection.breakeven, dec!(485.00));
    }

    #[test]
    fn test_no_candidate_is_an_error() {
        let mut chain = make_chain();
        for row in &mut chain.strikes {
            if let Some(call) = row.call.as_mut() {
                call.open_interest = 10;
            }
        }
        let err = select_strikes(&chain, &criteria(OptionStrategy::LongCall, Direction::Long))
            .unwrap_err();
        assert_eq!(err, StrikeSelectionError::NoSuitableStrikes);
        assert_eq!(err.to_string(), "No suitable strikes found matching criteria");
    }

    #[test]
    fn test_call_debit_spread_buys_lower_strike() {
        let selection = select_strikes(
            &make_chain(),
            &criteria(OptionStrategy::CallDebitSpread, Direction::Long),
        )
        .unwrap();

        let long = &selection.legs[0];
        let short = &selection.legs[1];
        assert_eq!(long.quantity, 1);
        assert_eq!(short.quantity, -1);
        assert!(long.strike < short.strike);
        assert_eq!(short.strike - long.strike, dec!(20));
        assert!(selection.net_premium > Decimal::ZERO);
        // 520/540: debit 4.00, gain 16.00 gives the best reward/risk.
        assert_eq!(long.strike, dec!(520));
        assert_eq!(selection.risk_reward, Some(dec!(4)));
    }

    #[test]
    fn test_debit_spread_respects_min_risk_reward() {
        let strict = criteria(OptionStrategy::CallDebitSpread, Direction::Long)
            .with_min_risk_reward(dec!(10));
        assert_eq!(
            select_strikes(&make_chain(), &strict).unwrap_err(),
            StrikeSelectionError::NoSuitableSpread
        );
    }

    #[test]
    fn test_put_credit_spread_sells_higher_strike() {
        let selection = select_strikes(
            &make_chain(),
            &criteria(OptionStrategy::PutCreditSpread, Direction::Long),
        )
        .unwrap();

        let short = &selection.legs[0];
        let long = &selection.legs[1];
        assert_eq!(short.quantity, -1);
        assert!(short.strike > long.strike);
        assert!(selection.net_premium < Decimal::ZERO);
        let credit = -selection.net_premium;
        assert_eq!(selection.max_loss, (short.strike - long.strike) - credit);

        let plan = selection.to_plan("SPY", dec!(500));
        assert_eq!(plan.max_loss(), selection.max_loss * dec!(100));
    }

    #[test]
    fn test_spread_needs_two_screened_strikes() {
        let mut chain = make_chain();
        chain.strikes.truncate(1);
        assert_eq!(
            select_strikes(&chain, &criteria(OptionStrategy::PutDebitSpread, Direction::Short))
                .unwrap_err(),
            StrikeSelectionError::NotEnoughStrikes
        );
    }

    #[test]
    fn test_plan_round_trip_keeps_short_leg_sign() {
        let selection = select_strikes(
            &make_chain(),
            &criteria(OptionStrategy::CallDebitSpread, Direction::Long),
        )
        .unwrap();
        let plan = selection.to_plan("SPY", dec!(500));

        let short = plan.short_leg().unwrap();
        assert!(short.signed_greeks().delta < Decimal::ZERO);
        let expected = selection.legs[0].quote.greeks.delta - selection.legs[1].quote.greeks.delta;
        assert_eq!(plan.aggregate_greeks().delta, expected);
    }
}
