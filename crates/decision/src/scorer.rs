//! Regime-weighted confluence scoring.
//!
//! Each known tag carries one weight per regime. Weights add into the tag's
//! family sub-score and into the total. Unknown tags weigh nothing.

use algo_trade_core::{
    Direction, Regime, ScoreBreakdown, Signal, SignalFamily, SignalRoles, SignalTag, TradeMode,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Confirmations required by the role gate.
pub const MIN_CONFIRMATIONS: usize = 2;

/// Weight of `tag` under `regime`.
#[must_use]
pub fn weight(tag: SignalTag, regime: Regime) -> Decimal {
    // Columns: INTRADAY, SWING, MONTHLY, LEAPS.
    let row = match tag {
        SignalTag::Strat212 => [dec!(3.0), dec!(2.5), dec!(2.0), dec!(1.5)],
        SignalTag::Bos => [dec!(3.0), dec!(2.5), dec!(2.5), dec!(2.0)],
        SignalTag::Mss => [dec!(2.5), dec!(2.5), dec!(3.0), dec!(3.5)],
        SignalTag::Choch => [dec!(2.5), dec!(3.0), dec!(3.0), dec!(3.5)],
        SignalTag::SweepLow | SignalTag::SweepHigh => [dec!(2.5), dec!(2.5), dec!(2.0), dec!(1.5)],
        SignalTag::Smt => [dec!(1.5), dec!(2.5), dec!(3.0), dec!(3.0)],
        SignalTag::Fvg | SignalTag::Displacement => [dec!(3.5), dec!(2.5), dec!(2.0), dec!(1.5)],
        SignalTag::Breaker => [dec!(2.5), dec!(3.0), dec!(3.0), dec!(2.5)],
        SignalTag::VolumeSurge => [dec!(3.0), dec!(2.0), dec!(1.5), dec!(1.0)],
        SignalTag::Orb => [dec!(3.5), dec!(1.5), dec!(1.0), dec!(0.5)],
    };
    let column = match regime {
        Regime::Intraday => 0,
        Regime::Swing => 1,
        Regime::Monthly => 2,
        Regime::Leaps => 3,
    };
    row[column]
}

/// Weight of a wire tag. Unknown tags weigh zero.
#[must_use]
pub fn weight_of(name: &str, regime: Regime) -> Decimal {
    SignalTag::parse(name).map_or(Decimal::ZERO, |tag| weight(tag, regime))
}

/// Sums the weights of `tags` into a per-family breakdown.
#[must_use]
pub fn score<S: AsRef<str>>(tags: &[S], regime: Regime) -> ScoreBreakdown {
    let mut breakdown = ScoreBreakdown::default();
    for tag in tags.iter().filter_map(|t| SignalTag::parse(t.as_ref())) {
        breakdown.add(tag.family(), weight(tag, regime));
    }
    breakdown
}

/// Picks the heaviest tag as primary and up to two confirmations.
///
/// Tags from families other than the primary's are preferred; same-family
/// tags only fill the remaining slots. Ties keep input order.
#[must_use]
pub fn assign_roles<S: AsRef<str>>(tags: &[S], regime: Regime) -> SignalRoles {
    let mut ranked: Vec<(&str, Decimal)> = tags
        .iter()
        .map(|t| (t.as_ref(), weight_of(t.as_ref(), regime)))
        .collect();
    // Stable sort keeps input order among equal weights.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let Some(&(primary, _)) = ranked.first() else {
        return SignalRoles::default();
    };
    let primary_family = family_of(primary);

    let (cross, same): (Vec<&str>, Vec<&str>) = ranked
        .iter()
        .skip(1)
        .map(|(name, _)| *name)
        .partition(|name| family_of(name) != primary_family);

    let confirmations = cross
        .into_iter()
        .chain(same)
        .take(MIN_CONFIRMATIONS)
        .map(str::to_string)
        .collect();

    SignalRoles {
        primary: Some(primary.to_string()),
        confirmations,
    }
}

/// Whether `roles` carries enough confirmations, at least one of them from
/// a family other than the primary's.
#[must_use]
pub fn roles_confirmed(roles: &SignalRoles) -> bool {
    let primary_family = roles.primary.as_deref().and_then(family_of);
    roles.confirmations.len() >= MIN_CONFIRMATIONS
        && roles
            .confirmations
            .iter()
            .any(|c| family_of(c) != primary_family)
}

fn family_of(name: &str) -> Option<SignalFamily> {
    SignalTag::parse(name).map(SignalTag::family)
}

/// Mode implied by which family dominates.
///
/// Liquidity must strictly beat market structure and volume for REVERSAL;
/// volume must strictly beat market structure and liquidity for BREAKOUT.
#[must_use]
pub fn trade_mode(breakdown: &ScoreBreakdown) -> TradeMode {
    let ms = breakdown.market_structure;
    let liq = breakdown.liquidity;
    let vol = breakdown.volume;

    if liq > ms && liq > vol {
        TradeMode::Reversal
    } else if vol > ms && vol > liq {
        TradeMode::Breakout
    } else {
        TradeMode::Trend
    }
}

/// Directional reward over risk. Zero when the stop sits on the wrong side.
#[must_use]
pub fn risk_reward(signal: &Signal) -> Decimal {
    let (reward, risk) = match signal.direction {
        Direction::Long => (
            signal.take_profit_1 - signal.entry_price,
            signal.entry_price - signal.stop_loss,
        ),
        Direction::Short => (
            signal.entry_price - signal.take_profit_1,
            signal.stop_loss - signal.entry_price,
        ),
    };
    if risk <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    reward / risk
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swing_scenario_score() {
        let breakdown = score(&["FVG", "DISPLACEMENT", "BOS"], Regime::Swing);
        assert_eq!(breakdown.total, dec!(7.5));
        assert_eq!(breakdown.order_flow, dec!(5.0));
        assert_eq!(breakdown.market_structure, dec!(2.5));
    }

    #[test]
    fn test_unknown_tags_weigh_nothing() {
        let breakdown = score(&["FVG", "RSI_DIVERGENCE"], Regime::Intraday);
        assert_eq!(breakdown.total, dec!(3.5));
        assert_eq!(weight_of("RSI_DIVERGENCE", Regime::Leaps), Decimal::ZERO);
    }

    #[test]
    fn test_family_sums_match_total() {
        for regime in [Regime::Intraday, Regime::Swing, Regime::Monthly, Regime::Leaps] {
            let names: Vec<&str> = SignalTag::ALL.iter().map(|t| t.as_str()).collect();
            let b = score(&names, regime);
            let families = [
                SignalFamily::MarketStructure,
                SignalFamily::Liquidity,
                SignalFamily::OrderFlow,
                SignalFamily::Volume,
            ];
            let sum: Decimal = families.iter().map(|f| b.family(*f)).sum();
            assert_eq!(sum, b.total);
        }
    }

    #[test]
    fn test_adding_a_tag_never_lowers_score() {
        let base = ["BOS", "SMT"];
        for regime in [Regime::Intraday, Regime::Swing, Regime::Monthly, Regime::Leaps] {
            let before = score(&base, regime).total;
            for tag in SignalTag::ALL {
                let with = [base[0], base[1], tag.as_str()];
                assert!(score(&with, regime).total >= before);
            }
        }
    }

    #[test]
    fn test_roles_prefer_other_families() {
        // SWING: BREAKER 3.0 primary, FVG shares order flow and ranks last.
        let roles = assign_roles(&["FVG", "BREAKER", "BOS", "SMT"], Regime::Swing);
        assert_eq!(roles.primary.as_deref(), Some("BREAKER"));
        assert_eq!(roles.confirmations, vec!["BOS".to_string(), "SMT".to_string()]);
        assert!(roles_confirmed(&roles));

        let mixed = assign_roles(&["FVG", "DISPLACEMENT", "BOS"], Regime::Swing);
        assert_eq!(mixed.primary.as_deref(), Some("FVG"));
        assert_eq!(mixed.confirmations, vec!["BOS".to_string(), "DISPLACEMENT".to_string()]);
        assert!(roles_confirmed(&mixed));
    }

    #[test]
    fn test_roles_need_cross_family_support() {
        let single_family = assign_roles(&["FVG", "DISPLACEMENT", "BREAKER"], Regime::Swing);
        assert_eq!(single_family.confirmations.len(), 2);
        assert!(!roles_confirmed(&single_family));

        let pair = assign_roles(&["FVG", "BOS"], Regime::Swing);
        assert!(!roles_confirmed(&pair));
    }

    #[test]
    fn test_trade_mode_selection() {
        let reversal = score(&["SWEEP_LOW", "SMT", "BOS"], Regime::Swing);
        assert_eq!(trade_mode(&reversal), TradeMode::Reversal);

        let breakout = score(&["VOLUME_SURGE", "ORB"], Regime::Intraday);
        assert_eq!(trade_mode(&breakout), TradeMode::Breakout);

        // Liquidity ties market structure: no strict winner.
        let tie = score(&["SWEEP_LOW", "BOS"], Regime::Swing);
        assert_eq!(trade_mode(&tie), TradeMode::Trend);
    }
}
