//! Planning a structure end to end: strategy, strikes, sizing, portfolio
//! limits and the exit rules attached to it.

use algo_trade_core::{
    Direction, Greeks, OptionQuote, OptionsChain, PortfolioLimits, Regime, StrikeRow, TradeMode,
};
use algo_trade_options::{
    check_exit_rules, generate_exit_rules, select_strategy, select_strikes, Conviction,
    ExitAction, ExitSnapshot, ExitTrigger, OptionStrategy, PortfolioGreeks, PortfolioGreeksGuard,
    PositionSizer, StrikeCriteria,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn quote(last: Decimal, delta: Decimal) -> OptionQuote {
    OptionQuote {
        bid: last - dec!(0.05),
        ask: last + dec!(0.05),
        last,
        volume: 800,
        open_interest: 3000,
        implied_volatility: dec!(0.22),
        greeks: Greeks::new(delta, dec!(0.02), dec!(-0.04), dec!(0.12)),
    }
}

fn make_chain() -> OptionsChain {
    let row = |strike: Decimal, call: (Decimal, Decimal), put: (Decimal, Decimal)| StrikeRow {
        strike,
        call: Some(quote(call.0, call.1)),
        put: Some(quote(put.0, put.1)),
    };
    OptionsChain {
        symbol: "SPY".to_string(),
        expiration: NaiveDate::from_ymd_opt(2025, 2, 7).unwrap(),
        strikes: vec![
            row(dec!(460), (dec!(44.00), dec!(0.80)), (dec!(3.50), dec!(-0.20))),
            row(dec!(480), (dec!(28.00), dec!(0.65)), (dec!(8.00), dec!(-0.35))),
            row(dec!(500), (dec!(16.00), dec!(0.50)), (dec!(15.00), dec!(-0.50))),
            row(dec!(520), (dec!(8.00), dec!(0.35)), (dec!(27.00), dec!(-0.65))),
            row(dec!(540), (dec!(4.00), dec!(0.20)), (dec!(43.00), dec!(-0.80))),
        ],
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 14).unwrap()
}

#[test]
fn test_swing_debit_spread_plan() {
    let chain = make_chain();
    let strategy = select_strategy(
        Direction::Long,
        TradeMode::Trend,
        Regime::Swing,
        dec!(40),
        Conviction::from_confidence(dec!(6.5)),
    );
    assert_eq!(strategy, OptionStrategy::CallDebitSpread);

    let criteria = StrikeCriteria::new(dec!(500), Direction::Long, Regime::Swing, strategy, today());
    let selection = select_strikes(&chain, &criteria).unwrap();
    assert_eq!(selection.legs.len(), 2);
    assert_eq!(selection.dte, 24);
    assert!(selection.net_premium > Decimal::ZERO);
    // Long the lower strike, short the higher.
    assert_eq!(selection.legs[0].quantity, 1);
    assert_eq!(selection.legs[1].quantity, -1);
    assert!(selection.legs[0].strike < selection.legs[1].strike);

    let plan = selection.to_plan("SPY", dec!(500));
    let sizing = PositionSizer::new(dec!(100000), dec!(0.01)).size(&plan, Regime::Swing, TradeMode::Trend);
    assert!(sizing.contracts >= 1);
    assert!(sizing.total_greeks.delta > Decimal::ZERO);
    assert!(sizing.notional_exposure > Decimal::ZERO);

    let guard = PortfolioGreeksGuard::new(PortfolioLimits::default());
    assert!(guard.check_projected(&PortfolioGreeks::default(), &sizing).approved);

    let crowded = PortfolioGreeks {
        total: Greeks::new(dec!(999), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        beta_weighted_delta: dec!(999),
    };
    let check = guard.check_projected(&crowded, &sizing);
    assert!(!check.approved);
    assert!(check.breaches[0].starts_with("Delta limit"));
}

#[test]
fn test_exit_rules_follow_position_lifecycle() {
    let rules = generate_exit_rules(Regime::Swing, OptionStrategy::CallDebitSpread);
    let snapshot = |pnl_pct: Decimal, dte: i64| ExitSnapshot {
        pnl_pct,
        dte,
        iv: dec!(0.22),
        entry_iv: dec!(0.22),
        hours_held: dec!(30),
    };

    assert!(check_exit_rules(&rules, &snapshot(dec!(0.10), 24)).is_none());

    let half = check_exit_rules(&rules, &snapshot(dec!(0.55), 24)).unwrap();
    assert_eq!((half.trigger_type, half.action), (ExitTrigger::ProfitTarget, ExitAction::CloseHalf));

    let stop = check_exit_rules(&rules, &snapshot(dec!(-0.45), 24)).unwrap();
    assert_eq!(stop.trigger_type, ExitTrigger::StopLoss);

    let roll = check_exit_rules(&rules, &snapshot(Decimal::ZERO, 10)).unwrap();
    assert_eq!((roll.trigger_type, roll.action), (ExitTrigger::ThetaStop, ExitAction::Roll));
}
