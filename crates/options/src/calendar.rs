//! Market event calendar and holding-period event adjustments.

use algo_trade_core::{Direction, Regime};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Warnings at which a trade is no longer approved.
pub const MAX_EVENT_WARNINGS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketEventKind {
    Earnings,
    Fomc,
    Cpi,
    Nfp,
    Opex,
    Dividend,
}

impl fmt::Display for MarketEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Earnings => "EARNINGS",
            Self::Fomc => "FOMC",
            Self::Cpi => "CPI",
            Self::Nfp => "NFP",
            Self::Opex => "OPEX",
            Self::Dividend => "DIVIDEND",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IvImpact {
    Expansion,
    Crush,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub at: DateTime<Utc>,
    pub kind: MarketEventKind,
    /// `None` for market-wide events.
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub expected_move: Option<Decimal>,
    pub iv_impact: IvImpact,
}

impl MarketEvent {
    #[must_use]
    pub fn new(at: DateTime<Utc>, kind: MarketEventKind, symbol: Option<&str>) -> Self {
        let iv_impact = match kind {
            MarketEventKind::Earnings => IvImpact::Crush,
            MarketEventKind::Fomc | MarketEventKind::Cpi | MarketEventKind::Nfp => {
                IvImpact::Expansion
            }
            MarketEventKind::Opex | MarketEventKind::Dividend => IvImpact::Neutral,
        };
        Self {
            at,
            kind,
            symbol: symbol.map(str::to_string),
            expected_move: None,
            iv_impact,
        }
    }

    /// Applies to `symbol`, either directly or as a market-wide event.
    #[must_use]
    pub fn applies_to(&self, symbol: &str) -> bool {
        self.symbol.as_deref().map_or(true, |s| s == symbol)
    }

    /// Falls inside `[now, now + max holding hours]` for the regime.
    #[must_use]
    pub fn in_holding_period(&self, regime: Regime, now: DateTime<Utc>) -> bool {
        let seconds_until = Decimal::from((self.at - now).num_seconds());
        let hours_until = seconds_until / Decimal::from(3600);
        hours_until >= Decimal::ZERO && hours_until <= regime.config().holding_hours.max
    }
}

/// Known upcoming events, loaded from config or a calendar feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCalendar {
    events: Vec<MarketEvent>,
}

impl EventCalendar {
    #[must_use]
    pub const fn new(events: Vec<MarketEvent>) -> Self {
        Self { events }
    }

    pub fn add(&mut self, event: MarketEvent) {
        self.events.push(event);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    /// Events for `symbol` (or market-wide) between `now` and `days_ahead` out.
    #[must_use]
    pub fn upcoming(&self, symbol: &str, now: DateTime<Utc>, days_ahead: i64) -> Vec<MarketEvent> {
        let horizon = now + Duration::days(days_ahead);
        self.events
            .iter()
            .filter(|e| e.applies_to(symbol) && e.at >= now && e.at <= horizon)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAdjustment {
    pub approved: bool,
    pub adjustments: Vec<String>,
    pub warnings: Vec<String>,
}

impl EventAdjustment {
    #[must_use]
    pub fn has_concerns(&self) -> bool {
        !self.warnings.is_empty() || !self.adjustments.is_empty()
    }
}

/// Reviews events inside the regime's holding period.
///
/// Approval is withdrawn once [`MAX_EVENT_WARNINGS`] warnings accumulate.
#[must_use]
pub fn adjust_for_events(
    symbol: &str,
    direction: Direction,
    regime: Regime,
    events: &[MarketEvent],
    now: DateTime<Utc>,
) -> EventAdjustment {
    let mut adjustments = Vec::new();
    let mut warnings = Vec::new();

    for event in events
        .iter()
        .filter(|e| e.applies_to(symbol) && e.in_holding_period(regime, now))
    {
        let date = event.at.format("%Y-%m-%d");
        match event.kind {
            MarketEventKind::Earnings
                if event.symbol.as_deref() == Some(symbol)
                    && matches!(regime, Regime::Intraday | Regime::Swing) =>
            {
                warnings.push(format!("Earnings on {date} - expect IV crush post-event"));
                if direction == Direction::Long {
                    adjustments.push(
                        "Consider closing before earnings or switching to defined-risk spread"
                            .to_string(),
                    );
                }
            }
            MarketEventKind::Fomc | MarketEventKind::Cpi if regime == Regime::Intraday => {
                warnings.push(format!(
                    "{} on {date} - elevated volatility expected",
                    event.kind
                ));
                adjustments.push("Reduce position size by 50% around macro events".to_string());
            }
            MarketEventKind::Opex if matches!(regime, Regime::Swing | Regime::Monthly) => {
                warnings.push(format!(
                    "Monthly OPEX on {date} - pin risk and gamma exposure elevated"
                ));
            }
            MarketEventKind::Nfp if regime == Regime::Intraday => {
                warnings.push(format!("NFP on {date} - expect gap and volatility spike"));
                adjustments.push("Consider waiting until after NFP release".to_string());
            }
            _ => {}
        }
    }

    let approved = warnings.len() < MAX_EVENT_WARNINGS;
    if !approved {
        tracing::warn!(symbol, warnings = warnings.len(), "Too many event concerns");
    }

    EventAdjustment {
        approved,
        adjustments,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 13, 15, 0, 0).unwrap()
    }

    fn event(hours_ahead: i64, kind: MarketEventKind, symbol: Option<&str>) -> MarketEvent {
        MarketEvent::new(now() + Duration::hours(hours_ahead), kind, symbol)
    }

    #[test]
    fn test_holding_period_window() {
        let e = event(5, MarketEventKind::Cpi, None);
        assert!(e.in_holding_period(Regime::Intraday, now()));
        let far = event(7, MarketEventKind::Cpi, None);
        assert!(!far.in_holding_period(Regime::Intraday, now()));
        let past = event(-1, MarketEventKind::Cpi, None);
        assert!(!past.in_holding_period(Regime::Leaps, now()));
    }

    #[test]
    fn test_earnings_warns_swing_long() {
        let events = [event(48, MarketEventKind::Earnings, Some("AAPL"))];
        let adj = adjust_for_events("AAPL", Direction::Long, Regime::Swing, &events, now());
        assert!(adj.approved);
        assert_eq!(adj.warnings, vec!["Earnings on 2025-01-15 - expect IV crush post-event"]);
        assert_eq!(adj.adjustments.len(), 1);

        let short = adjust_for_events("AAPL", Direction::Short, Regime::Swing, &events, now());
        assert!(short.adjustments.is_empty());

        let other = adjust_for_events("MSFT", Direction::Long, Regime::Swing, &events, now());
        assert!(!other.has_concerns());
    }

    #[test]
    fn test_three_macro_warnings_block_intraday() {
        let events = [
            event(1, MarketEventKind::Fomc, None),
            event(2, MarketEventKind::Cpi, None),
            event(3, MarketEventKind::Nfp, None),
        ];
        let adj = adjust_for_events("SPY", Direction::Short, Regime::Intraday, &events, now());
        assert!(!adj.approved);
        assert_eq!(adj.warnings.len(), 3);
        assert_eq!(adj.adjustments.len(), 3);

        // The same events only matter intraday.
        let swing = adjust_for_events("SPY", Direction::Short, Regime::Swing, &events, now());
        assert!(swing.approved);
        assert!(swing.warnings.is_empty());
    }

    #[test]
    fn test_opex_warns_swing_and_monthly() {
        let events = [event(72, MarketEventKind::Opex, None)];
        for regime in [Regime::Swing, Regime::Monthly] {
            let adj = adjust_for_events("QQQ", Direction::Long, regime, &events, now());
            assert_eq!(adj.warnings.len(), 1);
        }
        let leaps = adjust_for_events("QQQ", Direction::Long, Regime::Leaps, &events, now());
        assert!(leaps.warnings.is_empty());
    }

    #[test]
    fn test_calendar_upcoming_filters_symbol_and_horizon() {
        let mut calendar = EventCalendar::default();
        calendar.add(event(24, MarketEventKind::Earnings, Some("AAPL")));
        calendar.add(event(24, MarketEventKind::Earnings, Some("MSFT")));
        calendar.add(event(48, MarketEventKind::Fomc, None));
        calendar.add(event(24 * 40, MarketEventKind::Cpi, None));

        let upcoming = calendar.upcoming("AAPL", now(), 30);
        assert_eq!(upcoming.len(), 2);
        assert!(upcoming.iter().all(|e| e.applies_to("AAPL")));
    }
}
