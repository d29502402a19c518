//! Regime trading windows on the US/Eastern clock.

use algo_trade_core::Regime;
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::US::Eastern;

/// Half-open `[open, close)` window in Eastern minutes after midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub open: u32,
    pub close: u32,
}

impl SessionWindow {
    /// Window for a regime, or `None` when any weekday time is acceptable.
    ///
    /// Intraday trims the first and last fifteen minutes of the cash session.
    #[must_use]
    pub const fn for_regime(regime: Regime) -> Option<Self> {
        match regime {
            Regime::Intraday => Some(Self {
                open: 9 * 60 + 45,
                close: 15 * 60 + 45,
            }),
            Regime::Swing | Regime::Monthly => Some(Self {
                open: 9 * 60 + 30,
                close: 16 * 60,
            }),
            Regime::Leaps => None,
        }
    }

    #[must_use]
    pub const fn contains(&self, minute_of_day: u32) -> bool {
        minute_of_day >= self.open && minute_of_day < self.close
    }
}

/// Whether `now` falls inside the regime's window on a weekday.
#[must_use]
pub fn in_session(regime: Regime, now: DateTime<Utc>) -> bool {
    let local = now.with_timezone(&Eastern);
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    SessionWindow::for_regime(regime)
        .map_or(true, |window| window.contains(local.hour() * 60 + local.minute()))
}

/// Exchange calendar date for `now`, used for days-to-expiry.
#[must_use]
pub fn trading_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Eastern).date_naive()
}
