//! Option chain snapshot types consumed from market-data providers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Contract multiplier for standard US equity and index options.
pub const CONTRACT_MULTIPLIER: Decimal = Decimal::ONE_HUNDRED;

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    Call,
    Put,
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "C"),
            Self::Put => write!(f, "P"),
        }
    }
}

/// Option Greeks snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: Decimal,
    pub gamma: Decimal,
    pub theta: Decimal,
    pub vega: Decimal,
}

impl Greeks {
    #[must_use]
    pub const fn new(delta: Decimal, gamma: Decimal, theta: Decimal, vega: Decimal) -> Self {
        Self {
            delta,
            gamma,
            theta,
            vega,
        }
    }

    /// Scales every Greek by a signed quantity. Short quantities negate.
    #[must_use]
    pub fn scaled(&self, quantity: Decimal) -> Self {
        Self {
            delta: self.delta * quantity,
            gamma: self.gamma * quantity,
            theta: self.theta * quantity,
            vega: self.vega * quantity,
        }
    }
}

impl Add for Greeks {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            delta: self.delta + rhs.delta,
            gamma: self.gamma + rhs.gamma,
            theta: self.theta + rhs.theta,
            vega: self.vega + rhs.vega,
        }
    }
}

impl AddAssign for Greeks {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Quote for one side (call or put) of a strike.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub volume: u64,
    pub open_interest: u64,
    pub implied_volatility: Decimal,
    pub greeks: Greeks,
}

impl OptionQuote {
    #[must_use]
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / dec!(2)
    }

    /// Bid/ask spread as a fraction of mid.
    ///
    /// A one-sided or crossed-to-zero market counts as fully illiquid (1.0).
    #[must_use]
    pub fn spread_pct(&self) -> Decimal {
        if self.bid.is_zero() || self.ask.is_zero() {
            return Decimal::ONE;
        }
        let mid = self.mid();
        if mid.is_zero() {
            return Decimal::ONE;
        }
        (self.ask - self.bid) / mid
    }
}

/// One strike row of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrikeRow {
    pub strike: Decimal,
    #[serde(default)]
    pub call: Option<OptionQuote>,
    #[serde(default)]
    pub put: Option<OptionQuote>,
}

impl StrikeRow {
    /// Quote for the requested option type.
    #[must_use]
    pub const fn quote(&self, option_type: OptionType) -> Option<&OptionQuote> {
        match option_type {
            OptionType::Call => self.call.as_ref(),
            OptionType::Put => self.put.as_ref(),
        }
    }
}

/// Chain snapshot for a single expiration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsChain {
    pub symbol: String,
    pub expiration: NaiveDate,
    pub strikes: Vec<StrikeRow>,
}

impl OptionsChain {
    /// Days from `today` to expiration. Negative once expired.
    #[must_use]
    pub fn days_to_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiration - today).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spread_pct() {
        let quote = OptionQuote {
            bid: dec!(1.90),
            ask: dec!(2.10),
            ..OptionQuote::default()
        };
        assert_eq!(quote.spread_pct(), dec!(0.1));
    }

    #[test]
    fn test_spread_pct_one_sided_market() {
        let quote = OptionQuote {
            bid: Decimal::ZERO,
            ask: dec!(0.50),
            ..OptionQuote::default()
        };
        assert_eq!(quote.spread_pct(), Decimal::ONE);
    }

    #[test]
    fn test_short_quantity_negates_greeks() {
        let greeks = Greeks::new(dec!(0.5), dec!(0.02), dec!(-0.05), dec!(0.10));
        let short = greeks.scaled(dec!(-1));
        assert_eq!(short.delta, dec!(-0.5));
        assert_eq!(short.theta, dec!(0.05));
        assert_eq!((greeks + short), Greeks::default());
    }
}
