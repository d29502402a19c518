//! Option legs and the strategy plans that own them.

use crate::strategy::OptionStrategy;
use algo_trade_core::{Greeks, OptionQuote, OptionType, CONTRACT_MULTIPLIER};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One leg of an options structure, per contract.
///
/// `quantity` is signed: positive is bought, negative is sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionLeg {
    pub symbol: String,
    pub strike: Decimal,
    pub expiration: NaiveDate,
    pub option_type: OptionType,
    pub quantity: i32,
    pub entry_price: Decimal,
    pub underlying_price: Decimal,
    pub implied_volatility: Decimal,
    pub greeks: Greeks,
    pub bid: Decimal,
    pub ask: Decimal,
    pub open_interest: u64,
    pub volume: u64,
}

impl OptionLeg {
    /// Builds a leg from a chain quote, entering at the last trade.
    #[must_use]
    pub fn from_quote(
        symbol: &str,
        strike: Decimal,
        expiration: NaiveDate,
        option_type: OptionType,
        quantity: i32,
        quote: &OptionQuote,
        underlying_price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            strike,
            expiration,
            option_type,
            quantity,
            entry_price: quote.last,
            underlying_price,
            implied_volatility: quote.implied_volatility,
            greeks: quote.greeks,
            bid: quote.bid,
            ask: quote.ask,
            open_interest: quote.open_interest,
            volume: quote.volume,
        }
    }

    #[must_use]
    pub const fn is_long(&self) -> bool {
        self.quantity > 0
    }

    #[must_use]
    pub const fn is_short(&self) -> bool {
        self.quantity < 0
    }

    #[must_use]
    pub fn abs_quantity(&self) -> Decimal {
        Decimal::from(self.quantity.unsigned_abs())
    }

    /// Greeks contribution with the leg's sign applied.
    #[must_use]
    pub fn signed_greeks(&self) -> Greeks {
        self.greeks.scaled(Decimal::from(self.quantity))
    }

    /// Quote view of the leg, as fed to the options validation gate.
    #[must_use]
    pub fn quote(&self) -> OptionQuote {
        OptionQuote {
            bid: self.bid,
            ask: self.ask,
            last: self.entry_price,
            volume: self.volume,
            open_interest: self.open_interest,
            implied_volatility: self.implied_volatility,
            greeks: self.greeks,
        }
    }
}

/// A chosen structure and its one or two legs.
///
/// The first leg is the primary leg: the bought leg of a debit structure or
/// the sold leg of a credit spread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyPlan {
    pub strategy: OptionStrategy,
    pub legs: Vec<OptionLeg>,
}

impl StrategyPlan {
    #[must_use]
    pub const fn new(strategy: OptionStrategy, legs: Vec<OptionLeg>) -> Self {
        Self { strategy, legs }
    }

    #[must_use]
    pub fn primary(&self) -> Option<&OptionLeg> {
        self.legs.first()
    }

    #[must_use]
    pub fn long_leg(&self) -> Option<&OptionLeg> {
        self.legs.iter().find(|leg| leg.is_long())
    }

    #[must_use]
    pub fn short_leg(&self) -> Option<&OptionLeg> {
        self.legs.iter().find(|leg| leg.is_short())
    }

    /// Underlying price the plan was built against.
    #[must_use]
    pub fn underlying_price(&self) -> Decimal {
        self.primary()
            .map_or(Decimal::ZERO, |leg| leg.underlying_price)
    }

    /// Sum of each leg's Greeks times its signed quantity.
    #[must_use]
    pub fn aggregate_greeks(&self) -> Greeks {
        self.legs
            .iter()
            .fold(Greeks::default(), |acc, leg| acc + leg.signed_greeks())
    }

    /// Worst-case loss of one unit of the structure, in account currency.
    #[must_use]
    pub fn max_loss(&self) -> Decimal {
        match self.strategy {
            OptionStrategy::LongCall | OptionStrategy::LongPut => {
                if let Some(leg) = self.primary() {
                    return leg.entry_price * leg.abs_quantity() * CONTRACT_MULTIPLIER;
                }
            }
            s if s.is_debit_spread() => {
                if let (Some(long), Some(short)) = (self.long_leg(), self.short_leg()) {
                    return (long.entry_price - short.entry_price.abs())
                        * long.abs_quantity()
                        * CONTRACT_MULTIPLIER;
                }
            }
            s if s.is_credit_spread() => {
                if let (Some(long), Some(short)) = (self.long_leg(), self.short_leg()) {
                    let width = (long.strike - short.strike).abs();
                    let units = short.abs_quantity();
                    let credit =
                        (short.entry_price.abs() - long.entry_price) * units * CONTRACT_MULTIPLIER;
                    return width * units * CONTRACT_MULTIPLIER - credit;
                }
            }
            _ => {}
        }

        self.premium_paid()
    }

    /// Sum of every leg's premium, ignoring direction.
    fn premium_paid(&self) -> Decimal {
        self.legs
            .iter()
            .map(|leg| leg.entry_price * leg.abs_quantity() * CONTRACT_MULTIPLIER)
            .sum()
    }
}
