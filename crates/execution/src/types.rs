//! Orders, fills and paper positions.

use algo_trade_core::{Direction, Greeks};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy tag used for underlying (non-options) trades.
pub const DIRECTIONAL: &str = "DIRECTIONAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Side that opens a position in `direction`.
    #[must_use]
    pub const fn opening(direction: Direction) -> Self {
        match direction {
            Direction::Long => Self::Buy,
            Direction::Short => Self::Sell,
        }
    }

    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// +1 for buys, -1 for sells.
    #[must_use]
    pub const fn sign(self) -> i64 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

/// A request to trade `quantity` units of `symbol`.
///
/// `symbol` is the instrument key. Option structures use a composite key so
/// they never net against the underlying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: u32,
    pub limit_price: Option<Decimal>,
    /// Contract multiplier applied to cash and P&L (1 for shares).
    pub multiplier: Decimal,
    pub strategy: String,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    /// Position Greeks at entry, for option structures.
    pub greeks: Option<Greeks>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: u32, at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
            multiplier: Decimal::ONE,
            strategy: DIRECTIONAL.to_string(),
            stop_loss: None,
            take_profit: None,
            greeks: None,
            created_at: at,
        }
    }

    #[must_use]
    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: u32,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(price),
            ..Self::market(symbol, side, quantity, at)
        }
    }

    #[must_use]
    pub fn with_brackets(mut self, stop_loss: Decimal, take_profit: Decimal) -> Self {
        self.stop_loss = Some(stop_loss);
        self.take_profit = Some(take_profit);
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: Decimal) -> Self {
        self.multiplier = multiplier;
        self
    }

    #[must_use]
    pub const fn with_greeks(mut self, greeks: Greeks) -> Self {
        self.greeks = Some(greeks);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Filled,
    PartiallyFilled,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub id: String,
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u32,
    pub price: Decimal,
    pub commission: Decimal,
    /// Per-unit price concession included in `price`.
    pub slippage: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of one submission. Rejections and partials are reports, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReport {
    pub order_id: String,
    pub status: OrderStatus,
    pub fill: Option<Fill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Position touched by the fill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<String>,
}

impl OrderReport {
    #[must_use]
    pub fn filled_quantity(&self) -> u32 {
        self.fill.as_ref().map_or(0, |f| f.quantity)
    }

    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.status == OrderStatus::Rejected
    }
}

/// Submitted order with its report, kept for history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order: Order,
    pub report: OrderReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Partial,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    ExitRule,
    Manual,
    KillSwitch,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::StopLoss => "STOP_LOSS",
            Self::TakeProfit => "TAKE_PROFIT",
            Self::ExitRule => "EXIT_RULE",
            Self::Manual => "MANUAL",
            Self::KillSwitch => "KILL_SWITCH",
        };
        f.write_str(label)
    }
}

/// Simulated position. Quantity is signed: positive long, negative short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperPosition {
    pub id: String,
    pub symbol: String,
    pub strategy: String,
    pub quantity: i64,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub multiplier: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub greeks: Option<Greeks>,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    /// Units closed so far, for the R-multiple.
    pub closed_quantity: u32,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub exit_price: Option<Decimal>,
    pub exit_reason: Option<ExitReason>,
    pub r_multiple: Option<Decimal>,
    pub duration_minutes: Option<i64>,
}

impl PaperPosition {
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !matches!(self.status, PositionStatus::Closed)
    }

    #[must_use]
    pub const fn is_long(&self) -> bool {
        self.quantity > 0
    }

    #[must_use]
    pub fn abs_quantity(&self) -> u32 {
        u32::try_from(self.quantity.unsigned_abs()).unwrap_or(u32::MAX)
    }

    /// Entry notional, `|qty| * entry * multiplier`.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        Decimal::from(self.quantity.unsigned_abs()) * self.entry_price * self.multiplier
    }

    /// Signed market value at the current mark.
    #[must_use]
    pub fn market_value(&self) -> Decimal {
        Decimal::from(self.quantity) * self.current_price * self.multiplier
    }

    /// Marks the position and refreshes unrealised P&L.
    pub fn mark(&mut self, price: Decimal) {
        self.current_price = price;
        self.unrealized_pnl =
            (price - self.entry_price) * Decimal::from(self.quantity) * self.multiplier;
    }

    /// Stop or target crossed at `price`, stop first.
    #[must_use]
    pub fn bracket_hit(&self, price: Decimal) -> Option<ExitReason> {
        let long = self.is_long();
        if let Some(stop) = self.stop_loss {
            if (long && price <= stop) || (!long && price >= stop) {
                return Some(ExitReason::StopLoss);
            }
        }
        if let Some(target) = self.take_profit {
            if (long && price >= target) || (!long && price <= target) {
                return Some(ExitReason::TakeProfit);
            }
        }
        None
    }

    /// Entry-to-stop distance per unit, when a stop is set.
    #[must_use]
    pub fn initial_risk(&self) -> Option<Decimal> {
        self.stop_loss
            .map(|stop| (self.entry_price - stop).abs())
            .filter(|risk| !risk.is_zero())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountSummary {
    pub cash: Decimal,
    pub positions_value: Decimal,
    pub equity: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    /// Twice equity.
    pub buying_power: Decimal,
    pub open_positions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn position(quantity: i64) -> PaperPosition {
        PaperPosition {
            id: "p1".to_string(),
            symbol: "AAPL".to_string(),
            strategy: DIRECTIONAL.to_string(),
            quantity,
            entry_price: dec!(100),
            current_price: dec!(100),
            multiplier: Decimal::ONE,
            stop_loss: Some(if quantity > 0 { dec!(95) } else { dec!(105) }),
            take_profit: Some(if quantity > 0 { dec!(110) } else { dec!(90) }),
            greeks: None,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            closed_quantity: 0,
            status: PositionStatus::Open,
            opened_at: Utc.with_ymd_and_hms(2025, 1, 14, 15, 0, 0).unwrap(),
            closed_at: None,
            exit_price: None,
            exit_reason: None,
            r_multiple: None,
            duration_minutes: None,
        }
    }

    #[test]
    fn test_bracket_long() {
        let long = position(10);
        assert_eq!(long.bracket_hit(dec!(94.5)), Some(ExitReason::StopLoss));
        assert_eq!(long.bracket_hit(dec!(110)), Some(ExitReason::TakeProfit));
        assert_eq!(long.bracket_hit(dec!(101)), None);
    }

    #[test]
    fn test_bracket_short() {
        let short = position(-10);
        assert_eq!(short.bracket_hit(dec!(105)), Some(ExitReason::StopLoss));
        assert_eq!(short.bracket_hit(dec!(89)), Some(ExitReason::TakeProfit));
        assert_eq!(short.bracket_hit(dec!(99)), None);
    }

    #[test]
    fn test_short_mark_pnl_and_value() {
        let mut short = position(-10);
        short.mark(dec!(97));
        assert_eq!(short.unrealized_pnl, dec!(30));
        assert_eq!(short.market_value(), dec!(-970));
        assert_eq!(short.notional(), dec!(1000));
        assert_eq!(short.initial_risk(), Some(dec!(5)));
    }
}
