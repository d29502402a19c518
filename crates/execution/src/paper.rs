//! Paper-trading venue.
//!
//! Every state change is caused by a submission. A submission waits the
//! configured fill delay, may be rejected, may partially fill, and then
//! updates an in-memory position book and cash ledger. Closing a position
//! sends an offsetting market order through the same path.

use crate::error::ExecutionError;
use crate::slippage::{partial_quantity, slippage_per_unit};
use crate::types::{
    AccountSummary, ExitReason, Fill, Order, OrderRecord, OrderReport, OrderSide, OrderStatus,
    OrderType, PaperPosition, PositionStatus,
};
use crate::venue::ExecutionVenue;
use algo_trade_core::{Greeks, MarketDataProvider, PaperConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const REJECT_REASON: &str = "Order rejected by simulated venue";

/// Random draws for one submission, taken together so the RNG lock is
/// never held across an await.
#[derive(Debug, Clone, Copy)]
struct Draws {
    reject: f64,
    partial: f64,
    fraction: f64,
}

#[derive(Debug, Default)]
struct Ledger {
    cash: Decimal,
    marks: HashMap<String, Decimal>,
    open: HashMap<String, PaperPosition>,
    closed: Vec<PaperPosition>,
    orders: Vec<OrderRecord>,
    fills: Vec<Fill>,
}

impl Ledger {
    fn open_position_for(&self, symbol: &str, strategy: &str) -> Option<String> {
        self.open
            .values()
            .find(|p| p.symbol == symbol && p.strategy == strategy)
            .map(|p| p.id.clone())
    }

    /// Applies a fill and returns the touched position id.
    ///
    /// Reductions are capped at the open size, so a fill never flips a
    /// position through zero.
    fn apply(
        &mut self,
        order: &Order,
        price: Decimal,
        slippage: Decimal,
        requested: u32,
        commission_per_unit: Decimal,
        exit_reason: Option<ExitReason>,
    ) -> (Fill, String) {
        let at = order.created_at;
        let side_sign = order.side.sign();
        let existing = self.open_position_for(&order.symbol, &order.strategy);

        let reducing = existing
            .as_ref()
            .and_then(|id| self.open.get(id))
            .filter(|p| p.quantity.signum() != side_sign);
        let quantity = reducing.map_or(requested, |p| requested.min(p.abs_quantity()));

        let commission = commission_per_unit * Decimal::from(quantity);
        let gross = Decimal::from(quantity) * price * order.multiplier;
        match order.side {
            OrderSide::Buy => self.cash -= gross + commission,
            OrderSide::Sell => self.cash += gross - commission,
        }

        let fill = Fill {
            id: uuid::Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity,
            price,
            commission,
            slippage,
            timestamp: at,
        };
        self.fills.push(fill.clone());
        self.marks.insert(order.symbol.clone(), price);

        let position_id = match existing {
            None => {
                let position = open_position(order, &fill);
                let id = position.id.clone();
                self.open.insert(id.clone(), position);
                id
            }
            Some(id) => {
                if let Some(position) = self.open.get_mut(&id) {
                    if position.quantity.signum() == side_sign {
                        add_to(position, order, &fill);
                    } else {
                        reduce(position, &fill, exit_reason.unwrap_or(ExitReason::Manual));
                    }
                }
                if let Some(position) = self.open.remove(&id) {
                    if position.is_open() {
                        self.open.insert(id.clone(), position);
                    } else {
                        self.closed.push(position);
                    }
                }
                id
            }
        };

        (fill, position_id)
    }
}

fn open_position(order: &Order, fill: &Fill) -> PaperPosition {
    let quantity = order.side.sign() * i64::from(fill.quantity);
    let mut position = PaperPosition {
        id: uuid::Uuid::new_v4().to_string(),
        symbol: order.symbol.clone(),
        strategy: order.strategy.clone(),
        quantity,
        entry_price: fill.price,
        current_price: fill.price,
        multiplier: order.multiplier,
        stop_loss: order.stop_loss,
        take_profit: order.take_profit,
        greeks: filled_greeks(order, fill),
        unrealized_pnl: Decimal::ZERO,
        realized_pnl: Decimal::ZERO,
        closed_quantity: 0,
        status: PositionStatus::Open,
        opened_at: fill.timestamp,
        closed_at: None,
        exit_price: None,
        exit_reason: None,
        r_multiple: None,
        duration_minutes: None,
    };
    position.mark(fill.price);
    position
}

/// Order Greeks cover the requested size; a partial fill carries its share.
fn filled_greeks(order: &Order, fill: &Fill) -> Option<Greeks> {
    let greeks = order.greeks?;
    if fill.quantity == order.quantity || order.quantity == 0 {
        return Some(greeks);
    }
    Some(greeks.scaled(Decimal::from(fill.quantity) / Decimal::from(order.quantity)))
}

fn add_to(position: &mut PaperPosition, order: &Order, fill: &Fill) {
    let held = Decimal::from(position.quantity.unsigned_abs());
    let added = Decimal::from(fill.quantity);
    position.entry_price = (position.entry_price * held + fill.price * added) / (held + added);
    position.quantity += order.side.sign() * i64::from(fill.quantity);
    if let Some(greeks) = filled_greeks(order, fill) {
        position.greeks = Some(position.greeks.map_or(greeks, |g| g + greeks));
    }
    position.mark(fill.price);
}

fn reduce(position: &mut PaperPosition, fill: &Fill, reason: ExitReason) {
    let before = position.quantity;
    let closed = i64::from(fill.quantity);
    let direction = Decimal::from(before.signum());

    let pnl = (fill.price - position.entry_price)
        * Decimal::from(fill.quantity)
        * position.multiplier
        * direction
        - fill.commission;
    position.realized_pnl += pnl;
    position.closed_quantity += fill.quantity;
    position.quantity -= before.signum() * closed;

    if let Some(greeks) = position.greeks {
        let remaining = Decimal::from(position.quantity.unsigned_abs())
            / Decimal::from(before.unsigned_abs());
        position.greeks = Some(greeks.scaled(remaining));
    }
    position.mark(fill.price);

    if position.quantity == 0 {
        position.status = PositionStatus::Closed;
        position.closed_at = Some(fill.timestamp);
        position.exit_price = Some(fill.price);
        position.exit_reason = Some(reason);
        position.unrealized_pnl = Decimal::ZERO;
        position.duration_minutes = Some((fill.timestamp - position.opened_at).num_minutes());
        position.r_multiple = position.initial_risk().map(|risk| {
            let risked = risk * Decimal::from(position.closed_quantity) * position.multiplier;
            (position.realized_pnl / risked).round_dp(2)
        });
    } else {
        position.status = PositionStatus::Partial;
    }
}

/// In-memory execution simulator.
pub struct PaperExecutor {
    config: PaperConfig,
    prices: Arc<dyn MarketDataProvider>,
    rng: Mutex<ChaCha8Rng>,
    ledger: RwLock<Ledger>,
}

impl PaperExecutor {
    #[must_use]
    pub fn new(config: PaperConfig, prices: Arc<dyn MarketDataProvider>) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let ledger = Ledger {
            cash: config.account_size,
            ..Ledger::default()
        };
        Self {
            config,
            prices,
            rng: Mutex::new(rng),
            ledger: RwLock::new(ledger),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &PaperConfig {
        &self.config
    }

    /// Records a price for `symbol` and re-marks its open positions.
    ///
    /// Marks take precedence over the market data provider for market
    /// orders, which is how option structures get priced.
    pub fn mark(&self, symbol: &str, price: Decimal) {
        let mut ledger = self.ledger.write();
        ledger.marks.insert(symbol.to_string(), price);
        for position in ledger.open.values_mut().filter(|p| p.symbol == symbol) {
            position.mark(price);
        }
    }

    #[must_use]
    pub fn position(&self, id: &str) -> Option<PaperPosition> {
        let ledger = self.ledger.read();
        ledger
            .open
            .get(id)
            .cloned()
            .or_else(|| ledger.closed.iter().find(|p| p.id == id).cloned())
    }

    #[must_use]
    pub fn closed_positions(&self) -> Vec<PaperPosition> {
        self.ledger.read().closed.clone()
    }

    #[must_use]
    pub fn fills(&self) -> Vec<Fill> {
        self.ledger.read().fills.clone()
    }

    fn draws(&self) -> Draws {
        let mut rng = self.rng.lock();
        Draws {
            reject: rng.gen::<f64>(),
            partial: rng.gen::<f64>(),
            fraction: rng.gen::<f64>(),
        }
    }

    async fn reference_price(&self, order: &Order) -> Result<Decimal, ExecutionError> {
        if order.order_type == OrderType::Limit {
            return order
                .limit_price
                .ok_or_else(|| ExecutionError::InvalidOrder("limit order without price".to_string()));
        }
        let marked = self.ledger.read().marks.get(&order.symbol).copied();
        match marked {
            Some(price) => Ok(price),
            None => self
                .prices
                .current_price(&order.symbol)
                .await
                .map_err(|source| ExecutionError::Price {
                    symbol: order.symbol.clone(),
                    source,
                }),
        }
    }

    fn validate(order: &Order) -> Result<(), ExecutionError> {
        if order.quantity == 0 {
            return Err(ExecutionError::InvalidOrder("quantity must be positive".to_string()));
        }
        if order.multiplier <= Decimal::ZERO {
            return Err(ExecutionError::InvalidOrder("multiplier must be positive".to_string()));
        }
        if let Some(price) = order.limit_price {
            if price <= Decimal::ZERO {
                return Err(ExecutionError::InvalidOrder(format!(
                    "limit price {price} must be positive"
                )));
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        order: Order,
        exit_reason: Option<ExitReason>,
    ) -> Result<OrderReport, ExecutionError> {
        Self::validate(&order)?;

        if self.config.fill_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.fill_delay_ms)).await;
        }

        let draws = self.draws();
        if draws.reject < self.config.reject_probability {
            tracing::warn!(
                order_id = %order.id,
                symbol = %order.symbol,
                side = %order.side,
                quantity = order.quantity,
                "Paper order rejected"
            );
            let report = OrderReport {
                order_id: order.id.clone(),
                status: OrderStatus::Rejected,
                fill: None,
                reason: Some(REJECT_REASON.to_string()),
                position_id: None,
            };
            self.ledger.write().orders.push(OrderRecord {
                order,
                report: report.clone(),
            });
            return Ok(report);
        }

        let reference = self.reference_price(&order).await?;
        let slippage = match order.order_type {
            OrderType::Market => slippage_per_unit(
                self.config.slippage_model,
                self.config.slippage_bps,
                reference,
                order.quantity,
            ),
            OrderType::Limit => Decimal::ZERO,
        };
        let price = reference + Decimal::from(order.side.sign()) * slippage;

        let requested = if draws.partial < self.config.partial_fill_probability {
            partial_quantity(order.quantity, draws.fraction)
        } else {
            order.quantity
        };

        let mut ledger = self.ledger.write();
        let (fill, position_id) = ledger.apply(
            &order,
            price,
            slippage,
            requested,
            self.config.commission_per_unit,
            exit_reason,
        );
        let status = if fill.quantity < order.quantity {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::Filled
        };

        tracing::info!(
            order_id = %order.id,
            symbol = %order.symbol,
            side = %order.side,
            quantity = fill.quantity,
            requested = order.quantity,
            price = %fill.price,
            status = ?status,
            "Paper order filled"
        );

        let report = OrderReport {
            order_id: order.id.clone(),
            status,
            fill: Some(fill),
            reason: None,
            position_id: Some(position_id),
        };
        ledger.orders.push(OrderRecord {
            order,
            report: report.clone(),
        });
        Ok(report)
    }

    /// Bracket pass behind the venue's `monitor_positions`.
    ///
    /// A failed or rejected close leaves the position open for the next pass.
    async fn check_brackets(
        &self,
        prices: &HashMap<String, Decimal>,
        at: DateTime<Utc>,
    ) -> Vec<PaperPosition> {
        let hits: Vec<(String, ExitReason)> = {
            let mut ledger = self.ledger.write();
            for (symbol, price) in prices {
                ledger.marks.insert(symbol.clone(), *price);
            }
            ledger
                .open
                .values_mut()
                .filter_map(|position| {
                    let price = *prices.get(&position.symbol)?;
                    position.mark(price);
                    position.bracket_hit(price).map(|r| (position.id.clone(), r))
                })
                .collect()
        };

        let mut closed = Vec::new();
        for (id, reason) in hits {
            match self.close_position(&id, reason, at).await {
                Ok(report) if report.is_rejected() => {
                    tracing::warn!(position_id = %id, reason = %reason, "Bracket close rejected, retrying next pass");
                }
                Ok(_) => {
                    if let Some(position) = self.position(&id).filter(|p| !p.is_open()) {
                        tracing::info!(
                            position_id = %id,
                            symbol = %position.symbol,
                            reason = %reason,
                            pnl = %position.realized_pnl,
                            "Position closed by bracket"
                        );
                        closed.push(position);
                    }
                }
                Err(e) => {
                    tracing::warn!(position_id = %id, error = %e, "Bracket close failed");
                }
            }
        }
        closed
    }
}

impl fmt::Debug for PaperExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ledger = self.ledger.read();
        f.debug_struct("PaperExecutor")
            .field("config", &self.config)
            .field("cash", &ledger.cash)
            .field("open_positions", &ledger.open.len())
            .field("orders", &ledger.orders.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ExecutionVenue for PaperExecutor {
    async fn submit_order(&self, order: Order) -> Result<OrderReport, ExecutionError> {
        self.execute(order, None).await
    }

    async fn close_position(
        &self,
        position_id: &str,
        reason: ExitReason,
        at: DateTime<Utc>,
    ) -> Result<OrderReport, ExecutionError> {
        let order = {
            let ledger = self.ledger.read();
            let Some(position) = ledger.open.get(position_id) else {
                if ledger.closed.iter().any(|p| p.id == position_id) {
                    return Err(ExecutionError::PositionClosed(position_id.to_string()));
                }
                return Err(ExecutionError::PositionNotFound(position_id.to_string()));
            };
            let side = if position.is_long() {
                OrderSide::Sell
            } else {
                OrderSide::Buy
            };
            Order::market(position.symbol.clone(), side, position.abs_quantity(), at)
                .with_strategy(position.strategy.clone())
                .with_multiplier(position.multiplier)
        };
        self.execute(order, Some(reason)).await
    }

    async fn monitor_positions(
        &self,
        prices: &HashMap<String, Decimal>,
        at: DateTime<Utc>,
    ) -> Vec<PaperPosition> {
        self.check_brackets(prices, at).await
    }

    async fn get_positions(&self) -> Vec<PaperPosition> {
        let mut positions: Vec<_> = self.ledger.read().open.values().cloned().collect();
        positions.sort_by_key(|p| p.opened_at);
        positions
    }

    async fn get_position(&self, position_id: &str) -> Option<PaperPosition> {
        self.position(position_id)
    }

    async fn get_orders(&self) -> Vec<OrderRecord> {
        self.ledger.read().orders.clone()
    }

    async fn account_summary(&self) -> AccountSummary {
        let ledger = self.ledger.read();
        let positions_value: Decimal = ledger.open.values().map(PaperPosition::market_value).sum();
        let unrealized_pnl: Decimal = ledger.open.values().map(|p| p.unrealized_pnl).sum();
        let realized_pnl: Decimal = ledger
            .open
            .values()
            .chain(ledger.closed.iter())
            .map(|p| p.realized_pnl)
            .sum();
        let equity = ledger.cash + positions_value;
        AccountSummary {
            cash: ledger.cash,
            positions_value,
            equity,
            unrealized_pnl,
            realized_pnl,
            buying_power: equity * Decimal::TWO,
            open_positions: ledger.open.len(),
        }
    }
}
