use crate::error::ExecutionError;
use crate::types::{AccountSummary, ExitReason, Order, OrderRecord, OrderReport, PaperPosition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Where orders go. The orchestrator only talks to this seam.
#[async_trait]
pub trait ExecutionVenue: Send + Sync {
    /// Submits an order. A rejection is an `Ok` report with status REJECTED.
    ///
    /// # Errors
    /// Malformed orders and missing prices.
    async fn submit_order(&self, order: Order) -> Result<OrderReport, ExecutionError>;

    /// Offsets the full remaining quantity of a position.
    ///
    /// # Errors
    /// Unknown or closed positions, missing prices.
    async fn close_position(
        &self,
        position_id: &str,
        reason: ExitReason,
        at: DateTime<Utc>,
    ) -> Result<OrderReport, ExecutionError>;

    /// Marks open positions at `prices` and closes any whose stop or target
    /// was crossed. Returns the positions that closed.
    async fn monitor_positions(
        &self,
        prices: &HashMap<String, Decimal>,
        at: DateTime<Utc>,
    ) -> Vec<PaperPosition>;

    /// Open positions, oldest first.
    async fn get_positions(&self) -> Vec<PaperPosition>;

    /// Any position by id, open or closed.
    async fn get_position(&self, position_id: &str) -> Option<PaperPosition>;

    async fn get_orders(&self) -> Vec<OrderRecord>;

    async fn account_summary(&self) -> AccountSummary;
}
