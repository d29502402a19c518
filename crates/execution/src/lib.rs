//! Order execution for the signal desk.
//!
//! [`ExecutionVenue`] is the seam the orchestrator submits through.
//! [`PaperExecutor`] is the only venue: a simulator with fill latency,
//! random rejections and partial fills, slippage and commission.

pub mod error;
pub mod paper;
pub mod slippage;
pub mod types;
pub mod venue;

pub use error::ExecutionError;
pub use paper::{PaperExecutor, REJECT_REASON};
pub use slippage::{partial_quantity, slippage_per_unit};
pub use types::{
    AccountSummary, ExitReason, Fill, Order, OrderRecord, OrderReport, OrderSide, OrderStatus,
    OrderType, PaperPosition, PositionStatus, DIRECTIONAL,
};
pub use venue::ExecutionVenue;
