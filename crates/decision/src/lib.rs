//! Signal evaluation for the trading pipeline.
//!
//! [`GateEngine`] and [`OptionsGateEngine`] turn a [`Signal`] into a
//! [`Decision`] without touching session state. The guards in [`guards`],
//! [`cooldown`], [`duplicate`] and [`volatility`] run afterwards against the
//! live session.
//!
//! [`Signal`]: algo_trade_core::Signal
//! [`Decision`]: algo_trade_core::Decision

pub mod cooldown;
pub mod duplicate;
pub mod gates;
pub mod guards;
pub mod options_gates;
pub mod scorer;
pub mod session;
pub mod volatility;

pub use cooldown::{CooldownGuard, CooldownStore, InMemoryCooldownStore};
pub use duplicate::DuplicateDetector;
pub use gates::GateEngine;
pub use guards::{
    format_usd, DailyLimitGuard, DailyRecord, ExposureSnapshot, GuardOutcome, PositionLimitGuard,
};
pub use options_gates::{
    validate_options, OptionsDecision, OptionsGateEngine, OptionsGateInput, Screening,
};
pub use scorer::{assign_roles, risk_reward, roles_confirmed, score, trade_mode};
pub use session::{in_session, trading_date, SessionWindow};
pub use volatility::{VolatilityCheck, VolatilityGuard};
