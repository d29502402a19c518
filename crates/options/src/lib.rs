//! Options planning for the signal desk.
//!
//! Everything here is pure: strategy choice, strike search over a chain
//! snapshot, Greeks-aware sizing, portfolio Greeks limits, exit rules and
//! event-calendar review. Market data is fetched by the caller.

pub mod calendar;
pub mod exits;
pub mod legs;
pub mod portfolio;
pub mod sizing;
pub mod strategy;
pub mod strikes;

pub use calendar::{adjust_for_events, EventAdjustment, EventCalendar, IvImpact, MarketEvent, MarketEventKind};
pub use exits::{check_exit_rules, generate_exit_rules, ExitAction, ExitRule, ExitSnapshot, ExitTrigger};
pub use legs::{OptionLeg, StrategyPlan};
pub use portfolio::{PortfolioCheck, PortfolioGreeks, PortfolioGreeksGuard};
pub use sizing::{PositionSizer, PositionSizing, SizingCeilings, SizingLimits};
pub use strategy::{select_strategy, Conviction, IvRegime, OptionStrategy};
pub use strikes::{
    liquidity_score, requested_expiration, select_strikes, LiquidityScreen, SelectedLeg,
    StrikeCriteria, StrikeSelection, StrikeSelectionError,
};
