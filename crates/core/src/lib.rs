pub mod config;
pub mod config_loader;
pub mod config_watcher;
pub mod decision;
pub mod error;
pub mod market;
pub mod retry;
pub mod signal;
pub mod static_provider;
pub mod timeframe;
pub mod traits;

pub use config::{
    AccountConfig, AppConfig, CooldownConfig, DuplicateConfig, OrchestratorConfig, PaperConfig,
    PortfolioLimits, RunMode, SlippageModel, VolatilityConfig,
};
pub use config_loader::ConfigLoader;
pub use config_watcher::ConfigWatcher;
pub use decision::{
    Decision, DecisionOutcome, GateResult, RiskCalculation, ScoreBreakdown, SignalRoles, TradeMode,
};
pub use error::{ProviderError, ValidationError};
pub use market::{Greeks, OptionQuote, OptionType, OptionsChain, StrikeRow, CONTRACT_MULTIPLIER};
pub use retry::{retry_with_backoff, RetryConfig};
pub use signal::{Direction, Signal, SignalFamily, SignalTag};
pub use static_provider::StaticMarketData;
pub use timeframe::{classify, Band, Regime, TimeframeConfig};
pub use traits::{iv_rank_or_neutral, MarketDataProvider, NEUTRAL_IV_RANK};
