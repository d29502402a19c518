use crate::retry::RetryConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub account: AccountConfig,
    pub orchestrator: OrchestratorConfig,
    pub paper: PaperConfig,
    pub cooldowns: CooldownConfig,
    pub portfolio_limits: PortfolioLimits,
    pub duplicate: DuplicateConfig,
    pub volatility: VolatilityConfig,
    pub retry: RetryConfig,
}

/// Account used for risk budgeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub size: Decimal,
    /// Fraction of the account risked per trade before regime scaling.
    pub risk_percent: Decimal,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            size: dec!(100000),
            risk_percent: dec!(0.01),
        }
    }
}

impl AccountConfig {
    /// Base risk per trade in account currency.
    #[must_use]
    pub fn base_risk(&self) -> Decimal {
        self.size * self.risk_percent
    }
}

/// How the orchestrator acts on TRADE decisions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunMode {
    /// Execute through the paper simulator.
    #[default]
    Paper,
    /// Evaluate and log decisions without executing.
    Shadow,
    /// Real routing. Not supported; start is refused.
    Live,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paper => write!(f, "PAPER"),
            Self::Shadow => write!(f, "SHADOW"),
            Self::Live => write!(f, "LIVE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub enabled: bool,
    pub mode: RunMode,
    pub max_daily_trades: u32,
    /// Positive amount; the session blocks once daily P&L reaches its negative.
    pub max_daily_loss: Decimal,
    /// Per-symbol notional ceiling.
    pub max_position_size: Decimal,
    pub max_total_exposure: Decimal,
    pub max_open_positions: usize,
    pub algorithm_version: String,
    /// Bounded signal queue between producers and the orchestrator.
    pub signal_channel_capacity: usize,
    /// Symbols routed through the options pipeline even without the flag.
    pub options_symbols: Vec<String>,
    /// Seconds between position monitoring ticks while running.
    pub monitor_interval_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: RunMode::Paper,
            max_daily_trades: 5,
            max_daily_loss: dec!(2500),
            max_position_size: dec!(20000),
            max_total_exposure: dec!(50000),
            max_open_positions: 5,
            algorithm_version: "v1.0".to_string(),
            signal_channel_capacity: 100,
            options_symbols: Vec::new(),
            monitor_interval_secs: 60,
        }
    }
}

/// Slippage applied by the paper simulator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlippageModel {
    None,
    /// `price * bps / 10_000`.
    #[default]
    Fixed,
    /// Fixed amount scaled by `min(2, qty / 100)`.
    VolumeBased,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub account_size: Decimal,
    pub slippage_model: SlippageModel,
    pub slippage_bps: Decimal,
    pub fill_delay_ms: u64,
    pub partial_fill_probability: f64,
    pub reject_probability: f64,
    pub commission_per_unit: Decimal,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            account_size: dec!(100000),
            slippage_model: SlippageModel::Fixed,
            slippage_bps: dec!(5),
            fill_delay_ms: 100,
            partial_fill_probability: 0.1,
            reject_probability: 0.05,
            commission_per_unit: dec!(1),
            seed: None,
        }
    }
}

impl PaperConfig {
    /// Deterministic simulator: no delay, no rejects, no partials.
    #[must_use]
    pub fn deterministic() -> Self {
        Self {
            fill_delay_ms: 0,
            partial_fill_probability: 0.0,
            reject_probability: 0.0,
            seed: Some(7),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_reject_probability(mut self, probability: f64) -> Self {
        self.reject_probability = probability;
        self
    }

    #[must_use]
    pub const fn with_partial_fill_probability(mut self, probability: f64) -> Self {
        self.partial_fill_probability = probability;
        self
    }

    #[must_use]
    pub const fn with_slippage(mut self, model: SlippageModel, bps: Decimal) -> Self {
        self.slippage_model = model;
        self.slippage_bps = bps;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    pub symbol_minutes: i64,
    pub signal_type_minutes: i64,
    pub global_minutes: i64,
    /// Trades inside the window that trigger the global cooldown.
    pub global_trade_threshold: usize,
    pub global_window_minutes: i64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            symbol_minutes: 15,
            signal_type_minutes: 10,
            global_minutes: 30,
            global_trade_threshold: 3,
            global_window_minutes: 60,
        }
    }
}

/// Aggregate Greeks ceilings across open option positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioLimits {
    pub max_abs_delta: Decimal,
    pub max_abs_gamma: Decimal,
    /// Largest tolerated daily theta bleed, as a positive number.
    pub max_negative_theta: Decimal,
    pub max_abs_vega: Decimal,
}

impl Default for PortfolioLimits {
    fn default() -> Self {
        Self {
            max_abs_delta: dec!(1000),
            max_abs_gamma: dec!(500),
            max_negative_theta: dec!(500),
            max_abs_vega: dec!(2000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateConfig {
    pub window_secs: i64,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self { window_secs: 60 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityConfig {
    pub vix_threshold: Decimal,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            vix_threshold: dec!(30),
        }
    }
}
