//! In-memory market data for tests, replays and offline runs.

use crate::error::ProviderError;
use crate::market::OptionsChain;
use crate::traits::MarketDataProvider;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct StaticState {
    prices: HashMap<String, Decimal>,
    chains: HashMap<String, Vec<OptionsChain>>,
    iv_ranks: HashMap<String, Decimal>,
    vix: Option<Decimal>,
}

/// Market data served from fixed tables.
///
/// Missing entries surface as [`ProviderError`]s, so callers exercise the
/// same fallback paths they would against a real vendor.
#[derive(Debug, Default)]
pub struct StaticMarketData {
    state: RwLock<StaticState>,
}

impl StaticMarketData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_price(self, symbol: &str, price: Decimal) -> Self {
        self.set_price(symbol, price);
        self
    }

    #[must_use]
    pub fn with_chain(self, chain: OptionsChain) -> Self {
        self.state
            .write()
            .chains
            .entry(chain.symbol.clone())
            .or_default()
            .push(chain);
        self
    }

    #[must_use]
    pub fn with_iv_rank(self, symbol: &str, rank: Decimal) -> Self {
        self.state.write().iv_ranks.insert(symbol.to_string(), rank);
        self
    }

    #[must_use]
    pub fn with_vix(self, vix: Decimal) -> Self {
        self.state.write().vix = Some(vix);
        self
    }

    /// Updates a price in place, e.g. between monitoring ticks.
    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.state.write().prices.insert(symbol.to_string(), price);
    }
}

#[async_trait]
impl MarketDataProvider for StaticMarketData {
    async fn current_price(&self, symbol: &str) -> Result<Decimal, ProviderError> {
        self.state
            .read()
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| ProviderError::PriceUnavailable {
                symbol: symbol.to_string(),
            })
    }

    async fn options_chain(
        &self,
        symbol: &str,
        expiration: Option<NaiveDate>,
    ) -> Result<OptionsChain, ProviderError> {
        let state = self.state.read();
        let chains = state
            .chains
            .get(symbol)
            .ok_or_else(|| ProviderError::chain(symbol, "no chain loaded"))?;

        // Nearest listed expiration on or after the requested date.
        let chain = match expiration {
            Some(date) => chains
                .iter()
                .filter(|c| c.expiration >= date)
                .min_by_key(|c| c.expiration),
            None => chains.iter().min_by_key(|c| c.expiration),
        };

        chain
            .cloned()
            .ok_or_else(|| ProviderError::chain(symbol, "no matching expiration"))
    }

    async fn iv_rank(&self, symbol: &str) -> Result<Decimal, ProviderError> {
        self.state
            .read()
            .iv_ranks
            .get(symbol)
            .copied()
            .ok_or_else(|| ProviderError::metric("IV rank", format!("no IV history for {symbol}")))
    }

    async fn vix(&self) -> Result<Decimal, ProviderError> {
        self.state
            .read()
            .vix
            .ok_or_else(|| ProviderError::metric("VIX", "no reading loaded"))
    }
}
