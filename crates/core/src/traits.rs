use crate::error::ProviderError;
use crate::market::OptionsChain;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// IV rank reported when the provider cannot compute one.
pub const NEUTRAL_IV_RANK: Decimal = dec!(50);

/// Narrow read-only view of a market-data vendor.
///
/// Every call may fail. Callers decide whether a failure degrades to a
/// neutral value (single-number metrics) or aborts the operation (chains,
/// prices).
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn current_price(&self, symbol: &str) -> Result<Decimal, ProviderError>;

    /// Chain for the nearest expiration on or after `expiration`, or the
    /// nearest listed expiration if `None`.
    async fn options_chain(
        &self,
        symbol: &str,
        expiration: Option<NaiveDate>,
    ) -> Result<OptionsChain, ProviderError>;

    /// IV rank on a 0..100 scale.
    async fn iv_rank(&self, symbol: &str) -> Result<Decimal, ProviderError>;

    async fn vix(&self) -> Result<Decimal, ProviderError>;
}

#[async_trait]
impl<T: MarketDataProvider + ?Sized> MarketDataProvider for Arc<T> {
    async fn current_price(&self, symbol: &str) -> Result<Decimal, ProviderError> {
        (**self).current_price(symbol).await
    }

    async fn options_chain(
        &self,
        symbol: &str,
        expiration: Option<NaiveDate>,
    ) -> Result<OptionsChain, ProviderError> {
        (**self).options_chain(symbol, expiration).await
    }

    async fn iv_rank(&self, symbol: &str) -> Result<Decimal, ProviderError> {
        (**self).iv_rank(symbol).await
    }

    async fn vix(&self) -> Result<Decimal, ProviderError> {
        (**self).vix().await
    }
}

/// IV rank with the neutral fallback applied.
pub async fn iv_rank_or_neutral(provider: &dyn MarketDataProvider, symbol: &str) -> Decimal {
    match provider.iv_rank(symbol).await {
        Ok(rank) => rank,
        Err(e) => {
            tracing::warn!(symbol, error = %e, "IV rank unavailable, using neutral default");
            NEUTRAL_IV_RANK
        }
    }
}
