//! Symbol, signal-type and global cooldowns.
//!
//! Cooldowns are expiry timestamps held in a [`CooldownStore`]. Expired
//! entries are dropped on read. Store failures degrade to an admitted trade
//! and are reported as [`GuardOutcome::Degraded`].

use crate::guards::GuardOutcome;
use algo_trade_core::{CooldownConfig, ProviderError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub const GLOBAL_KEY: &str = "cooldown:global";

#[must_use]
pub fn symbol_key(symbol: &str) -> String {
    format!("cooldown:symbol:{symbol}")
}

#[must_use]
pub fn signal_type_key(signal_type: &str) -> String {
    format!("cooldown:signal_type:{signal_type}")
}

/// Persistence for cooldown expiries and the recent-trade log.
#[async_trait]
pub trait CooldownStore: Send + Sync {
    async fn expiry(&self, key: &str) -> Result<Option<DateTime<Utc>>, ProviderError>;

    async fn set_expiry(&self, key: &str, expires_at: DateTime<Utc>) -> Result<(), ProviderError>;

    async fn remove(&self, key: &str) -> Result<(), ProviderError>;

    /// Trades executed at or after `since`.
    async fn trades_since(&self, since: DateTime<Utc>) -> Result<usize, ProviderError>;

    /// Logs a trade at `at`. Trades before `keep_since` may be dropped.
    async fn record_trade(
        &self,
        at: DateTime<Utc>,
        keep_since: DateTime<Utc>,
    ) -> Result<(), ProviderError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryCooldownStore {
    expiries: RwLock<HashMap<String, DateTime<Utc>>>,
    trades: RwLock<Vec<DateTime<Utc>>>,
}

impl InMemoryCooldownStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.expiries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expiries.read().is_empty()
    }

    /// Trades currently held in the recent-trade log.
    #[must_use]
    pub fn trade_count(&self) -> usize {
        self.trades.read().len()
    }
}

#[async_trait]
impl CooldownStore for InMemoryCooldownStore {
    async fn expiry(&self, key: &str) -> Result<Option<DateTime<Utc>>, ProviderError> {
        Ok(self.expiries.read().get(key).copied())
    }

    async fn set_expiry(&self, key: &str, expires_at: DateTime<Utc>) -> Result<(), ProviderError> {
        self.expiries.write().insert(key.to_string(), expires_at);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), ProviderError> {
        self.expiries.write().remove(key);
        Ok(())
    }

    async fn trades_since(&self, since: DateTime<Utc>) -> Result<usize, ProviderError> {
        Ok(self.trades.read().iter().filter(|t| **t >= since).count())
    }

    async fn record_trade(
        &self,
        at: DateTime<Utc>,
        keep_since: DateTime<Utc>,
    ) -> Result<(), ProviderError> {
        let mut trades = self.trades.write();
        trades.retain(|t| *t >= keep_since);
        trades.push(at);
        Ok(())
    }
}

/// Whole minutes left, rounded up.
fn minutes_left(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (expires_at - now).num_seconds().max(0);
    (seconds + 59) / 60
}

pub struct CooldownGuard {
    store: Arc<dyn CooldownStore>,
    config: CooldownConfig,
}

impl CooldownGuard {
    #[must_use]
    pub fn new(store: Arc<dyn CooldownStore>, config: CooldownConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub const fn config(&self) -> &CooldownConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: CooldownConfig) {
        self.config = config;
    }

    /// Live expiry for `key`. Expired entries are removed.
    async fn active(&self, key: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ProviderError> {
        match self.store.expiry(key).await? {
            Some(expires_at) if expires_at > now => Ok(Some(expires_at)),
            Some(_) => {
                self.store.remove(key).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub async fn check_symbol(&self, symbol: &str, now: DateTime<Utc>) -> GuardOutcome {
        match self.active(&symbol_key(symbol), now).await {
            Ok(Some(expires_at)) => GuardOutcome::blocked(format!(
                "Symbol {symbol} is in cooldown for {} more minutes",
                minutes_left(expires_at, now)
            )),
            Ok(None) => GuardOutcome::Allowed,
            Err(e) => degraded("symbol", &e),
        }
    }

    pub async fn check_signal_type(&self, signal_type: &str, now: DateTime<Utc>) -> GuardOutcome {
        match self.active(&signal_type_key(signal_type), now).await {
            Ok(Some(expires_at)) => GuardOutcome::blocked(format!(
                "Signal type {signal_type} is in cooldown for {} more minutes",
                minutes_left(expires_at, now)
            )),
            Ok(None) => GuardOutcome::Allowed,
            Err(e) => degraded("signal type", &e),
        }
    }

    /// Starts or reports the global cooldown once recent trades reach the
    /// configured threshold.
    pub async fn check_global(&self, now: DateTime<Utc>) -> GuardOutcome {
        match self.global(now).await {
            Ok(outcome) => outcome,
            Err(e) => degraded("global", &e),
        }
    }

    async fn global(&self, now: DateTime<Utc>) -> Result<GuardOutcome, ProviderError> {
        let since = now - Duration::minutes(self.config.global_window_minutes);
        let recent = self.store.trades_since(since).await?;
        if recent < self.config.global_trade_threshold {
            return Ok(GuardOutcome::Allowed);
        }

        if let Some(expires_at) = self.active(GLOBAL_KEY, now).await? {
            return Ok(GuardOutcome::blocked(format!(
                "Global cooldown active for {} more minutes ({recent} recent trades)",
                minutes_left(expires_at, now)
            )));
        }

        let expires_at = now + Duration::minutes(self.config.global_minutes);
        self.store.set_expiry(GLOBAL_KEY, expires_at).await?;
        tracing::info!(recent, expires_at = %expires_at, "Global cooldown started");
        Ok(GuardOutcome::blocked(format!(
            "Global cooldown started ({recent} recent trades)"
        )))
    }

    /// Symbol, then signal type, then global. The first block wins; a
    /// degraded check is reported only when nothing blocks.
    pub async fn check_all(&self, symbol: &str, signal_type: &str, now: DateTime<Utc>) -> GuardOutcome {
        let mut degraded = None;

        let outcome = self.check_symbol(symbol, now).await;
        if let Some(blocked) = settle(outcome, &mut degraded) {
            return blocked;
        }
        let outcome = self.check_signal_type(signal_type, now).await;
        if let Some(blocked) = settle(outcome, &mut degraded) {
            return blocked;
        }
        let outcome = self.check_global(now).await;
        if let Some(blocked) = settle(outcome, &mut degraded) {
            return blocked;
        }

        degraded.unwrap_or(GuardOutcome::Allowed)
    }

    /// Starts the symbol and signal-type cooldowns and logs the trade.
    ///
    /// # Errors
    /// Returns the first store failure. Earlier writes are kept.
    pub async fn record_trade(&self, symbol: &str, signal_type: &str, now: DateTime<Utc>) -> Result<(), ProviderError> {
        self.store
            .set_expiry(&symbol_key(symbol), now + Duration::minutes(self.config.symbol_minutes))
            .await?;
        self.store
            .set_expiry(
                &signal_type_key(signal_type),
                now + Duration::minutes(self.config.signal_type_minutes),
            )
            .await?;
        let keep_since = now - Duration::minutes(self.config.global_window_minutes);
        self.store.record_trade(now, keep_since).await
    }
}

/// Returns a block for early exit and remembers the first degradation.
fn settle(outcome: GuardOutcome, degraded: &mut Option<GuardOutcome>) -> Option<GuardOutcome> {
    match outcome {
        GuardOutcome::Blocked { .. } => Some(outcome),
        GuardOutcome::Degraded { .. } => {
            degraded.get_or_insert(outcome);
            None
        }
        GuardOutcome::Allowed => None,
    }
}

fn degraded(check: &str, error: &ProviderError) -> GuardOutcome {
    tracing::warn!(check, error = %error, "Cooldown check failed, allowing trade");
    GuardOutcome::degraded(format!("{check} cooldown check unavailable: {error}"))
}

impl std::fmt::Debug for CooldownGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CooldownGuard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 14, 16, 0, 0).unwrap()
    }

    fn guard() -> (Arc<InMemoryCooldownStore>, CooldownGuard) {
        let store = Arc::new(InMemoryCooldownStore::new());
        let guard = CooldownGuard::new(store.clone(), CooldownConfig::default());
        (store, guard)
    }

    /// Store whose every call fails.
    struct BrokenStore;

    #[async_trait]
    impl CooldownStore for BrokenStore {
        async fn expiry(&self, _key: &str) -> Result<Option<DateTime<Utc>>, ProviderError> {
            Err(ProviderError::store("connection refused"))
        }
        async fn set_expiry(&self, _key: &str, _at: DateTime<Utc>) -> Result<(), ProviderError> {
            Err(ProviderError::store("connection refused"))
        }
        async fn remove(&self, _key: &str) -> Result<(), ProviderError> {
            Err(ProviderError::store("connection refused"))
        }
        async fn trades_since(&self, _since: DateTime<Utc>) -> Result<usize, ProviderError> {
            Err(ProviderError::store("connection refused"))
        }
        async fn record_trade(
            &self,
            _at: DateTime<Utc>,
            _keep_since: DateTime<Utc>,
        ) -> Result<(), ProviderError> {
            Err(ProviderError::store("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_symbol_cooldown_after_trade() {
        let (_, guard) = guard();
        guard.record_trade("SPY", "FVG_BOS", now()).await.unwrap();

        let later = now() + Duration::minutes(5);
        assert_eq!(
            guard.check_symbol("SPY", later).await,
            GuardOutcome::blocked("Symbol SPY is in cooldown for 10 more minutes")
        );
        assert_eq!(guard.check_symbol("QQQ", later).await, GuardOutcome::Allowed);
    }

    #[tokio::test]
    async fn test_signal_type_cooldown_rounds_up() {
        let (_, guard) = guard();
        guard.record_trade("SPY", "SWEEP", now()).await.unwrap();

        let later = now() + Duration::seconds(30);
        let outcome = guard.check_signal_type("SWEEP", later).await;
        assert_eq!(
            outcome.reason(),
            Some("Signal type SWEEP is in cooldown for 10 more minutes")
        );
    }

    #[tokio::test]
    async fn test_expired_entries_removed_on_read() {
        let (store, guard) = guard();
        guard.record_trade("SPY", "FVG_BOS", now()).await.unwrap();
        assert_eq!(store.len(), 2);

        let later = now() + Duration::minutes(16);
        assert_eq!(guard.check_symbol("SPY", later).await, GuardOutcome::Allowed);
        assert_eq!(guard.check_signal_type("FVG_BOS", later).await, GuardOutcome::Allowed);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_global_cooldown_after_three_trades() {
        let (_, guard) = guard();
        for (i, symbol) in ["SPY", "QQQ", "IWM"].into_iter().enumerate() {
            let at = now() + Duration::minutes(i as i64);
            guard.record_trade(symbol, symbol, at).await.unwrap();
        }

        let t = now() + Duration::minutes(20);
        assert_eq!(
            guard.check_global(t).await,
            GuardOutcome::blocked("Global cooldown started (3 recent trades)")
        );
        let outcome = guard.check_global(t + Duration::minutes(10)).await;
        assert_eq!(
            outcome.reason(),
            Some("Global cooldown active for 20 more minutes (3 recent trades)")
        );

        // Trades age out of the window.
        assert_eq!(guard.check_global(now() + Duration::minutes(90)).await, GuardOutcome::Allowed);
    }

    #[tokio::test]
    async fn test_trade_log_drops_trades_outside_window() {
        let (store, guard) = guard();
        for hour in 0..24 {
            let at = now() + Duration::hours(hour);
            guard.record_trade("SPY", "FVG_BOS", at).await.unwrap();
        }
        // 60-minute window: only the previous hour's trade and the latest survive.
        assert_eq!(store.trade_count(), 2);

        let last = now() + Duration::hours(23);
        assert_eq!(store.trades_since(last - Duration::minutes(60)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_check_all_first_block_wins() {
        let (_, guard) = guard();
        guard.record_trade("SPY", "FVG_BOS", now()).await.unwrap();

        let later = now() + Duration::minutes(1);
        let outcome = guard.check_all("SPY", "FVG_BOS", later).await;
        assert!(outcome.reason().unwrap().starts_with("Symbol SPY"));

        let outcome = guard.check_all("QQQ", "FVG_BOS", later).await;
        assert!(outcome.reason().unwrap().starts_with("Signal type FVG_BOS"));

        assert_eq!(guard.check_all("QQQ", "SWEEP", later).await, GuardOutcome::Allowed);
    }

    #[tokio::test]
    async fn test_store_failure_degrades() {
        let guard = CooldownGuard::new(Arc::new(BrokenStore), CooldownConfig::default());
        let outcome = guard.check_all("SPY", "FVG_BOS", now()).await;

        assert!(outcome.is_degraded());
        assert!(outcome.admits());
        assert!(guard.record_trade("SPY", "FVG_BOS", now()).await.is_err());
    }
}
