//! Market-wide volatility check on the VIX.

use crate::gates::{GATE_SESSION, GATE_VOLATILITY};
use crate::guards::GuardOutcome;
use algo_trade_core::{Decision, GateResult, MarketDataProvider, VolatilityConfig};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolatilityCheck {
    pub vix: Option<Decimal>,
    pub threshold: Decimal,
    pub outcome: GuardOutcome,
}

impl VolatilityCheck {
    /// Records the reading on the session gate and blocks a TRADE when the
    /// VIX is above threshold.
    pub fn annotate(&self, decision: &mut Decision) {
        let detail = match self.vix {
            Some(vix) => format!(
                "VIX {vix:.2} (threshold {}, acceptable: {})",
                self.threshold,
                self.outcome.admits()
            ),
            None => "VIX unavailable".to_string(),
        };
        if let Some(gate) = decision.gate_mut(GATE_SESSION) {
            gate.detail = Some(detail);
        }
        if let GuardOutcome::Blocked { reason } = &self.outcome {
            if decision.is_trade() {
                decision.append_gate(GateResult::fail(GATE_VOLATILITY, reason.clone()));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VolatilityGuard {
    config: VolatilityConfig,
}

impl VolatilityGuard {
    #[must_use]
    pub const fn new(config: VolatilityConfig) -> Self {
        Self { config }
    }

    /// Reads the VIX. A provider failure degrades instead of blocking.
    pub async fn check(&self, provider: &dyn MarketDataProvider) -> VolatilityCheck {
        let threshold = self.config.vix_threshold;
        match provider.vix().await {
            Ok(vix) if vix > threshold => {
                tracing::warn!(vix = %vix, threshold = %threshold, "VIX above threshold");
                VolatilityCheck {
                    vix: Some(vix),
                    threshold,
                    outcome: GuardOutcome::blocked(format!(
                        "VIX too high: {vix:.2} exceeds threshold {threshold}"
                    )),
                }
            }
            Ok(vix) => VolatilityCheck {
                vix: Some(vix),
                threshold,
                outcome: GuardOutcome::Allowed,
            },
            Err(e) => {
                tracing::warn!(error = %e, "VIX unavailable, allowing trade");
                VolatilityCheck {
                    vix: None,
                    threshold,
                    outcome: GuardOutcome::degraded("VIX data unavailable, allowing trade"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::tests::{make_signal, market_open};
    use crate::gates::GateEngine;
    use algo_trade_core::{Regime, StaticMarketData};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_high_vix_blocks_trade() {
        let provider = StaticMarketData::new().with_vix(dec!(34.5));
        let check = VolatilityGuard::default().check(&provider).await;
        assert_eq!(check.outcome.reason(), Some("VIX too high: 34.50 exceeds threshold 30"));

        let mut decision = GateEngine::default().evaluate(&make_signal(), Regime::Swing, market_open());
        check.annotate(&mut decision);
        assert!(!decision.is_trade());
        assert_eq!(decision.gate_results.last().unwrap().gate, GATE_VOLATILITY);
        assert!(decision
            .gate(GATE_SESSION)
            .and_then(|g| g.detail.as_deref())
            .unwrap()
            .starts_with("VIX 34.50"));
    }

    #[tokio::test]
    async fn test_calm_vix_allows() {
        let provider = StaticMarketData::new().with_vix(dec!(14.2));
        let check = VolatilityGuard::default().check(&provider).await;
        assert_eq!(check.outcome, GuardOutcome::Allowed);

        let mut decision = GateEngine::default().evaluate(&make_signal(), Regime::Swing, market_open());
        check.annotate(&mut decision);
        assert!(decision.is_trade());
    }

    #[tokio::test]
    async fn test_missing_vix_degrades() {
        let provider = StaticMarketData::new();
        let check = VolatilityGuard::default().check(&provider).await;
        assert!(check.outcome.is_degraded());
        assert!(check.vix.is_none());
    }
}
