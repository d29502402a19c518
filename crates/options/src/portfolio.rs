//! Aggregate Greeks across open option positions.

use crate::sizing::PositionSizing;
use algo_trade_core::{Greeks, PortfolioLimits};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Net Greeks across open positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioGreeks {
    pub total: Greeks,
    /// SPY-normalised delta. Equal to raw delta until betas are modelled.
    pub beta_weighted_delta: Decimal,
}

impl PortfolioGreeks {
    /// Sums position-level totals. Recomputed on demand, never mutated in place.
    #[must_use]
    pub fn from_positions<I>(positions: I) -> Self
    where
        I: IntoIterator<Item = Greeks>,
    {
        let total = positions
            .into_iter()
            .fold(Greeks::default(), |acc, g| acc + g);
        Self {
            total,
            beta_weighted_delta: total.delta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioCheck {
    pub approved: bool,
    pub breaches: Vec<String>,
}

/// Checks net Greeks against [`PortfolioLimits`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PortfolioGreeksGuard {
    limits: PortfolioLimits,
}

impl PortfolioGreeksGuard {
    #[must_use]
    pub const fn new(limits: PortfolioLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub const fn limits(&self) -> &PortfolioLimits {
        &self.limits
    }

    /// Checks the book as it stands.
    #[must_use]
    pub fn check(&self, current: &PortfolioGreeks) -> PortfolioCheck {
        self.evaluate(current.total)
    }

    /// Checks the book as it would stand after adding `proposed`.
    #[must_use]
    pub fn check_projected(
        &self,
        current: &PortfolioGreeks,
        proposed: &PositionSizing,
    ) -> PortfolioCheck {
        self.evaluate(current.total + proposed.total_greeks)
    }

    fn evaluate(&self, g: Greeks) -> PortfolioCheck {
        let limits = &self.limits;
        let mut breaches = Vec::new();

        if g.delta.abs() > limits.max_abs_delta {
            breaches.push(format!(
                "Delta limit: {:.0} exceeds ±{}",
                g.delta, limits.max_abs_delta
            ));
        }
        if g.gamma.abs() > limits.max_abs_gamma {
            breaches.push(format!(
                "Gamma limit: {:.0} exceeds ±{}",
                g.gamma, limits.max_abs_gamma
            ));
        }
        if g.theta < -limits.max_negative_theta {
            breaches.push(format!(
                "Theta limit: {:.0} exceeds -{}/day",
                g.theta, limits.max_negative_theta
            ));
        }
        if g.vega.abs() > limits.max_abs_vega {
            breaches.push(format!(
                "Vega limit: {:.0} exceeds ±{}",
                g.vega, limits.max_abs_vega
            ));
        }

        if !breaches.is_empty() {
            tracing::warn!(breaches = ?breaches, "Portfolio Greeks limits breached");
        }

        PortfolioCheck {
            approved: breaches.is_empty(),
            breaches,
        }
    }
}
