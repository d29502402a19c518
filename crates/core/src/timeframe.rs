//! Holding-period regimes and their threshold bundles.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Holding-period regime a signal is evaluated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Regime {
    Intraday,
    Swing,
    Monthly,
    Leaps,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Intraday => "INTRADAY",
            Self::Swing => "SWING",
            Self::Monthly => "MONTHLY",
            Self::Leaps => "LEAPS",
        };
        f.write_str(name)
    }
}

/// Closed numeric interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub min: Decimal,
    pub max: Decimal,
}

impl Band {
    #[must_use]
    pub const fn new(min: Decimal, max: Decimal) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn contains(&self, value: Decimal) -> bool {
        value >= self.min && value <= self.max
    }

    #[must_use]
    pub fn midpoint(&self) -> Decimal {
        (self.min + self.max) / dec!(2)
    }
}

/// Regime-specific thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeConfig {
    pub regime: Regime,
    /// Acceptable days to expiration.
    pub target_dte: Band,
    /// Max daily theta burn as a fraction of option price.
    pub theta_tolerance: Decimal,
    pub min_risk_reward: Decimal,
    pub risk_multiplier: Decimal,
    /// Expected holding period in hours.
    pub holding_hours: Band,
    pub iv_rank: Band,
    /// Minimum factorization score.
    pub score_threshold: Decimal,
    /// Acceptable absolute delta for the primary leg.
    pub delta: Band,
}

impl Regime {
    /// Threshold bundle for this regime.
    #[must_use]
    pub fn config(self) -> TimeframeConfig {
        match self {
            Self::Intraday => TimeframeConfig {
                regime: self,
                target_dte: Band::new(dec!(0), dec!(7)),
                theta_tolerance: dec!(0.05),
                min_risk_reward: dec!(1.5),
                risk_multiplier: dec!(0.5),
                holding_hours: Band::new(dec!(0.25), dec!(6)),
                iv_rank: Band::new(dec!(20), dec!(100)),
                score_threshold: dec!(6.0),
                delta: Band::new(dec!(0.40), dec!(0.70)),
            },
            Self::Swing => TimeframeConfig {
                regime: self,
                target_dte: Band::new(dec!(14), dec!(45)),
                theta_tolerance: dec!(0.02),
                min_risk_reward: dec!(2.0),
                risk_multiplier: dec!(1.0),
                holding_hours: Band::new(dec!(24), dec!(240)),
                iv_rank: Band::new(dec!(15), dec!(70)),
                score_threshold: dec!(6.0),
                delta: Band::new(dec!(0.30), dec!(0.60)),
            },
            Self::Monthly => TimeframeConfig {
                regime: self,
                target_dte: Band::new(dec!(30), dec!(60)),
                theta_tolerance: dec!(0.015),
                min_risk_reward: dec!(2.5),
                risk_multiplier: dec!(1.0),
                holding_hours: Band::new(dec!(72), dec!(504)),
                iv_rank: Band::new(dec!(10), dec!(60)),
                score_threshold: dec!(7.0),
                delta: Band::new(dec!(0.25), dec!(0.55)),
            },
            Self::Leaps => TimeframeConfig {
                regime: self,
                target_dte: Band::new(dec!(180), dec!(730)),
                theta_tolerance: dec!(0.005),
                min_risk_reward: dec!(3.0),
                risk_multiplier: dec!(1.5),
                holding_hours: Band::new(dec!(720), dec!(4320)),
                iv_rank: Band::new(dec!(0), dec!(40)),
                score_threshold: dec!(8.0),
                delta: Band::new(dec!(0.60), dec!(0.85)),
            },
        }
    }

    /// Intraday applies the tighter liquidity and spread screens.
    #[must_use]
    pub const fn is_intraday(self) -> bool {
        matches!(self, Self::Intraday)
    }
}

/// Classifies a signal into a regime.
///
/// An explicit DTE wins over the resolution. Unrecognised resolutions fall
/// back to [`Regime::Swing`].
#[must_use]
pub fn classify(resolution: Option<&str>, explicit_dte: Option<i64>) -> Regime {
    if let Some(dte) = explicit_dte {
        return match dte {
            i64::MIN..=7 => Regime::Intraday,
            8..=45 => Regime::Swing,
            46..=60 => Regime::Monthly,
            _ => Regime::Leaps,
        };
    }

    let resolution = resolution.unwrap_or(crate::signal::DEFAULT_RESOLUTION).trim();

    // Lowercase `m` is minutes, uppercase `M` is months.
    if resolution.ends_with('m') || matches!(resolution, "5M" | "15M" | "30M") {
        return Regime::Intraday;
    }

    match resolution.to_ascii_uppercase().as_str() {
        "1H" => Regime::Intraday,
        "1D" | "D" | "4H" => Regime::Swing,
        "1W" | "W" | "1M" => Regime::Monthly,
        _ => Regime::Swing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_dte_boundaries() {
        assert_eq!(classify(Some("1D"), Some(0)), Regime::Intraday);
        assert_eq!(classify(Some("1D"), Some(7)), Regime::Intraday);
        assert_eq!(classify(Some("1D"), Some(8)), Regime::Swing);
        assert_eq!(classify(Some("1D"), Some(45)), Regime::Swing);
        assert_eq!(classify(Some("5m"), Some(60)), Regime::Monthly);
        assert_eq!(classify(Some("5m"), Some(61)), Regime::Leaps);
    }

    #[test]
    fn test_resolution_mapping() {
        assert_eq!(classify(Some("5m"), None), Regime::Intraday);
        assert_eq!(classify(Some("15M"), None), Regime::Intraday);
        assert_eq!(classify(Some("1H"), None), Regime::Intraday);
        assert_eq!(classify(Some("4H"), None), Regime::Swing);
        assert_eq!(classify(Some("1D"), None), Regime::Swing);
        assert_eq!(classify(Some("1W"), None), Regime::Monthly);
        assert_eq!(classify(Some("1M"), None), Regime::Monthly);
    }

    #[test]
    fn test_unknown_and_missing_default_to_swing() {
        assert_eq!(classify(None, None), Regime::Swing);
        assert_eq!(classify(Some("3Y"), None), Regime::Swing);
    }

    #[test]
    fn test_regime_thresholds() {
        let swing = Regime::Swing.config();
        assert_eq!(swing.min_risk_reward, dec!(2.0));
        assert_eq!(swing.score_threshold, dec!(6.0));
        assert_eq!(swing.delta.midpoint(), dec!(0.45));

        let leaps = Regime::Leaps.config();
        assert_eq!(leaps.risk_multiplier, dec!(1.5));
        assert!(leaps.target_dte.contains(dec!(365)));
        assert!(!leaps.target_dte.contains(dec!(90)));
    }
}
