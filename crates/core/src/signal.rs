//! Inbound trade signals and their validation schema.
//!
//! A [`Signal`] is immutable once accepted. Everything downstream (gates,
//! sizing, execution) reads it by reference.

use crate::error::ValidationError;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolution assumed when a signal omits one.
pub const DEFAULT_RESOLUTION: &str = "1D";

/// Trade direction carried by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Returns the opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Grouping of contributing tags used by the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalFamily {
    MarketStructure,
    Liquidity,
    OrderFlow,
    Volume,
}

/// Known contributing signal tags.
///
/// Signals carry tags as strings on the wire; unknown tags are tolerated and
/// simply contribute nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalTag {
    #[serde(rename = "STRAT_212")]
    Strat212,
    #[serde(rename = "BOS")]
    Bos,
    #[serde(rename = "MSS")]
    Mss,
    #[serde(rename = "CHoCH")]
    Choch,
    #[serde(rename = "SWEEP_LOW")]
    SweepLow,
    #[serde(rename = "SWEEP_HIGH")]
    SweepHigh,
    #[serde(rename = "SMT")]
    Smt,
    #[serde(rename = "FVG")]
    Fvg,
    #[serde(rename = "DISPLACEMENT")]
    Displacement,
    #[serde(rename = "BREAKER")]
    Breaker,
    #[serde(rename = "VOLUME_SURGE")]
    VolumeSurge,
    #[serde(rename = "ORB")]
    Orb,
}

impl SignalTag {
    /// Every known tag, in scoring-table order.
    pub const ALL: [Self; 12] = [
        Self::Strat212,
        Self::Bos,
        Self::Mss,
        Self::Choch,
        Self::SweepLow,
        Self::SweepHigh,
        Self::Smt,
        Self::Fvg,
        Self::Displacement,
        Self::Breaker,
        Self::VolumeSurge,
        Self::Orb,
    ];

    /// Parses a wire tag. Matching is exact, as emitted by the generators.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.as_str() == name)
    }

    /// Wire name of the tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strat212 => "STRAT_212",
            Self::Bos => "BOS",
            Self::Mss => "MSS",
            Self::Choch => "CHoCH",
            Self::SweepLow => "SWEEP_LOW",
            Self::SweepHigh => "SWEEP_HIGH",
            Self::Smt => "SMT",
            Self::Fvg => "FVG",
            Self::Displacement => "DISPLACEMENT",
            Self::Breaker => "BREAKER",
            Self::VolumeSurge => "VOLUME_SURGE",
            Self::Orb => "ORB",
        }
    }

    /// Family the tag scores into.
    #[must_use]
    pub const fn family(self) -> SignalFamily {
        match self {
            Self::Strat212 | Self::Bos | Self::Mss | Self::Choch => SignalFamily::MarketStructure,
            Self::SweepLow | Self::SweepHigh | Self::Smt => SignalFamily::Liquidity,
            Self::Fvg | Self::Displacement | Self::Breaker => SignalFamily::OrderFlow,
            Self::VolumeSurge | Self::Orb => SignalFamily::Volume,
        }
    }
}

impl fmt::Display for SignalTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trade idea produced by an external generator or webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    #[serde(default)]
    pub resolution: Option<String>,
    /// Epoch seconds.
    pub timestamp: i64,
    pub signal_type: String,
    pub direction: Direction,
    pub confidence: Decimal,
    #[serde(default)]
    pub signal_strength: Option<Decimal>,
    pub confluence_count: i64,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit_1: Decimal,
    pub active_signals: Vec<String>,
    /// Route through the options-aware pipeline.
    #[serde(default)]
    pub is_options: bool,
}

impl Signal {
    /// Resolution with the `1D` default applied.
    #[must_use]
    pub fn resolution(&self) -> &str {
        self.resolution.as_deref().unwrap_or(DEFAULT_RESOLUTION)
    }

    /// Signal time as a UTC timestamp, if representable.
    #[must_use]
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }

    /// Contributing tags that the scorer recognises, in input order.
    #[must_use]
    pub fn known_tags(&self) -> Vec<SignalTag> {
        self.active_signals
            .iter()
            .filter_map(|name| SignalTag::parse(name))
            .collect()
    }

    /// Checks the intake schema.
    ///
    /// # Errors
    /// Returns the first field that violates its constraint.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let ten = Decimal::from(10);

        let symbol_len = self.symbol.chars().count();
        if symbol_len == 0 || symbol_len > 10 {
            return Err(ValidationError::field(
                "symbol",
                "must be between 1 and 10 characters",
            ));
        }
        if self.resolution.as_deref().is_some_and(str::is_empty) {
            return Err(ValidationError::field("resolution", "must not be empty"));
        }
        if self.timestamp <= 0 {
            return Err(ValidationError::field(
                "timestamp",
                "must be a positive epoch second",
            ));
        }
        if self.signal_type.trim().is_empty() {
            return Err(ValidationError::field("signal_type", "must not be empty"));
        }
        if self.confidence < Decimal::ZERO || self.confidence > ten {
            return Err(ValidationError::field(
                "confidence",
                "must be between 0 and 10",
            ));
        }
        if let Some(strength) = self.signal_strength {
            if strength < Decimal::ZERO || strength > ten {
                return Err(ValidationError::field(
                    "signal_strength",
                    "must be between 0 and 10",
                ));
            }
        }
        if self.confluence_count < 0 {
            return Err(ValidationError::field(
                "confluence_count",
                "must not be negative",
            ));
        }
        for (field, price) in [
            ("entry_price", self.entry_price),
            ("stop_loss", self.stop_loss),
            ("take_profit_1", self.take_profit_1),
        ] {
            if price <= Decimal::ZERO {
                return Err(ValidationError::field(field, "must be positive"));
            }
        }
        if self.active_signals.is_empty() {
            return Err(ValidationError::field(
                "active_signals",
                "at least one signal is required",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_signal() -> Signal {
        Signal {
            symbol: "SPY".to_string(),
            resolution: None,
            timestamp: 1_700_000_000,
            signal_type: "FVG_BOS".to_string(),
            direction: Direction::Long,
            confidence: dec!(8),
            signal_strength: Some(dec!(7)),
            confluence_count: 3,
            entry_price: dec!(450),
            stop_loss: dec!(445),
            take_profit_1: dec!(460),
            active_signals: vec!["FVG".to_string(), "BOS".to_string()],
            is_options: false,
        }
    }

    #[test]
    fn test_valid_signal_passes() {
        assert!(make_signal().validate().is_ok());
    }

    #[test]
    fn test_missing_resolution_defaults_to_daily() {
        assert_eq!(make_signal().resolution(), "1D");
    }

    #[test]
    fn test_symbol_length_bounds() {
        let mut signal = make_signal();
        signal.symbol = "TOOLONGSYMBOL".to_string();
        assert_eq!(signal.validate().unwrap_err().field_name(), "symbol");

        signal.symbol = String::new();
        assert_eq!(signal.validate().unwrap_err().field_name(), "symbol");
    }

    #[test]
    fn test_confidence_out_of_range() {
        let mut signal = make_signal();
        signal.confidence = dec!(10.5);
        assert_eq!(signal.validate().unwrap_err().field_name(), "confidence");
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let mut signal = make_signal();
        signal.stop_loss = Decimal::ZERO;
        assert_eq!(signal.validate().unwrap_err().field_name(), "stop_loss");
    }

    #[test]
    fn test_empty_active_signals_rejected() {
        let mut signal = make_signal();
        signal.active_signals.clear();
        assert_eq!(signal.validate().unwrap_err().field_name(), "active_signals");
    }

    #[test]
    fn test_unknown_tags_are_skipped() {
        let mut signal = make_signal();
        signal.active_signals.push("RSI_DIVERGENCE".to_string());
        assert_eq!(signal.known_tags(), vec![SignalTag::Fvg, SignalTag::Bos]);
    }

    #[test]
    fn test_tag_families() {
        assert_eq!(SignalTag::Choch.family(), SignalFamily::MarketStructure);
        assert_eq!(SignalTag::Smt.family(), SignalFamily::Liquidity);
        assert_eq!(SignalTag::Breaker.family(), SignalFamily::OrderFlow);
        assert_eq!(SignalTag::Orb.family(), SignalFamily::Volume);
    }

    #[test]
    fn test_deserialize_wire_payload() {
        let json = r#"{
            "symbol": "SPX",
            "resolution": "5m",
            "timestamp": 1700000000,
            "signal_type": "SWEEP",
            "direction": "SHORT",
            "confidence": 7.5,
            "confluence_count": 2,
            "entry_price": 4500,
            "stop_loss": 4510,
            "take_profit_1": 4480,
            "active_signals": ["SWEEP_HIGH", "MSS"]
        }"#;
        let signal: Signal = serde_json::from_str(json).unwrap();
        assert_eq!(signal.direction, Direction::Short);
        assert_eq!(signal.confidence, dec!(7.5));
        assert!(signal.signal_strength.is_none());
        assert!(!signal.is_options);
    }
}
