//! Options structure selection.
//!
//! A fixed matrix keyed by regime, direction, trade mode, IV regime and
//! conviction. No pricing is involved.

use algo_trade_core::{Direction, Regime, TradeMode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence at or above which conviction is HIGH.
pub const HIGH_CONVICTION: Decimal = dec!(7.0);
/// Confidence at or above which conviction is MEDIUM.
pub const MEDIUM_CONVICTION: Decimal = dec!(6.0);
/// IV rank strictly above which premium is considered rich.
pub const HIGH_IV_RANK: Decimal = dec!(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionStrategy {
    LongCall,
    LongPut,
    CallDebitSpread,
    PutDebitSpread,
    CallCreditSpread,
    PutCreditSpread,
    LongStraddle,
    LongStrangle,
    IronCondor,
    IronButterfly,
    CalendarSpread,
    DiagonalSpread,
    /// Poor man's covered call.
    Pmcc,
}

impl OptionStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LongCall => "LONG_CALL",
            Self::LongPut => "LONG_PUT",
            Self::CallDebitSpread => "CALL_DEBIT_SPREAD",
            Self::PutDebitSpread => "PUT_DEBIT_SPREAD",
            Self::CallCreditSpread => "CALL_CREDIT_SPREAD",
            Self::PutCreditSpread => "PUT_CREDIT_SPREAD",
            Self::LongStraddle => "LONG_STRADDLE",
            Self::LongStrangle => "LONG_STRANGLE",
            Self::IronCondor => "IRON_CONDOR",
            Self::IronButterfly => "IRON_BUTTERFLY",
            Self::CalendarSpread => "CALENDAR_SPREAD",
            Self::DiagonalSpread => "DIAGONAL_SPREAD",
            Self::Pmcc => "PMCC",
        }
    }

    #[must_use]
    pub const fn is_debit_spread(self) -> bool {
        matches!(self, Self::CallDebitSpread | Self::PutDebitSpread)
    }

    #[must_use]
    pub const fn is_credit_spread(self) -> bool {
        matches!(self, Self::CallCreditSpread | Self::PutCreditSpread)
    }

    /// Strategies that collect premium up front.
    #[must_use]
    pub const fn is_credit(self) -> bool {
        self.is_credit_spread() || matches!(self, Self::IronCondor | Self::IronButterfly)
    }

    /// Long straddles and strangles, which live and die by implied volatility.
    #[must_use]
    pub const fn is_volatility_play(self) -> bool {
        matches!(self, Self::LongStraddle | Self::LongStrangle)
    }

    /// Net long premium on entry; subject to the theta tolerance check.
    #[must_use]
    pub const fn is_long_premium(self) -> bool {
        !self.is_credit()
    }
}

impl fmt::Display for OptionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conviction tier derived from signal confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Conviction {
    High,
    Medium,
    Low,
}

impl Conviction {
    #[must_use]
    pub fn from_confidence(confidence: Decimal) -> Self {
        if confidence >= HIGH_CONVICTION {
            Self::High
        } else if confidence >= MEDIUM_CONVICTION {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Whether implied volatility is rich or cheap relative to its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IvRegime {
    High,
    Low,
}

impl IvRegime {
    #[must_use]
    pub fn from_rank(iv_rank: Decimal) -> Self {
        if iv_rank > HIGH_IV_RANK {
            Self::High
        } else {
            Self::Low
        }
    }
}

/// Picks the options structure for a trade idea.
///
/// High IV sells premium, low IV buys it. Intraday always buys single legs
/// for speed of entry and exit.
#[must_use]
pub fn select_strategy(
    direction: Direction,
    trade_mode: TradeMode,
    regime: Regime,
    iv_rank: Decimal,
    conviction: Conviction,
) -> OptionStrategy {
    let iv = IvRegime::from_rank(iv_rank);
    let long = direction == Direction::Long;
    let pick = |bullish, bearish| if long { bullish } else { bearish };

    match regime {
        Regime::Intraday => pick(OptionStrategy::LongCall, OptionStrategy::LongPut),
        Regime::Swing => match (iv, conviction) {
            (IvRegime::High, _) => pick(
                OptionStrategy::PutCreditSpread,
                OptionStrategy::CallCreditSpread,
            ),
            (IvRegime::Low, Conviction::High) => {
                pick(OptionStrategy::LongCall, OptionStrategy::LongPut)
            }
            (IvRegime::Low, _) => pick(
                OptionStrategy::CallDebitSpread,
                OptionStrategy::PutDebitSpread,
            ),
        },
        Regime::Monthly => {
            if iv == IvRegime::High && conviction != Conviction::High {
                pick(
                    OptionStrategy::PutCreditSpread,
                    OptionStrategy::CallCreditSpread,
                )
            } else if trade_mode == TradeMode::Trend {
                // Term-structure play on trending names.
                OptionStrategy::DiagonalSpread
            } else {
                pick(
                    OptionStrategy::CallDebitSpread,
                    OptionStrategy::PutDebitSpread,
                )
            }
        }
        Regime::Leaps => {
            if conviction == Conviction::High && iv == IvRegime::Low {
                pick(OptionStrategy::LongCall, OptionStrategy::LongPut)
            } else {
                pick(OptionStrategy::Pmcc, OptionStrategy::DiagonalSpread)
            }
        }
    }
}
