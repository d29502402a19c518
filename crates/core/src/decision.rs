//! Decision audit types produced by the gate pipeline.
//!
//! A [`Decision`] is built once by the gate engine. Admission stages that
//! need session state may append further [`GateResult`]s afterwards through
//! [`Decision::append_gate`], which keeps the audit trail complete and flips
//! TRADE to BLOCK on a failing append.

use crate::signal::SignalFamily;
use crate::timeframe::Regime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final outcome of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionOutcome {
    Trade,
    Block,
}

/// How the trade idea is expected to play out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeMode {
    Trend,
    Reversal,
    Breakout,
}

impl fmt::Display for TradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Trend => "TREND",
            Self::Reversal => "REVERSAL",
            Self::Breakout => "BREAKOUT",
        };
        f.write_str(name)
    }
}

/// One ordered admission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Decimal>,
    /// Free-form annotation, e.g. the VIX reading behind a session check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl GateResult {
    #[must_use]
    pub fn pass(gate: impl Into<String>) -> Self {
        Self {
            gate: gate.into(),
            passed: true,
            reason: None,
            score: None,
            detail: None,
        }
    }

    #[must_use]
    pub fn fail(gate: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            gate: gate.into(),
            passed: false,
            reason: Some(reason.into()),
            score: None,
            detail: None,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub const fn with_score(mut self, score: Decimal) -> Self {
        self.score = Some(score);
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Factorization score, total and per family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub total: Decimal,
    pub market_structure: Decimal,
    pub liquidity: Decimal,
    pub order_flow: Decimal,
    pub volume: Decimal,
}

impl ScoreBreakdown {
    /// Sub-score for one family.
    #[must_use]
    pub const fn family(&self, family: SignalFamily) -> Decimal {
        match family {
            SignalFamily::MarketStructure => self.market_structure,
            SignalFamily::Liquidity => self.liquidity,
            SignalFamily::OrderFlow => self.order_flow,
            SignalFamily::Volume => self.volume,
        }
    }

    /// Adds a weight to a family and to the total.
    pub fn add(&mut self, family: SignalFamily, weight: Decimal) {
        match family {
            SignalFamily::MarketStructure => self.market_structure += weight,
            SignalFamily::Liquidity => self.liquidity += weight,
            SignalFamily::OrderFlow => self.order_flow += weight,
            SignalFamily::Volume => self.volume += weight,
        }
        self.total += weight;
    }
}

/// Primary tag plus confirmations from other families.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRoles {
    pub primary: Option<String>,
    pub confirmations: Vec<String>,
}

/// Risk budget and resulting size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskCalculation {
    pub base_risk: Decimal,
    pub adjusted_risk: Decimal,
    pub quantity: u32,
    pub risk_reward: Decimal,
}

/// Audit record for a single signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub symbol: String,
    pub outcome: DecisionOutcome,
    pub regime: Regime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_mode: Option<TradeMode>,
    pub gate_results: Vec<GateResult>,
    pub score_breakdown: ScoreBreakdown,
    pub roles: SignalRoles,
    pub risk: RiskCalculation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
}

impl Decision {
    /// Builds a BLOCK decision.
    ///
    /// Scores and risk are zeroed and the first contributing tag is reported
    /// as primary with no confirmations.
    #[must_use]
    pub fn block(
        symbol: impl Into<String>,
        regime: Regime,
        gate_results: Vec<GateResult>,
        first_tag: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            outcome: DecisionOutcome::Block,
            regime,
            trade_mode: None,
            gate_results,
            score_breakdown: ScoreBreakdown::default(),
            roles: SignalRoles {
                primary: first_tag,
                confirmations: Vec::new(),
            },
            risk: RiskCalculation::default(),
            block_reason: Some(reason.into()),
        }
    }

    #[must_use]
    pub fn is_trade(&self) -> bool {
        self.outcome == DecisionOutcome::Trade
    }

    /// Appends a gate evaluated outside the pure pipeline.
    ///
    /// A failing gate turns a TRADE into a BLOCK carrying that gate's reason.
    /// Appending to an already blocked decision keeps the original reason.
    pub fn append_gate(&mut self, result: GateResult) {
        if !result.passed && self.is_trade() {
            self.outcome = DecisionOutcome::Block;
            self.block_reason = Some(
                result
                    .reason
                    .clone()
                    .unwrap_or_else(|| format!("{} failed", result.gate)),
            );
        }
        self.gate_results.push(result);
    }

    /// Overrides the block reason after a failing append.
    ///
    /// Used when the audit row carries a shorter reason than the one reported
    /// to the operator.
    pub fn set_block_reason(&mut self, reason: impl Into<String>) {
        if !self.is_trade() {
            self.block_reason = Some(reason.into());
        }
    }

    /// Result of the named gate, if it was evaluated.
    #[must_use]
    pub fn gate(&self, name: &str) -> Option<&GateResult> {
        self.gate_results.iter().find(|g| g.gate == name)
    }

    /// Mutable access to the named gate, for caller-side annotations.
    pub fn gate_mut(&mut self, name: &str) -> Option<&mut GateResult> {
        self.gate_results.iter_mut().find(|g| g.gate == name)
    }
}
