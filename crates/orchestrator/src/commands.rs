use crate::error::OrchestratorError;
use crate::status::{KillSwitchReport, OrchestratorStatus};
use algo_trade_core::{AppConfig, Decision, Signal};
use algo_trade_execution::PaperPosition;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;

/// Control messages accepted by the orchestrator actor.
///
/// Every control command replies with the resulting status so callers can
/// observe idempotent no-ops.
#[derive(Debug)]
pub enum OrchestratorCommand {
    Start(oneshot::Sender<Result<OrchestratorStatus, OrchestratorError>>),
    Stop(oneshot::Sender<OrchestratorStatus>),
    Pause(oneshot::Sender<OrchestratorStatus>),
    Resume(oneshot::Sender<OrchestratorStatus>),
    KillSwitch(oneshot::Sender<KillSwitchReport>),
    UpdateConfig(Box<AppConfig>),
    /// Runs one monitoring pass now; replies with positions closed by it.
    MonitorPositions(oneshot::Sender<Vec<PaperPosition>>),
    GetStatus(oneshot::Sender<OrchestratorStatus>),
    Shutdown,
}

/// A queued signal. `reply` receives the decision, or `None` when the
/// signal failed validation or arrived while the session was not running.
#[derive(Debug)]
pub struct SignalEnvelope {
    pub signal: Signal,
    pub reply: Option<oneshot::Sender<Option<Decision>>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionState {
    #[default]
    Stopped,
    Running,
    Paused,
    /// Terminal for the session. Requires re-enabling in config to start again.
    Killed,
}

impl SessionState {
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "STOPPED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Killed => write!(f, "KILLED"),
        }
    }
}
