//! Session orchestrator for the signal desk.
//!
//! An [`Orchestrator`] is built once by the composition root with its
//! [`Dependencies`] and spawned as an actor. Operators and signal producers
//! talk to it through a cloneable [`OrchestratorHandle`]: control commands on
//! one channel, signals on a bounded queue, events on a broadcast stream.
//!
//! ```no_run
//! # async fn demo() -> Result<(), algo_trade_orchestrator::OrchestratorError> {
//! use algo_trade_core::{AppConfig, StaticMarketData};
//! use algo_trade_orchestrator::{Dependencies, Orchestrator};
//! use std::sync::Arc;
//!
//! let mut config = AppConfig::default();
//! config.orchestrator.enabled = true;
//! let deps = Dependencies::paper(&config, Arc::new(StaticMarketData::new()));
//! let (handle, task) = Orchestrator::new(config, deps).spawn();
//! handle.start().await?;
//! handle.shutdown().await?;
//! let _ = task.await;
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod clock;
pub mod commands;
pub mod error;
pub mod handle;
pub mod pipeline;
pub mod planner;
pub mod status;
pub mod store;

pub use actor::OrchestratorActor;
pub use clock::{Clock, FixedClock, SystemClock};
pub use commands::{OrchestratorCommand, SessionState, SignalEnvelope};
pub use error::OrchestratorError;
pub use handle::OrchestratorHandle;
pub use pipeline::{Dependencies, Session, MAX_CLOSE_ATTEMPTS};
pub use planner::{plan_options, OptionsPlan, OptionsPositionMeta, PlanError};
pub use status::{
    DailyStatus, KillSwitchReport, OrchestratorEvent, OrchestratorStatus, PositionFailure,
    PositionsStatus, SessionCounters,
};
pub use store::{DecisionRecord, InMemoryStateStore, JsonFileStateStore, SessionSnapshot, StateStore};

use algo_trade_core::AppConfig;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

const COMMAND_CAPACITY: usize = 32;
const EVENT_CAPACITY: usize = 256;

/// An unspawned orchestrator and its handle.
pub struct Orchestrator {
    actor: OrchestratorActor,
    handle: OrchestratorHandle,
}

impl Orchestrator {
    /// Wires the session and channels. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn new(config: AppConfig, deps: Dependencies) -> Self {
        let signal_capacity = config.orchestrator.signal_channel_capacity.max(1);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (signal_tx, signal_rx) = mpsc::channel(signal_capacity);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let session = Session::new(config, deps, event_tx.clone());
        let actor = OrchestratorActor::new(session, command_rx, signal_rx);
        let handle = OrchestratorHandle::new(command_tx, signal_tx, event_tx, actor.status_receiver());
        Self { actor, handle }
    }

    /// Loads persisted session state. Returns whether a snapshot was found.
    ///
    /// # Errors
    /// Store failures.
    pub async fn restore(&mut self) -> Result<bool, OrchestratorError> {
        self.actor.restore().await
    }

    #[must_use]
    pub fn handle(&self) -> OrchestratorHandle {
        self.handle.clone()
    }

    /// Spawns the actor onto the current runtime.
    #[must_use]
    pub fn spawn(self) -> (OrchestratorHandle, JoinHandle<()>) {
        let task = tokio::spawn(self.actor.run());
        (self.handle, task)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.actor.state())
            .finish_non_exhaustive()
    }
}
