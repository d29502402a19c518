use crate::commands::{OrchestratorCommand, SignalEnvelope};
use crate::error::OrchestratorError;
use crate::status::{KillSwitchReport, OrchestratorEvent, OrchestratorStatus};
use algo_trade_core::{AppConfig, Decision, Signal};
use algo_trade_execution::PaperPosition;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Cloneable control surface for a running orchestrator.
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<OrchestratorCommand>,
    signals: mpsc::Sender<SignalEnvelope>,
    events: broadcast::Sender<OrchestratorEvent>,
    status: watch::Receiver<OrchestratorStatus>,
}

impl OrchestratorHandle {
    #[must_use]
    pub const fn new(
        commands: mpsc::Sender<OrchestratorCommand>,
        signals: mpsc::Sender<SignalEnvelope>,
        events: broadcast::Sender<OrchestratorEvent>,
        status: watch::Receiver<OrchestratorStatus>,
    ) -> Self {
        Self {
            commands,
            signals,
            events,
            status,
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> OrchestratorCommand,
    ) -> Result<T, OrchestratorError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(command(tx)).await?;
        Ok(rx.await?)
    }

    /// Queues a signal. Waits for queue capacity when the actor is behind.
    ///
    /// # Errors
    /// Returns an error if the actor has shut down.
    pub async fn submit_signal(&self, signal: Signal) -> Result<(), OrchestratorError> {
        self.signals
            .send(SignalEnvelope {
                signal,
                reply: None,
            })
            .await?;
        Ok(())
    }

    /// Queues a signal and waits for its decision.
    ///
    /// `None` means it was not evaluated: validation failed or the session
    /// was not running.
    ///
    /// # Errors
    /// Returns an error if the actor has shut down.
    pub async fn evaluate_signal(&self, signal: Signal) -> Result<Option<Decision>, OrchestratorError> {
        let (tx, rx) = oneshot::channel();
        self.signals
            .send(SignalEnvelope {
                signal,
                reply: Some(tx),
            })
            .await?;
        Ok(rx.await?)
    }

    /// Starts the session. A no-op returning the current status if active.
    ///
    /// # Errors
    /// `NotEnabled` and `LiveNotSupported` refusals, or a closed actor.
    pub async fn start(&self) -> Result<OrchestratorStatus, OrchestratorError> {
        self.request(OrchestratorCommand::Start).await?
    }

    /// # Errors
    /// Returns an error if the actor has shut down.
    pub async fn stop(&self) -> Result<OrchestratorStatus, OrchestratorError> {
        self.request(OrchestratorCommand::Stop).await
    }

    /// # Errors
    /// Returns an error if the actor has shut down.
    pub async fn pause(&self) -> Result<OrchestratorStatus, OrchestratorError> {
        self.request(OrchestratorCommand::Pause).await
    }

    /// # Errors
    /// Returns an error if the actor has shut down.
    pub async fn resume(&self) -> Result<OrchestratorStatus, OrchestratorError> {
        self.request(OrchestratorCommand::Resume).await
    }

    /// Closes every open position, disables the session and persists it.
    ///
    /// # Errors
    /// Returns an error if the actor has shut down.
    pub async fn kill_switch(&self) -> Result<KillSwitchReport, OrchestratorError> {
        self.request(OrchestratorCommand::KillSwitch).await
    }

    /// # Errors
    /// Returns an error if the actor has shut down.
    pub async fn update_config(&self, config: AppConfig) -> Result<(), OrchestratorError> {
        self.commands
            .send(OrchestratorCommand::UpdateConfig(Box::new(config)))
            .await?;
        Ok(())
    }

    /// Runs a monitoring pass now and returns the positions it closed.
    ///
    /// # Errors
    /// Returns an error if the actor has shut down.
    pub async fn monitor(&self) -> Result<Vec<PaperPosition>, OrchestratorError> {
        self.request(OrchestratorCommand::MonitorPositions).await
    }

    /// # Errors
    /// Returns an error if the actor has shut down.
    pub async fn status(&self) -> Result<OrchestratorStatus, OrchestratorError> {
        self.request(OrchestratorCommand::GetStatus).await
    }

    /// Latest published status without a round trip.
    #[must_use]
    pub fn status_watch(&self) -> watch::Receiver<OrchestratorStatus> {
        self.status.clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    /// # Errors
    /// Returns an error if the actor has already shut down.
    pub async fn shutdown(&self) -> Result<(), OrchestratorError> {
        self.commands.send(OrchestratorCommand::Shutdown).await?;
        Ok(())
    }
}

impl std::fmt::Debug for OrchestratorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorHandle")
            .field("closed", &self.commands.is_closed())
            .finish_non_exhaustive()
    }
}
