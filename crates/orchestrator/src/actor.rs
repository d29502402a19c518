use crate::commands::{OrchestratorCommand, SessionState, SignalEnvelope};
use crate::error::OrchestratorError;
use crate::pipeline::Session;
use crate::status::{KillSwitchReport, OrchestratorEvent, OrchestratorStatus};
use crate::store::SessionSnapshot;
use algo_trade_core::{AppConfig, RunMode};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Interval, MissedTickBehavior};

pub struct OrchestratorActor {
    session: Session,
    state: SessionState,
    session_started_at: Option<DateTime<Utc>>,
    kill_switch_engaged: bool,
    last_kill_switch: Option<KillSwitchReport>,

    commands: mpsc::Receiver<OrchestratorCommand>,
    signals: mpsc::Receiver<SignalEnvelope>,
    status_tx: watch::Sender<OrchestratorStatus>,
    monitor: Interval,
    monitor_secs: u64,
}

fn monitor_interval(secs: u64) -> Interval {
    let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

impl OrchestratorActor {
    /// Creates a stopped actor. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn new(
        session: Session,
        commands: mpsc::Receiver<OrchestratorCommand>,
        signals: mpsc::Receiver<SignalEnvelope>,
    ) -> Self {
        let monitor_secs = session.config().orchestrator.monitor_interval_secs;
        let (status_tx, _) = watch::channel(OrchestratorStatus::stopped(
            &session.config().orchestrator,
            session.daily_status(),
            session.now(),
        ));
        Self {
            session,
            state: SessionState::Stopped,
            session_started_at: None,
            kill_switch_engaged: false,
            last_kill_switch: None,
            commands,
            signals,
            status_tx,
            monitor: monitor_interval(monitor_secs),
            monitor_secs,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<OrchestratorStatus> {
        self.status_tx.subscribe()
    }

    /// Loads the persisted snapshot, if any.
    ///
    /// Counters and the daily record come back for reporting. The session
    /// itself always restarts stopped; an engaged kill switch keeps it
    /// disabled and KILLED until re-enabled.
    ///
    /// # Errors
    /// Store failures.
    pub async fn restore(&mut self) -> Result<bool, OrchestratorError> {
        let Some(snapshot) = self.session.store().load().await? else {
            return Ok(false);
        };
        self.session.counters = snapshot.counters;
        self.session.restore_daily(snapshot.daily);
        self.session_started_at = snapshot.session_started_at;
        self.kill_switch_engaged = snapshot.kill_switch_engaged;
        if snapshot.kill_switch_engaged {
            self.session.config_mut().orchestrator.enabled = false;
            self.state = SessionState::Killed;
        }
        tracing::info!(
            saved_at = %snapshot.saved_at,
            kill_switch = snapshot.kill_switch_engaged,
            "Session restored"
        );
        self.publish_status().await;
        Ok(true)
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            saved_at: self.session.now(),
            config: self.session.config().clone(),
            state: self.state,
            session_started_at: self.session_started_at,
            counters: self.session.counters,
            daily: self.session.daily_record(),
            kill_switch_engaged: self.kill_switch_engaged,
        }
    }

    async fn persist(&self) {
        let snapshot = self.snapshot();
        if let Err(e) = self.session.store().save(&snapshot).await {
            tracing::error!(error = %e, "Failed to persist session snapshot");
            self.session.emit(OrchestratorEvent::Error {
                message: format!("Snapshot save failed: {e}"),
                at: snapshot.saved_at,
            });
        }
    }

    pub async fn status(&self) -> OrchestratorStatus {
        let config = &self.session.config().orchestrator;
        OrchestratorStatus {
            enabled: config.enabled,
            mode: config.mode,
            state: self.state,
            running: self.state == SessionState::Running,
            paused: self.state == SessionState::Paused,
            algorithm_version: config.algorithm_version.clone(),
            session_started_at: self.session_started_at,
            counters: self.session.counters,
            daily: self.session.daily_status(),
            positions: self.session.positions_status().await,
            last_kill_switch: self.last_kill_switch.clone(),
            updated_at: self.session.now(),
        }
    }

    async fn publish_status(&self) -> OrchestratorStatus {
        let status = self.status().await;
        self.status_tx.send_replace(status.clone());
        status
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        self.state = to;
        tracing::info!(from = %from, to = %to, "Orchestrator state changed");
        self.session.emit(OrchestratorEvent::StateChanged {
            from,
            to,
            at: self.session.now(),
        });
    }

    async fn start(&mut self) -> Result<OrchestratorStatus, OrchestratorError> {
        if self.state.is_active() {
            tracing::warn!(state = %self.state, "Already started, ignoring start");
            return Ok(self.status().await);
        }
        let config = &self.session.config().orchestrator;
        if !config.enabled {
            tracing::warn!("Start refused: orchestrator disabled in config");
            return Err(OrchestratorError::NotEnabled);
        }
        if config.mode == RunMode::Live {
            tracing::warn!("Start refused: live mode not supported");
            return Err(OrchestratorError::LiveNotSupported);
        }

        self.session.reset_counters();
        self.session_started_at = Some(self.session.now());
        self.kill_switch_engaged = false;
        self.transition(SessionState::Running);
        tracing::info!(
            mode = %self.session.config().orchestrator.mode,
            version = %self.session.config().orchestrator.algorithm_version,
            "Session started"
        );
        Ok(self.publish_status().await)
    }

    async fn stop(&mut self) -> OrchestratorStatus {
        if !self.state.is_active() {
            tracing::warn!(state = %self.state, "Not running, ignoring stop");
            return self.status().await;
        }
        self.transition(SessionState::Stopped);
        self.persist().await;
        self.publish_status().await
    }

    async fn pause(&mut self) -> OrchestratorStatus {
        if self.state != SessionState::Running {
            tracing::warn!(state = %self.state, "Not running, cannot pause");
            return self.status().await;
        }
        self.transition(SessionState::Paused);
        self.publish_status().await
    }

    async fn resume(&mut self) -> OrchestratorStatus {
        if self.state != SessionState::Paused {
            tracing::warn!(state = %self.state, "Not paused, cannot resume");
            return self.status().await;
        }
        self.transition(SessionState::Running);
        self.publish_status().await
    }

    async fn kill_switch(&mut self) -> KillSwitchReport {
        tracing::warn!(state = %self.state, "Kill switch engaged");
        let report = self.session.close_all().await;
        if !report.failures.is_empty() {
            tracing::error!(
                closed = report.closed.len(),
                failed = report.failures.len(),
                "Kill switch left positions open"
            );
        }

        self.session.config_mut().orchestrator.enabled = false;
        self.kill_switch_engaged = true;
        self.last_kill_switch = Some(report.clone());
        if self.state != SessionState::Killed {
            self.transition(SessionState::Killed);
        }
        self.persist().await;
        self.session.emit(OrchestratorEvent::KillSwitch(report.clone()));
        self.publish_status().await;
        report
    }

    fn update_config(&mut self, mut config: AppConfig) {
        if self.kill_switch_engaged && config.orchestrator.enabled {
            // Re-enabling clears the latch; the operator still has to start.
            tracing::info!("Kill switch cleared by config update");
            self.kill_switch_engaged = false;
            if self.state == SessionState::Killed {
                self.transition(SessionState::Stopped);
            }
        }
        if config.orchestrator.monitor_interval_secs == 0 {
            config.orchestrator.monitor_interval_secs = 1;
        }
        if config.orchestrator.monitor_interval_secs != self.monitor_secs {
            self.monitor_secs = config.orchestrator.monitor_interval_secs;
            self.monitor = monitor_interval(self.monitor_secs);
        }
        self.session.apply_config(config);
        tracing::info!("Orchestrator config updated");
    }

    async fn on_signal(&mut self, envelope: SignalEnvelope) {
        let SignalEnvelope { signal, reply } = envelope;
        let decision = if self.state == SessionState::Running {
            self.session.process_signal(signal).await
        } else {
            tracing::warn!(
                symbol = %signal.symbol,
                state = %self.state,
                "Not running, ignoring signal"
            );
            None
        };
        if let Some(reply) = reply {
            let _ = reply.send(decision);
        }
        self.publish_status().await;
    }

    async fn on_tick(&mut self) {
        if self.state != SessionState::Running {
            return;
        }
        let closed = self.session.monitor().await;
        if !closed.is_empty() {
            tracing::info!(closed = closed.len(), "Monitoring pass closed positions");
            self.publish_status().await;
        }
    }

    /// Returns `false` when the actor should exit.
    async fn handle_command(&mut self, command: OrchestratorCommand) -> bool {
        match command {
            OrchestratorCommand::Start(tx) => {
                let _ = tx.send(self.start().await);
            }
            OrchestratorCommand::Stop(tx) => {
                let _ = tx.send(self.stop().await);
            }
            OrchestratorCommand::Pause(tx) => {
                let _ = tx.send(self.pause().await);
            }
            OrchestratorCommand::Resume(tx) => {
                let _ = tx.send(self.resume().await);
            }
            OrchestratorCommand::KillSwitch(tx) => {
                let _ = tx.send(self.kill_switch().await);
            }
            OrchestratorCommand::UpdateConfig(config) => {
                self.update_config(*config);
                self.publish_status().await;
            }
            OrchestratorCommand::MonitorPositions(tx) => {
                let closed = self.session.monitor().await;
                self.publish_status().await;
                let _ = tx.send(closed);
            }
            OrchestratorCommand::GetStatus(tx) => {
                let _ = tx.send(self.status().await);
            }
            OrchestratorCommand::Shutdown => {
                tracing::info!("Orchestrator shutting down");
                if self.state.is_active() {
                    self.transition(SessionState::Stopped);
                    self.persist().await;
                }
                return false;
            }
        }
        true
    }

    /// Runs the actor until shutdown or until every handle is dropped.
    ///
    /// Control commands take priority over queued signals; the monitor
    /// interval only acts while running.
    pub async fn run(mut self) {
        tracing::info!(mode = %self.session.config().orchestrator.mode, "Orchestrator actor running");
        let mut signals_open = true;

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle_command(command).await {
                        break;
                    }
                }
                envelope = self.signals.recv(), if signals_open => {
                    match envelope {
                        Some(envelope) => self.on_signal(envelope).await,
                        None => {
                            tracing::debug!("Signal channel closed");
                            signals_open = false;
                        }
                    }
                }
                _ = self.monitor.tick() => self.on_tick().await,
            }
        }

        tracing::info!(state = %self.state, "Orchestrator actor stopped");
    }
}
