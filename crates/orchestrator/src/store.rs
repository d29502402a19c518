//! Session persistence.
//!
//! The orchestrator saves a [`SessionSnapshot`] on stop and on the kill
//! switch, and reloads it only when asked to. Decisions are appended to an
//! audit log as they are made.

use crate::commands::SessionState;
use crate::status::SessionCounters;
use algo_trade_core::{AppConfig, Decision, ProviderError, Signal};
use algo_trade_decision::DailyRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub saved_at: DateTime<Utc>,
    pub config: AppConfig,
    pub state: SessionState,
    pub session_started_at: Option<DateTime<Utc>>,
    pub counters: SessionCounters,
    pub daily: DailyRecord,
    /// Set by the kill switch; survives restarts until re-enabled.
    pub kill_switch_engaged: bool,
}

/// One audit row: the signal, the decision and the build that made it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub recorded_at: DateTime<Utc>,
    pub algorithm_version: String,
    pub signal: Signal,
    pub decision: Decision,
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), ProviderError>;

    async fn load(&self) -> Result<Option<SessionSnapshot>, ProviderError>;

    async fn append_decision(&self, record: &DecisionRecord) -> Result<(), ProviderError>;
}

/// Snapshot as pretty JSON at `path`, audit rows as JSON lines next to it.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
    audit_path: PathBuf,
}

impl JsonFileStateStore {
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let audit_path = path.with_extension("decisions.jsonl");
        Self { path, audit_path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn audit_path(&self) -> &Path {
        &self.audit_path
    }

    /// Reads every audit row.
    ///
    /// # Errors
    /// I/O failures and malformed rows.
    pub async fn decisions(&self) -> Result<Vec<DecisionRecord>, ProviderError> {
        let raw = match tokio::fs::read_to_string(&self.audit_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.audit_path, &e)),
        };
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| ProviderError::store(format!("malformed audit row: {e}")))
            })
            .collect()
    }
}

fn io_error(path: &Path, e: &std::io::Error) -> ProviderError {
    ProviderError::store(format!("{}: {e}", path.display()))
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), ProviderError> {
        let body = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| ProviderError::store(format!("serialize snapshot: {e}")))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, &e))?;
        }
        // Write-then-rename so a crash never leaves a torn snapshot.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| io_error(&tmp, &e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, &e))?;
        tracing::debug!(path = %self.path.display(), "Session snapshot saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<SessionSnapshot>, ProviderError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&self.path, &e)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| ProviderError::store(format!("malformed snapshot: {e}")))
    }

    async fn append_decision(&self, record: &DecisionRecord) -> Result<(), ProviderError> {
        let mut line = serde_json::to_vec(record)
            .map_err(|e| ProviderError::store(format!("serialize decision: {e}")))?;
        line.push(b'\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_path)
            .await
            .map_err(|e| io_error(&self.audit_path, &e))?;
        file.write_all(&line)
            .await
            .map_err(|e| io_error(&self.audit_path, &e))?;
        file.flush().await.map_err(|e| io_error(&self.audit_path, &e))
    }
}

/// Process-local store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    snapshot: Mutex<Option<SessionSnapshot>>,
    decisions: Mutex<Vec<DecisionRecord>>,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.snapshot.lock().clone()
    }

    #[must_use]
    pub fn decisions(&self) -> Vec<DecisionRecord> {
        self.decisions.lock().clone()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), ProviderError> {
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<SessionSnapshot>, ProviderError> {
        Ok(self.snapshot.lock().clone())
    }

    async fn append_decision(&self, record: &DecisionRecord) -> Result<(), ProviderError> {
        self.decisions.lock().push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algo_trade_core::{Direction, GateResult, Regime};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn snapshot() -> SessionSnapshot {
        let at = Utc.with_ymd_and_hms(2025, 1, 14, 21, 0, 0).unwrap();
        let mut daily = DailyRecord::new(at.date_naive());
        daily.trades_count = 3;
        daily.daily_pnl = dec!(-420.50);
        daily.max_drawdown = dec!(-600);
        SessionSnapshot {
            saved_at: at,
            config: AppConfig::default(),
            state: SessionState::Stopped,
            session_started_at: Some(at - chrono::Duration::hours(6)),
            counters: SessionCounters {
                signals_generated: 12,
                signals_rejected: 1,
                trades_executed: 3,
                trades_blocked: 8,
            },
            daily,
            kill_switch_engaged: false,
        }
    }

    fn record() -> DecisionRecord {
        let signal = Signal {
            symbol: "IWM".to_string(),
            resolution: Some("60".to_string()),
            timestamp: 1_736_870_400,
            signal_type: "SWEEP".to_string(),
            direction: Direction::Short,
            confidence: dec!(4),
            signal_strength: None,
            confluence_count: 2,
            entry_price: dec!(220),
            stop_loss: dec!(222),
            take_profit_1: dec!(214),
            active_signals: vec!["SWEEP_HIGH".to_string()],
            is_options: false,
        };
        let decision = Decision::block(
            "IWM",
            Regime::Intraday,
            vec![GateResult::fail("Signal Integrity", "Confidence too low")],
            Some("SWEEP_HIGH".to_string()),
            "Confidence too low",
        );
        DecisionRecord {
            recorded_at: Utc.with_ymd_and_hms(2025, 1, 14, 15, 0, 0).unwrap(),
            algorithm_version: "v1.0".to_string(),
            signal,
            decision,
        }
    }

    #[tokio::test]
    async fn test_json_store_persists_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("state/session.json"));
        assert!(store.load().await.unwrap().is_none());

        let saved = snapshot();
        store.save(&saved).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, saved);

        // Overwrite keeps one snapshot.
        let mut next = saved.clone();
        next.kill_switch_engaged = true;
        store.save(&next).await.unwrap();
        assert!(store.load().await.unwrap().unwrap().kill_switch_engaged);
    }

    #[tokio::test]
    async fn test_json_store_appends_audit_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("session.json"));
        store.append_decision(&record()).await.unwrap();
        store.append_decision(&record()).await.unwrap();

        let rows = store.decisions().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].decision.block_reason.as_deref(), Some("Confidence too low"));
        assert!(store.audit_path().ends_with("session.decisions.jsonl"));
    }

    #[tokio::test]
    async fn test_malformed_snapshot_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let err = JsonFileStateStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, ProviderError::Store(_)));
    }
}
