use crate::config::AppConfig;
use crate::config_loader::ConfigLoader;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

/// Publishes a fresh [`AppConfig`] whenever the backing TOML file changes.
///
/// Subscribers only wake when the reloaded config differs from the one in
/// effect, so editor saves that leave the values untouched are silent.
pub struct ConfigWatcher {
    tx: watch::Sender<AppConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver seeded with `initial_config`.
    #[must_use]
    pub fn new(initial_config: AppConfig) -> (Self, watch::Receiver<AppConfig>) {
        let (tx, rx) = watch::channel(initial_config);
        (Self { tx }, rx)
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AppConfig> {
        self.tx.subscribe()
    }

    /// Reloads `config_path` and publishes the result if it changed.
    ///
    /// Returns whether subscribers were notified.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed. The config in effect
    /// is left untouched.
    pub fn reload(&self, config_path: &Path) -> Result<bool> {
        let fresh = ConfigLoader::load_from(config_path)?;
        Ok(self.tx.send_if_modified(|current| {
            if *current == fresh {
                return false;
            }
            *current = fresh;
            true
        }))
    }

    /// Watches the configuration file for changes and broadcasts updates.
    ///
    /// The parent directory is watched so that atomic saves (write to a
    /// temp file, rename over the original) are picked up. Runs until the
    /// file watcher shuts down. A reload that fails to parse is logged and
    /// the previous configuration stays in effect.
    ///
    /// # Errors
    ///
    /// Returns an error if file watching cannot be initiated or if the watcher task fails.
    pub async fn watch(&self, config_path: impl AsRef<Path>) -> Result<()> {
        let tx = self.tx.clone();
        let config_path: PathBuf = config_path.as_ref().to_path_buf();
        let dir = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = config_path
            .file_name()
            .map(ToOwned::to_owned)
            .with_context(|| format!("Config path {} has no file name", config_path.display()))?;

        tokio::task::spawn_blocking(move || {
            let watcher_handle = Self { tx };
            let (notify_tx, notify_rx) = std::sync::mpsc::channel();

            let mut watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            })?;
            watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            tracing::info!(path = %config_path.display(), "Watching config file");

            for event in notify_rx {
                let touches_config = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()));
                if !touches_config || !is_write(&event.kind) {
                    continue;
                }
                match watcher_handle.reload(&config_path) {
                    Ok(true) => tracing::info!(path = %config_path.display(), "Config reloaded"),
                    Ok(false) => tracing::debug!("Config file touched without changes"),
                    Err(e) => tracing::error!("Failed to reload config: {:#}", e),
                }
            }

            Ok::<_, anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}

fn is_write(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Modify(_) | EventKind::Create(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_publishes_only_real_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config.toml");
        std::fs::write(&path, "[orchestrator]\nenabled = false\n").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(AppConfig::default());
        assert!(!watcher.reload(&path).unwrap());
        assert!(!rx.has_changed().unwrap());

        std::fs::write(&path, "[orchestrator]\nenabled = true\nmax_daily_trades = 2\n").unwrap();
        assert!(watcher.reload(&path).unwrap());
        assert!(rx.has_changed().unwrap());
        let config = rx.borrow_and_update().clone();
        assert!(config.orchestrator.enabled);
        assert_eq!(config.orchestrator.max_daily_trades, 2);
    }

    #[test]
    fn test_bad_reload_keeps_previous_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config.toml");
        std::fs::write(&path, "[orchestrator]\nmax_daily_trades = \"many\"\n").unwrap();

        let (watcher, rx) = ConfigWatcher::new(AppConfig::default());
        assert!(watcher.reload(&path).is_err());
        assert_eq!(*rx.borrow(), AppConfig::default());
    }
}
