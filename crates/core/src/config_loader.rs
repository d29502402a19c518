use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by merging defaults, TOML, environment variables, and JSON.
    ///
    /// Nested keys come from `APP_` variables split on `__`, e.g.
    /// `APP_ORCHESTRATOR__MAX_DAILY_TRADES=3`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from("config/Config.toml")
    }

    /// Loads configuration rooted at a specific TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        let config: AppConfig = Self::base(path)
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Ok(config)
    }

    /// Loads configuration with a profile overlay (`config/Config.<profile>.toml`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file("config/Config.toml"))
            .merge(Toml::file(format!("config/Config.{profile}.toml")))
            .merge(Env::prefixed("APP_").split("__"))
            .join(Json::file("config/Config.json"))
            .extract()
            .with_context(|| format!("Failed to load config profile {profile}"))?;

        Ok(config)
    }

    fn base(path: &Path) -> Figment {
        let json = path.with_extension("json");
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("APP_").split("__"))
            .join(Json::file(json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunMode;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[orchestrator]\nenabled = true\nmode = \"SHADOW\"\nmax_daily_trades = 3\n\n[paper]\nslippage_bps = 10"
        )
        .unwrap();

        let config = ConfigLoader::load_from(&path).unwrap();
        assert!(config.orchestrator.enabled);
        assert_eq!(config.orchestrator.mode, RunMode::Shadow);
        assert_eq!(config.orchestrator.max_daily_trades, 3);
        assert_eq!(config.orchestrator.max_daily_loss, dec!(2500));
        assert_eq!(config.paper.slippage_bps, dec!(10));
    }
}
