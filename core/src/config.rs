//! Configuration
//!
//! Layered, later wins:
//!
//! 1. built-in defaults
//! 2. TOML file: explicit path, else `LOUPE_CONFIG_PATH`, else `./loupe.toml` if present
//! 3. `LOUPE_*` environment variables (a `.env` file is loaded first)
//! 4. builder overrides (CLI flags)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::patch::Strategy;
use crate::sandbox::DEFAULT_MAX_STEPS;

pub const ENV_PREFIX: &str = "LOUPE";
pub const CONFIG_PATH_ENV: &str = "LOUPE_CONFIG_PATH";
pub const DEFAULT_CONFIG_FILE: &str = "loupe.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Quiet window before a source change executes
    pub debounce_ms: u64,
    /// Interpreter step budget per execution and per render
    pub max_steps: u64,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
    pub patch_strategy: Strategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            max_steps: DEFAULT_MAX_STEPS,
            log_filter: "info".to_string(),
            patch_strategy: Strategy::Structural,
        }
    }
}

impl Config {
    /// Load from file and environment with no overrides
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    debounce_ms: Option<u64>,
    max_steps: Option<u64>,
    log_filter: Option<String>,
    patch_strategy: Option<Strategy>,
}

impl ConfigBuilder {
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn debounce_ms(mut self, value: Option<u64>) -> Self {
        self.debounce_ms = value;
        self
    }

    pub fn max_steps(mut self, value: Option<u64>) -> Self {
        self.max_steps = value;
        self
    }

    pub fn log_filter(mut self, value: Option<String>) -> Self {
        self.log_filter = value;
        self
    }

    pub fn patch_strategy(mut self, value: Option<Strategy>) -> Self {
        self.patch_strategy = value;
        self
    }

    pub fn build(self) -> Result<Config> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();
        let mut builder = config::Config::builder()
            .set_default("debounce_ms", defaults.debounce_ms)?
            .set_default("max_steps", defaults.max_steps)?
            .set_default("log_filter", defaults.log_filter.clone())?
            .set_default("patch_strategy", defaults.patch_strategy.to_string())?;

        let explicit = self
            .config_path
            .clone()
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        builder = match &explicit {
            Some(path) => builder.add_source(config::File::from(path.as_path()).required(true)),
            None => builder
                .add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let mut config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .with_context(|| match &explicit {
                Some(path) => format!("Failed to load configuration from {}", path.display()),
                None => "Failed to load configuration".to_string(),
            })?;

        if let Some(v) = self.debounce_ms {
            config.debounce_ms = v;
        }
        if let Some(v) = self.max_steps {
            config.max_steps = v;
        }
        if let Some(v) = self.log_filter {
            config.log_filter = v;
        }
        if let Some(v) = self.patch_strategy {
            config.patch_strategy = v;
        }
        if config.max_steps == 0 {
            anyhow::bail!("max_steps must be greater than zero");
        }
        debug!(?config, "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("loupe-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.debounce(), Duration::from_millis(300));
        assert_eq!(config.max_steps, 1_000_000);
        assert_eq!(config.patch_strategy, Strategy::Structural);
    }

    #[test]
    fn test_file_then_overrides() {
        let path = write_temp("debounce_ms = 50\npatch_strategy = \"heuristic\"\n");
        let config = Config::builder()
            .config_path(Some(path.clone()))
            .max_steps(Some(5000))
            .build()
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.patch_strategy, Strategy::Heuristic);
        assert_eq!(config.max_steps, 5000);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join("loupe-does-not-exist.toml");
        let err = Config::builder().config_path(Some(path)).build().unwrap_err();
        assert!(err.to_string().contains("loupe-does-not-exist.toml"));
    }

    #[test]
    fn test_zero_budget_rejected() {
        assert!(Config::builder().max_steps(Some(0)).build().is_err());
    }

    #[test]
    fn test_toml_output_reloads() {
        let config = Config {
            debounce_ms: 120,
            ..Config::default()
        };
        let text = config.to_toml().unwrap();
        assert!(text.contains("debounce_ms = 120"));
        assert!(text.contains("patch_strategy = \"structural\""));
        let path = write_temp(&text);
        let reloaded = Config::builder().config_path(Some(path.clone())).build().unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(reloaded, config);
    }
}
