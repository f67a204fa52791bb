// src/config/loader.rs
//! Layered loading of `ManagerSettings`
//!
//! Defaults, then each existing settings file in order, then `BERT_*`
//! environment variables.

use crate::config::constants::paths;
use crate::config::{ManagerSettings, ValidationError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),
    #[error("Configuration parse error: {0}")]
    Parse(String),
    #[error("Configuration validation errors: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
    #[error("IO error: {0}")]
    Io(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => ConfigError::NotFound(key),
            other => ConfigError::Parse(other.to_string()),
        }
    }
}

/// Settings loader over a list of candidate files
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    /// Loader reading `bert.toml` from the working directory
    pub fn new() -> Self {
        Self::with_paths(vec![PathBuf::from(paths::DEFAULT_CONFIG_FILE)])
    }

    /// Loader with custom paths, later files override earlier ones
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            env_prefix: paths::ENV_PREFIX.to_string(),
        }
    }

    /// Use a different environment prefix
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Candidate files in precedence order
    pub fn paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    /// Merge every source and validate the result
    pub fn load(&self) -> Result<ManagerSettings, ConfigError> {
        let mut builder = config::Config::builder();

        for path in &self.config_paths {
            builder = builder.add_source(config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix).try_parsing(true),
        );

        let settings: ManagerSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;

        tracing::debug!(
            sources = self.config_paths.len(),
            sample_interval_ms = settings.sample_interval_ms,
            "manager settings loaded"
        );
        Ok(settings)
    }

    /// Check a single file without merging
    pub fn validate_file<P: AsRef<Path>>(&self, path: P) -> Result<ManagerSettings, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        ManagerSettings::from_toml_str(&content)
    }

    /// Write settings as TOML
    pub fn export<P: AsRef<Path>>(&self, settings: &ManagerSettings, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, settings.to_toml_string()?)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_missing_files_give_defaults() {
        let loader = ConfigLoader::with_paths(vec![PathBuf::from("/nonexistent/bert.toml")]);
        let settings = loader.load().unwrap();
        assert_eq!(settings, ManagerSettings::default());
    }

    #[test]
    #[serial]
    fn test_later_file_overrides_earlier() {
        let base = toml_file("sample_interval_ms = 50\nrx_lock_retries = 5\n");
        let local = toml_file("sample_interval_ms = 10\n");

        let loader = ConfigLoader::with_paths(vec![base.path().into(), local.path().into()]);
        let settings = loader.load().unwrap();
        assert_eq!(settings.sample_interval_ms, 10);
        assert_eq!(settings.rx_lock_retries, 5);
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        std::env::set_var("BERTTEST_HISTOGRAM_TIMEOUT_MS", "750");

        let loader = ConfigLoader::with_paths(Vec::new()).with_env_prefix("BERTTEST");
        let settings = loader.load().unwrap();
        assert_eq!(settings.histogram_timeout_ms, 750);

        std::env::remove_var("BERTTEST_HISTOGRAM_TIMEOUT_MS");
    }

    #[test]
    #[serial]
    fn test_invalid_file_rejected() {
        let file = toml_file("buffer_capacity = 0\n");
        let loader = ConfigLoader::with_paths(vec![file.path().into()]);
        assert!(matches!(loader.load(), Err(ConfigError::Validation(_))));
        assert!(loader.validate_file(file.path()).is_err());
    }

    #[test]
    fn test_export_round_trip() {
        let loader = ConfigLoader::new();
        let file = NamedTempFile::new().unwrap();
        let mut settings = ManagerSettings::default();
        settings.monitor_settle_ms = 100;

        loader.export(&settings, file.path()).unwrap();
        assert_eq!(loader.validate_file(file.path()).unwrap(), settings);
    }
}
