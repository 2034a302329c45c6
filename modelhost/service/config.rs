use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use modelhost_learning::{Algorithm, TrainerSettings};
use serde::Deserialize;
use shared_logging::LogLevel;

/// Environment variable supplying the listen port when neither the CLI nor the file sets one.
pub const PORT_ENV: &str = "MODELHOST_PORT";
/// Listen port used when nothing else sets one.
pub const DEFAULT_PORT: u16 = 5000;

/// Service configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerSection,
    /// Remote registry settings.
    #[serde(default)]
    pub registry: RegistrySection,
    /// Evaluation procedure.
    #[serde(default)]
    pub training: TrainingSection,
    /// Structured log sink.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl ServiceConfig {
    /// Loads and validates a TOML file; relative log paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading service config {}", path.display()))?;
        let mut config =
            Self::from_toml_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        let source_dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        if let Some(log_path) = config.logging.path.as_mut() {
            if log_path.is_relative() {
                *log_path = source_dir.join(&*log_path);
            }
        }
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        let training = &self.training;
        if !(training.test_fraction > 0.0 && training.test_fraction < 1.0) {
            bail!(
                "training.test_fraction must be in (0, 1), got {}",
                training.test_fraction
            );
        }
        if training.folds < 2 {
            bail!("training.folds must be at least 2, got {}", training.folds);
        }
        if self.server.workers == Some(0) {
            bail!("server.workers must be positive");
        }
        if self.registry.fetch_timeout_ms == 0 || self.registry.publish_timeout_ms == 0 {
            bail!("registry timeouts must be positive");
        }
        if let Some(base) = &self.registry.base_url {
            reqwest::Url::parse(base)
                .with_context(|| format!("registry.base_url {base} is not a url"))?;
        }
        training
            .default_algorithm
            .parse::<Algorithm>()
            .with_context(|| format!("training.default_algorithm {}", training.default_algorithm))?;
        self.logging
            .level
            .parse::<LogLevel>()
            .context("logging.level")?;
        Ok(())
    }

    /// Listen port: `cli`, then the file, then [`PORT_ENV`], then [`DEFAULT_PORT`].
    pub fn port(&self, cli: Option<u16>) -> Result<u16> {
        if let Some(port) = cli.or(self.server.port) {
            return Ok(port);
        }
        match env::var(PORT_ENV) {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("{PORT_ENV}={raw} is not a port")),
            Err(_) => Ok(DEFAULT_PORT),
        }
    }

    /// Evaluation settings for the trainer.
    #[must_use]
    pub const fn trainer_settings(&self) -> TrainerSettings {
        TrainerSettings {
            seed: self.training.seed,
            test_fraction: self.training.test_fraction,
            folds: self.training.folds,
        }
    }

    /// Algorithm used when a request leaves it empty.
    pub fn default_algorithm(&self) -> Result<Algorithm> {
        Ok(self.training.default_algorithm.parse()?)
    }

    /// Minimum structured log level.
    pub fn log_level(&self) -> Result<LogLevel> {
        self.logging.level.parse()
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Listen address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Listen port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Worker threads; actix picks when absent.
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: None,
            workers: None,
        }
    }
}

/// `[registry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySection {
    /// Fixed registry base; inferred from each request's data URL when absent.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Answer 201 for every JSON registry reply.
    #[serde(default = "default_true")]
    pub force_created_status: bool,
    /// Timeout for data-source downloads.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Timeout for registry uploads.
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
}

impl RegistrySection {
    /// Download timeout.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Upload timeout.
    #[must_use]
    pub const fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            base_url: None,
            force_created_status: true,
            fetch_timeout_ms: default_fetch_timeout_ms(),
            publish_timeout_ms: default_publish_timeout_ms(),
        }
    }
}

/// `[training]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingSection {
    /// Seed for the split and fold shuffles.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Held-out share per class.
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Cross-validation folds.
    #[serde(default = "default_folds")]
    pub folds: usize,
    /// Algorithm tag used when a request has none.
    #[serde(default = "default_algorithm_tag")]
    pub default_algorithm: String,
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            test_fraction: default_test_fraction(),
            folds: default_folds(),
            default_algorithm: default_algorithm_tag(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// JSON-lines file; stderr when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Minimum level.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            path: None,
            level: default_level(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".into()
}

const fn default_true() -> bool {
    true
}

const fn default_fetch_timeout_ms() -> u64 {
    30_000
}

const fn default_publish_timeout_ms() -> u64 {
    60_000
}

const fn default_seed() -> u64 {
    1
}

const fn default_test_fraction() -> f64 {
    0.25
}

const fn default_folds() -> usize {
    10
}

fn default_algorithm_tag() -> String {
    Algorithm::default().tag().into()
}

fn default_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_document_uses_defaults() {
        let config = ServiceConfig::from_toml_str("").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1");
        assert!(config.registry.force_created_status);
        assert_eq!(config.registry.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.trainer_settings(), TrainerSettings::default());
        assert_eq!(config.default_algorithm().unwrap(), Algorithm::Svc);
        assert_eq!(config.log_level().unwrap(), LogLevel::Info);
        assert_eq!(config.port(Some(8080)).unwrap(), 8080);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(ServiceConfig::from_toml_str("[training]\ntest_fraction = 1.0\n").is_err());
        assert!(ServiceConfig::from_toml_str("[training]\nfolds = 1\n").is_err());
        assert!(ServiceConfig::from_toml_str("[training]\ndefault_algorithm = \"knn\"\n").is_err());
        assert!(ServiceConfig::from_toml_str("[logging]\nlevel = \"loud\"\n").is_err());
        assert!(ServiceConfig::from_toml_str("[registry]\nbase_url = \"not a url\"\n").is_err());
    }

    #[test]
    fn load_resolves_relative_log_path() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("modelhost.toml");
        std::fs::write(
            &path,
            "[server]\nport = 6001\n\n[registry]\nforce_created_status = false\n\n[logging]\npath = \"logs/service.jsonl\"\nlevel = \"debug\"\n",
        )
        .unwrap();
        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.port(None).unwrap(), 6001);
        assert!(!config.registry.force_created_status);
        assert_eq!(
            config.logging.path.as_deref(),
            Some(tmp.path().join("logs/service.jsonl").as_path())
        );
        assert_eq!(config.log_level().unwrap(), LogLevel::Debug);
    }
}
