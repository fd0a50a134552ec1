//! Runtime configuration
//!
//! Loaded once at startup from TOML and passed down by value; nothing reads
//! configuration globally. Every field has a default, so an empty file (or no
//! file) is a valid configuration. Secrets are never stored here: the
//! analysis API key is read from the environment variable named by
//! `analysis.api_key_env`.

use crate::capability::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::error::ConfigError;
use crate::normalize::ExchangeRates;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Raw document storage
    pub storage: StorageConfig,
    /// Extraction cache
    pub cache: CacheConfig,
    /// OCR backend and poll loop
    pub extraction: ExtractionConfig,
    /// Chat model used by the analyses
    pub analysis: AnalysisConfig,
    /// Entry node
    pub normalization: NormalizationConfig,
    /// Run limits
    pub orchestration: OrchestrationConfig,
}

/// Raw document storage settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory for uploads; in-memory when unset
    pub root: Option<PathBuf>,
}

/// Cache backend choice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local
    #[default]
    Memory,
    /// One file per digest
    Fs,
}

/// Extraction cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Backend
    pub backend: CacheBackend,
    /// Directory for the fs backend
    pub dir: PathBuf,
    /// Collapse concurrent misses on one digest
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            dir: PathBuf::from(".ria/cache"),
            single_flight: true,
        }
    }
}

/// OCR backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionConfig {
    /// Job API endpoint; the local text backend is used when unset
    pub endpoint: Option<String>,
    /// Delay between polls, in milliseconds
    pub poll_interval_ms: u64,
    /// Overall extraction deadline, in seconds
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            poll_interval_ms: 1_000,
            timeout_secs: 300,
        }
    }
}

impl ExtractionConfig {
    /// Poll interval
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Extraction deadline
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Chat model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// OpenAI-compatible base URL
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Per-request HTTP timeout, in seconds
    pub request_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            api_key_env: "GROQ_API_KEY".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl AnalysisConfig {
    /// Read the API key from the configured environment variable
    ///
    /// # Errors
    /// `ConfigError::MissingSecret` if the variable is unset or empty
    pub fn api_key(&self) -> Result<String, ConfigError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingSecret(self.api_key_env.clone())),
        }
    }

    /// Per-request timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Entry node implementation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationMode {
    /// Deterministic rate table
    #[default]
    Rates,
    /// Chat model
    Chat,
}

/// Entry node settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizationConfig {
    /// Implementation
    pub mode: NormalizationMode,
    /// Conversion rates into EUR
    pub rates: ExchangeRates,
}

/// Run limits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestrationConfig {
    /// Fan-out deadline, in seconds; unlimited when unset
    pub run_timeout_secs: Option<u64>,
}

impl OrchestrationConfig {
    /// Fan-out deadline
    #[inline]
    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load and validate a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io`, `Parse` or `Invalid`
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` or `Invalid`
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// `ConfigError::Render` if serialization fails
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        };

        if self.extraction.poll_interval_ms == 0 {
            return Err(invalid("extraction.poll_interval_ms", "must be positive"));
        }
        if self.extraction.timeout_secs == 0 {
            return Err(invalid("extraction.timeout_secs", "must be positive"));
        }
        if !(0.0..=2.0).contains(&self.analysis.temperature) {
            return Err(invalid("analysis.temperature", "must be within 0.0..=2.0"));
        }
        if self.analysis.api_key_env.trim().is_empty() {
            return Err(invalid("analysis.api_key_env", "must name a variable"));
        }
        let rates = &self.normalization.rates;
        for (field, rate) in [
            ("normalization.rates.eur", rates.eur),
            ("normalization.rates.usd", rates.usd),
            ("normalization.rates.gbp", rates.gbp),
        ] {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(invalid(field, "must be a positive number"));
            }
        }
        if self.orchestration.run_timeout_secs == Some(0) {
            return Err(invalid("orchestration.run_timeout_secs", "must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.extraction.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.extraction.timeout(), Duration::from_secs(300));
        assert_eq!(config.analysis.model, "llama-3.3-70b-versatile");
        assert_eq!(config.normalization.rates.usd, 0.91);
        assert!(config.cache.single_flight);
        assert_eq!(config.orchestration.run_timeout(), None);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [cache]
            backend = "fs"
            dir = "/var/cache/ria"

            [normalization.rates]
            gbp = 1.2

            [orchestration]
            run_timeout_secs = 90
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.backend, CacheBackend::Fs);
        assert_eq!(config.cache.dir, PathBuf::from("/var/cache/ria"));
        assert!(config.cache.single_flight);
        assert_eq!(config.normalization.rates.gbp, 1.2);
        assert_eq!(config.normalization.rates.usd, 0.91);
        assert_eq!(config.orchestration.run_timeout(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = Config::default();
        config.extraction.endpoint = Some("http://ocr.local".into());
        config.normalization.mode = NormalizationMode::Chat;

        let rendered = config.to_toml_string().unwrap();
        assert_eq!(Config::from_toml_str(&rendered).unwrap(), config);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(matches!(
            Config::from_toml_str("[cache]\nbackned = \"fs\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn out_of_range_values_rejected() {
        let err = Config::from_toml_str("[analysis]\ntemperature = 3.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "analysis.temperature", .. }));

        let err = Config::from_toml_str("[normalization.rates]\nusd = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "normalization.rates.usd", .. }));

        let err = Config::from_toml_str("[extraction]\npoll_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn missing_api_key_reported_by_name() {
        let analysis = AnalysisConfig {
            api_key_env: "RIA_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            analysis.api_key(),
            Err(ConfigError::MissingSecret(ref name)) if name == "RIA_TEST_KEY_THAT_IS_NEVER_SET"
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ria.toml");
        std::fs::write(&path, "[storage]\nroot = \"/tmp/ria\"\n").unwrap();

        let config = Config::from_path(&path).unwrap();
        assert_eq!(config.storage.root, Some(PathBuf::from("/tmp/ria")));

        assert!(matches!(
            Config::from_path(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
