//! Configuration management

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use crate::core::errors::{ExplainerError, Result};
use crate::core::models::PairMatch;

/// Default location of the interaction table
pub const DEFAULT_DATASET_PATH: &str = "data/with_cuis_semantic_unique.csv";
/// UMLS ticket-granting endpoint
pub const DEFAULT_AUTH_ENDPOINT: &str = "https://utslogin.nlm.nih.gov/cas/v1/api-key";
/// Service name service tickets are issued for
pub const DEFAULT_UMLS_SERVICE: &str = "http://umls.nlm.nih.gov";
/// UMLS content endpoint, definitions live under `/CUI/{cui}/definitions`
pub const DEFAULT_CONTENT_ENDPOINT: &str = "https://uts-ws.nlm.nih.gov/rest/content/current";
/// Local text-to-text inference server
pub const DEFAULT_SIMPLIFIER_ENDPOINT: &str = "http://127.0.0.1:8080/generate";

/// Configuration for the explainer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainerConfig {
    pub dataset_path: PathBuf,
    pub umls_api_key: Option<String>,
    pub umls_auth_endpoint: String,
    pub umls_service: String,
    pub umls_content_endpoint: String,
    pub simplifier_endpoint: String,
    pub simplifier_api_key: Option<String>,
    pub simplifier_prefix: String,
    pub simplifier_max_new_tokens: u32,
    pub simplifier_max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_ms: u64,
    pub pair_match: PairMatch,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            umls_api_key: None,
            umls_auth_endpoint: DEFAULT_AUTH_ENDPOINT.to_string(),
            umls_service: DEFAULT_UMLS_SERVICE.to_string(),
            umls_content_endpoint: DEFAULT_CONTENT_ENDPOINT.to_string(),
            simplifier_endpoint: DEFAULT_SIMPLIFIER_ENDPOINT.to_string(),
            simplifier_api_key: None,
            simplifier_prefix: "simplify: ".to_string(),
            simplifier_max_new_tokens: 128,
            simplifier_max_retries: 2,
            retry_delay_ms: 1000,
            timeout_ms: 30000,
            pair_match: PairMatch::Ordered,
        }
    }
}

/// Read a non-empty env var
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an env var, falling back to `default` when unset
fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env_opt(name) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ExplainerError::Config {
            message: format!("{}: {}", name, e),
        }),
        None => Ok(default),
    }
}

fn config_error(message: &str) -> ExplainerError {
    ExplainerError::Config {
        message: message.to_string(),
    }
}

impl ExplainerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let dataset_path = env_opt("DATASET_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.dataset_path);

        let umls_auth_endpoint =
            env_opt("UMLS_AUTH_ENDPOINT").unwrap_or(defaults.umls_auth_endpoint);

        let umls_service = env_opt("UMLS_SERVICE").unwrap_or(defaults.umls_service);

        let umls_content_endpoint =
            env_opt("UMLS_CONTENT_ENDPOINT").unwrap_or(defaults.umls_content_endpoint);

        let simplifier_endpoint =
            env_opt("SIMPLIFIER_ENDPOINT").unwrap_or(defaults.simplifier_endpoint);

        let simplifier_prefix = std::env::var("SIMPLIFIER_PREFIX")
            .unwrap_or(defaults.simplifier_prefix);

        Ok(Self {
            dataset_path,
            umls_api_key: env_opt("UMLS_API_KEY"),
            umls_auth_endpoint,
            umls_service,
            umls_content_endpoint,
            simplifier_endpoint,
            simplifier_api_key: env_opt("SIMPLIFIER_API_KEY"),
            simplifier_prefix,
            simplifier_max_new_tokens: env_parse("SIMPLIFIER_MAX_NEW_TOKENS", 128)?,
            simplifier_max_retries: env_parse("SIMPLIFIER_MAX_RETRIES", 2)?,
            retry_delay_ms: env_parse("RETRY_DELAY_MS", 1000)?,
            timeout_ms: env_parse("REQUEST_TIMEOUT_MS", 30000)?,
            pair_match: env_parse("PAIR_MATCH", PairMatch::Ordered)?,
        })
    }

    /// Load from a JSON or YAML file, chosen by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = if is_yaml(path) {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml(path) {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve configuration: an explicit file wins, otherwise the environment.
    ///
    /// The API key stays out-of-band: a file without one picks up `UMLS_API_KEY`.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config = match file {
            Some(path) => Self::from_file(path)?.with_fallback_api_key(env_opt("UMLS_API_KEY")),
            None => Self::from_env()?,
        };

        if config.umls_api_key.is_none() {
            warn!("UMLS_API_KEY not set, definition lookups are disabled");
        }

        Ok(config)
    }

    /// Use `key` when no API key is configured
    pub fn with_fallback_api_key(mut self, key: Option<String>) -> Self {
        if self.umls_api_key.is_none() {
            self.umls_api_key = key;
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.dataset_path.as_os_str().is_empty() {
            return Err(config_error("dataset path is required"));
        }

        if self.simplifier_endpoint.is_empty() {
            return Err(config_error("simplifier endpoint is required"));
        }

        if self.umls_api_key.is_some()
            && (self.umls_auth_endpoint.is_empty()
                || self.umls_service.is_empty()
                || self.umls_content_endpoint.is_empty())
        {
            return Err(config_error("UMLS endpoints are required when an API key is set"));
        }

        if self.timeout_ms == 0 {
            return Err(config_error("timeout_ms must be greater than 0"));
        }

        Ok(())
    }

    /// Whether definition lookups can be made
    pub fn definitions_enabled(&self) -> bool {
        self.umls_api_key.is_some()
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let config = ExplainerConfig {
            umls_api_key: Some("test_key".to_string()),
            ..Default::default()
        };

        assert!(config.validate().is_ok());
        assert!(config.definitions_enabled());
    }

    #[test]
    fn test_config_validation_missing_endpoint() {
        let config = ExplainerConfig {
            simplifier_endpoint: "".to_string(),
            ..Default::default()
        };

        assert!(matches!(config.validate(), Err(ExplainerError::Config { .. })));
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let config = ExplainerConfig {
            timeout_ms: 0,
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_file_round_trip_keeps_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explainer.yaml");

        let config = ExplainerConfig {
            dataset_path: PathBuf::from("pairs.csv"),
            pair_match: PairMatch::Unordered,
            ..Default::default()
        };
        config.to_file(&path).unwrap();

        let loaded = ExplainerConfig::from_file(&path).unwrap();
        assert_eq!(loaded.dataset_path, PathBuf::from("pairs.csv"));
        assert_eq!(loaded.pair_match, PairMatch::Unordered);
        assert!(loaded.umls_api_key.is_none());
    }

    #[test]
    fn test_partial_json_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explainer.json");
        std::fs::write(&path, r#"{"umls_api_key": "abc", "timeout_ms": 5000}"#).unwrap();

        let loaded = ExplainerConfig::from_file(&path).unwrap();
        assert_eq!(loaded.umls_api_key.as_deref(), Some("abc"));
        assert_eq!(loaded.timeout_ms, 5000);
        assert_eq!(loaded.umls_auth_endpoint, DEFAULT_AUTH_ENDPOINT);
        assert_eq!(loaded.umls_service, DEFAULT_UMLS_SERVICE);
    }

    #[test]
    fn test_file_errors_are_typed() {
        let dir = tempfile::tempdir().unwrap();

        let missing = ExplainerConfig::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, ExplainerError::IoError(_)));

        let json = dir.path().join("broken.json");
        std::fs::write(&json, "{not json").unwrap();
        let err = ExplainerConfig::from_file(&json).unwrap_err();
        assert!(matches!(err, ExplainerError::JsonError(_)));

        let yaml = dir.path().join("broken.yaml");
        std::fs::write(&yaml, "timeout_ms: [1, 2").unwrap();
        let err = ExplainerConfig::from_file(&yaml).unwrap_err();
        assert!(matches!(err, ExplainerError::YamlError(_)));
    }

    #[test]
    fn test_file_without_key_takes_env_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explainer.json");
        std::fs::write(&path, r#"{"timeout_ms": 5000}"#).unwrap();

        let loaded = ExplainerConfig::from_file(&path)
            .unwrap()
            .with_fallback_api_key(Some("from-env".to_string()));
        assert_eq!(loaded.umls_api_key.as_deref(), Some("from-env"));
        assert!(loaded.definitions_enabled());
    }

    #[test]
    fn test_file_key_wins_over_env_key() {
        let config = ExplainerConfig {
            umls_api_key: Some("from-file".to_string()),
            ..Default::default()
        }
        .with_fallback_api_key(Some("from-env".to_string()));

        assert_eq!(config.umls_api_key.as_deref(), Some("from-file"));
    }
}
