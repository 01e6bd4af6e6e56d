//! Session configuration
//!
//! Defaults match the hosted wizard. A TOML file may override any field, and
//! `NAAVI_*` environment variables override the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 1 MiB
const MIB: u64 = 1024 * 1024;

/// Environment variable overriding [`SessionConfig::api_base_url`]
pub const ENV_API_BASE_URL: &str = "NAAVI_API_BASE_URL";
/// Environment variable overriding [`SessionConfig::validation_debounce_ms`]
pub const ENV_VALIDATION_DEBOUNCE_MS: &str = "NAAVI_VALIDATION_DEBOUNCE_MS";
/// Environment variable overriding [`SessionConfig::autosave_debounce_ms`]
pub const ENV_AUTOSAVE_DEBOUNCE_MS: &str = "NAAVI_AUTOSAVE_DEBOUNCE_MS";
/// Environment variable overriding [`SessionConfig::upload_timeout_secs`]
pub const ENV_UPLOAD_TIMEOUT_SECS: &str = "NAAVI_UPLOAD_TIMEOUT_SECS";
/// Environment variable overriding [`SessionConfig::draft_dir`]
pub const ENV_DRAFT_DIR: &str = "NAAVI_DRAFT_DIR";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("cannot read config {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`SessionConfig`]
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Environment override does not parse
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
    },
}

/// File upload limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadLimits {
    /// Largest accepted single file
    pub max_single_file_bytes: u64,
    /// Budget for everything uploaded in one session
    pub max_total_upload_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_single_file_bytes: 30 * MIB,
            max_total_upload_bytes: 300 * MIB,
        }
    }
}

/// Questionnaire session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Backend base URL
    pub api_base_url: String,
    /// Quiet period before validation is recomputed
    pub validation_debounce_ms: u64,
    /// Quiet period before the local draft is written
    pub autosave_debounce_ms: u64,
    /// Bound on one upload batch
    pub upload_timeout_secs: u64,
    /// Upload limits
    pub limits: UploadLimits,
    /// Directory for persisted drafts; in-memory when unset
    pub draft_dir: Option<PathBuf>,
    /// How long a fetched remote questionnaire is reused
    pub remote_cache_ttl_secs: u64,
    /// Maximum cached remote questionnaires
    pub remote_cache_capacity: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5004".to_string(),
            validation_debounce_ms: 500,
            autosave_debounce_ms: 1000,
            upload_timeout_secs: 30,
            limits: UploadLimits::default(),
            draft_dir: None,
            remote_cache_ttl_secs: 60,
            remote_cache_capacity: 64,
        }
    }
}

impl SessionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With backend base URL
    #[inline]
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// With validation debounce window
    #[inline]
    #[must_use]
    pub fn with_validation_debounce_ms(mut self, ms: u64) -> Self {
        self.validation_debounce_ms = ms;
        self
    }

    /// With autosave debounce window
    #[inline]
    #[must_use]
    pub fn with_autosave_debounce_ms(mut self, ms: u64) -> Self {
        self.autosave_debounce_ms = ms;
        self
    }

    /// With upload timeout
    #[inline]
    #[must_use]
    pub fn with_upload_timeout_secs(mut self, secs: u64) -> Self {
        self.upload_timeout_secs = secs;
        self
    }

    /// With upload limits
    #[inline]
    #[must_use]
    pub fn with_limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    /// With draft directory
    #[inline]
    #[must_use]
    pub fn with_draft_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.draft_dir = Some(dir.into());
        self
    }

    /// Validation debounce window
    #[must_use]
    pub fn validation_debounce(&self) -> Duration {
        Duration::from_millis(self.validation_debounce_ms)
    }

    /// Autosave debounce window
    #[must_use]
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Upload batch timeout
    #[must_use]
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    /// Remote snapshot time-to-live
    #[must_use]
    pub fn remote_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.remote_cache_ttl_secs)
    }

    /// Parse from TOML; missing fields keep their defaults
    ///
    /// # Errors
    /// Returns `ConfigError::Toml` on malformed input.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load a TOML file, then apply environment overrides
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed, or an
    /// override is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)?.apply_env_from(|var| std::env::var(var).ok())
    }

    /// Defaults with environment overrides
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidEnv` when an override does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env_from(|var| std::env::var(var).ok())
    }

    /// Apply `NAAVI_*` overrides read through `lookup`
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidEnv` when a numeric override does not parse.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |var: &'static str| -> Result<Option<u64>, ConfigError> {
            match lookup(var) {
                None => Ok(None),
                Some(value) => value
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| ConfigError::InvalidEnv { var, value }),
            }
        };

        if let Some(ms) = number(ENV_VALIDATION_DEBOUNCE_MS)? {
            self.validation_debounce_ms = ms;
        }
        if let Some(ms) = number(ENV_AUTOSAVE_DEBOUNCE_MS)? {
            self.autosave_debounce_ms = ms;
        }
        if let Some(secs) = number(ENV_UPLOAD_TIMEOUT_SECS)? {
            self.upload_timeout_secs = secs;
        }
        if let Some(url) = lookup(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(dir) = lookup(ENV_DRAFT_DIR).filter(|d| !d.is_empty()) {
            self.draft_dir = Some(PathBuf::from(dir));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.validation_debounce(), Duration::from_millis(500));
        assert_eq!(config.autosave_debounce(), Duration::from_secs(1));
        assert_eq!(config.upload_timeout(), Duration::from_secs(30));
        assert_eq!(config.limits.max_single_file_bytes, 30 * 1024 * 1024);
        assert_eq!(config.limits.max_total_upload_bytes, 300 * 1024 * 1024);
        assert!(config.draft_dir.is_none());
    }

    #[test]
    fn toml_overrides_only_given_fields() {
        let config = SessionConfig::from_toml_str(
            r#"
            api_base_url = "https://naavi.example"
            upload_timeout_secs = 5

            [limits]
            max_single_file_bytes = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.api_base_url, "https://naavi.example");
        assert_eq!(config.upload_timeout_secs, 5);
        assert_eq!(config.limits.max_single_file_bytes, 1024);
        assert_eq!(config.limits.max_total_upload_bytes, 300 * 1024 * 1024);
        assert_eq!(config.validation_debounce_ms, 500);
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_BASE_URL, "http://backend:5004"),
            (ENV_VALIDATION_DEBOUNCE_MS, "250"),
            (ENV_DRAFT_DIR, "/var/lib/naavi"),
        ]
        .into_iter()
        .collect();

        let config = SessionConfig::default()
            .apply_env_from(|var| env.get(var).map(ToString::to_string))
            .unwrap();
        assert_eq!(config.api_base_url, "http://backend:5004");
        assert_eq!(config.validation_debounce_ms, 250);
        assert_eq!(config.autosave_debounce_ms, 1000);
        assert_eq!(config.draft_dir, Some(PathBuf::from("/var/lib/naavi")));
    }

    #[test]
    fn invalid_env_is_rejected() {
        let err = SessionConfig::default()
            .apply_env_from(|var| (var == ENV_UPLOAD_TIMEOUT_SECS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv { var: ENV_UPLOAD_TIMEOUT_SECS, .. }
        ));
    }
}
