//! Service configuration.
//!
//! Configuration is read from an optional TOML file; a missing file yields
//! the defaults below. The Anthropic API key can be placed in the file but
//! the `ANTHROPIC_API_KEY` environment variable takes precedence, so the key
//! can stay out of version-controlled config.
//!
//! The retry count and request timeout for the upstream call are explicit
//! settings rather than client-library defaults, so they show up here and in
//! tests instead of being buried in an SDK.

use std::env;
use std::fs;
use std::path::Path;

use log::{debug, warn};
use serde::Deserialize;

use crate::error::Result;
use crate::ratelimit::RateLimitSettings;

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// What to do when no API key is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMode {
    /// Refuse generation with a 503. The right choice in production, where a
    /// silently degraded service would mask a deployment mistake.
    Strict,
    /// Serve the deterministic fallback scenarios. Useful in development so
    /// the full request path works without a key.
    Fallback,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bind address for the HTTP server.
    pub addr: String,
    /// Anthropic API key; prefer the `ANTHROPIC_API_KEY` env variable.
    pub api_key: String,
    /// Model identifier sent to the Messages API.
    pub model: String,
    /// Override for the API base URL, mainly for tests.
    pub base_url: Option<String>,
    /// Output token budget for one generation.
    pub max_tokens: u32,
    /// Sampling temperature; low-moderate favors consistent structure.
    pub temperature: f32,
    /// Hard timeout for one upstream request, in seconds.
    pub timeout_secs: u64,
    /// Retry budget for transient transport failures.
    pub max_retries: u32,
    /// Missing-credential policy.
    pub credential_mode: CredentialMode,
    /// Admission control settings.
    pub rate_limit: RateLimitSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:3000".to_string(),
            api_key: String::new(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            base_url: None,
            max_tokens: 3000,
            temperature: 0.6,
            timeout_secs: 30,
            max_retries: 2,
            credential_mode: CredentialMode::Strict,
            rate_limit: RateLimitSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist, then apply the environment override for the API
    /// key.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str::<Config>(&content)?
        } else {
            debug!("no config file at {}, using defaults", path.display());
            Config::default()
        };

        if let Ok(key) = env::var(API_KEY_ENV) {
            if !key.is_empty() {
                debug!("using API key from {API_KEY_ENV}");
                config.api_key = key;
            }
        } else if !config.api_key.is_empty() {
            warn!("using API key from config file; consider the {API_KEY_ENV} environment variable instead");
        }

        Ok(config)
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Masks an API key for logging purposes.
pub fn mask_api_key(api_key: &str) -> String {
    if api_key.len() <= 8 {
        return "[API_KEY_TOO_SHORT]".to_string();
    }
    format!("{}...{}", &api_key[..4], &api_key[api_key.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_strict_with_five_per_minute() {
        let config = Config::default();
        assert_eq!(config.credential_mode, CredentialMode::Strict);
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "credential_mode = \"fallback\"\n\n[rate_limit]\nmax_requests = 10\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.credential_mode, CredentialMode::Fallback);
        assert_eq!(config.rate_limit.max_requests, 10);
        // untouched settings keep their defaults
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.max_tokens, 3000);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.model, "claude-3-5-sonnet-20241022");
    }

    #[test]
    fn invalid_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid toml [").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(crate::error::ServiceError::Config(_))
        ));
    }

    #[test]
    fn mask_hides_the_middle_of_a_key() {
        assert_eq!(mask_api_key("sk-ant-abcdef123456"), "sk-a...3456");
        assert_eq!(mask_api_key("short"), "[API_KEY_TOO_SHORT]");
    }
}
