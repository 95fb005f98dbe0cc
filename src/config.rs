/// Client configuration, read from the environment with CLI overrides on top.
use std::time::Duration;

use crate::crypto::chunked::{HashMode, DEFAULT_STREAMING_THRESHOLD, WINDOW_SIZE};
use crate::error::{ProofError, Result};

pub const DEFAULT_BASE_URL: &str = "https://whatstask.com";
pub const DEFAULT_ANONYMOUS_USER_ID: &str = "anonymous";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the IP Proof API (e.g., "https://whatstask.com").
    pub api_url: String,
    /// Public site used in verification links and certificates.
    pub site_url: String,
    /// Hashing window size in bytes.
    pub chunk_size: usize,
    /// Files larger than this are hashed without buffering the whole file.
    pub streaming_threshold: u64,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// `userId` sent when the host has no signed-in user.
    pub anonymous_user_id: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            site_url: DEFAULT_BASE_URL.to_string(),
            chunk_size: WINDOW_SIZE,
            streaming_threshold: DEFAULT_STREAMING_THRESHOLD,
            request_timeout: Duration::from_secs(30),
            anonymous_user_id: DEFAULT_ANONYMOUS_USER_ID.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: std::env::var("WHATSTASK_API_URL").unwrap_or(defaults.api_url),
            site_url: std::env::var("WHATSTASK_SITE_URL").unwrap_or(defaults.site_url),
            chunk_size: std::env::var("WHATSTASK_CHUNK_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.chunk_size),
            streaming_threshold: std::env::var("WHATSTASK_STREAMING_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.streaming_threshold),
            request_timeout: std::env::var("WHATSTASK_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            anonymous_user_id: std::env::var("WHATSTASK_ANONYMOUS_USER_ID")
                .unwrap_or(defaults.anonymous_user_id),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(ProofError::Config("api_url must not be empty".into()));
        }
        if self.site_url.trim().is_empty() {
            return Err(ProofError::Config("site_url must not be empty".into()));
        }
        if self.chunk_size == 0 {
            return Err(ProofError::Config("chunk_size must be non-zero".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(ProofError::Config("request_timeout must be non-zero".into()));
        }
        Ok(())
    }

    pub fn hash_mode(&self) -> HashMode {
        HashMode::Auto {
            streaming_threshold: self.streaming_threshold,
        }
    }

    /// Site URL without a trailing slash.
    pub fn site_base(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_size, 2 * 1024 * 1024);
        assert_eq!(config.anonymous_user_id, "anonymous");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ClientConfig {
            chunk_size: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate(), Err(ProofError::Config(_))));

        let config = ClientConfig {
            api_url: "  ".into(),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_site_base_trims_slash() {
        let config = ClientConfig {
            site_url: "https://example.org/".into(),
            ..ClientConfig::default()
        };
        assert_eq!(config.site_base(), "https://example.org");
    }
}
