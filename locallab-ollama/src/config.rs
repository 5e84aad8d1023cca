//! Client configuration

use crate::error::{OllamaError, OllamaResult};
use std::time::Duration;

/// Configuration for the Ollama client
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server
    pub base_url: String,

    /// Whole-request timeout. Generations on large models are slow, so this
    /// is generous.
    pub timeout: Duration,

    pub connect_timeout: Duration,

    /// Retries after a connection failure. Timeouts and HTTP errors are
    /// never retried.
    pub max_retries: u32,

    pub retry_initial_backoff: Duration,

    pub retry_max_backoff: Duration,

    pub user_agent: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(5),
            max_retries: 1,
            retry_initial_backoff: Duration::from_millis(250),
            retry_max_backoff: Duration::from_secs(5),
            user_agent: format!("locallab/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl OllamaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn builder(base_url: impl Into<String>) -> OllamaConfigBuilder {
        OllamaConfigBuilder {
            config: Self::new(base_url),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.retry_initial_backoff = initial;
        self.retry_max_backoff = max;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn validate(&self) -> OllamaResult<()> {
        if self.base_url.is_empty() {
            return Err(OllamaError::Configuration(
                "Base URL cannot be empty".to_string(),
            ));
        }

        let url = url::Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(OllamaError::Configuration(format!(
                "Unsupported URL scheme '{}'",
                url.scheme()
            )));
        }

        if self.timeout.is_zero() {
            return Err(OllamaError::Configuration(
                "Timeout cannot be zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`OllamaConfig`]
#[derive(Debug, Default)]
pub struct OllamaConfigBuilder {
    config: OllamaConfig,
}

impl OllamaConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn retry_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.config.retry_initial_backoff = initial;
        self.config.retry_max_backoff = max;
        self
    }

    pub fn build(self) -> OllamaConfig {
        self.config
    }
}
