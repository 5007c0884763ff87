//! Layered configuration for building a [`Client`].
//!
//! Values are resolved with the following precedence (highest to lowest):
//! 1. Environment variables prefixed with `GITLAB_PROVIDER_`; nested keys use
//!    a double underscore (`GITLAB_PROVIDER_RETRY__MAX_RETRIES=3`)
//! 2. An optional TOML file
//! 3. Built-in defaults
//!
//! Example file:
//! ```toml
//! domain = "gitlab.example.com"
//! token = "glpat-..."          # or GITLAB_PROVIDER_TOKEN
//! token_type = "personal"      # personal | oauth | job
//! enable_destructive_calls = false
//! timeout_secs = 30
//! page_size = 100
//!
//! [retry]
//! enabled = true
//! min_delay_ms = 1000
//! max_delay_ms = 60000
//! max_retries = 5
//! jitter = true
//!
//! [merge_poll]
//! attempts = 10
//! interval_secs = 2
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat, Map};
use serde::Deserialize;

use crate::client::{Client, ClientOptions, DEFAULT_TIMEOUT};
use crate::errors::{ProviderError, Result};
use crate::gitlab::TokenType;
use crate::gitlab::pagination::PAGE_SIZE;
use crate::refs::DEFAULT_DOMAIN;
use crate::retry::{
    INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_RETRIES, MERGE_POLL_ATTEMPTS, MERGE_POLL_INTERVAL,
    MergePollConfig, RetryConfig,
};

/// Prefix of the environment variables read by [`ProviderConfig::load`].
pub const ENV_PREFIX: &str = "GITLAB_PROVIDER";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// GitLab host, optionally with scheme and port.
    pub domain: String,
    /// Access token. Anonymous when unset.
    pub token: Option<String>,
    pub token_type: TokenType,
    /// Allow repository deletion.
    pub enable_destructive_calls: bool,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Items requested per page (1-100).
    pub page_size: u32,
    pub retry: RetrySettings,
    pub merge_poll: MergePollSettings,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            token: None,
            token_type: TokenType::default(),
            enable_destructive_calls: false,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            page_size: PAGE_SIZE,
            retry: RetrySettings::default(),
            merge_poll: MergePollSettings::default(),
        }
    }
}

/// Transport-level retry of transient failures.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub enabled: bool,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_retries: usize,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            min_delay_ms: INITIAL_BACKOFF_MS,
            max_delay_ms: MAX_BACKOFF_MS,
            max_retries: MAX_RETRIES,
            jitter: true,
        }
    }
}

/// Mergeability polling before a merge.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MergePollSettings {
    pub attempts: usize,
    pub interval_secs: u64,
}

impl Default for MergePollSettings {
    fn default() -> Self {
        Self {
            attempts: MERGE_POLL_ATTEMPTS,
            interval_secs: MERGE_POLL_INTERVAL.as_secs(),
        }
    }
}

impl ProviderConfig {
    /// Load from an optional TOML file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Parse a TOML document on top of the defaults. The environment is not read.
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;
        Self::finish(settings)
    }

    /// Like [`load`](Self::load), but reads variables from `env` instead of
    /// the process environment when given.
    pub fn load_with_env(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        Self::finish(builder.build()?)
    }

    fn finish(settings: ConfigBuilder) -> Result<Self> {
        let config: Self = settings.try_deserialize()?;
        config.check()?;
        tracing::debug!(
            domain = %config.domain,
            authenticated = config.token.is_some(),
            retry = config.retry.enabled,
            "Loaded provider configuration"
        );
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(ProviderError::config("domain must not be empty"));
        }
        if !(1..=PAGE_SIZE).contains(&self.page_size) {
            return Err(ProviderError::config(format!(
                "page_size must be between 1 and {PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.merge_poll.attempts == 0 {
            return Err(ProviderError::config("merge_poll.attempts must be at least 1"));
        }
        if self.retry.min_delay_ms > self.retry.max_delay_ms {
            return Err(ProviderError::config(
                "retry.min_delay_ms must not exceed retry.max_delay_ms",
            ));
        }
        Ok(())
    }

    /// Client options equivalent to this configuration.
    pub fn to_options(&self) -> ClientOptions {
        let mut options = ClientOptions::new()
            .with_domain(self.domain.clone())
            .with_token_type(self.token_type)
            .with_destructive_calls(self.enable_destructive_calls)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_page_size(self.page_size)
            .with_merge_poll(MergePollConfig {
                attempts: self.merge_poll.attempts,
                interval: Duration::from_secs(self.merge_poll.interval_secs),
            });

        if self.retry.enabled {
            options = options.with_retry(
                RetryConfig::new(
                    Duration::from_millis(self.retry.min_delay_ms),
                    Duration::from_millis(self.retry.max_delay_ms),
                    self.retry.max_retries,
                )
                .with_jitter(self.retry.jitter),
            );
        }
        options
    }
}

impl Client {
    /// Build a client from loaded configuration. `options` supplies anything
    /// configuration cannot express (transport, layers); its other fields are
    /// replaced by the configured values.
    pub fn from_config(config: &ProviderConfig, options: ClientOptions) -> Result<Self> {
        let configured = config.to_options();
        let merged = ClientOptions {
            transport: options.transport,
            pre_chain: options.pre_chain,
            post_chain: options.post_chain,
            ..configured
        };
        Client::new(config.token.as_deref(), merged)
    }
}
