//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keychain service name holding runtime credentials.
const KEYRING_SERVICE: &str = "helpdesk-workflow";

/// Outbound SMTP relay settings.
///
/// The password is loaded at runtime via OS keychain or environment
/// variable, never from the TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SmtpConfig {
    /// Relay host name.
    pub host: String,
    /// Relay port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Login user; `None` means an unauthenticated relay.
    #[serde(default)]
    pub username: Option<String>,
    /// Envelope and header sender address.
    pub from_address: String,
    /// Upgrade the connection with STARTTLS.
    #[serde(default = "default_true")]
    pub starttls: bool,
    /// Relay password (populated at runtime).
    #[serde(skip)]
    pub password: Option<String>,
}

/// Background email delivery tuning.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DeliveryConfig {
    /// Number of concurrent delivery workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Capacity of the pending email queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Transport attempts before falling back to plain text.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    #[serde(default = "default_retry_base_millis")]
    pub retry_base_millis: u64,
    /// Upper bound for a single transport attempt.
    #[serde(default = "default_attempt_timeout_seconds")]
    pub attempt_timeout_seconds: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            retry_base_millis: default_retry_base_millis(),
            attempt_timeout_seconds: default_attempt_timeout_seconds(),
        }
    }
}

impl DeliveryConfig {
    /// Backoff base as a [`Duration`].
    #[must_use]
    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_millis)
    }

    /// Per-attempt timeout as a [`Duration`].
    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_seconds)
    }
}

fn default_true() -> bool {
    true
}

fn default_smtp_port() -> u16 {
    587
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_millis() -> u64 {
    2000
}

fn default_attempt_timeout_seconds() -> u64 {
    30
}

fn default_http_port() -> u16 {
    8080
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// `SQLite` database file.
    pub database_path: PathBuf,
    /// HTTP port for the API surface.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Outbound mail relay.
    pub smtp: SmtpConfig,
    /// Email delivery pool settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the SMTP password from OS keychain with env-var fallback.
    ///
    /// Only consulted when `smtp.username` is set. Tries the
    /// `helpdesk-workflow` keyring service first, then falls back to the
    /// `HELPDESK_SMTP_PASSWORD` environment variable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a username is configured but neither
    /// source yields a password.
    pub async fn load_credentials(&mut self) -> Result<()> {
        if self.smtp.username.is_none() {
            return Ok(());
        }
        let password = load_credential("smtp_password", "HELPDESK_SMTP_PASSWORD").await?;
        self.smtp.password = Some(password);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.smtp.host.trim().is_empty() {
            return Err(AppError::Config("smtp.host must not be empty".into()));
        }
        if self.smtp.from_address.trim().is_empty() {
            return Err(AppError::Config(
                "smtp.from_address must not be empty".into(),
            ));
        }
        if self.delivery.workers == 0 {
            return Err(AppError::Config(
                "delivery.workers must be greater than zero".into(),
            ));
        }
        if self.delivery.queue_capacity == 0 {
            return Err(AppError::Config(
                "delivery.queue_capacity must be greater than zero".into(),
            ));
        }
        if self.delivery.max_attempts == 0 {
            return Err(AppError::Config(
                "delivery.max_attempts must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    match env::var(env_key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))),
    }
}
