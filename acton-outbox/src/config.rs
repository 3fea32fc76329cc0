//! Configuration management for acton-outbox
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `ACTON_` prefix, `__` for nesting)
//! 2. `./outbox.toml` (development)
//! 3. `~/.config/acton-outbox/{service_name}/outbox.toml` (user config, XDG)
//! 4. `/etc/acton-outbox/{service_name}/outbox.toml` (system config)
//! 5. Hardcoded defaults (fallback)
//!
//! Example: `ACTON_TRANSPORT__BACKEND=console`
//!
//! # Example Configuration
//!
//! ```toml
//! [transport]
//! backend = "smtp"
//!
//! [transport.smtp]
//! host = "smtp.example.com"
//! port = 587
//! username = "mailer"
//! password = "secret"
//! use_tls = true
//! timeout_secs = 30
//!
//! [transport.console]
//! verbose = false
//! ```

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "outbox.toml";

/// SMTP relay settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    /// SMTP server hostname
    pub host: String,

    /// SMTP server port (usually 587 for STARTTLS, 25 for plain relays)
    pub port: u16,

    /// SMTP username; no authentication when empty
    pub username: String,

    /// SMTP password
    pub password: String,

    /// Require STARTTLS
    pub use_tls: bool,

    /// Transport timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
            username: String::new(),
            password: String::new(),
            use_tls: false,
            timeout_secs: 60,
        }
    }
}

/// Console backend settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    /// Log headers and bodies as well as the envelope
    pub verbose: bool,
}

/// Default transport used when a dispatch is not given a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Backend identifier: `smtp`, `console`, `memory` or `dummy`
    pub backend: String,

    /// Settings for the `smtp` backend
    pub smtp: SmtpSettings,

    /// Settings for the `console` backend
    pub console: ConsoleSettings,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            backend: "smtp".to_string(),
            smtp: SmtpSettings::default(),
            console: ConsoleSettings::default(),
        }
    }
}

impl TransportSettings {
    /// Default settings with a different backend identifier
    #[must_use]
    pub fn with_backend(backend: &str) -> Self {
        Self {
            backend: backend.to_string(),
            ..Self::default()
        }
    }
}

/// Complete acton-outbox configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    /// Default mail transport
    pub transport: TransportSettings,
}

impl OutboxConfig {
    /// Load configuration for a specific service
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - A configuration file cannot be read or parsed
    /// - Configuration values fail type conversion
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use acton_outbox::config::OutboxConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = OutboxConfig::load_for_service("newsletter")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_for_service(service_name: &str) -> anyhow::Result<Self> {
        let mut figment = Self::defaults()?;

        let system_config = PathBuf::from("/etc/acton-outbox")
            .join(service_name)
            .join(CONFIG_FILE);
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        let user_config = Self::recommended_path(service_name);
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        let local_config = PathBuf::from(".").join(CONFIG_FILE);
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        let config = figment
            .merge(Env::prefixed("ACTON_").split("__").lowercase(true))
            .extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// Environment variables still override values from the file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - The file contains invalid TOML syntax
    /// - Configuration values fail type conversion
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config = Self::defaults()?
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ACTON_").split("__").lowercase(true))
            .extract()?;
        Ok(config)
    }

    /// Get the recommended XDG config path for a service
    #[must_use]
    pub fn recommended_path(service_name: &str) -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from(".").join(CONFIG_FILE),
            |config_dir| {
                config_dir
                    .join("acton-outbox")
                    .join(service_name)
                    .join(CONFIG_FILE)
            },
        )
    }

    fn defaults() -> anyhow::Result<Figment> {
        Ok(Figment::new().merge(Toml::string(&toml::to_string(&Self::default())?)))
    }
}
