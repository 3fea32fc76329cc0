//! Mail transport backends
//!
//! A [`Transport`] resolves the configured backend identifier and opens
//! [`MailConnection`]s:
//! - **smtp**: Send via an SMTP relay (production)
//! - **console**: Log messages through `tracing` (development)
//! - **memory**: Collect messages in a shared [`Outbox`] (tests)
//! - **dummy**: Accept and discard every message

mod console;
mod dummy;
mod memory;
mod smtp;

use std::str::FromStr;

use async_trait::async_trait;
use tracing::debug;

use crate::{config::TransportSettings, EmailError, TransportMessage};

pub use console::ConsoleConnection;
pub use dummy::DummyConnection;
pub use memory::{MemoryConnection, Outbox};
pub use smtp::SmtpConnection;

/// An open connection to a mail transport
///
/// Connections take `&self` so one connection can be shared by many dispatch
/// calls. Whoever opened a connection is responsible for closing it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailConnection: Send + Sync {
    /// Send one message
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if the transport rejects the message or the
    /// connection is closed
    async fn send(&self, message: &TransportMessage) -> Result<(), EmailError>;

    /// Release the connection
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if the transport fails to shut down cleanly
    async fn close(&self) -> Result<(), EmailError>;
}

/// Known transport backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// SMTP relay
    Smtp,
    /// Log to the console
    Console,
    /// In-process outbox
    Memory,
    /// Discard everything
    Dummy,
}

impl BackendKind {
    /// Identifier used in configuration
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Smtp => "smtp",
            Self::Console => "console",
            Self::Memory => "memory",
            Self::Dummy => "dummy",
        }
    }
}

impl FromStr for BackendKind {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smtp" => Ok(Self::Smtp),
            "console" => Ok(Self::Console),
            "memory" => Ok(Self::Memory),
            "dummy" => Ok(Self::Dummy),
            _ => Err(EmailError::UnknownBackend(s.to_string())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Opens connections to the configured default backend
///
/// # Examples
///
/// ```rust
/// use acton_outbox::{config::TransportSettings, Transport};
///
/// let transport = Transport::new(TransportSettings::with_backend("random.backend"));
/// let err = transport.connect().err().unwrap();
/// assert!(err.to_string().contains("random.backend"));
/// ```
#[derive(Debug, Clone)]
pub struct Transport {
    settings: TransportSettings,
    outbox: Outbox,
}

impl Transport {
    /// Create a transport for the given settings
    #[must_use]
    pub fn new(settings: TransportSettings) -> Self {
        Self {
            settings,
            outbox: Outbox::new(),
        }
    }

    /// Use a specific outbox for the `memory` backend
    #[must_use]
    pub fn with_outbox(mut self, outbox: Outbox) -> Self {
        self.outbox = outbox;
        self
    }

    /// Outbox that `memory` connections deliver into
    #[must_use]
    pub const fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Settings this transport was built from
    #[must_use]
    pub const fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Open a new connection to the configured backend
    ///
    /// # Errors
    ///
    /// Returns `EmailError::UnknownBackend` naming the configured value if it
    /// does not resolve, or `EmailError::ConfigError` if the backend's own
    /// settings are invalid
    pub fn connect(&self) -> Result<Box<dyn MailConnection>, EmailError> {
        let kind: BackendKind = self.settings.backend.parse()?;
        debug!(backend = %kind, "Opening mail connection");

        let connection: Box<dyn MailConnection> = match kind {
            BackendKind::Smtp => Box::new(SmtpConnection::open(&self.settings.smtp)?),
            BackendKind::Console => Box::new(ConsoleConnection::new(self.settings.console.verbose)),
            BackendKind::Memory => Box::new(MemoryConnection::new(self.outbox.clone())),
            BackendKind::Dummy => Box::new(DummyConnection),
        };
        Ok(connection)
    }
}
