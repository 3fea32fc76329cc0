//! Email error types

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when composing, building or sending emails
#[derive(Debug, Error)]
pub enum EmailError {
    /// A template was combined with raw subject, text or HTML content
    #[error("\"template\" cannot be combined with {0}; pass either a template or raw content")]
    ContentConflict(String),

    /// No template is registered under the requested name
    #[error("email template \"{0}\" does not exist")]
    TemplateNotFound(String),

    /// Template rendering error
    #[error("failed to render email template: {0}")]
    TemplateError(#[from] minijinja::Error),

    /// The configured backend identifier does not name a known backend
    #[error("email backend \"{0}\" does not define a backend (expected one of: smtp, console, memory, dummy)")]
    UnknownBackend(String),

    /// Email configuration error
    #[error("email configuration error: {0}")]
    ConfigError(String),

    /// Invalid email address format
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// Header name or value cannot be attached to a message
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Transport error while sending
    #[error("{0}")]
    TransportError(String),

    /// The connection was used after it was closed
    #[error("connection is closed")]
    ConnectionClosed,

    /// No email record exists with the given id
    #[error("email {0} does not exist")]
    EmailNotFound(Uuid),

    /// Repository failure
    #[error("repository error: {0}")]
    RepositoryError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl EmailError {
    /// Create a transport error from a string message
    #[must_use]
    pub fn transport<T: Into<String>>(msg: T) -> Self {
        Self::TransportError(msg.into())
    }

    /// Create a configuration error from a string message
    #[must_use]
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a repository error from a string message
    #[must_use]
    pub fn repository<T: Into<String>>(msg: T) -> Self {
        Self::RepositoryError(msg.into())
    }

    /// Whether this error is a caller mistake reported before any record exists
    #[must_use]
    pub const fn is_usage_error(&self) -> bool {
        matches!(self, Self::ContentConflict(_))
    }
}
