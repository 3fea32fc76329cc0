//! Console backend for development
//!
//! Logs messages through `tracing` instead of sending them.

use async_trait::async_trait;
use tracing::{debug, info};

use super::MailConnection;
use crate::{EmailError, TransportMessage};

/// Console mail connection for development
///
/// Useful for development without SMTP credentials. In verbose mode the
/// headers and bodies are logged at debug level as well.
#[derive(Debug, Clone, Default)]
pub struct ConsoleConnection {
    verbose: bool,
}

impl ConsoleConnection {
    /// Create a console connection
    #[must_use]
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

#[async_trait]
impl MailConnection for ConsoleConnection {
    async fn send(&self, message: &TransportMessage) -> Result<(), EmailError> {
        info!(
            from = %message.from,
            to = ?message.to,
            subject = %message.subject,
            has_html = message.html().is_some(),
            "Console email sent"
        );

        if self.verbose {
            debug!(headers = ?message.headers, "Email headers");
            debug!(text = %message.body, "Email text content");
            if let Some(html) = message.html() {
                debug!(html = %html, "Email HTML content");
            }
        }

        Ok(())
    }

    async fn close(&self) -> Result<(), EmailError> {
        Ok(())
    }
}
