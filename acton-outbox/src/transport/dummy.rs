//! Dummy backend that accepts and discards every message

use async_trait::async_trait;
use tracing::trace;

use super::MailConnection;
use crate::{EmailError, TransportMessage};

/// Connection that drops messages on the floor
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyConnection;

#[async_trait]
impl MailConnection for DummyConnection {
    async fn send(&self, message: &TransportMessage) -> Result<(), EmailError> {
        trace!(to = ?message.to, subject = %message.subject, "Dummy backend discarded message");
        Ok(())
    }

    async fn close(&self) -> Result<(), EmailError> {
        Ok(())
    }
}
