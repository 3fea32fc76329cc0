//! In-memory backend
//!
//! Captures sent messages in a shared [`Outbox`] for assertions.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::MailConnection;
use crate::{EmailError, TransportMessage};

/// Shared collection of messages delivered through `memory` connections
///
/// Cloning an outbox shares the same underlying storage.
///
/// # Examples
///
/// ```rust
/// use acton_outbox::{MailConnection, MemoryConnection, Outbox, TransportMessage, Headers};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let outbox = Outbox::new();
/// let connection = MemoryConnection::new(outbox.clone());
///
/// connection.send(&TransportMessage {
///     from: "noreply@myapp.com".to_string(),
///     to: vec!["user@example.com".to_string()],
///     subject: "Test".to_string(),
///     body: "Hello".to_string(),
///     alternatives: Vec::new(),
///     headers: Headers::new(),
/// }).await?;
///
/// assert_eq!(outbox.sent_count(), 1);
/// assert!(outbox.was_sent_to("user@example.com"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    sent: Arc<Mutex<Vec<TransportMessage>>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl Outbox {
    /// Create an empty outbox
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages delivered
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// All delivered messages, oldest first
    #[must_use]
    pub fn messages(&self) -> Vec<TransportMessage> {
        self.sent.lock().clone()
    }

    /// Remove all delivered messages
    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    /// Check if a message was delivered to a specific address
    #[must_use]
    pub fn was_sent_to(&self, address: &str) -> bool {
        self.sent
            .lock()
            .iter()
            .any(|message| message.to.iter().any(|to| to == address))
    }

    /// Check if a message was delivered with a specific subject
    #[must_use]
    pub fn was_sent_with_subject(&self, subject: &str) -> bool {
        self.sent.lock().iter().any(|message| message.subject == subject)
    }

    /// The most recently delivered message
    #[must_use]
    pub fn last_sent(&self) -> Option<TransportMessage> {
        self.sent.lock().last().cloned()
    }

    /// Number of connections opened on this outbox
    #[must_use]
    pub fn connections_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of connections to this outbox that have been closed
    #[must_use]
    pub fn connections_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn push(&self, message: TransportMessage) {
        self.sent.lock().push(message);
    }
}

/// Connection that delivers into an [`Outbox`]
#[derive(Debug)]
pub struct MemoryConnection {
    outbox: Outbox,
    closed: AtomicBool,
}

impl MemoryConnection {
    /// Open a connection on `outbox`
    #[must_use]
    pub fn new(outbox: Outbox) -> Self {
        outbox.opened.fetch_add(1, Ordering::SeqCst);
        Self {
            outbox,
            closed: AtomicBool::new(false),
        }
    }

    /// Whether [`MailConnection::close`] has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn mark_closed(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.outbox.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Dropping an open connection releases it
impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.mark_closed();
    }
}

#[async_trait]
impl MailConnection for MemoryConnection {
    async fn send(&self, message: &TransportMessage) -> Result<(), EmailError> {
        if self.is_closed() {
            return Err(EmailError::ConnectionClosed);
        }
        self.outbox.push(message.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), EmailError> {
        self.mark_closed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Headers;

    fn message(to: &str, subject: &str) -> TransportMessage {
        TransportMessage {
            from: "noreply@myapp.com".to_string(),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            body: "Hello".to_string(),
            alternatives: Vec::new(),
            headers: Headers::new(),
        }
    }

    #[tokio::test]
    async fn test_memory_connection_multiple() {
        let outbox = Outbox::new();
        let connection = MemoryConnection::new(outbox.clone());

        for i in 0..5 {
            connection
                .send(&message(&format!("user{i}@example.com"), &format!("Test {i}")))
                .await
                .unwrap();
        }

        assert_eq!(outbox.sent_count(), 5);
        assert!(outbox.was_sent_to("user0@example.com"));
        assert!(outbox.was_sent_to("user4@example.com"));
        assert!(outbox.was_sent_with_subject("Test 4"));
        assert_eq!(outbox.last_sent().unwrap().subject, "Test 4");

        outbox.clear();
        assert_eq!(outbox.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_messages() {
        let outbox = Outbox::new();
        let connection = MemoryConnection::new(outbox.clone());
        connection.close().await.unwrap();
        connection.close().await.unwrap();

        assert!(connection.is_closed());
        assert_eq!(outbox.connections_opened(), 1);
        assert_eq!(outbox.connections_closed(), 1);

        let result = connection.send(&message("user@example.com", "Test")).await;
        assert!(matches!(result, Err(EmailError::ConnectionClosed)));
        assert_eq!(outbox.sent_count(), 0);

        drop(connection);
        assert_eq!(outbox.connections_closed(), 1);
    }

    #[test]
    fn test_dropping_open_connection_releases_it() {
        let outbox = Outbox::new();
        drop(MemoryConnection::new(outbox.clone()));

        assert_eq!(outbox.connections_opened(), 1);
        assert_eq!(outbox.connections_closed(), 1);
    }
}
