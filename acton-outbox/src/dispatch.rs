//! Sending queued emails and recording each attempt
//!
//! Every call to [`Dispatcher::dispatch`] ends with exactly one log entry for
//! the email, whatever happened on the way. Transport and configuration
//! failures are captured in the entry and in the returned
//! [`DispatchOutcome`]; they are never returned as errors. Only a repository
//! failure, which means the attempt could not be recorded, is an `Err`.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::TransportSettings, DispatchOutcome, Email, EmailError, EmailRepository,
    MailConnection, Transport, TransportMessage,
};

/// Aggregated outcomes of a batch of dispatch attempts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Outcome per email, in dispatch order
    pub outcomes: Vec<(Uuid, DispatchOutcome)>,
}

impl BatchReport {
    /// Number of emails sent
    #[must_use]
    pub fn sent(&self) -> usize {
        self.outcomes.iter().filter(|(_, outcome)| outcome.is_sent()).count()
    }

    /// Number of emails that failed
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.sent()
    }

    /// Number of attempts in the batch
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the batch was empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Failed emails with their captured error text
    pub fn failures(&self) -> impl Iterator<Item = (Uuid, &str)> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_sent())
            .map(|(id, outcome)| (*id, outcome.detail()))
    }
}

/// Sends email records over a mail transport
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use acton_outbox::{
///     config::TransportSettings, Composer, Dispatcher, EmailStatus, InMemoryRepository,
///     MailRequest, MemoryConnection, Outbox,
/// };
///
/// # async fn example() -> Result<(), acton_outbox::EmailError> {
/// let repository = Arc::new(InMemoryRepository::new());
/// let composer = Composer::new(repository.clone());
/// let dispatcher = Dispatcher::from_settings(repository, TransportSettings::with_backend("dummy"));
///
/// let mut emails = composer
///     .compose(MailRequest::new("from@example.com").to("to@example.com").subject("Hi").text("Hello"))
///     .await?;
///
/// // Reuse one caller-owned connection for the whole batch
/// let outbox = Outbox::new();
/// let connection = MemoryConnection::new(outbox.clone());
/// for email in &mut emails {
///     dispatcher.dispatch(email, Some(&connection)).await?;
/// }
///
/// assert_eq!(emails[0].status(), EmailStatus::Sent);
/// assert_eq!(outbox.sent_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    repository: Arc<dyn EmailRepository>,
    transport: Transport,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher with a default transport
    #[must_use]
    pub fn new(repository: Arc<dyn EmailRepository>, transport: Transport) -> Self {
        Self {
            repository,
            transport,
        }
    }

    /// Create a dispatcher whose default transport is built from `settings`
    #[must_use]
    pub fn from_settings(repository: Arc<dyn EmailRepository>, settings: TransportSettings) -> Self {
        Self::new(repository, Transport::new(settings))
    }

    /// The default transport used when no connection is supplied
    #[must_use]
    pub const fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Send one email and record the attempt
    ///
    /// With `Some(connection)` the message goes through that connection and
    /// the connection is left open. With `None` a connection to the default
    /// backend is opened for this call and closed before returning.
    ///
    /// On return `email.status()` reflects the outcome and the repository
    /// holds one new log entry for it.
    ///
    /// # Errors
    ///
    /// Returns `EmailError` only if the repository cannot record the attempt.
    /// An email the repository does not hold fails with
    /// `EmailError::EmailNotFound` before anything is sent.
    pub async fn dispatch(
        &self,
        email: &mut Email,
        connection: Option<&dyn MailConnection>,
    ) -> Result<DispatchOutcome, EmailError> {
        self.repository.get_email(email.id).await?;

        let outcome = match connection {
            Some(connection) => Self::attempt(email, connection).await,
            None => self.attempt_with_own_connection(email).await,
        };
        self.record(email, outcome).await
    }

    /// Send a batch of emails, sharing one connection
    ///
    /// Uses `connection` when given; otherwise opens a single connection to
    /// the default backend for the whole batch and closes it afterwards. If
    /// that connection cannot be opened, every email is recorded as failed
    /// with the connection error.
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if the repository cannot record an attempt; the
    /// remaining emails are not attempted
    pub async fn dispatch_all(
        &self,
        emails: &mut [Email],
        connection: Option<&dyn MailConnection>,
    ) -> Result<BatchReport, EmailError> {
        if let Some(connection) = connection {
            return self.dispatch_each(emails, Ok(connection)).await;
        }

        match self.transport.connect() {
            Ok(own) => {
                let own = OwnedConnection::new(own);
                let report = self.dispatch_each(emails, Ok(own.connection())).await;
                own.release().await;
                report
            }
            Err(e) => {
                warn!(error = %e, count = emails.len(), "Could not open mail connection for batch");
                self.dispatch_each(emails, Err(DispatchOutcome::failed(e.to_string())))
                    .await
            }
        }
    }

    /// Send every queued email in the repository over one connection
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if the queue cannot be read or an attempt cannot
    /// be recorded
    pub async fn dispatch_queued(&self) -> Result<BatchReport, EmailError> {
        let mut emails = self.repository.queued_emails().await?;
        debug!(count = emails.len(), "Dispatching queued emails");

        let report = self.dispatch_all(&mut emails, None).await?;
        info!(sent = report.sent(), failed = report.failed(), "Queue dispatch finished");
        Ok(report)
    }

    async fn dispatch_each(
        &self,
        emails: &mut [Email],
        connection: Result<&dyn MailConnection, DispatchOutcome>,
    ) -> Result<BatchReport, EmailError> {
        let mut report = BatchReport::default();
        for email in emails.iter_mut() {
            self.repository.get_email(email.id).await?;

            let outcome = match &connection {
                Ok(connection) => Self::attempt(email, *connection).await,
                Err(failed) => failed.clone(),
            };
            let outcome = self.record(email, outcome).await?;
            report.outcomes.push((email.id, outcome));
        }
        Ok(report)
    }

    async fn attempt_with_own_connection(&self, email: &Email) -> DispatchOutcome {
        let connection = match self.transport.connect() {
            Ok(connection) => OwnedConnection::new(connection),
            Err(e) => return DispatchOutcome::failed(e.to_string()),
        };

        let outcome = Self::attempt(email, connection.connection()).await;
        connection.release().await;
        outcome
    }

    async fn attempt(email: &Email, connection: &dyn MailConnection) -> DispatchOutcome {
        let message = match TransportMessage::build(email) {
            Ok(message) => message,
            Err(e) => return DispatchOutcome::failed(e.to_string()),
        };

        match connection.send(&message).await {
            Ok(()) => DispatchOutcome::Sent,
            Err(e) => DispatchOutcome::failed(e.to_string()),
        }
    }

    async fn record(
        &self,
        email: &mut Email,
        outcome: DispatchOutcome,
    ) -> Result<DispatchOutcome, EmailError> {
        let entry = self.repository.record_attempt(email.id, &outcome).await?;
        email.set_status(outcome.email_status(), entry.timestamp);

        match &outcome {
            DispatchOutcome::Sent => {
                info!(email_id = %email.id, to = %email.to, "Email sent");
            }
            DispatchOutcome::Failed(detail) => {
                warn!(email_id = %email.id, to = %email.to, error = %detail, "Email dispatch failed");
            }
        }

        Ok(outcome)
    }
}

/// A connection the dispatcher opened for itself
///
/// [`OwnedConnection::release`] closes it. If the dispatch future is dropped
/// or unwinds first, the boxed connection is dropped here instead, which frees
/// the underlying transport.
struct OwnedConnection {
    inner: Box<dyn MailConnection>,
    released: bool,
}

impl OwnedConnection {
    fn new(inner: Box<dyn MailConnection>) -> Self {
        Self {
            inner,
            released: false,
        }
    }

    fn connection(&self) -> &dyn MailConnection {
        self.inner.as_ref()
    }

    async fn release(mut self) {
        match self.inner.close().await {
            Ok(()) => debug!("Closed mail connection"),
            Err(e) => warn!(error = %e, "Failed to close mail connection"),
        }
        self.released = true;
    }
}

impl Drop for OwnedConnection {
    fn drop(&mut self) {
        if !self.released {
            warn!("Mail connection dropped before it was closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        transport::MockMailConnection, EmailStatus, InMemoryRepository, LogStatus,
        MemoryConnection, Outbox, RenderedEmail, UNDESCRIBED_FAILURE,
    };

    async fn saved_email(repository: &InMemoryRepository, subject: &str) -> Email {
        let email = Email::queued(
            "from@example.com",
            "to@example.com",
            RenderedEmail {
                subject: subject.to_string(),
                text: "Message".to_string(),
                html: None,
            },
        );
        repository.create_email(&email).await.unwrap();
        email
    }

    fn dispatcher(repository: &Arc<InMemoryRepository>, backend: &str, outbox: &Outbox) -> Dispatcher {
        Dispatcher::new(
            repository.clone(),
            Transport::new(TransportSettings::with_backend(backend)).with_outbox(outbox.clone()),
        )
    }

    #[tokio::test]
    async fn test_dispatch_sends_through_default_backend() {
        let repository = Arc::new(InMemoryRepository::new());
        let outbox = Outbox::new();
        let dispatcher = dispatcher(&repository, "memory", &outbox);
        let mut email = saved_email(&repository, "Test dispatch").await;

        let outcome = dispatcher.dispatch(&mut email, None).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Sent);
        assert_eq!(outbox.messages()[0].subject, "Test dispatch");
        assert_eq!(email.status(), EmailStatus::Sent);

        let log = repository.latest_log(email.id).await.unwrap().unwrap();
        assert_eq!(log.email_id, email.id);
        assert_eq!(log.status, LogStatus::Sent);
        assert!(log.message.is_empty());
    }

    #[tokio::test]
    async fn test_own_connection_is_closed_after_dispatch() {
        let repository = Arc::new(InMemoryRepository::new());
        let outbox = Outbox::new();
        let dispatcher = dispatcher(&repository, "memory", &outbox);
        let mut email = saved_email(&repository, "Test").await;

        dispatcher.dispatch(&mut email, None).await.unwrap();

        assert_eq!(outbox.connections_opened(), 1);
        assert_eq!(outbox.connections_closed(), 1);
    }

    #[tokio::test]
    async fn test_send_error_is_recorded_not_raised() {
        let repository = Arc::new(InMemoryRepository::new());
        let dispatcher = dispatcher(&repository, "dummy", &Outbox::new());
        let mut email = saved_email(&repository, "Test").await;

        let mut connection = MockMailConnection::new();
        connection
            .expect_send()
            .times(1)
            .returning(|_| Err(EmailError::transport("Fake Error")));
        connection.expect_close().times(0);

        let outcome = dispatcher.dispatch(&mut email, Some(&connection)).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Failed("Fake Error".to_string()));
        assert_eq!(email.status(), EmailStatus::Failed);

        let log = repository.latest_log(email.id).await.unwrap().unwrap();
        assert_eq!(log.status, LogStatus::Failed);
        assert_eq!(log.message, "Fake Error");
        assert_eq!(repository.log_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_backend_is_logged() {
        let repository = Arc::new(InMemoryRepository::new());
        let dispatcher = dispatcher(&repository, "random.backend", &Outbox::new());
        let mut email = saved_email(&repository, "Test").await;

        dispatcher.dispatch(&mut email, None).await.unwrap();

        assert_eq!(email.status(), EmailStatus::Failed);
        let log = repository.latest_log(email.id).await.unwrap().unwrap();
        assert_eq!(log.status, LogStatus::Failed);
        assert!(log.message.contains("does not define a backend"));
        assert!(log.message.contains("random.backend"));
    }

    #[tokio::test]
    async fn test_undecodable_headers_fail_the_attempt() {
        let repository = Arc::new(InMemoryRepository::new());
        let outbox = Outbox::new();
        let dispatcher = dispatcher(&repository, "memory", &outbox);
        let email = saved_email(&repository, "Test").await;
        let mut email = email.with_headers(Some("{not json".to_string()));

        let outcome = dispatcher.dispatch(&mut email, None).await.unwrap();

        assert!(matches!(outcome, DispatchOutcome::Failed(ref detail) if detail.starts_with("serialization error")));
        assert_eq!(outbox.sent_count(), 0);
        assert_eq!(outbox.connections_closed(), 1);
    }

    #[tokio::test]
    async fn test_supplied_connection_is_never_closed() {
        let repository = Arc::new(InMemoryRepository::new());
        let dispatcher = dispatcher(&repository, "dummy", &Outbox::new());
        let outbox = Outbox::new();
        let connection = MemoryConnection::new(outbox.clone());

        for i in 0..3 {
            let mut email = saved_email(&repository, &format!("Test {i}")).await;
            dispatcher.dispatch(&mut email, Some(&connection)).await.unwrap();
        }

        assert!(!connection.is_closed());
        assert_eq!(outbox.sent_count(), 3);
    }

    #[tokio::test]
    async fn test_redispatch_is_a_fresh_attempt() {
        let repository = Arc::new(InMemoryRepository::new());
        let outbox = Outbox::new();
        let dispatcher = dispatcher(&repository, "memory", &outbox);
        let mut email = saved_email(&repository, "Test").await;

        dispatcher.dispatch(&mut email, None).await.unwrap();
        dispatcher.dispatch(&mut email, None).await.unwrap();

        assert_eq!(outbox.sent_count(), 2);
        assert_eq!(repository.logs_for(email.id).await.unwrap().len(), 2);
        assert_eq!(email.status(), EmailStatus::Sent);
    }

    #[tokio::test]
    async fn test_unsaved_email_is_an_error() {
        let repository = Arc::new(InMemoryRepository::new());
        let outbox = Outbox::new();
        let dispatcher = dispatcher(&repository, "memory", &outbox);
        let mut email = Email::queued("from@example.com", "to@example.com", RenderedEmail::default());

        let result = dispatcher.dispatch(&mut email, None).await;

        assert!(matches!(result, Err(EmailError::EmailNotFound(_))));
        assert_eq!(email.status(), EmailStatus::Queued);
        assert_eq!(outbox.sent_count(), 0);
        assert_eq!(outbox.connections_opened(), 0);
        assert_eq!(repository.log_count(), 0);
    }

    #[tokio::test]
    async fn test_unsaved_email_is_never_sent_over_supplied_connection() {
        let repository = Arc::new(InMemoryRepository::new());
        let dispatcher = dispatcher(&repository, "dummy", &Outbox::new());
        let mut email = Email::queued("from@example.com", "to@example.com", RenderedEmail::default());

        let mut connection = MockMailConnection::new();
        connection.expect_send().times(0);
        connection.expect_close().times(0);

        let result = dispatcher.dispatch(&mut email, Some(&connection)).await;

        assert!(matches!(result, Err(EmailError::EmailNotFound(_))));
    }

    #[tokio::test]
    async fn test_dispatch_all_stops_before_sending_unsaved_email() {
        let repository = Arc::new(InMemoryRepository::new());
        let outbox = Outbox::new();
        let dispatcher = dispatcher(&repository, "memory", &outbox);
        let mut emails = vec![
            saved_email(&repository, "saved").await,
            Email::queued("from@example.com", "to@example.com", RenderedEmail::default()),
            saved_email(&repository, "after").await,
        ];

        let result = dispatcher.dispatch_all(&mut emails, None).await;

        assert!(matches!(result, Err(EmailError::EmailNotFound(id)) if id == emails[1].id));
        assert_eq!(outbox.sent_count(), 1);
        assert_eq!(repository.log_count(), 1);
        assert_eq!(outbox.connections_closed(), 1);
    }

    #[tokio::test]
    async fn test_blank_transport_error_gets_a_detail() {
        let repository = Arc::new(InMemoryRepository::new());
        let dispatcher = dispatcher(&repository, "dummy", &Outbox::new());
        let mut email = saved_email(&repository, "Test").await;

        let mut connection = MockMailConnection::new();
        connection
            .expect_send()
            .times(1)
            .returning(|_| Err(EmailError::transport("")));

        let outcome = dispatcher.dispatch(&mut email, Some(&connection)).await.unwrap();

        assert_eq!(outcome.detail(), UNDESCRIBED_FAILURE);
        let log = repository.latest_log(email.id).await.unwrap().unwrap();
        assert_eq!(log.status, LogStatus::Failed);
        assert_eq!(log.message, UNDESCRIBED_FAILURE);
    }

    #[tokio::test]
    async fn test_owned_connection_is_released_when_dropped() {
        let outbox = Outbox::new();
        let owned = OwnedConnection::new(Box::new(MemoryConnection::new(outbox.clone())));
        assert_eq!(outbox.connections_opened(), 1);

        drop(owned);
        assert_eq!(outbox.connections_closed(), 1);

        let owned = OwnedConnection::new(Box::new(MemoryConnection::new(outbox.clone())));
        owned.release().await;
        assert_eq!(outbox.connections_opened(), 2);
        assert_eq!(outbox.connections_closed(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_all_with_unreachable_backend_fails_every_email() {
        let repository = Arc::new(InMemoryRepository::new());
        let dispatcher = dispatcher(&repository, "random.backend", &Outbox::new());
        let mut emails = vec![
            saved_email(&repository, "One").await,
            saved_email(&repository, "Two").await,
        ];

        let report = dispatcher.dispatch_all(&mut emails, None).await.unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(report.failed(), 2);
        assert!(report.failures().all(|(_, detail)| detail.contains("random.backend")));
        assert!(emails.iter().all(|email| email.status() == EmailStatus::Failed));
        assert_eq!(repository.log_count(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_all_mixed_outcomes() {
        let repository = Arc::new(InMemoryRepository::new());
        let dispatcher = dispatcher(&repository, "dummy", &Outbox::new());
        let mut emails = vec![
            saved_email(&repository, "ok").await,
            saved_email(&repository, "reject").await,
            saved_email(&repository, "ok").await,
        ];

        let mut connection = MockMailConnection::new();
        connection.expect_send().times(3).returning(|message| {
            if message.subject == "reject" {
                Err(EmailError::transport("550 mailbox unavailable"))
            } else {
                Ok(())
            }
        });
        connection.expect_close().times(0);

        let report = dispatcher.dispatch_all(&mut emails, Some(&connection)).await.unwrap();

        assert_eq!(report.sent(), 2);
        assert_eq!(report.failed(), 1);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures, vec![(emails[1].id, "550 mailbox unavailable")]);
        assert_eq!(emails[1].status(), EmailStatus::Failed);
    }
}
