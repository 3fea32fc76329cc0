//! End-to-end tests: compose queued emails, then dispatch them

use std::sync::Arc;

use acton_outbox::{
    config::TransportSettings, Composer, Dispatcher, DispatchOutcome, EmailError,
    EmailRepository, EmailStatus, EmailTemplate, InMemoryRepository, LogStatus, MailConnection,
    MailRequest, MemoryConnection, Outbox, Priority, Transport, TransportMessage,
};
use async_trait::async_trait;

/// Connection that rejects every message
struct FailingConnection;

#[async_trait]
impl MailConnection for FailingConnection {
    async fn send(&self, _message: &TransportMessage) -> Result<(), EmailError> {
        Err(EmailError::transport("Fake Error"))
    }

    async fn close(&self) -> Result<(), EmailError> {
        Ok(())
    }
}

fn setup(backend: &str) -> (Arc<InMemoryRepository>, Composer, Dispatcher, Outbox) {
    let repository = Arc::new(InMemoryRepository::new());
    let outbox = Outbox::new();
    let transport =
        Transport::new(TransportSettings::with_backend(backend)).with_outbox(outbox.clone());
    let composer = Composer::new(repository.clone());
    let dispatcher = Dispatcher::new(repository.clone(), transport);
    (repository, composer, dispatcher, outbox)
}

#[tokio::test]
async fn test_explicit_connection_overrides_default_backend() {
    let (_, composer, dispatcher, default_outbox) = setup("dummy");
    let mut emails = composer
        .compose(MailRequest::new("from@example.com").to("to@example.com").subject("Test").text("Message"))
        .await
        .unwrap();

    let explicit = Outbox::new();
    let connection = MemoryConnection::new(explicit.clone());
    dispatcher.dispatch(&mut emails[0], Some(&connection)).await.unwrap();

    assert_eq!(explicit.sent_count(), 1);
    assert_eq!(default_outbox.sent_count(), 0);
    assert!(!connection.is_closed());
}

#[tokio::test]
async fn test_default_backend_used_without_connection() {
    let (_, composer, dispatcher, outbox) = setup("memory");
    let mut emails = composer
        .compose(MailRequest::new("from@example.com").to("to@example.com").subject("Test").text("Message"))
        .await
        .unwrap();

    dispatcher.dispatch(&mut emails[0], None).await.unwrap();

    assert_eq!(outbox.sent_count(), 1);
    assert!(outbox.was_sent_to("to@example.com"));
    assert_eq!(outbox.connections_opened(), outbox.connections_closed());
}

#[tokio::test]
async fn test_failing_connection_records_error_text() {
    let (repository, composer, dispatcher, _) = setup("memory");
    let mut emails = composer
        .compose(MailRequest::new("from@example.com").to("to@example.com").subject("Test").text("Message"))
        .await
        .unwrap();

    let outcome = dispatcher
        .dispatch(&mut emails[0], Some(&FailingConnection))
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::Failed("Fake Error".to_string()));
    assert_eq!(emails[0].status(), EmailStatus::Failed);

    let logs = repository.logs_for(emails[0].id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Failed);
    assert_eq!(logs[0].message, "Fake Error");
}

#[tokio::test]
async fn test_unknown_backend_fails_without_raising() {
    let (repository, composer, dispatcher, _) = setup("random.backend");
    let mut emails = composer
        .compose(MailRequest::new("from@example.com").to("to@example.com").subject("Test").text("Message"))
        .await
        .unwrap();

    let outcome = dispatcher.dispatch(&mut emails[0], None).await.unwrap();

    assert!(!outcome.is_sent());
    assert!(outcome.detail().contains("random.backend"));
    let log = repository.latest_log(emails[0].id).await.unwrap().unwrap();
    assert_eq!(log.status, LogStatus::Failed);
    assert!(log.message.contains("does not define a backend"));
}

#[tokio::test]
async fn test_redispatch_appends_log_entries() {
    let (repository, composer, dispatcher, _) = setup("memory");
    let mut emails = composer
        .compose(MailRequest::new("from@example.com").to("to@example.com").subject("Test").text("Message"))
        .await
        .unwrap();
    let email = &mut emails[0];

    dispatcher.dispatch(email, Some(&FailingConnection)).await.unwrap();
    dispatcher.dispatch(email, None).await.unwrap();

    assert_eq!(email.status(), EmailStatus::Sent);
    let statuses: Vec<_> = repository
        .logs_for(email.id)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.status)
        .collect();
    assert_eq!(statuses, vec![LogStatus::Failed, LogStatus::Sent]);
}

#[tokio::test]
async fn test_template_batch_with_reply_to_header() {
    let (repository, composer, dispatcher, outbox) = setup("memory");
    repository
        .save_template(
            &EmailTemplate::new("welcome", "Welcome {{ name }}", "Hi {{ name }}")
                .with_html("<p>Hi {{ name }}</p>"),
        )
        .await
        .unwrap();

    let mut emails = composer
        .compose(
            MailRequest::new("from@example.com")
                .to_multiple(&["a@example.com", "b@example.com"])
                .template("welcome")
                .var("name", "<Bob>")
                .header("Reply-To", "reply_to@mail.com"),
        )
        .await
        .unwrap();

    let report = dispatcher.dispatch_all(&mut emails, None).await.unwrap();
    assert_eq!(report.sent(), 2);
    assert_eq!(outbox.connections_opened(), 1);
    assert_eq!(outbox.connections_closed(), 1);

    let messages = outbox.messages();
    assert_eq!(messages[0].to, vec!["a@example.com".to_string()]);
    assert_eq!(messages[1].to, vec!["b@example.com".to_string()]);
    assert_eq!(messages[0].subject, "Welcome <Bob>");
    assert_eq!(messages[0].body, "Hi <Bob>");
    assert_eq!(messages[0].html(), Some("<p>Hi &lt;Bob&gt;</p>"));
    assert_eq!(messages[0].headers.get("Reply-To"), Some("reply_to@mail.com"));
}

#[tokio::test]
async fn test_dispatch_queued_skips_terminal_records() {
    let (repository, composer, dispatcher, outbox) = setup("memory");
    let mut first = composer
        .compose(MailRequest::new("from@example.com").to("first@example.com").subject("First"))
        .await
        .unwrap();
    composer
        .compose(
            MailRequest::new("from@example.com")
                .to("urgent@example.com")
                .subject("Urgent")
                .priority(Priority::High),
        )
        .await
        .unwrap();
    composer
        .compose(MailRequest::new("from@example.com").to("second@example.com").subject("Second"))
        .await
        .unwrap();
    dispatcher.dispatch(&mut first[0], Some(&FailingConnection)).await.unwrap();

    let report = dispatcher.dispatch_queued().await.unwrap();

    assert_eq!(report.len(), 2);
    let recipients: Vec<_> = outbox
        .messages()
        .into_iter()
        .flat_map(|message| message.to)
        .collect();
    assert_eq!(recipients, vec!["urgent@example.com", "second@example.com"]);
    assert!(repository.queued_emails().await.unwrap().is_empty());
    assert_eq!(
        repository.get_email(first[0].id).await.unwrap().status(),
        EmailStatus::Failed
    );
}

#[tokio::test]
async fn test_unsaved_email_is_a_repository_error() {
    let (repository, _, dispatcher, outbox) = setup("memory");
    let other = Arc::new(InMemoryRepository::new());
    let mut emails = Composer::new(other)
        .compose(MailRequest::new("from@example.com").to("to@example.com").subject("Test"))
        .await
        .unwrap();

    let result = dispatcher.dispatch(&mut emails[0], None).await;

    assert!(matches!(result, Err(EmailError::EmailNotFound(id)) if id == emails[0].id));
    assert_eq!(emails[0].status(), EmailStatus::Queued);
    assert_eq!(outbox.sent_count(), 0);
    assert!(repository.logs_for(emails[0].id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_silent_transport_failure_still_has_detail() {
    struct SilentFailure;

    #[async_trait]
    impl MailConnection for SilentFailure {
        async fn send(&self, _message: &TransportMessage) -> Result<(), EmailError> {
            Err(EmailError::transport(""))
        }

        async fn close(&self) -> Result<(), EmailError> {
            Ok(())
        }
    }

    let (repository, composer, dispatcher, _) = setup("memory");
    let mut emails = composer
        .compose(MailRequest::new("from@example.com").to("to@example.com").subject("Test"))
        .await
        .unwrap();

    dispatcher.dispatch(&mut emails[0], Some(&SilentFailure)).await.unwrap();

    let log = repository.latest_log(emails[0].id).await.unwrap().unwrap();
    assert_eq!(log.status, LogStatus::Failed);
    assert!(!log.message.is_empty());
}
