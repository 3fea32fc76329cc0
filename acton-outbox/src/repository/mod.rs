//! Storage for email records, templates and attempt logs
//!
//! The dispatch core only talks to storage through [`EmailRepository`].
//! [`InMemoryRepository`] is provided for tests and single-process use.

mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{DispatchOutcome, Email, EmailError, EmailTemplate, LogEntry};

pub use memory::InMemoryRepository;

/// Abstraction over durable storage for the outbox
///
/// # Implementation Requirements
///
/// Implementations must:
/// - Apply [`record_attempt`](EmailRepository::record_attempt) atomically: the
///   status update and the log entry are written together or not at all
/// - Keep log entries append-only, with timestamps that never go backwards
///   for a given email
/// - Report a missing template as `EmailError::TemplateNotFound`
#[async_trait]
pub trait EmailRepository: Send + Sync {
    /// Persist a newly composed email
    ///
    /// # Errors
    ///
    /// Returns `EmailError::RepositoryError` if the record cannot be stored
    async fn create_email(&self, email: &Email) -> Result<(), EmailError>;

    /// Fetch an email by id
    ///
    /// # Errors
    ///
    /// Returns `EmailError::EmailNotFound` if no such record exists
    async fn get_email(&self, id: Uuid) -> Result<Email, EmailError>;

    /// All queued emails, highest priority first, then oldest first
    ///
    /// # Errors
    ///
    /// Returns `EmailError::RepositoryError` if the query fails
    async fn queued_emails(&self) -> Result<Vec<Email>, EmailError>;

    /// Insert or replace a template by name
    ///
    /// # Errors
    ///
    /// Returns `EmailError::RepositoryError` if the template cannot be stored
    async fn save_template(&self, template: &EmailTemplate) -> Result<(), EmailError>;

    /// Look up a template by name
    ///
    /// # Errors
    ///
    /// Returns `EmailError::TemplateNotFound` if no template has this name
    async fn template_by_name(&self, name: &str) -> Result<EmailTemplate, EmailError>;

    /// Set the email's status and append the matching log entry in one step
    ///
    /// # Errors
    ///
    /// Returns `EmailError::EmailNotFound` if the email does not exist; nothing
    /// is written in that case
    async fn record_attempt(
        &self,
        email_id: Uuid,
        outcome: &DispatchOutcome,
    ) -> Result<LogEntry, EmailError>;

    /// Most recent log entry for an email
    ///
    /// # Errors
    ///
    /// Returns `EmailError::RepositoryError` if the query fails
    async fn latest_log(&self, email_id: Uuid) -> Result<Option<LogEntry>, EmailError>;

    /// All log entries for an email, oldest first
    ///
    /// # Errors
    ///
    /// Returns `EmailError::RepositoryError` if the query fails
    async fn logs_for(&self, email_id: Uuid) -> Result<Vec<LogEntry>, EmailError>;
}
