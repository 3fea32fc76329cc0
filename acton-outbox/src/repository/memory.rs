//! In-memory repository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::EmailRepository;
use crate::{DispatchOutcome, Email, EmailError, EmailTemplate, LogEntry};

#[derive(Debug, Default)]
struct State {
    emails: HashMap<Uuid, Email>,
    /// Creation order of `emails`
    order: Vec<Uuid>,
    templates: HashMap<String, EmailTemplate>,
    logs: Vec<LogEntry>,
}

/// Repository backed by process memory
///
/// All operations take one lock, so `record_attempt` is atomic with respect
/// to every other call.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl InMemoryRepository {
    /// Create an empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored emails
    #[must_use]
    pub fn email_count(&self) -> usize {
        self.state.lock().emails.len()
    }

    /// Number of stored log entries across all emails
    #[must_use]
    pub fn log_count(&self) -> usize {
        self.state.lock().logs.len()
    }
}

#[async_trait]
impl EmailRepository for InMemoryRepository {
    async fn create_email(&self, email: &Email) -> Result<(), EmailError> {
        let mut state = self.state.lock();
        if state.emails.contains_key(&email.id) {
            return Err(EmailError::repository(format!(
                "email {} already exists",
                email.id
            )));
        }
        state.order.push(email.id);
        state.emails.insert(email.id, email.clone());
        Ok(())
    }

    async fn get_email(&self, id: Uuid) -> Result<Email, EmailError> {
        self.state
            .lock()
            .emails
            .get(&id)
            .cloned()
            .ok_or(EmailError::EmailNotFound(id))
    }

    async fn queued_emails(&self) -> Result<Vec<Email>, EmailError> {
        let state = self.state.lock();
        let mut queued: Vec<Email> = state
            .order
            .iter()
            .filter_map(|id| state.emails.get(id))
            .filter(|email| !email.status().is_terminal())
            .cloned()
            .collect();
        // Stable sort keeps creation order within a priority
        queued.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(queued)
    }

    async fn save_template(&self, template: &EmailTemplate) -> Result<(), EmailError> {
        self.state
            .lock()
            .templates
            .insert(template.name.clone(), template.clone());
        Ok(())
    }

    async fn template_by_name(&self, name: &str) -> Result<EmailTemplate, EmailError> {
        self.state
            .lock()
            .templates
            .get(name)
            .cloned()
            .ok_or_else(|| EmailError::TemplateNotFound(name.to_string()))
    }

    async fn record_attempt(
        &self,
        email_id: Uuid,
        outcome: &DispatchOutcome,
    ) -> Result<LogEntry, EmailError> {
        let mut state = self.state.lock();

        let previous = state
            .logs
            .iter()
            .rev()
            .find(|entry| entry.email_id == email_id)
            .map(|entry| entry.timestamp);
        let timestamp = previous.map_or_else(Utc::now, |previous| previous.max(Utc::now()));

        let email = state
            .emails
            .get_mut(&email_id)
            .ok_or(EmailError::EmailNotFound(email_id))?;
        email.set_status(outcome.email_status(), timestamp);

        let entry = LogEntry::for_outcome(email_id, outcome, timestamp);
        state.logs.push(entry.clone());
        Ok(entry)
    }

    async fn latest_log(&self, email_id: Uuid) -> Result<Option<LogEntry>, EmailError> {
        Ok(self
            .state
            .lock()
            .logs
            .iter()
            .rev()
            .find(|entry| entry.email_id == email_id)
            .cloned())
    }

    async fn logs_for(&self, email_id: Uuid) -> Result<Vec<LogEntry>, EmailError> {
        Ok(self
            .state
            .lock()
            .logs
            .iter()
            .filter(|entry| entry.email_id == email_id)
            .cloned()
            .collect())
    }
}
