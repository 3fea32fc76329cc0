//! Queued email records and their delivery status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Headers;
use crate::{EmailError, RenderedEmail};

/// Delivery status of an email record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    /// Waiting to be dispatched.
    #[default]
    Queued,

    /// The last dispatch attempt delivered the message to the transport.
    Sent,

    /// The last dispatch attempt failed.
    Failed,
}

impl EmailStatus {
    /// Check if the status is terminal (sent or failed).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }

    /// Get a human-readable status name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ordering hint for queued emails. Higher priorities are dispatched first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Dispatched after everything else.
    Low,
    /// The default priority.
    #[default]
    Medium,
    /// Dispatched before medium and low priority emails.
    High,
}

/// One outbound message addressed to a single recipient.
///
/// Records are created in [`EmailStatus::Queued`] by the
/// [`Composer`](crate::Composer). Only the [`Dispatcher`](crate::Dispatcher)
/// changes the status, once per dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    /// Unique record id
    pub id: Uuid,

    /// Sender address
    pub from_address: String,

    /// Recipient address
    pub to: String,

    /// Subject line
    pub subject: String,

    /// Plain text body
    pub text_body: String,

    /// HTML alternative body
    pub html_body: Option<String>,

    /// Custom headers in their serialized JSON object form
    pub headers: Option<String>,

    status: EmailStatus,

    /// Dispatch ordering hint
    pub priority: Priority,

    /// When the record was created
    pub created_at: DateTime<Utc>,

    /// When the record was last changed
    pub last_updated: DateTime<Utc>,
}

impl Email {
    /// Create a queued email from rendered content
    ///
    /// # Examples
    ///
    /// ```rust
    /// use acton_outbox::{Email, EmailStatus, RenderedEmail};
    ///
    /// let content = RenderedEmail {
    ///     subject: "Subject".to_string(),
    ///     text: "Message".to_string(),
    ///     html: Some("<p>HTML</p>".to_string()),
    /// };
    ///
    /// let email = Email::queued("from@example.com", "to@example.com", content);
    /// assert_eq!(email.status(), EmailStatus::Queued);
    /// ```
    #[must_use]
    pub fn queued(from_address: &str, to: &str, content: RenderedEmail) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            from_address: from_address.to_string(),
            to: to.to_string(),
            subject: content.subject,
            text_body: content.text,
            html_body: content.html,
            headers: None,
            status: EmailStatus::Queued,
            priority: Priority::default(),
            created_at: now,
            last_updated: now,
        }
    }

    /// Attach serialized headers
    #[must_use]
    pub fn with_headers(mut self, headers: Option<String>) -> Self {
        self.headers = headers;
        self
    }

    /// Set the dispatch priority
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Current delivery status
    #[must_use]
    pub const fn status(&self) -> EmailStatus {
        self.status
    }

    /// Decode the stored headers
    ///
    /// # Errors
    ///
    /// Returns `EmailError::SerializationError` if the stored form is not a JSON
    /// object of strings
    pub fn decoded_headers(&self) -> Result<Headers, EmailError> {
        self.headers
            .as_deref()
            .map_or_else(|| Ok(Headers::new()), Headers::from_json)
    }

    pub(crate) fn set_status(&mut self, status: EmailStatus, at: DateTime<Utc>) {
        self.status = status;
        self.last_updated = at;
    }
}
