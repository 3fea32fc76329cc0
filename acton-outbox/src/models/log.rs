//! Dispatch attempt history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EmailStatus;

/// Outcome recorded for a single dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    /// The message was handed to the transport.
    Sent,
    /// Acquiring a connection, building or sending failed.
    Failed,
}

impl From<LogStatus> for EmailStatus {
    fn from(status: LogStatus) -> Self {
        match status {
            LogStatus::Sent => Self::Sent,
            LogStatus::Failed => Self::Failed,
        }
    }
}

/// Result of one dispatch attempt, before it is written to the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    /// The message was delivered to the transport.
    Sent,
    /// The attempt failed; holds the captured error text.
    Failed(String),
}

/// Detail recorded when a failure carries no text of its own.
pub const UNDESCRIBED_FAILURE: &str = "transport error with no detail";

impl DispatchOutcome {
    /// A failed outcome with `detail` as its captured error text.
    ///
    /// Blank text is replaced by [`UNDESCRIBED_FAILURE`] so every failed log
    /// entry has a non-empty message.
    #[must_use]
    pub fn failed(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if detail.trim().is_empty() {
            Self::Failed(UNDESCRIBED_FAILURE.to_string())
        } else {
            Self::Failed(detail)
        }
    }

    /// Status written to the log entry for this outcome.
    #[must_use]
    pub const fn log_status(&self) -> LogStatus {
        match self {
            Self::Sent => LogStatus::Sent,
            Self::Failed(_) => LogStatus::Failed,
        }
    }

    /// Status the email record takes on after this outcome.
    #[must_use]
    pub const fn email_status(&self) -> EmailStatus {
        match self {
            Self::Sent => EmailStatus::Sent,
            Self::Failed(_) => EmailStatus::Failed,
        }
    }

    /// Whether the attempt succeeded.
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }

    /// Detail text for the log entry: empty on success.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Sent => "",
            Self::Failed(detail) => detail,
        }
    }
}

/// Immutable audit record of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique entry id.
    pub id: Uuid,
    /// The email record this attempt was made for.
    pub email_id: Uuid,
    /// Outcome of the attempt.
    pub status: LogStatus,
    /// Empty on success, the captured error text on failure.
    pub message: String,
    /// When the attempt was recorded.
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Create the log entry documenting `outcome` for `email_id`.
    #[must_use]
    pub fn for_outcome(email_id: Uuid, outcome: &DispatchOutcome, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email_id,
            status: outcome.log_status(),
            message: outcome.detail().to_string(),
            timestamp,
        }
    }
}
