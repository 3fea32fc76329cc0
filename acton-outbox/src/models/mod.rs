//! Email records, templates and attempt logs

mod email;
mod headers;
mod log;
mod template;

pub use email::{Email, EmailStatus, Priority};
pub use headers::Headers;
pub use log::{DispatchOutcome, LogEntry, LogStatus, UNDESCRIBED_FAILURE};
pub use template::EmailTemplate;
