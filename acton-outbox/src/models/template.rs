//! Named, reusable email templates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named email template
///
/// All three parts are template strings with `{{ var }}` placeholders. The
/// name is the lookup key in the repository.
///
/// # Examples
///
/// ```rust
/// use acton_outbox::EmailTemplate;
///
/// let template = EmailTemplate::new("welcome", "Welcome, {{ name }}!", "Hi {{ name }}!")
///     .with_html("<h1>Hi {{ name }}!</h1>");
///
/// assert_eq!(template.name, "welcome");
/// assert!(template.html_template.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    /// Unique template name
    pub name: String,

    /// Subject line template
    pub subject_template: String,

    /// Plain text body template
    pub text_template: String,

    /// HTML body template
    pub html_template: Option<String>,

    /// When the template was created
    pub created_at: DateTime<Utc>,

    /// When the template was last changed
    pub last_updated: DateTime<Utc>,
}

impl EmailTemplate {
    /// Create a template without an HTML part
    #[must_use]
    pub fn new(name: &str, subject_template: &str, text_template: &str) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            subject_template: subject_template.to_string(),
            text_template: text_template.to_string(),
            html_template: None,
            created_at: now,
            last_updated: now,
        }
    }

    /// Set the HTML part
    #[must_use]
    pub fn with_html(mut self, html_template: &str) -> Self {
        self.html_template = Some(html_template.to_string());
        self
    }
}
