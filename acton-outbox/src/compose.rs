//! Creating queued email records from raw content or templates
//!
//! A [`MailRequest`] collects the fluent arguments; [`Content`] is the checked
//! form where a template and raw content cannot both be present. The
//! [`Composer`] renders the content for every recipient and stores one
//! [`Email`] per recipient.

use std::sync::Arc;

use tracing::debug;

use crate::{
    Context, Email, EmailError, EmailRepository, EmailTemplate, Headers, Priority,
    RenderedEmail, TemplateRenderer,
};

/// A template given by value or by repository name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    /// Look the template up by name when composing
    Named(String),
    /// Use this template directly
    Inline(EmailTemplate),
}

impl From<&str> for TemplateRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for TemplateRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<EmailTemplate> for TemplateRef {
    fn from(template: EmailTemplate) -> Self {
        Self::Inline(template)
    }
}

/// What to render for each recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Render a stored or inline template
    Template {
        /// The template to render
        template: TemplateRef,
        /// Variables shared by every recipient
        context: Context,
    },
    /// Render raw subject, text and HTML strings
    Raw {
        /// Subject line source
        subject: String,
        /// Plain text body source
        text: String,
        /// HTML body source
        html: Option<String>,
        /// Variables shared by every recipient
        context: Context,
    },
}

/// Sender, recipients and shared metadata of a composed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Sender address for every record
    pub from_address: String,
    /// One record is created per recipient, in this order
    pub recipients: Vec<String>,
    /// Headers attached to every record
    pub headers: Headers,
    /// Priority of every record
    pub priority: Priority,
}

/// Builder for a batch of emails
///
/// # Examples
///
/// ```rust
/// use acton_outbox::MailRequest;
///
/// let request = MailRequest::new("from@example.com")
///     .to("to1@example.com")
///     .to("to2@example.com")
///     .subject("Hi {{ name }}")
///     .text("Message {{ name }}")
///     .var("name", "Bob")
///     .header("Reply-To", "reply_to@mail.com");
///
/// // A template cannot be combined with raw content
/// let conflicting = MailRequest::new("from@example.com").template("welcome").subject("bar");
/// assert!(conflicting.into_parts().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MailRequest {
    from_address: String,
    recipients: Vec<String>,
    subject: Option<String>,
    text: Option<String>,
    html: Option<String>,
    template: Option<TemplateRef>,
    context: Context,
    headers: Headers,
    priority: Priority,
}

impl MailRequest {
    /// Start a request from `from_address`
    #[must_use]
    pub fn new(from_address: &str) -> Self {
        Self {
            from_address: from_address.to_string(),
            ..Self::default()
        }
    }

    /// Add a recipient
    #[must_use]
    pub fn to(mut self, address: &str) -> Self {
        self.recipients.push(address.to_string());
        self
    }

    /// Add multiple recipients
    #[must_use]
    pub fn to_multiple(mut self, addresses: &[&str]) -> Self {
        self.recipients
            .extend(addresses.iter().map(|address| (*address).to_string()));
        self
    }

    /// Set the subject source
    #[must_use]
    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    /// Set the plain text body source
    #[must_use]
    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    /// Set the HTML body source
    #[must_use]
    pub fn html(mut self, html: &str) -> Self {
        self.html = Some(html.to_string());
        self
    }

    /// Render from a template instead of raw content
    #[must_use]
    pub fn template(mut self, template: impl Into<TemplateRef>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Replace the render context
    #[must_use]
    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Add one context variable
    #[must_use]
    pub fn var(mut self, name: &str, value: &str) -> Self {
        self.context.insert(name.to_string(), value.to_string());
        self
    }

    /// Add a custom header
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace all custom headers
    #[must_use]
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Set the priority of the created records
    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Split into the envelope and checked content
    ///
    /// # Errors
    ///
    /// Returns `EmailError::ContentConflict` if a template was combined with
    /// any of subject, text or HTML
    pub fn into_parts(self) -> Result<(Envelope, Content), EmailError> {
        let content = match self.template {
            Some(template) => {
                let conflicts: Vec<&str> = [
                    ("subject", self.subject.is_some()),
                    ("text", self.text.is_some()),
                    ("html", self.html.is_some()),
                ]
                .into_iter()
                .filter_map(|(field, set)| set.then_some(field))
                .collect();

                if !conflicts.is_empty() {
                    return Err(EmailError::ContentConflict(conflicts.join(", ")));
                }

                Content::Template {
                    template,
                    context: self.context,
                }
            }
            None => Content::Raw {
                subject: self.subject.unwrap_or_default(),
                text: self.text.unwrap_or_default(),
                html: self.html,
                context: self.context,
            },
        };

        let envelope = Envelope {
            from_address: self.from_address,
            recipients: self.recipients,
            headers: self.headers,
            priority: self.priority,
        };
        Ok((envelope, content))
    }
}

/// Creates queued email records
#[derive(Clone)]
pub struct Composer {
    repository: Arc<dyn EmailRepository>,
    renderer: Arc<TemplateRenderer>,
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer").finish_non_exhaustive()
    }
}

impl Composer {
    /// Create a composer that stores records in `repository`
    #[must_use]
    pub fn new(repository: Arc<dyn EmailRepository>) -> Self {
        Self {
            repository,
            renderer: Arc::new(TemplateRenderer::new()),
        }
    }

    /// Compose and store one queued email per recipient
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `EmailError::ContentConflict` if a template was combined with raw content
    /// - `EmailError::TemplateNotFound` if a named template does not exist
    /// - `EmailError::TemplateError` if any part fails to render
    /// - `EmailError::RepositoryError` if a record cannot be stored
    ///
    /// No record is stored when any of the first three occur.
    pub async fn compose(&self, request: MailRequest) -> Result<Vec<Email>, EmailError> {
        let (envelope, content) = request.into_parts()?;
        self.compose_content(&envelope, content).await
    }

    /// Compose and store records from already-checked content
    ///
    /// # Errors
    ///
    /// Same as [`Composer::compose`], minus the content conflict
    pub async fn compose_content(
        &self,
        envelope: &Envelope,
        content: Content,
    ) -> Result<Vec<Email>, EmailError> {
        let headers = if envelope.headers.is_empty() {
            None
        } else {
            Some(envelope.headers.to_json()?)
        };

        let source = match content {
            Content::Template { template, context } => {
                let template = match template {
                    TemplateRef::Named(name) => self.repository.template_by_name(&name).await?,
                    TemplateRef::Inline(template) => template,
                };
                Source::Template(template, context)
            }
            Content::Raw {
                subject,
                text,
                html,
                context,
            } => Source::Raw(RenderedEmail { subject, text, html }, context),
        };

        let emails = envelope
            .recipients
            .iter()
            .map(|recipient| -> Result<Email, EmailError> {
                let rendered = self.render(&source)?;
                Ok(Email::queued(&envelope.from_address, recipient, rendered)
                    .with_headers(headers.clone())
                    .with_priority(envelope.priority))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for email in &emails {
            self.repository.create_email(email).await?;
        }

        debug!(
            from = %envelope.from_address,
            count = emails.len(),
            "Composed queued emails"
        );
        Ok(emails)
    }

    fn render(&self, source: &Source) -> Result<RenderedEmail, EmailError> {
        match source {
            Source::Template(template, context) => self.renderer.render(template, context),
            Source::Raw(raw, context) => self.renderer.render_parts(
                &raw.subject,
                &raw.text,
                raw.html.as_deref(),
                context,
            ),
        }
    }
}

/// Resolved content ready to render
enum Source {
    Template(EmailTemplate, Context),
    Raw(RenderedEmail, Context),
}
