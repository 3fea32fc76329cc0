//! Template rendering for email subjects and bodies
//!
//! Templates use minijinja syntax (`{{ name }}`). Missing variables render as
//! an empty string so a partial context never aborts a send. Only the HTML part
//! is auto-escaped.

use std::collections::BTreeMap;

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};

use crate::{EmailError, EmailTemplate};

/// Variables available to a template at render time
pub type Context = BTreeMap<String, String>;

const SUBJECT: &str = "subject";
const TEXT: &str = "text";
const HTML: &str = "html";

/// Rendered subject and bodies of one email
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedEmail {
    /// Subject line
    pub subject: String,

    /// Plain text body
    pub text: String,

    /// HTML body, absent when the source had no HTML part
    pub html: Option<String>,
}

/// Renders email templates against a [`Context`]
///
/// # Examples
///
/// ```rust
/// use acton_outbox::{Context, EmailTemplate, TemplateRenderer};
///
/// let renderer = TemplateRenderer::new();
/// let template = EmailTemplate::new("welcome", "Subject: {{foo}}", "Message: {{foo}}");
///
/// let context = Context::from([("foo".to_string(), "bar".to_string())]);
/// let rendered = renderer.render(&template, &context).unwrap();
///
/// assert_eq!(rendered.subject, "Subject: bar");
/// assert_eq!(rendered.text, "Message: bar");
/// assert_eq!(rendered.html, None);
/// ```
#[derive(Debug)]
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    /// Create a renderer with lenient undefined handling
    #[must_use]
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|name| {
            if name == HTML {
                AutoEscape::Html
            } else {
                AutoEscape::None
            }
        });
        Self { env }
    }

    /// Render all parts of a stored template
    ///
    /// # Errors
    ///
    /// Returns `EmailError::TemplateError` if a part has invalid template syntax
    pub fn render(
        &self,
        template: &EmailTemplate,
        context: &Context,
    ) -> Result<RenderedEmail, EmailError> {
        self.render_parts(
            &template.subject_template,
            &template.text_template,
            template.html_template.as_deref(),
            context,
        )
    }

    /// Render raw subject, text and optional HTML sources
    ///
    /// Plain strings without placeholders come back unchanged.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::TemplateError` if a part has invalid template syntax
    pub fn render_parts(
        &self,
        subject: &str,
        text: &str,
        html: Option<&str>,
        context: &Context,
    ) -> Result<RenderedEmail, EmailError> {
        Ok(RenderedEmail {
            subject: self.env.render_named_str(SUBJECT, subject, context)?,
            text: self.env.render_named_str(TEXT, text, context)?,
            html: html
                .map(|source| self.env.render_named_str(HTML, source, context))
                .transpose()?,
        })
    }
}
