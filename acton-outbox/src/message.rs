//! Transport-ready messages built from email records

use serde::{Deserialize, Serialize};

use crate::{Email, EmailError, Headers};

/// MIME type of the HTML alternative part
pub const TEXT_HTML: &str = "text/html";

/// An alternative rendering of the message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    /// Body content
    pub content: String,

    /// MIME type of `content`
    pub mime_type: String,
}

/// A fully formed message handed to a [`MailConnection`](crate::MailConnection)
///
/// The plain text `body` is always present. HTML content travels as an
/// [`Alternative`], never in place of the text body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMessage {
    /// Sender address
    pub from: String,

    /// Recipients
    pub to: Vec<String>,

    /// Subject line
    pub subject: String,

    /// Plain text body
    pub body: String,

    /// Alternative bodies (HTML)
    pub alternatives: Vec<Alternative>,

    /// Custom headers in insertion order
    pub headers: Headers,
}

impl TransportMessage {
    /// Build the outbound message for an email record
    ///
    /// # Errors
    ///
    /// Returns `EmailError::SerializationError` if the record's stored headers
    /// cannot be decoded
    ///
    /// # Examples
    ///
    /// ```rust
    /// use acton_outbox::{Email, RenderedEmail, TransportMessage};
    ///
    /// let email = Email::queued("from@example.com", "to@example.com", RenderedEmail {
    ///     subject: "Subject".to_string(),
    ///     text: "Message".to_string(),
    ///     html: Some("<p>HTML</p>".to_string()),
    /// });
    ///
    /// let message = TransportMessage::build(&email).unwrap();
    /// assert_eq!(message.body, "Message");
    /// assert_eq!(message.html(), Some("<p>HTML</p>"));
    /// ```
    pub fn build(email: &Email) -> Result<Self, EmailError> {
        let headers = email.decoded_headers()?;

        let alternatives = email
            .html_body
            .iter()
            .filter(|html| !html.is_empty())
            .map(|html| Alternative {
                content: html.clone(),
                mime_type: TEXT_HTML.to_string(),
            })
            .collect();

        Ok(Self {
            from: email.from_address.clone(),
            to: vec![email.to.clone()],
            subject: email.subject.clone(),
            body: email.text_body.clone(),
            alternatives,
            headers,
        })
    }

    /// The HTML alternative, if any
    #[must_use]
    pub fn html(&self) -> Option<&str> {
        self.alternatives
            .iter()
            .find(|alternative| alternative.mime_type == TEXT_HTML)
            .map(|alternative| alternative.content.as_str())
    }
}
