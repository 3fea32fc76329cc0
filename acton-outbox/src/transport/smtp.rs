//! SMTP backend
//!
//! Uses the `lettre` crate to send messages via an SMTP relay.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{
        header::{self, HeaderName, HeaderValue},
        Mailbox, MultiPart, SinglePart,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use parking_lot::Mutex;
use tracing::debug;

use super::MailConnection;
use crate::{config::SmtpSettings, EmailError, TransportMessage};

/// Connection to an SMTP relay
///
/// The underlying `lettre` transport is created when the connection is opened
/// and dropped on [`MailConnection::close`].
pub struct SmtpConnection {
    transport: Mutex<Option<AsyncSmtpTransport<Tokio1Executor>>>,
}

impl std::fmt::Debug for SmtpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConnection")
            .field("open", &self.transport.lock().is_some())
            .finish()
    }
}

impl SmtpConnection {
    /// Open a connection using the given settings
    ///
    /// # Errors
    ///
    /// Returns `EmailError::ConfigError` if the relay or TLS parameters are invalid
    pub fn open(settings: &SmtpSettings) -> Result<Self, EmailError> {
        let transport = Self::create_transport(settings)?;
        debug!(host = %settings.host, port = settings.port, "SMTP transport ready");
        Ok(Self {
            transport: Mutex::new(Some(transport)),
        })
    }

    fn create_transport(
        settings: &SmtpSettings,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, EmailError> {
        let mut builder = if settings.use_tls {
            let tls_parameters = TlsParameters::new(settings.host.clone())
                .map_err(|e| EmailError::config(format!("TLS parameters error: {e}")))?;

            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map_err(|e| EmailError::config(e.to_string()))?
                .tls(Tls::Required(tls_parameters))
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };

        if !settings.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ));
        }

        Ok(builder
            .port(settings.port)
            .timeout(Some(Duration::from_secs(settings.timeout_secs)))
            .build())
    }

    /// Convert a transport message into a `lettre` message
    fn build_message(message: &TransportMessage) -> Result<Message, EmailError> {
        let from: Mailbox = message
            .from
            .parse()
            .map_err(|_| EmailError::InvalidAddress(message.from.clone()))?;

        let mut builder = Message::builder().from(from).subject(message.subject.clone());

        for to_addr in &message.to {
            let to: Mailbox = to_addr
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to_addr.clone()))?;
            builder = builder.to(to);
        }

        for (name, value) in message.headers.iter() {
            let header_name = HeaderName::new_from_ascii(name.to_string())
                .map_err(|_| EmailError::InvalidHeader(name.to_string()))?;
            builder = builder.raw_header(HeaderValue::new(header_name, value.to_string()));
        }

        let built = match message.html() {
            Some(html) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(message.body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html.to_string()),
                    ),
            ),
            None => builder
                .header(header::ContentType::TEXT_PLAIN)
                .body(message.body.clone()),
        };

        built.map_err(|e| EmailError::transport(e.to_string()))
    }
}

#[async_trait]
impl MailConnection for SmtpConnection {
    async fn send(&self, message: &TransportMessage) -> Result<(), EmailError> {
        let transport = self
            .transport
            .lock()
            .clone()
            .ok_or(EmailError::ConnectionClosed)?;
        let message = Self::build_message(message)?;

        transport
            .send(message)
            .await
            .map_err(|e| EmailError::transport(e.to_string()))?;

        Ok(())
    }

    async fn close(&self) -> Result<(), EmailError> {
        self.transport.lock().take();
        Ok(())
    }
}
