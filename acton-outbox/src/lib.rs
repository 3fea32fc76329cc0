//! acton-outbox: queued email delivery with per-attempt logging
//!
//! Emails are composed into queued records, one per recipient, from either a
//! stored template or raw content. A [`Dispatcher`] later sends each record
//! over a configured transport and appends one [`LogEntry`] per attempt.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use acton_outbox::{
//!     config::TransportSettings, Composer, Dispatcher, EmailStatus, InMemoryRepository,
//!     MailRequest, Outbox, Transport,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), acton_outbox::EmailError> {
//! let repository = Arc::new(InMemoryRepository::new());
//! let outbox = Outbox::new();
//! let transport = Transport::new(TransportSettings::with_backend("memory")).with_outbox(outbox.clone());
//!
//! let composer = Composer::new(repository.clone());
//! let dispatcher = Dispatcher::new(repository, transport);
//!
//! let mut emails = composer
//!     .compose(
//!         MailRequest::new("from@example.com")
//!             .to("alice@example.com")
//!             .subject("Hi {{ name }}")
//!             .text("Hello {{ name }}")
//!             .var("name", "Alice"),
//!     )
//!     .await?;
//!
//! let report = dispatcher.dispatch_all(&mut emails, None).await?;
//! assert_eq!(report.sent(), 1);
//! assert_eq!(emails[0].status(), EmailStatus::Sent);
//! assert!(outbox.was_sent_with_subject("Hi Alice"));
//! # Ok(())
//! # }
//! ```
//!
//! # Backends
//!
//! - `smtp` - delivers through an SMTP relay (default)
//! - `console` - logs messages instead of sending them
//! - `memory` - keeps messages in an [`Outbox`] for inspection
//! - `dummy` - accepts and discards messages

#![allow(clippy::missing_errors_doc)]

pub mod compose;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod models;
pub mod observability;
pub mod repository;
pub mod template;
pub mod transport;

pub use compose::{Composer, Content, Envelope, MailRequest, TemplateRef};
pub use dispatch::{BatchReport, Dispatcher};
pub use error::EmailError;
pub use message::TransportMessage;
pub use models::{
    DispatchOutcome, Email, EmailStatus, EmailTemplate, Headers, LogEntry, LogStatus, Priority,
    UNDESCRIBED_FAILURE,
};
pub use repository::{EmailRepository, InMemoryRepository};
pub use template::{Context, RenderedEmail, TemplateRenderer};
pub use transport::{
    BackendKind, ConsoleConnection, DummyConnection, MailConnection, MemoryConnection, Outbox,
    SmtpConnection, Transport,
};
