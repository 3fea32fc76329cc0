//! Structured logging for the outbox
//!
//! Composition, dispatch and every transport emit `tracing` events. Call
//! [`init`] once at startup to print them.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
#[must_use]
pub const fn default_directives() -> &'static str {
    if cfg!(debug_assertions) {
        "debug,acton_outbox=trace"
    } else {
        "info"
    }
}

/// Initialize the global subscriber
///
/// Uses pretty output in debug builds and JSON lines in release builds.
/// The level comes from `RUST_LOG`, falling back to [`default_directives`].
///
/// # Example
///
/// ```rust,no_run
/// use acton_outbox::observability;
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init()?;
/// tracing::info!("Outbox worker started");
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed
pub fn init() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives()));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?;
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    }

    Ok(())
}
