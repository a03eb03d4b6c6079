//! ---
//! emc_section: "03-logging-persistence"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Structured logging adapters and sinks."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Lightweight tracing helpers shared by the engine, the store and the CLI.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

#[doc(hidden)]
pub use tracing as __tracing;

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "R_EMC_LOG";

/// Initialize a baseline tracing subscriber suitable for tools and tests.
///
/// `R_EMC_LOG` wins over `RUST_LOG`; without either, INFO and above is shown.
pub fn init() {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::default().add_directive(Level::INFO.into()));
    let _ = Registry::default()
        .with(filter)
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Emitter the event concerns.
    pub emitter: Option<&'a str>,
    /// Message record identifier.
    pub message: Option<&'a str>,
    /// Message type wire name.
    pub message_type: Option<&'a str>,
    /// Component or operating mode (projection, eligibility, store, ...).
    pub mode: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an emitter identifier.
    pub fn with_emitter(mut self, emitter: &'a str) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Attach a message identifier.
    pub fn with_message(mut self, message: &'a str) -> Self {
        self.message = Some(message);
        self
    }

    /// Attach a message type.
    pub fn with_message_type(mut self, message_type: &'a str) -> Self {
        self.message_type = Some(message_type);
        self
    }

    /// Attach a component or mode descriptor.
    pub fn with_mode(mut self, mode: &'a str) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation was declined without failing (conflict, ineligible send).
    Declined,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Declined => "declined",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized system event with an outcome.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    macro_rules! emit {
        ($level:expr) => {
            tracing::event!(
                $level,
                event,
                outcome = outcome.as_str(),
                emitter = ctx.emitter.unwrap_or(""),
                message_id = ctx.message.unwrap_or(""),
                message_type = ctx.message_type.unwrap_or(""),
                mode = ctx.mode.unwrap_or(""),
                message = %message
            )
        };
    }
    match outcome {
        SystemEventOutcome::Success => emit!(Level::INFO),
        SystemEventOutcome::Declined => emit!(Level::WARN),
        SystemEventOutcome::Fault => emit!(Level::ERROR),
    }
}
