//! ---
//! emc_section: "03-persistence-logging"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Message store and storage bindings."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
//! Delivery seam between the store and the emitter receiver.

use r_emc_logging::{log_system_event, LogContext, SystemEventOutcome};
use r_emc_msg::MessageRecord;

use crate::Result;

/// Delivers a message to the receiver. Called before the record is marked sent;
/// an error leaves the store unchanged.
pub trait Transmitter: Send + Sync {
    /// Deliver one message.
    fn transmit(&self, record: &MessageRecord) -> Result<()>;
}

/// Transmitter that only records the delivery in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTransmitter;

impl Transmitter for LoggingTransmitter {
    fn transmit(&self, record: &MessageRecord) -> Result<()> {
        let decoded = record.decode();
        let target = decoded.target().map(|id| id.as_str()).unwrap_or("");
        let ctx = LogContext::new()
            .with_emitter(target)
            .with_message(record.id().as_str())
            .with_message_type(record.message_type().as_str())
            .with_mode("transmit");
        log_system_event(
            Some(&ctx),
            "message.transmit",
            record.raw_parameters(),
            SystemEventOutcome::Success,
        );
        Ok(())
    }
}

impl<T: Transmitter + ?Sized> Transmitter for Box<T> {
    fn transmit(&self, record: &MessageRecord) -> Result<()> {
        (**self).transmit(record)
    }
}

impl<T: Transmitter + ?Sized> Transmitter for std::sync::Arc<T> {
    fn transmit(&self, record: &MessageRecord) -> Result<()> {
        (**self).transmit(record)
    }
}
