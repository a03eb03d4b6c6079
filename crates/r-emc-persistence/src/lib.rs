//! ---
//! emc_section: "03-persistence-logging"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Message store and storage bindings."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
//! Message store collaborator for the reconciliation engine.
//!
//! The store owns the write path: conflict confirmation, eligibility
//! enforcement, transmission and the durable document. The engine in
//! `r-emc-core` stays read-only.
#![warn(missing_docs)]

use r_emc_msg::{MessageError, MessageId};

/// Result alias used throughout the persistence crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error type for the message store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Wrapper for IO errors encountered while reading/writing store files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// Record-level failure.
    #[error(transparent)]
    Message(#[from] MessageError),
    /// Reported when the store document fails integrity verification.
    #[error("store document hash mismatch")]
    HashMismatch,
    /// The document was written by an incompatible version.
    #[error("unsupported store document version {0}")]
    UnsupportedVersion(u16),
    /// No record carries the requested id.
    #[error("message {0} not found")]
    NotFound(MessageId),
    /// The record was already transmitted; resend instead.
    #[error("message {0} was already sent")]
    AlreadySent(MessageId),
    /// A write asked for neither save nor send.
    #[error("write request neither saves nor sends")]
    EmptyIntent,
    /// Delivery to the receiver failed.
    #[error("transmission of {id} failed: {reason}")]
    Transmit {
        /// Message that could not be delivered.
        id: MessageId,
        /// Transmitter description of the failure.
        reason: String,
    },
    /// Wrapper for Prometheus metrics registration failures.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub mod document;
pub mod journal;
pub mod metrics;
pub mod store;
pub mod transmitter;

pub use document::{load_document, save_document, verify_document, STORE_VERSION};
pub use journal::{replay as replay_journal, JournalEntry, JournalReader, JournalWriter, StoreOperation};
pub use metrics::StoreMetrics;
pub use store::{MessageStore, StoreSettings, WriteOutcome, WriteRequest};
pub use transmitter::{LoggingTransmitter, Transmitter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_ids() {
        let err = StoreError::AlreadySent(MessageId::from("m-7"));
        assert_eq!(format!("{err}"), "message m-7 was already sent");
        let err = StoreError::Transmit {
            id: MessageId::from("m-8"),
            reason: "receiver offline".into(),
        };
        assert_eq!(format!("{err}"), "transmission of m-8 failed: receiver offline");
    }
}
