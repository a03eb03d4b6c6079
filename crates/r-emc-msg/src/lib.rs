//! ---
//! emc_section: "02-message-model"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Message records, typed parameters and the parameter codec."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
//! Message records exchanged between the operator dashboard and the message store.
//!
//! A [`MessageRecord`] is the only persisted record type. Its parameter payload is
//! kept opaque on the record and interpreted through the [`codec`] module, which
//! turns it into a typed [`Parameters`] value per [`MessageType`].
#![warn(missing_docs)]

pub mod codec;
pub mod params;
pub mod types;

/// Shared result type for message operations.
pub type Result<T> = std::result::Result<T, MessageError>;

/// Errors raised while manipulating message records.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// Wrapper for JSON serialization or deserialization problems.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// The `sent` flag may only transition from `false` to `true` once.
    #[error("message {0} has already been sent")]
    AlreadySent(types::MessageId),
}

pub use codec::{decode, decode_record, encode, DecodeAnomaly, Decoded, DecodedMessage};
pub use params::{
    keys, EmitterSettings, ParamValue, ParameterMap, Parameters, Payload, ScenarioRamp,
};
pub use types::{EmitterId, MessageId, MessageRecord, MessageType, PairKind, Pairing};
