//! ---
//! emc_section: "02-message-model"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Message records, typed parameters and the parameter codec."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::{self, DecodedMessage};
use crate::params::Parameters;
use crate::{MessageError, Result};

/// Opaque identifier assigned to a message record at creation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an existing identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of the emitter a message acts upon.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmitterId(String);

impl EmitterId {
    /// Wrap an emitter identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EmitterId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Antagonistic pair a lifecycle message type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairKind {
    /// `AddEmitter` against `RemoveEmitter`.
    Lifecycle,
    /// `StartEmitter` against `StopEmitter`.
    Activation,
}

/// Pair table entry for an antagonistic message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    /// Pair the type belongs to.
    pub kind: PairKind,
    /// Opposing message type within the pair.
    pub counter: MessageType,
    /// Whether the type is the start-class member of its pair.
    pub is_start: bool,
}

/// Enumeration of message types understood by the workspace.
///
/// Unrecognised type strings are preserved verbatim in [`MessageType::Other`] so
/// a record written by a newer dashboard still round-trips.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Create an emitter with its initial settings.
    AddEmitter,
    /// Begin transmission on an emitter.
    StartEmitter,
    /// Halt transmission on an emitter.
    StopEmitter,
    /// Remove an emitter.
    RemoveEmitter,
    /// Change the emitter direction.
    UpdateDirection,
    /// Change the emitter amplitude.
    UpdateAmplitude,
    /// Change any subset of the emitter settings.
    UpdateEmitter,
    /// Amplitude/direction ramp executed by an external scheduler.
    Scenario,
    /// Type string not known to this build.
    Other(String),
}

impl MessageType {
    /// Every known type, in declaration order.
    pub const KNOWN: [MessageType; 8] = [
        MessageType::AddEmitter,
        MessageType::StartEmitter,
        MessageType::StopEmitter,
        MessageType::RemoveEmitter,
        MessageType::UpdateDirection,
        MessageType::UpdateAmplitude,
        MessageType::UpdateEmitter,
        MessageType::Scenario,
    ];

    /// Wire name of the type.
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::AddEmitter => "addEmitter",
            MessageType::StartEmitter => "startEmitter",
            MessageType::StopEmitter => "stopEmitter",
            MessageType::RemoveEmitter => "removeEmitter",
            MessageType::UpdateDirection => "updateDirection",
            MessageType::UpdateAmplitude => "updateAmplitude",
            MessageType::UpdateEmitter => "updateEmitter",
            MessageType::Scenario => "scenario",
            MessageType::Other(name) => name,
        }
    }

    /// Pair table lookup; `None` for types outside the antagonistic pairs.
    pub fn pairing(&self) -> Option<Pairing> {
        let (kind, counter, is_start) = match self {
            MessageType::AddEmitter => (PairKind::Lifecycle, MessageType::RemoveEmitter, true),
            MessageType::RemoveEmitter => (PairKind::Lifecycle, MessageType::AddEmitter, false),
            MessageType::StartEmitter => (PairKind::Activation, MessageType::StopEmitter, true),
            MessageType::StopEmitter => (PairKind::Activation, MessageType::StartEmitter, false),
            _ => return None,
        };
        Some(Pairing {
            kind,
            counter,
            is_start,
        })
    }

    /// Whether the type updates emitter settings once sent.
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            MessageType::UpdateDirection | MessageType::UpdateAmplitude | MessageType::UpdateEmitter
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for MessageType {
    fn from(value: String) -> Self {
        MessageType::KNOWN
            .iter()
            .find(|known| known.as_str() == value)
            .cloned()
            .unwrap_or(MessageType::Other(value))
    }
}

impl From<MessageType> for String {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::Other(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl FromStr for MessageType {
    type Err = Infallible;

    /// Accepts the wire name case-insensitively as well as kebab-case
    /// spellings (`add-emitter`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|ch| *ch != '-' && *ch != '_')
            .flat_map(char::to_lowercase)
            .collect();
        let known = MessageType::KNOWN
            .iter()
            .find(|known| known.as_str().to_lowercase() == folded)
            .cloned();
        Ok(known.unwrap_or_else(|| MessageType::Other(s.to_owned())))
    }
}

/// Immutable message record; only the `sent` flag may change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    id: MessageId,
    name: String,
    #[serde(rename = "type")]
    message_type: MessageType,
    #[serde(default)]
    parameters: String,
    #[serde(default)]
    saved: bool,
    #[serde(default)]
    sent: bool,
    created_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Construct an unsaved, unsent record around a raw parameter payload.
    pub fn new(
        name: impl Into<String>,
        message_type: MessageType,
        parameters: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            name: name.into(),
            message_type,
            parameters: parameters.into(),
            saved: false,
            sent: false,
            created_at: Utc::now(),
        }
    }

    /// Construct a record by encoding typed parameters.
    pub fn from_parameters(
        name: impl Into<String>,
        message_type: MessageType,
        parameters: &Parameters,
    ) -> Result<Self> {
        let raw = codec::encode(&parameters.to_map())?;
        Ok(Self::new(name, message_type, raw))
    }

    /// Override the generated identifier.
    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = id.into();
        self
    }

    /// Override the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Set the `saved` flag at construction time.
    pub fn with_saved(mut self, saved: bool) -> Self {
        self.saved = saved;
        self
    }

    /// Set the `sent` flag at construction time.
    pub fn with_sent(mut self, sent: bool) -> Self {
        self.sent = sent;
        self
    }

    /// Record identifier.
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Operator-chosen label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Message type.
    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    /// Raw parameter payload as stored.
    pub fn raw_parameters(&self) -> &str {
        &self.parameters
    }

    /// Whether the record is durably stored.
    pub fn is_saved(&self) -> bool {
        self.saved
    }

    /// Whether the record has been transmitted.
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Flip the `sent` flag. Fails when the record was already sent.
    pub fn mark_sent(&mut self) -> Result<()> {
        if self.sent {
            return Err(MessageError::AlreadySent(self.id.clone()));
        }
        self.sent = true;
        Ok(())
    }

    /// Total order over records: `created_at`, then `id`.
    pub fn cmp_order(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Decode the parameter payload into its typed form.
    pub fn decode(&self) -> DecodedMessage {
        codec::decode_record(self)
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn unknown_type_strings_round_trip() {
        let ty = MessageType::from("jamSweep".to_owned());
        assert_eq!(ty, MessageType::Other("jamSweep".into()));
        assert_eq!(String::from(ty), "jamSweep");
        assert_eq!(
            MessageType::from("startEmitter".to_owned()),
            MessageType::StartEmitter
        );
    }

    #[test]
    fn from_str_accepts_cli_spellings() {
        assert_eq!(
            "add-emitter".parse::<MessageType>().unwrap(),
            MessageType::AddEmitter
        );
        assert_eq!(
            "STOPEMITTER".parse::<MessageType>().unwrap(),
            MessageType::StopEmitter
        );
        assert_eq!(
            "update_amplitude".parse::<MessageType>().unwrap(),
            MessageType::UpdateAmplitude
        );
    }

    #[test]
    fn pair_table_matches_counter_types() {
        for ty in MessageType::KNOWN {
            if let Some(pairing) = ty.pairing() {
                let counter = pairing.counter.pairing().expect("counter is paired");
                assert_eq!(counter.counter, ty);
                assert_eq!(counter.kind, pairing.kind);
                assert_ne!(counter.is_start, pairing.is_start);
            }
        }
        assert!(MessageType::UpdateDirection.pairing().is_none());
        assert!(MessageType::Scenario.pairing().is_none());
    }

    #[test]
    fn sent_flag_flips_once() {
        let mut record = MessageRecord::new("start-1", MessageType::StartEmitter, "{}");
        record.mark_sent().unwrap();
        assert!(record.is_sent());
        assert!(matches!(
            record.mark_sent(),
            Err(MessageError::AlreadySent(_))
        ));
    }

    #[test]
    fn ordering_breaks_ties_by_id() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let a = MessageRecord::new("a", MessageType::StartEmitter, "{}")
            .with_id("a")
            .with_created_at(ts);
        let b = MessageRecord::new("b", MessageType::StopEmitter, "{}")
            .with_id("b")
            .with_created_at(ts);
        assert_eq!(a.cmp_order(&b), Ordering::Less);
        assert_eq!(b.cmp_order(&a), Ordering::Greater);
    }

    #[test]
    fn record_serializes_with_camel_case_fields() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = MessageRecord::new("add", MessageType::AddEmitter, r#"{"targetId":"E1"}"#)
            .with_id("m-1")
            .with_created_at(ts)
            .with_saved(true);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "addEmitter");
        assert_eq!(value["createdAt"], "2024-05-01T12:00:00Z");
        assert_eq!(value["saved"], true);
        let back: MessageRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
