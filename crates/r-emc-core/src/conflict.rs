//! ---
//! emc_section: "01-core-functionality"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Reconciliation engine over the message log."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
//! Write-time collision check against saved messages.
//!
//! Detection only: nothing here deletes or mutates records. The write path decides
//! whether to ask for confirmation and removes the reported set itself.

use indexmap::IndexMap;
use r_emc_msg::{EmitterId, MessageId, MessageType};
use serde::Serialize;

use crate::log::{LogEntry, MessageLog};

/// What a write operation intends to do with a new message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteIntent {
    /// Persist the message.
    pub save: bool,
    /// Transmit the message.
    pub send: bool,
}

impl WriteIntent {
    /// Persist without transmitting.
    pub const SAVE: WriteIntent = WriteIntent {
        save: true,
        send: false,
    };
    /// Transmit without persisting.
    pub const SEND: WriteIntent = WriteIntent {
        save: false,
        send: true,
    };
    /// Persist and transmit.
    pub const SAVE_AND_SEND: WriteIntent = WriteIntent {
        save: true,
        send: true,
    };

    /// Transmit-only writes bypass the conflict check.
    pub fn requires_conflict_check(&self) -> bool {
        self.save
    }

    /// Whether the intent does anything at all.
    pub fn is_empty(&self) -> bool {
        !self.save && !self.send
    }
}

/// The prospective message a save would create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictCandidate {
    /// Operator label.
    pub name: String,
    /// Message type.
    pub message_type: MessageType,
    /// Emitter the message would act upon.
    pub target: Option<EmitterId>,
}

impl ConflictCandidate {
    /// Describe a candidate.
    pub fn new(
        name: impl Into<String>,
        message_type: MessageType,
        target: Option<EmitterId>,
    ) -> Self {
        Self {
            name: name.into(),
            message_type,
            target,
        }
    }

    fn matches_name(&self, name: &str) -> bool {
        let own = self.name.trim();
        !own.is_empty() && own == name.trim()
    }

    fn matches_target(&self, entry: &LogEntry) -> bool {
        match (&self.target, entry.target()) {
            (Some(own), Some(other)) => {
                own == other && &self.message_type == entry.message_type()
            }
            _ => false,
        }
    }
}

/// Why a saved message collides with the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// Same non-empty name.
    SameName,
    /// Same type acting on the same emitter.
    SameTarget,
    /// Both of the above.
    SameNameAndTarget,
}

/// A saved message reported by [`find_conflicts`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// Conflicting record.
    pub id: MessageId,
    /// Its name.
    pub name: String,
    /// Its type.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Its target, when resolvable.
    pub target_id: Option<EmitterId>,
    /// Matching rule.
    pub reason: ConflictReason,
}

/// Conflicting records keyed by id, in log order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConflictSet(IndexMap<MessageId, Conflict>);

impl ConflictSet {
    /// No conflicts were found.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of conflicting records.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the given record is part of the set.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.0.contains_key(id)
    }

    /// Conflicts in log order.
    pub fn iter(&self) -> impl Iterator<Item = &Conflict> + '_ {
        self.0.values()
    }

    /// Identifiers of the conflicting records, in log order.
    pub fn ids(&self) -> impl Iterator<Item = &MessageId> + '_ {
        self.0.keys()
    }
}

impl<'a> IntoIterator for &'a ConflictSet {
    type Item = &'a Conflict;
    type IntoIter = indexmap::map::Values<'a, MessageId, Conflict>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.values()
    }
}

/// Saved entries that collide with `candidate` by name or by (type, target).
///
/// Unsaved entries in `saved` are ignored, so a full log iterator may be passed.
pub fn find_conflicts<'a>(
    candidate: &ConflictCandidate,
    saved: impl IntoIterator<Item = &'a LogEntry>,
) -> ConflictSet {
    let mut set = IndexMap::new();
    for entry in saved {
        if !entry.record().is_saved() {
            continue;
        }
        let reason = match (
            candidate.matches_name(entry.record().name()),
            candidate.matches_target(entry),
        ) {
            (true, true) => ConflictReason::SameNameAndTarget,
            (true, false) => ConflictReason::SameName,
            (false, true) => ConflictReason::SameTarget,
            (false, false) => continue,
        };
        set.insert(
            entry.id().clone(),
            Conflict {
                id: entry.id().clone(),
                name: entry.record().name().to_owned(),
                message_type: entry.message_type().clone(),
                target_id: entry.target().cloned(),
                reason,
            },
        );
    }
    ConflictSet(set)
}

impl MessageLog {
    /// Conflict check of `candidate` against every saved entry.
    pub fn conflicts_with(&self, candidate: &ConflictCandidate) -> ConflictSet {
        find_conflicts(candidate, self.saved())
    }
}
