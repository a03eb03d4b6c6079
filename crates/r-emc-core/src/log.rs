//! ---
//! emc_section: "01-core-functionality"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Reconciliation engine over the message log."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
//! Read-only indexed view over a snapshot of message records.
//!
//! Records are decoded once and kept in their total order (`created_at`, then
//! `id`), so every consumer sees the same sequence whatever order the store
//! returned them in.

use std::collections::{BTreeMap, HashMap};

use r_emc_msg::{
    DecodedMessage, EmitterId, MessageId, MessageRecord, MessageType, PairKind, Parameters,
};

use crate::diagnostics::Diagnostic;

/// A record together with its decoded parameters.
#[derive(Debug, Clone)]
pub struct LogEntry {
    position: usize,
    record: MessageRecord,
    decoded: DecodedMessage,
}

impl LogEntry {
    /// Index of the entry in log order.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Underlying record.
    pub fn record(&self) -> &MessageRecord {
        &self.record
    }

    /// Record identifier.
    pub fn id(&self) -> &MessageId {
        self.record.id()
    }

    /// Record type.
    pub fn message_type(&self) -> &MessageType {
        self.record.message_type()
    }

    /// Whether the record has been transmitted.
    pub fn is_sent(&self) -> bool {
        self.record.is_sent()
    }

    /// Emitter the record acts upon, when resolvable.
    pub fn target(&self) -> Option<&EmitterId> {
        self.decoded.target()
    }

    /// Typed parameters.
    pub fn parameters(&self) -> &Parameters {
        &self.decoded.parameters
    }

    /// Decoded form including anomalies.
    pub fn decoded(&self) -> &DecodedMessage {
        &self.decoded
    }
}

/// Indexed, ordered snapshot of the message set.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Vec<LogEntry>,
    by_id: HashMap<MessageId, usize>,
    by_type: BTreeMap<MessageType, Vec<usize>>,
    by_target: BTreeMap<EmitterId, Vec<usize>>,
    sent_by_pair: BTreeMap<(EmitterId, PairKind), Vec<usize>>,
    diagnostics: Vec<Diagnostic>,
}

impl MessageLog {
    /// Build the log from records in any order.
    ///
    /// Decode anomalies and unresolvable targets are recorded as diagnostics and
    /// logged; they never prevent the remaining records from being indexed.
    pub fn new(records: impl IntoIterator<Item = MessageRecord>) -> Self {
        let mut diagnostics = Vec::new();
        let mut unique: HashMap<MessageId, MessageRecord> = HashMap::new();
        for record in records {
            match unique.get_mut(record.id()) {
                Some(existing) => {
                    diagnostics.push(Diagnostic::DuplicateMessageId {
                        message_id: record.id().clone(),
                    });
                    if retention_key(&record) > retention_key(existing) {
                        *existing = record;
                    }
                }
                None => {
                    unique.insert(record.id().clone(), record);
                }
            }
        }
        diagnostics.dedup();

        let mut records: Vec<MessageRecord> = unique.into_values().collect();
        records.sort_by(|a, b| a.cmp_order(b));

        let mut log = MessageLog::default();
        for (position, record) in records.into_iter().enumerate() {
            let decoded = record.decode();
            for anomaly in &decoded.anomalies {
                diagnostics.push(Diagnostic::DecodeAnomaly {
                    message_id: record.id().clone(),
                    detail: anomaly.to_string(),
                });
            }
            if decoded.target().is_none() && requires_target(record.message_type()) {
                diagnostics.push(Diagnostic::MissingTargetId {
                    message_id: record.id().clone(),
                    message_type: record.message_type().clone(),
                });
            }
            log.index(LogEntry {
                position,
                record,
                decoded,
            });
        }

        diagnostics.sort();
        diagnostics.dedup();
        for diagnostic in &diagnostics {
            diagnostic.log();
        }
        log.diagnostics = diagnostics;
        log
    }

    fn index(&mut self, entry: LogEntry) {
        let position = entry.position;
        self.by_id.insert(entry.id().clone(), position);
        self.by_type
            .entry(entry.message_type().clone())
            .or_default()
            .push(position);
        if let Some(target) = entry.target() {
            self.by_target
                .entry(target.clone())
                .or_default()
                .push(position);
            if let (true, Some(pairing)) = (entry.is_sent(), entry.message_type().pairing()) {
                self.sent_by_pair
                    .entry((target.clone(), pairing.kind))
                    .or_default()
                    .push(position);
            }
        }
        self.entries.push(entry);
    }

    /// Number of (distinct) records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log holds no records.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in log order.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        self.entries.iter()
    }

    /// Look up an entry by record id.
    pub fn get(&self, id: &MessageId) -> Option<&LogEntry> {
        self.by_id.get(id).map(|&position| &self.entries[position])
    }

    /// Entries of one type, in log order.
    pub fn of_type<'a>(&'a self, message_type: &MessageType) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.positions(self.by_type.get(message_type))
    }

    /// Entries acting on one emitter, in log order.
    pub fn for_target<'a>(&'a self, target: &EmitterId) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.positions(self.by_target.get(target))
    }

    /// Emitters referenced by at least one entry.
    pub fn targets(&self) -> impl Iterator<Item = &EmitterId> + '_ {
        self.by_target.keys()
    }

    /// Saved entries, in log order.
    pub fn saved(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        self.entries.iter().filter(|entry| entry.record().is_saved())
    }

    /// Sent entries of one pair for one emitter, in log order.
    pub fn sent_in_pair<'a>(
        &'a self,
        target: &EmitterId,
        kind: PairKind,
    ) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.positions(self.sent_by_pair.get(&(target.clone(), kind)))
    }

    /// Most recent sent entry of one pair for one emitter.
    pub fn latest_sent(&self, target: &EmitterId, kind: PairKind) -> Option<&LogEntry> {
        self.sent_by_pair
            .get(&(target.clone(), kind))
            .and_then(|positions| positions.last())
            .map(|&position| &self.entries[position])
    }

    /// Every (emitter, pair) combination with at least one sent entry.
    pub fn sent_pairs(&self) -> impl Iterator<Item = &(EmitterId, PairKind)> + '_ {
        self.sent_by_pair.keys()
    }

    /// Findings raised while building the log.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn positions<'a>(
        &'a self,
        positions: Option<&'a Vec<usize>>,
    ) -> impl Iterator<Item = &'a LogEntry> + 'a {
        positions
            .into_iter()
            .flatten()
            .map(move |&position| &self.entries[position])
    }
}

impl FromIterator<MessageRecord> for MessageLog {
    fn from_iter<I: IntoIterator<Item = MessageRecord>>(iter: I) -> Self {
        MessageLog::new(iter)
    }
}

/// Known types all act on an emitter; unknown types may not.
fn requires_target(message_type: &MessageType) -> bool {
    !matches!(message_type, MessageType::Other(_))
}

/// Preference among records sharing an id: a sent copy supersedes an unsent one
/// (the flag only moves forward), remaining ties resolve on the other fields.
fn retention_key(record: &MessageRecord) -> (bool, bool, i64, &str, &str, &str) {
    (
        record.is_sent(),
        record.is_saved(),
        record.created_at().timestamp_nanos_opt().unwrap_or(i64::MAX),
        record.message_type().as_str(),
        record.name(),
        record.raw_parameters(),
    )
}
