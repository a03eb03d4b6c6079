//! ---
//! emc_section: "03-persistence-logging"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Message store and storage bindings."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
//! JSON-document message store with the write-path rules applied.
//!
//! Records are only ever added, flipped to sent once, or deleted. Every mutation
//! is staged on a copy of the record set and persisted before it becomes
//! visible, so a failed write leaves the in-memory view untouched.

use std::path::{Path, PathBuf};

use r_emc_core::{
    evaluate, ConflictCandidate, ConflictSet, Eligibility, MessageLog, WriteIntent,
};
use r_emc_logging::{emc_info, log_system_event, LogContext, SystemEventOutcome};
use r_emc_msg::{MessageId, MessageRecord, MessageType, Parameters};
use serde::Serialize;

use crate::document::{load_document, save_document};
use crate::journal::{JournalWriter, StoreOperation};
use crate::metrics::StoreMetrics;
use crate::transmitter::{LoggingTransmitter, Transmitter};
use crate::{Result, StoreError};

/// Write-path policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    /// Refuse sends the eligibility engine rejects.
    pub enforce_eligibility: bool,
    /// Hold conflicting saves until the caller confirms the overwrite.
    pub require_confirmation: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            enforce_eligibility: true,
            require_confirmation: true,
        }
    }
}

/// A new message submitted through the write endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    /// Operator label.
    pub name: String,
    /// Message type.
    pub message_type: MessageType,
    /// Raw parameter payload.
    pub parameters: String,
    /// Save, send, or both.
    pub intent: WriteIntent,
}

impl WriteRequest {
    /// Request around an already encoded payload.
    pub fn new(
        name: impl Into<String>,
        message_type: MessageType,
        parameters: impl Into<String>,
        intent: WriteIntent,
    ) -> Self {
        Self {
            name: name.into(),
            message_type,
            parameters: parameters.into(),
            intent,
        }
    }

    /// Request from typed parameters.
    pub fn from_parameters(
        name: impl Into<String>,
        message_type: MessageType,
        parameters: &Parameters,
        intent: WriteIntent,
    ) -> Result<Self> {
        let record = MessageRecord::from_parameters(name, message_type, parameters)?;
        Ok(Self::new(
            record.name(),
            record.message_type().clone(),
            record.raw_parameters(),
            intent,
        ))
    }

    fn to_record(&self) -> MessageRecord {
        MessageRecord::new(
            self.name.clone(),
            self.message_type.clone(),
            self.parameters.clone(),
        )
        .with_saved(self.intent.save)
    }

    fn candidate(&self, record: &MessageRecord) -> ConflictCandidate {
        ConflictCandidate::new(
            self.name.clone(),
            self.message_type.clone(),
            record.decode().target().cloned(),
        )
    }
}

/// Result of a write-path operation that did not fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// The record was added (and transmitted, if requested).
    Accepted {
        /// Stored record.
        record: MessageRecord,
        /// Records removed by a confirmed overwrite.
        replaced: Vec<MessageId>,
    },
    /// The save collides with saved records; nothing was written.
    Conflicts {
        /// Colliding records to confirm for overwrite.
        conflicts: ConflictSet,
    },
    /// The send is not currently eligible; nothing was written.
    Refused {
        /// Candidate name.
        name: String,
        /// Candidate type.
        message_type: MessageType,
        /// Engine decision.
        eligibility: Eligibility,
    },
}

impl WriteOutcome {
    /// Whether the operation took effect.
    pub fn is_accepted(&self) -> bool {
        matches!(self, WriteOutcome::Accepted { .. })
    }
}

/// File-backed message store.
pub struct MessageStore {
    path: PathBuf,
    records: Vec<MessageRecord>,
    settings: StoreSettings,
    transmitter: Box<dyn Transmitter>,
    journal: Option<JournalWriter>,
    metrics: Option<StoreMetrics>,
}

impl std::fmt::Debug for MessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStore")
            .field("path", &self.path)
            .field("records", &self.records.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl MessageStore {
    /// Open the store document at `path`; a missing document starts empty.
    pub fn open(path: impl Into<PathBuf>, settings: StoreSettings) -> Result<Self> {
        let path = path.into();
        let records = load_document(&path)?;
        tracing::debug!(path = %path.display(), records = records.len(), "message store opened");
        Ok(Self {
            path,
            records,
            settings,
            transmitter: Box::new(LoggingTransmitter),
            journal: None,
            metrics: None,
        })
    }

    /// Replace the transmitter.
    pub fn with_transmitter(mut self, transmitter: impl Transmitter + 'static) -> Self {
        self.transmitter = Box::new(transmitter);
        self
    }

    /// Append every operation to the journal at `path`.
    pub fn with_journal(mut self, path: &Path) -> Result<Self> {
        self.journal = Some(JournalWriter::open(path)?);
        Ok(self)
    }

    /// Attach Prometheus metrics.
    pub fn with_metrics(mut self, metrics: StoreMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Document location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write-path policy in effect.
    pub fn settings(&self) -> StoreSettings {
        self.settings
    }

    /// All records, in insertion order.
    pub fn list(&self) -> &[MessageRecord] {
        &self.records
    }

    /// Look up one record.
    pub fn get(&self, id: &MessageId) -> Option<&MessageRecord> {
        self.records.iter().find(|record| record.id() == id)
    }

    /// Indexed snapshot for the engine.
    pub fn log(&self) -> MessageLog {
        MessageLog::new(self.records.iter().cloned())
    }

    /// Saved records the request would collide with.
    pub fn conflicts(&self, request: &WriteRequest) -> ConflictSet {
        let record = request.to_record();
        self.log().conflicts_with(&request.candidate(&record))
    }

    /// Accept a new message.
    ///
    /// Saves are checked for conflicts first; unless `confirm_overwrite` is set
    /// (or confirmation is disabled) a collision returns
    /// [`WriteOutcome::Conflicts`]. A confirmed overwrite removes the colliding
    /// records together with adding the new one. Sends are then vetted against
    /// the resulting log. Transmit-only writes are kept as unsaved, sent records.
    pub fn submit(&mut self, request: WriteRequest, confirm_overwrite: bool) -> Result<WriteOutcome> {
        if request.intent.is_empty() {
            return Err(StoreError::EmptyIntent);
        }
        let mut record = request.to_record();

        let mut replaced = Vec::new();
        if request.intent.requires_conflict_check() {
            let conflicts = self.log().conflicts_with(&request.candidate(&record));
            if !conflicts.is_empty() {
                if self.settings.require_confirmation && !confirm_overwrite {
                    return self.report_conflicts(&request, conflicts);
                }
                replaced = conflicts.ids().cloned().collect();
            }
        }

        let mut next: Vec<MessageRecord> = self
            .records
            .iter()
            .filter(|existing| !replaced.contains(existing.id()))
            .cloned()
            .collect();

        if request.intent.send {
            let log = MessageLog::new(next.iter().cloned());
            if let Some(refusal) = self.vet(&log, &record) {
                return self.refuse(refusal);
            }
            self.transmit(&mut record)?;
        }

        next.push(record.clone());
        self.commit(next)?;

        for id in &replaced {
            self.journal(StoreOperation::Deleted {
                id: id.clone(),
                overwrite: true,
            });
        }
        self.journal(StoreOperation::Recorded {
            id: record.id().clone(),
            name: record.name().to_owned(),
            message_type: record.message_type().clone(),
            saved: record.is_saved(),
            sent: record.is_sent(),
        });
        if let Some(metrics) = &self.metrics {
            metrics.record_written(intent_label(request.intent));
            if !replaced.is_empty() {
                metrics.record_deletions(replaced.len());
            }
        }

        let ctx = context(&record, "submit");
        emc_info!(
            context = ctx,
            "message accepted (saved={}, sent={}, replaced={})",
            record.is_saved(),
            record.is_sent(),
            replaced.len()
        );
        Ok(WriteOutcome::Accepted { record, replaced })
    }

    /// Transmit a stored message.
    ///
    /// An unsent record is transmitted and flipped to sent. A record that was
    /// already sent is never mutated again; a new record is created instead
    /// (see [`MessageStore::resend`]).
    pub fn send(&mut self, id: &MessageId) -> Result<WriteOutcome> {
        let record = self
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if record.is_sent() {
            return self.resend(id);
        }

        let log = self.log();
        if let Some(refusal) = self.vet(&log, &record) {
            return self.refuse(refusal);
        }

        let mut sent = record;
        self.transmit(&mut sent)?;
        let next = self
            .records
            .iter()
            .map(|existing| {
                if existing.id() == id {
                    sent.clone()
                } else {
                    existing.clone()
                }
            })
            .collect();
        self.commit(next)?;
        self.journal(StoreOperation::Sent { id: id.clone() });

        let ctx = context(&sent, "send");
        emc_info!(context = ctx, "stored message transmitted");
        Ok(WriteOutcome::Accepted {
            record: sent,
            replaced: Vec::new(),
        })
    }

    /// Transmit a copy of an existing message as a new, unsaved record.
    pub fn resend(&mut self, id: &MessageId) -> Result<WriteOutcome> {
        let original = self
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let request = WriteRequest::new(
            original.name(),
            original.message_type().clone(),
            original.raw_parameters(),
            WriteIntent::SEND,
        );
        self.submit(request, false)
    }

    /// Flip a record's sent flag without transmitting it.
    ///
    /// Used when delivery happened outside the store. Fails with
    /// [`StoreError::AlreadySent`] on a record that is already sent.
    pub fn mark_sent(&mut self, id: &MessageId) -> Result<()> {
        let mut next = self.records.clone();
        let record = next
            .iter_mut()
            .find(|record| record.id() == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if record.is_sent() {
            return Err(StoreError::AlreadySent(id.clone()));
        }
        record.mark_sent()?;
        self.commit(next)?;
        self.journal(StoreOperation::Sent { id: id.clone() });
        Ok(())
    }

    /// Remove a record entirely.
    pub fn delete(&mut self, id: &MessageId) -> Result<MessageRecord> {
        let position = self
            .records
            .iter()
            .position(|record| record.id() == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let mut next = self.records.clone();
        let removed = next.remove(position);
        self.commit(next)?;
        self.journal(StoreOperation::Deleted {
            id: id.clone(),
            overwrite: false,
        });
        if let Some(metrics) = &self.metrics {
            metrics.record_deletions(1);
        }
        let ctx = context(&removed, "delete");
        emc_info!(context = ctx, "message deleted");
        Ok(removed)
    }

    fn vet(&self, log: &MessageLog, record: &MessageRecord) -> Option<(MessageRecord, Eligibility)> {
        if !self.settings.enforce_eligibility {
            return None;
        }
        let eligibility = evaluate(log, record);
        (!eligibility.eligible).then(|| (record.clone(), eligibility))
    }

    fn refuse(&mut self, (record, eligibility): (MessageRecord, Eligibility)) -> Result<WriteOutcome> {
        if let Some(metrics) = &self.metrics {
            metrics.record_refusal(record.message_type().as_str());
        }
        let ctx = context(&record, "submit");
        log_system_event(
            Some(&ctx),
            "message.refused",
            &format!("send not eligible ({:?})", eligibility.reason),
            SystemEventOutcome::Declined,
        );
        self.journal(StoreOperation::Refused {
            name: record.name().to_owned(),
            message_type: record.message_type().clone(),
        });
        Ok(WriteOutcome::Refused {
            name: record.name().to_owned(),
            message_type: record.message_type().clone(),
            eligibility,
        })
    }

    fn report_conflicts(&mut self, request: &WriteRequest, conflicts: ConflictSet) -> Result<WriteOutcome> {
        if let Some(metrics) = &self.metrics {
            metrics.record_conflict();
        }
        let ctx = LogContext::new()
            .with_message_type(request.message_type.as_str())
            .with_mode("submit");
        log_system_event(
            Some(&ctx),
            "message.conflicts",
            &format!("save of '{}' collides with {} record(s)", request.name, conflicts.len()),
            SystemEventOutcome::Declined,
        );
        self.journal(StoreOperation::ConflictsReported {
            name: request.name.clone(),
            conflicts: conflicts.ids().cloned().collect(),
        });
        Ok(WriteOutcome::Conflicts { conflicts })
    }

    fn transmit(&self, record: &mut MessageRecord) -> Result<()> {
        self.transmitter.transmit(record)?;
        record.mark_sent()?;
        if let Some(metrics) = &self.metrics {
            metrics.record_transmission(record.message_type().as_str());
        }
        Ok(())
    }

    fn commit(&mut self, next: Vec<MessageRecord>) -> Result<()> {
        save_document(&next, &self.path)?;
        self.records = next;
        Ok(())
    }

    /// Append to the journal. The document is already written at this point,
    /// so a failed append is reported but never fails the operation.
    fn journal(&mut self, operation: StoreOperation) {
        let Some(journal) = self.journal.as_mut() else {
            return;
        };
        if let Err(err) = journal.append(operation) {
            let ctx = LogContext::new().with_mode("journal");
            log_system_event(
                Some(&ctx),
                "journal.append_failed",
                &format!("journal {} not updated: {err}", journal.path().display()),
                SystemEventOutcome::Fault,
            );
        }
    }
}

fn intent_label(intent: WriteIntent) -> &'static str {
    match (intent.save, intent.send) {
        (true, true) => "save_and_send",
        (true, false) => "save",
        _ => "send",
    }
}

fn context<'a>(record: &'a MessageRecord, mode: &'a str) -> LogContext<'a> {
    LogContext::new()
        .with_message(record.id().as_str())
        .with_message_type(record.message_type().as_str())
        .with_mode(mode)
}
