//! ---
//! emc_section: "01-core-functionality"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Reconciliation engine over the message log."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
//! Non-fatal findings attached to engine output.

use r_emc_logging::{emc_warn, LogContext};
use r_emc_msg::{EmitterId, MessageId, MessageType, PairKind};
use serde::Serialize;

/// A recoverable problem found while interpreting the message set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The parameter payload could not be (fully) decoded.
    DecodeAnomaly {
        /// Offending record.
        message_id: MessageId,
        /// Codec description of the problem.
        detail: String,
    },
    /// A message that acts on an emitter carries no resolvable target id.
    /// It is excluded from projection and uses the default eligibility rule.
    MissingTargetId {
        /// Offending record.
        message_id: MessageId,
        /// Type of the offending record.
        message_type: MessageType,
    },
    /// Several records shared one id; a single one was retained.
    DuplicateMessageId {
        /// Shared identifier.
        message_id: MessageId,
    },
    /// Two consecutive sent messages of one pair carried the same type.
    AlternationViolation {
        /// Emitter the pair applies to.
        target: EmitterId,
        /// Pair that failed to alternate.
        pair: PairKind,
        /// Earlier sent message.
        previous_id: MessageId,
        /// Later sent message of the same type.
        message_id: MessageId,
        /// Repeated type.
        message_type: MessageType,
    },
}

impl Diagnostic {
    /// Record the finding was raised for.
    pub fn message_id(&self) -> &MessageId {
        match self {
            Diagnostic::DecodeAnomaly { message_id, .. }
            | Diagnostic::MissingTargetId { message_id, .. }
            | Diagnostic::DuplicateMessageId { message_id }
            | Diagnostic::AlternationViolation { message_id, .. } => message_id,
        }
    }

    /// Short machine-friendly label.
    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::DecodeAnomaly { .. } => "decode_anomaly",
            Diagnostic::MissingTargetId { .. } => "missing_target_id",
            Diagnostic::DuplicateMessageId { .. } => "duplicate_message_id",
            Diagnostic::AlternationViolation { .. } => "alternation_violation",
        }
    }

    /// Emit the finding as a structured warning.
    pub fn log(&self) {
        let id = self.message_id().as_str();
        match self {
            Diagnostic::DecodeAnomaly { detail, .. } => {
                let ctx = LogContext::new().with_message(id).with_mode("decode");
                emc_warn!(context = ctx, "parameters treated as empty: {}", detail);
            }
            Diagnostic::MissingTargetId { message_type, .. } => {
                let ctx = LogContext::new()
                    .with_message(id)
                    .with_message_type(message_type.as_str())
                    .with_mode("decode");
                emc_warn!(context = ctx, "message has no resolvable target id; excluded");
            }
            Diagnostic::DuplicateMessageId { .. } => {
                let ctx = LogContext::new().with_message(id).with_mode("log");
                emc_warn!(context = ctx, "duplicate message id; keeping one record");
            }
            Diagnostic::AlternationViolation {
                target,
                pair,
                previous_id,
                message_type,
                ..
            } => {
                let ctx = LogContext::new()
                    .with_message(id)
                    .with_emitter(target.as_str())
                    .with_message_type(message_type.as_str())
                    .with_mode("eligibility");
                emc_warn!(
                    context = ctx,
                    "{:?} pair sent {} twice in a row (previous {})",
                    pair,
                    message_type,
                    previous_id
                );
            }
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::DecodeAnomaly { message_id, detail } => {
                write!(f, "{message_id}: {detail}")
            }
            Diagnostic::MissingTargetId {
                message_id,
                message_type,
            } => write!(f, "{message_id}: {message_type} without target id"),
            Diagnostic::DuplicateMessageId { message_id } => {
                write!(f, "{message_id}: duplicate message id")
            }
            Diagnostic::AlternationViolation {
                target,
                previous_id,
                message_id,
                message_type,
                ..
            } => write!(
                f,
                "{message_id}: {message_type} for {target} repeats {previous_id}"
            ),
        }
    }
}
