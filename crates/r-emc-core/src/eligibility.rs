//! ---
//! emc_section: "01-core-functionality"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Reconciliation engine over the message log."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
//! Action eligibility for the antagonistic pairs.
//!
//! Per (emitter, pair) the most recent sent message drives a three state
//! automaton: [`PairState::NoneSent`], [`PairState::LastWasStart`] and
//! [`PairState::LastWasStop`]. An unsent message is eligible only when it moves
//! that automaton to the opposite class; a sent message is re-offered once a
//! newer transmission of the pair has superseded it. Types outside the pair
//! table, and messages without a resolvable target, are eligible iff unsent.

use std::collections::BTreeMap;

use r_emc_msg::{EmitterId, MessageId, MessageRecord, MessageType, PairKind};
use serde::Serialize;

use crate::diagnostics::Diagnostic;
use crate::log::{LogEntry, MessageLog};

/// Why an eligibility decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityReason {
    /// Type outside the pair table, or no resolvable target; eligible iff unsent.
    DefaultRule,
    /// Nothing of the pair was sent yet and the message is start-class.
    FirstStart,
    /// Nothing of the pair was sent yet and the message is stop-class.
    NothingToStop,
    /// The latest sent message of the pair is of the opposite class.
    Alternates,
    /// The latest sent message of the pair has the same type.
    RepeatsLatest,
    /// A newer transmission of the pair superseded this sent message.
    Superseded,
    /// This sent message is still the latest transmission of its pair.
    StillLatest,
}

/// Decision for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Eligibility {
    /// Whether the send action may be offered.
    pub eligible: bool,
    /// Rule that produced the decision.
    pub reason: EligibilityReason,
}

impl Eligibility {
    fn new(eligible: bool, reason: EligibilityReason) -> Self {
        Self { eligible, reason }
    }

    fn default_rule(sent: bool) -> Self {
        Self::new(!sent, EligibilityReason::DefaultRule)
    }
}

/// State of one (emitter, pair) automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairState {
    /// No message of the pair has been sent.
    NoneSent,
    /// The latest sent message was the start-class member.
    LastWasStart,
    /// The latest sent message was the stop-class member.
    LastWasStop,
}

/// Current automaton state for `target` within `kind`.
pub fn pair_state(log: &MessageLog, target: &EmitterId, kind: PairKind) -> PairState {
    match log
        .latest_sent(target, kind)
        .and_then(|entry| entry.message_type().pairing())
    {
        None => PairState::NoneSent,
        Some(pairing) if pairing.is_start => PairState::LastWasStart,
        Some(_) => PairState::LastWasStop,
    }
}

fn decide(
    log: &MessageLog,
    id: &MessageId,
    message_type: &MessageType,
    sent: bool,
    target: Option<&EmitterId>,
) -> Eligibility {
    let (Some(pairing), Some(target)) = (message_type.pairing(), target) else {
        return Eligibility::default_rule(sent);
    };
    let latest = log.latest_sent(target, pairing.kind);
    match (sent, latest) {
        (false, None) if pairing.is_start => Eligibility::new(true, EligibilityReason::FirstStart),
        (false, None) => Eligibility::new(false, EligibilityReason::NothingToStop),
        (false, Some(latest)) if latest.message_type() != message_type => {
            Eligibility::new(true, EligibilityReason::Alternates)
        }
        (false, Some(_)) => Eligibility::new(false, EligibilityReason::RepeatsLatest),
        (true, None) => Eligibility::new(true, EligibilityReason::Superseded),
        (true, Some(latest)) if latest.id() != id => {
            Eligibility::new(true, EligibilityReason::Superseded)
        }
        (true, Some(_)) => Eligibility::new(false, EligibilityReason::StillLatest),
    }
}

/// Eligibility of a logged message.
pub fn evaluate_entry(log: &MessageLog, entry: &LogEntry) -> Eligibility {
    decide(
        log,
        entry.id(),
        entry.message_type(),
        entry.is_sent(),
        entry.target(),
    )
}

/// Eligibility of any record against the log, whether or not it is part of it.
///
/// Used on the write path to vet a message before it is transmitted.
pub fn evaluate(log: &MessageLog, record: &MessageRecord) -> Eligibility {
    let decoded = record.decode();
    decide(
        log,
        record.id(),
        record.message_type(),
        record.is_sent(),
        decoded.target(),
    )
}

/// Eligibility of every message in the log.
pub fn eligibility_map(log: &MessageLog) -> BTreeMap<MessageId, Eligibility> {
    log.iter()
        .map(|entry| (entry.id().clone(), evaluate_entry(log, entry)))
        .collect()
}

/// Consecutive same-type transmissions within a pair.
///
/// The engine never produces these; they arise from concurrent writers or from
/// sends that bypassed eligibility.
pub fn alternation_violations(log: &MessageLog) -> Vec<Diagnostic> {
    let mut violations = Vec::new();
    for (target, kind) in log.sent_pairs() {
        let sent: Vec<&LogEntry> = log.sent_in_pair(target, *kind).collect();
        for pair in sent.windows(2) {
            let (previous, current) = (pair[0], pair[1]);
            if previous.message_type() == current.message_type() {
                violations.push(Diagnostic::AlternationViolation {
                    target: target.clone(),
                    pair: *kind,
                    previous_id: previous.id().clone(),
                    message_id: current.id().clone(),
                    message_type: current.message_type().clone(),
                });
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn msg(id: &str, ty: MessageType, target: &str, t: i64, sent: bool) -> MessageRecord {
        MessageRecord::new(id, ty, format!(r#"{{"targetId":"{target}"}}"#))
            .with_id(id)
            .with_created_at(Utc.timestamp_opt(1_700_000_000 + t, 0).unwrap())
            .with_saved(true)
            .with_sent(sent)
    }

    fn eligible(log: &MessageLog, record: &MessageRecord) -> bool {
        evaluate(log, record).eligible
    }

    #[test]
    fn after_stop_only_start_is_eligible() {
        let log = MessageLog::new(vec![
            msg("a", MessageType::AddEmitter, "E1", 0, true),
            msg("s", MessageType::StartEmitter, "E1", 1, true),
            msg("x", MessageType::StopEmitter, "E1", 2, true),
        ]);
        assert!(eligible(&log, &msg("s2", MessageType::StartEmitter, "E1", 3, false)));
        assert!(!eligible(&log, &msg("x2", MessageType::StopEmitter, "E1", 3, false)));
        assert_eq!(
            pair_state(&log, &"E1".into(), PairKind::Activation),
            PairState::LastWasStop
        );
    }

    #[test]
    fn first_transmission_must_be_start_class() {
        let start = msg("s", MessageType::StartEmitter, "E1", 0, false);
        let log = MessageLog::new(vec![start.clone()]);
        assert_eq!(
            evaluate(&log, &start),
            Eligibility::new(true, EligibilityReason::FirstStart)
        );
        assert_eq!(
            evaluate(&log, &msg("x", MessageType::StopEmitter, "E1", 1, false)),
            Eligibility::new(false, EligibilityReason::NothingToStop)
        );
        assert!(!eligible(&log, &msg("r", MessageType::RemoveEmitter, "E1", 1, false)));
        assert!(eligible(&log, &msg("a", MessageType::AddEmitter, "E1", 1, false)));
    }

    #[test]
    fn sent_message_without_pair_history_is_reoffered() {
        let sent_start = msg("s", MessageType::StartEmitter, "E1", 0, true);
        assert_eq!(
            evaluate(&MessageLog::default(), &sent_start),
            Eligibility::new(true, EligibilityReason::Superseded)
        );
    }

    #[test]
    fn sent_message_is_reoffered_once_superseded() {
        let log = MessageLog::new(vec![
            msg("s", MessageType::StartEmitter, "E1", 1, true),
            msg("x", MessageType::StopEmitter, "E1", 2, true),
        ]);
        let map = eligibility_map(&log);
        assert_eq!(map[&MessageId::from("s")].reason, EligibilityReason::Superseded);
        assert!(map[&MessageId::from("s")].eligible);
        assert_eq!(map[&MessageId::from("x")].reason, EligibilityReason::StillLatest);
        assert!(!map[&MessageId::from("x")].eligible);
    }

    #[test]
    fn pairs_and_targets_are_independent() {
        let log = MessageLog::new(vec![
            msg("a", MessageType::AddEmitter, "E1", 0, true),
            msg("s", MessageType::StartEmitter, "E2", 1, true),
        ]);
        // Lifecycle pair of E1 does not affect the activation pair.
        assert!(eligible(&log, &msg("s1", MessageType::StartEmitter, "E1", 2, false)));
        assert!(eligible(&log, &msg("r1", MessageType::RemoveEmitter, "E1", 2, false)));
        assert!(!eligible(&log, &msg("a2", MessageType::AddEmitter, "E1", 2, false)));
        assert!(eligible(&log, &msg("x2", MessageType::StopEmitter, "E2", 2, false)));
    }

    #[test]
    fn default_rule_covers_other_types_and_missing_targets() {
        let log = MessageLog::new(vec![msg("s", MessageType::StartEmitter, "E1", 0, true)]);
        let update = msg("u", MessageType::UpdateDirection, "E1", 1, false);
        assert_eq!(
            evaluate(&log, &update),
            Eligibility::new(true, EligibilityReason::DefaultRule)
        );
        assert!(!eligible(&log, &update.clone().with_sent(true)));

        let headless = MessageRecord::new("x", MessageType::StopEmitter, "{broken").with_id("x");
        assert_eq!(
            evaluate(&log, &headless),
            Eligibility::new(true, EligibilityReason::DefaultRule)
        );
    }

    #[test]
    fn equal_timestamps_resolve_by_id() {
        let log = MessageLog::new(vec![
            msg("b", MessageType::StopEmitter, "E1", 5, true),
            msg("a", MessageType::StartEmitter, "E1", 5, true),
        ]);
        assert_eq!(
            pair_state(&log, &"E1".into(), PairKind::Activation),
            PairState::LastWasStop
        );
    }

    #[test]
    fn repeated_sends_are_reported_as_violations() {
        let log = MessageLog::new(vec![
            msg("s1", MessageType::StartEmitter, "E1", 1, true),
            msg("s2", MessageType::StartEmitter, "E1", 2, true),
            msg("x1", MessageType::StopEmitter, "E1", 3, true),
            msg("a1", MessageType::AddEmitter, "E1", 0, true),
        ]);
        let violations = alternation_violations(&log);
        assert_eq!(violations.len(), 1);
        match &violations[0] {
            Diagnostic::AlternationViolation {
                previous_id,
                message_id,
                pair,
                ..
            } => {
                assert_eq!(previous_id.as_str(), "s1");
                assert_eq!(message_id.as_str(), "s2");
                assert_eq!(*pair, PairKind::Activation);
            }
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }
}
