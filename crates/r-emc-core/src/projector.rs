//! ---
//! emc_section: "01-core-functionality"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Reconciliation engine over the message log."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
//! Emitter state projection.
//!
//! `active` is presence based: any sent start makes an emitter active unless any
//! stop or removal for it has been sent, whatever their relative order. This is
//! deliberately independent of the alternation rule in [`crate::eligibility`].

use std::collections::BTreeMap;

use r_emc_msg::{EmitterId, EmitterSettings, MessageId, MessageType, PairKind, Payload};
use serde::Serialize;

use crate::log::{LogEntry, MessageLog};

/// Projection switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectorOptions {
    /// Apply sent updates ordered after the triggering add.
    pub fold_updates: bool,
}

impl Default for ProjectorOptions {
    fn default() -> Self {
        Self { fold_updates: true }
    }
}

/// Current operational view of one emitter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitterView {
    /// Emitter identifier.
    pub target_id: EmitterId,
    /// Display name: the `name` parameter, else the add message's label.
    pub name: String,
    /// Amplitude.
    pub amplitude: Option<f64>,
    /// Direction in degrees.
    pub direction: Option<f64>,
    /// Pulse repetition interval.
    pub pri: Option<f64>,
    /// Pulse width.
    pub pulse_width: Option<f64>,
    /// Started and neither stopped nor removed.
    pub active: bool,
    /// Whether the triggering add has been sent.
    pub transmitted: bool,
    /// Whether the latest sent lifecycle message is a removal.
    pub removed: bool,
    /// Triggering add message.
    pub source: MessageId,
}

impl EmitterView {
    fn from_add(target: &EmitterId, add: &LogEntry) -> Self {
        let settings = match &add.parameters().payload {
            Payload::Add(settings) => settings.clone(),
            _ => EmitterSettings::default(),
        };
        Self {
            target_id: target.clone(),
            name: settings
                .name
                .unwrap_or_else(|| add.record().name().to_owned()),
            amplitude: settings.amplitude,
            direction: settings.direction,
            pri: settings.pri,
            pulse_width: settings.pulse_width,
            active: false,
            transmitted: add.is_sent(),
            removed: false,
            source: add.id().clone(),
        }
    }

    fn apply(&mut self, payload: &Payload) {
        match payload {
            Payload::Direction {
                new_direction: Some(direction),
            } => self.direction = Some(*direction),
            Payload::Amplitude {
                new_amplitude: Some(amplitude),
            } => self.amplitude = Some(*amplitude),
            Payload::Update(settings) => {
                if let Some(name) = &settings.name {
                    self.name = name.clone();
                }
                self.amplitude = settings.amplitude.or(self.amplitude);
                self.direction = settings.direction.or(self.direction);
                self.pri = settings.pri.or(self.pri);
                self.pulse_width = settings.pulse_width.or(self.pulse_width);
            }
            _ => {}
        }
    }
}

/// The add that defines an emitter: latest sent add, else latest add.
pub fn triggering_add<'a>(log: &'a MessageLog, target: &EmitterId) -> Option<&'a LogEntry> {
    let adds = log
        .for_target(target)
        .filter(|entry| entry.message_type() == &MessageType::AddEmitter);
    let mut latest = None;
    let mut latest_sent = None;
    for entry in adds {
        if entry.is_sent() {
            latest_sent = Some(entry);
        }
        latest = Some(entry);
    }
    latest_sent.or(latest)
}

/// Project a single emitter; `None` when no add message references it.
pub fn project_emitter(
    log: &MessageLog,
    target: &EmitterId,
    options: &ProjectorOptions,
) -> Option<EmitterView> {
    let add = triggering_add(log, target)?;
    let mut view = EmitterView::from_add(target, add);

    let sent_of = |ty: MessageType| {
        log.for_target(target)
            .any(|entry| entry.is_sent() && entry.message_type() == &ty)
    };
    let stopped = sent_of(MessageType::StopEmitter);
    // A newer sent add revives a removed emitter.
    view.removed = log
        .latest_sent(target, PairKind::Lifecycle)
        .is_some_and(|entry| entry.message_type() == &MessageType::RemoveEmitter);
    view.active = sent_of(MessageType::StartEmitter) && !stopped && !view.removed;

    if options.fold_updates {
        log.for_target(target)
            .filter(|entry| entry.position() > add.position())
            .filter(|entry| entry.is_sent() && entry.message_type().is_update())
            .for_each(|entry| view.apply(&entry.parameters().payload));
    }
    Some(view)
}

/// Fold the whole log into per-emitter views.
pub fn project(log: &MessageLog, options: &ProjectorOptions) -> BTreeMap<EmitterId, EmitterView> {
    log.targets()
        .filter_map(|target| {
            project_emitter(log, target, options).map(|view| (target.clone(), view))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use r_emc_msg::MessageRecord;
    use serde_json::json;

    fn msg(id: &str, ty: MessageType, params: serde_json::Value, t: i64, sent: bool) -> MessageRecord {
        MessageRecord::new(id, ty, params.to_string())
            .with_id(id)
            .with_created_at(Utc.timestamp_opt(1_700_000_000 + t, 0).unwrap())
            .with_saved(true)
            .with_sent(sent)
    }

    fn add(id: &str, target: &str, t: i64, sent: bool) -> MessageRecord {
        msg(
            id,
            MessageType::AddEmitter,
            json!({"targetId": target, "name": "Radar", "amplitude": 10, "direction": 90, "pri": 1.5, "pulseWidth": 0.2}),
            t,
            sent,
        )
    }

    fn bare(id: &str, ty: MessageType, target: &str, t: i64, sent: bool) -> MessageRecord {
        msg(id, ty, json!({"targetId": target}), t, sent)
    }

    fn view(records: Vec<MessageRecord>, target: &str) -> Option<EmitterView> {
        let log = MessageLog::new(records);
        project(&log, &ProjectorOptions::default()).remove(&EmitterId::from(target))
    }

    #[test]
    fn sent_add_alone_is_transmitted_but_inactive() {
        let v = view(vec![add("a", "E1", 0, true)], "E1").unwrap();
        assert!(!v.active);
        assert!(v.transmitted);
        assert_eq!(v.name, "Radar");
        assert_eq!(v.amplitude, Some(10.0));
        assert_eq!(v.pulse_width, Some(0.2));
    }

    #[test]
    fn sent_start_activates() {
        let v = view(
            vec![add("a", "E1", 0, true), bare("s", MessageType::StartEmitter, "E1", 1, true)],
            "E1",
        )
        .unwrap();
        assert!(v.active);
    }

    #[test]
    fn any_sent_stop_or_remove_deactivates() {
        let stopped = view(
            vec![
                add("a", "E1", 0, true),
                bare("s", MessageType::StartEmitter, "E1", 1, true),
                bare("x", MessageType::StopEmitter, "E1", 2, true),
            ],
            "E1",
        )
        .unwrap();
        assert!(!stopped.active);

        // Presence based: a stop sent before a later start still wins.
        let restarted = view(
            vec![
                add("a", "E1", 0, true),
                bare("x", MessageType::StopEmitter, "E1", 1, true),
                bare("s", MessageType::StartEmitter, "E1", 2, true),
            ],
            "E1",
        )
        .unwrap();
        assert!(!restarted.active);

        let removed = view(
            vec![
                add("a", "E1", 0, true),
                bare("s", MessageType::StartEmitter, "E1", 1, true),
                bare("r", MessageType::RemoveEmitter, "E1", 2, true),
            ],
            "E1",
        )
        .unwrap();
        assert!(!removed.active);
        assert!(removed.removed);
    }

    #[test]
    fn re_added_emitter_is_no_longer_removed() {
        let v = view(
            vec![
                add("a", "E1", 0, true),
                bare("r", MessageType::RemoveEmitter, "E1", 1, true),
                add("a2", "E1", 2, true),
            ],
            "E1",
        )
        .unwrap();
        assert!(!v.removed);
        assert_eq!(v.source.as_str(), "a2");

        let unsent_readd = view(
            vec![
                add("a", "E1", 0, true),
                bare("r", MessageType::RemoveEmitter, "E1", 1, true),
                add("a2", "E1", 2, false),
            ],
            "E1",
        )
        .unwrap();
        assert!(unsent_readd.removed);
    }

    #[test]
    fn unsent_messages_do_not_change_state() {
        let v = view(
            vec![
                add("a", "E1", 0, false),
                bare("s", MessageType::StartEmitter, "E1", 1, false),
            ],
            "E1",
        )
        .unwrap();
        assert!(!v.active);
        assert!(!v.transmitted);
    }

    #[test]
    fn emitters_without_add_are_omitted() {
        let log = MessageLog::new(vec![bare("s", MessageType::StartEmitter, "E7", 0, true)]);
        assert!(project(&log, &ProjectorOptions::default()).is_empty());
    }

    #[test]
    fn latest_sent_add_is_the_trigger() {
        let v = view(vec![add("a", "E1", 0, true), add("b", "E1", 5, false)], "E1").unwrap();
        assert_eq!(v.source.as_str(), "a");
        assert!(v.transmitted);

        let v = view(vec![add("a", "E1", 0, false), add("b", "E1", 5, false)], "E1").unwrap();
        assert_eq!(v.source.as_str(), "b");
    }

    #[test]
    fn sent_updates_after_the_add_are_folded_in_order() {
        let records = vec![
            msg("u0", MessageType::UpdateDirection, json!({"targetId": "E1", "newDirection": 5}), 0, true),
            add("a", "E1", 1, true),
            msg("u1", MessageType::UpdateDirection, json!({"targetId": "E1", "newDirection": 120}), 2, true),
            msg("u2", MessageType::UpdateAmplitude, json!({"targetId": "E1", "newAmplitude": 3}), 3, true),
            msg("u3", MessageType::UpdateDirection, json!({"targetId": "E1", "newDirection": 240}), 4, false),
            msg("u4", MessageType::UpdateEmitter, json!({"targetId": "E1", "name": "Decoy", "pri": 2}), 5, true),
        ];
        let v = view(records.clone(), "E1").unwrap();
        assert_eq!(v.direction, Some(120.0));
        assert_eq!(v.amplitude, Some(3.0));
        assert_eq!(v.pri, Some(2.0));
        assert_eq!(v.name, "Decoy");

        let log = MessageLog::new(records);
        let plain = project(&log, &ProjectorOptions { fold_updates: false });
        assert_eq!(plain[&EmitterId::from("E1")].direction, Some(90.0));
    }

    #[test]
    fn records_without_target_are_skipped() {
        let v = view(
            vec![
                add("a", "E1", 0, true),
                msg("s", MessageType::StartEmitter, json!({"targetId": ""}), 1, true),
                MessageRecord::new("broken", MessageType::StopEmitter, "not json")
                    .with_id("broken")
                    .with_sent(true),
                bare("s2", MessageType::StartEmitter, "E1", 2, true),
            ],
            "E1",
        )
        .unwrap();
        assert!(v.active);
    }

    #[test]
    fn name_falls_back_to_message_label() {
        let v = view(
            vec![msg("a", MessageType::AddEmitter, json!({"targetId": "E1"}), 0, true)],
            "E1",
        )
        .unwrap();
        assert_eq!(v.name, "a");
        assert_eq!(v.amplitude, None);
    }
}
