//! ---
//! emc_section: "03-persistence-logging"
//! emc_subsection: "integration-tests"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Message store and storage bindings."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
use std::sync::{Arc, Mutex};

use prometheus::Registry;
use r_emc_core::WriteIntent;
use r_emc_msg::{MessageId, MessageRecord, MessageType, Parameters};
use r_emc_persistence::{
    replay_journal, verify_document, MessageStore, StoreError, StoreMetrics, StoreOperation,
    StoreSettings, Transmitter, WriteOutcome, WriteRequest,
};
use tempfile::tempdir;

#[derive(Default, Clone)]
struct Recorder {
    delivered: Arc<Mutex<Vec<MessageId>>>,
}

impl Transmitter for Recorder {
    fn transmit(&self, record: &MessageRecord) -> r_emc_persistence::Result<()> {
        self.delivered.lock().unwrap().push(record.id().clone());
        Ok(())
    }
}

struct Offline;

impl Transmitter for Offline {
    fn transmit(&self, record: &MessageRecord) -> r_emc_persistence::Result<()> {
        Err(StoreError::Transmit {
            id: record.id().clone(),
            reason: "receiver offline".into(),
        })
    }
}

fn request(name: &str, ty: MessageType, target: &str, intent: WriteIntent) -> WriteRequest {
    WriteRequest::from_parameters(name, ty.clone(), &Parameters::targeting(&ty, target), intent)
        .unwrap()
}

#[test]
fn lifecycle_is_journaled_and_transmitted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("messages.json");
    let journal = dir.path().join("journal.jsonl");
    let recorder = Recorder::default();
    let registry = Arc::new(Registry::new());

    let mut store = MessageStore::open(&path, StoreSettings::default())
        .unwrap()
        .with_transmitter(recorder.clone())
        .with_journal(&journal)
        .unwrap()
        .with_metrics(StoreMetrics::new(registry.clone()).unwrap());

    for (name, ty) in [
        ("add", MessageType::AddEmitter),
        ("start", MessageType::StartEmitter),
        ("stop", MessageType::StopEmitter),
    ] {
        let outcome = store
            .submit(request(name, ty, "E1", WriteIntent::SAVE_AND_SEND), false)
            .unwrap();
        assert!(outcome.is_accepted(), "{name} should be accepted");
    }
    assert!(verify_document(&path));
    assert_eq!(recorder.delivered.lock().unwrap().len(), 3);

    let view = store.log();
    let result = r_emc_core::Reconciler::default().reconcile_log(&view);
    let emitter = result.view(&"E1".into()).unwrap();
    assert!(emitter.transmitted);
    assert!(!emitter.active);

    let mut recorded = 0;
    replay_journal(&journal, |entry| {
        if matches!(entry.operation, StoreOperation::Recorded { sent: true, .. }) {
            recorded += 1;
        }
        Ok(())
    })
    .unwrap();
    assert_eq!(recorded, 3);

    let families = registry.gather();
    let written = families
        .iter()
        .find(|family| family.get_name() == "r_emc_records_written_total")
        .unwrap();
    assert_eq!(written.get_metric()[0].get_counter().get_value(), 3.0);
}

#[test]
fn failed_delivery_leaves_store_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("messages.json");
    let mut store = MessageStore::open(&path, StoreSettings::default())
        .unwrap()
        .with_transmitter(Offline);

    let err = store
        .submit(
            request("add", MessageType::AddEmitter, "E1", WriteIntent::SAVE_AND_SEND),
            false,
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Transmit { .. }));
    assert!(store.list().is_empty());
    assert!(!path.exists());
}

#[test]
fn overwrite_without_confirmation_when_disabled() {
    let dir = tempdir().unwrap();
    let settings = StoreSettings {
        require_confirmation: false,
        ..StoreSettings::default()
    };
    let mut store = MessageStore::open(dir.path().join("messages.json"), settings).unwrap();
    store
        .submit(request("first", MessageType::StartEmitter, "E1", WriteIntent::SAVE), false)
        .unwrap();
    let outcome = store
        .submit(request("second", MessageType::StartEmitter, "E1", WriteIntent::SAVE), false)
        .unwrap();
    match outcome {
        WriteOutcome::Accepted { record, replaced } => {
            assert_eq!(replaced.len(), 1);
            assert_eq!(store.list(), &[record]);
        }
        other => panic!("expected acceptance, got {other:?}"),
    }
}
