//! ---
//! emc_section: "15-testing-qa-runbook"
//! emc_subsection: "integration-tests"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Integration and validation tests for the R-EMC stack."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
use r_emc_core::{Reconciler, WriteIntent};
use r_emc_msg::{keys, EmitterId, MessageType, ParamValue, ParameterMap, Parameters};
use r_emc_persistence::{MessageStore, StoreSettings, WriteOutcome, WriteRequest};
use tempfile::tempdir;

fn add_request(target: &str, amplitude: f64) -> WriteRequest {
    let mut map = ParameterMap::new();
    map.insert(keys::TARGET_ID.into(), ParamValue::from(target));
    map.insert(keys::NAME.into(), ParamValue::from("Kıyı radarı"));
    map.insert(keys::AMPLITUDE.into(), ParamValue::from(amplitude));
    map.insert(keys::DIRECTION.into(), ParamValue::from(45.0));
    let params = Parameters::from_map(&MessageType::AddEmitter, &map);
    WriteRequest::from_parameters(
        format!("add {target}"),
        MessageType::AddEmitter,
        &params,
        WriteIntent::SAVE_AND_SEND,
    )
    .unwrap()
}

fn simple(name: &str, ty: MessageType, params: &str, intent: WriteIntent) -> WriteRequest {
    WriteRequest::new(name, ty, params, intent)
}

#[test]
fn reopened_store_reconciles_to_the_same_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("messages.json");
    let reconciler = Reconciler::default();

    let before = {
        let mut store = MessageStore::open(&path, StoreSettings::default()).unwrap();
        assert!(store.submit(add_request("E1", 12.0), false).unwrap().is_accepted());
        assert!(store.submit(add_request("E2", 30.0), false).unwrap().is_accepted());
        for request in [
            simple("go", MessageType::StartEmitter, r#"{"targetId":"E1"}"#, WriteIntent::SEND),
            simple(
                "turn",
                MessageType::UpdateDirection,
                r#"{"targetId":"E1","newDirection":180}"#,
                WriteIntent::SAVE_AND_SEND,
            ),
            simple(
                "draft",
                MessageType::UpdateAmplitude,
                r#"{"targetId":"E1","newAmplitude":99}"#,
                WriteIntent::SAVE,
            ),
        ] {
            assert!(store.submit(request, false).unwrap().is_accepted());
        }
        reconciler.reconcile_log(&store.log())
    };

    let store = MessageStore::open(&path, StoreSettings::default()).unwrap();
    let after = reconciler.reconcile_log(&store.log());
    assert_eq!(before, after);

    let e1 = after.view(&EmitterId::from("E1")).unwrap();
    assert!(e1.active);
    assert_eq!(e1.name, "Kıyı radarı");
    assert_eq!(e1.direction, Some(180.0));
    assert_eq!(e1.amplitude, Some(12.0));
    assert!(!after.view(&EmitterId::from("E2")).unwrap().active);
}

#[test]
fn delete_reopens_the_lifecycle() {
    let dir = tempdir().unwrap();
    let mut store =
        MessageStore::open(dir.path().join("messages.json"), StoreSettings::default()).unwrap();
    let WriteOutcome::Accepted { record: add, .. } =
        store.submit(add_request("E3", 5.0), false).unwrap()
    else {
        panic!("add should be accepted");
    };

    // A second add for the same emitter alternates with nothing: refused.
    let again = store
        .submit(
            simple("again", MessageType::AddEmitter, r#"{"targetId":"E3"}"#, WriteIntent::SEND),
            false,
        )
        .unwrap();
    assert!(matches!(again, WriteOutcome::Refused { .. }));

    store.delete(add.id()).unwrap();
    let retry = store
        .submit(
            simple("again", MessageType::AddEmitter, r#"{"targetId":"E3"}"#, WriteIntent::SEND),
            false,
        )
        .unwrap();
    assert!(retry.is_accepted());
}
