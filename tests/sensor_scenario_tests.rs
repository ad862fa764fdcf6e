/// End-to-end scenarios through the full runtime: intake queue, round
/// engine, trigger dispatch, and persisted status.
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use sensor_runtime::prelude::*;
use sensor_runtime::{
    Comparator, DataFilter, DefaultArtifactReader, EventDependencyFilter, HttpTrigger, JsonType,
    RuntimeConfig, StatusPolicy, TriggerError, TriggerParameter, TriggerParameterOperation,
    TriggerParameterSource, TriggerPolicy,
};
use serde_json::json;
use std::sync::Arc;

/// Test backend: records payloads, answers with a fixed status
struct RecordingBackend {
    status: u16,
    payloads: Mutex<Vec<Option<serde_json::Value>>>,
}

impl RecordingBackend {
    fn new(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status,
            payloads: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TriggerBackend for RecordingBackend {
    fn kind(&self) -> &'static str {
        "http"
    }

    async fn execute(
        &self,
        _template: &sensor_runtime::TriggerTemplate,
        _resource: &serde_json::Value,
        payload: Option<&serde_json::Value>,
    ) -> Result<TriggerResult, TriggerError> {
        self.payloads.lock().push(payload.cloned());
        Ok(TriggerResult {
            status_code: self.status,
            message: None,
            resource: None,
        })
    }
}

fn event(source: &str, name: &str, data: serde_json::Value) -> Event {
    Event::new(
        EventContext {
            id: format!("evt_{}", uuid::Uuid::new_v4()),
            source: source.to_string(),
            specversion: "0.3".to_string(),
            event_type: "webhook".to_string(),
            datacontenttype: "application/json".to_string(),
            subject: name.to_string(),
            time: Utc::now(),
        },
        serde_json::to_vec(&data).unwrap(),
    )
}

fn dependency(name: &str, source: &str, event_name: &str) -> EventDependency {
    EventDependency {
        name: name.to_string(),
        gateway_name: String::new(),
        event_source_name: source.to_string(),
        event_name: event_name.to_string(),
        filters: None,
    }
}

fn http_trigger(name: &str, payload: Vec<TriggerParameter>) -> Trigger {
    Trigger {
        template: TriggerTemplate {
            name: name.to_string(),
            switch: None,
            body: TriggerBody::Http(HttpTrigger {
                url: "http://example.com/hook".to_string(),
                payload,
                tls: None,
                method: String::new(),
                parameters: Vec::new(),
                timeout: 0,
                basic_auth: None,
                headers: Default::default(),
            }),
        },
        parameters: Vec::new(),
        policy: None,
    }
}

fn dispatcher(backend: Arc<RecordingBackend>) -> Arc<TriggerDispatcher> {
    let artifacts = Arc::new(DefaultArtifactReader::new().unwrap());
    Arc::new(TriggerDispatcher::new(artifacts).with_backend(backend))
}

async fn run_events(sensor: Sensor, backend: Arc<RecordingBackend>, events: Vec<Event>) -> (Sensor, Arc<InMemoryStateStore>) {
    let store = Arc::new(InMemoryStateStore::new());
    let runtime = SensorRuntime::new(
        sensor,
        dispatcher(backend),
        store.clone(),
        &RuntimeConfig::default(),
    )
    .unwrap();
    let handle = runtime.start().await.unwrap();

    let queue = handle.queue();
    for e in events {
        queue.send(e).await.unwrap();
    }
    drop(queue);

    (handle.join().await, store)
}

#[tokio::test]
async fn test_happy_path_fires_one_cycle() {
    let backend = RecordingBackend::new(200);
    let payload_param = TriggerParameter {
        src: TriggerParameterSource {
            dependency_name: "dep-a".to_string(),
            data_key: "id".to_string(),
            ..Default::default()
        },
        dest: "id".to_string(),
        operation: TriggerParameterOperation::None,
    };
    let sensor = Sensor::new(
        "s1",
        SensorSpec {
            dependencies: vec![dependency("dep-a", "webhook", "push")],
            triggers: vec![http_trigger("notify", vec![payload_param])],
            ..Default::default()
        },
    );

    let (finished, store) = run_events(
        sensor,
        backend.clone(),
        vec![event("webhook", "push", json!({"id": "42"}))],
    )
    .await;

    assert_eq!(finished.status.trigger_cycle_count, 1);
    assert_eq!(
        finished.status.trigger_cycle_status,
        Some(TriggerCycleState::Success)
    );
    assert_eq!(finished.node("notify").unwrap().phase, NodePhase::Complete);

    let payloads = backend.payloads.lock();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0], Some(json!({"id": "42"})));

    // the final status made it to the store
    let persisted = store.get("s1").await.unwrap().unwrap();
    assert_eq!(persisted.status.trigger_cycle_count, 1);
    assert!(persisted.status.last_cycle_time.is_some());
}

#[tokio::test]
async fn test_filtered_event_fires_nothing() {
    let backend = RecordingBackend::new(200);
    let mut dep = dependency("dep-a", "webhook", "push");
    dep.filters = Some(EventDependencyFilter {
        data: vec![DataFilter {
            path: "id".to_string(),
            json_type: JsonType::Number,
            value: vec!["100".to_string()],
            comparator: Comparator::GreaterThan,
        }],
        ..Default::default()
    });
    let sensor = Sensor::new(
        "s1",
        SensorSpec {
            dependencies: vec![dep],
            triggers: vec![http_trigger("notify", Vec::new())],
            ..Default::default()
        },
    );

    let (finished, _) = run_events(
        sensor,
        backend.clone(),
        vec![event("webhook", "push", json!({"id": "42"}))],
    )
    .await;

    assert_eq!(finished.status.trigger_cycle_count, 0);
    assert!(backend.payloads.lock().is_empty());
    // the rejected event leaves the dependency node untouched
    assert_eq!(finished.node("dep-a").unwrap().phase, NodePhase::New);
}

#[tokio::test]
async fn test_circuit_round_reset() {
    let backend = RecordingBackend::new(200);
    let sensor = Sensor::new(
        "s1",
        SensorSpec {
            dependencies: vec![
                dependency("a", "src", "a"),
                dependency("b", "src", "b"),
                dependency("c", "src", "c"),
            ],
            dependency_groups: vec![
                DependencyGroup {
                    name: "G1".to_string(),
                    dependencies: vec!["a".to_string(), "b".to_string()],
                },
                DependencyGroup {
                    name: "G2".to_string(),
                    dependencies: vec!["c".to_string()],
                },
            ],
            circuit: "G1 && !G2".to_string(),
            triggers: vec![http_trigger("notify", Vec::new())],
            ..Default::default()
        },
    );

    let (finished, _) = run_events(
        sensor,
        backend.clone(),
        vec![
            event("src", "a", json!({})),
            event("src", "b", json!({})),
            // after the round reset, c alone satisfies nothing
            event("src", "c", json!({})),
        ],
    )
    .await;

    assert_eq!(finished.status.trigger_cycle_count, 1);
    assert_eq!(backend.payloads.lock().len(), 1);
}

#[tokio::test]
async fn test_error_on_failed_round_halts_sensor() {
    let backend = RecordingBackend::new(500);
    let mut trigger = http_trigger("notify", Vec::new());
    trigger.policy = Some(TriggerPolicy {
        status: Some(StatusPolicy { allow: vec![200, 201] }),
        k8s: None,
    });
    let mut sensor = Sensor::new(
        "s1",
        SensorSpec {
            dependencies: vec![dependency("dep-a", "webhook", "push")],
            triggers: vec![trigger],
            ..Default::default()
        },
    );
    sensor.spec.error_on_failed_round = true;

    let (finished, store) = run_events(
        sensor,
        backend.clone(),
        vec![
            event("webhook", "push", json!({})),
            // arrives after the sensor errored; must not fire
            event("webhook", "push", json!({})),
        ],
    )
    .await;

    assert_eq!(finished.status.phase, NodePhase::Error);
    assert_eq!(
        finished.status.trigger_cycle_status,
        Some(TriggerCycleState::Failure)
    );
    assert_eq!(finished.status.trigger_cycle_count, 1);
    assert_eq!(backend.payloads.lock().len(), 1);

    let persisted = store.get("s1").await.unwrap().unwrap();
    assert_eq!(persisted.status.phase, NodePhase::Error);
}

#[tokio::test]
async fn test_two_dependencies_pair_into_rounds() {
    let backend = RecordingBackend::new(200);
    let sensor = Sensor::new(
        "s1",
        SensorSpec {
            dependencies: vec![dependency("a", "src", "a"), dependency("b", "src", "b")],
            triggers: vec![http_trigger("notify", Vec::new())],
            ..Default::default()
        },
    );

    let (finished, _) = run_events(
        sensor,
        backend.clone(),
        vec![
            event("src", "a", json!({"n": 1})),
            event("src", "b", json!({"n": 2})),
            event("src", "a", json!({"n": 3})),
            event("src", "b", json!({"n": 4})),
        ],
    )
    .await;

    // each (a, b) pair forms exactly one round; snapshots never share
    // an event across rounds
    assert_eq!(finished.status.trigger_cycle_count, 2);
    assert_eq!(backend.payloads.lock().len(), 2);
}

#[tokio::test]
async fn test_switch_skips_trigger() {
    let backend = RecordingBackend::new(200);
    let mut skipped = http_trigger("skipped", Vec::new());
    skipped.template.switch = Some(sensor_runtime::TriggerSwitch {
        any: vec!["G2".to_string()],
        all: Vec::new(),
    });
    let sensor = Sensor::new(
        "s1",
        SensorSpec {
            dependencies: vec![dependency("a", "src", "a"), dependency("c", "src", "c")],
            dependency_groups: vec![
                DependencyGroup {
                    name: "G1".to_string(),
                    dependencies: vec!["a".to_string()],
                },
                DependencyGroup {
                    name: "G2".to_string(),
                    dependencies: vec!["c".to_string()],
                },
            ],
            circuit: "G1 || G2".to_string(),
            triggers: vec![http_trigger("always", Vec::new()), skipped],
            ..Default::default()
        },
    );

    let (finished, _) = run_events(sensor, backend.clone(), vec![event("src", "a", json!({}))]).await;

    // the round fired, but only the unconditional trigger ran
    assert_eq!(finished.status.trigger_cycle_count, 1);
    assert_eq!(backend.payloads.lock().len(), 1);
    assert_eq!(finished.node("always").unwrap().phase, NodePhase::Complete);
    assert_eq!(finished.node("skipped").unwrap().phase, NodePhase::New);
    assert_eq!(
        finished.status.trigger_cycle_status,
        Some(TriggerCycleState::Success)
    );
}

#[tokio::test]
async fn test_failing_trigger_does_not_cancel_subsequent_ones() {
    let backend = RecordingBackend::new(500);
    let mut failing = http_trigger("failing", Vec::new());
    failing.policy = Some(TriggerPolicy {
        status: Some(StatusPolicy { allow: vec![200] }),
        k8s: None,
    });
    // second trigger has no policy, so the 500 is not an error for it
    let sensor = Sensor::new(
        "s1",
        SensorSpec {
            dependencies: vec![dependency("dep-a", "webhook", "push")],
            triggers: vec![failing, http_trigger("second", Vec::new())],
            ..Default::default()
        },
    );

    let (finished, _) = run_events(
        sensor,
        backend.clone(),
        vec![event("webhook", "push", json!({}))],
    )
    .await;

    assert_eq!(finished.node("failing").unwrap().phase, NodePhase::Error);
    assert_eq!(finished.node("second").unwrap().phase, NodePhase::Complete);
    assert_eq!(
        finished.status.trigger_cycle_status,
        Some(TriggerCycleState::Failure)
    );
    // both triggers dispatched
    assert_eq!(backend.payloads.lock().len(), 2);
}

#[tokio::test]
async fn test_node_ids_are_stable_across_runs() {
    let sensor = |name: &str| {
        Sensor::new(
            name,
            SensorSpec {
                dependencies: vec![dependency("dep-a", "webhook", "push")],
                triggers: vec![http_trigger("notify", Vec::new())],
                ..Default::default()
            },
        )
    };

    let backend = RecordingBackend::new(200);
    let (first, _) = run_events(
        sensor("s1"),
        backend.clone(),
        vec![event("webhook", "push", json!({}))],
    )
    .await;
    let (second, _) = run_events(
        sensor("s1"),
        backend,
        vec![event("webhook", "push", json!({}))],
    )
    .await;

    let mut first_ids: Vec<&String> = first.status.nodes.keys().collect();
    let mut second_ids: Vec<&String> = second.status.nodes.keys().collect();
    first_ids.sort();
    second_ids.sort();
    assert_eq!(first_ids, second_ids);
}
