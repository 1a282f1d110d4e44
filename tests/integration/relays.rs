//! Log and error relays fed through the in-process bus

use std::sync::Arc;

use cluster_telemetry::{
    ErrorRecord,
    query::ProcessView,
    store::ProcessKey,
    transport::LocalBus,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::helpers::*;

const LOG_TOPIC: &str = "RAY_LOG_CHANNEL";

#[tokio::test]
async fn test_log_batches_append_in_arrival_order() {
    let bus = Arc::new(LocalBus::default());
    let collector =
        spawn_collector(&manual_config(), &[], ScriptedDirectory::new(0, vec![]), bus.clone()).await;

    bus.publish(LOG_TOPIC, json!({"ip": "10.0.0.5", "pid": 42, "lines": ["a", "b"]}).to_string());
    bus.publish(LOG_TOPIC, "not json at all");
    bus.publish(LOG_TOPIC, json!({"ip": "10.0.0.5", "pid": "42", "lines": ["c"]}).to_string());
    bus.publish(LOG_TOPIC, json!({"ip": "10.0.0.5", "pid": 7, "lines": ["other"]}).to_string());

    let store = collector.store();
    wait_until(|| {
        let store = store.clone();
        async move { store.logs().total() == 4 }
    })
    .await;

    let query = collector.query();
    assert_eq!(
        query.get_logs("10.0.0.5", Some("42")),
        ProcessView::Process(vec!["a".to_string(), "b".to_string(), "c".to_string()])
    );
    let ProcessView::Host(by_pid) = query.get_logs("10.0.0.5", None) else {
        panic!("expected every process of the host");
    };
    assert_eq!(by_pid.keys().collect::<Vec<_>>(), vec!["42", "7"]);

    collector.shutdown().await;
}

#[tokio::test]
async fn test_errors_filed_under_extracted_process() {
    let bus = Arc::new(LocalBus::default());
    let collector =
        spawn_collector(&manual_config(), &[], ScriptedDirectory::new(0, vec![]), bus.clone()).await;

    bus.publish(
        "ERROR_INFO:job1",
        json!({"errorMessage": "no process tag here", "timestamp": 1.0, "type": "task"}).to_string(),
    );
    bus.publish("ERROR_INFO:job1", "{broken");
    bus.publish(
        "ERROR_INFO:job2",
        json!({
            "errorMessage": "\u{1b}[31mFailure (pid=123, ip=10.0.0.5) happened\u{1b}[0m",
            "timestamp": 1600000000.25,
            "type": "task_failed"
        })
        .to_string(),
    );
    bus.publish(
        "NOT_AN_ERROR:job1",
        json!({"errorMessage": "Failure (pid=1, ip=h)", "timestamp": 1.0, "type": "x"}).to_string(),
    );

    let store = collector.store();
    wait_until(|| {
        let store = store.clone();
        async move { store.errors().total() == 1 }
    })
    .await;

    assert_eq!(
        store.errors().get(&ProcessKey::new("10.0.0.5", "123")),
        vec![ErrorRecord {
            message: "Failure (pid=123, ip=10.0.0.5) happened".into(),
            timestamp: 1600000000.25,
            error_type: "task_failed".into(),
        }]
    );
    assert!(collector.query().get_errors("h", None).is_empty());

    collector.shutdown().await;
}

#[tokio::test]
async fn test_log_buffer_is_capped_per_process() {
    let bus = Arc::new(LocalBus::default());
    let config = cluster_telemetry::config::CollectorConfig {
        max_log_lines_per_process: 3,
        ..manual_config()
    };
    let collector = spawn_collector(&config, &[], ScriptedDirectory::new(0, vec![]), bus.clone()).await;

    bus.publish(LOG_TOPIC, json!({"ip": "h", "pid": 1, "lines": ["1", "2"]}).to_string());
    bus.publish(LOG_TOPIC, json!({"ip": "h", "pid": 1, "lines": ["3", "4", "5"]}).to_string());
    bus.publish(LOG_TOPIC, json!({"ip": "h", "pid": 2, "lines": ["done"]}).to_string());

    let store = collector.store();
    wait_until(|| {
        let store = store.clone();
        async move { !store.logs().get(&ProcessKey::new("h", "2")).is_empty() }
    })
    .await;

    assert_eq!(
        store.logs().get(&ProcessKey::new("h", "1")),
        vec!["3".to_string(), "4".to_string(), "5".to_string()]
    );

    collector.shutdown().await;
}
