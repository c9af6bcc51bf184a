//! End-to-end protocol tests against a stub execution service.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use execflow_client::{
    ApiClient, ExecutionPhase, ExecutionTracker, MemorySink, Method, NotificationKind,
    ProcessType, RequestOptions, TrackerConfig, TriggerPayload,
};

/// Scriptable stand-in for the execution service.
#[derive(Default)]
struct Stub {
    /// Queued trigger responses; when empty, a 200 with a fresh id is served.
    trigger_responses: Mutex<VecDeque<(u16, Value)>>,
    trigger_count: Mutex<u32>,
    last_trigger_body: Mutex<Option<Value>>,

    /// Queued check responses; when empty, `{"status": "RUNNING"}` is served.
    check_plan: Mutex<VecDeque<Value>>,
    /// Check calls per execution id.
    check_counts: Mutex<HashMap<String, u32>>,

    unstable_hits: Mutex<u32>,
}

impl Stub {
    fn queue_trigger(&self, status: u16, body: Value) {
        self.trigger_responses.lock().unwrap().push_back((status, body));
    }

    fn queue_checks(&self, responses: Vec<Value>) {
        self.check_plan.lock().unwrap().extend(responses);
    }

    fn check_count(&self, execution_id: &str) -> u32 {
        self.check_counts
            .lock()
            .unwrap()
            .get(execution_id)
            .copied()
            .unwrap_or(0)
    }

    fn total_check_count(&self) -> u32 {
        self.check_counts.lock().unwrap().values().sum()
    }
}

async fn trigger_handler(
    State(stub): State<Arc<Stub>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let n = {
        let mut count = stub.trigger_count.lock().unwrap();
        *count += 1;
        *count
    };
    *stub.last_trigger_body.lock().unwrap() = Some(body);

    let (status, payload) = stub
        .trigger_responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| (200, json!({ "executionId": format!("exec-{}", n) })));

    (StatusCode::from_u16(status).unwrap(), Json(payload))
}

async fn check_handler(
    State(stub): State<Arc<Stub>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let execution_id = params.get("executionId").cloned().unwrap_or_default();
    *stub
        .check_counts
        .lock()
        .unwrap()
        .entry(execution_id)
        .or_insert(0) += 1;

    let response = stub
        .check_plan
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| json!({ "status": "RUNNING" }));

    Json(response)
}

async fn unstable_handler(State(stub): State<Arc<Stub>>) -> (StatusCode, Json<Value>) {
    *stub.unstable_hits.lock().unwrap() += 1;
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "nope" })),
    )
}

async fn spawn_stub() -> (String, Arc<Stub>) {
    let stub = Arc::new(Stub::default());

    let app = Router::new()
        .route("/trigger", post(trigger_handler))
        .route("/check", get(check_handler))
        .route("/unstable", get(unstable_handler))
        .route("/ok", get(|| async { Json(json!({ "hello": "world" })) }))
        .route(
            "/missing",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "message": "not here" })),
                )
            }),
        )
        .route("/pong", get(|| async { "pong" }))
        .route("/empty", get(|| async { StatusCode::OK }))
        .with_state(Arc::clone(&stub));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (base_url, stub)
}

fn fast_config() -> TrackerConfig {
    TrackerConfig::with_poll_interval(Duration::from_millis(25))
}

#[tokio::test]
async fn request_retries_with_fixed_delay_until_budget_exhausted() {
    let (base_url, stub) = spawn_stub().await;
    let client = ApiClient::new(&base_url);

    let started = Instant::now();
    let response = client
        .request(
            Method::GET,
            "unstable",
            RequestOptions {
                retries: 2,
                retry_delay: Duration::from_millis(20),
                ..Default::default()
            },
        )
        .await;

    assert_eq!(*stub.unstable_hits.lock().unwrap(), 3);
    assert!(started.elapsed() >= Duration::from_millis(40));
    assert!(!response.success);
    assert_eq!(response.status, 500);
    assert_eq!(response.error.as_deref(), Some("nope"));
    assert!(response.data.is_none());
}

#[tokio::test]
async fn success_is_classified_by_status_range() {
    let (base_url, _stub) = spawn_stub().await;
    let client = ApiClient::new(&base_url);

    let response = client.get("ok").await;
    assert!(response.success);
    assert_eq!(response.status, 200);
    assert_eq!(response.data, Some(json!({ "hello": "world" })));
    assert!(response.error.is_none());

    let response = client.get("missing").await;
    assert!(!response.success);
    assert_eq!(response.status, 404);
    assert!(response.data.is_none());
    assert_eq!(response.error.as_deref(), Some("not here"));
}

#[tokio::test]
async fn non_json_body_is_wrapped_and_empty_body_is_absent() {
    let (base_url, _stub) = spawn_stub().await;
    let client = ApiClient::new(&base_url);

    let response = client.get("pong").await;
    assert!(response.success);
    assert_eq!(response.data, Some(json!({ "text": "pong" })));

    let response = client.get("empty").await;
    assert!(response.success);
    assert!(response.data.is_none());
}

#[tokio::test]
async fn transport_failure_yields_status_zero() {
    // Nothing listens on this port; the connection is refused.
    let client = ApiClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(2));

    let response = client.get("trigger").await;
    assert!(!response.success);
    assert_eq!(response.status, 0);
    assert!(response.error.is_some());
}

#[tokio::test]
async fn tracker_polls_until_succeeded() {
    let (base_url, stub) = spawn_stub().await;
    stub.queue_trigger(200, json!({ "executionId": "exec-1" }));
    stub.queue_checks(vec![
        json!({ "status": "RUNNING" }),
        json!({ "status": "RUNNING" }),
        json!({ "status": "SUCCEEDED", "output": { "count": 3 } }),
    ]);

    let sink = MemorySink::new();
    let tracker = ExecutionTracker::new(ApiClient::new(&base_url), fast_config(), sink.clone());

    let payload = TriggerPayload::process(ProcessType::Parallel, "a, b, c", Some("4")).unwrap();
    tracker.submit(payload).await;
    let state = tracker.wait_until_terminal().await;

    assert_eq!(state.phase, ExecutionPhase::Succeeded);
    assert_eq!(state.execution_id.as_deref(), Some("exec-1"));
    assert_eq!(state.output, Some(json!({ "count": 3 })));
    assert_eq!(stub.check_count("exec-1"), 3);

    // The trigger body went out with the concurrency hint intact.
    let body = stub.last_trigger_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["maxConcurrency"], 4);
    assert_eq!(body["items"], json!(["a", "b", "c"]));

    // No further checks once the terminal response was observed.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(stub.check_count("exec-1"), 3);

    let notifications = sink.entries();
    assert!(notifications[0]
        .message
        .contains("Trigger initiated with ID: exec-1"));
    assert_eq!(
        notifications.last().unwrap().kind,
        NotificationKind::Success
    );
}

#[tokio::test]
async fn tracker_failure_stores_cause() {
    let (base_url, stub) = spawn_stub().await;
    stub.queue_checks(vec![json!({ "status": "FAILED", "cause": "boom" })]);

    let sink = MemorySink::new();
    let tracker = ExecutionTracker::new(ApiClient::new(&base_url), fast_config(), sink.clone());

    let state = tracker.submit(TriggerPayload::message(None)).await;

    // The first check runs immediately after the trigger, so the failure is
    // observed without a poll task ever being scheduled.
    assert_eq!(state.phase, ExecutionPhase::Failed);
    assert!(state.error.as_deref().unwrap().contains("boom"));
    assert_eq!(stub.total_check_count(), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(stub.total_check_count(), 1);

    let last = sink.entries().pop().unwrap();
    assert_eq!(last.kind, NotificationKind::Error);
    assert!(last.message.contains("boom"));
}

#[tokio::test]
async fn trigger_protocol_failure_skips_checks() {
    let (base_url, stub) = spawn_stub().await;
    stub.queue_trigger(500, json!({ "message": "denied" }));

    let tracker =
        ExecutionTracker::new(ApiClient::new(&base_url), fast_config(), MemorySink::new());
    let state = tracker.submit(TriggerPayload::message(None)).await;

    assert_eq!(state.phase, ExecutionPhase::Failed);
    assert_eq!(state.error.as_deref(), Some("denied"));
    assert_eq!(stub.total_check_count(), 0);
}

#[tokio::test]
async fn trigger_transport_failure_skips_checks() {
    let client = ApiClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(2));
    let sink = MemorySink::new();
    let tracker = ExecutionTracker::new(client, fast_config(), sink.clone());

    let state = tracker.submit(TriggerPayload::message(None)).await;

    assert_eq!(state.phase, ExecutionPhase::Failed);
    assert!(state.error.is_some());
    assert_eq!(sink.entries().len(), 1);
    assert_eq!(sink.entries()[0].kind, NotificationKind::Error);
}

#[tokio::test]
async fn missing_execution_id_fails_submission() {
    let (base_url, stub) = spawn_stub().await;
    stub.queue_trigger(200, json!({ "message": "accepted" }));

    let tracker =
        ExecutionTracker::new(ApiClient::new(&base_url), fast_config(), MemorySink::new());
    let state = tracker.submit(TriggerPayload::message(None)).await;

    assert_eq!(state.phase, ExecutionPhase::Failed);
    assert!(state.error.as_deref().unwrap().contains("executionId"));
    assert_eq!(stub.total_check_count(), 0);
}

#[tokio::test]
async fn resubmit_cancels_previous_poll_task() {
    let (base_url, stub) = spawn_stub().await;
    stub.queue_trigger(200, json!({ "executionId": "exec-1" }));
    stub.queue_trigger(200, json!({ "executionId": "exec-2" }));
    // Check plan stays empty: every check reports RUNNING.

    let tracker =
        ExecutionTracker::new(ApiClient::new(&base_url), fast_config(), MemorySink::new());

    let state = tracker.submit(TriggerPayload::message(None)).await;
    assert_eq!(state.phase, ExecutionPhase::Polling);

    let state = tracker.submit(TriggerPayload::message(None)).await;
    assert_eq!(state.execution_id.as_deref(), Some("exec-2"));

    // Give any already in-flight exec-1 check time to land, then verify the
    // first poll loop is gone while the second keeps going.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let stale = stub.check_count("exec-1");
    let active = stub.check_count("exec-2");

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(stub.check_count("exec-1"), stale);
    assert!(stub.check_count("exec-2") > active);

    tracker.cancel();
}

#[tokio::test]
async fn cancel_stops_polling() {
    let (base_url, stub) = spawn_stub().await;
    stub.queue_trigger(200, json!({ "executionId": "exec-1" }));

    let tracker =
        ExecutionTracker::new(ApiClient::new(&base_url), fast_config(), MemorySink::new());
    tracker.submit(TriggerPayload::message(None)).await;

    tokio::time::sleep(Duration::from_millis(60)).await;
    tracker.cancel();

    tokio::time::sleep(Duration::from_millis(30)).await;
    let after_cancel = stub.check_count("exec-1");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(stub.check_count("exec-1"), after_cancel);
}

#[tokio::test]
async fn tracker_records_call_history() {
    let (base_url, stub) = spawn_stub().await;
    stub.queue_trigger(200, json!({ "executionId": "exec-1" }));
    stub.queue_checks(vec![json!({ "status": "SUCCEEDED", "output": {} })]);

    let tracker =
        ExecutionTracker::new(ApiClient::new(&base_url), fast_config(), MemorySink::new());
    tracker
        .submit(TriggerPayload::message(Some("hi".to_string())))
        .await;

    let entries = tracker.history().entries();
    assert_eq!(entries.len(), 2);
    // Newest first: the check, then the trigger.
    assert_eq!(entries[0].method, "GET");
    assert!(entries[0].endpoint.contains("executionId=exec-1"));
    assert_eq!(entries[1].method, "POST");
    assert_eq!(entries[1].request, json!({ "message": "hi" }));
}
