//! Integration tests for the event dispatcher against a real HTTP endpoint
//!
//! **Coverage:**
//! - Transient 503s are retried and the batch lands on the third attempt
//! - 401 pauses delivery and asks the auth collaborator to refresh
//! - 422 discards the batch without retrying
//! - Session boundaries survive queue overflow and are delivered in order
//!
//! **Infrastructure:**
//! - WireMock HTTP server standing in for the telemetry endpoint
//! - Real `TelemetryClient` and `EventDispatcher`

#[path = "support.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jiffy_core::EventSink;
use jiffy_domain::{ActivityEvent, EventType};
use jiffy_infra::sync::BackoffPolicy;
use jiffy_infra::{
    DispatcherConfig, DispatcherStats, EventDispatcher, TelemetryClient, TelemetryClientConfig,
};
use support::StaticAuth;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> Arc<TelemetryClient> {
    Arc::new(
        TelemetryClient::new(TelemetryClientConfig {
            events_url: format!("{}/events", server.uri()),
            timeout: Duration::from_secs(2),
            instance_id: Uuid::nil(),
        })
        .expect("client should build"),
    )
}

fn fast_config(queue_capacity: usize) -> DispatcherConfig {
    DispatcherConfig {
        queue_capacity,
        batch_size: 50,
        backoff: BackoffPolicy::new(3, Duration::from_millis(5), Duration::from_millis(20)),
        auth_pause: Duration::from_secs(60),
        join_timeout: Duration::from_secs(2),
    }
}

fn event(kind: EventType) -> ActivityEvent {
    ActivityEvent::new(kind, Utc::now())
}

async fn wait_for(dispatcher: &EventDispatcher, done: impl Fn(&DispatcherStats) -> bool) {
    for _ in 0..300 {
        if done(&dispatcher.stats()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached: {:?}", dispatcher.stats());
}

async fn received_sequence_ids(server: &MockServer) -> Vec<Vec<u64>> {
    let requests = server.received_requests().await.unwrap_or_default();
    requests
        .iter()
        .map(|request| {
            let body: serde_json::Value = request.body_json().expect("json body");
            body["events"]
                .as_array()
                .expect("events array")
                .iter()
                .map(|e| e["sequence_id"].as_u64().expect("sequence id"))
                .collect()
        })
        .collect()
}

#[tokio::test]
async fn retries_server_errors_until_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let auth = Arc::new(StaticAuth::default());
    let dispatcher = EventDispatcher::new(client_for(&server), auth.clone(), fast_config(16));
    for kind in [EventType::Visit, EventType::PromptSubmitted, EventType::ResponseReceived] {
        dispatcher.enqueue(event(kind));
    }

    dispatcher.start().await.unwrap();
    wait_for(&dispatcher, |s| s.delivered == 3).await;
    dispatcher.stop().await.unwrap();

    let stats = dispatcher.stats();
    assert_eq!(stats.attempts, 3);
    assert_eq!(stats.failed, 0);
    assert_eq!(auth.failures(), 0);

    // Every attempt carried the same batch so the endpoint can deduplicate.
    let batches = received_sequence_ids(&server).await;
    assert_eq!(batches.len(), 3);
    assert!(batches.iter().all(|ids| ids == &vec![1, 2, 3]));
}

#[tokio::test]
async fn unauthorized_pauses_and_requests_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let auth = Arc::new(StaticAuth::default());
    let dispatcher = EventDispatcher::new(client_for(&server), auth.clone(), fast_config(16));
    dispatcher.enqueue(event(EventType::SessionStarted));
    dispatcher.enqueue(event(EventType::Visit));

    dispatcher.start().await.unwrap();
    assert!(support::eventually(|| auth.failures() == 1).await);

    // Paused: nothing is discarded or retried while waiting for credentials.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let stats = dispatcher.stats();
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.delivered, 0);

    dispatcher.stop().await.unwrap();
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad event"))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = EventDispatcher::new(
        client_for(&server),
        Arc::new(StaticAuth::default()),
        fast_config(16),
    );
    dispatcher.enqueue(event(EventType::UserActivity));

    dispatcher.start().await.unwrap();
    wait_for(&dispatcher, |s| s.failed == 1).await;
    dispatcher.stop().await.unwrap();

    assert_eq!(dispatcher.stats().attempts, 1);
}

#[tokio::test]
async fn session_boundaries_survive_overflow() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let dispatcher = EventDispatcher::new(
        client_for(&server),
        Arc::new(StaticAuth::default()),
        fast_config(3),
    );
    dispatcher.enqueue(event(EventType::SessionStarted));
    for _ in 0..5 {
        dispatcher.enqueue(event(EventType::UserActivity));
    }
    dispatcher.enqueue(event(EventType::SessionEnded));

    let before = dispatcher.stats();
    assert!(before.dropped_overflow > 0);

    dispatcher.start().await.unwrap();
    wait_for(&dispatcher, |s| s.pending == 0 && s.delivered > 0).await;
    dispatcher.stop().await.unwrap();

    let requests = server.received_requests().await.unwrap_or_default();
    let types: Vec<String> = requests
        .iter()
        .flat_map(|request| {
            let body: serde_json::Value = request.body_json().expect("json body");
            body["events"]
                .as_array()
                .expect("events array")
                .iter()
                .map(|e| e["event_type"].as_str().unwrap_or_default().to_string())
                .collect::<Vec<_>>()
        })
        .collect();

    assert_eq!(types.first().map(String::as_str), Some("session_started"));
    assert_eq!(types.last().map(String::as_str), Some("session_ended"));

    let ids: Vec<u64> = received_sequence_ids(&server).await.into_iter().flatten().collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]), "ids out of order: {ids:?}");
}
