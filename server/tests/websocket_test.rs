//! End-to-end tests: a real relay, real update clients, HTTP publishers.

use std::net::SocketAddr;
use std::time::Duration;

use genwave_client::{ClientHandle, ClientOptions, ConnectionStatus, JobId, Message, UpdateStore};
use genwave_relay::{app, config::Config, websocket::PublishResponse, AppState};
use serde_json::json;

struct TestServer {
    addr: SocketAddr,
    http: reqwest::Client,
}

impl TestServer {
    async fn start(config: Config) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = app(AppState::new(config));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            addr,
            http: reqwest::Client::new(),
        }
    }

    fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn connections(&self) -> u64 {
        let health: serde_json::Value = self
            .http
            .get(self.http_url("/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        health["connections"]["connections"].as_u64().unwrap()
    }

    /// Wait until the relay has registered `count` sockets.
    async fn wait_for_connections(&self, count: u64) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.connections().await != count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "relay never reached {} connections",
                count
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn publish(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.http
            .post(self.http_url(path))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

async fn open_client(server: &TestServer, user_id: &str, store: &UpdateStore) -> ClientHandle {
    let client =
        ClientHandle::spawn_with_store(ClientOptions::new(server.ws_url(), user_id), store.clone())
            .unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        client.wait_for_status(ConnectionStatus::Open),
    )
    .await
    .expect("client never opened");
    client
}

async fn wait_for_messages(store: &UpdateStore, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.queue_len() < count {
        assert!(
            tokio::time::Instant::now() < deadline,
            "only {} of {} messages arrived",
            store.queue_len(),
            count
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn progress_event(id: i64, progress: u32) -> serde_json::Value {
    json!({
        "type": "generation_progress",
        "id": id,
        "progress": progress,
        "stage": "diffusion",
        "eta": 20
    })
}

#[tokio::test]
async fn published_events_reach_the_addressed_user_in_order() {
    let server = TestServer::start(Config::local()).await;
    let alice = UpdateStore::new();
    let bob = UpdateStore::new();
    let mut alice_client = open_client(&server, "alice", &alice).await;
    let mut bob_client = open_client(&server, "bob", &bob).await;
    server.wait_for_connections(2).await;

    for step in [10, 50, 90] {
        let response = server.publish("/events/alice", progress_event(1, step)).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: PublishResponse = response.json().await.unwrap();
        assert_eq!(body.delivered, 1);
    }

    wait_for_messages(&alice, 3).await;
    let received: Vec<f64> = alice
        .drain()
        .into_iter()
        .map(|message| match message {
            Message::GenerationProgress { progress, .. } => progress,
            other => panic!("unexpected message {:?}", other),
        })
        .collect();
    assert_eq!(received, vec![10.0, 50.0, 90.0]);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(bob.queue_len(), 0);

    alice_client.close().await;
    bob_client.close().await;
}

#[tokio::test]
async fn broadcast_reaches_every_connection() {
    let server = TestServer::start(Config::local()).await;
    let first = UpdateStore::new();
    let second = UpdateStore::new();
    let mut a = open_client(&server, "u1", &first).await;
    let mut b = open_client(&server, "u2", &second).await;
    server.wait_for_connections(2).await;

    let response = server
        .publish(
            "/events",
            json!({"type": "queue_updated", "position": 3, "total_queue_size": 7, "eta": 45}),
        )
        .await;
    let body: PublishResponse = response.json().await.unwrap();
    assert_eq!(body.delivered, 2);

    wait_for_messages(&first, 1).await;
    wait_for_messages(&second, 1).await;
    assert_eq!(first.last_message(), second.last_message());
    assert!(matches!(
        first.last_message(),
        Some(Message::QueueUpdated {
            position: 3,
            total_queue_size: 7,
            ..
        })
    ));

    a.close().await;
    b.close().await;
}

#[tokio::test]
async fn completed_event_keeps_metadata() {
    let server = TestServer::start(Config::local()).await;
    let store = UpdateStore::new();
    let mut client = open_client(&server, "carol", &store).await;
    server.wait_for_connections(1).await;

    server
        .publish(
            "/events/carol",
            json!({
                "type": "generation_completed",
                "id": "job-9",
                "audio_url": "/static/audio/job-9.wav",
                "metadata": {"duration": 30, "prompt": "lofi rain"}
            }),
        )
        .await;

    wait_for_messages(&store, 1).await;
    match store.dequeue() {
        Some(Message::GenerationCompleted { id, metadata, .. }) => {
            assert_eq!(id, Some(JobId::from("job-9")));
            assert_eq!(metadata["prompt"], "lofi rain");
        }
        other => panic!("unexpected message {:?}", other),
    }

    client.close().await;
}

#[tokio::test]
async fn closed_client_is_unregistered() {
    let server = TestServer::start(Config::local()).await;
    let store = UpdateStore::new();
    let mut client = open_client(&server, "dave", &store).await;
    server.wait_for_connections(1).await;

    client.close().await;
    server.wait_for_connections(0).await;

    let body: PublishResponse = server
        .publish("/events/dave", progress_event(2, 5))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body.delivered, 0);
}

#[tokio::test]
async fn invalid_events_are_rejected_before_delivery() {
    let server = TestServer::start(Config::local()).await;
    let store = UpdateStore::new();
    let mut client = open_client(&server, "erin", &store).await;
    server.wait_for_connections(1).await;

    let response = server
        .publish("/events/erin", progress_event(3, 140))
        .await;
    assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.queue_len(), 0);

    client.close().await;
}

#[tokio::test]
async fn publish_with_api_key() {
    let server = TestServer::start(Config {
        api_key: Some("relay-key".to_string()),
        ..Config::local()
    })
    .await;

    let denied = server.publish("/events/u1", progress_event(1, 1)).await;
    assert_eq!(denied.status(), reqwest::StatusCode::UNAUTHORIZED);

    let allowed = server
        .http
        .post(server.http_url("/events/u1"))
        .bearer_auth("relay-key")
        .json(&progress_event(1, 1))
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status(), reqwest::StatusCode::OK);
}
