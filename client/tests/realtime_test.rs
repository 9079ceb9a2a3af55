//! End-to-end tests of the update client against an in-process relay.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use genwave_client::{
    Backoff, ClientHandle, ClientOptions, ConnectionStatus, JobId, Message, UpdateStore,
};
use tokio::sync::{broadcast, mpsc};

#[derive(Debug, Clone)]
enum Control {
    Push(String),
    Drop,
}

#[derive(Clone)]
struct TestRelay {
    connections: Arc<AtomicUsize>,
    identities: Arc<Mutex<Vec<String>>>,
    inbound: mpsc::UnboundedSender<String>,
    control: broadcast::Sender<Control>,
}

struct RelayFixture {
    addr: SocketAddr,
    relay: TestRelay,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl RelayFixture {
    fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    fn push(&self, raw: &str) {
        let _ = self.relay.control.send(Control::Push(raw.to_string()));
    }

    /// Close every open socket with a close frame. No-op when none are open.
    fn drop_connections(&self) {
        let _ = self.relay.control.send(Control::Drop);
    }

    fn connections(&self) -> usize {
        self.relay.connections.load(Ordering::SeqCst)
    }

    async fn next_inbound(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(5), self.inbound.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("relay inbound channel closed")
    }
}

async fn spawn_relay() -> RelayFixture {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (control, _) = broadcast::channel(16);

    let relay = TestRelay {
        connections: Arc::new(AtomicUsize::new(0)),
        identities: Arc::new(Mutex::new(Vec::new())),
        inbound: inbound_tx,
        control,
    };

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(relay.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    RelayFixture {
        addr,
        relay,
        inbound: inbound_rx,
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(relay): State<TestRelay>,
) -> Response {
    // Subscribe before the handshake completes so no push is missed
    let control = relay.control.subscribe();
    relay.connections.fetch_add(1, Ordering::SeqCst);
    if let Some(user_id) = params.get("user_id") {
        relay.identities.lock().unwrap().push(user_id.clone());
    }

    ws.on_upgrade(move |socket| serve_socket(socket, relay, control))
}

async fn serve_socket(
    mut socket: WebSocket,
    relay: TestRelay,
    mut control: broadcast::Receiver<Control>,
) {
    loop {
        tokio::select! {
            frame = socket.recv() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let _ = relay.inbound.send(text.as_str().to_owned());
                }
                Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            command = control.recv() => match command {
                Ok(Control::Push(raw)) => {
                    if socket.send(WsMessage::Text(raw.into())).await.is_err() {
                        break;
                    }
                }
                Ok(Control::Drop) => {
                    let _ = socket.send(WsMessage::Close(None)).await;
                    break;
                }
                Err(_) => break,
            },
        }
    }
}

fn fast_options(url: &str, identity: &str) -> ClientOptions {
    ClientOptions::new(url, identity).with_backoff(Backoff::new(
        Duration::from_millis(20),
        Duration::from_millis(200),
    ))
}

/// Poll `check` until it holds or five seconds pass.
async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_open(client: &ClientHandle) {
    tokio::time::timeout(
        Duration::from_secs(5),
        client.wait_for_status(ConnectionStatus::Open),
    )
    .await
    .expect("client never opened");
}

#[tokio::test]
async fn receives_valid_events_and_drops_garbage() {
    let relay = spawn_relay().await;
    let store = UpdateStore::new();
    let mut client =
        ClientHandle::spawn_with_store(fast_options(&relay.url(), "user 1"), store.clone()).unwrap();

    wait_open(&client).await;
    assert_eq!(
        relay.relay.identities.lock().unwrap().clone(),
        vec!["user 1".to_string()]
    );

    relay.push("definitely not json");
    relay.push(r#"{"type":"heartbeat"}"#);
    relay.push(r#"{"type":"generation_progress","id":5,"progress":25,"stage":"render","eta":9}"#);
    relay.push(r#"{"type":"generation_completed","id":5,"audio_url":"/static/audio/5.wav","metadata":{"bpm":90}}"#);

    eventually(|| store.queue_len() == 2).await;
    let messages = store.drain();
    assert_eq!(messages[0].job_id(), Some(&JobId::Number(5)));
    assert!(matches!(messages[0], Message::GenerationProgress { .. }));
    assert!(messages[1].is_terminal());
    assert_eq!(store.last_message(), Some(messages[1].clone()));
    assert_eq!(store.status(), ConnectionStatus::Open);

    client.close().await;
    assert_eq!(store.status(), ConnectionStatus::Closed);
}

#[tokio::test]
async fn messages_sent_before_open_are_flushed_in_order() {
    let mut relay = spawn_relay().await;
    let mut client = ClientHandle::spawn(fast_options(&relay.url(), "u1"), |_| {}, |_| {}).unwrap();

    let first = Message::GenerationStarted {
        id: Some(JobId::Number(1)),
        position_in_queue: 1,
        eta: 60.0,
    };
    let second = Message::QueueUpdated {
        id: None,
        position: 2,
        total_queue_size: 5,
        eta: 30.0,
    };
    client.send(first.clone());
    client.send(second.clone());

    assert_eq!(Message::decode(&relay.next_inbound().await).unwrap(), first);
    assert_eq!(Message::decode(&relay.next_inbound().await).unwrap(), second);

    client.close().await;
}

#[tokio::test]
async fn reconnects_after_server_drops_connection() {
    let mut relay = spawn_relay().await;
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();

    let mut client = ClientHandle::spawn(
        fast_options(&relay.url(), "u1"),
        |_| {},
        move |status| sink.lock().unwrap().push(status),
    )
    .unwrap();

    wait_open(&client).await;
    relay.drop_connections();

    eventually(|| relay.connections() == 2).await;
    eventually(|| statuses.lock().unwrap().len() >= 5).await;
    assert_eq!(
        statuses.lock().unwrap()[..5],
        [
            ConnectionStatus::Connecting,
            ConnectionStatus::Open,
            ConnectionStatus::Reconnecting,
            ConnectionStatus::Connecting,
            ConnectionStatus::Open,
        ]
    );

    // The new connection carries traffic
    let message = Message::GenerationFailed {
        id: Some(JobId::from("job-x")),
        error: "cancelled".into(),
        retry_available: false,
    };
    client.send(message.clone());
    assert_eq!(Message::decode(&relay.next_inbound().await).unwrap(), message);

    client.close().await;
}

#[tokio::test]
async fn unreachable_endpoint_gives_up_after_max_attempts() {
    // Reserve a port, then free it so connections are refused
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();

    let options = fast_options(&format!("ws://{}/ws", addr), "u1").with_max_reconnect_attempts(Some(1));
    let mut client = ClientHandle::spawn(options, |_| {}, move |status| {
        sink.lock().unwrap().push(status)
    })
    .unwrap();

    eventually(|| statuses.lock().unwrap().last() == Some(&ConnectionStatus::Closed)).await;
    assert_eq!(
        statuses.lock().unwrap().clone(),
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Error,
            ConnectionStatus::Reconnecting,
            ConnectionStatus::Connecting,
            ConnectionStatus::Error,
            ConnectionStatus::Closed,
        ]
    );

    client.close().await;
    assert_eq!(statuses.lock().unwrap().len(), 6);
}

#[tokio::test]
async fn close_is_final_and_idempotent() {
    let relay = spawn_relay().await;
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();

    let mut client = ClientHandle::spawn(
        fast_options(&relay.url(), "u1"),
        |_| {},
        move |status| sink.lock().unwrap().push(status),
    )
    .unwrap();
    wait_open(&client).await;

    client.close().await;
    client.close().await;
    assert_eq!(client.status(), ConnectionStatus::Closed);

    // Server-side drop after close must not trigger a reconnect
    relay.drop_connections();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(relay.connections(), 1);
    assert_eq!(
        statuses.lock().unwrap().clone(),
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Open,
            ConnectionStatus::Closed,
        ]
    );
}

#[tokio::test]
async fn dropping_the_handle_closes_the_connection() {
    let relay = spawn_relay().await;
    let store = UpdateStore::new();

    {
        let client =
            ClientHandle::spawn_with_store(fast_options(&relay.url(), "u1"), store.clone()).unwrap();
        wait_open(&client).await;
    }

    eventually(|| store.status() == ConnectionStatus::Closed).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(relay.connections(), 1);
}

#[tokio::test]
async fn failed_tls_handshake_is_reported() {
    // Accept TCP and hang up immediately, so every TLS handshake fails
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();

    let options =
        fast_options(&format!("wss://{}/ws", addr), "u1").with_max_reconnect_attempts(Some(0));
    let mut client = ClientHandle::spawn(options, |_| {}, move |status| {
        sink.lock().unwrap().push(status)
    })
    .unwrap();

    eventually(|| statuses.lock().unwrap().last() == Some(&ConnectionStatus::Closed)).await;
    assert_eq!(
        statuses.lock().unwrap().clone(),
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Error,
            ConnectionStatus::Closed,
        ]
    );

    client.close().await;
}
