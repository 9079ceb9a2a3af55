//! Tokio driver for the update client.
//!
//! One task owns the [`UpdateClient`]. Transport reports, timer firings and
//! API calls all arrive on a single channel, so the engine sees them one at a
//! time in arrival order.

use genwave_engine::{ClientOptions, ConnectionStatus, Handlers, Message, UpdateClient};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{ClientError, Result};
use crate::store::UpdateStore;
use crate::ws::{TokioTimer, WsTransport};

/// Everything the driver task reacts to.
#[derive(Debug)]
pub(crate) enum Event {
    Opened { epoch: u64 },
    Frame { epoch: u64, text: String },
    Closed { epoch: u64 },
    Failed { epoch: u64, reason: String },
    ReconnectDue,
    Send(Message),
    Close,
}

type Client = UpdateClient<WsTransport, TokioTimer>;

/// Owned handle to a running update client.
///
/// The connection lives exactly as long as the handle: dropping it closes the
/// client, and [`ClientHandle::close`] does so and waits for teardown.
#[derive(Debug)]
pub struct ClientHandle {
    events: mpsc::UnboundedSender<Event>,
    status: watch::Receiver<ConnectionStatus>,
    task: Option<JoinHandle<()>>,
}

impl ClientHandle {
    /// Start a client on the current Tokio runtime.
    ///
    /// `on_message` runs once per valid inbound message and `on_status_change`
    /// once per status transition, both on the driver task. They must not block.
    pub fn spawn<M, S>(options: ClientOptions, on_message: M, mut on_status_change: S) -> Result<Self>
    where
        M: FnMut(Message) + Send + 'static,
        S: FnMut(ConnectionStatus) + Send + 'static,
    {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ClientError::NoRuntime);
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Closed);

        let handlers = Handlers::new(on_message).on_status_change(move |status| {
            status_tx.send_replace(status);
            on_status_change(status);
        });

        let client = UpdateClient::connect(
            options,
            WsTransport::new(events_tx.clone()),
            TokioTimer::new(events_tx.clone()),
            handlers,
        )?;

        tracing::info!(url = %redact(client.url()), "Update client started");
        let task = tokio::spawn(drive(client, events_rx));

        Ok(Self {
            events: events_tx,
            status: status_rx,
            task: Some(task),
        })
    }

    /// Start a client that feeds `store`: every message is recorded and the
    /// store mirrors the connection status.
    pub fn spawn_with_store(options: ClientOptions, store: UpdateStore) -> Result<Self> {
        let recorder = store.clone();
        Self::spawn(
            options,
            move |message| recorder.record(message),
            move |status| store.set_status(status),
        )
    }

    /// Send now if open, otherwise buffer until the next open.
    pub fn send(&self, message: Message) {
        if self.events.send(Event::Send(message)).is_err() {
            tracing::trace!("Client already shut down, message dropped");
        }
    }

    /// Close the client and wait for the driver to stop. Idempotent.
    pub async fn close(&mut self) {
        let _ = self.events.send(Event::Close);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Update client task ended abnormally: {}", e);
            }
        }
    }

    /// The most recent status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// A receiver that observes status changes.
    ///
    /// Watch semantics: a slow observer sees the latest status, not every
    /// transition. Use the `on_status_change` callback for the full sequence.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Wait until the client reports `status`.
    pub async fn wait_for_status(&self, status: ConnectionStatus) -> ConnectionStatus {
        let mut rx = self.status.clone();
        let reached = match rx.wait_for(|current| *current == status).await {
            Ok(current) => Some(*current),
            Err(_) => None,
        };
        // Driver gone: report whatever it left behind
        reached.unwrap_or_else(|| *rx.borrow())
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.events.send(Event::Close);
        }
    }
}

async fn drive(mut client: Client, mut events: mpsc::UnboundedReceiver<Event>) {
    while let Some(event) = events.recv().await {
        match event {
            Event::Opened { epoch } if client.transport().is_current(epoch) => client.handle_open(),
            Event::Frame { epoch, text } if client.transport().is_current(epoch) => {
                client.handle_message(&text)
            }
            Event::Closed { epoch } if client.transport().is_current(epoch) => client.handle_close(),
            Event::Failed { epoch, reason } if client.transport().is_current(epoch) => {
                client.handle_error(&reason)
            }
            Event::ReconnectDue => client.handle_reconnect_timer(),
            Event::Send(message) => client.send(message),
            Event::Close => {
                client.close();
                break;
            }
            stale => tracing::trace!(?stale, "Dropping event from superseded connection"),
        }
    }

    tracing::debug!(status = %client.status(), "Update client driver stopped");
}

/// The URL with the identity value hidden, for logs.
fn redact(url: &genwave_engine::Url) -> String {
    let mut url = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if k == "user_id" {
                (k.to_string(), "REDACTED".to_string())
            } else {
                (k.to_string(), v.to_string())
            }
        })
        .collect();

    url.query_pairs_mut().clear().extend_pairs(pairs);
    url.to_string()
}
