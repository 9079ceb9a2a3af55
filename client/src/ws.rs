//! tokio-tungstenite transport and tokio timer for the engine.
//!
//! Each connection runs in its own task and reports back to the driver
//! through the shared event channel. Events carry the epoch of the
//! connection that produced them so the driver can drop reports from a
//! connection that has since been replaced.

use std::future::Future;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use genwave_engine::{Timer, Transport, TransportError, Url};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::runtime::Event;

/// Frames queued for the connection task.
#[derive(Debug)]
enum Outgoing {
    Text(String),
    Close,
}

/// WebSocket transport driven by the engine.
#[derive(Debug)]
pub struct WsTransport {
    events: mpsc::UnboundedSender<Event>,
    epoch: u64,
    outgoing: Option<mpsc::UnboundedSender<Outgoing>>,
}

impl WsTransport {
    pub(crate) fn new(events: mpsc::UnboundedSender<Event>) -> Self {
        install_crypto_provider();
        Self {
            events,
            epoch: 0,
            outgoing: None,
        }
    }

    /// Whether an event tagged with `epoch` belongs to the current connection.
    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        self.outgoing.is_some() && self.epoch == epoch
    }
}

impl Transport for WsTransport {
    fn connect(&mut self, url: &Url) {
        self.close();
        self.epoch += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        self.outgoing = Some(tx);
        tokio::spawn(supervise(
            run_connection(url.clone(), self.epoch, self.events.clone(), rx),
            self.epoch,
            self.events.clone(),
        ));
    }

    fn send(&mut self, text: String) -> Result<(), TransportError> {
        match &self.outgoing {
            Some(tx) => tx
                .send(Outgoing::Text(text))
                .map_err(|_| TransportError::Closed),
            None => Err(TransportError::NotConnected),
        }
    }

    fn close(&mut self) {
        if let Some(tx) = self.outgoing.take() {
            let _ = tx.send(Outgoing::Close);
        }
    }
}

/// Select the process-wide rustls provider used for `wss://` handshakes.
///
/// A provider installed earlier by the host application is kept.
fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Run a connection task and turn a panic into a failure report, so the
/// driver never waits on a connection that no longer exists.
async fn supervise<F>(connection: F, epoch: u64, events: mpsc::UnboundedSender<Event>)
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Err(e) = tokio::spawn(connection).await {
        if e.is_panic() {
            tracing::error!(epoch, "Connection task panicked");
            let _ = events.send(Event::Failed {
                epoch,
                reason: "connection task panicked".to_string(),
            });
        }
    }
}

/// Drive one WebSocket connection until it ends or is told to close.
async fn run_connection(
    url: Url,
    epoch: u64,
    events: mpsc::UnboundedSender<Event>,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
) {
    let stream = tokio::select! {
        result = connect_async(url.as_str()) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                let _ = events.send(Event::Failed { epoch, reason: e.to_string() });
                return;
            }
        },
        // Nothing is sent before open, so anything here is a close request
        _ = outgoing.recv() => {
            tracing::debug!(epoch, "Connection abandoned before open");
            return;
        }
    };

    let _ = events.send(Event::Opened { epoch });
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            frame = source.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let _ = events.send(Event::Frame { epoch, text: text.as_str().to_owned() });
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    tracing::trace!("Ignoring binary frame: {} bytes", data.len());
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    tracing::debug!(epoch, ?frame, "Close frame received");
                    let _ = events.send(Event::Closed { epoch });
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(Event::Failed { epoch, reason: e.to_string() });
                    break;
                }
                None => {
                    let _ = events.send(Event::Closed { epoch });
                    break;
                }
            },
            command = outgoing.recv() => match command {
                Some(Outgoing::Text(text)) => {
                    if let Err(e) = sink.send(WsMessage::Text(text.into())).await {
                        let _ = events.send(Event::Failed { epoch, reason: e.to_string() });
                        break;
                    }
                }
                Some(Outgoing::Close) | None => {
                    if let Err(e) = sink.close().await {
                        tracing::trace!(epoch, "Close handshake failed: {}", e);
                    }
                    break;
                }
            },
        }
    }

    tracing::debug!(epoch, "Connection task finished");
}

/// Reconnect timer backed by `tokio::time::sleep`.
#[derive(Debug)]
pub struct TokioTimer {
    events: mpsc::UnboundedSender<Event>,
    pending: Option<JoinHandle<()>>,
}

impl TokioTimer {
    pub(crate) fn new(events: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            events,
            pending: None,
        }
    }
}

impl Timer for TokioTimer {
    fn schedule(&mut self, delay: Duration) {
        self.cancel();
        let events = self.events.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::ReconnectDue);
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
