//! The real-time update client state machine.
//!
//! `UpdateClient` owns one logical connection: it connects on construction,
//! surfaces inbound frames as typed [`Message`]s, buffers outbound messages
//! while disconnected, and reconnects with capped exponential backoff until
//! [`UpdateClient::close`] is called.
//!
//! Transitions:
//!
//! ```text
//! connecting --open--> open
//! connecting|open --close/error--> reconnecting   (auto-reconnect on)
//! connecting|open --close/error--> closed         (auto-reconnect off or attempts exhausted)
//! reconnecting --timer--> connecting
//! any --close()--> closed                         (terminal)
//! ```

use std::fmt;

use url::Url;

use crate::backoff::Backoff;
use crate::error::{Error, Result};
use crate::outbox::{Outbox, OverflowPolicy, PushOutcome, DEFAULT_OUTBOX_CAPACITY};
use crate::transport::{Timer, Transport};
use crate::{ConnectionStatus, Message};

/// Query parameter carrying the caller identity.
pub const IDENTITY_PARAM: &str = "user_id";

/// Callback invoked once per valid inbound message.
pub type MessageHandler = Box<dyn FnMut(Message) + Send>;

/// Callback invoked once per status transition.
pub type StatusHandler = Box<dyn FnMut(ConnectionStatus) + Send>;

/// Observer callbacks supplied at construction.
pub struct Handlers {
    on_message: MessageHandler,
    on_status_change: Option<StatusHandler>,
}

impl Handlers {
    pub fn new(on_message: impl FnMut(Message) + Send + 'static) -> Self {
        Self {
            on_message: Box::new(on_message),
            on_status_change: None,
        }
    }

    pub fn on_status_change(
        mut self,
        on_status_change: impl FnMut(ConnectionStatus) + Send + 'static,
    ) -> Self {
        self.on_status_change = Some(Box::new(on_status_change));
        self
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("on_status_change", &self.on_status_change.is_some())
            .finish_non_exhaustive()
    }
}

/// Construction parameters for an [`UpdateClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Base WebSocket endpoint, e.g. `wss://api.example.com/ws`
    pub endpoint: String,
    /// Opaque caller identity scoping the server-side routing of events
    pub identity: String,
    pub auto_reconnect: bool,
    pub backoff: Backoff,
    pub outbox_capacity: usize,
    pub overflow: OverflowPolicy,
    /// Stop reconnecting after this many consecutive retries. `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
}

impl ClientOptions {
    pub fn new(endpoint: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            identity: identity.into(),
            auto_reconnect: true,
            backoff: Backoff::default(),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            overflow: OverflowPolicy::default(),
            max_reconnect_attempts: None,
        }
    }

    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_outbox(mut self, capacity: usize, overflow: OverflowPolicy) -> Self {
        self.outbox_capacity = capacity;
        self.overflow = overflow;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, max: Option<u32>) -> Self {
        self.max_reconnect_attempts = max;
        self
    }

    /// The connection URL: `{endpoint}?user_id={identity}`, identity escaped.
    pub fn connection_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| Error::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::InvalidEndpoint {
                endpoint: self.endpoint.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        url.query_pairs_mut()
            .append_pair(IDENTITY_PARAM, &self.identity);
        Ok(url)
    }
}

/// Reconnecting client for the generation event stream.
///
/// Single-threaded and event-driven: the runtime calls the `handle_*`
/// methods serially, and callbacks run synchronously inside them.
pub struct UpdateClient<T: Transport, S: Timer> {
    url: Url,
    transport: T,
    timer: S,
    handlers: Handlers,
    status: ConnectionStatus,
    auto_reconnect: bool,
    backoff: Backoff,
    max_reconnect_attempts: Option<u32>,
    /// Retries started since the last successful open
    attempts: u32,
    reconnect_pending: bool,
    outbox: Outbox,
    shut_down: bool,
}

impl<T: Transport, S: Timer> UpdateClient<T, S> {
    /// Create the client and immediately start connecting.
    pub fn connect(options: ClientOptions, transport: T, timer: S, handlers: Handlers) -> Result<Self> {
        let url = options.connection_url()?;
        let outbox = Outbox::new(options.outbox_capacity, options.overflow)?;

        let mut client = Self {
            url,
            transport,
            timer,
            handlers,
            status: ConnectionStatus::Closed,
            auto_reconnect: options.auto_reconnect,
            backoff: options.backoff,
            max_reconnect_attempts: options.max_reconnect_attempts,
            attempts: 0,
            reconnect_pending: false,
            outbox,
            shut_down: false,
        };

        client.start_connection();
        Ok(client)
    }

    /// Transmit now if open, otherwise queue for the next open.
    ///
    /// While older messages are still queued, the new one waits behind them.
    pub fn send(&mut self, message: Message) {
        if !self.status.is_open() {
            self.enqueue(message);
            return;
        }

        if !self.outbox.is_empty() {
            self.enqueue(message);
            self.flush_outbox();
            return;
        }

        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(kind = %message.kind(), "Dropping unencodable message: {}", e);
                return;
            }
        };

        if let Err(e) = self.transport.send(text) {
            tracing::warn!(kind = %message.kind(), "Send failed, queueing message: {}", e);
            self.enqueue(message);
        }
    }

    /// Shut the client down. Idempotent.
    pub fn close(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.auto_reconnect = false;

        if self.reconnect_pending {
            self.timer.cancel();
            self.reconnect_pending = false;
        }
        self.transport.close();
        self.set_status(ConnectionStatus::Closed);

        tracing::info!(
            endpoint = %self.endpoint(),
            discarded = self.outbox.len(),
            "Update client closed"
        );
    }

    /// The transport finished establishing the connection.
    pub fn handle_open(&mut self) {
        if self.status != ConnectionStatus::Connecting {
            tracing::trace!(status = %self.status, "Ignoring open notification");
            return;
        }

        self.attempts = 0;
        self.set_status(ConnectionStatus::Open);
        tracing::info!(endpoint = %self.endpoint(), "Connection open");
        self.flush_outbox();
    }

    /// A raw frame arrived. Invalid payloads are dropped without side effects.
    pub fn handle_message(&mut self, raw: &str) {
        if !self.status.is_open() {
            tracing::trace!(status = %self.status, "Ignoring frame while not open");
            return;
        }

        match Message::decode(raw) {
            Ok(message) => (self.handlers.on_message)(message),
            Err(e) => tracing::debug!("Discarding inbound payload: {}", e),
        }
    }

    /// The transport reported that the connection closed.
    pub fn handle_close(&mut self) {
        if !self.status.is_live() {
            tracing::trace!(status = %self.status, "Ignoring close notification");
            return;
        }

        tracing::info!(endpoint = %self.endpoint(), "Connection closed by transport");
        self.connection_lost();
    }

    /// The transport reported a connection-level error.
    pub fn handle_error(&mut self, reason: &str) {
        if !self.status.is_live() {
            tracing::trace!(status = %self.status, "Ignoring error notification");
            return;
        }

        tracing::warn!(endpoint = %self.endpoint(), reason, "Transport error");
        self.set_status(ConnectionStatus::Error);
        self.connection_lost();
    }

    /// The reconnect delay elapsed.
    pub fn handle_reconnect_timer(&mut self) {
        if !self.reconnect_pending {
            return;
        }
        self.reconnect_pending = false;

        if self.status != ConnectionStatus::Reconnecting {
            return;
        }

        self.attempts = self.attempts.saturating_add(1);
        self.start_connection();
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Number of messages waiting for an open connection.
    pub fn queued(&self) -> usize {
        self.outbox.len()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn timer(&self) -> &S {
        &self.timer
    }

    fn start_connection(&mut self) {
        self.set_status(ConnectionStatus::Connecting);
        tracing::debug!(
            endpoint = %self.endpoint(),
            attempt = self.attempts,
            "Connecting"
        );
        self.transport.connect(&self.url);
    }

    fn connection_lost(&mut self) {
        if !self.auto_reconnect {
            self.set_status(ConnectionStatus::Closed);
            return;
        }

        if let Some(max) = self.max_reconnect_attempts {
            if self.attempts >= max {
                tracing::warn!(
                    endpoint = %self.endpoint(),
                    attempts = self.attempts,
                    "Reconnect attempts exhausted"
                );
                self.set_status(ConnectionStatus::Closed);
                return;
            }
        }

        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect_pending {
            return;
        }

        let delay = self.backoff.delay(self.attempts);
        self.reconnect_pending = true;
        self.set_status(ConnectionStatus::Reconnecting);

        tracing::info!(
            attempt = self.attempts + 1,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        self.timer.schedule(delay);
    }

    fn flush_outbox(&mut self) {
        let pending = self.outbox.len();
        if pending == 0 {
            return;
        }

        while let Some(message) = self.outbox.pop_front() {
            let text = match message.encode() {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(kind = %message.kind(), "Dropping unencodable message: {}", e);
                    continue;
                }
            };

            if let Err(e) = self.transport.send(text) {
                self.outbox.push_front(message);
                tracing::warn!(
                    remaining = self.outbox.len(),
                    "Outbox flush interrupted: {}",
                    e
                );
                return;
            }
        }

        tracing::debug!(flushed = pending, "Outbox flushed");
    }

    fn enqueue(&mut self, message: Message) {
        match self.outbox.push(message) {
            PushOutcome::Enqueued => {
                tracing::trace!(queued = self.outbox.len(), "Message queued until open");
            }
            PushOutcome::Evicted(oldest) => {
                tracing::warn!(
                    kind = %oldest.kind(),
                    capacity = self.outbox.capacity(),
                    "Outbox full, dropped oldest message"
                );
            }
            PushOutcome::Rejected(rejected) => {
                tracing::warn!(
                    kind = %rejected.kind(),
                    capacity = self.outbox.capacity(),
                    "Outbox full, rejected message"
                );
            }
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status == status {
            return;
        }
        self.status = status;
        if let Some(on_status_change) = self.handlers.on_status_change.as_mut() {
            on_status_change(status);
        }
    }

    /// The endpoint without the identity query, for logs.
    fn endpoint(&self) -> &str {
        &self.url[..url::Position::AfterPath]
    }
}

impl<T: Transport, S: Timer> fmt::Debug for UpdateClient<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateClient")
            .field("endpoint", &self.endpoint())
            .field("status", &self.status)
            .field("attempts", &self.attempts)
            .field("reconnect_pending", &self.reconnect_pending)
            .field("queued", &self.outbox.len())
            .finish_non_exhaustive()
    }
}
