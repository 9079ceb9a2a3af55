//! # Genwave Engine
//!
//! The deterministic core of the Genwave real-time update client.
//!
//! The engine maintains a single logical connection to the generation event
//! relay: it decodes inbound frames into typed [`Message`]s, buffers outbound
//! messages while disconnected, and reconnects with capped exponential
//! backoff until explicitly closed.
//!
//! ## Design Principles
//!
//! - **No IO**: connections and timers are supplied through the [`Transport`]
//!   and [`Timer`] traits
//! - **Event-driven**: the runtime feeds transport notifications in serially;
//!   callbacks run synchronously inside them
//! - **Testable**: every transition can be driven by hand
//!
//! ## Core Concepts
//!
//! ### Messages
//!
//! Five event variants, discriminated by a `type` field on the wire. See
//! [`Message::decode`]. Anything else is dropped.
//!
//! ### Status
//!
//! [`ConnectionStatus`] is one of `connecting`, `open`, `closed`, `error`,
//! `reconnecting`. Every transition is reported once, in order.
//!
//! ### Backoff
//!
//! [`Backoff::delay`] gives `min(base * 2^n, max)` for retry `n`, with
//! defaults of 1 s and 30 s.
//!
//! ### Outbox
//!
//! Messages sent while the connection is not open wait in a bounded
//! [`Outbox`] and are flushed in FIFO order on the next open.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! use genwave_engine::{
//!     ClientOptions, ConnectionStatus, Handlers, Message, Timer, Transport, TransportError,
//!     UpdateClient, Url,
//! };
//!
//! #[derive(Default)]
//! struct Loopback {
//!     sent: Vec<String>,
//! }
//!
//! impl Transport for Loopback {
//!     fn connect(&mut self, _url: &Url) {}
//!     fn send(&mut self, text: String) -> Result<(), TransportError> {
//!         self.sent.push(text);
//!         Ok(())
//!     }
//!     fn close(&mut self) {}
//! }
//!
//! struct ManualTimer;
//!
//! impl Timer for ManualTimer {
//!     fn schedule(&mut self, _delay: Duration) {}
//!     fn cancel(&mut self) {}
//! }
//!
//! let received = Arc::new(Mutex::new(Vec::new()));
//! let sink = received.clone();
//!
//! let mut client = UpdateClient::connect(
//!     ClientOptions::new("wss://relay.example.com/ws", "user-1"),
//!     Loopback::default(),
//!     ManualTimer,
//!     Handlers::new(move |msg| sink.lock().unwrap().push(msg)),
//! )
//! .unwrap();
//! assert_eq!(client.status(), ConnectionStatus::Connecting);
//!
//! // Queued until the connection opens
//! client.send(Message::QueueUpdated { id: None, position: 2, total_queue_size: 5, eta: 30.0 });
//! assert_eq!(client.queued(), 1);
//!
//! client.handle_open();
//! assert_eq!(client.transport().sent.len(), 1);
//!
//! client.handle_message(r#"{"type":"generation_progress","id":1,"progress":40,"stage":"render","eta":8}"#);
//! client.handle_message("garbage");
//! assert_eq!(received.lock().unwrap().len(), 1);
//!
//! client.close();
//! assert_eq!(client.status(), ConnectionStatus::Closed);
//! ```

pub mod backoff;
pub mod client;
pub mod error;
pub mod message;
pub mod outbox;
pub mod status;
pub mod transport;

// Re-export main types at crate root
pub use backoff::{Backoff, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
pub use client::{ClientOptions, Handlers, MessageHandler, StatusHandler, UpdateClient};
pub use error::{DecodeError, Error, Result, TransportError};
pub use message::{JobId, Message, MessageKind};
pub use outbox::{Outbox, OverflowPolicy, PushOutcome, DEFAULT_OUTBOX_CAPACITY};
pub use status::ConnectionStatus;
pub use transport::{Timer, Transport};
pub use url::Url;
