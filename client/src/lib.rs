//! # Genwave Client
//!
//! Tokio runtime for the [`genwave_engine`] update client.
//!
//! [`ClientHandle::spawn`] starts a client that connects to the relay over
//! WebSocket, delivers every generation event to a callback, and reconnects
//! with backoff until it is closed or dropped. [`UpdateStore`] and
//! [`JobTracker`] are ready-made consumers of that event stream.
//!
//! ```no_run
//! use genwave_client::{ClientHandle, ClientOptions, ConnectionStatus, UpdateStore};
//!
//! # async fn run() -> Result<(), genwave_client::ClientError> {
//! let store = UpdateStore::new();
//! let mut client = ClientHandle::spawn_with_store(
//!     ClientOptions::new("ws://localhost:3000/ws", "user-1"),
//!     store.clone(),
//! )?;
//!
//! client.wait_for_status(ConnectionStatus::Open).await;
//! while let Some(message) = store.dequeue() {
//!     println!("{:?}", message);
//! }
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod jobs;
pub mod runtime;
pub mod store;
pub mod ws;

pub use config::{Config, ConfigError};
pub use error::{ClientError, Result};
pub use jobs::{JobState, JobTracker, QueueSnapshot};
pub use runtime::ClientHandle;
pub use store::UpdateStore;
pub use ws::{TokioTimer, WsTransport};

pub use genwave_engine::{
    Backoff, ClientOptions, ConnectionStatus, JobId, Message, MessageKind, OverflowPolicy,
};
