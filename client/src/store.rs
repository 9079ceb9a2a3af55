//! Downstream state store fed by the update client.
//!
//! Mirrors what the UI layer keeps: the current connection status, the last
//! message received, and a FIFO of every message for consumers that poll
//! instead of subscribing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use genwave_engine::{ConnectionStatus, Message};

#[derive(Debug)]
struct StoreState {
    status: ConnectionStatus,
    last_message: Option<Message>,
    queue: VecDeque<Message>,
}

/// Shared, cloneable update store.
#[derive(Debug, Clone)]
pub struct UpdateStore {
    inner: Arc<Mutex<StoreState>>,
}

impl Default for UpdateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreState {
                status: ConnectionStatus::Closed,
                last_message: None,
                queue: VecDeque::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        // State stays consistent even if a holder panicked mid-read
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        self.state().status = status;
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state().status
    }

    /// Record a message as the latest and append it to the queue.
    pub fn record(&self, message: Message) {
        let mut state = self.state();
        state.queue.push_back(message.clone());
        state.last_message = Some(message);
    }

    pub fn last_message(&self) -> Option<Message> {
        self.state().last_message.clone()
    }

    /// Take the oldest queued message.
    pub fn dequeue(&self) -> Option<Message> {
        self.state().queue.pop_front()
    }

    /// Take every queued message, oldest first.
    pub fn drain(&self) -> Vec<Message> {
        self.state().queue.drain(..).collect()
    }

    pub fn clear_queue(&self) {
        self.state().queue.clear();
    }

    pub fn queue_len(&self) -> usize {
        self.state().queue.len()
    }
}
