//! Bounded FIFO of outbound messages awaiting an open connection.

use std::collections::vec_deque::{self, VecDeque};

use crate::error::{Error, Result};
use crate::Message;

/// Default number of messages held while disconnected.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// What to do when a message is pushed onto a full outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest queued message to make room.
    #[default]
    DropOldest,
    /// Keep the queue as is and discard the new message.
    RejectNew,
}

/// Result of [`Outbox::push`].
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    Enqueued,
    /// The message was queued and this older one was evicted.
    Evicted(Message),
    /// The outbox was full; the message was not queued.
    Rejected(Message),
}

/// Ordered buffer of messages sent while the connection was not open.
#[derive(Debug, Clone)]
pub struct Outbox {
    queue: VecDeque<Message>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl Outbox {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidConfig(
                "outbox capacity must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            queue: VecDeque::new(),
            capacity,
            policy,
        })
    }

    /// Append a message, applying the overflow policy when full.
    pub fn push(&mut self, message: Message) -> PushOutcome {
        if self.queue.len() < self.capacity {
            self.queue.push_back(message);
            return PushOutcome::Enqueued;
        }

        match self.policy {
            OverflowPolicy::DropOldest => {
                let evicted = self.queue.pop_front();
                self.queue.push_back(message);
                match evicted {
                    Some(evicted) => PushOutcome::Evicted(evicted),
                    None => PushOutcome::Enqueued,
                }
            }
            OverflowPolicy::RejectNew => PushOutcome::Rejected(message),
        }
    }

    pub fn pop_front(&mut self) -> Option<Message> {
        self.queue.pop_front()
    }

    /// Put a message back at the head, used when its transmission failed.
    pub fn push_front(&mut self, message: Message) {
        self.queue.push_front(message);
    }

    pub fn drain(&mut self) -> vec_deque::Drain<'_, Message> {
        self.queue.drain(..)
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, Message> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}
