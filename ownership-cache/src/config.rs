//! Settings for spawning the store and client actors.

/// Queue depth used when nothing else is configured.
///
/// A single slot keeps senders close to the rendezvous behaviour of an
/// unbuffered channel: a second request waits until the first is taken.
pub const DEFAULT_QUEUE_DEPTH: usize = 1;

/// Configuration for spawning a [`Store`](crate::store::Store) task.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Capacity of the store's inbound request queue (at least 1).
    pub queue_depth: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

/// Configuration for spawning a [`Client`](crate::client::Client) task.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name used in logs and error messages.
    pub name: String,
    /// Capacity of the client's inbound action queue (at least 1).
    pub queue_depth: usize,
}

impl ClientConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }
}

/// Tokio panics on zero-capacity channels, so clamp to one slot.
pub(crate) fn channel_capacity(queue_depth: usize) -> usize {
    queue_depth.max(1)
}
