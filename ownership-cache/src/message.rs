use serde::Serialize;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::CacheError;
use crate::store::StoreSnapshot;

pub type Key = String;
pub type Value = i64;

/// What a [`StoreRequest`] asks the store to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Take ownership of the key and learn its current value.
    Read,
    /// Publish a new value and release ownership of the key.
    Write(Value),
    /// Any operation the store does not implement.
    Unsupported(String),
}

/// A single-use request to the store. The reply travels back on `reply`.
#[derive(Debug)]
pub struct StoreRequest {
    pub op: StoreOp,
    pub key: Key,
    pub reply: oneshot::Sender<StoreReply>,
}

impl StoreRequest {
    pub fn new(op: StoreOp, key: impl Into<Key>) -> (Self, oneshot::Receiver<StoreReply>) {
        let (reply, reply_rx) = oneshot::channel();
        let request = Self {
            op,
            key: key.into(),
            reply,
        };
        (request, reply_rx)
    }

    pub fn read(key: impl Into<Key>) -> (Self, oneshot::Receiver<StoreReply>) {
        Self::new(StoreOp::Read, key)
    }

    pub fn write(key: impl Into<Key>, value: Value) -> (Self, oneshot::Receiver<StoreReply>) {
        Self::new(StoreOp::Write(value), key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreReply {
    pub value: Value,
    pub ok: bool,
}

impl StoreReply {
    pub fn granted(value: Value) -> Self {
        Self { value, ok: true }
    }

    pub fn rejected() -> Self {
        Self {
            value: 0,
            ok: false,
        }
    }
}

/// Everything the store task accepts on its inbound queue.
#[derive(Debug)]
pub enum StoreCommand {
    Request(StoreRequest),
    Snapshot {
        respond_to: oneshot::Sender<StoreSnapshot>,
    },
}

/// Delivers a store reply. A requester that already went away is not an error.
pub(crate) fn send_store_reply(reply: oneshot::Sender<StoreReply>, key: &str, message: StoreReply) {
    if reply.send(message).is_err() {
        debug!(key, "requester dropped before the store replied");
    }
}

/// What a [`ClientAction`] asks a client to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Get,
    Put(Value),
    Unsupported(String),
}

/// A single-use action for a client actor.
#[derive(Debug)]
pub struct ClientAction {
    pub kind: ActionKind,
    pub key: Key,
    pub reply: oneshot::Sender<ClientReply>,
}

impl ClientAction {
    pub fn new(kind: ActionKind, key: impl Into<Key>) -> (Self, oneshot::Receiver<ClientReply>) {
        let (reply, reply_rx) = oneshot::channel();
        let action = Self {
            kind,
            key: key.into(),
            reply,
        };
        (action, reply_rx)
    }
}

/// The client's answer to a get or put.
///
/// `value` is meaningful only for successful gets. `hit` is true for gets
/// served from the local cache and for successful puts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientReply {
    pub value: Value,
    pub hit: bool,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl ClientReply {
    pub fn cache_hit(value: Value) -> Self {
        Self {
            value,
            hit: true,
            ok: true,
            err: None,
        }
    }

    pub fn fetched(value: Value) -> Self {
        Self {
            value,
            hit: false,
            ok: true,
            err: None,
        }
    }

    pub fn released() -> Self {
        Self {
            value: 0,
            hit: true,
            ok: true,
            err: None,
        }
    }

    pub fn failed(error: &CacheError) -> Self {
        Self {
            err: Some(error.to_string()),
            ..Self::default()
        }
    }

    /// The error text, or an empty string on success.
    pub fn err_text(&self) -> &str {
        self.err.as_deref().unwrap_or("")
    }
}
