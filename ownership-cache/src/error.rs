//! Failures a single get/put/read/write can end in.
//!
//! Every variant is terminal for the call that produced it; nothing is
//! retried. The `Display` text of the client-facing variants is what ends up
//! in [`ClientReply::err`](crate::message::ClientReply::err).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The store refused a read, or discarded it without answering.
    #[error("kv read failed")]
    ReadFailed,

    /// A write targeted a key that was never read or written before.
    #[error("kv write failed (key missing in store)")]
    WriteToMissingKey,

    /// A put for a key the client does not currently hold.
    #[error("key not in local cache")]
    LocalCacheMiss,

    /// The client does not know this kind of action.
    #[error("unknown action")]
    UnknownAction {
        /// Name the caller used for the action.
        name: String,
    },

    /// The store does not know this kind of request.
    #[error("unknown store operation '{name}'")]
    UnknownOperation {
        /// Name the caller used for the operation.
        name: String,
    },

    /// The store accepted a request but dropped its reply channel.
    #[error("store dropped the request without replying")]
    ReplyDropped,

    /// The store task has stopped and no longer accepts requests.
    #[error("store is no longer running")]
    StoreUnavailable,

    /// The client task has stopped and no longer accepts actions.
    #[error("client '{name}' is no longer running")]
    ClientUnavailable {
        /// Name of the stopped client.
        name: String,
    },
}
