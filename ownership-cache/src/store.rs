//! The authoritative key-value store and its ownership table.
//!
//! A [`Store`] is a plain state machine: [`Store::handle`] evaluates one
//! request at a time and never waits on anyone. [`Store::spawn`] moves it into
//! a Tokio task that drains an `mpsc` queue, so the value table, the ownership
//! table and the waiter slots are only ever touched from that one loop.
//!
//! A key moves between two states:
//!
//! - **unowned**: the next read is granted immediately and takes ownership.
//! - **owned**: a read is parked as the key's only waiter; the next write
//!   publishes its value, answers the writer, and hands ownership straight to
//!   the waiter (or releases the key when nobody is waiting).
//!
//! Ownership is tracked as a flag, not per client, so any write to an owned
//! key releases it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::config::{StoreConfig, channel_capacity};
use crate::error::CacheError;
use crate::message::{
    Key, StoreCommand, StoreOp, StoreReply, StoreRequest, Value, send_store_reply,
};

/// Point-in-time view of the store, ordered for stable output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSnapshot {
    pub values: BTreeMap<Key, Value>,
    pub owned: BTreeSet<Key>,
    pub waiting: BTreeSet<Key>,
}

#[derive(Debug, Default)]
pub struct Store {
    values: HashMap<Key, Value>,
    owned: HashSet<Key>,
    waiters: HashMap<Key, oneshot::Sender<StoreReply>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the store into its own task and returns a handle for sending it requests.
    ///
    /// The task ends once every [`StoreHandle`] has been dropped. Readers
    /// still parked at that point have their reply channels dropped.
    pub fn spawn(self, config: StoreConfig) -> (StoreHandle, JoinHandle<()>) {
        let (inbox_tx, inbox_rx) = mpsc::channel(channel_capacity(config.queue_depth));
        let task = tokio::spawn(self.run(inbox_rx));
        (StoreHandle { inbox: inbox_tx }, task)
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<StoreCommand>) {
        info!("store started");
        while let Some(command) = inbox.recv().await {
            match command {
                StoreCommand::Request(request) => self.handle(request),
                StoreCommand::Snapshot { respond_to } => {
                    if respond_to.send(self.snapshot()).is_err() {
                        debug!("snapshot requester dropped before the reply");
                    }
                }
            }
        }
        if !self.waiters.is_empty() {
            warn!(
                parked = self.waiters.len(),
                "store stopping with readers still parked"
            );
        }
        info!("store stopped");
    }

    /// Evaluates one request. Parked reads are answered by a later write.
    pub fn handle(&mut self, request: StoreRequest) {
        let StoreRequest { op, key, reply } = request;
        match op {
            StoreOp::Read => self.read(key, reply),
            StoreOp::Write(value) => self.write(key, value, reply),
            StoreOp::Unsupported(name) => {
                let error = CacheError::UnknownOperation { name };
                warn!(%key, %error, "rejecting store request");
                send_store_reply(reply, &key, StoreReply::rejected());
            }
        }
    }

    fn read(&mut self, key: Key, reply: oneshot::Sender<StoreReply>) {
        if self.owned.contains(&key) {
            debug!(%key, "key is owned, parking reader");
            if self.waiters.insert(key.clone(), reply).is_some() {
                warn!(%key, "reader displaced an earlier waiter on the same key");
            }
            return;
        }

        let value = *self.values.entry(key.clone()).or_insert(0);
        self.owned.insert(key.clone());
        debug!(%key, value, "granted ownership");
        send_store_reply(reply, &key, StoreReply::granted(value));
    }

    fn write(&mut self, key: Key, value: Value, reply: oneshot::Sender<StoreReply>) {
        let Some(slot) = self.values.get_mut(&key) else {
            debug!(%key, error = %CacheError::WriteToMissingKey, "rejecting write");
            send_store_reply(reply, &key, StoreReply::rejected());
            return;
        };

        *slot = value;
        send_store_reply(reply, &key, StoreReply::granted(value));

        match self.waiters.remove(&key) {
            Some(waiter) => self.transfer(key, value, waiter),
            None => {
                self.owned.remove(&key);
                debug!(%key, value, "released ownership");
            }
        }
    }

    /// Hands a just-released key to its parked reader without ever marking it unowned.
    fn transfer(&mut self, key: Key, value: Value, waiter: oneshot::Sender<StoreReply>) {
        self.owned.insert(key.clone());
        if waiter.send(StoreReply::granted(value)).is_err() {
            // The parked reader is gone; nobody holds the key now.
            self.owned.remove(&key);
            warn!(%key, "parked reader vanished before the grant, releasing key");
            return;
        }
        info!(%key, value, "transferred ownership to parked reader");
    }

    pub fn is_owned(&self, key: &str) -> bool {
        self.owned.contains(key)
    }

    pub fn has_waiter(&self, key: &str) -> bool {
        self.waiters.contains_key(key)
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.values.get(key).copied()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            values: self
                .values
                .iter()
                .map(|(key, value)| (key.clone(), *value))
                .collect(),
            owned: self.owned.iter().cloned().collect(),
            waiting: self.waiters.keys().cloned().collect(),
        }
    }
}

/// Cloneable sending side of a running store task.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    inbox: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    /// Wraps a raw request queue. Whoever owns the receiving end plays the store.
    pub fn from_sender(inbox: mpsc::Sender<StoreCommand>) -> Self {
        Self { inbox }
    }

    /// Sends a request and waits for its reply.
    ///
    /// A read against an owned key does not return until the key is handed
    /// over. `ReplyDropped` means the store discarded the request (a displaced
    /// waiter, or shutdown while parked).
    pub async fn request(&self, op: StoreOp, key: impl Into<Key>) -> Result<StoreReply, CacheError> {
        let (request, reply_rx) = StoreRequest::new(op, key);
        self.inbox
            .send(StoreCommand::Request(request))
            .await
            .map_err(|_| CacheError::StoreUnavailable)?;
        reply_rx.await.map_err(|_| CacheError::ReplyDropped)
    }

    pub async fn read(&self, key: impl Into<Key>) -> Result<StoreReply, CacheError> {
        self.request(StoreOp::Read, key).await
    }

    pub async fn write(&self, key: impl Into<Key>, value: Value) -> Result<StoreReply, CacheError> {
        self.request(StoreOp::Write(value), key).await
    }

    pub async fn snapshot(&self) -> Result<StoreSnapshot> {
        let (respond_to, snapshot_rx) = oneshot::channel();
        self.inbox
            .send(StoreCommand::Snapshot { respond_to })
            .await
            .context("failed to send snapshot request")?;
        snapshot_rx.await.context("snapshot response channel closed")
    }
}
