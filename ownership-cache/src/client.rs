//! Caching client actor.
//!
//! A client keeps the keys it currently owns in a private cache. Gets for
//! cached keys never leave the client; a miss asks the store for ownership
//! (waiting as long as another client holds the key). A put is only allowed
//! for a cached key and gives ownership back to the store.

use std::collections::HashMap;

use anyhow::{Context, Result};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, channel_capacity};
use crate::error::CacheError;
use crate::message::{ActionKind, ClientAction, ClientReply, Key, Value};
use crate::store::StoreHandle;

pub struct Client {
    name: String,
    cache: HashMap<Key, Value>,
    store: StoreHandle,
}

impl Client {
    pub fn new(name: impl Into<String>, store: StoreHandle) -> Self {
        Self {
            name: name.into(),
            cache: HashMap::new(),
            store,
        }
    }

    /// Spawns a client task. It stops once every [`ClientHandle`] is dropped.
    pub fn spawn(config: ClientConfig, store: StoreHandle) -> (ClientHandle, JoinHandle<()>) {
        let (inbox_tx, inbox_rx) = mpsc::channel(channel_capacity(config.queue_depth));
        let client = Client::new(config.name.clone(), store);
        let task = tokio::spawn(client.run(inbox_rx));
        let handle = ClientHandle {
            name: config.name,
            inbox: inbox_tx,
        };
        (handle, task)
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<ClientAction>) {
        info!(client = %self.name, "client started");
        // One action at a time: a parked get holds up everything behind it.
        while let Some(ClientAction { kind, key, reply }) = inbox.recv().await {
            let outcome = self.perform(kind, &key).await;
            if reply.send(outcome).is_err() {
                debug!(client = %self.name, %key, "caller dropped before the reply");
            }
        }
        info!(client = %self.name, cached = self.cache.len(), "client stopped");
    }

    pub async fn perform(&mut self, kind: ActionKind, key: &str) -> ClientReply {
        match kind {
            ActionKind::Get => self.get(key).await,
            ActionKind::Put(value) => self.put(key, value).await,
            ActionKind::Unsupported(name) => {
                let error = CacheError::UnknownAction { name };
                warn!(client = %self.name, key, %error, "rejecting action");
                ClientReply::failed(&error)
            }
        }
    }

    pub async fn get(&mut self, key: &str) -> ClientReply {
        if let Some(&value) = self.cache.get(key) {
            debug!(client = %self.name, key, value, "cache hit");
            return ClientReply::cache_hit(value);
        }

        match self.store.read(key).await {
            Ok(reply) if reply.ok => {
                self.cache.insert(key.to_string(), reply.value);
                debug!(client = %self.name, key, value = reply.value, "acquired ownership");
                ClientReply::fetched(reply.value)
            }
            Ok(_) => ClientReply::failed(&CacheError::ReadFailed),
            Err(error) => {
                warn!(client = %self.name, key, %error, "read failed");
                ClientReply::failed(&CacheError::ReadFailed)
            }
        }
    }

    pub async fn put(&mut self, key: &str, value: Value) -> ClientReply {
        let Some(cached) = self.cache.get_mut(key) else {
            return ClientReply::failed(&CacheError::LocalCacheMiss);
        };
        // Updated before the store confirms; a rejected write leaves it changed.
        *cached = value;

        match self.store.write(key, value).await {
            Ok(reply) if reply.ok => {
                self.cache.remove(key);
                debug!(client = %self.name, key, value, "released ownership");
                ClientReply::released()
            }
            Ok(_) => ClientReply::failed(&CacheError::WriteToMissingKey),
            Err(error) => {
                warn!(client = %self.name, key, %error, "write failed");
                ClientReply::failed(&CacheError::WriteToMissingKey)
            }
        }
    }

    /// The cached value of a key this client believes it owns.
    pub fn cached(&self, key: &str) -> Option<Value> {
        self.cache.get(key).copied()
    }
}

/// Cloneable sending side of a running client task.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    name: String,
    inbox: mpsc::Sender<ClientAction>,
}

impl ClientHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn get(&self, key: impl Into<Key>) -> Result<ClientReply> {
        self.dispatch(ActionKind::Get, key).await?.wait().await
    }

    pub async fn put(&self, key: impl Into<Key>, value: Value) -> Result<ClientReply> {
        self.dispatch(ActionKind::Put(value), key).await?.wait().await
    }

    /// Queues an action without waiting for its reply.
    ///
    /// Used to issue a get that is expected to park while another client
    /// holds the key.
    pub async fn dispatch(&self, kind: ActionKind, key: impl Into<Key>) -> Result<PendingReply> {
        let (action, reply_rx) = ClientAction::new(kind, key);
        let key = action.key.clone();
        self.inbox.send(action).await.map_err(|_| CacheError::ClientUnavailable {
            name: self.name.clone(),
        })?;
        Ok(PendingReply {
            client: self.name.clone(),
            key,
            reply_rx,
        })
    }
}

/// The outstanding reply to a dispatched action.
#[derive(Debug)]
pub struct PendingReply {
    client: String,
    key: Key,
    reply_rx: oneshot::Receiver<ClientReply>,
}

impl PendingReply {
    /// Takes the reply if it has already arrived.
    pub fn try_take(&mut self) -> Option<ClientReply> {
        self.reply_rx.try_recv().ok()
    }

    pub async fn wait(self) -> Result<ClientReply> {
        self.reply_rx
            .await
            .with_context(|| format!("client '{}' dropped reply for '{}'", self.client, self.key))
    }
}
