//! Protocol properties exercised against spawned store and client tasks.

use std::time::Duration;

use anyhow::Result;
use ownership_cache::{
    client::{Client, ClientHandle},
    config::{ClientConfig, StoreConfig},
    demo::wait_until_parked,
    message::{ActionKind, ClientReply, StoreReply},
    store::{Store, StoreHandle},
};
use tokio::{task::JoinHandle, time::timeout};

const STEP_TIMEOUT: Duration = Duration::from_secs(2);

struct Cluster {
    store: StoreHandle,
    clients: Vec<ClientHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl Cluster {
    fn spawn(names: &[&str]) -> Self {
        let (store, store_task) = Store::new().spawn(StoreConfig::default());
        let mut clients = Vec::new();
        let mut tasks = vec![store_task];
        for name in names {
            let (handle, task) = Client::spawn(ClientConfig::named(*name), store.clone());
            clients.push(handle);
            tasks.push(task);
        }
        Self {
            store,
            clients,
            tasks,
        }
    }

    fn client(&self, index: usize) -> &ClientHandle {
        &self.clients[index]
    }

    async fn shutdown(self) -> Result<()> {
        drop(self.clients);
        drop(self.store);
        for task in self.tasks {
            timeout(STEP_TIMEOUT, task).await??;
        }
        Ok(())
    }
}

#[tokio::test]
async fn parked_get_observes_releasing_put() -> Result<()> {
    let cluster = Cluster::spawn(&["a", "b"]);
    let (a, b) = (cluster.client(0), cluster.client(1));

    assert_eq!(a.get("alpha").await?, ClientReply::fetched(0));
    assert_eq!(a.put("alpha", 42).await?, ClientReply::released());
    assert_eq!(b.get("alpha").await?, ClientReply::fetched(42));

    let mut pending = a.dispatch(ActionKind::Get, "alpha").await?;
    wait_until_parked(&cluster.store, "alpha").await?;
    assert!(pending.try_take().is_none(), "get must wait while b owns alpha");

    assert_eq!(b.get("alpha").await?, ClientReply::cache_hit(42));
    assert_eq!(b.put("alpha", 7).await?, ClientReply::released());

    let resumed = timeout(STEP_TIMEOUT, pending.wait()).await??;
    assert_eq!(resumed, ClientReply::fetched(7));

    let snapshot = cluster.store.snapshot().await?;
    assert!(snapshot.owned.contains("alpha"), "alpha now belongs to a");
    assert!(snapshot.waiting.is_empty());

    // a owns it now, so the next get is local.
    assert_eq!(a.get("alpha").await?, ClientReply::cache_hit(7));
    assert_eq!(a.put("alpha", 8).await?, ClientReply::released());

    cluster.shutdown().await
}

#[tokio::test]
async fn displaced_reader_fails_without_hanging() -> Result<()> {
    let cluster = Cluster::spawn(&["a", "b", "c"]);
    let (a, b, c) = (cluster.client(0), cluster.client(1), cluster.client(2));

    assert_eq!(a.get("alpha").await?, ClientReply::fetched(0));

    let displaced = b.dispatch(ActionKind::Get, "alpha").await?;
    wait_until_parked(&cluster.store, "alpha").await?;
    let mut latest = c.dispatch(ActionKind::Get, "alpha").await?;

    // c takes over the waiter slot, so b's read ends without a grant.
    let failed = timeout(STEP_TIMEOUT, displaced.wait()).await??;
    assert!(!failed.ok);
    assert_eq!(failed.err.as_deref(), Some("kv read failed"));
    assert!(latest.try_take().is_none(), "c stays parked while a owns alpha");

    assert_eq!(a.put("alpha", 5).await?, ClientReply::released());
    let granted = timeout(STEP_TIMEOUT, latest.wait()).await??;
    assert_eq!(granted, ClientReply::fetched(5));

    // b never got ownership, so it has nothing to put.
    let refused = b.put("alpha", 6).await?;
    assert_eq!(refused.err.as_deref(), Some("key not in local cache"));

    assert_eq!(c.put("alpha", 6).await?, ClientReply::released());
    let snapshot = cluster.store.snapshot().await?;
    assert_eq!(snapshot.values.get("alpha"), Some(&6));
    assert!(snapshot.owned.is_empty());
    assert!(snapshot.waiting.is_empty());

    cluster.shutdown().await
}

#[tokio::test]
async fn put_requires_local_ownership() -> Result<()> {
    let cluster = Cluster::spawn(&["a", "b"]);
    let (a, b) = (cluster.client(0), cluster.client(1));

    a.get("alpha").await?;
    let reply = b.put("alpha", 13).await?;
    assert!(!reply.ok);
    assert_eq!(reply.err.as_deref(), Some("key not in local cache"));

    let snapshot = cluster.store.snapshot().await?;
    assert_eq!(snapshot.values.get("alpha"), Some(&0));
    assert!(snapshot.owned.contains("alpha"));

    a.put("alpha", 1).await?;
    cluster.shutdown().await
}

#[tokio::test]
async fn raw_write_to_absent_key_leaves_tables_untouched() -> Result<()> {
    let cluster = Cluster::spawn(&[]);

    let reply = cluster.store.write("ghost", 5).await?;
    assert_eq!(reply, StoreReply::rejected());

    let snapshot = cluster.store.snapshot().await?;
    assert!(snapshot.values.is_empty());
    assert!(snapshot.owned.is_empty());

    cluster.shutdown().await
}

#[tokio::test]
async fn contending_clients_never_lose_an_increment() -> Result<()> {
    const ROUNDS: i64 = 50;

    let cluster = Cluster::spawn(&["a", "b"]);
    let mut workers = Vec::new();
    for client in cluster.clients.iter().cloned() {
        workers.push(tokio::spawn(async move {
            for _ in 0..ROUNDS {
                let current = client.get("counter").await?;
                anyhow::ensure!(current.ok, "get failed: {:?}", current.err);
                let written = client.put("counter", current.value + 1).await?;
                anyhow::ensure!(written.ok, "put failed: {:?}", written.err);
            }
            anyhow::Ok(())
        }));
    }
    for worker in workers {
        timeout(Duration::from_secs(10), worker).await???;
    }

    let snapshot = cluster.store.snapshot().await?;
    assert_eq!(snapshot.values.get("counter"), Some(&(2 * ROUNDS)));
    assert!(snapshot.owned.is_empty());

    cluster.shutdown().await
}

#[tokio::test]
async fn independent_keys_do_not_block_each_other() -> Result<()> {
    let cluster = Cluster::spawn(&["a", "b"]);
    let (a, b) = (cluster.client(0), cluster.client(1));

    assert_eq!(a.get("alpha").await?, ClientReply::fetched(0));
    let beta = timeout(STEP_TIMEOUT, b.get("beta")).await??;
    assert_eq!(beta, ClientReply::fetched(0));

    a.put("alpha", 1).await?;
    b.put("beta", 2).await?;

    let snapshot = cluster.store.snapshot().await?;
    assert_eq!(snapshot.values.get("alpha"), Some(&1));
    assert_eq!(snapshot.values.get("beta"), Some(&2));

    cluster.shutdown().await
}
