//! Scripted walkthrough of an ownership handoff between two clients.
//!
//! The script is fixed; only the two written values come from the caller:
//!
//! 1. client1 reads `alpha` (created as 0) and writes `first`.
//! 2. client2 reads `alpha` and now owns it.
//! 3. client1 reads `alpha` again and parks behind client2.
//! 4. client2 reads from its cache, then writes `second`.
//! 5. client1's parked read completes with `second`.

use std::{fmt, time::Duration};

use anyhow::{Result, bail};
use serde::Serialize;
use tokio::time::{Instant, sleep};
use tracing::info;

use crate::{
    cli::DemoArgs,
    client::{Client, ClientHandle},
    config::{ClientConfig, StoreConfig},
    message::{ActionKind, ClientReply, Value},
    store::{Store, StoreHandle},
};

pub const DEMO_KEY: &str = "alpha";

const PARK_TIMEOUT: Duration = Duration::from_secs(2);
const PARK_POLL: Duration = Duration::from_millis(1);

/// One printed line of the walkthrough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceLine {
    pub client: String,
    #[serde(flatten)]
    pub step: Step,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Get { key: String, reply: ClientReply },
    Put { key: String, value: Value, reply: ClientReply },
    Parked { key: String },
    Resumed { key: String, reply: ClientReply },
}

impl fmt::Display for TraceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.client)?;
        match &self.step {
            Step::Get { key, reply } => write!(
                f,
                "get {key} -> value={} ok={} err={:?}",
                reply.value,
                reply.ok,
                reply.err_text()
            ),
            Step::Put { key, value, reply } => write!(
                f,
                "put {key}={value} -> ok={} err={:?}",
                reply.ok,
                reply.err_text()
            ),
            Step::Parked { key } => write!(f, "get {key} (pending)"),
            Step::Resumed { key, reply } => write!(
                f,
                "pending get {key} reply -> value={} ok={} err={:?}",
                reply.value,
                reply.ok,
                reply.err_text()
            ),
        }
    }
}

fn line(client: &ClientHandle, step: Step) -> TraceLine {
    TraceLine {
        client: client.name().to_string(),
        step,
    }
}

/// Runs the walkthrough, handing every step to `emit` as soon as it happens.
pub async fn run<F>(args: &DemoArgs, mut emit: F) -> Result<()>
where
    F: FnMut(&TraceLine) -> Result<()>,
{
    let (store, store_task) = Store::new().spawn(StoreConfig {
        queue_depth: args.queue_depth,
    });
    let (client1, client1_task) = Client::spawn(
        ClientConfig::named("client1").with_queue_depth(args.queue_depth),
        store.clone(),
    );
    let (client2, client2_task) = Client::spawn(
        ClientConfig::named("client2").with_queue_depth(args.queue_depth),
        store.clone(),
    );
    let key = DEMO_KEY.to_string();

    let reply = client1.get(DEMO_KEY).await?;
    emit(&line(&client1, Step::Get { key: key.clone(), reply }))?;

    let reply = client1.put(DEMO_KEY, args.first).await?;
    emit(&line(
        &client1,
        Step::Put {
            key: key.clone(),
            value: args.first,
            reply,
        },
    ))?;

    let reply = client2.get(DEMO_KEY).await?;
    emit(&line(&client2, Step::Get { key: key.clone(), reply }))?;

    let pending = client1.dispatch(ActionKind::Get, DEMO_KEY).await?;
    emit(&line(&client1, Step::Parked { key: key.clone() }))?;
    wait_until_parked(&store, DEMO_KEY).await?;

    let reply = client2.get(DEMO_KEY).await?;
    emit(&line(&client2, Step::Get { key: key.clone(), reply }))?;

    let reply = client2.put(DEMO_KEY, args.second).await?;
    emit(&line(
        &client2,
        Step::Put {
            key: key.clone(),
            value: args.second,
            reply,
        },
    ))?;

    let reply = pending.wait().await?;
    emit(&line(&client1, Step::Resumed { key, reply }))?;

    let snapshot = store.snapshot().await?;
    info!(?snapshot, "final store state");

    drop(client1);
    drop(client2);
    drop(store);
    client1_task.await?;
    client2_task.await?;
    store_task.await?;

    Ok(())
}

/// Polls the store until a reader is parked on `key`.
pub async fn wait_until_parked(store: &StoreHandle, key: &str) -> Result<()> {
    let deadline = Instant::now() + PARK_TIMEOUT;
    loop {
        if store.snapshot().await?.waiting.contains(key) {
            return Ok(());
        }
        if Instant::now() >= deadline {
            bail!("timed out waiting for a reader to park on '{key}'");
        }
        sleep(PARK_POLL).await;
    }
}
