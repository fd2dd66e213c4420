//! Exclusive-ownership cache coherence between one store and caching clients.
//!
//! Every participant is a Tokio task that owns its state and talks to the
//! others only through channels: requests go over an `mpsc` queue and carry a
//! `oneshot` sender for their reply. Because the store drains its queue one
//! request at a time, ownership changes are strictly ordered and no lock
//! guards the ownership table.
//!
//! - [`store`] holds the canonical values, the ownership table and the single
//!   waiter slot per key, and hands a released key directly to a parked reader.
//! - [`client`] keeps the keys it owns in a private cache and turns get/put
//!   calls into store reads and writes.
//! - [`message`] defines the request and reply types for both actors.
//! - [`error`] names the ways a single call can fail.
//! - [`config`] carries queue sizes and client names.
//! - [`cli`] and [`demo`] drive the two-client walkthrough used by the binary.

pub mod cli;
pub mod client;
pub mod config;
pub mod demo;
pub mod error;
pub mod message;
pub mod store;
