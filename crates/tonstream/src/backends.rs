//! 🔌 Backends: where the real I/O happens.
//!
//! 🚰 Source backends pour events in, Sink backends slurp batches up.
//! And in between, we panic! (kidding, we use anyhow)
//!
//! - `sse`: the long-lived server-sent-events subscription.
//! - `clickhouse`: bulk inserts over the ClickHouse HTTP interface.
//! - `in_mem`: scripted doubles for tests. No sockets. No heartbeat. Just vibes.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::Result;
use async_trait::async_trait;

use crate::common::{Batch, RawEvent};

pub(crate) mod clickhouse;
#[cfg(test)]
pub(crate) mod in_mem;
pub(crate) mod sse;

pub(crate) use clickhouse::ClickHouseSink;
pub(crate) use sse::SseSource;

/// 🚰 A source of raw events, one server push at a time.
///
/// # Contract 📜
/// - `Ok(Some(event))` while the stream flows, in arrival order.
/// - `Ok(None)` when the upstream closed cleanly. EOF. Fin. 🏁
/// - `Err(..)` when the upstream died. The cause rides along.
/// - `close` tears the subscription down. No dangling sockets, no ghosts.
#[async_trait]
pub(crate) trait Source: std::fmt::Debug + Send {
    /// 📨 Wait for the next event. Cancel-safe: dropping the future loses nothing.
    async fn next_event(&mut self) -> Result<Option<RawEvent>>;
    /// 🔌 Cancel the upstream subscription and discard anything still queued.
    async fn close(&mut self) -> Result<()>;
}

/// 🕳️ A sink that persists one batch per call, all-or-nothing.
///
/// # Contract 📜
/// - `write` stores every record of the batch or none of them, and returns how many landed.
/// - `write` does not retry. Retries are a driver decision, and the driver said no.
/// - `close` releases whatever the sink holds. Call it. Always. Even on Fridays.
#[async_trait]
pub(crate) trait Sink: std::fmt::Debug + Send {
    /// 📥 One bulk insert. One batch. One shot.
    async fn write(&mut self, batch: Batch) -> Result<usize>;
    /// 🗑️ Release, finalize, say goodbye.
    async fn close(&mut self) -> Result<()>;
}
