//! 📦 Common data structures: the building blocks of tonstream
//!
//! 🎬 COLD OPEN. INT. MEMPOOL, 3:47 AM
//!
//! A transaction lands on the chain. Somewhere far away, an SSE endpoint
//! whispers about it. We catch the whisper as a [`RawEvent`], squint at it until
//! it becomes a [`TransactionRecord`], and herd a handful of those into a
//! [`Batch`] before shipping them off to the store. 🦆
//!
//! These structs don't ask questions. They carry the data. Please tip them.

use chrono::{DateTime, Utc};

/// 📨 One server-pushed event, exactly as it came off the wire.
///
/// Lives just long enough to be decoded. Like a mayfly, but JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawEvent {
    /// ⏱️ Local receipt time, not anything the server claims.
    pub received_at: DateTime<Utc>,
    pub payload: String,
}

impl RawEvent {
    /// 🏗️ Stamp a payload with "right now".
    pub(crate) fn received_now(payload: String) -> Self {
        Self {
            received_at: Utc::now(),
            payload,
        }
    }
}

/// 🎯 A fully decoded transaction notification. Every field present, or it doesn't exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TransactionRecord {
    pub observed_at: DateTime<Utc>,
    pub account_id: String,
    /// 🔢 The chain's logical time (`lt`). Monotonic per account, not per planet.
    pub logical_time: u64,
    pub tx_hash: String,
}

/// 🛒 A `Batch`: arrival-ordered records headed for one bulk insert.
///
/// Either all of these land in the store, or none of them do. No half-measures.
/// No "well, three of them made it". This is a package deal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Batch {
    pub records: Vec<TransactionRecord>,
}

impl Batch {
    pub(crate) fn new(records: Vec<TransactionRecord>) -> Self {
        Self { records }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
