//! # Previously, on tonstream...
//!
//! 🎬 The pipeline needed a stunt double. Someone to play the SSE endpoint without a
//! socket, and someone to play ClickHouse without a disk. This module is the casting call.
//!
//! [`InMemorySource`] replays a script: events, then a clean close, a failure, or an
//! eternal silence. [`InMemorySink`] hoards batches behind an `Arc<Mutex<...>>` so tests
//! can peek after the pipeline is done with it, and can be told to fail on the n-th write.
//!
//! ⚠️ Test-only. If you're deploying this to prod, please also deploy a therapist. 🦆

mod in_mem_sink;
mod in_mem_source;

pub(crate) use in_mem_sink::InMemorySink;
pub(crate) use in_mem_source::{InMemorySource, ScriptStep};
