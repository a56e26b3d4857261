//! 💀 The ways a run can end badly, sorted by which stage pulled the fire alarm.
//!
//! Inside the crate everything is `anyhow` with plenty of `.context(..)`. At the
//! edge we wrap the chain in a [`PipelineError`] so the binary knows which stage
//! died and which exit code to hand the process supervisor. Decode failures are
//! not in here on purpose: they are per-event, logged, and forgotten. 🦆

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// 🔧 Missing or malformed env. Nothing was dialed.
    #[error("💀 configuration stage failed: {0:#}")]
    Configuration(anyhow::Error),

    /// 🔌 Store or stream unreachable at startup.
    #[error("💀 connect stage failed: {0:#}")]
    Connect(anyhow::Error),

    /// 📡 The upstream SSE connection dropped or errored mid-run.
    #[error("💀 stream stage failed: {0:#}")]
    Stream(anyhow::Error),

    /// 🗑️ A bulk insert failed. The cause says whether ClickHouse rejected it or the outcome is unknown.
    #[error("💀 write stage failed for a batch of {batch_size} records: {cause:#}")]
    Write {
        batch_size: usize,
        cause: anyhow::Error,
    },
}

impl PipelineError {
    /// 🏷️ Short stage name, for log fields and humans skimming at 3am.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "configuration",
            PipelineError::Connect(_) => "connect",
            PipelineError::Stream(_) => "stream",
            PipelineError::Write { .. } => "write",
        }
    }

    /// 🚪 Distinct nonzero exit codes so an external supervisor can tell failures apart.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Configuration(_) => 2,
            PipelineError::Connect(_) => 3,
            PipelineError::Stream(_) => 4,
            PipelineError::Write { .. } => 5,
        }
    }

    /// 🧅 The underlying anyhow chain, for callers who want to peel the onion.
    pub fn cause(&self) -> &anyhow::Error {
        match self {
            PipelineError::Configuration(cause)
            | PipelineError::Connect(cause)
            | PipelineError::Stream(cause)
            | PipelineError::Write { cause, .. } => cause,
        }
    }
}
