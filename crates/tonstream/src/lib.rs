//! 📡 tonstream: SSE transaction feed in, ClickHouse rows out.
//!
//! ```text
//! SseReader ──try_send──▶ [bounded channel] ──▶ Supervisor: decode → batch → write ──▶ ClickHouse
//! (own task, never waits)                       (one write in flight, always)
//! ```

pub mod app_config;
mod backends;
mod batcher;
mod common;
mod decoders;
pub mod error;
mod supervisors;
mod workers;

use std::future::Future;

pub use app_config::AppConfig;
pub use error::PipelineError;
pub use supervisors::RunReport;

/// 🚀 Connect to the store and the stream, then ingest until the stream closes,
/// fails, or `shutdown` resolves.
///
/// There is no reconnect loop in here. A failed run returns a [`PipelineError`] naming
/// the stage that broke, and restarting is the job of whatever supervises the process.
pub async fn run(
    app_config: AppConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<RunReport, PipelineError> {
    supervisors::run(app_config, shutdown).await
}
