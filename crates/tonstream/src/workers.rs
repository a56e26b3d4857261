//! 🧵 Workers: background tasks that do the work while the Supervisor takes the credit.
//!
//! The only one on payroll right now is the SSE reader, which lives on its own task so the
//! socket never has to wait for the database. 🦆

use anyhow::Result;
use tokio::task::JoinHandle;

/// 🏗️ A background worker, that does work. duh.
///
/// `start` consumes the worker and hands back the join handle. Awaiting the handle
/// tells you how the worker's life ended: `Ok(())` for a peaceful retirement,
/// `Err(..)` for everything else.
pub(crate) trait Worker {
    fn start(self) -> JoinHandle<Result<()>>;
}
