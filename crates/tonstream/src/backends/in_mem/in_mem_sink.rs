use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use crate::backends::Sink;
use crate::common::Batch;

/// 📦 A sink that never forgets. Unless told to fail, in which case it forgets on purpose.
///
/// Clone-able because tests need to peek inside after handing a copy to the pipeline.
/// Every clone shares the same vault.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemorySink {
    /// 🔒 The evidence locker: every batch that was durably "stored".
    pub(crate) received: Arc<tokio::sync::Mutex<Vec<Batch>>>,
    /// 🔢 Every call to `write`, successful or not.
    pub(crate) write_attempts: Arc<AtomicUsize>,
    pub(crate) closed: Arc<AtomicBool>,
    /// 💀 1-based write number that should blow up, if any.
    fail_on_write: Option<usize>,
}

impl InMemorySink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_on_write(n: usize) -> Self {
        Self {
            fail_on_write: Some(n),
            ..Self::default()
        }
    }

    /// 📊 Sizes of stored batches, in write order.
    pub(crate) async fn batch_sizes(&self) -> Vec<usize> {
        self.received.lock().await.iter().map(Batch::len).collect()
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn write(&mut self, batch: Batch) -> Result<usize> {
        let attempt = self.write_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_write == Some(attempt) {
            anyhow::bail!("💀 simulated insert failure on write #{attempt}");
        }
        let rows = batch.len();
        self.received.lock().await.push(batch);
        Ok(rows)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
