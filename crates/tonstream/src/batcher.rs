//! 🛒 The Batcher: holds records until there are exactly enough of them.
//!
//! Records go in one at a time. When the `N`-th one arrives, out pops a full
//! [`Batch`] and the buffer starts over, empty and hopeful. At the end of the
//! stream somebody decides whether the leftovers get shipped (clean close) or
//! binned (the stream died and we can't vouch for them). The Batcher doesn't
//! decide. It just holds the groceries. 🦆

use std::num::NonZeroUsize;

use crate::common::{Batch, TransactionRecord};

/// 📏 Up-front buffer reservation. Bigger batches grow the buffer as records arrive.
const PREALLOCATE_LIMIT: usize = 4096;

#[derive(Debug)]
pub(crate) struct Batcher {
    batch_size: NonZeroUsize,
    buffer: Vec<TransactionRecord>,
}

impl Batcher {
    pub(crate) fn new(batch_size: NonZeroUsize) -> Self {
        Self {
            batch_size,
            buffer: Vec::with_capacity(Self::preallocation(batch_size)),
        }
    }

    fn preallocation(batch_size: NonZeroUsize) -> usize {
        batch_size.get().min(PREALLOCATE_LIMIT)
    }

    /// 📥 Accept one record. Returns a full batch exactly when this record completes one.
    ///
    /// The buffer is swapped out before returning, so the next record lands in a clean slot
    /// and no record can ever ride in two batches.
    pub(crate) fn push(&mut self, record: TransactionRecord) -> Option<Batch> {
        self.buffer.push(record);
        if self.buffer.len() < self.batch_size.get() {
            return None;
        }
        let full = std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(Self::preallocation(self.batch_size)),
        );
        Some(Batch::new(full))
    }

    /// 🏁 Clean close: whatever is left goes out as a final, smaller batch.
    pub(crate) fn finish(&mut self) -> Option<Batch> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(Batch::new(std::mem::take(&mut self.buffer)))
    }

    /// 🗑️ Abnormal termination: drop the leftovers and report how many there were.
    pub(crate) fn discard(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.buffer.len()
    }
}
