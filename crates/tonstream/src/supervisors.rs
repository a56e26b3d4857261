//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where transactions never stop..."
//! 🎬 "One supervisor dared to batch them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor: part middle manager, part helicopter parent. It owns the run
//! loop: pull an event, decode it, batch it, and when a batch is full, write it and
//! wait. Exactly one write in flight, ever. The network reader runs on its own task
//! and never waits for us, so the only one doing any waiting in here is the Supervisor.
//!
//! ```text
//! Connecting ─▶ Streaming ─▶ Draining ─▶ Terminated     (clean close / shutdown)
//!                   │
//!                   └──────▶ Failed ───▶ Terminated     (stream or write failure)
//! ```

use std::future::Future;
use std::num::NonZeroUsize;

use tracing::{debug, info, warn};

use crate::app_config::AppConfig;
use crate::backends::{ClickHouseSink, Sink, Source, SseSource};
use crate::batcher::Batcher;
use crate::common::Batch;
use crate::decoders::{decode, truncate_payload};
use crate::error::PipelineError;

/// 🚦 Where the pipeline is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PipelineState {
    Connecting,
    Streaming,
    Draining,
    Failed,
    Terminated,
}

/// 📊 What a run did, for the summary at the end.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub events_received: u64,
    pub decode_failures: u64,
    pub records_written: u64,
    pub batches_written: u64,
}

/// 🚀 Connect both ends and drive the pipeline until the stream ends, fails, or `shutdown` fires.
///
/// The store is dialed first: if it's unreachable there is no point subscribing to anything.
pub(crate) async fn run(
    app_config: AppConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<RunReport, PipelineError> {
    info!(state = ?PipelineState::Connecting, "🔄 pipeline state");
    let sink = ClickHouseSink::connect(&app_config.sink_config)
        .await
        .map_err(PipelineError::Connect)?;
    let source = SseSource::connect(&app_config.source_config, app_config.runtime.channel_capacity)
        .await
        .map_err(PipelineError::Connect)?;

    let mut supervisor = Supervisor::new(source, sink, app_config.runtime.batch_size);
    supervisor.run(shutdown).await
}

/// 🧵 One source, one sink, one batcher, and a state machine to keep them honest.
#[derive(Debug)]
pub(crate) struct Supervisor<S, K> {
    source: S,
    sink: K,
    batcher: Batcher,
    state: PipelineState,
    report: RunReport,
}

impl<S: Source, K: Sink> Supervisor<S, K> {
    pub(crate) fn new(source: S, sink: K, batch_size: NonZeroUsize) -> Self {
        Self {
            source,
            sink,
            batcher: Batcher::new(batch_size),
            state: PipelineState::Connecting,
            report: RunReport::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        info!(from = ?self.state, to = ?next, "🔄 pipeline state");
        self.state = next;
    }

    /// 🏃 Drive to completion. `Ok` only for a clean close or an operator shutdown.
    pub(crate) async fn run(
        &mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<RunReport, PipelineError> {
        self.transition(PipelineState::Streaming);
        match self.stream(shutdown).await {
            Ok(()) => {
                self.transition(PipelineState::Draining);
                let drained = self.drain().await;
                self.release().await;
                self.transition(PipelineState::Terminated);
                drained.map(|()| self.report.clone())
            }
            Err(err) => {
                self.fail(&err);
                self.release().await;
                self.transition(PipelineState::Terminated);
                Err(err)
            }
        }
    }

    async fn stream(&mut self, shutdown: impl Future<Output = ()>) -> Result<(), PipelineError> {
        tokio::pin!(shutdown);
        loop {
            let next = tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("🛑 Shutdown requested, wrapping up");
                    return Ok(());
                }
                next = self.source.next_event() => next,
            };

            let Some(raw) = next.map_err(PipelineError::Stream)? else {
                info!("🏁 Upstream closed the stream cleanly");
                return Ok(());
            };
            self.report.events_received += 1;

            let record = match decode(&raw) {
                Ok(record) => record,
                Err(failure) => {
                    self.report.decode_failures += 1;
                    warn!(
                        payload = %truncate_payload(&raw.payload),
                        "⚠️ Skipping an event that would not decode: {failure}"
                    );
                    continue;
                }
            };

            if let Some(batch) = self.batcher.push(record) {
                self.write(batch).await?;
            }
        }
    }

    /// 📥 The one and only write in flight. Awaited before the next event is even looked at.
    async fn write(&mut self, batch: Batch) -> Result<(), PipelineError> {
        let batch_size = batch.len();
        let written = self
            .sink
            .write(batch)
            .await
            .map_err(|cause| PipelineError::Write { batch_size, cause })?;
        self.report.records_written += written as u64;
        self.report.batches_written += 1;
        debug!(written, batches = self.report.batches_written, "✅ Batch persisted");
        Ok(())
    }

    /// 🏁 Clean ending: the leftovers are complete records, so they ship as a final batch.
    async fn drain(&mut self) -> Result<(), PipelineError> {
        if let Some(batch) = self.batcher.finish() {
            info!(records = batch.len(), "📦 Flushing the final partial batch");
            if let Err(err) = self.write(batch).await {
                self.fail(&err);
                return Err(err);
            }
        }
        Ok(())
    }

    fn fail(&mut self, err: &PipelineError) {
        self.transition(PipelineState::Failed);
        let discarded = self.batcher.discard();
        if discarded > 0 {
            warn!(
                discarded,
                stage = err.stage(),
                "🗑️ Discarding buffered records; the run ended abnormally and they won't be written"
            );
        }
    }

    /// 🔌 Cancel upstream, release the sink. Runs on every exit path. Errors here are only logged,
    /// the run's outcome is already decided.
    async fn release(&mut self) {
        if let Err(err) = self.source.close().await {
            warn!("⚠️ Trouble cancelling the upstream subscription: {err:#}");
        }
        if let Err(err) = self.sink.close().await {
            warn!("⚠️ Trouble closing the sink: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use crate::backends::in_mem::{InMemorySink, InMemorySource, ScriptStep};

    fn n(size: usize) -> NonZeroUsize {
        NonZeroUsize::new(size).expect("💀 positive batch size")
    }

    fn tx(account: &str, lt: u64, hash: &str) -> String {
        format!(r#"{{"account_id":"{account}","lt":{lt},"tx_hash":"{hash}"}}"#)
    }

    fn never() -> std::future::Pending<()> {
        std::future::pending()
    }

    #[tokio::test]
    async fn the_one_where_three_events_make_two_writes() -> Result<(), PipelineError> {
        let events = [tx("a", 1, "h1"), tx("b", 2, "h2"), tx("c", 3, "h3")];
        let source = InMemorySource::events_then_close(events.iter().map(String::as_str));
        let sink = InMemorySink::new();

        let mut supervisor = Supervisor::new(source, sink.clone(), n(2));
        let report = supervisor.run(never()).await?;

        let received = sink.received.lock().await;
        let as_tuples: Vec<Vec<(String, u64, String)>> = received
            .iter()
            .map(|b| {
                b.records
                    .iter()
                    .map(|r| (r.account_id.clone(), r.logical_time, r.tx_hash.clone()))
                    .collect()
            })
            .collect();
        let expected: Vec<Vec<(String, u64, String)>> = vec![
            vec![("a".into(), 1, "h1".into()), ("b".into(), 2, "h2".into())],
            vec![("c".into(), 3, "h3".into())],
        ];
        assert_eq!(as_tuples, expected);
        assert_eq!(report.records_written, 3);
        assert_eq!(report.batches_written, 2);
        assert_eq!(supervisor.state(), PipelineState::Terminated);
        assert!(sink.closed.load(Ordering::SeqCst), "sink released on the way out");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_garbage_in_the_middle_is_stepped_over() -> Result<(), PipelineError> {
        let events = [tx("a", 1, "h1"), "{not json".to_string(), tx("b", 2, "h2")];
        let source = InMemorySource::events_then_close(events.iter().map(String::as_str));
        let sink = InMemorySink::new();

        let report = Supervisor::new(source, sink.clone(), n(2)).run(never()).await?;

        assert_eq!(report.decode_failures, 1);
        assert_eq!(sink.batch_sizes().await, vec![2], "the two valid records share one batch");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_k_batches_and_a_remainder_arrive_in_order() -> Result<(), PipelineError> {
        // -- 🧪 3*4 + 2 valid events, sprinkled with 3 duds
        let mut events = Vec::new();
        for i in 0..14u64 {
            events.push(tx(&format!("acct{i}"), i, &format!("h{i}")));
            if i % 5 == 0 {
                events.push(r#"{"account_id":"x","tx_hash":"no-lt"}"#.to_string());
            }
        }
        let source = InMemorySource::events_then_close(events.iter().map(String::as_str));
        let sink = InMemorySink::new();

        let report = Supervisor::new(source, sink.clone(), n(4)).run(never()).await?;

        assert_eq!(sink.batch_sizes().await, vec![4, 4, 4, 2]);
        assert_eq!(report.events_received, events.len() as u64);
        assert_eq!(report.records_written, report.events_received - report.decode_failures);
        let lts: Vec<u64> = sink
            .received
            .lock()
            .await
            .iter()
            .flat_map(|b| b.records.iter().map(|r| r.logical_time))
            .collect();
        assert_eq!(lts, (0..14).collect::<Vec<_>>(), "strict arrival order, no duplicates");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_batch_two_of_three_hits_the_wall() {
        let events: Vec<String> = (0..6u64).map(|i| tx("a", i, &format!("h{i}"))).collect();
        let source = InMemorySource::events_then_close(events.iter().map(String::as_str));
        let cancelled = source.cancelled.clone();
        let sink = InMemorySink::failing_on_write(2);

        let mut supervisor = Supervisor::new(source, sink.clone(), n(2));
        let err = supervisor.run(never()).await.expect_err("💀 write #2 fails the run");

        assert!(matches!(err, PipelineError::Write { batch_size: 2, .. }), "{err}");
        assert_ne!(err.exit_code(), 0);
        assert_eq!(sink.write_attempts.load(Ordering::SeqCst), 2, "batch 3 is never attempted");
        assert_eq!(sink.batch_sizes().await, vec![2], "batch 1 stays durable");
        assert!(cancelled.load(Ordering::SeqCst), "upstream is cancelled on failure");
        assert_eq!(supervisor.state(), PipelineState::Terminated);
    }

    #[tokio::test]
    async fn the_one_where_the_stream_dies_with_groceries_in_the_cart() {
        let source = InMemorySource::new([
            ScriptStep::Event(tx("a", 1, "h1")),
            ScriptStep::Event(tx("b", 2, "h2")),
            ScriptStep::Fail("connection reset by peer".to_string()),
            ScriptStep::Event(tx("c", 3, "h3")),
        ]);
        let sink = InMemorySink::new();

        let mut supervisor = Supervisor::new(source, sink.clone(), n(5));
        let err = supervisor.run(never()).await.expect_err("💀 stream failure is fatal");

        assert!(matches!(err, PipelineError::Stream(_)));
        assert!(err.to_string().contains("connection reset by peer"));
        assert_eq!(sink.write_attempts.load(Ordering::SeqCst), 0, "partial buffer discarded, not flushed");
        assert!(sink.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn the_one_where_the_operator_pulls_the_plug() -> Result<(), PipelineError> {
        let source = InMemorySource::new([
            ScriptStep::Event(tx("a", 1, "h1")),
            ScriptStep::Event(tx("b", 2, "h2")),
            ScriptStep::Event(tx("c", 3, "h3")),
            ScriptStep::Hang,
        ]);
        let cancelled = source.cancelled.clone();
        let sink = InMemorySink::new();

        let report = Supervisor::new(source, sink.clone(), n(5))
            .run(tokio::time::sleep(Duration::from_millis(50)))
            .await?;

        assert_eq!(report.records_written, 3, "decoded records are flushed on shutdown");
        assert_eq!(sink.batch_sizes().await, vec![3]);
        assert!(cancelled.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_final_flush_fails() {
        let source = InMemorySource::events_then_close([tx("a", 1, "h1")].iter().map(String::as_str));
        let sink = InMemorySink::failing_on_write(1);

        let mut supervisor = Supervisor::new(source, sink.clone(), n(2));
        let err = supervisor.run(never()).await.expect_err("💀 a failed flush is still a failed write");

        assert!(matches!(err, PipelineError::Write { batch_size: 1, .. }));
        assert!(sink.closed.load(Ordering::SeqCst));
        assert_eq!(supervisor.state(), PipelineState::Terminated);
    }
}
