//! 🎧 The SseReader: the one task that actually holds the phone to its ear.
//!
//! It owns the HTTP response, slices chunks into events and tosses each event into
//! the channel with `try_send`. It never waits on the consumer: if the channel is
//! full the event is dropped, a warning goes out, and the socket keeps getting read.
//! A late read is how SSE peers decide you've died.
//!
//! How it ends is how the stream ended:
//! - body finished → `Ok(())`, a clean close
//! - body errored → `Err(..)`, a stream failure
//! - consumer hung up → `Ok(())`, nobody left to talk to

use anyhow::{Context, Result};
use async_channel::{Sender, TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::sse_parser::SseParser;
use crate::common::RawEvent;
use crate::workers::Worker;

#[derive(Debug)]
pub(crate) struct SseReader {
    response: reqwest::Response,
    tx: Sender<RawEvent>,
    parser: SseParser,
    dropped: u64,
}

impl SseReader {
    pub(crate) fn new(response: reqwest::Response, tx: Sender<RawEvent>) -> Self {
        Self {
            response,
            tx,
            parser: SseParser::default(),
            dropped: 0,
        }
    }

    async fn pump(mut self) -> Result<()> {
        loop {
            let chunk = self
                .response
                .chunk()
                .await
                .context("💀 The SSE connection broke mid-stream. The server hung up, or the network did it for them.")?;
            let Some(chunk) = chunk else {
                if self.parser.has_pending() {
                    debug!("🗑️ Stream ended inside an unfinished event; discarding the fragment");
                }
                info!(dropped = self.dropped, "🏁 SSE stream closed by the server");
                return Ok(());
            };

            for frame in self.parser.feed(&chunk) {
                trace!(event = ?frame.event, id = ?frame.id, "📨 SSE event received");
                match self.tx.try_send(RawEvent::received_now(frame.data)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        self.dropped += 1;
                        warn!(
                            dropped = self.dropped,
                            "⚠️ Event buffer is full, dropping an event so the socket can keep breathing"
                        );
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!("📴 Consumer hung up; SSE reader standing down");
                        return Ok(());
                    }
                }
            }
        }
    }
}

impl Worker for SseReader {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.pump())
    }
}
