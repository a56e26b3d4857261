use std::num::NonZeroUsize;
use std::time::Duration;

use anyhow::{Context, Result};
use async_channel::Receiver;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::sse_reader::SseReader;
use crate::app_config::SourceConfig;
use crate::backends::Source;
use crate::common::RawEvent;
use crate::workers::Worker;

/// 📡 The consumer's end of the SSE subscription.
///
/// `connect` dials the endpoint and hands the response to an [`SseReader`] on its own
/// task. From then on this struct is just a channel receiver plus the reader's join
/// handle, which is where we learn whether the stream closed or crashed.
///
/// Dropping it aborts the reader, which drops the response, which closes the socket.
#[derive(Debug)]
pub(crate) struct SseSource {
    rx: Receiver<RawEvent>,
    reader: Option<JoinHandle<Result<()>>>,
}

impl SseSource {
    /// 🚀 Open the subscription. Non-2xx is a hard no, with the status and body to prove it.
    ///
    /// No read timeout: the stream is allowed to sit quietly between pushes for as
    /// long as the chain is quiet. Only the TCP/TLS handshake is on a clock.
    pub(crate) async fn connect(config: &SourceConfig, channel_capacity: NonZeroUsize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("💀 The HTTP client refused to be born. Probably TLS. It's always TLS.")?;

        let response = client
            .get(&config.stream_url)
            .bearer_auth(&config.stream_token)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .with_context(|| {
                format!(
                    "💀 Could not reach the SSE endpoint at '{}'. Check DNS, firewall, and whether it exists.",
                    config.stream_url
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(512).collect();
            anyhow::bail!(
                "💀 The SSE endpoint answered '{}' instead of opening a stream. It said: '{}'",
                status,
                excerpt
            );
        }

        info!(url = %config.stream_url, "📡 Connected to SSE stream");
        let (tx, rx) = async_channel::bounded(channel_capacity.get());
        let reader = SseReader::new(response, tx).start();
        Ok(Self {
            rx,
            reader: Some(reader),
        })
    }
}

#[async_trait]
impl Source for SseSource {
    async fn next_event(&mut self) -> Result<Option<RawEvent>> {
        if let Ok(event) = self.rx.recv().await {
            return Ok(Some(event));
        }
        // -- channel drained and closed: the reader is done, ask it how it went
        let Some(reader) = self.reader.take() else {
            return Ok(None);
        };
        reader
            .await
            .context("💀 The SSE reader task panicked or was cancelled")?
            .context("💀 The SSE stream failed")?;
        Ok(None)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(reader) = self.reader.take() {
            debug!("🔌 Cancelling the SSE subscription");
            reader.abort();
        }
        self.rx.close();
        let mut discarded = 0usize;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(discarded, "🗑️ Discarding raw events still queued after cancel");
        }
        Ok(())
    }
}

impl Drop for SseSource {
    fn drop(&mut self) {
        if let Some(reader) = &self.reader {
            reader.abort();
        }
    }
}
