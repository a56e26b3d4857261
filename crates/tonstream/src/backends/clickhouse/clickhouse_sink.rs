use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use reqwest::Url;
use tracing::{debug, trace};

use super::json_each_row::{self, COLUMNS};
use crate::app_config::SinkConfig;
use crate::backends::Sink;
use crate::common::Batch;

// -- 📏 ClickHouse's default max_insert_block_size. We only ever raise it, never lower it.
const DEFAULT_MAX_INSERT_BLOCK_SIZE: usize = 1_048_576;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 🏠 The sink side of the ClickHouse backend: pure I/O, one insert per batch.
///
/// Holds a pooled `reqwest::Client`. Every `write` checks a connection out of the
/// pool, sends one insert, reads the response to the last byte and lets the connection
/// go back, whatever the outcome. No retries in here. The driver owns that decision.
///
/// Credentials found in the URL userinfo are lifted into basic auth and scrubbed from
/// the URL, so the endpoint can be logged without leaking the password.
///
/// Knock knock. Who's there? INSERT. INSERT who? INSERT all of these rows or none of them.
#[derive(Debug)]
pub(crate) struct ClickHouseSink {
    client: reqwest::Client,
    endpoint: Url,
    username: Option<String>,
    password: Option<String>,
    insert_sql: String,
    request_timeout: Duration,
}

impl ClickHouseSink {
    /// 🚀 Build the client and ping the store with `SELECT 1`.
    ///
    /// An unreachable store fails here, at startup, before any subscription is opened,
    /// rather than quietly one batch into the stream.
    pub(crate) async fn connect(config: &SinkConfig) -> Result<Self> {
        let mut endpoint = Url::parse(&config.store_url)
            .context("💀 STORE_URL is not a URL. ClickHouse lives at http(s)://host:port/")?;

        let username = match endpoint.username() {
            "" => None,
            raw => Some(decode_userinfo(raw)?),
        };
        let password = endpoint.password().map(decode_userinfo).transpose()?;
        // -- 🔒 scrub userinfo; these only fail for cannot-be-a-base URLs, which Url::parse of http(s) never yields
        let _ = endpoint.set_username("");
        let _ = endpoint.set_password(None);

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("💀 The HTTP client refused to be born. The TLS stack wept.")?;

        let sink = Self {
            client,
            endpoint,
            username,
            password,
            insert_sql: format!(
                "INSERT INTO {} ({}) FORMAT JSONEachRow",
                config.store_table, COLUMNS
            ),
            request_timeout: REQUEST_TIMEOUT,
        };

        // -- 📡 "Hello? Is this thing on?" said a developer, gesturing at a cluster.
        sink.execute(sink.endpoint.clone(), "SELECT 1".to_string())
            .await
            .with_context(|| {
                format!(
                    "💀 ClickHouse at '{}' did not answer SELECT 1. Is it running? Are the credentials right?",
                    sink.endpoint
                )
            })?;
        debug!(endpoint = %sink.endpoint, "✅ ClickHouse is home and accepting visitors");
        Ok(sink)
    }

    /// 📡 POST one statement. The body is always read to the end so the connection
    /// goes back to the pool in one piece, success or not.
    async fn execute(&self, url: Url, body: String) -> Result<String> {
        let mut request = self.client.post(url).timeout(self.request_timeout).body(body);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let response = request
            .send()
            .await
            .context("💀 The request never made it to ClickHouse. Check connectivity and timeouts.")?;
        let status = response.status();
        let text = response
            .text()
            .await
            .context("💀 ClickHouse started answering and then trailed off")?;
        if !status.is_success() {
            anyhow::bail!("💀 ClickHouse answered '{}' and said: '{}'", status, text.trim());
        }
        Ok(text)
    }
}

fn decode_userinfo(raw: &str) -> Result<String> {
    Ok(percent_decode_str(raw)
        .decode_utf8()
        .context("💀 STORE_URL credentials are not valid UTF-8 once decoded")?
        .into_owned())
}

#[async_trait]
impl Sink for ClickHouseSink {
    /// 📥 One `INSERT ... FORMAT JSONEachRow` for the whole batch.
    ///
    /// `max_insert_block_size` is raised to cover the batch so it forms a single block,
    /// and a single block is inserted atomically.
    async fn write(&mut self, batch: Batch) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let rows = batch.len();
        let body = json_each_row::render(&batch)?;

        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("query", &self.insert_sql)
            .append_pair(
                "max_insert_block_size",
                &rows.max(DEFAULT_MAX_INSERT_BLOCK_SIZE).to_string(),
            );

        debug!(rows, bytes = body.len(), "📡 Sending batch to ClickHouse");
        if let Err(err) = self.execute(url, body).await {
            // -- a non-2xx answer is a rejection. A transport error (timeout, reset) leaves the
            //    insert possibly committed on the server side.
            let transport = err.chain().any(|cause| cause.is::<reqwest::Error>());
            return Err(if transport {
                err.context(format!(
                    "💀 Lost track of an insert of {rows} rows. ClickHouse may or may not have stored them."
                ))
            } else {
                err.context(format!("💀 ClickHouse rejected an insert of {rows} rows. None of them were stored."))
            });
        }
        trace!(rows, "🚀 Batch landed");
        Ok(rows)
    }

    async fn close(&mut self) -> Result<()> {
        debug!("🗑️ ClickHouse sink closing, the pool drains on drop");
        Ok(())
    }
}
