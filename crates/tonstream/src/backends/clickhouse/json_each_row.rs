//! 📦 `JSONEachRow` rendering: one JSON object per line, trailing newline included.
//!
//! ClickHouse reads this the way Elasticsearch reads NDJSON: every line lonely,
//! no brackets to hold them, no commas to connect them. Just newlines. And rows.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::common::{Batch, TransactionRecord};

/// 🗂️ Column order for the insert. Must match the keys `Row` serializes.
pub(crate) const COLUMNS: &str = "observed_at, account_id, lt, tx_hash";

// -- ⏱️ DateTime64(3)-friendly, parsed by ClickHouse with default input settings
const OBSERVED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Serialize)]
struct Row<'a> {
    observed_at: String,
    account_id: &'a str,
    lt: u64,
    tx_hash: &'a str,
}

impl<'a> From<&'a TransactionRecord> for Row<'a> {
    fn from(record: &'a TransactionRecord) -> Self {
        Row {
            observed_at: record.observed_at.format(OBSERVED_AT_FORMAT).to_string(),
            account_id: &record.account_id,
            lt: record.logical_time,
            tx_hash: &record.tx_hash,
        }
    }
}

/// 🎼 Render a whole batch as the insert body.
pub(crate) fn render(batch: &Batch) -> Result<String> {
    let mut body = String::with_capacity(batch.len() * 160);
    for record in &batch.records {
        let line = serde_json::to_string(&Row::from(record))
            .context("💀 A record refused to become JSON. serde is as surprised as you are.")?;
        body.push_str(&line);
        body.push('\n');
    }
    Ok(body)
}
