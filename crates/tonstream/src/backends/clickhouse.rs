//! 🏠 ClickHouse backend: the columnar retirement home for transaction records.
//!
//! Talks the ClickHouse HTTP interface: SQL in the query string, rows in the body,
//! one `INSERT ... FORMAT JSONEachRow` per batch. A single insert that fits in one
//! block lands atomically, which is exactly the all-or-nothing we promised.

mod clickhouse_sink;
mod json_each_row;

pub(crate) use clickhouse_sink::ClickHouseSink;
