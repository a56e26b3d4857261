//! 🔄 Decoders: turning server gossip into typed records 🎭
//!
//! 🎬 COLD OPEN. INT. CUSTOMS DESK, 2:47 AM
//!
//! A payload arrives. It claims to be JSON. Customs checks its papers:
//! `account_id`? Present. `lt`? A proper unsigned integer. `tx_hash`? Stamped.
//! Welcome to the pipeline. Anything else gets turned away at the desk with a
//! [`DecodeFailure`], a log line, and no hard feelings. The queue keeps moving.
//!
//! Unknown fields are ignored. Whitespace is nobody's business. A `null` is treated
//! the same as the field not showing up at all. 🦆

use serde_json::{Map, Value};
use thiserror::Error;

use crate::common::{RawEvent, TransactionRecord};

pub(crate) const ACCOUNT_ID: &str = "account_id";
pub(crate) const LOGICAL_TIME: &str = "lt";
pub(crate) const TX_HASH: &str = "tx_hash";

/// ✂️ How much of a bad payload makes it into the log line.
const PAYLOAD_LOG_LIMIT: usize = 256;

/// 🚫 Why a payload didn't make it past customs. Recoverable, per-event, never fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub(crate) enum DecodeFailure {
    #[error("payload is not well-formed JSON: {0}")]
    MalformedJson(String),
    #[error("payload is JSON but not an object")]
    NotAnObject,
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),
    #[error("required field `{field}` has the wrong type, expected {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

/// 🔄 Decode one raw event. The record is stamped with the event's local receipt time.
///
/// All three fields or nothing. A half-decoded record is not a record, it's a liability.
pub(crate) fn decode(raw: &RawEvent) -> Result<TransactionRecord, DecodeFailure> {
    let value: Value = serde_json::from_str(&raw.payload)
        .map_err(|e| DecodeFailure::MalformedJson(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(DecodeFailure::NotAnObject);
    };

    let account_id = required_string(&fields, ACCOUNT_ID)?;
    let logical_time = match present(&fields, LOGICAL_TIME)? {
        Value::Number(n) => n.as_u64().ok_or(DecodeFailure::WrongType {
            field: LOGICAL_TIME,
            expected: "an unsigned 64-bit integer",
        })?,
        _ => {
            return Err(DecodeFailure::WrongType {
                field: LOGICAL_TIME,
                expected: "an unsigned 64-bit integer",
            });
        }
    };
    let tx_hash = required_string(&fields, TX_HASH)?;

    Ok(TransactionRecord {
        observed_at: raw.received_at,
        account_id,
        logical_time,
        tx_hash,
    })
}

// -- 🔍 "present" means the key exists AND isn't null. null is just absence wearing a hat.
fn present<'a>(fields: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, DecodeFailure> {
    match fields.get(field) {
        None | Some(Value::Null) => Err(DecodeFailure::MissingField(field)),
        Some(value) => Ok(value),
    }
}

fn required_string(fields: &Map<String, Value>, field: &'static str) -> Result<String, DecodeFailure> {
    match present(fields, field)? {
        Value::String(s) => Ok(s.clone()),
        _ => Err(DecodeFailure::WrongType {
            field,
            expected: "a string",
        }),
    }
}

/// ✂️ Trim a payload for logging without slicing a UTF-8 character in half.
pub(crate) fn truncate_payload(payload: &str) -> String {
    if payload.len() <= PAYLOAD_LOG_LIMIT {
        return payload.to_string();
    }
    let mut cut = PAYLOAD_LOG_LIMIT;
    while !payload.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}… ({} bytes total)", &payload[..cut], payload.len())
}
