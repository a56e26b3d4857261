//! 🔍 SSE framing: bytes in, events out.
//!
//! The wire format, as much of it as we care about:
//! - lines end in `\n` or `\r\n`
//! - `data:` lines accumulate, joined with `\n`
//! - `event:` and `id:` tag the current event
//! - lines starting with `:` are comments (keepalives, mostly). Ignored.
//! - a blank line dispatches the event, if it carried any data at all
//!
//! Chunks from the network split wherever they please, mid-line included, so the
//! parser keeps the unfinished tail around until the next chunk shows up.

use std::borrow::Cow;

use memchr::memchr;
use tracing::warn;

use crate::decoders::truncate_payload;

/// 📨 One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
pub(crate) struct SseParser {
    /// 🧵 bytes of a line that hasn't met its `\n` yet
    partial_line: Vec<u8>,
    data: String,
    has_data: bool,
    /// 🧨 a `data:` line of this event was not valid UTF-8
    corrupt: bool,
    event: Option<String>,
    /// 🏷️ sticky across events, the way the protocol says
    last_event_id: Option<String>,
}

impl SseParser {
    /// 🍽️ Feed one network chunk, get back every event it completed.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        let mut rest = chunk;
        while let Some(newline) = memchr(b'\n', rest) {
            self.partial_line.extend_from_slice(&rest[..newline]);
            rest = &rest[newline + 1..];
            let line = std::mem::take(&mut self.partial_line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        self.partial_line.extend_from_slice(rest);
        frames
    }

    /// 🤔 Is there an undispatched event or half a line lying around?
    pub(crate) fn has_pending(&self) -> bool {
        self.has_data || !self.partial_line.is_empty()
    }

    fn process_line(&mut self, line: &[u8]) -> Option<SseFrame> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            return self.dispatch();
        }
        if line[0] == b':' {
            return None;
        }

        let (field, value) = match memchr(b':', line) {
            Some(colon) => {
                let value = &line[colon + 1..];
                (&line[..colon], value.strip_prefix(b" ").unwrap_or(value))
            }
            None => (line, &b""[..]),
        };
        let value = String::from_utf8_lossy(value);

        match field {
            b"data" => {
                if matches!(value, Cow::Owned(_)) {
                    self.corrupt = true;
                }
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(&value);
                self.has_data = true;
            }
            b"event" => self.event = Some(value.into_owned()),
            // -- an id containing NUL is ignored outright
            b"id" if !value.contains('\0') => self.last_event_id = Some(value.into_owned()),
            // -- retry hints only matter to clients that reconnect on their own. we don't.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        if std::mem::take(&mut self.corrupt) {
            warn!(
                data = %truncate_payload(&self.data),
                "⚠️ Dropping an SSE event whose data was not valid UTF-8; the ids in it can't be trusted"
            );
            self.data.clear();
            return None;
        }
        Some(SseFrame {
            event,
            id: self.last_event_id.clone(),
            data: std::mem::take(&mut self.data),
        })
    }
}
