//! 📡 Previously, on "Things That Could Go Wrong With A Socket That Never Closes"...
//!
//! The endpoint said "I'll call you." And it did. Again. And again. Every time a
//! transaction landed anywhere on the chain. This module keeps that line open.
//!
//! 🚰 reqwest Response → SseReader (own task, never blocks) → bounded channel → SseSource
//! 💀 Channel full → the event is dropped with a warning, the socket keeps breathing
//! 🦆 (mandatory, no notes)

mod sse_parser;
mod sse_reader;
mod sse_source;

pub(crate) use sse_source::SseSource;
