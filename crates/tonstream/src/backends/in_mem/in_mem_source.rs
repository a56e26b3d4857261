use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use crate::backends::Source;
use crate::common::RawEvent;

/// 🎬 One line of the script.
#[derive(Debug, Clone)]
pub(crate) enum ScriptStep {
    Event(String),
    /// 🏁 the server hangs up politely
    Close,
    /// 💀 the server hangs up rudely
    Fail(String),
    /// 💤 the server says nothing, forever
    Hang,
}

/// 📦 A source that reads its lines off a script, then improvises nothing.
///
/// Running off the end of the script counts as a clean close.
#[derive(Debug)]
pub(crate) struct InMemorySource {
    script: VecDeque<ScriptStep>,
    /// 🔒 flipped by `close`, shared so tests can check the upstream really was cancelled
    pub(crate) cancelled: Arc<AtomicBool>,
}

impl InMemorySource {
    pub(crate) fn new(script: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            script: script.into_iter().collect(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 🎭 Shorthand: these payloads, then a clean close.
    pub(crate) fn events_then_close<'a>(payloads: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(
            payloads
                .into_iter()
                .map(|p| ScriptStep::Event(p.to_string()))
                .chain([ScriptStep::Close]),
        )
    }
}

#[async_trait]
impl Source for InMemorySource {
    async fn next_event(&mut self) -> Result<Option<RawEvent>> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Ok(None);
        }
        match self.script.pop_front() {
            Some(ScriptStep::Event(payload)) => Ok(Some(RawEvent::received_now(payload))),
            Some(ScriptStep::Close) | None => Ok(None),
            Some(ScriptStep::Fail(reason)) => Err(anyhow::anyhow!(reason)),
            Some(ScriptStep::Hang) => {
                self.script.push_front(ScriptStep::Hang);
                std::future::pending::<()>().await;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.cancelled.store(true, Ordering::SeqCst);
        self.script.clear();
        Ok(())
    }
}
