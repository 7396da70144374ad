//! Structured progress events.
//!
//! The crawl pipeline never prints. It reports what it is doing to an
//! [`EventSink`] supplied by the caller, and the front end decides how (or
//! whether) to render it.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Pipeline step an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Extract,
    Assets,
    Document,
    Catalog,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Assets => "assets",
            Stage::Document => "document",
            Stage::Catalog => "catalog",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
    pub severity: Severity,
}

impl ProgressEvent {
    pub fn new(stage: Stage, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            severity,
        }
    }

    pub fn info(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Severity::Info, message)
    }

    pub fn warn(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Severity::Warn, message)
    }

    pub fn error(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Severity::Error, message)
    }
}

/// Receiver of pipeline progress.
///
/// Implementations must not block for long: the pipeline calls `emit`
/// inline between steps.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events into the `tracing` pipeline under the `keeper.progress` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        match event.severity {
            Severity::Info => {
                tracing::info!(target: "keeper.progress", stage = %event.stage, "{}", event.message)
            }
            Severity::Warn => {
                tracing::warn!(target: "keeper.progress", stage = %event.stage, "{}", event.message)
            }
            Severity::Error => {
                tracing::error!(target: "keeper.progress", stage = %event.stage, "{}", event.message)
            }
        }
    }
}

/// Queues events on an unbounded tokio channel so an interactive front end
/// can drain them from its own loop.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        // receiver gone means nobody is rendering any more
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(ProgressEvent::info(Stage::Fetch, "one"));
        sink.emit(ProgressEvent::warn(Stage::Assets, "two"));
        sink.emit(ProgressEvent::error(Stage::Catalog, "three"));

        let got: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].message, "one");
        assert_eq!(got[1].severity, Severity::Warn);
        assert_eq!(got[2].stage, Stage::Catalog);
    }

    #[test]
    fn channel_sink_ignores_closed_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(ProgressEvent::info(Stage::Done, "nobody listening"));
    }

    #[test]
    fn stage_display_is_lowercase() {
        assert_eq!(Stage::Document.to_string(), "document");
        assert_eq!(
            serde_json::to_string(&Severity::Warn).unwrap(),
            "\"warn\""
        );
    }
}
