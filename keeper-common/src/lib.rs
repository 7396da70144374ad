//! Shared plumbing for the keeper workspace.
//!
//! Everything here is deliberately small so that the archive core, the fetch
//! collaborator and the binary can all depend on it without dragging in the
//! heavier crates.
//!
//! # Overview
//!
//! - [`events`]: progress events emitted by the crawl pipeline and the sinks
//!   that receive them
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! Collecting pipeline progress through a channel:
//!
//! ```rust
//! use keeper_common::events::{ChannelSink, EventSink, ProgressEvent, Stage};
//!
//! let (sink, mut rx) = ChannelSink::new();
//! sink.emit(ProgressEvent::info(Stage::Fetch, "fetching page"));
//!
//! let event = rx.try_recv().expect("event queued");
//! assert_eq!(event.stage, Stage::Fetch);
//! assert_eq!(event.message, "fetching page");
//! ```
pub mod events;
pub mod observability;

pub use events::{EventSink, ProgressEvent, Severity, Stage};
