//! Streaming Tally Service
//!
//! Consumes JSON messages from a subscribed topic and maintains a running
//! in-memory tally, refreshing a presenter after every message:
//! - Exclamation tally: messages with and without a `!` marker
//! - Unique-reader tally: distinct readers per `(author, title)` book
//!
//! The tally is best-effort and in-memory; it resets on restart.
//!
//! # Architecture
//!
//! ```text
//!   MessageSource
//!        │  RawMessage { offset, payload }
//!    ┌───▼────┐
//!    │Decoder │  ← JSON → typed record, rejects malformed input
//!    └───┬────┘
//!        │
//!   ┌────▼──────┐
//!   │Aggregator │  ← exclamation tally | unique-reader tally
//!   └────┬──────┘
//!        │  snapshot
//!   ┌────▼──────┐
//!   │Presenter  │  ← text bar chart | structured log line
//!   └───────────┘
//! ```
//!
//! [`consumer::TallyConsumer`] drives the whole pipeline on a single task
//! and owns the source handle, the tally and the presenter.

pub mod config;
pub mod consumer;
pub mod decoder;
pub mod events;
pub mod guard;
pub mod logging;
pub mod presenter;
pub mod source;
pub mod tally;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
