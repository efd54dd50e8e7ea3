//! Message sources
//!
//! A [`MessageSource`] yields raw payloads from a subscribed topic in order.
//! The transport itself lives outside this crate; the sources here cover
//! newline-delimited input ([`LineSource`]) and in-memory fixtures
//! ([`MemorySource`]).

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

use crate::events::RawMessage;

/// Errors surfaced by a message source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("source already closed")]
    Closed,
}

/// Ordered stream of raw payloads.
#[async_trait]
pub trait MessageSource: Send {
    /// Wait for the next payload.
    ///
    /// Returns `Ok(None)` once the stream has ended. An `Err` is treated as
    /// unrecoverable by the consumer loop.
    async fn next_message(&mut self) -> Result<Option<RawMessage>, SourceError>;

    /// Release the underlying handle.
    fn close(&mut self) -> Result<(), SourceError>;
}

/// Newline-delimited payloads from an async reader.
///
/// Each non-blank line is one message. Offsets start at 0 and increase by
/// one per message.
pub struct LineSource<R> {
    lines: Option<Lines<R>>,
    next_offset: u64,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Some(reader.lines()),
            next_offset: 0,
        }
    }

    /// Offset the next message will carry.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }
}

impl LineSource<BufReader<File>> {
    /// Open an NDJSON file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = File::open(path.as_ref()).await?;
        debug!(path = %path.as_ref().display(), "Opened line source");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl LineSource<BufReader<Stdin>> {
    /// Read payloads from standard input.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> MessageSource for LineSource<R> {
    async fn next_message(&mut self) -> Result<Option<RawMessage>, SourceError> {
        let lines = self.lines.as_mut().ok_or(SourceError::Closed)?;

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let offset = self.next_offset;
            self.next_offset += 1;
            return Ok(Some(RawMessage::new(offset, line)));
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<(), SourceError> {
        if self.lines.take().is_none() {
            return Err(SourceError::Closed);
        }
        Ok(())
    }
}

/// Shared count of `close()` calls on a [`MemorySource`].
#[derive(Debug, Clone, Default)]
pub struct CloseCounter(Arc<AtomicUsize>);

impl CloseCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

enum Entry {
    Payload(String),
    Failure(String),
}

/// In-memory source for tests and demos.
pub struct MemorySource {
    entries: VecDeque<Entry>,
    next_offset: u64,
    hold_open: bool,
    closes: CloseCounter,
}

impl MemorySource {
    pub fn new<I, P>(payloads: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            entries: payloads
                .into_iter()
                .map(|p| Entry::Payload(p.into()))
                .collect(),
            next_offset: 0,
            hold_open: false,
            closes: CloseCounter::default(),
        }
    }

    /// Queue another payload.
    pub fn push(&mut self, payload: impl Into<String>) {
        self.entries.push_back(Entry::Payload(payload.into()));
    }

    /// Queue a transport failure at the current end of the queue.
    pub fn push_failure(&mut self, reason: impl Into<String>) {
        self.entries.push_back(Entry::Failure(reason.into()));
    }

    /// Block forever once the queue is drained instead of ending the stream.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Handle observing how many times the source was closed.
    pub fn close_counter(&self) -> CloseCounter {
        self.closes.clone()
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn next_message(&mut self) -> Result<Option<RawMessage>, SourceError> {
        match self.entries.pop_front() {
            Some(Entry::Payload(payload)) => {
                let offset = self.next_offset;
                self.next_offset += 1;
                Ok(Some(RawMessage::new(offset, payload)))
            }
            Some(Entry::Failure(reason)) => Err(SourceError::Transport(reason)),
            None if self.hold_open => std::future::pending().await,
            None => Ok(None),
        }
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.closes.increment();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_line_source_assigns_offsets() {
        let input: &[u8] = b"{\"message\":\"a\"}\n\n   \n{\"message\":\"b\"}\n";
        let mut source = LineSource::new(input);

        let first = source.next_message().await.unwrap().unwrap();
        let second = source.next_message().await.unwrap().unwrap();
        assert_eq!(first, RawMessage::new(0, "{\"message\":\"a\"}"));
        assert_eq!(second.offset, 1);
        assert!(source.next_message().await.unwrap().is_none());
        assert_eq!(source.next_offset(), 2);
    }

    #[tokio::test]
    async fn test_line_source_closed() {
        let input: &[u8] = b"one\n";
        let mut source = LineSource::new(input);
        source.close().unwrap();

        assert!(matches!(
            source.next_message().await,
            Err(SourceError::Closed)
        ));
        assert!(matches!(source.close(), Err(SourceError::Closed)));
    }

    #[tokio::test]
    async fn test_line_source_missing_file() {
        let result = LineSource::open("/nonexistent/stream-tally/input.ndjson").await;
        assert!(matches!(result, Err(SourceError::Io(_))));
    }

    #[tokio::test]
    async fn test_memory_source_failure() {
        let mut source = MemorySource::new(["a"]);
        source.push_failure("broker unreachable");
        source.push("b");

        assert_eq!(source.next_message().await.unwrap().unwrap().offset, 0);
        match source.next_message().await {
            Err(SourceError::Transport(reason)) => assert_eq!(reason, "broker unreachable"),
            other => panic!("Expected Transport error, got {:?}", other),
        }
        assert_eq!(source.next_message().await.unwrap().unwrap().offset, 1);
        assert!(source.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_source_counts_closes() {
        let mut source = MemorySource::new(Vec::<String>::new());
        let closes = source.close_counter();
        source.close().unwrap();
        assert_eq!(closes.get(), 1);
    }
}
