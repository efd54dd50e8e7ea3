//! Release-once ownership of a message source
//!
//! The driving loop never touches its source directly. It goes through a
//! [`SourceGuard`], which closes the source exactly once whether the loop
//! stops normally or unwinds.

use tracing::{error, warn};

use crate::events::RawMessage;
use crate::source::{MessageSource, SourceError};

/// Scoped ownership of a message source.
///
/// Invariants:
/// - The source is closed at most once, by [`SourceGuard::release`]
/// - If the guard is dropped without an explicit release (early return,
///   panic while processing a message), Drop releases it
#[derive(Debug)]
pub struct SourceGuard<S: MessageSource> {
    source: S,
    released: bool,
}

impl<S: MessageSource> SourceGuard<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            released: false,
        }
    }

    /// Poll the guarded source. Fails with [`SourceError::Closed`] after release.
    pub async fn next_message(&mut self) -> Result<Option<RawMessage>, SourceError> {
        if self.released {
            return Err(SourceError::Closed);
        }
        self.source.next_message().await
    }

    /// Close the source. Returns `false` if it was already released.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;

        if let Err(e) = self.source.close() {
            error!(error = %e, "Failed to close message source");
        }
        true
    }

    /// Whether the source has been closed.
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl<S: MessageSource> Drop for SourceGuard<S> {
    fn drop(&mut self) {
        if !self.released {
            warn!("Message source released without orderly shutdown");
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn test_release_once() {
        let source = MemorySource::new(["{}"]);
        let closes = source.close_counter();
        let mut guard = SourceGuard::new(source);
        assert!(!guard.is_released());

        assert!(guard.release());
        assert!(guard.is_released());
        assert!(!guard.release());
        drop(guard);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_drop_releases() {
        let source = MemorySource::new(["{}"]);
        let closes = source.close_counter();
        {
            let _guard = SourceGuard::new(source);
        }
        assert_eq!(closes.get(), 1);
    }

    #[tokio::test]
    async fn test_poll_after_release() {
        let mut guard = SourceGuard::new(MemorySource::new(["{}"]));
        guard.release();
        assert!(matches!(
            guard.next_message().await,
            Err(SourceError::Closed)
        ));
    }
}
