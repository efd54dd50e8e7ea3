//! Message and record definitions for the Streaming Tally Service
//!
//! A [`RawMessage`] is what the source hands over: an offset and an opaque
//! text payload. Decoding turns the payload into one of the typed records
//! below. Every record field is optional on the wire and falls back to a
//! documented default when absent; unknown fields are ignored.

use serde::Deserialize;

/// A raw payload as yielded by a message source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Position assigned by the source, monotonically increasing.
    pub offset: u64,
    /// Undecoded message text.
    pub payload: String,
}

impl RawMessage {
    pub fn new(offset: u64, payload: impl Into<String>) -> Self {
        Self {
            offset,
            payload: payload.into(),
        }
    }
}

pub const DEFAULT_CATEGORY: &str = "unknown";
pub const DEFAULT_AUTHOR: &str = "Unknown Author";
pub const DEFAULT_TITLE: &str = "Unknown Title";
pub const DEFAULT_READER: &str = "Unknown Reader";

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_author() -> String {
    DEFAULT_AUTHOR.to_string()
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_reader() -> String {
    DEFAULT_READER.to_string()
}

/// A chat-style message consumed by the exclamation tally.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuzzMessage {
    /// Message category. Read but not used to partition the tally.
    #[serde(default = "default_category")]
    pub category: String,
    /// Message body.
    #[serde(default)]
    pub message: String,
}

impl Default for BuzzMessage {
    fn default() -> Self {
        Self {
            category: default_category(),
            message: String::new(),
        }
    }
}

/// A "reader opened a book" event consumed by the unique-reader tally.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadingEvent {
    /// Book author; with `title`, identifies the book.
    #[serde(default = "default_author")]
    pub author: String,
    /// Book title.
    #[serde(default = "default_title")]
    pub title: String,
    /// Reader identity counted once per book.
    #[serde(default = "default_reader")]
    pub reader: String,
}

impl Default for ReadingEvent {
    fn default() -> Self {
        Self {
            author: default_author(),
            title: default_title(),
            reader: default_reader(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buzz_message_defaults() {
        let msg: BuzzMessage = serde_json::from_str("{}").unwrap();
        assert_eq!(msg, BuzzMessage::default());
        assert_eq!(msg.category, "unknown");
        assert_eq!(msg.message, "");
    }

    #[test]
    fn test_buzz_message_ignores_unknown_fields() {
        let msg: BuzzMessage =
            serde_json::from_str(r#"{"message":"Hi!","author":"Ann","timestamp":"2024-01-01"}"#)
                .unwrap();
        assert_eq!(msg.message, "Hi!");
        assert_eq!(msg.category, DEFAULT_CATEGORY);
    }

    #[test]
    fn test_reading_event_partial_defaults() {
        let event: ReadingEvent = serde_json::from_str(r#"{"title":"Dune"}"#).unwrap();
        assert_eq!(event.author, DEFAULT_AUTHOR);
        assert_eq!(event.title, "Dune");
        assert_eq!(event.reader, DEFAULT_READER);
    }

    #[test]
    fn test_reading_event_rejects_non_string_field() {
        let result = serde_json::from_str::<ReadingEvent>(r#"{"reader":42}"#);
        assert!(result.is_err());
    }
}
