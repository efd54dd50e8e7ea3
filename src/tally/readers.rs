//! Unique-reader tally
//!
//! Tracks, per `(author, title)` book, the set of distinct readers seen.
//! Adding a reader that is already in the set is a no-op, so replays of the
//! same event under at-least-once delivery do not inflate the counts.
//!
//! Backed by `BTreeMap`/`BTreeSet` so snapshots come out in a stable order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::ReadingEvent;
use crate::presenter::{Bar, ChartData};
use crate::tally::Aggregator;

/// Composite key identifying a book.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BookKey {
    pub author: String,
    pub title: String,
}

impl BookKey {
    pub fn new(author: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            title: title.into(),
        }
    }

    /// Human-readable label for charts.
    pub fn label(&self) -> String {
        format!("{} by {}", self.title, self.author)
    }
}

/// Unique-reader count for one book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookCount {
    pub author: String,
    pub title: String,
    pub unique_readers: usize,
}

/// Snapshot of the unique-reader tally, ordered by `(author, title)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderCounts {
    pub books: Vec<BookCount>,
}

impl ReaderCounts {
    /// Unique readers for a book, if it has been seen.
    pub fn get(&self, author: &str, title: &str) -> Option<usize> {
        self.books
            .iter()
            .find(|b| b.author == author && b.title == title)
            .map(|b| b.unique_readers)
    }

    /// Number of distinct books.
    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

impl ChartData for ReaderCounts {
    fn title(&self) -> String {
        "Unique readers per book".to_string()
    }

    fn x_label(&self) -> &'static str {
        "Books"
    }

    fn y_label(&self) -> &'static str {
        "Unique Readers"
    }

    fn bars(&self) -> Vec<Bar> {
        self.books
            .iter()
            .map(|b| {
                Bar::new(
                    BookKey::new(b.author.as_str(), b.title.as_str()).label(),
                    b.unique_readers as u64,
                )
            })
            .collect()
    }
}

/// Distinct readers per book.
#[derive(Debug, Default)]
pub struct ReaderTally {
    readers: BTreeMap<BookKey, BTreeSet<String>>,
}

impl ReaderTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reader to a book's set.
    ///
    /// Returns `true` if the reader was not already counted for that book.
    pub fn record_reader(&mut self, key: BookKey, reader: String) -> bool {
        self.readers.entry(key).or_default().insert(reader)
    }

    /// Unique readers for a book.
    pub fn unique_readers(&self, key: &BookKey) -> usize {
        self.readers.get(key).map_or(0, BTreeSet::len)
    }

    /// Number of distinct books seen.
    pub fn book_count(&self) -> usize {
        self.readers.len()
    }
}

impl Aggregator for ReaderTally {
    type Record = ReadingEvent;
    type Snapshot = ReaderCounts;

    fn name(&self) -> &'static str {
        "readers"
    }

    fn apply(&mut self, record: ReadingEvent) {
        let ReadingEvent {
            author,
            title,
            reader,
        } = record;
        let key = BookKey::new(author, title);

        let inserted = self.record_reader(key.clone(), reader);
        debug!(
            author = %key.author,
            title = %key.title,
            new_reader = inserted,
            unique_readers = self.unique_readers(&key),
            "Reader tally updated"
        );
    }

    fn snapshot(&self) -> ReaderCounts {
        ReaderCounts {
            books: self
                .readers
                .iter()
                .map(|(key, readers)| BookCount {
                    author: key.author.clone(),
                    title: key.title.clone(),
                    unique_readers: readers.len(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DEFAULT_AUTHOR, DEFAULT_READER, DEFAULT_TITLE};

    fn reading(author: &str, title: &str, reader: &str) -> ReadingEvent {
        ReadingEvent {
            author: author.to_string(),
            title: title.to_string(),
            reader: reader.to_string(),
        }
    }

    #[test]
    fn test_same_reader_counted_once() {
        let mut tally = ReaderTally::new();
        tally.apply(reading("A", "T", "X"));
        tally.apply(reading("A", "T", "X"));

        let snap = tally.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get("A", "T"), Some(1));
    }

    #[test]
    fn test_distinct_readers_accumulate() {
        let mut tally = ReaderTally::new();
        tally.apply(reading("A", "T", "X"));
        tally.apply(reading("A", "T", "Y"));
        tally.apply(reading("A", "T", "Z"));

        assert_eq!(tally.unique_readers(&BookKey::new("A", "T")), 3);
    }

    #[test]
    fn test_key_is_author_and_title() {
        let mut tally = ReaderTally::new();
        tally.apply(reading("A", "T", "X"));
        tally.apply(reading("B", "T", "X"));
        tally.apply(reading("A", "U", "X"));

        assert_eq!(tally.book_count(), 3);
        let snap = tally.snapshot();
        assert_eq!(snap.get("A", "T"), Some(1));
        assert_eq!(snap.get("B", "T"), Some(1));
        assert_eq!(snap.get("A", "U"), Some(1));
        assert_eq!(snap.get("B", "U"), None);
    }

    #[test]
    fn test_defaults_form_their_own_key() {
        let mut tally = ReaderTally::new();
        tally.apply(ReadingEvent::default());

        let key = BookKey::new(DEFAULT_AUTHOR, DEFAULT_TITLE);
        assert_eq!(tally.unique_readers(&key), 1);
        assert!(!tally.record_reader(key, DEFAULT_READER.to_string()));
    }

    #[test]
    fn test_snapshot_is_ordered() {
        let mut tally = ReaderTally::new();
        tally.apply(reading("Zola", "Nana", "r1"));
        tally.apply(reading("Austen", "Emma", "r1"));
        tally.apply(reading("Austen", "Persuasion", "r2"));

        let snap = tally.snapshot();
        let labels: Vec<String> = snap.bars().into_iter().map(|b| b.label).collect();
        assert_eq!(
            labels,
            vec!["Emma by Austen", "Persuasion by Austen", "Nana by Zola"]
        );
    }

    #[test]
    fn test_empty_snapshot() {
        let tally = ReaderTally::new();
        let snap = tally.snapshot();
        assert!(snap.is_empty());
        assert!(snap.bars().is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_repeated_reader_idempotent(
            author in "[a-zA-Z ]{0,12}",
            title in "[a-zA-Z ]{0,12}",
            reader in "[a-z0-9]{1,8}",
            repeats in 1usize..20,
        ) {
            let mut tally = ReaderTally::new();
            for _ in 0..repeats {
                tally.apply(ReadingEvent {
                    author: author.clone(),
                    title: title.clone(),
                    reader: reader.clone(),
                });
            }
            prop_assert_eq!(tally.unique_readers(&BookKey::new(author, title)), 1);
        }

        #[test]
        fn prop_cardinality_non_decreasing(
            events in proptest::collection::vec(("[ab]", "[xy]", "[0-4]"), 1..60),
        ) {
            let mut tally = ReaderTally::new();
            let mut previous: BTreeMap<BookKey, usize> = BTreeMap::new();

            for (author, title, reader) in events {
                tally.apply(ReadingEvent { author, title, reader });

                for book in tally.snapshot().books {
                    let key = BookKey::new(book.author, book.title);
                    let before = previous.get(&key).copied().unwrap_or(0);
                    prop_assert!(book.unique_readers >= before);
                    previous.insert(key, book.unique_readers);
                }
            }
        }
    }
}
