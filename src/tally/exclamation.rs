//! Exclamation tally
//!
//! Splits messages into two buckets depending on whether the message body
//! contains the `!` marker.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::BuzzMessage;
use crate::presenter::{Bar, ChartData};
use crate::tally::Aggregator;

/// Marker character the tally looks for.
pub const MARKER: char = '!';

pub const WITH_EXCLAMATION: &str = "with_exclamation";
pub const WITHOUT_EXCLAMATION: &str = "without_exclamation";

/// Snapshot of the exclamation tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclamationCounts {
    pub with_exclamation: u64,
    pub without_exclamation: u64,
}

impl ExclamationCounts {
    /// Number of records folded so far.
    pub fn total(&self) -> u64 {
        self.with_exclamation + self.without_exclamation
    }
}

impl ChartData for ExclamationCounts {
    fn title(&self) -> String {
        format!("Messages with and without \"{MARKER}\"")
    }

    fn x_label(&self) -> &'static str {
        "Message Categories"
    }

    fn y_label(&self) -> &'static str {
        "Message Counts"
    }

    fn bars(&self) -> Vec<Bar> {
        vec![
            Bar::new(WITH_EXCLAMATION, self.with_exclamation),
            Bar::new(WITHOUT_EXCLAMATION, self.without_exclamation),
        ]
    }
}

/// Counts messages with and without the marker.
#[derive(Debug, Default)]
pub struct ExclamationTally {
    counts: ExclamationCounts,
}

impl ExclamationTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counts.
    pub fn counts(&self) -> ExclamationCounts {
        self.counts
    }
}

impl Aggregator for ExclamationTally {
    type Record = BuzzMessage;
    type Snapshot = ExclamationCounts;

    fn name(&self) -> &'static str {
        "exclamations"
    }

    fn apply(&mut self, record: BuzzMessage) {
        let marked = record.message.contains(MARKER);
        if marked {
            self.counts.with_exclamation += 1;
        } else {
            self.counts.without_exclamation += 1;
        }

        debug!(
            category = %record.category,
            marked,
            total = self.counts.total(),
            "Exclamation tally updated"
        );
    }

    fn snapshot(&self) -> ExclamationCounts {
        self.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(body: &str) -> BuzzMessage {
        BuzzMessage {
            message: body.to_string(),
            ..BuzzMessage::default()
        }
    }

    #[test]
    fn test_marked_message() {
        let mut tally = ExclamationTally::new();
        tally.apply(message("Hello!"));

        assert_eq!(tally.counts().with_exclamation, 1);
        assert_eq!(tally.counts().without_exclamation, 0);
    }

    #[test]
    fn test_unmarked_message() {
        let mut tally = ExclamationTally::new();
        tally.apply(message("Hi"));

        assert_eq!(tally.counts().with_exclamation, 0);
        assert_eq!(tally.counts().without_exclamation, 1);
    }

    #[test]
    fn test_empty_message_counts_as_unmarked() {
        let mut tally = ExclamationTally::new();
        tally.apply(BuzzMessage::default());

        assert_eq!(
            tally.snapshot(),
            ExclamationCounts {
                with_exclamation: 0,
                without_exclamation: 1,
            }
        );
    }

    #[test]
    fn test_category_does_not_partition() {
        let mut tally = ExclamationTally::new();
        tally.apply(BuzzMessage {
            category: "humor".to_string(),
            message: "lol!".to_string(),
        });
        tally.apply(BuzzMessage {
            category: "tech".to_string(),
            message: "rust!".to_string(),
        });

        assert_eq!(tally.counts().with_exclamation, 2);
        assert_eq!(tally.snapshot().bars().len(), 2);
    }

    #[test]
    fn test_chart_labels() {
        let counts = ExclamationCounts {
            with_exclamation: 3,
            without_exclamation: 4,
        };
        assert_eq!(counts.title(), "Messages with and without \"!\"");

        let bars = counts.bars();
        assert_eq!(bars[0], Bar::new("with_exclamation", 3));
        assert_eq!(bars[1], Bar::new("without_exclamation", 4));
    }

    #[test]
    fn test_snapshot_serialization() {
        let counts = ExclamationCounts {
            with_exclamation: 1,
            without_exclamation: 1,
        };
        let json = serde_json::to_value(counts).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"with_exclamation": 1, "without_exclamation": 1})
        );
    }
}
