//! Running tallies
//!
//! An [`Aggregator`] folds decoded records into an in-memory tally and
//! hands out read-only snapshots for presentation. Each consumer owns
//! exactly one aggregator, so the tally has a single writer.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::presenter::ChartData;

pub mod exclamation;
pub mod readers;

pub use exclamation::{ExclamationCounts, ExclamationTally};
pub use readers::{BookCount, BookKey, ReaderCounts, ReaderTally};

/// Reduction rule over a stream of decoded records.
pub trait Aggregator {
    /// Record type decoded from each payload.
    type Record: DeserializeOwned + std::fmt::Debug;
    /// Point-in-time view of the tally.
    type Snapshot: ChartData + Serialize;

    /// Label used in log lines.
    fn name(&self) -> &'static str;

    /// Fold one record into the tally.
    fn apply(&mut self, record: Self::Record);

    /// Current state of the tally.
    fn snapshot(&self) -> Self::Snapshot;
}
