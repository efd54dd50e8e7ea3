//! Driving loop for the Streaming Tally Service
//!
//! [`TallyConsumer`] owns a guarded message source, one aggregator and one
//! presenter, and runs:
//!
//! ```text
//! Starting → Polling → (Decoding → Aggregating → Presenting) → Polling → …
//!                                                          → Stopping → Stopped
//! ```
//!
//! Every message is processed to completion before the next poll. The
//! shutdown flag is checked at the top of the loop and while waiting on the
//! source, never in the middle of a message. Decode and presenter failures
//! are logged and skipped; a source failure ends the loop gracefully. The
//! source is released exactly once on every exit path.

use std::fmt;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::decoder::{decode, DecodeError};
use crate::events::RawMessage;
use crate::guard::SourceGuard;
use crate::presenter::Presenter;
use crate::source::MessageSource;
use crate::tally::Aggregator;

pub const DEFAULT_TOPIC: &str = "unknown_topic";
pub const DEFAULT_GROUP_ID: &str = "default_group";

/// Topic and consumer-group identity the source is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Topic to consume.
    pub topic: String,
    /// Consumer group identity.
    pub group_id: String,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            group_id: group_id.into(),
        }
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC, DEFAULT_GROUP_ID)
    }
}

/// Loop lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Polling,
    Decoding,
    Aggregating,
    Presenting,
    Stopping,
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoopState::Starting => "starting",
            LoopState::Polling => "polling",
            LoopState::Decoding => "decoding",
            LoopState::Aggregating => "aggregating",
            LoopState::Presenting => "presenting",
            LoopState::Stopping => "stopping",
            LoopState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The source reported end of stream.
    EndOfStream,
    /// The shutdown flag was raised.
    Interrupted,
    /// The source failed; the loop shut down gracefully.
    SourceFailed(String),
}

/// Outcome of processing a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Record folded into the tally and presented.
    Applied,
    /// Payload was not valid JSON.
    Malformed,
    /// Payload parsed but was not an object; nothing to tally.
    NotApplicable,
    /// Object with a known field of the wrong type.
    InvalidField,
}

/// Counters kept across a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Messages taken from the source, usable or not.
    pub messages_received: u64,
    /// Records folded into the tally.
    pub records_applied: u64,
    /// Payloads that were not valid JSON.
    pub malformed: u64,
    /// JSON payloads that were not objects.
    pub not_applicable: u64,
    /// Objects with a known field of the wrong type.
    pub invalid_field: u64,
    /// Refreshes or final draws that returned an error.
    pub presenter_failures: u64,
    /// Offset of the most recent message received.
    pub last_offset: Option<u64>,
}

impl LoopStats {
    /// Messages that produced no tally update.
    pub fn skipped(&self) -> u64 {
        self.malformed + self.not_applicable + self.invalid_field
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary<T> {
    /// Why the loop stopped.
    pub reason: StopReason,
    /// Counters at shutdown.
    pub stats: LoopStats,
    /// Tally as of shutdown.
    pub snapshot: T,
}

/// Single-task consumer driving source → decoder → aggregator → presenter.
pub struct TallyConsumer<S, A, P>
where
    S: MessageSource,
    A: Aggregator,
    P: Presenter<A::Snapshot>,
{
    /// Source handle, closed exactly once.
    source: SourceGuard<S>,
    /// Tally state; only this consumer mutates it.
    aggregator: A,
    /// Receives a snapshot after every applied record.
    presenter: P,
    /// Topic and group the source is bound to.
    subscription: Subscription,
    /// Current lifecycle state.
    state: LoopState,
    /// Counters for the run so far.
    stats: LoopStats,
}

impl<S, A, P> TallyConsumer<S, A, P>
where
    S: MessageSource,
    A: Aggregator,
    P: Presenter<A::Snapshot>,
{
    /// Take ownership of a source bound to `subscription`.
    pub fn new(source: S, aggregator: A, presenter: P, subscription: Subscription) -> Self {
        info!(
            topic = %subscription.topic,
            group_id = %subscription.group_id,
            tally = aggregator.name(),
            "Consumer created"
        );

        Self {
            source: SourceGuard::new(source),
            aggregator,
            presenter,
            subscription,
            state: LoopState::Starting,
            stats: LoopStats::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn aggregator(&self) -> &A {
        &self.aggregator
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Run until end of stream, interruption or source failure.
    ///
    /// Raising `shutdown` to `true` stops the loop before the next poll.
    /// Dropping the sender without raising it leaves the loop running.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> RunSummary<A::Snapshot> {
        info!(
            topic = %self.subscription.topic,
            "Polling messages from topic"
        );

        let reason = loop {
            if *shutdown.borrow() {
                break StopReason::Interrupted;
            }

            self.transition(LoopState::Polling);
            let polled = tokio::select! {
                biased;
                _ = interrupted(&mut shutdown) => None,
                polled = self.source.next_message() => Some(polled),
            };
            let Some(polled) = polled else {
                break StopReason::Interrupted;
            };

            match polled {
                Ok(Some(message)) => {
                    self.process(&message);
                }
                Ok(None) => break StopReason::EndOfStream,
                Err(e) => {
                    error!(
                        topic = %self.subscription.topic,
                        error = %e,
                        "Error while consuming messages"
                    );
                    break StopReason::SourceFailed(e.to_string());
                }
            }
        };

        self.shutdown(reason)
    }

    /// Decode, aggregate and present one message.
    pub fn process(&mut self, message: &RawMessage) -> MessageOutcome {
        self.stats.messages_received += 1;
        self.stats.last_offset = Some(message.offset);
        debug!(
            offset = message.offset,
            payload = %message.payload,
            "Received message"
        );

        self.transition(LoopState::Decoding);
        let record = match decode::<A::Record>(&message.payload) {
            Ok(record) => record,
            Err(e) => return self.reject(message, e),
        };
        info!(offset = message.offset, record = ?record, "Processed JSON message");

        self.transition(LoopState::Aggregating);
        self.aggregator.apply(record);
        self.stats.records_applied += 1;
        let snapshot = self.aggregator.snapshot();
        match serde_json::to_string(&snapshot) {
            Ok(json) => info!(tally = self.aggregator.name(), snapshot = %json, "Updated tally"),
            Err(e) => warn!(error = %e, "Failed to serialize tally snapshot"),
        }

        self.transition(LoopState::Presenting);
        if let Err(e) = self.presenter.refresh(&snapshot) {
            self.stats.presenter_failures += 1;
            error!(offset = message.offset, error = %e, "Failed to refresh presenter");
        }

        MessageOutcome::Applied
    }

    fn reject(&mut self, message: &RawMessage, err: DecodeError) -> MessageOutcome {
        match err {
            DecodeError::Malformed(_) => {
                self.stats.malformed += 1;
                error!(
                    offset = message.offset,
                    payload = %message.payload,
                    error = %err,
                    "Invalid JSON message"
                );
                MessageOutcome::Malformed
            }
            DecodeError::NotAnObject { found } => {
                self.stats.not_applicable += 1;
                warn!(
                    offset = message.offset,
                    found,
                    "Skipping message that is not a JSON object"
                );
                MessageOutcome::NotApplicable
            }
            DecodeError::InvalidField(_) => {
                self.stats.invalid_field += 1;
                error!(
                    offset = message.offset,
                    error = %err,
                    "Error processing message"
                );
                MessageOutcome::InvalidField
            }
        }
    }

    fn shutdown(mut self, reason: StopReason) -> RunSummary<A::Snapshot> {
        if reason == StopReason::Interrupted {
            warn!(topic = %self.subscription.topic, "Consumer interrupted");
        }

        self.transition(LoopState::Stopping);
        if self.source.release() {
            info!(topic = %self.subscription.topic, "Message source closed");
        }

        let snapshot = self.aggregator.snapshot();
        if let Err(e) = self.presenter.finish(&snapshot) {
            self.stats.presenter_failures += 1;
            error!(error = %e, "Failed to draw final tally");
        }

        self.transition(LoopState::Stopped);
        info!(
            topic = %self.subscription.topic,
            group_id = %self.subscription.group_id,
            reason = ?reason,
            received = self.stats.messages_received,
            applied = self.stats.records_applied,
            skipped = self.stats.skipped(),
            presenter_failures = self.stats.presenter_failures,
            last_offset = ?self.stats.last_offset,
            "END consumer"
        );

        RunSummary {
            reason,
            stats: self.stats.clone(),
            snapshot,
        }
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Loop state change");
            self.state = next;
        }
    }
}

/// Resolves once the shutdown flag is raised. Never resolves if the
/// sender goes away without raising it.
async fn interrupted(shutdown: &mut watch::Receiver<bool>) {
    let raised = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !raised {
        std::future::pending::<()>().await;
    }
}
