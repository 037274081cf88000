//! Progress reporting and cooperative cancellation for mining sessions.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

/// Best candidate seen so far. Diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestCandidate {
    pub trailing_zero_bits: u32,
    pub identifier: String,
    /// One-based index of the attempt within the session.
    pub attempt_index: u64,
    pub nonce: u64,
}

impl BestCandidate {
    /// Keep whichever of `self` and `other` has the longer zero run.
    /// Ties keep the earlier nonce.
    pub fn merge(current: Option<BestCandidate>, other: Option<BestCandidate>) -> Option<BestCandidate> {
        match (current, other) {
            (None, b) => b,
            (a, None) => a,
            (Some(a), Some(b)) => {
                let b_wins = b.trailing_zero_bits > a.trailing_zero_bits
                    || (b.trailing_zero_bits == a.trailing_zero_bits && b.nonce < a.nonce);
                Some(if b_wins { b } else { a })
            }
        }
    }
}

/// Snapshot emitted at batch boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub attempts: u64,
    pub elapsed: Duration,
    /// Attempts per second over the batch that triggered the event, across
    /// all workers.
    pub throughput: f64,
    pub best: Option<BestCandidate>,
    /// Time until the expected attempt count is reached at the current rate.
    pub eta: Option<Duration>,
}

/// Receives progress events. Must return promptly.
pub trait ProgressSink {
    fn report(&self, event: ProgressEvent);
}

impl<F: Fn(ProgressEvent)> ProgressSink for F {
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bounded channel sink. Events are dropped, not queued, when the consumer
/// falls behind.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<ProgressEvent>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Create a sink and its receiving end. `capacity` of zero is bumped to one.
    pub fn bounded(capacity: usize) -> (ChannelSink, Receiver<ProgressEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (
            ChannelSink {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Events discarded because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl ProgressSink for ChannelSink {
    fn report(&self, event: ProgressEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // nobody listening
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Shared cancellation flag, checked by the miner at batch boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
