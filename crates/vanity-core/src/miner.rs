//! The mining controller.
//!
//! [`mine_range`] is the single-threaded primitive: it walks a strided run of
//! nonces and stops at the first match. [`MiningController::search`] splits
//! the iteration budget across worker threads, each owning the nonces
//! `start + i, start + i + k, ...`, and coordinates them through a stop flag,
//! a compare-and-set `found` flag guarding the winner slot, and an advisory
//! best-candidate record.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::candidate::{Candidate, CandidateStrategy};
use crate::config::MiningConfig;
use crate::error::{CandidateError, ConfigError};
use crate::pattern::{trailing_zero_run, PatternTarget};
use crate::progress::{BestCandidate, CancelToken, ProgressEvent, ProgressSink};

/// A strided run of nonces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceRange {
    /// First nonce of the whole session; attempt indices count from here.
    pub origin: u64,
    /// First nonce of this run.
    pub first: u64,
    pub stride: u64,
    pub count: u64,
}

impl NonceRange {
    /// A contiguous run starting at the session origin.
    pub fn contiguous(first: u64, count: u64) -> Self {
        NonceRange {
            origin: first,
            first,
            stride: 1,
            count,
        }
    }
}

/// A candidate that met the target.
#[derive(Debug, Clone)]
pub struct Hit<C> {
    pub nonce: u64,
    pub attempt_index: u64,
    pub candidate: C,
}

/// Result of mining one [`NonceRange`].
#[derive(Debug, Clone)]
pub struct RangeOutcome<C> {
    pub hit: Option<Hit<C>>,
    /// Candidates attempted, including ones that failed to build.
    pub attempts: u64,
    pub failures: u64,
    /// Failure run at the end of the range, including any carried in.
    pub consecutive_failures: u64,
    /// The failure cap was reached.
    pub saturated: bool,
    pub last_error: Option<CandidateError>,
    pub best: Option<BestCandidate>,
}

impl<C> RangeOutcome<C> {
    fn empty(carried_failures: u64) -> Self {
        RangeOutcome {
            hit: None,
            attempts: 0,
            failures: 0,
            consecutive_failures: carried_failures,
            saturated: false,
            last_error: None,
            best: None,
        }
    }

    fn observe(&mut self, zeros: u32, identifier: &str, attempt_index: u64, nonce: u64) {
        let better = match &self.best {
            None => true,
            Some(best) => zeros > best.trailing_zero_bits,
        };
        if better {
            self.best = Some(BestCandidate {
                trailing_zero_bits: zeros,
                identifier: identifier.to_string(),
                attempt_index,
                nonce,
            });
        }
    }
}

/// Mine every nonce in `range`, stopping at the first match.
///
/// Construction failures are counted and skipped. If `failure_cap` is set
/// and the consecutive failure run (starting from `carried_failures`)
/// reaches it, the range stops with `saturated` set. A nonce that would
/// overflow `u64` ends the range early.
pub fn mine_range<S: CandidateStrategy + ?Sized>(
    strategy: &S,
    target: PatternTarget,
    range: NonceRange,
    carried_failures: u64,
    failure_cap: Option<u64>,
) -> RangeOutcome<S::Output> {
    let mut out = RangeOutcome::empty(carried_failures);
    let mut nonce = range.first;

    for i in 0..range.count {
        if i > 0 {
            match nonce.checked_add(range.stride) {
                Some(next) => nonce = next,
                None => break,
            }
        }
        out.attempts += 1;
        let attempt_index = nonce.wrapping_sub(range.origin).wrapping_add(1);

        match strategy.produce(nonce) {
            Ok(candidate) => {
                out.consecutive_failures = 0;
                let identifier = candidate.identifier();
                let zeros = trailing_zero_run(identifier);
                let matched = target.is_met_by_run(zeros);
                out.observe(zeros, identifier, attempt_index, nonce);
                if matched {
                    out.hit = Some(Hit {
                        nonce,
                        attempt_index,
                        candidate,
                    });
                    return out;
                }
            }
            Err(err) => {
                out.failures += 1;
                out.consecutive_failures += 1;
                log::trace!("candidate at nonce {} failed: {}", nonce, err);
                let saturated = failure_cap.is_some_and(|cap| out.consecutive_failures >= cap);
                out.last_error = Some(err);
                if saturated {
                    out.saturated = true;
                    return out;
                }
            }
        }
    }

    out
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Searching,
    Found,
    Exhausted,
    Cancelled,
    Failed,
}

impl SessionState {
    fn from_u8(value: u8) -> SessionState {
        match value {
            1 => SessionState::Searching,
            2 => SessionState::Found,
            3 => SessionState::Exhausted,
            4 => SessionState::Cancelled,
            5 => SessionState::Failed,
            _ => SessionState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Searching => 1,
            SessionState::Found => 2,
            SessionState::Exhausted => 3,
            SessionState::Cancelled => 4,
            SessionState::Failed => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionState::Idle | SessionState::Searching)
    }
}

/// Statistics common to every terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub attempts: u64,
    pub failures: u64,
    pub elapsed: Duration,
    /// Attempts per second over the whole session.
    pub throughput: f64,
    /// `attempts / 2^n`.
    pub efficiency: f64,
    pub best: Option<BestCandidate>,
}

/// The winning candidate of a successful search.
#[derive(Debug, Clone)]
pub struct Found<C> {
    pub candidate: C,
    pub identifier: String,
    pub nonce: u64,
    pub attempt_index: u64,
    pub stats: SessionStats,
}

/// Why a session gave up early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    /// Nonce of the failure that hit the cap.
    pub nonce: u64,
    pub consecutive_failures: u64,
    pub last_error: String,
}

/// Terminal outcome of [`MiningController::search`].
#[derive(Debug, Clone)]
pub enum MiningOutcome<C> {
    Found(Found<C>),
    Exhausted(SessionStats),
    Cancelled(SessionStats),
    Failed {
        reason: FailureReason,
        stats: SessionStats,
    },
}

impl<C> MiningOutcome<C> {
    pub fn state(&self) -> SessionState {
        match self {
            MiningOutcome::Found(_) => SessionState::Found,
            MiningOutcome::Exhausted(_) => SessionState::Exhausted,
            MiningOutcome::Cancelled(_) => SessionState::Cancelled,
            MiningOutcome::Failed { .. } => SessionState::Failed,
        }
    }

    pub fn stats(&self) -> &SessionStats {
        match self {
            MiningOutcome::Found(found) => &found.stats,
            MiningOutcome::Exhausted(stats) | MiningOutcome::Cancelled(stats) => stats,
            MiningOutcome::Failed { stats, .. } => stats,
        }
    }

    pub fn found(&self) -> Option<&Found<C>> {
        match self {
            MiningOutcome::Found(found) => Some(found),
            _ => None,
        }
    }

    pub fn into_found(self) -> Option<Found<C>> {
        match self {
            MiningOutcome::Found(found) => Some(found),
            _ => None,
        }
    }
}

/// Throughput window for progress events.
struct ReportClock {
    last_at: Duration,
    last_attempts: u64,
}

/// State shared by the workers of one search call.
struct Session<C> {
    started: Instant,
    stop: AtomicBool,
    found: AtomicBool,
    /// Written once, by the worker that wins the `found` exchange.
    winner: Mutex<Option<Hit<C>>>,
    failure: OnceLock<FailureReason>,
    attempts: AtomicU64,
    failures: AtomicU64,
    best: Mutex<Option<BestCandidate>>,
    clock: Mutex<ReportClock>,
}

impl<C> Session<C> {
    fn new() -> Self {
        Session {
            started: Instant::now(),
            stop: AtomicBool::new(false),
            found: AtomicBool::new(false),
            winner: Mutex::new(None),
            failure: OnceLock::new(),
            attempts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            best: Mutex::new(None),
            clock: Mutex::new(ReportClock {
                last_at: Duration::ZERO,
                last_attempts: 0,
            }),
        }
    }

    /// Record `hit` unless another worker already won. Returns whether it did.
    fn claim(&self, hit: Hit<C>) -> bool {
        let won = self
            .found
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            if let Ok(mut winner) = self.winner.lock() {
                *winner = Some(hit);
            }
        }
        self.stop.store(true, Ordering::Release);
        won
    }

    fn stopped(&self, cancel: &CancelToken) -> bool {
        self.stop.load(Ordering::Acquire) || cancel.is_cancelled()
    }

    /// Fold a worker's best into the shared record. Skipped under contention.
    fn offer_best(&self, candidate: Option<BestCandidate>) {
        if candidate.is_none() {
            return;
        }
        if let Ok(mut best) = self.best.try_lock() {
            *best = BestCandidate::merge(best.take(), candidate);
        }
    }

    fn best(&self) -> Option<BestCandidate> {
        self.best.lock().ok().and_then(|best| best.clone())
    }

    fn stats(&self, target: PatternTarget) -> SessionStats {
        let elapsed = self.started.elapsed();
        let attempts = self.attempts.load(Ordering::Acquire);
        SessionStats {
            attempts,
            failures: self.failures.load(Ordering::Acquire),
            elapsed,
            throughput: rate(attempts, elapsed),
            efficiency: target.efficiency(attempts),
            best: self.best(),
        }
    }

    /// Emit a progress event if the configured interval has passed. Only one
    /// worker reports at a time; the others skip. `throughput` is the rate
    /// of the batch that just finished.
    fn maybe_report<P: ProgressSink + ?Sized>(
        &self,
        config: &MiningConfig,
        sink: &P,
        throughput: f64,
    ) {
        let Ok(mut clock) = self.clock.try_lock() else {
            return;
        };
        let elapsed = self.started.elapsed();
        let attempts = self.attempts.load(Ordering::Acquire);
        let since = elapsed.saturating_sub(clock.last_at);
        let done = attempts.saturating_sub(clock.last_attempts);

        let due_time = since >= config.progress_interval();
        let due_attempts = config
            .progress_every_attempts
            .is_some_and(|every| done >= every);
        if !(due_time || due_attempts) {
            return;
        }

        clock.last_at = elapsed;
        clock.last_attempts = attempts;
        drop(clock);

        let event = ProgressEvent {
            attempts,
            elapsed,
            throughput,
            best: self.best(),
            eta: eta(config.target, attempts, throughput),
        };
        sink.report(event);
    }
}

/// Session-wide rate from one worker's batch, assuming the other workers
/// run at the same speed.
fn batch_throughput(attempts: u64, workers: u64, window: Duration) -> f64 {
    rate(attempts.saturating_mul(workers), window)
}

fn rate(attempts: u64, window: Duration) -> f64 {
    let secs = window.as_secs_f64();
    if secs > 0.0 {
        attempts as f64 / secs
    } else {
        0.0
    }
}

/// Time to reach the expected attempt count at `throughput`.
fn eta(target: PatternTarget, attempts: u64, throughput: f64) -> Option<Duration> {
    if throughput <= 0.0 {
        return None;
    }
    let remaining = target.expected_attempts().saturating_sub(attempts as u128);
    Duration::try_from_secs_f64(remaining as f64 / throughput).ok()
}

/// Runs trailing-zero searches according to a [`MiningConfig`].
#[derive(Debug)]
pub struct MiningController {
    config: MiningConfig,
    state: AtomicU8,
}

impl MiningController {
    pub fn new(config: MiningConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(MiningController {
            config,
            state: AtomicU8::new(SessionState::Idle.as_u8()),
        })
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// State of the most recent (or current) search.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Search until a candidate meets the target, the iteration budget runs
    /// out, the consecutive-failure cap trips, or `cancel` fires.
    ///
    /// Cancellation and the sibling stop signal are checked between batches.
    pub fn search<S, P>(&self, strategy: &S, sink: &P, cancel: &CancelToken) -> MiningOutcome<S::Output>
    where
        S: CandidateStrategy + Sync + ?Sized,
        S::Output: Send,
        P: ProgressSink + Sync + ?Sized,
    {
        let config = &self.config;
        let workers = config.resolved_workers();
        let batch_size = config.resolved_batch_size();
        let session = Session::new();

        self.set_state(SessionState::Searching);
        log::debug!(
            "mining {} trailing zero bits: budget {}, {} workers, batch {}",
            config.target.trailing_zero_bits(),
            config.max_iterations,
            workers,
            batch_size
        );

        thread::scope(|scope| {
            for worker in 0..workers {
                let session = &session;
                scope.spawn(move || {
                    run_worker(worker as u64, workers as u64, batch_size, config, strategy, sink, cancel, session)
                });
            }
        });

        let stats = session.stats(config.target);
        let Session { winner, failure, .. } = session;

        let outcome = if let Some(hit) = winner.into_inner().ok().flatten() {
            MiningOutcome::Found(Found {
                identifier: hit.candidate.identifier().to_string(),
                candidate: hit.candidate,
                nonce: hit.nonce,
                attempt_index: hit.attempt_index,
                stats,
            })
        } else if let Some(reason) = failure.into_inner() {
            log::warn!(
                "mining aborted after {} consecutive failures: {}",
                reason.consecutive_failures,
                reason.last_error
            );
            MiningOutcome::Failed { reason, stats }
        } else if cancel.is_cancelled() && stats.attempts < config.max_iterations {
            MiningOutcome::Cancelled(stats)
        } else {
            MiningOutcome::Exhausted(stats)
        };

        self.set_state(outcome.state());
        log::debug!(
            "mining finished {:?} after {} attempts in {:?}",
            outcome.state(),
            outcome.stats().attempts,
            outcome.stats().elapsed
        );
        outcome
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }
}

#[allow(clippy::too_many_arguments)]
fn run_worker<S, P>(
    worker: u64,
    workers: u64,
    batch_size: u64,
    config: &MiningConfig,
    strategy: &S,
    sink: &P,
    cancel: &CancelToken,
    session: &Session<S::Output>,
) where
    S: CandidateStrategy + ?Sized,
    P: ProgressSink + ?Sized,
{
    let budget = config.max_iterations;
    let mut offset = worker;
    let mut consecutive = 0u64;

    while offset < budget {
        if session.stopped(cancel) {
            break;
        }
        let Some(first) = config.start_nonce.checked_add(offset) else {
            break;
        };

        // nonces left for this worker: ceil((budget - offset) / workers)
        let remaining = (budget - offset - 1) / workers + 1;
        let count = remaining.min(batch_size);
        let range = NonceRange {
            origin: config.start_nonce,
            first,
            stride: workers,
            count,
        };

        let batch_started = Instant::now();
        let out = mine_range(
            strategy,
            config.target,
            range,
            consecutive,
            config.max_consecutive_failures,
        );
        let batch_time = batch_started.elapsed();
        session.attempts.fetch_add(out.attempts, Ordering::AcqRel);
        session.failures.fetch_add(out.failures, Ordering::AcqRel);
        session.offer_best(out.best);
        consecutive = out.consecutive_failures;
        log::trace!(
            "worker {} finished batch at nonce {}: {} attempts, {} failures",
            worker,
            first,
            out.attempts,
            out.failures
        );

        if let Some(hit) = out.hit {
            let nonce = hit.nonce;
            if session.claim(hit) {
                log::debug!("worker {} found a match at nonce {}", worker, nonce);
            }
            break;
        }
        if out.saturated {
            let last_nonce = first.saturating_add((out.attempts - 1).saturating_mul(workers));
            let _ = session.failure.set(FailureReason {
                nonce: last_nonce,
                consecutive_failures: consecutive,
                last_error: out
                    .last_error
                    .map(|err| err.to_string())
                    .unwrap_or_default(),
            });
            session.stop.store(true, Ordering::Release);
            break;
        }
        if out.attempts < count {
            // nonce space overflowed
            break;
        }

        session.maybe_report(config, sink, batch_throughput(out.attempts, workers, batch_time));
        offset = match offset.checked_add(count.saturating_mul(workers)) {
            Some(next) => next,
            None => break,
        };
    }
}
