//! Core logic for mining vanity transaction identifiers.
//!
//! This crate provides pure Rust implementations of:
//! - Envelope construction (`version ‖ contract type ‖ BLAKE3 root ‖ payload`)
//! - Trailing-zero pattern matching over hex identifiers
//! - A multi-threaded mining controller over envelope or external-builder
//!   candidates, with batching, progress events and cancellation
//! - Verification that a broadcast identifier still carries the pattern

pub mod candidate;
pub mod config;
pub mod envelope;
pub mod error;
pub mod hash;
pub mod miner;
pub mod pattern;
pub mod pipeline;
pub mod progress;
pub mod verify;

pub use candidate::{
    format_nonce, BuilderStrategy, Candidate, CandidateStrategy, EnvelopeCandidate,
    EnvelopeStrategy, Outpoint, PaymentOutput, TransactionBuilder, Utxo, UtxoLike,
};
pub use config::MiningConfig;
pub use envelope::{build_envelope, build_envelope_with, Envelope, Payload};
pub use error::{CandidateError, ConfigError, EncodingError, EnvelopeError, FinalizeError, PatternError};
pub use hash::{blake3, double_sha256, Blake3Hasher, DoubleSha256Hasher, IdentifierHasher};
pub use miner::{mine_range, Found, MiningController, MiningOutcome, NonceRange, SessionState, SessionStats};
pub use pattern::{matches, trailing_zero_run, PatternTarget};
pub use pipeline::{finalize, Broadcaster, SigningWallet};
pub use progress::{BestCandidate, CancelToken, ChannelSink, NoProgress, ProgressEvent, ProgressSink};
pub use verify::{verify, Divergence, VerificationRecord, Verifier};
