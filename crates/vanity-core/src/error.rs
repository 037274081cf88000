//! Error types for envelope construction, candidate building and configuration.
//!
//! Exhaustion, cancellation and verification mismatches are outcomes, not
//! errors, and live in `miner` and `verify` instead.

use thiserror::Error;

/// A segment of an envelope failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("version {0} does not fit in one byte")]
    VersionOutOfRange(u32),
    #[error("contract type id has odd hex length {0}")]
    OddLengthHex(usize),
    #[error("contract type id is not valid hex: {0}")]
    InvalidHex(String),
    #[error("payload must be text or bytes, got {0}")]
    WrongPayloadType(String),
}

/// Errors raised by the envelope codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// The payload hash primitive produced something other than 32 bytes.
    #[error("payload root hash must be 32 bytes, got {0}")]
    HashLength(usize),
}

/// Invalid trailing-zero target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("trailing zero bits must be in 1..=64, got {0}")]
    BitsOutOfRange(u32),
}

/// Failure to construct a single candidate.
///
/// These never abort a mining session on their own; the controller counts
/// them and moves on to the next nonce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandidateError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error("amount overflow at nonce {0}")]
    AmountOverflow(u64),
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },
    #[error("transaction builder rejected candidate: {0}")]
    Rejected(String),
}

/// Invalid mining configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,
    #[error("failure cap must be greater than zero")]
    ZeroFailureCap,
}

/// Post-mining hand-off failed before anything could be verified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FinalizeError {
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("every broadcast strategy failed ({} tried)", .0.len())]
    NoBroadcaster(Vec<crate::pipeline::BroadcastFailure>),
}
