//! End-to-end verification that a mined identifier survived signing and
//! broadcast.

use serde::{Deserialize, Serialize};

use crate::pattern::PatternTarget;

/// How the network identifier diverged from the mined one, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Divergence {
    /// Both checks hold.
    None,
    /// A signing or serialization step recomputed the identifier from
    /// different bytes.
    IdentifierChanged,
    /// Same identifier, but the pattern no longer holds. Points at an
    /// inconsistency in matching or hashing upstream.
    PatternLost,
}

/// Result of one verification call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub original_identifier: String,
    pub target_pattern: PatternTarget,
    pub network_identifier: String,
    /// Exact string equality.
    pub identifier_equal: bool,
    /// Equality after trimming and ignoring hex case. Informational: a node
    /// that reports upper-case hex still broadcast the mined transaction.
    pub identifier_equal_normalized: bool,
    pub pattern_holds_for_network_identifier: bool,
    /// Informational: whether the mined identifier met the target at all.
    pub pattern_holds_for_original: bool,
}

impl VerificationRecord {
    pub fn overall_success(&self) -> bool {
        self.identifier_equal && self.pattern_holds_for_network_identifier
    }

    pub fn divergence(&self) -> Divergence {
        if !self.identifier_equal {
            Divergence::IdentifierChanged
        } else if !self.pattern_holds_for_network_identifier {
            Divergence::PatternLost
        } else {
            Divergence::None
        }
    }
}

fn same_normalized(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Verify that `network_identifier` is the mined identifier and still
/// carries `target_pattern`.
pub fn verify(
    original_identifier: &str,
    target_pattern: PatternTarget,
    network_identifier: &str,
) -> VerificationRecord {
    let identifier_equal = original_identifier == network_identifier;
    let identifier_equal_normalized = same_normalized(original_identifier, network_identifier);
    let pattern_holds_for_network_identifier = target_pattern.is_met_by(network_identifier);
    let pattern_holds_for_original = target_pattern.is_met_by(original_identifier);

    let record = VerificationRecord {
        original_identifier: original_identifier.to_string(),
        target_pattern,
        network_identifier: network_identifier.to_string(),
        identifier_equal,
        identifier_equal_normalized,
        pattern_holds_for_network_identifier,
        pattern_holds_for_original,
    };
    log::debug!(
        "verified {} against {}: {:?}",
        original_identifier,
        network_identifier,
        record.divergence()
    );
    record
}

/// Verification bound to one mining target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verifier {
    target: PatternTarget,
}

impl Verifier {
    pub fn new(target: PatternTarget) -> Self {
        Verifier { target }
    }

    pub fn target(&self) -> PatternTarget {
        self.target
    }

    pub fn verify(&self, original_identifier: &str, network_identifier: &str) -> VerificationRecord {
        verify(original_identifier, self.target, network_identifier)
    }
}
