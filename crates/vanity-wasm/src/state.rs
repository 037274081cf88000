//! Serializable state handed across the JS boundary.

use serde::{Deserialize, Serialize};
use vanity_core::{BestCandidate, Divergence, PatternTarget, VerificationRecord};
use wasm_bindgen::prelude::*;

/// Mining statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningStats {
    /// Total candidates attempted.
    pub total_attempts: u64,
    /// Candidates that failed to build.
    pub failures: u64,
    /// Current rate (attempts per second).
    pub hash_rate: f64,
    /// Whether a matching identifier was found.
    pub found: bool,
    /// Next nonce to be tried.
    pub next_nonce: u64,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: f64,
    /// Identifier with the longest zero run so far.
    pub best_identifier: Option<String>,
    /// Trailing zero bits of the best identifier.
    pub best_trailing_zeros: u32,
    /// Expected attempts for the target (2^n).
    pub expected_attempts: f64,
    /// Attempts relative to the expectation.
    pub efficiency: f64,
    /// Estimated milliseconds until the expected attempt count is reached.
    pub eta_ms: Option<f64>,
}

impl MiningStats {
    /// Create new empty stats for `target`.
    pub fn new(target: PatternTarget) -> Self {
        MiningStats {
            expected_attempts: target.expected_attempts() as f64,
            ..Self::default()
        }
    }

    /// Update rate and ETA based on elapsed time.
    pub fn update_hash_rate(&mut self) {
        if self.elapsed_ms > 0.0 {
            self.hash_rate = (self.total_attempts as f64) / (self.elapsed_ms / 1000.0);
        }
        self.eta_ms = if self.hash_rate > 0.0 {
            let remaining = (self.expected_attempts - self.total_attempts as f64).max(0.0);
            Some(remaining / self.hash_rate * 1000.0)
        } else {
            None
        };
    }

    /// Keep the better of the current best and `candidate`.
    pub fn offer_best(&mut self, candidate: Option<&BestCandidate>) {
        if let Some(candidate) = candidate {
            if self.best_identifier.is_none() || candidate.trailing_zero_bits > self.best_trailing_zeros {
                self.best_identifier = Some(candidate.identifier.clone());
                self.best_trailing_zeros = candidate.trailing_zero_bits;
            }
        }
    }

    /// Format hash rate for display.
    pub fn format_hash_rate(&self) -> String {
        if self.hash_rate >= 1_000_000_000.0 {
            format!("{:.2} GH/s", self.hash_rate / 1_000_000_000.0)
        } else if self.hash_rate >= 1_000_000.0 {
            format!("{:.2} MH/s", self.hash_rate / 1_000_000.0)
        } else if self.hash_rate >= 1_000.0 {
            format!("{:.2} KH/s", self.hash_rate / 1_000.0)
        } else {
            format!("{:.2} H/s", self.hash_rate)
        }
    }

    /// Convert to JS value.
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// Result of one `mine_batch` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInfo {
    /// Whether a matching identifier was found.
    pub found: bool,
    /// The winning nonce (if found).
    pub nonce: Option<u64>,
    /// The winning identifier (if found).
    pub identifier: Option<String>,
    /// Longest zero run seen in this batch.
    pub trailing_zeros: u32,
    /// Candidates attempted in this batch.
    pub attempts: u64,
    /// Candidates that failed to build in this batch.
    pub failures: u64,
    /// The consecutive failure cap was hit; mining stopped.
    pub saturated: bool,
    /// No nonces left after `u64::MAX`; mining stopped.
    pub exhausted: bool,
    /// Most recent construction error in this batch.
    pub last_error: Option<String>,
}

impl BatchInfo {
    /// Convert to JS value.
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// Verification result for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationInfo {
    pub original_identifier: String,
    pub network_identifier: String,
    pub trailing_zero_bits: u32,
    pub identifier_equal: bool,
    /// Equal after trimming and ignoring hex case.
    pub identifier_equal_normalized: bool,
    pub pattern_holds: bool,
    pub overall_success: bool,
    /// "none", "identifier_changed" or "pattern_lost".
    pub divergence: Divergence,
}

impl From<&VerificationRecord> for VerificationInfo {
    fn from(record: &VerificationRecord) -> Self {
        VerificationInfo {
            original_identifier: record.original_identifier.clone(),
            network_identifier: record.network_identifier.clone(),
            trailing_zero_bits: record.target_pattern.trailing_zero_bits(),
            identifier_equal: record.identifier_equal,
            identifier_equal_normalized: record.identifier_equal_normalized,
            pattern_holds: record.pattern_holds_for_network_identifier,
            overall_success: record.overall_success(),
            divergence: record.divergence(),
        }
    }
}

impl VerificationInfo {
    /// Convert to JS value.
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {:?}", e)))
}
