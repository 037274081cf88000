//! Step-driven miners for the browser main loop.
//!
//! Browsers cannot block on worker threads from the main thread, so JS calls
//! `mine_batch` repeatedly (e.g. from `requestAnimationFrame`) and renders
//! the stats in between.

use vanity_core::miner::Hit;
use vanity_core::{
    mine_range, BuilderStrategy, Candidate, CandidateStrategy, EnvelopeCandidate, EnvelopeStrategy,
    NonceRange, PatternTarget,
};
use wasm_bindgen::prelude::*;

use crate::builder::{parse_utxos, JsCandidate, JsTransactionBuilder};
use crate::codec::payload_from_js;
use crate::state::{BatchInfo, MiningStats};

/// Largest integer a JS number holds exactly (`Number.MAX_SAFE_INTEGER`).
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Map random bytes to a start nonce below 2^52, leaving 2^52 nonces of
/// headroom before stats stop fitting in a JS number.
pub fn random_start(bytes: [u8; 8]) -> u64 {
    u64::from_le_bytes(bytes) >> 12
}

/// Strategy-agnostic stepping state shared by both miners.
pub struct StepMiner<S: CandidateStrategy> {
    strategy: S,
    target: PatternTarget,
    stats: MiningStats,
    /// Start time of mining (ms since epoch), 0 when not started.
    start_time: f64,
    is_mining: bool,
    start_nonce: u64,
    next_nonce: u64,
    consecutive_failures: u64,
    failure_cap: Option<u64>,
    /// The nonce space ran out at `u64::MAX`.
    exhausted: bool,
    winner: Option<Hit<S::Output>>,
}

impl<S: CandidateStrategy> StepMiner<S> {
    pub fn new(strategy: S, target: PatternTarget) -> Self {
        StepMiner {
            strategy,
            target,
            stats: MiningStats::new(target),
            start_time: 0.0,
            is_mining: false,
            start_nonce: 0,
            next_nonce: 0,
            consecutive_failures: 0,
            failure_cap: None,
            exhausted: false,
            winner: None,
        }
    }

    /// Move the search to start at `nonce`. Resets progress.
    pub fn set_start_nonce(&mut self, nonce: u64) {
        self.start_nonce = nonce;
        self.reset();
    }

    pub fn set_failure_cap(&mut self, cap: Option<u64>) {
        self.failure_cap = cap.filter(|&cap| cap > 0);
    }

    pub fn start(&mut self, now_ms: f64) {
        self.is_mining = true;
        if self.start_time == 0.0 {
            self.start_time = now_ms;
        }
    }

    pub fn stop(&mut self) {
        self.is_mining = false;
    }

    pub fn is_mining(&self) -> bool {
        self.is_mining
    }

    pub fn stats(&self) -> &MiningStats {
        &self.stats
    }

    pub fn winner(&self) -> Option<&Hit<S::Output>> {
        self.winner.as_ref()
    }

    pub fn target(&self) -> PatternTarget {
        self.target
    }

    /// Try the next `batch_size` nonces.
    pub fn step(&mut self, batch_size: u32, now_ms: f64) -> BatchInfo {
        if let Some(hit) = &self.winner {
            return BatchInfo {
                found: true,
                nonce: Some(hit.nonce),
                identifier: Some(hit.candidate.identifier().to_string()),
                ..BatchInfo::default()
            };
        }
        if self.exhausted {
            return BatchInfo {
                exhausted: true,
                ..BatchInfo::default()
            };
        }

        let count = batch_size as u64;
        let range = NonceRange {
            origin: self.start_nonce,
            first: self.next_nonce,
            stride: 1,
            count,
        };
        let out = mine_range(
            &self.strategy,
            self.target,
            range,
            self.consecutive_failures,
            self.failure_cap,
        );

        // Update statistics
        self.consecutive_failures = out.consecutive_failures;
        self.next_nonce = self.next_nonce.saturating_add(out.attempts);
        self.stats.total_attempts += out.attempts;
        self.stats.failures += out.failures;
        self.stats.next_nonce = self.next_nonce;
        self.stats.efficiency = self.target.efficiency(self.stats.total_attempts);
        if self.start_time > 0.0 {
            self.stats.elapsed_ms = now_ms - self.start_time;
            self.stats.update_hash_rate();
        }
        self.stats.offer_best(out.best.as_ref());

        let mut info = BatchInfo {
            trailing_zeros: out.best.as_ref().map_or(0, |b| b.trailing_zero_bits),
            attempts: out.attempts,
            failures: out.failures,
            saturated: out.saturated,
            last_error: out.last_error.map(|e| e.to_string()),
            ..BatchInfo::default()
        };

        if let Some(hit) = out.hit {
            info.found = true;
            info.nonce = Some(hit.nonce);
            info.identifier = Some(hit.candidate.identifier().to_string());
            self.stats.found = true;
            self.is_mining = false;
            self.winner = Some(hit);
        }
        if out.saturated {
            self.is_mining = false;
        } else if !info.found && out.attempts < count {
            self.exhausted = true;
            self.is_mining = false;
            info.exhausted = true;
        }

        info
    }

    /// Forget progress and any winner; keeps the strategy and start nonce.
    pub fn reset(&mut self) {
        self.stats = MiningStats::new(self.target);
        self.start_time = 0.0;
        self.is_mining = false;
        self.next_nonce = self.start_nonce;
        self.consecutive_failures = 0;
        self.exhausted = false;
        self.winner = None;
    }
}

/// Envelope miner exposed to JS.
#[wasm_bindgen]
pub struct VanityMiner {
    inner: StepMiner<EnvelopeStrategy>,
}

impl VanityMiner {
    /// Build from Rust values; the JS constructor funnels into this.
    pub fn from_parts(
        version: u32,
        contract_type_id: &str,
        payload: vanity_core::Payload,
        trailing_zero_bits: u32,
    ) -> Result<VanityMiner, String> {
        let target = PatternTarget::new(trailing_zero_bits).map_err(|e| e.to_string())?;
        let strategy =
            EnvelopeStrategy::new(version, contract_type_id, payload).map_err(|e| e.to_string())?;
        Ok(VanityMiner {
            inner: StepMiner::new(strategy, target),
        })
    }

    pub fn step(&mut self, batch_size: u32, now_ms: f64) -> BatchInfo {
        self.inner.step(batch_size, now_ms)
    }

    pub fn winning_candidate(&self) -> Option<&EnvelopeCandidate> {
        self.inner.winner().map(|hit| &hit.candidate)
    }
}

#[wasm_bindgen]
impl VanityMiner {
    /// Create a new miner.
    ///
    /// # Arguments
    /// * `version` - Envelope version byte
    /// * `contract_type_id` - Even-length hex contract type
    /// * `payload` - String or Uint8Array; the nonce is appended to it
    /// * `trailing_zero_bits` - Required zero bits (1-64)
    #[wasm_bindgen(constructor)]
    pub fn new(
        version: u32,
        contract_type_id: &str,
        payload: JsValue,
        trailing_zero_bits: u32,
    ) -> Result<VanityMiner, JsValue> {
        let payload = payload_from_js(&payload)
            .map_err(|e| JsValue::from_str(&format!("Invalid payload: {}", e)))?;
        Self::from_parts(version, contract_type_id, payload, trailing_zero_bits)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Start from a random nonce so parallel tabs search different ranges.
    #[wasm_bindgen]
    pub fn randomize_start(&mut self) -> Result<(), JsValue> {
        let mut buf = [0u8; 8];
        getrandom::getrandom(&mut buf)
            .map_err(|e| JsValue::from_str(&format!("Random source failed: {}", e)))?;
        self.inner.set_start_nonce(random_start(buf));
        Ok(())
    }

    /// Mine a batch of nonces.
    ///
    /// # Returns
    /// Batch result with found status and the longest zero run seen.
    #[wasm_bindgen]
    pub fn mine_batch(&mut self, batch_size: u32) -> Result<JsValue, JsValue> {
        self.step(batch_size, js_sys::Date::now()).to_js()
    }

    /// Start mining.
    #[wasm_bindgen]
    pub fn start_mining(&mut self) {
        self.inner.start(js_sys::Date::now());
    }

    /// Stop mining.
    #[wasm_bindgen]
    pub fn stop_mining(&mut self) {
        self.inner.stop();
    }

    /// Check if mining is active.
    #[wasm_bindgen(getter)]
    pub fn is_mining(&self) -> bool {
        self.inner.is_mining()
    }

    /// Suggested batch size for the target difficulty.
    #[wasm_bindgen(getter)]
    pub fn suggested_batch_size(&self) -> u32 {
        self.inner.target().batch_size() as u32
    }

    /// Get current mining statistics.
    #[wasm_bindgen]
    pub fn get_stats(&self) -> Result<JsValue, JsValue> {
        self.inner.stats().to_js()
    }

    /// Get the formatted hash rate.
    #[wasm_bindgen]
    pub fn get_hash_rate_display(&self) -> String {
        self.inner.stats().format_hash_rate()
    }

    /// Winning envelope as hex, once found.
    #[wasm_bindgen]
    pub fn get_envelope_hex(&self) -> Option<String> {
        self.winning_candidate().map(|c| c.envelope.to_hex())
    }

    /// Winning identifier, once found.
    #[wasm_bindgen]
    pub fn get_identifier(&self) -> Option<String> {
        self.winning_candidate().map(|c| c.identifier.clone())
    }

    /// Reset the miner for a new search.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.inner.reset();
    }
}

/// Builder-based miner exposed to JS. Varies the payment amount by the nonce.
#[wasm_bindgen]
pub struct BuilderMiner {
    inner: StepMiner<BuilderStrategy<JsTransactionBuilder>>,
}

#[wasm_bindgen]
impl BuilderMiner {
    /// Create a new miner.
    ///
    /// # Arguments
    /// * `builder` - JS transaction builder
    /// * `utxos` - Array of `{ outpoint: { txId, index }, amount }`
    /// * `recipient` - Payment address
    /// * `base_amount` - Amount at nonce 0; nonce `n` pays `base_amount + n`
    /// * `fee` - Fee passed to the builder
    /// * `trailing_zero_bits` - Required zero bits (1-64)
    #[wasm_bindgen(constructor)]
    pub fn new(
        builder: JsTransactionBuilder,
        utxos: JsValue,
        recipient: String,
        base_amount: u64,
        fee: u64,
        trailing_zero_bits: u32,
    ) -> Result<BuilderMiner, JsValue> {
        let target = PatternTarget::new(trailing_zero_bits)
            .map_err(|e| JsValue::from_str(&format!("Invalid target: {}", e)))?;
        let utxos = parse_utxos(utxos)?;
        let strategy = BuilderStrategy::new(builder, utxos, recipient, base_amount, fee);
        Ok(BuilderMiner {
            inner: StepMiner::new(strategy, target),
        })
    }

    /// Stop after this many consecutive builder failures (0 = never).
    #[wasm_bindgen]
    pub fn set_failure_cap(&mut self, cap: u32) {
        self.inner.set_failure_cap(Some(cap as u64));
    }

    /// Mine a batch of amount variations.
    #[wasm_bindgen]
    pub fn mine_batch(&mut self, batch_size: u32) -> Result<JsValue, JsValue> {
        self.inner.step(batch_size, js_sys::Date::now()).to_js()
    }

    /// Start mining.
    #[wasm_bindgen]
    pub fn start_mining(&mut self) {
        self.inner.start(js_sys::Date::now());
    }

    /// Stop mining.
    #[wasm_bindgen]
    pub fn stop_mining(&mut self) {
        self.inner.stop();
    }

    /// Check if mining is active.
    #[wasm_bindgen(getter)]
    pub fn is_mining(&self) -> bool {
        self.inner.is_mining()
    }

    /// Get current mining statistics.
    #[wasm_bindgen]
    pub fn get_stats(&self) -> Result<JsValue, JsValue> {
        self.inner.stats().to_js()
    }

    /// Winning transaction (`{ id, rawHex }`), once found.
    #[wasm_bindgen]
    pub fn get_candidate(&self) -> Result<JsValue, JsValue> {
        match self.inner.winner() {
            Some(hit) => serde_wasm_bindgen::to_value::<JsCandidate>(&hit.candidate)
                .map_err(|e| JsValue::from_str(&format!("Serialization error: {:?}", e))),
            None => Ok(JsValue::NULL),
        }
    }

    /// Amount paid by the winning transaction, once found.
    #[wasm_bindgen]
    pub fn get_amount(&self) -> Option<u64> {
        let hit = self.inner.winner()?;
        self.inner.strategy.amount_for(hit.nonce).ok()
    }

    /// Reset the miner for a new search.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.inner.reset();
    }
}

/// Log to the browser console.
#[wasm_bindgen]
pub fn console_log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanity_core::{matches, Payload};

    fn miner(bits: u32) -> VanityMiner {
        VanityMiner::from_parts(1, "cafe", Payload::from("memo:"), bits).unwrap()
    }

    #[test]
    fn test_rejects_bad_parts() {
        assert!(VanityMiner::from_parts(1, "cafe", Payload::from("x"), 0).is_err());
        assert!(VanityMiner::from_parts(1, "caf", Payload::from("x"), 4).is_err());
        assert!(VanityMiner::from_parts(999, "", Payload::from("x"), 4).is_err());
    }

    #[test]
    fn test_steps_until_found() {
        let mut miner = miner(4);
        miner.inner.start(1_000.0);

        let mut found = None;
        for i in 0..100 {
            let info = miner.step(50, 1_000.0 + i as f64 * 10.0);
            if info.found {
                found = Some(info);
                break;
            }
        }

        let info = found.expect("4 bits within 5000 attempts");
        let identifier = info.identifier.unwrap();
        assert!(matches(&identifier, 4));
        assert!(!miner.inner.is_mining());
        assert!(miner.inner.stats().found);

        let candidate = miner.winning_candidate().unwrap();
        assert_eq!(candidate.identifier, identifier);
        assert_eq!(Some(candidate.nonce), info.nonce);
        assert!(candidate.envelope.verify_root());

        // further steps report the same winner without mining
        let again = miner.step(50, 5_000.0);
        assert!(again.found);
        assert_eq!(again.attempts, 0);
        assert_eq!(again.identifier.as_deref(), Some(identifier.as_str()));
    }

    #[test]
    fn test_progress_accumulates() {
        let mut miner = miner(64);
        miner.inner.start(1_000.0);
        miner.step(100, 1_500.0);
        miner.step(100, 2_000.0);

        let stats = miner.inner.stats();
        assert_eq!(stats.total_attempts, 200);
        assert_eq!(stats.next_nonce, 200);
        assert_eq!(stats.elapsed_ms, 1_000.0);
        assert_eq!(stats.hash_rate, 200.0);
        assert!(stats.best_identifier.is_some());
    }

    #[test]
    fn test_random_start_fits_js_number() {
        assert_eq!(random_start([0u8; 8]), 0);
        let max = random_start([0xff; 8]);
        assert_eq!(max, (1 << 52) - 1);
        assert!(max + (1 << 52) <= MAX_SAFE_INTEGER + 1);
    }

    #[test]
    fn test_mining_from_highest_random_start_stays_js_safe() {
        let mut miner = miner(4);
        miner.inner.set_start_nonce(random_start([0xff; 8]));

        let mut found = None;
        for _ in 0..100 {
            let info = miner.step(50, 0.0);
            assert!(miner.inner.stats().next_nonce <= MAX_SAFE_INTEGER);
            if info.found {
                found = Some(info);
                break;
            }
        }
        let nonce = found.expect("4 bits within 5000 attempts").nonce.unwrap();
        assert!(nonce >= random_start([0xff; 8]));
        assert!(nonce <= MAX_SAFE_INTEGER);
    }

    #[test]
    fn test_stops_at_end_of_nonce_space() {
        let mut miner = miner(64);
        miner.inner.set_start_nonce(u64::MAX - 2);
        miner.inner.start(1.0);

        let info = miner.step(10, 2.0);
        assert_eq!(info.attempts, 3);
        assert!(info.exhausted);
        assert!(!miner.inner.is_mining());

        let again = miner.step(10, 3.0);
        assert_eq!(again.attempts, 0);
        assert!(again.exhausted);
        assert_eq!(miner.inner.stats().total_attempts, 3);
    }

    #[test]
    fn test_reset_keeps_start_nonce() {
        let mut miner = miner(64);
        miner.inner.set_start_nonce(1_000);
        miner.step(10, 0.0);
        assert_eq!(miner.inner.stats().next_nonce, 1_010);
        miner.inner.reset();
        assert_eq!(miner.inner.stats().total_attempts, 0);
        miner.step(10, 0.0);
        assert_eq!(miner.inner.stats().next_nonce, 1_010);
    }
}
