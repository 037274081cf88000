//! Transaction builder backed by a JavaScript callback.
//!
//! The wallet SDK lives on the JS side; this adapter hands it the UTXO set,
//! outputs and fee for every attempt and reads back `{ id, rawHex }`.

use serde::{Deserialize, Serialize};
use vanity_core::{Candidate, CandidateError, PaymentOutput, TransactionBuilder, Utxo};
use wasm_bindgen::prelude::*;

/// Candidate transaction returned by the JS builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsCandidate {
    /// Transaction id as the SDK computes it.
    pub id: String,
    /// Serialized unsigned transaction.
    #[serde(default)]
    pub raw_hex: String,
}

impl Candidate for JsCandidate {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn raw_bytes(&self) -> Vec<u8> {
        // validated in `JsCandidate::checked`
        hex::decode(&self.raw_hex).unwrap_or_default()
    }
}

impl JsCandidate {
    /// Reject results whose `rawHex` does not decode.
    pub fn checked(self) -> Result<JsCandidate, CandidateError> {
        hex::decode(&self.raw_hex).map_err(|e| rejected("builder rawHex", e))?;
        Ok(self)
    }
}

/// Wraps `build(utxos, outputs, fee) => { id, rawHex }`.
#[wasm_bindgen]
pub struct JsTransactionBuilder {
    build_fn: js_sys::Function,
}

#[wasm_bindgen]
impl JsTransactionBuilder {
    /// Create a builder from a JS function.
    #[wasm_bindgen(constructor)]
    pub fn new(build_fn: js_sys::Function) -> JsTransactionBuilder {
        JsTransactionBuilder { build_fn }
    }
}

fn rejected(context: &str, detail: impl core::fmt::Debug) -> CandidateError {
    CandidateError::Rejected(format!("{}: {:?}", context, detail))
}

impl TransactionBuilder for JsTransactionBuilder {
    type Utxo = Utxo;
    type Candidate = JsCandidate;

    fn build(
        &self,
        utxos: &[Utxo],
        outputs: &[PaymentOutput],
        fee: u64,
    ) -> Result<JsCandidate, CandidateError> {
        let utxos = serde_wasm_bindgen::to_value(utxos).map_err(|e| rejected("utxos", e))?;
        let outputs = serde_wasm_bindgen::to_value(outputs).map_err(|e| rejected("outputs", e))?;
        let fee = serde_wasm_bindgen::to_value(&fee).map_err(|e| rejected("fee", e))?;

        let result = self
            .build_fn
            .call3(&JsValue::NULL, &utxos, &outputs, &fee)
            .map_err(|e| rejected("builder threw", e))?;

        let candidate: JsCandidate =
            serde_wasm_bindgen::from_value(result).map_err(|e| rejected("builder result", e))?;
        candidate.checked()
    }
}

/// Parse a JS array of `{ outpoint: { txId, index }, amount }`.
pub fn parse_utxos(value: JsValue) -> Result<Vec<Utxo>, JsValue> {
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| JsValue::from_str(&format!("Invalid UTXO set: {:?}", e)))
}
