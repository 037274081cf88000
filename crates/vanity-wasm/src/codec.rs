//! Stateless helpers: envelope encoding, pattern checks and verification.

use vanity_core::{build_envelope, verify, EncodingError, PatternTarget, Payload};
use wasm_bindgen::prelude::*;

use crate::state::VerificationInfo;

/// Accept a JS string (UTF-8 text) or `Uint8Array` (raw bytes) as payload.
pub fn payload_from_js(value: &JsValue) -> Result<Payload, EncodingError> {
    if let Some(text) = value.as_string() {
        return Ok(Payload::Text(text));
    }
    if value.is_instance_of::<js_sys::Uint8Array>() {
        return Ok(Payload::Bytes(js_sys::Uint8Array::new(value).to_vec()));
    }
    let kind = value
        .js_typeof()
        .as_string()
        .unwrap_or_else(|| "unknown".to_string());
    Err(EncodingError::WrongPayloadType(kind))
}

/// Build an envelope and return it as hex.
#[wasm_bindgen]
pub fn build_envelope_hex(
    version: u32,
    contract_type_id: &str,
    payload: JsValue,
) -> Result<String, JsValue> {
    let payload = payload_from_js(&payload).map_err(|e| JsValue::from_str(&e.to_string()))?;
    build_envelope(version, contract_type_id, payload)
        .map(|envelope| envelope.to_hex())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Whether `identifier` ends in at least `trailing_zero_bits` zero bits.
#[wasm_bindgen]
pub fn matches_pattern(identifier: &str, trailing_zero_bits: u32) -> bool {
    vanity_core::matches(identifier, trailing_zero_bits)
}

/// Number of trailing zero bits in `identifier`.
#[wasm_bindgen]
pub fn trailing_zero_run(identifier: &str) -> u32 {
    vanity_core::trailing_zero_run(identifier)
}

/// Compare the mined identifier with the one the network reported.
#[wasm_bindgen]
pub fn verify_identifier(
    original_identifier: &str,
    trailing_zero_bits: u32,
    network_identifier: &str,
) -> Result<JsValue, JsValue> {
    let target = PatternTarget::new(trailing_zero_bits)
        .map_err(|e| JsValue::from_str(&format!("Invalid target: {}", e)))?;
    VerificationInfo::from(&verify(original_identifier, target, network_identifier)).to_js()
}
