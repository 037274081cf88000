//! Envelope construction and serialization.
//!
//! An envelope is the fixed-layout buffer
//! `version ‖ contract_type_id ‖ payload_root_hash ‖ payload_data`, where the
//! root hash is the BLAKE3 digest of the payload.

use std::fmt;

use digest::Digest;

use crate::error::{EncodingError, EnvelopeError};
use crate::hash::digest_32;

/// Length of the payload root hash segment.
pub const ROOT_HASH_LEN: usize = 32;

/// Envelope payload, either UTF-8 text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Bytes(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// A copy of this payload with `suffix` appended, preserving its kind.
    pub fn with_suffix(&self, suffix: &str) -> Payload {
        match self {
            Payload::Text(text) => {
                let mut out = String::with_capacity(text.len() + suffix.len());
                out.push_str(text);
                out.push_str(suffix);
                Payload::Text(out)
            }
            Payload::Bytes(bytes) => {
                let mut out = Vec::with_capacity(bytes.len() + suffix.len());
                out.extend_from_slice(bytes);
                out.extend_from_slice(suffix.as_bytes());
                Payload::Bytes(out)
            }
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

/// An immutable, serialized envelope.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    bytes: Vec<u8>,
    /// Length of the contract type id segment.
    contract_len: usize,
}

impl Envelope {
    pub fn version(&self) -> u8 {
        self.bytes[0]
    }

    pub fn contract_type_id(&self) -> &[u8] {
        &self.bytes[1..1 + self.contract_len]
    }

    pub fn payload_root_hash(&self) -> &[u8] {
        let start = 1 + self.contract_len;
        &self.bytes[start..start + ROOT_HASH_LEN]
    }

    pub fn payload_data(&self) -> &[u8] {
        &self.bytes[1 + self.contract_len + ROOT_HASH_LEN..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Recompute the payload root hash and compare it with the embedded one.
    pub fn verify_root(&self) -> bool {
        crate::hash::blake3(self.payload_data()) == self.payload_root_hash()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("version", &self.version())
            .field("contract_type_id", &hex::encode(self.contract_type_id()))
            .field("payload_root_hash", &hex::encode(self.payload_root_hash()))
            .field("payload_len", &self.payload_data().len())
            .finish()
    }
}

/// Validate a version number and narrow it to a byte.
pub fn parse_version(version: u32) -> Result<u8, EncodingError> {
    u8::try_from(version).map_err(|_| EncodingError::VersionOutOfRange(version))
}

/// Decode an even-length hex contract type id. The empty string is allowed.
pub fn parse_contract_type_id(contract_type_id: &str) -> Result<Vec<u8>, EncodingError> {
    if contract_type_id.len() % 2 != 0 {
        return Err(EncodingError::OddLengthHex(contract_type_id.len()));
    }
    hex::decode(contract_type_id).map_err(|e| EncodingError::InvalidHex(e.to_string()))
}

/// Build an envelope, hashing the payload with BLAKE3.
pub fn build_envelope(
    version: u32,
    contract_type_id: &str,
    payload_data: impl Into<Payload>,
) -> Result<Envelope, EnvelopeError> {
    let version = parse_version(version)?;
    let contract = parse_contract_type_id(contract_type_id)?;
    let payload = payload_data.into();
    let root = crate::hash::blake3(payload.as_bytes());
    Ok(assemble(version, &contract, payload.as_bytes(), root))
}

/// Build an envelope with a substitute payload hash primitive. Fails with
/// `HashLength` unless `D` produces 32 bytes.
pub fn build_envelope_with<D: Digest>(
    version: u32,
    contract_type_id: &str,
    payload_data: impl Into<Payload>,
) -> Result<Envelope, EnvelopeError> {
    let version = parse_version(version)?;
    let contract = parse_contract_type_id(contract_type_id)?;
    let payload = payload_data.into();
    let root = digest_32::<D>(payload.as_bytes())?;
    Ok(assemble(version, &contract, payload.as_bytes(), root))
}

/// Concatenate pre-validated segments.
///
/// Mining strategies validate the header once and call this per attempt.
pub(crate) fn assemble(
    version: u8,
    contract_type_id: &[u8],
    payload: &[u8],
    root: [u8; ROOT_HASH_LEN],
) -> Envelope {
    let mut bytes = Vec::with_capacity(1 + contract_type_id.len() + ROOT_HASH_LEN + payload.len());
    bytes.push(version);
    bytes.extend_from_slice(contract_type_id);
    bytes.extend_from_slice(&root);
    bytes.extend_from_slice(payload);

    Envelope {
        bytes,
        contract_len: contract_type_id.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::blake3;

    #[test]
    fn test_envelope_layout() {
        let envelope = build_envelope(1, "0a0b", "hello").unwrap();

        assert_eq!(envelope.len(), 1 + 2 + 32 + 5);
        assert_eq!(envelope.version(), 1);
        assert_eq!(envelope.contract_type_id(), &[0x0a, 0x0b]);
        assert_eq!(envelope.payload_root_hash(), &blake3(b"hello"));
        assert_eq!(envelope.payload_data(), b"hello");

        assert_eq!(&envelope.as_bytes()[0..3], &[0x01, 0x0a, 0x0b]);
        assert_eq!(&envelope.as_bytes()[35..], b"hello");
    }

    #[test]
    fn test_length_invariant_across_inputs() {
        let cases: [(u32, &str, Payload); 4] = [
            (0, "", Payload::Text(String::new())),
            (255, "ff", Payload::Bytes(vec![0u8; 100])),
            (7, "deadbeefcafe", Payload::from("vanity")),
            (42, "00", Payload::Bytes(vec![1, 2, 3])),
        ];
        for (version, contract, payload) in cases {
            let contract_len = contract.len() / 2;
            let payload_len = payload.len();
            let envelope = build_envelope(version, contract, payload).unwrap();
            assert_eq!(envelope.len(), 1 + contract_len + 32 + payload_len);
            assert!(envelope.verify_root());
        }
    }

    #[test]
    fn test_root_hash_recomputes() {
        let payload = vec![0x5a; 1024];
        let envelope = build_envelope(3, "beef", payload.clone()).unwrap();
        assert_eq!(envelope.payload_root_hash(), &blake3(&payload));
    }

    #[test]
    fn test_rejects_version_out_of_range() {
        let err = build_envelope(256, "", "x").unwrap_err();
        assert_eq!(
            err,
            EnvelopeError::Encoding(EncodingError::VersionOutOfRange(256))
        );
    }

    #[test]
    fn test_rejects_odd_hex() {
        let err = build_envelope(1, "abc", "x").unwrap_err();
        assert_eq!(err, EnvelopeError::Encoding(EncodingError::OddLengthHex(3)));
    }

    #[test]
    fn test_rejects_non_hex() {
        let err = build_envelope(1, "zz", "x").unwrap_err();
        assert!(matches!(
            err,
            EnvelopeError::Encoding(EncodingError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_substitute_hash_fills_root() {
        let envelope = build_envelope_with::<sha2::Sha256>(1, "ab", "x").unwrap();
        assert_eq!(envelope.len(), 1 + 1 + 32 + 1);
        assert_eq!(envelope.payload_root_hash(), sha2::Sha256::digest(b"x").as_slice());
        assert!(!envelope.verify_root());
    }

    #[test]
    fn test_wide_hash_is_rejected() {
        let err = build_envelope_with::<sha2::Sha512>(1, "", "x").unwrap_err();
        assert_eq!(err, EnvelopeError::HashLength(64));
    }

    #[test]
    fn test_payload_suffix_keeps_kind() {
        let text = Payload::from("abc").with_suffix("-01");
        assert_eq!(text, Payload::Text("abc-01".to_string()));
        let bytes = Payload::from(vec![0u8]).with_suffix("1");
        assert_eq!(bytes, Payload::Bytes(vec![0u8, b'1']));
    }

    #[test]
    fn test_tampered_root_detected() {
        let envelope = build_envelope(1, "", "payload").unwrap();
        let mut bytes = envelope.clone().into_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 1;
        let tampered = Envelope {
            bytes,
            contract_len: 0,
        };
        assert!(envelope.verify_root());
        assert!(!tampered.verify_root());
    }
}
