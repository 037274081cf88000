//! Candidate transactions and the strategies that produce one per nonce.
//!
//! Two strategies ship with the crate: [`EnvelopeStrategy`] hashes an
//! envelope in-process, [`BuilderStrategy`] delegates to an external
//! [`TransactionBuilder`] and varies the payment amount.

use serde::{Deserialize, Serialize};

use crate::envelope::{self, assemble, Envelope, Payload};
use crate::error::{CandidateError, EnvelopeError};
use crate::hash::{Blake3Hasher, IdentifierHasher};

/// Digits in a formatted nonce. Wide enough for `u64::MAX`.
pub const NONCE_WIDTH: usize = 20;

/// Render a nonce as a fixed-width zero-padded decimal string.
pub fn format_nonce(nonce: u64) -> String {
    format!("{:0width$}", nonce, width = NONCE_WIDTH)
}

/// One fully constructed, hashable transaction-like object.
pub trait Candidate {
    /// Hex identifier as the ledger reports it.
    fn identifier(&self) -> &str;

    /// Serialized bytes handed to the signing wallet.
    fn raw_bytes(&self) -> Vec<u8>;
}

/// Produces the candidate for a given nonce.
pub trait CandidateStrategy {
    type Output: Candidate;

    fn produce(&self, nonce: u64) -> Result<Self::Output, CandidateError>;
}

impl<S: CandidateStrategy + ?Sized> CandidateStrategy for &S {
    type Output = S::Output;

    fn produce(&self, nonce: u64) -> Result<Self::Output, CandidateError> {
        (**self).produce(nonce)
    }
}

/// Reference to a previous transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outpoint {
    pub tx_id: String,
    pub index: u32,
}

/// Spendable output as seen by the builder strategy.
///
/// Wallet integrations implement this once for whatever UTXO shape their SDK
/// returns.
pub trait UtxoLike {
    fn amount(&self) -> u64;
    fn outpoint(&self) -> Outpoint;
}

/// Plain owned UTXO, for callers without an SDK type of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub outpoint: Outpoint,
    pub amount: u64,
}

impl UtxoLike for Utxo {
    fn amount(&self) -> u64 {
        self.amount
    }

    fn outpoint(&self) -> Outpoint {
        self.outpoint.clone()
    }
}

/// A payment requested from the transaction builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutput {
    pub address: String,
    pub amount: u64,
}

/// External capability that turns UTXOs and outputs into a candidate.
pub trait TransactionBuilder {
    type Utxo: UtxoLike;
    type Candidate: Candidate;

    fn build(
        &self,
        utxos: &[Self::Utxo],
        outputs: &[PaymentOutput],
        fee: u64,
    ) -> Result<Self::Candidate, CandidateError>;
}

/// Candidate produced by hashing an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeCandidate {
    pub envelope: Envelope,
    pub digest: [u8; 32],
    pub identifier: String,
    pub nonce: u64,
}

impl Candidate for EnvelopeCandidate {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn raw_bytes(&self) -> Vec<u8> {
        self.envelope.as_bytes().to_vec()
    }
}

/// Varies the envelope payload with a nonce suffix and hashes the result.
#[derive(Debug, Clone)]
pub struct EnvelopeStrategy<H = Blake3Hasher> {
    version: u8,
    contract_type_id: Vec<u8>,
    payload: Payload,
    hasher: H,
}

impl EnvelopeStrategy<Blake3Hasher> {
    /// Validate the envelope header once; BLAKE3 identifiers.
    pub fn new(
        version: u32,
        contract_type_id: &str,
        payload: impl Into<Payload>,
    ) -> Result<Self, EnvelopeError> {
        Self::with_hasher(version, contract_type_id, payload, Blake3Hasher)
    }
}

impl<H: IdentifierHasher> EnvelopeStrategy<H> {
    pub fn with_hasher(
        version: u32,
        contract_type_id: &str,
        payload: impl Into<Payload>,
        hasher: H,
    ) -> Result<Self, EnvelopeError> {
        Ok(EnvelopeStrategy {
            version: envelope::parse_version(version)?,
            contract_type_id: envelope::parse_contract_type_id(contract_type_id)?,
            payload: payload.into(),
            hasher,
        })
    }

    /// The envelope that `nonce` maps to.
    pub fn envelope_for(&self, nonce: u64) -> Envelope {
        let payload = self.payload.with_suffix(&format_nonce(nonce));
        let root = crate::hash::blake3(payload.as_bytes());
        assemble(self.version, &self.contract_type_id, payload.as_bytes(), root)
    }
}

impl<H: IdentifierHasher> CandidateStrategy for EnvelopeStrategy<H> {
    type Output = EnvelopeCandidate;

    fn produce(&self, nonce: u64) -> Result<EnvelopeCandidate, CandidateError> {
        let envelope = self.envelope_for(nonce);
        let digest = self.hasher.digest(envelope.as_bytes());
        let identifier = self.hasher.identifier_hex(&digest);
        Ok(EnvelopeCandidate {
            envelope,
            digest,
            identifier,
            nonce,
        })
    }
}

/// Varies the payment amount by the nonce and asks an external builder for
/// the resulting transaction.
pub struct BuilderStrategy<B: TransactionBuilder> {
    builder: B,
    utxos: Vec<B::Utxo>,
    recipient: String,
    base_amount: u64,
    fee: u64,
    available: u64,
}

impl<B: TransactionBuilder> BuilderStrategy<B> {
    pub fn new(
        builder: B,
        utxos: Vec<B::Utxo>,
        recipient: impl Into<String>,
        base_amount: u64,
        fee: u64,
    ) -> Self {
        let available = utxos
            .iter()
            .fold(0u64, |sum, utxo| sum.saturating_add(utxo.amount()));
        BuilderStrategy {
            builder,
            utxos,
            recipient: recipient.into(),
            base_amount,
            fee,
            available,
        }
    }

    /// Total value of the UTXO set.
    pub fn available(&self) -> u64 {
        self.available
    }

    /// Payment amount used for `nonce`.
    pub fn amount_for(&self, nonce: u64) -> Result<u64, CandidateError> {
        self.base_amount
            .checked_add(nonce)
            .ok_or(CandidateError::AmountOverflow(nonce))
    }
}

impl<B: TransactionBuilder> CandidateStrategy for BuilderStrategy<B> {
    type Output = B::Candidate;

    fn produce(&self, nonce: u64) -> Result<B::Candidate, CandidateError> {
        let amount = self.amount_for(nonce)?;
        let needed = amount
            .checked_add(self.fee)
            .ok_or(CandidateError::AmountOverflow(nonce))?;
        if needed > self.available {
            return Err(CandidateError::InsufficientFunds {
                needed,
                available: self.available,
            });
        }

        let outputs = [PaymentOutput {
            address: self.recipient.clone(),
            amount,
        }];
        self.builder.build(&self.utxos, &outputs, self.fee)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::hash::{blake3, DoubleSha256Hasher};

    /// Test builder that fabricates a txid from the payment amount.
    pub(crate) struct AmountBuilder;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct AmountTx {
        pub id: String,
        pub amount: u64,
    }

    impl Candidate for AmountTx {
        fn identifier(&self) -> &str {
            &self.id
        }

        fn raw_bytes(&self) -> Vec<u8> {
            self.amount.to_le_bytes().to_vec()
        }
    }

    impl TransactionBuilder for AmountBuilder {
        type Utxo = Utxo;
        type Candidate = AmountTx;

        fn build(
            &self,
            _utxos: &[Utxo],
            outputs: &[PaymentOutput],
            fee: u64,
        ) -> Result<AmountTx, CandidateError> {
            let amount = outputs[0].amount;
            if amount % 7 == 0 {
                return Err(CandidateError::Rejected(format!("amount {} rejected", amount)));
            }
            let mut data = amount.to_le_bytes().to_vec();
            data.extend_from_slice(&fee.to_le_bytes());
            Ok(AmountTx {
                id: hex::encode(blake3(&data)),
                amount,
            })
        }
    }

    pub(crate) fn utxo(amount: u64) -> Utxo {
        Utxo {
            outpoint: Outpoint {
                tx_id: "11".repeat(32),
                index: 0,
            },
            amount,
        }
    }

    #[test]
    fn test_format_nonce_is_fixed_width() {
        assert_eq!(format_nonce(0), "00000000000000000000");
        assert_eq!(format_nonce(42), "00000000000000000042");
        assert_eq!(format_nonce(u64::MAX), "18446744073709551615");
    }

    #[test]
    fn test_envelope_strategy_varies_payload() {
        let strategy = EnvelopeStrategy::new(1, "cafe", "memo:").unwrap();
        let a = strategy.produce(1).unwrap();
        let b = strategy.produce(2).unwrap();

        assert_ne!(a.identifier, b.identifier);
        assert_eq!(a.envelope.payload_data(), b"memo:00000000000000000001");
        assert_eq!(a.identifier, hex::encode(blake3(a.envelope.as_bytes())));
        assert_eq!(a.identifier.len(), 64);
        assert_eq!(a.raw_bytes(), a.envelope.as_bytes());
    }

    #[test]
    fn test_envelope_for_carries_blake3_root() {
        let strategy = EnvelopeStrategy::new(2, "beef", vec![0u8, 1]).unwrap();
        let envelope = strategy.envelope_for(7);
        assert!(envelope.verify_root());
        assert_eq!(envelope.payload_root_hash(), &blake3(envelope.payload_data()));
        assert_eq!(envelope.len(), 1 + 2 + 32 + 2 + 20);
    }

    #[test]
    fn test_envelope_strategy_is_deterministic() {
        let strategy = EnvelopeStrategy::new(1, "", "x").unwrap();
        assert_eq!(strategy.produce(9).unwrap(), strategy.produce(9).unwrap());
    }

    #[test]
    fn test_envelope_strategy_with_double_sha() {
        let strategy = EnvelopeStrategy::with_hasher(1, "", "x", DoubleSha256Hasher).unwrap();
        let candidate = strategy.produce(0).unwrap();
        let mut expected = crate::hash::double_sha256(candidate.envelope.as_bytes());
        expected.reverse();
        assert_eq!(candidate.identifier, hex::encode(expected));
    }

    #[test]
    fn test_envelope_strategy_validates_header() {
        assert!(EnvelopeStrategy::new(300, "", "x").is_err());
        assert!(EnvelopeStrategy::new(1, "f", "x").is_err());
    }

    #[test]
    fn test_builder_strategy_varies_amount() {
        let strategy = BuilderStrategy::new(AmountBuilder, vec![utxo(10_000)], "addr", 1_000, 10);
        assert_eq!(strategy.available(), 10_000);
        let tx = strategy.produce(5).unwrap();
        assert_eq!(tx.amount, 1_005);
    }

    #[test]
    fn test_builder_strategy_surfaces_rejection() {
        let strategy = BuilderStrategy::new(AmountBuilder, vec![utxo(10_000)], "addr", 1_000, 10);
        // 1_001 is divisible by 7
        assert!(matches!(strategy.produce(1), Err(CandidateError::Rejected(_))));
    }

    #[test]
    fn test_builder_strategy_insufficient_funds() {
        let strategy = BuilderStrategy::new(AmountBuilder, vec![utxo(1_000)], "addr", 990, 10);
        assert!(strategy.produce(0).is_ok());
        assert_eq!(
            strategy.produce(1).unwrap_err(),
            CandidateError::InsufficientFunds {
                needed: 1_001,
                available: 1_000
            }
        );
    }

    #[test]
    fn test_builder_strategy_amount_overflow() {
        let strategy = BuilderStrategy::new(AmountBuilder, vec![utxo(1)], "addr", u64::MAX, 0);
        assert_eq!(strategy.produce(1).unwrap_err(), CandidateError::AmountOverflow(1));
    }
}
