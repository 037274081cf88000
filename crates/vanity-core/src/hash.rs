//! Digest primitives and the identifier hashers used by envelope mining.

use digest::Digest;
use sha2::Sha256;

use crate::error::EnvelopeError;

/// BLAKE3 digest of `data`.
#[inline]
pub fn blake3(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Bitcoin's double SHA256: SHA256(SHA256(data)).
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// Hash `data` with any `Digest` and insist on a 32-byte output.
///
/// Every hasher this crate ships produces 32 bytes; the check guards against
/// a substituted primitive with a different output size.
pub fn digest_32<D: Digest>(data: &[u8]) -> Result<[u8; 32], EnvelopeError> {
    let out = D::digest(data);
    <[u8; 32]>::try_from(out.as_slice()).map_err(|_| EnvelopeError::HashLength(out.len()))
}

/// Reverse the byte order of a 32-byte array.
///
/// Bitcoin-family ledgers display double-SHA256 txids in reverse byte order.
#[inline]
pub fn reverse_bytes(bytes: &[u8; 32]) -> [u8; 32] {
    let mut reversed = *bytes;
    reversed.reverse();
    reversed
}

/// Derives a candidate identifier from raw envelope bytes.
pub trait IdentifierHasher {
    /// Raw 32-byte digest.
    fn digest(&self, data: &[u8]) -> [u8; 32];

    /// The identifier as the ledger displays it. Defaults to plain hex.
    fn identifier_hex(&self, digest: &[u8; 32]) -> String {
        hex::encode(digest)
    }
}

/// BLAKE3 identifiers, displayed in natural byte order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl IdentifierHasher for Blake3Hasher {
    #[inline]
    fn digest(&self, data: &[u8]) -> [u8; 32] {
        blake3(data)
    }
}

/// Double-SHA256 txids, displayed byte-reversed like Bitcoin.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleSha256Hasher;

impl IdentifierHasher for DoubleSha256Hasher {
    #[inline]
    fn digest(&self, data: &[u8]) -> [u8; 32] {
        double_sha256(data)
    }

    fn identifier_hex(&self, digest: &[u8; 32]) -> String {
        hex::encode(reverse_bytes(digest))
    }
}

impl<H: IdentifierHasher + ?Sized> IdentifierHasher for &H {
    fn digest(&self, data: &[u8]) -> [u8; 32] {
        (**self).digest(data)
    }

    fn identifier_hex(&self, digest: &[u8; 32]) -> String {
        (**self).identifier_hex(digest)
    }
}
