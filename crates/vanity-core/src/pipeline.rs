//! Hand-off from a mined candidate to the external wallet and broadcast
//! services, ending in verification.
//!
//! Broadcast strategies are tried in order. Each failure is recorded and the
//! next strategy attempted; the first network identifier returned is
//! verified against the mined one.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;
use crate::error::FinalizeError;
use crate::verify::{VerificationRecord, Verifier};

/// Signs a mined candidate. Must not alter its identifier.
pub trait SigningWallet<C: Candidate> {
    type Signed;
    type Error: Display;

    fn sign(&self, candidate: &C) -> Result<Self::Signed, Self::Error>;
}

/// One way of submitting a signed transaction.
pub trait Broadcaster<T> {
    type Error: Display;

    /// Short label used in failure reports.
    fn name(&self) -> &str;

    /// Submit `signed` and return the identifier the network assigned.
    fn attempt(&self, signed: &T) -> Result<String, Self::Error>;
}

/// A broadcast strategy that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastFailure {
    pub strategy: String,
    pub message: String,
}

/// A candidate that made it onto the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalized {
    /// Strategy that accepted the transaction.
    pub strategy: String,
    pub record: VerificationRecord,
    /// Strategies that failed before it.
    pub failures: Vec<BroadcastFailure>,
}

/// Sign `candidate`, broadcast it through the first strategy that accepts
/// it, and verify the identifier the network reports.
pub fn finalize<C, W, B>(
    candidate: &C,
    wallet: &W,
    broadcasters: &[B],
    verifier: &Verifier,
) -> Result<Finalized, FinalizeError>
where
    C: Candidate,
    W: SigningWallet<C>,
    B: Broadcaster<W::Signed>,
{
    let signed = wallet
        .sign(candidate)
        .map_err(|e| FinalizeError::Signing(e.to_string()))?;

    let mut failures = Vec::new();
    for broadcaster in broadcasters {
        match broadcaster.attempt(&signed) {
            Ok(network_identifier) => {
                let record = verifier.verify(candidate.identifier(), &network_identifier);
                return Ok(Finalized {
                    strategy: broadcaster.name().to_string(),
                    record,
                    failures,
                });
            }
            Err(err) => {
                log::warn!("broadcast via {} failed: {}", broadcaster.name(), err);
                failures.push(BroadcastFailure {
                    strategy: broadcaster.name().to_string(),
                    message: err.to_string(),
                });
            }
        }
    }

    Err(FinalizeError::NoBroadcaster(failures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternTarget;
    use crate::verify::Divergence;

    struct Tx {
        id: String,
    }

    impl Candidate for Tx {
        fn identifier(&self) -> &str {
            &self.id
        }

        fn raw_bytes(&self) -> Vec<u8> {
            self.id.as_bytes().to_vec()
        }
    }

    /// Signs by tagging the raw bytes; `mutate` simulates a wallet that
    /// re-serializes and changes the txid.
    struct Wallet {
        mutate: bool,
        broken: bool,
    }

    impl SigningWallet<Tx> for Wallet {
        type Signed = String;
        type Error = String;

        fn sign(&self, candidate: &Tx) -> Result<String, String> {
            if self.broken {
                return Err("user rejected".to_string());
            }
            if self.mutate {
                Ok(format!("{}1", &candidate.id[..candidate.id.len() - 1]))
            } else {
                Ok(candidate.id.clone())
            }
        }
    }

    enum Node {
        Up(&'static str),
        Down(&'static str),
    }

    impl Broadcaster<String> for Node {
        type Error = String;

        fn name(&self) -> &str {
            match self {
                Node::Up(name) | Node::Down(name) => name,
            }
        }

        fn attempt(&self, signed: &String) -> Result<String, String> {
            match self {
                Node::Up(_) => Ok(signed.clone()),
                Node::Down(name) => Err(format!("{} unreachable", name)),
            }
        }
    }

    fn mined() -> Tx {
        Tx {
            id: format!("{}00", "ab".repeat(31)),
        }
    }

    fn verifier() -> Verifier {
        Verifier::new(PatternTarget::new(8).unwrap())
    }

    #[test]
    fn test_falls_back_to_next_broadcaster() {
        let wallet = Wallet {
            mutate: false,
            broken: false,
        };
        let nodes = [Node::Down("rpc"), Node::Up("rest")];
        let done = finalize(&mined(), &wallet, &nodes, &verifier()).unwrap();

        assert_eq!(done.strategy, "rest");
        assert_eq!(
            done.failures,
            vec![BroadcastFailure {
                strategy: "rpc".to_string(),
                message: "rpc unreachable".to_string(),
            }]
        );
        assert!(done.record.overall_success());
    }

    #[test]
    fn test_reports_identifier_change() {
        let wallet = Wallet {
            mutate: true,
            broken: false,
        };
        let done = finalize(&mined(), &wallet, &[Node::Up("rpc")], &verifier()).unwrap();
        assert_eq!(done.record.divergence(), Divergence::IdentifierChanged);
    }

    #[test]
    fn test_all_broadcasters_fail() {
        let wallet = Wallet {
            mutate: false,
            broken: false,
        };
        let nodes = [Node::Down("a"), Node::Down("b")];
        match finalize(&mined(), &wallet, &nodes, &verifier()) {
            Err(FinalizeError::NoBroadcaster(failures)) => assert_eq!(failures.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_signing_failure() {
        let wallet = Wallet {
            mutate: false,
            broken: true,
        };
        let err = finalize(&mined(), &wallet, &[Node::Up("rpc")], &verifier()).unwrap_err();
        assert_eq!(err, FinalizeError::Signing("user rejected".to_string()));
    }
}
