use crate::digest::{Commitment, PublicInputs};
use sha2::{Digest, Sha256};

const DOMAIN_PROOF: &[u8] = b"NVK_PROOF_V1";

/// Proofs shorter than this fail the structural gate before any hash work.
pub const MIN_PROOF_LEN: usize = 64;

/// Proof subsystem failures. `Malformed` is the cheap structural rejection;
/// `Backend` carries an opaque failure from a real prover.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProofError {
    Malformed { len: usize },
    Backend { detail: String },
}

impl std::fmt::Display for ProofError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProofError::Malformed { len } => {
                write!(f, "proof blob is {len} bytes, minimum {MIN_PROOF_LEN}")
            }
            ProofError::Backend { detail } => write!(f, "proof backend failure: {detail}"),
        }
    }
}

impl std::error::Error for ProofError {}

/// Boundary to the proof subsystem. A real STARK/SNARK prover implements
/// this; the engine only sees opaque bytes and a boolean predicate.
pub trait ProofBackend {
    /// Produce proof bytes for a commitment over the given public inputs.
    fn generate(
        &self,
        commitment: &Commitment,
        inputs: &PublicInputs,
    ) -> Result<Vec<u8>, ProofError>;

    /// Check proof bytes against a commitment and public inputs.
    /// Structural problems are errors; a well-formed proof that does not
    /// match is `Ok(false)`.
    fn verify(
        &self,
        proof_bytes: &[u8],
        commitment: &Commitment,
        inputs: &PublicInputs,
    ) -> Result<bool, ProofError>;
}

/// Deterministic hash-based stand-in for a real prover. The blob is two
/// chained digests (64 bytes), so it exercises the same length gate and
/// verification path a real backend would.
#[derive(Copy, Clone, Debug, Default)]
pub struct HashProofBackend;

impl HashProofBackend {
    fn blob(commitment: &Commitment, inputs: &PublicInputs) -> [u8; 64] {
        let mut h = Sha256::new();
        h.update(DOMAIN_PROOF);
        h.update(commitment);
        h.update(inputs.holdings_digest);
        h.update(inputs.prices_digest);
        h.update(inputs.liabilities_digest);
        let d1: [u8; 32] = h.finalize().into();

        let mut h2 = Sha256::new();
        h2.update(DOMAIN_PROOF);
        h2.update(d1);
        let d2: [u8; 32] = h2.finalize().into();

        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&d1);
        out[32..].copy_from_slice(&d2);
        out
    }
}

impl ProofBackend for HashProofBackend {
    fn generate(
        &self,
        commitment: &Commitment,
        inputs: &PublicInputs,
    ) -> Result<Vec<u8>, ProofError> {
        Ok(Self::blob(commitment, inputs).to_vec())
    }

    fn verify(
        &self,
        proof_bytes: &[u8],
        commitment: &Commitment,
        inputs: &PublicInputs,
    ) -> Result<bool, ProofError> {
        if proof_bytes.len() < MIN_PROOF_LEN {
            return Err(ProofError::Malformed {
                len: proof_bytes.len(),
            });
        }
        Ok(proof_bytes == Self::blob(commitment, inputs))
    }
}
