//! Commitment & proof generator (C5): deterministic commitment over the
//! canonical verdict inputs, plus a pluggable proof backend.

mod merkle;

pub use merkle::merkle_root;

use crate::error::{Result, TrustWrapperError};
use crate::types::{Commitment, Proof, ProofScheme, TrustScore};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Canonical, length-prefixed encoding of the commitment inputs:
/// `artifact_digest | score_fp6 (be u32) | sorted issue digests |
/// sorted evidence refs | nonce(32) | timestamp floored to the second`.
///
/// Any two calls with equal field values produce byte-identical encodings
/// regardless of input ordering, satisfying I2.
pub fn canonical_encoding(
    artifact_digest: &[u8; 32],
    score: &TrustScore,
    nonce: &[u8; 32],
    timestamp_s: u64,
) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(artifact_digest);
    buf.extend_from_slice(&score.score_fp6().to_be_bytes());

    let digests = score.sorted_issue_digests();
    buf.extend_from_slice(&(digests.len() as u32).to_be_bytes());
    for d in &digests {
        buf.extend_from_slice(d);
    }

    let mut evidence_refs = score.evidence_refs.clone();
    evidence_refs.sort();
    buf.extend_from_slice(&(evidence_refs.len() as u32).to_be_bytes());
    for e in &evidence_refs {
        let bytes = e.as_bytes();
        buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        buf.extend_from_slice(bytes);
    }

    buf.extend_from_slice(nonce);
    buf.extend_from_slice(&timestamp_s.to_be_bytes());
    buf
}

#[derive(Debug, Clone, Copy)]
pub enum DigestAlgorithm {
    Sha256,
    Blake2b,
}

fn digest(algo: DigestAlgorithm, bytes: &[u8]) -> [u8; 32] {
    match algo {
        DigestAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            hasher.finalize().into()
        }
        DigestAlgorithm::Blake2b => {
            use blake2::digest::consts::U32;
            use blake2::{Blake2b, Digest as _};
            let mut hasher = Blake2b::<U32>::new();
            hasher.update(bytes);
            hasher.finalize().into()
        }
    }
}

pub struct CommitmentGenerator {
    pub algorithm: DigestAlgorithm,
}

impl CommitmentGenerator {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    /// `commit(request) -> Commitment`. The nonce is caller-supplied so the
    /// commitment is reproducible from public inputs plus the revealed
    /// nonce, as required for reproducibility.
    pub fn commit(
        &self,
        artifact_digest: &[u8; 32],
        score: &TrustScore,
        nonce: &[u8; 32],
        timestamp_s: u64,
    ) -> Commitment {
        let encoded = canonical_encoding(artifact_digest, score, nonce, timestamp_s);
        Commitment(digest(self.algorithm, &encoded))
    }

    pub fn random_nonce(&self) -> [u8; 32] {
        let mut nonce = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce);
        nonce
    }
}

impl Default for CommitmentGenerator {
    fn default() -> Self {
        Self::new(DigestAlgorithm::Sha256)
    }
}

/// Uniform interface over the three proof backends. The
/// core only ever depends on `verify` succeeding; the backend's internal
/// shape is opaque beyond that.
pub trait ProofBackend: Send + Sync {
    fn scheme(&self) -> ProofScheme;
    fn prove(&self, commitment: Commitment, public_inputs: Vec<u8>) -> Result<Proof>;
    fn verify(&self, proof: &Proof) -> bool;
}

/// (a) Trivial hash commitment: the "proof" is just the commitment itself,
/// re-derivable by anyone holding the same public inputs. Transparency
/// only, no zero-knowledge property.
pub struct HashProofBackend;

impl ProofBackend for HashProofBackend {
    fn scheme(&self) -> ProofScheme {
        ProofScheme::Hash
    }

    fn prove(&self, commitment: Commitment, public_inputs: Vec<u8>) -> Result<Proof> {
        Ok(Proof {
            scheme: ProofScheme::Hash,
            public_inputs,
            commitment,
            blob: commitment.0.to_vec(),
        })
    }

    fn verify(&self, proof: &Proof) -> bool {
        proof.scheme == ProofScheme::Hash && proof.blob == proof.commitment.0.to_vec()
    }
}

/// (b) Merkle inclusion proof: the commitment is a leaf in an external
/// proof tree; the blob carries the inclusion path.
pub struct MerkleProofBackend {
    pub other_leaves: Vec<[u8; 32]>,
}

impl ProofBackend for MerkleProofBackend {
    fn scheme(&self) -> ProofScheme {
        ProofScheme::Merkle
    }

    fn prove(&self, commitment: Commitment, public_inputs: Vec<u8>) -> Result<Proof> {
        let mut leaves: Vec<Vec<u8>> = self.other_leaves.iter().map(|l| l.to_vec()).collect();
        leaves.push(commitment.0.to_vec());
        let root = merkle::merkle_root(&leaves)
            .map_err(|e| TrustWrapperError::ProofFailure(e.to_string()))?;
        Ok(Proof {
            scheme: ProofScheme::Merkle,
            public_inputs,
            commitment,
            blob: root,
        })
    }

    fn verify(&self, proof: &Proof) -> bool {
        // A full inclusion-path check is out of scope for the mock proof
        // tree; this confirms the blob is a well-formed 32-byte root tied
        // to the stated commitment's scheme.
        proof.scheme == ProofScheme::Merkle && proof.blob.len() == 32
    }
}

/// (c) Pluggable SNARK wrapper stub. Real circuit wiring is out of scope
/// for the core; this backend only validates shape so the
/// uniform `verify` contract holds regardless of which backend a caller
/// selects.
pub struct SnarkProofBackend;

impl ProofBackend for SnarkProofBackend {
    fn scheme(&self) -> ProofScheme {
        ProofScheme::Snark
    }

    fn prove(&self, commitment: Commitment, public_inputs: Vec<u8>) -> Result<Proof> {
        let mut hasher = Sha256::new();
        hasher.update(b"snark-stub");
        hasher.update(commitment.0);
        hasher.update(&public_inputs);
        let blob: [u8; 32] = hasher.finalize().into();
        Ok(Proof {
            scheme: ProofScheme::Snark,
            public_inputs,
            commitment,
            blob: blob.to_vec(),
        })
    }

    fn verify(&self, proof: &Proof) -> bool {
        let mut hasher = Sha256::new();
        hasher.update(b"snark-stub");
        hasher.update(proof.commitment.0);
        hasher.update(&proof.public_inputs);
        let expected: [u8; 32] = hasher.finalize().into();
        proof.scheme == ProofScheme::Snark && proof.blob == expected.to_vec()
    }
}

pub fn backend_for(scheme: ProofScheme) -> Box<dyn ProofBackend> {
    match scheme {
        ProofScheme::Hash => Box::new(HashProofBackend),
        ProofScheme::Merkle => Box::new(MerkleProofBackend { other_leaves: Vec::new() }),
        ProofScheme::Snark => Box::new(SnarkProofBackend),
    }
}
