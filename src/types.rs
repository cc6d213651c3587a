//! Shared data model for the verification engine and the consensus fabric.
//!
//! Every component downstream of the detector and scorer talks in terms of
//! these types rather than its own ad-hoc structs, so a `VerificationResult`
//! can be serialized (CBOR or JSON) without component-specific glue.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_unix_s() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Typed descriptor of what an `Artifact`'s opaque bytes represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    Text,
    Decision,
    MetricClaim,
    Transaction,
}

/// The AI-produced output under verification. Immutable for the lifetime
/// of a verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Text,
            bytes: s.into().into_bytes(),
        }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes).unwrap_or("")
    }

    /// SHA-256 digest of the artifact bytes, used as `artifact_digest` in
    /// commitment construction.
    pub fn digest(&self) -> [u8; 32] {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hasher.finalize().into()
    }
}

/// Closed set of defect kinds a detector may emit. Ranked by severity for
/// tie-breaking in `TrustScore` comparisons: temporal > statistical >
/// nonexistent_api > policy > overconfidence > oracle_deviation > other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueKind {
    Other,
    OracleDeviation,
    Overconfidence,
    Policy,
    NonexistentApi,
    StatisticalFabrication,
    TemporalImpossibility,
}

impl IssueKind {
    /// Higher rank sorts first in tie-breaks (rank is the reverse of the
    /// `Ord` derive above, which is ascending: we want temporal to win).
    /// Consumed by `TrustScorer::score` to order `TrustScore::issues`
    /// (highest severity first) whenever two issues carry the same
    /// confidence — the tie-break spec.md's `TrustScore` section names.
    /// Not used by `sorted_issue_digests`: digest bytes are sorted purely
    /// by value there, independent of severity, since I2 only requires the
    /// commitment to be a pure function of the (unordered) issue set.
    pub fn severity_rank(self) -> u8 {
        match self {
            IssueKind::TemporalImpossibility => 6,
            IssueKind::StatisticalFabrication => 5,
            IssueKind::NonexistentApi => 4,
            IssueKind::Policy => 3,
            IssueKind::Overconfidence => 2,
            IssueKind::OracleDeviation => 1,
            IssueKind::Other => 0,
        }
    }

    /// Default penalty weight used by the trust scorer.
    pub fn penalty_weight(self) -> f64 {
        match self {
            IssueKind::TemporalImpossibility => 0.40,
            IssueKind::StatisticalFabrication => 0.30,
            IssueKind::NonexistentApi => 0.30,
            IssueKind::Policy => 0.50,
            IssueKind::Overconfidence => 0.20,
            IssueKind::OracleDeviation => 0.0, // applied as a flat penalty, not per-issue
            IssueKind::Other => 0.10,
        }
    }
}

/// A single detected defect. Created by the detector layer, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub confidence: f64,
    pub location: Option<String>,
    pub evidence: Option<String>,
}

impl Issue {
    pub fn new(kind: IssueKind, confidence: f64) -> Self {
        Self {
            kind,
            confidence: confidence.clamp(0.0, 1.0),
            location: None,
            evidence: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    /// Content address for this issue (I1): a digest over its fields, so a
    /// `TrustScore`'s issue list can be referenced without re-embedding it.
    pub fn digest(&self) -> [u8; 32] {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update([self.kind as u8]);
        hasher.update((self.confidence.to_bits()).to_be_bytes());
        if let Some(loc) = &self.location {
            hasher.update(loc.as_bytes());
        }
        if let Some(ev) = &self.evidence {
            hasher.update(ev.as_bytes());
        }
        hasher.finalize().into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Borderline,
    Reject,
}

impl Verdict {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            Verdict::Pass
        } else if score >= 0.5 {
            Verdict::Borderline
        } else {
            Verdict::Reject
        }
    }
}

/// Result of running the trust scorer over a set of issues and evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustScore {
    pub score: f64,
    pub verdict: Verdict,
    pub issues: Vec<Issue>,
    pub evidence_refs: Vec<String>,
}

impl TrustScore {
    /// Sorted issue digests, used directly in commitment construction (I1).
    /// Sorted by digest byte value, not by `IssueKind::severity_rank` — the
    /// commitment only needs a canonical ordering of the issue set, not a
    /// severity ranking.
    pub fn sorted_issue_digests(&self) -> Vec<[u8; 32]> {
        let mut digests: Vec<[u8; 32]> = self.issues.iter().map(Issue::digest).collect();
        digests.sort();
        digests
    }

    /// Fixed-point score representation with scale 1e6, as used on the wire
    /// (`score_fp6` on the wire).
    pub fn score_fp6(&self) -> u32 {
        (self.score.clamp(0.0, 1.0) * 1_000_000.0).round() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OracleDataType {
    Price,
    Weather,
    Sports,
    Custom,
}

impl OracleDataType {
    /// Default freshness window in seconds.
    pub fn default_freshness_window_s(self) -> u64 {
        match self {
            OracleDataType::Price => 300,
            OracleDataType::Weather => 1800,
            OracleDataType::Sports => 120,
            OracleDataType::Custom => 300,
        }
    }

    /// Default deviation threshold for numeric consensus.
    pub fn default_deviation_threshold(self) -> f64 {
        match self {
            OracleDataType::Price => 0.02,
            OracleDataType::Weather => 0.05,
            OracleDataType::Sports => 0.05,
            OracleDataType::Custom => 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleDataPoint {
    pub oracle_id: String,
    pub data_type: OracleDataType,
    pub value: OracleValue,
    pub timestamp: u64,
    pub confidence: f64,
    pub source_address: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OracleValue {
    Numeric(f64),
    Text(String),
}

impl OracleValue {
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            OracleValue::Numeric(v) => Some(*v),
            OracleValue::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleQuery {
    pub query_id: String,
    pub data_type: OracleDataType,
    pub parameters: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

/// Outcome of aggregating several `OracleDataPoint`s for one query (C2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConsensus {
    pub data_type: OracleDataType,
    pub value: OracleValue,
    pub confidence: f64,
    pub consensus_achieved: bool,
    pub max_deviation: f64,
    pub contributing_sources: usize,
}

/// 32-byte digest binding a verdict to its canonical inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofScheme {
    Hash,
    Merkle,
    Snark,
}

/// Opaque proof blob plus the public inputs needed to verify it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    pub scheme: ProofScheme,
    pub public_inputs: Vec<u8>,
    pub commitment: Commitment,
    pub blob: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChainType {
    Ethereum,
    Polygon,
    Cardano,
    Solana,
    Bitcoin,
    Ton,
    Icp,
    Custom,
}

impl ChainType {
    /// Confirmation depth required before a bridge message's delivery is
    /// considered final.
    pub fn confirmation_depth(self) -> u64 {
        match self {
            ChainType::Ethereum | ChainType::Polygon | ChainType::Ton | ChainType::Icp => 12,
            ChainType::Cardano => 6,
            ChainType::Solana => 1,
            ChainType::Bitcoin => 6,
            ChainType::Custom => 1,
        }
    }
}

impl std::fmt::Display for ChainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainMetrics {
    pub chain_id: ChainType,
    pub block_height: u64,
    pub block_time_s: f64,
    pub gas_or_fee: f64,
    pub finality_s: f64,
    pub last_updated: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainVerificationStatus {
    Verified,
    Pending,
    Rejected,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainVerificationResult {
    pub chain_type: ChainType,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub status: ChainVerificationStatus,
    pub confidence: f64,
    pub gas_used: f64,
    pub execution_time_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeMessageType {
    VerificationRequest,
    VerificationResponse,
    ConsensusVote,
    ConsensusResult,
    HealthCheck,
    Sync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeMessageStatus {
    Pending,
    Transmitted,
    Confirmed,
    Failed,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub message_id: String,
    pub message_type: BridgeMessageType,
    pub source_chain: ChainType,
    pub target_chain: ChainType,
    pub payload: Vec<u8>,
    pub priority: Priority,
    pub retry_count: u32,
    pub max_retries: u32,
    pub status: BridgeMessageStatus,
    pub created_at: u64,
    pub deadline: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusVote {
    pub vote_id: String,
    pub request_id: String,
    pub voter_chain: ChainType,
    pub value: bool,
    pub confidence: f64,
    pub weight: f64,
    pub timestamp: u64,
    pub signature: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusAlgorithm {
    Pbft,
    HotStuff,
    Weighted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusState {
    Collecting,
    QuorumReached,
    Finalized,
    TimedOut,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub decided_value: bool,
    pub votes_for: usize,
    pub votes_against: usize,
    pub total_weight: f64,
    pub agreeing_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyShare {
    pub share_id: u32,
    pub share_value: Vec<u8>,
    pub public_commitment: Vec<u8>,
    pub threshold: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialSignature {
    pub signer_id: u32,
    pub share_value: Vec<u8>,
    pub message_hash: Vec<u8>,
    pub scheme: ThresholdScheme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdScheme {
    Bls,
    Schnorr,
    Ecdsa,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdSignature {
    pub signature: Vec<u8>,
    pub signers: Vec<u32>,
    pub threshold: u32,
    pub message_hash: Vec<u8>,
    pub scheme: ThresholdScheme,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub request_id: String,
    pub artifact_digest: [u8; 32],
    pub commitment: Commitment,
    pub proof: Proof,
    pub participating_chains: Vec<ChainType>,
    pub consensus_algorithm: Option<ConsensusAlgorithm>,
    pub deadline: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusStats {
    pub algorithm: ConsensusAlgorithm,
    pub votes_collected: usize,
    pub timed_out: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub request_id: String,
    pub final_verdict: Verdict,
    pub aggregated_score: f64,
    pub chain_receipts: Vec<ChainVerificationResult>,
    pub signature: Option<ThresholdSignature>,
    pub consensus_stats: ConsensusStats,
}

/// Context accompanying a verification request: the clock the detector
/// should reason against, evidence requirements for the oracle layer, and
/// an application-supplied policy predicate set.
#[derive(Debug, Clone, Default)]
pub struct VerificationContext {
    pub reference_unix_time: Option<u64>,
    pub evidence_requirements: Vec<OracleQuery>,
    pub allowlist: Option<Vec<String>>,
    pub denylist: Vec<String>,
    /// Overrides the orchestrator's default (`config.timeout_seconds` from
    /// now) deadline for this single verification.
    pub deadline_unix_s: Option<u64>,
}

impl VerificationContext {
    pub fn clock_now_s(&self) -> u64 {
        self.reference_unix_time.unwrap_or_else(now_unix_s)
    }
}

/// Target chains, algorithm override, and threshold-signature group for one
/// verification (the "policy" argument to C12's `verify`).
#[derive(Debug, Clone, Default)]
pub struct VerificationPolicy {
    pub participating_chains: Vec<ChainType>,
    pub consensus_algorithm_override: Option<ConsensusAlgorithm>,
    pub threshold_signature_group: Option<String>,
    pub proof_backend: ProofScheme,
}

impl Default for ProofScheme {
    fn default() -> Self {
        ProofScheme::Hash
    }
}
