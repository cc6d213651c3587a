//! Universal chain adapter (C6): per-chain operations behind one trait, so
//! the consensus fabric never needs to know which concrete chain it's
//! talking to.

pub mod connection;

use crate::error::{Result, TrustWrapperError};
use crate::types::{
    ChainMetrics, ChainType, ChainVerificationResult, ChainVerificationStatus, ConsensusVote,
    Verdict, now_unix_s,
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct AdapterStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub avg_fee: f64,
}

/// Per-chain driver. Adapters translate the shared data model into
/// chain-specific transactions and back; they never interpret the verdict
/// they're asked to submit.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn chain_type(&self) -> ChainType;

    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    fn is_connected(&self) -> bool;

    async fn get_chain_metrics(&self) -> Result<ChainMetrics>;

    /// Chain-local re-check: maps the supplied confidence to
    /// verified/pending/rejected using the same thresholds as the
    /// trust scorer, independent of cross-chain consensus.
    async fn verify_ai_output(&self, agent_id: &str, confidence: f64) -> Result<ChainVerificationResult>;

    async fn submit_consensus_vote(&self, request_id: &str, value: bool, confidence: f64, weight: f64) -> Result<String>;
    async fn get_consensus_votes(&self, request_id: &str) -> Result<Vec<ConsensusVote>>;

    /// Returns `true` once the chain reports the submission has passed its
    /// required confirmation depth; `false` otherwise. Never errors
    /// on "not yet", only on a genuine adapter fault.
    async fn confirm_message_delivery(&self, message_id: &str) -> Result<bool>;

    fn get_stats(&self) -> AdapterStats;
}

fn synthetic_tx_hash(seed: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(now_unix_s().to_be_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

/// Deterministic-enough mock adapter used for tests and for any chain
/// without a live driver wired in. Emits synthetic tx hashes; callers
/// cannot distinguish it from a live adapter through the trait surface.
pub struct MockChainAdapter {
    chain_type: ChainType,
    connected: AtomicBool,
    block_height: AtomicU64,
    votes: RwLock<std::collections::HashMap<String, Vec<ConsensusVote>>>,
    delivered: RwLock<std::collections::HashSet<String>>,
    stats: RwLock<AdapterStats>,
}

impl MockChainAdapter {
    pub fn new(chain_type: ChainType) -> Self {
        Self {
            chain_type,
            connected: AtomicBool::new(false),
            block_height: AtomicU64::new(1),
            votes: RwLock::new(std::collections::HashMap::new()),
            delivered: RwLock::new(std::collections::HashSet::new()),
            stats: RwLock::new(AdapterStats::default()),
        }
    }

    /// Marks a previously submitted message as having passed confirmation
    /// depth, for tests that simulate chain progression.
    pub async fn mark_delivered(&self, message_id: &str) {
        self.delivered.write().await.insert(message_id.to_string());
    }
}

#[async_trait]
impl ChainAdapter for MockChainAdapter {
    fn chain_type(&self) -> ChainType {
        self.chain_type
    }

    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn get_chain_metrics(&self) -> Result<ChainMetrics> {
        if !self.is_connected() {
            return Err(TrustWrapperError::AdapterDisconnected(self.chain_type.to_string()));
        }
        self.block_height.fetch_add(1, Ordering::SeqCst);
        Ok(ChainMetrics {
            chain_id: self.chain_type,
            block_height: self.block_height.load(Ordering::SeqCst),
            block_time_s: 2.0,
            gas_or_fee: 0.001,
            finality_s: self.chain_type.confirmation_depth() as f64 * 2.0,
            last_updated: now_unix_s(),
        })
    }

    async fn verify_ai_output(&self, agent_id: &str, confidence: f64) -> Result<ChainVerificationResult> {
        if !self.is_connected() {
            return Err(TrustWrapperError::AdapterDisconnected(self.chain_type.to_string()));
        }
        let status = match Verdict::from_score(confidence) {
            Verdict::Pass => ChainVerificationStatus::Verified,
            Verdict::Borderline => ChainVerificationStatus::Pending,
            Verdict::Reject => ChainVerificationStatus::Rejected,
        };
        let mut stats = self.stats.write().await;
        stats.total += 1;
        if status == ChainVerificationStatus::Verified {
            stats.successful += 1;
        } else if status == ChainVerificationStatus::Rejected {
            stats.failed += 1;
        }
        Ok(ChainVerificationResult {
            chain_type: self.chain_type,
            tx_hash: Some(synthetic_tx_hash(agent_id.as_bytes())),
            block_number: Some(self.block_height.load(Ordering::SeqCst)),
            status,
            confidence,
            gas_used: 21_000.0,
            execution_time_ms: 50,
            error: None,
        })
    }

    async fn submit_consensus_vote(&self, request_id: &str, value: bool, confidence: f64, weight: f64) -> Result<String> {
        if !self.is_connected() {
            return Err(TrustWrapperError::AdapterDisconnected(self.chain_type.to_string()));
        }
        let vote = ConsensusVote {
            vote_id: uuid::Uuid::new_v4().to_string(),
            request_id: request_id.to_string(),
            voter_chain: self.chain_type,
            value,
            confidence,
            weight,
            timestamp: now_unix_s(),
            signature: None,
        };
        self.votes
            .write()
            .await
            .entry(request_id.to_string())
            .or_default()
            .push(vote);
        Ok(synthetic_tx_hash(request_id.as_bytes()))
    }

    async fn get_consensus_votes(&self, request_id: &str) -> Result<Vec<ConsensusVote>> {
        Ok(self.votes.read().await.get(request_id).cloned().unwrap_or_default())
    }

    async fn confirm_message_delivery(&self, message_id: &str) -> Result<bool> {
        Ok(self.delivered.read().await.contains(message_id))
    }

    fn get_stats(&self) -> AdapterStats {
        self.stats.try_read().map(|s| s.clone()).unwrap_or_default()
    }
}
