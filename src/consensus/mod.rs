//! Cross-chain consensus engine (C9): PBFT, HotStuff-style, and weighted
//! Byzantine consensus over votes collected from participating chains.

mod hotstuff;
mod pbft;
mod weighted;

pub use hotstuff::HotStuffTally;
pub use pbft::PbftTally;
pub use weighted::{ReputationTracker, WeightedTally};

use crate::types::{
    now_unix_s, ChainType, ConsensusAlgorithm, ConsensusResult, ConsensusState, ConsensusVote,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-algorithm decision rule. Each algorithm receives the accumulated,
/// deduplicated vote set and reports whether a value has been decided.
pub trait ConsensusTally: Send + Sync {
    fn algorithm(&self) -> ConsensusAlgorithm;
    fn evaluate(
        &self,
        votes: &HashMap<ChainType, ConsensusVote>,
        total_weight: f64,
        n_participants: usize,
    ) -> Option<ConsensusResult>;
}

pub fn tally_for(algorithm: ConsensusAlgorithm, byzantine_tolerance_weight_fraction: f64) -> Box<dyn ConsensusTally> {
    match algorithm {
        ConsensusAlgorithm::Pbft => Box::new(PbftTally),
        ConsensusAlgorithm::HotStuff => Box::new(HotStuffTally),
        ConsensusAlgorithm::Weighted => Box::new(WeightedTally {
            quorum_fraction: byzantine_tolerance_weight_fraction,
        }),
    }
}

/// One run of a BFT algorithm across chains for a single request (I4: must
/// terminate in `finalized` or `timed_out`, no other terminal state).
pub struct ConsensusInstance {
    pub consensus_id: String,
    pub request_id: String,
    pub algorithm: ConsensusAlgorithm,
    pub participants: Vec<ChainType>,
    pub votes: HashMap<ChainType, ConsensusVote>,
    pub state: ConsensusState,
    pub result: Option<ConsensusResult>,
    pub started_at: u64,
    pub deadline: u64,
}

impl ConsensusInstance {
    fn new(
        consensus_id: String,
        request_id: String,
        algorithm: ConsensusAlgorithm,
        participants: Vec<ChainType>,
        deadline: u64,
    ) -> Self {
        Self {
            consensus_id,
            request_id,
            algorithm,
            participants,
            votes: HashMap::new(),
            state: ConsensusState::Collecting,
            result: None,
            started_at: now_unix_s(),
            deadline,
        }
    }

    fn total_weight(&self) -> f64 {
        self.votes.values().map(|v| v.weight).sum()
    }
}

/// Owns the map of in-flight consensus instances. Votes arriving after a
/// decision are recorded but never change the result; duplicate votes from
/// the same voter in the same instance are idempotent (last write wins,
/// since a voter never votes twice in one view under honest operation).
pub struct ConsensusEngine {
    instances: RwLock<HashMap<String, ConsensusInstance>>,
    byzantine_tolerance_weight_fraction: f64,
}

impl ConsensusEngine {
    pub fn new(byzantine_tolerance_weight_fraction: f64) -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
            byzantine_tolerance_weight_fraction,
        }
    }

    /// Selects an algorithm: weighted when weights are
    /// meaningful, HotStuff for small/low-latency sets, PBFT otherwise.
    pub fn select_algorithm(participants: &[ChainType], weights_meaningful: bool) -> ConsensusAlgorithm {
        if weights_meaningful {
            ConsensusAlgorithm::Weighted
        } else if participants.len() <= 4 {
            ConsensusAlgorithm::HotStuff
        } else {
            ConsensusAlgorithm::Pbft
        }
    }

    pub async fn start_instance(
        &self,
        request_id: impl Into<String>,
        algorithm: ConsensusAlgorithm,
        participants: Vec<ChainType>,
        deadline_unix_s: u64,
    ) -> String {
        let consensus_id = uuid::Uuid::new_v4().to_string();
        let instance = ConsensusInstance::new(
            consensus_id.clone(),
            request_id.into(),
            algorithm,
            participants,
            deadline_unix_s,
        );
        self.instances.write().await.insert(consensus_id.clone(), instance);
        consensus_id
    }

    /// Records a vote and re-evaluates the tally. Votes after `Finalized`
    /// or `TimedOut` are stored for the record but do not change state.
    pub async fn submit_vote(&self, consensus_id: &str, vote: ConsensusVote) {
        let mut instances = self.instances.write().await;
        let Some(instance) = instances.get_mut(consensus_id) else {
            return;
        };

        if matches!(instance.state, ConsensusState::Finalized | ConsensusState::TimedOut | ConsensusState::Canceled) {
            instance.votes.entry(vote.voter_chain).or_insert(vote);
            return;
        }

        instance.votes.insert(vote.voter_chain, vote);

        let tally = tally_for(instance.algorithm, self.byzantine_tolerance_weight_fraction);
        let total_weight = instance.total_weight();
        let n_participants = instance.participants.len();
        if let Some(result) = tally.evaluate(&instance.votes, total_weight, n_participants) {
            instance.result = Some(result);
            instance.state = ConsensusState::Finalized;
        }
    }

    /// Marks timed-out instances whose deadline has passed without a
    /// decision, reporting the best partial tally (I4).
    pub async fn expire_if_past_deadline(&self, consensus_id: &str) -> Option<ConsensusState> {
        let mut instances = self.instances.write().await;
        let instance = instances.get_mut(consensus_id)?;
        if matches!(instance.state, ConsensusState::Finalized | ConsensusState::Canceled) {
            return Some(instance.state);
        }
        if now_unix_s() > instance.deadline {
            instance.state = ConsensusState::TimedOut;
            if instance.result.is_none() {
                let votes_for = instance.votes.values().filter(|v| v.value).count();
                let votes_against = instance.votes.values().filter(|v| !v.value).count();
                let agreeing_weight = instance
                    .votes
                    .values()
                    .filter(|v| v.value)
                    .map(|v| v.weight)
                    .sum();
                instance.result = Some(ConsensusResult {
                    decided_value: votes_for >= votes_against,
                    votes_for,
                    votes_against,
                    total_weight: instance.total_weight(),
                    agreeing_weight,
                });
            }
        }
        Some(instance.state)
    }

    pub async fn cancel(&self, consensus_id: &str) {
        if let Some(instance) = self.instances.write().await.get_mut(consensus_id) {
            if !matches!(instance.state, ConsensusState::Finalized) {
                instance.state = ConsensusState::Canceled;
            }
        }
    }

    pub async fn state_of(&self, consensus_id: &str) -> Option<ConsensusState> {
        self.instances.read().await.get(consensus_id).map(|i| i.state)
    }

    pub async fn result_of(&self, consensus_id: &str) -> Option<ConsensusResult> {
        self.instances.read().await.get(consensus_id).and_then(|i| i.result.clone())
    }

    pub async fn votes_of(&self, consensus_id: &str) -> Vec<ConsensusVote> {
        self.instances
            .read()
            .await
            .get(consensus_id)
            .map(|i| i.votes.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(chain: ChainType, value: bool, weight: f64) -> ConsensusVote {
        ConsensusVote {
            vote_id: uuid::Uuid::new_v4().to_string(),
            request_id: "r1".into(),
            voter_chain: chain,
            value,
            confidence: 0.9,
            weight,
            timestamp: now_unix_s(),
            signature: None,
        }
    }

    #[tokio::test]
    async fn pbft_finalizes_at_quorum() {
        let engine = ConsensusEngine::new(2.0 / 3.0);
        let participants = vec![
            ChainType::Ethereum,
            ChainType::Polygon,
            ChainType::Solana,
            ChainType::Cardano,
        ];
        let consensus_id = engine
            .start_instance("r1", ConsensusAlgorithm::Pbft, participants, now_unix_s() + 30)
            .await;

        engine.submit_vote(&consensus_id, vote(ChainType::Ethereum, true, 1.0)).await;
        engine.submit_vote(&consensus_id, vote(ChainType::Polygon, true, 1.0)).await;
        assert_eq!(engine.state_of(&consensus_id).await, Some(ConsensusState::Collecting));
        engine.submit_vote(&consensus_id, vote(ChainType::Solana, true, 1.0)).await;

        assert_eq!(engine.state_of(&consensus_id).await, Some(ConsensusState::Finalized));
        let result = engine.result_of(&consensus_id).await.unwrap();
        assert!(result.decided_value);
    }

    #[tokio::test]
    async fn votes_after_decision_do_not_change_result() {
        let engine = ConsensusEngine::new(2.0 / 3.0);
        let participants = vec![ChainType::Ethereum, ChainType::Polygon, ChainType::Solana];
        let consensus_id = engine
            .start_instance("r1", ConsensusAlgorithm::HotStuff, participants, now_unix_s() + 30)
            .await;
        engine.submit_vote(&consensus_id, vote(ChainType::Ethereum, true, 1.0)).await;
        engine.submit_vote(&consensus_id, vote(ChainType::Polygon, true, 1.0)).await;
        assert_eq!(engine.state_of(&consensus_id).await, Some(ConsensusState::Finalized));

        engine.submit_vote(&consensus_id, vote(ChainType::Solana, false, 1.0)).await;
        let result = engine.result_of(&consensus_id).await.unwrap();
        assert!(result.decided_value);
    }

    #[tokio::test]
    async fn expiry_reports_partial_tally_on_timeout() {
        let engine = ConsensusEngine::new(2.0 / 3.0);
        let participants = vec![
            ChainType::Ethereum,
            ChainType::Polygon,
            ChainType::Solana,
            ChainType::Cardano,
            ChainType::Bitcoin,
        ];
        let consensus_id = engine
            .start_instance("r1", ConsensusAlgorithm::Pbft, participants, now_unix_s().saturating_sub(1))
            .await;
        engine.submit_vote(&consensus_id, vote(ChainType::Ethereum, true, 1.0)).await;
        engine.submit_vote(&consensus_id, vote(ChainType::Polygon, true, 1.0)).await;

        let state = engine.expire_if_past_deadline(&consensus_id).await.unwrap();
        assert_eq!(state, ConsensusState::TimedOut);
        assert!(engine.result_of(&consensus_id).await.is_some());
    }
}
