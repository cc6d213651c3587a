//! Weighted Byzantine consensus. Each validator carries a weight
//! (stake-style, as in a validator registry sorted by stake); quorum is a
//! fraction of total weight rather than a vote count. Reputation bonuses
//! and decay are tracked by `ReputationTracker` alongside the tally.

use super::ConsensusTally;
use crate::types::{ChainType, ConsensusAlgorithm, ConsensusResult, ConsensusVote};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct WeightedTally {
    /// Quorum expressed as a fraction of total submitted weight (default
    /// 2/3).
    pub quorum_fraction: f64,
}

impl ConsensusTally for WeightedTally {
    fn algorithm(&self) -> ConsensusAlgorithm {
        ConsensusAlgorithm::Weighted
    }

    fn evaluate(
        &self,
        votes: &HashMap<ChainType, ConsensusVote>,
        total_weight: f64,
        _n_participants: usize,
    ) -> Option<ConsensusResult> {
        if total_weight <= 0.0 {
            return None;
        }
        let for_weight: f64 = votes.values().filter(|v| v.value).map(|v| v.weight).sum();
        let against_weight: f64 = votes.values().filter(|v| !v.value).map(|v| v.weight).sum();

        let votes_for = votes.values().filter(|v| v.value).count();
        let votes_against = votes.values().filter(|v| !v.value).count();

        if for_weight / total_weight >= self.quorum_fraction {
            return Some(ConsensusResult {
                decided_value: true,
                votes_for,
                votes_against,
                total_weight,
                agreeing_weight: for_weight,
            });
        }
        if against_weight / total_weight >= self.quorum_fraction {
            return Some(ConsensusResult {
                decided_value: false,
                votes_for,
                votes_against,
                total_weight,
                agreeing_weight: against_weight,
            });
        }
        None
    }
}

/// Checks the Byzantine tolerance inequality:
/// `fault_weight < total_weight / 3`.
pub fn byzantine_tolerance_holds(fault_weight: f64, total_weight: f64) -> bool {
    total_weight > 0.0 && fault_weight < total_weight / 3.0
}

const REPUTATION_DECAY_PER_ROUND: f64 = 0.02;
const REPUTATION_DELTA: f64 = 0.05;
const REPUTATION_BONUS_CAP: f64 = 0.20;

/// Tracks a ±20%-bounded reputation bonus per chain, updated after each
/// decided instance: `+delta` for agreeing with the decided value,
/// `-delta` for disagreeing, decayed toward zero between rounds.
pub struct ReputationTracker {
    bonuses: Arc<RwLock<HashMap<ChainType, f64>>>,
}

impl ReputationTracker {
    pub fn new() -> Self {
        Self {
            bonuses: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn bonus(&self, chain: ChainType) -> f64 {
        *self.bonuses.read().await.get(&chain).unwrap_or(&0.0)
    }

    pub async fn apply_round(&self, votes: &HashMap<ChainType, ConsensusVote>, decided_value: bool) {
        let mut bonuses = self.bonuses.write().await;
        for (chain, vote) in votes {
            let entry = bonuses.entry(*chain).or_insert(0.0);
            *entry *= 1.0 - REPUTATION_DECAY_PER_ROUND;
            if vote.value == decided_value {
                *entry += REPUTATION_DELTA;
            } else {
                *entry -= REPUTATION_DELTA;
            }
            *entry = entry.clamp(-REPUTATION_BONUS_CAP, REPUTATION_BONUS_CAP);
        }
    }

    pub async fn effective_weight(&self, chain: ChainType, base_weight: f64) -> f64 {
        base_weight * (1.0 + self.bonus(chain).await)
    }
}

impl Default for ReputationTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::now_unix_s;

    fn vote(chain: ChainType, value: bool, weight: f64) -> ConsensusVote {
        ConsensusVote {
            vote_id: "v".into(),
            request_id: "r".into(),
            voter_chain: chain,
            value,
            confidence: 0.9,
            weight,
            timestamp: now_unix_s(),
            signature: None,
        }
    }

    #[test]
    fn two_thirds_weight_quorum_decides() {
        let tally = WeightedTally { quorum_fraction: 2.0 / 3.0 };
        let mut votes = HashMap::new();
        votes.insert(ChainType::Ethereum, vote(ChainType::Ethereum, true, 5.0));
        votes.insert(ChainType::Polygon, vote(ChainType::Polygon, true, 2.0));
        votes.insert(ChainType::Solana, vote(ChainType::Solana, false, 3.0));
        let result = tally.evaluate(&votes, 10.0, 3).unwrap();
        assert!(result.decided_value);
    }

    #[test]
    fn byzantine_tolerance_inequality() {
        assert!(byzantine_tolerance_holds(3.0, 10.0));
        assert!(!byzantine_tolerance_holds(4.0, 10.0));
    }

    #[tokio::test]
    async fn reputation_decreases_for_dissenters() {
        let tracker = ReputationTracker::new();
        let mut votes = HashMap::new();
        votes.insert(ChainType::Ethereum, vote(ChainType::Ethereum, true, 1.0));
        votes.insert(ChainType::Polygon, vote(ChainType::Polygon, false, 1.0));
        tracker.apply_round(&votes, true).await;
        assert!(tracker.bonus(ChainType::Ethereum).await > 0.0);
        assert!(tracker.bonus(ChainType::Polygon).await < 0.0);
    }
}
