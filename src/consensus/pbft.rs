//! Simplified cross-chain PBFT. States `pre-prepare -> prepare ->
//! commit -> decided | view-change` collapse here into vote counting: once
//! `2f+1` votes agree (with `n = 3f+1`), the value is decided. View-change
//! on leader silence is the caller's deadline-driven `expire_if_past_deadline`.

use super::ConsensusTally;
use crate::types::{ChainType, ConsensusAlgorithm, ConsensusResult, ConsensusVote};
use std::collections::HashMap;

pub struct PbftTally;

impl ConsensusTally for PbftTally {
    fn algorithm(&self) -> ConsensusAlgorithm {
        ConsensusAlgorithm::Pbft
    }

    fn evaluate(
        &self,
        votes: &HashMap<ChainType, ConsensusVote>,
        _total_weight: f64,
        n_participants: usize,
    ) -> Option<ConsensusResult> {
        // n = 3f+1 => f = (n-1)/3, quorum = 2f+1.
        let f = (n_participants.saturating_sub(1)) / 3;
        let quorum = 2 * f + 1;

        let votes_for = votes.values().filter(|v| v.value).count();
        let votes_against = votes.values().filter(|v| !v.value).count();

        if votes_for >= quorum {
            return Some(ConsensusResult {
                decided_value: true,
                votes_for,
                votes_against,
                total_weight: votes.values().map(|v| v.weight).sum(),
                agreeing_weight: votes.values().filter(|v| v.value).map(|v| v.weight).sum(),
            });
        }
        if votes_against >= quorum {
            return Some(ConsensusResult {
                decided_value: false,
                votes_for,
                votes_against,
                total_weight: votes.values().map(|v| v.weight).sum(),
                agreeing_weight: votes.values().filter(|v| !v.value).map(|v| v.weight).sum(),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::now_unix_s;

    fn vote(chain: ChainType, value: bool) -> ConsensusVote {
        ConsensusVote {
            vote_id: "v".into(),
            request_id: "r".into(),
            voter_chain: chain,
            value,
            confidence: 0.9,
            weight: 1.0,
            timestamp: now_unix_s(),
            signature: None,
        }
    }

    #[test]
    fn n4_f1_quorum_is_three() {
        let tally = PbftTally;
        let mut votes = HashMap::new();
        votes.insert(ChainType::Ethereum, vote(ChainType::Ethereum, true));
        votes.insert(ChainType::Polygon, vote(ChainType::Polygon, true));
        assert!(tally.evaluate(&votes, 2.0, 4).is_none());
        votes.insert(ChainType::Solana, vote(ChainType::Solana, true));
        let result = tally.evaluate(&votes, 3.0, 4).unwrap();
        assert!(result.decided_value);
    }

    #[test]
    fn one_byzantine_dissenter_does_not_block_majority() {
        let tally = PbftTally;
        let mut votes = HashMap::new();
        votes.insert(ChainType::Ethereum, vote(ChainType::Ethereum, true));
        votes.insert(ChainType::Polygon, vote(ChainType::Polygon, true));
        votes.insert(ChainType::Solana, vote(ChainType::Solana, true));
        votes.insert(ChainType::Cardano, vote(ChainType::Cardano, false));
        let result = tally.evaluate(&votes, 4.0, 4).unwrap();
        assert!(result.decided_value);
        assert_eq!(result.votes_against, 1);
    }
}
