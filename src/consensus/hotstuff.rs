//! HotStuff-style linear consensus. Votes accumulate into a quorum
//! certificate at the same `2f+1` threshold as PBFT; the pipeline stages
//! (`prepare -> pre-commit -> commit -> decide`) collapse to a single QC
//! check here since the core only needs the terminal decision, not the
//! intermediate phase certificates. Leader rotation per view is a property
//! of the bridge's view-change timer, not of the tally itself.

use super::ConsensusTally;
use crate::types::{ChainType, ConsensusAlgorithm, ConsensusResult, ConsensusVote};
use std::collections::HashMap;

pub struct HotStuffTally;

impl ConsensusTally for HotStuffTally {
    fn algorithm(&self) -> ConsensusAlgorithm {
        ConsensusAlgorithm::HotStuff
    }

    fn evaluate(
        &self,
        votes: &HashMap<ChainType, ConsensusVote>,
        _total_weight: f64,
        n_participants: usize,
    ) -> Option<ConsensusResult> {
        let f = (n_participants.saturating_sub(1)) / 3;
        let quorum = 2 * f + 1;

        let votes_for = votes.values().filter(|v| v.value).count();
        let votes_against = votes.values().filter(|v| !v.value).count();

        let decided_value = if votes_for >= quorum {
            true
        } else if votes_against >= quorum {
            false
        } else {
            return None;
        };

        Some(ConsensusResult {
            decided_value,
            votes_for,
            votes_against,
            total_weight: votes.values().map(|v| v.weight).sum(),
            agreeing_weight: votes
                .values()
                .filter(|v| v.value == decided_value)
                .map(|v| v.weight)
                .sum(),
        })
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
    fn quorum_certificate_decides() {
        let tally = HotStuffTally;
        let mut votes = HashMap::new();
        votes.insert(ChainType::Ethereum, vote(ChainType::Ethereum, true));
        votes.insert(ChainType::Polygon, vote(ChainType::Polygon, true));
        votes.insert(ChainType::Solana, vote(ChainType::Solana, true));
        let result = tally.evaluate(&votes, 3.0, 4).unwrap();
        assert!(result.decided_value);
    }
}
