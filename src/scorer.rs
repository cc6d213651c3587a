//! Trust scorer (C4): combines detected issues and oracle evidence into a
//! single `TrustScore`. Canonicalizes the several ad-hoc scoring schemes a
//! hallucination-detection prototype tends to accumulate into one table.

use crate::types::{Issue, OracleConsensus, TrustScore, Verdict};

/// Flat penalty applied when oracle evidence disagrees with a claim
/// (`consensus_achieved=false`), independent of any per-issue penalty.
const ORACLE_DISAGREEMENT_PENALTY: f64 = 0.15;

#[derive(Debug, Clone, Default)]
pub struct ScoringContext<'a> {
    pub oracle_evidence: Vec<&'a OracleConsensus>,
}

pub struct TrustScorer;

impl TrustScorer {
    pub fn new() -> Self {
        Self
    }

    /// `score(issues, oracle_evidence, context) -> TrustScore`.
    pub fn score(&self, mut issues: Vec<Issue>, ctx: &ScoringContext<'_>) -> TrustScore {
        let mut s = 1.0_f64;

        for issue in &issues {
            s -= issue.kind.penalty_weight() * issue.confidence;
        }

        // Tie-break by kind severity (temporal > statistical > ... >
        // other), highest first, so `TrustScore::issues` has a
        // deterministic order independent of detector registration order
        // whenever two issues carry the same confidence.
        issues.sort_by(|a, b| {
            b.kind
                .severity_rank()
                .cmp(&a.kind.severity_rank())
                .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal))
        });

        let evidence_refs: Vec<String> = ctx
            .oracle_evidence
            .iter()
            .map(|e| format!("{:?}:{:?}", e.data_type, e.value))
            .collect();

        if ctx.oracle_evidence.iter().any(|e| !e.consensus_achieved) {
            s -= ORACLE_DISAGREEMENT_PENALTY;
        }

        let score = s.clamp(0.0, 1.0);
        let verdict = Verdict::from_score(score);

        TrustScore {
            score,
            verdict,
            issues,
            evidence_refs,
        }
    }
}

impl Default for TrustScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IssueKind, OracleDataType, OracleValue};

    #[test]
    fn no_issues_scores_pass() {
        let scorer = TrustScorer::new();
        let result = scorer.score(Vec::new(), &ScoringContext::default());
        assert!((result.score - 1.0).abs() < 1e-9);
        assert_eq!(result.verdict, Verdict::Pass);
    }

    #[test]
    fn future_event_claim_scores_borderline() {
        let scorer = TrustScorer::new();
        let issues = vec![Issue::new(IssueKind::TemporalImpossibility, 0.9)];
        let result = scorer.score(issues, &ScoringContext::default());
        assert!((result.score - 0.64).abs() < 1e-9);
        assert_eq!(result.verdict, Verdict::Borderline);
    }

    #[test]
    fn fabricated_precision_with_oracle_disagreement_drops_to_borderline() {
        let scorer = TrustScorer::new();
        let issues = vec![Issue::new(IssueKind::StatisticalFabrication, 0.85)];
        let consensus = OracleConsensus {
            data_type: OracleDataType::Custom,
            value: OracleValue::Numeric(0.0),
            confidence: 0.5,
            consensus_achieved: false,
            max_deviation: 1.0,
            contributing_sources: 1,
        };
        let ctx = ScoringContext {
            oracle_evidence: vec![&consensus],
        };
        let result = scorer.score(issues, &ctx);
        assert!((result.score - 0.595).abs() < 1e-9, "got {}", result.score);
        assert_eq!(result.verdict, Verdict::Borderline);
    }

    #[test]
    fn score_is_clamped_to_zero() {
        let scorer = TrustScorer::new();
        let issues = vec![
            Issue::new(IssueKind::Policy, 1.0),
            Issue::new(IssueKind::TemporalImpossibility, 1.0),
            Issue::new(IssueKind::StatisticalFabrication, 1.0),
        ];
        let result = scorer.score(issues, &ScoringContext::default());
        assert_eq!(result.score, 0.0);
        assert_eq!(result.verdict, Verdict::Reject);
    }

    #[test]
    fn issues_are_ordered_by_severity_rank() {
        let scorer = TrustScorer::new();
        let issues = vec![
            Issue::new(IssueKind::Other, 0.5),
            Issue::new(IssueKind::TemporalImpossibility, 0.5),
            Issue::new(IssueKind::Policy, 0.5),
        ];
        let result = scorer.score(issues, &ScoringContext::default());
        let kinds: Vec<IssueKind> = result.issues.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![IssueKind::TemporalImpossibility, IssueKind::Policy, IssueKind::Other]
        );
    }
}
