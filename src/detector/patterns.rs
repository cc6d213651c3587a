//! Built-in detectors for the defect registry. Each is a thin wrapper over
//! a small regex set, in the same spirit as a basic hallucination detector
//! that classifies text by pattern rather than by model introspection.

use super::Detector;
use crate::types::{Artifact, Issue, IssueKind, VerificationContext};
use once_cell::sync::Lazy;
use regex::Regex;

/// Matches four-digit years. Whether a given year counts as "future" is
/// resolved against `context.reference_unix_time` at detect-time, not
/// baked into the pattern, so the detector stays deterministic for a fixed
/// clock without needing a new regex every year.
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

#[derive(Default)]
pub struct TemporalDetector;

impl Detector for TemporalDetector {
    fn name(&self) -> &str {
        "temporal"
    }

    fn issue_kinds(&self) -> &[IssueKind] {
        &[IssueKind::TemporalImpossibility]
    }

    fn detect(&self, artifact: &Artifact, context: &VerificationContext) -> Vec<Issue> {
        let text = artifact.as_str();
        let now = context.clock_now_s();
        let current_year = 1970 + (now / 31_557_600) as i32;

        let mut issues = Vec::new();
        for m in YEAR_RE.find_iter(text) {
            if let Ok(year) = m.as_str().parse::<i32>() {
                if year > current_year {
                    issues.push(
                        Issue::new(IssueKind::TemporalImpossibility, 0.9)
                            .with_location(format!("{}..{}", m.start(), m.end()))
                            .with_evidence(format!("year {year} is after reference year {current_year}")),
                    );
                }
            }
        }
        issues
    }
}

static STAT_PRECISION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.\d{3,}\s*%").unwrap());
static STAT_EXACT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(exactly|precisely)\s+\d+(\.\d+)?").unwrap());

#[derive(Default)]
pub struct StatisticalFabricationDetector;

impl Detector for StatisticalFabricationDetector {
    fn name(&self) -> &str {
        "statistical_fabrication"
    }

    fn issue_kinds(&self) -> &[IssueKind] {
        &[IssueKind::StatisticalFabrication]
    }

    fn detect(&self, artifact: &Artifact, _context: &VerificationContext) -> Vec<Issue> {
        let text = artifact.as_str();
        let mut issues = Vec::new();
        // Spans already claimed by a higher-confidence match, so a second
        // pattern firing over the same text (e.g. "Exactly 0.017%" matches
        // both the precision and the exactness regex) doesn't double-count
        // one fabrication as two issues.
        let mut covered: Vec<(usize, usize)> = Vec::new();

        for m in STAT_PRECISION_RE.find_iter(text) {
            covered.push((m.start(), m.end()));
            issues.push(
                Issue::new(IssueKind::StatisticalFabrication, 0.85)
                    .with_location(format!("{}..{}", m.start(), m.end()))
                    .with_evidence("suspiciously precise percentage without citation"),
            );
        }
        for m in STAT_EXACT_RE.find_iter(text) {
            let span = (m.start(), m.end());
            if covered.iter().any(|c| spans_overlap(*c, span)) {
                continue;
            }
            covered.push(span);
            issues.push(
                Issue::new(IssueKind::StatisticalFabrication, 0.7)
                    .with_location(format!("{}..{}", m.start(), m.end()))
                    .with_evidence("exactness qualifier on an unverified numeric claim"),
            );
        }
        issues
    }
}

fn spans_overlap(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

static OVERCONFIDENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(definitely|certainly|absolutely|guarantee[d]?)\b.{0,40}\d+(\.\d+)?\s*%").unwrap()
});

#[derive(Default)]
pub struct OverconfidenceDetector;

impl Detector for OverconfidenceDetector {
    fn name(&self) -> &str {
        "overconfidence"
    }

    fn issue_kinds(&self) -> &[IssueKind] {
        &[IssueKind::Overconfidence]
    }

    fn detect(&self, artifact: &Artifact, _context: &VerificationContext) -> Vec<Issue> {
        let text = artifact.as_str();
        OVERCONFIDENCE_RE
            .find_iter(text)
            .map(|m| {
                Issue::new(IssueKind::Overconfidence, 0.6)
                    .with_location(format!("{}..{}", m.start(), m.end()))
                    .with_evidence("absolute quantifier paired with an unverified numeric claim")
            })
            .collect()
    }
}

/// Matches bare identifier-like tokens (`foo_bar`, `SomeApi`) so they can be
/// checked against an allowlist/denylist. Intentionally coarse: this is a
/// lexical pre-filter, not a parser.
static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Za-z][A-Za-z0-9_]{2,}\b").unwrap());

#[derive(Default)]
pub struct NonexistentApiDetector;

impl Detector for NonexistentApiDetector {
    fn name(&self) -> &str {
        "nonexistent_api"
    }

    fn issue_kinds(&self) -> &[IssueKind] {
        &[IssueKind::NonexistentApi]
    }

    fn detect(&self, artifact: &Artifact, context: &VerificationContext) -> Vec<Issue> {
        if context.allowlist.is_none() && context.denylist.is_empty() {
            return Vec::new();
        }
        let text = artifact.as_str();
        let mut issues = Vec::new();

        for m in IDENTIFIER_RE.find_iter(text) {
            let token = m.as_str();
            let denied = context.denylist.iter().any(|d| d == token);
            let missing_from_allowlist = context
                .allowlist
                .as_ref()
                .map(|allow| !allow.iter().any(|a| a == token))
                .unwrap_or(false);

            if denied || missing_from_allowlist {
                issues.push(
                    Issue::new(IssueKind::NonexistentApi, 0.75)
                        .with_location(format!("{}..{}", m.start(), m.end()))
                        .with_evidence(format!("identifier '{token}' not recognized")),
                );
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactKind;

    fn ctx_at(year: i32) -> VerificationContext {
        let approx_seconds = (year - 1970) as u64 * 31_557_600;
        VerificationContext {
            reference_unix_time: Some(approx_seconds),
            ..Default::default()
        }
    }

    #[test]
    fn temporal_detector_flags_future_years() {
        let artifact = Artifact::text("The 2099 Olympics were won by Mars.");
        let issues = TemporalDetector.detect(&artifact, &ctx_at(2025));
        assert_eq!(issues.len(), 1);
        assert!((issues[0].confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn temporal_detector_ignores_past_years() {
        let artifact = Artifact::text("The capital of France is Paris, founded long before 1800.");
        let issues = TemporalDetector.detect(&artifact, &ctx_at(2025));
        assert!(issues.is_empty());
    }

    #[test]
    fn statistical_detector_flags_precise_percentage() {
        let artifact = Artifact::text("Exactly 0.017% of people have purple eyes.");
        let issues = StatisticalFabricationDetector.detect(&artifact, &VerificationContext::default());
        // "Exactly 0.017%" matches both the precision and the exactness
        // pattern over the same span; that's one fabrication, not two.
        assert_eq!(issues.len(), 1);
        assert!((issues[0].confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn statistical_detector_counts_non_overlapping_matches_separately() {
        let artifact =
            Artifact::text("Exactly 12 people attended. Separately, 0.0123% of cases were affected.");
        let issues = StatisticalFabricationDetector.detect(&artifact, &VerificationContext::default());
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn nonexistent_api_detector_is_inert_without_lists() {
        let artifact = Artifact {
            kind: ArtifactKind::Text,
            bytes: b"call some_made_up_function now".to_vec(),
        };
        let issues = NonexistentApiDetector.detect(&artifact, &VerificationContext::default());
        assert!(issues.is_empty());
    }
}
