//! Defect detector (C3): pure, deterministic pattern detection over an
//! artifact. No I/O, no mutation of the artifact, extensible via a named
//! registry.

mod patterns;

use crate::types::{Artifact, Issue, IssueKind, VerificationContext};
use std::collections::HashMap;
use std::sync::Arc;

/// A single named detector. Each declares the issue kinds it may emit so
/// the registry can report its coverage without running it.
pub trait Detector: Send + Sync {
    fn name(&self) -> &str;
    fn issue_kinds(&self) -> &[IssueKind];
    fn detect(&self, artifact: &Artifact, context: &VerificationContext) -> Vec<Issue>;
}

/// Registry of detectors, keyed by name. Mirrors the register/lookup shape
/// used for validator bookkeeping elsewhere in the core: a simple owned
/// map behind a lock, no dynamic reconfiguration beyond insert/remove.
pub struct DetectorRegistry {
    detectors: parking_lot::RwLock<HashMap<String, Arc<dyn Detector>>>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self {
            detectors: parking_lot::RwLock::new(HashMap::new()),
        }
    }

    /// Registry pre-loaded with the built-in detector set.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(patterns::TemporalDetector::default()));
        registry.register(Arc::new(patterns::StatisticalFabricationDetector::default()));
        registry.register(Arc::new(patterns::OverconfidenceDetector::default()));
        registry.register(Arc::new(patterns::NonexistentApiDetector::default()));
        registry
    }

    pub fn register(&self, detector: Arc<dyn Detector>) {
        self.detectors
            .write()
            .insert(detector.name().to_string(), detector);
    }

    pub fn unregister(&self, name: &str) {
        self.detectors.write().remove(name);
    }

    pub fn names(&self) -> Vec<String> {
        self.detectors.read().keys().cloned().collect()
    }

    /// Runs every registered detector and concatenates the resulting
    /// issues. Deterministic given deterministic detectors and a fixed
    /// context clock.
    pub fn detect(&self, artifact: &Artifact, context: &VerificationContext) -> Vec<Issue> {
        let detectors: Vec<Arc<dyn Detector>> = self.detectors.read().values().cloned().collect();
        let mut issues = Vec::new();
        for detector in detectors {
            issues.extend(detector.detect(artifact, context));
        }
        issues
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Application-supplied predicate detector. Not part of the
/// built-in set because its predicate is caller-defined.
pub struct PolicyDetector<F>
where
    F: Fn(&Artifact, &VerificationContext) -> Vec<Issue> + Send + Sync,
{
    name: String,
    predicate: F,
}

impl<F> PolicyDetector<F>
where
    F: Fn(&Artifact, &VerificationContext) -> Vec<Issue> + Send + Sync,
{
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

impl<F> Detector for PolicyDetector<F>
where
    F: Fn(&Artifact, &VerificationContext) -> Vec<Issue> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn issue_kinds(&self) -> &[IssueKind] {
        &[IssueKind::Policy]
    }

    fn detect(&self, artifact: &Artifact, context: &VerificationContext) -> Vec<Issue> {
        (self.predicate)(artifact, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_runs_all_builtins_deterministically() {
        let registry = DetectorRegistry::with_builtins();
        let artifact = Artifact::text("The 2099 Olympics were won by Mars.");
        let ctx = VerificationContext {
            reference_unix_time: Some(1_735_689_600), // 2025-01-01
            ..Default::default()
        };
        let first = registry.detect(&artifact, &ctx);
        let second = registry.detect(&artifact, &ctx);
        assert_eq!(first.len(), second.len());
        assert!(first.iter().any(|i| i.kind == IssueKind::TemporalImpossibility));
    }

    #[test]
    fn policy_detector_runs_custom_predicate() {
        let registry = DetectorRegistry::new();
        registry.register(Arc::new(PolicyDetector::new("banned-words", |artifact, _| {
            if artifact.as_str().contains("banned") {
                vec![Issue::new(IssueKind::Policy, 1.0)]
            } else {
                Vec::new()
            }
        })));
        let artifact = Artifact::text("this contains a banned phrase");
        let issues = registry.detect(&artifact, &VerificationContext::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::Policy);
    }
}
