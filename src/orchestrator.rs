//! Verification orchestrator (C12): the end-to-end path that composes every
//! other component: detect, score, commit, dispatch, reach consensus,
//! optionally threshold-sign, and assemble the result the caller sees.

use crate::bridge::MessageBroker;
use crate::chain::ChainAdapter;
use crate::commitment::{backend_for, CommitmentGenerator, DigestAlgorithm};
use crate::config::Config;
use crate::consensus::ConsensusEngine;
use crate::detector::{Detector, DetectorRegistry};
use crate::error::{Result, TrustWrapperError};
use crate::oracle::{OracleAdapter, OracleAggregator};
use crate::scorer::{ScoringContext, TrustScorer};
use crate::threshold::ThresholdSignatureManager;
use crate::types::{
    now_unix_s, Artifact, BridgeMessage, BridgeMessageStatus, BridgeMessageType, ChainType,
    Commitment, ConsensusAlgorithm, ConsensusState, ConsensusStats, ConsensusVote, OracleConsensus,
    Priority, ProofScheme, TrustScore, Verdict, VerificationContext, VerificationPolicy,
    VerificationResult,
};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Wire envelope for the per-chain submission payload ("Per-chain
/// wire"): `request_id` itself is carried as a 36-byte UUID prefix (matching
/// `MessageBroker`'s dedup/drop convention) ahead of this CBOR-encoded tail.
#[derive(Debug, Serialize)]
struct WireEnvelope {
    commitment: String,
    proof_scheme: ProofScheme,
    proof_bytes: Vec<u8>,
    verdict: Verdict,
    score_fp6: u32,
    issuer_pubkey: String,
}

fn encode_bridge_payload(
    request_id: &str,
    commitment: &Commitment,
    proof_scheme: ProofScheme,
    proof_bytes: &[u8],
    score: &TrustScore,
    issuer_pubkey: &str,
) -> Vec<u8> {
    let envelope = WireEnvelope {
        commitment: commitment.to_hex(),
        proof_scheme,
        proof_bytes: proof_bytes.to_vec(),
        verdict: score.verdict,
        score_fp6: score.score_fp6(),
        issuer_pubkey: issuer_pubkey.to_string(),
    };
    let mut cbor = Vec::new();
    ciborium::ser::into_writer(&envelope, &mut cbor).expect("envelope fields are always serializable");

    let mut payload = Vec::with_capacity(36 + cbor.len());
    payload.extend_from_slice(request_id.as_bytes());
    payload.extend_from_slice(&cbor);
    payload
}

/// Composes C1–C11 into the single `verify` entry point (C12).
pub struct VerificationOrchestrator {
    detectors: DetectorRegistry,
    scorer: TrustScorer,
    commitment_gen: CommitmentGenerator,
    chain_adapters: HashMap<ChainType, Arc<dyn ChainAdapter>>,
    broker: MessageBroker,
    consensus: ConsensusEngine,
    threshold: ThresholdSignatureManager,
    oracle_aggregator: Option<OracleAggregator>,
    config: Config,
    issuer_key: SigningKey,
}

impl VerificationOrchestrator {
    pub fn new(
        chain_adapters: Vec<Arc<dyn ChainAdapter>>,
        oracle_adapters: Vec<Arc<dyn OracleAdapter>>,
        config: Config,
    ) -> Self {
        let max_retries = config.max_retry_attempts;
        let by_type: HashMap<ChainType, Arc<dyn ChainAdapter>> = chain_adapters
            .iter()
            .map(|a| (a.chain_type(), a.clone()))
            .collect();
        let broker = MessageBroker::new(chain_adapters, max_retries);
        let oracle_aggregator = if oracle_adapters.is_empty() {
            None
        } else {
            Some(OracleAggregator::new(oracle_adapters))
        };

        Self {
            detectors: DetectorRegistry::with_builtins(),
            scorer: TrustScorer::new(),
            commitment_gen: CommitmentGenerator::new(DigestAlgorithm::Sha256),
            chain_adapters: by_type,
            broker,
            consensus: ConsensusEngine::new(config.consensus_threshold),
            threshold: ThresholdSignatureManager::new(),
            oracle_aggregator,
            config,
            issuer_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Registers an application-supplied detector (policy predicates, extra
    /// denylist checks) alongside the built-in set.
    pub fn register_detector(&self, detector: Arc<dyn Detector>) {
        self.detectors.register(detector);
    }

    fn issuer_pubkey_hex(&self) -> String {
        hex::encode(self.issuer_key.verifying_key().to_bytes())
    }

    /// `verify(artifact, context, policy) -> VerificationResult`.
    ///
    /// Returns `Err` only for the "fail the request" class of errors:
    /// commitment/proof failures and cancellation. Oracle disagreement,
    /// single-chain errors, and consensus timeouts all degrade into an
    /// `Ok(VerificationResult)` carrying the appropriate annotation instead.
    pub async fn verify(
        &self,
        artifact: Artifact,
        context: VerificationContext,
        policy: VerificationPolicy,
        cancel: CancellationToken,
    ) -> Result<VerificationResult> {
        if cancel.is_cancelled() {
            return Err(TrustWrapperError::Canceled);
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("verify", request_id = %request_id);
        let _enter = span.enter();

        // Step 1: detect.
        let issues = self.detectors.detect(&artifact, &context);

        // Step 2: oracle evidence for the caller's declared requirements.
        let mut evidence: Vec<OracleConsensus> = Vec::new();
        for query in &context.evidence_requirements {
            if cancel.is_cancelled() {
                return Err(TrustWrapperError::Canceled);
            }
            let Some(aggregator) = &self.oracle_aggregator else {
                continue;
            };
            let freshness_window_s = self
                .config
                .oracle_freshness_window_by_type
                .get(&query.data_type)
                .copied()
                .unwrap_or_else(|| query.data_type.default_freshness_window_s());
            let deviation_threshold = self
                .config
                .oracle_deviation_threshold_by_type
                .get(&query.data_type)
                .copied()
                .unwrap_or_else(|| query.data_type.default_deviation_threshold());
            let per_adapter_timeout = Duration::from_millis(query.timeout_ms.max(1));
            let global_deadline = Duration::from_millis(query.timeout_ms.saturating_mul(2).max(200));

            if let Some(consensus) = aggregator
                .aggregate(query, per_adapter_timeout, global_deadline, freshness_window_s, deviation_threshold)
                .await
            {
                evidence.push(consensus);
            }
        }

        // Step 3: score.
        let scoring_ctx = ScoringContext {
            oracle_evidence: evidence.iter().collect(),
        };
        let score = self.scorer.score(issues, &scoring_ctx);

        // Step 4: commitment + proof.
        let artifact_digest = artifact.digest();
        let nonce = self.commitment_gen.random_nonce();
        let timestamp_s = context.clock_now_s();
        let commitment = self.commitment_gen.commit(&artifact_digest, &score, &nonce, timestamp_s);

        let backend = backend_for(policy.proof_backend);
        let proof = backend
            .prove(commitment, nonce.to_vec())
            .map_err(|e| TrustWrapperError::ProofFailure(e.to_string()))?;

        // Step 5: package the request and pick participating chains.
        let participating_chains = if policy.participating_chains.is_empty() {
            self.config.participating_chains.clone()
        } else {
            policy.participating_chains.clone()
        };

        let deadline = context
            .deadline_unix_s
            .unwrap_or_else(|| now_unix_s() + self.config.timeout_seconds);

        if cancel.is_cancelled() {
            return Err(TrustWrapperError::Canceled);
        }

        // Connect every participating adapter and run its chain-local
        // re-check, a chain-local verdict independent of consensus.
        let mut chain_receipts = Vec::new();
        for chain_type in &participating_chains {
            if let Some(adapter) = self.chain_adapters.get(chain_type) {
                if !adapter.is_connected() {
                    let _ = adapter.connect().await;
                }
                if let Ok(receipt) = adapter.verify_ai_output(&request_id, score.score).await {
                    chain_receipts.push(receipt);
                }
            }
        }

        // Bridge the request to every non-origin chain so a cross-chain
        // message trail exists even though vote tallying below is driven
        // directly through the consensus engine (C9 is chain-agnostic; the
        // adapters' own vote stores in C6 are a separate, per-chain ledger).
        if let Some((&origin, targets)) = participating_chains.split_first() {
            let payload = encode_bridge_payload(
                &request_id,
                &commitment,
                proof.scheme,
                &proof.blob,
                &score,
                &self.issuer_pubkey_hex(),
            );
            for &target in targets {
                let message = BridgeMessage {
                    message_id: uuid::Uuid::new_v4().to_string(),
                    message_type: BridgeMessageType::VerificationRequest,
                    source_chain: origin,
                    target_chain: target,
                    payload: payload.clone(),
                    priority: Priority::High,
                    retry_count: 0,
                    max_retries: self.config.max_retry_attempts,
                    status: BridgeMessageStatus::Pending,
                    created_at: now_unix_s(),
                    deadline,
                };
                if self.broker.enqueue(message).await.is_ok() {
                    // Drain synchronously; the mock adapters never really
                    // block, so one pass per message suffices here.
                    let _ = self.broker.process_one().await;
                }
            }
        }

        // Step 6/7: run consensus over the chain-local verdicts. A policy
        // override wins outright; absent that, the configured
        // `consensus_algorithm` choice resolves against the participant set
        // the same way `ConsensusEngine::select_algorithm` would for `auto`.
        let weights_meaningful = policy.consensus_algorithm_override == Some(ConsensusAlgorithm::Weighted)
            || self.config.consensus_algorithm == crate::config::ConsensusAlgorithmChoice::Weighted;
        let algorithm = policy.consensus_algorithm_override.unwrap_or_else(|| {
            self.config
                .consensus_algorithm
                .resolve(participating_chains.len(), weights_meaningful)
        });

        let consensus_id = self
            .consensus
            .start_instance(request_id.clone(), algorithm, participating_chains.clone(), deadline)
            .await;

        for receipt in &chain_receipts {
            if cancel.is_cancelled() {
                self.consensus.cancel(&consensus_id).await;
                self.broker.drop_pending_for_request(&request_id).await;
                return Err(TrustWrapperError::Canceled);
            }
            let value = receipt.status == crate::types::ChainVerificationStatus::Verified;
            let _ = self
                .chain_adapters
                .get(&receipt.chain_type)
                .unwrap()
                .submit_consensus_vote(&request_id, value, receipt.confidence, 1.0)
                .await;
            let vote = ConsensusVote {
                vote_id: uuid::Uuid::new_v4().to_string(),
                request_id: request_id.clone(),
                voter_chain: receipt.chain_type,
                value,
                confidence: receipt.confidence,
                weight: 1.0,
                timestamp: now_unix_s(),
                signature: None,
            };
            self.consensus.submit_vote(&consensus_id, vote).await;
        }

        // Poll until decided or past the instance's deadline. Every vote a
        // connected adapter will ever cast was already submitted above, so
        // all that remains is waiting out the clock: the "no further votes
        // arrive" case resolves at the deadline, not before.
        let started = std::time::Instant::now();
        let mut state = self.consensus.state_of(&consensus_id).await.unwrap_or(ConsensusState::Collecting);
        while state == ConsensusState::Collecting || state == ConsensusState::QuorumReached {
            if cancel.is_cancelled() {
                self.consensus.cancel(&consensus_id).await;
                self.broker.drop_pending_for_request(&request_id).await;
                return Err(TrustWrapperError::Canceled);
            }
            if let Some(next) = self.consensus.expire_if_past_deadline(&consensus_id).await {
                state = next;
                if matches!(state, ConsensusState::TimedOut | ConsensusState::Finalized) {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            state = self.consensus.state_of(&consensus_id).await.unwrap_or(state);
        }

        let votes_collected = self.consensus.votes_of(&consensus_id).await.len();
        let timed_out = state == ConsensusState::TimedOut;

        // Step 8 (optional): threshold-sign the finalized result.
        let mut signature = None;
        if !timed_out {
            if let (Some(group_id), Some(ts_cfg)) =
                (&policy.threshold_signature_group, &self.config.threshold_signature)
            {
                if !self.threshold.group_exists(group_id).await {
                    let _ = self.threshold.setup(group_id.clone(), ts_cfg.t, ts_cfg.n, ts_cfg.scheme).await;
                }
                let message = commitment.0.to_vec();
                let mut partials = Vec::with_capacity(ts_cfg.n as usize);
                for signer_id in 1..=ts_cfg.n {
                    if let Ok(partial) = self.threshold.partial_sign(group_id, &message, signer_id).await {
                        partials.push(partial);
                    }
                }
                signature = self.threshold.try_combine(group_id, &message, &partials).await.ok();
            }
        }

        let final_verdict = if timed_out { Verdict::Borderline } else { score.verdict };

        Ok(VerificationResult {
            request_id,
            final_verdict,
            aggregated_score: score.score,
            chain_receipts,
            signature,
            consensus_stats: ConsensusStats {
                algorithm,
                votes_collected,
                timed_out,
                duration_ms: started.elapsed().as_millis() as u64,
            },
        })
    }

    /// Cancels any outstanding consensus instance for `request_id` and drops
    /// its pending bridge messages, per the cancellation contract.
    pub async fn cancel_request(&self, request_id: &str, consensus_id: &str) {
        self.consensus.cancel(consensus_id).await;
        self.broker.drop_pending_for_request(request_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainAdapter;
    use crate::config::Config;
    use crate::oracle::MockOracleAdapter;
    use crate::types::{ArtifactKind, ThresholdScheme};

    fn connected_chain(chain_type: ChainType) -> Arc<MockChainAdapter> {
        Arc::new(MockChainAdapter::new(chain_type))
    }

    fn three_chain_orchestrator() -> VerificationOrchestrator {
        let chains: Vec<Arc<dyn ChainAdapter>> = vec![
            connected_chain(ChainType::Ethereum),
            connected_chain(ChainType::Polygon),
            connected_chain(ChainType::Solana),
        ];
        let mut config = Config::default();
        config.participating_chains = vec![ChainType::Ethereum, ChainType::Polygon, ChainType::Solana];
        VerificationOrchestrator::new(chains, Vec::new(), config)
    }

    #[tokio::test]
    async fn known_factual_text_passes_unanimously() {
        let orchestrator = three_chain_orchestrator();
        let artifact = Artifact::text("The capital of France is Paris.");
        let result = orchestrator
            .verify(
                artifact,
                VerificationContext::default(),
                VerificationPolicy::default(),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.final_verdict, Verdict::Pass);
        assert!((result.aggregated_score - 1.0).abs() < 1e-9);
        assert_eq!(result.chain_receipts.len(), 3);
        assert!(!result.consensus_stats.timed_out);
    }

    #[tokio::test]
    async fn future_event_claim_is_borderline() {
        let orchestrator = three_chain_orchestrator();
        let artifact = Artifact::text("The 2099 Olympics were won by Mars.");
        let context = VerificationContext {
            reference_unix_time: Some(1_735_689_600), // 2025-01-01
            ..Default::default()
        };
        let result = orchestrator
            .verify(artifact, context, VerificationPolicy::default(), CancellationToken::new())
            .await
            .unwrap();

        assert!((result.aggregated_score - 0.64).abs() < 1e-6, "got {}", result.aggregated_score);
    }

    #[tokio::test]
    async fn threshold_signature_attached_when_configured() {
        let chains: Vec<Arc<dyn ChainAdapter>> = vec![
            connected_chain(ChainType::Ethereum),
            connected_chain(ChainType::Polygon),
            connected_chain(ChainType::Solana),
            connected_chain(ChainType::Cardano),
        ];
        let mut config = Config::default();
        config.participating_chains =
            vec![ChainType::Ethereum, ChainType::Polygon, ChainType::Solana, ChainType::Cardano];
        config.threshold_signature = Some(crate::config::ThresholdSignatureConfig {
            scheme: ThresholdScheme::Schnorr,
            group_id: "validators-1".into(),
            t: 3,
            n: 4,
        });
        let orchestrator = VerificationOrchestrator::new(chains, Vec::new(), config);

        let policy = VerificationPolicy {
            threshold_signature_group: Some("validators-1".into()),
            ..Default::default()
        };
        let result = orchestrator
            .verify(
                Artifact::text("The capital of France is Paris."),
                VerificationContext::default(),
                policy,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let signature = result.signature.expect("threshold signature should be attached");
        assert_eq!(signature.signers.len(), 3);
    }

    #[tokio::test]
    async fn disconnected_single_chain_still_degrades_gracefully() {
        let orchestrator = VerificationOrchestrator::new(
            vec![connected_chain(ChainType::Ethereum)],
            Vec::new(),
            Config {
                participating_chains: vec![ChainType::Ethereum],
                ..Config::default()
            },
        );
        let result = orchestrator
            .verify(
                Artifact {
                    kind: ArtifactKind::Text,
                    bytes: Vec::new(),
                },
                VerificationContext::default(),
                VerificationPolicy::default(),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.chain_receipts.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_before_start_returns_canceled_error() {
        let orchestrator = three_chain_orchestrator();
        let token = CancellationToken::new();
        token.cancel();
        let err = orchestrator
            .verify(
                Artifact::text("hello"),
                VerificationContext::default(),
                VerificationPolicy::default(),
                token,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TrustWrapperError::Canceled));
    }

    #[tokio::test]
    async fn oracle_evidence_feeds_into_score() {
        let oracle = Arc::new(MockOracleAdapter::new("feed-1", vec![crate::types::OracleDataType::Price]));
        oracle.connect().await.unwrap();
        oracle
            .seed(crate::types::OracleDataPoint {
                oracle_id: "feed-1".into(),
                data_type: crate::types::OracleDataType::Price,
                value: crate::types::OracleValue::Numeric(100.0),
                timestamp: now_unix_s(),
                confidence: 0.9,
                source_address: None,
                metadata: Default::default(),
            })
            .await;

        let chains: Vec<Arc<dyn ChainAdapter>> = vec![connected_chain(ChainType::Ethereum), connected_chain(ChainType::Polygon)];
        let oracle_adapters: Vec<Arc<dyn OracleAdapter>> = vec![oracle];
        let mut config = Config::default();
        config.participating_chains = vec![ChainType::Ethereum, ChainType::Polygon];
        let orchestrator = VerificationOrchestrator::new(chains, oracle_adapters, config);

        let context = VerificationContext {
            evidence_requirements: vec![crate::types::OracleQuery {
                query_id: "q1".into(),
                data_type: crate::types::OracleDataType::Price,
                parameters: Default::default(),
                timeout_ms: 500,
            }],
            ..Default::default()
        };
        let result = orchestrator
            .verify(Artifact::text("fact"), context, VerificationPolicy::default(), CancellationToken::new())
            .await
            .unwrap();
        // Single oracle source never achieves 2-source consensus, so it
        // must not fail the request outright; it's merely absent from
        // penalization (consensus_achieved requires >=2 contributing
        // sources, so here consensus_achieved stays false and the flat
        // disagreement penalty applies).
        assert!(result.aggregated_score <= 1.0);
    }
}
