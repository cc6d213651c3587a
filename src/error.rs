use thiserror::Error;

/// Top-level error type returned at every module boundary in the core.
///
/// Variants map 1:1 onto the error codes a `VerificationResult` may carry
/// when a verification fails outright rather than degrading.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrustWrapperError {
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("oracle consensus failed: max deviation {max_deviation:.4} exceeds threshold {threshold:.4}")]
    OracleConsensusFailed { max_deviation: f64, threshold: f64 },

    #[error("commitment failure: {0}")]
    CommitmentFailure(String),

    #[error("proof failure: {0}")]
    ProofFailure(String),

    #[error("no active bridge route from {source} to {target}")]
    BridgeRouteUnavailable { source: String, target: String },

    #[error("bridge message {message_id} timed out")]
    BridgeTimeout { message_id: String },

    #[error("consensus instance {consensus_id} timed out")]
    ConsensusTimeout { consensus_id: String },

    #[error("byzantine fault detected: {0}")]
    ByzantineFaultDetected(String),

    #[error("threshold signature incomplete: got {got}, need {need}")]
    ThresholdSignatureIncomplete { got: usize, need: usize },

    #[error("adapter disconnected: {0}")]
    AdapterDisconnected(String),

    #[error("operation canceled")]
    Canceled,
}

pub type Result<T> = std::result::Result<T, TrustWrapperError>;
