//! TrustWrapper core: trust scoring, commitments, and multi-chain BFT
//! consensus for AI agent outputs.
//!
//! The crate is organized the way the verification flow runs: an artifact
//! is detected for defects (`detector`), scored (`scorer`), optionally
//! checked against oracle evidence (`oracle`), committed and proved
//! (`commitment`), then dispatched across chains (`chain`, `bridge`) and
//! brought to Byzantine consensus (`consensus`), with an optional threshold
//! signature over the outcome (`threshold`). `orchestrator` wires all of it
//! together behind a single `verify` call.

pub mod bridge;
pub mod chain;
pub mod commitment;
pub mod config;
pub mod consensus;
pub mod detector;
pub mod error;
pub mod health;
pub mod oracle;
pub mod orchestrator;
pub mod scorer;
pub mod threshold;
pub mod types;

pub use config::{load_config, validate_config, Config};
pub use error::{Result, TrustWrapperError};
pub use orchestrator::VerificationOrchestrator;
pub use types::{
    Artifact, ArtifactKind, ChainType, ConsensusAlgorithm, Verdict, VerificationContext,
    VerificationPolicy, VerificationResult,
};
