//! Illustrative CLI driver over `trustwrapper_core`. Not load-bearing: runs
//! one of a few canned verification scenarios against in-memory mock
//! adapters and prints the resulting `VerificationResult`.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use trustwrapper_core::chain::MockChainAdapter;
use trustwrapper_core::chain::ChainAdapter;
use trustwrapper_core::config::Config;
use trustwrapper_core::orchestrator::VerificationOrchestrator;
use trustwrapper_core::types::{Artifact, VerificationContext, VerificationPolicy};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify a known-true statement across the default chain set
    VerifyFact {
        #[arg(long, default_value = "The capital of France is Paris.")]
        text: String,
    },
    /// Verify a statement referencing a future event (expect borderline)
    VerifyFuture {
        #[arg(long, default_value = "The 2099 Olympics were won by Mars.")]
        text: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::default();
    let chains: Vec<Arc<dyn ChainAdapter>> = config
        .participating_chains
        .iter()
        .map(|&chain_type| Arc::new(MockChainAdapter::new(chain_type)) as Arc<dyn ChainAdapter>)
        .collect();
    let orchestrator = VerificationOrchestrator::new(chains, Vec::new(), config);

    let (artifact, context) = match cli.command {
        Commands::VerifyFact { text } => (Artifact::text(text), VerificationContext::default()),
        Commands::VerifyFuture { text } => (
            Artifact::text(text),
            VerificationContext {
                reference_unix_time: Some(1_735_689_600), // 2025-01-01
                ..Default::default()
            },
        ),
    };

    match orchestrator
        .verify(artifact, context, VerificationPolicy::default(), CancellationToken::new())
        .await
    {
        Ok(result) => {
            println!("request_id:       {}", result.request_id);
            println!("verdict:          {:?}", result.final_verdict);
            println!("score:            {:.4}", result.aggregated_score);
            println!("chain receipts:   {}", result.chain_receipts.len());
            println!("consensus:        {:?}", result.consensus_stats.algorithm);
            println!("votes collected:  {}", result.consensus_stats.votes_collected);
            println!("timed out:        {}", result.consensus_stats.timed_out);
        }
        Err(err) => {
            eprintln!("verification failed: {err}");
            std::process::exit(1);
        }
    }
}
