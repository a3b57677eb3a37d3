//! wlm-agent - serve file transfers next to a Slurm cluster.

mod logging;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use wlm_cli::AgentArgs;
use wlm_slurm::SlurmClient;
use wlm_transfer::Agent;

/// Log what the local Slurm installation offers. Transfers do not need
/// Slurm, so a missing installation is only a warning.
async fn report_slurm() {
    let client = match SlurmClient::new() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("slurm is not available: {}", e);
            return;
        }
    };

    match client.version().await {
        Ok(version) => tracing::info!("slurm version {}", version),
        Err(e) => tracing::warn!("could not read slurm version: {}", e),
    }
    match client.partitions().await {
        Ok(partitions) => tracing::info!("slurm partitions: {}", partitions.join(", ")),
        Err(e) => tracing::warn!("could not list partitions: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = AgentArgs::parse();
    tracing::info!("wlm-agent {}", env!("CARGO_PKG_VERSION"));

    report_slurm().await;

    let listener = Agent::bind(&args.sock).into_diagnostic()?;
    let agent = Agent::new(args.transfer_config());

    tokio::select! {
        served = agent.serve(listener) => served.into_diagnostic()?,
        signal = tokio::signal::ctrl_c() => {
            signal.into_diagnostic()?;
            tracing::info!("shutting down");
        }
    }

    if let Err(e) = std::fs::remove_file(&args.sock) {
        tracing::debug!("could not remove socket {}: {}", args.sock, e);
    }
    Ok(())
}
