//! Command-line arguments for the results tool and the agent.

use camino::Utf8PathBuf;
use clap::Parser;
use wlm_transfer::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, TransferConfig};

/// Environment variable consulted when `--sock` is not given.
pub const AGENT_SOCK_ENV: &str = "WLM_AGENT_SOCK";

#[derive(Parser, Debug)]
#[command(name = "wlm-results", version)]
#[command(about = "Move job results between this machine and a Slurm agent")]
pub struct ResultsArgs {
    /// Path to read from (local on upload, on the agent on download)
    #[arg(long)]
    pub from: Utf8PathBuf,

    /// Directory to write into (on the agent on upload, local on download)
    #[arg(long)]
    pub to: Utf8PathBuf,

    /// Push `from` to the agent instead of pulling it
    #[arg(long)]
    pub upload: bool,

    /// Agent socket
    #[arg(long, env = AGENT_SOCK_ENV)]
    pub sock: Utf8PathBuf,
}

#[derive(Parser, Debug)]
#[command(name = "wlm-agent", version)]
#[command(about = "Serve file transfers next to a Slurm cluster")]
pub struct AgentArgs {
    /// Socket to listen on
    #[arg(long, env = AGENT_SOCK_ENV)]
    pub sock: Utf8PathBuf,

    /// Bytes of file content per streamed chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_chunk_size)]
    pub chunk_size: usize,
}

fn parse_chunk_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if (1..=MAX_CHUNK_SIZE).contains(&n) => Ok(n),
        Ok(_) => Err(format!("chunk size must be between 1 and {MAX_CHUNK_SIZE} bytes")),
        Err(e) => Err(e.to_string()),
    }
}

impl AgentArgs {
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            chunk_size: self.chunk_size,
        }
    }
}
