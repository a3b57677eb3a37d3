//! wlm-results - push a local tree to a Slurm agent or pull one back.

mod logging;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use wlm_cli::ResultsArgs;
use wlm_transfer::{TransferClient, download, upload};

#[tokio::main]
async fn main() -> Result<()> {
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    logging::init();

    let args = ResultsArgs::parse();
    let client = TransferClient::new(args.sock.clone());

    if args.upload {
        let archive = upload(&client, &args.from, &args.to).await.into_diagnostic()?;
        println!("uploaded {} to {}", args.from, archive);
    } else {
        let archive = download(&client, &args.from, &args.to).await.into_diagnostic()?;
        println!("downloaded {} to {}", args.from, archive);
    }
    Ok(())
}
