use anyhow::Result;
use clap::Parser;

use parley_cli::{init_gateway_logging, run_cli, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_gateway_logging(cli.log_level)?;
    run_cli(cli).await
}
