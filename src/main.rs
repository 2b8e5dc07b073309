mod cli;
mod execute;

use anyhow::Result;
use clap::Parser;

use crate::cli::CLI;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = CLI::parse();
    execute::execute(cli).await
}
