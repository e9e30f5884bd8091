use clap::Parser as _;
use warboard_lib::config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warboard_lib::run(Cli::parse()).await
}
