use clap::Parser;
use pratas_storefront::config::Cli;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    pratas_storefront::run(Cli::parse()).await
}
