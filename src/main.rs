//! ul20-bridge: forwards TS280 sensor pushes and polled weather observations
//! to a FIWARE UltraLight 2.0 IoT Agent.

mod agent;
mod config;
mod error;
mod gateway;
mod mapping;
mod provision;
mod ul20;
mod weather;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ul20-bridge", version, about = "FIWARE UltraLight 2.0 sensor bridge")]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long, short, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the push-bridge HTTP gateway.
    Serve,
    /// Poll the weather API and forward observations on a fixed interval.
    Poll,
    /// Register the entity, IoT service, and device with the platform.
    Provision,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Serve => gateway::serve(cfg).await,
        Command::Poll => weather::run(cfg).await,
        Command::Provision => provision::run(cfg).await,
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
