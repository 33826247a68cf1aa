mod config;
mod http;
mod validation;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use platform_db::{ActivityStore, connect};
use platform_obs::{ObsConfig, init_tracing};
use tracing::info;

use crate::{
    config::AppConfig,
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "activities-server", version, about = "Activities CRUD service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve(ServeCommand),
    /// Open the pool, ping the database and exit.
    #[command(name = "check-db")]
    CheckDb,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, env = "LISTEN_HOST", default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, env = "PORT", default_value_t = 8081)]
    port: u16,
}

impl From<ServeCommand> for ServeConfig {
    fn from(value: ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::from_env())?;
    let cli = Cli::parse();
    let config = Arc::new(AppConfig::load()?);
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, config).await,
        Command::CheckDb => check_db(&config).await,
    }
}

async fn setup_store(config: &AppConfig) -> Result<ActivityStore> {
    let pool = connect(&config.database)
        .await
        .context("database initialization failed")?;
    Ok(ActivityStore::new(pool, config.database.statement_timeout))
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let store = setup_store(&config).await?;
    let state = AppState { store, config };
    http::serve(cmd.into(), state).await
}

async fn check_db(config: &AppConfig) -> Result<()> {
    setup_store(config).await?;
    info!("database reachable");
    Ok(())
}
