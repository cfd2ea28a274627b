use clap::Parser;
use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

use ledger_core::cli::{Cli, Commands, DbCommands, handle_config_validate, handle_db_migrate};
use ledger_core::config::Config;
use ledger_core::rail::{MockRail, PaymentRail, RailClient};
use ledger_core::{AppState, create_app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => handle_db_migrate(&config).await,
        Commands::Config => handle_config_validate(&config),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let rail: Arc<dyn PaymentRail> = match &config.payment_rail_url {
        Some(url) => {
            tracing::info!("Payment rail client initialized with URL: {}", url);
            Arc::new(RailClient::new(url.clone()))
        }
        None => {
            tracing::warn!("PAYMENT_RAIL_URL unset; using in-process mock rail");
            Arc::new(MockRail)
        }
    };

    let state = AppState { db: pool, rail };
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
