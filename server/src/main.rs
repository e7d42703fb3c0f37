use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use database::{
    retry_with_backoff, DatabaseConfig, DatabaseError, SeedCatalog, SqliteStore, TriviaStore,
};
use server::{
    auth::AuthService,
    config::{CliOverrides, FileConfig},
    telemetry, AppState, ServerConfig,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "tap-tap-trivia", about = "Multiplayer trivia game server")]
struct Params {
    /// YAML file with server settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        #[arg(long)]
        bind_addr: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Load categories and trivia sets from a YAML catalog
    Seed {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Add a host account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, env = "TRIVIA_ADMIN_PASSWORD")]
        password: String,
    },
}

async fn open_store(config: &DatabaseConfig) -> anyhow::Result<SqliteStore> {
    let db = config.clone();
    let pool = retry_with_backoff(
        move || {
            let db = db.clone();
            Box::pin(async move {
                db.create_pool()
                    .await
                    .map_err(|e| DatabaseError::Connection(e.to_string()))
            })
        },
        5,
        Duration::from_millis(500),
    )
    .await
    .with_context(|| format!("Failed to connect to {}", config.url))?;

    let store = SqliteStore::new(pool);
    store.run_migrations().await?;
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init("tap-tap-trivia");
    let params = Params::parse();

    let file = params
        .config
        .as_ref()
        .map(FileConfig::from_file)
        .transpose()?;
    let mut cli = CliOverrides {
        database_url: params.database_url.clone(),
        ..Default::default()
    };
    if let Some(Command::Serve { bind_addr, port }) = &params.command {
        cli.bind_addr = bind_addr.clone();
        cli.port = *port;
    }
    let config = ServerConfig::load(cli, file)?;

    if config.database.is_in_memory() {
        tracing::warn!("Using an in-memory database, data is lost on exit");
    }
    let store = open_store(&config.database).await?;

    match params.command {
        Some(Command::Seed { file }) => {
            let catalog = SeedCatalog::from_file(&file)
                .with_context(|| format!("Failed to load {}", file.display()))?;
            let report = catalog.load_into(&store).await?;
            info!(?report, "Seed complete");
        }
        Some(Command::CreateAdmin {
            email,
            name,
            password,
        }) => {
            let auth = AuthService::new(&config.jwt_secret, config.token_ttl_secs, false);
            let hash = auth.hash_password(&password)?;
            let email = email.trim().to_lowercase();
            let admin_id = store.insert_admin(&email, name.trim(), &hash).await?;
            info!(admin_id, email = %email, "Admin created");
        }
        Some(Command::Serve { .. }) | None => {
            if let Some(seed_file) = &config.seed_file {
                let report = SeedCatalog::from_file(seed_file)?.load_into(&store).await?;
                info!(?report, "Seeded catalog from {seed_file}");
            }
            let state = AppState::new(Arc::new(store), &config);
            server::serve(&config, state).await?;
        }
    }

    Ok(())
}
