use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use lexcase_api::auth::password::hash_password;
use lexcase_api::config;
use lexcase_api::database::{DatabaseManager, PgAccessStore, PgRecordStore};
use lexcase_api::{is_development, router, AppState};

#[derive(Parser)]
#[command(name = "lexcase-api")]
#[command(about = "Region-scoped case management API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to listen on; overrides LEXCASE_API_PORT")]
        port: Option<u16>,

        #[arg(long, default_value = "0.0.0.0", help = "Address to bind")]
        bind: String,
    },

    #[command(about = "Apply database migrations")]
    Migrate,

    #[command(about = "Print an Argon2 PHC string for seeding users.password_hash")]
    HashPassword { password: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SECURITY_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let default_level = if is_development!() { "lexcase_api=debug,tower_http=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve { port: None, bind: "0.0.0.0".to_string() }) {
        Command::Serve { port, bind } => serve(port, &bind).await,
        Command::Migrate => migrate().await,
        Command::HashPassword { password } => {
            println!("{}", hash_password(&password).context("failed to hash password")?);
            Ok(())
        }
    }
}

async fn serve(port: Option<u16>, bind: &str) -> anyhow::Result<()> {
    let config = config::config();
    tracing::info!(
        "Starting lexcase-api in {:?} mode (region policy {:?})",
        config.environment,
        config.access.region_policy
    );

    let pool = DatabaseManager::connect_from_env(&config.database).await.context("failed to connect to database")?;
    DatabaseManager::health_check(&pool).await.context("database health check failed")?;

    let state = AppState::new(
        config,
        Arc::new(PgAccessStore::new(pool.clone())),
        Arc::new(PgRecordStore::new(pool)),
    )
    .context("failed to initialise token service; is SECURITY_JWT_SECRET set?")?;
    let app = router(state);

    let bind_addr = format!("{}:{}", bind, port.unwrap_or(config.api.port));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("lexcase-api listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

async fn migrate() -> anyhow::Result<()> {
    let pool = DatabaseManager::connect_from_env(&config::config().database)
        .await
        .context("failed to connect to database")?;
    sqlx::migrate!("./migrations").run(&pool).await.context("migration failed")?;
    tracing::info!("Migrations applied");
    Ok(())
}
