use crate::{
    api::{self, views::JsonRenderer, AppState},
    auth::{AuthConfig, AuthState, HashCost},
    cli::commands::MEMORY_DSN,
    store::{MemoryStore, PgStore, Store},
    validation::forms,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: u64,
    pub secure_cookies: bool,
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
    pub hash_parallelism: u32,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the auth configuration is invalid, the database is
/// unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    forms::preload().context("Invalid form rules")?;
    let auth_state = Arc::new(auth_state(&args)?);
    let store = connect_store(&args.dsn).await?;

    let state = AppState {
        store,
        auth: auth_state,
        renderer: Arc::new(JsonRenderer),
    };

    api::serve(args.port, state).await
}

fn auth_state(args: &Args) -> Result<AuthState> {
    let config = AuthConfig::new(args.session_secret.clone())
        .context("Invalid session secret")?
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_secure_cookies(args.secure_cookies)
        .with_hash_cost(HashCost {
            memory_kib: args.hash_memory_kib,
            iterations: args.hash_iterations,
            parallelism: args.hash_parallelism,
        });
    AuthState::new(config).context("Invalid auth configuration")
}

async fn connect_store(dsn: &str) -> Result<Arc<dyn Store>> {
    if dsn == MEMORY_DSN {
        warn!("Using the in-memory store; data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;

    Ok(Arc::new(PgStore::new(pool)))
}

fn log_startup_args(args: &Args) {
    debug!(
        port = args.port,
        memory_store = args.dsn == MEMORY_DSN,
        session_ttl_seconds = args.session_ttl_seconds,
        secure_cookies = args.secure_cookies,
        hash_memory_kib = args.hash_memory_kib,
        hash_iterations = args.hash_iterations,
        hash_parallelism = args.hash_parallelism,
        "Starting server"
    );
}
