mod config;
mod console;
mod models;
mod providers;
mod services;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use console::Console;
use services::settings::api_key_from_env;
use services::{Database, Orchestrator, PersistenceAdapter, SessionHandle, SessionStore, SettingsService};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let db_path = Database::default_path()?;
    let db = Arc::new(Database::open(&db_path)?);
    tracing::debug!("Using database at {}", db_path.display());

    let env = |key: &str| std::env::var(key).ok();
    let mut settings = SettingsService::load(db.as_ref());
    if let Err(e) = SettingsService::save(db.as_ref(), &settings) {
        tracing::warn!("Failed to write settings: {}", e);
    }
    settings.apply_env(env)?;
    settings.validate().context("Invalid configuration")?;

    let client = providers::build_client(&settings, api_key_from_env(env))?;

    let store = SessionStore::load(PersistenceAdapter::new(db));
    let orchestrator = Arc::new(Orchestrator::new(SessionHandle::new(store), client));

    Console::new(orchestrator).run().await
}
