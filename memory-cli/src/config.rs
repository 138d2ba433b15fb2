//! Configuration loading and storage-backend wiring shared by every subcommand.

use std::sync::Arc;

use memory_core::config::AppConfig;
use memory_storage_redb::RedbStore;
use memory_storage_turso::TursoStore;

/// The storage backends a subcommand needs, constructed once at startup.
pub struct Stores {
    pub turso: Arc<TursoStore>,
    pub redb: Arc<RedbStore>,
}

/// Load [`AppConfig`] from the environment and open both storage backends.
///
/// # Errors
///
/// Propagates configuration errors and storage connection failures.
pub async fn initialize_storage(config: &AppConfig) -> anyhow::Result<Stores> {
    let turso = TursoStore::new(
        &config.database_url,
        config.database_auth_token.as_deref().unwrap_or(""),
    )
    .await?;
    turso.migrate().await?;

    let redb = RedbStore::open(&config.redb_path)?;

    Ok(Stores {
        turso: Arc::new(turso),
        redb: Arc::new(redb),
    })
}
