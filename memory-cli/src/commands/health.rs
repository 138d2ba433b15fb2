//! `memory-cli health` — connectivity probe for both storage backends.

use serde::Serialize;

use crate::config::Stores;
use crate::output::{Output, OutputFormat};

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub turso_reachable: bool,
    pub redb_reachable: bool,
}

impl Output for HealthReport {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        writeln!(
            writer,
            "turso: {}",
            if self.turso_reachable { "ok" } else { "UNREACHABLE" }
        )?;
        writeln!(
            writer,
            "redb:  {}",
            if self.redb_reachable { "ok" } else { "UNREACHABLE" }
        )?;
        Ok(())
    }
}

/// Probe both backends with a cheap read and report the result.
///
/// # Errors
///
/// Only fails if rendering output fails; connectivity failures are
/// reported in the [`HealthReport`] rather than propagated.
pub async fn run(stores: &Stores, format: OutputFormat) -> anyhow::Result<()> {
    use memory_core::storage::GraphStore;

    let turso_reachable = stores.turso.find_node("__health_probe__", "__health_probe__").await.is_ok();
    let redb_reachable = {
        use memory_core::storage::WorkingMemoryStore;
        stores.redb.snapshot("__health_probe__").await.is_ok()
    };

    format.print_output(&HealthReport { turso_reachable, redb_reachable })
}
