//! The `psytest serve` command.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use psytest_core::catalog::InstrumentCatalog;
use psytest_server::{AppState, PsytestServer, ServerConfig};
use psytest_store::{MemoryStore, StaticRoster};

pub async fn execute(
    instruments: PathBuf,
    roster: Option<PathBuf>,
    host: String,
    port: u16,
) -> Result<()> {
    let catalog = InstrumentCatalog::load_directory(&instruments)
        .with_context(|| format!("failed to load instruments from {}", instruments.display()))?;
    if catalog.is_empty() {
        bail!("no instrument definitions found in {}", instruments.display());
    }

    let roster = match roster {
        Some(path) => StaticRoster::load(&path)?,
        None => {
            tracing::warn!("no roster file given, cohort aggregation will reject all cohorts");
            StaticRoster::new(HashMap::new())
        }
    };

    let state = Arc::new(AppState::new(
        Arc::new(catalog),
        Arc::new(MemoryStore::new()),
        Arc::new(roster),
    ));

    let server = PsytestServer::new(ServerConfig::new(host, port), state);
    server.run().await?;
    Ok(())
}
