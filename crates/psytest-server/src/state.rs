//! Shared application state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use psytest_core::catalog::InstrumentCatalog;
use psytest_core::lifecycle::AssignmentEngine;
use psytest_core::traits::{AssignmentStore, CohortRoster};

/// State shared by every request handler.
pub struct AppState {
    pub engine: AssignmentEngine,
    pub roster: Arc<dyn CohortRoster>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        catalog: Arc<InstrumentCatalog>,
        store: Arc<dyn AssignmentStore>,
        roster: Arc<dyn CohortRoster>,
    ) -> Self {
        Self {
            engine: AssignmentEngine::new(catalog, store),
            roster,
            started_at: Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
