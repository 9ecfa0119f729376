//! Versioned instrument catalog.
//!
//! Read-only to the engine: definitions are immutable per version, and an
//! assignment snapshots the question order of the version it was created
//! against.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use uuid::Uuid;

use crate::model::InstrumentDefinition;
use crate::parser;

/// In-memory catalog of instrument definitions keyed by type and version.
#[derive(Debug, Default)]
pub struct InstrumentCatalog {
    instruments: HashMap<String, BTreeMap<u32, Arc<InstrumentDefinition>>>,
}

impl InstrumentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from parsed definitions.
    pub fn from_definitions(definitions: Vec<InstrumentDefinition>) -> Self {
        let mut catalog = Self::new();
        for def in definitions {
            catalog.insert(def);
        }
        catalog
    }

    /// Load every instrument TOML file under a directory.
    pub fn load_directory(dir: &Path) -> Result<Self> {
        let definitions = parser::load_instrument_directory(dir)?;
        Ok(Self::from_definitions(definitions))
    }

    pub fn insert(&mut self, def: InstrumentDefinition) {
        self.instruments
            .entry(def.id.clone())
            .or_default()
            .insert(def.version, Arc::new(def));
    }

    /// Latest version of an instrument type.
    pub fn latest(&self, instrument_type: &str) -> Option<Arc<InstrumentDefinition>> {
        self.instruments
            .get(instrument_type)
            .and_then(|versions| versions.values().next_back())
            .cloned()
    }

    /// A specific instrument version, as snapshotted by an assignment.
    pub fn get(&self, instrument_type: &str, version: u32) -> Option<Arc<InstrumentDefinition>> {
        self.instruments
            .get(instrument_type)
            .and_then(|versions| versions.get(&version))
            .cloned()
    }

    pub fn instrument_types(&self) -> impl Iterator<Item = &str> {
        self.instruments.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

/// Deterministic question permutation for one assignment.
///
/// Seeded from the assignment id so the same assignment always replays the
/// same order across retries and resumption, while different assignments get
/// independent shuffles.
pub fn shuffled_order(question_count: usize, assignment_id: Uuid) -> Vec<usize> {
    let bytes = assignment_id.as_bytes();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&bytes[..8]);
    let mut rng = StdRng::seed_from_u64(u64::from_le_bytes(seed));

    let mut order: Vec<usize> = (0..question_count).collect();
    order.shuffle(&mut rng);
    order
}

/// Identity question order, used when shuffling is disabled.
pub fn sequential_order(question_count: usize) -> Vec<usize> {
    (0..question_count).collect()
}
