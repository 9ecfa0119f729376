//! psytest-core — Assignment lifecycle, scoring, and aggregation engine.
//!
//! This crate defines the instrument data model, the assignment state
//! machine, answer validation, the pure scoring function, and cohort
//! aggregation statistics that the rest of the psytest system builds on.

pub mod catalog;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod parser;
pub mod scoring;
pub mod statistics;
pub mod traits;
