//! Shared types and models for the Smart City Telemetry platform
//!
//! This crate contains the domain types exchanged between the collector,
//! the ingestion pipeline and the report generator. It performs no I/O.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
