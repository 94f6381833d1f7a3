//! Healthbeat health-check engine.
//!
//! Probes registered HTTP endpoints, appends a metric per probe, keeps at
//! most one active alert per monitor and writes the derived status back.
//! [`orchestrator::CheckOrchestrator::run_cycle`] is the single entry point
//! both binaries drive.

pub mod config;
pub mod database;
pub mod monitoring;
pub mod orchestrator;
pub mod pool;
pub mod validation;

pub use config::Config;
pub use database::{Database, DatabaseImpl, StoreError};
pub use orchestrator::{CheckOrchestrator, CycleError, RunSummary};
