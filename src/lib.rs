// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod delegation;
pub mod metrics;
pub mod server;
pub mod store;

// Ingestion pipeline (TzKT client, cursor, scraper loop)
pub mod ingest;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::delegation::Delegation;
pub use crate::ingest::scheduler::Scraper;
pub use crate::ingest::types::{DelegationSource, DelegationStore};
pub use crate::store::{DelegationReader, MemoryStore, PgStore};
