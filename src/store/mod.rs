// src/store/mod.rs
//! Durable delegation storage: Postgres for production, in-memory for tests
//! and local runs. Both implement the ingest write contract
//! ([`DelegationStore`](crate::ingest::types::DelegationStore)) and the read
//! contract below.

pub mod memory;
pub mod postgres;

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};

use crate::delegation::Delegation;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Read side of the store, used by the query endpoint.
#[async_trait::async_trait]
pub trait DelegationReader: Send + Sync {
    /// All delegations, most recent `block_timestamp` first, optionally
    /// restricted to one UTC calendar year.
    async fn list_delegations(&self, year: Option<i32>) -> Result<Vec<Delegation>>;
}

#[async_trait::async_trait]
impl<T: DelegationReader + ?Sized> DelegationReader for std::sync::Arc<T> {
    async fn list_delegations(&self, year: Option<i32>) -> Result<Vec<Delegation>> {
        (**self).list_delegations(year).await
    }
}

/// `[start, end)` of a UTC calendar year.
pub(crate) fn year_bounds(year: i32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single();
    let end = year
        .checked_add(1)
        .and_then(|next| Utc.with_ymd_and_hms(next, 1, 1, 0, 0, 0).single());
    match (start, end) {
        (Some(s), Some(e)) => Ok((s, e)),
        _ => Err(anyhow!("year {year} out of range")),
    }
}
