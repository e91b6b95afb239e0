// src/ingest/types.rs
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::delegation::Delegation;

/// Delegation operation as returned by TzKT `/v1/operations/delegations`
/// with `select=id,sender,amount,level,timestamp,block`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct TzktDelegation {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub block: String,
    pub sender: TzktAccount,
    pub level: i32,
    #[serde(default)]
    pub amount: i64, // omitted by TzKT on some zero-balance delegations
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct TzktAccount {
    pub address: String,
}

/// Remote source of delegation operations.
#[async_trait::async_trait]
pub trait DelegationSource: Send + Sync {
    /// Recommended polling cadence (the protocol's time between blocks).
    async fn poll_interval(&self) -> Result<Duration>;

    /// Delegations with `timestamp >= since`, sorted by source id.
    /// Timestamp order is NOT guaranteed.
    async fn delegations_since(&self, since: DateTime<Utc>) -> Result<Vec<TzktDelegation>>;
}

/// Write side of the durable delegation store.
#[async_trait::async_trait]
pub trait DelegationStore: Send + Sync {
    /// Append a batch atomically. Idempotent per `operation_id`: rows already
    /// present are skipped, so overlapping batches may be replayed freely.
    async fn add_delegations(&self, batch: &[Delegation]) -> Result<()>;

    /// Timestamp of the most recent stored delegation, `None` when empty.
    async fn latest_block_timestamp(&self) -> Result<Option<DateTime<Utc>>>;
}

#[async_trait::async_trait]
impl<T: DelegationSource + ?Sized> DelegationSource for std::sync::Arc<T> {
    async fn poll_interval(&self) -> Result<Duration> {
        (**self).poll_interval().await
    }

    async fn delegations_since(&self, since: DateTime<Utc>) -> Result<Vec<TzktDelegation>> {
        (**self).delegations_since(since).await
    }
}

#[async_trait::async_trait]
impl<T: DelegationStore + ?Sized> DelegationStore for std::sync::Arc<T> {
    async fn add_delegations(&self, batch: &[Delegation]) -> Result<()> {
        (**self).add_delegations(batch).await
    }

    async fn latest_block_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        (**self).latest_block_timestamp().await
    }
}
