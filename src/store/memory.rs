// src/store/memory.rs
//! In-process store with the same semantics as the Postgres one.
//! Used by tests and by the binary's `--memory` mode.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::delegation::Delegation;
use crate::ingest::types::DelegationStore;
use crate::store::{year_bounds, DelegationReader};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<BTreeMap<i64, Delegation>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<i64, Delegation>>> {
        self.rows
            .lock()
            .map_err(|_| anyhow!("memory store mutex poisoned"))
    }
}

#[async_trait]
impl DelegationStore for MemoryStore {
    async fn add_delegations(&self, batch: &[Delegation]) -> Result<()> {
        let mut rows = self.lock()?;
        for d in batch {
            rows.entry(d.operation_id).or_insert_with(|| d.clone());
        }
        Ok(())
    }

    async fn latest_block_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        let rows = self.lock()?;
        Ok(rows.values().map(|d| d.block_timestamp).max())
    }
}

#[async_trait]
impl DelegationReader for MemoryStore {
    async fn list_delegations(&self, year: Option<i32>) -> Result<Vec<Delegation>> {
        let bounds = year.map(year_bounds).transpose()?;
        let rows = self.lock()?;
        let mut out: Vec<Delegation> = rows
            .values()
            .filter(|d| match bounds {
                Some((start, end)) => d.block_timestamp >= start && d.block_timestamp < end,
                None => true,
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.block_timestamp
                .cmp(&a.block_timestamp)
                .then(b.operation_id.cmp(&a.operation_id))
        });
        Ok(out)
    }
}
