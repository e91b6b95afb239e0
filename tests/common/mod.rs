// tests/common/mod.rs
//
// Recording test doubles for the ingest capability traits.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use tezos_delegations::ingest::types::{TzktAccount, TzktDelegation};
use tezos_delegations::{Delegation, DelegationReader, DelegationSource, DelegationStore};

pub fn tzkt(id: i64, ts: DateTime<Utc>, block: &str, sender: &str, level: i32, amount: i64) -> TzktDelegation {
    TzktDelegation {
        id,
        timestamp: ts,
        block: block.to_string(),
        sender: TzktAccount {
            address: sender.to_string(),
        },
        level,
        amount,
    }
}

/// The two delegations used across the scraper tests (ids 42 and 43).
pub fn two_delegations() -> Vec<TzktDelegation> {
    vec![
        tzkt(
            42,
            Utc.with_ymd_and_hms(2024, 6, 25, 10, 2, 33).unwrap(),
            "hash1",
            "addr1",
            242,
            342,
        ),
        tzkt(
            43,
            Utc.with_ymd_and_hms(2024, 6, 25, 14, 2, 33).unwrap(),
            "hash2",
            "addr2",
            243,
            343,
        ),
    ]
}

#[derive(Clone)]
pub enum Fetch {
    Ok(Vec<TzktDelegation>),
    Fail,
}

/// Scripted TzKT stand-in: answers from `script` first, then `fallback`.
pub struct MockSource {
    interval: Option<Duration>,
    script: Mutex<VecDeque<Fetch>>,
    fallback: Fetch,
    watermarks: Mutex<Vec<DateTime<Utc>>>,
    interval_calls: Mutex<usize>,
}

impl MockSource {
    pub fn new(interval: Duration, fallback: Fetch) -> Self {
        Self {
            interval: Some(interval),
            script: Mutex::new(VecDeque::new()),
            fallback,
            watermarks: Mutex::new(Vec::new()),
            interval_calls: Mutex::new(0),
        }
    }

    pub fn failing_interval() -> Self {
        Self {
            interval: None,
            ..Self::new(Duration::ZERO, Fetch::Ok(vec![]))
        }
    }

    pub fn then(self, step: Fetch) -> Self {
        self.script.lock().unwrap().push_back(step);
        self
    }

    pub fn watermarks(&self) -> Vec<DateTime<Utc>> {
        self.watermarks.lock().unwrap().clone()
    }

    pub fn interval_calls(&self) -> usize {
        *self.interval_calls.lock().unwrap()
    }
}

#[async_trait]
impl DelegationSource for MockSource {
    async fn poll_interval(&self) -> Result<Duration> {
        *self.interval_calls.lock().unwrap() += 1;
        self.interval.ok_or_else(|| anyhow!("fake http error"))
    }

    async fn delegations_since(&self, since: DateTime<Utc>) -> Result<Vec<TzktDelegation>> {
        self.watermarks.lock().unwrap().push(since);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match step {
            Fetch::Ok(v) => Ok(v),
            Fetch::Fail => Err(anyhow!("fake TzKT error")),
        }
    }
}

#[derive(Clone, Copy)]
pub enum Latest {
    At(DateTime<Utc>),
    Empty,
    Fail,
}

/// Recording store: every append attempt is captured, failing or not.
pub struct MockStore {
    latest: Latest,
    failing_appends: Mutex<usize>,
    appends: Mutex<Vec<Vec<Delegation>>>,
    latest_calls: Mutex<usize>,
}

impl MockStore {
    pub fn new(latest: Latest) -> Self {
        Self {
            latest,
            failing_appends: Mutex::new(0),
            appends: Mutex::new(Vec::new()),
            latest_calls: Mutex::new(0),
        }
    }

    /// Make the next `n` appends fail.
    pub fn failing_appends(self, n: usize) -> Self {
        *self.failing_appends.lock().unwrap() = n;
        self
    }

    pub fn appends(&self) -> Vec<Vec<Delegation>> {
        self.appends.lock().unwrap().clone()
    }

    pub fn latest_calls(&self) -> usize {
        *self.latest_calls.lock().unwrap()
    }
}

#[async_trait]
impl DelegationStore for MockStore {
    async fn add_delegations(&self, batch: &[Delegation]) -> Result<()> {
        self.appends.lock().unwrap().push(batch.to_vec());
        let mut failing = self.failing_appends.lock().unwrap();
        if *failing > 0 {
            *failing -= 1;
            return Err(anyhow!("fake database error"));
        }
        Ok(())
    }

    async fn latest_block_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        *self.latest_calls.lock().unwrap() += 1;
        match self.latest {
            Latest::At(t) => Ok(Some(t)),
            Latest::Empty => Ok(None),
            Latest::Fail => Err(anyhow!("fake database error")),
        }
    }
}

/// Read side double for the HTTP tests.
pub struct MockReader {
    rows: Option<Vec<Delegation>>, // None => error
    delay: Duration,
    calls: Mutex<Vec<Option<i32>>>,
}

impl MockReader {
    pub fn returning(rows: Vec<Delegation>) -> Self {
        Self {
            rows: Some(rows),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers only after `delay` (tokio time).
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::returning(vec![])
        }
    }

    pub fn failing() -> Self {
        Self {
            rows: None,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Option<i32>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DelegationReader for MockReader {
    async fn list_delegations(&self, year: Option<i32>) -> Result<Vec<Delegation>> {
        self.calls.lock().unwrap().push(year);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.rows
            .clone()
            .ok_or_else(|| anyhow!("fake database error: password=hunter2"))
    }
}

pub fn within_a_second_of_now(t: DateTime<Utc>) -> bool {
    (Utc::now() - t).num_milliseconds().abs() < 1_000
}
