// src/ingest/scheduler.rs
//! Delegation scraper: polls TzKT on a fixed cadence and appends new
//! delegations to the store.
//!
//! Startup errors (poll interval, initial cursor) are fatal. Per-cycle errors
//! are logged and the same window is retried on the next tick: a failed cycle
//! never moves the cursor, so nothing is skipped, and replays are absorbed by
//! the store's idempotent append.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::ingest::cursor::Cursor;
use crate::ingest::types::{DelegationSource, DelegationStore};
use crate::ingest::{ensure_metrics_described, latest_timestamp, normalize_all};

pub struct Scraper<S, D> {
    source: S,
    store: D,
}

impl<S, D> Scraper<S, D>
where
    S: DelegationSource,
    D: DelegationStore,
{
    pub fn new(source: S, store: D) -> Self {
        Self { source, store }
    }

    /// Scrape until `cancel` fires (returns `Ok`) or a startup step fails.
    ///
    /// `since` overrides the starting cursor; otherwise it is derived from
    /// the store (latest timestamp + 1s, or now when the store is empty).
    pub async fn run(&self, cancel: CancellationToken, since: Option<DateTime<Utc>>) -> Result<()> {
        ensure_metrics_described();

        let period = self
            .source
            .poll_interval()
            .await
            .context("fetching poll interval from TzKT")?;
        if period.is_zero() {
            bail!("TzKT reported a zero poll interval");
        }

        let mut cursor = match since {
            Some(t) => Cursor::new(t),
            None => self.starting_cursor().await?,
        };

        // First tick one full period after start, like a plain ticker.
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            target: "ingest",
            interval_ms = period.as_millis() as u64,
            since = %cursor.since(),
            "scraper started"
        );

        let mut failures: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(target: "ingest", since = %cursor.since(), "scraper cancelled");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    counter!("ingest_cycles_total").increment(1);
                    tracing::info!(target: "ingest", since = %cursor.since(), "scraping delegations");

                    match self.run_once(&mut cursor).await {
                        Ok(stored) => {
                            failures = 0;
                            tracing::debug!(target: "ingest", stored, next = %cursor.since(), "cycle done");
                        }
                        Err(e) => {
                            failures += 1;
                            tracing::warn!(
                                target: "ingest",
                                error = ?e,
                                consecutive_failures = failures,
                                "scrape cycle failed, retrying next tick"
                            );
                        }
                    }

                    gauge!("ingest_consecutive_failures").set(failures as f64);
                    gauge!("ingest_cursor_ts").set(cursor.since().timestamp() as f64);
                }
            }
        }
    }

    /// One scrape cycle. Returns the number of delegations handed to the
    /// store. On error `cursor` is left untouched.
    pub async fn run_once(&self, cursor: &mut Cursor) -> Result<usize> {
        let raw = match self.source.delegations_since(cursor.since()).await {
            Ok(raw) => raw,
            Err(e) => {
                counter!("ingest_fetch_errors_total").increment(1);
                return Err(e.context("fetching delegations"));
            }
        };
        tracing::info!(target: "ingest", fetched = raw.len(), "fetched delegation(s) from TzKT");

        let batch = normalize_all(raw);
        let Some(latest) = latest_timestamp(&batch) else {
            // nothing new; start the next window from now
            cursor.advance_to(Utc::now());
            return Ok(0);
        };

        if let Err(e) = self.store.add_delegations(&batch).await {
            counter!("ingest_store_errors_total").increment(1);
            return Err(e.context("storing delegations"));
        }
        counter!("ingest_delegations_total").increment(batch.len() as u64);

        cursor.advance_past(latest);
        Ok(batch.len())
    }

    async fn starting_cursor(&self) -> Result<Cursor> {
        let latest = self
            .store
            .latest_block_timestamp()
            .await
            .context("reading latest stored block timestamp")?;
        Ok(match latest {
            Some(t) => Cursor::resume_after(t),
            None => Cursor::new(Utc::now()),
        })
    }
}
