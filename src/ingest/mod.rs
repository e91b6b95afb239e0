// src/ingest/mod.rs
pub mod cursor;
pub mod providers;
pub mod scheduler;
pub mod types;

use chrono::{DateTime, Utc};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

use crate::delegation::Delegation;
use crate::ingest::types::TzktDelegation;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_cycles_total", "Scrape cycles run by the scheduler.");
        describe_counter!(
            "ingest_delegations_total",
            "Delegations handed to the store (before dedup)."
        );
        describe_counter!(
            "ingest_fetch_errors_total",
            "TzKT fetch failures (cycle retried, cursor held)."
        );
        describe_counter!(
            "ingest_store_errors_total",
            "Store append failures (cycle retried, cursor held)."
        );
        describe_gauge!("ingest_cursor_ts", "Unix ts of the current scrape cursor.");
        describe_gauge!(
            "ingest_consecutive_failures",
            "Failed cycles since the last successful one."
        );
        describe_histogram!("tzkt_request_ms", "TzKT request time in milliseconds.");
    });
}

/// Map a TzKT delegation onto its storage representation, field for field.
pub fn normalize(raw: TzktDelegation) -> Delegation {
    Delegation {
        operation_id: raw.id,
        block_timestamp: raw.timestamp,
        block_hash: raw.block,
        sender: raw.sender.address,
        level: raw.level,
        amount: raw.amount,
    }
}

/// Normalize a fetched batch, keeping source order.
pub fn normalize_all(raw: Vec<TzktDelegation>) -> Vec<Delegation> {
    raw.into_iter().map(normalize).collect()
}

/// Most recent block timestamp of a batch.
///
/// TzKT sorts by operation id, not by time, so this scans the whole batch.
pub fn latest_timestamp(batch: &[Delegation]) -> Option<DateTime<Utc>> {
    batch.iter().map(|d| d.block_timestamp).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::TzktAccount;
    use chrono::TimeZone;

    fn raw(id: i64, hour: u32) -> TzktDelegation {
        TzktDelegation {
            id,
            timestamp: Utc.with_ymd_and_hms(2024, 6, 25, hour, 2, 33).unwrap(),
            block: format!("hash{id}"),
            sender: TzktAccount {
                address: format!("addr{id}"),
            },
            level: 200 + id as i32,
            amount: 300 + id,
        }
    }

    #[test]
    fn normalize_maps_every_field() {
        let d = normalize(raw(42, 10));
        assert_eq!(d.operation_id, 42);
        assert_eq!(
            d.block_timestamp,
            Utc.with_ymd_and_hms(2024, 6, 25, 10, 2, 33).unwrap()
        );
        assert_eq!(d.block_hash, "hash42");
        assert_eq!(d.sender, "addr42");
        assert_eq!(d.level, 242);
        assert_eq!(d.amount, 342);
    }

    #[test]
    fn normalize_all_keeps_order() {
        let out = normalize_all(vec![raw(43, 9), raw(41, 11), raw(42, 10)]);
        let ids: Vec<i64> = out.iter().map(|d| d.operation_id).collect();
        assert_eq!(ids, vec![43, 41, 42]);
    }

    #[test]
    fn latest_timestamp_is_not_the_last_element() {
        let batch = normalize_all(vec![raw(1, 8), raw(2, 15), raw(3, 12)]);
        assert_eq!(
            latest_timestamp(&batch),
            Some(Utc.with_ymd_and_hms(2024, 6, 25, 15, 2, 33).unwrap())
        );
        assert_eq!(latest_timestamp(&[]), None);
    }
}
