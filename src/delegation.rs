// src/delegation.rs
//! Storage representation of a Tezos delegation operation.

use chrono::{DateTime, Utc};

/// One delegation as persisted and served back by the query endpoint.
///
/// `operation_id` is the TzKT operation id and the uniqueness key in storage.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Delegation {
    pub operation_id: i64,
    pub block_timestamp: DateTime<Utc>, // second precision at the source
    pub block_hash: String,
    pub sender: String, // delegator address
    pub level: i32,
    pub amount: i64, // mutez
}
