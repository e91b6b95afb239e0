// src/store/postgres.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::config::DatabaseConfig;
use crate::delegation::Delegation;
use crate::ingest::types::DelegationStore;
use crate::store::{year_bounds, DelegationReader};

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS delegation (
        operation_id    BIGINT PRIMARY KEY,
        block_timestamp TIMESTAMPTZ NOT NULL,
        block_hash      TEXT NOT NULL,
        sender          TEXT NOT NULL,
        level           INTEGER NOT NULL,
        amount          BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS delegation_block_timestamp_idx
        ON delegation (block_timestamp DESC)
    "#,
];

const INSERT_DELEGATION: &str = r#"
    INSERT INTO delegation (block_timestamp, operation_id, amount, level, sender, block_hash)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (operation_id) DO NOTHING
"#;

const SELECT_ALL: &str = r#"
    SELECT block_timestamp, operation_id, amount, level, sender, block_hash
    FROM delegation
    ORDER BY block_timestamp DESC, operation_id DESC
"#;

// Range on the raw column keeps the timestamp index usable.
const SELECT_YEAR: &str = r#"
    SELECT block_timestamp, operation_id, amount, level, sender, block_hash
    FROM delegation
    WHERE block_timestamp >= $1 AND block_timestamp < $2
    ORDER BY block_timestamp DESC, operation_id DESC
"#;

const SELECT_LATEST: &str =
    "SELECT block_timestamp FROM delegation ORDER BY block_timestamp DESC LIMIT 1";

/// Postgres-backed delegation store. Cheap to clone (shares the pool).
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and verify the database is reachable.
    #[tracing::instrument(level = "debug", skip(cfg), fields(host = %cfg.host, db = %cfg.database))]
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(cfg.acquire_timeout)
            .connect_with(cfg.connect_options())
            .await
            .context("connect postgres")?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .context("ping postgres")?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the delegation table and its index if missing.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn migrate(&self) -> Result<()> {
        for stmt in SCHEMA {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .context("apply delegation schema")?;
        }
        Ok(())
    }
}

fn delegation_from_row(row: &PgRow) -> Result<Delegation> {
    Ok(Delegation {
        block_timestamp: row.try_get("block_timestamp").context("block_timestamp")?,
        operation_id: row.try_get("operation_id").context("operation_id")?,
        amount: row.try_get("amount").context("amount")?,
        level: row.try_get("level").context("level")?,
        sender: row.try_get("sender").context("sender")?,
        block_hash: row.try_get("block_hash").context("block_hash")?,
    })
}

#[async_trait]
impl DelegationStore for PgStore {
    /// Inserts the whole batch in one transaction, skipping known operation ids.
    async fn add_delegations(&self, batch: &[Delegation]) -> Result<()> {
        // dropping an uncommitted transaction rolls it back
        let mut tx = self.pool.begin().await.context("begin delegation insert")?;
        for d in batch {
            sqlx::query(INSERT_DELEGATION)
                .bind(d.block_timestamp)
                .bind(d.operation_id)
                .bind(d.amount)
                .bind(d.level)
                .bind(&d.sender)
                .bind(&d.block_hash)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("insert delegation {}", d.operation_id))?;
        }
        tx.commit().await.context("commit delegation insert")?;
        Ok(())
    }

    async fn latest_block_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        sqlx::query_scalar::<_, DateTime<Utc>>(SELECT_LATEST)
            .fetch_optional(&self.pool)
            .await
            .context("select latest block timestamp")
    }
}

#[async_trait]
impl DelegationReader for PgStore {
    async fn list_delegations(&self, year: Option<i32>) -> Result<Vec<Delegation>> {
        let rows = match year {
            Some(y) => {
                let (start, end) = year_bounds(y)?;
                sqlx::query(SELECT_YEAR)
                    .bind(start)
                    .bind(end)
                    .fetch_all(&self.pool)
                    .await
                    .with_context(|| format!("select delegations of {y}"))?
            }
            None => sqlx::query(SELECT_ALL)
                .fetch_all(&self.pool)
                .await
                .context("select delegations")?,
        };
        rows.iter().map(delegation_from_row).collect()
    }
}
