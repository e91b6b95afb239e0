// src/config/mod.rs
//! Process configuration, read from the environment (`.env` is loaded by the
//! binary through `dotenvy` before this runs).

pub mod database;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

pub use database::DatabaseConfig;

pub const ENV_API_ADDR: &str = "API_ADDR";
pub const ENV_DB_HOST: &str = "DB_HOST";
pub const ENV_DB_DATABASE: &str = "DB_DATABASE";
pub const ENV_DB_USER: &str = "DB_USER";
pub const ENV_DB_PASSWORD: &str = "DB_PASSWORD";
pub const ENV_DB_MAX_CONNECTIONS: &str = "DB_MAX_CONNECTIONS";
pub const ENV_TZKT_BASE_URL: &str = "TZKT_BASE_URL";
pub const ENV_SCRAPE_SINCE: &str = "SCRAPE_SINCE";
pub const ENV_GRACE_PERIOD_SECS: &str = "GRACE_PERIOD_SECS";

pub const DEFAULT_API_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_TZKT_BASE_URL: &str = "https://api.tzkt.io/";
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DB_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Config {
    pub api_addr: SocketAddr,
    pub database: DatabaseConfig,
    pub tzkt_base_url: String,
    /// Forced scrape start; overrides the cursor derived from storage.
    pub scrape_since: Option<DateTime<Utc>>,
    /// How long in-flight HTTP requests may run after shutdown is requested.
    pub grace_period: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (env, map in tests). Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_addr = parse_addr(&get(ENV_API_ADDR).unwrap_or_else(|| DEFAULT_API_ADDR.into()))?;

        let (host, port) =
            DatabaseConfig::parse_host(&get(ENV_DB_HOST).unwrap_or_else(|| "localhost".into()))?;
        let max_connections = match get(ENV_DB_MAX_CONNECTIONS) {
            Some(v) => v
                .parse::<u32>()
                .with_context(|| format!("{ENV_DB_MAX_CONNECTIONS}: not a number: {v:?}"))?,
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };
        let database = DatabaseConfig {
            host,
            port,
            database: get(ENV_DB_DATABASE).unwrap_or_else(|| "tezos".into()),
            user: get(ENV_DB_USER).unwrap_or_else(|| "postgres".into()),
            // passwords may legitimately carry surrounding spaces
            password: lookup(ENV_DB_PASSWORD).unwrap_or_default(),
            max_connections,
            acquire_timeout: DB_ACQUIRE_TIMEOUT,
        };

        let scrape_since = match get(ENV_SCRAPE_SINCE) {
            Some(v) => Some(
                DateTime::parse_from_rfc3339(&v)
                    .with_context(|| format!("{ENV_SCRAPE_SINCE}: not RFC3339: {v:?}"))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        let grace_period = match get(ENV_GRACE_PERIOD_SECS) {
            Some(v) => Duration::from_secs(
                v.parse::<u64>()
                    .with_context(|| format!("{ENV_GRACE_PERIOD_SECS}: not a number: {v:?}"))?,
            ),
            None => DEFAULT_GRACE_PERIOD,
        };

        Ok(Self {
            api_addr,
            database,
            tzkt_base_url: get(ENV_TZKT_BASE_URL).unwrap_or_else(|| DEFAULT_TZKT_BASE_URL.into()),
            scrape_since,
            grace_period,
        })
    }
}

/// Accepts `host:port` and the bare `:port` shorthand (all interfaces).
fn parse_addr(raw: &str) -> Result<SocketAddr> {
    let full = if raw.starts_with(':') {
        format!("0.0.0.0{raw}")
    } else {
        raw.to_string()
    };
    full.parse::<SocketAddr>()
        .with_context(|| format!("{ENV_API_ADDR}: invalid socket address {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_nothing_set() {
        let cfg = cfg_from(&[]).unwrap();
        assert_eq!(cfg.api_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.database.host, "localhost");
        assert_eq!(cfg.database.port, 5432);
        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.tzkt_base_url, DEFAULT_TZKT_BASE_URL);
        assert!(cfg.scrape_since.is_none());
        assert_eq!(cfg.grace_period, DEFAULT_GRACE_PERIOD);
    }

    #[test]
    fn reads_all_values() {
        let cfg = cfg_from(&[
            (ENV_API_ADDR, ":9000"),
            (ENV_DB_HOST, "db:6432"),
            (ENV_DB_DATABASE, "deleg"),
            (ENV_DB_USER, "indexer"),
            (ENV_DB_PASSWORD, "s3cret"),
            (ENV_DB_MAX_CONNECTIONS, "12"),
            (ENV_TZKT_BASE_URL, "http://localhost:5000/"),
            (ENV_SCRAPE_SINCE, "2024-06-25T10:02:33+02:00"),
            (ENV_GRACE_PERIOD_SECS, "3"),
        ])
        .unwrap();
        assert_eq!(cfg.api_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(cfg.database.host, "db");
        assert_eq!(cfg.database.port, 6432);
        assert_eq!(cfg.database.database, "deleg");
        assert_eq!(cfg.database.user, "indexer");
        assert_eq!(cfg.database.password, "s3cret");
        assert_eq!(cfg.database.max_connections, 12);
        assert_eq!(cfg.tzkt_base_url, "http://localhost:5000/");
        assert_eq!(
            cfg.scrape_since.unwrap().to_rfc3339(),
            "2024-06-25T08:02:33+00:00"
        );
        assert_eq!(cfg.grace_period, Duration::from_secs(3));
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(cfg_from(&[(ENV_SCRAPE_SINCE, "yesterday")]).is_err());
        assert!(cfg_from(&[(ENV_API_ADDR, "nowhere")]).is_err());
        assert!(cfg_from(&[(ENV_DB_MAX_CONNECTIONS, "many")]).is_err());
        assert!(cfg_from(&[(ENV_GRACE_PERIOD_SECS, "-1")]).is_err());
    }

    #[test]
    fn empty_since_means_unset() {
        let cfg = cfg_from(&[(ENV_SCRAPE_SINCE, "  ")]).unwrap();
        assert!(cfg.scrape_since.is_none());
    }
}
