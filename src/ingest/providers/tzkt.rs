// src/ingest/providers/tzkt.rs
//! Minimal TzKT API client: protocol constants and delegation operations.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use metrics::histogram;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::ingest::types::{DelegationSource, TzktDelegation};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DELEGATION_FIELDS: &str = "id,sender,amount,level,timestamp,block";

#[derive(Debug, Deserialize)]
struct ProtocolPayload {
    constants: ProtocolConstants,
}

#[derive(Debug, Deserialize)]
struct ProtocolConstants {
    #[serde(rename = "timeBetweenBlocks")]
    time_between_blocks: u64, // seconds
}

#[derive(Clone)]
pub struct TzktClient {
    client: Client,
    protocol_url: Url,
    delegations_url: Url,
}

impl TzktClient {
    /// Build a client rooted at `base_url` (e.g. `https://api.tzkt.io/`).
    /// Fails if the URL does not parse or is not http(s).
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).with_context(|| format!("invalid TzKT base URL {base_url:?}"))?;
        if !matches!(base.scheme(), "http" | "https") {
            bail!("TzKT base URL must be http(s), got {:?}", base.scheme());
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building TzKT http client")?;

        Ok(Self {
            client,
            protocol_url: base.join("v1/protocols/current")?,
            delegations_url: base.join("v1/operations/delegations")?,
        })
    }

    /// Delegations endpoint URL for a given watermark.
    fn delegations_url_since(&self, since: DateTime<Utc>) -> Url {
        let mut url = self.delegations_url.clone();
        url.query_pairs_mut()
            .append_pair("select", DELEGATION_FIELDS)
            // timestamps cannot be sorted on; ids are a reliable increment
            .append_pair("sort.asc", "id")
            .append_pair(
                "timestamp.ge",
                &since.to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        url
    }
}

#[async_trait]
impl DelegationSource for TzktClient {
    async fn poll_interval(&self) -> Result<Duration> {
        let t0 = Instant::now();
        let resp = self
            .client
            .get(self.protocol_url.clone())
            .send()
            .await
            .context("tzkt GET protocols/current")?;
        let status = resp.status();
        if status != StatusCode::OK {
            bail!("tzkt protocols/current: bad HTTP status {status}");
        }
        let payload: ProtocolPayload = resp
            .json()
            .await
            .context("decoding tzkt protocols/current")?;
        histogram!("tzkt_request_ms", "endpoint" => "protocols").record(ms_since(t0));

        Ok(Duration::from_secs(payload.constants.time_between_blocks))
    }

    async fn delegations_since(&self, since: DateTime<Utc>) -> Result<Vec<TzktDelegation>> {
        let t0 = Instant::now();
        let resp = self
            .client
            .get(self.delegations_url_since(since))
            .send()
            .await
            .context("tzkt GET operations/delegations")?;
        let status = resp.status();
        if status != StatusCode::OK {
            bail!("tzkt operations/delegations: bad HTTP status {status}");
        }
        let payload: Vec<TzktDelegation> = resp
            .json()
            .await
            .context("decoding tzkt operations/delegations")?;
        histogram!("tzkt_request_ms", "endpoint" => "delegations").record(ms_since(t0));

        Ok(payload)
    }
}

fn ms_since(t0: Instant) -> f64 {
    t0.elapsed().as_secs_f64() * 1_000.0
}
