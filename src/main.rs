//! Tezos delegation indexer binary.
//! Scrapes TzKT into storage and serves `GET /xtz/delegations`, both stopped
//! by the same shutdown signal.
//!
//! `--memory` swaps Postgres for the in-process store (local runs, demos).

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tezos_delegations::api::{self, AppState};
use tezos_delegations::config::Config;
use tezos_delegations::ingest::providers::tzkt::TzktClient;
use tezos_delegations::metrics::Metrics;
use tezos_delegations::{
    server, DelegationReader, DelegationStore, MemoryStore, PgStore, Scraper,
};

/// `RUST_LOG` drives the filter (default `info`); `LOG_FORMAT=json` switches
/// to JSON lines for log shippers.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Config::from_env().context("loading configuration")?;
    let in_memory = std::env::args().skip(1).any(|a| a == "--memory");
    tracing::info!(
        api_addr = %cfg.api_addr,
        tzkt = %cfg.tzkt_base_url,
        database = ?cfg.database,
        since = ?cfg.scrape_since,
        in_memory,
        "starting delegation indexer"
    );

    let result = if in_memory {
        run(cfg, MemoryStore::new()).await
    } else {
        let store = PgStore::connect(&cfg.database).await?;
        store.migrate().await?;
        run(cfg, store).await
    };

    if let Err(e) = &result {
        tracing::error!(error = ?e, "finished with error");
    }
    result
}

async fn run<St>(cfg: Config, store: St) -> Result<()>
where
    St: DelegationStore + DelegationReader + Clone + 'static,
{
    let client = TzktClient::new(&cfg.tzkt_base_url).context("tezos client")?;
    let metrics = Metrics::init()?;
    let app = api::router(AppState::new(store.clone())).merge(metrics.router());
    let listener = server::bind(cfg.api_addr).await?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received");
            cancel.cancel();
        });
    }

    // Either task ending (error or not) stops the other one.
    let scraper_task = {
        let cancel = cancel.clone();
        let scraper = Scraper::new(client, store);
        let since = cfg.scrape_since;
        tokio::spawn(async move {
            let res = scraper.run(cancel.clone(), since).await;
            cancel.cancel();
            res
        })
    };
    let server_task = {
        let cancel = cancel.clone();
        let grace = cfg.grace_period;
        tokio::spawn(async move {
            let res = server::serve(listener, app, cancel.clone(), grace).await;
            cancel.cancel();
            res
        })
    };

    let (scraped, served) = tokio::join!(scraper_task, server_task);
    scraped.context("scraper task panicked")?.context("scraper error")?;
    served.context("api task panicked")?.context("api server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = ?e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = ?e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
