use anyhow::{Context, Result};
use binance_futures_service::api::{self, AppState, Core};
use binance_futures_service::cache::{MarketStatsCache, ReferenceDataCache};
use binance_futures_service::config::AppConfig;
use binance_futures_service::exchange::binance_rest_api::BinanceFutures;
use binance_futures_service::exchange::binance_ws_streams::MarketStreams;
use binance_futures_service::exchange::{TickerFeed, Venue};
use binance_futures_service::executor::OrderExecutor;
use binance_futures_service::leverage::LeverageManager;
use binance_futures_service::observability::init_tracing;
use binance_futures_service::retry::RetryPolicy;
use binance_futures_service::sizing::PositionSizer;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = AppConfig::load()?;
    init_tracing(&cfg.observability)?;

    // Liveness comes up first; readiness waits for the caches.
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let state = AppState::new(Duration::from_secs(cfg.server.request_timeout_sec));
    let listener = TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.server.bind))?;
    let mut server = tokio::spawn(api::serve(listener, state.clone(), async move {
        let _ = stop_rx.wait_for(|stop| *stop).await;
    }));

    let venue: Arc<dyn Venue> = Arc::new(BinanceFutures::new(
        cfg.binance.rest_base_url.clone(),
        Duration::from_millis(cfg.binance.http_timeout_ms),
    )?);
    let feed: Arc<dyn TickerFeed> = Arc::new(MarketStreams::new(cfg.binance.ws_stream_base_url.clone()));

    let offset = venue.sync_server_time().await.context("initial server time sync failed")?;
    tracing::info!(offset_ms = offset, "server time synced");

    let reference = ReferenceDataCache::start(venue.clone(), cfg.cache.reference_refresh_interval())
        .await
        .context("failed to load exchange metadata")?;
    let stats = MarketStatsCache::start(venue.clone(), feed, cfg.cache.reconnect_policy())
        .await
        .context("failed to start market ticker feed")?;

    let retry = RetryPolicy::new(venue.clone(), cfg.retry.recv_window_schedule_ms.clone());
    let leverage = LeverageManager::new(venue.clone(), retry.clone(), cfg.sizing.default_leverage);
    let sizer = PositionSizer::new(
        venue.clone(),
        retry.clone(),
        leverage,
        reference.clone(),
        stats.clone(),
        cfg.sizing.quote_asset.clone(),
    );
    let executor = OrderExecutor::new(venue, retry, sizer);

    state.install(Core { executor, reference: reference.clone(), stats: stats.clone() });
    tracing::info!(
        symbols = reference.len(),
        leverage = cfg.sizing.default_leverage,
        schedule = ?cfg.retry.recv_window_schedule_ms,
        "service ready"
    );

    let server_ended = tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::warn!("ctrl_c received; initiating shutdown");
            false
        }
        res = &mut server => {
            tracing::error!(result = ?res, "http server ended; shutting down");
            true
        }
    };

    reference.shutdown();
    stats.shutdown();
    if !server_ended {
        let _ = stop_tx.send(true);
        let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
    }
    Ok(())
}
