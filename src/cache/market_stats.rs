use crate::cache::{read, write, RefreshTask};
use crate::error::Result;
use crate::exchange::{TickerFeed, TickerStream, Venue};
use crate::metrics;
use crate::types::SymbolStats;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Backoff between ticker stream reconnection attempts. Doubles on each failed
/// attempt up to `max` and resets after a successful connection.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { initial: Duration::from_secs(1), max: Duration::from_secs(60) }
    }
}

impl ReconnectPolicy {
    fn next(&self, current: Duration) -> Duration {
        (current * 2).min(self.max)
    }
}

/// Latest per-symbol price statistics, seeded from a bulk fetch and then kept
/// current by the whole-market ticker push stream.
#[derive(Clone)]
pub struct MarketStatsCache {
    stats: Arc<RwLock<HashMap<String, SymbolStats>>>,
    task: Option<Arc<RefreshTask>>,
}

impl MarketStatsCache {
    /// Seeds the cache and opens the ticker subscription. Either failing is
    /// returned to the caller; later disconnects are retried in the background.
    pub async fn start(venue: Arc<dyn Venue>, feed: Arc<dyn TickerFeed>, reconnect: ReconnectPolicy) -> Result<Self> {
        let initial = venue.ticker_stats().await?;
        tracing::info!(symbols = initial.len(), "loaded price stats");

        let stats = Arc::new(RwLock::new(HashMap::new()));
        apply_batch(&stats, initial);

        let stream = feed.subscribe().await?;
        let handle = tokio::spawn(run_feed(stats.clone(), feed, stream, reconnect));

        Ok(Self { stats, task: Some(Arc::new(RefreshTask::new(handle))) })
    }

    /// A cache with fixed contents and no feed.
    pub fn with_stats(initial: Vec<SymbolStats>) -> Self {
        let stats = Arc::new(RwLock::new(HashMap::new()));
        apply_batch(&stats, initial);
        Self { stats, task: None }
    }

    pub fn last_price(&self, symbol: &str) -> Option<String> {
        read(&self.stats).get(symbol).map(|s| s.last_price.clone())
    }

    pub fn stats(&self, symbol: &str) -> Option<SymbolStats> {
        read(&self.stats).get(symbol).cloned()
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = read(&self.stats).keys().cloned().collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        read(&self.stats).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops the feed task. Lookups keep serving the last values.
    pub fn shutdown(&self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

fn apply_batch(stats: &RwLock<HashMap<String, SymbolStats>>, batch: Vec<SymbolStats>) {
    let mut map = write(stats);
    for s in batch {
        map.insert(s.symbol.clone(), s);
    }
}

async fn run_feed(
    stats: Arc<RwLock<HashMap<String, SymbolStats>>>,
    feed: Arc<dyn TickerFeed>,
    first: TickerStream,
    reconnect: ReconnectPolicy,
) {
    let mut current = Some(first);
    let mut delay = reconnect.initial;
    loop {
        if let Some(mut stream) = current.take() {
            metrics::TICKER_CONNECTED.set(1);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(batch) => {
                        apply_batch(&stats, batch);
                        metrics::TICKER_BATCHES.inc();
                    }
                    Err(e) => {
                        tracing::warn!(error=?e, "ticker stream error");
                        break;
                    }
                }
            }
            metrics::TICKER_CONNECTED.set(0);
            tracing::warn!(retry_in_ms = delay.as_millis() as u64, "ticker stream disconnected; stats are going stale");
        }

        tokio::time::sleep(delay).await;
        match feed.subscribe().await {
            Ok(stream) => {
                metrics::TICKER_RECONNECTS.inc();
                tracing::info!("ticker stream reconnected");
                current = Some(stream);
                delay = reconnect.initial;
            }
            Err(e) => {
                delay = reconnect.next(delay);
                tracing::warn!(error=?e, retry_in_ms = delay.as_millis() as u64, "ticker stream reconnect failed");
            }
        }
    }
}
