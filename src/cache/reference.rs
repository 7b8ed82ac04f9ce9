use crate::cache::{read, write, RefreshTask};
use crate::error::Result;
use crate::exchange::Venue;
use crate::metrics;
use crate::types::SymbolPrecision;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Per-symbol numeric precision, seeded synchronously at start and refreshed
/// from venue metadata on a fixed interval.
#[derive(Clone)]
pub struct ReferenceDataCache {
    entries: Arc<RwLock<HashMap<String, SymbolPrecision>>>,
    task: Option<Arc<RefreshTask>>,
}

impl ReferenceDataCache {
    /// Fetches the full metadata set, then spawns the refresh loop. A failed
    /// initial fetch is returned to the caller; the cache is unusable without it.
    pub async fn start(venue: Arc<dyn Venue>, refresh_interval: Duration) -> Result<Self> {
        let initial = venue.exchange_metadata().await?;
        tracing::info!(symbols = initial.len(), "loaded exchange metadata");

        let entries = Arc::new(RwLock::new(HashMap::new()));
        apply(&entries, initial);

        let refreshed = entries.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(refresh_interval).await;
                match venue.exchange_metadata().await {
                    Ok(symbols) => {
                        let n = symbols.len();
                        apply(&refreshed, symbols);
                        metrics::REFERENCE_REFRESHES.with_label_values(&["ok"]).inc();
                        tracing::debug!(symbols = n, "exchange metadata refreshed");
                    }
                    Err(e) => {
                        // stale precision is still valid precision
                        metrics::REFERENCE_REFRESHES.with_label_values(&["failed"]).inc();
                        tracing::warn!(error=?e, "exchange metadata refresh failed; keeping previous snapshot");
                    }
                }
            }
        });

        Ok(Self { entries, task: Some(Arc::new(RefreshTask::new(handle))) })
    }

    /// A cache with fixed contents and no refresh task.
    pub fn with_entries(symbols: Vec<SymbolPrecision>) -> Self {
        let entries = Arc::new(RwLock::new(HashMap::new()));
        apply(&entries, symbols);
        Self { entries, task: None }
    }

    pub fn get(&self, symbol: &str) -> Option<SymbolPrecision> {
        read(&self.entries).get(symbol).cloned()
    }

    pub fn quantity_precision(&self, symbol: &str) -> Option<u32> {
        read(&self.entries).get(symbol).map(|s| s.quantity_precision)
    }

    pub fn price_precision(&self, symbol: &str) -> Option<u32> {
        read(&self.entries).get(symbol).map(|s| s.price_precision)
    }

    pub fn base_asset_precision(&self, symbol: &str) -> Option<u32> {
        read(&self.entries).get(symbol).map(|s| s.base_asset_precision)
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = read(&self.entries).keys().cloned().collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops the background refresh. Lookups keep serving the last snapshot.
    pub fn shutdown(&self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

// Upsert key by key; symbols missing from a refresh keep their last record.
fn apply(entries: &RwLock<HashMap<String, SymbolPrecision>>, symbols: Vec<SymbolPrecision>) {
    let mut map = write(entries);
    for s in symbols {
        map.insert(s.symbol.clone(), s);
    }
}
