pub mod binance_rest_api;
pub mod binance_ws_streams;
pub mod exchange_info;
pub mod models;
pub mod signer;

use crate::error::Result;
use crate::types::{
    AccountSnapshot, Balance, CancelOutcome, Credentials, OrderRequest, OrderResult, SymbolPrecision, SymbolStats,
};
use async_trait::async_trait;
use futures_util::stream::BoxStream;

/// Per-call request options. Only the retry layer sets a recvWindow; `None`
/// leaves the venue default in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub recv_window_ms: Option<u64>,
}

impl CallOptions {
    pub fn with_recv_window(ms: u64) -> Self {
        Self { recv_window_ms: Some(ms) }
    }
}

/// The remote futures venue as seen by the core.
#[async_trait]
pub trait Venue: Send + Sync {
    /// Fetches venue server time and records the local/remote offset used to
    /// timestamp later signed requests. Returns the new offset in ms.
    async fn sync_server_time(&self) -> Result<i64>;

    async fn account(&self, creds: &Credentials, opts: CallOptions) -> Result<AccountSnapshot>;

    async fn balances(&self, creds: &Credentials, opts: CallOptions) -> Result<Vec<Balance>>;

    async fn exchange_metadata(&self) -> Result<Vec<SymbolPrecision>>;

    /// 24h stats for every symbol, used to seed the stats cache.
    async fn ticker_stats(&self) -> Result<Vec<SymbolStats>>;

    /// Returns the leverage the venue applied.
    async fn change_leverage(&self, creds: &Credentials, symbol: &str, leverage: u32, opts: CallOptions) -> Result<u32>;

    async fn create_order(&self, creds: &Credentials, req: &OrderRequest, opts: CallOptions) -> Result<OrderResult>;

    async fn cancel_all_orders(&self, creds: &Credentials, symbol: &str, opts: CallOptions) -> Result<()>;

    async fn cancel_orders(
        &self,
        creds: &Credentials,
        symbol: &str,
        order_ids: &[i64],
        client_order_ids: &[String],
        opts: CallOptions,
    ) -> Result<Vec<CancelOutcome>>;
}

pub type TickerStream = BoxStream<'static, Result<Vec<SymbolStats>>>;

/// Whole-market ticker push subscription. Each stream item is one batch.
#[async_trait]
pub trait TickerFeed: Send + Sync {
    async fn subscribe(&self) -> Result<TickerStream>;
}
