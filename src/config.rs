use crate::cache::ReconnectPolicy;
use crate::retry::DEFAULT_RECV_WINDOW_SCHEDULE_MS;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceCfg {
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,
    #[serde(default = "default_ws_stream_base_url")]
    pub ws_stream_base_url: String,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SizingCfg {
    #[serde(default = "default_leverage")]
    pub default_leverage: u32,
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryCfg {
    #[serde(default = "default_recv_window_schedule")]
    pub recv_window_schedule_ms: Vec<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheCfg {
    #[serde(default = "default_reference_refresh_interval_sec")]
    pub reference_refresh_interval_sec: u64,
    #[serde(default = "default_reconnect_initial_ms")]
    pub ticker_reconnect_initial_backoff_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub ticker_reconnect_max_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerCfg {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObservabilityCfg {
    #[serde(default)]
    pub log_json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub binance: BinanceCfg,
    #[serde(default)]
    pub sizing: SizingCfg,
    #[serde(default)]
    pub retry: RetryCfg,
    #[serde(default)]
    pub cache: CacheCfg,
    #[serde(default)]
    pub server: ServerCfg,
    #[serde(default)]
    pub observability: ObservabilityCfg,
}

fn default_rest_base_url() -> String {
    "https://testnet.binancefuture.com".into()
}
fn default_ws_stream_base_url() -> String {
    "wss://stream.binancefuture.com".into()
}
fn default_http_timeout_ms() -> u64 {
    10_000
}
fn default_leverage() -> u32 {
    10
}
fn default_quote_asset() -> String {
    "USDT".into()
}
fn default_recv_window_schedule() -> Vec<u64> {
    DEFAULT_RECV_WINDOW_SCHEDULE_MS.to_vec()
}
fn default_reference_refresh_interval_sec() -> u64 {
    30 * 60
}
fn default_reconnect_initial_ms() -> u64 {
    1_000
}
fn default_reconnect_max_ms() -> u64 {
    60_000
}
fn default_bind() -> String {
    "0.0.0.0:8080".into()
}
fn default_request_timeout_sec() -> u64 {
    60
}

impl Default for BinanceCfg {
    fn default() -> Self {
        Self {
            rest_base_url: default_rest_base_url(),
            ws_stream_base_url: default_ws_stream_base_url(),
            http_timeout_ms: default_http_timeout_ms(),
        }
    }
}

impl Default for SizingCfg {
    fn default() -> Self {
        Self { default_leverage: default_leverage(), quote_asset: default_quote_asset() }
    }
}

impl Default for RetryCfg {
    fn default() -> Self {
        Self { recv_window_schedule_ms: default_recv_window_schedule() }
    }
}

impl Default for CacheCfg {
    fn default() -> Self {
        Self {
            reference_refresh_interval_sec: default_reference_refresh_interval_sec(),
            ticker_reconnect_initial_backoff_ms: default_reconnect_initial_ms(),
            ticker_reconnect_max_backoff_ms: default_reconnect_max_ms(),
        }
    }
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self { bind: default_bind(), request_timeout_sec: default_request_timeout_sec() }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            binance: BinanceCfg::default(),
            sizing: SizingCfg::default(),
            retry: RetryCfg::default(),
            cache: CacheCfg::default(),
            server: ServerCfg::default(),
            observability: ObservabilityCfg::default(),
        }
    }
}

impl CacheCfg {
    pub fn reference_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.reference_refresh_interval_sec)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial: Duration::from_millis(self.ticker_reconnect_initial_backoff_ms),
            max: Duration::from_millis(self.ticker_reconnect_max_backoff_ms),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::File::with_name("config.example").required(false))
            .add_source(config::Environment::default().separator("__"));

        if let Ok(path) = std::env::var("SERVICE_CONFIG") {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }

        let cfg: AppConfig = builder
            .build()
            .context("failed to build config")?
            .try_deserialize()
            .context("failed to deserialize config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sizing.default_leverage == 0 {
            bail!("sizing.default_leverage must be at least 1");
        }
        if self.sizing.quote_asset.trim().is_empty() {
            bail!("sizing.quote_asset must not be empty");
        }
        if self.retry.recv_window_schedule_ms.is_empty() {
            bail!("retry.recv_window_schedule_ms must list at least one window");
        }
        if self.retry.recv_window_schedule_ms.iter().any(|&w| w == 0 || w > 60_000) {
            // venue rejects recvWindow above 60000
            bail!("retry.recv_window_schedule_ms entries must be within 1..=60000");
        }
        if self.server.request_timeout_sec == 0 {
            bail!("server.request_timeout_sec must be positive");
        }
        if self.binance.http_timeout_ms == 0 {
            bail!("binance.http_timeout_ms must be positive");
        }
        if self.cache.ticker_reconnect_initial_backoff_ms > self.cache.ticker_reconnect_max_backoff_ms {
            bail!("cache.ticker_reconnect_initial_backoff_ms exceeds the max backoff");
        }
        Ok(())
    }
}
