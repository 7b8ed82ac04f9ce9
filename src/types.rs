use crate::error::{Error, Result};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

/// Per-request venue credentials. Owned by the caller and never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: SecretString,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: SecretString::new(api_secret.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Market,
    Limit,
    #[serde(alias = "STOP_MARKET")]
    Stop,
}

impl OrderKind {
    /// Order type string the venue expects.
    pub fn venue_type(&self) -> &'static str {
        match self {
            OrderKind::Market => "MARKET",
            OrderKind::Limit => "LIMIT",
            OrderKind::Stop => "STOP_MARKET",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Fok,
    Gtx,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
            TimeInForce::Gtx => "GTX",
        }
    }
}

/// What the user asked for: a percentage of their margin balance on one side
/// of one symbol.
#[derive(Debug, Clone)]
pub struct OrderIntent {
    pub kind: OrderKind,
    pub symbol: String,
    pub side: Side,
    pub percentage: f64,
    pub price: Option<String>,
    pub stop_price: Option<String>,
    pub time_in_force: Option<TimeInForce>,
}

impl OrderIntent {
    pub fn market(symbol: impl Into<String>, side: Side, percentage: f64) -> Self {
        Self {
            kind: OrderKind::Market,
            symbol: symbol.into(),
            side,
            percentage,
            price: None,
            stop_price: None,
            time_in_force: None,
        }
    }

    pub fn limit(symbol: impl Into<String>, side: Side, percentage: f64, price: impl Into<String>, tif: TimeInForce) -> Self {
        Self {
            kind: OrderKind::Limit,
            price: Some(price.into()),
            time_in_force: Some(tif),
            ..Self::market(symbol, side, percentage)
        }
    }

    pub fn stop(symbol: impl Into<String>, side: Side, percentage: f64, stop_price: impl Into<String>, tif: TimeInForce) -> Self {
        Self {
            kind: OrderKind::Stop,
            stop_price: Some(stop_price.into()),
            time_in_force: Some(tif),
            ..Self::market(symbol, side, percentage)
        }
    }

    /// Checks field presence and numeric well-formedness per order kind. The
    /// percentage range, non-finite values included, is a sizing concern and
    /// is checked there.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(Error::validation("symbol is required"));
        }
        match self.kind {
            OrderKind::Market => {}
            OrderKind::Limit => {
                parse_price("price", self.price.as_deref())?;
                if self.time_in_force.is_none() {
                    return Err(Error::validation("timeInForce is required for LIMIT orders"));
                }
            }
            OrderKind::Stop => {
                parse_price("stopPrice", self.stop_price.as_deref())?;
                if self.time_in_force.is_none() {
                    return Err(Error::validation("timeInForce is required for STOP orders"));
                }
            }
        }
        Ok(())
    }
}

/// Parses a required, strictly positive decimal price field.
pub fn parse_price(field: &str, value: Option<&str>) -> Result<Decimal> {
    let raw = value.ok_or_else(|| Error::validation(format!("{} is required", field)))?;
    let px = Decimal::from_str(raw.trim())
        .map_err(|e| Error::validation(format!("{} {:?} is not a decimal: {}", field, raw, e)))?;
    if px <= Decimal::ZERO {
        return Err(Error::validation(format!("{} must be positive, got {}", field, raw)));
    }
    Ok(px)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolPrecision {
    pub symbol: String,
    pub quantity_precision: u32,
    pub price_precision: u32,
    pub base_asset_precision: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolStats {
    pub symbol: String,
    pub last_price: String,
    pub last_quantity: String,
    pub price_change: String,
    pub price_change_percent: String,
    pub weighted_avg_price: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAsset {
    pub asset: String,
    pub wallet_balance: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionLeverage {
    pub symbol: String,
    pub leverage: u32,
}

/// Account state as of one venue read. Never cached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub total_wallet_balance: f64,
    pub assets: Vec<AccountAsset>,
    pub positions: Vec<PositionLeverage>,
}

impl AccountSnapshot {
    pub fn wallet_balance(&self, asset: &str) -> Option<f64> {
        self.assets
            .iter()
            .find(|a| a.asset == asset)
            .map(|a| a.wallet_balance)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub account_alias: String,
    pub asset: String,
    pub balance: String,
    pub available_balance: String,
}

/// Venue-ready order payload.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: Option<String>,
    pub price: Option<String>,
    pub stop_price: Option<String>,
    pub time_in_force: Option<TimeInForce>,
    pub close_position: bool,
}

impl OrderRequest {
    pub fn new(kind: OrderKind, symbol: impl Into<String>, side: Side) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            kind,
            quantity: None,
            price: None,
            stop_price: None,
            time_in_force: None,
            close_position: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub symbol: String,
    pub order_id: i64,
    pub client_order_id: String,
    pub side: String,
    pub order_type: String,
    pub status: String,
    pub orig_qty: String,
    pub executed_qty: String,
    pub price: String,
    pub stop_price: String,
}

/// One entry of a batch cancel: the venue reports each order independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CancelOutcome {
    Cancelled(OrderResult),
    Rejected { code: i64, msg: String },
}

/// Absolute point in time by which a request and all its venue calls,
/// retries included, must finish.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Deadline(Instant::now() + timeout)
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Fails fast without starting `op` once the deadline has passed.
    pub fn check(&self, op: &'static str) -> Result<()> {
        if self.is_expired() {
            return Err(Error::DeadlineExceeded { op });
        }
        Ok(())
    }

    /// Runs `fut` bounded by the deadline.
    pub async fn run<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check(op)?;
        tokio::time::timeout_at(self.0, fut)
            .await
            .map_err(|_| Error::DeadlineExceeded { op })?
    }
}
