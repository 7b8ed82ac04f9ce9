use crate::types::{AccountAsset, AccountSnapshot, Balance, CancelOutcome, OrderResult, PositionLeverage, SymbolStats};
use serde::{Deserialize, Deserializer};

/// Error body returned by the venue alongside a non-2xx status.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTimeResp {
    pub server_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResp {
    #[serde(deserialize_with = "f64_from_str")]
    pub total_wallet_balance: f64,
    pub assets: Vec<AccountAssetResp>,
    pub positions: Vec<AccountPositionResp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAssetResp {
    pub asset: String,
    #[serde(deserialize_with = "f64_from_str")]
    pub wallet_balance: f64,
}

#[derive(Debug, Deserialize)]
pub struct AccountPositionResp {
    pub symbol: String,
    #[serde(deserialize_with = "u32_from_str")]
    pub leverage: u32,
}

impl From<AccountResp> for AccountSnapshot {
    fn from(r: AccountResp) -> Self {
        AccountSnapshot {
            total_wallet_balance: r.total_wallet_balance,
            assets: r
                .assets
                .into_iter()
                .map(|a| AccountAsset { asset: a.asset, wallet_balance: a.wallet_balance })
                .collect(),
            positions: r
                .positions
                .into_iter()
                .map(|p| PositionLeverage { symbol: p.symbol, leverage: p.leverage })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResp {
    #[serde(default)]
    pub account_alias: String,
    pub asset: String,
    pub balance: String,
    pub available_balance: String,
}

impl From<BalanceResp> for Balance {
    fn from(r: BalanceResp) -> Self {
        Balance {
            account_alias: r.account_alias,
            asset: r.asset,
            balance: r.balance,
            available_balance: r.available_balance,
        }
    }
}

/// GET /fapi/v1/ticker/24hr entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24hr {
    pub symbol: String,
    pub price_change: String,
    pub price_change_percent: String,
    pub weighted_avg_price: String,
    pub last_price: String,
    pub last_qty: String,
}

impl From<Ticker24hr> for SymbolStats {
    fn from(t: Ticker24hr) -> Self {
        SymbolStats {
            symbol: t.symbol,
            last_price: t.last_price,
            last_quantity: t.last_qty,
            price_change: t.price_change,
            price_change_percent: t.price_change_percent,
            weighted_avg_price: t.weighted_avg_price,
        }
    }
}

/// One element of the `!ticker@arr` push payload.
#[derive(Debug, Deserialize)]
pub struct WsTicker {
    #[serde(rename = "e")]
    pub event_type: String, // "24hrTicker"
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price_change: String,
    #[serde(rename = "P")]
    pub price_change_percent: String,
    #[serde(rename = "w")]
    pub weighted_avg_price: String,
    #[serde(rename = "c")]
    pub close_price: String,
    #[serde(rename = "Q")]
    pub close_qty: String,
}

impl From<WsTicker> for SymbolStats {
    fn from(t: WsTicker) -> Self {
        SymbolStats {
            symbol: t.symbol,
            last_price: t.close_price,
            last_quantity: t.close_qty,
            price_change: t.price_change,
            price_change_percent: t.price_change_percent,
            weighted_avg_price: t.weighted_avg_price,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResp {
    pub order_id: i64,
    pub symbol: String,
    pub status: String,
    pub client_order_id: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub orig_qty: String,
    #[serde(default)]
    pub executed_qty: String,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: String,
    #[serde(default)]
    pub stop_price: String,
}

impl From<OrderResp> for OrderResult {
    fn from(r: OrderResp) -> Self {
        OrderResult {
            symbol: r.symbol,
            order_id: r.order_id,
            client_order_id: r.client_order_id,
            side: r.side,
            order_type: r.order_type,
            status: r.status,
            orig_qty: r.orig_qty,
            executed_qty: r.executed_qty,
            price: r.price,
            stop_price: r.stop_price,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CancelEntry {
    Order(OrderResp),
    Error(ApiErrorBody),
}

impl From<CancelEntry> for CancelOutcome {
    fn from(e: CancelEntry) -> Self {
        match e {
            CancelEntry::Order(o) => CancelOutcome::Cancelled(o.into()),
            CancelEntry::Error(err) => CancelOutcome::Rejected { code: err.code, msg: err.msg },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageResp {
    pub leverage: u32,
    pub symbol: String,
}

fn f64_from_str<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let s = String::deserialize(d)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn u32_from_str<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Str(String),
        Num(u32),
    }
    match StrOrNum::deserialize(d)? {
        StrOrNum::Str(s) => s.parse().map_err(serde::de::Error::custom),
        StrOrNum::Num(n) => Ok(n),
    }
}
