use crate::error::{Error, Result, GATEWAY_TIMEOUT};
use crate::exchange::exchange_info::ExchangeInfoResp;
use crate::exchange::models::{
    AccountResp, ApiErrorBody, BalanceResp, CancelEntry, LeverageResp, OrderResp, ServerTimeResp, Ticker24hr,
};
use crate::exchange::signer::Signer;
use crate::exchange::{CallOptions, Venue};
use crate::types::{
    AccountSnapshot, Balance, CancelOutcome, Credentials, OrderRequest, OrderResult, SymbolPrecision, SymbolStats,
};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// USD-M futures REST client. Cheap to clone; clones share the HTTP pool and
/// the server time offset.
#[derive(Clone)]
pub struct BinanceFutures {
    base_url: String, // e.g. https://testnet.binancefuture.com
    client: Client,
    time_offset_ms: Arc<AtomicI64>,
}

impl BinanceFutures {
    pub fn new(base_url: impl Into<String>, http_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(http_timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            time_offset_ms: Arc::new(AtomicI64::new(0)),
        })
    }

    pub fn time_offset_ms(&self) -> i64 {
        self.time_offset_ms.load(Ordering::Relaxed)
    }

    fn signed_query(&self, creds: &Credentials, mut params: BTreeMap<String, String>, opts: CallOptions) -> Result<String> {
        params.insert("timestamp".to_string(), (now_ms() + self.time_offset_ms()).to_string());
        if let Some(w) = opts.recv_window_ms {
            params.insert("recvWindow".to_string(), w.to_string());
        }
        Signer::from_credentials(creds).signed_query(&params)
    }

    async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        creds: &Credentials,
        params: BTreeMap<String, String>,
        opts: CallOptions,
    ) -> Result<T> {
        let query = self.signed_query(creds, params, opts)?;
        let url = format!("{}{}?{}", self.base_url, path, query);
        let resp = self
            .client
            .request(method, url)
            .header("X-MBX-APIKEY", &creds.api_key)
            .send()
            .await?;
        decode(resp).await
    }

    async fn get_public<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(url).send().await?;
        decode(resp).await
    }
}

/// Maps non-2xx responses to `Error::Venue`, keeping the venue code when the
/// body carries one.
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        if let Ok(err) = serde_json::from_str::<ApiErrorBody>(&body) {
            return Err(Error::Venue { code: err.code, msg: err.msg });
        }
        let snippet: String = body.chars().take(256).collect();
        if status == StatusCode::GATEWAY_TIMEOUT {
            return Err(Error::Venue { code: GATEWAY_TIMEOUT, msg: format!("gateway timeout: {}", snippet) });
        }
        return Err(Error::Venue { code: 0, msg: format!("http {}: {}", status.as_u16(), snippet) });
    }
    Ok(serde_json::from_str(&body)?)
}

fn order_params(req: &OrderRequest) -> BTreeMap<String, String> {
    let mut p = BTreeMap::new();
    p.insert("symbol".to_string(), req.symbol.clone());
    p.insert("side".to_string(), req.side.as_str().to_string());
    p.insert("type".to_string(), req.kind.venue_type().to_string());
    if let Some(q) = &req.quantity {
        p.insert("quantity".to_string(), q.clone());
    }
    if let Some(px) = &req.price {
        p.insert("price".to_string(), px.clone());
    }
    if let Some(sp) = &req.stop_price {
        p.insert("stopPrice".to_string(), sp.clone());
    }
    if let Some(tif) = req.time_in_force {
        p.insert("timeInForce".to_string(), tif.as_str().to_string());
    }
    if req.close_position {
        p.insert("closePosition".to_string(), "true".to_string());
    }
    p
}

#[async_trait]
impl Venue for BinanceFutures {
    async fn sync_server_time(&self) -> Result<i64> {
        let t: ServerTimeResp = self.get_public("/fapi/v1/time").await?;
        let offset = t.server_time - now_ms();
        self.time_offset_ms.store(offset, Ordering::Relaxed);
        tracing::info!(server_time = t.server_time, offset_ms = offset, "time offset updated");
        Ok(offset)
    }

    async fn account(&self, creds: &Credentials, opts: CallOptions) -> Result<AccountSnapshot> {
        let resp: AccountResp = self
            .send_signed(Method::GET, "/fapi/v2/account", creds, BTreeMap::new(), opts)
            .await?;
        Ok(resp.into())
    }

    async fn balances(&self, creds: &Credentials, opts: CallOptions) -> Result<Vec<Balance>> {
        let resp: Vec<BalanceResp> = self
            .send_signed(Method::GET, "/fapi/v2/balance", creds, BTreeMap::new(), opts)
            .await?;
        Ok(resp.into_iter().map(Into::into).collect())
    }

    async fn exchange_metadata(&self) -> Result<Vec<SymbolPrecision>> {
        let info: ExchangeInfoResp = self.get_public("/fapi/v1/exchangeInfo").await?;
        Ok(info.into_precisions())
    }

    async fn ticker_stats(&self) -> Result<Vec<SymbolStats>> {
        let resp: Vec<Ticker24hr> = self.get_public("/fapi/v1/ticker/24hr").await?;
        Ok(resp.into_iter().map(Into::into).collect())
    }

    async fn change_leverage(&self, creds: &Credentials, symbol: &str, leverage: u32, opts: CallOptions) -> Result<u32> {
        let mut p = BTreeMap::new();
        p.insert("symbol".to_string(), symbol.to_string());
        p.insert("leverage".to_string(), leverage.to_string());
        let resp: LeverageResp = self.send_signed(Method::POST, "/fapi/v1/leverage", creds, p, opts).await?;
        tracing::debug!(symbol = %resp.symbol, leverage = resp.leverage, "leverage response");
        Ok(resp.leverage)
    }

    async fn create_order(&self, creds: &Credentials, req: &OrderRequest, opts: CallOptions) -> Result<OrderResult> {
        let resp: OrderResp = self
            .send_signed(Method::POST, "/fapi/v1/order", creds, order_params(req), opts)
            .await?;
        Ok(resp.into())
    }

    async fn cancel_all_orders(&self, creds: &Credentials, symbol: &str, opts: CallOptions) -> Result<()> {
        let mut p = BTreeMap::new();
        p.insert("symbol".to_string(), symbol.to_string());
        let _: serde_json::Value = self
            .send_signed(Method::DELETE, "/fapi/v1/allOpenOrders", creds, p, opts)
            .await?;
        Ok(())
    }

    async fn cancel_orders(
        &self,
        creds: &Credentials,
        symbol: &str,
        order_ids: &[i64],
        client_order_ids: &[String],
        opts: CallOptions,
    ) -> Result<Vec<CancelOutcome>> {
        let mut p = BTreeMap::new();
        p.insert("symbol".to_string(), symbol.to_string());
        if !order_ids.is_empty() {
            p.insert("orderIdList".to_string(), serde_json::to_string(order_ids)?);
        }
        if !client_order_ids.is_empty() {
            p.insert("origClientOrderIdList".to_string(), serde_json::to_string(client_order_ids)?);
        }
        let resp: Vec<CancelEntry> = self
            .send_signed(Method::DELETE, "/fapi/v1/batchOrders", creds, p, opts)
            .await?;
        Ok(resp.into_iter().map(Into::into).collect())
    }
}
