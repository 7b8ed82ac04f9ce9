use crate::cache::{MarketStatsCache, ReferenceDataCache};
use crate::error::Error;
use crate::executor::OrderExecutor;
use crate::metrics;
use crate::types::{
    AccountSnapshot, Balance, CancelOutcome, Credentials, Deadline, OrderIntent, OrderKind, OrderResult, Side,
    SymbolPrecision, SymbolStats, TimeInForce,
};
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::TcpListener;

/// The components the user routes need. Installed once the caches have
/// loaded; until then those routes answer 503.
#[derive(Clone)]
pub struct Core {
    pub executor: OrderExecutor,
    pub reference: ReferenceDataCache,
    pub stats: MarketStatsCache,
}

#[derive(Clone)]
pub struct AppState {
    core: Arc<OnceLock<Core>>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(request_timeout: Duration) -> Self {
        Self { core: Arc::new(OnceLock::new()), request_timeout }
    }

    /// Marks the service ready. Later calls are ignored.
    pub fn install(&self, core: Core) {
        if self.core.set(core).is_err() {
            tracing::warn!("core already installed");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.core.get().is_some()
    }

    fn core(&self) -> Result<&Core, ApiError> {
        self.core.get().ok_or(ApiError::NotReady)
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(self.request_timeout)
    }
}

pub enum ApiError {
    NotReady,
    Core(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Core(e)
    }
}

pub fn status_for(e: &Error) -> StatusCode {
    match e {
        Error::Validation(_) | Error::InvalidPositionSize { .. } | Error::Venue { .. } => StatusCode::BAD_REQUEST,
        Error::SymbolNotFound { .. } => StatusCode::NOT_FOUND,
        Error::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::MissingBalance(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotReady => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "not_ready" }))).into_response()
            }
            ApiError::Core(e) => {
                let body = match &e {
                    Error::Venue { code, msg } => json!({ "error": e.kind(), "code": code, "msg": msg }),
                    _ => json!({ "error": e.kind(), "msg": e.to_string() }),
                };
                (status_for(&e), Json(body)).into_response()
            }
        }
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct UserBody {
    #[serde(flatten)]
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBody {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(rename = "type")]
    pub kind: OrderKind,
    pub symbol: String,
    pub side: Side,
    pub percentage: String,
    pub price: Option<String>,
    pub stop_price: Option<String>,
    pub time_in_force: Option<TimeInForce>,
}

impl OrderBody {
    pub fn intent(&self) -> crate::error::Result<OrderIntent> {
        let percentage: f64 = self
            .percentage
            .trim()
            .parse()
            .map_err(|_| Error::validation(format!("percentage {:?} is not a number", self.percentage)))?;
        Ok(OrderIntent {
            kind: self.kind,
            symbol: self.symbol.clone(),
            side: self.side,
            percentage,
            price: self.price.clone(),
            stop_price: self.stop_price.clone(),
            time_in_force: self.time_in_force,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBody {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub symbol: String,
    #[serde(default)]
    pub order_ids: Vec<i64>,
    #[serde(default)]
    pub orig_client_order_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelAllBody {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub symbol: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePositionsBody {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub symbol: String,
    pub side: Side,
    pub stop_price: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSymbol {
    pub precision: Option<SymbolPrecision>,
    pub stats: Option<SymbolStats>,
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn readyz(State(st): State<AppState>) -> StatusCode {
    if st.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics_text() -> (StatusCode, String) {
    (StatusCode::OK, metrics::render())
}

async fn market_symbols(State(st): State<AppState>) -> ApiResult<Vec<String>> {
    Ok(Json(st.core()?.reference.symbols()))
}

async fn market_symbol(State(st): State<AppState>, Path(symbol): Path<String>) -> ApiResult<MarketSymbol> {
    let core = st.core()?;
    let symbol = symbol.to_uppercase();
    let out = MarketSymbol { precision: core.reference.get(&symbol), stats: core.stats.stats(&symbol) };
    if out.precision.is_none() && out.stats.is_none() {
        return Err(Error::SymbolNotFound { symbol, cache: "reference" }.into());
    }
    Ok(Json(out))
}

async fn account(State(st): State<AppState>, Json(body): Json<UserBody>) -> ApiResult<AccountSnapshot> {
    let core = st.core()?;
    Ok(Json(core.executor.account(&body.credentials, st.deadline()).await?))
}

async fn balance(State(st): State<AppState>, Json(body): Json<UserBody>) -> ApiResult<Balance> {
    let core = st.core()?;
    Ok(Json(core.executor.quote_balance(&body.credentials, st.deadline()).await?))
}

async fn create_order(State(st): State<AppState>, Json(body): Json<OrderBody>) -> ApiResult<OrderResult> {
    let core = st.core()?;
    let intent = body.intent()?;
    Ok(Json(core.executor.create_order(&body.credentials, &intent, st.deadline()).await?))
}

async fn cancel_orders(State(st): State<AppState>, Json(body): Json<CancelBody>) -> ApiResult<Vec<CancelOutcome>> {
    let core = st.core()?;
    let outcomes = core
        .executor
        .cancel_orders(&body.credentials, &body.symbol, &body.order_ids, &body.orig_client_order_ids, st.deadline())
        .await?;
    Ok(Json(outcomes))
}

async fn cancel_all_orders(State(st): State<AppState>, Json(body): Json<CancelAllBody>) -> ApiResult<serde_json::Value> {
    let core = st.core()?;
    core.executor.cancel_all_orders(&body.credentials, &body.symbol, st.deadline()).await?;
    Ok(Json(json!({ "symbol": body.symbol, "cancelled": true })))
}

async fn close_positions(State(st): State<AppState>, Json(body): Json<ClosePositionsBody>) -> ApiResult<OrderResult> {
    let core = st.core()?;
    let order = core
        .executor
        .close_all_positions(&body.credentials, &body.symbol, body.side, &body.stop_price, st.deadline())
        .await?;
    Ok(Json(order))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_text))
        .route("/v1/market/symbols", get(market_symbols))
        .route("/v1/market/:symbol", get(market_symbol))
        .route("/v1/user/account", post(account))
        .route("/v1/user/balance", post(balance))
        .route("/v1/user/order", post(create_order))
        .route("/v1/user/orders/cancel", post(cancel_orders))
        .route("/v1/user/orders/cancel-all", post(cancel_all_orders))
        .route("/v1/user/positions/close", post(close_positions))
        .with_state(state)
}

pub async fn serve<S>(listener: TcpListener, state: AppState, shutdown: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    tracing::info!(bind = %listener.local_addr()?, "http server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
