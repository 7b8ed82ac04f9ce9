use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};

lazy_static! {
    pub static ref ORDERS_SUBMITTED: IntCounterVec = register_int_counter_vec!(
        "futures_service_orders_submitted_total",
        "Orders accepted by the venue",
        &["kind"]
    )
    .unwrap();
    pub static ref ORDER_FAILURES: IntCounterVec = register_int_counter_vec!(
        "futures_service_order_failures_total",
        "Order operations that ended in an error",
        &["error"]
    )
    .unwrap();
    pub static ref RETRY_ATTEMPTS: IntCounterVec = register_int_counter_vec!(
        "futures_service_retry_attempts_total",
        "Venue calls re-issued with a widened recvWindow",
        &["op"]
    )
    .unwrap();
    pub static ref TIME_RESYNCS: IntCounter = register_int_counter!(
        "futures_service_time_resyncs_total",
        "Server time resynchronisations triggered by retryable failures"
    )
    .unwrap();
    pub static ref LEVERAGE_CHANGES: IntCounter = register_int_counter!(
        "futures_service_leverage_changes_total",
        "Symbol leverage changes issued to the venue"
    )
    .unwrap();
    pub static ref REFERENCE_REFRESHES: IntCounterVec = register_int_counter_vec!(
        "futures_service_reference_refreshes_total",
        "Background exchange metadata refreshes",
        &["result"]
    )
    .unwrap();
    pub static ref TICKER_BATCHES: IntCounter = register_int_counter!(
        "futures_service_ticker_batches_total",
        "Market ticker batches applied to the stats cache"
    )
    .unwrap();
    pub static ref TICKER_RECONNECTS: IntCounter = register_int_counter!(
        "futures_service_ticker_reconnects_total",
        "Successful reconnections of the market ticker stream"
    )
    .unwrap();
    pub static ref TICKER_CONNECTED: IntGauge = register_int_gauge!(
        "futures_service_ticker_connected",
        "1 while the market ticker stream is connected"
    )
    .unwrap();
}

/// Text exposition of the default registry.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buf = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!(error=?e, "metrics encode failed");
    }
    String::from_utf8_lossy(&buf).to_string()
}
