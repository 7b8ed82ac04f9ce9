use crate::error::{Error, Result};
use crate::exchange::Venue;
use crate::metrics;
use crate::retry::RetryPolicy;
use crate::sizing::PositionSizer;
use crate::types::{
    parse_price, AccountSnapshot, Balance, CancelOutcome, Credentials, Deadline, OrderIntent, OrderKind,
    OrderRequest, OrderResult, Side,
};
use std::sync::Arc;

/// Venue limit on ids of each kind in one batch cancel.
pub const MAX_BATCH_CANCEL: usize = 10;

/// Entry point of the core: sizes, builds and submits orders, and runs the
/// account and cancel operations behind the same retry layer.
#[derive(Clone)]
pub struct OrderExecutor {
    venue: Arc<dyn Venue>,
    retry: RetryPolicy,
    sizer: PositionSizer,
}

impl OrderExecutor {
    pub fn new(venue: Arc<dyn Venue>, retry: RetryPolicy, sizer: PositionSizer) -> Self {
        Self { venue, retry, sizer }
    }

    /// Sizes `intent` against the current balance and submits it.
    pub async fn create_order(&self, creds: &Credentials, intent: &OrderIntent, deadline: Deadline) -> Result<OrderResult> {
        let res = self.submit_intent(creds, intent, deadline).await;
        match &res {
            Ok(order) => {
                metrics::ORDERS_SUBMITTED.with_label_values(&[intent.kind.venue_type()]).inc();
                tracing::info!(symbol = %order.symbol, order_id = order.order_id, status = %order.status, "order accepted");
            }
            Err(e) => {
                metrics::ORDER_FAILURES.with_label_values(&[e.kind()]).inc();
                tracing::warn!(symbol = %intent.symbol, kind = intent.kind.venue_type(), error = %e, "order failed");
            }
        }
        res
    }

    async fn submit_intent(&self, creds: &Credentials, intent: &OrderIntent, deadline: Deadline) -> Result<OrderResult> {
        intent.validate()?;
        // unknown symbol fails before any account read or leverage change
        self.sizer.quantity_precision(&intent.symbol)?;
        let reference_price = self.sizer.reference_price(intent)?;

        let notional = self
            .sizer
            .compute_position_size(creds, &intent.symbol, intent.percentage, deadline)
            .await?;
        let quantity = self.sizer.compute_quantity(notional, &intent.symbol, &reference_price)?;

        let req = build_request(intent, quantity);
        tracing::info!(
            symbol = %req.symbol,
            side = req.side.as_str(),
            kind = req.kind.venue_type(),
            quantity = req.quantity.as_deref().unwrap_or_default(),
            price = req.price.as_deref().unwrap_or_default(),
            stop_price = req.stop_price.as_deref().unwrap_or_default(),
            percentage = intent.percentage,
            "new order"
        );

        self.submit(creds, &req, deadline).await
    }

    /// Places a STOP_MARKET order with closePosition set. Once triggered the
    /// venue flattens the exposure opposite to `side` at whatever size it has
    /// then; positions opened after placement are not guaranteed to close.
    pub async fn close_all_positions(
        &self,
        creds: &Credentials,
        symbol: &str,
        side: Side,
        stop_price: &str,
        deadline: Deadline,
    ) -> Result<OrderResult> {
        if symbol.trim().is_empty() {
            return Err(Error::validation("symbol is required"));
        }
        parse_price("stopPrice", Some(stop_price))?;

        let mut req = OrderRequest::new(OrderKind::Stop, symbol, side);
        req.stop_price = Some(stop_price.to_string());
        req.close_position = true;

        let res = self.submit(creds, &req, deadline).await;
        match &res {
            Ok(order) => {
                metrics::ORDERS_SUBMITTED.with_label_values(&["CLOSE_POSITION"]).inc();
                tracing::info!(%symbol, side = side.as_str(), %stop_price, order_id = order.order_id, "new close-position stop order");
            }
            Err(e) => {
                metrics::ORDER_FAILURES.with_label_values(&[e.kind()]).inc();
                tracing::warn!(%symbol, side = side.as_str(), error = %e, "close-position order failed");
            }
        }
        res
    }

    async fn submit(&self, creds: &Credentials, req: &OrderRequest, deadline: Deadline) -> Result<OrderResult> {
        let venue = self.venue.as_ref();
        self.retry
            .execute("create_order", deadline, move |opts| venue.create_order(creds, req, opts))
            .await
    }

    pub async fn cancel_all_orders(&self, creds: &Credentials, symbol: &str, deadline: Deadline) -> Result<()> {
        if symbol.trim().is_empty() {
            return Err(Error::validation("symbol is required"));
        }
        let venue = self.venue.as_ref();
        self.retry
            .execute("cancel_all_orders", deadline, move |opts| venue.cancel_all_orders(creds, symbol, opts))
            .await?;
        tracing::info!(%symbol, "cancelled all open orders");
        Ok(())
    }

    /// Cancels by venue order id and/or client order id. The venue answers per
    /// order, so a partially failed batch is still `Ok`.
    pub async fn cancel_orders(
        &self,
        creds: &Credentials,
        symbol: &str,
        order_ids: &[i64],
        client_order_ids: &[String],
        deadline: Deadline,
    ) -> Result<Vec<CancelOutcome>> {
        if symbol.trim().is_empty() {
            return Err(Error::validation("symbol is required"));
        }
        if order_ids.is_empty() && client_order_ids.is_empty() {
            return Err(Error::validation("at least one orderId or origClientOrderId is required"));
        }
        if order_ids.len() > MAX_BATCH_CANCEL || client_order_ids.len() > MAX_BATCH_CANCEL {
            return Err(Error::validation(format!("at most {} ids of each kind per batch", MAX_BATCH_CANCEL)));
        }

        let venue = self.venue.as_ref();
        let outcomes = self
            .retry
            .execute("cancel_orders", deadline, move |opts| {
                venue.cancel_orders(creds, symbol, order_ids, client_order_ids, opts)
            })
            .await?;

        let rejected = outcomes.iter().filter(|o| matches!(o, CancelOutcome::Rejected { .. })).count();
        tracing::info!(%symbol, ?order_ids, ?client_order_ids, rejected, "cancelled orders");
        Ok(outcomes)
    }

    pub async fn account(&self, creds: &Credentials, deadline: Deadline) -> Result<AccountSnapshot> {
        let venue = self.venue.as_ref();
        self.retry
            .execute("get_account", deadline, move |opts| venue.account(creds, opts))
            .await
    }

    /// The balance entry of the configured quote asset.
    pub async fn quote_balance(&self, creds: &Credentials, deadline: Deadline) -> Result<Balance> {
        let venue = self.venue.as_ref();
        let balances = self
            .retry
            .execute("get_balances", deadline, move |opts| venue.balances(creds, opts))
            .await?;
        let asset = self.sizer.quote_asset();
        balances
            .into_iter()
            .find(|b| b.asset == asset)
            .ok_or_else(|| Error::MissingBalance(asset.to_string()))
    }
}

/// Maps an intent plus its computed quantity onto the venue payload for its
/// kind.
pub fn build_request(intent: &OrderIntent, quantity: String) -> OrderRequest {
    let mut req = OrderRequest::new(intent.kind, intent.symbol.clone(), intent.side);
    req.quantity = Some(quantity);
    match intent.kind {
        OrderKind::Market => {}
        OrderKind::Limit => {
            req.price = intent.price.clone();
            req.time_in_force = intent.time_in_force;
        }
        OrderKind::Stop => {
            req.stop_price = intent.stop_price.clone();
            req.time_in_force = intent.time_in_force;
        }
    }
    req
}
