use crate::cache::{MarketStatsCache, ReferenceDataCache};
use crate::error::{Error, Result};
use crate::exchange::Venue;
use crate::leverage::LeverageManager;
use crate::retry::RetryPolicy;
use crate::types::{parse_price, Credentials, Deadline, OrderIntent, OrderKind};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Turns a percentage of the quote-asset wallet balance into a position
/// notional and an order quantity.
///
/// The notional is `percentage × balance × leverage`. With 10x leverage and a
/// percentage of 0.10, a position worth the whole balance is opened for a
/// margin cost of a tenth of it.
#[derive(Clone)]
pub struct PositionSizer {
    venue: Arc<dyn Venue>,
    retry: RetryPolicy,
    leverage: LeverageManager,
    reference: ReferenceDataCache,
    stats: MarketStatsCache,
    quote_asset: String,
}

impl PositionSizer {
    pub fn new(
        venue: Arc<dyn Venue>,
        retry: RetryPolicy,
        leverage: LeverageManager,
        reference: ReferenceDataCache,
        stats: MarketStatsCache,
        quote_asset: impl Into<String>,
    ) -> Self {
        Self { venue, retry, leverage, reference, stats, quote_asset: quote_asset.into() }
    }

    pub fn quote_asset(&self) -> &str {
        &self.quote_asset
    }

    /// Reads the account fresh, reconciles the symbol's leverage, then sizes
    /// the position.
    pub async fn compute_position_size(
        &self,
        creds: &Credentials,
        symbol: &str,
        percentage: f64,
        deadline: Deadline,
    ) -> Result<f64> {
        let venue = self.venue.as_ref();
        let account = self
            .retry
            .execute("get_account", deadline, move |opts| venue.account(creds, opts))
            .await?;

        let balance = account
            .wallet_balance(&self.quote_asset)
            .ok_or_else(|| Error::MissingBalance(self.quote_asset.clone()))?;

        self.leverage
            .ensure_leverage(creds, symbol, &account.positions, deadline)
            .await?;

        let leverage = self.leverage.default_leverage() as f64;
        let notional = percentage * balance * leverage;
        let max = balance * leverage;

        // percentage outside (0, 1] is the same bound as notional outside (0, max]
        if !(percentage > 0.0 && percentage <= 1.0) || notional <= 0.0 {
            return Err(Error::InvalidPositionSize { notional, max });
        }

        tracing::info!(%symbol, balance, notional, leverage, "calculated position size");
        Ok(notional)
    }

    /// Precision lookup that fails on an unknown symbol instead of silently
    /// formatting to zero decimals.
    pub fn quantity_precision(&self, symbol: &str) -> Result<u32> {
        self.reference
            .quantity_precision(symbol)
            .ok_or_else(|| Error::SymbolNotFound { symbol: symbol.to_string(), cache: "reference" })
    }

    /// `notional / reference_price` truncated to the symbol's quantity
    /// precision. A notional below one quantity step is rejected rather than
    /// sized to zero.
    pub fn compute_quantity(&self, notional: f64, symbol: &str, reference_price: &str) -> Result<String> {
        let precision = self.quantity_precision(symbol)?;
        let quantity = format_quantity(notional, reference_price, precision)?;
        if quantity.chars().all(|c| c == '0' || c == '.') {
            return Err(Error::validation(format!(
                "notional {} at {} is below one {} quantity step",
                notional, reference_price, symbol
            )));
        }
        Ok(quantity)
    }

    /// Last traded price for MARKET, the order's price for LIMIT, its stop
    /// price for STOP.
    pub fn reference_price(&self, intent: &OrderIntent) -> Result<String> {
        match intent.kind {
            OrderKind::Market => self.stats.last_price(&intent.symbol).ok_or_else(|| Error::SymbolNotFound {
                symbol: intent.symbol.clone(),
                cache: "market stats",
            }),
            OrderKind::Limit => intent
                .price
                .clone()
                .ok_or_else(|| Error::validation("price is required for LIMIT orders")),
            OrderKind::Stop => intent
                .stop_price
                .clone()
                .ok_or_else(|| Error::validation("stopPrice is required for STOP orders")),
        }
    }
}

/// Largest unit count an f64 holds exactly.
const MAX_EXACT_UNITS: f64 = 9_007_199_254_740_992.0;

/// Deepest quantity precision accepted.
pub const MAX_QUANTITY_PRECISION: u32 = 15;

/// Truncates `notional / price` toward zero at `precision` places. The string
/// has exactly `precision` fractional digits and parses back to
/// `trunc(notional / price × 10^p) / 10^p`, computed in f64.
pub fn format_quantity(notional: f64, reference_price: &str, precision: u32) -> Result<String> {
    parse_price("reference price", Some(reference_price))?;
    let price: f64 = reference_price
        .trim()
        .parse()
        .map_err(|_| Error::validation(format!("reference price {:?} is not a number", reference_price)))?;
    if precision > MAX_QUANTITY_PRECISION {
        return Err(Error::validation(format!("quantity precision {} is out of range", precision)));
    }

    let units = (notional / price * 10f64.powi(precision as i32)).trunc();
    if !units.is_finite() || units.abs() >= MAX_EXACT_UNITS {
        return Err(Error::validation(format!("quantity overflow for {} / {}", notional, price)));
    }
    let quantity = Decimal::new(units as i64, precision);
    Ok(format!("{:.*}", precision as usize, quantity))
}
