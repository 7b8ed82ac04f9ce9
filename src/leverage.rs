use crate::error::Result;
use crate::exchange::Venue;
use crate::metrics;
use crate::retry::RetryPolicy;
use crate::types::{Credentials, Deadline, PositionLeverage};
use std::sync::Arc;

/// Keeps a symbol's venue leverage at the configured default before it is used
/// for sizing.
#[derive(Clone)]
pub struct LeverageManager {
    venue: Arc<dyn Venue>,
    retry: RetryPolicy,
    default_leverage: u32,
}

impl LeverageManager {
    pub fn new(venue: Arc<dyn Venue>, retry: RetryPolicy, default_leverage: u32) -> Self {
        Self { venue, retry, default_leverage }
    }

    pub fn default_leverage(&self) -> u32 {
        self.default_leverage
    }

    /// Changes the symbol's leverage when the caller-supplied positions show a
    /// different value (a symbol absent from `positions` counts as 0). Returns
    /// whether a change was issued. Venue errors are returned unchanged.
    pub async fn ensure_leverage(
        &self,
        creds: &Credentials,
        symbol: &str,
        positions: &[PositionLeverage],
        deadline: Deadline,
    ) -> Result<bool> {
        let current = current_leverage(symbol, positions);
        if current == self.default_leverage {
            return Ok(false);
        }

        let venue = self.venue.as_ref();
        let target = self.default_leverage;
        let applied = self
            .retry
            .execute("change_leverage", deadline, move |opts| venue.change_leverage(creds, symbol, target, opts))
            .await?;

        metrics::LEVERAGE_CHANGES.inc();
        tracing::info!(%symbol, from = current, to = applied, "changed symbol leverage");
        Ok(true)
    }
}

pub fn current_leverage(symbol: &str, positions: &[PositionLeverage]) -> u32 {
    positions
        .iter()
        .find(|p| p.symbol == symbol)
        .map(|p| p.leverage)
        .unwrap_or(0)
}
