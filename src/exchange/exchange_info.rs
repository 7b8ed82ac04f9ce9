use crate::types::SymbolPrecision;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ExchangeInfoResp {
    pub symbols: Vec<SymbolInfo>,
}

// base asset is the asset a symbol's quantity is denominated in; quote asset is
// the asset its price is denominated in.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub price_precision: u32,
    pub quantity_precision: u32,
    pub base_asset_precision: u32,
}

impl From<SymbolInfo> for SymbolPrecision {
    fn from(s: SymbolInfo) -> Self {
        SymbolPrecision {
            symbol: s.symbol,
            quantity_precision: s.quantity_precision,
            price_precision: s.price_precision,
            base_asset_precision: s.base_asset_precision,
        }
    }
}

impl ExchangeInfoResp {
    /// One precision record per listed symbol.
    pub fn into_precisions(self) -> Vec<SymbolPrecision> {
        self.symbols.into_iter().map(Into::into).collect()
    }
}
