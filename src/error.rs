use thiserror::Error;

/// Venue code for a request whose timestamp is outside the recvWindow or ahead
/// of the server clock.
pub const INVALID_TIMESTAMP: i64 = -1021;
/// Venue code for a backend timeout; execution status unknown.
pub const GATEWAY_TIMEOUT: i64 = -1007;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid position size: {notional} (max {max})")]
    InvalidPositionSize { notional: f64, max: f64 },

    #[error("binance api error (code={code}): {msg}")]
    Venue { code: i64, msg: String },

    #[error("symbol {symbol} not found in {cache} cache")]
    SymbolNotFound { symbol: String, cache: &'static str },

    #[error("no {0} balance")]
    MissingBalance(String),

    #[error("deadline exceeded before {op}")]
    DeadlineExceeded { op: &'static str },

    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("signature error: {0}")]
    Signing(String),

    #[error("ticker feed error: {0}")]
    Feed(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Venue code, if this is a venue rejection.
    pub fn venue_code(&self) -> Option<i64> {
        match self {
            Error::Venue { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Clock-skew and gateway-timeout rejections are recoverable by a time
    /// resync plus a wider recvWindow. Rate limits (-1003, -1015) are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self.venue_code(), Some(INVALID_TIMESTAMP) | Some(GATEWAY_TIMEOUT))
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::InvalidPositionSize { .. } => "invalid_position_size",
            Error::Venue { .. } if self.is_retryable() => "venue_transient",
            Error::Venue { .. } => "venue",
            Error::SymbolNotFound { .. } => "cache_unavailable",
            Error::MissingBalance(_) => "missing_balance",
            Error::DeadlineExceeded { .. } => "deadline_exceeded",
            Error::Http(_) => "http",
            Error::Decode(_) => "decode",
            Error::Signing(_) => "signing",
            Error::Feed(_) => "feed",
        }
    }
}
