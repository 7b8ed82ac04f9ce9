//! Percentage-of-balance order sizing and execution for Binance USD-M futures.
//!
//! An inbound [`types::OrderIntent`] is sized against a fresh account read
//! with the symbol's leverage pinned to a configured default, converted to a
//! quantity through the precision and price caches, and submitted through a
//! retry layer that recovers from clock-skew and gateway-timeout rejections.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod exchange;
pub mod executor;
pub mod leverage;
pub mod metrics;
pub mod observability;
pub mod retry;
pub mod sizing;
pub mod types;

pub use error::{Error, Result};
