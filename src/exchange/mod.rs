//! Exchange collaborator: balance and ticker lookups
//!
//! The sync core only sees the `ExchangeClient` trait; the Binance REST
//! implementation lives in `binance`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

pub mod binance;

pub use binance::BinanceClient;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("asset {0} not found on exchange")]
    AssetNotFound(String),
    #[error("pair {0} is not listed")]
    PairNotFound(String),
    #[error("exchange API error (code {code}): {message}")]
    Api { code: i64, message: String },
    #[error("exchange request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to sign exchange request: {0}")]
    Signing(String),
    #[error("unexpected exchange response: {0}")]
    InvalidResponse(String),
}

/// Free/locked quantities of one asset, produced transiently per attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetBalance {
    pub free: Decimal,
    pub locked: Decimal,
}

impl AssetBalance {
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }
}

/// Narrow interface consumed by the sync core
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Fetch the free/locked balance for one asset
    async fn balance(&self, symbol: &str) -> Result<AssetBalance, ExchangeError>;

    /// Fetch the last price for a trading pair (e.g. BTCJPY)
    async fn price(&self, pair: &str) -> Result<Decimal, ExchangeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_total() {
        let balance = AssetBalance {
            free: dec!(0.5),
            locked: dec!(0.25),
        };
        assert_eq!(balance.total(), dec!(0.75));
    }
}
