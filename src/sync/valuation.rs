//! Fiat valuation of raw asset quantities
//!
//! Prefers the direct fiat pair; falls back to a two-hop conversion via
//! the bridge currency only when the exchange reports the direct pair as
//! unlisted. Any other lookup failure is a pricing failure, not a reason
//! to guess.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::CurrencyConfig;
use crate::exchange::{ExchangeClient, ExchangeError};

#[derive(Debug, Error)]
pub enum ValuationError {
    #[error("no price available for {symbol}")]
    PriceUnavailable {
        symbol: String,
        #[source]
        source: ExchangeError,
    },
}

pub struct ValuationConverter<'a> {
    exchange: &'a dyn ExchangeClient,
    fiat: String,
    bridge: String,
}

impl<'a> ValuationConverter<'a> {
    pub fn new(exchange: &'a dyn ExchangeClient, currencies: &CurrencyConfig) -> Self {
        Self {
            exchange,
            fiat: currencies.fiat.clone(),
            bridge: currencies.bridge.clone(),
        }
    }

    pub fn fiat(&self) -> &str {
        &self.fiat
    }

    /// Convert a total asset quantity into the fiat currency.
    ///
    /// A zero quantity is worth zero; no price lookup is made.
    pub async fn convert_to_fiat(
        &self,
        symbol: &str,
        total: Decimal,
    ) -> Result<Decimal, ValuationError> {
        if total.is_zero() {
            debug!("{} balance is zero, skipping price lookup", symbol);
            return Ok(Decimal::ZERO);
        }

        let direct_pair = format!("{}{}", symbol, self.fiat);
        let price = match self.exchange.price(&direct_pair).await {
            Ok(price) => price,
            Err(ExchangeError::PairNotFound(_)) => {
                info!(
                    "{} pair not found, converting via {}",
                    direct_pair, self.bridge
                );
                self.bridge_price(symbol).await?
            }
            Err(source) => {
                return Err(ValuationError::PriceUnavailable {
                    symbol: symbol.to_string(),
                    source,
                })
            }
        };

        Ok(total * price)
    }

    /// Two-hop price: symbol -> bridge -> fiat
    async fn bridge_price(&self, symbol: &str) -> Result<Decimal, ValuationError> {
        let wrap = |source: ExchangeError| ValuationError::PriceUnavailable {
            symbol: symbol.to_string(),
            source,
        };

        let bridge_pair = format!("{}{}", symbol, self.bridge);
        let bridge_price = self.exchange.price(&bridge_pair).await.map_err(wrap)?;

        let fiat_pair = format!("{}{}", self.bridge, self.fiat);
        let fiat_per_bridge = self.exchange.price(&fiat_pair).await.map_err(wrap)?;

        Ok(bridge_price * fiat_per_bridge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::exchange::AssetBalance;

    /// Exchange stub with fixed prices and a lookup log
    struct StubExchange {
        prices: HashMap<String, Decimal>,
        api_error_pairs: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl StubExchange {
        fn new(prices: &[(&str, Decimal)]) -> Self {
            Self {
                prices: prices
                    .iter()
                    .map(|(pair, price)| (pair.to_string(), *price))
                    .collect(),
                api_error_pairs: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with_api_error(mut self, pair: &str) -> Self {
            self.api_error_pairs.push(pair.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExchangeClient for StubExchange {
        async fn balance(&self, symbol: &str) -> Result<AssetBalance, ExchangeError> {
            Err(ExchangeError::AssetNotFound(symbol.to_string()))
        }

        async fn price(&self, pair: &str) -> Result<Decimal, ExchangeError> {
            self.calls.lock().unwrap().push(pair.to_string());
            if self.api_error_pairs.iter().any(|p| p == pair) {
                return Err(ExchangeError::Api {
                    code: -1003,
                    message: "rate limited".to_string(),
                });
            }
            self.prices
                .get(pair)
                .copied()
                .ok_or_else(|| ExchangeError::PairNotFound(pair.to_string()))
        }
    }

    fn converter(exchange: &dyn ExchangeClient) -> ValuationConverter<'_> {
        ValuationConverter::new(exchange, &CurrencyConfig::default())
    }

    #[tokio::test]
    async fn test_zero_balance_short_circuits() {
        let exchange = StubExchange::new(&[("BTCJPY", dec!(14000000))]);

        let valuation = converter(&exchange)
            .convert_to_fiat("BTC", Decimal::ZERO)
            .await
            .unwrap();

        assert_eq!(valuation, Decimal::ZERO);
        assert!(exchange.calls().is_empty());
    }

    #[tokio::test]
    async fn test_direct_pair_takes_precedence() {
        let exchange = StubExchange::new(&[
            ("BTCJPY", dec!(14000000)),
            ("BTCUSDT", dec!(95000)),
            ("USDTJPY", dec!(150)),
        ]);

        let valuation = converter(&exchange)
            .convert_to_fiat("BTC", dec!(2))
            .await
            .unwrap();

        assert_eq!(valuation, dec!(28000000));
        assert_eq!(exchange.calls(), vec!["BTCJPY"]);
    }

    #[tokio::test]
    async fn test_two_hop_product_is_exact() {
        let exchange = StubExchange::new(&[("XYMUSDT", dec!(0.031)), ("USDTJPY", dec!(151.25))]);

        let valuation = converter(&exchange)
            .convert_to_fiat("XYM", dec!(1000))
            .await
            .unwrap();

        // 1000 * 0.031 * 151.25
        assert_eq!(valuation, dec!(4688.75));
        assert_eq!(exchange.calls(), vec!["XYMJPY", "XYMUSDT", "USDTJPY"]);
    }

    #[tokio::test]
    async fn test_api_error_does_not_trigger_fallback() {
        let exchange = StubExchange::new(&[("BTCUSDT", dec!(95000)), ("USDTJPY", dec!(150))])
            .with_api_error("BTCJPY");

        let err = converter(&exchange)
            .convert_to_fiat("BTC", dec!(1))
            .await
            .unwrap_err();

        assert!(matches!(err, ValuationError::PriceUnavailable { .. }));
        // Only the direct pair was tried; the bridge path never ran
        assert_eq!(exchange.calls(), vec!["BTCJPY"]);
    }

    #[tokio::test]
    async fn test_missing_bridge_pair_is_price_unavailable() {
        let exchange = StubExchange::new(&[("USDTJPY", dec!(150))]);

        let err = converter(&exchange)
            .convert_to_fiat("OBSCURE", dec!(5))
            .await
            .unwrap_err();

        assert!(
            matches!(err, ValuationError::PriceUnavailable { ref symbol, .. } if symbol == "OBSCURE")
        );
    }

    #[tokio::test]
    async fn test_custom_currencies() {
        let exchange = StubExchange::new(&[("ETHUSDC", dec!(3000)), ("USDCEUR", dec!(0.9))]);
        let currencies = CurrencyConfig {
            fiat: "EUR".to_string(),
            bridge: "USDC".to_string(),
        };

        let converter = ValuationConverter::new(&exchange, &currencies);
        let valuation = converter.convert_to_fiat("ETH", dec!(2)).await.unwrap();

        assert_eq!(valuation, dec!(5400.0));
    }
}
