//! Sync workflow: per-asset fetch → convert → write under retry
//!
//! One asset is processed completely (including all retry attempts)
//! before the next begins; a failed asset never aborts the run.

use thiserror::Error;
use tracing::{error, info, warn};

pub mod report;
pub mod retry;
pub mod valuation;

pub use retry::RetryPolicy;
pub use valuation::{ValuationConverter, ValuationError};

use crate::config::{AppConfig, AssetSyncTarget};
use crate::exchange::{ExchangeClient, ExchangeError};
use crate::ledger::{LedgerClient, LedgerError};

/// Result of one asset's sync, in configured order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub symbol: String,
    pub succeeded: bool,
}

/// Failure of one fetch-convert-write attempt
#[derive(Debug, Error)]
pub enum SyncStepError {
    #[error("balance fetch failed: {0}")]
    Balance(#[from] ExchangeError),
    #[error(transparent)]
    Valuation(#[from] ValuationError),
    #[error("ledger write failed: {0}")]
    Ledger(#[from] LedgerError),
    #[error("ledger account '{0}' not found")]
    AccountNotFound(String),
}

impl SyncStepError {
    /// Classification seam for the retry policy. Every failure currently
    /// retries; flip individual arms to `backoff::Error::permanent` to
    /// fail an asset without burning the remaining attempts.
    fn into_backoff(self) -> backoff::Error<SyncStepError> {
        backoff::Error::transient(self)
    }
}

/// Drives the per-asset workflow against the two collaborators
pub struct SyncOrchestrator<'a> {
    targets: &'a [AssetSyncTarget],
    retry: RetryPolicy,
    converter: ValuationConverter<'a>,
    exchange: &'a dyn ExchangeClient,
    ledger: &'a dyn LedgerClient,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        config: &'a AppConfig,
        exchange: &'a dyn ExchangeClient,
        ledger: &'a dyn LedgerClient,
    ) -> Self {
        Self {
            targets: &config.assets,
            retry: RetryPolicy::from_config(&config.retry),
            converter: ValuationConverter::new(exchange, &config.currencies),
            exchange,
            ledger,
        }
    }

    /// Sync every configured asset sequentially, in configured order
    pub async fn sync_all(&self) -> Vec<SyncOutcome> {
        info!("Starting sync for {} asset(s)", self.targets.len());

        let mut outcomes = Vec::with_capacity(self.targets.len());
        for target in self.targets {
            let succeeded = self.sync_asset(target).await;
            outcomes.push(SyncOutcome {
                symbol: target.symbol.clone(),
                succeeded,
            });
        }

        let successes = outcomes.iter().filter(|o| o.succeeded).count();
        info!("Sync completed: {}/{} successful", successes, outcomes.len());
        outcomes
    }

    /// Sync one asset; the whole fetch-convert-write unit retries together
    pub async fn sync_asset(&self, target: &AssetSyncTarget) -> bool {
        info!("Syncing {}...", target.symbol);

        let result = self
            .retry
            .execute(&target.symbol, || async move {
                self.sync_once(target)
                    .await
                    .map_err(SyncStepError::into_backoff)
            })
            .await;

        match result {
            Ok(()) => {
                info!("Successfully synced {}", target.symbol);
                true
            }
            Err(err) => {
                error!(
                    "Failed to sync {} after {} attempt(s): {}",
                    target.symbol,
                    self.retry.max_attempts(),
                    err
                );
                false
            }
        }
    }

    async fn sync_once(&self, target: &AssetSyncTarget) -> Result<(), SyncStepError> {
        let balance = self.exchange.balance(&target.symbol).await?;
        let total = balance.total();
        info!(
            "{} balance: {} (free: {}, locked: {})",
            target.symbol, total, balance.free, balance.locked
        );

        let valuation = self.converter.convert_to_fiat(&target.symbol, total).await?;
        info!(
            "{} value: {} {}",
            target.symbol,
            valuation,
            self.converter.fiat()
        );

        let found = self
            .ledger
            .write_account_balance(&target.account_name, valuation)
            .await?;
        if !found {
            // Distinct from a session error: the write ran, nothing matched
            warn!("Account '{}' not found in ledger", target.account_name);
            return Err(SyncStepError::AccountNotFound(target.account_name.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::config::{CurrencyConfig, LedgerConfig, RetryConfig};
    use crate::exchange::AssetBalance;

    /// Exchange stub: per-symbol balances, optional scripted failures
    struct StubExchange {
        balances: HashMap<String, AssetBalance>,
        // symbol -> number of leading attempts that fail
        failures_left: Mutex<HashMap<String, u32>>,
        balance_calls: Mutex<Vec<String>>,
    }

    impl StubExchange {
        fn new(symbols: &[&str]) -> Self {
            let balance = AssetBalance {
                free: dec!(1),
                locked: Decimal::ZERO,
            };
            Self {
                balances: symbols.iter().map(|s| (s.to_string(), balance)).collect(),
                failures_left: Mutex::new(HashMap::new()),
                balance_calls: Mutex::new(Vec::new()),
            }
        }

        fn failing_first(self, symbol: &str, times: u32) -> Self {
            self.failures_left
                .lock()
                .unwrap()
                .insert(symbol.to_string(), times);
            self
        }

        fn attempts_for(&self, symbol: &str) -> usize {
            self.balance_calls
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.as_str() == symbol)
                .count()
        }
    }

    #[async_trait]
    impl ExchangeClient for StubExchange {
        async fn balance(&self, symbol: &str) -> Result<AssetBalance, ExchangeError> {
            self.balance_calls.lock().unwrap().push(symbol.to_string());

            let mut failures = self.failures_left.lock().unwrap();
            if let Some(left) = failures.get_mut(symbol) {
                if *left > 0 {
                    *left -= 1;
                    return Err(ExchangeError::Api {
                        code: -1000,
                        message: "temporary".to_string(),
                    });
                }
            }
            drop(failures);

            self.balances
                .get(symbol)
                .copied()
                .ok_or_else(|| ExchangeError::AssetNotFound(symbol.to_string()))
        }

        async fn price(&self, _pair: &str) -> Result<Decimal, ExchangeError> {
            Ok(dec!(100))
        }
    }

    /// Ledger stub recording writes; accounts in `unknown` report not-found
    struct StubLedger {
        unknown_accounts: Vec<String>,
        writes: Mutex<Vec<(String, Decimal)>>,
    }

    impl StubLedger {
        fn new() -> Self {
            Self {
                unknown_accounts: Vec::new(),
                writes: Mutex::new(Vec::new()),
            }
        }

        fn with_unknown_account(mut self, name: &str) -> Self {
            self.unknown_accounts.push(name.to_string());
            self
        }

        fn writes(&self) -> Vec<(String, Decimal)> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LedgerClient for StubLedger {
        async fn write_account_balance(
            &self,
            account_name: &str,
            amount: Decimal,
        ) -> Result<bool, LedgerError> {
            self.writes
                .lock()
                .unwrap()
                .push((account_name.to_string(), amount));
            Ok(!self.unknown_accounts.iter().any(|a| a == account_name))
        }

        async fn close(&self) -> Result<(), LedgerError> {
            Ok(())
        }
    }

    fn config(symbols: &[&str], max_attempts: u32) -> AppConfig {
        AppConfig {
            assets: symbols
                .iter()
                .map(|s| AssetSyncTarget {
                    symbol: s.to_string(),
                    account_name: format!("{} account", s),
                })
                .collect(),
            retry: RetryConfig {
                max_attempts,
                delay_seconds: 0,
            },
            currencies: CurrencyConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_successful_sync_writes_valuation() {
        let exchange = StubExchange::new(&["BTC"]);
        let ledger = StubLedger::new();
        let config = config(&["BTC"], 3);

        let outcomes = SyncOrchestrator::new(&config, &exchange, &ledger)
            .sync_all()
            .await;

        assert_eq!(
            outcomes,
            vec![SyncOutcome {
                symbol: "BTC".to_string(),
                succeeded: true
            }]
        );
        // 1 unit at stub price 100
        assert_eq!(ledger.writes(), vec![("BTC account".to_string(), dec!(100))]);
        assert_eq!(exchange.attempts_for("BTC"), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_marks_asset_failed() {
        let exchange = StubExchange::new(&["BTC"]).failing_first("BTC", 99);
        let ledger = StubLedger::new();
        let config = config(&["BTC"], 3);

        let outcomes = SyncOrchestrator::new(&config, &exchange, &ledger)
            .sync_all()
            .await;

        assert!(!outcomes[0].succeeded);
        assert_eq!(exchange.attempts_for("BTC"), 3);
        assert!(ledger.writes().is_empty());
    }

    #[tokio::test]
    async fn test_recovery_on_later_attempt() {
        let exchange = StubExchange::new(&["BTC"]).failing_first("BTC", 2);
        let ledger = StubLedger::new();
        let config = config(&["BTC"], 5);

        let outcomes = SyncOrchestrator::new(&config, &exchange, &ledger)
            .sync_all()
            .await;

        assert!(outcomes[0].succeeded);
        // Two failures, then success; no further attempts
        assert_eq!(exchange.attempts_for("BTC"), 3);
        assert_eq!(ledger.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_outcome_ordering_and_independence() {
        let exchange = StubExchange::new(&["AAA", "BBB", "CCC"]).failing_first("BBB", 99);
        let ledger = StubLedger::new();
        let config = config(&["AAA", "BBB", "CCC"], 3);

        let outcomes = SyncOrchestrator::new(&config, &exchange, &ledger)
            .sync_all()
            .await;

        let summary: Vec<(&str, bool)> = outcomes
            .iter()
            .map(|o| (o.symbol.as_str(), o.succeeded))
            .collect();
        assert_eq!(
            summary,
            vec![("AAA", true), ("BBB", false), ("CCC", true)]
        );

        // The failing middle asset does not change its neighbours' attempts
        assert_eq!(exchange.attempts_for("AAA"), 1);
        assert_eq!(exchange.attempts_for("BBB"), 3);
        assert_eq!(exchange.attempts_for("CCC"), 1);
    }

    #[tokio::test]
    async fn test_account_not_found_retries_then_fails() {
        let exchange = StubExchange::new(&["BTC"]);
        let ledger = StubLedger::new().with_unknown_account("BTC account");
        let config = config(&["BTC"], 3);

        let outcomes = SyncOrchestrator::new(&config, &exchange, &ledger)
            .sync_all()
            .await;

        assert!(!outcomes[0].succeeded);
        // The whole step retried: three fetches, three write attempts
        assert_eq!(exchange.attempts_for("BTC"), 3);
        assert_eq!(ledger.writes().len(), 3);
    }

    #[tokio::test]
    async fn test_zero_balance_still_writes_zero() {
        let mut exchange = StubExchange::new(&[]);
        exchange.balances.insert(
            "DOGE".to_string(),
            AssetBalance {
                free: Decimal::ZERO,
                locked: Decimal::ZERO,
            },
        );
        let ledger = StubLedger::new();
        let config = config(&["DOGE"], 3);

        let outcomes = SyncOrchestrator::new(&config, &exchange, &ledger)
            .sync_all()
            .await;

        assert!(outcomes[0].succeeded);
        assert_eq!(
            ledger.writes(),
            vec![("DOGE account".to_string(), Decimal::ZERO)]
        );
    }

    #[tokio::test]
    async fn test_empty_target_list_yields_no_outcomes() {
        let exchange = StubExchange::new(&[]);
        let ledger = StubLedger::new();
        let config = config(&[], 3);

        let outcomes = SyncOrchestrator::new(&config, &exchange, &ledger)
            .sync_all()
            .await;
        assert!(outcomes.is_empty());
    }
}
