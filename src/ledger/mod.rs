//! Ledger collaborator: account-balance writes through the web UI
//!
//! The ledger has no write API, so the real implementation drives a
//! browser over the WebDriver protocol. The sync core only sees the
//! `LedgerClient` trait.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

pub mod moneyforward;
pub mod webdriver;

pub use moneyforward::MoneyforwardLedger;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no such element: {0}")]
    NoSuchElement(String),
    #[error("ledger session error: {0}")]
    Session(String),
    #[error("webdriver request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Narrow interface consumed by the sync core
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Write a balance into the named account.
    ///
    /// `Ok(false)` means no account matched the name; that is a normal
    /// (retryable) outcome, not an error.
    async fn write_account_balance(
        &self,
        account_name: &str,
        amount: Decimal,
    ) -> Result<bool, LedgerError>;

    /// Release the browser session. Idempotent.
    async fn close(&self) -> Result<(), LedgerError>;
}

/// Ledger stand-in for `sync --dry-run`: logs the write and claims success
pub struct DryRunLedger;

#[async_trait]
impl LedgerClient for DryRunLedger {
    async fn write_account_balance(
        &self,
        account_name: &str,
        amount: Decimal,
    ) -> Result<bool, LedgerError> {
        info!("Dry run: would set '{}' to {}", account_name, amount);
        Ok(true)
    }

    async fn close(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}
