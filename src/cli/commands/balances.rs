//! Balances command: read-only valuation preview
//!
//! Fetches and values every configured asset without opening a ledger
//! session. Handy for checking credentials and config before a real run.

use anyhow::{bail, Result};
use clap::Args;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::credentials::ExchangeCredentials;
use crate::data_paths::DataPaths;
use crate::exchange::{BinanceClient, ExchangeClient};
use crate::sync::ValuationConverter;

#[derive(Args, Clone)]
pub struct BalancesArgs {
    /// Config file path (overrides MFSYNC_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub struct BalancesCommand {
    args: BalancesArgs,
}

impl BalancesCommand {
    pub fn new(args: BalancesArgs) -> Self {
        Self { args }
    }

    pub async fn execute(&self, _data_paths: DataPaths) -> Result<()> {
        let credentials = ExchangeCredentials::from_env()?;

        let config_path = AppConfig::resolve_path(self.args.config.as_deref());
        let config = AppConfig::load(&config_path)?;
        info!(
            "Loaded config from {} ({} asset(s))",
            config_path.display(),
            config.assets.len()
        );

        let exchange = BinanceClient::new(&credentials.api_key, &credentials.api_secret);
        let converter = ValuationConverter::new(&exchange, &config.currencies);

        let mut failures = 0;
        for target in &config.assets {
            match self.valuate(&exchange, &converter, &target.symbol).await {
                Ok((total, valuation)) => {
                    println!(
                        "{:>8}  {:>24}  {:>20} {}",
                        target.symbol.bright_blue().bold(),
                        total.to_string(),
                        valuation.to_string().bright_green(),
                        converter.fiat()
                    );
                }
                Err(e) => {
                    error!("Failed to value {}: {}", target.symbol, e);
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            bail!("{} of {} asset(s) could not be valued", failures, config.assets.len());
        }
        Ok(())
    }

    async fn valuate(
        &self,
        exchange: &BinanceClient,
        converter: &ValuationConverter<'_>,
        symbol: &str,
    ) -> Result<(rust_decimal::Decimal, rust_decimal::Decimal)> {
        let balance = exchange.balance(symbol).await?;
        let total = balance.total();
        let valuation = converter.convert_to_fiat(symbol, total).await?;
        Ok((total, valuation))
    }
}
