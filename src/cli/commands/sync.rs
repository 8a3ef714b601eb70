//! Sync command: the full fetch → convert → write run

use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::credentials::Credentials;
use crate::data_paths::DataPaths;
use crate::exchange::BinanceClient;
use crate::ledger::{DryRunLedger, LedgerClient, MoneyforwardLedger};
use crate::sync::{report, SyncOrchestrator};

#[derive(Args, Clone)]
pub struct SyncArgs {
    /// Config file path (overrides MFSYNC_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run the full pipeline but skip ledger writes
    #[arg(long)]
    pub dry_run: bool,
}

pub struct SyncCommand {
    args: SyncArgs,
}

impl SyncCommand {
    pub fn new(args: SyncArgs) -> Self {
        Self { args }
    }

    pub async fn execute(&self, _data_paths: DataPaths) -> Result<()> {
        // Secrets first: fail before any network or browser work
        let credentials = Credentials::from_env()?;

        let config_path = AppConfig::resolve_path(self.args.config.as_deref());
        let config = AppConfig::load(&config_path)?;
        info!(
            "Loaded config from {} ({} asset(s))",
            config_path.display(),
            config.assets.len()
        );
        if config.assets.is_empty() {
            warn!("No assets configured, nothing to sync");
            return Ok(());
        }

        let exchange = BinanceClient::new(
            &credentials.exchange.api_key,
            &credentials.exchange.api_secret,
        );

        let ledger: Box<dyn LedgerClient> = if self.args.dry_run {
            info!("Dry run: ledger writes will be skipped");
            Box::new(DryRunLedger)
        } else {
            let mut client = MoneyforwardLedger::new(credentials.ledger.clone())
                .with_base_url(&config.ledger.base_url);
            if let Some(url) = &credentials.webdriver_url {
                client = client.with_webdriver_url(url);
            }
            if let Some(dir) = &credentials.browser_profile {
                client = client.with_profile_dir(dir);
            }
            Box::new(client)
        };

        let orchestrator = SyncOrchestrator::new(&config, &exchange, ledger.as_ref());
        let outcomes = orchestrator.sync_all().await;

        // Release the browser session before deciding the exit code
        if let Err(e) = ledger.close().await {
            warn!("Failed to close ledger session: {}", e);
        }

        let code = report::report(&outcomes);
        if code != report::EXIT_SUCCESS {
            let failed = outcomes.iter().filter(|o| !o.succeeded).count();
            bail!("{} of {} asset(s) failed to sync", failed, outcomes.len());
        }

        info!("All assets synced");
        Ok(())
    }
}
