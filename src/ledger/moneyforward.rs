//! Money Forward account writer
//!
//! Money Forward has no public write API, so balances are entered through
//! the accounts page of the web UI. The browser session is opened and
//! logged in lazily on the first write, reused for every subsequent
//! write, and torn down once by `close`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::webdriver::{WebDriverSession, DEFAULT_WEBDRIVER_URL};
use super::{LedgerClient, LedgerError};
use crate::credentials::LedgerCredentials;

pub const DEFAULT_BASE_URL: &str = "https://moneyforward.com";

const SIGN_IN_PATH: &str = "/sign_in";
const ACCOUNTS_PATH: &str = "/accounts";

const EMAIL_FIELD: &str = "#sign_in_session_service_email";
const PASSWORD_FIELD: &str = "#sign_in_session_service_password";
const SUBMIT_BUTTON: &str = "input[type='submit']";
const ACCOUNT_ROW: &str = ".account-item";
const ACCOUNT_NAME: &str = ".account-name";
const EDIT_BUTTON: &str = ".edit-button";
const BALANCE_FIELD: &str = "#account_balance";

const LOGIN_FIELD_TIMEOUT: Duration = Duration::from_secs(20);
const BALANCE_FIELD_TIMEOUT: Duration = Duration::from_secs(10);

pub struct MoneyforwardLedger {
    credentials: LedgerCredentials,
    base_url: String,
    webdriver_url: String,
    profile_dir: Option<PathBuf>,
    // Page-settle pauses after login, navigation and form submission
    login_settle: Duration,
    page_settle: Duration,
    form_settle: Duration,
    session: Mutex<Option<WebDriverSession>>,
}

impl MoneyforwardLedger {
    pub fn new(credentials: LedgerCredentials) -> Self {
        Self {
            credentials,
            base_url: DEFAULT_BASE_URL.to_string(),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            profile_dir: None,
            login_settle: Duration::from_secs(5),
            page_settle: Duration::from_secs(3),
            form_settle: Duration::from_secs(2),
            session: Mutex::new(None),
        }
    }

    /// Set the ledger base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the WebDriver endpoint
    pub fn with_webdriver_url(mut self, url: impl Into<String>) -> Self {
        self.webdriver_url = url.into();
        self
    }

    /// Reuse a persistent browser profile (keeps cookies between runs)
    pub fn with_profile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_dir = Some(dir.into());
        self
    }

    async fn open_session(&self) -> Result<WebDriverSession, LedgerError> {
        info!("Opening ledger browser session");
        let session =
            WebDriverSession::start(&self.webdriver_url, self.profile_dir.as_deref()).await?;
        match self.login(&session).await {
            Ok(()) => Ok(session),
            Err(e) => {
                // Tear down the half-open session before surfacing the failure
                if let Err(close_err) = session.close().await {
                    warn!("Failed to discard session after login error: {}", close_err);
                }
                Err(e)
            }
        }
    }

    async fn login(&self, session: &WebDriverSession) -> Result<(), LedgerError> {
        info!("Logging in to Money Forward");
        session
            .navigate(&format!("{}{}", self.base_url, SIGN_IN_PATH))
            .await?;

        let email = session.wait_for(EMAIL_FIELD, LOGIN_FIELD_TIMEOUT).await?;
        session.send_keys(&email, &self.credentials.email).await?;

        let password = session.find(PASSWORD_FIELD).await?;
        session
            .send_keys(&password, &self.credentials.password)
            .await?;

        let submit = session.find(SUBMIT_BUTTON).await?;
        session.click(&submit).await?;

        tokio::time::sleep(self.login_settle).await;
        info!("Login complete");
        Ok(())
    }

    async fn update_account(
        &self,
        session: &WebDriverSession,
        account_name: &str,
        amount: Decimal,
    ) -> Result<bool, LedgerError> {
        info!("Updating account '{}' to {}", account_name, amount);
        session
            .navigate(&format!("{}{}", self.base_url, ACCOUNTS_PATH))
            .await?;
        tokio::time::sleep(self.page_settle).await;

        let rows = session.find_all(ACCOUNT_ROW).await?;
        for row in rows {
            // Rows without a name or edit control are skipped, not fatal
            let name = match session.find_in(&row, ACCOUNT_NAME).await {
                Ok(element) => session.text(&element).await?,
                Err(LedgerError::NoSuchElement(_)) => continue,
                Err(e) => return Err(e),
            };
            if !name.contains(account_name) {
                continue;
            }

            let edit = match session.find_in(&row, EDIT_BUTTON).await {
                Ok(element) => element,
                Err(LedgerError::NoSuchElement(_)) => continue,
                Err(e) => return Err(e),
            };
            session.click(&edit).await?;
            tokio::time::sleep(self.form_settle).await;

            let field = session
                .wait_for(BALANCE_FIELD, BALANCE_FIELD_TIMEOUT)
                .await?;
            session.clear(&field).await?;
            // The balance field only takes whole currency units
            session.send_keys(&field, &amount.trunc().to_string()).await?;

            let save = session.find(SUBMIT_BUTTON).await?;
            session.click(&save).await?;
            tokio::time::sleep(self.form_settle).await;

            info!("Updated account '{}'", account_name);
            return Ok(true);
        }

        Ok(false)
    }
}

#[async_trait]
impl LedgerClient for MoneyforwardLedger {
    async fn write_account_balance(
        &self,
        account_name: &str,
        amount: Decimal,
    ) -> Result<bool, LedgerError> {
        let mut slot = self.session.lock().await;
        if slot.is_none() {
            *slot = Some(self.open_session().await?);
        }
        let session = slot
            .as_ref()
            .ok_or_else(|| LedgerError::Session("browser session unavailable".to_string()))?;

        self.update_account(session, account_name, amount).await
    }

    async fn close(&self) -> Result<(), LedgerError> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.take() {
            info!("Closing ledger browser session");
            session.close().await?;
        }
        Ok(())
    }
}
