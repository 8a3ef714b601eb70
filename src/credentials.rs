//! Environment-provided credentials for both collaborators

use std::path::PathBuf;

use crate::config::ConfigError;

pub const BINANCE_API_KEY_ENV: &str = "BINANCE_API_KEY";
pub const BINANCE_API_SECRET_ENV: &str = "BINANCE_API_SECRET";
pub const MONEYFORWARD_EMAIL_ENV: &str = "MONEYFORWARD_EMAIL";
pub const MONEYFORWARD_PASSWORD_ENV: &str = "MONEYFORWARD_PASSWORD";

/// Optional: persistent browser profile dir for cookie reuse across runs
pub const BROWSER_PROFILE_ENV: &str = "BROWSER_PROFILE_DIR";
/// Optional: WebDriver endpoint override
pub const WEBDRIVER_URL_ENV: &str = "WEBDRIVER_URL";

#[derive(Clone)]
pub struct ExchangeCredentials {
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Clone)]
pub struct LedgerCredentials {
    pub email: String,
    pub password: String,
}

/// Everything the sync run needs from the environment
#[derive(Clone)]
pub struct Credentials {
    pub exchange: ExchangeCredentials,
    pub ledger: LedgerCredentials,
    pub browser_profile: Option<PathBuf>,
    pub webdriver_url: Option<String>,
}

fn required(name: &'static str, missing: &mut Vec<&'static str>) -> String {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => {
            missing.push(name);
            String::new()
        }
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl ExchangeCredentials {
    /// Read exchange API credentials, failing fast with every missing name
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let api_key = required(BINANCE_API_KEY_ENV, &mut missing);
        let api_secret = required(BINANCE_API_SECRET_ENV, &mut missing);
        if !missing.is_empty() {
            return Err(missing_error(missing));
        }
        Ok(Self {
            api_key,
            api_secret,
        })
    }
}

impl Credentials {
    /// Read all required credentials, reporting every missing variable at once
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let api_key = required(BINANCE_API_KEY_ENV, &mut missing);
        let api_secret = required(BINANCE_API_SECRET_ENV, &mut missing);
        let email = required(MONEYFORWARD_EMAIL_ENV, &mut missing);
        let password = required(MONEYFORWARD_PASSWORD_ENV, &mut missing);

        if !missing.is_empty() {
            return Err(missing_error(missing));
        }

        Ok(Self {
            exchange: ExchangeCredentials {
                api_key,
                api_secret,
            },
            ledger: LedgerCredentials { email, password },
            browser_profile: optional(BROWSER_PROFILE_ENV).map(PathBuf::from),
            webdriver_url: optional(WEBDRIVER_URL_ENV),
        })
    }
}

fn missing_error(missing: Vec<&'static str>) -> ConfigError {
    ConfigError::Invalid(format!(
        "required environment variables are not set: {}",
        missing.join(", ")
    ))
}
