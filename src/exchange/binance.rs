//! Signed Binance REST client
//!
//! Account balances need an HMAC-SHA256 signature over the query string;
//! ticker prices are public. Only the two endpoints the sync run touches
//! are implemented.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use super::{AssetBalance, ExchangeClient, ExchangeError};

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Binance error code for an unknown trading pair
const CODE_INVALID_SYMBOL: i64 = -1121;

const RECV_WINDOW_MS: u64 = 5000;

pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Deserialize)]
struct AccountResponse {
    balances: Vec<RawBalance>,
}

#[derive(Deserialize)]
struct RawBalance {
    asset: String,
    free: Decimal,
    locked: Decimal,
}

#[derive(Deserialize)]
struct TickerResponse {
    #[allow(dead_code)]
    symbol: String,
    price: Decimal,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

impl BinanceClient {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self::with_base_url(api_key, api_secret, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom endpoint (for testing)
    pub fn with_base_url(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    fn sign(&self, query: &str) -> Result<String, ExchangeError> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| ExchangeError::Signing(e.to_string()))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn get_account(&self) -> Result<AccountResponse, ExchangeError> {
        let timestamp = Utc::now().timestamp_millis();
        let query = format!("recvWindow={}&timestamp={}", RECV_WINDOW_MS, timestamp);
        let signature = self.sign(&query)?;
        let url = format!(
            "{}/api/v3/account?{}&signature={}",
            self.base_url, query, signature
        );

        debug!("Fetching account balances");
        let response = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        decode(response).await
    }

    async fn get_ticker(&self, pair: &str) -> Result<TickerResponse, ExchangeError> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);

        debug!(pair = %pair, "Fetching ticker price");
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", pair)])
            .send()
            .await?;
        decode(response).await
    }
}

/// Decode a Binance response, surfacing the error body on failure status
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ExchangeError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return serde_json::from_str(&body)
            .map_err(|e| ExchangeError::InvalidResponse(format!("{}: {}", e, body)));
    }

    match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(err) => Err(ExchangeError::Api {
            code: err.code,
            message: err.msg,
        }),
        Err(_) => Err(ExchangeError::InvalidResponse(format!(
            "HTTP {}: {}",
            status, body
        ))),
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    async fn balance(&self, symbol: &str) -> Result<AssetBalance, ExchangeError> {
        let account = self.get_account().await?;
        let raw = account
            .balances
            .into_iter()
            .find(|b| b.asset == symbol)
            .ok_or_else(|| ExchangeError::AssetNotFound(symbol.to_string()))?;
        Ok(AssetBalance {
            free: raw.free,
            locked: raw.locked,
        })
    }

    async fn price(&self, pair: &str) -> Result<Decimal, ExchangeError> {
        match self.get_ticker(pair).await {
            Ok(ticker) => Ok(ticker.price),
            Err(ExchangeError::Api {
                code: CODE_INVALID_SYMBOL,
                ..
            }) => Err(ExchangeError::PairNotFound(pair.to_string())),
            Err(e) => Err(e),
        }
    }
}
