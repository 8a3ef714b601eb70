//! Minimal W3C WebDriver client
//!
//! Just enough of the wire protocol to log in and fill a form: session
//! creation, navigation, element lookup, keystrokes, clicks. Talks to a
//! chromedriver-compatible endpoint over HTTP.

use reqwest::Client;
use serde_json::{json, Value};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

use super::LedgerError;

/// Default chromedriver endpoint
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// W3C element identifier key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const IMPLICIT_WAIT_MS: u64 = 10_000;

/// Reference to a located DOM element
#[derive(Debug, Clone)]
pub struct ElementRef {
    id: String,
}

/// One live browser session
pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: String,
}

impl WebDriverSession {
    /// Start a headless Chrome session, optionally with a persistent profile
    pub async fn start(
        webdriver_url: &str,
        profile_dir: Option<&Path>,
    ) -> Result<Self, LedgerError> {
        let mut args = vec![
            "--headless=new".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--window-size=1920,1080".to_string(),
        ];
        if let Some(dir) = profile_dir {
            args.push(format!("--user-data-dir={}", dir.display()));
        }

        let client = Client::new();
        let body = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        });

        let response = client
            .post(format!("{}/session", webdriver_url))
            .json(&body)
            .send()
            .await?;
        let value = unwrap_value(response).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| LedgerError::Session("no sessionId in response".to_string()))?
            .to_string();
        debug!(session_id = %session_id, "WebDriver session started");

        let session = Self {
            client,
            base_url: webdriver_url.to_string(),
            session_id,
        };
        session
            .post("timeouts", json!({ "implicit": IMPLICIT_WAIT_MS }))
            .await?;
        Ok(session)
    }

    pub async fn navigate(&self, url: &str) -> Result<(), LedgerError> {
        debug!(url = %url, "Navigating");
        self.post("url", json!({ "url": url })).await?;
        Ok(())
    }

    /// Find the first element matching a CSS selector
    pub async fn find(&self, css: &str) -> Result<ElementRef, LedgerError> {
        let value = self
            .post("element", json!({ "using": "css selector", "value": css }))
            .await?;
        element_from_value(&value, css)
    }

    /// Find all elements matching a CSS selector
    pub async fn find_all(&self, css: &str) -> Result<Vec<ElementRef>, LedgerError> {
        let value = self
            .post("elements", json!({ "using": "css selector", "value": css }))
            .await?;
        let items = value
            .as_array()
            .ok_or_else(|| protocol_error("element list", &value))?;
        items
            .iter()
            .map(|item| element_from_value(item, css))
            .collect()
    }

    /// Find the first matching descendant of an element
    pub async fn find_in(&self, parent: &ElementRef, css: &str) -> Result<ElementRef, LedgerError> {
        let value = self
            .post(
                &format!("element/{}/element", parent.id),
                json!({ "using": "css selector", "value": css }),
            )
            .await?;
        element_from_value(&value, css)
    }

    /// Poll for an element until it appears or the timeout elapses
    pub async fn wait_for(&self, css: &str, timeout: Duration) -> Result<ElementRef, LedgerError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.find(css).await {
                Ok(element) => return Ok(element),
                Err(LedgerError::NoSuchElement(_)) if Instant::now() < deadline => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn text(&self, element: &ElementRef) -> Result<String, LedgerError> {
        let value = self.get(&format!("element/{}/text", element.id)).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| protocol_error("element text", &value))
    }

    pub async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), LedgerError> {
        self.post(
            &format!("element/{}/value", element.id),
            json!({ "text": text }),
        )
        .await?;
        Ok(())
    }

    pub async fn clear(&self, element: &ElementRef) -> Result<(), LedgerError> {
        self.post(&format!("element/{}/clear", element.id), json!({}))
            .await?;
        Ok(())
    }

    pub async fn click(&self, element: &ElementRef) -> Result<(), LedgerError> {
        self.post(&format!("element/{}/click", element.id), json!({}))
            .await?;
        Ok(())
    }

    /// Delete the remote session
    pub async fn close(self) -> Result<(), LedgerError> {
        debug!(session_id = %self.session_id, "Deleting WebDriver session");
        let response = self
            .client
            .delete(format!("{}/session/{}", self.base_url, self.session_id))
            .send()
            .await?;
        unwrap_value(response).await?;
        Ok(())
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, LedgerError> {
        let response = self
            .client
            .post(format!(
                "{}/session/{}/{}",
                self.base_url, self.session_id, path
            ))
            .json(&body)
            .send()
            .await?;
        unwrap_value(response).await
    }

    async fn get(&self, path: &str) -> Result<Value, LedgerError> {
        let response = self
            .client
            .get(format!(
                "{}/session/{}/{}",
                self.base_url, self.session_id, path
            ))
            .send()
            .await?;
        unwrap_value(response).await
    }
}

/// Extract the `value` payload, mapping WebDriver error bodies
async fn unwrap_value(response: reqwest::Response) -> Result<Value, LedgerError> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| LedgerError::Session(format!("invalid webdriver response: {}", e)))?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }

    let error = value.get("error").and_then(Value::as_str).unwrap_or("");
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown webdriver error");
    if error == "no such element" {
        Err(LedgerError::NoSuchElement(message.to_string()))
    } else {
        Err(LedgerError::Session(format!("{}: {}", error, message)))
    }
}

fn element_from_value(value: &Value, css: &str) -> Result<ElementRef, LedgerError> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementRef { id: id.to_string() })
        .ok_or_else(|| protocol_error(css, value))
}

fn protocol_error(what: &str, value: &Value) -> LedgerError {
    LedgerError::Session(format!("unexpected payload for {}: {}", what, value))
}
