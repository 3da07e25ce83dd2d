//! W3C WebDriver client over HTTP
//!
//! Requires a driver listening on the configured endpoint, for example
//! `chromedriver --port=9515`. Every command is a JSON request against
//! `/session/{id}/...`; responses wrap their payload in `{"value": ...}` and
//! report failures as `{"value": {"error": ..., "message": ...}}`.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{sleep, Instant};

use super::{BrowserError, BrowserLauncher, BrowserSession, ElementRef, VIEWPORT_HEIGHT, VIEWPORT_WIDTH};
use crate::config::BrowserConfig;

/// Key under which WebDriver returns element handles
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735e6e7c82";
const ENTER_KEY: &str = "\u{E007}";
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(90);

pub struct WebDriverLauncher {
    client: Client,
    endpoint: String,
    browser: String,
    headless: bool,
}

impl WebDriverLauncher {
    pub fn new(endpoint: impl Into<String>, browser: impl Into<String>, headless: bool) -> Self {
        let client = Client::builder()
            .timeout(COMMAND_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            browser: browser.into(),
            headless,
        }
    }

    pub fn from_config(config: &BrowserConfig) -> Self {
        Self::new(&config.webdriver_url, &config.browser, config.headless)
    }

    /// New-session capabilities for the configured browser
    pub fn capabilities(&self) -> Value {
        let size = format!("--window-size={},{}", VIEWPORT_WIDTH, VIEWPORT_HEIGHT);
        let always_match = if self.browser.eq_ignore_ascii_case("firefox") {
            let mut args = vec![
                format!("--width={}", VIEWPORT_WIDTH),
                format!("--height={}", VIEWPORT_HEIGHT),
            ];
            if self.headless {
                args.push("-headless".to_string());
            }
            json!({ "browserName": "firefox", "moz:firefoxOptions": { "args": args } })
        } else {
            let mut args = vec![size, "--disable-gpu".to_string()];
            if self.headless {
                args.push("--headless=new".to_string());
            }
            json!({ "browserName": "chrome", "goog:chromeOptions": { "args": args } })
        };

        json!({ "capabilities": { "alwaysMatch": always_match } })
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let url = format!("{}/session", self.endpoint);
        let value = send(&self.client, Method::POST, &url, Some(self.capabilities())).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Protocol("new session response lacks sessionId".to_string()))?;

        tracing::debug!("Started WebDriver session {}", session_id);
        let session = WebDriverSession {
            client: self.client.clone(),
            base: format!("{}/session/{}", self.endpoint, session_id),
            closed: AtomicBool::new(false),
        };

        let rect = json!({ "width": VIEWPORT_WIDTH, "height": VIEWPORT_HEIGHT });
        if let Err(e) = session.command(Method::POST, "/window/rect", Some(rect)).await {
            tracing::debug!("Could not resize window: {}", e);
        }

        Ok(Box::new(session))
    }
}

pub struct WebDriverSession {
    client: Client,
    base: String,
    closed: AtomicBool,
}

impl WebDriverSession {
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, BrowserError> {
        let url = format!("{}{}", self.base, path);
        send(&self.client, method, &url, body).await
    }

    async fn element_command(&self, element: &ElementRef, action: &str, body: Value) -> Result<Value, BrowserError> {
        self.command(
            Method::POST,
            &format!("/element/{}/{}", element.id, action),
            Some(body),
        )
        .await
    }

    async fn find_one(&self, selector: &str) -> Result<Option<ElementRef>, BrowserError> {
        let body = json!({ "using": "css selector", "value": selector });
        match self.command(Method::POST, "/element", Some(body)).await {
            Ok(value) => {
                let id = value
                    .get(ELEMENT_KEY)
                    .and_then(Value::as_str)
                    .ok_or_else(|| BrowserError::Protocol("element response lacks a handle".to_string()))?;
                Ok(Some(ElementRef {
                    id: id.to_string(),
                    selector: selector.to_string(),
                }))
            }
            Err(BrowserError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let value = self.command(Method::GET, "/url", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn ready_state(&self) -> Result<String, BrowserError> {
        let body = json!({ "script": "return document.readyState", "args": [] });
        let value = self.command(Method::POST, "/execute/sync", Some(body)).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let timeouts = json!({ "pageLoad": timeout.as_millis() as u64 });
        self.command(Method::POST, "/timeouts", Some(timeouts)).await?;

        match self.command(Method::POST, "/url", Some(json!({ "url": url }))).await {
            Err(BrowserError::Timeout { .. }) => Err(BrowserError::Timeout {
                what: format!("{} to load", url),
                after: timeout,
            }),
            other => other.map(|_| ()),
        }
    }

    async fn wait_for(&self, selectors: &[&str], timeout: Duration) -> Result<ElementRef, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.find(selectors).await? {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    what: selectors.join(", "),
                    after: timeout,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn find(&self, selectors: &[&str]) -> Result<Option<ElementRef>, BrowserError> {
        for selector in selectors {
            if let Some(element) = self.find_one(selector).await? {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    async fn fill(&self, element: &ElementRef, text: &str) -> Result<(), BrowserError> {
        // contenteditable elements reject clear
        if let Err(e) = self.element_command(element, "clear", json!({})).await {
            tracing::debug!("clear on {} failed: {}", element.selector, e);
        }
        self.element_command(element, "value", json!({ "text": text })).await?;
        Ok(())
    }

    async fn press_enter(&self, element: &ElementRef) -> Result<(), BrowserError> {
        self.element_command(element, "value", json!({ "text": ENTER_KEY })).await?;
        Ok(())
    }

    async fn click(&self, element: &ElementRef) -> Result<(), BrowserError> {
        self.element_command(element, "click", json!({})).await?;
        Ok(())
    }

    async fn set_input_file(&self, element: &ElementRef, path: &Path) -> Result<(), BrowserError> {
        let absolute = std::fs::canonicalize(path).map_err(|e| BrowserError::Io(e.to_string()))?;
        let text = absolute.to_string_lossy().to_string();
        self.element_command(element, "value", json!({ "text": text })).await?;
        Ok(())
    }

    async fn wait_for_url(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.current_url().await?.starts_with(url) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    what: format!("URL {}", url),
                    after: timeout,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.ready_state().await? == "complete" {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    what: "page load".to_string(),
                    after: timeout,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.command(Method::DELETE, "", None).await?;
        tracing::debug!("Closed WebDriver session");
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            tracing::warn!("WebDriver session dropped without close: {}", self.base);
        }
    }
}

async fn send(client: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value, BrowserError> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await.map_err(|e| BrowserError::Http(e.to_string()))?;
    let payload: Value = response
        .json()
        .await
        .map_err(|e| BrowserError::Protocol(format!("invalid response body: {}", e)))?;

    let value = payload.get("value").cloned().unwrap_or(Value::Null);
    match value.get("error").and_then(Value::as_str) {
        Some(code) => Err(classify_error(code, &value)),
        None => Ok(value),
    }
}

fn classify_error(code: &str, value: &Value) -> BrowserError {
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(code)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string();

    match code {
        "no such element" | "stale element reference" => BrowserError::NotFound(message),
        "timeout" | "script timeout" => BrowserError::Timeout {
            what: message,
            after: Duration::ZERO,
        },
        _ => BrowserError::Protocol(format!("{}: {}", code, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_capabilities() {
        let launcher = WebDriverLauncher::new("http://localhost:9515/", "chrome", true);
        assert_eq!(launcher.endpoint, "http://localhost:9515");

        let caps = launcher.capabilities();
        let matched = &caps["capabilities"]["alwaysMatch"];
        assert_eq!(matched["browserName"], "chrome");
        let args: Vec<_> = matched["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a.as_str().unwrap())
            .collect();
        assert!(args.contains(&"--headless=new"));
        assert!(args.contains(&"--window-size=1280,720"));
    }

    #[test]
    fn test_firefox_headed_capabilities() {
        let launcher = WebDriverLauncher::new("http://localhost:4444", "Firefox", false);
        let caps = launcher.capabilities();
        let matched = &caps["capabilities"]["alwaysMatch"];
        assert_eq!(matched["browserName"], "firefox");
        let args = matched["moz:firefoxOptions"]["args"].as_array().unwrap();
        assert!(!args.iter().any(|a| a == "-headless"));
    }

    #[test]
    fn test_classify_errors() {
        let value = json!({ "error": "no such element", "message": "Unable to locate element\nStacktrace..." });
        assert_eq!(
            classify_error("no such element", &value),
            BrowserError::NotFound("Unable to locate element".to_string())
        );

        let value = json!({ "error": "timeout", "message": "page load timed out" });
        assert!(matches!(classify_error("timeout", &value), BrowserError::Timeout { .. }));

        let value = json!({ "error": "session not created", "message": "Chrome version mismatch" });
        assert_eq!(
            classify_error("session not created", &value).to_string(),
            "webdriver error: session not created: Chrome version mismatch"
        );
    }

    #[tokio::test]
    async fn test_unreachable_driver() {
        let launcher = WebDriverLauncher::new("http://127.0.0.1:9", "chrome", true);
        let result = launcher.launch().await;
        assert!(matches!(result, Err(BrowserError::Http(_))));
    }
}
