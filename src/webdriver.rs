use anyhow::{Context, Result};
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use crate::types::{PageEnvironment, ViewportSize};
use crate::webdriver_manager::GLOBAL_WEBDRIVER_MANAGER;

/// Script execution inside the current page.
///
/// Implemented by [`Browser`]; the polling initializer and the DOM inspector
/// only depend on this seam.
pub trait PageScripting {
    /// Run a synchronous script body; `arguments` holds `args`
    fn execute(&self, script: &str, args: Vec<Value>) -> impl Future<Output = Result<Value>>;

    /// Run an asynchronous script body; the last entry of `arguments` is the
    /// completion callback
    fn execute_async(&self, script: &str, args: Vec<Value>)
    -> impl Future<Output = Result<Value>>;
}

/// Browser instance for WebDriver automation
pub struct Browser {
    pub(crate) client: Client,
    browser_type: BrowserType,
    // Chrome user-data directory, removed when the browser is dropped
    _profile_dir: Option<tempfile::TempDir>,
}

/// Supported browser types
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum BrowserType {
    /// Mozilla Firefox
    Firefox,
    /// Google Chrome/Chromium
    Chrome,
}

impl std::str::FromStr for BrowserType {
    type Err = anyhow::Error;

    /// Parse browser type from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "firefox" => Ok(BrowserType::Firefox),
            "chrome" | "chromium" => Ok(BrowserType::Chrome),
            _ => anyhow::bail!("Unsupported browser: {}", s),
        }
    }
}

impl BrowserType {
    /// Name of the WebDriver executable for this browser
    pub fn driver_name(&self) -> &'static str {
        match self {
            BrowserType::Firefox => "geckodriver",
            BrowserType::Chrome => "chromedriver",
        }
    }
}

/// How to launch the browser
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub browser_type: BrowserType,
    pub viewport: ViewportSize,
    pub headless: bool,
    /// WebDriver page-load timeout
    pub page_load_timeout: Duration,
    /// WebDriver script timeout, bounds the in-page analysis
    pub script_timeout: Duration,
}

impl Browser {
    /// Create a new browser session
    pub async fn new(options: &BrowserOptions) -> Result<Self> {
        let browser_type = options.browser_type;
        info!("Connecting to {:?} WebDriver", browser_type);

        // Ensure WebDriver is running (will auto-start if needed)
        let webdriver_url = GLOBAL_WEBDRIVER_MANAGER
            .ensure_driver(&browser_type)
            .await?;

        if !Self::is_webdriver_running(&webdriver_url).await {
            let driver_name = browser_type.driver_name();
            anyhow::bail!(
                "Cannot connect to {} WebDriver at {}.\n\
                Please ensure {} is running:\n\
                  For Firefox: geckodriver --port 4444\n\
                  For Chrome: chromedriver --port 9515",
                driver_name,
                webdriver_url,
                driver_name
            );
        }

        let viewport = options.viewport;
        let mut caps = serde_json::Map::new();
        let mut profile_dir = None;

        match browser_type {
            BrowserType::Firefox => {
                let mut args = Vec::new();
                if options.headless {
                    args.push("--headless".to_string());
                }
                args.push(format!("--width={}", viewport.width));
                args.push(format!("--height={}", viewport.height));

                caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
            }
            BrowserType::Chrome => {
                // Chrome is strict about sharing user-data directories
                let dir = tempfile::Builder::new()
                    .prefix("wavescan-chrome-")
                    .tempdir()?;

                let mut args = vec!["--no-sandbox".to_string()];
                if options.headless {
                    args.push("--headless=new".to_string());
                    args.push("--disable-gpu".to_string());
                    args.push("--disable-dev-shm-usage".to_string());
                }
                args.push(format!("--window-size={},{}", viewport.width, viewport.height));
                args.push(format!("--user-data-dir={}", dir.path().display()));

                caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
                profile_dir = Some(dir);
            }
        }

        debug!("Connecting to WebDriver at {}", webdriver_url);

        let client = match ClientBuilder::rustls()
            .capabilities(caps.clone())
            .connect(&webdriver_url)
            .await
        {
            Ok(client) => client,
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("Session is already started")
                    || error_str.contains("session not created")
                {
                    info!("WebDriver appears to be in a bad state, attempting recovery...");

                    GLOBAL_WEBDRIVER_MANAGER.kill_driver(&browser_type);
                    tokio::time::sleep(Duration::from_millis(500)).await;

                    let new_url = GLOBAL_WEBDRIVER_MANAGER
                        .ensure_driver(&browser_type)
                        .await
                        .context("Failed to restart WebDriver after recovery")?;

                    ClientBuilder::rustls()
                        .capabilities(caps)
                        .connect(&new_url)
                        .await
                        .context("Failed to connect to WebDriver after restart")?
                } else {
                    return Err(e).context("Failed to connect to WebDriver");
                }
            }
        };

        debug!("Setting viewport to {}", viewport);
        if let Err(e) = client.set_window_size(viewport.width, viewport.height).await {
            debug!("Note: Could not set window size: {}", e);
            // Continue anyway - viewport setting is best-effort
        }

        let timeouts = TimeoutConfiguration::new(
            Some(options.script_timeout),
            Some(options.page_load_timeout),
            None,
        );
        if let Err(e) = client.update_timeouts(timeouts).await {
            debug!("Note: Could not update WebDriver timeouts: {}", e);
        }

        Ok(Browser {
            client,
            browser_type,
            _profile_dir: profile_dir,
        })
    }

    async fn is_webdriver_running(url: &str) -> bool {
        let status_url = format!("{}/status", url);

        match reqwest::get(&status_url).await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    pub fn browser_type(&self) -> BrowserType {
        self.browser_type
    }

    /// Navigate and wait (up to 2 seconds) for `document.readyState` to complete
    pub async fn goto(&self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        self.client
            .goto(url)
            .await
            .with_context(|| format!("Failed to load {}", url))?;
        self.wait_until_complete(20).await;
        Ok(())
    }

    /// Poll `document.readyState` every 100ms, at most `attempts` times
    pub async fn wait_until_complete(&self, attempts: u32) {
        let wait_script = "return document.readyState === 'complete';";
        for _ in 0..attempts {
            match self.client.execute(wait_script, vec![]).await {
                Ok(val) if val.as_bool().unwrap_or(false) => return,
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
        debug!("Document did not reach readyState 'complete'");
    }

    /// Add a script element carrying `source` so its globals land on `window`
    pub async fn inject_script(&self, source: &str) -> Result<()> {
        let script = r#"
            const el = document.createElement('script');
            el.type = 'text/javascript';
            el.textContent = arguments[0];
            (document.head || document.documentElement).appendChild(el);
            return true;
        "#;
        self.client
            .execute(script, vec![json!(source)])
            .await
            .context("Failed to inject script")?;
        Ok(())
    }

    /// User agent and viewport as seen by the page
    pub async fn environment(&self) -> Result<PageEnvironment> {
        let script = r#"
            return {
                userAgent: navigator.userAgent,
                width: window.innerWidth,
                height: window.innerHeight
            };
        "#;
        let value = self
            .client
            .execute(script, vec![])
            .await
            .context("Failed to read browser environment")?;

        let viewport = ViewportSize {
            width: dimension(&value["width"]),
            height: dimension(&value["height"]),
        };
        Ok(PageEnvironment {
            user_agent: value["userAgent"].as_str().unwrap_or_default().to_string(),
            viewport,
            orientation: viewport.orientation(),
        })
    }

    /// Replace the value of the first input matching `selector`
    pub async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        let element = self
            .client
            .find(Locator::Css(selector))
            .await
            .with_context(|| format!("No elements found matching selector: {}", selector))?;
        element.clear().await.ok();
        element
            .send_keys(text)
            .await
            .with_context(|| format!("Failed to type into {}", selector))?;
        Ok(())
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        let element = self
            .client
            .find(Locator::Css(selector))
            .await
            .with_context(|| format!("No elements found matching selector: {}", selector))?;
        element
            .click()
            .await
            .with_context(|| format!("Failed to click {}", selector))?;
        Ok(())
    }

    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

/// Pixel size reported by the page; 0 when absent or out of range
pub(crate) fn dimension(value: &Value) -> u32 {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

impl PageScripting for Browser {
    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.client
            .execute(script, args)
            .await
            .context("Failed to execute script")
    }

    async fn execute_async(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.client
            .execute_async(script, args)
            .await
            .context("Failed to execute async script")
    }
}

#[cfg(test)]
#[path = "webdriver_test.rs"]
mod webdriver_test;
