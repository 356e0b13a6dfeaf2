//! Optional form login performed once before a scan or batch.

use anyhow::{Context, Result};
use std::fmt;
use std::future::Future;
use tracing::info;

use crate::errors::ScanError;
use crate::scanner::ScanPage;
use crate::webdriver::Browser;

pub const DEFAULT_USERNAME_SELECTOR: &str = r#"input[name="username"]"#;
pub const DEFAULT_PASSWORD_SELECTOR: &str = r#"input[type="password"]"#;
pub const DEFAULT_SUBMIT_SELECTOR: &str = r#"button[type="submit"]"#;

/// Form interaction on the current page
pub trait FormControls {
    fn fill(&self, selector: &str, text: &str) -> impl Future<Output = Result<()>>;
    fn click(&self, selector: &str) -> impl Future<Output = Result<()>>;
    /// Wait for whatever the last interaction triggered to finish loading
    fn settle(&self) -> impl Future<Output = ()>;
}

impl FormControls for Browser {
    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        Browser::fill(self, selector, text).await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        Browser::click(self, selector).await
    }

    async fn settle(&self) {
        // Give the submit a moment to start navigating before polling readyState
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        self.wait_until_complete(50).await;
    }
}

#[derive(Clone, PartialEq)]
pub struct LoginConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub username_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
}

impl LoginConfig {
    pub fn new(url: &str, username: &str, password: &str) -> Self {
        Self {
            url: url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            username_selector: DEFAULT_USERNAME_SELECTOR.to_string(),
            password_selector: DEFAULT_PASSWORD_SELECTOR.to_string(),
            submit_selector: DEFAULT_SUBMIT_SELECTOR.to_string(),
        }
    }
}

// Credentials must never reach the logs
impl fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginConfig")
            .field("url", &self.url)
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .field("username_selector", &self.username_selector)
            .field("password_selector", &self.password_selector)
            .field("submit_selector", &self.submit_selector)
            .finish()
    }
}

async fn submit_form<P: ScanPage + FormControls>(page: &P, login: &LoginConfig) -> Result<()> {
    page.navigate(&login.url)
        .await
        .context("Login page did not load")?;
    page.fill(&login.username_selector, &login.username)
        .await
        .context("Username field")?;
    page.fill(&login.password_selector, &login.password)
        .await
        .context("Password field")?;
    page.click(&login.submit_selector)
        .await
        .context("Submit button")?;
    page.settle().await;
    Ok(())
}

/// Log in through a plain username/password form.
///
/// Any failure is fatal for the run and reported as a configuration error.
pub async fn perform_login<P: ScanPage + FormControls>(
    page: &P,
    login: &LoginConfig,
) -> Result<(), ScanError> {
    info!("Logging in at {}", login.url);
    submit_form(page, login)
        .await
        .map_err(|e| ScanError::Config(format!("Login at {} failed: {:#}", login.url, e)))?;
    info!("Login submitted");
    Ok(())
}

#[cfg(test)]
#[path = "login_test.rs"]
mod login_test;
