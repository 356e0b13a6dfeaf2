//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or through a `WAVESCAN_*` variable,
//! so CI jobs can drive the tool without touching its invocation.

use clap::{ArgAction, Args};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::batch::BatchConfig;
use crate::enhance::PositionalAlignment;
use crate::errors::ScanError;
use crate::initializer::PollSettings;
use crate::login::{
    DEFAULT_PASSWORD_SELECTOR, DEFAULT_SUBMIT_SELECTOR, DEFAULT_USERNAME_SELECTOR, LoginConfig,
};
use crate::scanner::ScanSettings;
use crate::types::ViewportSize;
use crate::webdriver::{BrowserOptions, BrowserType};

/// Options shared by every command that drives a browser
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Path to the WAVE script injected into each page
    #[arg(long, env = "WAVESCAN_WAVE_SCRIPT")]
    pub wave_script: Option<PathBuf>,

    /// Directory receiving reports
    #[arg(short, long, env = "WAVESCAN_OUTPUT_DIR", default_value = "results")]
    pub output_dir: PathBuf,

    /// Browser to use (chrome or firefox)
    #[arg(short, long, env = "WAVESCAN_BROWSER", default_value = "chrome")]
    pub browser: String,

    /// Run the browser without a window
    #[arg(
        long,
        env = "WAVESCAN_HEADLESS",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub headless: bool,

    /// Viewport size (WIDTHxHEIGHT)
    #[arg(long, env = "WAVESCAN_VIEWPORT", default_value = "1920x1080")]
    pub viewport: String,

    /// Page load timeout in milliseconds
    #[arg(long, env = "WAVESCAN_NAV_TIMEOUT_MS", default_value_t = 30_000)]
    pub nav_timeout_ms: u64,

    /// Bound on injecting, running and enhancing WAVE, in milliseconds
    #[arg(long, env = "WAVESCAN_ANALYSIS_TIMEOUT_MS", default_value_t = 60_000)]
    pub analysis_timeout_ms: u64,

    /// Cut positional arrays to the deduplicated length instead of
    /// following each XPath's first occurrence
    #[arg(long)]
    pub legacy_alignment: bool,

    #[command(flatten)]
    pub login: LoginArgs,
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Log in at this URL before analyzing anything
    #[arg(long, env = "WAVESCAN_LOGIN_URL")]
    pub login_url: Option<String>,

    #[arg(long, env = "WAVESCAN_USERNAME", hide_env_values = true)]
    pub username: Option<String>,

    #[arg(long, env = "WAVESCAN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, env = "WAVESCAN_USERNAME_SELECTOR", default_value = DEFAULT_USERNAME_SELECTOR)]
    pub username_selector: String,

    #[arg(long, env = "WAVESCAN_PASSWORD_SELECTOR", default_value = DEFAULT_PASSWORD_SELECTOR)]
    pub password_selector: String,

    #[arg(long, env = "WAVESCAN_SUBMIT_SELECTOR", default_value = DEFAULT_SUBMIT_SELECTOR)]
    pub submit_selector: String,
}

#[derive(Args, Debug, Clone)]
pub struct ScanCommandArgs {
    /// URL to analyze
    #[arg(env = "WAVESCAN_URL")]
    pub url: Option<String>,

    #[command(flatten)]
    pub scan: ScanArgs,
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// URLs to analyze, in order
    pub urls: Vec<String>,

    /// Additional URLs separated by commas, spaces or newlines
    #[arg(long, env = "WAVESCAN_URLS")]
    pub url_list: Option<String>,

    /// File with one URL per line; blank lines and `#` comments are ignored
    #[arg(long, env = "WAVESCAN_URLS_FILE")]
    pub urls_file: Option<PathBuf>,

    /// Pause between URLs in milliseconds
    #[arg(long, env = "WAVESCAN_REQUEST_DELAY_MS", default_value_t = 2_000)]
    pub request_delay_ms: u64,

    /// Pause between attempts at the same URL in milliseconds
    #[arg(long, env = "WAVESCAN_RETRY_DELAY_MS", default_value_t = 3_000)]
    pub retry_delay_ms: u64,

    /// Pause after a URL failed for good, in milliseconds
    #[arg(long, env = "WAVESCAN_FAILURE_DELAY_MS", default_value_t = 5_000)]
    pub failure_delay_ms: u64,

    /// Attempts per URL
    #[arg(long, env = "WAVESCAN_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    #[command(flatten)]
    pub scan: ScanArgs,
}

/// Accept absolute http(s) URLs only
pub fn validate_url(raw: &str) -> Result<String, ScanError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|e| ScanError::Config(format!("Invalid URL '{}': {}", trimmed, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        scheme => Err(ScanError::Config(format!(
            "Unsupported URL scheme '{}' in '{}'",
            scheme, trimmed
        ))),
    }
}

/// Split a comma/whitespace separated list
pub fn split_urls(list: &str) -> Vec<String> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// One URL per line, ignoring blank lines and `#` comments
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn load_url_file(path: &Path) -> Result<Vec<String>, ScanError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ScanError::Config(format!("Cannot read URL file {}: {}", path.display(), e))
    })?;
    let urls = parse_url_list(&text);
    debug!("Read {} URL(s) from {}", urls.len(), path.display());
    Ok(urls)
}

impl ScanArgs {
    pub fn wave_script_path(&self) -> Result<&Path, ScanError> {
        self.wave_script.as_deref().ok_or_else(|| {
            ScanError::Config(
                "No WAVE script given; pass --wave-script or set WAVESCAN_WAVE_SCRIPT".to_string(),
            )
        })
    }

    pub fn browser_options(&self) -> Result<BrowserOptions, ScanError> {
        let browser_type: BrowserType = self
            .browser
            .parse()
            .map_err(|e: anyhow::Error| ScanError::Config(e.to_string()))?;
        let viewport = ViewportSize::parse(&self.viewport)
            .map_err(|e| ScanError::Config(e.to_string()))?;

        Ok(BrowserOptions {
            browser_type,
            viewport,
            headless: self.headless,
            page_load_timeout: Duration::from_millis(self.nav_timeout_ms),
            script_timeout: Duration::from_millis(self.analysis_timeout_ms),
        })
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            navigation_timeout: Duration::from_millis(self.nav_timeout_ms),
            analysis_timeout: Duration::from_millis(self.analysis_timeout_ms),
            poll: PollSettings::default(),
            alignment: if self.legacy_alignment {
                PositionalAlignment::Truncate
            } else {
                PositionalAlignment::FirstOccurrence
            },
        }
    }
}

impl LoginArgs {
    /// `None` unless a login URL is configured
    pub fn login_config(&self) -> Result<Option<LoginConfig>, ScanError> {
        let Some(url) = &self.login_url else {
            return Ok(None);
        };
        let url = validate_url(url)?;
        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Err(ScanError::Config(
                "A login URL needs both a username and a password".to_string(),
            ));
        };

        let mut login = LoginConfig::new(&url, username, password);
        login.username_selector = self.username_selector.clone();
        login.password_selector = self.password_selector.clone();
        login.submit_selector = self.submit_selector.clone();
        Ok(Some(login))
    }
}

impl ScanCommandArgs {
    pub fn resolve_url(&self) -> Result<String, ScanError> {
        let url = self.url.as_deref().ok_or_else(|| {
            ScanError::Config("No URL given; pass it as an argument or set WAVESCAN_URL".to_string())
        })?;
        validate_url(url)
    }
}

impl BatchArgs {
    /// Positional URLs, then the list variable, then the file, all validated
    pub fn resolve_urls(&self) -> Result<Vec<String>, ScanError> {
        let mut urls = self.urls.clone();
        if let Some(list) = &self.url_list {
            urls.extend(split_urls(list));
        }
        if let Some(path) = &self.urls_file {
            urls.extend(load_url_file(path)?);
        }
        if urls.is_empty() {
            return Err(ScanError::Config(
                "No URLs given; pass them as arguments, --url-list/WAVESCAN_URLS or --urls-file/WAVESCAN_URLS_FILE"
                    .to_string(),
            ));
        }
        urls.iter().map(|url| validate_url(url)).collect()
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            output_dir: self.scan.output_dir.clone(),
            request_delay: Duration::from_millis(self.request_delay_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            failure_delay: Duration::from_millis(self.failure_delay_ms),
            max_retries: self.max_retries,
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
