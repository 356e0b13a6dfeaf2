//! Single-page analysis: navigate, inject WAVE, wait for it, enhance its results.

use anyhow::Result;
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::batch::PageAnalyzer;
use crate::enhance::{self, PageInspector, PositionalAlignment, RawResults};
use crate::errors::ScanError;
use crate::initializer::{self, PollSettings};
use crate::report::{PageReport, ReportMetadata};
use crate::types::PageEnvironment;
use crate::webdriver::{Browser, PageScripting};

/// Page operations needed beyond plain script execution
pub trait ScanPage: PageScripting {
    /// Load `url` and wait for the document to settle
    fn navigate(&self, url: &str) -> impl Future<Output = Result<()>>;

    /// Evaluate `source` as a classic script in the page
    fn inject(&self, source: &str) -> impl Future<Output = Result<()>>;

    fn environment(&self) -> impl Future<Output = Result<PageEnvironment>>;
}

impl ScanPage for Browser {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.goto(url).await
    }

    async fn inject(&self, source: &str) -> Result<()> {
        self.inject_script(source).await
    }

    async fn environment(&self) -> Result<PageEnvironment> {
        Browser::environment(self).await
    }
}

const ENGINE_VERSION_SCRIPT: &str = r#"
    const wave = window.wave || {};
    const version = wave.version || (wave.fn && wave.fn.version) || null;
    return version === null ? null : String(version);
"#;

/// Read the WAVE script once; an unreadable or empty file is a configuration error
pub fn load_wave_script(path: &Path) -> Result<String, ScanError> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        ScanError::Config(format!(
            "Cannot read WAVE script {}: {}",
            path.display(),
            e
        ))
    })?;
    if source.trim().is_empty() {
        return Err(ScanError::Config(format!(
            "WAVE script {} is empty",
            path.display()
        )));
    }
    debug!("Loaded WAVE script ({} bytes)", source.len());
    Ok(source)
}

/// Tunables for one page analysis
#[derive(Clone, Debug)]
pub struct ScanSettings {
    pub navigation_timeout: Duration,
    /// Bound on everything after navigation
    pub analysis_timeout: Duration,
    pub poll: PollSettings,
    pub alignment: PositionalAlignment,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_millis(30_000),
            analysis_timeout: Duration::from_millis(60_000),
            poll: PollSettings::default(),
            alignment: PositionalAlignment::default(),
        }
    }
}

/// Runs WAVE against pages of one browser session
pub struct WaveScanner<'a, P> {
    page: &'a P,
    wave_source: String,
    settings: ScanSettings,
}

impl<'a, P: ScanPage> WaveScanner<'a, P> {
    pub fn new(page: &'a P, wave_source: String, settings: ScanSettings) -> Self {
        Self {
            page,
            wave_source,
            settings,
        }
    }

    /// Analyze one URL
    pub async fn scan(&self, url: &str) -> Result<PageReport, ScanError> {
        let nav_timeout = self.settings.navigation_timeout;
        match timeout(nav_timeout, self.page.navigate(url)).await {
            Err(_) => {
                return Err(ScanError::Timeout(format!(
                    "loading {} took longer than {} ms",
                    url,
                    nav_timeout.as_millis()
                )));
            }
            Ok(Err(e)) => {
                return Err(ScanError::Navigation {
                    url: url.to_string(),
                    message: format!("{:#}", e),
                });
            }
            Ok(Ok(())) => {}
        }

        let analysis_timeout = self.settings.analysis_timeout;
        timeout(analysis_timeout, self.analyze_loaded(url))
            .await
            .map_err(|_| {
                ScanError::Timeout(format!(
                    "analysis of {} took longer than {} ms",
                    url,
                    analysis_timeout.as_millis()
                ))
            })?
    }

    async fn analyze_loaded(&self, url: &str) -> Result<PageReport, ScanError> {
        self.page.inject(&self.wave_source).await?;

        let payload = initializer::run_when_ready(self.page, &self.settings.poll).await?;
        let raw = RawResults::from_value(&payload)?;
        let violations = enhance::enhance(
            raw,
            &PageInspector::new(self.page),
            self.settings.alignment,
        )
        .await;
        info!(
            "{}: {} unique instance(s) after enhancement",
            url,
            enhance::total_instances(&violations)
        );

        let environment = self.page.environment().await?;
        let engine_version = self.engine_version().await;

        Ok(PageReport {
            metadata: ReportMetadata::new(url, environment, engine_version),
            violations,
        })
    }

    /// Version string advertised by the injected library, if any
    async fn engine_version(&self) -> Option<String> {
        match self.page.execute(ENGINE_VERSION_SCRIPT, vec![]).await {
            Ok(Value::String(version)) if !version.is_empty() => Some(version),
            Ok(_) => None,
            Err(e) => {
                debug!("Could not read WAVE version: {:#}", e);
                None
            }
        }
    }
}

impl<P: ScanPage> PageAnalyzer for WaveScanner<'_, P> {
    async fn analyze(&self, url: &str) -> Result<PageReport, ScanError> {
        self.scan(url).await
    }
}

#[cfg(test)]
#[path = "scanner_test.rs"]
mod scanner_test;
