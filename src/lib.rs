//! # wavescan
#![allow(clippy::uninlined_format_args)]
//!
//! CI batch runner that audits web pages with the WAVE accessibility engine.
//!
//! A browser is driven over WebDriver, the WAVE script is injected into each
//! page, and its results are deduplicated, enriched with DOM context and
//! written as CSV and JSON reports.
//!
//! ## Installation
//!
//! ```bash
//! cargo install wavescan
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Analyze a single page
//! wavescan scan "https://example.com" --wave-script ./wave.min.js
//!
//! # Analyze several pages, one after the other
//! wavescan batch "https://example.com" "https://example.com/about" \
//!   --wave-script ./wave.min.js --output-dir results
//!
//! # URLs from a file (blank lines and # comments are ignored)
//! wavescan batch --urls-file urls.txt --wave-script ./wave.min.js
//!
//! # Merge every CSV report of a directory into all-violations.csv
//! wavescan extract results
//! ```
//!
//! ### CI Configuration
//!
//! Every flag has a `WAVESCAN_*` environment variable, so a pipeline step can
//! be as small as:
//!
//! ```bash
//! export WAVESCAN_WAVE_SCRIPT=/opt/wave/wave.min.js
//! export WAVESCAN_URLS="https://staging.example.com, https://staging.example.com/cart"
//! export WAVESCAN_OUTPUT_DIR=accessibility
//! wavescan batch
//! ```
//!
//! Pages behind a login form can be reached with `WAVESCAN_LOGIN_URL`,
//! `WAVESCAN_USERNAME` and `WAVESCAN_PASSWORD`; the form is submitted once
//! before the first page is analyzed.
//!
//! ### Output
//!
//! Each command prints one JSON line to stdout; logs go to stderr
//! (`RUST_LOG=wavescan=debug` for more). Per page:
//!
//! - `accessibility-results-<slug>.csv`: metadata block, then one row per
//!   unique element of every error and contrast rule
//! - `accessibility-results-<slug>.json`: metadata, violations and summary
//! - `accessibility-error-<slug>.json`: written instead when a page failed
//!
//! A batch also writes `batch-summary-<YYYY-MM-DD-HHMMSS>.json`.
//!
//! ## Library Usage
//!
//! ```no_run
//! use wavescan::batch::{BatchConfig, run_batch};
//! use wavescan::scanner::{ScanSettings, WaveScanner};
//! use wavescan::{Browser, BrowserOptions, BrowserType, ViewportSize};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let browser = Browser::new(&BrowserOptions {
//!     browser_type: BrowserType::Chrome,
//!     viewport: ViewportSize { width: 1920, height: 1080 },
//!     headless: true,
//!     page_load_timeout: Duration::from_secs(30),
//!     script_timeout: Duration::from_secs(60),
//! })
//! .await?;
//!
//! let source = std::fs::read_to_string("wave.min.js")?;
//! let scanner = WaveScanner::new(&browser, source, ScanSettings::default());
//! let urls = vec!["https://example.com".to_string()];
//! let run = run_batch(&scanner, &urls, &BatchConfig::default()).await;
//! println!("{} of {} pages analyzed", run.summary.successful, run.summary.total);
//!
//! browser.close().await?;
//! # Ok(())
//! # }
//! ```

/// Sequential batch orchestration
pub mod batch;

/// Command-line and environment configuration
pub mod config;

/// CSV encoding and decoding
pub mod csv;

/// Deduplication and DOM enrichment of raw WAVE results
pub mod enhance;

/// Error type and exit codes
pub mod errors;

/// Merging per-page CSV reports
pub mod extract;

/// Waiting for WAVE to become usable, then running it
pub mod initializer;

/// Optional form login
pub mod login;

/// CSV/JSON report assembly and output files
pub mod report;

/// Single-page analysis
pub mod scanner;

/// Result and environment types
pub mod types;

/// WebDriver browser control and automation
pub mod webdriver;

/// Automatic WebDriver process management
pub mod webdriver_manager;

pub use errors::ScanError;
pub use report::PageReport;
pub use types::{Category, ViewportSize, Violations};
pub use webdriver::{Browser, BrowserOptions, BrowserType};
