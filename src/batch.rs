//! Sequential batch orchestration with per-URL retries and an aggregate summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ScanError;
use crate::report::{self, ErrorReport, PageReport, ReportPaths};

/// Anything that can turn a URL into a page report
pub trait PageAnalyzer {
    fn analyze(&self, url: &str) -> impl Future<Output = Result<PageReport, ScanError>>;
}

#[derive(Clone, Debug)]
pub struct BatchConfig {
    pub output_dir: PathBuf,
    /// Pause between two URLs
    pub request_delay: Duration,
    /// Pause between two attempts at the same URL
    pub retry_delay: Duration,
    /// Pause after a URL failed for good, instead of `request_delay`
    pub failure_delay: Duration,
    /// Attempts per URL; values below 1 are treated as 1
    pub max_retries: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("results"),
            request_delay: Duration::from_millis(2000),
            retry_delay: Duration::from_millis(3000),
            failure_delay: Duration::from_millis(5000),
            max_retries: 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// What happened to one URL of the batch
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct UrlOutcome {
    pub url: String,
    pub status: OutcomeStatus,
    pub attempts: u32,
    /// Deduplicated instances found, for successful analyses
    #[serde(default)]
    pub issues: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_report: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_report: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_report: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percentage of URLs analyzed successfully
    pub success_rate: f64,
    pub outcomes: Vec<UrlOutcome>,
    /// Instances per rule id across all successful analyses
    pub issue_frequency: BTreeMap<String, usize>,
}

impl BatchSummary {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: started_at,
            total: 0,
            successful: 0,
            failed: 0,
            success_rate: 0.0,
            outcomes: Vec::new(),
            issue_frequency: BTreeMap::new(),
        }
    }

    fn record(&mut self, outcome: UrlOutcome) {
        self.total += 1;
        match outcome.status {
            OutcomeStatus::Success => self.successful += 1,
            OutcomeStatus::Failed => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    fn finish(&mut self) {
        self.finished_at = Utc::now();
        self.success_rate = if self.total == 0 {
            0.0
        } else {
            self.successful as f64 * 100.0 / self.total as f64
        };
    }

    pub fn filename(&self) -> String {
        format!(
            "batch-summary-{}.json",
            self.started_at.format("%Y-%m-%d-%H%M%S")
        )
    }
}

/// A finished batch and where its summary landed
#[derive(Clone, Debug)]
pub struct BatchRun {
    pub summary: BatchSummary,
    pub summary_path: Option<PathBuf>,
}

/// Try one URL up to `max_retries` times
async fn analyze_with_retries<A: PageAnalyzer>(
    analyzer: &A,
    url: &str,
    config: &BatchConfig,
) -> (Result<PageReport, ScanError>, u32) {
    let max_attempts = config.max_retries.max(1);
    let mut attempt = 1;
    loop {
        match analyzer.analyze(url).await {
            Ok(report) => return (Ok(report), attempt),
            Err(e) => {
                warn!(
                    "Attempt {}/{} for {} failed: {}",
                    attempt, max_attempts, url, e
                );
                if attempt >= max_attempts {
                    return (Err(e), attempt);
                }
            }
        }
        tokio::time::sleep(config.retry_delay).await;
        attempt += 1;
    }
}

fn success_outcome(
    url: &str,
    attempts: u32,
    report: &PageReport,
    dir: &Path,
    summary: &mut BatchSummary,
) -> UrlOutcome {
    let counts = report.rule_counts();
    let issues = counts.values().sum();
    for (rule, count) in counts {
        *summary.issue_frequency.entry(rule).or_insert(0) += count;
    }

    let paths = match report::write_page_report(dir, report) {
        Ok(paths) => Some(paths),
        Err(e) => {
            warn!("Could not save report for {}: {}", url, e);
            None
        }
    };
    let (csv_report, json_report) = match paths {
        Some(ReportPaths { csv, json }) => (Some(csv), Some(json)),
        None => (None, None),
    };

    UrlOutcome {
        url: url.to_string(),
        status: OutcomeStatus::Success,
        attempts,
        issues,
        csv_report,
        json_report,
        error_report: None,
        error: None,
    }
}

fn failure_outcome(url: &str, attempts: u32, error: &ScanError, dir: &Path) -> UrlOutcome {
    let error_report = match report::write_error_report(dir, &ErrorReport::new(url, error, attempts))
    {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("Could not save error report for {}: {}", url, e);
            None
        }
    };

    UrlOutcome {
        url: url.to_string(),
        status: OutcomeStatus::Failed,
        attempts,
        issues: 0,
        csv_report: None,
        json_report: None,
        error_report,
        error: Some(error.to_string()),
    }
}

/// Analyze every URL in order, one at a time.
///
/// A URL that keeps failing is recorded and the batch moves on; nothing here
/// aborts the run. Report files that cannot be written are logged and left
/// out of the outcome.
pub async fn run_batch<A: PageAnalyzer>(
    analyzer: &A,
    urls: &[String],
    config: &BatchConfig,
) -> BatchRun {
    let mut summary = BatchSummary::new(Utc::now());
    info!(
        "Starting batch {} with {} URL(s), output in {}",
        summary.run_id,
        urls.len(),
        config.output_dir.display()
    );

    for (index, url) in urls.iter().enumerate() {
        info!("[{}/{}] Analyzing {}", index + 1, urls.len(), url);

        let (result, attempts) = analyze_with_retries(analyzer, url, config).await;
        let failed = result.is_err();
        let outcome = match result {
            Ok(report) => {
                let outcome =
                    success_outcome(url, attempts, &report, &config.output_dir, &mut summary);
                info!("{}: {} issue(s)", url, outcome.issues);
                outcome
            }
            Err(e) => {
                warn!("Giving up on {} after {} attempt(s): {}", url, attempts, e);
                failure_outcome(url, attempts, &e, &config.output_dir)
            }
        };
        summary.record(outcome);

        if index + 1 < urls.len() {
            let pause = if failed {
                config.failure_delay
            } else {
                config.request_delay
            };
            tokio::time::sleep(pause).await;
        }
    }

    summary.finish();
    info!(
        "Batch finished: {}/{} successful ({:.1}%)",
        summary.successful, summary.total, summary.success_rate
    );

    let summary_path = match write_summary(&config.output_dir, &summary) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("Could not save batch summary: {}", e);
            None
        }
    };

    BatchRun {
        summary,
        summary_path,
    }
}

pub fn write_summary(dir: &Path, summary: &BatchSummary) -> Result<PathBuf, ScanError> {
    report::ensure_dir(dir)?;
    let path = dir.join(summary.filename());
    report::write_json(&path, summary)?;
    info!("Saved batch summary to {}", path.display());
    Ok(path)
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod batch_test;
