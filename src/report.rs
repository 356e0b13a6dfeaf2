//! Report assembly: flat CSV rows, nested JSON document and output files.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::csv;
use crate::errors::ScanError;
use crate::types::{Category, DomInfo, PageEnvironment, Violations};

pub const ENGINE_NAME: &str = "WAVE";
pub const RUNNER_NAME: &str = "wavescan";

/// Prefix of per-URL CSV/JSON reports
pub const REPORT_PREFIX: &str = "accessibility-results-";
/// Prefix of per-URL error reports
pub const ERROR_PREFIX: &str = "accessibility-error-";
const MAX_FILENAME_LEN: usize = 255;

pub const CSV_HEADER: [&str; 9] = [
    "Rule ID",
    "Category",
    "Impact",
    "Description",
    "Element",
    "XPath",
    "Selector",
    "Additional Info",
    "Help URL",
];

const HELP_URL_BASE: &str = "https://wave.webaim.org/api/docs?format=html#";

/// Who produced a report, for what page, in which browser environment
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ReportMetadata {
    pub engine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
    pub runner: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub environment: PageEnvironment,
}

impl ReportMetadata {
    pub fn new(url: &str, environment: PageEnvironment, engine_version: Option<String>) -> Self {
        Self {
            engine: ENGINE_NAME.to_string(),
            engine_version,
            runner: runner_identity(),
            url: url.to_string(),
            timestamp: Utc::now(),
            environment,
        }
    }

    fn engine_label(&self) -> String {
        match &self.engine_version {
            Some(version) => format!("{} {}", self.engine, version),
            None => self.engine.clone(),
        }
    }
}

pub fn runner_identity() -> String {
    format!("{} {}", RUNNER_NAME, env!("CARGO_PKG_VERSION"))
}

/// One CSV row: one deduplicated instance of one rule
#[derive(Clone, Debug, PartialEq)]
pub struct ReportRow {
    pub rule_id: String,
    pub category: Category,
    pub description: Option<String>,
    pub element: String,
    pub xpath: String,
    pub selector: Option<String>,
    pub additional_info: Option<String>,
    pub help_url: String,
}

impl ReportRow {
    fn fields(&self) -> [Option<&str>; 9] {
        [
            Some(self.rule_id.as_str()),
            Some(self.category.label()),
            Some(self.category.impact().as_str()),
            self.description.as_deref(),
            Some(self.element.as_str()),
            Some(self.xpath.as_str()),
            self.selector.as_deref(),
            self.additional_info.as_deref(),
            Some(self.help_url.as_str()),
        ]
    }
}

/// Counts derived from the violations
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ReportSummary {
    pub total_rows: usize,
    /// Categories with at least one instance
    pub categories: Vec<Category>,
    pub counts: BTreeMap<Category, usize>,
}

/// The JSON artifact
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct JsonReport {
    pub metadata: ReportMetadata,
    pub violations: Violations,
    pub summary: ReportSummary,
}

/// Analysis result for one page
#[derive(Clone, Debug, PartialEq)]
pub struct PageReport {
    pub metadata: ReportMetadata,
    pub violations: Violations,
}

impl PageReport {
    /// Rows for every deduplicated instance, errors first
    pub fn rows(&self) -> Vec<ReportRow> {
        let mut rows = Vec::new();
        for category in Category::ALL {
            let Some(bucket) = self.violations.get(&category) else {
                continue;
            };
            for rule in bucket.items.values() {
                for (index, xpath) in rule.xpaths.iter().enumerate() {
                    let dom = rule.dom_at(index);
                    let element = dom.map(describe_element).unwrap_or_else(|| xpath.clone());
                    let selector = dom
                        .map(|info| info.selector.clone())
                        .or_else(|| rule.selector_at(index).map(str::to_string));

                    let mut info = Vec::new();
                    if rule.hidden_at(index) {
                        info.push("Hidden element".to_string());
                    }
                    if let Some(contrast) = rule.contrast_at(index) {
                        info.push(format!(
                            "Contrast ratio {}:1 (foreground {}, background {})",
                            contrast.ratio, contrast.foreground, contrast.background
                        ));
                    }

                    rows.push(ReportRow {
                        rule_id: rule.id.clone(),
                        category,
                        description: rule.description.clone(),
                        element,
                        xpath: xpath.clone(),
                        selector,
                        additional_info: (!info.is_empty()).then(|| info.join("; ")),
                        help_url: format!("{}{}", HELP_URL_BASE, rule.id),
                    });
                }
            }
        }
        rows
    }

    pub fn summary(&self) -> ReportSummary {
        let counts: BTreeMap<Category, usize> = Category::ALL
            .iter()
            .map(|category| {
                let count = self.violations.get(category).map_or(0, |b| b.count);
                (*category, count)
            })
            .collect();

        ReportSummary {
            total_rows: self.rows().len(),
            categories: counts
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(category, _)| *category)
                .collect(),
            counts,
        }
    }

    /// Instances per rule id, across categories
    pub fn rule_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for bucket in self.violations.values() {
            for rule in bucket.items.values() {
                *counts.entry(rule.id.clone()).or_insert(0) += rule.count;
            }
        }
        counts
    }

    pub fn to_csv(&self) -> String {
        let meta = &self.metadata;
        let env = &meta.environment;
        let timestamp = meta.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        let window = env.viewport.to_string();
        let engine = meta.engine_label();

        let block: Vec<Vec<&str>> = vec![
            vec!["Test Information"],
            vec!["Test Engine", engine.as_str()],
            vec!["Test Runner", meta.runner.as_str()],
            vec!["Test URL", meta.url.as_str()],
            vec!["Timestamp", timestamp.as_str()],
            vec!["Environment Information"],
            vec!["User Agent", env.user_agent.as_str()],
            vec!["Window Size", window.as_str()],
            vec!["Orientation", env.orientation.as_str()],
        ];

        let mut out = String::new();
        for line in block {
            out.push_str(&csv::format_row(line.iter().map(|f| Some(*f))));
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&csv::format_row(CSV_HEADER.iter().map(|h| Some(*h))));
        out.push('\n');
        for row in self.rows() {
            out.push_str(&csv::format_row(row.fields()));
            out.push('\n');
        }
        out
    }

    pub fn to_json(&self) -> JsonReport {
        JsonReport {
            metadata: self.metadata.clone(),
            violations: self.violations.clone(),
            summary: self.summary(),
        }
    }
}

/// `<tag id="..." class="...">` from captured DOM info
pub fn describe_element(info: &DomInfo) -> String {
    let mut element = format!("<{}", info.tag.to_lowercase());
    if let Some(id) = &info.id {
        element.push_str(&format!(" id=\"{}\"", id));
    }
    if !info.classes.is_empty() {
        element.push_str(&format!(" class=\"{}\"", info.classes.join(" ")));
    }
    element.push('>');
    element
}

fn strip_scheme(url: &str) -> &str {
    for scheme in ["https://", "http://"] {
        if let Some(head) = url.get(..scheme.len())
            && head.eq_ignore_ascii_case(scheme)
        {
            return &url[scheme.len()..];
        }
    }
    url
}

/// Filesystem-safe form of a URL: scheme and trailing slash removed, every
/// non-alphanumeric character replaced by `-`
pub fn url_slug(url: &str) -> String {
    let trimmed = strip_scheme(url.trim());
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    trimmed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// `<prefix><slug>.<extension>`, with the slug cut so the whole name stays
/// within 255 bytes
pub fn report_filename(prefix: &str, url: &str, extension: &str) -> String {
    let budget = MAX_FILENAME_LEN.saturating_sub(prefix.len() + extension.len() + 1);
    // The slug is pure ASCII, so chars and bytes agree
    let slug: String = url_slug(url).chars().take(budget).collect();
    format!("{}{}.{}", prefix, slug, extension)
}

/// Files written for one successful analysis
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
}

fn write_file(path: &Path, contents: &str) -> Result<(), ScanError> {
    fs::write(path, contents).map_err(|e| ScanError::Persistence {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    debug!("Wrote {}", path.display());
    Ok(())
}

pub fn ensure_dir(dir: &Path) -> Result<(), ScanError> {
    fs::create_dir_all(dir).map_err(|e| ScanError::Persistence {
        path: dir.display().to_string(),
        message: e.to_string(),
    })
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ScanError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| ScanError::Persistence {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    write_file(path, &json)
}

/// Write the CSV and JSON artifacts for one page
pub fn write_page_report(dir: &Path, report: &PageReport) -> Result<ReportPaths, ScanError> {
    ensure_dir(dir)?;
    let url = &report.metadata.url;
    let paths = ReportPaths {
        csv: dir.join(report_filename(REPORT_PREFIX, url, "csv")),
        json: dir.join(report_filename(REPORT_PREFIX, url, "json")),
    };

    write_file(&paths.csv, &report.to_csv())?;
    write_json(&paths.json, &report.to_json())?;
    info!("Saved report for {} to {}", url, paths.csv.display());
    Ok(paths)
}

/// JSON written when a page could not be analyzed
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ErrorReport {
    pub url: String,
    pub runner: String,
    pub timestamp: DateTime<Utc>,
    pub attempts: u32,
    pub error: ErrorDetails,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ErrorDetails {
    pub kind: String,
    pub message: String,
    pub exit_code: i32,
}

impl ErrorReport {
    pub fn new(url: &str, error: &ScanError, attempts: u32) -> Self {
        Self {
            url: url.to_string(),
            runner: runner_identity(),
            timestamp: Utc::now(),
            attempts,
            error: ErrorDetails {
                kind: error.kind().to_string(),
                message: error.to_string(),
                exit_code: error.exit_code(),
            },
        }
    }
}

pub fn write_error_report(dir: &Path, report: &ErrorReport) -> Result<PathBuf, ScanError> {
    ensure_dir(dir)?;
    let path = dir.join(report_filename(ERROR_PREFIX, &report.url, "json"));
    write_json(&path, report)?;
    info!("Saved error report for {} to {}", report.url, path.display());
    Ok(path)
}

#[cfg(test)]
#[path = "report_test.rs"]
mod report_test;
