//! Combine per-page CSV reports of a results directory into one violations file.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::csv;
use crate::errors::ScanError;

pub const DEFAULT_OUTPUT_NAME: &str = "all-violations.csv";
pub const DEFAULT_EXCLUDE_TERMS: [&str; 2] = ["nested", "interactive"];
const SOURCE_COLUMN: &str = "Source File";

#[derive(Clone, Debug)]
pub struct ExtractOptions {
    /// File name written inside the results directory
    pub output_name: String,
    /// A row is dropped when its rule id contains every one of these terms
    pub exclude_terms: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            exclude_terms: DEFAULT_EXCLUDE_TERMS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExtractSummary {
    /// Absent when no file contributed any row
    pub output: Option<PathBuf>,
    pub files_found: usize,
    pub files_used: usize,
    pub rows: usize,
    pub excluded: usize,
}

/// Header row and data rows of one report
struct ReportTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

/// Skip the metadata block up to the row mentioning `Rule ID`
fn read_table(text: &str) -> Option<ReportTable> {
    let mut rows = csv::parse_document(text)
        .into_iter()
        .filter(|row| !is_blank(row));
    let header = rows.find(|row| row.iter().any(|cell| cell.contains("Rule ID")))?;
    Some(ReportTable {
        header,
        rows: rows.collect(),
    })
}

fn rule_id_column(header: &[String]) -> Option<usize> {
    header.iter().position(|cell| cell == "Rule ID").or_else(|| {
        header.iter().position(|cell| {
            let cell = cell.to_lowercase();
            cell.contains("rule") && cell.contains("id")
        })
    })
}

fn is_excluded(rule_id: &str, terms: &[String]) -> bool {
    if terms.is_empty() || rule_id.is_empty() {
        return false;
    }
    let rule_id = rule_id.to_lowercase();
    terms.iter().all(|term| rule_id.contains(&term.to_lowercase()))
}

/// CSV files of `dir` in name order, minus the extraction output itself
fn report_files(dir: &Path, output_name: &str) -> Result<Vec<PathBuf>, ScanError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        ScanError::Config(format!(
            "Cannot read results directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
        .filter(|path| path.file_name().is_some_and(|name| name != output_name))
        .collect();
    files.sort();
    Ok(files)
}

/// Merge every report in `dir` into `dir/<output_name>`
pub fn extract_violations(dir: &Path, options: &ExtractOptions) -> Result<ExtractSummary, ScanError> {
    let files = report_files(dir, &options.output_name)?;
    info!("Found {} CSV file(s) in {}", files.len(), dir.display());

    let mut summary = ExtractSummary {
        files_found: files.len(),
        ..Default::default()
    };
    let mut lines: Vec<String> = Vec::new();

    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping {}: {}", name, e);
                continue;
            }
        };
        let Some(table) = read_table(&text) else {
            info!("Skipping {}: no 'Rule ID' header", name);
            continue;
        };
        if table.rows.is_empty() {
            info!("Skipping {}: no violation rows", name);
            continue;
        }
        let Some(rule_col) = rule_id_column(&table.header) else {
            info!("Skipping {}: no rule id column", name);
            continue;
        };

        if lines.is_empty() {
            let header = std::iter::once(SOURCE_COLUMN).chain(table.header.iter().map(String::as_str));
            lines.push(csv::format_row(header.map(Some)));
        }

        let mut used = 0;
        for row in &table.rows {
            let Some(rule_id) = row.get(rule_col) else {
                continue;
            };
            if is_excluded(rule_id.trim(), &options.exclude_terms) {
                summary.excluded += 1;
                continue;
            }
            let fields = std::iter::once(name.as_str()).chain(row.iter().map(String::as_str));
            lines.push(csv::format_row(fields.map(Some)));
            used += 1;
        }
        debug!("{}: {} row(s) kept", name, used);
        summary.files_used += 1;
        summary.rows += used;
    }

    if lines.is_empty() {
        info!("No violations found to extract");
        return Ok(summary);
    }

    let output = dir.join(&options.output_name);
    let mut contents = lines.join("\n");
    contents.push('\n');
    fs::write(&output, contents).map_err(|e| ScanError::Persistence {
        path: output.display().to_string(),
        message: e.to_string(),
    })?;
    info!(
        "Extracted {} violation(s) ({} excluded) to {}",
        summary.rows,
        summary.excluded,
        output.display()
    );
    summary.output = Some(output);
    Ok(summary)
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod extract_test;
