// Batch orchestration, report files and extraction through the public API,
// with a canned analyzer in place of a browser

use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

use wavescan::batch::{BatchConfig, OutcomeStatus, PageAnalyzer, run_batch};
use wavescan::enhance::{self, DomInspector, PositionalAlignment, RawResults};
use wavescan::errors::ScanError;
use wavescan::extract::{ExtractOptions, extract_violations};
use wavescan::report::{JsonReport, PageReport, ReportMetadata};
use wavescan::types::{DomLookup, Orientation, PageEnvironment, ViewportSize};

/// Every XPath resolves to a `<div>` without id or classes
struct PlainDom;

impl DomInspector for PlainDom {
    async fn inspect(&self, xpaths: &[String]) -> anyhow::Result<Vec<DomLookup>> {
        Ok(xpaths
            .iter()
            .map(|_| enhance::lookup_from_value(&json!({"tagName": "DIV"})))
            .collect())
    }
}

/// Replays a fixed WAVE payload per URL; URLs without one fail to load
struct CannedAnalyzer {
    payloads: HashMap<String, serde_json::Value>,
    attempts: Mutex<HashMap<String, u32>>,
}

impl PageAnalyzer for CannedAnalyzer {
    async fn analyze(&self, url: &str) -> Result<PageReport, ScanError> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        let Some(payload) = self.payloads.get(url) else {
            return Err(ScanError::Navigation {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_REFUSED".to_string(),
            });
        };
        let raw = RawResults::from_value(payload)?;
        let violations = enhance::enhance(raw, &PlainDom, PositionalAlignment::default()).await;
        let environment = PageEnvironment {
            user_agent: "Canned/1.0".to_string(),
            viewport: ViewportSize {
                width: 1920,
                height: 1080,
            },
            orientation: Orientation::Landscape,
        };
        Ok(PageReport {
            metadata: ReportMetadata::new(url, environment, Some("canned".to_string())),
            violations,
        })
    }
}

fn payload(rules: &[(&str, &str, Vec<&str>)]) -> serde_json::Value {
    let mut categories = serde_json::Map::new();
    for (category, rule, xpaths) in rules {
        let entry = categories
            .entry(category.to_string())
            .or_insert_with(|| json!({"count": 0, "items": {}}));
        entry["items"][*rule] = json!({
            "id": rule,
            "description": format!("{} description", rule),
            "count": xpaths.len(),
            "xpaths": xpaths,
        });
    }
    json!({ "categories": categories })
}

#[tokio::test]
async fn test_batch_writes_reports_and_extraction_merges_them() {
    let dir = TempDir::new().unwrap();
    let one = "https://shop.example.com/";
    let two = "https://shop.example.com/broken";
    let three = "https://shop.example.com/cart";

    let analyzer = CannedAnalyzer {
        payloads: HashMap::from([
            (
                one.to_string(),
                payload(&[
                    ("error", "alt_missing", vec!["/html/body/img[1]", "/html/body/img[1]"]),
                    ("alert", "redundant_link", vec!["/html/body/a[1]"]),
                ]),
            ),
            (
                three.to_string(),
                payload(&[
                    ("error", "alt_missing", vec!["/html/body/img[3]"]),
                    ("error", "nested_interactive", vec!["/html/body/a[2]"]),
                    ("contrast", "contrast", vec!["/html/body/p[1]"]),
                ]),
            ),
        ]),
        attempts: Mutex::new(HashMap::new()),
    };
    let config = BatchConfig {
        output_dir: dir.path().to_path_buf(),
        request_delay: Duration::ZERO,
        retry_delay: Duration::ZERO,
        failure_delay: Duration::ZERO,
        max_retries: 2,
    };
    let urls: Vec<String> = [one, two, three].iter().map(|u| u.to_string()).collect();

    let run = run_batch(&analyzer, &urls, &config).await;

    assert_eq!(run.summary.successful, 2);
    assert_eq!(run.summary.failed, 1);
    assert_eq!(run.summary.outcomes[1].status, OutcomeStatus::Failed);
    assert_eq!(analyzer.attempts.lock().unwrap()[two], 2);
    assert_eq!(run.summary.issue_frequency["alt_missing"], 2);
    assert!(!run.summary.issue_frequency.contains_key("redundant_link"));

    // Per-page JSON carries only the retained categories
    let json_path = dir
        .path()
        .join("accessibility-results-shop-example-com.json");
    let report: JsonReport =
        serde_json::from_str(&std::fs::read_to_string(json_path).unwrap()).unwrap();
    assert_eq!(report.summary.total_rows, 1);
    assert_eq!(report.metadata.engine_version.as_deref(), Some("canned"));

    // Failed page left an error report
    let error_path = dir
        .path()
        .join("accessibility-error-shop-example-com-broken.json");
    let error: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(error_path).unwrap()).unwrap();
    assert_eq!(error["error"]["kind"], "navigation");
    assert_eq!(error["attempts"], 2);

    let summary_path = run.summary_path.unwrap();
    assert!(summary_path.starts_with(dir.path()));

    // Merge both CSV reports, dropping nested interactive rules
    let extracted = extract_violations(dir.path(), &ExtractOptions::default()).unwrap();
    assert_eq!(extracted.files_used, 2);
    assert_eq!(extracted.rows, 3);
    assert_eq!(extracted.excluded, 1);

    let merged = std::fs::read_to_string(extracted.output.unwrap()).unwrap();
    let lines: Vec<&str> = merged.lines().collect();
    assert!(lines[0].starts_with("Source File,Rule ID,Category,Impact"));
    assert!(lines[1].starts_with("accessibility-results-shop-example-com-cart.csv,"));
    assert!(merged.contains("<div>"));
    assert!(!merged.contains("nested_interactive"));
}
