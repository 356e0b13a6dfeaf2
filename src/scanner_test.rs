// Unit tests for the page scanner

use super::*;
use crate::types::{Category, Orientation, ViewportSize};
use serde_json::json;
use std::sync::Mutex;
use tempfile::TempDir;

/// Page that answers every script from canned data
struct FakePage {
    navigation_error: Option<String>,
    navigation_delay: Duration,
    entry_point: bool,
    payload: Value,
    injected: Mutex<Vec<String>>,
    visited: Mutex<Vec<String>>,
}

impl FakePage {
    fn new(payload: Value) -> Self {
        Self {
            navigation_error: None,
            navigation_delay: Duration::ZERO,
            entry_point: true,
            payload,
            injected: Mutex::new(Vec::new()),
            visited: Mutex::new(Vec::new()),
        }
    }
}

impl PageScripting for FakePage {
    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        if script.contains("entryPoint") {
            return Ok(json!({"entryPoint": self.entry_point, "ready": self.entry_point}));
        }
        if script.contains("document.evaluate") {
            let xpaths = args[0].as_array().cloned().unwrap_or_default();
            return Ok(Value::Array(
                xpaths
                    .iter()
                    .map(|_| json!({"tagName": "IMG", "id": "logo", "className": "brand"}))
                    .collect(),
            ));
        }
        if script.contains("wave.version") {
            return Ok(json!("3.2.6"));
        }
        anyhow::bail!("unexpected script")
    }

    async fn execute_async(&self, _script: &str, _args: Vec<Value>) -> Result<Value> {
        Ok(json!({"ok": true, "result": self.payload.clone()}))
    }
}

impl ScanPage for FakePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        tokio::time::sleep(self.navigation_delay).await;
        if let Some(message) = &self.navigation_error {
            anyhow::bail!("{}", message);
        }
        self.visited.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn inject(&self, source: &str) -> Result<()> {
        self.injected.lock().unwrap().push(source.to_string());
        Ok(())
    }

    async fn environment(&self) -> Result<PageEnvironment> {
        let viewport = ViewportSize {
            width: 375,
            height: 667,
        };
        Ok(PageEnvironment {
            user_agent: "FakeBrowser/1.0".to_string(),
            viewport,
            orientation: viewport.orientation(),
        })
    }
}

fn payload() -> Value {
    json!({
        "categories": {
            "error": {
                "count": 3,
                "items": {
                    "alt_missing": {
                        "id": "alt_missing",
                        "description": "Missing alternative text",
                        "count": 3,
                        "xpaths": ["/html/body/img[1]", "/html/body/img[1]", "/html/body/img[2]"]
                    }
                }
            },
            "alert": {
                "count": 1,
                "items": {"redundant_link": {"xpaths": ["/html/body/a[1]"]}}
            }
        }
    })
}

fn settings() -> ScanSettings {
    ScanSettings {
        navigation_timeout: Duration::from_secs(5),
        analysis_timeout: Duration::from_secs(5),
        poll: PollSettings {
            interval: Duration::ZERO,
            max_attempts: 5,
            init_retries: 1,
            init_retry_delay: Duration::ZERO,
        },
        alignment: PositionalAlignment::FirstOccurrence,
    }
}

#[tokio::test]
async fn test_scan_builds_enhanced_report() {
    let page = FakePage::new(payload());
    let scanner = WaveScanner::new(&page, "window.wave = {};".to_string(), settings());

    let report = scanner.scan("https://example.com/").await.unwrap();

    assert_eq!(*page.visited.lock().unwrap(), vec!["https://example.com/"]);
    assert_eq!(*page.injected.lock().unwrap(), vec!["window.wave = {};"]);

    assert!(!report.violations.contains_key(&Category::Contrast));
    let errors = &report.violations[&Category::Error];
    assert_eq!(errors.count, 2);
    assert_eq!(errors.items["alt_missing"].xpaths.len(), 2);
    assert_eq!(
        errors.items["alt_missing"].dom_at(0).map(|d| d.selector.as_str()),
        Some("#logo")
    );

    let meta = &report.metadata;
    assert_eq!(meta.url, "https://example.com/");
    assert_eq!(meta.engine_version.as_deref(), Some("3.2.6"));
    assert_eq!(meta.environment.user_agent, "FakeBrowser/1.0");
    assert_eq!(meta.environment.orientation, Orientation::Portrait);
}

#[tokio::test]
async fn test_navigation_failure_is_reported_per_url() {
    let mut page = FakePage::new(payload());
    page.navigation_error = Some("net::ERR_NAME_NOT_RESOLVED".to_string());
    let scanner = WaveScanner::new(&page, "x".to_string(), settings());

    let err = scanner.scan("https://nowhere.invalid/").await.unwrap_err();

    match &err {
        ScanError::Navigation { url, message } => {
            assert_eq!(url, "https://nowhere.invalid/");
            assert!(message.contains("ERR_NAME_NOT_RESOLVED"));
        }
        other => panic!("expected Navigation, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 5);
    assert!(page.injected.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_slow_navigation_times_out() {
    let mut page = FakePage::new(payload());
    page.navigation_delay = Duration::from_secs(5);
    let mut settings = settings();
    settings.navigation_timeout = Duration::from_millis(10);
    let scanner = WaveScanner::new(&page, "x".to_string(), settings);

    let err = scanner.scan("https://example.com/").await.unwrap_err();

    assert!(matches!(err, ScanError::Timeout(_)));
}

#[tokio::test]
async fn test_missing_library_fails_the_url() {
    let mut page = FakePage::new(payload());
    page.entry_point = false;
    let scanner = WaveScanner::new(&page, "x".to_string(), settings());

    let err = scanner.scan("https://example.com/").await.unwrap_err();

    assert!(matches!(err, ScanError::LibraryUnavailable { attempts: 5 }));
}

#[tokio::test]
async fn test_non_object_payload_is_rejected() {
    let page = FakePage::new(json!("not a result"));
    let scanner = WaveScanner::new(&page, "x".to_string(), settings());

    let err = scanner.scan("https://example.com/").await.unwrap_err();

    assert!(matches!(err, ScanError::Payload(_)));
}

#[test]
fn test_load_wave_script() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wave.min.js");

    let err = load_wave_script(&path).unwrap_err();
    assert!(matches!(err, ScanError::Config(_)));

    std::fs::write(&path, "  \n").unwrap();
    assert!(matches!(
        load_wave_script(&path).unwrap_err(),
        ScanError::Config(_)
    ));

    std::fs::write(&path, "window.wave = {fn: {}};").unwrap();
    assert_eq!(load_wave_script(&path).unwrap(), "window.wave = {fn: {}};");
}
