// Common test utilities and fixtures

use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::Duration;

use wavescan::enhance::PositionalAlignment;
use wavescan::initializer::PollSettings;
use wavescan::scanner::ScanSettings;
use wavescan::types::ViewportSize;
use wavescan::webdriver::{Browser, BrowserOptions, BrowserType};

// Global test lock to prevent concurrent WebDriver starts
lazy_static::lazy_static! {
    static ref WEBDRIVER_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::new(());
}

/// Path of the stand-in WAVE script
#[allow(dead_code)]
pub fn wave_stub_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/wave-stub.js")
}

#[allow(dead_code)]
pub fn wave_stub_source() -> String {
    std::fs::read_to_string(wave_stub_path()).expect("Failed to read WAVE stub")
}

/// Scan settings with short polling for local pages
#[allow(dead_code)]
pub fn fast_scan_settings() -> ScanSettings {
    ScanSettings {
        navigation_timeout: Duration::from_secs(15),
        analysis_timeout: Duration::from_secs(20),
        poll: PollSettings {
            interval: Duration::from_millis(50),
            max_attempts: 40,
            init_retries: 1,
            init_retry_delay: Duration::from_millis(100),
        },
        alignment: PositionalAlignment::FirstOccurrence,
    }
}

/// Start a headless browser, trying Chrome first, then Firefox.
/// Returns `None` when no WebDriver can be started so callers can skip.
#[allow(dead_code)]
pub async fn open_test_browser() -> Option<Browser> {
    let _lock = WEBDRIVER_LOCK.lock().await;

    for browser_type in [BrowserType::Chrome, BrowserType::Firefox] {
        let options = BrowserOptions {
            browser_type,
            viewport: ViewportSize {
                width: 1280,
                height: 800,
            },
            headless: true,
            page_load_timeout: Duration::from_secs(15),
            script_timeout: Duration::from_secs(20),
        };
        match Browser::new(&options).await {
            Ok(browser) => return Some(browser),
            Err(e) => eprintln!("{:?} unavailable: {:#}", browser_type, e),
        }
    }

    eprintln!("Skipping browser test: no WebDriver available");
    None
}

/// Run the wavescan binary with every WAVESCAN_* variable cleared
#[allow(dead_code)]
pub fn run_wavescan(args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_wavescan"));
    for (key, _) in std::env::vars() {
        if key.starts_with("WAVESCAN_") {
            command.env_remove(key);
        }
    }
    command
        .args(args)
        .output()
        .expect("Failed to execute wavescan")
}

/// Parse the single JSON line the binary prints on stdout
#[allow(dead_code)]
pub fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().last().unwrap_or_default();
    serde_json::from_str(line).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({}): {}\nstderr: {}",
            e,
            stdout,
            String::from_utf8_lossy(&output.stderr)
        )
    })
}
