//! Waits for the injected WAVE library, then runs it.
//!
//! The script registers `window.wave.fn` asynchronously and the host page may
//! still be hydrating, so the run is gated on a probe that checks both.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::ScanError;
use crate::webdriver::PageScripting;

/// Polling and retry budget
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Delay between probes
    pub interval: Duration,
    /// Probes before giving up on the entry point
    pub max_attempts: u32,
    /// Extra initialize/run attempts after the first one throws
    pub init_retries: u32,
    /// Delay after a throwing initialize/run
    pub init_retry_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            max_attempts: 100,
            init_retries: 3,
            init_retry_delay: Duration::from_millis(1000),
        }
    }
}

/// What one probe found in the page
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeState {
    /// `window.wave.fn` is not registered yet
    EntryMissing,
    /// Entry point present but the document is not safe to analyze
    NotReady(String),
    Ready,
}

impl ProbeState {
    pub fn from_value(value: &Value) -> Self {
        if !value["entryPoint"].as_bool().unwrap_or(false) {
            return ProbeState::EntryMissing;
        }
        if value["ready"].as_bool().unwrap_or(false) {
            ProbeState::Ready
        } else {
            let reason = value["reason"].as_str().unwrap_or("document not ready");
            ProbeState::NotReady(reason.to_string())
        }
    }
}

/// Outcome of one initialize-then-run call
#[derive(Debug, Clone, PartialEq)]
pub enum RunAttempt {
    Complete(Value),
    Threw(String),
}

impl RunAttempt {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut map) if map.get("ok").and_then(Value::as_bool) == Some(true) => {
                RunAttempt::Complete(map.remove("result").unwrap_or(Value::Null))
            }
            Value::Object(map) => RunAttempt::Threw(
                map.get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("WAVE run failed without a message")
                    .to_string(),
            ),
            other => RunAttempt::Threw(format!("unexpected run result: {}", other)),
        }
    }
}

const PROBE_SCRIPT: &str = r#"
    const entryPoint = !!(window.wave && window.wave.fn
        && typeof window.wave.fn.initialize === 'function'
        && typeof window.wave.fn.run === 'function');
    if (!entryPoint) return { entryPoint: false, ready: false };
    if (document.readyState !== 'complete') {
        return { entryPoint: true, ready: false, reason: 'readyState is ' + document.readyState };
    }
    if (!document.body || !document.head) {
        return { entryPoint: true, ready: false, reason: 'body or head missing' };
    }
    try {
        window.getComputedStyle(document.body).getPropertyValue('display');
    } catch (e) {
        return { entryPoint: true, ready: false, reason: 'style probe threw: ' + e };
    }
    return { entryPoint: true, ready: true };
"#;

const RUN_SCRIPT: &str = r#"
    const done = arguments[arguments.length - 1];
    const message = function (e) { return String(e && e.message ? e.message : e); };
    try {
        const api = window.wave.fn;
        api.initialize();
        Promise.resolve(api.run()).then(
            function (result) { done({ ok: true, result: result }); },
            function (e) { done({ ok: false, error: message(e) }); }
        );
    } catch (e) {
        done({ ok: false, error: message(e) });
    }
"#;

/// Probe the page once; a failing probe script counts as "not ready"
pub async fn probe<P: PageScripting>(page: &P) -> ProbeState {
    match page.execute(PROBE_SCRIPT, vec![]).await {
        Ok(value) => ProbeState::from_value(&value),
        Err(e) => ProbeState::NotReady(format!("probe failed: {:#}", e)),
    }
}

async fn run_library<P: PageScripting>(page: &P) -> RunAttempt {
    match page.execute_async(RUN_SCRIPT, vec![]).await {
        Ok(value) => RunAttempt::from_value(value),
        Err(e) => RunAttempt::Threw(format!("{:#}", e)),
    }
}

/// Wait for the library and the document, then initialize and run WAVE.
///
/// Returns the raw analysis payload. Fails with
/// [`ScanError::LibraryUnavailable`] when the entry point never shows up
/// within `max_attempts` probes, [`ScanError::Timeout`] when it did but the
/// document never became ready, or [`ScanError::LibraryInit`] once
/// initialize/run has thrown more than `init_retries` times.
pub async fn run_when_ready<P: PageScripting>(
    page: &P,
    settings: &PollSettings,
) -> Result<Value, ScanError> {
    let mut init_failures = 0u32;
    let mut last_error: Option<String> = None;
    // Last reason given by a probe that found the entry point
    let mut not_ready: Option<String> = None;

    for attempt in 1..=settings.max_attempts {
        match probe(page).await {
            ProbeState::EntryMissing => {
                debug!("WAVE entry point not registered yet (attempt {})", attempt);
            }
            ProbeState::NotReady(reason) => {
                debug!("Document not ready for analysis (attempt {}): {}", attempt, reason);
                not_ready = Some(reason);
            }
            ProbeState::Ready => match run_library(page).await {
                RunAttempt::Complete(result) => {
                    info!("WAVE analysis completed after {} probe(s)", attempt);
                    return Ok(result);
                }
                RunAttempt::Threw(message) => {
                    init_failures += 1;
                    warn!(
                        "WAVE initialization failed ({}/{}): {}",
                        init_failures,
                        settings.init_retries + 1,
                        message
                    );
                    if init_failures > settings.init_retries {
                        return Err(ScanError::LibraryInit {
                            attempts: init_failures,
                            message,
                        });
                    }
                    last_error = Some(message);
                    tokio::time::sleep(settings.init_retry_delay).await;
                    continue;
                }
            },
        }

        if attempt < settings.max_attempts {
            tokio::time::sleep(settings.interval).await;
        }
    }

    match (last_error, not_ready) {
        (Some(message), _) => Err(ScanError::LibraryInit {
            attempts: init_failures,
            message,
        }),
        (None, Some(reason)) => Err(ScanError::Timeout(format!(
            "document never became ready for analysis after {} probes ({})",
            settings.max_attempts, reason
        ))),
        (None, None) => Err(ScanError::LibraryUnavailable {
            attempts: settings.max_attempts,
        }),
    }
}

#[cfg(test)]
#[path = "initializer_test.rs"]
mod initializer_test;
