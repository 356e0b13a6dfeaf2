// Unit tests for the polling initializer

use super::*;
use anyhow::Result;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Page that answers probes and runs from scripted queues.
/// An exhausted probe queue keeps answering with its last entry.
struct ScriptedPage {
    probes: Mutex<VecDeque<Value>>,
    runs: Mutex<VecDeque<Result<Value, String>>>,
    probe_calls: Mutex<u32>,
    run_calls: Mutex<u32>,
}

impl ScriptedPage {
    fn new(probes: Vec<Value>, runs: Vec<Result<Value, String>>) -> Self {
        Self {
            probes: Mutex::new(probes.into()),
            runs: Mutex::new(runs.into()),
            probe_calls: Mutex::new(0),
            run_calls: Mutex::new(0),
        }
    }

    fn probe_calls(&self) -> u32 {
        *self.probe_calls.lock().unwrap()
    }

    fn run_calls(&self) -> u32 {
        *self.run_calls.lock().unwrap()
    }
}

impl PageScripting for ScriptedPage {
    async fn execute(&self, _script: &str, _args: Vec<Value>) -> Result<Value> {
        *self.probe_calls.lock().unwrap() += 1;
        let mut probes = self.probes.lock().unwrap();
        if probes.len() > 1 {
            Ok(probes.pop_front().unwrap())
        } else {
            Ok(probes.front().cloned().unwrap_or(Value::Null))
        }
    }

    async fn execute_async(&self, _script: &str, _args: Vec<Value>) -> Result<Value> {
        *self.run_calls.lock().unwrap() += 1;
        match self.runs.lock().unwrap().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(json!({"ok": false, "error": "no scripted run left"})),
        }
    }
}

fn fast_settings() -> PollSettings {
    PollSettings {
        interval: Duration::ZERO,
        max_attempts: 10,
        init_retries: 2,
        init_retry_delay: Duration::ZERO,
    }
}

fn missing() -> Value {
    json!({"entryPoint": false, "ready": false})
}

fn hydrating() -> Value {
    json!({"entryPoint": true, "ready": false, "reason": "readyState is interactive"})
}

fn ready() -> Value {
    json!({"entryPoint": true, "ready": true})
}

#[test]
fn test_probe_state_from_value() {
    assert_eq!(ProbeState::from_value(&missing()), ProbeState::EntryMissing);
    assert_eq!(ProbeState::from_value(&Value::Null), ProbeState::EntryMissing);
    assert_eq!(
        ProbeState::from_value(&hydrating()),
        ProbeState::NotReady("readyState is interactive".to_string())
    );
    assert_eq!(ProbeState::from_value(&ready()), ProbeState::Ready);
}

#[test]
fn test_run_attempt_from_value() {
    assert_eq!(
        RunAttempt::from_value(json!({"ok": true, "result": {"categories": {}}})),
        RunAttempt::Complete(json!({"categories": {}}))
    );
    assert_eq!(
        RunAttempt::from_value(json!({"ok": false, "error": "wave is not initialized"})),
        RunAttempt::Threw("wave is not initialized".to_string())
    );
    assert!(matches!(
        RunAttempt::from_value(json!(42)),
        RunAttempt::Threw(_)
    ));
}

#[tokio::test]
async fn test_waits_for_entry_point_then_runs() {
    let page = ScriptedPage::new(
        vec![missing(), missing(), hydrating(), ready()],
        vec![Ok(json!({"ok": true, "result": {"categories": {"error": {}}}}))],
    );

    let result = run_when_ready(&page, &fast_settings()).await.unwrap();

    assert_eq!(result, json!({"categories": {"error": {}}}));
    assert_eq!(page.probe_calls(), 4);
    assert_eq!(page.run_calls(), 1);
}

#[tokio::test]
async fn test_exhausted_attempts_report_unavailable() {
    let page = ScriptedPage::new(vec![missing()], vec![]);

    let err = run_when_ready(&page, &fast_settings()).await.unwrap_err();

    assert!(matches!(err, ScanError::LibraryUnavailable { attempts: 10 }));
    assert_eq!(err.exit_code(), 6);
    assert_eq!(page.probe_calls(), 10);
    assert_eq!(page.run_calls(), 0);
}

#[tokio::test]
async fn test_init_failure_is_retried_then_succeeds() {
    let page = ScriptedPage::new(
        vec![ready()],
        vec![
            Ok(json!({"ok": false, "error": "Cannot read properties of undefined"})),
            Err("script timeout".to_string()),
            Ok(json!({"ok": true, "result": {"categories": {}}})),
        ],
    );

    let result = run_when_ready(&page, &fast_settings()).await.unwrap();

    assert_eq!(result, json!({"categories": {}}));
    assert_eq!(page.run_calls(), 3);
}

#[tokio::test]
async fn test_repeated_init_failure_is_terminal() {
    let failure = || Ok(json!({"ok": false, "error": "initialize threw"}));
    let page = ScriptedPage::new(vec![ready()], vec![failure(), failure(), failure(), failure()]);

    let err = run_when_ready(&page, &fast_settings()).await.unwrap_err();

    match err {
        ScanError::LibraryInit { attempts, message } => {
            assert_eq!(attempts, 3);
            assert_eq!(message, "initialize threw");
        }
        other => panic!("expected LibraryInit, got {:?}", other),
    }
    // No further runs after the retry budget is spent
    assert_eq!(page.run_calls(), 3);
}

#[tokio::test]
async fn test_document_that_never_settles_times_out() {
    let page = ScriptedPage::new(vec![hydrating()], vec![]);

    let err = run_when_ready(&page, &fast_settings()).await.unwrap_err();

    match &err {
        ScanError::Timeout(message) => {
            assert!(message.contains("never became ready"));
            assert!(message.contains("readyState is interactive"));
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert_eq!(err.kind(), "timeout");
    assert_eq!(err.exit_code(), 5);
    assert_eq!(page.probe_calls(), 10);
    assert_eq!(page.run_calls(), 0);
}

#[tokio::test]
async fn test_entry_point_that_disappears_still_counts_as_not_ready() {
    let page = ScriptedPage::new(vec![hydrating(), missing()], vec![]);

    let err = run_when_ready(&page, &fast_settings()).await.unwrap_err();

    assert!(matches!(err, ScanError::Timeout(_)));
}
