use anyhow::{Context, Result};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::webdriver::BrowserType;

/// Starts and tracks the WebDriver processes (geckodriver, chromedriver)
/// launched by this run
pub struct WebDriverManager {
    processes: Arc<Mutex<Vec<DriverProcess>>>,
}

struct DriverProcess {
    browser_type: BrowserType,
    child: Child,
    port: u16,
    url: String,
    #[cfg(unix)]
    process_group_id: Option<i32>,
}

impl Default for WebDriverManager {
    fn default() -> Self {
        Self {
            processes: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl WebDriverManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the URL of a working driver for `browser_type`, starting one
    /// when neither a managed nor an external driver answers
    pub async fn ensure_driver(&self, browser_type: &BrowserType) -> Result<String> {
        let managed_urls: Vec<String> = self
            .lock()
            .iter()
            .filter(|p| p.browser_type == *browser_type)
            .map(|p| p.url.clone())
            .collect();

        for url in managed_urls {
            if Self::verify_driver_working(&url).await {
                debug!("Using managed WebDriver at {}", url);
                return Ok(url);
            }
        }

        // CI images often run the driver as a service on its standard port
        let standard_url = format!("http://localhost:{}", Self::standard_port(browser_type));
        if Self::is_driver_running(&standard_url).await
            && Self::verify_driver_working(&standard_url).await
        {
            debug!("Found external WebDriver at {}", standard_url);
            return Ok(standard_url);
        }

        info!("WebDriver not detected, attempting to start automatically...");
        self.start_driver(browser_type).await
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DriverProcess>> {
        // A poisoned list is still a valid list of children to clean up
        self.processes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn standard_port(browser_type: &BrowserType) -> u16 {
        match browser_type {
            BrowserType::Firefox => 4444,
            BrowserType::Chrome => 9515,
        }
    }

    async fn start_driver(&self, browser_type: &BrowserType) -> Result<String> {
        let command = browser_type.driver_name();
        let port = Self::find_free_port_for_browser(browser_type)?;
        let args = match browser_type {
            BrowserType::Firefox => vec!["--port".to_string(), port.to_string()],
            BrowserType::Chrome => vec![format!("--port={}", port)],
        };
        info!("Starting {} on port {}", command, port);

        if !Self::command_exists(command) {
            anyhow::bail!(
                "{} not found in PATH. Install it or start it yourself:\n\
                  macOS: brew install {}\n\
                  Linux: download from the official releases\n\
                  CI: use a runner image that ships {}",
                command,
                command,
                command
            );
        }

        let mut cmd = Command::new(command);
        cmd.args(&args).stdout(Stdio::null()).stderr(Stdio::null());

        // Own process group so the driver and its browsers die together
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {}", command))?;

        #[cfg(unix)]
        let process_group_id = Some(child.id() as i32);

        let url = format!("http://localhost:{}", port);
        self.lock().push(DriverProcess {
            browser_type: *browser_type,
            child,
            port,
            url: url.clone(),
            #[cfg(unix)]
            process_group_id,
        });

        // 3 seconds total
        let max_attempts = 30;
        for attempt in 1..=max_attempts {
            if Self::is_driver_running(&url).await {
                info!("WebDriver started successfully on port {}", port);
                return Ok(url);
            }
            if attempt < max_attempts {
                sleep(Duration::from_millis(100)).await;
            }
        }

        self.remove_port(port);
        anyhow::bail!("WebDriver {} failed to start within timeout", command)
    }

    /// Check if a command exists in PATH
    pub fn command_exists(command: &str) -> bool {
        #[cfg(unix)]
        let finder = "which";
        #[cfg(windows)]
        let finder = "where";

        Command::new(finder)
            .arg(command)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Prefer the browser's usual ports, then let the OS pick one
    pub fn find_free_port_for_browser(browser_type: &BrowserType) -> Result<u16> {
        let first = Self::standard_port(browser_type);
        for port in first..first + 3 {
            if !Self::is_port_in_use(port) {
                debug!("Found free port {} for {:?}", port, browser_type);
                return Ok(port);
            }
        }

        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        drop(listener);
        Ok(port)
    }

    pub fn is_port_in_use(port: u16) -> bool {
        std::net::TcpListener::bind(("127.0.0.1", port)).is_err()
    }

    /// Check if WebDriver answers its status endpoint
    pub async fn is_driver_running(url: &str) -> bool {
        let status_url = format!("{}/status", url);

        match reqwest::Client::new()
            .get(&status_url)
            .timeout(Duration::from_secs(1))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// A working driver reports `value.ready == true`
    async fn verify_driver_working(url: &str) -> bool {
        let status_url = format!("{}/status", url);

        let Ok(response) = reqwest::Client::new()
            .get(&status_url)
            .timeout(Duration::from_secs(1))
            .send()
            .await
        else {
            return false;
        };

        response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.pointer("/value/ready").and_then(|r| r.as_bool()))
            .unwrap_or(false)
    }

    /// Kill the managed drivers for a browser type, used to recover from a
    /// driver stuck with a stale session
    pub fn kill_driver(&self, browser_type: &BrowserType) {
        let mut processes = self.lock();
        let (doomed, kept): (Vec<_>, Vec<_>) = processes
            .drain(..)
            .partition(|p| p.browser_type == *browser_type);
        *processes = kept;
        drop(processes);

        for process in doomed {
            Self::terminate(process);
        }
    }

    fn remove_port(&self, port: u16) {
        let mut processes = self.lock();
        if let Some(index) = processes.iter().position(|p| p.port == port) {
            let process = processes.remove(index);
            drop(processes);
            warn!("Cleaning up WebDriver that never answered on port {}", port);
            Self::terminate(process);
        }
    }

    fn terminate(mut process: DriverProcess) {
        debug!("Stopping WebDriver on port {}", process.port);

        #[cfg(unix)]
        if let Some(pgid) = process.process_group_id {
            Self::kill_process_group(pgid);
        }

        let _ = process.child.kill();
        let _ = process.child.wait();
    }

    /// SIGTERM, short grace period, then SIGKILL for the whole group
    #[cfg(unix)]
    fn kill_process_group(pgid: i32) {
        if let Err(e) = Command::new("kill")
            .args(["-TERM", &format!("-{}", pgid)])
            .output()
        {
            debug!("Failed to send SIGTERM to process group {}: {}", pgid, e);
        }

        std::thread::sleep(Duration::from_millis(100));

        if let Err(e) = Command::new("kill")
            .args(["-KILL", &format!("-{}", pgid)])
            .output()
        {
            debug!("Failed to send SIGKILL to process group {}: {}", pgid, e);
        }
    }

    /// Stop all managed WebDriver processes
    pub fn stop_all(&self) {
        let processes: Vec<DriverProcess> = self.lock().drain(..).collect();
        for process in processes {
            Self::terminate(process);
        }
    }

    pub fn managed_count(&self) -> usize {
        self.lock().len()
    }
}

impl Drop for WebDriverManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

// Global WebDriver manager instance
lazy_static::lazy_static! {
    pub static ref GLOBAL_WEBDRIVER_MANAGER: WebDriverManager = WebDriverManager::new();
}

#[cfg(test)]
#[path = "webdriver_manager_test.rs"]
mod webdriver_manager_test;
