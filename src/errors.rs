use thiserror::Error;

/// Error type for a scan, carrying the process exit code it maps to
#[derive(Debug, Error)]
pub enum ScanError {
    /// Missing or invalid configuration (exit code 2)
    #[error("Configuration error: {0}")]
    Config(String),
    /// WebDriver connection failed (exit code 4)
    #[error("WebDriver connection failed: {0}")]
    WebDriver(String),
    /// Page failed to load (exit code 5)
    #[error("Navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },
    /// Operation timeout (exit code 5)
    #[error("Operation timed out: {0}")]
    Timeout(String),
    /// The injected library never registered its entry point (exit code 6)
    #[error("WAVE library unavailable after {attempts} polling attempts")]
    LibraryUnavailable { attempts: u32 },
    /// The library was present but initialization or run kept throwing (exit code 6)
    #[error("WAVE initialization failed after {attempts} attempts: {message}")]
    LibraryInit { attempts: u32, message: String },
    /// The analysis result could not be interpreted (exit code 1)
    #[error("Unexpected WAVE payload: {0}")]
    Payload(String),
    /// Output could not be written (exit code 7)
    #[error("Failed to write {path}: {message}")]
    Persistence { path: String, message: String },
    /// Generic error (exit code 1)
    #[error("{0}")]
    Other(anyhow::Error),
}

impl ScanError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ScanError::Config(_) => 2,
            ScanError::WebDriver(_) => 4,
            ScanError::Navigation { .. } | ScanError::Timeout(_) => 5,
            ScanError::LibraryUnavailable { .. } | ScanError::LibraryInit { .. } => 6,
            ScanError::Persistence { .. } => 7,
            ScanError::Payload(_) | ScanError::Other(_) => 1,
        }
    }

    /// Short machine-readable kind, used in error reports
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::Config(_) => "config",
            ScanError::WebDriver(_) => "webdriver",
            ScanError::Navigation { .. } => "navigation",
            ScanError::Timeout(_) => "timeout",
            ScanError::LibraryUnavailable { .. } => "library_unavailable",
            ScanError::LibraryInit { .. } => "library_init",
            ScanError::Payload(_) => "payload",
            ScanError::Persistence { .. } => "persistence",
            ScanError::Other(_) => "other",
        }
    }
}

impl From<anyhow::Error> for ScanError {
    fn from(err: anyhow::Error) -> Self {
        // Keep typed errors that were wrapped into anyhow along the way
        let err = match err.downcast::<ScanError>() {
            Ok(scan_err) => return scan_err,
            Err(err) => err,
        };

        let msg = err.to_string();
        if msg.contains("Failed to connect to WebDriver")
            || msg.contains("WebDriver")
            || msg.contains("geckodriver")
            || msg.contains("chromedriver")
        {
            ScanError::WebDriver(format!("{:#}", err))
        } else if msg.contains("timeout") || msg.contains("timed out") {
            ScanError::Timeout(format!("{:#}", err))
        } else {
            ScanError::Other(err)
        }
    }
}
