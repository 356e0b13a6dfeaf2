use tracing::{info, warn};

use wavescan::config::ScanArgs;
use wavescan::errors::ScanError;
use wavescan::login::{self, LoginConfig};
use wavescan::scanner;
use wavescan::webdriver::{Browser, BrowserOptions};

/// Everything a browser-driving command needs before the browser starts
pub struct ScanSetup {
    pub wave_source: String,
    pub browser: BrowserOptions,
    pub login: Option<LoginConfig>,
}

/// Validate configuration so a bad setup fails before any browser is launched
pub fn prepare(args: &ScanArgs) -> Result<ScanSetup, ScanError> {
    let wave_source = scanner::load_wave_script(args.wave_script_path()?)?;
    Ok(ScanSetup {
        wave_source,
        browser: args.browser_options()?,
        login: args.login.login_config()?,
    })
}

pub async fn start_browser(options: &BrowserOptions) -> Result<Browser, ScanError> {
    let browser = Browser::new(options)
        .await
        .map_err(|e| ScanError::WebDriver(format!("{:#}", e)))?;
    info!("Browser ready ({:?})", browser.browser_type());
    Ok(browser)
}

pub async fn login_if_configured(
    browser: &Browser,
    login: Option<&LoginConfig>,
) -> Result<(), ScanError> {
    match login {
        Some(login) => login::perform_login(browser, login).await,
        None => Ok(()),
    }
}

/// Close the session; failures are only logged
pub async fn close_browser(browser: Browser) {
    if let Err(e) = browser.close().await {
        warn!("Failed to close browser: {:#}", e);
    }
}
