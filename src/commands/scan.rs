use anyhow::Result;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::commands::utils;
use wavescan::config::ScanCommandArgs;
use wavescan::errors::ScanError;
use wavescan::report::{self, ErrorReport, PageReport, ReportPaths};
use wavescan::scanner::WaveScanner;

pub async fn handle_scan(args: ScanCommandArgs) -> Result<()> {
    let url = args.resolve_url()?;
    let utils::ScanSetup {
        wave_source,
        browser: options,
        login,
    } = utils::prepare(&args.scan)?;
    info!("Analyzing {}", url);

    let browser = utils::start_browser(&options).await?;
    let result = async {
        utils::login_if_configured(&browser, login.as_ref()).await?;
        WaveScanner::new(&browser, wave_source, args.scan.scan_settings())
            .scan(&url)
            .await
    }
    .await;
    utils::close_browser(browser).await;

    let output_dir = &args.scan.output_dir;
    match result {
        Ok(page) => {
            let paths = report::write_page_report(output_dir, &page)?;
            println!("{}", serde_json::to_string(&scan_result_json(&page, &paths))?);
            Ok(())
        }
        Err(e) => {
            // Configuration problems are not about the page
            if !matches!(e, ScanError::Config(_))
                && let Err(write_err) =
                    report::write_error_report(output_dir, &ErrorReport::new(&url, &e, 1))
            {
                warn!("Could not save error report: {}", write_err);
            }
            Err(e.into())
        }
    }
}

pub(crate) fn scan_result_json(page: &PageReport, paths: &ReportPaths) -> Value {
    let summary = page.summary();
    json!({
        "url": page.metadata.url,
        "status": "success",
        "total_rows": summary.total_rows,
        "counts": summary.counts,
        "csv_report": paths.csv,
        "json_report": paths.json,
    })
}
