use anyhow::Result;
use serde_json::{Value, json};
use tracing::info;

use crate::commands::utils;
use wavescan::batch::{self, BatchRun};
use wavescan::config::BatchArgs;
use wavescan::scanner::WaveScanner;

/// Analyze every configured URL; failed pages do not fail the command
pub async fn handle_batch(args: BatchArgs) -> Result<()> {
    let urls = args.resolve_urls()?;
    let utils::ScanSetup {
        wave_source,
        browser: options,
        login,
    } = utils::prepare(&args.scan)?;
    let config = args.batch_config();
    info!("Batch of {} URL(s)", urls.len());

    let browser = utils::start_browser(&options).await?;
    let result = async {
        utils::login_if_configured(&browser, login.as_ref()).await?;
        let scanner = WaveScanner::new(&browser, wave_source, args.scan.scan_settings());
        Ok::<_, anyhow::Error>(batch::run_batch(&scanner, &urls, &config).await)
    }
    .await;
    utils::close_browser(browser).await;

    let run = result?;
    println!("{}", serde_json::to_string(&batch_result_json(&run))?);
    Ok(())
}

pub(crate) fn batch_result_json(run: &BatchRun) -> Value {
    let summary = &run.summary;
    json!({
        "run_id": summary.run_id,
        "total": summary.total,
        "successful": summary.successful,
        "failed": summary.failed,
        "success_rate": summary.success_rate,
        "failed_urls": summary
            .outcomes
            .iter()
            .filter(|o| o.status == batch::OutcomeStatus::Failed)
            .map(|o| o.url.as_str())
            .collect::<Vec<_>>(),
        "summary_file": run.summary_path,
    })
}
