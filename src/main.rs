#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wavescan::config::{BatchArgs, ScanCommandArgs};
use wavescan::errors::ScanError;
use wavescan::extract::DEFAULT_OUTPUT_NAME;
use wavescan::webdriver_manager::GLOBAL_WEBDRIVER_MANAGER;

mod commands;

const EXIT_SUCCESS: i32 = 0;

#[derive(Parser)]
#[command(name = "wavescan")]
#[command(about = "Audit web pages with the WAVE accessibility engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one page and write its CSV and JSON reports
    Scan(ScanCommandArgs),

    /// Analyze many pages in sequence and write a batch summary
    Batch(BatchArgs),

    /// Merge the CSV reports of a results directory into one file
    Extract {
        /// Directory holding the reports
        #[arg(env = "WAVESCAN_OUTPUT_DIR", default_value = "results")]
        dir: PathBuf,

        /// Name of the merged file, written inside the directory
        #[arg(long, default_value = DEFAULT_OUTPUT_NAME)]
        output: String,

        /// Drop rows whose rule id contains all of these terms
        /// (default: nested,interactive)
        #[arg(long, value_delimiter = ',')]
        exclude: Option<Vec<String>>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let result = run().await;

    // Always clean up WebDriver processes before exiting
    GLOBAL_WEBDRIVER_MANAGER.stop_all();

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(err) => {
            let scan_err: ScanError = err.into();

            // Output JSON error to stdout for programmatic consumption
            let error_json = json!({
                "error": true,
                "kind": scan_err.kind(),
                "message": scan_err.to_string(),
                "exit_code": scan_err.exit_code()
            });
            println!(
                "{}",
                serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
            );

            // Also log to stderr for human reading
            eprintln!("Error: {}", scan_err);
            std::process::exit(scan_err.exit_code());
        }
    }
}

async fn run() -> Result<()> {
    // Initialize tracing to stderr (so JSON output to stdout remains clean)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wavescan=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => commands::scan::handle_scan(args).await,
        Commands::Batch(args) => commands::batch::handle_batch(args).await,
        Commands::Extract {
            dir,
            output,
            exclude,
        } => commands::extract::handle_extract(dir, output, exclude).await,
        Commands::Version => commands::version::handle_version().await,
    }
}
