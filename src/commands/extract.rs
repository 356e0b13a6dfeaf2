use anyhow::Result;
use std::path::PathBuf;

use wavescan::extract::{self, ExtractOptions};

pub async fn handle_extract(
    dir: PathBuf,
    output: String,
    exclude: Option<Vec<String>>,
) -> Result<()> {
    let mut options = ExtractOptions {
        output_name: output,
        ..Default::default()
    };
    if let Some(terms) = exclude {
        options.exclude_terms = terms;
    }

    let summary = extract::extract_violations(&dir, &options)?;
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
