use anyhow::Result;
use serde_json::{Value, json};

pub(crate) fn version_json() -> Value {
    json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "authors": env!("CARGO_PKG_AUTHORS"),
        "engine": wavescan::report::ENGINE_NAME,
    })
}

pub async fn handle_version() -> Result<()> {
    println!("{}", serde_json::to_string(&version_json())?);
    Ok(())
}
