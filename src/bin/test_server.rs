// Fixture site for manual runs: cargo run --features test-server --bin test-server [PORT]

use std::net::SocketAddr;
use tracing::info;

// Include the shared test server module
include!("../../tests/test_server_app.rs");

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let port: u16 = std::env::args()
        .nth(1)
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Fixture site listening on http://{}", addr);
    info!("Pages: /, /images, /contrast, /clean, /login, /dashboard, /slow");

    if let Err(e) = axum::serve(listener, create_app().await).await {
        eprintln!("Server failed: {}", e);
        std::process::exit(1);
    }
}
