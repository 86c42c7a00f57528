use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use anyhow::anyhow;

use converse::{ServerConfig, routes, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?;
    let address = config.address();
    println!("Starting server on {address}");

    // Upload directory must exist before the first multipart request
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let cors = build_cors(&config.allow_origins)?;

    // Create application state
    let app_state = AppState::new(config);

    // Combine REST and WebSocket routes
    let app = routes::create_api_router()
        .merge(routes::create_ws_router())
        .layer(cors)
        .with_state(app_state);

    // Create listener
    let listener = TcpListener::bind(&address).await?;

    println!("Server listening on {address}");

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the CORS layer from the ALLOW_ORIGINS setting: `*` opens the
/// server to any origin, otherwise a comma-separated allow list.
fn build_cors(allow_origins: &str) -> anyhow::Result<CorsLayer> {
    if allow_origins.trim() == "*" {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }

    let origins = allow_origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|e| anyhow!("Invalid origin '{origin}': {e}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any))
}
