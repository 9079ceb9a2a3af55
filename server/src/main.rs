//! Genwave Relay server binary.

use genwave_relay::{app, config::Config, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genwave_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Genwave Relay on {}:{}", config.host, config.port);
    if config.api_key.is_none() {
        tracing::warn!("API_KEY not set, publish endpoints accept anonymous requests");
    }

    let addr = config.bind_addr();
    let state = AppState::new(config);
    let conn_manager = state.conn_manager.clone();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
            conn_manager.disconnect_all();
        })
        .await?;

    Ok(())
}
