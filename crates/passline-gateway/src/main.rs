use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use passline_gateway::app;
use passline_gateway::orders::EmptyDirectory;
use passline_gateway::ws::health::HealthMonitor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "passline_gateway=info,tower_http=debug".into()),
        )
        .init();

    // load config: PASSLINE_CONFIG env > ~/.passline/passline.toml
    let config_path = std::env::var("PASSLINE_CONFIG").ok();
    let config = passline_core::config::PasslineConfig::load(config_path.as_deref())
        .unwrap_or_else(|e| {
            tracing::warn!("Config load failed ({}), using defaults", e);
            passline_core::config::PasslineConfig::default()
        });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    // A standalone gateway has no order store of its own; the full platform
    // embeds this crate and injects its persistence layer here.
    let state = Arc::new(app::AppState::new(config, Arc::new(EmptyDirectory)));
    let router = app::build_router(state.clone());

    // spawn the liveness sweep in the background
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let monitor = HealthMonitor::new(state.registry.clone());
    tokio::spawn(async move { monitor.run(shutdown_rx).await });

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Passline gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    // signal the monitor to stop
    let _ = shutdown_tx.send(true);
    Ok(())
}
