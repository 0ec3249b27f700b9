use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use blockfront_server::build_app;
use blockfront_server::config::ServerConfig;
use blockfront_server::health::probe_compatible_instance;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("BLOCKFRONT_LOG_FORMAT").is_ok_and(|v| v == "json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = ServerConfig::load();
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return ExitCode::FAILURE;
    }

    let port = config.port;
    let addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            if probe_compatible_instance(&format!("http://127.0.0.1:{port}")).await {
                tracing::info!(port, "Blockfront is already running on this port, exiting");
                return ExitCode::SUCCESS;
            }
            tracing::error!(port, "Port is in use by another process");
            return ExitCode::FAILURE;
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to bind to {addr}");
            return ExitCode::FAILURE;
        },
    };

    let origins = config.allowed_origins.join(",");
    let (app, _state) = build_app(config);
    tracing::info!(%origins, "Blockfront server listening on {addr}");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }
    tracing::info!("Server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
