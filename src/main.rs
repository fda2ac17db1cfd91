use clap::Parser;
use file_sharer::{resolve, router, AppError, Config, ServedRoot};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_logging();

    let config = Config::parse();
    let root = ServedRoot::resolve(&config.root)?;
    let target = resolve(config.bind_mode(), config.port)?;

    info!(root = %root.path().display(), mode = ?config.handler_set(), "serving directory");
    for url in &target.urls {
        info!("listening on: {}", url);
    }

    let app = router(config.handler_set(), root, config.request_timeout())?;
    let listener = TcpListener::bind(target.addr)
        .await
        .map_err(|e| AppError::Bind {
            addr: target.addr.to_string(),
            source: e,
        })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Serve)?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=info,tower_http=info", env!("CARGO_CRATE_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(err = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
