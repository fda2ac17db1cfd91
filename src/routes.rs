use crate::config::HandlerSet;
use crate::download::download_file;
use crate::error::AppError;
use crate::listing::{browse, favicon, home, Pages};
use crate::logger::log_request;
use crate::root::ServedRoot;
use crate::upload::upload_file;
use axum::{
    extract::DefaultBodyLimit,
    handler::HandlerWithoutStateExt,
    middleware,
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{services::ServeDir, timeout::TimeoutLayer};

pub fn router(
    handlers: HandlerSet,
    root: ServedRoot,
    timeout: Option<Duration>,
) -> Result<Router, AppError> {
    let pages = Arc::new(Pages::load()?);
    let mut app = match handlers {
        HandlerSet::Basic => basic_router(root, pages),
        HandlerSet::Extended => extended_router(root, pages),
    };

    if let Some(timeout) = timeout {
        app = app.layer(TimeoutLayer::new(timeout));
    }

    Ok(app.layer(middleware::from_fn(log_request)))
}

/// Static file server over the served root. Directories without an
/// `index.html` get a generated listing.
pub fn basic_router(root: ServedRoot, pages: Arc<Pages>) -> Router {
    let files = ServeDir::new(root.path()).fallback(browse.into_service());
    Router::new()
        .fallback_service(files)
        .layer(Extension(root))
        .layer(Extension(pages))
}

/// Listing page, upload and download endpoints.
pub fn extended_router(root: ServedRoot, pages: Arc<Pages>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/favicon.ico", get(favicon))
        .route(
            "/uploadFile",
            post(upload_file).layer(DefaultBodyLimit::disable()),
        )
        .route("/downloadFile", get(download_file))
        .layer(Extension(root))
        .layer(Extension(pages))
}
