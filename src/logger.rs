use axum::{extract::Request, middleware::Next, response::Response};
use tracing::info;

/// Logs method and URI once the wrapped handler has produced a response.
pub async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    info!(%method, %uri, status = response.status().as_u16(), "request completed");
    response
}
