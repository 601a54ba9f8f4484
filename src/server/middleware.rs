use crate::config::LoggingConfig;
use axum::extract::Request;
use axum::http::{header::HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Propagates an inbound request ID or mints a fresh one, and echoes it on
/// the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = match request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        Some(id) => id.to_string(),
        None => Uuid::new_v4().to_string(),
    };

    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}

async fn access_log(config: Arc<LoggingConfig>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<String>()
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());

    info!(request_id = %request_id, method = %method, uri = %uri, "request received");
    if config.log_headers {
        debug!(request_id = %request_id, headers = ?request.headers(), "request headers");
    }

    let response = next.run(request).await;

    info!(
        request_id = %request_id,
        status = response.status().as_u16(),
        "request completed"
    );
    response
}

/// Access-log middleware driven by the logging configuration.
pub fn create_logging_middleware(
    config: LoggingConfig,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Response> + Send>>
       + Clone {
    let config = Arc::new(config);
    move |request: Request, next: Next| {
        let config = config.clone();
        Box::pin(async move { access_log(config, request, next).await })
    }
}
