pub mod middleware;

use crate::config::ServerConfig;
use crate::context::{BufferedResponse, RequestContext};
use crate::dispatch::Dispatcher;
use crate::route::{HttpMethod, MediaType, RouteDefinition, RouteMounter};
use axum::body::{Body, Bytes};
use axum::extract::{Path, Query};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, on, MethodFilter};
use axum::Router;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::debug;

/// Mounts a compiled routing table onto an axum router. The single
/// body-handler registration maps to one request body limit layer applied
/// over the whole router.
pub struct AxumMounter {
    router: Router,
    dispatcher: Arc<Dispatcher>,
    max_body_size: usize,
    body_handler_installed: bool,
}

impl AxumMounter {
    pub fn new(dispatcher: Arc<Dispatcher>, max_body_size: usize) -> Self {
        Self {
            router: Router::new(),
            dispatcher,
            max_body_size,
            body_handler_installed: false,
        }
    }

    pub fn into_router(self) -> Router {
        if self.body_handler_installed {
            self.router
                .layer(RequestBodyLimitLayer::new(self.max_body_size))
        } else {
            self.router
        }
    }
}

impl RouteMounter for AxumMounter {
    fn install_body_handler(&mut self) {
        self.body_handler_installed = true;
    }

    fn mount(&mut self, index: usize, definition: &Arc<RouteDefinition>) {
        let dispatcher = self.dispatcher.clone();
        let def = definition.clone();
        let axum_path = to_axum_path(def.path());
        debug!("mounting {} as {}", def, axum_path);

        let handler = move |Path(params): Path<HashMap<String, String>>,
                            Query(query): Query<Vec<(String, String)>>,
                            headers: HeaderMap,
                            body: Bytes| async move {
            serve_route(dispatcher, index, def, params, query, headers, body)
        };

        self.router = std::mem::take(&mut self.router)
            .route(&axum_path, on(method_filter(definition.method()), handler));
    }
}

/// Builds the axum router serving the dispatcher's routing table, plus a
/// health endpoint.
pub fn build_router(dispatcher: Arc<Dispatcher>, config: &ServerConfig) -> Router {
    let mut mounter = AxumMounter::new(dispatcher.clone(), config.max_body_size);
    dispatcher.table().mount_on(&mut mounter);
    mounter.into_router().route("/health", get(health_check))
}

async fn health_check() -> impl IntoResponse {
    axum::Json(json!({ "status": "healthy" }))
}

/// One matched request, end to end: media-type filters, context assembly,
/// synchronous dispatch into a buffered response.
#[allow(clippy::too_many_arguments)]
fn serve_route(
    dispatcher: Arc<Dispatcher>,
    index: usize,
    def: Arc<RouteDefinition>,
    params: HashMap<String, String>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    if !consumes_match(def.consumes(), content_type) {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    }

    let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok());
    if !produces_match(def.produces(), accept) {
        return StatusCode::NOT_ACCEPTABLE.into_response();
    }

    let body = def.request_has_body().then_some(body);
    let ctx = request_context(params, query, &headers, body);

    let Some(binding) = dispatcher.binding(index) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let mut sink = BufferedResponse::new();
    dispatcher.dispatch(binding, &ctx, &mut sink);
    into_axum_response(sink)
}

fn request_context(
    params: HashMap<String, String>,
    query: Vec<(String, String)>,
    headers: &HeaderMap,
    body: Option<Bytes>,
) -> RequestContext {
    let mut ctx = RequestContext::new();
    for (name, value) in params {
        ctx = ctx.with_path_param(name, value);
    }
    for (name, value) in query {
        ctx = ctx.with_query(name, value);
    }
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            ctx = ctx.with_header(name.as_str(), value);
        }
    }
    if let Some(body) = body {
        ctx = ctx.with_body(body);
    }
    ctx
}

fn into_axum_response(sink: BufferedResponse) -> Response {
    let status =
        StatusCode::from_u16(sink.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    for (name, value) in sink.headers() {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Body::from(sink.into_body()))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Translates `{name}` template segments into axum's `:name` captures.
fn to_axum_path(template: &str) -> String {
    let mut path = String::new();
    for segment in template.split('/').filter(|s| !s.is_empty()) {
        path.push('/');
        match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => {
                path.push(':');
                path.push_str(name);
            }
            None => path.push_str(segment),
        }
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Delete => MethodFilter::DELETE,
        HttpMethod::Head => MethodFilter::HEAD,
        HttpMethod::Options => MethodFilter::OPTIONS,
        HttpMethod::Patch => MethodFilter::PATCH,
    }
}

/// Content-type filter. Requests without a content type pass; declared
/// consumes entries are matched wildcard-aware.
fn consumes_match(consumes: &[MediaType], content_type: Option<&str>) -> bool {
    if consumes.is_empty() {
        return true;
    }
    let Some(raw) = content_type else {
        return true;
    };
    match MediaType::parse(raw) {
        Ok(incoming) => consumes.iter().any(|m| m.matches(&incoming)),
        Err(_) => false,
    }
}

/// Accept filter. Entries the client sent that do not parse are ignored;
/// an absent or empty Accept header passes.
fn produces_match(produces: &[MediaType], accept: Option<&str>) -> bool {
    if produces.is_empty() {
        return true;
    }
    let Some(raw) = accept else {
        return true;
    };
    let accepted: Vec<MediaType> = raw
        .split(',')
        .filter_map(|entry| MediaType::parse(entry).ok())
        .collect();
    if accepted.is_empty() {
        return true;
    }
    produces
        .iter()
        .any(|p| accepted.iter().any(|a| a.matches(p)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(raw: &str) -> MediaType {
        MediaType::parse(raw).unwrap()
    }

    #[test]
    fn test_template_translation() {
        assert_eq!(to_axum_path("/v1/echo/{text}"), "/v1/echo/:text");
        assert_eq!(to_axum_path("/items/{id}/tags/{tag}"), "/items/:id/tags/:tag");
        assert_eq!(to_axum_path("/"), "/");
    }

    #[test]
    fn test_consumes_filter() {
        let consumes = vec![media("application/json")];
        assert!(consumes_match(&consumes, Some("application/json")));
        assert!(consumes_match(&consumes, Some("application/json; charset=utf-8")));
        assert!(!consumes_match(&consumes, Some("text/plain")));
        assert!(consumes_match(&consumes, None));
        assert!(consumes_match(&[], Some("text/plain")));

        let any = vec![media("*/*")];
        assert!(consumes_match(&any, Some("text/plain")));
    }

    #[test]
    fn test_produces_filter() {
        let produces = vec![media("application/json")];
        assert!(produces_match(&produces, None));
        assert!(produces_match(&produces, Some("application/json")));
        assert!(produces_match(&produces, Some("text/html, application/json;q=0.9")));
        assert!(produces_match(&produces, Some("*/*")));
        assert!(!produces_match(&produces, Some("application/xml")));
    }
}
