use anyhow::Result;
use rest_router::config::ServerConfig;
use rest_router::dispatch::Dispatcher;
use rest_router::route::{compile, Endpoint, ParameterSpec, RestApi, TargetType};
use rest_router::server;
use rest_router::writer::{Reply, ReturnValue, WriterRegistry};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Versioned echo resource, mounted under /v1.
struct EchoApiV1;

impl RestApi for EchoApiV1 {
    fn application_path(&self) -> Option<&str> {
        Some("/v1")
    }

    fn resource_path(&self) -> &str {
        "/application"
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![Endpoint::get("/echo/{text}")
            .param(ParameterSpec::path("text", TargetType::String))
            .handler(|args| {
                let text = args.first().and_then(|a| a.as_str()).unwrap_or_default();
                Ok(ReturnValue::text(text))
            })]
    }
}

/// Same resource shape as v1, mounted under /v2 with its own behavior.
struct EchoApiV2;

impl RestApi for EchoApiV2 {
    fn application_path(&self) -> Option<&str> {
        Some("/v2")
    }

    fn resource_path(&self) -> &str {
        "/application"
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![Endpoint::get("/echo/{text}")
            .param(ParameterSpec::path("text", TargetType::String))
            .handler(|args| {
                let text = args.first().and_then(|a| a.as_str()).unwrap_or_default();
                Ok(ReturnValue::text(format!("2{text}")))
            })]
    }
}

struct StatusApi;

impl RestApi for StatusApi {
    fn resource_path(&self) -> &str {
        "/status"
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![
            Endpoint::get("/info")
                .produces("application/json")
                .handler(|_| {
                    ReturnValue::json(&serde_json::json!({
                        "name": "rest-router",
                        "ok": true,
                    }))
                }),
            Endpoint::get("/{code}")
                .param(ParameterSpec::path("code", TargetType::Int))
                .handler(|args| {
                    let code = args.first().and_then(|a| a.as_i64()).unwrap_or(200);
                    let code = u16::try_from(code).unwrap_or(500);
                    Ok(Reply::status(code).body(format!("status {code}")).into_return())
                }),
        ]
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rest_router=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting rest-router demo server");

    // Load configuration
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        info!("Loading configuration from: {}", config_path);
        ServerConfig::from_yaml_file(&config_path)?
    } else {
        info!("No configuration file at {}, using defaults", config_path);
        ServerConfig::default()
    };

    // Writers may be registered here, before the dispatcher seals the registry
    let registry = WriterRegistry::new();

    // Compile the routing table once, at startup
    let table = compile(&[&EchoApiV1, &EchoApiV2, &StatusApi])?;
    info!("Compiled routing table: {} routes", table.len());

    let dispatcher = Arc::new(Dispatcher::new(table, registry));

    // Build router
    let mut app = server::build_router(dispatcher, &config);

    // Apply logging middleware
    app = app.layer(axum::middleware::from_fn(
        server::middleware::create_logging_middleware(config.logging.clone()),
    ));

    // Apply core middlewares
    app = app
        .layer(axum::middleware::from_fn(
            server::middleware::request_id_middleware,
        ))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeout)))
        .layer(TraceLayer::new_for_http());

    let bind_addr = config.bind_addr();
    info!("Starting server on {}", bind_addr);

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped gracefully");
    Ok(())
}

/// Handle shutdown signals for graceful termination
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully");
        },
    }
}
