//! Multi-client HTTP variant of the MCP tool server:
//! serves the same tool registration as `bin/mcp-stdio.rs` over streamed
//! HTTP instead of stdin/stdout. Grounded on the existing `main.rs`
//! (port resolution via `--port`/env, `axum` router, graceful shutdown on
//! SIGTERM/SIGINT), trimmed of the existing LanceDB memory / proxy-manager /
//! chat-completion routes, which have no counterpart in this spec.

use axum::{extract::State, response::Json, routing::get, routing::post, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use pulse_crawl::mcp::http::{call_tool, list_tools, metrics_json, metrics_text};
use pulse_crawl::{AppConfig, AppState};

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("starting pulse-crawl MCP HTTP server");

    let config = AppConfig::load();
    let port = parse_port_from_args().unwrap_or(config.port);
    let production = config.production;
    let allowed_origins = config.allowed_origins.clone();

    // Startup health check: building AppState provisions every process-wide
    // singleton (strategy engine, cache backend, extractor, learned store)
    // before any traffic is accepted. A failure here is a configuration
    // error, not a runtime one — exit non-zero rather than serve broken.
    let state = match AppState::new(config).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("startup health check failed: {e}");
            std::process::exit(1);
        }
    };

    let cors = if production && !allowed_origins.is_empty() {
        let origins: Vec<axum::http::HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(tower_http::cors::AllowOrigin::list(origins))
    } else {
        if production {
            warn!("PRODUCTION=true but no ALLOWED_ORIGINS configured; falling back to permissive CORS");
        }
        CorsLayer::permissive()
    };

    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/mcp/tools", get(list_tools))
        .route("/mcp/call", post(call_tool))
        .route("/metrics", get(metrics_json))
        .route("/metrics.txt", get(metrics_text))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "address already in use: {bind_addr}. Stop the existing process or pass --port {} (or set PORT/PULSE_CRAWL_PORT).",
                port.saturating_add(1)
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("pulse-crawl listening on http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("pulse-crawl shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();
        let mut sigint = signal(SignalKind::interrupt()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
            _ = async {
                if let Some(ref mut s) = sigint {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "pulse-crawl",
        "version": env!("CARGO_PKG_VERSION"),
        "extractorEnabled": state.extractor.is_some(),
    }))
}
