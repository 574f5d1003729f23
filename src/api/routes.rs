//! API Routes
//!
//! GET-only endpoints, optionally mounted under a base path:
//! - `/peers`, `/peers.txt`: signed (or plain-text) peer seeds
//! - `/lookup?<addr>`: crawler status of one address
//! - `/recrawls`: pending recrawl queue snapshot
//! - `/force?<addr>`: queue an immediate connection attempt
//! - `/health`, `/metrics`, `/metrics/json`: monitoring
//!
//! Every response closes the connection. Errors are empty-bodied.

use axum::{
    extract::{ConnectInfo, OriginalUri, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Json, Router,
};
use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info};

use super::encoder::{EncodedSeeds, SeedEncoder, SeedFormat};
use super::error::{method_not_allowed, ApiError};
use super::query::{parse_address_param, PeersQuery};
use super::selector::select_peers;
use super::Metrics;
use crate::config::SeedServerConfig;
use crate::crawler::Crawler;

/// Shared API state
pub struct ApiState {
    pub config: Arc<SeedServerConfig>,
    pub crawler: Arc<dyn Crawler>,
    pub encoder: SeedEncoder,
    pub metrics: Arc<Metrics>,
}

/// Run the HTTP API server until `shutdown` resolves
pub async fn run_api_server(
    state: Arc<ApiState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = SocketAddr::new(state.config.bind_address, state.config.api_port);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 Peer seed API listening on {}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Routes plus the layers every response goes through
pub fn build_router(state: Arc<ApiState>) -> Router {
    let base_path = state.config.base_path.clone();
    let metrics = state.metrics.clone();

    let routes = Router::new()
        // Seeds
        .route("/peers", get_only(get(get_peers)))
        .route("/peers.txt", get_only(get(get_peers)))

        // Diagnostics
        .route("/lookup", get_only(get(lookup)))
        .route("/recrawls", get_only(get(get_recrawls)))
        .route("/force", get_only(get(force_recrawl)))

        // Monitoring
        .route("/health", get_only(get(health_check)))
        .route("/metrics", get_only(get(get_metrics_prometheus)))
        .route("/metrics/json", get_only(get(get_metrics_json)))

        .with_state(state);

    let app = if base_path == "/" {
        routes
    } else {
        Router::new().nest(&base_path, routes)
    };

    app.layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(metrics, count_failures))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONNECTION,
            HeaderValue::from_static("close"),
        ))
        .layer(TraceLayer::new_for_http())
}

/// axum answers HEAD with the GET handler unless HEAD has its own endpoint
fn get_only(route: MethodRouter<Arc<ApiState>>) -> MethodRouter<Arc<ApiState>> {
    route.head(method_not_allowed).fallback(method_not_allowed)
}

/// GET /peers[.txt] - Signed or plain-text peer seeds
async fn get_peers(
    State(state): State<Arc<ApiState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<EncodedSeeds, ApiError> {
    let query = PeersQuery::from_raw(uri.query())?;
    let format = SeedFormat::from_path(uri.path());

    let peers = select_peers(&state.crawler, &query, state.config.max_peers_in_response).await?;
    let count = peers.len();

    let message = state.encoder.message(peers);
    let encoded = state.encoder.encode(&message, format, query.nocache)?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    info!(
        "📤 {} from {} [{}]: {} peers",
        uri.path(),
        remote,
        user_agent,
        count
    );
    state.metrics.record_peers(count);

    Ok(encoded)
}

/// GET /lookup?<addr> - Crawler's view of one address
async fn lookup(State(state): State<Arc<ApiState>>, uri: Uri) -> Result<String, ApiError> {
    let address = parse_address_param(uri.query(), state.crawler.default_port())?;

    let body = match state.crawler.address_lookup(&address).await? {
        Some(record) => record.to_string(),
        None => "Unknown".to_string(),
    };
    state.metrics.inc_lookups();

    Ok(body)
}

/// GET /recrawls - Pending recrawls, one per line
async fn get_recrawls(State(state): State<Arc<ApiState>>) -> Result<String, ApiError> {
    let queue = state.crawler.snapshot_recrawl_queue().await?;

    let mut body = String::new();
    for item in &queue {
        body.push_str(&item.to_string());
        body.push('\n');
    }

    Ok(body)
}

/// GET /force?<addr> - Queue a connection attempt and return at once
async fn force_recrawl(State(state): State<Arc<ApiState>>, uri: Uri) -> Result<StatusCode, ApiError> {
    let address = parse_address_param(uri.query(), state.crawler.default_port())?;

    state.crawler.attempt_connect(address);
    state.metrics.inc_forced_recrawls();
    info!("🔁 Forced recrawl of {}", address);

    Ok(StatusCode::OK)
}

/// GET /health - Simple health check
async fn health_check() -> impl IntoResponse {
    "OK"
}

/// GET /metrics - Prometheus format metrics
async fn get_metrics_prometheus(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.to_prometheus(),
    )
}

/// GET /metrics/json - JSON format metrics
async fn get_metrics_json(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.metrics.to_json())
}

async fn count_failures(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    match response.status() {
        StatusCode::BAD_REQUEST => metrics.inc_bad_requests(),
        StatusCode::INTERNAL_SERVER_ERROR => metrics.inc_internal_errors(),
        _ => {}
    }
    response
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
