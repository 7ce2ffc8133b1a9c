//! Demo server wiring the full observability layer.
//!
//! Serves an echo endpoint behind the inbound inspector and proxies
//! `/fetch?url=...` through the inspected outbound client, so both record
//! kinds can be observed on stdout. Pass a TOML config path as the first
//! argument to override the defaults.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wiretap::inspect::outbound::TransportError;
use wiretap::logging::LogPipeline;
use wiretap::{Inspection, ObservabilityConfig};

type Client = wiretap::InspectedClient<
    hyper_util::client::legacy::Client<
        hyper_util::client::legacy::connect::HttpConnector,
        axum::body::Body,
    >,
>;

#[derive(Clone)]
struct AppState {
    client: Arc<Client>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wiretap=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => wiretap::load_config(std::path::Path::new(&path))?,
        None => ObservabilityConfig::default(),
    };

    let pipeline = Arc::new(LogPipeline::new(&config.service, &config.logger)?);
    let inspection = Inspection::install(&config.inspection, pipeline)?;

    let client = Arc::new(inspection.hyper_client()?);
    let state = AppState { client };

    let mut app = Router::new()
        .route("/echo", any(echo))
        .route("/fetch", get(fetch))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http());
    if let Some(layer) = inspection.inbound_layer() {
        app = app.layer(layer);
    }

    let listener = TcpListener::bind("127.0.0.1:8080").await?;
    tracing::info!(address = %listener.local_addr()?, "demo server listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}

async fn echo(body: String) -> impl IntoResponse {
    body
}

#[derive(serde::Deserialize)]
struct FetchParams {
    url: String,
}

async fn fetch(
    State(state): State<AppState>,
    Query(params): Query<FetchParams>,
) -> impl IntoResponse {
    match state.client.get(&params.url).await {
        Ok(response) => response.into_response(),
        Err(TransportError::InvalidUrl { .. }) => {
            (axum::http::StatusCode::BAD_REQUEST, "invalid url").into_response()
        }
        Err(_) => (axum::http::StatusCode::BAD_GATEWAY, "upstream failed").into_response(),
    }
}
