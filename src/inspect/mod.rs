//! Traffic interception layer.
//!
//! # Responsibilities
//! - Wire inbound and outbound inspection from one configuration surface
//! - Guard against double installation
//!
//! # Design Decisions
//! - `Inspection::install` is the guarded, process-level entry point; the
//!   layer and client types stay independently constructible for tests and
//!   custom wiring

pub mod body;
pub mod inbound;
pub mod outbound;
pub mod routes;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http::HeaderMap;
use serde_json::{Map, Value};

use crate::config::schema::{InspectionConfig, InspectionMode};
use crate::error::InstallError;
use crate::logging::LogPipeline;

pub use body::{CaptureBuffer, StreamOutcome, TeeBody, MAX_CAPTURE_BYTES};
pub use inbound::{InboundInspector, InboundInspectorLayer};
pub use outbound::{HttpTransport, InspectedClient, OutboundOptions, TransportError};
pub use routes::RouteMatcher;

/// Header carrying the correlation id across process boundaries.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Inspection wiring for one process, produced by [`Inspection::install`].
pub struct Inspection {
    inbound: Option<InboundInspectorLayer>,
    outbound: OutboundOptions,
    pipeline: Arc<LogPipeline>,
}

impl std::fmt::Debug for Inspection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inspection").finish_non_exhaustive()
    }
}

impl Inspection {
    /// Build the inspection layer from configuration. May be called once
    /// per process; a second call is a configuration error.
    pub fn install(
        config: &InspectionConfig,
        pipeline: Arc<LogPipeline>,
    ) -> Result<Self, InstallError> {
        if INSTALLED.swap(true, Ordering::SeqCst) {
            return Err(InstallError::AlreadyInstalled);
        }

        let inbound = if config.mode.inbound_enabled() {
            let layer = InboundInspectorLayer::new(pipeline.clone(), &config.ignore_routes)?;
            tracing::info!(
                ignored_routes = config.ignore_routes.len(),
                "inbound http inspection initialized"
            );
            Some(layer)
        } else {
            None
        };

        let outbound = OutboundOptions {
            allowed_routes: config.allowed_outbound_routes.clone(),
            inspect: config.mode.outbound_enabled(),
            propagate_correlation: config.propagate_correlation,
        };
        if outbound.inspect {
            tracing::info!(
                allowed_routes = outbound.allowed_routes.len(),
                "outbound http inspection initialized"
            );
        }

        Ok(Self {
            inbound,
            outbound,
            pipeline,
        })
    }

    /// The middleware layer for the inbound side, present when
    /// `mode ∈ {all, inbound}`.
    pub fn inbound_layer(&self) -> Option<InboundInspectorLayer> {
        self.inbound.clone()
    }

    /// Wrap a transport with the configured outbound options.
    pub fn wrap_client<T: HttpTransport>(
        &self,
        transport: T,
    ) -> Result<InspectedClient<T>, InstallError> {
        InspectedClient::new(transport, self.pipeline.clone(), &self.outbound)
    }

    /// Build and wrap a fresh hyper client with the configured options.
    pub fn hyper_client(
        &self,
    ) -> Result<
        InspectedClient<
            hyper_util::client::legacy::Client<
                hyper_util::client::legacy::connect::HttpConnector,
                axum::body::Body,
            >,
        >,
        InstallError,
    > {
        InspectedClient::from_options(self.pipeline.clone(), &self.outbound)
    }
}

impl InspectionMode {
    pub fn inbound_enabled(&self) -> bool {
        matches!(self, InspectionMode::All | InspectionMode::Inbound)
    }

    pub fn outbound_enabled(&self) -> bool {
        matches!(self, InspectionMode::All | InspectionMode::Outbound)
    }
}

/// Render a header map as a JSON object, one string value per name.
pub(crate) fn headers_to_value(headers: &HeaderMap) -> Value {
    let mut map = Map::with_capacity(headers.len());
    for (name, value) in headers {
        let rendered = value
            .to_str()
            .map(str::to_string)
            .unwrap_or_else(|_| String::from_utf8_lossy(value.as_bytes()).into_owned());
        map.insert(name.as_str().to_string(), Value::String(rendered));
    }
    Value::Object(map)
}
