use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use http::HeaderName;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::Span;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};

use super::handlers;
use crate::idempotency::{idempotent_create, IdempotencyGate, IdempotentCreate};
use crate::observability::{get_metrics, HealthChecker, LatencyTimer};
use crate::repositories::{ItemRepository, ProductRepository};
use crate::services::{ItemService, ProductService};

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub product_service: Arc<ProductService>,
    pub item_service: Arc<ItemService>,
    pub gate: Arc<IdempotencyGate>,
    pub health_checker: Arc<HealthChecker>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        items: Arc<dyn ItemRepository>,
        gate: Arc<IdempotencyGate>,
    ) -> Self {
        Self {
            product_service: Arc::new(ProductService::new(products.clone())),
            item_service: Arc::new(ItemService::new(products, items)),
            gate,
            health_checker: Arc::new(HealthChecker::new(None, None)),
            metrics_handle: None,
        }
    }

    /// Adds metrics handle to the state.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Adds health checker to the state.
    pub fn with_health_checker(mut self, checker: Arc<HealthChecker>) -> Self {
        self.health_checker = checker;
        self
    }
}

/// Creates the main API router with all routes.
///
/// Only the two create endpoints sit behind the idempotency gate; each
/// collection gets its own resource tag.
pub fn create_router(state: AppState) -> Router {
    let product_gate = IdempotentCreate::new(state.gate.clone(), "product");
    let item_gate = IdempotentCreate::new(state.gate.clone(), "item");

    let api = Router::new()
        // Product endpoints
        .route(
            "/products",
            post(handlers::create_product)
                .layer(middleware::from_fn_with_state(product_gate, idempotent_create))
                .get(handlers::list_products),
        )
        .route(
            "/products/:id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        // Item endpoints
        .route(
            "/products/:id/items",
            post(handlers::create_item)
                .layer(middleware::from_fn_with_state(item_gate, idempotent_create))
                .get(handlers::list_items),
        )
        .route(
            "/products/:id/items/:item_id",
            get(handlers::get_item).delete(handlers::delete_item),
        );

    let correlation_id = HeaderName::from_static(CORRELATION_ID_HEADER);

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check))
        // Metrics endpoint
        .route("/metrics", get(handlers::metrics_endpoint))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(middleware::from_fn(track_http_metrics))
        .layer(PropagateRequestIdLayer::new(correlation_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::new(correlation_id, MakeRequestUuid))
}

/// Records request count and latency labelled by route template.
async fn track_http_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let timer = LatencyTimer::new();
    let response = next.run(request).await;
    get_metrics().record_http_request(&method, &path, response.status().as_u16(), timer.elapsed_ms());

    response
}

/// Request span carrying the correlation id, so every log line of a request
/// can be tied back to it.
fn request_span(request: &Request) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        correlation_id = %correlation_id(request),
    )
}

fn correlation_id(request: &Request) -> &str {
    request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("-")
}
