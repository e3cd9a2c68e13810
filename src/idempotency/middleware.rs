use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::gate::IdempotencyGate;

/// Middleware state: the shared gate plus the resource tag used in logs
/// and metrics.
#[derive(Clone)]
pub struct IdempotentCreate {
    gate: Arc<IdempotencyGate>,
    resource: &'static str,
}

impl IdempotentCreate {
    pub fn new(gate: Arc<IdempotencyGate>, resource: &'static str) -> Self {
        Self { gate, resource }
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }
}

/// Wraps a create handler with the idempotency gate.
///
/// ```rust,ignore
/// let products = post(handlers::create_product).layer(middleware::from_fn_with_state(
///     IdempotentCreate::new(gate, "product"),
///     idempotent_create,
/// ));
/// ```
pub async fn idempotent_create(
    State(scope): State<IdempotentCreate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match scope
        .gate
        .process(scope.resource, request, |req| next.run(req))
        .await
    {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}
