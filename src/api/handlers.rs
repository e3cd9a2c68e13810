use axum::{
    extract::{rejection::JsonRejection, OriginalUri, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use validator::Validate;

use crate::api::requests::{
    ItemCreateRequest, ListProductsQuery, ProductCreateRequest, ProductUpdateRequest,
};
use crate::api::responses::{ApiResponse, ItemResponse, PaginatedResponse, ProductResponse};
use crate::error::AppError;
use crate::idempotency::CreatedAt;
use crate::observability::AggregatedHealth;

use super::routes::AppState;

type HandlerResult<T> = Result<T, AppError>;

/// Health check endpoint.
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<AggregatedHealth>>) {
    let health = state.health_checker.check_all().await;
    let status = if health.status.is_unhealthy() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status, Json(ApiResponse::success(health)))
}

/// Readiness check endpoint.
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    if state.health_checker.is_ready().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Liveness check endpoint.
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Prometheus scrape endpoint.
pub async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match &state.metrics_handle {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ============================================================================
// Product Handlers
// ============================================================================

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> HandlerResult<Json<PaginatedResponse<ProductResponse>>> {
    let page = state
        .product_service
        .list(query.page, query.page_size)
        .await?;

    Ok(Json(PaginatedResponse::from(page)))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> HandlerResult<Json<ProductResponse>> {
    let product = state.product_service.find_by_id(id).await?;
    Ok(Json(ProductResponse::from(product)))
}

/// Creates a product. Runs behind the idempotency gate.
pub async fn create_product(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    payload: Result<Json<ProductCreateRequest>, JsonRejection>,
) -> HandlerResult<CreatedAt> {
    let Json(request) = payload?;
    request.validate()?;

    let id = state.product_service.create(&request.product_name).await?;
    Ok(CreatedAt::new(uri.path(), id))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<ProductUpdateRequest>, JsonRejection>,
) -> HandlerResult<StatusCode> {
    let Json(request) = payload?;
    request.validate()?;

    state.product_service.rename(id, &request.product_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> HandlerResult<StatusCode> {
    state.product_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Item Handlers
// ============================================================================

pub async fn list_items(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> HandlerResult<Json<Vec<ItemResponse>>> {
    let items = state.item_service.list(product_id).await?;
    Ok(Json(items.into_iter().map(ItemResponse::from).collect()))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path((product_id, item_id)): Path<(i64, i64)>,
) -> HandlerResult<Json<ItemResponse>> {
    let item = state.item_service.find(product_id, item_id).await?;
    Ok(Json(ItemResponse::from(item)))
}

/// Adds an item to a product. Runs behind the idempotency gate.
pub async fn create_item(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(product_id): Path<i64>,
    payload: Result<Json<ItemCreateRequest>, JsonRejection>,
) -> HandlerResult<CreatedAt> {
    let Json(request) = payload?;
    request.validate()?;

    let id = state.item_service.create(product_id, request.quantity).await?;
    Ok(CreatedAt::new(uri.path(), id))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Path((product_id, item_id)): Path<(i64, i64)>,
) -> HandlerResult<StatusCode> {
    state.item_service.delete(product_id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
