use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{Map, Value};

use super::common::{AppJson, PageParams};
use crate::{
    auth::MaybeAuthUser,
    errors::ServiceError,
    services::orders::{OrderView, PlaceOrderRequest},
    ApiResponse, AppState,
};

/// Create an order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    tag = "orders",
    summary = "Place order",
    description = "Resolve or create the client and bill, then create the order and its lines atomically. \
                   A bearer token is optional; when present, the order is placed for the authenticated client and any client_id in the body is ignored.",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = ApiResponse<OrderView>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid token", body = crate::errors::ErrorResponse),
        (status = 404, description = "Referenced client, bill or product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Conflicting client email", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security((), ("Bearer" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    AppJson(request): AppJson<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderView>>), ServiceError> {
    let placed = state
        .services
        .orders
        .place_order(request, user.map(|u| u.client_id))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(placed))))
}

/// List orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    tag = "orders",
    params(PageParams),
    responses(
        (status = 200, description = "Orders with clients and lines", body = ApiResponse<Vec<OrderView>>),
        (status = 400, description = "Invalid pagination", body = crate::errors::ErrorResponse),
    )
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<OrderView>>>, ServiceError> {
    let (skip, limit) = page.resolve(state.config.api_default_limit);
    let orders = state.services.orders.list_orders(skip, limit).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Get order by ID
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    tag = "orders",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with client and lines", body = ApiResponse<OrderView>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    Ok(Json(ApiResponse::success(
        state.services.orders.get_order(id).await?,
    )))
}

/// Update order
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    tag = "orders",
    params(("id" = i32, Path, description = "Order id")),
    request_body(content = Object, description = "Columns to change, e.g. {\"status\": \"DELIVERED\"}"),
    responses(
        (status = 200, description = "Updated order", body = ApiResponse<OrderView>),
        (status = 400, description = "Unknown or protected field", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(changes): AppJson<Map<String, Value>>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    Ok(Json(ApiResponse::success(
        state.services.orders.update_order(id, changes).await?,
    )))
}

/// Delete order
#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    tag = "orders",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 204, description = "Order and its lines deleted"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.orders.delete_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
