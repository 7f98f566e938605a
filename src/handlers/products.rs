use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{Map, Value};

use super::common::{AppJson, PageParams};
use crate::{
    auth::AuthUser, dto::NewProduct, entities::product, errors::ServiceError, ApiResponse,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/products",
    tag = "products",
    params(PageParams),
    responses(
        (status = 200, description = "Products ordered by id", body = ApiResponse<Vec<product::Model>>),
        (status = 400, description = "Invalid pagination", body = crate::errors::ErrorResponse),
    )
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<product::Model>>>, ServiceError> {
    let (skip, limit) = page.resolve(state.config.api_default_limit);
    Ok(Json(ApiResponse::success(
        state.services.products.list_products(skip, limit).await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    tag = "products",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<product::Model>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<product::Model>>, ServiceError> {
    Ok(Json(ApiResponse::success(
        state.services.products.get_product(id).await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/category/{category_id}",
    tag = "products",
    params(("category_id" = i32, Path, description = "Category id"), PageParams),
    responses(
        (status = 200, description = "Products in the category", body = ApiResponse<Vec<product::Model>>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn list_products_by_category(
    State(state): State<AppState>,
    Path(category_id): Path<i32>,
    Query(page): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<product::Model>>>, ServiceError> {
    let (skip, limit) = page.resolve(state.config.api_default_limit);
    Ok(Json(ApiResponse::success(
        state
            .services
            .products
            .list_by_category(category_id, skip, limit)
            .await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    tag = "products",
    request_body = NewProduct,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<product::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "ADMIN role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(input): AppJson<NewProduct>,
) -> Result<(StatusCode, Json<ApiResponse<product::Model>>), ServiceError> {
    user.require_admin()?;
    let created = state.services.products.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    tag = "products",
    params(("id" = i32, Path, description = "Product id")),
    request_body(content = Object, description = "Columns to change"),
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<product::Model>),
        (status = 400, description = "Unknown or invalid field", body = crate::errors::ErrorResponse),
        (status = 403, description = "ADMIN role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    AppJson(changes): AppJson<Map<String, Value>>,
) -> Result<Json<ApiResponse<product::Model>>, ServiceError> {
    user.require_admin()?;
    Ok(Json(ApiResponse::success(
        state.services.products.update_product(id, changes).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    tag = "products",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 403, description = "ADMIN role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product is referenced by orders", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    user.require_admin()?;
    state.services.products.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
