use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{Map, Value};

use super::common::{AppJson, PageParams};
use crate::{
    auth::AuthUser, dto::NewCategory, entities::category, errors::ServiceError, ApiResponse,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    tag = "categories",
    params(PageParams),
    responses((status = 200, description = "Categories", body = ApiResponse<Vec<category::Model>>))
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<category::Model>>>, ServiceError> {
    let (skip, limit) = page.resolve(state.config.api_default_limit);
    Ok(Json(ApiResponse::success(
        state.services.categories.list_categories(skip, limit).await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    tag = "categories",
    params(("id" = i32, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category", body = ApiResponse<category::Model>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<category::Model>>, ServiceError> {
    Ok(Json(ApiResponse::success(
        state.services.categories.get_category(id).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    tag = "categories",
    request_body = NewCategory,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<category::Model>),
        (status = 403, description = "ADMIN role required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already used", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(input): AppJson<NewCategory>,
) -> Result<(StatusCode, Json<ApiResponse<category::Model>>), ServiceError> {
    user.require_admin()?;
    let created = state.services.categories.create_category(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}",
    tag = "categories",
    params(("id" = i32, Path, description = "Category id")),
    request_body(content = Object, description = "Columns to change"),
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<category::Model>),
        (status = 403, description = "ADMIN role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    AppJson(changes): AppJson<Map<String, Value>>,
) -> Result<Json<ApiResponse<category::Model>>, ServiceError> {
    user.require_admin()?;
    Ok(Json(ApiResponse::success(
        state.services.categories.update_category(id, changes).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    tag = "categories",
    params(("id" = i32, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted; its products are kept without a category"),
        (status = 403, description = "ADMIN role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    user.require_admin()?;
    state.services.categories.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
