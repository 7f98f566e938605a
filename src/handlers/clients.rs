use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{Map, Value};

use super::common::{AppJson, PageParams};
use crate::{
    auth::RegisterRequest, errors::ServiceError, services::clients::ClientView, ApiResponse,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/clients",
    tag = "clients",
    params(PageParams),
    responses((status = 200, description = "Clients", body = ApiResponse<Vec<ClientView>>))
)]
pub async fn list_clients(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<ClientView>>>, ServiceError> {
    let (skip, limit) = page.resolve(state.config.api_default_limit);
    Ok(Json(ApiResponse::success(
        state.services.clients.list_clients(skip, limit).await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/clients/{id}",
    tag = "clients",
    params(("id" = i32, Path, description = "Client id")),
    responses(
        (status = 200, description = "Client", body = ApiResponse<ClientView>),
        (status = 404, description = "Client not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ClientView>>, ServiceError> {
    Ok(Json(ApiResponse::success(
        state.services.clients.get_client(id).await?,
    )))
}

/// Same as `POST /auth/register`
#[utoipa::path(
    post,
    path = "/api/v1/clients",
    tag = "clients",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Client registered", body = ApiResponse<ClientView>),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_client(
    State(state): State<AppState>,
    AppJson(request): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ClientView>>), ServiceError> {
    let created = state.services.auth.register(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created.into()))))
}

#[utoipa::path(
    put,
    path = "/api/v1/clients/{id}",
    tag = "clients",
    params(("id" = i32, Path, description = "Client id")),
    request_body(content = Object, description = "Columns to change; password_hash and role are rejected"),
    responses(
        (status = 200, description = "Client updated", body = ApiResponse<ClientView>),
        (status = 400, description = "Unknown or protected field", body = crate::errors::ErrorResponse),
        (status = 404, description = "Client not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(changes): AppJson<Map<String, Value>>,
) -> Result<Json<ApiResponse<ClientView>>, ServiceError> {
    Ok(Json(ApiResponse::success(
        state.services.clients.update_client(id, changes).await?,
    )))
}
