//! E-commerce REST backend.
//!
//! Clients, catalog, bills and orders over sea-orm, with a read-through cache for the
//! product catalog and a post-commit confirmation email for every placed order.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod dto;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod middleware_helpers;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod rate_limiter;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{
    extract::FromRef,
    http::HeaderValue,
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use utoipa::ToSchema;

use crate::auth::AuthService;
use crate::db::DbPool;
use crate::dto::{NewAddress, NewBill, NewOrderDetail, NewReview};
use crate::entities::{address, bill, order_detail, review};
use crate::handlers::crud::crud_routes;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.services.auth.clone()
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Everything under `/api/v1`
pub fn api_v1_routes(state: &AppState) -> Router<AppState> {
    let repos = &state.services.repositories;
    let default_limit = state.config.api_default_limit;

    let orders = Router::new()
        .route(
            "/",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route(
            "/:id",
            get(handlers::orders::get_order)
                .put(handlers::orders::update_order)
                .delete(handlers::orders::delete_order),
        );

    let products = Router::new()
        .route(
            "/",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route(
            "/:id",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )
        .route(
            "/category/:category_id",
            get(handlers::products::list_products_by_category),
        );

    let categories = Router::new()
        .route(
            "/",
            get(handlers::categories::list_categories)
                .post(handlers::categories::create_category),
        )
        .route(
            "/:id",
            get(handlers::categories::get_category)
                .put(handlers::categories::update_category)
                .delete(handlers::categories::delete_category),
        );

    let clients = Router::new()
        .route(
            "/",
            get(handlers::clients::list_clients).post(handlers::clients::create_client),
        )
        .route(
            "/:id",
            get(handlers::clients::get_client).put(handlers::clients::update_client),
        );

    Router::new()
        .route("/status", get(api_status))
        .nest("/auth", auth::auth_routes())
        .nest("/orders", orders)
        .nest("/products", products)
        .nest("/categories", categories)
        .nest("/clients", clients)
        .nest(
            "/bills",
            crud_routes::<bill::ActiveModel, NewBill, AppState>(repos.bills.clone(), default_limit),
        )
        .nest(
            "/addresses",
            crud_routes::<address::ActiveModel, NewAddress, AppState>(
                repos.addresses.clone(),
                default_limit,
            ),
        )
        .nest(
            "/reviews",
            crud_routes::<review::ActiveModel, NewReview, AppState>(
                repos.reviews.clone(),
                default_limit,
            ),
        )
        .nest(
            "/order_details",
            crud_routes::<order_detail::ActiveModel, NewOrderDetail, AppState>(
                repos.order_details.clone(),
                default_limit,
            ),
        )
}

/// Configured origins, or permissive outside production when none are set
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.is_production() {
        ::tracing::warn!("No CORS origins configured; cross-origin requests will be refused");
        CorsLayer::new()
    } else {
        CorsLayer::permissive()
    }
}

/// The full HTTP application: health, `/api/v1`, Swagger UI and the middleware stack.
pub fn app_router(state: AppState, access_logger: slog::Logger) -> Router {
    let logging_state = Arc::new(logging::LoggingState::new(access_logger));
    let limiter = rate_limiter::RateLimiter::from_app_config(&state.config)
        .with_auth_service(state.services.auth.clone());

    Router::new()
        .route("/", get(|| async { "ecommerce-api up" }))
        .nest("/health", health::health_routes())
        .nest("/api/v1", api_v1_routes(&state))
        .merge(openapi::swagger_ui())
        .layer(tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn_with_state(
            logging_state,
            logging::logging_middleware,
        ))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(axum::middleware::from_fn_with_state(
            limiter,
            rate_limiter::rate_limit_middleware,
        ))
        .layer(cors_layer(&state.config))
        // outermost so every other layer sees the request id
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status() -> ApiResult<serde_json::Value> {
    Ok(Json(ApiResponse::success(serde_json::json!({
        "status": "ok",
        "service": "ecommerce-api",
        "version": env!("CARGO_PKG_VERSION"),
        "git": option_env!("GIT_HASH").unwrap_or("unknown"),
        "build_time": option_env!("BUILD_TIME").unwrap_or("unknown"),
        "timestamp": Utc::now().to_rfc3339(),
    }))))
}
