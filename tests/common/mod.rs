#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use serde_json::Value;
use tokio::sync::Notify;
use tower::ServiceExt;

use ecommerce_api::{
    auth::RegisterRequest,
    cache::CacheService,
    config::AppConfig,
    db::{self, DbConfig},
    entities::{category, product},
    handlers::AppServices,
    logging,
    notifications::{NotificationError, OrderConfirmation, OrderNotifier},
    AppState,
};

pub const ADMIN_EMAIL: &str = "admin@shop.test";
pub const ADMIN_PASSWORD: &str = "admin-password-1";
const JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Notifier that keeps every confirmation it is asked to send.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<OrderConfirmation>>>,
    signal: Arc<Notify>,
    fail: bool,
}

impl RecordingNotifier {
    /// Records the attempt, then reports a transport failure
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<OrderConfirmation> {
        self.sent.lock().unwrap().clone()
    }

    /// Waits until at least `count` confirmations were attempted
    pub async fn wait_for(&self, count: usize) -> Vec<OrderConfirmation> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.signal.notified();
                if self.sent.lock().unwrap().len() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("confirmation was not sent in time");
        self.sent()
    }
}

#[async_trait]
impl OrderNotifier for RecordingNotifier {
    async fn send_order_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(confirmation.clone());
        self.signal.notify_waiters();
        if self.fail {
            Err(NotificationError::Transport("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

/// Helper harness for an application backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub notifier: RecordingNotifier,
    admin_token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_notifier(RecordingNotifier::default()).await
    }

    pub async fn with_notifier(notifier: RecordingNotifier) -> Self {
        Self::build(notifier, |_| {}).await
    }

    /// Harness with adjusted configuration, e.g. a tighter rate limit
    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        Self::build(RecordingNotifier::default(), tweak).await
    }

    async fn build(notifier: RecordingNotifier, tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            JWT_SECRET.to_string(),
            "test".to_string(),
        );
        cfg.admin_email = Some(ADMIN_EMAIL.to_string());
        cfg.api_default_limit = 50;
        cfg.api_max_limit = 100;
        // every anonymous test request shares one address key
        cfg.rate_limit_requests_per_window = 10_000;
        tweak(&mut cfg);

        let pool = db::establish_connection_with_config(&DbConfig::sqlite_in_memory())
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db = Arc::new(pool);

        let services = AppServices::new(
            db.clone(),
            &cfg,
            CacheService::in_memory(),
            Arc::new(notifier.clone()),
        );
        let state = AppState {
            db,
            config: cfg,
            services,
        };
        let router = ecommerce_api::app_router(state.clone(), logging::discard_logger());

        let admin = state
            .services
            .auth
            .register(RegisterRequest {
                name: "Shop".into(),
                lastname: "Admin".into(),
                email: ADMIN_EMAIL.into(),
                telephone: None,
                password: ADMIN_PASSWORD.into(),
            })
            .await
            .expect("register admin");
        let admin_token = state
            .services
            .auth
            .issue_token(&admin)
            .expect("issue admin token")
            .access_token;

        Self {
            router,
            state,
            notifier,
            admin_token,
        }
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    /// Registers a USER client and returns a bearer token for it
    pub async fn user_token(&self, email: &str) -> String {
        let client = self
            .state
            .services
            .auth
            .register(RegisterRequest {
                name: "Regular".into(),
                lastname: "User".into(),
                email: email.into(),
                telephone: None,
                password: "user-password-1".into(),
            })
            .await
            .expect("register user");
        self.state
            .services
            .auth
            .issue_token(&client)
            .expect("issue user token")
            .access_token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let (status, _, json) = self.send(method, uri, body, token, &[]).await;
        (status, json)
    }

    /// Like `request`, with extra headers, returning the response headers too
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {tok}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router error during test request");
        let status = response.status();
        let response_headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, response_headers, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body), None).await
    }

    pub async fn as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.request(method, uri, body, Some(self.admin_token())).await
    }

    pub async fn seed_category(&self, name: &str) -> category::Model {
        category::ActiveModel {
            name: Set(name.to_string()),
            description: Set(None),
            ..Default::default()
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed category")
    }

    pub async fn seed_product(&self, name: &str, price: Decimal, category_id: Option<i32>) -> product::Model {
        product::ActiveModel {
            name: Set(name.to_string()),
            price: Set(price),
            stock: Set(10),
            category_id: Set(category_id),
            ..Default::default()
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed product")
    }

    pub async fn count<E: EntityTrait>(&self) -> u64
    where
        E::Model: Sync,
    {
        E::find()
            .count(self.state.db.as_ref())
            .await
            .expect("count rows")
    }
}
