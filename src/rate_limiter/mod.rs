/*!
 * # Rate Limiting
 *
 * Fixed-window request limiting keyed per client. Authenticated callers are keyed by
 * their client id, anonymous callers by address (`X-Forwarded-For`, `X-Real-IP`, then
 * the peer socket). Rejected requests get `429` with the standard error body plus
 * `Retry-After`; every limited response carries `X-RateLimit-*` headers.
 *
 * ```ignore
 * let limiter = RateLimiter::from_app_config(&cfg).with_auth_service(auth);
 * let app = Router::new()
 *     .route("/", get(handler))
 *     .layer(axum::middleware::from_fn_with_state(limiter, rate_limit_middleware));
 * ```
 */
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use metrics::counter;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::errors::ServiceError;

/// Paths that are never limited
const EXEMPT_PREFIXES: [&str; 3] = ["/health", "/swagger-ui", "/api-docs"];

/// Entry count above which expired windows are swept on the next check
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_duration: Duration,
    pub enable_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 100,
            window_duration: Duration::from_secs(60),
            enable_headers: true,
        }
    }
}

impl RateLimitConfig {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            requests_per_window: cfg.rate_limit_requests_per_window,
            window_duration: cfg.rate_limit_window(),
            enable_headers: cfg.rate_limit_enable_headers,
        }
    }
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

impl RateLimitEntry {
    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.window_start) >= window
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

#[derive(Clone)]
pub struct RateLimiter {
    entries: Arc<DashMap<String, RateLimitEntry>>,
    config: RateLimitConfig,
    auth_service: Option<Arc<AuthService>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            config,
            auth_service: None,
        }
    }

    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self::new(RateLimitConfig::from_app_config(cfg))
    }

    /// Lets bearer tokens key the limit by client instead of by address
    pub fn with_auth_service(mut self, auth_service: Arc<AuthService>) -> Self {
        self.auth_service = Some(auth_service);
        self
    }

    /// A zero request budget turns limiting off
    pub fn is_enabled(&self) -> bool {
        self.config.requests_per_window > 0
    }

    /// Counts one request against `key` unless its window is already spent.
    pub fn check(&self, key: &str) -> RateLimitResult {
        let window = self.config.window_duration;
        let limit = self.config.requests_per_window;

        if self.entries.len() > SWEEP_THRESHOLD {
            self.cleanup_expired();
        }

        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry {
                count: 0,
                window_start: now,
            });
        if entry.is_expired(now, window) {
            entry.count = 0;
            entry.window_start = now;
        }
        let reset_after = window.saturating_sub(now.duration_since(entry.window_start));

        if entry.count >= limit {
            return RateLimitResult {
                allowed: false,
                limit,
                remaining: 0,
                reset_after,
            };
        }

        entry.count += 1;
        RateLimitResult {
            allowed: true,
            limit,
            remaining: limit - entry.count,
            reset_after,
        }
    }

    pub fn reset(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drops every entry whose window has passed
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let window = self.config.window_duration;
        self.entries.retain(|_, entry| !entry.is_expired(now, window));
    }

    /// `client:<id>` for a valid bearer token, otherwise `ip:<address>`
    pub fn client_key(&self, request: &Request) -> String {
        if let Some(uid) = self.authenticated_client(request.headers()) {
            return format!("client:{uid}");
        }
        extract_ip_key(request)
    }

    fn authenticated_client(&self, headers: &HeaderMap) -> Option<i32> {
        let auth = self.auth_service.as_ref()?;
        let token = headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?
            .trim();
        auth.validate_token(token).ok().map(|claims| claims.uid)
    }
}

pub fn extract_ip_key(request: &Request) -> String {
    let headers = request.headers();
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().map(str::trim).filter(|ip| !ip.is_empty()) {
            return format!("ip:{ip}");
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return format!("ip:{}", real_ip.trim());
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return format!("ip:{}", addr.ip());
    }
    "ip:unknown".to_string()
}

fn apply_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(result.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(result.remaining));
    headers.insert(
        "x-ratelimit-reset",
        HeaderValue::from(result.reset_after.as_secs()),
    );
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if !limiter.is_enabled() || EXEMPT_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return next.run(request).await;
    }

    let key = limiter.client_key(&request);
    let result = limiter.check(&key);

    if !result.allowed {
        warn!(key = %key, path = %path, "Rate limit exceeded");
        counter!("ecommerce_rate_limit.denied", 1);

        let mut response = ServiceError::RateLimited(format!(
            "at most {} requests per {}s",
            result.limit,
            limiter.config.window_duration.as_secs()
        ))
        .into_response();
        let headers = response.headers_mut();
        // whole seconds, rounded up
        let retry_after = result.reset_after.as_secs() + u64::from(result.reset_after.subsec_nanos() > 0);
        headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after.max(1)));
        if limiter.config.enable_headers {
            apply_headers(headers, &result);
        }
        return response;
    }

    debug!(key = %key, remaining = result.remaining, "Request within rate limit");
    let mut response = next.run(request).await;
    if limiter.config.enable_headers {
        apply_headers(response.headers_mut(), &result);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn limiter(requests: u32, window: Duration) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            requests_per_window: requests,
            window_duration: window,
            enable_headers: true,
        })
    }

    #[test]
    fn budget_is_spent_per_key() {
        let limiter = limiter(2, Duration::from_secs(60));

        let first = limiter.check("ip:1.1.1.1");
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert!(limiter.check("ip:1.1.1.1").allowed);

        let denied = limiter.check("ip:1.1.1.1");
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert!(denied.reset_after <= Duration::from_secs(60));

        assert!(limiter.check("ip:2.2.2.2").allowed);
    }

    #[tokio::test]
    async fn window_expiry_restores_the_budget() {
        let limiter = limiter(1, Duration::from_millis(50));
        assert!(limiter.check("k").allowed);
        assert!(!limiter.check("k").allowed);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(limiter.check("k").allowed);

        tokio::time::sleep(Duration::from_millis(80)).await;
        limiter.cleanup_expired();
        assert!(limiter.entries.is_empty());
    }

    #[test]
    fn reset_clears_a_key() {
        let limiter = limiter(1, Duration::from_secs(60));
        assert!(limiter.check("k").allowed);
        limiter.reset("k");
        assert!(limiter.check("k").allowed);
    }

    #[test]
    fn zero_budget_disables_limiting() {
        assert!(!limiter(0, Duration::from_secs(60)).is_enabled());
    }

    #[test]
    fn ip_key_prefers_forwarded_headers() {
        let request = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 172.16.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_ip_key(&request), "ip:10.0.0.1");

        let request = Request::builder()
            .header("x-real-ip", "10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_ip_key(&request), "ip:10.0.0.2");

        let mut request = Request::builder().body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 9], 4000))));
        assert_eq!(extract_ip_key(&request), "ip:192.168.1.9");

        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_ip_key(&request), "ip:unknown");
    }
}
