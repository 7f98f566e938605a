/*!
 * # Authentication and Authorization Module
 *
 * Password authentication for clients:
 *
 * - argon2 password hashes (salted PHC strings)
 * - HS256 JWT access tokens carrying the client id and role
 * - `AuthUser` / `MaybeAuthUser` extractors and an ADMIN role guard
 *
 * Guest clients created at checkout have no password and cannot log in until they register.
 */

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::entities::{client, UserRole, PHONE_RE};
use crate::errors::ServiceError;
use crate::handlers::common::AppJson;
use crate::services::clients::ClientView;
use crate::{ApiResponse, AppState};

/// JWT claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Client email
    pub sub: String,
    /// Client id
    pub uid: i32,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub lastname: String,
    #[validate(email)]
    pub email: String,
    #[validate(regex = "PHONE_RE")]
    pub telephone: Option<String>,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

pub struct AuthService {
    db: Arc<DbPool>,
    jwt_secret: String,
    token_lifetime: Duration,
    admin_email: Option<String>,
}

impl AuthService {
    pub fn new(
        db: Arc<DbPool>,
        jwt_secret: String,
        token_lifetime: Duration,
        admin_email: Option<String>,
    ) -> Self {
        Self {
            db,
            jwt_secret,
            token_lifetime,
            admin_email: admin_email.map(|email| email.trim().to_lowercase()),
        }
    }

    pub fn from_config(db: Arc<DbPool>, config: &AppConfig) -> Self {
        Self::new(
            db,
            config.jwt_secret.clone(),
            config.jwt_expiration(),
            config.admin_email.clone(),
        )
    }

    /// Creates a client with a password, or upgrades the guest client with that email
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<client::Model, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        let existing = client::Entity::find()
            .filter(client::Column::Email.eq(email.as_str()))
            .one(self.db.as_ref())
            .await?;
        if matches!(&existing, Some(found) if !found.is_guest()) {
            return Err(ServiceError::Conflict(format!(
                "Email {email} is already registered"
            )));
        }

        let role = if self.admin_email.as_deref() == Some(email.as_str()) {
            UserRole::Admin
        } else {
            UserRole::User
        };
        let password_hash = hash_password(request.password).await?;

        let saved = match existing {
            Some(guest) => {
                let mut active: client::ActiveModel = guest.into();
                active.name = Set(request.name);
                active.lastname = Set(request.lastname);
                active.telephone = Set(request.telephone);
                active.password_hash = Set(Some(password_hash));
                active.role = Set(role);
                active.update(self.db.as_ref()).await?
            }
            None => {
                client::ActiveModel {
                    name: Set(request.name),
                    lastname: Set(request.lastname),
                    email: Set(email),
                    telephone: Set(request.telephone),
                    password_hash: Set(Some(password_hash)),
                    role: Set(role),
                    ..Default::default()
                }
                .insert(self.db.as_ref())
                .await?
            }
        };

        info!(client_id = saved.id, role = %saved.role, "Client registered");
        Ok(saved)
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<TokenResponse, ServiceError> {
        request.validate()?;
        let invalid = || ServiceError::Unauthorized("Invalid email or password".to_string());

        let found = client::Entity::find()
            .filter(client::Column::Email.eq(request.email.trim().to_lowercase()))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(invalid)?;
        let stored_hash = found.password_hash.clone().ok_or_else(invalid)?;

        if !verify_password(request.password, stored_hash).await? {
            warn!(client_id = found.id, "Failed login attempt");
            return Err(invalid());
        }

        self.issue_token(&found)
    }

    pub fn issue_token(&self, client: &client::Model) -> Result<TokenResponse, ServiceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: client.email.clone(),
            uid: client.id,
            role: client.role,
            iat: now,
            exp: now + self.token_lifetime.as_secs() as i64,
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("Token creation failed: {e}")))?;

        Ok(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.token_lifetime.as_secs(),
        })
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ServiceError::Unauthorized("Token expired".to_string())
            }
            _ => ServiceError::Unauthorized("Invalid token".to_string()),
        })
    }

    pub async fn current_client(&self, user: &AuthUser) -> Result<client::Model, ServiceError> {
        client::Entity::find_by_id(user.client_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Client no longer exists".to_string()))
    }
}

/// Hashes off the async runtime; argon2 is deliberately slow
pub async fn hash_password(password: String) -> Result<String, ServiceError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServiceError::HashError(e.to_string()))
    })
    .await
    .map_err(|e| ServiceError::InternalError(e.to_string()))?
}

pub async fn verify_password(password: String, stored_hash: String) -> Result<bool, ServiceError> {
    tokio::task::spawn_blocking(move || {
        let parsed =
            PasswordHash::new(&stored_hash).map_err(|e| ServiceError::HashError(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| ServiceError::InternalError(e.to_string()))?
}

/// The authenticated caller, taken from a valid bearer token
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub client_id: i32,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "This operation requires the ADMIN role".to_string(),
            ))
        }
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            client_id: claims.uid,
            email: claims.sub,
            role: claims.role,
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ServiceError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ServiceError::Unauthorized("Malformed Authorization header".to_string()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(Some(token.trim()))
        }
        _ => Err(ServiceError::Unauthorized(
            "Authorization header must use the Bearer scheme".to_string(),
        )),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?
            .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".to_string()))?;
        let auth = Arc::<AuthService>::from_ref(state);
        Ok(auth.validate_token(token)?.into())
    }
}

/// Optional authentication: absent credentials yield `None`, invalid ones are still rejected
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match bearer_token(&parts.headers)? {
            None => Ok(Self(None)),
            Some(token) => {
                let auth = Arc::<AuthService>::from_ref(state);
                Ok(Self(Some(auth.validate_token(token)?.into())))
            }
        }
    }
}

/// Authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/me", get(me_handler))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Client registered", body = ApiResponse<ClientView>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse),
    )
)]
pub async fn register_handler(
    State(auth): State<Arc<AuthService>>,
    AppJson(request): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ClientView>>), ServiceError> {
    let created = auth.register(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created.into()))))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token issued", body = ApiResponse<TokenResponse>),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
    )
)]
pub async fn login_handler(
    State(auth): State<Arc<AuthService>>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<Json<ApiResponse<TokenResponse>>, ServiceError> {
    Ok(Json(ApiResponse::success(auth.login(request).await?)))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "The authenticated client", body = ApiResponse<ClientView>),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn me_handler(
    State(auth): State<Arc<AuthService>>,
    user: AuthUser,
) -> Result<Json<ApiResponse<ClientView>>, ServiceError> {
    let current = auth.current_client(&user).await?;
    Ok(Json(ApiResponse::success(current.into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    fn service(lifetime: Duration) -> AuthService {
        AuthService::new(
            Arc::new(DbPool::default()),
            "an-unguessable-signing-secret-of-32+".to_string(),
            lifetime,
            Some("Admin@Example.com".to_string()),
        )
    }

    fn client(role: UserRole) -> client::Model {
        client::Model {
            id: 4,
            name: "Ana".into(),
            lastname: "Lopez".into(),
            email: "ana@example.com".into(),
            telephone: None,
            password_hash: None,
            role,
        }
    }

    #[test]
    fn issued_token_round_trips() {
        let auth = service(Duration::from_secs(1800));
        let token = auth.issue_token(&client(UserRole::Admin)).unwrap();
        assert_eq!(token.token_type, "bearer");
        assert_eq!(token.expires_in, 1800);

        let claims = auth.validate_token(&token.access_token).unwrap();
        assert_eq!(claims.uid, 4);
        assert_eq!(claims.sub, "ana@example.com");
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.exp - claims.iat, 1800);
        assert!(AuthUser::from(claims).is_admin());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = service(Duration::from_secs(60))
            .issue_token(&client(UserRole::User))
            .unwrap();
        let other = AuthService::new(
            Arc::new(DbPool::default()),
            "a-completely-different-secret-value".to_string(),
            Duration::from_secs(60),
            None,
        );
        assert_matches!(
            other.validate_token(&token.access_token),
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[test]
    fn admin_email_is_normalized() {
        assert_eq!(
            service(Duration::from_secs(60)).admin_email.as_deref(),
            Some("admin@example.com")
        );
    }

    #[test]
    fn require_admin_forbids_regular_users() {
        let user = AuthUser {
            client_id: 1,
            email: "u@example.com".into(),
            role: UserRole::User,
        };
        assert_matches!(user.require_admin(), Err(ServiceError::Forbidden(_)));
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers).unwrap(), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_matches!(bearer_token(&headers), Err(ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn password_hash_verifies_only_the_original() {
        let hash = hash_password("correct horse".into()).await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong horse".into(), hash).await.unwrap());
    }
}
