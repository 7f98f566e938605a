use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::IntoParams;

use crate::errors::ServiceError;

/// `skip`/`limit` query parameters for list operations
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
pub struct PageParams {
    /// Rows to skip (default 0)
    pub skip: Option<i64>,
    /// Rows to return; clamped to the configured maximum
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn resolve(&self, default_limit: u64) -> (i64, i64) {
        (
            self.skip.unwrap_or(0),
            self.limit
                .unwrap_or_else(|| i64::try_from(default_limit).unwrap_or(i64::MAX)),
        )
    }
}

/// JSON body whose deserialization failures surface as `ValidationError` (400)
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejection_to_error(rejection)),
        }
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ServiceError {
    ServiceError::ValidationError(rejection.body_text())
}
