//! Routes for entities with no behaviour beyond the repository: list, get, create,
//! partial update and delete, all driven by one [`Repository`].
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use sea_orm::{ActiveModelBehavior, ActiveModelTrait, EntityTrait, IntoActiveModel, PrimaryKeyTrait};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use super::common::{AppJson, PageParams};
use crate::{
    errors::ServiceError,
    repositories::{ModelOf, Repository},
    ApiResponse,
};

pub struct CrudState<A> {
    repo: Repository<A>,
    default_limit: u64,
}

impl<A> Clone for CrudState<A> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            default_limit: self.default_limit,
        }
    }
}

/// Builds `/` and `/:id` for one entity. `I` is the create body.
pub fn crud_routes<A, I, S>(repo: Repository<A>, default_limit: u64) -> Router<S>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
    ModelOf<A>: IntoActiveModel<A> + Serialize + DeserializeOwned + Validate + Send + Sync,
    <<A::Entity as EntityTrait>::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
    I: DeserializeOwned + Validate + Into<A> + Send + 'static,
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(list::<A>).post(create::<A, I>))
        .route("/:id", get(fetch::<A>).put(update::<A>).delete(remove::<A>))
        .with_state(CrudState {
            repo,
            default_limit,
        })
}

async fn list<A>(
    State(state): State<CrudState<A>>,
    Query(page): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<ModelOf<A>>>>, ServiceError>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
    ModelOf<A>: IntoActiveModel<A> + Serialize + DeserializeOwned + Validate + Send + Sync,
    <<A::Entity as EntityTrait>::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    let (skip, limit) = page.resolve(state.default_limit);
    Ok(Json(ApiResponse::success(
        state.repo.find_all(skip, limit).await?,
    )))
}

async fn fetch<A>(
    State(state): State<CrudState<A>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ModelOf<A>>>, ServiceError>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
    ModelOf<A>: IntoActiveModel<A> + Serialize + DeserializeOwned + Validate + Send + Sync,
    <<A::Entity as EntityTrait>::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    Ok(Json(ApiResponse::success(state.repo.find(id).await?)))
}

async fn create<A, I>(
    State(state): State<CrudState<A>>,
    AppJson(input): AppJson<I>,
) -> Result<(StatusCode, Json<ApiResponse<ModelOf<A>>>), ServiceError>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
    ModelOf<A>: IntoActiveModel<A> + Serialize + DeserializeOwned + Validate + Send + Sync,
    <<A::Entity as EntityTrait>::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
    I: DeserializeOwned + Validate + Into<A> + Send + 'static,
{
    input.validate()?;
    let created = state.repo.save(input.into()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

async fn update<A>(
    State(state): State<CrudState<A>>,
    Path(id): Path<i32>,
    AppJson(changes): AppJson<Map<String, Value>>,
) -> Result<Json<ApiResponse<ModelOf<A>>>, ServiceError>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
    ModelOf<A>: IntoActiveModel<A> + Serialize + DeserializeOwned + Validate + Send + Sync,
    <<A::Entity as EntityTrait>::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    Ok(Json(ApiResponse::success(
        state.repo.update(id, changes).await?,
    )))
}

async fn remove<A>(
    State(state): State<CrudState<A>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
    ModelOf<A>: IntoActiveModel<A> + Serialize + DeserializeOwned + Validate + Send + Sync,
    <<A::Entity as EntityTrait>::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    state.repo.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
