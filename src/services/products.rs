use std::sync::Arc;

use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde_json::{Map, Value};
use tracing::{error, info, instrument};
use validator::Validate;

use crate::{
    cache::{cache_key, CacheService},
    db::DbPool,
    dto::NewProduct,
    entities::{order_detail, product},
    errors::ServiceError,
    repositories::{page_window, CategoryRepository, ProductRepository},
};

pub const PRODUCTS_CACHE_PREFIX: &str = "products";

/// Service for managing products; reads go through the cache, writes invalidate it
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    products: ProductRepository,
    categories: CategoryRepository,
    cache: CacheService,
}

impl ProductService {
    pub fn new(
        db_pool: Arc<DbPool>,
        products: ProductRepository,
        categories: CategoryRepository,
        cache: CacheService,
    ) -> Self {
        Self {
            db_pool,
            products,
            categories,
            cache,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: i32) -> Result<product::Model, ServiceError> {
        let key = cache_key(PRODUCTS_CACHE_PREFIX, "id", &[("id", id.to_string())]);
        self.cache
            .read_through(&key, || self.products.find(id))
            .await
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self, skip: i64, limit: i64) -> Result<Vec<product::Model>, ServiceError> {
        let (offset, clamped) = page_window(skip, limit, self.products.max_limit())?;
        let key = cache_key(
            PRODUCTS_CACHE_PREFIX,
            "list",
            &[("skip", offset.to_string()), ("limit", clamped.to_string())],
        );
        self.cache
            .read_through(&key, || self.products.find_all(skip, limit))
            .await
    }

    /// Products filed under `category_id`; `NotFound` when the category does not exist
    #[instrument(skip(self))]
    pub async fn list_by_category(
        &self,
        category_id: i32,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let (offset, limit) = page_window(skip, limit, self.products.max_limit())?;
        let key = cache_key(
            PRODUCTS_CACHE_PREFIX,
            "category",
            &[
                ("category_id", category_id.to_string()),
                ("skip", offset.to_string()),
                ("limit", limit.to_string()),
            ],
        );

        self.cache
            .read_through(&key, || async move {
                self.categories.find(category_id).await?;
                Ok(product::Entity::find()
                    .filter(product::Column::CategoryId.eq(category_id))
                    .order_by_asc(product::Column::Id)
                    .offset(offset)
                    .limit(limit)
                    .all(self.db_pool.as_ref())
                    .await?)
            })
            .await
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: NewProduct) -> Result<product::Model, ServiceError> {
        input.validate()?;
        if let Some(category_id) = input.category_id {
            self.categories.find(category_id).await?;
        }

        let created = self.products.save(input.into()).await.map_err(|e| {
            error!(error = %e, "Failed to create product");
            e
        })?;

        self.cache
            .invalidate_prefix(PRODUCTS_CACHE_PREFIX, Some(created.id))
            .await;
        info!(product_id = created.id, "Product created successfully");
        Ok(created)
    }

    #[instrument(skip(self, changes))]
    pub async fn update_product(
        &self,
        id: i32,
        changes: Map<String, Value>,
    ) -> Result<product::Model, ServiceError> {
        if let Some(category_id) = changes.get("category_id").and_then(Value::as_i64) {
            let category_id = i32::try_from(category_id).map_err(|_| {
                ServiceError::ValidationError(format!("invalid category_id {category_id}"))
            })?;
            self.categories.find(category_id).await?;
        }

        let updated = self.products.update(id, changes).await?;

        self.cache.invalidate_prefix(PRODUCTS_CACHE_PREFIX, Some(id)).await;
        info!(product_id = id, "Product updated successfully");
        Ok(updated)
    }

    /// Refused with `Conflict` while any order line references the product
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: i32) -> Result<(), ServiceError> {
        self.products.find(id).await?;

        let references = order_detail::Entity::find()
            .filter(order_detail::Column::ProductId.eq(id))
            .count(self.db_pool.as_ref())
            .await?;
        if references > 0 {
            let msg = format!("Product {id} is referenced by {references} order line(s)");
            error!(product_id = id, %msg);
            return Err(ServiceError::Conflict(msg));
        }

        self.products.remove(id).await?;

        self.cache.invalidate_prefix(PRODUCTS_CACHE_PREFIX, Some(id)).await;
        info!(product_id = id, "Product deleted successfully");
        Ok(())
    }
}
