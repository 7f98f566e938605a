use serde_json::{Map, Value};
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    cache::CacheService,
    dto::NewCategory,
    entities::category,
    errors::ServiceError,
    repositories::CategoryRepository,
};

use super::products::PRODUCTS_CACHE_PREFIX;

/// Category CRUD. Deleting a category detaches its products, so product listings are invalidated too.
#[derive(Clone)]
pub struct CategoryService {
    categories: CategoryRepository,
    cache: CacheService,
}

impl CategoryService {
    pub fn new(categories: CategoryRepository, cache: CacheService) -> Self {
        Self { categories, cache }
    }

    pub async fn get_category(&self, id: i32) -> Result<category::Model, ServiceError> {
        self.categories.find(id).await
    }

    pub async fn list_categories(&self, skip: i64, limit: i64) -> Result<Vec<category::Model>, ServiceError> {
        self.categories.find_all(skip, limit).await
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(&self, input: NewCategory) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let created = self.categories.save(input.into()).await?;
        info!(category_id = created.id, "Category created");
        Ok(created)
    }

    #[instrument(skip(self, changes))]
    pub async fn update_category(
        &self,
        id: i32,
        changes: Map<String, Value>,
    ) -> Result<category::Model, ServiceError> {
        let updated = self.categories.update(id, changes).await?;
        info!(category_id = id, "Category updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: i32) -> Result<(), ServiceError> {
        self.categories.remove(id).await?;
        self.cache.invalidate_prefix(PRODUCTS_CACHE_PREFIX, None).await;
        info!(category_id = id, "Category deleted");
        Ok(())
    }
}
