//! Generic CRUD over any sea-orm entity.
//!
//! [`Repository`] is written once against `ActiveModelTrait` and specialized per entity
//! through the type aliases at the bottom of this module. Services own repositories
//! rather than extending them.
use std::marker::PhantomData;
use std::sync::Arc;

use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ConnectionTrait, EntityTrait, IdenStatic,
    IntoActiveModel, Iterable, PrimaryKeyToColumn, PrimaryKeyTrait, QueryOrder, QuerySelect,
    TransactionTrait,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{address, bill, category, client, order, order_detail, product, review};
use crate::errors::ServiceError;

pub type EntityOf<A> = <A as ActiveModelTrait>::Entity;
pub type ModelOf<A> = <EntityOf<A> as EntityTrait>::Model;
type ColumnOf<A> = <EntityOf<A> as EntityTrait>::Column;
type PrimaryKeyOf<A> = <EntityOf<A> as EntityTrait>::PrimaryKey;

/// Validates `skip`/`limit` and clamps `limit` to `max_limit`.
pub fn page_window(skip: i64, limit: i64, max_limit: u64) -> Result<(u64, u64), ServiceError> {
    if skip < 0 {
        return Err(ServiceError::ValidationError(
            "skip must be greater than or equal to 0".into(),
        ));
    }
    if limit < 1 {
        return Err(ServiceError::ValidationError(
            "limit must be greater than or equal to 1".into(),
        ));
    }
    Ok((skip as u64, (limit as u64).min(max_limit)))
}

pub struct Repository<A> {
    db: Arc<DbPool>,
    entity_name: &'static str,
    protected: &'static [&'static str],
    max_limit: u64,
    _active_model: PhantomData<fn() -> A>,
}

impl<A> Clone for Repository<A> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            entity_name: self.entity_name,
            protected: self.protected,
            max_limit: self.max_limit,
            _active_model: PhantomData,
        }
    }
}

impl<A> Repository<A>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send + 'static,
    ModelOf<A>: IntoActiveModel<A> + Serialize + DeserializeOwned + Validate + Send + Sync,
    <PrimaryKeyOf<A> as PrimaryKeyTrait>::ValueType: From<i32>,
{
    pub fn new(db: Arc<DbPool>, entity_name: &'static str, max_limit: u64) -> Self {
        Self {
            db,
            entity_name,
            protected: &[],
            max_limit,
            _active_model: PhantomData,
        }
    }

    /// Columns that `update` refuses to touch, in addition to the primary key
    pub fn protect(mut self, columns: &'static [&'static str]) -> Self {
        self.protected = columns;
        self
    }

    pub fn entity_name(&self) -> &'static str {
        self.entity_name
    }

    pub fn max_limit(&self) -> u64 {
        self.max_limit
    }

    pub async fn find(&self, id: i32) -> Result<ModelOf<A>, ServiceError> {
        self.find_in(self.db.as_ref(), id).await
    }

    /// `find` against an explicit connection, typically an open transaction
    pub async fn find_in<C>(&self, conn: &C, id: i32) -> Result<ModelOf<A>, ServiceError>
    where
        C: ConnectionTrait,
    {
        <EntityOf<A> as EntityTrait>::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found(self.entity_name, id))
    }

    #[instrument(skip(self), fields(entity = self.entity_name))]
    pub async fn find_all(&self, skip: i64, limit: i64) -> Result<Vec<ModelOf<A>>, ServiceError> {
        let (offset, limit) = page_window(skip, limit, self.max_limit)?;

        let mut query = <EntityOf<A> as EntityTrait>::find();
        for key in <PrimaryKeyOf<A> as Iterable>::iter() {
            query = query.order_by_asc(key.into_column());
        }

        Ok(query.offset(offset).limit(limit).all(self.db.as_ref()).await?)
    }

    pub async fn save(&self, model: A) -> Result<ModelOf<A>, ServiceError> {
        self.save_in(self.db.as_ref(), model).await
    }

    pub async fn save_in<C>(&self, conn: &C, model: A) -> Result<ModelOf<A>, ServiceError>
    where
        C: ConnectionTrait,
    {
        model
            .insert(conn)
            .await
            .map_err(|e| ServiceError::from_write(e, self.entity_name))
    }

    /// Applies a partial JSON update. Null values and `_`-prefixed keys are ignored;
    /// unknown or protected keys reject the whole update before anything is written.
    #[instrument(skip(self, changes), fields(entity = self.entity_name))]
    pub async fn update(
        &self,
        id: i32,
        changes: Map<String, Value>,
    ) -> Result<ModelOf<A>, ServiceError> {
        let changes = self.accepted_changes(changes)?;

        let txn = self.db.begin().await?;
        let current = self.find_in(&txn, id).await?;
        if changes.is_empty() {
            return Ok(current);
        }

        let mut merged = serde_json::to_value(&current)?;
        let fields = merged.as_object_mut().ok_or_else(|| {
            ServiceError::SerializationError(format!("{} did not serialize to an object", self.entity_name))
        })?;
        let mut columns = Vec::with_capacity(changes.len());
        for (column, value) in changes {
            fields.insert(column.as_str().to_string(), value);
            columns.push(column);
        }

        let updated: ModelOf<A> = serde_json::from_value(merged)
            .map_err(|e| ServiceError::ValidationError(format!("invalid field value: {e}")))?;
        updated.validate()?;

        let mut active = updated.into_active_model();
        for column in columns {
            if let Some(value) = active.get(column).into_value() {
                active.set(column, value);
            }
        }

        let saved = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write(e, self.entity_name))?;
        txn.commit().await?;
        debug!(id, "{} updated", self.entity_name);
        Ok(saved)
    }

    #[instrument(skip(self), fields(entity = self.entity_name))]
    pub async fn remove(&self, id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let result = <EntityOf<A> as EntityTrait>::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found(self.entity_name, id));
        }
        txn.commit().await?;
        debug!(id, "{} removed", self.entity_name);
        Ok(())
    }

    fn accepted_changes(
        &self,
        changes: Map<String, Value>,
    ) -> Result<Vec<(ColumnOf<A>, Value)>, ServiceError> {
        let primary_keys: Vec<String> = <PrimaryKeyOf<A> as Iterable>::iter()
            .map(|key| key.into_column().as_str().to_owned())
            .collect();

        let mut accepted = Vec::new();
        let mut unknown = Vec::new();
        let mut protected = Vec::new();

        for (key, value) in changes {
            if value.is_null() || key.starts_with('_') {
                continue;
            }
            if primary_keys.contains(&key) || self.protected.contains(&key.as_str()) {
                protected.push(key);
                continue;
            }
            match <ColumnOf<A> as Iterable>::iter().find(|column| column.as_str() == key) {
                Some(column) => accepted.push((column, value)),
                None => unknown.push(key),
            }
        }

        if !unknown.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "unknown field(s) for {}: {}",
                self.entity_name,
                unknown.join(", ")
            )));
        }
        if !protected.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "field(s) cannot be updated on {}: {}",
                self.entity_name,
                protected.join(", ")
            )));
        }
        Ok(accepted)
    }
}

pub type AddressRepository = Repository<address::ActiveModel>;
pub type BillRepository = Repository<bill::ActiveModel>;
pub type CategoryRepository = Repository<category::ActiveModel>;
pub type ClientRepository = Repository<client::ActiveModel>;
pub type OrderRepository = Repository<order::ActiveModel>;
pub type OrderDetailRepository = Repository<order_detail::ActiveModel>;
pub type ProductRepository = Repository<product::ActiveModel>;
pub type ReviewRepository = Repository<review::ActiveModel>;

/// One repository per entity, sharing a pool and the page size ceiling
#[derive(Clone)]
pub struct Repositories {
    pub addresses: AddressRepository,
    pub bills: BillRepository,
    pub categories: CategoryRepository,
    pub clients: ClientRepository,
    pub orders: OrderRepository,
    pub order_details: OrderDetailRepository,
    pub products: ProductRepository,
    pub reviews: ReviewRepository,
}

impl Repositories {
    pub fn new(db: Arc<DbPool>, max_limit: u64) -> Self {
        Self {
            addresses: Repository::new(db.clone(), "Address", max_limit),
            bills: Repository::new(db.clone(), "Bill", max_limit).protect(&["bill_number"]),
            categories: Repository::new(db.clone(), "Category", max_limit),
            clients: Repository::new(db.clone(), "Client", max_limit)
                .protect(&["password_hash", "role"]),
            orders: Repository::new(db.clone(), "Order", max_limit).protect(&["date"]),
            order_details: Repository::new(db.clone(), "OrderDetail", max_limit),
            products: Repository::new(db.clone(), "Product", max_limit),
            reviews: Repository::new(db, "Review", max_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn page_window_clamps_limit() {
        assert_eq!(page_window(0, 500, 100).unwrap(), (0, 100));
        assert_eq!(page_window(20, 10, 100).unwrap(), (20, 10));
    }

    #[test]
    fn page_window_rejects_negative_skip_and_empty_limit() {
        assert_matches!(page_window(-1, 10, 100), Err(ServiceError::ValidationError(_)));
        assert_matches!(page_window(0, 0, 100), Err(ServiceError::ValidationError(_)));
    }
}
