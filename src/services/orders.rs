use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, instrument, Instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{
    db::DbPool,
    entities::{
        bill, client, order, order_detail, product, validate_non_negative, validate_positive,
        DeliveryMethod, OrderStatus, PaymentType, UserRole, PHONE_RE,
    },
    errors::ServiceError,
    notifications::{ConfirmationLine, OrderConfirmation, OrderNotifier},
    repositories::{page_window, BillRepository, ClientRepository, OrderRepository},
    services::clients::ClientView,
};

/// Delivery method as sent by storefronts: a numeric code or a label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum DeliveryMethodInput {
    Code(i64),
    Label(String),
}

/// 1, 2, 3 or a matching label; anything else (or nothing) means home delivery
pub fn normalize_delivery_method(input: Option<&DeliveryMethodInput>) -> DeliveryMethod {
    let resolved = match input {
        Some(DeliveryMethodInput::Code(code)) => DeliveryMethod::from_code(*code),
        Some(DeliveryMethodInput::Label(label)) => DeliveryMethod::from_label(label),
        None => None,
    };
    resolved.unwrap_or_default()
}

/// First whitespace-delimited token is the first name, the remainder the last name.
/// A single-token name is used for both.
pub fn split_full_name(full_name: &str) -> Option<(String, String)> {
    let trimmed = full_name.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let first = parts.next().filter(|first| !first.is_empty())?;
    let last = parts
        .next()
        .map(str::trim)
        .filter(|rest| !rest.is_empty())
        .unwrap_or(first);
    Some((first.to_string(), last.to_string()))
}

fn validate_payment_method(value: &str) -> Result<(), ValidationError> {
    match PaymentType::from_label(value) {
        Some(_) => Ok(()),
        None => {
            let mut err = ValidationError::new("payment_method");
            err.message =
                Some("Must be one of: CASH, CARD, DEBIT, CREDIT, BANK_TRANSFER".into());
            Err(err)
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct OrderItemInput {
    pub product_id: i32,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(custom = "validate_positive")]
    pub price: Decimal,
}

impl OrderItemInput {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct PlaceOrderRequest {
    /// Full name; split into name and lastname for new clients
    #[serde(alias = "name")]
    #[validate(length(min = 1, max = 200))]
    pub client_name: String,
    #[serde(alias = "email")]
    #[validate(email)]
    pub client_email: String,
    #[serde(alias = "phone", default)]
    #[validate(regex = "PHONE_RE")]
    pub client_phone: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub shipping_address: Option<String>,
    #[validate(custom = "validate_payment_method")]
    pub payment_method: String,
    #[serde(default)]
    pub delivery_method: Option<DeliveryMethodInput>,
    #[serde(default)]
    pub client_id: Option<i32>,
    #[serde(default)]
    pub bill_id: Option<i32>,
    #[validate(length(min = 1))]
    pub items: Vec<OrderItemInput>,
    #[validate(custom = "validate_non_negative")]
    pub subtotal: Decimal,
    #[validate(custom = "validate_non_negative")]
    pub tax: Decimal,
    #[validate(custom = "validate_non_negative")]
    pub shipping_cost: Decimal,
    #[validate(custom = "validate_non_negative")]
    pub total: Decimal,
}

impl PlaceOrderRequest {
    /// Field rules, every line item, and the totals arithmetic
    pub fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;

        let item_errors: Vec<String> = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| item.validate().err().map(|e| format!("items[{index}]: {e}")))
            .collect();
        if !item_errors.is_empty() {
            return Err(ServiceError::ValidationError(item_errors.join("; ")));
        }

        if split_full_name(&self.client_name).is_none() {
            return Err(ServiceError::ValidationError(
                "client_name must contain at least one non-blank character".into(),
            ));
        }

        check_totals(&self.items, self.subtotal, self.tax, self.shipping_cost, self.total)
    }
}

/// Σ quantity × price must equal `subtotal`, and `subtotal + tax + shipping_cost` must equal `total`
pub fn check_totals(
    items: &[OrderItemInput],
    subtotal: Decimal,
    tax: Decimal,
    shipping_cost: Decimal,
    total: Decimal,
) -> Result<(), ServiceError> {
    let computed: Decimal = items.iter().map(OrderItemInput::line_total).sum();
    if computed != subtotal {
        return Err(ServiceError::ValidationError(format!(
            "subtotal {subtotal} does not match the line items ({computed})"
        )));
    }
    let expected = subtotal + tax + shipping_cost;
    if expected != total {
        return Err(ServiceError::ValidationError(format!(
            "total {total} does not equal subtotal + tax + shipping_cost ({expected})"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderLineView {
    pub id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub price: Decimal,
    pub product: Option<product::Model>,
}

/// An order with its client and its lines, each line carrying its product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderView {
    pub id: i32,
    pub date: DateTime<Utc>,
    pub total: Decimal,
    pub delivery_method: DeliveryMethod,
    pub status: OrderStatus,
    pub client_id: i32,
    pub bill_id: i32,
    pub shipping_address: Option<String>,
    pub client: Option<ClientView>,
    pub details: Vec<OrderLineView>,
}

impl OrderView {
    fn assemble(
        order: order::Model,
        client: Option<client::Model>,
        details: Vec<(order_detail::Model, Option<product::Model>)>,
    ) -> Self {
        Self {
            id: order.id,
            date: order.date,
            total: order.total,
            delivery_method: order.delivery_method,
            status: order.status,
            client_id: order.client_id,
            bill_id: order.bill_id,
            shipping_address: order.shipping_address,
            client: client.map(ClientView::from),
            details: details
                .into_iter()
                .map(|(detail, product)| OrderLineView {
                    id: detail.id,
                    product_id: detail.product_id,
                    quantity: detail.quantity,
                    price: detail.price,
                    product,
                })
                .collect(),
        }
    }
}

/// Order placement and retrieval
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    orders: OrderRepository,
    clients: ClientRepository,
    bills: BillRepository,
    notifier: Arc<dyn OrderNotifier>,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        orders: OrderRepository,
        clients: ClientRepository,
        bills: BillRepository,
        notifier: Arc<dyn OrderNotifier>,
    ) -> Self {
        Self {
            db_pool,
            orders,
            clients,
            bills,
            notifier,
        }
    }

    /// Resolves the client and bill, then creates the order and its lines in one transaction.
    /// The confirmation email is sent after commit and its outcome is only logged.
    #[instrument(skip(self, request), fields(email = %request.client_email, items = request.items.len()))]
    pub async fn place_order(
        &self,
        request: PlaceOrderRequest,
        authenticated_client: Option<i32>,
    ) -> Result<OrderView, ServiceError> {
        request.check()?;
        let payment_type = PaymentType::from_label(&request.payment_method).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "unknown payment method {}",
                request.payment_method
            ))
        })?;
        let delivery_method = normalize_delivery_method(request.delivery_method.as_ref());

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order placement");
            ServiceError::from(e)
        })?;

        let client = self
            .resolve_client(&txn, &request, authenticated_client)
            .await?;
        let bill_id = match request.bill_id {
            Some(bill_id) => self.bills.find_in(&txn, bill_id).await?.id,
            None => {
                bill::ActiveModel {
                    bill_number: Set(bill::generate_bill_number()),
                    discount: Set(Decimal::ZERO),
                    date: Set(Utc::now().date_naive()),
                    total: Set(request.total),
                    payment_type: Set(payment_type),
                    client_id: Set(Some(client.id)),
                    ..Default::default()
                }
                .insert(&txn)
                .await?
                .id
            }
        };
        let products = load_products(&txn, &request.items).await?;

        let order = order::ActiveModel {
            date: Set(Utc::now()),
            total: Set(request.total),
            delivery_method: Set(delivery_method),
            status: Set(OrderStatus::Pending),
            client_id: Set(client.id),
            bill_id: Set(bill_id),
            shipping_address: Set(request.shipping_address.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut details = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let detail = order_detail::ActiveModel {
                order_id: Set(order.id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                price: Set(item.price),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            details.push((detail, products.get(&item.product_id).cloned()));
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = order.id, "Failed to commit order placement");
            ServiceError::from(e)
        })?;

        counter!("ecommerce_orders.placed", 1);
        info!(order_id = order.id, client_id = client.id, bill_id, "Order placed successfully");

        let view = OrderView::assemble(order, Some(client.clone()), details);
        self.spawn_confirmation(&client, &view);
        Ok(view)
    }

    async fn resolve_client<C>(
        &self,
        conn: &C,
        request: &PlaceOrderRequest,
        authenticated_client: Option<i32>,
    ) -> Result<client::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        // the bearer token's client wins over a client_id in the body
        if let Some(client_id) = authenticated_client.or(request.client_id) {
            return self.clients.find_in(conn, client_id).await;
        }

        let email = request.client_email.trim().to_lowercase();
        let existing = client::Entity::find()
            .filter(client::Column::Email.eq(email.as_str()))
            .one(conn)
            .await?;
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let (name, lastname) = split_full_name(&request.client_name).ok_or_else(|| {
            ServiceError::ValidationError("client_name must not be blank".into())
        })?;
        let guest = client::ActiveModel {
            name: Set(name),
            lastname: Set(lastname),
            email: Set(email),
            telephone: Set(request.client_phone.clone()),
            password_hash: Set(None),
            role: Set(UserRole::User),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        info!(client_id = guest.id, "Guest client created at checkout");
        Ok(guest)
    }

    fn spawn_confirmation(&self, client: &client::Model, view: &OrderView) {
        let confirmation = OrderConfirmation {
            email: client.email.clone(),
            client_name: client.full_name(),
            order_id: view.id,
            total: view.total,
            lines: view
                .details
                .iter()
                .map(|line| ConfirmationLine {
                    product_name: line
                        .product
                        .as_ref()
                        .map(|p| p.name.clone())
                        .unwrap_or_else(|| format!("Product #{}", line.product_id)),
                    quantity: line.quantity,
                    unit_price: line.price,
                })
                .collect(),
        };
        let notifier = self.notifier.clone();
        let order_id = view.id;

        tokio::spawn(
            async move {
                match notifier.send_order_confirmation(&confirmation).await {
                    Ok(()) => info!(order_id, "Order confirmation dispatched"),
                    Err(e) => {
                        counter!("ecommerce_orders.confirmation_failures", 1);
                        error!(order_id, error = %e, "Order confirmation failed; order is unaffected");
                    }
                }
            }
            .in_current_span(),
        );
    }

    /// Two queries: the order joined to its client, then its lines joined to their products
    #[instrument(skip(self))]
    pub async fn get_order(&self, id: i32) -> Result<OrderView, ServiceError> {
        let db = self.db_pool.as_ref();
        let (order, client) = order::Entity::find_by_id(id)
            .find_also_related(client::Entity)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))?;

        let details = order_detail::Entity::find()
            .filter(order_detail::Column::OrderId.eq(id))
            .find_also_related(product::Entity)
            .order_by_asc(order_detail::Column::Id)
            .all(db)
            .await?;

        Ok(OrderView::assemble(order, client, details))
    }

    /// A page of orders with the same eager view, in two queries regardless of page size
    #[instrument(skip(self))]
    pub async fn list_orders(&self, skip: i64, limit: i64) -> Result<Vec<OrderView>, ServiceError> {
        let (offset, limit) = page_window(skip, limit, self.orders.max_limit())?;
        let db = self.db_pool.as_ref();

        let orders = order::Entity::find()
            .find_also_related(client::Entity)
            .order_by_asc(order::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?;
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = orders.iter().map(|(order, _)| order.id).collect();
        let mut details_by_order: HashMap<i32, Vec<(order_detail::Model, Option<product::Model>)>> =
            HashMap::new();
        for (detail, product) in order_detail::Entity::find()
            .filter(order_detail::Column::OrderId.is_in(ids))
            .find_also_related(product::Entity)
            .order_by_asc(order_detail::Column::Id)
            .all(db)
            .await?
        {
            details_by_order
                .entry(detail.order_id)
                .or_default()
                .push((detail, product));
        }

        Ok(orders
            .into_iter()
            .map(|(order, client)| {
                let details = details_by_order.remove(&order.id).unwrap_or_default();
                OrderView::assemble(order, client, details)
            })
            .collect())
    }

    /// Partial update through the repository; a changed client or bill must exist
    #[instrument(skip(self, changes))]
    pub async fn update_order(
        &self,
        id: i32,
        changes: Map<String, Value>,
    ) -> Result<OrderView, ServiceError> {
        if let Some(client_id) = reference_id(&changes, "client_id")? {
            self.clients.find(client_id).await?;
        }
        if let Some(bill_id) = reference_id(&changes, "bill_id")? {
            self.bills.find(bill_id).await?;
        }

        self.orders.update(id, changes).await?;
        info!(order_id = id, "Order updated");
        self.get_order(id).await
    }

    /// Lines are removed with the order
    #[instrument(skip(self))]
    pub async fn delete_order(&self, id: i32) -> Result<(), ServiceError> {
        self.orders.remove(id).await?;
        info!(order_id = id, "Order deleted");
        Ok(())
    }
}

fn reference_id(changes: &Map<String, Value>, key: &str) -> Result<Option<i32>, ServiceError> {
    match changes.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .and_then(|id| i32::try_from(id).ok())
            .map(Some)
            .ok_or_else(|| ServiceError::ValidationError(format!("{key} must be an integer id"))),
    }
}

/// Loads every referenced product in one query; any missing id is `NotFound`
async fn load_products<C>(
    conn: &C,
    items: &[OrderItemInput],
) -> Result<HashMap<i32, product::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    let mut ids: Vec<i32> = items.iter().map(|item| item.product_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let found: HashMap<i32, product::Model> = product::Entity::find()
        .filter(product::Column::Id.is_in(ids.clone()))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    match ids.into_iter().find(|id| !found.contains_key(id)) {
        Some(missing) => Err(ServiceError::not_found("Product", missing)),
        None => Ok(found),
    }
}
