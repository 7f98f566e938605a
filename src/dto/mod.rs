//! Request bodies for creating rows. Each converts into the entity's `ActiveModel`,
//! leaving the id (and any server-generated column) unset.
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, Set};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::{
    address, bill, category, order_detail, product, review, validate_non_negative,
    validate_positive, PaymentType,
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

impl From<NewCategory> for category::ActiveModel {
    fn from(input: NewCategory) -> Self {
        Self {
            name: Set(input.name),
            description: Set(input.description),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(custom = "validate_positive")]
    pub price: Decimal,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub stock: i32,
    pub category_id: Option<i32>,
}

impl From<NewProduct> for product::ActiveModel {
    fn from(input: NewProduct) -> Self {
        Self {
            name: Set(input.name),
            price: Set(input.price),
            stock: Set(input.stock),
            category_id: Set(input.category_id),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewBill {
    /// Generated when omitted
    #[validate(length(min = 1, max = 50))]
    pub bill_number: Option<String>,
    #[validate(custom = "validate_non_negative")]
    pub discount: Option<Decimal>,
    /// Defaults to today
    pub date: Option<NaiveDate>,
    #[validate(custom = "validate_non_negative")]
    pub total: Decimal,
    pub payment_type: PaymentType,
    pub client_id: Option<i32>,
}

impl From<NewBill> for bill::ActiveModel {
    fn from(input: NewBill) -> Self {
        Self {
            bill_number: Set(input.bill_number.unwrap_or_else(bill::generate_bill_number)),
            discount: input.discount.map_or(ActiveValue::NotSet, Set),
            date: input.date.map_or(ActiveValue::NotSet, Set),
            total: Set(input.total),
            payment_type: Set(input.payment_type),
            client_id: Set(input.client_id),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewAddress {
    #[validate(length(min = 1, max = 200))]
    pub street: String,
    #[validate(length(max = 20))]
    pub number: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    pub client_id: i32,
}

impl From<NewAddress> for address::ActiveModel {
    fn from(input: NewAddress) -> Self {
        Self {
            street: Set(input.street),
            number: Set(input.number),
            city: Set(input.city),
            client_id: Set(input.client_id),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewReview {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
    pub product_id: i32,
}

impl From<NewReview> for review::ActiveModel {
    fn from(input: NewReview) -> Self {
        Self {
            rating: Set(input.rating),
            comment: Set(input.comment),
            product_id: Set(input.product_id),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewOrderDetail {
    pub order_id: i32,
    pub product_id: i32,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(custom = "validate_positive")]
    pub price: Decimal,
}

impl From<NewOrderDetail> for order_detail::ActiveModel {
    fn from(input: NewOrderDetail) -> Self {
        Self {
            order_id: Set(input.order_id),
            product_id: Set(input.product_id),
            quantity: Set(input.quantity),
            price: Set(input.price),
            ..Default::default()
        }
    }
}
