use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::{validate_non_negative, PaymentType};

#[derive(
    Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate, ToSchema,
)]
#[sea_orm(table_name = "bills")]
#[schema(as = Bill)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    #[validate(length(min = 1, max = 50))]
    pub bill_number: String,

    #[validate(custom = "validate_non_negative")]
    pub discount: Decimal,

    pub date: NaiveDate,

    #[validate(custom = "validate_non_negative")]
    pub total: Decimal,

    pub payment_type: PaymentType,

    pub client_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientId",
        to = "super::client::Column::Id"
    )]
    Client,
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if insert {
            if let ActiveValue::NotSet = active_model.date {
                active_model.date = Set(Utc::now().date_naive());
            }
            if let ActiveValue::NotSet = active_model.discount {
                active_model.discount = Set(Decimal::ZERO);
            }
        }
        Ok(active_model)
    }
}

/// `BILL-<UTC yyyymmddHHMMSSmmm>-<8 hex>`; the random suffix keeps numbers unique within a millisecond
pub fn generate_bill_number() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "BILL-{}-{}",
        Utc::now().format("%Y%m%d%H%M%S%3f"),
        &suffix[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bill_numbers_have_timestamp_and_hex_suffix() {
        let number = generate_bill_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "BILL");
        assert_eq!(parts[1].len(), 17);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(number, generate_bill_number());
    }
}
