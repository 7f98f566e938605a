use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMethod {
    #[sea_orm(string_value = "drive_thru")]
    DriveThru,
    #[sea_orm(string_value = "on_hand")]
    OnHand,
    #[sea_orm(string_value = "home_delivery")]
    HomeDelivery,
}

impl DeliveryMethod {
    /// Numeric codes used by storefront clients: 1 drive-thru, 2 on hand, 3 home delivery.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::DriveThru),
            2 => Some(Self::OnHand),
            3 => Some(Self::HomeDelivery),
            _ => None,
        }
    }

    /// Case-insensitive match on the variant name; spaces and dashes count as underscores.
    pub fn from_label(label: &str) -> Option<Self> {
        match normalize_label(label).as_str() {
            "DRIVE_THRU" => Some(Self::DriveThru),
            "ON_HAND" => Some(Self::OnHand),
            "HOME_DELIVERY" => Some(Self::HomeDelivery),
            _ => None,
        }
    }
}

fn normalize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

impl Default for DeliveryMethod {
    fn default() -> Self {
        Self::HomeDelivery
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "canceled")]
    Canceled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    #[sea_orm(string_value = "cash")]
    Cash,
    #[sea_orm(string_value = "card")]
    Card,
    #[sea_orm(string_value = "debit")]
    Debit,
    #[sea_orm(string_value = "credit")]
    Credit,
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
}

impl PaymentType {
    /// Same matching rules as [`DeliveryMethod::from_label`]; "transfer" is accepted for bank transfers.
    pub fn from_label(label: &str) -> Option<Self> {
        match normalize_label(label).as_str() {
            "CASH" => Some(Self::Cash),
            "CARD" => Some(Self::Card),
            "DEBIT" => Some(Self::Debit),
            "CREDIT" => Some(Self::Credit),
            "BANK_TRANSFER" | "TRANSFER" => Some(Self::BankTransfer),
            _ => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[sea_orm(string_value = "USER")]
    User,
    #[sea_orm(string_value = "ADMIN")]
    Admin,
}
