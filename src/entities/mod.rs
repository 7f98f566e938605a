//! Persisted records. Every table uses an auto-increment integer key.
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use validator::ValidationError;

pub mod address;
pub mod bill;
pub mod category;
pub mod client;
pub mod enums;
pub mod order;
pub mod order_detail;
pub mod product;
pub mod review;

pub use enums::{DeliveryMethod, OrderStatus, PaymentType, UserRole};

lazy_static! {
    /// Optional leading `+`, no leading zero, 7 to 20 digits.
    pub static ref PHONE_RE: Regex =
        Regex::new(r"^\+?[1-9]\d{6,19}$").expect("phone pattern compiles");
}

pub fn validate_positive(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_positive() && !value.is_zero() {
        Ok(())
    } else {
        let mut err = ValidationError::new("positive");
        err.message = Some("must be greater than zero".into());
        Err(err)
    }
}

pub fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("must not be negative".into());
        Err(err)
    } else {
        Ok(())
    }
}
