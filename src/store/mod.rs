//! Persistence layer: coupon store and usage ledger

pub mod coupons;
pub mod ledger;

pub use coupons::CouponStore;
pub use ledger::UsageLedger;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("coupon not found")]
    NotFound,
    #[error("coupon code already exists in this scope")]
    DuplicateCode,
    #[error("percentage discount cannot exceed 100")]
    InvalidPercentage,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Maps unique-constraint violations onto `DuplicateCode`.
    pub(crate) fn from_insert(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::DuplicateCode
            }
            _ => StoreError::Database(e),
        }
    }
}
