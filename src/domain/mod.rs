//! Domain types and pure coupon logic

pub mod coupon;
pub mod usage;
pub mod validation;

pub use coupon::{Coupon, CouponUpdate, DiscountKind, NewCoupon, PlatformTarget};
pub use usage::{CouponStats, NewUsage, UsageRecord};
pub use validation::{evaluate, CartItem, Purchase, PurchaseKind, RejectionReason};
