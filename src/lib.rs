//! Coupon Validation & Redemption Service
//!
//! Standalone coupon subsystem for a multi-tenant storefront platform.
//!
//! ## Features
//! - Platform-wide and per-tenant coupon codes (disjoint namespaces)
//! - Percentage and fixed-amount discounts with caps and minimums
//! - Read-only validation for checkout previews
//! - Atomic usage accounting with an append-only redemption ledger
//! - Admin CRUD and per-coupon usage statistics

pub mod domain;
pub mod http;
pub mod service;
pub mod store;
