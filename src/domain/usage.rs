//! Usage ledger records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row per successful redemption. Immutable once written; the per-user
/// and global caps are enforced against counts of these rows.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsageRecord {
    pub id: Uuid,
    pub coupon_id: Uuid,
    pub user_id: String,
    pub tenant_id: Option<Uuid>,
    pub discount_applied: Decimal,
    pub applied_to: String,
    pub created_at: DateTime<Utc>,
}

/// Ledger row to append on redemption.
#[derive(Debug, Clone)]
pub struct NewUsage {
    pub coupon_id: Uuid,
    pub user_id: String,
    pub tenant_id: Option<Uuid>,
    pub discount_applied: Decimal,
    pub applied_to: String,
}

/// Admin-facing aggregate over a coupon's ledger.
#[derive(Debug, Clone, Serialize)]
pub struct CouponStats {
    pub total_uses: i64,
    pub total_discount: Decimal,
    pub distinct_users: i64,
}
