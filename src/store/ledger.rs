//! Usage ledger repository (append-only)

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::{CouponStats, NewUsage, UsageRecord};
use crate::store::StoreError;

#[derive(Debug, Clone)]
pub struct UsageLedger {
    pool: PgPool,
}

impl UsageLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends a ledger row only while the actor stays under
    /// `max_uses_per_user` (`None` = uncapped). `None` result means the cap
    /// was reached and nothing was written.
    ///
    /// Runs on the redemption transaction, after the coupon row has been
    /// updated: that row lock serializes redemptions of the same coupon, so
    /// the count subquery cannot race a concurrent append.
    pub async fn try_append(
        &self,
        conn: &mut PgConnection,
        usage: &NewUsage,
        max_uses_per_user: Option<i32>,
    ) -> Result<Option<UsageRecord>, StoreError> {
        let record = sqlx::query_as::<_, UsageRecord>(
            "INSERT INTO coupon_usages (id, coupon_id, user_id, tenant_id, discount_applied, applied_to, created_at) \
             SELECT $1, $2, $3, $4, $5, $6, NOW() \
             WHERE $7::integer IS NULL \
                OR (SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = $2 AND user_id = $3) < $7 \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(usage.coupon_id)
        .bind(&usage.user_id)
        .bind(usage.tenant_id)
        .bind(usage.discount_applied)
        .bind(&usage.applied_to)
        .bind(max_uses_per_user)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(record)
    }

    pub async fn count_for_user(&self, coupon_id: Uuid, user_id: &str) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = $1 AND user_id = $2",
        )
        .bind(coupon_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    pub async fn list_for_coupon(&self, coupon_id: Uuid) -> Result<Vec<UsageRecord>, StoreError> {
        let records = sqlx::query_as::<_, UsageRecord>(
            "SELECT * FROM coupon_usages WHERE coupon_id = $1 ORDER BY created_at DESC",
        )
        .bind(coupon_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    pub async fn stats_for_coupon(&self, coupon_id: Uuid) -> Result<CouponStats, StoreError> {
        let row: (i64, Decimal, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(discount_applied), 0), COUNT(DISTINCT user_id) \
             FROM coupon_usages WHERE coupon_id = $1",
        )
        .bind(coupon_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(CouponStats {
            total_uses: row.0,
            total_discount: row.1,
            distinct_users: row.2,
        })
    }
}
