//! Coupon repository
//!
//! Platform coupons live in the NULL-tenant namespace; lookup is always
//! scope-qualified and case-insensitive, so identical codes under different
//! tenants never cross-match.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::{Coupon, CouponUpdate, DiscountKind, NewCoupon};
use crate::store::StoreError;

#[derive(Debug, Clone)]
pub struct CouponStore {
    pool: PgPool,
}

impl CouponStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_code(
        &self,
        tenant_id: Option<Uuid>,
        code: &str,
    ) -> Result<Option<Coupon>, StoreError> {
        let coupon = sqlx::query_as::<_, Coupon>(
            "SELECT * FROM coupons WHERE lower(code) = lower($1) AND tenant_id IS NOT DISTINCT FROM $2",
        )
        .bind(code)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(coupon)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Coupon>, StoreError> {
        let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(coupon)
    }

    /// Increments `current_uses` only while still under `max_total_uses`.
    /// `None` means the guard did not match: the coupon is gone or the cap
    /// is already reached. This is the authoritative cap enforcement; the
    /// validator's check is only a pre-check.
    ///
    /// Runs on the redemption transaction; the row lock it takes holds
    /// until commit and serializes redemptions of the same coupon.
    pub async fn try_increment_usage(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Coupon>, StoreError> {
        let coupon = sqlx::query_as::<_, Coupon>(
            "UPDATE coupons SET current_uses = current_uses + 1, updated_at = NOW() \
             WHERE id = $1 AND (max_total_uses IS NULL OR current_uses < max_total_uses) \
             RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(coupon)
    }

    pub async fn create(&self, new: &NewCoupon) -> Result<Coupon, StoreError> {
        let code = new
            .code
            .clone()
            .unwrap_or_else(|| format!("CPN-{:08}", rand::random::<u32>()));
        let coupon = sqlx::query_as::<_, Coupon>(
            "INSERT INTO coupons (id, tenant_id, code, name, discount_type, discount_value, \
             max_discount_amount, minimum_purchase_amount, applies_to, all_products, \
             product_ids, category_ids, max_total_uses, max_uses_per_user, current_uses, \
             is_active, starts_at, expires_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 0, TRUE, $15, $16, NOW(), NOW()) \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(new.tenant_id)
        .bind(&code)
        .bind(&new.name)
        .bind(new.discount_type)
        .bind(new.discount_value)
        .bind(new.max_discount_amount)
        .bind(new.minimum_purchase_amount)
        .bind(new.applies_to)
        .bind(new.all_products)
        .bind(&new.product_ids)
        .bind(&new.category_ids)
        .bind(new.max_total_uses)
        .bind(new.max_uses_per_user)
        .bind(new.starts_at)
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_insert)?;
        Ok(coupon)
    }

    pub async fn update(&self, id: Uuid, patch: &CouponUpdate) -> Result<Coupon, StoreError> {
        let existing = self.find_by_id(id).await?.ok_or(StoreError::NotFound)?;
        if existing.discount_type == DiscountKind::Percentage {
            if let Some(value) = patch.discount_value {
                if value > Decimal::new(100, 0) {
                    return Err(StoreError::InvalidPercentage);
                }
            }
        }
        let coupon = sqlx::query_as::<_, Coupon>(
            "UPDATE coupons SET \
             name = COALESCE($2, name), \
             discount_value = COALESCE($3, discount_value), \
             max_discount_amount = COALESCE($4, max_discount_amount), \
             minimum_purchase_amount = COALESCE($5, minimum_purchase_amount), \
             max_total_uses = COALESCE($6, max_total_uses), \
             max_uses_per_user = COALESCE($7, max_uses_per_user), \
             is_active = COALESCE($8, is_active), \
             starts_at = COALESCE($9, starts_at), \
             expires_at = COALESCE($10, expires_at), \
             updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&patch.name)
        .bind(patch.discount_value)
        .bind(patch.max_discount_amount)
        .bind(patch.minimum_purchase_amount)
        .bind(patch.max_total_uses)
        .bind(patch.max_uses_per_user)
        .bind(patch.is_active)
        .bind(patch.starts_at)
        .bind(patch.expires_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        Ok(coupon)
    }

    /// Hard delete. Ledger rows referencing the coupon are left in place.
    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Lists one namespace: a tenant's coupons, or platform coupons when
    /// `tenant_id` is `None`.
    pub async fn list(
        &self,
        tenant_id: Option<Uuid>,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Coupon>, i64), StoreError> {
        // Pages are 1-based; 0 would underflow the offset below.
        let page = page.max(1);
        let coupons = sqlx::query_as::<_, Coupon>(
            "SELECT * FROM coupons WHERE tenant_id IS NOT DISTINCT FROM $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(tenant_id)
        .bind(i64::from(per_page))
        .bind(i64::from((page - 1) * per_page))
        .fetch_all(&self.pool)
        .await?;
        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM coupons WHERE tenant_id IS NOT DISTINCT FROM $1")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?;
        Ok((coupons, total.0))
    }
}
