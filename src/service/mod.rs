//! Validator and Redeemer
//!
//! Validation is a read-only pre-check for checkout UX. Redemption is the
//! authoritative step: both caps are enforced inside a single database
//! transaction, so racing redeemers cannot push `current_uses` past
//! `max_total_uses` or an actor's ledger count past `max_uses_per_user`,
//! even when both passed validation.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{evaluate, Coupon, NewUsage, Purchase, RejectionReason};
use crate::store::{CouponStore, StoreError, UsageLedger};

/// Outcome of a validation call. Rejections are business results, not
/// errors; only storage failures escape as `Err`.
#[derive(Debug)]
pub enum Validation {
    Approved { coupon: Coupon, discount: Decimal },
    Rejected(RejectionReason),
}

#[derive(Clone)]
pub struct Validator {
    coupons: CouponStore,
    ledger: UsageLedger,
}

impl Validator {
    pub fn new(coupons: CouponStore, ledger: UsageLedger) -> Self {
        Self { coupons, ledger }
    }

    /// Scope-qualified lookup, then the ordered domain checks. Re-reads
    /// coupon state on every call; nothing is cached between requests.
    pub async fn validate(
        &self,
        code: &str,
        actor_id: Option<&str>,
        purchase: &Purchase,
    ) -> Result<Validation, StoreError> {
        let Some(coupon) = self.coupons.find_by_code(purchase.tenant_scope(), code).await? else {
            return Ok(Validation::Rejected(RejectionReason::NotFound));
        };
        // The ledger count is only fetched when a per-user cap can apply.
        let prior_uses = match (actor_id, coupon.max_uses_per_user) {
            (Some(actor), Some(_)) => Some(self.ledger.count_for_user(coupon.id, actor).await?),
            _ => None,
        };
        match evaluate(&coupon, purchase, prior_uses, Utc::now()) {
            Ok(discount) => Ok(Validation::Approved { coupon, discount }),
            Err(reason) => Ok(Validation::Rejected(reason)),
        }
    }
}

/// A commit request for a previously validated discount.
#[derive(Debug, Clone)]
pub struct Redemption {
    pub coupon_id: Uuid,
    pub actor_id: String,
    pub tenant_id: Option<Uuid>,
    pub discount_applied: Decimal,
    pub applied_to: String,
}

#[derive(Debug, Error)]
pub enum RedeemError {
    /// The coupon refused the redemption (missing, exhausted, or the actor
    /// is at their cap). No state was changed.
    #[error("{0}")]
    Refused(#[from] RejectionReason),
    /// Infrastructure failure during commit; carries the underlying cause.
    /// The caller must not treat the order as discounted.
    #[error("redemption failed: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Clone)]
pub struct Redeemer {
    pool: PgPool,
    coupons: CouponStore,
    ledger: UsageLedger,
    events: Option<async_nats::Client>,
}

impl Redeemer {
    pub fn new(
        pool: PgPool,
        coupons: CouponStore,
        ledger: UsageLedger,
        events: Option<async_nats::Client>,
    ) -> Self {
        Self { pool, coupons, ledger, events }
    }

    /// Commits a redemption: conditional counter increment and conditional
    /// ledger append in one transaction. The increment's row lock holds
    /// until commit, so a concurrent redemption of the same coupon waits
    /// and then sees the committed ledger row; neither cap can be
    /// overshot. Any refusal or failure rolls the whole step back.
    pub async fn redeem(&self, request: &Redemption) -> Result<(), RedeemError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let Some(coupon) = self.coupons.try_increment_usage(&mut tx, request.coupon_id).await?
        else {
            // Zero rows: either the cap is reached or the coupon is gone.
            drop(tx);
            return match self.coupons.find_by_id(request.coupon_id).await? {
                Some(_) => Err(RejectionReason::Exhausted.into()),
                None => Err(RejectionReason::NotFound.into()),
            };
        };

        let usage = NewUsage {
            coupon_id: request.coupon_id,
            user_id: request.actor_id.clone(),
            tenant_id: request.tenant_id,
            discount_applied: request.discount_applied,
            applied_to: request.applied_to.clone(),
        };
        if self
            .ledger
            .try_append(&mut tx, &usage, coupon.max_uses_per_user)
            .await?
            .is_none()
        {
            // Dropping the transaction rolls the increment back.
            drop(tx);
            return Err(RejectionReason::PerUserLimit.into());
        }

        tx.commit().await.map_err(StoreError::from)?;

        tracing::info!(
            coupon_id = %request.coupon_id,
            actor_id = %request.actor_id,
            discount = %request.discount_applied,
            "coupon redeemed"
        );
        self.publish_redeemed(request).await;
        Ok(())
    }

    /// Best-effort notification; redemption has already committed.
    async fn publish_redeemed(&self, request: &Redemption) {
        let Some(client) = &self.events else { return };
        let payload = serde_json::json!({
            "coupon_id": request.coupon_id,
            "actor_id": request.actor_id,
            "tenant_id": request.tenant_id,
            "discount_applied": request.discount_applied,
            "applied_to": request.applied_to,
        });
        if let Err(e) = client
            .publish("coupons.redeemed", payload.to_string().into())
            .await
        {
            tracing::warn!(error = %e, "failed to publish coupons.redeemed event");
        }
    }
}
