//! Eligibility checks and rejection taxonomy
//!
//! `evaluate` is a pure function over the coupon row, the purchase, the
//! actor's prior-use count, and the clock. Checks run in a fixed order and
//! short-circuit on the first failure so the reported reason is
//! deterministic. All I/O stays in the service layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::coupon::Coupon;

/// Purchase type a platform coupon is validated against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseKind {
    Membership,
    Domain,
}

/// Client-held cart line, input to validation only. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// What the coupon is being applied to.
#[derive(Debug, Clone)]
pub enum Purchase {
    Platform { target: PurchaseKind, amount: Decimal },
    Cart { tenant_id: Uuid, items: Vec<CartItem> },
}

impl Purchase {
    /// Coupon namespace this purchase resolves codes in.
    pub fn tenant_scope(&self) -> Option<Uuid> {
        match self {
            Purchase::Platform { .. } => None,
            Purchase::Cart { tenant_id, .. } => Some(*tenant_id),
        }
    }
}

/// Why a coupon cannot be applied. Business outcomes, not faults: these are
/// rendered as `{valid: false, error}` and never cross the HTTP boundary as
/// a non-2xx.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectionReason {
    #[error("coupon not found")]
    NotFound,
    #[error("coupon is not active")]
    Inactive,
    #[error("coupon has expired")]
    Expired,
    #[error("coupon is not yet valid")]
    NotYetValid,
    #[error("coupon usage limit reached")]
    Exhausted,
    #[error("per-user usage limit reached for this coupon")]
    PerUserLimit,
    #[error("coupon does not apply to this purchase")]
    ScopeMismatch,
    #[error("purchase amount is below the minimum of {0}")]
    BelowMinimum(Decimal),
    #[error("no items in the cart are eligible for this coupon")]
    NoApplicableItems,
}

/// Ordered eligibility checks plus discount computation.
///
/// `prior_user_uses` is the actor's ledger count for this coupon, or `None`
/// when the actor is anonymous (per-user checks are then skipped; global
/// limits still apply).
pub fn evaluate(
    coupon: &Coupon,
    purchase: &Purchase,
    prior_user_uses: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Decimal, RejectionReason> {
    if !coupon.is_active {
        return Err(RejectionReason::Inactive);
    }

    if let Some(starts_at) = coupon.starts_at {
        if now < starts_at {
            return Err(RejectionReason::NotYetValid);
        }
    }
    if let Some(expires_at) = coupon.expires_at {
        if now > expires_at {
            return Err(RejectionReason::Expired);
        }
    }

    if let Some(max) = coupon.max_total_uses {
        if coupon.current_uses >= max {
            return Err(RejectionReason::Exhausted);
        }
    }

    if let (Some(max), Some(prior)) = (coupon.max_uses_per_user, prior_user_uses) {
        if prior >= i64::from(max) {
            return Err(RejectionReason::PerUserLimit);
        }
    }

    match purchase {
        Purchase::Platform { target, amount } => {
            let applies_to = coupon
                .applies_to
                .filter(|_| coupon.is_platform())
                .ok_or(RejectionReason::ScopeMismatch)?;
            if !applies_to.allows(*target) {
                return Err(RejectionReason::ScopeMismatch);
            }
            if let Some(minimum) = coupon.minimum_purchase_amount {
                if *amount < minimum {
                    return Err(RejectionReason::BelowMinimum(minimum));
                }
            }
            Ok(coupon.compute_discount(*amount, *amount))
        }
        Purchase::Cart { tenant_id, items } => {
            if coupon.tenant_id != Some(*tenant_id) {
                return Err(RejectionReason::ScopeMismatch);
            }
            let applicable = coupon.applicable_amount(items);
            if applicable <= Decimal::ZERO {
                return Err(RejectionReason::NoApplicableItems);
            }
            let subtotal: Decimal = items.iter().map(CartItem::line_total).sum();
            if let Some(minimum) = coupon.minimum_purchase_amount {
                if subtotal < minimum {
                    return Err(RejectionReason::BelowMinimum(minimum));
                }
            }
            Ok(coupon.compute_discount(applicable, subtotal))
        }
    }
}
