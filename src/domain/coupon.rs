//! Coupon record and discount math

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::validation::CartItem;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "discount_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Percentage,
    FixedAmount,
}

/// What a platform coupon may be applied to.
///
/// Kept as an enum so adding a scope is a compile-checked change everywhere
/// it is matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "platform_target", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlatformTarget {
    Membership,
    Domain,
    Both,
}

impl PlatformTarget {
    pub fn allows(self, requested: super::PurchaseKind) -> bool {
        use super::PurchaseKind;
        match self {
            PlatformTarget::Both => true,
            PlatformTarget::Membership => matches!(requested, PurchaseKind::Membership),
            PlatformTarget::Domain => matches!(requested, PurchaseKind::Domain),
        }
    }
}

/// A discount rule. `tenant_id = None` means a platform-wide coupon
/// (`applies_to` set); otherwise a store coupon scoped to one tenant
/// (`all_products` / allow-list set).
///
/// `current_uses` is mutated only through the redemption path.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Coupon {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub code: String,
    pub name: String,
    pub discount_type: DiscountKind,
    pub discount_value: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub minimum_purchase_amount: Option<Decimal>,
    pub applies_to: Option<PlatformTarget>,
    pub all_products: bool,
    pub product_ids: Vec<Uuid>,
    pub category_ids: Vec<Uuid>,
    pub max_total_uses: Option<i32>,
    pub max_uses_per_user: Option<i32>,
    pub current_uses: i32,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    pub fn is_platform(&self) -> bool {
        self.tenant_id.is_none()
    }

    /// Whether a cart item falls under this store coupon's allow-list.
    pub fn item_matches(&self, item: &CartItem) -> bool {
        if self.all_products {
            return true;
        }
        self.product_ids.contains(&item.product_id)
            || item.category_ids.iter().any(|c| self.category_ids.contains(c))
    }

    /// Sum of line totals for items this coupon may discount.
    pub fn applicable_amount(&self, items: &[CartItem]) -> Decimal {
        items
            .iter()
            .filter(|i| self.item_matches(i))
            .map(CartItem::line_total)
            .sum()
    }

    /// Discount granted against `applicable` (the eligible portion), clamped
    /// so it never exceeds `payable` (the full subtotal or amount). Rounded
    /// half-up to currency granularity after the final clamp.
    pub fn compute_discount(&self, applicable: Decimal, payable: Decimal) -> Decimal {
        let raw = match self.discount_type {
            DiscountKind::Percentage => {
                let pct = applicable * self.discount_value / Decimal::new(100, 0);
                match self.max_discount_amount {
                    Some(cap) => pct.min(cap),
                    None => pct,
                }
            }
            DiscountKind::FixedAmount => self.discount_value.min(applicable),
        };
        raw.min(payable)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// Payload for creating a coupon. A missing `code` gets generated.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_discount_bounds"))]
pub struct NewCoupon {
    pub tenant_id: Option<Uuid>,
    #[validate(length(min = 3, max = 32))]
    pub code: Option<String>,
    pub name: String,
    pub discount_type: DiscountKind,
    pub discount_value: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub minimum_purchase_amount: Option<Decimal>,
    pub applies_to: Option<PlatformTarget>,
    #[serde(default = "default_all_products")]
    pub all_products: bool,
    #[serde(default)]
    pub product_ids: Vec<Uuid>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
    pub max_total_uses: Option<i32>,
    pub max_uses_per_user: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_all_products() -> bool {
    true
}

/// Partial update for admin edits. Absent fields are left unchanged;
/// `current_uses` is deliberately not editable here.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_update_bounds"))]
pub struct CouponUpdate {
    pub name: Option<String>,
    pub discount_value: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub minimum_purchase_amount: Option<Decimal>,
    pub max_total_uses: Option<i32>,
    pub max_uses_per_user: Option<i32>,
    pub is_active: Option<bool>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

fn check_bounds(discount_type: Option<DiscountKind>, value: Decimal) -> Result<(), ValidationError> {
    if value <= Decimal::ZERO {
        return Err(ValidationError::new("discount_value_not_positive"));
    }
    if discount_type == Some(DiscountKind::Percentage) && value > Decimal::new(100, 0) {
        return Err(ValidationError::new("percentage_over_100"));
    }
    Ok(())
}

fn validate_discount_bounds(coupon: &NewCoupon) -> Result<(), ValidationError> {
    check_bounds(Some(coupon.discount_type), coupon.discount_value)?;
    match (coupon.tenant_id, coupon.applies_to) {
        (None, None) => Err(ValidationError::new("platform_coupon_missing_applies_to")),
        (Some(_), Some(_)) => Err(ValidationError::new("store_coupon_with_applies_to")),
        _ => Ok(()),
    }
}

fn validate_update_bounds(update: &CouponUpdate) -> Result<(), ValidationError> {
    match update.discount_value {
        // The stored discount_type is not known here; percentage range is
        // re-checked against the row in the store layer.
        Some(value) => check_bounds(None, value),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validation::CartItem;

    fn coupon(discount_type: DiscountKind, value: Decimal) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            tenant_id: Some(Uuid::new_v4()),
            code: "TEST".into(),
            name: "Test".into(),
            discount_type,
            discount_value: value,
            max_discount_amount: None,
            minimum_purchase_amount: None,
            applies_to: None,
            all_products: true,
            product_ids: vec![],
            category_ids: vec![],
            max_total_uses: None,
            max_uses_per_user: None,
            current_uses: 0,
            is_active: true,
            starts_at: None,
            expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_percentage_cap() {
        let mut c = coupon(DiscountKind::Percentage, Decimal::new(50, 0));
        c.max_discount_amount = Some(Decimal::new(100, 0));
        let amount = Decimal::new(1000, 0);
        assert_eq!(c.compute_discount(amount, amount), Decimal::new(100, 0));
    }

    #[test]
    fn test_fixed_amount_clamped_to_applicable() {
        let c = coupon(DiscountKind::FixedAmount, Decimal::new(50, 0));
        let amount = Decimal::new(30, 0);
        assert_eq!(c.compute_discount(amount, amount), Decimal::new(30, 0));
    }

    #[test]
    fn test_discount_never_exceeds_payable() {
        let c = coupon(DiscountKind::Percentage, Decimal::new(100, 0));
        let applicable = Decimal::new(80, 0);
        let payable = Decimal::new(50, 0);
        assert_eq!(c.compute_discount(applicable, payable), payable);
    }

    #[test]
    fn test_rounding_half_up() {
        // 15% of 10.03 = 1.5045 -> 1.50; 15% of 10.05 = 1.5075 -> 1.51
        let c = coupon(DiscountKind::Percentage, Decimal::new(15, 0));
        let payable = Decimal::new(100, 0);
        assert_eq!(c.compute_discount(Decimal::new(1003, 2), payable), Decimal::new(150, 2));
        assert_eq!(c.compute_discount(Decimal::new(1005, 2), payable), Decimal::new(151, 2));
    }

    #[test]
    fn test_allow_list_matching() {
        let product = Uuid::new_v4();
        let category = Uuid::new_v4();
        let mut c = coupon(DiscountKind::Percentage, Decimal::new(10, 0));
        c.all_products = false;
        c.product_ids = vec![product];
        c.category_ids = vec![category];

        let by_product = CartItem { product_id: product, category_ids: vec![], quantity: 1, unit_price: Decimal::new(10, 0) };
        let by_category = CartItem { product_id: Uuid::new_v4(), category_ids: vec![category], quantity: 2, unit_price: Decimal::new(5, 0) };
        let unrelated = CartItem { product_id: Uuid::new_v4(), category_ids: vec![Uuid::new_v4()], quantity: 1, unit_price: Decimal::new(100, 0) };

        assert!(c.item_matches(&by_product));
        assert!(c.item_matches(&by_category));
        assert!(!c.item_matches(&unrelated));
        assert_eq!(c.applicable_amount(&[by_product, by_category, unrelated]), Decimal::new(20, 0));
    }

    #[test]
    fn test_platform_target_allows() {
        use crate::domain::PurchaseKind;
        assert!(PlatformTarget::Both.allows(PurchaseKind::Membership));
        assert!(PlatformTarget::Both.allows(PurchaseKind::Domain));
        assert!(PlatformTarget::Membership.allows(PurchaseKind::Membership));
        assert!(!PlatformTarget::Membership.allows(PurchaseKind::Domain));
        assert!(!PlatformTarget::Domain.allows(PurchaseKind::Membership));
    }

    #[test]
    fn test_new_coupon_bounds() {
        let valid = NewCoupon {
            tenant_id: None,
            code: Some("SAVE20".into()),
            name: "Save 20".into(),
            discount_type: DiscountKind::Percentage,
            discount_value: Decimal::new(20, 0),
            max_discount_amount: None,
            minimum_purchase_amount: None,
            applies_to: Some(PlatformTarget::Both),
            all_products: true,
            product_ids: vec![],
            category_ids: vec![],
            max_total_uses: Some(100),
            max_uses_per_user: Some(1),
            starts_at: None,
            expires_at: None,
        };
        assert!(valid.validate().is_ok());

        let mut over = valid.clone();
        over.discount_value = Decimal::new(150, 0);
        assert!(over.validate().is_err());

        let mut zero = valid.clone();
        zero.discount_value = Decimal::ZERO;
        assert!(zero.validate().is_err());

        // applies_to belongs to platform coupons only.
        let mut mixed = valid;
        mixed.tenant_id = Some(Uuid::new_v4());
        assert!(mixed.validate().is_err());
    }
}
