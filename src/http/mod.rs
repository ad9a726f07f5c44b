//! HTTP surface: checkout-facing validate/redeem plus admin CRUD

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use validator::Validate;

use crate::domain::{
    CartItem, Coupon, CouponStats, CouponUpdate, NewCoupon, Purchase, PurchaseKind, UsageRecord,
};
use crate::service::{Redeemer, Redemption, Validation, Validator};
use crate::store::{CouponStore, StoreError, UsageLedger};

#[derive(Clone)]
pub struct AppState {
    pub validator: Validator,
    pub redeemer: Redeemer,
    pub coupons: CouponStore,
    pub ledger: UsageLedger,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/coupons/validate", post(validate_coupon))
        .route("/api/v1/coupons/redeem", post(redeem_coupon))
        .route("/api/v1/coupons", get(list_coupons).post(create_coupon))
        .route(
            "/api/v1/coupons/:id",
            get(get_coupon).put(update_coupon).delete(delete_coupon),
        )
        .route("/api/v1/coupons/:id/stats", get(coupon_stats))
        .route("/api/v1/coupons/:id/usages", get(list_usages))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "coupon-service"}))
}

fn store_error(e: StoreError) -> (StatusCode, String) {
    let status = match &e {
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::DuplicateCode => StatusCode::CONFLICT,
        StoreError::InvalidPercentage => StatusCode::UNPROCESSABLE_ENTITY,
        StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

// =============================================================================
// Checkout-facing endpoints
// =============================================================================

/// A platform purchase carries `scope` + `amount`; a storefront purchase
/// carries `tenant_id` + `cart_items`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PurchasePayload {
    Platform { scope: PurchaseKind, amount: Decimal },
    Store { tenant_id: Uuid, cart_items: Vec<CartItem> },
}

impl From<PurchasePayload> for Purchase {
    fn from(payload: PurchasePayload) -> Self {
        match payload {
            PurchasePayload::Platform { scope, amount } => Purchase::Platform { target: scope, amount },
            PurchasePayload::Store { tenant_id, cart_items } => Purchase::Cart { tenant_id, items: cart_items },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub actor_id: Option<String>,
    #[serde(flatten)]
    pub purchase: PurchasePayload,
}

/// Business rejections answer 200 with `valid: false`; only infrastructure
/// failures produce a non-2xx.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ValidateCouponResponse {
    Valid {
        valid: bool,
        coupon_id: Uuid,
        discount_amount: Decimal,
        code: String,
        name: String,
    },
    Invalid {
        valid: bool,
        error: String,
    },
}

async fn validate_coupon(
    State(s): State<AppState>,
    Json(req): Json<ValidateCouponRequest>,
) -> Result<Json<ValidateCouponResponse>, (StatusCode, String)> {
    let purchase = Purchase::from(req.purchase);
    match s
        .validator
        .validate(&req.code, req.actor_id.as_deref(), &purchase)
        .await
    {
        Ok(Validation::Approved { coupon, discount }) => Ok(Json(ValidateCouponResponse::Valid {
            valid: true,
            coupon_id: coupon.id,
            discount_amount: discount,
            code: coupon.code,
            name: coupon.name,
        })),
        Ok(Validation::Rejected(reason)) => {
            tracing::info!(code = %req.code, reason = %reason, "coupon validation rejected");
            Ok(Json(ValidateCouponResponse::Invalid {
                valid: false,
                error: reason.to_string(),
            }))
        }
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
pub struct RedeemCouponRequest {
    pub coupon_id: Uuid,
    pub actor_id: String,
    pub tenant_id: Option<Uuid>,
    pub discount_applied: Decimal,
    pub applied_to: String,
}

#[derive(Debug, Serialize)]
pub struct RedeemCouponResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn redeem_coupon(
    State(s): State<AppState>,
    Json(req): Json<RedeemCouponRequest>,
) -> (StatusCode, Json<RedeemCouponResponse>) {
    let redemption = Redemption {
        coupon_id: req.coupon_id,
        actor_id: req.actor_id,
        tenant_id: req.tenant_id,
        discount_applied: req.discount_applied,
        applied_to: req.applied_to,
    };
    match s.redeemer.redeem(&redemption).await {
        Ok(()) => (
            StatusCode::OK,
            Json(RedeemCouponResponse { success: true, error: None }),
        ),
        Err(e) => {
            // Redemption runs after payment; failures are operational, not
            // customer-facing.
            tracing::error!(coupon_id = %redemption.coupon_id, error = %e, "redemption failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RedeemCouponResponse { success: false, error: Some(e.to_string()) }),
            )
        }
    }
}

// =============================================================================
// Admin endpoints
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub tenant_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

async fn list_coupons(
    State(s): State<AppState>,
    Query(p): Query<ListParams>,
) -> Result<Json<PaginatedResponse<Coupon>>, (StatusCode, String)> {
    let page = p.page.unwrap_or(1).max(1);
    let per_page = p.per_page.unwrap_or(20).min(100);
    let (coupons, total) = s
        .coupons
        .list(p.tenant_id, page, per_page)
        .await
        .map_err(store_error)?;
    Ok(Json(PaginatedResponse { data: coupons, total, page }))
}

async fn create_coupon(
    State(s): State<AppState>,
    Json(req): Json<NewCoupon>,
) -> Result<(StatusCode, Json<Coupon>), (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    let coupon = s.coupons.create(&req).await.map_err(store_error)?;
    tracing::info!(coupon_id = %coupon.id, code = %coupon.code, "coupon created");
    Ok((StatusCode::CREATED, Json(coupon)))
}

async fn get_coupon(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Coupon>, (StatusCode, String)> {
    s.coupons
        .find_by_id(id)
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "coupon not found".to_string()))
}

async fn update_coupon(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CouponUpdate>,
) -> Result<Json<Coupon>, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    let coupon = s.coupons.update(id, &req).await.map_err(store_error)?;
    Ok(Json(coupon))
}

async fn delete_coupon(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    s.coupons.delete(id).await.map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn coupon_stats(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CouponStats>, (StatusCode, String)> {
    let stats = s.ledger.stats_for_coupon(id).await.map_err(store_error)?;
    Ok(Json(stats))
}

async fn list_usages(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<UsageRecord>>, (StatusCode, String)> {
    let records = s.ledger.list_for_coupon(id).await.map_err(store_error)?;
    Ok(Json(records))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_request_platform_shape() {
        let json = r#"{"code": "WELCOME10", "actor_id": "user-1", "scope": "membership", "amount": 120.5}"#;
        let req: ValidateCouponRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.code, "WELCOME10");
        match req.purchase {
            PurchasePayload::Platform { scope, amount } => {
                assert_eq!(scope, PurchaseKind::Membership);
                assert_eq!(amount, Decimal::new(1205, 1));
            }
            PurchasePayload::Store { .. } => panic!("expected platform purchase"),
        }
    }

    #[test]
    fn test_validate_request_cart_shape() {
        let tenant = Uuid::new_v4();
        let product = Uuid::new_v4();
        let json = format!(
            r#"{{"code": "SAVE20", "tenant_id": "{tenant}", "cart_items": [{{"product_id": "{product}", "quantity": 2, "unit_price": 49.99}}]}}"#
        );
        let req: ValidateCouponRequest = serde_json::from_str(&json).unwrap();
        assert!(req.actor_id.is_none());
        match req.purchase {
            PurchasePayload::Store { tenant_id, cart_items } => {
                assert_eq!(tenant_id, tenant);
                assert_eq!(cart_items.len(), 1);
                assert_eq!(cart_items[0].quantity, 2);
                assert!(cart_items[0].category_ids.is_empty());
            }
            PurchasePayload::Platform { .. } => panic!("expected store purchase"),
        }
    }

    #[test]
    fn test_validate_response_shapes() {
        let id = Uuid::new_v4();
        let valid = ValidateCouponResponse::Valid {
            valid: true,
            coupon_id: id,
            discount_amount: Decimal::new(40, 0),
            code: "SAVE20".into(),
            name: "Save 20%".into(),
        };
        let json = serde_json::to_value(&valid).unwrap();
        assert_eq!(json["valid"], true);
        assert_eq!(json["discount_amount"], serde_json::json!("40"));

        let invalid = ValidateCouponResponse::Invalid {
            valid: false,
            error: "coupon has expired".into(),
        };
        let json = serde_json::to_value(&invalid).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["error"], "coupon has expired");
        assert!(json.get("coupon_id").is_none());
    }

    #[test]
    fn test_redeem_response_omits_error_on_success() {
        let ok = RedeemCouponResponse { success: true, error: None };
        assert_eq!(serde_json::to_string(&ok).unwrap(), r#"{"success":true}"#);
    }
}
