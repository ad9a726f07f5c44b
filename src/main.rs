//! Coupon Service - validation and redemption for storefront checkouts

use anyhow::Result;
use coupon_service::http::{self, AppState};
use coupon_service::service::{Redeemer, Validator};
use coupon_service::store::{CouponStore, UsageLedger};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&std::env::var("DATABASE_URL")?)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match std::env::var("NATS_URL") {
        Ok(url) => match async_nats::connect(&url).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, redemption events disabled");
                None
            }
        },
        Err(_) => None,
    };

    let coupons = CouponStore::new(db.clone());
    let ledger = UsageLedger::new(db.clone());
    let state = AppState {
        validator: Validator::new(coupons.clone(), ledger.clone()),
        redeemer: Redeemer::new(db, coupons.clone(), ledger.clone(), nats),
        coupons,
        ledger,
    };

    let app = http::router(state);
    let port = std::env::var("PORT").unwrap_or_else(|_| "8084".to_string());
    tracing::info!("coupon-service listening on 0.0.0.0:{}", port);
    axum::serve(
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?,
        app,
    )
    .await?;
    Ok(())
}
