//! # HTTP Routes
//!
//! ```text
//! /health                                      liveness + database check
//! /api/pos/*        pos.rs                     register-side sale flow and returns
//! /api/payments/*   payments.rs                tenders, gateway charges, refunds
//! /api/sales/*      sales.rs                   reads, receipts, voids
//! /api/merchant*, /api/customers*, /api/qrcode/*
//!                   registry.rs                accounts, locations, QR codes
//! ```
//!
//! Every success body carries `"success": true`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

pub mod payments;
pub mod pos;
pub mod registry;
pub mod sales;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // POS
        .route("/api/pos/sales", post(pos::initiate_sale))
        .route("/api/pos/sales/{sale_id}", put(pos::update_sale))
        .route("/api/pos/sales/{sale_id}/payment", post(pos::apply_payment))
        .route("/api/pos/returns/eligible", get(pos::eligible_returns))
        .route("/api/pos/returns", post(pos::process_return))
        // Payments
        .route("/api/payments/gateway", post(payments::gateway_payment))
        .route("/api/payments/gateway/confirm", post(payments::confirm_gateway_payment))
        .route("/api/payments/cash", post(payments::cash_payment))
        .route("/api/payments/card", post(payments::card_payment))
        .route("/api/payments/refund", post(payments::process_refund))
        // Sales
        .route("/api/sales/merchant", get(sales::list_merchant_sales))
        .route("/api/sales/customer", get(sales::list_customer_sales))
        .route("/api/sales/{sale_id}", get(sales::get_sale))
        .route("/api/sales/{sale_id}/receipt", get(sales::generate_receipt))
        .route("/api/sales/{sale_id}/void", put(sales::void_sale))
        // Registry
        .route("/api/merchants", post(registry::register_merchant))
        .route("/api/merchants/{merchant_id}", get(registry::get_merchant))
        .route("/api/customers", post(registry::register_customer))
        .route("/api/customers/{customer_id}", get(registry::get_customer))
        .route(
            "/api/merchant/locations",
            get(registry::list_locations).post(registry::add_location),
        )
        .route(
            "/api/merchant/locations/{location_id}",
            put(registry::update_location),
        )
        .route(
            "/api/qrcode/generate/{merchant_id}/{location_id}",
            post(registry::generate_qr_code),
        )
        .route("/api/qrcode/validate", post(registry::validate_qr_code))
        .route(
            "/api/qrcode/{merchant_id}/{location_id}",
            get(registry::get_qr_code),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    if state.engine.database().health_check().await {
        (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "database": "ok" })),
        )
    } else {
        warn!("Health check failed: database unreachable");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "database": "unreachable" })),
        )
    }
}


#[cfg(test)]
mod tests {
    use super::testing::fixture;
    use super::*;

    #[tokio::test]
    async fn test_health_reports_database() {
        let fx = fixture().await;
        let response = health(fx.state()).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_router_builds() {
        let fx = fixture().await;
        let _router: Router = router(fx.state.clone());
    }
}
