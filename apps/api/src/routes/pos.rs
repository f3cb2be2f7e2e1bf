//! Register-side routes: open and edit sales, take payments, start returns.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ApiResult;
use crate::extract::{AuthPrincipal, JsonBody, QueryParams};
use crate::state::AppState;
use receets_engine::service::{
    EligibleReturnsQuery, InitiateSale, PaymentRequest, ProcessReturn, UpdateSale,
};

/// POST /api/pos/sales
pub async fn initiate_sale(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    JsonBody(request): JsonBody<InitiateSale>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let sale = state.engine.initiate_sale(&principal, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Sale initiated successfully",
            "sale": sale,
        })),
    ))
}

/// PUT /api/pos/sales/{sale_id}
pub async fn update_sale(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(sale_id): Path<String>,
    JsonBody(update): JsonBody<UpdateSale>,
) -> ApiResult<Json<Value>> {
    let sale = state.engine.update_sale(&principal, &sale_id, update).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Sale updated successfully",
        "sale": sale,
    })))
}

/// POST /api/pos/sales/{sale_id}/payment
pub async fn apply_payment(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(sale_id): Path<String>,
    JsonBody(request): JsonBody<PaymentRequest>,
) -> ApiResult<Json<Value>> {
    debug!(sale_id = %sale_id, method = %request.method, "Payment received");
    let sale = state.engine.apply_payment(&principal, &sale_id, request).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Payment applied successfully",
        "sale": sale,
    })))
}

/// GET /api/pos/returns/eligible
pub async fn eligible_returns(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    QueryParams(query): QueryParams<EligibleReturnsQuery>,
) -> ApiResult<Json<Value>> {
    let eligible = state.engine.eligible_returns(&principal, query).await?;
    Ok(Json(json!({
        "success": true,
        "returnPeriod": eligible.return_period_days,
        "eligibleSales": eligible.sales,
    })))
}

/// POST /api/pos/returns
pub async fn process_return(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    JsonBody(request): JsonBody<ProcessReturn>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let sale = state.engine.process_return(&principal, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Return processed successfully",
            "sale": sale,
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::routes::testing::{field, fixture, Fixture};
    use receets_core::totals::LineItemInput;
    use receets_core::{PaymentMethod, SaleType};

    fn purchase(fx: &Fixture) -> InitiateSale {
        InitiateSale {
            location_id: fx.location_id.clone(),
            customer_id: Some(fx.customer.id.clone()),
            customer_code: None,
            sale_type: SaleType::Purchase,
            line_items: vec![LineItemInput::new("p-1", "Coffee beans", 2, 1000).with_tax(100)],
            promo_code: None,
            notes: None,
            cashier_id: None,
            cashier_name: None,
        }
    }

    fn cash(amount_cents: i64) -> PaymentRequest {
        PaymentRequest {
            method: PaymentMethod::Cash,
            amount_cents,
            transaction_id: None,
            card_brand: None,
            last4: None,
            tendered_cents: None,
        }
    }

    #[tokio::test]
    async fn test_sale_checkout_flow() {
        let fx = fixture().await;
        let (status, created) = initiate_sale(fx.state(), fx.as_merchant(), JsonBody(purchase(&fx)))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(field(&created, "/sale/totalCents"), json!(2100));
        assert_eq!(field(&created, "/sale/status"), json!("draft"));
        let sale_id = field(&created, "/sale/id").as_str().unwrap().to_string();

        let paid = apply_payment(fx.state(), fx.as_merchant(), Path(sale_id.clone()), JsonBody(cash(2100)))
            .await
            .unwrap();
        assert_eq!(field(&paid, "/success"), json!(true));
        assert_eq!(field(&paid, "/sale/status"), json!("completed"));

        let err = apply_payment(fx.state(), fx.as_merchant(), Path(sale_id), JsonBody(cash(100)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
    }

    #[tokio::test]
    async fn test_customer_cannot_open_sales() {
        let fx = fixture().await;
        let err = initiate_sale(fx.state(), fx.as_customer(), JsonBody(purchase(&fx)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_return_and_eligibility() {
        let fx = fixture().await;
        let (_, created) = initiate_sale(fx.state(), fx.as_merchant(), JsonBody(purchase(&fx)))
            .await
            .unwrap();
        let sale_id = field(&created, "/sale/id").as_str().unwrap().to_string();
        apply_payment(fx.state(), fx.as_merchant(), Path(sale_id.clone()), JsonBody(cash(2100)))
            .await
            .unwrap();

        let eligible = eligible_returns(
            fx.state(),
            fx.as_merchant(),
            QueryParams(EligibleReturnsQuery {
                customer_id: Some(fx.customer.id.clone()),
                ..EligibleReturnsQuery::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(field(&eligible, "/returnPeriod"), json!(7));
        assert_eq!(field(&eligible, "/eligibleSales/0/id"), json!(sale_id));

        let (status, returned) = process_return(
            fx.state(),
            fx.as_merchant(),
            JsonBody(ProcessReturn {
                original_sale_id: sale_id,
                line_items: vec![LineItemInput::new("p-1", "Coffee beans", 1, 1000)],
                location_id: None,
                customer_id: None,
                customer_code: None,
                cashier_id: None,
                cashier_name: None,
                notes: Some("Damaged bag".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(field(&returned, "/sale/type"), json!("return"));
        assert_eq!(field(&returned, "/sale/totalCents"), json!(-1000));
    }
}
