//! Payment routes: gateway charges and their confirmation, manual tenders,
//! refunds.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::extract::{AuthPrincipal, JsonBody};
use crate::state::AppState;
use receets_engine::service::{
    CardPayment, CashPayment, ConfirmGatewayPayment, GatewayPaymentRequest, ProcessRefund,
};

/// Body of `POST /api/payments/refund`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    /// The return sale being refunded.
    pub sale_id: String,
    #[serde(flatten)]
    pub refund: ProcessRefund,
}

/// POST /api/payments/gateway
pub async fn gateway_payment(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    JsonBody(request): JsonBody<GatewayPaymentRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = state.engine.gateway_payment(&principal, request).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Payment processed successfully",
        "sale": outcome.sale,
        "paymentIntent": outcome.payment_intent,
    })))
}

/// POST /api/payments/gateway/confirm
pub async fn confirm_gateway_payment(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    JsonBody(request): JsonBody<ConfirmGatewayPayment>,
) -> ApiResult<Json<Value>> {
    let sale = state
        .engine
        .confirm_gateway_payment(&principal, request)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Payment confirmed",
        "sale": sale,
    })))
}

/// POST /api/payments/cash
pub async fn cash_payment(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    JsonBody(request): JsonBody<CashPayment>,
) -> ApiResult<Json<Value>> {
    let sale = state.engine.cash_payment(&principal, request).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Cash payment recorded",
        "sale": sale,
    })))
}

/// POST /api/payments/card
pub async fn card_payment(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    JsonBody(request): JsonBody<CardPayment>,
) -> ApiResult<Json<Value>> {
    let sale = state.engine.card_payment(&principal, request).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Card payment recorded",
        "sale": sale,
    })))
}

/// POST /api/payments/refund
pub async fn process_refund(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    JsonBody(request): JsonBody<RefundRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = state
        .engine
        .process_refund(&principal, &request.sale_id, request.refund)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Refund processed successfully",
        "refund": outcome.refund,
        "sale": outcome.sale,
        "originalSale": outcome.original_sale,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::routes::pos;
    use crate::routes::testing::{field, fixture, Fixture};
    use axum::extract::Path;
    use axum::http::StatusCode;
    use receets_core::totals::LineItemInput;
    use receets_core::SaleType;
    use receets_engine::service::{InitiateSale, ProcessReturn, UpdateSale};

    async fn open_sale(fx: &Fixture) -> String {
        let (_, created) = pos::initiate_sale(
            fx.state(),
            fx.as_merchant(),
            JsonBody(InitiateSale {
                location_id: fx.location_id.clone(),
                customer_id: Some(fx.customer.id.clone()),
                customer_code: None,
                sale_type: SaleType::Purchase,
                line_items: vec![LineItemInput::new("p-1", "Mug", 1, 1500)],
                promo_code: None,
                notes: None,
                cashier_id: None,
                cashier_name: None,
            }),
        )
        .await
        .unwrap();
        field(&created, "/sale/id").as_str().unwrap().to_string()
    }

    #[test]
    fn test_refund_body_shape() {
        let request: RefundRequest = serde_json::from_value(json!({
            "saleId": "s-1",
            "amountCents": 500,
            "reason": "damaged",
        }))
        .unwrap();
        assert_eq!(request.sale_id, "s-1");
        assert_eq!(request.refund.amount_cents, 500);
        assert_eq!(request.refund.reason.as_deref(), Some("damaged"));
    }

    #[tokio::test]
    async fn test_split_tender() {
        let fx = fixture().await;
        let sale_id = open_sale(&fx).await;

        let partial = card_payment(
            fx.state(),
            fx.as_merchant(),
            JsonBody(CardPayment {
                sale_id: sale_id.clone(),
                amount_cents: 1000,
                card_brand: Some("visa".to_string()),
                last4: Some("4242".to_string()),
                transaction_id: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(field(&partial, "/sale/status"), json!("in_progress"));

        let paid = cash_payment(
            fx.state(),
            fx.as_merchant(),
            JsonBody(CashPayment {
                sale_id,
                amount_cents: 500,
                tendered_cents: Some(2000),
            }),
        )
        .await
        .unwrap();
        assert_eq!(field(&paid, "/sale/status"), json!("completed"));
        assert_eq!(field(&paid, "/sale/payments/1/method"), json!("cash"));
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_is_bad_gateway() {
        let fx = fixture().await;
        let sale_id = open_sale(&fx).await;

        let err = gateway_payment(
            fx.state(),
            fx.as_merchant(),
            JsonBody(GatewayPaymentRequest {
                sale_id,
                payment_method_id: "pm_card_visa".to_string(),
                customer_id: None,
                amount_cents: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentGatewayError);
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_cash_refund_of_return() {
        let fx = fixture().await;
        let sale_id = open_sale(&fx).await;
        cash_payment(
            fx.state(),
            fx.as_merchant(),
            JsonBody(CashPayment {
                sale_id: sale_id.clone(),
                amount_cents: 1500,
                tendered_cents: None,
            }),
        )
        .await
        .unwrap();

        let (_, returned) = pos::process_return(
            fx.state(),
            fx.as_merchant(),
            JsonBody(ProcessReturn {
                original_sale_id: sale_id.clone(),
                line_items: vec![LineItemInput::new("p-1", "Mug", 1, 1500)],
                location_id: None,
                customer_id: None,
                customer_code: None,
                cashier_id: None,
                cashier_name: None,
                notes: None,
            }),
        )
        .await
        .unwrap();
        let return_id = field(&returned, "/sale/id").as_str().unwrap().to_string();
        pos::update_sale(
            fx.state(),
            fx.as_merchant(),
            Path(return_id.clone()),
            JsonBody(UpdateSale {
                status: Some(receets_core::SaleStatus::Completed),
                ..UpdateSale::default()
            }),
        )
        .await
        .unwrap();

        let refunded = process_refund(
            fx.state(),
            fx.as_merchant(),
            JsonBody(RefundRequest {
                sale_id: return_id,
                refund: ProcessRefund {
                    amount_cents: 1500,
                    reason: Some("Cracked".to_string()),
                },
            }),
        )
        .await
        .unwrap();
        assert_eq!(field(&refunded, "/refund/method"), json!("cash"));
        assert_eq!(field(&refunded, "/refund/amountCents"), json!(1500));
        assert_eq!(field(&refunded, "/originalSale/id"), json!(sale_id));
    }
}
