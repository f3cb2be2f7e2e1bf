//! Sale reads, receipts and voids.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::extract::{AuthPrincipal, OptionalJson, QueryParams};
use crate::state::AppState;
use receets_engine::service::{CustomerSalesQuery, MerchantSalesQuery};

#[derive(Debug, Default, Deserialize)]
pub struct VoidRequest {
    pub reason: Option<String>,
}

/// GET /api/sales/merchant
pub async fn list_merchant_sales(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    QueryParams(query): QueryParams<MerchantSalesQuery>,
) -> ApiResult<Json<Value>> {
    let page = state.engine.list_merchant_sales(&principal, query).await?;
    Ok(Json(json!({
        "success": true,
        "sales": page.sales,
        "pagination": page.pagination,
    })))
}

/// GET /api/sales/customer
pub async fn list_customer_sales(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    QueryParams(query): QueryParams<CustomerSalesQuery>,
) -> ApiResult<Json<Value>> {
    let page = state.engine.list_customer_sales(&principal, query).await?;
    Ok(Json(json!({
        "success": true,
        "sales": page.sales,
        "pagination": page.pagination,
    })))
}

/// GET /api/sales/{sale_id}
pub async fn get_sale(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(sale_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let sale = state.engine.get_sale(&principal, &sale_id).await?;
    Ok(Json(json!({ "success": true, "sale": sale })))
}

/// GET /api/sales/{sale_id}/receipt
pub async fn generate_receipt(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(sale_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let document = state.engine.generate_receipt(&principal, &sale_id).await?;
    Ok(Json(json!({
        "success": true,
        "receipt": document.receipt,
        "receiptUrl": document.receipt_url,
    })))
}

/// PUT /api/sales/{sale_id}/void
///
/// The body is optional; `{"reason": "..."}` is appended to the sale notes.
pub async fn void_sale(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(sale_id): Path<String>,
    OptionalJson(body): OptionalJson<VoidRequest>,
) -> ApiResult<Json<Value>> {
    let body = body.unwrap_or_default();
    let sale = state
        .engine
        .void_sale(&principal, &sale_id, body.reason.as_deref())
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Sale voided successfully",
        "sale": sale,
    })))
}
