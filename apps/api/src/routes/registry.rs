//! Merchant and customer accounts, store locations and QR check-in codes.
//!
//! Registration and QR validation are open; everything else needs a principal.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::extract::{AuthPrincipal, JsonBody, OptionalJson};
use crate::state::AppState;
use receets_core::QrType;
use receets_engine::service::{LocationUpdate, NewLocation, RegisterCustomer, RegisterMerchant};

#[derive(Debug, Default, Deserialize)]
pub struct GenerateQrRequest {
    #[serde(rename = "type")]
    pub qr_type: Option<QrType>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateQrRequest {
    pub code: String,
}

// =============================================================================
// Accounts
// =============================================================================

/// POST /api/merchants
pub async fn register_merchant(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterMerchant>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let merchant = state.engine.register_merchant(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Merchant registered successfully",
            "merchant": merchant,
        })),
    ))
}

/// GET /api/merchants/{merchant_id}
pub async fn get_merchant(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(merchant_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let merchant = state.engine.get_merchant(&principal, &merchant_id).await?;
    Ok(Json(json!({ "success": true, "merchant": merchant })))
}

/// POST /api/customers
pub async fn register_customer(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterCustomer>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let customer = state.engine.register_customer(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Customer registered successfully",
            "customer": customer,
        })),
    ))
}

/// GET /api/customers/{customer_id}
pub async fn get_customer(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(customer_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let customer = state.engine.get_customer(&principal, &customer_id).await?;
    Ok(Json(json!({ "success": true, "customer": customer })))
}

// =============================================================================
// Locations
// =============================================================================

/// GET /api/merchant/locations
pub async fn list_locations(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> ApiResult<Json<Value>> {
    let locations = state.engine.list_locations(&principal).await?;
    Ok(Json(json!({ "success": true, "locations": locations })))
}

/// POST /api/merchant/locations
pub async fn add_location(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    JsonBody(request): JsonBody<NewLocation>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let location = state.engine.add_location(&principal, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Location added successfully",
            "location": location,
        })),
    ))
}

/// PUT /api/merchant/locations/{location_id}
pub async fn update_location(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(location_id): Path<String>,
    JsonBody(update): JsonBody<LocationUpdate>,
) -> ApiResult<Json<Value>> {
    let location = state
        .engine
        .update_location(&principal, &location_id, update)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Location updated successfully",
        "location": location,
    })))
}

// =============================================================================
// QR Codes
// =============================================================================

/// POST /api/qrcode/generate/{merchant_id}/{location_id}
pub async fn generate_qr_code(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path((merchant_id, location_id)): Path<(String, String)>,
    OptionalJson(body): OptionalJson<GenerateQrRequest>,
) -> ApiResult<Json<Value>> {
    let qr_type = body.unwrap_or_default().qr_type;
    let payload = state
        .engine
        .generate_qr_code(&principal, &merchant_id, &location_id, qr_type)
        .await?;
    Ok(Json(json!({
        "success": true,
        "qrCodeId": payload.code,
        "data": payload,
    })))
}

/// GET /api/qrcode/{merchant_id}/{location_id}
pub async fn get_qr_code(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path((merchant_id, location_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let payload = state
        .engine
        .get_qr_code(&principal, &merchant_id, &location_id)
        .await?;
    Ok(Json(json!({
        "success": true,
        "qrCodeId": payload.code,
        "data": payload,
    })))
}

/// POST /api/qrcode/validate
pub async fn validate_qr_code(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ValidateQrRequest>,
) -> ApiResult<Json<Value>> {
    let validation = state.engine.validate_qr_code(request.code.trim()).await?;
    Ok(Json(json!({
        "success": true,
        "merchantId": validation.merchant_id,
        "merchantName": validation.merchant_name,
        "location": validation.location,
        "type": validation.qr_type,
    })))
}
