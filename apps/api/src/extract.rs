//! # Request Extractors
//!
//! Wrappers over axum's extractors that reject with [`ApiError`], so a bad
//! header or body gets the same JSON error shape as an engine failure.
//!
//! ```text
//! X-Principal-Type: merchant      ──► AuthPrincipal(Principal::merchant("m-1"))
//! X-Principal-Id:   m-1
//! ```

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use receets_engine::{Principal, PrincipalKind};

pub const PRINCIPAL_TYPE_HEADER: &str = "x-principal-type";
pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";

// =============================================================================
// Principal
// =============================================================================

/// The caller, as asserted by the upstream authenticator.
#[derive(Debug, Clone)]
pub struct AuthPrincipal(pub Principal);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    let value = parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::unauthenticated(format!("Missing {} header", name)))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::unauthenticated(format!("Malformed {} header", name)))?
        .trim();
    if value.is_empty() {
        return Err(ApiError::unauthenticated(format!("Empty {} header", name)));
    }
    Ok(value)
}

impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let kind: PrincipalKind = header(parts, PRINCIPAL_TYPE_HEADER)?
            .parse()
            .map_err(|e: receets_engine::EngineError| ApiError::unauthenticated(e.to_string()))?;
        let id = header(parts, PRINCIPAL_ID_HEADER)?.to_string();
        Ok(AuthPrincipal(Principal { kind, id }))
    }
}

// =============================================================================
// Bodies & Queries
// =============================================================================

/// A required JSON body.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        Ok(JsonBody(value))
    }
}

/// A JSON body the client may leave out entirely.
#[derive(Debug)]
pub struct OptionalJson<T>(pub Option<T>);

impl<S, T> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(None));
        }
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::validation(format!("Invalid JSON body: {}", e)))?;
        Ok(OptionalJson(Some(value)))
    }
}

/// Query-string parameters.
#[derive(Debug)]
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        Ok(QueryParams(value))
    }
}
