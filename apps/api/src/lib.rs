//! # receets-api: HTTP Surface
//!
//! Exposes every [`receets_engine::PosEngine`] operation as JSON over HTTP.
//!
//! ## Request Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  upstream authenticator                                                 │
//! │       │  X-Principal-Type / X-Principal-Id                              │
//! │       ▼                                                                 │
//! │  axum Router ──► extract::{AuthPrincipal, JsonBody, QueryParams}        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  routes::* ──► PosEngine ──► Result<Json, ApiError>                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::router;
pub use state::AppState;
