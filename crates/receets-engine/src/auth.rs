//! # Principals
//!
//! Who a request acts for. Authentication happens upstream; the engine only
//! checks that an already-authenticated principal owns what it touches.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use receets_core::Sale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    Merchant,
    Customer,
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrincipalKind::Merchant => write!(f, "merchant"),
            PrincipalKind::Customer => write!(f, "customer"),
        }
    }
}

impl std::str::FromStr for PrincipalKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "merchant" => Ok(PrincipalKind::Merchant),
            "customer" => Ok(PrincipalKind::Customer),
            other => Err(EngineError::validation(format!(
                "Unknown principal type: '{}'. Valid options: merchant, customer",
                other
            ))),
        }
    }
}

/// An authenticated merchant or customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub kind: PrincipalKind,
    pub id: String,
}

impl Principal {
    pub fn merchant(id: impl Into<String>) -> Self {
        Principal {
            kind: PrincipalKind::Merchant,
            id: id.into(),
        }
    }

    pub fn customer(id: impl Into<String>) -> Self {
        Principal {
            kind: PrincipalKind::Customer,
            id: id.into(),
        }
    }

    pub fn is_merchant(&self, merchant_id: &str) -> bool {
        self.kind == PrincipalKind::Merchant && self.id == merchant_id
    }

    /// Requires a merchant principal and returns its id.
    pub fn require_merchant(&self) -> EngineResult<&str> {
        match self.kind {
            PrincipalKind::Merchant => Ok(&self.id),
            PrincipalKind::Customer => Err(EngineError::permission(
                "Only merchants can perform this operation",
            )),
        }
    }

    /// Requires a customer principal and returns its id.
    pub fn require_customer(&self) -> EngineResult<&str> {
        match self.kind {
            PrincipalKind::Customer => Ok(&self.id),
            PrincipalKind::Merchant => Err(EngineError::permission(
                "Only customers can perform this operation",
            )),
        }
    }

    /// The merchant that owns `merchant_id` only.
    pub fn ensure_merchant_owner(&self, merchant_id: &str) -> EngineResult<()> {
        if self.is_merchant(merchant_id) {
            Ok(())
        } else {
            Err(EngineError::permission(format!(
                "Not authorized for merchant {}",
                merchant_id
            )))
        }
    }

    /// The owning merchant or the linked customer may read a sale.
    pub fn ensure_can_view(&self, sale: &Sale) -> EngineResult<()> {
        let allowed = match self.kind {
            PrincipalKind::Merchant => sale.merchant_id == self.id,
            PrincipalKind::Customer => sale.customer_id.as_deref() == Some(self.id.as_str()),
        };
        if allowed {
            Ok(())
        } else {
            Err(EngineError::permission(format!(
                "Not authorized to access sale {}",
                sale.id
            )))
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
