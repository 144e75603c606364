use serde::Serialize;
use thiserror::Error;

use super::types::{LocalId, VariantKey};

/// Classified cart failure.
///
/// Every mutation failure ends up as one of these values, either in the
/// returned outcome or in the engine's error map. None of them is fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartError {
    #[error("Cart line '{local_id}' not found")]
    NotFound { local_id: LocalId },

    #[error("Invalid quantity {quantity}: cart lines must hold at least one item")]
    InvalidQuantity { quantity: u32 },

    #[error("Gateway rejected request: {message}")]
    GatewayRejected {
        message: String,
        available_quantity: Option<u32>,
    },

    #[error("Gateway response is missing line '{product_id}' ({variant})")]
    ReconciliationMismatch {
        product_id: String,
        variant: VariantKey,
    },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Operation '{op_id}' has no recorded failure")]
    UnknownOperation { op_id: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CartError {
    /// Server-reported ceiling for a quantity-constraint failure.
    pub fn available_quantity(&self) -> Option<u32> {
        match self {
            CartError::GatewayRejected {
                available_quantity, ..
            } => *available_quantity,
            _ => None,
        }
    }

    /// True when the UI should clamp and retry instead of showing a generic failure.
    pub fn is_constraint_violation(&self) -> bool {
        self.available_quantity().is_some()
    }

    /// Precondition failures are reported before any state is touched.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            CartError::NotFound { .. } | CartError::InvalidQuantity { .. }
        )
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_quantity_only_on_rejections() {
        let rejected = CartError::GatewayRejected {
            message: "out of stock".to_string(),
            available_quantity: Some(3),
        };
        assert_eq!(rejected.available_quantity(), Some(3));
        assert!(rejected.is_constraint_violation());

        let missing = CartError::NotFound {
            local_id: LocalId::new(7),
        };
        assert_eq!(missing.available_quantity(), None);
        assert!(missing.is_precondition());
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let err = CartError::GatewayRejected {
            message: "stock".to_string(),
            available_quantity: Some(2),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "gateway_rejected");
        assert_eq!(json["available_quantity"], 2);
    }
}
