// ============================================================================
// Remote Cart Gateway
// ============================================================================
//
// The engine only ever talks to the server-side cart through this trait.
// Implementations return the server-canonical snapshot or a classified
// `GatewayError`; the engine maps those into `CartError`.
//
// ============================================================================

pub mod config;
pub mod http;
pub mod memory;
pub mod scripted;

pub use config::HttpGatewayConfig;
pub use http::HttpCartGateway;
pub use memory::InMemoryCartGateway;
pub use scripted::{GatewayCall, PendingCall, ScriptedCartGateway};

use crate::core::{CartError, CartSnapshot, ServerLineId, UserId, VariantKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("{message}")]
    Rejected {
        message: String,
        available_quantity: Option<u32>,
    },

    #[error("{0}")]
    Unauthorized(String),

    #[error("malformed gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
            available_quantity: None,
        }
    }

    pub fn insufficient_stock(available: u32) -> Self {
        Self::Rejected {
            message: format!("only {} item(s) available", available),
            available_quantity: Some(available),
        }
    }
}

impl From<GatewayError> for CartError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected {
                message,
                available_quantity,
            } => CartError::GatewayRejected {
                message,
                available_quantity,
            },
            GatewayError::Unauthorized(message) => CartError::Unauthorized { message },
            GatewayError::Transport(message) => CartError::GatewayRejected {
                message: format!("network failure: {}", message),
                available_quantity: None,
            },
            GatewayError::Decode(message) => CartError::GatewayRejected {
                message: format!("unexpected gateway response: {}", message),
                available_quantity: None,
            },
        }
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Body of a remote add. The variant fields are flattened onto the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLineRequest {
    pub product_id: String,
    /// Remote variant identifier: the size, when the product has sizes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    #[serde(flatten)]
    pub variant: VariantKey,
    pub quantity: u32,
}

impl AddLineRequest {
    pub fn new(product_id: impl Into<String>, variant: VariantKey, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: variant.size.clone(),
            variant,
            quantity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayCallKind {
    Fetch,
    Add,
    UpdateQuantity,
    Remove,
    Clear,
}

impl fmt::Display for GatewayCallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GatewayCallKind::Fetch => "fetch",
            GatewayCallKind::Add => "add",
            GatewayCallKind::UpdateQuantity => "update_quantity",
            GatewayCallKind::Remove => "remove",
            GatewayCallKind::Clear => "clear",
        };
        f.write_str(name)
    }
}

/// Server-side cart as seen by the engine.
#[async_trait]
pub trait RemoteCartGateway: Send + Sync {
    /// Full authoritative line list.
    async fn fetch(&self, user: &UserId) -> GatewayResult<CartSnapshot>;

    /// Inserts or merges a line and returns the snapshot after the change.
    async fn add(&self, user: &UserId, request: AddLineRequest) -> GatewayResult<CartSnapshot>;

    /// Sets a line's quantity. May reject with an `available_quantity` hint.
    async fn update_quantity(
        &self,
        user: &UserId,
        line: &ServerLineId,
        quantity: u32,
    ) -> GatewayResult<Option<CartSnapshot>>;

    async fn remove(&self, user: &UserId, line: &ServerLineId) -> GatewayResult<()>;

    async fn clear(&self, user: &UserId) -> GatewayResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_keeps_available_quantity() {
        let err: CartError = GatewayError::insufficient_stock(3).into();
        assert_eq!(err.available_quantity(), Some(3));

        let err: CartError = GatewayError::Transport("connection reset".into()).into();
        assert!(matches!(err, CartError::GatewayRejected { .. }));
        assert_eq!(err.available_quantity(), None);

        let err: CartError = GatewayError::Unauthorized("expired".into()).into();
        assert!(matches!(err, CartError::Unauthorized { .. }));
    }

    #[test]
    fn test_add_request_wire_shape() {
        let request = AddLineRequest::new("P1", VariantKey::new(Some("red"), Some("M")), 2);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["productId"], "P1");
        assert_eq!(json["variantId"], "M");
        assert_eq!(json["color"], "red");
        assert_eq!(json["size"], "M");
        assert_eq!(json["quantity"], 2);

        let decoded: AddLineRequest = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_add_request_without_size_omits_variant_id() {
        let request = AddLineRequest::new("P1", VariantKey::color("red"), 1);
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("variantId").is_none());
        assert_eq!(json["color"], "red");
    }
}
