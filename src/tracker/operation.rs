use crate::core::{AddLineInput, CartError, LocalId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Identity of one mutation attempt. Fresh for every attempt, retries included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct OpId(Uuid);

impl OpId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OpId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Add,
    Remove,
    UpdateQuantity,
    Clear,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Add => "add",
            OperationKind::Remove => "remove",
            OperationKind::UpdateQuantity => "update_quantity",
            OperationKind::Clear => "clear",
        };
        f.write_str(name)
    }
}

/// What the caller asked for. Kept so a failed operation can be retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationIntent {
    Add { input: AddLineInput },
    Remove { local_id: LocalId },
    UpdateQuantity { local_id: LocalId, quantity: u32 },
    Clear,
}

impl OperationIntent {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationIntent::Add { .. } => OperationKind::Add,
            OperationIntent::Remove { .. } => OperationKind::Remove,
            OperationIntent::UpdateQuantity { .. } => OperationKind::UpdateQuantity,
            OperationIntent::Clear => OperationKind::Clear,
        }
    }
}

/// A terminal failure as exposed to callers until dismissed or retried.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub op_id: OpId,
    pub kind: OperationKind,
    pub error: CartError,
    pub intent: OperationIntent,
    pub failed_at: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

/// Result of one engine mutation. Serializes as
/// `{"success": bool, "error"?: string, "availableQuantity"?: u32, "opId": string}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "OutcomeBody")]
pub struct MutationOutcome {
    pub op_id: OpId,
    pub error: Option<CartError>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeBody {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_quantity: Option<u32>,
    op_id: OpId,
}

impl From<MutationOutcome> for OutcomeBody {
    fn from(outcome: MutationOutcome) -> Self {
        Self {
            success: outcome.success(),
            error: outcome.error_message(),
            available_quantity: outcome.error.as_ref().and_then(CartError::available_quantity),
            op_id: outcome.op_id,
        }
    }
}

impl MutationOutcome {
    pub fn ok(op_id: OpId) -> Self {
        Self { op_id, error: None }
    }

    pub fn failed(op_id: OpId, error: CartError) -> Self {
        Self {
            op_id,
            error: Some(error),
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn into_result(self) -> crate::core::Result<OpId> {
        match self.error {
            None => Ok(self.op_id),
            Some(err) => Err(err),
        }
    }
}
