//! Error taxonomy for sync operations
//!
//! Every failure from the source boundary resolves into one of these
//! variants. The controller catches all of them and converts them into
//! reported outcomes; they never propagate into the table or view layer
//! as raised faults.

use crate::source::EntityId;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// External system unreachable. Fatal to the current sync operation;
    /// reported once per refresh attempt, not retried automatically.
    #[error("attribute source unavailable")]
    SourceUnavailable,

    /// Entity identifier went stale between display and commit.
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    /// Attribute key absent on the entity (schema mismatch).
    #[error("attribute '{key}' not found on entity {entity}")]
    AttributeNotFound { entity: EntityId, key: String },

    /// External system rejected a write without mutating state.
    #[error("validation failed: {reason}")]
    ValidationError { reason: String },

    /// A bounded source call exceeded its time budget.
    #[error("operation timed out after {elapsed:?}")]
    OperationTimedOut { elapsed: Duration },

    /// Edit addressed to an entity/key pair outside the table's schema.
    #[error("unknown cell: entity {entity}, key '{key}'")]
    UnknownCell { entity: EntityId, key: String },
}
