//! Attribute source boundary
//!
//! Abstraction over an external mutable object graph (the scene). The
//! source exposes named-attribute read/write plus a change-notification
//! subscription. Callbacks fire synchronously on the mutating call's own
//! stack; the source performs no buffering or coalescing, that is the
//! controller's job.

pub mod bounded;
pub mod memory;

use crate::error::SyncError;
use crate::value::AttrValue;
use std::rc::Rc;

/// Pseudo-attribute key addressing an entity's display name.
///
/// Sources resolve reads and writes of this key against the display
/// name, applying their own rename normalization on write.
pub const NAME_KEY: &str = "name";

/// Stable unique identifier for an external entity.
///
/// Identifiers are immutable for the lifetime of the entity. Display
/// names may change at any time and must be re-resolved through the id,
/// never cached as a join key.
pub type EntityId = u64;

/// Handle returned by [`AttributeSource::subscribe`]
pub type SubscriptionId = usize;

/// Change-notification callback, invoked synchronously
pub type ChangeCallback = Rc<dyn Fn(&ChangeNotification)>;

/// Summary of an entity used for enumeration predicates
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDesc {
    pub id: EntityId,
    pub name: String,
    /// Source-side node type, e.g. "pointLight" or "mesh"
    pub kind: String,
}

/// Tagged change event raised by a source.
///
/// Consumed by the controller; past notifications are never retained.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeNotification {
    EntityCreated(EntityId),
    EntityDeleted(EntityId),
    AttributeChanged(EntityId, String),
    NameChanged(EntityId),
}

/// Contract for an external scene-like attribute store
pub trait AttributeSource {
    /// Enumerate matching entities in a stable source-side order
    fn list_entities(
        &self,
        predicate: &dyn Fn(&EntityDesc) -> bool,
    ) -> Result<Vec<EntityId>, SyncError>;

    /// Resolve an entity's current summary through its stable id
    fn describe(&self, entity: EntityId) -> Result<EntityDesc, SyncError>;

    /// Read the current committed value of one attribute
    fn read(&self, entity: EntityId, key: &str) -> Result<AttrValue, SyncError>;

    /// Write one attribute, validating against the source's own
    /// constraints. On success returns the *actual* stored value, which
    /// may differ from the requested one due to source-side
    /// normalization (e.g. name collision renaming). On failure the
    /// source state is unchanged.
    fn write(
        &mut self,
        entity: EntityId,
        key: &str,
        value: AttrValue,
    ) -> Result<AttrValue, SyncError>;

    /// Register a callback for every [`ChangeNotification`]. The callback
    /// runs on the same thread that triggers the change, before the
    /// mutating call returns.
    fn subscribe(&mut self, callback: ChangeCallback) -> SubscriptionId;

    /// Remove a subscription. Idempotent.
    fn unsubscribe(&mut self, subscription: SubscriptionId);
}
