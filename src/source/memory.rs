//! In-memory scene graph implementing [`AttributeSource`]
//!
//! Stands in for the host application's scene during tests and headless
//! runs. Mirrors the host command layer's behavior: writes validate
//! before mutating, renames normalize the requested name (whitespace
//! collapsed to underscores, numeric suffix on collision) and return the
//! name actually stored, and every mutation fires its notification
//! synchronously before the mutating call returns.

use super::{
    AttributeSource, ChangeCallback, ChangeNotification, EntityDesc, EntityId, SubscriptionId,
    NAME_KEY,
};
use crate::error::SyncError;
use crate::value::AttrValue;

/// One typed attribute slot on a scene node
#[derive(Debug, Clone)]
struct AttrSlot {
    key: String,
    value: AttrValue,
    /// Inclusive numeric range enforced on float writes
    range: Option<(f64, f64)>,
}

/// A node in the in-memory scene
#[derive(Debug, Clone)]
struct SceneNode {
    id: EntityId,
    name: String,
    kind: String,
    /// Ordered set of (key, value) slots, declaration order
    attrs: Vec<AttrSlot>,
}

impl SceneNode {
    fn slot(&self, key: &str) -> Option<&AttrSlot> {
        self.attrs.iter().find(|slot| slot.key == key)
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut AttrSlot> {
        self.attrs.iter_mut().find(|slot| slot.key == key)
    }
}

/// In-memory attribute source with synchronous change notifications
#[derive(Default)]
pub struct MemoryScene {
    nodes: Vec<SceneNode>,
    next_id: EntityId,
    subscribers: Vec<(SubscriptionId, ChangeCallback)>,
    next_subscription: SubscriptionId,
    offline: bool,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the external system becoming unreachable
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Create a node and notify subscribers. The requested name is
    /// normalized the same way a rename would be.
    pub fn add_node(&mut self, name: &str, kind: &str) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        let name = self.normalize_name(name, id);
        log::debug!("scene: created node {} '{}' ({})", id, name, kind);
        self.nodes.push(SceneNode {
            id,
            name,
            kind: kind.to_string(),
            attrs: Vec::new(),
        });
        self.emit(ChangeNotification::EntityCreated(id));
        id
    }

    /// Declare an attribute slot on a node with an initial value
    pub fn define_attr(&mut self, entity: EntityId, key: &str, value: AttrValue) {
        if let Some(node) = self.node_mut(entity) {
            node.attrs.push(AttrSlot {
                key: key.to_string(),
                value,
                range: None,
            });
        }
    }

    /// Declare a float attribute slot with an inclusive valid range
    pub fn define_ranged_attr(
        &mut self,
        entity: EntityId,
        key: &str,
        value: f64,
        min: f64,
        max: f64,
    ) {
        if let Some(node) = self.node_mut(entity) {
            node.attrs.push(AttrSlot {
                key: key.to_string(),
                value: AttrValue::Float(value),
                range: Some((min, max)),
            });
        }
    }

    /// Delete a node and notify subscribers. Returns false if absent.
    pub fn delete_node(&mut self, entity: EntityId) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|node| node.id != entity);
        if self.nodes.len() == before {
            return false;
        }
        log::debug!("scene: deleted node {}", entity);
        self.emit(ChangeNotification::EntityDeleted(entity));
        true
    }

    /// Rename a node. The stored name is the normalized one, returned to
    /// the caller; a NameChanged notification fires only if the name
    /// actually changed.
    pub fn rename(&mut self, entity: EntityId, requested: &str) -> Result<String, SyncError> {
        if self.offline {
            return Err(SyncError::SourceUnavailable);
        }
        if requested.trim().is_empty() {
            return Err(SyncError::ValidationError {
                reason: "name must not be empty".to_string(),
            });
        }
        let actual = self.normalize_name(requested, entity);
        let node = self
            .node_mut(entity)
            .ok_or(SyncError::EntityNotFound(entity))?;
        if node.name == actual {
            return Ok(actual);
        }
        node.name = actual.clone();
        log::debug!("scene: renamed node {} to '{}'", entity, actual);
        self.emit(ChangeNotification::NameChanged(entity));
        Ok(actual)
    }

    fn node(&self, entity: EntityId) -> Option<&SceneNode> {
        self.nodes.iter().find(|node| node.id == entity)
    }

    fn node_mut(&mut self, entity: EntityId) -> Option<&mut SceneNode> {
        self.nodes.iter_mut().find(|node| node.id == entity)
    }

    /// Collapse whitespace to underscores and resolve collisions with a
    /// numeric suffix, skipping the entity's own current name.
    fn normalize_name(&self, requested: &str, own_id: EntityId) -> String {
        let base: String = requested
            .trim()
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        let taken = |name: &str| {
            self.nodes
                .iter()
                .any(|node| node.id != own_id && node.name == name)
        };
        if !taken(&base) {
            return base;
        }
        let mut suffix = 1u32;
        loop {
            let candidate = format!("{}{}", base, suffix);
            if !taken(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    fn emit(&self, notification: ChangeNotification) {
        // Clone the list so a callback registering or removing
        // subscriptions cannot invalidate the iteration.
        let subscribers: Vec<(SubscriptionId, ChangeCallback)> = self.subscribers.clone();
        for (_, callback) in subscribers {
            (*callback)(&notification);
        }
    }
}

impl AttributeSource for MemoryScene {
    fn list_entities(
        &self,
        predicate: &dyn Fn(&EntityDesc) -> bool,
    ) -> Result<Vec<EntityId>, SyncError> {
        if self.offline {
            return Err(SyncError::SourceUnavailable);
        }
        Ok(self
            .nodes
            .iter()
            .map(|node| EntityDesc {
                id: node.id,
                name: node.name.clone(),
                kind: node.kind.clone(),
            })
            .filter(|desc| predicate(desc))
            .map(|desc| desc.id)
            .collect())
    }

    fn describe(&self, entity: EntityId) -> Result<EntityDesc, SyncError> {
        if self.offline {
            return Err(SyncError::SourceUnavailable);
        }
        let node = self.node(entity).ok_or(SyncError::EntityNotFound(entity))?;
        Ok(EntityDesc {
            id: node.id,
            name: node.name.clone(),
            kind: node.kind.clone(),
        })
    }

    fn read(&self, entity: EntityId, key: &str) -> Result<AttrValue, SyncError> {
        if self.offline {
            return Err(SyncError::SourceUnavailable);
        }
        let node = self.node(entity).ok_or(SyncError::EntityNotFound(entity))?;
        if key == NAME_KEY {
            return Ok(AttrValue::String(node.name.clone()));
        }
        node.slot(key)
            .map(|slot| slot.value.clone())
            .ok_or_else(|| SyncError::AttributeNotFound {
                entity,
                key: key.to_string(),
            })
    }

    fn write(
        &mut self,
        entity: EntityId,
        key: &str,
        value: AttrValue,
    ) -> Result<AttrValue, SyncError> {
        if self.offline {
            return Err(SyncError::SourceUnavailable);
        }
        if key == NAME_KEY {
            let requested = value.as_str().ok_or_else(|| SyncError::ValidationError {
                reason: format!("expected string for '{}', got {}", key, value.attr_type()),
            })?;
            let requested = requested.to_string();
            return self
                .rename(entity, &requested)
                .map(AttrValue::String);
        }

        // Validate fully before touching state so a rejected write leaves
        // the scene unchanged.
        let node = self.node(entity).ok_or(SyncError::EntityNotFound(entity))?;
        let slot = node.slot(key).ok_or_else(|| SyncError::AttributeNotFound {
            entity,
            key: key.to_string(),
        })?;
        let expected = slot.value.attr_type();
        if value.attr_type() != expected {
            return Err(SyncError::ValidationError {
                reason: format!(
                    "expected {} for '{}', got {}",
                    expected,
                    key,
                    value.attr_type()
                ),
            });
        }
        if let (Some((min, max)), Some(v)) = (slot.range, value.as_float()) {
            if v < min || v > max {
                return Err(SyncError::ValidationError {
                    reason: format!("'{}' out of range [{}, {}]: {}", key, min, max, v),
                });
            }
        }

        let changed = slot.value != value;
        let stored = value.clone();
        if let Some(slot) = self.node_mut(entity).and_then(|node| node.slot_mut(key)) {
            slot.value = value;
        }
        if changed {
            log::debug!("scene: set {}.{} = {}", entity, key, stored);
            self.emit(ChangeNotification::AttributeChanged(entity, key.to_string()));
        }
        Ok(stored)
    }

    fn subscribe(&mut self, callback: ChangeCallback) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push((id, callback));
        id
    }

    fn unsubscribe(&mut self, subscription: SubscriptionId) {
        self.subscribers.retain(|(id, _)| *id != subscription);
    }
}
