//! Live attribute synchronization between a scene graph and bound panels
//!
//! The core is a bidirectional sync layer: an [`AttributeSource`] exposes
//! an external mutable object graph, a [`BindingTable`] mirrors a slice
//! of it as displayed rows with pending edits, and a [`SyncController`]
//! orchestrates refresh, commit-with-rollback, and re-entrant-safe
//! external change handling on a single dispatch thread.

pub mod checklist;
pub mod controller;
pub mod error;
pub mod panel;
pub mod source;
pub mod table;
pub mod value;

// Re-export commonly used types
pub use controller::{CommitOutcome, RefreshReport, SyncController};
pub use error::SyncError;
pub use source::{
    AttributeSource, ChangeNotification, EntityDesc, EntityId, SubscriptionId, NAME_KEY,
};
pub use table::{BindingTable, CellState, Column, Row, Schema, ViewEvent};
pub use value::{AttrType, AttrValue};
