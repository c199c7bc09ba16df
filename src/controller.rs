//! Sync controller: orchestrates refresh, commit, and external changes
//!
//! Sits between the attribute source and the binding table on a single
//! dispatch thread. UI edits flow in through [`SyncController::edit_cell`]
//! and [`SyncController::commit_cell`]; source change notifications are
//! queued by the subscription callback and drained by
//! [`SyncController::pump`]. Every source failure is caught here and
//! resolved into a cell state transition plus a reported outcome; no
//! error from the boundary ever reaches the table or view layer as a
//! raised fault.
//!
//! A source callback can fire re-entrantly, on the stack of the
//! controller's own `write`. The notification caused by that write is a
//! confirmation, not an independent external change, so commits hold a
//! suppression marker per (entity, key) while the queued notifications
//! are drained, and clear it once the write has settled.

use crate::error::SyncError;
use crate::source::{
    AttributeSource, ChangeNotification, EntityDesc, EntityId, SubscriptionId, NAME_KEY,
};
use crate::table::{BindingTable, CellState, Schema, ViewEvent};
use crate::value::AttrValue;
use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

/// Filter deciding which source entities the table tracks
pub type EntityPredicate = Box<dyn Fn(&EntityDesc) -> bool>;

type NotificationQueue = Rc<RefCell<VecDeque<ChangeNotification>>>;

/// Resolution of one commit attempt, reported to the caller.
///
/// On success carries the value the source actually stored, which may
/// differ from the requested one.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    pub entity: EntityId,
    pub key: &'static str,
    pub result: Result<AttrValue, SyncError>,
}

/// Row churn of one full refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub added: usize,
    pub removed: usize,
}

/// Orchestrates source ↔ table synchronization on the dispatch thread
pub struct SyncController<S: AttributeSource> {
    source: S,
    table: BindingTable,
    predicate: EntityPredicate,
    queue: NotificationQueue,
    subscription: SubscriptionId,
    /// Self-write markers: (entity, key) pairs whose next notification is
    /// a confirmation of our own write, not an external change
    self_writes: HashSet<(EntityId, String)>,
    /// External changes deferred while the cell's local edit settles
    deferred: HashSet<(EntityId, String)>,
}

impl<S: AttributeSource> SyncController<S> {
    pub fn new(
        mut source: S,
        schema: Schema,
        predicate: impl Fn(&EntityDesc) -> bool + 'static,
    ) -> Self {
        let queue: NotificationQueue = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&queue);
        let subscription = source.subscribe(Rc::new(move |n: &ChangeNotification| {
            sink.borrow_mut().push_back(n.clone())
        }));
        Self {
            source,
            table: BindingTable::new(schema),
            predicate: Box::new(predicate),
            queue,
            subscription,
            self_writes: HashSet::new(),
            deferred: HashSet::new(),
        }
    }

    pub fn table(&self) -> &BindingTable {
        &self.table
    }

    /// Direct access to the source for host-side mutations. Call
    /// [`pump`](Self::pump) afterwards so queued notifications are
    /// applied.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Drain view events accumulated by the table
    pub fn take_view_events(&mut self) -> Vec<ViewEvent> {
        self.table.take_view_events()
    }

    /// UI edit: mark a cell dirty with a candidate value
    pub fn edit_cell(
        &mut self,
        entity: EntityId,
        key: &str,
        value: AttrValue,
    ) -> Result<(), SyncError> {
        self.table.set_pending(entity, key, value)
    }

    /// UI revert: drop a pending edit without writing upstream
    pub fn revert_cell(&mut self, entity: EntityId, key: &str) -> bool {
        self.table.clear_pending(entity, key)
    }

    /// Commit one dirty cell's pending value to the source.
    ///
    /// Returns `None` when the cell has no pending edit. On success the
    /// cell takes the source's returned committed value; on failure it
    /// reverts to the last committed value and the error is reported in
    /// the outcome. A deferred external change for the cell is re-applied
    /// immediately after the commit resolves.
    pub fn commit_cell(&mut self, entity: EntityId, key: &str) -> Option<CommitOutcome> {
        let static_key = self.table.schema().column_key(key)?;
        // Settle anything already queued before writing: while the cell
        // is still dirty a same-cell external change is deferred, not
        // mistaken for a confirmation of the write below.
        self.pump();
        if self.table.cell_state(entity, static_key) != Some(CellState::Dirty) {
            return None;
        }
        let pending = self.table.pending_value(entity, static_key)?.clone();

        self.table
            .set_cell_state(entity, static_key, CellState::Committing);
        self.self_writes.insert((entity, static_key.to_string()));
        let write_result = self.source.write(entity, static_key, pending);
        // Only notifications the write itself enqueued are drained while
        // the suppression marker is active.
        self.pump();
        self.self_writes.remove(&(entity, static_key.to_string()));

        let result = match write_result {
            Ok(committed) => {
                if let Err(err) =
                    self.table
                        .apply_committed(entity, static_key, committed.clone())
                {
                    log::warn!(
                        "committed value for {}.{} not applied: {}",
                        entity,
                        static_key,
                        err
                    );
                }
                if static_key == NAME_KEY {
                    if let Some(name) = committed.as_str() {
                        self.table.set_name(entity, name);
                    }
                }
                log::debug!("commit {}.{} -> {}", entity, static_key, committed);
                Ok(committed)
            }
            Err(err @ SyncError::EntityNotFound(_)) => {
                // Entity vanished between display and commit. Drop the
                // row; the pending edit goes with it, no revert.
                log::info!("commit {}.{}: entity gone, removing row", entity, static_key);
                self.table.remove_row(entity);
                self.forget_entity(entity);
                Err(err)
            }
            Err(err @ SyncError::AttributeNotFound { .. }) => {
                // Schema mismatch: drop the edit, keep the committed value.
                log::warn!("commit {}.{}: {}", entity, static_key, err);
                self.table.clear_pending(entity, static_key);
                Err(err)
            }
            Err(err) => {
                if matches!(err, SyncError::OperationTimedOut { .. }) {
                    log::warn!("commit {}.{} timed out: {}", entity, static_key, err);
                } else {
                    log::info!("commit {}.{} rejected: {}", entity, static_key, err);
                }
                self.table
                    .set_cell_state(entity, static_key, CellState::Reverting);
                self.table.clear_pending(entity, static_key);
                Err(err)
            }
        };

        // External-wins-after-local-settles: a change deferred while this
        // cell was dirty or committing is applied now.
        if self.deferred.remove(&(entity, static_key.to_string())) {
            self.reapply_external(entity, static_key);
        }

        Some(CommitOutcome {
            entity,
            key: static_key,
            result,
        })
    }

    /// Commit every dirty cell, in row then column order
    pub fn commit_all(&mut self) -> Vec<CommitOutcome> {
        let mut targets = Vec::new();
        for row in self.table.rows() {
            for (i, column) in self.table.schema().columns().iter().enumerate() {
                if row.state_at(i) == Some(CellState::Dirty) {
                    targets.push((row.entity, column.key));
                }
            }
        }
        targets
            .into_iter()
            .filter_map(|(entity, key)| self.commit_cell(entity, key))
            .collect()
    }

    /// Apply queued change notifications on the dispatch thread
    pub fn pump(&mut self) {
        loop {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(notification) => self.handle_notification(notification),
                None => break,
            }
        }
    }

    /// Full refresh: re-enumerate entities, drop the missing, append the
    /// new at the table's end, and re-read attributes into clean cells.
    ///
    /// A dirty or committing cell is never overwritten here. Failure to
    /// reach the source is reported once; no automatic retry.
    pub fn refresh(&mut self) -> Result<RefreshReport, SyncError> {
        let ids = match self.source.list_entities(&*self.predicate) {
            Ok(ids) => ids,
            Err(err) => {
                log::warn!("refresh failed: {}", err);
                return Err(err);
            }
        };

        let mut report = RefreshReport::default();
        let present: HashSet<EntityId> = ids.iter().copied().collect();
        for entity in self.table.entities() {
            if !present.contains(&entity) {
                self.table.remove_row(entity);
                self.forget_entity(entity);
                report.removed += 1;
            }
        }

        for entity in ids {
            if self.table.position(entity).is_some() {
                self.refresh_row(entity, &mut report)?;
            } else if self.insert_row(entity)? {
                report.added += 1;
            }
        }

        log::info!(
            "refresh: {} rows ({} added, {} removed)",
            self.table.len(),
            report.added,
            report.removed
        );
        Ok(report)
    }

    /// Re-read one existing row's attributes into its clean cells
    fn refresh_row(&mut self, entity: EntityId, report: &mut RefreshReport) -> Result<(), SyncError> {
        let keys: Vec<&'static str> = self
            .table
            .schema()
            .columns()
            .iter()
            .map(|column| column.key)
            .collect();
        for key in keys {
            match self.source.read(entity, key) {
                Ok(value) => {
                    let applied = self.table.apply_committed_if_clean(entity, key, value.clone());
                    if applied && key == NAME_KEY {
                        if let Some(name) = value.as_str() {
                            self.table.set_name(entity, name);
                        }
                    }
                }
                Err(SyncError::EntityNotFound(_)) => {
                    self.table.remove_row(entity);
                    self.forget_entity(entity);
                    report.removed += 1;
                    return Ok(());
                }
                Err(SyncError::AttributeNotFound { .. }) => {
                    log::debug!("refresh: {}.{} absent, skipped", entity, key);
                }
                Err(err) => return Err(err),
            }
        }
        if let Ok(desc) = self.source.describe(entity) {
            self.table.set_name(entity, &desc.name);
        }
        Ok(())
    }

    /// Read a newly discovered entity and append its row. Returns false
    /// when the entity disappeared or lacks a schema attribute.
    fn insert_row(&mut self, entity: EntityId) -> Result<bool, SyncError> {
        let desc = match self.source.describe(entity) {
            Ok(desc) => desc,
            Err(SyncError::EntityNotFound(_)) => return Ok(false),
            Err(err) => return Err(err),
        };
        let mut values = Vec::with_capacity(self.table.schema().len());
        for column in self.table.schema().columns() {
            match self.source.read(entity, column.key) {
                Ok(value) => values.push(value),
                Err(SyncError::EntityNotFound(_)) => return Ok(false),
                Err(err @ SyncError::AttributeNotFound { .. }) => {
                    log::warn!("skipping entity {}: {}", entity, err);
                    return Ok(false);
                }
                Err(err) => return Err(err),
            }
        }
        self.table.upsert_row(entity, &desc.name, &values);
        Ok(true)
    }

    fn handle_notification(&mut self, notification: ChangeNotification) {
        match notification {
            ChangeNotification::EntityCreated(entity) => self.handle_created(entity),
            ChangeNotification::EntityDeleted(entity) => {
                // Pending edits on the row are discarded silently: the
                // entity is gone, there is nothing to revert.
                self.table.remove_row(entity);
                self.forget_entity(entity);
            }
            ChangeNotification::AttributeChanged(entity, key) => {
                self.handle_attribute_changed(entity, &key)
            }
            ChangeNotification::NameChanged(entity) => self.handle_name_changed(entity),
        }
    }

    fn handle_created(&mut self, entity: EntityId) {
        if self.table.position(entity).is_some() {
            return;
        }
        let desc = match self.source.describe(entity) {
            Ok(desc) => desc,
            Err(err) => {
                log::debug!("created entity {} not readable: {}", entity, err);
                return;
            }
        };
        if !(self.predicate)(&desc) {
            return;
        }
        match self.insert_row(entity) {
            Ok(true) => {}
            Ok(false) => {}
            Err(err) => log::warn!("could not add entity {}: {}", entity, err),
        }
    }

    fn handle_attribute_changed(&mut self, entity: EntityId, key: &str) {
        if self.self_writes.contains(&(entity, key.to_string())) {
            // Confirmation of our own in-flight write.
            log::debug!("suppressed self-write notification {}.{}", entity, key);
            return;
        }
        let Some(static_key) = self.table.schema().column_key(key) else {
            return;
        };
        if self.table.position(entity).is_none() {
            return;
        }
        match self.table.cell_state(entity, static_key) {
            Some(CellState::Dirty) | Some(CellState::Committing) => {
                // Defer until the pending commit resolves, so neither
                // edit is lost silently.
                self.deferred.insert((entity, static_key.to_string()));
            }
            _ => self.reapply_external(entity, static_key),
        }
    }

    fn handle_name_changed(&mut self, entity: EntityId) {
        if self.self_writes.contains(&(entity, NAME_KEY.to_string())) {
            log::debug!("suppressed self-write rename notification for {}", entity);
            return;
        }
        if self.table.position(entity).is_none() {
            return;
        }
        if self.table.schema().contains(NAME_KEY) {
            match self.table.cell_state(entity, NAME_KEY) {
                Some(CellState::Dirty) | Some(CellState::Committing) => {
                    self.deferred.insert((entity, NAME_KEY.to_string()));
                    return;
                }
                _ => {
                    self.reapply_external(entity, NAME_KEY);
                    return;
                }
            }
        }
        match self.source.describe(entity) {
            Ok(desc) => {
                self.table.set_name(entity, &desc.name);
            }
            Err(SyncError::EntityNotFound(_)) => {
                self.table.remove_row(entity);
                self.forget_entity(entity);
            }
            Err(err) => log::warn!("rename of {} not resolvable: {}", entity, err),
        }
    }

    /// Re-read one attribute from the source and take it as committed
    /// truth for the cell.
    fn reapply_external(&mut self, entity: EntityId, key: &'static str) {
        match self.source.read(entity, key) {
            Ok(value) => {
                if let Err(err) = self.table.apply_committed(entity, key, value.clone()) {
                    log::warn!("external value for {}.{} not applied: {}", entity, key, err);
                }
                if key == NAME_KEY {
                    if let Some(name) = value.as_str() {
                        self.table.set_name(entity, name);
                    }
                }
            }
            Err(SyncError::EntityNotFound(_)) => {
                self.table.remove_row(entity);
                self.forget_entity(entity);
            }
            Err(err) => log::warn!("external change on {}.{} not readable: {}", entity, key, err),
        }
    }

    fn forget_entity(&mut self, entity: EntityId) {
        self.self_writes.retain(|(e, _)| *e != entity);
        self.deferred.retain(|(e, _)| *e != entity);
    }
}

impl<S: AttributeSource> Drop for SyncController<S> {
    fn drop(&mut self) {
        self.source.unsubscribe(self.subscription);
    }
}
