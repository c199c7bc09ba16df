//! Binding table: ordered rows of attribute cells with pending edits
//!
//! Each row binds one external entity to one displayed row of cells.
//! Rows keep the committed value per cell plus an optional in-flight
//! edit; a cell is either clean (displayed == committed) or carries one
//! uncommitted edit. Row order is discovery order and never reshuffled.
//!
//! Mutation discipline: `upsert_row`/`remove_row`/`apply_committed` are
//! driven by external truth, `set_pending`/`clear_pending` by UI edits.
//! Both run on the single dispatch thread and never race.

use crate::error::SyncError;
use crate::source::EntityId;
use crate::value::{AttrType, AttrValue};
use std::collections::HashMap;

/// One column of the fixed attribute schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub key: &'static str,
    pub ty: AttrType,
}

/// Fixed, ordered set of attribute columns shared by every row
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: &[(&'static str, AttrType)]) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|(key, ty)| Column { key, ty: *ty })
                .collect(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_index(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.key == key)
    }

    /// Resolve a borrowed key to the schema's static key string
    pub fn column_key(&self, key: &str) -> Option<&'static str> {
        self.column_index(key).map(|i| self.columns[i].key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.column_index(key).is_some()
    }
}

/// Per-cell synchronization state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// Displayed value equals the committed value
    Clean,
    /// An uncommitted edit is pending
    Dirty,
    /// A pending edit is being written upstream
    Committing,
    /// A failed commit is being rolled back
    Reverting,
}

#[derive(Debug, Clone)]
struct Cell {
    committed: AttrValue,
    pending: Option<AttrValue>,
    state: CellState,
}

impl Cell {
    fn new(committed: AttrValue) -> Self {
        Self {
            committed,
            pending: None,
            state: CellState::Clean,
        }
    }

    fn display(&self) -> &AttrValue {
        self.pending.as_ref().unwrap_or(&self.committed)
    }
}

/// One displayed row, bound to one entity
#[derive(Debug, Clone)]
pub struct Row {
    pub entity: EntityId,
    pub name: String,
    cells: Vec<Cell>,
}

impl Row {
    /// Committed value of the column at `index`
    pub fn committed_at(&self, index: usize) -> Option<&AttrValue> {
        self.cells.get(index).map(|cell| &cell.committed)
    }

    /// Displayed value (pending if dirty) of the column at `index`
    pub fn display_at(&self, index: usize) -> Option<&AttrValue> {
        self.cells.get(index).map(|cell| cell.display())
    }

    pub fn state_at(&self, index: usize) -> Option<CellState> {
        self.cells.get(index).map(|cell| cell.state)
    }
}

/// Notification to the view layer that a re-render is needed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    RowAdded { entity: EntityId, position: usize },
    RowRemoved { entity: EntityId },
    CellChanged { entity: EntityId, key: &'static str },
    NameChanged { entity: EntityId },
}

/// Ordered collection of rows keyed by stable entity id.
///
/// Insertion order equals discovery order; no duplicate identifiers.
pub struct BindingTable {
    schema: Schema,
    rows: Vec<Row>,
    index: HashMap<EntityId, usize>,
    events: Vec<ViewEvent>,
}

impl BindingTable {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            index: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn position(&self, entity: EntityId) -> Option<usize> {
        self.index.get(&entity).copied()
    }

    /// Entities in current row order
    pub fn entities(&self) -> Vec<EntityId> {
        self.rows.iter().map(|row| row.entity).collect()
    }

    /// Drain the view events accumulated since the last call
    pub fn take_view_events(&mut self) -> Vec<ViewEvent> {
        std::mem::take(&mut self.events)
    }

    /// Insert or update a row from external truth.
    ///
    /// A new entity is appended at the end (stable append, no sorting).
    /// For an existing row every changed cell takes the new committed
    /// value and loses any pending edit: external truth wins over an
    /// uncommitted local edit. Calling this twice with identical values
    /// emits no additional view events.
    pub fn upsert_row(&mut self, entity: EntityId, name: &str, values: &[AttrValue]) {
        match self.index.get(&entity).copied() {
            None => {
                let cells = values.iter().cloned().map(Cell::new).collect();
                let position = self.rows.len();
                self.rows.push(Row {
                    entity,
                    name: name.to_string(),
                    cells,
                });
                self.index.insert(entity, position);
                log::debug!("table: added row for entity {} at {}", entity, position);
                self.events.push(ViewEvent::RowAdded { entity, position });
            }
            Some(position) => {
                let row = &mut self.rows[position];
                if row.name != name {
                    row.name = name.to_string();
                    self.events.push(ViewEvent::NameChanged { entity });
                }
                for (i, value) in values.iter().enumerate() {
                    let Some(cell) = row.cells.get_mut(i) else {
                        break;
                    };
                    if cell.committed != *value || cell.pending.is_some() {
                        cell.committed = value.clone();
                        cell.pending = None;
                        cell.state = CellState::Clean;
                        self.events.push(ViewEvent::CellChanged {
                            entity,
                            key: self.schema.columns[i].key,
                        });
                    }
                }
            }
        }
    }

    /// Remove a row. No-op if absent.
    pub fn remove_row(&mut self, entity: EntityId) -> bool {
        let Some(position) = self.index.remove(&entity) else {
            return false;
        };
        self.rows.remove(position);
        for (i, row) in self.rows.iter().enumerate().skip(position) {
            self.index.insert(row.entity, i);
        }
        log::debug!("table: removed row for entity {}", entity);
        self.events.push(ViewEvent::RowRemoved { entity });
        true
    }

    /// Mark a cell dirty with a candidate value
    pub fn set_pending(
        &mut self,
        entity: EntityId,
        key: &str,
        value: AttrValue,
    ) -> Result<(), SyncError> {
        let (row, column) = self.cell_position(entity, key)?;
        let static_key = self.schema.columns[column].key;
        let cell = &mut self.rows[row].cells[column];
        let display_changed = *cell.display() != value;
        cell.pending = Some(value);
        cell.state = CellState::Dirty;
        if display_changed {
            self.events.push(ViewEvent::CellChanged {
                entity,
                key: static_key,
            });
        }
        Ok(())
    }

    /// Revert a cell to its committed value without writing upstream.
    /// Returns true if the cell existed and held a pending edit.
    pub fn clear_pending(&mut self, entity: EntityId, key: &str) -> bool {
        let Ok((row, column)) = self.cell_position(entity, key) else {
            return false;
        };
        let static_key = self.schema.columns[column].key;
        let cell = &mut self.rows[row].cells[column];
        let had_pending = cell.pending.take().is_some();
        cell.state = CellState::Clean;
        if had_pending {
            self.events.push(ViewEvent::CellChanged {
                entity,
                key: static_key,
            });
        }
        had_pending
    }

    /// Pending value if dirty, else committed value
    pub fn get_display_value(&self, entity: EntityId, key: &str) -> Option<&AttrValue> {
        let (row, column) = self.cell_position(entity, key).ok()?;
        Some(self.rows[row].cells[column].display())
    }

    pub fn committed_value(&self, entity: EntityId, key: &str) -> Option<&AttrValue> {
        let (row, column) = self.cell_position(entity, key).ok()?;
        Some(&self.rows[row].cells[column].committed)
    }

    pub fn pending_value(&self, entity: EntityId, key: &str) -> Option<&AttrValue> {
        let (row, column) = self.cell_position(entity, key).ok()?;
        self.rows[row].cells[column].pending.as_ref()
    }

    pub fn cell_state(&self, entity: EntityId, key: &str) -> Option<CellState> {
        let (row, column) = self.cell_position(entity, key).ok()?;
        Some(self.rows[row].cells[column].state)
    }

    /// Apply one externally committed value, clearing any pending edit
    pub fn apply_committed(
        &mut self,
        entity: EntityId,
        key: &str,
        value: AttrValue,
    ) -> Result<(), SyncError> {
        let (row, column) = self.cell_position(entity, key)?;
        let static_key = self.schema.columns[column].key;
        let cell = &mut self.rows[row].cells[column];
        let display_changed = *cell.display() != value;
        cell.committed = value;
        cell.pending = None;
        cell.state = CellState::Clean;
        if display_changed {
            self.events.push(ViewEvent::CellChanged {
                entity,
                key: static_key,
            });
        }
        Ok(())
    }

    /// Like [`apply_committed`](Self::apply_committed) but only touches a
    /// clean cell. Used by bulk refresh so a dirty or committing cell is
    /// never silently overwritten. Returns true if applied.
    pub fn apply_committed_if_clean(
        &mut self,
        entity: EntityId,
        key: &str,
        value: AttrValue,
    ) -> bool {
        match self.cell_state(entity, key) {
            Some(CellState::Clean) => {
                let _ = self.apply_committed(entity, key, value);
                true
            }
            _ => false,
        }
    }

    /// Update the display name resolved through the entity id
    pub fn set_name(&mut self, entity: EntityId, name: &str) -> bool {
        let Some(position) = self.index.get(&entity).copied() else {
            return false;
        };
        let row = &mut self.rows[position];
        if row.name == name {
            return false;
        }
        row.name = name.to_string();
        self.events.push(ViewEvent::NameChanged { entity });
        true
    }

    pub(crate) fn set_cell_state(&mut self, entity: EntityId, key: &str, state: CellState) {
        if let Ok((row, column)) = self.cell_position(entity, key) {
            self.rows[row].cells[column].state = state;
        }
    }

    fn cell_position(&self, entity: EntityId, key: &str) -> Result<(usize, usize), SyncError> {
        let row = self
            .index
            .get(&entity)
            .copied()
            .ok_or_else(|| SyncError::UnknownCell {
                entity,
                key: key.to_string(),
            })?;
        let column = self
            .schema
            .column_index(key)
            .ok_or_else(|| SyncError::UnknownCell {
                entity,
                key: key.to_string(),
            })?;
        Ok((row, column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(&[("visible", AttrType::Bool), ("intensity", AttrType::Float)])
    }

    fn values(visible: bool, intensity: f64) -> Vec<AttrValue> {
        vec![AttrValue::Bool(visible), AttrValue::Float(intensity)]
    }

    #[test]
    fn test_upsert_appends_in_discovery_order() {
        let mut table = BindingTable::new(schema());
        table.upsert_row(7, "a", &values(true, 1.0));
        table.upsert_row(3, "b", &values(false, 2.0));
        assert_eq!(table.entities(), vec![7, 3]);
        assert_eq!(table.position(3), Some(1));
    }

    #[test]
    fn test_upsert_is_idempotent_for_view_events() {
        let mut table = BindingTable::new(schema());
        table.upsert_row(1, "a", &values(true, 1.0));
        table.take_view_events();

        table.upsert_row(1, "a", &values(true, 1.0));
        assert!(table.take_view_events().is_empty());
    }

    #[test]
    fn test_upsert_updates_changed_cells_only() {
        let mut table = BindingTable::new(schema());
        table.upsert_row(1, "a", &values(true, 1.0));
        table.take_view_events();

        table.upsert_row(1, "a", &values(true, 2.0));
        assert_eq!(
            table.take_view_events(),
            vec![ViewEvent::CellChanged {
                entity: 1,
                key: "intensity"
            }]
        );
    }

    #[test]
    fn test_upsert_clears_pending_edit() {
        let mut table = BindingTable::new(schema());
        table.upsert_row(1, "a", &values(true, 1.0));
        table.set_pending(1, "intensity", AttrValue::Float(5.0)).unwrap();

        table.upsert_row(1, "a", &values(true, 1.0));
        assert_eq!(table.cell_state(1, "intensity"), Some(CellState::Clean));
        assert_eq!(
            table.get_display_value(1, "intensity"),
            Some(&AttrValue::Float(1.0))
        );
    }

    #[test]
    fn test_set_pending_unknown_cell() {
        let mut table = BindingTable::new(schema());
        table.upsert_row(1, "a", &values(true, 1.0));

        let err = table
            .set_pending(2, "intensity", AttrValue::Float(5.0))
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownCell { entity: 2, .. }));

        let err = table
            .set_pending(1, "bogus", AttrValue::Float(5.0))
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownCell { entity: 1, .. }));
    }

    #[test]
    fn test_display_value_prefers_pending() {
        let mut table = BindingTable::new(schema());
        table.upsert_row(1, "a", &values(true, 1.0));
        table.set_pending(1, "intensity", AttrValue::Float(5.0)).unwrap();

        assert_eq!(
            table.get_display_value(1, "intensity"),
            Some(&AttrValue::Float(5.0))
        );
        assert_eq!(
            table.committed_value(1, "intensity"),
            Some(&AttrValue::Float(1.0))
        );
        assert_eq!(table.cell_state(1, "intensity"), Some(CellState::Dirty));
    }

    #[test]
    fn test_clear_pending_restores_committed() {
        let mut table = BindingTable::new(schema());
        table.upsert_row(1, "a", &values(true, 1.0));
        table.set_pending(1, "intensity", AttrValue::Float(5.0)).unwrap();

        assert!(table.clear_pending(1, "intensity"));
        assert_eq!(
            table.get_display_value(1, "intensity"),
            Some(&AttrValue::Float(1.0))
        );
        assert_eq!(table.cell_state(1, "intensity"), Some(CellState::Clean));
        assert!(!table.clear_pending(1, "intensity"));
    }

    #[test]
    fn test_remove_row_reindexes_survivors() {
        let mut table = BindingTable::new(schema());
        table.upsert_row(1, "a", &values(true, 1.0));
        table.upsert_row(2, "b", &values(true, 1.0));
        table.upsert_row(3, "c", &values(true, 1.0));

        assert!(table.remove_row(2));
        assert!(!table.remove_row(2));
        assert_eq!(table.entities(), vec![1, 3]);
        assert_eq!(table.position(3), Some(1));
    }

    #[test]
    fn test_refresh_apply_skips_dirty_cell() {
        let mut table = BindingTable::new(schema());
        table.upsert_row(1, "a", &values(true, 1.0));
        table.set_pending(1, "intensity", AttrValue::Float(5.0)).unwrap();

        assert!(!table.apply_committed_if_clean(1, "intensity", AttrValue::Float(9.0)));
        assert_eq!(
            table.get_display_value(1, "intensity"),
            Some(&AttrValue::Float(5.0))
        );
        assert!(table.apply_committed_if_clean(1, "visible", AttrValue::Bool(false)));
    }

    #[test]
    fn test_set_name_resolves_through_id() {
        let mut table = BindingTable::new(schema());
        table.upsert_row(1, "old", &values(true, 1.0));
        table.take_view_events();

        assert!(table.set_name(1, "new"));
        assert_eq!(table.rows()[0].name, "new");
        assert_eq!(
            table.take_view_events(),
            vec![ViewEvent::NameChanged { entity: 1 }]
        );
        assert!(!table.set_name(1, "new"));
    }
}
