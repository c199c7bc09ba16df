//! Persisted to-do checklist
//!
//! Ordered `{label, done}` records, rewritten in full on every save. The
//! file is written to a temporary sibling and atomically renamed into
//! place so a crash mid-write never leaves a truncated list behind.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChecklistError {
    #[error("could not access checklist file: {0}")]
    Io(#[from] std::io::Error),
    #[error("checklist file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("label must not be empty")]
    EmptyLabel,
}

/// One to-do entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub label: String,
    pub done: bool,
}

/// Ordered list of to-do items
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checklist {
    items: Vec<ChecklistItem>,
}

impl Checklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ChecklistItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a new open item. Empty labels are rejected.
    pub fn add(&mut self, label: &str) -> Result<(), ChecklistError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(ChecklistError::EmptyLabel);
        }
        self.items.push(ChecklistItem {
            label: label.to_string(),
            done: false,
        });
        Ok(())
    }

    /// Mark the items at the given positions done
    pub fn complete(&mut self, selection: &[usize]) {
        for &index in selection {
            if let Some(item) = self.items.get_mut(index) {
                item.done = true;
            }
        }
    }

    /// Remove the items at the given positions. Indices are processed in
    /// descending order so earlier removals do not shift later ones.
    pub fn delete(&mut self, selection: &[usize]) {
        let mut ordered: Vec<usize> = selection.to_vec();
        ordered.sort_unstable();
        ordered.dedup();
        for index in ordered.into_iter().rev() {
            if index < self.items.len() {
                self.items.remove(index);
            }
        }
    }
}

/// Loads and saves a checklist at a fixed path
pub struct ChecklistStore {
    path: PathBuf,
}

impl ChecklistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted checklist. A missing file is an empty list.
    pub fn load(&self) -> Result<Checklist, ChecklistError> {
        if !self.path.exists() {
            return Ok(Checklist::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let items: Vec<ChecklistItem> = serde_json::from_str(&content)?;
        Ok(Checklist { items })
    }

    /// Persist the full checklist: write to a temporary sibling, then
    /// atomically rename over the target.
    pub fn save(&self, checklist: &Checklist) -> Result<(), ChecklistError> {
        let json = serde_json::to_string_pretty(&checklist.items)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        log::debug!("checklist saved: {} items", checklist.len());
        Ok(())
    }
}
