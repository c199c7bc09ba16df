//! Panel registry with create-or-raise semantics
//!
//! Hosts tend to guard their tool windows with a module-level "current
//! dialog instance" so a second invocation raises the existing window
//! instead of spawning a duplicate. The registry replaces that global
//! with explicit state owned by the application's lifecycle manager,
//! keyed by window identity.

use std::collections::HashMap;

/// Result of an open request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAction {
    /// No panel with this identity existed; a new one was registered
    Created,
    /// The existing panel was raised instead
    Raised,
}

#[derive(Debug, Clone, Default)]
struct PanelState {
    /// How many times the panel was raised while already open
    raise_count: u32,
}

/// Tracks open panels by window identity
#[derive(Default)]
pub struct PanelRegistry {
    panels: HashMap<String, PanelState>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the panel with the given identity, or raise it if already
    /// open. The caller creates the actual window only on `Created`.
    pub fn open_or_raise(&mut self, identity: &str) -> OpenAction {
        match self.panels.get_mut(identity) {
            Some(state) => {
                state.raise_count += 1;
                log::debug!("panel '{}' raised ({}x)", identity, state.raise_count);
                OpenAction::Raised
            }
            None => {
                self.panels.insert(identity.to_string(), PanelState::default());
                log::debug!("panel '{}' created", identity);
                OpenAction::Created
            }
        }
    }

    /// Unregister a closed panel. Returns false if it was not open.
    pub fn close(&mut self, identity: &str) -> bool {
        self.panels.remove(identity).is_some()
    }

    pub fn is_open(&self, identity: &str) -> bool {
        self.panels.contains_key(identity)
    }

    pub fn open_count(&self) -> usize {
        self.panels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_then_raise() {
        let mut registry = PanelRegistry::new();
        assert_eq!(registry.open_or_raise("light_panel"), OpenAction::Created);
        assert_eq!(registry.open_or_raise("light_panel"), OpenAction::Raised);
        assert_eq!(registry.open_count(), 1);
    }

    #[test]
    fn test_close_allows_recreate() {
        let mut registry = PanelRegistry::new();
        registry.open_or_raise("outliner");
        assert!(registry.close("outliner"));
        assert!(!registry.close("outliner"));
        assert_eq!(registry.open_or_raise("outliner"), OpenAction::Created);
    }

    #[test]
    fn test_identities_are_independent() {
        let mut registry = PanelRegistry::new();
        registry.open_or_raise("light_panel");
        assert!(!registry.is_open("outliner"));
        assert_eq!(registry.open_or_raise("outliner"), OpenAction::Created);
        assert_eq!(registry.open_count(), 2);
    }
}
