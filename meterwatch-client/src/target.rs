//! The building currently being monitored.

use std::sync::Arc;

use meterwatch_types::Building;
use parking_lot::RwLock;

/// Shared handle to the selected building id.
///
/// Unset at startup, set by the first catalog load or an explicit user
/// selection, and never cleared afterwards. Cloning shares the same slot, so
/// both transports always read the latest selection.
#[derive(Debug, Clone, Default)]
pub struct ActiveTarget {
    inner: Arc<RwLock<Option<String>>>,
}

impl ActiveTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a target that starts out selected.
    pub fn with_selected(id: impl Into<String>) -> Self {
        let target = Self::new();
        target.select(id);
        target
    }

    /// Current building id, if one has been selected.
    pub fn get(&self) -> Option<String> {
        self.inner.read().clone()
    }

    pub fn is_set(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Whether `id` is the selected building.
    pub fn matches(&self, id: &str) -> bool {
        self.inner.read().as_deref() == Some(id)
    }

    /// Explicit user selection. Returns true if the selection changed.
    pub fn select(&self, id: impl Into<String>) -> bool {
        let id = id.into();
        let mut slot = self.inner.write();
        if slot.as_deref() == Some(id.as_str()) {
            return false;
        }
        tracing::info!(building = %id, "Active building selected");
        *slot = Some(id);
        true
    }

    /// Select the first listed building, unless something is already selected.
    ///
    /// Returns the id now selected, if any.
    pub fn select_default(&self, buildings: &[Building]) -> Option<String> {
        let mut slot = self.inner.write();
        if slot.is_none() {
            if let Some(first) = buildings.first() {
                tracing::info!(building = %first.id, "Defaulting to first listed building");
                *slot = Some(first.id.clone());
            }
        }
        slot.clone()
    }
}
