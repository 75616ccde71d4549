//! Notifications emitted when the shape of the layer stack changes.
//!
//! UI adapters drain these after each operation to refresh layer lists.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum LayerEvent {
    /// Layers were added, removed, merged or reordered.
    ListChanged,
    LayerAdded { index: usize, name: String },
    LayerDeleted { index: usize },
    LayersMerged { into: usize, name: String },
}

/// Buffered events, oldest first.
#[derive(Clone, Debug, Default)]
pub struct Events {
    pub pending: Vec<LayerEvent>,
}

impl Events {
    pub fn push(&mut self, event: LayerEvent) {
        self.pending.push(event);
    }

    /// Adds `ListChanged` unless it is already the latest event.
    pub fn list_changed(&mut self) {
        if self.pending.last() != Some(&LayerEvent::ListChanged) {
            self.pending.push(LayerEvent::ListChanged);
        }
    }

    pub fn drain(&mut self) -> Vec<LayerEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
