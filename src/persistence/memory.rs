use std::collections::HashMap;

use crate::persistence::repository::{SaveRepository, SaveStoreError};

/// Slot store kept in memory; what tests and throwaway sessions use.
#[derive(Debug, Clone, Default)]
pub struct MemorySaveStore {
    slots: HashMap<String, String>,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(mut self, slot: &str, blob: &str) -> Self {
        self.slots.insert(slot.to_string(), blob.to_string());
        self
    }
}

impl SaveRepository for MemorySaveStore {
    fn read_slot(&self, slot: &str) -> Result<Option<String>, SaveStoreError> {
        Ok(self.slots.get(slot).cloned())
    }

    fn write_slot(&mut self, slot: &str, blob: &str) -> Result<(), SaveStoreError> {
        self.slots.insert(slot.to_string(), blob.to_string());
        Ok(())
    }

    fn clear_slot(&mut self, slot: &str) -> Result<(), SaveStoreError> {
        self.slots.remove(slot);
        Ok(())
    }
}
