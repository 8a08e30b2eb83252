use std::collections::BTreeMap;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::items::{ItemCatalog, ItemDef, ItemEffect};

pub const STARTING_KIT: [(&str, u32); 2] = [("caffe", 2), ("sfogliatella", 1)];

/// Item id to quantity. Zero-quantity entries are never kept.
#[derive(Resource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    items: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryEntry<'a> {
    pub id: &'a str,
    pub quantity: u32,
    pub def: &'a ItemDef,
}

impl Inventory {
    pub fn starting(catalog: &ItemCatalog) -> Self {
        let mut inventory = Self::default();
        inventory.reset(catalog);
        inventory
    }

    pub fn reset(&mut self, catalog: &ItemCatalog) {
        self.items.clear();
        for (id, quantity) in STARTING_KIT {
            self.add(catalog, id, quantity);
        }
    }

    /// Unknown items are refused; known ones are capped at their stack limit.
    pub fn add(&mut self, catalog: &ItemCatalog, id: &str, quantity: u32) -> bool {
        let Some(def) = catalog.get(id) else {
            tracing::warn!("refusing unknown item {}", id);
            return false;
        };
        let current = self.count(id);
        let next = current.saturating_add(quantity).min(def.max_stack);
        if next > 0 {
            self.items.insert(id.to_string(), next);
        }
        true
    }

    pub fn remove(&mut self, id: &str, quantity: u32) -> bool {
        let current = self.count(id);
        if current < quantity {
            return false;
        }
        let next = current - quantity;
        if next == 0 {
            self.items.remove(id);
        } else {
            self.items.insert(id.to_string(), next);
        }
        true
    }

    pub fn has(&self, id: &str) -> bool {
        self.count(id) > 0
    }

    pub fn count(&self, id: &str) -> u32 {
        self.items.get(id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.items.values().sum()
    }

    /// Consume one unit and hand back its effect.
    pub fn use_item(&mut self, catalog: &ItemCatalog, id: &str) -> Option<ItemEffect> {
        if !self.has(id) {
            return None;
        }
        let effect = catalog.get(id)?.effect;
        self.remove(id, 1);
        Some(effect)
    }

    pub fn entries<'a>(&'a self, catalog: &'a ItemCatalog) -> Vec<InventoryEntry<'a>> {
        self.items
            .iter()
            .filter_map(|(id, quantity)| {
                let def = catalog.get(id)?;
                Some(InventoryEntry {
                    id: id.as_str(),
                    quantity: *quantity,
                    def,
                })
            })
            .collect()
    }

    pub fn battle_items<'a>(&'a self, catalog: &'a ItemCatalog) -> Vec<InventoryEntry<'a>> {
        self.entries(catalog)
            .into_iter()
            .filter(|entry| entry.def.usable_in_battle)
            .collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, u32> {
        self.items.clone()
    }

    pub fn restore(&mut self, state: BTreeMap<String, u32>) {
        self.items = state.into_iter().filter(|(_, qty)| *qty > 0).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_kit_is_two_coffees_and_a_pastry() {
        let catalog = ItemCatalog::builtin();
        let inventory = Inventory::starting(&catalog);
        assert_eq!(inventory.count("caffe"), 2);
        assert_eq!(inventory.count("sfogliatella"), 1);
        assert_eq!(inventory.total(), 3);
    }

    #[test]
    fn add_caps_at_max_stack() {
        let catalog = ItemCatalog::builtin();
        let mut inventory = Inventory::default();
        assert!(inventory.add(&catalog, "foto_mamma", 4));
        assert_eq!(inventory.count("foto_mamma"), 1);
        assert!(!inventory.add(&catalog, "pizza", 1));
    }

    #[test]
    fn use_item_consumes_one_unit() {
        let catalog = ItemCatalog::builtin();
        let mut inventory = Inventory::starting(&catalog);
        let effect = inventory.use_item(&catalog, "sfogliatella").unwrap();
        assert_eq!(effect.heal(), 35);
        assert!(!inventory.has("sfogliatella"));
        assert!(inventory.use_item(&catalog, "sfogliatella").is_none());
        assert!(!inventory.remove("caffe", 3));
    }

    #[test]
    fn restore_drops_empty_stacks() {
        let mut inventory = Inventory::default();
        let mut state = BTreeMap::new();
        state.insert("caffe".to_string(), 0);
        state.insert("rosario".to_string(), 2);
        inventory.restore(state);
        assert_eq!(inventory.snapshot().len(), 1);
    }
}
