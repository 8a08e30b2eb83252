use bevy_ecs::prelude::*;

use crate::data::objectives::ObjectiveCatalog;

pub const DEFAULT_OBJECTIVE: &str = "SOPRAVVIVI";
pub const START_MAP: &str = "apartment";

/// The objective line shown in the HUD, driven by named triggers.
#[derive(Resource, Debug, Clone, PartialEq, Eq)]
pub struct ObjectiveTracker {
    pub current: String,
    pub current_map: String,
}

impl Default for ObjectiveTracker {
    fn default() -> Self {
        Self {
            current: DEFAULT_OBJECTIVE.to_string(),
            current_map: START_MAP.to_string(),
        }
    }
}

impl ObjectiveTracker {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn init_for_map(&mut self, catalog: &ObjectiveCatalog, map: &str) {
        self.current_map = map.to_string();
        if let Some(initial) = catalog.initial(map) {
            self.set(initial);
        }
    }

    pub fn set(&mut self, objective: &str) -> bool {
        if self.current == objective {
            return false;
        }
        self.current = objective.to_string();
        true
    }

    /// Fires only when the trigger belongs to the current map.
    pub fn trigger(&mut self, catalog: &ObjectiveCatalog, event: &str) -> bool {
        let Some(trigger) = catalog.trigger_for(event) else {
            return false;
        };
        if trigger.map != self.current_map {
            tracing::debug!(event, map = %self.current_map, "objective trigger ignored off-map");
            return false;
        }
        match catalog.objective(&self.current_map, &trigger.objective_key) {
            Some(text) => self.set(text),
            None => false,
        }
    }

    pub fn on_enemy_defeated(&mut self, catalog: &ObjectiveCatalog, enemy_id: &str) -> bool {
        self.trigger(catalog, &format!("defeated_{}", enemy_id))
    }

    pub fn on_near_npc(&mut self, catalog: &ObjectiveCatalog, npc_id: &str) -> bool {
        self.trigger(catalog, &format!("near_{}", npc_id))
    }

    pub fn on_talked(&mut self, catalog: &ObjectiveCatalog, npc_id: &str) -> bool {
        self.trigger(catalog, &format!("talked_{}", npc_id))
    }
}
