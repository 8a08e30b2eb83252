use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::ContentError;

/// Which objective text a named trigger switches to, and on which map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveTrigger {
    pub map: String,
    pub objective_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveCatalog {
    /// map id -> objective key -> text. The `initial` key is used on map entry.
    #[serde(default)]
    pub objectives: HashMap<String, HashMap<String, String>>,
    #[serde(default)]
    pub triggers: HashMap<String, ObjectiveTrigger>,
}

impl ObjectiveCatalog {
    pub fn builtin() -> Self {
        let mut catalog = Self::default();
        catalog.insert("apartment", "initial", "ESCI DI CASA");
        catalog.insert("naplesAlley", "initial", "RAGGIUNGI IL TEATRO");
        catalog.insert("naplesAlley", "after_bullies", "PROSEGUI VERSO IL TEATRO");
        catalog.insert("naplesAlley", "after_elisa", "AFFRONTA I BULLI");
        catalog.insert("theater", "initial", "TROVA DARIO");
        catalog.insert("theater", "after_dario", "TORNA DA TUO PADRE");
        catalog.insert("fatherHouse", "initial", "AFFRONTA TUO PADRE");
        catalog.insert("fatherHouse", "after_father", "SCEGLI CHI ESSERE");

        catalog.trigger("talked_elisa", "naplesAlley", "after_elisa");
        catalog.trigger("defeated_bully1", "naplesAlley", "after_bullies");
        catalog.trigger("defeated_bully2", "naplesAlley", "after_bullies");
        catalog.trigger("defeated_dario", "theater", "after_dario");
        catalog.trigger("defeated_father_shadow", "fatherHouse", "after_father");
        catalog
    }

    fn insert(&mut self, map: &str, key: &str, text: &str) {
        self.objectives
            .entry(map.to_string())
            .or_default()
            .insert(key.to_string(), text.to_string());
    }

    fn trigger(&mut self, event: &str, map: &str, key: &str) {
        self.triggers.insert(
            event.to_string(),
            ObjectiveTrigger {
                map: map.to_string(),
                objective_key: key.to_string(),
            },
        );
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContentError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog: Self = serde_json::from_str(&raw).map_err(|source| ContentError::Json {
            path: path.display().to_string(),
            source,
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), ContentError> {
        for (event, trigger) in &self.triggers {
            if self.objective(&trigger.map, &trigger.objective_key).is_none() {
                return Err(ContentError::Validation(format!(
                    "trigger {} points at missing objective {}.{}",
                    event, trigger.map, trigger.objective_key
                )));
            }
        }
        Ok(())
    }

    pub fn objective(&self, map: &str, key: &str) -> Option<&str> {
        self.objectives.get(map)?.get(key).map(String::as_str)
    }

    pub fn initial(&self, map: &str) -> Option<&str> {
        self.objective(map, "initial")
    }

    pub fn trigger_for(&self, event: &str) -> Option<&ObjectiveTrigger> {
        self.triggers.get(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_triggers_resolve() {
        let catalog = ObjectiveCatalog::builtin();
        catalog.validate().unwrap();
        assert_eq!(catalog.initial("theater"), Some("TROVA DARIO"));
        assert_eq!(
            catalog.trigger_for("defeated_dario").map(|t| t.map.as_str()),
            Some("theater")
        );
    }

    #[test]
    fn dangling_trigger_is_rejected() {
        let mut catalog = ObjectiveCatalog::default();
        catalog.trigger("x", "nowhere", "initial");
        assert!(catalog.validate().is_err());
    }
}
