use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::ContentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemEffect {
    Heal { amount: i32 },
    TemptationRelief { amount: i32 },
    Restore { heal: i32, relief: i32 },
}

impl ItemEffect {
    pub fn heal(&self) -> i32 {
        match *self {
            ItemEffect::Heal { amount } => amount,
            ItemEffect::Restore { heal, .. } => heal,
            ItemEffect::TemptationRelief { .. } => 0,
        }
    }

    pub fn relief(&self) -> i32 {
        match *self {
            ItemEffect::TemptationRelief { amount } => amount,
            ItemEffect::Restore { relief, .. } => relief,
            ItemEffect::Heal { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub effect: ItemEffect,
    #[serde(default = "default_true")]
    pub usable_in_battle: bool,
    #[serde(default = "default_max_stack")]
    pub max_stack: u32,
}

fn default_true() -> bool {
    true
}

fn default_max_stack() -> u32 {
    9
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemFile {
    items: Vec<ItemDef>,
}

#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: BTreeMap<String, ItemDef>,
}

impl ItemCatalog {
    pub fn builtin() -> Self {
        let item = |id: &str, name: &str, description: &str, effect, max_stack| ItemDef {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            effect,
            usable_in_battle: true,
            max_stack,
        };
        Self::from_defs(vec![
            item(
                "caffe",
                "Caffè",
                "Un espresso bollente. Rimette in piedi.",
                ItemEffect::Heal { amount: 20 },
                5,
            ),
            item(
                "sfogliatella",
                "Sfogliatella",
                "Croccante e calda, come a casa.",
                ItemEffect::Heal { amount: 35 },
                3,
            ),
            item(
                "foto_mamma",
                "Foto di Mamma",
                "Un ricordo che tiene lontana la maschera.",
                ItemEffect::Restore { heal: 15, relief: 30 },
                1,
            ),
            item(
                "rosario",
                "Rosario",
                "Le dita scorrono sui grani.",
                ItemEffect::TemptationRelief { amount: 20 },
                2,
            ),
        ])
    }

    fn from_defs(defs: Vec<ItemDef>) -> Self {
        Self {
            items: defs.into_iter().map(|i| (i.id.clone(), i)).collect(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContentError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: ItemFile = serde_json::from_str(&raw).map_err(|source| ContentError::Json {
            path: path.display().to_string(),
            source,
        })?;
        if let Some(bad) = file.items.iter().find(|i| i.max_stack == 0) {
            return Err(ContentError::Validation(format!(
                "item {} must allow at least one unit",
                bad.id
            )));
        }
        Ok(Self::from_defs(file.items))
    }

    pub fn get(&self, id: &str) -> Option<&ItemDef> {
        self.items.get(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
