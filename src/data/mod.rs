//! Read-only JSON content: scripts, enemies, items, objectives and achievements.

pub mod achievements;
pub mod enemies;
pub mod items;
pub mod objectives;
pub mod scripts;

use std::path::Path;

use bevy_ecs::prelude::*;
use thiserror::Error;

use self::achievements::AchievementCatalog;
use self::enemies::EnemyCatalog;
use self::items::ItemCatalog;
use self::objectives::ObjectiveCatalog;
use self::scripts::ScriptCatalog;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid content: {0}")]
    Validation(String),
}

/// Every catalog the game reads at runtime, bundled as one resource.
#[derive(Resource, Debug, Clone, Default)]
pub struct ContentLibrary {
    pub scripts: ScriptCatalog,
    pub enemies: EnemyCatalog,
    pub items: ItemCatalog,
    pub objectives: ObjectiveCatalog,
    pub achievements: AchievementCatalog,
}

impl ContentLibrary {
    /// Built-in tables only; scripts stay empty.
    pub fn builtin() -> Self {
        Self {
            scripts: ScriptCatalog::default(),
            enemies: EnemyCatalog::builtin(),
            items: ItemCatalog::builtin(),
            objectives: ObjectiveCatalog::builtin(),
            achievements: AchievementCatalog::builtin(),
        }
    }

    /// Load every catalog from `dir`. Scripts are mandatory; the other tables
    /// fall back to their built-in versions when their file is absent.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ContentError> {
        let dir = dir.as_ref();
        let scripts = ScriptCatalog::load(dir.join("scripts.json"))?;

        let enemies_path = dir.join("enemies.json");
        let enemies = if enemies_path.exists() {
            EnemyCatalog::load(&enemies_path)?
        } else {
            EnemyCatalog::builtin()
        };

        let items_path = dir.join("items.json");
        let items = if items_path.exists() {
            ItemCatalog::load(&items_path)?
        } else {
            ItemCatalog::builtin()
        };

        let objectives_path = dir.join("objectives.json");
        let objectives = if objectives_path.exists() {
            ObjectiveCatalog::load(&objectives_path)?
        } else {
            ObjectiveCatalog::builtin()
        };

        tracing::info!(
            scripts = scripts.len(),
            enemies = enemies.len(),
            items = items.len(),
            "content loaded from {}",
            dir.display()
        );

        Ok(Self {
            scripts,
            enemies,
            items,
            objectives,
            achievements: AchievementCatalog::builtin(),
        })
    }

    /// The bundled `assets/data` directory.
    pub fn bundled() -> Result<Self, ContentError> {
        Self::load_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/data"))
    }
}
