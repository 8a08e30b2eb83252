use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::ContentError;

pub const FALLBACK_ENEMY_ID: &str = "bully1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub name: String,
    pub damage: i32,
    #[serde(default)]
    pub temptation: i32,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sprite: String,
    pub max_hp: i32,
    pub attacks: Vec<Attack>,
    #[serde(default)]
    pub boss: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EnemyFile {
    enemies: Vec<EnemyDef>,
}

#[derive(Debug, Clone, Default)]
pub struct EnemyCatalog {
    enemies: HashMap<String, EnemyDef>,
}

fn attack(name: &str, damage: i32, temptation: i32, text: &str) -> Attack {
    Attack {
        name: name.to_string(),
        damage,
        temptation,
        text: text.to_string(),
    }
}

impl EnemyCatalog {
    pub fn builtin() -> Self {
        let enemies = vec![
            EnemyDef {
                id: "dario".to_string(),
                name: "Dario Izzo".to_string(),
                sprite: "dario".to_string(),
                max_hp: 80,
                attacks: vec![
                    attack("Insulto", 8, 5, "Sei solo una comparsa!"),
                    attack("Umiliazione", 12, 8, "Non vali niente!"),
                    attack("Licenziamento", 18, 12, "SEI FUORI!"),
                ],
                boss: true,
            },
            EnemyDef {
                id: "bully1".to_string(),
                name: "Bullo".to_string(),
                sprite: "bully".to_string(),
                max_hp: 40,
                attacks: vec![
                    attack("Scherno", 6, 4, "Che sfigato!"),
                    attack("Spintone", 10, 6, "Levati dai piedi!"),
                ],
                boss: false,
            },
            EnemyDef {
                id: "bully2".to_string(),
                name: "Teppista".to_string(),
                sprite: "bully".to_string(),
                max_hp: 35,
                attacks: vec![
                    attack("Minaccia", 5, 5, "Ti facciamo a pezzi!"),
                    attack("Pugno", 12, 4, "*WHACK*"),
                ],
                boss: false,
            },
            EnemyDef {
                id: "father_shadow".to_string(),
                name: "Ombra del Padre".to_string(),
                sprite: "father".to_string(),
                max_hp: 120,
                attacks: vec![
                    attack("Delusione", 10, 8, "Non sei mio figlio."),
                    attack("Silenzio", 8, 10, "..."),
                    attack("Abbandono", 15, 12, "Avrei dovuto lasciarti."),
                    attack("Verita Crudele", 20, 15, "Sei NIENTE!"),
                ],
                boss: true,
            },
        ];
        Self::from_defs(enemies)
    }

    fn from_defs(defs: Vec<EnemyDef>) -> Self {
        Self {
            enemies: defs.into_iter().map(|e| (e.id.clone(), e)).collect(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContentError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: EnemyFile = serde_json::from_str(&raw).map_err(|source| ContentError::Json {
            path: path.display().to_string(),
            source,
        })?;
        validate_enemies(&file.enemies)?;
        Ok(Self::from_defs(file.enemies))
    }

    pub fn get(&self, id: &str) -> Option<&EnemyDef> {
        self.enemies.get(id)
    }

    /// Unknown ids resolve to the fallback enemy (or a generic shadow if the
    /// catalog lacks even that).
    pub fn resolve(&self, id: &str) -> EnemyDef {
        if let Some(enemy) = self.enemies.get(id) {
            return enemy.clone();
        }
        tracing::warn!("unknown enemy {}, using fallback", id);
        self.enemies
            .get(FALLBACK_ENEMY_ID)
            .cloned()
            .unwrap_or_else(generic_shadow)
    }

    pub fn len(&self) -> usize {
        self.enemies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enemies.is_empty()
    }
}

fn generic_shadow() -> EnemyDef {
    EnemyDef {
        id: "shadow".to_string(),
        name: "Ombra".to_string(),
        sprite: String::new(),
        max_hp: 50,
        attacks: vec![attack("Sussurro", 6, 6, "Arrenditi.")],
        boss: false,
    }
}

fn validate_enemies(enemies: &[EnemyDef]) -> Result<(), ContentError> {
    for enemy in enemies {
        if enemy.id.trim().is_empty() {
            return Err(ContentError::Validation("enemy id cannot be empty".into()));
        }
        if enemy.max_hp <= 0 {
            return Err(ContentError::Validation(format!(
                "enemy {} needs positive max_hp",
                enemy.id
            )));
        }
        if enemy.attacks.is_empty() {
            return Err(ContentError::Validation(format!(
                "enemy {} has no attacks",
                enemy.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_enemy_falls_back() {
        let catalog = EnemyCatalog::builtin();
        let enemy = catalog.resolve("nobody");
        assert_eq!(enemy.id, FALLBACK_ENEMY_ID);

        let empty = EnemyCatalog::default();
        assert_eq!(empty.resolve("nobody").id, "shadow");
    }

    #[test]
    fn rejects_enemy_without_attacks() {
        let def = EnemyDef {
            id: "x".into(),
            name: "X".into(),
            sprite: String::new(),
            max_hp: 10,
            attacks: Vec::new(),
            boss: false,
        };
        assert!(validate_enemies(&[def]).is_err());
    }

    #[test]
    fn bundled_enemies_match_builtin() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/data/enemies.json");
        let loaded = EnemyCatalog::load(path).unwrap();
        let builtin = EnemyCatalog::builtin();
        for id in ["dario", "bully1", "bully2", "father_shadow"] {
            assert_eq!(loaded.get(id), builtin.get(id));
        }
    }
}
