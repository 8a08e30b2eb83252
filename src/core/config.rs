use std::fs;
use std::path::Path;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::ContentError;

/// Tunables for the whole game, loaded once at startup.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub battle: BattleConfig,
    #[serde(default)]
    pub karma: KarmaConfig,
    #[serde(default)]
    pub dialogue: DialogueConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    pub player_max_hp: i32,
    pub base_damage: i32,
    /// Damage is rolled in `base_damage..base_damage + damage_spread`.
    pub damage_spread: i32,
    pub resist_heal: i32,
    pub temptation_per_fight: i32,
    pub temptation_per_resist: i32,
    pub flee_chance: f64,
    pub flee_fail_temptation: i32,
    pub message_hold_ms: u32,
    pub end_hold_ms: u32,
    pub difficulty_scaling: f32,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            player_max_hp: 100,
            base_damage: 15,
            damage_spread: 10,
            resist_heal: 10,
            temptation_per_fight: 10,
            temptation_per_resist: -5,
            flee_chance: 0.5,
            flee_fail_temptation: 5,
            message_hold_ms: 1200,
            end_hold_ms: 800,
            difficulty_scaling: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KarmaConfig {
    pub good_ending_threshold: i32,
}

impl Default for KarmaConfig {
    fn default() -> Self {
        Self {
            good_ending_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Milliseconds per revealed character at text speed 1.0.
    pub typewriter_delay_ms: f32,
    pub choice_timer_ms: u32,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            typewriter_delay_ms: 25.0,
            choice_timer_ms: 10_000,
        }
    }
}

impl GameConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContentError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ContentError::Json {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ContentError> {
        let battle = &self.battle;
        if battle.player_max_hp <= 0 {
            return Err(ContentError::Validation(format!(
                "player_max_hp must be positive, got {}",
                battle.player_max_hp
            )));
        }
        if battle.base_damage < 0 || battle.damage_spread < 0 {
            return Err(ContentError::Validation(
                "battle damage values cannot be negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&battle.flee_chance) {
            return Err(ContentError::Validation(format!(
                "flee_chance must be within [0, 1], got {}",
                battle.flee_chance
            )));
        }
        Ok(())
    }

    /// Falls back to built-in defaults when the file is missing or malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("using default game config: {}", err);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: GameConfig =
            serde_json::from_str(r#"{ "battle": { "flee_chance": 0.25 } }"#).unwrap();
        assert_eq!(config.battle.flee_chance, 0.25);
        assert_eq!(config.battle.player_max_hp, 100);
        assert_eq!(config.karma.good_ending_threshold, 2);
        assert_eq!(config.dialogue.choice_timer_ms, 10_000);
    }

    #[test]
    fn non_positive_player_hp_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game_config.json");
        fs::write(&path, r#"{ "battle": { "player_max_hp": -5 } }"#).unwrap();
        assert!(matches!(
            GameConfig::load(&path),
            Err(ContentError::Validation(_))
        ));
        assert_eq!(GameConfig::load_or_default(&path), GameConfig::default());
    }

    #[test]
    fn missing_file_falls_back() {
        let config = GameConfig::load_or_default("/nonexistent/game_config.json");
        assert_eq!(config, GameConfig::default());
    }
}
