use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::simulation::karma::KarmaState;
use crate::simulation::objectives::START_MAP;

pub const SAVE_VERSION: u32 = 1;

/// Maps the explorer achievement asks for.
pub const STORY_MAPS: [&str; 4] = ["apartment", "naplesAlley", "theater", "fatherHouse"];

const DEVOTED_PLAY_MS: u64 = 3_600_000;
const SPEEDRUN_PLAY_MS: u64 = 1_800_000;

/// The persisted progress record. Every field has a default so an older
/// blob with missing keys still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveRecord {
    pub version: u32,
    pub current_map: String,
    pub position: SavedPosition,
    pub completed_acts: Vec<String>,
    pub defeated_bosses: Vec<String>,
    pub seen_endings: Vec<String>,
    pub visited_maps: Vec<String>,
    pub stats: SaveStats,
    pub achievements: BTreeSet<String>,
    pub narrative: NarrativeProgress,
    pub settings: Settings,
    /// Milliseconds since the epoch of the last write; 0 until first saved.
    pub timestamp: u64,
    /// Karma as of the last checkpoint, restored on continue.
    pub karma: Option<KarmaState>,
    pub inventory: Option<BTreeMap<String, u32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavedPosition {
    pub x: f32,
    pub y: f32,
}

impl Default for SavedPosition {
    fn default() -> Self {
        Self { x: 200.0, y: 300.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveStats {
    pub resist_count: u32,
    pub fight_count: u32,
    pub play_time_ms: u64,
    pub deaths: u32,
    pub minigame_failures: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeProgress {
    pub collected_memories: Vec<String>,
    pub discovered_lore: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub language: String,
    pub music_volume: f32,
    pub sfx_volume: f32,
    /// 0.5 is slow, 1.0 normal, 2.0 fast.
    pub text_speed: f32,
    pub fullscreen: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: "it".to_string(),
            music_volume: 0.5,
            sfx_volume: 0.7,
            text_speed: 1.0,
            fullscreen: false,
        }
    }
}

impl Default for SaveRecord {
    fn default() -> Self {
        Self {
            version: SAVE_VERSION,
            current_map: START_MAP.to_string(),
            position: SavedPosition::default(),
            completed_acts: Vec::new(),
            defeated_bosses: Vec::new(),
            seen_endings: Vec::new(),
            visited_maps: vec![START_MAP.to_string()],
            stats: SaveStats::default(),
            achievements: BTreeSet::new(),
            narrative: NarrativeProgress::default(),
            settings: Settings::default(),
            timestamp: 0,
            karma: None,
            inventory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSummary {
    pub play_time: String,
    pub map: String,
    pub karma: String,
    pub timestamp: u64,
}

/// A blob is usable only if it names a map and carries a numeric timestamp.
pub fn parse_record(blob: &str) -> Result<SaveRecord, String> {
    let value: serde_json::Value = serde_json::from_str(blob).map_err(|err| err.to_string())?;
    let map_ok = value
        .get("current_map")
        .and_then(|map| map.as_str())
        .is_some_and(|map| !map.is_empty());
    if !map_ok {
        return Err("missing current_map".to_string());
    }
    if !value.get("timestamp").is_some_and(|ts| ts.is_number()) {
        return Err("missing timestamp".to_string());
    }
    serde_json::from_value(value).map_err(|err| err.to_string())
}

pub fn map_display_name(map: &str) -> &'static str {
    match map {
        "apartment" => "Casa di Gennaro",
        "theater" => "Teatro Bellini",
        "fatherHouse" => "Casa del Padre",
        "naplesAlley" => "Vicolo di Napoli",
        _ => "Ignoto",
    }
}

fn push_unique(list: &mut Vec<String>, id: &str) -> bool {
    if list.iter().any(|entry| entry == id) {
        return false;
    }
    list.push(id.to_string());
    true
}

impl SaveRecord {
    pub fn has_save(&self) -> bool {
        self.timestamp > 0
    }

    /// Returns true when `map` was visited for the first time.
    pub fn set_position(&mut self, map: &str, x: f32, y: f32) -> bool {
        self.current_map = map.to_string();
        self.position = SavedPosition { x, y };
        push_unique(&mut self.visited_maps, map)
    }

    pub fn complete_act(&mut self, act: &str) -> bool {
        push_unique(&mut self.completed_acts, act)
    }

    pub fn is_act_completed(&self, act: &str) -> bool {
        self.completed_acts.iter().any(|entry| entry == act)
    }

    pub fn defeat_boss(&mut self, boss: &str) -> bool {
        push_unique(&mut self.defeated_bosses, boss)
    }

    pub fn is_boss_defeated(&self, boss: &str) -> bool {
        self.defeated_bosses.iter().any(|entry| entry == boss)
    }

    pub fn see_ending(&mut self, ending: &str) -> bool {
        push_unique(&mut self.seen_endings, ending)
    }

    pub fn collect_memory(&mut self, memory: &str) -> bool {
        push_unique(&mut self.narrative.collected_memories, memory)
    }

    pub fn discover_lore(&mut self, lore: &str) -> bool {
        push_unique(&mut self.narrative.discovered_lore, lore)
    }

    pub fn set_music_volume(&mut self, volume: f32) {
        self.settings.music_volume = volume.clamp(0.0, 1.0);
    }

    pub fn set_sfx_volume(&mut self, volume: f32) {
        self.settings.sfx_volume = volume.clamp(0.0, 1.0);
    }

    pub fn set_text_speed(&mut self, speed: f32) {
        self.settings.text_speed = speed.clamp(0.5, 3.0);
    }

    /// Unlock whatever the current stats earn. Returns the new ids in
    /// catalog order.
    pub fn check_achievements(&mut self) -> Vec<String> {
        let stats = self.stats.clone();
        let endings = self.seen_endings.len();
        let explored = STORY_MAPS
            .iter()
            .all(|map| self.visited_maps.iter().any(|visited| visited == map));

        let mut earned = vec![
            ("first_resist", stats.resist_count >= 1),
            ("true_hero", stats.resist_count >= 3),
            ("duality", endings >= 2),
            ("all_endings", endings >= 3),
            ("devoted", stats.play_time_ms >= DEVOTED_PLAY_MS),
            ("explorer", explored),
        ];
        if endings > 0 {
            earned.extend([
                ("pacifist", stats.fight_count == 0),
                ("dominator", stats.resist_count == 0),
                ("speedrun", stats.play_time_ms < SPEEDRUN_PLAY_MS),
                ("perfectionist", stats.minigame_failures == 0),
            ]);
        }

        let mut unlocked = Vec::new();
        for (id, met) in earned {
            if met && self.achievements.insert(id.to_string()) {
                unlocked.push(id.to_string());
            }
        }
        unlocked
    }

    pub fn summary(&self) -> SaveSummary {
        let total_minutes = self.stats.play_time_ms / 60_000;
        let score = i64::from(self.stats.resist_count) - i64::from(self.stats.fight_count);
        let karma = match score {
            s if s > 0 => "Puro",
            s if s < 0 => "Corrotto",
            _ => "Neutrale",
        };
        SaveSummary {
            play_time: format!("{}h {}m", total_minutes / 60, total_minutes % 60),
            map: map_display_name(&self.current_map).to_string(),
            karma: karma.to_string(),
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_preserves_record() {
        let mut record = SaveRecord::default();
        record.set_position("theater", 12.0, 34.0);
        record.defeat_boss("dario");
        record.stats.deaths = 2;
        record.timestamp = 1_700_000_000_000;
        record.karma = Some(KarmaState {
            resist_count: 1,
            ..KarmaState::default()
        });

        let blob = serde_json::to_string(&record).unwrap();
        assert_eq!(parse_record(&blob).unwrap(), record);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let record = parse_record(r#"{"current_map":"theater","timestamp":5}"#).unwrap();
        assert_eq!(record.current_map, "theater");
        assert_eq!(record.visited_maps, vec!["apartment".to_string()]);
        assert_eq!(record.settings.language, "it");
        assert_eq!(record.position, SavedPosition { x: 200.0, y: 300.0 });
    }

    #[test]
    fn invalid_blobs_are_rejected() {
        assert!(parse_record("not json").is_err());
        assert!(parse_record(r#"{"current_map":"","timestamp":5}"#).is_err());
        assert!(parse_record(r#"{"current_map":"theater"}"#).is_err());
        assert!(parse_record(r#"{"current_map":"theater","timestamp":"x"}"#).is_err());
    }

    #[test]
    fn ending_gated_achievements_wait_for_an_ending() {
        let mut record = SaveRecord::default();
        assert!(record.check_achievements().is_empty());

        record.see_ending("DAWN");
        let unlocked = record.check_achievements();
        assert_eq!(
            unlocked,
            vec!["pacifist", "dominator", "speedrun", "perfectionist"]
        );
        assert!(record.check_achievements().is_empty());
    }

    #[test]
    fn explorer_needs_every_story_map() {
        let mut record = SaveRecord::default();
        for map in ["naplesAlley", "theater"] {
            record.set_position(map, 0.0, 0.0);
        }
        assert!(record.check_achievements().is_empty());
        assert!(record.set_position("fatherHouse", 0.0, 0.0));
        assert!(!record.set_position("fatherHouse", 1.0, 1.0));
        assert_eq!(record.check_achievements(), vec!["explorer"]);
    }

    #[test]
    fn summary_formats_time_and_karma_label() {
        let mut record = SaveRecord::default();
        record.stats.play_time_ms = 3_600_000 + 5 * 60_000 + 59_000;
        record.stats.fight_count = 2;
        record.current_map = "naplesAlley".to_string();
        let summary = record.summary();
        assert_eq!(summary.play_time, "1h 5m");
        assert_eq!(summary.map, "Vicolo di Napoli");
        assert_eq!(summary.karma, "Corrotto");

        record.current_map = "moon".to_string();
        record.stats.resist_count = 2;
        let summary = record.summary();
        assert_eq!(summary.map, "Ignoto");
        assert_eq!(summary.karma, "Neutrale");
    }

    #[test]
    fn settings_are_clamped() {
        let mut record = SaveRecord::default();
        record.set_music_volume(1.5);
        record.set_sfx_volume(-0.2);
        record.set_text_speed(10.0);
        assert_eq!(record.settings.music_volume, 1.0);
        assert_eq!(record.settings.sfx_volume, 0.0);
        assert_eq!(record.settings.text_speed, 3.0);
    }
}
