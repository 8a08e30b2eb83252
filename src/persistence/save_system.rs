use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::serialization::{parse_record, SaveRecord, SaveSummary};
use crate::persistence::repository::{
    SaveRepository, SaveStoreError, BACKUP_SLOT, HIGH_SCORE_SLOT, PRIMARY_SLOT,
};
use crate::simulation::karma::KarmaState;
use crate::simulation::minigame::MinigameKind;

/// Owns the progress record and writes it through to a slot store.
///
/// Every mutator persists immediately. Storage failures are logged and
/// otherwise ignored; play continues on the in-memory record.
pub struct SaveSystem {
    store: Box<dyn SaveRepository>,
    record: SaveRecord,
    pending_play_ms: u64,
}

impl SaveSystem {
    pub fn open(store: Box<dyn SaveRepository>) -> Self {
        let record = load_record(store.as_ref());
        Self {
            store,
            record,
            pending_play_ms: 0,
        }
    }

    pub fn record(&self) -> &SaveRecord {
        &self.record
    }

    pub fn has_save(&self) -> bool {
        self.record.has_save()
    }

    /// Re-read the primary slot, falling back like a fresh open.
    pub fn reload(&mut self) {
        self.record = load_record(self.store.as_ref());
        self.pending_play_ms = 0;
    }

    /// Play time accrues here and is folded in on the next write.
    pub fn add_play_time(&mut self, ms: u64) {
        self.pending_play_ms = self.pending_play_ms.saturating_add(ms);
    }

    pub fn save(&mut self) {
        self.record.stats.play_time_ms += std::mem::take(&mut self.pending_play_ms);
        self.record.timestamp = now_ms().max(self.record.timestamp.saturating_add(1));
        if let Err(err) = self.write_record() {
            tracing::error!("Failed to save: {}", err);
        }
    }

    fn write_record(&mut self) -> Result<(), SaveStoreError> {
        let blob = serde_json::to_string(&self.record)?;
        if let Some(existing) = self.store.read_slot(PRIMARY_SLOT)? {
            self.store.write_slot(BACKUP_SLOT, &existing)?;
        }
        self.store.write_slot(PRIMARY_SLOT, &blob)
    }

    pub fn reset(&mut self) {
        self.record = SaveRecord::default();
        self.pending_play_ms = 0;
        self.save();
    }

    pub fn set_position(&mut self, map: &str, x: f32, y: f32) -> Vec<String> {
        let unlocked = if self.record.set_position(map, x, y) {
            self.record.check_achievements()
        } else {
            Vec::new()
        };
        self.save();
        unlocked
    }

    pub fn complete_act(&mut self, act: &str) {
        if self.record.complete_act(act) {
            self.save();
        }
    }

    pub fn is_act_completed(&self, act: &str) -> bool {
        self.record.is_act_completed(act)
    }

    pub fn defeat_boss(&mut self, boss: &str) {
        if self.record.defeat_boss(boss) {
            self.save();
        }
    }

    pub fn is_boss_defeated(&self, boss: &str) -> bool {
        self.record.is_boss_defeated(boss)
    }

    pub fn see_ending(&mut self, ending: &str) -> Vec<String> {
        if !self.record.see_ending(ending) {
            return Vec::new();
        }
        self.fold_play_time();
        let unlocked = self.record.check_achievements();
        self.save();
        unlocked
    }

    pub fn increment_resist(&mut self) -> Vec<String> {
        self.record.stats.resist_count += 1;
        let unlocked = self.record.check_achievements();
        self.save();
        unlocked
    }

    pub fn increment_fight(&mut self) {
        self.record.stats.fight_count += 1;
        self.save();
    }

    pub fn increment_deaths(&mut self) {
        self.record.stats.deaths += 1;
        self.save();
    }

    pub fn increment_minigame_failures(&mut self) {
        self.record.stats.minigame_failures += 1;
        self.save();
    }

    pub fn collect_memory(&mut self, memory: &str) {
        if self.record.collect_memory(memory) {
            self.save();
        }
    }

    pub fn discover_lore(&mut self, lore: &str) {
        if self.record.discover_lore(lore) {
            self.save();
        }
    }

    pub fn set_language(&mut self, language: &str) {
        self.record.settings.language = language.to_string();
        self.save();
    }

    pub fn set_music_volume(&mut self, volume: f32) {
        self.record.set_music_volume(volume);
        self.save();
    }

    pub fn set_sfx_volume(&mut self, volume: f32) {
        self.record.set_sfx_volume(volume);
        self.save();
    }

    pub fn set_text_speed(&mut self, speed: f32) {
        self.record.set_text_speed(speed);
        self.save();
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.record.settings.fullscreen = fullscreen;
        self.save();
    }

    pub fn summary(&self) -> SaveSummary {
        self.record.summary()
    }

    /// Store run state so a later continue can pick it up.
    pub fn checkpoint(&mut self, karma: &KarmaState, inventory: BTreeMap<String, u32>) {
        self.record.karma = Some(karma.clone());
        self.record.inventory = Some(inventory);
        self.save();
    }

    pub fn load_high_scores(&self) -> BTreeMap<MinigameKind, u32> {
        let blob = match self.store.read_slot(HIGH_SCORE_SLOT) {
            Ok(Some(blob)) => blob,
            Ok(None) => return BTreeMap::new(),
            Err(err) => {
                tracing::warn!("Failed to read high scores: {}", err);
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&blob).unwrap_or_else(|err| {
            tracing::warn!("Discarding corrupt high scores: {}", err);
            BTreeMap::new()
        })
    }

    pub fn save_high_scores(&mut self, scores: &BTreeMap<MinigameKind, u32>) {
        let result = serde_json::to_string(scores)
            .map_err(SaveStoreError::from)
            .and_then(|blob| self.store.write_slot(HIGH_SCORE_SLOT, &blob));
        if let Err(err) = result {
            tracing::error!("Failed to save high scores: {}", err);
        }
    }

    fn fold_play_time(&mut self) {
        self.record.stats.play_time_ms += std::mem::take(&mut self.pending_play_ms);
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

fn read_valid(store: &dyn SaveRepository, slot: &str) -> Option<SaveRecord> {
    match store.read_slot(slot) {
        Ok(Some(blob)) => match parse_record(&blob) {
            Ok(record) => Some(record),
            Err(reason) => {
                tracing::warn!(slot, %reason, "Corrupted save detected");
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            tracing::error!(slot, "Failed to load save: {}", err);
            None
        }
    }
}

/// Primary, then backup, then defaults.
fn load_record(store: &dyn SaveRepository) -> SaveRecord {
    if let Some(record) = read_valid(store, PRIMARY_SLOT) {
        return record;
    }
    if let Some(record) = read_valid(store, BACKUP_SLOT) {
        tracing::info!("Restored from backup save");
        return record;
    }
    SaveRecord::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::memory::MemorySaveStore;
    use crate::persistence::sqlite::SqliteSaveStore;

    fn valid_blob(map: &str) -> String {
        format!(r#"{{"current_map":"{}","timestamp":42}}"#, map)
    }

    #[test]
    fn fresh_store_starts_from_defaults() {
        let system = SaveSystem::open(Box::new(MemorySaveStore::new()));
        assert!(!system.has_save());
        assert_eq!(system.record(), &SaveRecord::default());
    }

    #[test]
    fn corrupt_primary_falls_back_to_backup() {
        let store = MemorySaveStore::new()
            .with_slot(PRIMARY_SLOT, "{ broken")
            .with_slot(BACKUP_SLOT, &valid_blob("theater"));
        let system = SaveSystem::open(Box::new(store));
        assert_eq!(system.record().current_map, "theater");
        assert_eq!(system.record().timestamp, 42);
    }

    #[test]
    fn primary_without_timestamp_is_corrupt() {
        let store = MemorySaveStore::new()
            .with_slot(PRIMARY_SLOT, r#"{"current_map":"theater"}"#)
            .with_slot(BACKUP_SLOT, "also broken");
        let system = SaveSystem::open(Box::new(store));
        assert_eq!(system.record(), &SaveRecord::default());
    }

    #[test]
    fn save_rolls_previous_primary_into_backup() {
        let mut system = SaveSystem::open(Box::new(MemorySaveStore::new()));
        system.set_position("naplesAlley", 10.0, 20.0);
        system.set_position("theater", 30.0, 40.0);
        assert!(system.has_save());

        system.reload();
        assert_eq!(system.record().current_map, "theater");

        let backup = system.store.read_slot(BACKUP_SLOT).unwrap().unwrap();
        assert_eq!(parse_record(&backup).unwrap().current_map, "naplesAlley");
    }

    #[test]
    fn resist_unlocks_achievements_once() {
        let mut system = SaveSystem::open(Box::new(MemorySaveStore::new()));
        assert_eq!(system.increment_resist(), vec!["first_resist"]);
        assert!(system.increment_resist().is_empty());
        assert_eq!(system.increment_resist(), vec!["true_hero"]);
    }

    #[test]
    fn seeing_an_ending_is_idempotent() {
        let mut system = SaveSystem::open(Box::new(MemorySaveStore::new()));
        system.increment_fight();
        let unlocked = system.see_ending("DAWN");
        assert_eq!(unlocked, vec!["dominator", "speedrun", "perfectionist"]);
        assert!(system.see_ending("DAWN").is_empty());
        assert_eq!(system.record().seen_endings.len(), 1);
    }

    #[test]
    fn saving_over_a_maximal_timestamp_does_not_overflow() {
        let blob = format!(r#"{{"current_map":"theater","timestamp":{}}}"#, u64::MAX);
        let store = MemorySaveStore::new().with_slot(PRIMARY_SLOT, &blob);
        let mut system = SaveSystem::open(Box::new(store));
        assert_eq!(system.record().timestamp, u64::MAX);
        system.increment_deaths();
        assert_eq!(system.record().timestamp, u64::MAX);
        assert_eq!(system.record().stats.deaths, 1);
    }

    #[test]
    fn play_time_is_folded_on_save() {
        let mut system = SaveSystem::open(Box::new(MemorySaveStore::new()));
        system.add_play_time(1_500);
        system.increment_deaths();
        system.add_play_time(500);
        system.save();
        assert_eq!(system.record().stats.play_time_ms, 2_000);
        assert_eq!(system.record().stats.deaths, 1);
    }

    #[test]
    fn reset_clears_progress_but_keeps_a_save() {
        let mut system = SaveSystem::open(Box::new(MemorySaveStore::new()));
        system.defeat_boss("dario");
        system.complete_act("act1");
        system.reset();
        assert!(!system.is_boss_defeated("dario"));
        assert!(!system.is_act_completed("act1"));
        assert!(system.has_save());
    }

    #[test]
    fn high_scores_use_their_own_slot() {
        let mut system = SaveSystem::open(Box::new(SqliteSaveStore::open_in_memory().unwrap()));
        assert!(system.load_high_scores().is_empty());

        let mut scores = BTreeMap::new();
        scores.insert(MinigameKind::RapidPress, 12);
        scores.insert(MinigameKind::LaneDodge, 300);
        system.save_high_scores(&scores);
        assert_eq!(system.load_high_scores(), scores);
        assert!(!system.has_save());
    }

    #[test]
    fn checkpoint_stores_karma_and_inventory() {
        let mut system = SaveSystem::open(Box::new(MemorySaveStore::new()));
        let karma = KarmaState {
            resist_count: 2,
            fight_count: 1,
            choices: Vec::new(),
        };
        let mut inventory = BTreeMap::new();
        inventory.insert("caffe".to_string(), 1);
        system.checkpoint(&karma, inventory.clone());
        system.reload();
        assert_eq!(system.record().karma.as_ref(), Some(&karma));
        assert_eq!(system.record().inventory.as_ref(), Some(&inventory));
    }
}
