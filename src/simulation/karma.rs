use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::simulation::battle::BattleActionKind;

pub const DEFAULT_ENDING_THRESHOLD: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ending {
    /// The redemptive ending.
    Dawn,
    /// The mask wins.
    EternalNight,
}

impl Ending {
    pub fn id(&self) -> &'static str {
        match self {
            Ending::Dawn => "DAWN",
            Ending::EternalNight => "ETERNAL_NIGHT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpcRelation {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceRecord {
    pub id: String,
    pub delta: i32,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub npc: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ChoiceRecord {
    pub fn new(id: impl Into<String>, delta: i32) -> Self {
        Self {
            id: id.into(),
            delta,
            text: None,
            npc: None,
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KarmaSummary {
    pub resist_count: u32,
    pub fight_count: u32,
    pub score: i32,
    pub ending: Ending,
}

/// Run-scoped karma: two behavior counters plus every narrative choice taken.
#[derive(Resource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KarmaState {
    pub resist_count: u32,
    pub fight_count: u32,
    #[serde(default)]
    pub choices: Vec<ChoiceRecord>,
}

impl KarmaState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Only fight and resist move the counters.
    pub fn record_battle_action(&mut self, kind: BattleActionKind) {
        match kind {
            BattleActionKind::Resist => self.resist_count += 1,
            BattleActionKind::Fight => self.fight_count += 1,
            BattleActionKind::Item | BattleActionKind::Flee => {}
        }
    }

    pub fn record_choice(&mut self, record: ChoiceRecord) {
        tracing::debug!(id = %record.id, delta = record.delta, "karma choice recorded");
        self.choices.push(record);
    }

    pub fn score(&self) -> i32 {
        let battle = self.resist_count as i32 - self.fight_count as i32;
        let choices: i32 = self.choices.iter().map(|c| c.delta).sum();
        battle + choices
    }

    pub fn ending(&self) -> Ending {
        self.ending_at(DEFAULT_ENDING_THRESHOLD)
    }

    pub fn ending_at(&self, threshold: i32) -> Ending {
        if self.score() >= threshold {
            Ending::Dawn
        } else {
            Ending::EternalNight
        }
    }

    pub fn has_choice(&self, id: &str) -> bool {
        self.choices.iter().any(|c| c.id == id)
    }

    pub fn choices_with_npc<'a>(&'a self, npc: &'a str) -> impl Iterator<Item = &'a ChoiceRecord> {
        self.choices
            .iter()
            .filter(move |c| c.npc.as_deref() == Some(npc))
    }

    pub fn npc_relation(&self, npc: &str) -> NpcRelation {
        let total: i32 = self.choices_with_npc(npc).map(|c| c.delta).sum();
        match total {
            t if t > 0 => NpcRelation::Positive,
            t if t < 0 => NpcRelation::Negative,
            _ => NpcRelation::Neutral,
        }
    }

    pub fn summary(&self, threshold: i32) -> KarmaSummary {
        KarmaSummary {
            resist_count: self.resist_count,
            fight_count: self.fight_count,
            score: self.score(),
            ending: self.ending_at(threshold),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_resists_one_fight_reaches_dawn() {
        let mut karma = KarmaState::default();
        for _ in 0..3 {
            karma.record_battle_action(BattleActionKind::Resist);
        }
        karma.record_battle_action(BattleActionKind::Fight);
        karma.record_battle_action(BattleActionKind::Flee);
        karma.record_battle_action(BattleActionKind::Item);
        assert_eq!(karma.score(), 2);
        assert_eq!(karma.ending(), Ending::Dawn);
        assert_eq!(karma.score(), karma.score());
    }

    #[test]
    fn just_below_threshold_is_eternal_night() {
        let mut karma = KarmaState::default();
        karma.record_choice(ChoiceRecord::new("dario_intro", 1));
        assert_eq!(karma.ending(), Ending::EternalNight);
        assert_eq!(karma.ending_at(1), Ending::Dawn);
    }

    #[test]
    fn repeated_choices_each_count() {
        let mut karma = KarmaState::default();
        karma.record_choice(ChoiceRecord::new("elisa_meet", 1));
        karma.record_choice(ChoiceRecord::new("elisa_meet", 1));
        assert_eq!(karma.score(), 2);
        assert!(karma.has_choice("elisa_meet"));
        assert!(!karma.has_choice("bully_encounter"));
    }

    #[test]
    fn npc_relation_follows_delta_sum() {
        let mut karma = KarmaState::default();
        let mut record = ChoiceRecord::new("elisa_meet", -1);
        record.npc = Some("elisa".into());
        karma.record_choice(record.clone());
        assert_eq!(karma.npc_relation("elisa"), NpcRelation::Negative);
        record.delta = 2;
        karma.record_choice(record);
        assert_eq!(karma.npc_relation("elisa"), NpcRelation::Positive);
        assert_eq!(karma.npc_relation("dario"), NpcRelation::Neutral);
        assert_eq!(karma.choices_with_npc("elisa").count(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut karma = KarmaState::default();
        karma.record_battle_action(BattleActionKind::Fight);
        karma.record_choice(ChoiceRecord::new("x", 3));
        karma.reset();
        assert_eq!(karma, KarmaState::default());
        assert_eq!(karma.summary(2).score, 0);
    }
}
