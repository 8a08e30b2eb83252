use bevy_ecs::prelude::*;

use crate::core::config::GameConfig;
use crate::core::world::{ActionIntent, ActionQueue, EventFeed, GameEvent};
use crate::data::scripts::{Approach, ChoiceAction};
use crate::data::ContentLibrary;
use crate::persistence::SaveSystem;
use crate::simulation::battle::{BattleActionKind, BattleResult, BattleState};
use crate::simulation::dialogue::{DialogueCompletion, DialogueState};
use crate::simulation::inventory::Inventory;
use crate::simulation::karma::{ChoiceRecord, Ending, KarmaState};
use crate::simulation::minigame::{MinigameKind, MinigameOutcome, MinigameState};
use crate::simulation::objectives::ObjectiveTracker;
use crate::simulation::time::GameRng;
use crate::systems::battle_loop::start_battle;
use crate::systems::dialogue::{show_dialogue, DialogueContext};
use crate::systems::minigame::start_minigame;
use crate::systems::ActionRejected;

pub const FATHER_ID: &str = "father_shadow";
pub const DARIO_ID: &str = "dario";
pub const LOSS_SCRIPT: &str = "minigame_loss";
pub const WIN_SCRIPT: &str = "minigame_win";

/// A minigame standing in for a fight, waiting for its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChallenge {
    pub enemy_id: String,
    pub approach: Approach,
    pub kind: MinigameKind,
}

/// Run progress that lives between sessions.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct EncounterState {
    /// Loop counter; raises challenge difficulty.
    pub stage: u32,
    pub challenge: Option<PendingChallenge>,
    pub ending_requested: bool,
    pub ending: Option<Ending>,
}

impl Default for EncounterState {
    fn default() -> Self {
        Self {
            stage: 1,
            challenge: None,
            ending_requested: false,
            ending: None,
        }
    }
}

impl EncounterState {
    pub fn difficulty(&self, scaling: f32) -> f32 {
        1.0 + self.stage as f32 * scaling
    }
}

pub fn challenge_kind(approach: Approach) -> MinigameKind {
    match approach {
        Approach::Calm => MinigameKind::RhythmMatch,
        Approach::Rage => MinigameKind::RapidPress,
        Approach::Neutral => MinigameKind::BalanceHold,
    }
}

/// The script shown after a challenge is won.
pub fn win_script(enemy_id: &str, approach: Approach) -> &'static str {
    let calm = approach == Approach::Calm;
    match enemy_id {
        FATHER_ID if calm => "father_defeated_resist",
        FATHER_ID => "father_defeated_mask",
        DARIO_ID if calm => "dario_defeated",
        DARIO_ID => "dario_victory_mask",
        _ => WIN_SCRIPT,
    }
}

fn announce(events: &mut EventFeed, unlocked: Vec<String>) {
    for id in unlocked {
        tracing::info!(achievement = %id, "achievement unlocked");
        events.push(GameEvent::AchievementUnlocked(id));
    }
}

/// Count a behavior in both the run karma and the persisted stats.
fn record_behavior(
    kind: BattleActionKind,
    karma: &mut KarmaState,
    save: &mut SaveSystem,
    events: &mut EventFeed,
) {
    karma.record_battle_action(kind);
    match kind {
        BattleActionKind::Resist => {
            let unlocked = save.increment_resist();
            announce(events, unlocked);
        }
        BattleActionKind::Fight => save.increment_fight(),
        BattleActionKind::Item | BattleActionKind::Flee => {}
    }
}

fn is_engaged(dialogue: &DialogueState, battle: &BattleState, minigame: &MinigameState) -> bool {
    dialogue.is_active() || battle.is_active() || minigame.is_active()
}

/// System: map changes and lore pickups.
#[allow(clippy::too_many_arguments)]
pub fn travel_system(
    queue: Res<ActionQueue>,
    content: Res<ContentLibrary>,
    dialogue: Res<DialogueState>,
    battle: Res<BattleState>,
    minigame: Res<MinigameState>,
    mut encounter: ResMut<EncounterState>,
    mut objectives: ResMut<ObjectiveTracker>,
    mut events: ResMut<EventFeed>,
    mut save: NonSendMut<SaveSystem>,
) {
    for intent in queue.0.iter() {
        match intent {
            ActionIntent::Travel { map, x, y } => {
                if is_engaged(&dialogue, &battle, &minigame) {
                    events.push(GameEvent::Rejected(ActionRejected::Busy.to_string()));
                    continue;
                }
                let from = save.record().current_map.clone();
                if from == "fatherHouse" && save.is_boss_defeated(FATHER_ID) {
                    encounter.ending_requested = true;
                    continue;
                }
                if map == "theater" && from != "apartment" {
                    encounter.stage += 1;
                    tracing::info!(stage = encounter.stage, "stage advanced");
                }
                let unlocked = save.set_position(map, *x, *y);
                objectives.init_for_map(&content.objectives, map);
                events.push(GameEvent::MapEntered(map.clone()));
                announce(&mut events, unlocked);
            }
            ActionIntent::Examine { lore_id, memory } => {
                save.discover_lore(lore_id);
                if *memory {
                    save.collect_memory(lore_id);
                }
            }
            _ => {}
        }
    }
}

/// System: acts on whatever a finished dialogue asked for.
#[allow(clippy::too_many_arguments)]
pub fn dialogue_resolution_system(
    content: Res<ContentLibrary>,
    config: Res<GameConfig>,
    mut dialogue: ResMut<DialogueState>,
    mut battle: ResMut<BattleState>,
    mut minigame: ResMut<MinigameState>,
    mut encounter: ResMut<EncounterState>,
    mut objectives: ResMut<ObjectiveTracker>,
    mut rng: ResMut<GameRng>,
    mut events: ResMut<EventFeed>,
) {
    let Some(completion) = dialogue.take_completion() else {
        return;
    };
    let DialogueCompletion { script_id, npc, action, .. } = completion;
    tracing::debug!(script = %script_id, ?action, "dialogue completed");

    let result = match action {
        Some(ChoiceAction::Battle { enemy, .. }) => {
            start_battle(&mut battle, content.enemies.resolve(&enemy), &config.battle)
        }
        Some(ChoiceAction::Challenge { enemy, approach }) => {
            let def = content.enemies.resolve(&enemy);
            let kind = challenge_kind(approach);
            let difficulty = encounter.difficulty(config.battle.difficulty_scaling);
            objectives.set(&format!("SCONFIGGI {}", def.name.to_uppercase()));
            start_minigame(&mut minigame, kind, difficulty, &mut rng.0).map(|()| {
                encounter.challenge = Some(PendingChallenge {
                    enemy_id: def.id,
                    approach,
                    kind,
                });
            })
        }
        Some(ChoiceAction::Minigame { kind, difficulty }) => {
            let difficulty =
                difficulty.unwrap_or_else(|| encounter.difficulty(config.battle.difficulty_scaling));
            start_minigame(&mut minigame, kind, difficulty, &mut rng.0)
        }
        Some(ChoiceAction::Objective { trigger }) => {
            objectives.trigger(&content.objectives, &trigger);
            Ok(())
        }
        Some(ChoiceAction::Ending) => {
            encounter.ending_requested = true;
            Ok(())
        }
        None => {
            if let Some(npc) = npc {
                objectives.on_talked(&content.objectives, &npc);
            }
            Ok(())
        }
    };
    if let Err(err) = result {
        tracing::warn!(script = %script_id, %err, "dialogue action dropped");
        events.push(GameEvent::Rejected(err.to_string()));
    }
}

/// System: books a finished battle into karma, stats and objectives.
pub fn battle_resolution_system(
    content: Res<ContentLibrary>,
    mut battle: ResMut<BattleState>,
    mut karma: ResMut<KarmaState>,
    mut objectives: ResMut<ObjectiveTracker>,
    mut events: ResMut<EventFeed>,
    mut save: NonSendMut<SaveSystem>,
) {
    let Some(outcome) = battle.take_outcome() else {
        return;
    };
    tracing::info!(enemy = %outcome.enemy_id, result = ?outcome.result, "battle resolved");

    record_behavior(outcome.last_action, &mut karma, &mut save, &mut events);
    match outcome.result {
        BattleResult::Victory => {
            save.defeat_boss(&outcome.enemy_id);
            objectives.on_enemy_defeated(&content.objectives, &outcome.enemy_id);
        }
        BattleResult::Defeat => save.increment_deaths(),
        BattleResult::Fled | BattleResult::Overtaken => {}
    }
    events.push(GameEvent::BattleFinished {
        enemy_id: outcome.enemy_id,
        result: outcome.result,
    });
}

/// System: persists records and settles a pending challenge.
#[allow(clippy::too_many_arguments)]
pub fn minigame_resolution_system(
    content: Res<ContentLibrary>,
    config: Res<GameConfig>,
    inventory: Res<Inventory>,
    mut minigame: ResMut<MinigameState>,
    mut dialogue: ResMut<DialogueState>,
    mut karma: ResMut<KarmaState>,
    mut encounter: ResMut<EncounterState>,
    mut objectives: ResMut<ObjectiveTracker>,
    mut events: ResMut<EventFeed>,
    mut save: NonSendMut<SaveSystem>,
) {
    if minigame.scores_dirty {
        save.save_high_scores(&minigame.high_scores);
        minigame.scores_dirty = false;
    }
    let Some(outcome) = minigame.take_outcome() else {
        return;
    };
    events.push(GameEvent::MinigameFinished(outcome));
    apply_nudge(&outcome, &mut karma);

    let follow_up = match encounter.challenge.take() {
        Some(challenge) if outcome.success => {
            match challenge.approach {
                Approach::Calm => {
                    record_behavior(BattleActionKind::Resist, &mut karma, &mut save, &mut events)
                }
                Approach::Rage => {
                    record_behavior(BattleActionKind::Fight, &mut karma, &mut save, &mut events)
                }
                Approach::Neutral => {}
            }
            save.defeat_boss(&challenge.enemy_id);
            objectives.on_enemy_defeated(&content.objectives, &challenge.enemy_id);
            Some(win_script(&challenge.enemy_id, challenge.approach))
        }
        Some(_) => {
            save.increment_minigame_failures();
            Some(LOSS_SCRIPT)
        }
        None => {
            if !outcome.success {
                save.increment_minigame_failures();
            }
            None
        }
    };

    if let Some(script) = follow_up {
        let mut ctx = DialogueContext {
            scripts: &content.scripts,
            karma: &mut karma,
            inventory: &inventory,
            config: &config.dialogue,
        };
        if let Err(err) = show_dialogue(&mut dialogue, &mut ctx, script, None) {
            tracing::warn!(script, %err, "follow-up dialogue skipped");
        }
    }
}

fn apply_nudge(outcome: &MinigameOutcome, karma: &mut KarmaState) {
    if outcome.success && outcome.karma_nudge != 0 {
        let mut record = ChoiceRecord::new(
            format!("minigame_{}", outcome.kind.label()),
            outcome.karma_nudge,
        );
        record.tags.push("minigame".to_string());
        karma.record_choice(record);
    }
}

/// System: picks and records the ending once one is asked for.
pub fn ending_system(
    queue: Res<ActionQueue>,
    config: Res<GameConfig>,
    karma: Res<KarmaState>,
    inventory: Res<Inventory>,
    mut encounter: ResMut<EncounterState>,
    mut events: ResMut<EventFeed>,
    mut save: NonSendMut<SaveSystem>,
) {
    let asked = queue
        .0
        .iter()
        .any(|intent| matches!(intent, ActionIntent::TriggerEnding));
    if !(asked || encounter.ending_requested) {
        return;
    }
    encounter.ending_requested = false;

    let ending = karma.ending_at(config.karma.good_ending_threshold);
    tracing::info!(ending = ending.id(), score = karma.score(), "ending reached");
    save.checkpoint(&karma, inventory.snapshot());
    let unlocked = save.see_ending(ending.id());
    encounter.ending = Some(ending);
    events.push(GameEvent::EndingReached(ending));
    announce(&mut events, unlocked);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approach_picks_the_challenge() {
        assert_eq!(challenge_kind(Approach::Calm), MinigameKind::RhythmMatch);
        assert_eq!(challenge_kind(Approach::Rage), MinigameKind::RapidPress);
        assert_eq!(challenge_kind(Approach::Neutral), MinigameKind::BalanceHold);
    }

    #[test]
    fn win_scripts_follow_enemy_and_approach() {
        assert_eq!(win_script(FATHER_ID, Approach::Calm), "father_defeated_resist");
        assert_eq!(win_script(FATHER_ID, Approach::Rage), "father_defeated_mask");
        assert_eq!(win_script(DARIO_ID, Approach::Calm), "dario_defeated");
        assert_eq!(win_script(DARIO_ID, Approach::Neutral), "dario_victory_mask");
        assert_eq!(win_script("bully1", Approach::Calm), WIN_SCRIPT);
    }

    #[test]
    fn difficulty_grows_with_stage() {
        let mut encounter = EncounterState::default();
        assert!((encounter.difficulty(0.2) - 1.2).abs() < 1e-6);
        encounter.stage = 3;
        assert!((encounter.difficulty(0.2) - 1.6).abs() < 1e-6);
    }

    #[test]
    fn nudge_is_recorded_only_on_success() {
        let mut karma = KarmaState::default();
        let mut outcome = MinigameOutcome {
            kind: MinigameKind::BreathTiming,
            success: false,
            perfect: false,
            score: 0,
            karma_nudge: 1,
            new_record: false,
        };
        apply_nudge(&outcome, &mut karma);
        assert_eq!(karma.score(), 0);

        outcome.success = true;
        apply_nudge(&outcome, &mut karma);
        assert_eq!(karma.score(), 1);
        assert!(karma.has_choice("minigame_breath-timing"));
    }
}
