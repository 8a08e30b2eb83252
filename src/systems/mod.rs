pub mod battle_loop;
pub mod dialogue;
pub mod encounter;
pub mod minigame;

use bevy_ecs::prelude::*;
use thiserror::Error;

use crate::core::config::GameConfig;
use crate::core::world::{ActionIntent, ActionQueue, EventFeed, GameEvent};
use crate::data::ContentLibrary;
use crate::simulation::battle::BattleState;
use crate::simulation::dialogue::DialogueState;
use crate::simulation::inventory::Inventory;
use crate::simulation::karma::KarmaState;
use crate::simulation::minigame::{MinigameInput, MinigameState};
use crate::simulation::time::{GameClock, GameRng};
use crate::systems::battle_loop::BattleContext;
use crate::systems::dialogue::DialogueContext;

/// Input that arrived at the wrong moment. Rejections never change state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionRejected {
    #[error("another session is still running")]
    Busy,
    #[error("no session is active")]
    NoSession,
    #[error("it is not the player's turn")]
    NotPlayerTurn,
    #[error("the battle is already over")]
    BattleOver,
    #[error("no usable items")]
    NoItems,
    #[error("unknown item `{0}`")]
    UnknownItem(String),
    #[error("item `{0}` cannot be used in battle")]
    ItemNotUsable(String),
    #[error("choice {0} is not available")]
    InvalidChoice(usize),
    #[error("a choice must be made first")]
    AwaitingChoice,
    #[error("the current line is still being shown")]
    AwaitingLine,
}

fn reject(events: &mut EventFeed, intent: &ActionIntent, err: ActionRejected) {
    tracing::debug!(?intent, %err, "intent rejected");
    events.push(GameEvent::Rejected(err.to_string()));
}

/// System: feeds dialogue intents into the dialogue engine.
#[allow(clippy::too_many_arguments)]
pub fn dialogue_intake_system(
    queue: Res<ActionQueue>,
    content: Res<ContentLibrary>,
    config: Res<GameConfig>,
    inventory: Res<Inventory>,
    battle: Res<BattleState>,
    minigame: Res<MinigameState>,
    mut karma: ResMut<KarmaState>,
    mut dialogue: ResMut<DialogueState>,
    mut events: ResMut<EventFeed>,
) {
    let engaged = battle.is_active() || minigame.is_active();
    let mut ctx = DialogueContext {
        scripts: &content.scripts,
        karma: &mut karma,
        inventory: &inventory,
        config: &config.dialogue,
    };
    for intent in queue.0.iter() {
        let result = match intent {
            ActionIntent::Interact { .. } if engaged => Err(ActionRejected::Busy),
            ActionIntent::Interact { npc, script } => {
                dialogue::show_dialogue(&mut dialogue, &mut ctx, script, Some(npc.clone()))
            }
            ActionIntent::Advance => dialogue::advance_dialogue(&mut dialogue, &mut ctx),
            ActionIntent::SelectChoice(index) => {
                dialogue::select_choice(&mut dialogue, &mut ctx, *index)
            }
            _ => continue,
        };
        if let Err(err) = result {
            reject(&mut events, intent, err);
        }
    }
}

/// System: feeds battle commands into the active battle.
pub fn battle_intake_system(
    queue: Res<ActionQueue>,
    content: Res<ContentLibrary>,
    config: Res<GameConfig>,
    mut inventory: ResMut<Inventory>,
    mut rng: ResMut<GameRng>,
    mut battle: ResMut<BattleState>,
    mut events: ResMut<EventFeed>,
) {
    let mut ctx = BattleContext {
        inventory: &mut inventory,
        items: &content.items,
        config: &config.battle,
        rng: &mut rng.0,
    };
    for intent in queue.0.iter() {
        match intent {
            ActionIntent::Battle(action) => {
                if let Err(err) = battle_loop::submit_action(&mut battle, &mut ctx, action.clone())
                {
                    reject(&mut events, intent, err);
                }
            }
            ActionIntent::SkipBeats => battle_loop::fast_forward(&mut battle, &mut ctx),
            _ => {}
        }
    }
}

/// System: starts minigames requested directly by the caller.
pub fn minigame_intake_system(
    queue: Res<ActionQueue>,
    dialogue: Res<DialogueState>,
    battle: Res<BattleState>,
    mut rng: ResMut<GameRng>,
    mut minigame: ResMut<MinigameState>,
    mut events: ResMut<EventFeed>,
) {
    let engaged = dialogue.is_active() || battle.is_active();
    for intent in queue.0.iter() {
        let result = match intent {
            ActionIntent::StartMinigame { .. } if engaged => Err(ActionRejected::Busy),
            ActionIntent::StartMinigame {
                kind: Some(kind),
                difficulty,
            } => minigame::start_minigame(&mut minigame, *kind, *difficulty, &mut rng.0),
            ActionIntent::StartMinigame {
                kind: None,
                difficulty,
            } => minigame::start_random(&mut minigame, *difficulty, &mut rng.0).map(|_| ()),
            _ => continue,
        };
        if let Err(err) = result {
            reject(&mut events, intent, err);
        }
    }
}

/// System: typewriter reveal and choice countdown.
pub fn dialogue_tick_system(
    clock: Res<GameClock>,
    content: Res<ContentLibrary>,
    config: Res<GameConfig>,
    inventory: Res<Inventory>,
    mut karma: ResMut<KarmaState>,
    mut dialogue: ResMut<DialogueState>,
) {
    let mut ctx = DialogueContext {
        scripts: &content.scripts,
        karma: &mut karma,
        inventory: &inventory,
        config: &config.dialogue,
    };
    dialogue::tick_dialogue(&mut dialogue, &mut ctx, clock.delta_ms);
}

/// System: plays pending battle beats.
pub fn battle_tick_system(
    clock: Res<GameClock>,
    content: Res<ContentLibrary>,
    config: Res<GameConfig>,
    mut inventory: ResMut<Inventory>,
    mut rng: ResMut<GameRng>,
    mut battle: ResMut<BattleState>,
) {
    let mut ctx = BattleContext {
        inventory: &mut inventory,
        items: &content.items,
        config: &config.battle,
        rng: &mut rng.0,
    };
    battle_loop::tick_battle(&mut battle, &mut ctx, clock.delta_ms);
}

/// System: steps the minigame with this tick's input. Input intents are
/// merged so one tick sees every press queued for it.
pub fn minigame_tick_system(
    queue: Res<ActionQueue>,
    clock: Res<GameClock>,
    mut rng: ResMut<GameRng>,
    mut minigame: ResMut<MinigameState>,
) {
    let mut input = MinigameInput::default();
    for intent in queue.0.iter() {
        if let ActionIntent::Minigame(frame) = intent {
            input.merge(frame);
        }
    }
    minigame::tick_minigame(&mut minigame, &input, clock.delta_ms, &mut rng.0);
}
