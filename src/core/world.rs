use bevy_ecs::prelude::*;

use crate::core::config::GameConfig;
use crate::core::ecs::{create_schedule, create_world};
use crate::data::ContentLibrary;
use crate::persistence::{MemorySaveStore, SaveRepository, SaveSystem};
use crate::simulation::battle::{BattleAction, BattleResult, BattleState, Turn};
use crate::simulation::dialogue::{DialogueState, DialogueView};
use crate::simulation::inventory::Inventory;
use crate::simulation::karma::{Ending, KarmaState, KarmaSummary};
use crate::simulation::minigame::{MinigameInput, MinigameKind, MinigameOutcome, MinigameState};
use crate::simulation::objectives::{ObjectiveTracker, START_MAP};
use crate::simulation::time::GameClock;
use crate::systems::dialogue::dialogue_view;
use crate::systems::encounter::EncounterState;

/// Intent-driven commands fed into the ECS each tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionIntent {
    /// Talk to an NPC, opening its script.
    Interact { npc: String, script: String },
    Advance,
    SelectChoice(usize),
    Battle(BattleAction),
    /// Play out every pending battle beat now.
    SkipBeats,
    Minigame(MinigameInput),
    /// `kind: None` picks one at random.
    StartMinigame {
        kind: Option<MinigameKind>,
        difficulty: f32,
    },
    Travel { map: String, x: f32, y: f32 },
    Examine { lore_id: String, memory: bool },
    TriggerEnding,
}

/// Resource storing the intents for the next tick.
#[derive(Resource, Default, Debug)]
pub struct ActionQueue(pub Vec<ActionIntent>);

/// Things that happened during a tick, for the caller to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Rejected(String),
    MapEntered(String),
    AchievementUnlocked(String),
    BattleFinished { enemy_id: String, result: BattleResult },
    MinigameFinished(MinigameOutcome),
    EndingReached(Ending),
}

#[derive(Resource, Default, Debug)]
pub struct EventFeed(pub Vec<GameEvent>);

impl EventFeed {
    pub fn push(&mut self, event: GameEvent) {
        self.0.push(event);
    }

    pub fn take(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.0)
    }
}

/// Data snapshot returned to the UI layer after each tick.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub time_str: String,
    pub map: String,
    pub objective: String,
    pub stage: u32,
    pub karma: KarmaSummary,
    pub dialogue: Option<DialogueView>,
    /// Lines and picks of the latest conversation.
    pub transcript: Vec<String>,
    pub battle: Option<BattleView>,
    pub minigame: Option<MinigameView>,
    pub inventory: Vec<(String, u32)>,
    pub events: Vec<GameEvent>,
    pub ending: Option<Ending>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BattleView {
    pub enemy_name: String,
    pub enemy_health: (i32, i32),
    pub player_health: (i32, i32),
    pub temptation: i32,
    pub player_turn: bool,
    pub busy: bool,
    pub round: u32,
    pub result: Option<BattleResult>,
    pub last_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinigameView {
    pub kind: MinigameKind,
    pub label: &'static str,
    pub elapsed_ms: u32,
    pub remaining_ms: Option<u32>,
    pub score: u32,
    pub combo: u32,
    pub locked: bool,
}

/// Wrapper around the ECS world and schedule.
pub struct Game {
    world: World,
    schedule: Schedule,
    seed: u64,
}

impl Game {
    /// Create a game on the bundled content with an in-memory save.
    pub fn new(seed: u64) -> Self {
        let content = ContentLibrary::bundled().unwrap_or_else(|err| {
            tracing::warn!("Bundled content unavailable, using built-in tables: {}", err);
            ContentLibrary::builtin()
        });
        Self::with_parts(
            seed,
            content,
            GameConfig::default(),
            Box::new(MemorySaveStore::new()),
        )
    }

    pub fn with_parts(
        seed: u64,
        content: ContentLibrary,
        config: GameConfig,
        store: Box<dyn SaveRepository>,
    ) -> Self {
        let save = SaveSystem::open(store);
        Self {
            world: create_world(seed, content, config, save),
            schedule: create_schedule(),
            seed,
        }
    }

    /// Run a simulation tick with the provided intents and return a snapshot for rendering.
    pub fn tick(&mut self, intents: Vec<ActionIntent>, delta_ms: u32) -> Snapshot {
        self.world.resource_mut::<ActionQueue>().0 = intents;
        self.world.resource_mut::<GameClock>().delta_ms = delta_ms;

        self.schedule.run(&mut self.world);

        let played = self.world.resource_mut::<GameClock>().take_unsaved_play_ms();
        self.world
            .non_send_resource_mut::<SaveSystem>()
            .add_play_time(played);
        let events = self.world.resource_mut::<EventFeed>().take();
        Snapshot::capture(&self.world, events)
    }

    /// Fresh run: karma, inventory, objectives and the save record all reset.
    pub fn new_game(&mut self) {
        self.clear_sessions();
        self.world.resource_mut::<KarmaState>().reset();
        self.world
            .resource_scope(|world, content: Mut<ContentLibrary>| {
                world.resource_mut::<Inventory>().reset(&content.items);
                let mut objectives = world.resource_mut::<ObjectiveTracker>();
                objectives.reset();
                objectives.init_for_map(&content.objectives, START_MAP);
            });
        self.world.non_send_resource_mut::<SaveSystem>().reset();
        tracing::info!(seed = self.seed, "new game started");
    }

    /// Resume from the stored record. Returns false when there is nothing
    /// to continue; karma comes from the stored checkpoint, empty if none.
    pub fn continue_game(&mut self) -> bool {
        let record = {
            let mut save = self.world.non_send_resource_mut::<SaveSystem>();
            save.reload();
            if !save.has_save() {
                return false;
            }
            save.record().clone()
        };

        self.clear_sessions();
        *self.world.resource_mut::<KarmaState>() = record.karma.clone().unwrap_or_default();
        self.world.resource_mut::<DialogueState>().text_speed = record.settings.text_speed;
        self.world
            .resource_scope(|world, content: Mut<ContentLibrary>| {
                {
                    let mut inventory = world.resource_mut::<Inventory>();
                    match record.inventory.clone() {
                        Some(items) => inventory.restore(items),
                        None => inventory.reset(&content.items),
                    }
                }
                let mut objectives = world.resource_mut::<ObjectiveTracker>();
                objectives.reset();
                objectives.init_for_map(&content.objectives, &record.current_map);
            });
        tracing::info!(map = %record.current_map, "game continued");
        true
    }

    /// Checkpoint karma and inventory into the save record.
    pub fn save(&mut self) {
        let karma = self.world.resource::<KarmaState>().clone();
        let inventory = self.world.resource::<Inventory>().snapshot();
        self.world
            .non_send_resource_mut::<SaveSystem>()
            .checkpoint(&karma, inventory);
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn resource<R: Resource>(&self) -> &R {
        self.world.resource::<R>()
    }

    pub fn save_system(&self) -> &SaveSystem {
        self.world.non_send_resource::<SaveSystem>()
    }

    pub fn save_system_mut(&mut self) -> Mut<'_, SaveSystem> {
        self.world.non_send_resource_mut::<SaveSystem>()
    }

    /// A snapshot without advancing time.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.world, Vec::new())
    }

    fn clear_sessions(&mut self) {
        self.world.resource_mut::<DialogueState>().dismiss();
        self.world.resource_mut::<BattleState>().abort();
        {
            let mut minigame = self.world.resource_mut::<MinigameState>();
            minigame.session = None;
            minigame.outcome = None;
        }
        *self.world.resource_mut::<EncounterState>() = EncounterState::default();
    }
}

impl Snapshot {
    fn capture(world: &World, events: Vec<GameEvent>) -> Self {
        let content = world.resource::<ContentLibrary>();
        let config = world.resource::<GameConfig>();
        let karma = world.resource::<KarmaState>();
        let objectives = world.resource::<ObjectiveTracker>();
        let encounter = world.resource::<EncounterState>();
        let save = world.non_send_resource::<SaveSystem>();

        let dialogue_state = world.resource::<DialogueState>();
        let dialogue = dialogue_view(dialogue_state, &content.scripts, &config.dialogue);

        let battle = world
            .resource::<BattleState>()
            .session
            .as_ref()
            .map(|session| BattleView {
                enemy_name: session.enemy.name.clone(),
                enemy_health: (session.enemy_health.current, session.enemy_health.max),
                player_health: (session.player_health.current, session.player_health.max),
                temptation: session.temptation.value(),
                player_turn: session.turn == Turn::Player,
                busy: session.is_busy(),
                round: session.round,
                result: session.result,
                last_message: session.log.last().cloned(),
            });

        let minigame = world
            .resource::<MinigameState>()
            .session
            .as_ref()
            .map(|session| MinigameView {
                kind: session.kind,
                label: session.kind.label(),
                elapsed_ms: session.elapsed_ms,
                remaining_ms: session.timer.map(|timer| timer.remaining_ms),
                score: session.score(),
                combo: session.combo,
                locked: session.is_locked(),
            });

        let inventory = world
            .resource::<Inventory>()
            .entries(&content.items)
            .into_iter()
            .map(|entry| (entry.id.to_string(), entry.quantity))
            .collect();

        Self {
            time_str: world.resource::<GameClock>().to_string(),
            map: save.record().current_map.clone(),
            objective: objectives.current.clone(),
            stage: encounter.stage,
            karma: karma.summary(config.karma.good_ending_threshold),
            dialogue,
            transcript: dialogue_state.log.clone(),
            battle,
            minigame,
            inventory,
            events,
            ending: encounter.ending,
        }
    }
}
