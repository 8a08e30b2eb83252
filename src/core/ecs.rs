use bevy_ecs::prelude::*;
use bevy_ecs::schedule::SystemSet;

use crate::core::config::GameConfig;
use crate::core::world::{ActionQueue, EventFeed};
use crate::data::ContentLibrary;
use crate::persistence::SaveSystem;
use crate::simulation::battle::BattleState;
use crate::simulation::dialogue::DialogueState;
use crate::simulation::inventory::Inventory;
use crate::simulation::karma::KarmaState;
use crate::simulation::minigame::MinigameState;
use crate::simulation::objectives::ObjectiveTracker;
use crate::simulation::time::{advance_clock_system, GameClock, GameRng};
use crate::systems::encounter::{
    battle_resolution_system, dialogue_resolution_system, ending_system,
    minigame_resolution_system, travel_system, EncounterState,
};
use crate::systems::{
    battle_intake_system, battle_tick_system, dialogue_intake_system, dialogue_tick_system,
    minigame_intake_system, minigame_tick_system,
};

/// Canonical tick ordering for the simulation.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum TickSet {
    Intake,
    Simulation,
    Resolution,
    Time,
}

/// Build the ECS world with baseline resources. The save system is
/// main-thread only because its store may hold a database connection.
pub fn create_world(
    seed: u64,
    content: ContentLibrary,
    config: GameConfig,
    save: SaveSystem,
) -> World {
    let mut world = World::new();

    let mut objectives = ObjectiveTracker::default();
    objectives.init_for_map(&content.objectives, &save.record().current_map);
    let minigame = MinigameState {
        high_scores: save.load_high_scores(),
        ..MinigameState::default()
    };
    let dialogue = DialogueState {
        text_speed: save.record().settings.text_speed,
        ..DialogueState::default()
    };

    world.insert_resource(GameClock::default());
    world.insert_resource(GameRng::from_seed(seed));
    world.insert_resource(ActionQueue::default());
    world.insert_resource(EventFeed::default());
    world.insert_resource(Inventory::starting(&content.items));
    world.insert_resource(KarmaState::default());
    world.insert_resource(objectives);
    world.insert_resource(dialogue);
    world.insert_resource(BattleState::default());
    world.insert_resource(minigame);
    world.insert_resource(EncounterState::default());
    world.insert_resource(content);
    world.insert_resource(config);
    world.insert_non_send_resource(save);
    world
}

/// Build the system schedule in the canonical order.
pub fn create_schedule() -> Schedule {
    let mut schedule = Schedule::default();

    schedule.configure_sets(
        (
            TickSet::Intake,
            TickSet::Simulation,
            TickSet::Resolution,
            TickSet::Time,
        )
            .chain(),
    );

    schedule.add_systems(
        (
            travel_system,
            dialogue_intake_system,
            battle_intake_system,
            minigame_intake_system,
        )
            .chain()
            .in_set(TickSet::Intake),
    );
    schedule.add_systems(
        (dialogue_tick_system, battle_tick_system, minigame_tick_system)
            .chain()
            .in_set(TickSet::Simulation),
    );
    schedule.add_systems(
        (
            dialogue_resolution_system,
            battle_resolution_system,
            minigame_resolution_system,
            ending_system,
        )
            .chain()
            .in_set(TickSet::Resolution),
    );
    schedule.add_systems(advance_clock_system.in_set(TickSet::Time));

    schedule
}
