use bevy_ecs::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Frame clock for the session. Delta is set by the caller before each run.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameClock {
    pub tick: u64,
    pub delta_ms: u32,
    pub elapsed_ms: u64,
    /// Play time not yet folded into the save record.
    pub unsaved_play_ms: u64,
}

impl GameClock {
    pub fn advance(&mut self) {
        self.tick += 1;
        self.elapsed_ms += u64::from(self.delta_ms);
        self.unsaved_play_ms += u64::from(self.delta_ms);
    }

    pub fn take_unsaved_play_ms(&mut self) -> u64 {
        std::mem::take(&mut self.unsaved_play_ms)
    }

    pub fn to_string(&self) -> String {
        let seconds = self.elapsed_ms / 1000;
        format!("Tick {} ({}m {:02}s)", self.tick, seconds / 60, seconds % 60)
    }
}

/// Seeded randomness shared by every system.
#[derive(Resource, Debug, Clone)]
pub struct GameRng(pub StdRng);

impl GameRng {
    pub fn from_seed(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

/// System: advances the clock after everything else ran.
pub fn advance_clock_system(mut clock: ResMut<GameClock>) {
    clock.advance();
}
