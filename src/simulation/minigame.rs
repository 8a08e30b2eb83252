use std::collections::BTreeMap;

use bevy_ecs::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinigameKind {
    RapidPress,
    BalanceHold,
    RhythmMatch,
    HoldToFill,
    BreathTiming,
    PursuitFocus,
    MemoryMatch,
    LaneDodge,
    SequenceRepeat,
}

pub const ALL_KINDS: [MinigameKind; 9] = [
    MinigameKind::RapidPress,
    MinigameKind::BalanceHold,
    MinigameKind::RhythmMatch,
    MinigameKind::HoldToFill,
    MinigameKind::BreathTiming,
    MinigameKind::PursuitFocus,
    MinigameKind::MemoryMatch,
    MinigameKind::LaneDodge,
    MinigameKind::SequenceRepeat,
];

/// Kinds whose success pushes karma toward escalation. Everything else
/// pushes toward de-escalation.
pub const AGGRESSIVE_KINDS: [MinigameKind; 3] = [
    MinigameKind::RapidPress,
    MinigameKind::RhythmMatch,
    MinigameKind::HoldToFill,
];

impl MinigameKind {
    pub fn is_aggressive(&self) -> bool {
        AGGRESSIVE_KINDS.contains(self)
    }

    /// Karma delta applied on success.
    pub fn karma_nudge(&self, perfect: bool) -> i32 {
        let magnitude = if perfect { 2 } else { 1 };
        if self.is_aggressive() {
            -magnitude
        } else {
            magnitude
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MinigameKind::RapidPress => "rapid-press",
            MinigameKind::BalanceHold => "balance-hold",
            MinigameKind::RhythmMatch => "rhythm-match",
            MinigameKind::HoldToFill => "hold-to-fill",
            MinigameKind::BreathTiming => "breath-timing",
            MinigameKind::PursuitFocus => "pursuit-focus",
            MinigameKind::MemoryMatch => "memory-match",
            MinigameKind::LaneDodge => "lane-dodge",
            MinigameKind::SequenceRepeat => "sequence-repeat",
        }
    }
}

/// Input sampled for one tick. `*_pressed` are edges, `*_held` are levels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinigameInput {
    pub confirm_pressed: bool,
    pub confirm_held: bool,
    pub left_pressed: bool,
    pub right_pressed: bool,
    pub left_held: bool,
    pub right_held: bool,
    pub pointer: Option<(f32, f32)>,
    /// A card index (memory-match) or a symbol (sequence-repeat).
    pub pick: Option<usize>,
}

impl MinigameInput {
    pub fn confirm() -> Self {
        Self {
            confirm_pressed: true,
            confirm_held: true,
            ..Self::default()
        }
    }

    pub fn hold() -> Self {
        Self {
            confirm_held: true,
            ..Self::default()
        }
    }

    pub fn pick(index: usize) -> Self {
        Self {
            pick: Some(index),
            ..Self::default()
        }
    }

    /// Fold another frame in. Flags combine; the later pointer and pick win.
    pub fn merge(&mut self, other: &MinigameInput) {
        self.confirm_pressed |= other.confirm_pressed;
        self.confirm_held |= other.confirm_held;
        self.left_pressed |= other.left_pressed;
        self.right_pressed |= other.right_pressed;
        self.left_held |= other.left_held;
        self.right_held |= other.right_held;
        if other.pointer.is_some() {
            self.pointer = other.pointer;
        }
        if other.pick.is_some() {
            self.pick = other.pick;
        }
    }
}

/// Counts and lengths are derived from difficulty, so it is capped here.
pub const MAX_DIFFICULTY: f32 = 20.0;

pub const FIELD_WIDTH: f32 = 800.0;
pub const FIELD_HEIGHT: f32 = 600.0;

pub const RHYTHM_TARGET_RADIUS: f32 = 50.0;
pub const RHYTHM_MAX_RADIUS: f32 = 70.0;
pub const BALANCE_LIMIT: f32 = 100.0;
pub const HOLD_MAX: f32 = 300.0;
pub const FOCUS_CAPTURE_RADIUS: f32 = 30.0;
pub const FOCUS_GOAL: f32 = 1000.0;
pub const MEMORY_FLIP_BACK_MS: u32 = 800;
pub const LANE_COUNT: i32 = 3;
pub const LANE_PLAYER_Y: f32 = 400.0;
pub const LANE_PLAYER_HEIGHT: f32 = 40.0;
pub const LANE_OBSTACLE_START_Y: f32 = 150.0;
pub const LANE_OBSTACLE_HEIGHT: f32 = 30.0;
pub const LANE_PASSED_Y: f32 = 420.0;
pub const SEQUENCE_SYMBOLS: u8 = 4;
pub const SEQUENCE_LEAD_IN_MS: u32 = 1000;
pub const SEQUENCE_TIMEOUT_MS: u32 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub lane: i32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencePhase {
    LeadIn { remaining_ms: u32 },
    Showing { index: usize, lit: bool, remaining_ms: u32 },
    Input,
}

/// Kind-specific counters.
#[derive(Debug, Clone, PartialEq)]
pub enum MinigameProgress {
    RapidPress {
        count: u32,
        target: u32,
    },
    BalanceHold {
        value: f32,
        velocity: f32,
    },
    RhythmMatch {
        radius: f32,
        speed: f32,
        hits: u32,
        goal: u32,
    },
    HoldToFill {
        value: f32,
        decay: f32,
    },
    BreathTiming {
        phase: f32,
        speed: f32,
    },
    PursuitFocus {
        target: (f32, f32),
        score: f32,
    },
    MemoryMatch {
        values: Vec<u8>,
        revealed: Vec<bool>,
        first_pick: Option<usize>,
        matches: u32,
        /// Mismatched pair waiting to flip back, with time left.
        flip_back: Option<(usize, usize, u32)>,
    },
    LaneDodge {
        lane: i32,
        obstacles: Vec<Obstacle>,
        spawn_every_ms: u32,
        spawn_elapsed_ms: u32,
        spawned: u32,
        max_spawns: u32,
        dodges: u32,
        goal: u32,
    },
    SequenceRepeat {
        sequence: Vec<u8>,
        entered: usize,
        phase: SequencePhase,
        show_ms: u32,
        gap_ms: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinigameTimer {
    pub remaining_ms: u32,
    /// Outcome when the timer runs out.
    pub win_on_expiry: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinigameSession {
    pub kind: MinigameKind,
    pub difficulty: f32,
    pub progress: MinigameProgress,
    pub timer: Option<MinigameTimer>,
    pub elapsed_ms: u32,
    pub combo: u32,
}

fn timer(ms: f32, win_on_expiry: bool) -> Option<MinigameTimer> {
    Some(MinigameTimer {
        remaining_ms: ms.max(0.0) as u32,
        win_on_expiry,
    })
}

impl MinigameSession {
    pub fn new<R: Rng + ?Sized>(kind: MinigameKind, difficulty: f32, rng: &mut R) -> Self {
        let d = if difficulty.is_finite() {
            difficulty.clamp(0.0, MAX_DIFFICULTY)
        } else {
            0.0
        };
        let (progress, timer) = match kind {
            MinigameKind::RapidPress => (
                MinigameProgress::RapidPress {
                    count: 0,
                    target: (5.0 + d * 2.0).floor() as u32,
                },
                timer((4000.0 - d * 300.0).max(2000.0), false),
            ),
            MinigameKind::BalanceHold => {
                let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                (
                    MinigameProgress::BalanceHold {
                        value: 0.0,
                        velocity: sign * 0.5,
                    },
                    timer((4000.0 + d * 500.0).min(8000.0), true),
                )
            }
            MinigameKind::RhythmMatch => (
                MinigameProgress::RhythmMatch {
                    radius: 0.0,
                    speed: 0.02 + d * 0.005,
                    hits: 0,
                    goal: (3.0 + d).floor() as u32,
                },
                None,
            ),
            MinigameKind::HoldToFill => (
                MinigameProgress::HoldToFill {
                    value: 0.0,
                    decay: 0.5 + d * 0.1,
                },
                timer(5000.0, false),
            ),
            MinigameKind::BreathTiming => (
                MinigameProgress::BreathTiming {
                    phase: 0.0,
                    speed: 0.002 + d * 0.0005,
                },
                timer(5000.0, true),
            ),
            MinigameKind::PursuitFocus => (
                MinigameProgress::PursuitFocus {
                    target: (FIELD_WIDTH / 2.0, FIELD_HEIGHT / 2.0),
                    score: 0.0,
                },
                timer(5000.0, false),
            ),
            MinigameKind::MemoryMatch => {
                let pairs = (3 + d.floor() as u32).min(6);
                let mut values: Vec<u8> = (0..pairs as u8).flat_map(|v| [v, v]).collect();
                values.shuffle(rng);
                let revealed = vec![false; values.len()];
                (
                    MinigameProgress::MemoryMatch {
                        values,
                        revealed,
                        first_pick: None,
                        matches: 0,
                        flip_back: None,
                    },
                    timer((30_000.0 - d * 2000.0).max(10_000.0), false),
                )
            }
            MinigameKind::LaneDodge => {
                let goal = 5 + d.floor() as u32;
                (
                    MinigameProgress::LaneDodge {
                        lane: 1,
                        obstacles: Vec::new(),
                        spawn_every_ms: (800.0 - d * 50.0).max(400.0) as u32,
                        spawn_elapsed_ms: 0,
                        spawned: 0,
                        max_spawns: goal + 3,
                        dodges: 0,
                        goal,
                    },
                    timer(15_000.0, false),
                )
            }
            MinigameKind::SequenceRepeat => {
                let length = 3 + d.floor() as usize;
                let sequence = (0..length)
                    .map(|_| rng.gen_range(0..SEQUENCE_SYMBOLS))
                    .collect();
                (
                    MinigameProgress::SequenceRepeat {
                        sequence,
                        entered: 0,
                        phase: SequencePhase::LeadIn {
                            remaining_ms: SEQUENCE_LEAD_IN_MS,
                        },
                        show_ms: (300.0 - d * 20.0).max(100.0) as u32,
                        gap_ms: (200.0 - d * 15.0).max(50.0) as u32,
                    },
                    // Armed once the sequence starts showing.
                    None,
                )
            }
        };

        Self {
            kind,
            difficulty: d,
            progress,
            timer,
            elapsed_ms: 0,
            combo: 0,
        }
    }

    /// Score recorded for the high-score table on success.
    pub fn score(&self) -> u32 {
        match &self.progress {
            MinigameProgress::RapidPress { count, .. } => *count,
            MinigameProgress::RhythmMatch { hits, .. } => hits + self.combo * 2,
            MinigameProgress::HoldToFill { value, .. } => value.floor() as u32,
            MinigameProgress::BreathTiming { .. } => 100,
            MinigameProgress::PursuitFocus { score, .. } => score.floor() as u32,
            MinigameProgress::MemoryMatch { .. } => 1000u32.saturating_sub(self.elapsed_ms),
            MinigameProgress::LaneDodge { dodges, .. } => *dodges,
            MinigameProgress::SequenceRepeat { sequence, .. } => {
                sequence.len() as u32 * 100 + self.combo * 10
            }
            MinigameProgress::BalanceHold { .. } => 100,
        }
    }

    /// Memory-match refuses picks while a mismatched pair is showing.
    pub fn is_locked(&self) -> bool {
        matches!(
            self.progress,
            MinigameProgress::MemoryMatch {
                flip_back: Some(_),
                ..
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinigameOutcome {
    pub kind: MinigameKind,
    pub success: bool,
    pub perfect: bool,
    pub score: u32,
    pub karma_nudge: i32,
    pub new_record: bool,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct MinigameState {
    pub session: Option<MinigameSession>,
    pub outcome: Option<MinigameOutcome>,
    pub high_scores: BTreeMap<MinigameKind, u32>,
    /// Set when `high_scores` changed and should be persisted.
    pub scores_dirty: bool,
}

impl MinigameState {
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn take_outcome(&mut self) -> Option<MinigameOutcome> {
        self.outcome.take()
    }

    /// Returns true if `score` beats the stored best.
    pub fn record_score(&mut self, kind: MinigameKind, score: u32) -> bool {
        let best = self.high_scores.get(&kind).copied().unwrap_or(0);
        if score > best {
            self.high_scores.insert(kind, score);
            self.scores_dirty = true;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn nudge_table_is_explicit() {
        assert_eq!(MinigameKind::RapidPress.karma_nudge(false), -1);
        assert_eq!(MinigameKind::HoldToFill.karma_nudge(true), -2);
        assert_eq!(MinigameKind::BreathTiming.karma_nudge(false), 1);
        assert_eq!(MinigameKind::LaneDodge.karma_nudge(true), 2);
        assert_eq!(
            ALL_KINDS.iter().filter(|k| k.is_aggressive()).count(),
            AGGRESSIVE_KINDS.len()
        );
    }

    #[test]
    fn difficulty_scales_setup() {
        let mut rng = StdRng::seed_from_u64(3);
        let session = MinigameSession::new(MinigameKind::RapidPress, 1.0, &mut rng);
        assert_eq!(
            session.progress,
            MinigameProgress::RapidPress { count: 0, target: 7 }
        );
        assert_eq!(session.timer.map(|t| t.remaining_ms), Some(3700));

        let memory = MinigameSession::new(MinigameKind::MemoryMatch, 9.0, &mut rng);
        match memory.progress {
            MinigameProgress::MemoryMatch { values, .. } => assert_eq!(values.len(), 12),
            other => panic!("unexpected progress {:?}", other),
        }
        assert_eq!(memory.timer.map(|t| t.remaining_ms), Some(12_000));

        let dodge = MinigameSession::new(MinigameKind::LaneDodge, 10.0, &mut rng);
        match dodge.progress {
            MinigameProgress::LaneDodge {
                spawn_every_ms,
                goal,
                max_spawns,
                ..
            } => {
                assert_eq!(spawn_every_ms, 400);
                assert_eq!(goal, 15);
                assert_eq!(max_spawns, 18);
            }
            other => panic!("unexpected progress {:?}", other),
        }
    }

    #[test]
    fn high_scores_only_move_up() {
        let mut state = MinigameState::default();
        assert!(state.record_score(MinigameKind::RapidPress, 7));
        assert!(!state.record_score(MinigameKind::RapidPress, 5));
        assert_eq!(state.high_scores[&MinigameKind::RapidPress], 7);
        assert!(state.scores_dirty);
    }
}
