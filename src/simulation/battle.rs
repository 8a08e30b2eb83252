use std::collections::VecDeque;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::combat::{Health, Temptation};
use crate::data::enemies::EnemyDef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Turn {
    Player,
    Enemy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleResult {
    Victory,
    Defeat,
    Fled,
    /// Temptation overflowed: the mask took over.
    Overtaken,
}

impl BattleResult {
    pub fn closing_line(&self) -> &'static str {
        match self {
            BattleResult::Victory => "Hai superato questa prova.",
            BattleResult::Defeat => "Sei stato sopraffatto...",
            BattleResult::Overtaken => "La maschera prende il controllo.",
            BattleResult::Fled => "Ti allontani in silenzio.",
        }
    }
}

/// The action category reported with the outcome and fed to karma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleActionKind {
    Fight,
    Resist,
    Item,
    Flee,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BattleAction {
    Fight,
    Resist,
    UseItem(String),
    Flee,
}

impl BattleAction {
    pub fn kind(&self) -> BattleActionKind {
        match self {
            BattleAction::Fight => BattleActionKind::Fight,
            BattleAction::Resist => BattleActionKind::Resist,
            BattleAction::UseItem(_) => BattleActionKind::Item,
            BattleAction::Flee => BattleActionKind::Flee,
        }
    }
}

/// One resumable step of a turn. Beats run in order as time passes.
#[derive(Debug, Clone, PartialEq)]
pub enum BattleBeat {
    Message { text: String, hold_ms: u32 },
    EnemyTurn,
    Finish,
}

#[derive(Debug, Clone)]
pub struct BattleSession {
    pub enemy: EnemyDef,
    pub enemy_health: Health,
    pub player_health: Health,
    pub temptation: Temptation,
    pub turn: Turn,
    pub round: u32,
    pub result: Option<BattleResult>,
    pub last_action: Option<BattleActionKind>,
    pub beats: VecDeque<BattleBeat>,
    pub hold_remaining_ms: u32,
    pub log: Vec<String>,
}

impl BattleSession {
    pub fn new(enemy: EnemyDef, player_max_hp: i32) -> Self {
        let enemy_health = Health::new(enemy.max_hp);
        Self {
            enemy,
            enemy_health,
            player_health: Health::new(player_max_hp),
            temptation: Temptation::default(),
            turn: Turn::Player,
            round: 1,
            result: None,
            last_action: None,
            beats: VecDeque::new(),
            hold_remaining_ms: 0,
            log: Vec::new(),
        }
    }

    /// Input is refused while scheduled beats are pending.
    pub fn is_busy(&self) -> bool {
        self.hold_remaining_ms > 0 || !self.beats.is_empty()
    }

    pub fn is_terminal(&self) -> bool {
        self.result.is_some()
    }

    pub fn accepts_input(&self) -> bool {
        !self.is_terminal() && !self.is_busy() && self.turn == Turn::Player
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleOutcome {
    pub enemy_id: String,
    pub boss: bool,
    pub result: BattleResult,
    pub last_action: BattleActionKind,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct BattleState {
    pub session: Option<BattleSession>,
    pub outcome: Option<BattleOutcome>,
}

impl BattleState {
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn take_outcome(&mut self) -> Option<BattleOutcome> {
        self.outcome.take()
    }

    /// Drop the session without an outcome, as when its scene is torn down.
    pub fn abort(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::debug!(enemy = %session.enemy.id, "battle aborted");
        }
    }
}
