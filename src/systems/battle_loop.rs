use rand::seq::SliceRandom;
use rand::Rng;

use crate::core::config::BattleConfig;
use crate::data::enemies::EnemyDef;
use crate::data::items::ItemCatalog;
use crate::simulation::battle::{
    BattleAction, BattleActionKind, BattleBeat, BattleOutcome, BattleResult, BattleSession,
    BattleState, Turn,
};
use crate::simulation::inventory::Inventory;
use crate::systems::ActionRejected;

pub struct BattleContext<'a, R: Rng> {
    pub inventory: &'a mut Inventory,
    pub items: &'a ItemCatalog,
    pub config: &'a BattleConfig,
    pub rng: &'a mut R,
}

pub fn start_battle(
    state: &mut BattleState,
    enemy: EnemyDef,
    config: &BattleConfig,
) -> Result<(), ActionRejected> {
    if state.is_active() {
        return Err(ActionRejected::Busy);
    }
    state.outcome = None;
    let mut session = BattleSession::new(enemy, config.player_max_hp);
    session
        .log
        .push(format!("{} ti sbarra la strada!", session.enemy.name));
    tracing::info!(enemy = %session.enemy.id, "battle started");
    state.session = Some(session);
    Ok(())
}

/// Apply a player action and schedule the rest of the turn as beats.
pub fn submit_action<R: Rng>(
    state: &mut BattleState,
    ctx: &mut BattleContext<R>,
    action: BattleAction,
) -> Result<(), ActionRejected> {
    let Some(session) = state.session.as_mut() else {
        return Err(ActionRejected::NoSession);
    };
    if session.is_terminal() {
        return Err(ActionRejected::BattleOver);
    }
    if session.is_busy() {
        return Err(ActionRejected::Busy);
    }
    if session.turn != Turn::Player {
        return Err(ActionRejected::NotPlayerTurn);
    }

    let hold = ctx.config.message_hold_ms;
    let message = match &action {
        BattleAction::Fight => {
            let spread = ctx.config.damage_spread.max(0);
            let roll = if spread > 0 { ctx.rng.gen_range(0..spread) } else { 0 };
            let damage = session.enemy_health.damage(ctx.config.base_damage + roll);
            session.temptation.shift(ctx.config.temptation_per_fight);
            format!("Attacchi con rabbia! {} danni!", damage)
        }
        BattleAction::Resist => {
            let healed = session.player_health.heal(ctx.config.resist_heal);
            session.temptation.shift(ctx.config.temptation_per_resist);
            format!("Mantieni la dignita. +{} HP, tentazione ridotta.", healed)
        }
        BattleAction::UseItem(id) => {
            if ctx.inventory.battle_items(ctx.items).is_empty() {
                session.log.push("Non hai oggetti.".to_string());
                return Err(ActionRejected::NoItems);
            }
            let Some(def) = ctx.items.get(id) else {
                return Err(ActionRejected::UnknownItem(id.clone()));
            };
            if !def.usable_in_battle {
                return Err(ActionRejected::ItemNotUsable(id.clone()));
            }
            let name = def.name.clone();
            let Some(effect) = ctx.inventory.use_item(ctx.items, id) else {
                return Err(ActionRejected::UnknownItem(id.clone()));
            };
            let mut text = format!("Usi {}!", name);
            let healed = session.player_health.heal(effect.heal());
            if effect.heal() > 0 {
                text.push_str(&format!(" +{} HP", healed));
            }
            let relieved = -session.temptation.shift(-effect.relief());
            if effect.relief() > 0 {
                text.push_str(&format!(" -{} Tentazione", relieved));
            }
            text
        }
        BattleAction::Flee => {
            if ctx.rng.gen_bool(ctx.config.flee_chance.clamp(0.0, 1.0)) {
                session.result = Some(BattleResult::Fled);
                "Scappi via...".to_string()
            } else {
                session.temptation.shift(ctx.config.flee_fail_temptation);
                "Non riesci a fuggire!".to_string()
            }
        }
    };

    session.last_action = Some(action.kind());
    session.beats.push_back(BattleBeat::Message {
        text: message,
        hold_ms: hold,
    });

    if session.result.is_none() {
        session.result = evaluate_battle_end(session);
    }
    if session.result.is_some() {
        schedule_finish(session, ctx.config);
    } else {
        session.turn = Turn::Enemy;
        session.beats.push_back(BattleBeat::EnemyTurn);
    }

    run_beats(state, ctx, 0);
    Ok(())
}

/// Defeat wins over victory, and both win over the mask taking over.
pub fn evaluate_battle_end(session: &BattleSession) -> Option<BattleResult> {
    if session.player_health.is_depleted() {
        Some(BattleResult::Defeat)
    } else if session.enemy_health.is_depleted() {
        Some(BattleResult::Victory)
    } else if session.temptation.is_overflowing() {
        Some(BattleResult::Overtaken)
    } else {
        None
    }
}

pub fn tick_battle<R: Rng>(state: &mut BattleState, ctx: &mut BattleContext<R>, delta_ms: u32) {
    run_beats(state, ctx, delta_ms);
}

/// Run every pending beat regardless of holds.
pub fn fast_forward<R: Rng>(state: &mut BattleState, ctx: &mut BattleContext<R>) {
    run_beats(state, ctx, u32::MAX);
}

fn run_beats<R: Rng>(state: &mut BattleState, ctx: &mut BattleContext<R>, delta_ms: u32) {
    let mut finished = false;
    if let Some(session) = state.session.as_mut() {
        let mut budget = delta_ms;
        loop {
            if session.hold_remaining_ms > 0 {
                let spent = budget.min(session.hold_remaining_ms);
                session.hold_remaining_ms -= spent;
                budget -= spent;
                if session.hold_remaining_ms > 0 {
                    break;
                }
            }
            let Some(beat) = session.beats.pop_front() else {
                break;
            };
            match beat {
                BattleBeat::Message { text, hold_ms } => {
                    session.log.push(text);
                    session.hold_remaining_ms = hold_ms;
                }
                BattleBeat::EnemyTurn => enemy_turn(session, ctx),
                BattleBeat::Finish => {
                    finished = true;
                    break;
                }
            }
        }
        if !finished && !session.is_busy() && !session.is_terminal() {
            if session.turn == Turn::Enemy {
                session.round += 1;
            }
            session.turn = Turn::Player;
        }
    }

    if finished {
        if let Some(session) = state.session.take() {
            let result = session.result.unwrap_or(BattleResult::Fled);
            tracing::info!(enemy = %session.enemy.id, ?result, "battle finished");
            state.outcome = Some(BattleOutcome {
                enemy_id: session.enemy.id.clone(),
                boss: session.enemy.boss,
                result,
                last_action: session.last_action.unwrap_or(BattleActionKind::Flee),
            });
        }
    }
}

fn enemy_turn<R: Rng>(session: &mut BattleSession, ctx: &mut BattleContext<R>) {
    let hold = ctx.config.message_hold_ms;
    let text = match session.enemy.attacks.choose(ctx.rng) {
        Some(attack) => {
            let damage = session.player_health.damage(attack.damage);
            session.temptation.shift(attack.temptation);
            format!(
                "{}: \"{}\"\n{} danni!",
                session.enemy.name, attack.text, damage
            )
        }
        None => format!("{} esita.", session.enemy.name),
    };
    session.beats.push_back(BattleBeat::Message {
        text,
        hold_ms: hold,
    });
    session.result = evaluate_battle_end(session);
    if session.result.is_some() {
        schedule_finish(session, ctx.config);
    }
}

fn schedule_finish(session: &mut BattleSession, config: &BattleConfig) {
    if let Some(result) = session.result {
        session.beats.push_back(BattleBeat::Message {
            text: result.closing_line().to_string(),
            hold_ms: config.message_hold_ms + config.end_hold_ms,
        });
        session.beats.push_back(BattleBeat::Finish);
    }
}
