use crate::core::config::DialogueConfig;
use crate::data::scripts::{ChoiceAction, ChoiceCondition, Script, ScriptCatalog};
use crate::simulation::dialogue::{
    DialogueCompletion, DialoguePhase, DialogueSession, DialogueState, DialogueView,
};
use crate::simulation::inventory::Inventory;
use crate::simulation::karma::{ChoiceRecord, KarmaState};
use crate::systems::ActionRejected;

/// Everything a dialogue operation reads or writes besides its own state.
pub struct DialogueContext<'a> {
    pub scripts: &'a ScriptCatalog,
    pub karma: &'a mut KarmaState,
    pub inventory: &'a Inventory,
    pub config: &'a DialogueConfig,
}

pub fn condition_holds(
    condition: Option<&ChoiceCondition>,
    karma: &KarmaState,
    inventory: &Inventory,
) -> bool {
    match condition {
        None => true,
        Some(ChoiceCondition::KarmaAbove(n)) => karma.score() > *n,
        Some(ChoiceCondition::KarmaBelow(n)) => karma.score() < *n,
        Some(ChoiceCondition::HasItem(id)) => inventory.has(id),
    }
}

/// Start a session on `script_id`. An unknown id ends the session at once
/// with an empty completion.
pub fn show_dialogue(
    state: &mut DialogueState,
    ctx: &mut DialogueContext,
    script_id: &str,
    npc: Option<String>,
) -> Result<(), ActionRejected> {
    if state.is_active() {
        return Err(ActionRejected::Busy);
    }
    state.completion = None;
    state.log.clear();

    let mut session = DialogueSession::new(script_id, npc);
    let Some(script) = ctx.scripts.get(script_id) else {
        tracing::warn!("dialogue {} not found", script_id);
        state.completion = Some(DialogueCompletion {
            script_id: script_id.to_string(),
            npc: session.npc,
            action: None,
            choice_taken: false,
        });
        return Ok(());
    };

    tracing::debug!(script = script_id, "dialogue started");
    enter_script(state, ctx, &mut session, script);
    if state.completion.is_none() {
        state.session = Some(session);
    }
    Ok(())
}

/// Completes a revealing line, or moves past a fully shown one.
pub fn advance_dialogue(
    state: &mut DialogueState,
    ctx: &mut DialogueContext,
) -> Result<(), ActionRejected> {
    let Some(mut session) = state.session.take() else {
        return Err(ActionRejected::NoSession);
    };
    let Some(script) = ctx.scripts.get(&session.script_id) else {
        finish(state, session, None, false);
        return Ok(());
    };

    match session.phase {
        DialoguePhase::Choosing => {
            state.session = Some(session);
            return Err(ActionRejected::AwaitingChoice);
        }
        DialoguePhase::Revealing => {
            session.revealed_chars = line_len(script, session.line_index);
            session.phase = DialoguePhase::Waiting;
        }
        DialoguePhase::Waiting => {
            session.line_index += 1;
            if session.line_index < script.lines.len() {
                session.restart_line();
                push_line(state, script, session.line_index);
            } else {
                end_of_lines(state, ctx, &mut session, script);
                if state.completion.is_some() {
                    return Ok(());
                }
            }
        }
    }
    state.session = Some(session);
    Ok(())
}

/// `index` counts visible choices only.
pub fn select_choice(
    state: &mut DialogueState,
    ctx: &mut DialogueContext,
    index: usize,
) -> Result<(), ActionRejected> {
    let Some(mut session) = state.session.take() else {
        return Err(ActionRejected::NoSession);
    };
    if session.phase != DialoguePhase::Choosing {
        state.session = Some(session);
        return Err(ActionRejected::AwaitingLine);
    }
    let Some(&choice_index) = session.visible_choices.get(index) else {
        state.session = Some(session);
        return Err(ActionRejected::InvalidChoice(index));
    };
    let Some(script) = ctx.scripts.get(&session.script_id) else {
        finish(state, session, None, false);
        return Ok(());
    };
    let Some(choice) = script.choices.get(choice_index) else {
        finish(state, session, None, false);
        return Ok(());
    };

    if let Some(delta) = choice.karma.filter(|d| *d != 0) {
        ctx.karma.record_choice(ChoiceRecord {
            id: script.id.clone(),
            delta,
            text: Some(choice.text.clone()),
            npc: choice.npc.clone().or_else(|| session.npc.clone()),
            tags: choice.tags.clone(),
        });
    }
    state.log.push(format!("> {}", choice.text));

    if let Some(next_id) = choice.next.as_deref() {
        match ctx.scripts.get(next_id) {
            Some(next) => {
                session.script_id = next.id.clone();
                session.line_index = 0;
                session.visible_choices.clear();
                session.choice_elapsed_ms = 0;
                enter_script(state, ctx, &mut session, next);
                if state.completion.is_none() {
                    state.session = Some(session);
                }
            }
            None => {
                tracing::warn!("dialogue {} points at missing {}", script.id, next_id);
                finish(state, session, None, true);
            }
        }
        return Ok(());
    }

    let action = choice.action.clone().or_else(|| script.on_complete.clone());
    finish(state, session, action, true);
    Ok(())
}

/// Drives the typewriter reveal and the choice countdown.
pub fn tick_dialogue(state: &mut DialogueState, ctx: &mut DialogueContext, delta_ms: u32) {
    let Some(session) = state.session.as_mut() else {
        return;
    };
    match session.phase {
        DialoguePhase::Revealing => {
            let Some(script) = ctx.scripts.get(&session.script_id) else {
                return;
            };
            let total = line_len(script, session.line_index);
            let per_char = char_delay_ms(ctx.config, state.text_speed);
            session.reveal_elapsed_ms += delta_ms as f32;
            let shown = (session.reveal_elapsed_ms / per_char).floor() as usize;
            session.revealed_chars = shown.min(total);
            if session.revealed_chars >= total {
                session.phase = DialoguePhase::Waiting;
            }
        }
        DialoguePhase::Waiting => {}
        DialoguePhase::Choosing => {
            if ctx.config.choice_timer_ms == 0 {
                return;
            }
            session.choice_elapsed_ms = session.choice_elapsed_ms.saturating_add(delta_ms);
            if session.choice_elapsed_ms >= ctx.config.choice_timer_ms {
                tracing::debug!(script = %session.script_id, "choice timer expired");
                if let Err(err) = select_choice(state, ctx, 0) {
                    tracing::warn!("auto-select failed: {}", err);
                }
            }
        }
    }
}

pub fn dialogue_view(
    state: &DialogueState,
    scripts: &ScriptCatalog,
    config: &DialogueConfig,
) -> Option<DialogueView> {
    let session = state.session.as_ref()?;
    let script = scripts.get(&session.script_id)?;
    if session.phase == DialoguePhase::Choosing {
        let choices = session
            .visible_choices
            .iter()
            .filter_map(|i| script.choices.get(*i))
            .map(|c| c.text.clone())
            .collect();
        let countdown_ms = (config.choice_timer_ms > 0).then(|| {
            config
                .choice_timer_ms
                .saturating_sub(session.choice_elapsed_ms)
        });
        return Some(DialogueView {
            speaker: None,
            text: String::new(),
            complete_line: true,
            choices,
            countdown_ms,
        });
    }
    let line = script.lines.get(session.line_index)?;
    Some(DialogueView {
        speaker: line.speaker.clone(),
        text: line.text.chars().take(session.revealed_chars).collect(),
        complete_line: session.phase == DialoguePhase::Waiting,
        choices: Vec::new(),
        countdown_ms: None,
    })
}

fn char_delay_ms(config: &DialogueConfig, text_speed: f32) -> f32 {
    let speed = if text_speed > 0.0 { text_speed } else { 1.0 };
    (config.typewriter_delay_ms / speed).max(f32::EPSILON)
}

fn line_len(script: &Script, index: usize) -> usize {
    script
        .lines
        .get(index)
        .map(|line| line.text.chars().count())
        .unwrap_or(0)
}

fn push_line(state: &mut DialogueState, script: &Script, index: usize) {
    if let Some(line) = script.lines.get(index) {
        match &line.speaker {
            Some(speaker) => state.log.push(format!("{}: {}", speaker, line.text)),
            None => state.log.push(line.text.clone()),
        }
    }
}

fn enter_script(
    state: &mut DialogueState,
    ctx: &mut DialogueContext,
    session: &mut DialogueSession,
    script: &Script,
) {
    if script.lines.is_empty() {
        end_of_lines(state, ctx, session, script);
    } else {
        session.restart_line();
        push_line(state, script, 0);
    }
}

/// Lines are exhausted: show the gated choices, or end the session.
fn end_of_lines(
    state: &mut DialogueState,
    ctx: &mut DialogueContext,
    session: &mut DialogueSession,
    script: &Script,
) {
    if script.choices.is_empty() {
        let session = std::mem::replace(session, DialogueSession::new(&script.id, None));
        finish(state, session, script.on_complete.clone(), false);
        return;
    }
    let visible: Vec<usize> = script
        .choices
        .iter()
        .enumerate()
        .filter(|(_, c)| condition_holds(c.condition.as_ref(), ctx.karma, ctx.inventory))
        .map(|(i, _)| i)
        .collect();
    if visible.is_empty() {
        tracing::debug!(script = %script.id, "every choice gated out");
        let session = std::mem::replace(session, DialogueSession::new(&script.id, None));
        finish(state, session, script.on_complete.clone(), false);
        return;
    }
    session.visible_choices = visible;
    session.choice_elapsed_ms = 0;
    session.phase = DialoguePhase::Choosing;
}

fn finish(
    state: &mut DialogueState,
    session: DialogueSession,
    action: Option<ChoiceAction>,
    choice_taken: bool,
) {
    tracing::debug!(script = %session.origin_id, ?action, "dialogue finished");
    state.session = None;
    state.completion = Some(DialogueCompletion {
        script_id: session.origin_id,
        npc: session.npc,
        action,
        choice_taken,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::scripts::{Approach, Choice};

    fn catalog() -> ScriptCatalog {
        ScriptCatalog::from_scripts(vec![
            Script::new("plain")
                .with_line(Some("GENNARO"), "Ciao.")
                .with_line(None, "...")
                .with_on_complete(ChoiceAction::Objective {
                    trigger: "talked_door".into(),
                }),
            Script::new("branch")
                .with_line(Some("DARIO"), "Esposito!")
                .with_choice(Choice::new("Calma").with_karma(1).with_action(
                    ChoiceAction::Battle {
                        enemy: "dario".into(),
                        approach: Approach::Calm,
                    },
                ))
                .with_choice(Choice::new("Rabbia").with_karma(-1).with_next("plain")),
            Script::new("gated")
                .with_line(None, "Una porta.")
                .with_choice(Choice::new("Apri").with_condition(ChoiceCondition::KarmaAbove(5)))
                .with_choice(
                    Choice::new("Bussa").with_condition(ChoiceCondition::HasItem("chiave".into())),
                ),
            Script::new("broken")
                .with_line(None, "Eh?")
                .with_choice(Choice::new("Vai").with_next("missing")),
        ])
        .unwrap()
    }

    struct Fixture {
        scripts: ScriptCatalog,
        karma: KarmaState,
        inventory: Inventory,
        config: DialogueConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                scripts: catalog(),
                karma: KarmaState::default(),
                inventory: Inventory::default(),
                config: DialogueConfig::default(),
            }
        }

        fn ctx(&mut self) -> DialogueContext<'_> {
            DialogueContext {
                scripts: &self.scripts,
                karma: &mut self.karma,
                inventory: &self.inventory,
                config: &self.config,
            }
        }
    }

    #[test]
    fn missing_script_completes_immediately_without_action() {
        let mut fx = Fixture::new();
        let mut state = DialogueState::default();
        show_dialogue(&mut state, &mut fx.ctx(), "nowhere", None).unwrap();
        assert!(!state.is_active());
        let done = state.take_completion().unwrap();
        assert_eq!(done.action, None);
        assert!(state.take_completion().is_none());
    }

    #[test]
    fn advance_first_completes_reveal_then_moves_on() {
        let mut fx = Fixture::new();
        let mut state = DialogueState::default();
        show_dialogue(&mut state, &mut fx.ctx(), "plain", None).unwrap();
        let view = dialogue_view(&state, &fx.scripts, &fx.config).unwrap();
        assert_eq!(view.text, "");

        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        let view = dialogue_view(&state, &fx.scripts, &fx.config).unwrap();
        assert_eq!(view.text, "Ciao.");
        assert!(view.complete_line);

        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        assert_eq!(state.session.as_ref().unwrap().line_index, 1);
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();

        let done = state.take_completion().unwrap();
        assert_eq!(
            done.action,
            Some(ChoiceAction::Objective {
                trigger: "talked_door".into()
            })
        );
        assert!(!done.choice_taken);
        assert!(matches!(
            advance_dialogue(&mut state, &mut fx.ctx()),
            Err(ActionRejected::NoSession)
        ));
    }

    #[test]
    fn typewriter_reveals_by_elapsed_time() {
        let mut fx = Fixture::new();
        let mut state = DialogueState::default();
        show_dialogue(&mut state, &mut fx.ctx(), "plain", None).unwrap();
        tick_dialogue(&mut state, &mut fx.ctx(), 50);
        assert_eq!(dialogue_view(&state, &fx.scripts, &fx.config).unwrap().text, "Ci");
        state.text_speed = 2.0;
        tick_dialogue(&mut state, &mut fx.ctx(), 100);
        assert_eq!(state.session.as_ref().unwrap().phase, DialoguePhase::Waiting);
    }

    #[test]
    fn choice_records_karma_and_surfaces_action() {
        let mut fx = Fixture::new();
        let mut state = DialogueState::default();
        show_dialogue(&mut state, &mut fx.ctx(), "branch", Some("dario".into())).unwrap();
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        assert!(matches!(
            select_choice(&mut state, &mut fx.ctx(), 0),
            Err(ActionRejected::AwaitingLine)
        ));
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        assert!(matches!(
            advance_dialogue(&mut state, &mut fx.ctx()),
            Err(ActionRejected::AwaitingChoice)
        ));
        assert!(matches!(
            select_choice(&mut state, &mut fx.ctx(), 7),
            Err(ActionRejected::InvalidChoice(7))
        ));
        select_choice(&mut state, &mut fx.ctx(), 0).unwrap();

        assert_eq!(fx.karma.score(), 1);
        assert_eq!(fx.karma.choices[0].npc.as_deref(), Some("dario"));
        let done = state.take_completion().unwrap();
        assert!(done.choice_taken);
        assert!(matches!(done.action, Some(ChoiceAction::Battle { .. })));
    }

    #[test]
    fn follow_up_script_continues_the_session() {
        let mut fx = Fixture::new();
        let mut state = DialogueState::default();
        show_dialogue(&mut state, &mut fx.ctx(), "branch", None).unwrap();
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        select_choice(&mut state, &mut fx.ctx(), 1).unwrap();
        assert!(state.is_active());
        assert!(state.completion.is_none());
        let session = state.session.as_ref().unwrap();
        assert_eq!(session.script_id, "plain");
        assert_eq!(session.line_index, 0);
        assert_eq!(fx.karma.score(), -1);
    }

    #[test]
    fn fully_gated_choices_end_without_a_choice() {
        let mut fx = Fixture::new();
        let mut state = DialogueState::default();
        show_dialogue(&mut state, &mut fx.ctx(), "gated", None).unwrap();
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        let done = state.take_completion().unwrap();
        assert!(!done.choice_taken);
        assert_eq!(done.action, None);
        assert!(fx.karma.choices.is_empty());
    }

    #[test]
    fn item_condition_reveals_choice() {
        let mut fx = Fixture::new();
        fx.inventory.restore([("chiave".to_string(), 1)].into_iter().collect());
        let mut state = DialogueState::default();
        show_dialogue(&mut state, &mut fx.ctx(), "gated", None).unwrap();
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        let view = dialogue_view(&state, &fx.scripts, &fx.config).unwrap();
        assert_eq!(view.choices, vec!["Bussa".to_string()]);
    }

    #[test]
    fn countdown_auto_selects_first_visible_choice() {
        let mut fx = Fixture::new();
        let mut state = DialogueState::default();
        show_dialogue(&mut state, &mut fx.ctx(), "branch", None).unwrap();
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        tick_dialogue(&mut state, &mut fx.ctx(), 9_999);
        assert!(state.is_active());
        tick_dialogue(&mut state, &mut fx.ctx(), 1);
        let done = state.take_completion().unwrap();
        assert!(done.choice_taken);
        assert_eq!(fx.karma.score(), 1);
    }

    #[test]
    fn missing_follow_up_ends_the_session() {
        let mut fx = Fixture::new();
        let mut state = DialogueState::default();
        show_dialogue(&mut state, &mut fx.ctx(), "broken", None).unwrap();
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        select_choice(&mut state, &mut fx.ctx(), 0).unwrap();
        assert!(!state.is_active());
        assert_eq!(state.take_completion().unwrap().action, None);
    }

    #[test]
    fn show_while_active_is_rejected() {
        let mut fx = Fixture::new();
        let mut state = DialogueState::default();
        show_dialogue(&mut state, &mut fx.ctx(), "plain", None).unwrap();
        assert!(matches!(
            show_dialogue(&mut state, &mut fx.ctx(), "branch", None),
            Err(ActionRejected::Busy)
        ));
        assert_eq!(state.session.as_ref().unwrap().origin_id, "plain");
    }

    #[test]
    fn log_holds_only_the_latest_conversation() {
        let mut fx = Fixture::new();
        let mut state = DialogueState::default();
        show_dialogue(&mut state, &mut fx.ctx(), "branch", None).unwrap();
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        select_choice(&mut state, &mut fx.ctx(), 1).unwrap();
        for _ in 0..4 {
            advance_dialogue(&mut state, &mut fx.ctx()).unwrap();
        }
        assert!(state.take_completion().is_some());
        assert_eq!(
            state.log,
            vec!["DARIO: Esposito!", "> Rabbia", "GENNARO: Ciao.", "..."]
        );

        show_dialogue(&mut state, &mut fx.ctx(), "plain", None).unwrap();
        assert_eq!(state.log, vec!["GENNARO: Ciao."]);
        state.dismiss();
        assert!(state.log.is_empty());
    }
}
