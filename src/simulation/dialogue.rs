use bevy_ecs::prelude::*;

use crate::data::scripts::ChoiceAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialoguePhase {
    /// The current line is still being typed out.
    Revealing,
    /// The line is fully shown and waits for confirmation.
    Waiting,
    /// The visible choices are on screen.
    Choosing,
}

/// Transient state of one shown script chain. Never persisted.
#[derive(Debug, Clone)]
pub struct DialogueSession {
    /// The script id `show` was called with; completion reports this one.
    pub origin_id: String,
    pub npc: Option<String>,
    pub script_id: String,
    pub line_index: usize,
    pub phase: DialoguePhase,
    pub revealed_chars: usize,
    pub reveal_elapsed_ms: f32,
    /// Indices into the script's choice list that passed their condition.
    pub visible_choices: Vec<usize>,
    pub choice_elapsed_ms: u32,
}

impl DialogueSession {
    pub fn new(origin_id: &str, npc: Option<String>) -> Self {
        Self {
            origin_id: origin_id.to_string(),
            npc,
            script_id: origin_id.to_string(),
            line_index: 0,
            phase: DialoguePhase::Revealing,
            revealed_chars: 0,
            reveal_elapsed_ms: 0.0,
            visible_choices: Vec::new(),
            choice_elapsed_ms: 0,
        }
    }

    pub fn restart_line(&mut self) {
        self.phase = DialoguePhase::Revealing;
        self.revealed_chars = 0;
        self.reveal_elapsed_ms = 0.0;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogueCompletion {
    pub script_id: String,
    pub npc: Option<String>,
    pub action: Option<ChoiceAction>,
    pub choice_taken: bool,
}

/// What a presentation layer needs to draw the dialogue box.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueView {
    pub speaker: Option<String>,
    pub text: String,
    pub complete_line: bool,
    pub choices: Vec<String>,
    pub countdown_ms: Option<u32>,
}

#[derive(Resource, Debug, Clone)]
pub struct DialogueState {
    pub session: Option<DialogueSession>,
    /// Filled once per `show`; the orchestration layer takes it.
    pub completion: Option<DialogueCompletion>,
    /// Lines and picks of the latest conversation; restarted by each `show`.
    pub log: Vec<String>,
    pub text_speed: f32,
}

impl Default for DialogueState {
    fn default() -> Self {
        Self {
            session: None,
            completion: None,
            log: Vec::new(),
            text_speed: 1.0,
        }
    }
}

impl DialogueState {
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn take_completion(&mut self) -> Option<DialogueCompletion> {
        self.completion.take()
    }

    /// Discard the session without a completion, as when a scene is torn down.
    pub fn dismiss(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::debug!(script = %session.script_id, "dialogue dismissed");
        }
        self.log.clear();
    }
}
