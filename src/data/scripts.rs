use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::ContentError;
use crate::simulation::minigame::MinigameKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptFile {
    pub schema_version: u32,
    pub scripts: Vec<Script>,
}

/// A named run of dialogue lines, optionally ending in a branch point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub id: String,
    #[serde(default)]
    pub lines: Vec<Line>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Action surfaced when the script ends without a branch point.
    #[serde(default)]
    pub on_complete: Option<ChoiceAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    #[serde(default)]
    pub speaker: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    #[serde(default)]
    pub karma: Option<i32>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub action: Option<ChoiceAction>,
    #[serde(default)]
    pub condition: Option<ChoiceCondition>,
    #[serde(default)]
    pub npc: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceCondition {
    KarmaAbove(i32),
    KarmaBelow(i32),
    HasItem(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    Calm,
    Rage,
    #[default]
    Neutral,
}

/// What the caller should do once a dialogue session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChoiceAction {
    /// Turn-based fight against a catalog enemy.
    Battle {
        enemy: String,
        #[serde(default)]
        approach: Approach,
    },
    /// A confrontation settled by a minigame picked from the approach.
    Challenge {
        enemy: String,
        #[serde(default)]
        approach: Approach,
    },
    Minigame {
        kind: MinigameKind,
        #[serde(default)]
        difficulty: Option<f32>,
    },
    Objective {
        trigger: String,
    },
    Ending,
}

impl Script {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            lines: Vec::new(),
            choices: Vec::new(),
            on_complete: None,
        }
    }

    pub fn with_line(mut self, speaker: Option<&str>, text: impl Into<String>) -> Self {
        self.lines.push(Line {
            speaker: speaker.map(str::to_string),
            text: text.into(),
        });
        self
    }

    pub fn with_choice(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }

    pub fn with_on_complete(mut self, action: ChoiceAction) -> Self {
        self.on_complete = Some(action);
        self
    }
}

impl Choice {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            karma: None,
            next: None,
            action: None,
            condition: None,
            npc: None,
            tags: Vec::new(),
        }
    }

    pub fn with_karma(mut self, delta: i32) -> Self {
        self.karma = Some(delta);
        self
    }

    pub fn with_next(mut self, script_id: impl Into<String>) -> Self {
        self.next = Some(script_id.into());
        self
    }

    pub fn with_action(mut self, action: ChoiceAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_condition(mut self, condition: ChoiceCondition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// Read-only lookup of scripts by id.
#[derive(Debug, Clone, Default)]
pub struct ScriptCatalog {
    scripts: HashMap<String, Script>,
}

impl ScriptCatalog {
    pub fn from_scripts(scripts: impl IntoIterator<Item = Script>) -> Result<Self, ContentError> {
        let file = ScriptFile {
            schema_version: 1,
            scripts: scripts.into_iter().collect(),
        };
        file.validate()?;
        Ok(Self::index(file))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContentError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: ScriptFile = serde_json::from_str(&raw).map_err(|source| ContentError::Json {
            path: path.display().to_string(),
            source,
        })?;
        file.validate()?;
        for warning in file.dangling_references() {
            tracing::warn!("{}: {}", path.display(), warning);
        }
        Ok(Self::index(file))
    }

    fn index(file: ScriptFile) -> Self {
        Self {
            scripts: file
                .scripts
                .into_iter()
                .map(|script| (script.id.clone(), script))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Script> {
        self.scripts.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.scripts.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.scripts.keys().map(String::as_str)
    }
}

impl ScriptFile {
    pub fn validate(&self) -> Result<(), ContentError> {
        let mut ids = HashSet::new();
        for script in &self.scripts {
            if script.id.trim().is_empty() {
                return Err(ContentError::Validation(
                    "script id cannot be empty".to_string(),
                ));
            }
            if !ids.insert(script.id.as_str()) {
                return Err(ContentError::Validation(format!(
                    "duplicate script id {}",
                    script.id
                )));
            }
            if script.lines.is_empty() && script.choices.is_empty() {
                return Err(ContentError::Validation(format!(
                    "script {} has neither lines nor choices",
                    script.id
                )));
            }
            if let Some(choice) = script.choices.iter().find(|c| c.text.trim().is_empty()) {
                return Err(ContentError::Validation(format!(
                    "script {} has a choice without text (next: {:?})",
                    script.id, choice.next
                )));
            }
        }
        Ok(())
    }

    /// Follow-up references that point nowhere. These only degrade to an early
    /// session end at runtime, so they are reported rather than rejected.
    pub fn dangling_references(&self) -> Vec<String> {
        let ids: HashSet<&str> = self.scripts.iter().map(|s| s.id.as_str()).collect();
        self.scripts
            .iter()
            .flat_map(|script| {
                script.choices.iter().filter_map(|choice| {
                    let next = choice.next.as_deref()?;
                    (!ids.contains(next))
                        .then(|| format!("script {} references unknown script {}", script.id, next))
                })
            })
            .collect()
    }
}
