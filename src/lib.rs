//! Narrative and encounter core for a short dialogue-driven game: scripted
//! dialogue, turn-based battles against temptation, timed minigames and a
//! karma score that picks the ending.

pub mod components;
pub mod core;
pub mod data;
pub mod persistence;
pub mod simulation;
pub mod systems;

// Expose the main Game wrapper and types needed for interaction
pub use crate::core::serialization::SaveRecord;
pub use crate::core::world::{ActionIntent, Game, GameEvent, Snapshot};
