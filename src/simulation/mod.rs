pub mod battle;
pub mod dialogue;
pub mod inventory;
pub mod karma;
pub mod minigame;
pub mod objectives;
pub mod time;
