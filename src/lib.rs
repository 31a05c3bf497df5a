//! Underkeep - Dungeon God-Game Simulation Core

pub mod actions;
pub mod computer;
pub mod core;
pub mod creature;
pub mod events;
pub mod game;
pub mod map;
pub mod player;
pub mod things;
