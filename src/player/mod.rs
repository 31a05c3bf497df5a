//! Per-player persistent state

pub mod dungeon;

pub use dungeon::{DeadCreaturesRing, Dungeon};
