//! World event log
//!
//! Append-only within a turn, truncated at turn start. Reactive computer
//! events scan it for entries matching their kind and owner.

use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, SubtilePos, ThingIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldEventKind {
    Battle,
    EnemyDoor,
    Payday,
    CreatureDied,
    RoomLost,
    GoldDug,
    HeartAttacked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldEvent {
    pub kind: WorldEventKind,
    /// Player the event concerns (whose territory, whose payday)
    pub owner: PlayerId,
    pub pos: SubtilePos,
    pub target: ThingIndex,
}

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Vec<WorldEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: WorldEvent) {
        self.entries.push(event);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorldEvent> {
        self.entries.iter()
    }

    /// Events of `kind` concerning `owner`, in append order
    pub fn matching(&self, kind: WorldEventKind, owner: PlayerId) -> Vec<WorldEvent> {
        self.entries
            .iter()
            .filter(|e| e.kind == kind && e.owner == owner)
            .cloned()
            .collect()
    }
}
