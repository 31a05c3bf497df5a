//! Core type definitions used throughout the simulation

use serde::{Deserialize, Serialize};

/// Game turn counter (simulation time unit)
pub type GameTurn = u64;

/// Player slot index. Slots 0..=3 are keepers, slot 4 is the neutral player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

impl PlayerId {
    pub fn idx(&self) -> usize {
        self.0 as usize
    }

    pub fn is_neutral(&self) -> bool {
        self.0 as usize == NEUTRAL_PLAYER
    }
}

/// Number of player slots including the neutral slot
pub const PLAYERS_COUNT: usize = 5;
/// The neutral (unowned) player slot
pub const NEUTRAL_PLAYER: usize = 4;

/// Index into the thing store. Index 0 is reserved invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ThingIndex(pub u16);

impl ThingIndex {
    pub const INVALID: ThingIndex = ThingIndex(0);

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }

    pub fn idx(&self) -> usize {
        self.0 as usize
    }
}

/// Index into the global computer task pool. Index 0 is reserved invalid
/// and doubles as the list terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TaskIndex(pub u16);

impl TaskIndex {
    pub const INVALID: TaskIndex = TaskIndex(0);

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }

    pub fn idx(&self) -> usize {
        self.0 as usize
    }
}

/// Index into the room registry. 0 is reserved invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RoomIndex(pub u16);

impl RoomIndex {
    pub const INVALID: RoomIndex = RoomIndex(0);

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }

    pub fn idx(&self) -> usize {
        self.0 as usize
    }
}

/// Fine map grid position (subtile units, 3 subtiles per slab side)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SubtilePos {
    pub x: i32,
    pub y: i32,
}

impl SubtilePos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Coarse slab containing this subtile. Euclidean division keeps the
    /// mapping total for negative coordinates.
    pub fn slab(&self) -> SlabPos {
        SlabPos::new(self.x.div_euclid(3), self.y.div_euclid(3))
    }

    /// Chebyshev distance in subtiles, the metric used by the planners
    pub fn chess_distance(&self, other: &Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// Coarse map grid position (slab units)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SlabPos {
    pub x: i32,
    pub y: i32,
}

impl SlabPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Center subtile of this slab
    pub fn center_subtile(&self) -> SubtilePos {
        SubtilePos::new(self.x * 3 + 1, self.y * 3 + 1)
    }

    pub fn chess_distance(&self, other: &Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// Capacity of the thing store; also the hard cap on chained-list sweeps
pub const THINGS_COUNT: usize = 2048;

/// Concurrent spell-effect slots per creature
pub const CREATURE_MAX_SPELLS_AFFECTED: usize = 5;

/// Spell levels are clamped to this on application
pub const SPELL_MAX_LEVEL: u8 = 8;

/// Capacity of a dungeon's recently-dead-creatures ring
pub const DEAD_CREATURES_MAX_COUNT: usize = 64;

/// Capacity of the global computer task pool (slot 0 unused)
pub const COMPUTER_TASKS_COUNT: usize = 100;

/// Cap on remembered trap spots per computer player
pub const COMPUTER_TRAP_LOC_COUNT: usize = 20;

/// Hard cap on planner invocations for a single dig attempt
pub const DIG_CALLS_MAX: u32 = 356;

/// Self plus the 8 neighbor offsets, scan order used by the around-searches
pub const AROUND_TILES: [(i32, i32); 9] = [
    (0, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Cardinal step offsets indexed by direction bucket: 0=N, 1=E, 2=S, 3=W
pub const SMALL_AROUND: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];
