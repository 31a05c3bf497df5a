//! Room registry and work-site queries

use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, RoomIndex, SlabPos};
use crate::map::grid::{MapGrid, SlabKind};

/// Room kinds relevant to the simulation core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomKind {
    Entrance,
    Treasure,
    Lair,
    Hatchery,
    Training,
    Library,
    Workshop,
    Prison,
    Scavenger,
    Bridge,
}

/// One placed room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub index: RoomIndex,
    pub kind: RoomKind,
    pub owner: PlayerId,
    pub slabs: Vec<SlabPos>,
    /// Occupied capacity (prisoners for prisons, gold hoard slots for treasure)
    pub used_capacity: i32,
}

impl Room {
    /// Slab capacity scaled by kind; prisons hold one prisoner per slab
    pub fn total_capacity(&self) -> i32 {
        self.slabs.len() as i32
    }

    pub fn center_slab(&self) -> Option<SlabPos> {
        self.slabs.get(self.slabs.len() / 2).copied()
    }
}

/// Registry of all rooms in the level. Slot 0 is reserved invalid.
#[derive(Debug, Clone, Default)]
pub struct RoomRegistry {
    rooms: Vec<Option<Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: vec![None],
        }
    }

    /// Place a room and mark its slabs as room floor
    pub fn add_room(
        &mut self,
        grid: &mut MapGrid,
        kind: RoomKind,
        owner: PlayerId,
        slabs: Vec<SlabPos>,
    ) -> RoomIndex {
        let index = RoomIndex(self.rooms.len() as u16);
        for &pos in &slabs {
            grid.set_slab(pos, SlabKind::RoomFloor, owner);
        }
        self.rooms.push(Some(Room {
            index,
            kind,
            owner,
            slabs,
            used_capacity: 0,
        }));
        index
    }

    pub fn get(&self, index: RoomIndex) -> Option<&Room> {
        self.rooms.get(index.idx()).and_then(|r| r.as_ref())
    }

    pub fn get_mut(&mut self, index: RoomIndex) -> Option<&mut Room> {
        self.rooms.get_mut(index.idx()).and_then(|r| r.as_mut())
    }

    pub fn remove(&mut self, index: RoomIndex) {
        if index.is_valid() {
            if let Some(slot) = self.rooms.get_mut(index.idx()) {
                *slot = None;
            }
        }
    }

    /// Room occupying the given slab, if any
    pub fn room_at(&self, pos: SlabPos) -> Option<&Room> {
        self.rooms
            .iter()
            .flatten()
            .find(|r| r.slabs.contains(&pos))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.iter().flatten()
    }

    /// First room of `kind` owned by `owner`
    pub fn find_room_of_kind(&self, owner: PlayerId, kind: RoomKind) -> Option<&Room> {
        self.iter().find(|r| r.owner == owner && r.kind == kind)
    }

    /// Count of room slabs of `kind` owned by `owner`
    pub fn slab_count(&self, owner: PlayerId, kind: RoomKind) -> i32 {
        self.iter()
            .filter(|r| r.owner == owner && r.kind == kind)
            .map(|r| r.slabs.len() as i32)
            .sum()
    }

    /// A room is still usable as a work site if it exists, keeps its owner,
    /// and has at least one slab left.
    pub fn room_still_valid_as_worksite(&self, index: RoomIndex, owner: PlayerId) -> bool {
        match self.get(index) {
            Some(room) => room.owner == owner && !room.slabs.is_empty(),
            None => false,
        }
    }

    /// Free prisoner capacity across all prisons owned by `owner`
    pub fn free_prison_capacity(&self, owner: PlayerId) -> i32 {
        self.iter()
            .filter(|r| r.owner == owner && r.kind == RoomKind::Prison)
            .map(|r| (r.total_capacity() - r.used_capacity).max(0))
            .sum()
    }
}
