//! Slab grid query and mutation surface
//!
//! The simulation core consumes the map through these queries; terrain
//! generation and rendering live elsewhere. The grid is slab-granular:
//! each slab covers 3x3 subtiles.

use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, SlabPos, NEUTRAL_PLAYER, PLAYERS_COUNT};

/// Terrain classification of one slab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlabKind {
    /// Impenetrable rock, never diggable
    Rock,
    /// Diggable dirt
    Earth,
    /// Diggable gold vein
    Gold,
    /// Diggable, inexhaustible gem vein
    Gems,
    /// Open unclaimed floor
    Path,
    /// Floor claimed by a player
    Claimed,
    /// Reinforced wall owned by a player
    Wall,
    Water,
    Lava,
    /// Floor belonging to a room
    RoomFloor,
    /// A door sits on this slab
    Door,
}

impl SlabKind {
    /// Can a creature walk over this slab (ignoring liquid flight rules)
    pub fn is_passable(&self) -> bool {
        matches!(
            self,
            SlabKind::Path | SlabKind::Claimed | SlabKind::RoomFloor | SlabKind::Door
        )
    }

    pub fn is_diggable(&self) -> bool {
        matches!(self, SlabKind::Earth | SlabKind::Gold | SlabKind::Gems)
    }

    pub fn is_liquid(&self) -> bool {
        matches!(self, SlabKind::Water | SlabKind::Lava)
    }

    pub fn is_gold_vein(&self) -> bool {
        matches!(self, SlabKind::Gold | SlabKind::Gems)
    }
}

/// One slab cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slab {
    pub kind: SlabKind,
    pub owner: PlayerId,
    /// Per-player dig tags placed by hand or by computer players
    pub dig_tagged: [bool; PLAYERS_COUNT],
    /// Set when a computer player suspects a trap here (halves attack scores)
    pub trap_suspected: bool,
}

impl Slab {
    fn new(kind: SlabKind) -> Self {
        Self {
            kind,
            owner: PlayerId(NEUTRAL_PLAYER as u8),
            dig_tagged: [false; PLAYERS_COUNT],
            trap_suspected: false,
        }
    }
}

/// The slab grid
#[derive(Debug, Clone)]
pub struct MapGrid {
    width: i32,
    height: i32,
    slabs: Vec<Slab>,
}

impl MapGrid {
    /// Create a grid filled with `fill`
    pub fn new(width: i32, height: i32, fill: SlabKind) -> Self {
        assert!(width > 0 && height > 0);
        Self {
            width,
            height,
            slabs: vec![Slab::new(fill); (width * height) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: SlabPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: SlabPos) -> usize {
        (pos.y * self.width + pos.x) as usize
    }

    pub fn slab(&self, pos: SlabPos) -> Option<&Slab> {
        if self.in_bounds(pos) {
            Some(&self.slabs[self.index(pos)])
        } else {
            None
        }
    }

    pub fn slab_mut(&mut self, pos: SlabPos) -> Option<&mut Slab> {
        if self.in_bounds(pos) {
            let i = self.index(pos);
            Some(&mut self.slabs[i])
        } else {
            None
        }
    }

    /// Terrain kind at `pos`; out-of-bounds reads as solid rock
    pub fn slab_kind_at(&self, pos: SlabPos) -> SlabKind {
        self.slab(pos).map(|s| s.kind).unwrap_or(SlabKind::Rock)
    }

    pub fn owner_at(&self, pos: SlabPos) -> PlayerId {
        self.slab(pos)
            .map(|s| s.owner)
            .unwrap_or(PlayerId(NEUTRAL_PLAYER as u8))
    }

    pub fn set_slab(&mut self, pos: SlabPos, kind: SlabKind, owner: PlayerId) {
        if let Some(slab) = self.slab_mut(pos) {
            slab.kind = kind;
            slab.owner = owner;
        }
    }

    /// Tag a slab for digging by `player`'s workers. Fails on undiggable terrain.
    pub fn tag_for_digging(&mut self, player: PlayerId, pos: SlabPos) -> bool {
        match self.slab_mut(pos) {
            Some(slab) if slab.kind.is_diggable() => {
                slab.dig_tagged[player.idx()] = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_tagged_for_digging(&self, player: PlayerId, pos: SlabPos) -> bool {
        self.slab(pos)
            .map(|s| s.dig_tagged[player.idx()])
            .unwrap_or(false)
    }

    /// Resolve a dig tag: the slab becomes open path and all tags clear
    pub fn dig_out(&mut self, pos: SlabPos) {
        if let Some(slab) = self.slab_mut(pos) {
            slab.kind = SlabKind::Path;
            slab.owner = PlayerId(NEUTRAL_PLAYER as u8);
            slab.dig_tagged = [false; PLAYERS_COUNT];
        }
    }

    /// Outward square-ring search from `center`, nearest ring first.
    ///
    /// Visits each ring clockwise from its top-left corner and returns the
    /// first slab satisfying `pred`. Bounded by `max_radius` rings.
    pub fn spiral_search<F>(&self, center: SlabPos, max_radius: i32, mut pred: F) -> Option<SlabPos>
    where
        F: FnMut(&Self, SlabPos) -> bool,
    {
        if self.in_bounds(center) && pred(self, center) {
            return Some(center);
        }
        for radius in 1..=max_radius {
            let mut pos = SlabPos::new(center.x - radius, center.y - radius);
            let side = radius * 2;
            for (dx, dy) in [(1, 0), (0, 1), (-1, 0), (0, -1)] {
                for _ in 0..side {
                    if self.in_bounds(pos) && pred(self, pos) {
                        return Some(pos);
                    }
                    pos.x += dx;
                    pos.y += dy;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> MapGrid {
        MapGrid::new(10, 10, SlabKind::Earth)
    }

    #[test]
    fn test_out_of_bounds_reads_rock() {
        let g = grid();
        assert_eq!(g.slab_kind_at(SlabPos::new(-1, 0)), SlabKind::Rock);
        assert_eq!(g.slab_kind_at(SlabPos::new(0, 10)), SlabKind::Rock);
    }

    #[test]
    fn test_tag_only_diggable() {
        let mut g = grid();
        let p = PlayerId(0);
        assert!(g.tag_for_digging(p, SlabPos::new(1, 1)));
        g.set_slab(SlabPos::new(2, 2), SlabKind::Rock, p);
        assert!(!g.tag_for_digging(p, SlabPos::new(2, 2)));
        assert!(g.is_tagged_for_digging(p, SlabPos::new(1, 1)));
        assert!(!g.is_tagged_for_digging(PlayerId(1), SlabPos::new(1, 1)));
    }

    #[test]
    fn test_dig_out_clears_tags() {
        let mut g = grid();
        let pos = SlabPos::new(3, 3);
        g.tag_for_digging(PlayerId(0), pos);
        g.dig_out(pos);
        assert_eq!(g.slab_kind_at(pos), SlabKind::Path);
        assert!(!g.is_tagged_for_digging(PlayerId(0), pos));
    }

    #[test]
    fn test_spiral_search_finds_nearest_ring() {
        let mut g = grid();
        g.set_slab(SlabPos::new(5, 7), SlabKind::Gold, PlayerId(0));
        g.set_slab(SlabPos::new(9, 9), SlabKind::Gold, PlayerId(0));
        let found = g
            .spiral_search(SlabPos::new(5, 5), 9, |g, p| g.slab_kind_at(p) == SlabKind::Gold)
            .unwrap();
        assert_eq!(found, SlabPos::new(5, 7));
    }

    #[test]
    fn test_spiral_search_center_hit() {
        let g = grid();
        let found = g.spiral_search(SlabPos::new(4, 4), 3, |_, _| true);
        assert_eq!(found, Some(SlabPos::new(4, 4)));
    }
}
