//! The thing store: fixed-capacity arena with per-class linked sublists
//!
//! Everything that exists in the world (creatures, loose gold, shots,
//! traps, doors, corpses) is a Thing addressed by index. Index 0 is
//! reserved invalid so a zeroed index never aliases a live entity.
//! Sublist traversal is capped at the pool size; exceeding the cap means a
//! corrupted chain and is logged, never looped on.

use crate::core::types::{PlayerId, SubtilePos, ThingIndex, THINGS_COUNT};
use crate::creature::control::CreatureControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThingClass {
    Creature,
    Object,
    Shot,
    Trap,
    Door,
    DeadCreature,
}

const CLASS_COUNT: usize = 6;

fn class_slot(class: ThingClass) -> usize {
    match class {
        ThingClass::Creature => 0,
        ThingClass::Object => 1,
        ThingClass::Shot => 2,
        ThingClass::Trap => 3,
        ThingClass::Door => 4,
        ThingClass::DeadCreature => 5,
    }
}

/// Class-specific payload
#[derive(Debug, Clone)]
pub enum ThingData {
    None,
    Creature(Box<CreatureControl>),
    /// A loose pile of gold on the floor
    GoldPile { amount: i32 },
    /// A satellite object bound to a spell effect on its parent creature
    SpellSummon,
    Shot {
        kind: crate::core::config::ShotKind,
        damage: i32,
        /// Homing target; flight falls back to `target_pos` when it dies
        target: ThingIndex,
        target_pos: SubtilePos,
        hit_friendly: bool,
        remaining_range: i32,
    },
    TrapOrDoor { armed: bool },
}

#[derive(Debug, Clone)]
pub struct Thing {
    pub index: ThingIndex,
    pub class: ThingClass,
    pub model: u16,
    pub owner: PlayerId,
    pub pos: SubtilePos,
    pub health: i32,
    /// Facing angle in radians
    pub facing: f32,
    /// Back-reference: firer for shots, caster for spell summons
    pub parent: ThingIndex,
    pub data: ThingData,
    next_of_class: ThingIndex,
    prev_of_class: ThingIndex,
}

impl Thing {
    pub fn new(class: ThingClass, model: u16, owner: PlayerId, pos: SubtilePos) -> Self {
        Self {
            index: ThingIndex::INVALID,
            class,
            model,
            owner,
            pos,
            health: 1,
            facing: 0.0,
            parent: ThingIndex::INVALID,
            data: ThingData::None,
            next_of_class: ThingIndex::INVALID,
            prev_of_class: ThingIndex::INVALID,
        }
    }

    pub fn control(&self) -> Option<&CreatureControl> {
        match &self.data {
            ThingData::Creature(ctrl) => Some(ctrl),
            _ => None,
        }
    }

    pub fn control_mut(&mut self) -> Option<&mut CreatureControl> {
        match &mut self.data {
            ThingData::Creature(ctrl) => Some(ctrl),
            _ => None,
        }
    }
}

/// Fixed-capacity arena of things with a free list
#[derive(Debug)]
pub struct ThingStore {
    slots: Vec<Option<Thing>>,
    free: Vec<u16>,
    class_heads: [ThingIndex; CLASS_COUNT],
    live_count: usize,
}

impl Default for ThingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ThingStore {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(THINGS_COUNT);
        slots.resize_with(THINGS_COUNT, || None);
        // Slot 0 reserved; hand out low indices first
        let free = (1..THINGS_COUNT as u16).rev().collect();
        Self {
            slots,
            free,
            class_heads: [ThingIndex::INVALID; CLASS_COUNT],
            live_count: 0,
        }
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Allocate a thing, linking it into its class sublist.
    /// Returns None and warns when the pool is exhausted.
    pub fn create(&mut self, mut thing: Thing) -> Option<ThingIndex> {
        let Some(raw) = self.free.pop() else {
            tracing::warn!("thing pool exhausted, cannot create {:?}", thing.class);
            return None;
        };
        let index = ThingIndex(raw);
        thing.index = index;
        let slot = class_slot(thing.class);
        let old_head = self.class_heads[slot];
        thing.next_of_class = old_head;
        thing.prev_of_class = ThingIndex::INVALID;
        if old_head.is_valid() {
            if let Some(head) = self.slots[old_head.idx()].as_mut() {
                head.prev_of_class = index;
            }
        }
        self.class_heads[slot] = index;
        self.slots[index.idx()] = Some(thing);
        self.live_count += 1;
        Some(index)
    }

    pub fn get(&self, index: ThingIndex) -> Option<&Thing> {
        if !index.is_valid() {
            return None;
        }
        self.slots.get(index.idx()).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, index: ThingIndex) -> Option<&mut Thing> {
        if !index.is_valid() {
            return None;
        }
        self.slots.get_mut(index.idx()).and_then(|s| s.as_mut())
    }

    pub fn exists(&self, index: ThingIndex) -> bool {
        self.get(index).is_some()
    }

    /// Remove a thing, unlinking it from its class sublist.
    pub fn delete(&mut self, index: ThingIndex) {
        let Some(thing) = self.slots.get_mut(index.idx()).and_then(|s| s.take()) else {
            return;
        };
        let slot = class_slot(thing.class);
        if thing.prev_of_class.is_valid() {
            if let Some(prev) = self.slots[thing.prev_of_class.idx()].as_mut() {
                prev.next_of_class = thing.next_of_class;
            }
        } else {
            self.class_heads[slot] = thing.next_of_class;
        }
        if thing.next_of_class.is_valid() {
            if let Some(next) = self.slots[thing.next_of_class.idx()].as_mut() {
                next.prev_of_class = thing.prev_of_class;
            }
        }
        self.free.push(index.0);
        self.live_count -= 1;
    }

    /// Indices of all live things of `class`, in stable list order.
    ///
    /// Collected up front so callers may mutate the store while iterating.
    /// The sweep is capped at the pool size against corrupted chains.
    pub fn class_list(&self, class: ThingClass) -> Vec<ThingIndex> {
        let mut out = Vec::new();
        let mut cur = self.class_heads[class_slot(class)];
        let mut guard = 0usize;
        while cur.is_valid() {
            guard += 1;
            if guard > THINGS_COUNT {
                tracing::error!("infinite loop detected sweeping {:?} list", class);
                break;
            }
            out.push(cur);
            cur = match self.get(cur) {
                Some(t) => t.next_of_class,
                None => {
                    tracing::error!("dangling link in {:?} list at {:?}", class, cur);
                    break;
                }
            };
        }
        out
    }

    /// First thing of `class` at the given subtile matching `pred`
    pub fn find_at<F>(&self, class: ThingClass, pos: SubtilePos, mut pred: F) -> Option<ThingIndex>
    where
        F: FnMut(&Thing) -> bool,
    {
        let mut cur = self.class_heads[class_slot(class)];
        let mut guard = 0usize;
        while cur.is_valid() {
            guard += 1;
            if guard > THINGS_COUNT {
                tracing::error!("infinite loop detected searching {:?} list", class);
                break;
            }
            if let Some(thing) = self.get(cur) {
                if thing.pos == pos && pred(thing) {
                    return Some(cur);
                }
                cur = thing.next_of_class;
            } else {
                break;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gold(pos: SubtilePos, amount: i32) -> Thing {
        let mut t = Thing::new(ThingClass::Object, 0, PlayerId(4), pos);
        t.data = ThingData::GoldPile { amount };
        t
    }

    #[test]
    fn test_create_get_delete() {
        let mut store = ThingStore::new();
        let idx = store.create(gold(SubtilePos::new(4, 4), 100)).unwrap();
        assert!(idx.is_valid());
        assert!(store.exists(idx));
        store.delete(idx);
        assert!(!store.exists(idx));
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_zero_index_never_allocated() {
        let mut store = ThingStore::new();
        for _ in 0..20 {
            let idx = store.create(gold(SubtilePos::new(0, 0), 1)).unwrap();
            assert_ne!(idx, ThingIndex::INVALID);
        }
        assert!(store.get(ThingIndex::INVALID).is_none());
    }

    #[test]
    fn test_class_list_order_stable_after_removal() {
        let mut store = ThingStore::new();
        let a = store.create(gold(SubtilePos::new(1, 1), 1)).unwrap();
        let b = store.create(gold(SubtilePos::new(2, 2), 2)).unwrap();
        let c = store.create(gold(SubtilePos::new(3, 3), 3)).unwrap();
        assert_eq!(store.class_list(ThingClass::Object), vec![c, b, a]);
        store.delete(b);
        assert_eq!(store.class_list(ThingClass::Object), vec![c, a]);
    }

    #[test]
    fn test_find_at_position() {
        let mut store = ThingStore::new();
        store.create(gold(SubtilePos::new(1, 1), 10)).unwrap();
        let here = store.create(gold(SubtilePos::new(5, 5), 20)).unwrap();
        let found = store.find_at(ThingClass::Object, SubtilePos::new(5, 5), |_| true);
        assert_eq!(found, Some(here));
        assert!(store
            .find_at(ThingClass::Object, SubtilePos::new(9, 9), |_| true)
            .is_none());
    }

    #[test]
    fn test_pool_exhaustion_returns_none() {
        let mut store = ThingStore::new();
        let mut last = None;
        for _ in 1..THINGS_COUNT {
            last = store.create(gold(SubtilePos::new(0, 0), 1));
            assert!(last.is_some());
        }
        assert!(store.create(gold(SubtilePos::new(0, 0), 1)).is_none());
        store.delete(last.unwrap());
        assert!(store.create(gold(SubtilePos::new(0, 0), 1)).is_some());
    }
}
