//! Per-player persistent dungeon state: gold ledger, scavenging, death ring

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::types::{ThingIndex, DEAD_CREATURES_MAX_COUNT};

/// Bounded memory of recent creature deaths, used for corpse reanimation.
///
/// Entries are deduplicated by (model, explevel); when full, the oldest
/// slot is overwritten via a rotating index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadCreaturesRing {
    entries: Vec<(u16, u8)>,
    next_overwrite: usize,
}

impl Default for DeadCreaturesRing {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_overwrite: 0,
        }
    }
}

impl DeadCreaturesRing {
    /// Record a death. Duplicate (model, explevel) pairs are not re-added.
    pub fn record(&mut self, model: u16, explevel: u8) {
        if self.entries.contains(&(model, explevel)) {
            return;
        }
        if self.entries.len() < DEAD_CREATURES_MAX_COUNT {
            self.entries.push((model, explevel));
        } else {
            self.entries[self.next_overwrite] = (model, explevel);
            self.next_overwrite = (self.next_overwrite + 1) % DEAD_CREATURES_MAX_COUNT;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, model: u16, explevel: u8) -> bool {
        self.entries.contains(&(model, explevel))
    }
}

/// Per-player persistent economic and creature-management state.
/// Never destroyed mid-game; reset at level load.
#[derive(Debug, Clone, Default)]
pub struct Dungeon {
    pub total_money_owned: i64,
    /// Reserve gold not stored in treasure rooms
    pub offmap_money_owned: i64,
    pub money_spent: i64,

    /// Live creature count per model
    pub owned_creatures: HashMap<u16, i32>,

    /// Scavenge turn-point accumulators per model
    pub scavenge_points: HashMap<u16, i64>,
    /// Creature currently being scavenged toward this player
    pub scavenge_target: ThingIndex,
    /// Total successful scavenge conversions
    pub scavenge_counters: i32,

    pub dead_creatures: DeadCreaturesRing,

    /// Player setting: prefer capturing downed enemies over killing them
    pub imprison_tendency: bool,

    pub battles_won: i32,
    pub battles_lost: i32,
    pub friendly_kills: i32,

    /// The player's dungeon heart thing
    pub heart_idx: ThingIndex,

    /// Creatures currently held in the hand
    pub hand: Vec<ThingIndex>,
}

impl Dungeon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_money(&self) -> i64 {
        self.total_money_owned + self.offmap_money_owned
    }

    pub fn credit_gold(&mut self, amount: i64) {
        self.total_money_owned += amount;
    }

    /// Spend gold, offmap reserve first. Fails without mutating when short.
    pub fn spend_gold(&mut self, amount: i64) -> bool {
        if self.total_money() < amount {
            return false;
        }
        let from_offmap = amount.min(self.offmap_money_owned);
        self.offmap_money_owned -= from_offmap;
        self.total_money_owned -= amount - from_offmap;
        self.money_spent += amount;
        true
    }

    pub fn creature_count(&self, model: u16) -> i32 {
        self.owned_creatures.get(&model).copied().unwrap_or(0)
    }

    pub fn note_creature_gained(&mut self, model: u16) {
        *self.owned_creatures.entry(model).or_insert(0) += 1;
    }

    pub fn note_creature_lost(&mut self, model: u16) {
        let count = self.owned_creatures.entry(model).or_insert(0);
        *count = (*count - 1).max(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_ring_dedup() {
        let mut ring = DeadCreaturesRing::default();
        ring.record(3, 2);
        ring.record(3, 2);
        assert_eq!(ring.len(), 1);
        ring.record(3, 3);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_dead_ring_rotating_overwrite() {
        let mut ring = DeadCreaturesRing::default();
        for i in 0..DEAD_CREATURES_MAX_COUNT {
            ring.record(i as u16, 0);
        }
        assert_eq!(ring.len(), DEAD_CREATURES_MAX_COUNT);
        // Full ring: new entries overwrite the oldest slots in order
        ring.record(1000, 0);
        assert_eq!(ring.len(), DEAD_CREATURES_MAX_COUNT);
        assert!(ring.contains(1000, 0));
        assert!(!ring.contains(0, 0));
        ring.record(1001, 0);
        assert!(!ring.contains(1, 0));
        assert!(ring.contains(2, 0));
    }

    #[test]
    fn test_spend_gold_prefers_offmap() {
        let mut d = Dungeon::new();
        d.offmap_money_owned = 100;
        d.total_money_owned = 50;
        assert!(d.spend_gold(120));
        assert_eq!(d.offmap_money_owned, 0);
        assert_eq!(d.total_money_owned, 30);
        assert_eq!(d.money_spent, 120);
    }

    #[test]
    fn test_spend_gold_insufficient_no_mutation() {
        let mut d = Dungeon::new();
        d.total_money_owned = 40;
        assert!(!d.spend_gold(50));
        assert_eq!(d.total_money_owned, 40);
        assert_eq!(d.money_spent, 0);
    }

    #[test]
    fn test_creature_count_never_negative() {
        let mut d = Dungeon::new();
        d.note_creature_lost(7);
        assert_eq!(d.creature_count(7), 0);
        d.note_creature_gained(7);
        d.note_creature_gained(7);
        d.note_creature_lost(7);
        assert_eq!(d.creature_count(7), 1);
    }
}
