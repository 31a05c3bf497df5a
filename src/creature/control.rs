//! Per-creature behavior and combat state beyond the basic thing fields

use serde::{Deserialize, Serialize};

use crate::core::config::SpellKind;
use crate::core::types::{
    PlayerId, SubtilePos, ThingIndex, CREATURE_MAX_SPELLS_AFFECTED, NEUTRAL_PLAYER,
};
use crate::creature::states::CreatureState;

/// One active spell-effect slot. `SpellKind::None` marks an empty slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpellSlot {
    pub spell: SpellKind,
    /// Remaining duration in turns
    pub duration: i32,
    /// Effect magnitude; the eviction policy removes the smallest
    pub power: u8,
    /// Player credited with kills this effect causes (Disease)
    pub caster: PlayerId,
    /// Satellite objects bound to this effect, released on termination
    pub summons: [ThingIndex; 3],
}

impl SpellSlot {
    pub const EMPTY: SpellSlot = SpellSlot {
        spell: SpellKind::None,
        duration: 0,
        power: 0,
        caster: PlayerId(NEUTRAL_PLAYER as u8),
        summons: [ThingIndex::INVALID; 3],
    };

    pub fn is_empty(&self) -> bool {
        self.spell == SpellKind::None
    }
}

/// What kind of opponent a creature is currently engaging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatKind {
    Creature,
    /// Attacking an object such as a dungeon heart
    Object,
    Door,
}

/// The creature control block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatureControl {
    pub active_state: CreatureState,
    /// Resume target after a sub-state finishes
    pub continue_state: CreatureState,
    pub explevel: u8,
    pub max_health: i32,

    pub spell_slots: [SpellSlot; CREATURE_MAX_SPELLS_AFFECTED],
    /// Movement speed percentage; Speed and Slow effects adjust it
    pub speed: i32,

    pub combat_target: ThingIndex,
    pub combat_kind: Option<CombatKind>,
    /// Group leader link; INVALID when not grouped
    pub group_leader: ThingIndex,

    pub gold_carried: i32,
    /// Annoyance relief accumulator bumped by wages and scavenged gold
    pub wage_received: i32,
    pub anger: i32,
    pub hunger: i32,

    /// Turns until the next ability instance may fire
    pub instance_cooldown: u32,
    /// Turn on which door combat was suppressed for this creature
    pub door_suppressed_turn: crate::core::types::GameTurn,

    pub move_target: Option<SubtilePos>,
    /// Room the creature is working in, when any
    pub work_room: crate::core::types::RoomIndex,

    /// Held in the owner's hand; skipped by the per-turn dispatcher
    pub picked_up: bool,
    pub unconscious: bool,
    /// Recovery countdown while unconscious
    pub unconscious_time: i32,
    /// Marks an unconscious body waiting to be carried to prison
    pub pending_pickup: bool,

    pub paydays_owed: u8,
}

impl CreatureControl {
    pub fn new(max_health: i32) -> Self {
        Self {
            active_state: CreatureState::Unused,
            continue_state: CreatureState::Unused,
            explevel: 0,
            max_health,
            spell_slots: [SpellSlot::EMPTY; CREATURE_MAX_SPELLS_AFFECTED],
            speed: 100,
            combat_target: ThingIndex::INVALID,
            combat_kind: None,
            group_leader: ThingIndex::INVALID,
            gold_carried: 0,
            wage_received: 0,
            anger: 0,
            hunger: 0,
            instance_cooldown: 0,
            door_suppressed_turn: 0,
            move_target: None,
            work_room: crate::core::types::RoomIndex::INVALID,
            picked_up: false,
            unconscious: false,
            unconscious_time: 0,
            pending_pickup: false,
            paydays_owed: 0,
        }
    }

    /// Slot currently holding `spell`, if any
    pub fn spell_slot_of(&self, spell: SpellKind) -> Option<usize> {
        self.spell_slots
            .iter()
            .position(|s| !s.is_empty() && s.spell == spell)
    }

    pub fn affected_by(&self, spell: SpellKind) -> bool {
        self.spell_slot_of(spell).is_some()
    }

    pub fn is_invisible(&self) -> bool {
        self.affected_by(SpellKind::Invisibility)
    }

    pub fn clear_combat(&mut self) {
        self.combat_target = ThingIndex::INVALID;
        self.combat_kind = None;
    }

    pub fn leave_group(&mut self) {
        self.group_leader = ThingIndex::INVALID;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spell_slot_lookup() {
        let mut ctrl = CreatureControl::new(100);
        assert!(!ctrl.affected_by(SpellKind::Speed));
        ctrl.spell_slots[2] = SpellSlot {
            spell: SpellKind::Speed,
            duration: 10,
            power: 5,
            ..SpellSlot::EMPTY
        };
        assert_eq!(ctrl.spell_slot_of(SpellKind::Speed), Some(2));
        assert!(ctrl.affected_by(SpellKind::Speed));
    }

    #[test]
    fn test_invisibility_derived_from_slots() {
        let mut ctrl = CreatureControl::new(100);
        assert!(!ctrl.is_invisible());
        ctrl.spell_slots[0] = SpellSlot {
            spell: SpellKind::Invisibility,
            duration: 5,
            power: 3,
            ..SpellSlot::EMPTY
        };
        assert!(ctrl.is_invisible());
    }
}
