//! Timed spell effects on creatures
//!
//! Effects live in a small bounded slot array per creature. Re-casting a
//! spell refreshes its existing slot; a full array evicts the slot with
//! the smallest magnitude (not the oldest), terminating that effect
//! cleanly before the slot is reused.

use std::f32::consts::TAU;

use crate::core::config::{clamp_spell_level, spell_duration, SpellKind};
use crate::core::types::{PlayerId, SubtilePos, ThingIndex, CREATURE_MAX_SPELLS_AFFECTED};
use crate::creature::control::SpellSlot;
use crate::creature::states;
use crate::game::Game;
use crate::things::{Thing, ThingClass, ThingData};

/// Number of satellite objects an Armour effect summons
const ARMOUR_SUMMON_COUNT: usize = 3;
/// Radius in subtiles at which satellites orbit the caster
const SUMMON_RADIUS: f32 = 1.5;

/// Apply `spell` to a creature at `level`. `caster` is the player credited
/// with any kills the effect causes.
///
/// Unknown spell stats log a warning and do nothing. Effects with zero
/// duration (Heal, Teleport) apply instantly and occupy no slot.
pub fn apply_spell_effect(
    game: &mut Game,
    idx: ThingIndex,
    spell: SpellKind,
    level: u8,
    caster: PlayerId,
) {
    let level = clamp_spell_level(level);
    let Some(stats) = game.rules.spell(spell).cloned() else {
        tracing::warn!("apply_spell_effect: unknown spell {:?}", spell);
        return;
    };
    if !game
        .things
        .get(idx)
        .map(|t| t.class == ThingClass::Creature)
        .unwrap_or(false)
    {
        return;
    }
    let duration = spell_duration(&stats, level);

    // Instant effects
    match spell {
        SpellKind::Heal => {
            if let Some(thing) = game.things.get_mut(idx) {
                let max = thing.control().map(|c| c.max_health).unwrap_or(thing.health);
                thing.health = (thing.health + stats.power as i32 * (level as i32 + 1)).min(max);
            }
            return;
        }
        SpellKind::Teleport => {
            teleport_to_heart(game, idx);
            return;
        }
        _ => {}
    }

    // Re-cast: refresh the existing slot in place, never stack
    let existing = game
        .things
        .get(idx)
        .and_then(|t| t.control())
        .and_then(|c| c.spell_slot_of(spell));
    if let Some(slot) = existing {
        if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
            ctrl.spell_slots[slot].duration = duration;
            ctrl.spell_slots[slot].power = stats.power;
            ctrl.spell_slots[slot].caster = caster;
        }
        return;
    }

    let slot = free_spell_slot(game, idx);
    if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
        ctrl.spell_slots[slot] = SpellSlot {
            spell,
            duration,
            power: stats.power,
            caster,
            summons: [ThingIndex::INVALID; 3],
        };
    }
    apply_allocation_side_effects(game, idx, slot, spell, level);
}

/// Find a slot for a new effect: first empty one, else evict the slot with
/// the smallest power (ties broken by first-found), terminating it cleanly.
fn free_spell_slot(game: &mut Game, idx: ThingIndex) -> usize {
    let slots = match game.things.get(idx).and_then(|t| t.control()) {
        Some(ctrl) => ctrl.spell_slots,
        None => return 0,
    };
    if let Some(empty) = slots.iter().position(|s| s.is_empty()) {
        return empty;
    }
    let mut victim = 0usize;
    for i in 1..CREATURE_MAX_SPELLS_AFFECTED {
        if slots[i].power < slots[victim].power {
            victim = i;
        }
    }
    tracing::debug!(
        "spell slots full on {:?}, evicting {:?} (power {})",
        idx,
        slots[victim].spell,
        slots[victim].power
    );
    terminate_spell_effect(game, idx, victim);
    victim
}

/// Per-spell side effects when a new slot is allocated
fn apply_allocation_side_effects(
    game: &mut Game,
    idx: ThingIndex,
    slot: usize,
    spell: SpellKind,
    level: u8,
) {
    match spell {
        SpellKind::Speed => {
            if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
                ctrl.speed = 200;
            }
        }
        SpellKind::Slow | SpellKind::Freeze | SpellKind::Chicken => {
            // Polymorph-style effects pin movement
            if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
                ctrl.speed = 0;
                if spell == SpellKind::Chicken {
                    ctrl.clear_combat();
                    ctrl.move_target = None;
                }
            }
            if spell == SpellKind::Chicken {
                states::internal_set_state(game, idx, states::CreatureState::Idle);
            }
        }
        SpellKind::Armour => {
            summon_satellites(game, idx, slot);
        }
        SpellKind::Disease => {
            // Damage over time handled by decay; level scales via power
            if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
                ctrl.spell_slots[slot].power =
                    ctrl.spell_slots[slot].power.saturating_add(level);
            }
        }
        SpellKind::Invisibility
        | SpellKind::Rebound
        | SpellKind::Fly
        | SpellKind::Light => {}
        _ => {}
    }
}

/// Place satellite objects radially around the caster at fixed angular steps
fn summon_satellites(game: &mut Game, idx: ThingIndex, slot: usize) {
    let Some(thing) = game.things.get(idx) else {
        return;
    };
    let (pos, owner) = (thing.pos, thing.owner);
    let mut created = [ThingIndex::INVALID; 3];
    for (i, out) in created.iter_mut().enumerate() {
        let angle = TAU * i as f32 / ARMOUR_SUMMON_COUNT as f32;
        let sat_pos = SubtilePos::new(
            pos.x + (SUMMON_RADIUS * angle.cos()).round() as i32,
            pos.y + (SUMMON_RADIUS * angle.sin()).round() as i32,
        );
        let mut sat = Thing::new(ThingClass::Object, 0, owner, sat_pos);
        sat.data = ThingData::SpellSummon;
        sat.parent = idx;
        if let Some(sat_idx) = game.things.create(sat) {
            *out = sat_idx;
        }
    }
    if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
        ctrl.spell_slots[slot].summons = created;
    }
}

fn teleport_to_heart(game: &mut Game, idx: ThingIndex) {
    let Some(thing) = game.things.get(idx) else {
        return;
    };
    let heart = game.dungeon(thing.owner).heart_idx;
    let Some(heart_pos) = game.things.get(heart).map(|t| t.pos) else {
        return;
    };
    if let Some(thing) = game.things.get_mut(idx) {
        thing.pos = heart_pos;
    }
}

/// Terminate the effect in `slot`, releasing bound satellite objects and
/// undoing allocation side effects. The slot becomes empty.
pub fn terminate_spell_effect(game: &mut Game, idx: ThingIndex, slot: usize) {
    let Some(ctrl) = game.things.get(idx).and_then(|t| t.control()) else {
        return;
    };
    let entry = ctrl.spell_slots[slot];
    if entry.is_empty() {
        return;
    }
    for summon in entry.summons {
        if summon.is_valid() {
            game.things.delete(summon);
        }
    }
    if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
        ctrl.spell_slots[slot] = SpellSlot::EMPTY;
        match entry.spell {
            SpellKind::Speed | SpellKind::Slow | SpellKind::Freeze | SpellKind::Chicken => {
                ctrl.speed = 100;
            }
            _ => {}
        }
    }
}

/// Per-turn decay: tick down durations, expire finished effects, apply
/// damage-over-time for Disease.
pub fn process_spell_effects(game: &mut Game, idx: ThingIndex) {
    let slots = match game.things.get(idx).and_then(|t| t.control()) {
        Some(ctrl) => ctrl.spell_slots,
        None => return,
    };
    for (i, entry) in slots.iter().enumerate() {
        if entry.is_empty() {
            continue;
        }
        if entry.spell == SpellKind::Disease && game.turn % 20 == 0 {
            crate::creature::apply_damage(game, idx, entry.power as i32, None, entry.caster);
            if !game.things.exists(idx) {
                return;
            }
        }
        let expired = match game.things.get_mut(idx).and_then(|t| t.control_mut()) {
            Some(ctrl) => {
                ctrl.spell_slots[i].duration -= 1;
                ctrl.spell_slots[i].duration <= 0
            }
            None => return,
        };
        if expired {
            terminate_spell_effect(game, idx, i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::standard_rules;
    use crate::core::types::PlayerId;
    use crate::creature::spawn_creature;

    fn game_with_creature() -> (Game, ThingIndex) {
        let mut g = Game::new(20, 20, standard_rules(), 3);
        let idx = spawn_creature(&mut g, 3, PlayerId(0), SubtilePos::new(9, 9)).unwrap();
        (g, idx)
    }

    fn occupancy(game: &Game, idx: ThingIndex) -> usize {
        game.things
            .get(idx)
            .unwrap()
            .control()
            .unwrap()
            .spell_slots
            .iter()
            .filter(|s| !s.is_empty())
            .count()
    }

    #[test]
    fn test_recast_refreshes_not_stacks() {
        let (mut g, idx) = game_with_creature();
        apply_spell_effect(&mut g, idx, SpellKind::Speed, 0, PlayerId(0));
        assert_eq!(occupancy(&g, idx), 1);
        // Let it tick down, then re-cast at a higher level
        process_spell_effects(&mut g, idx);
        let before = g.things.get(idx).unwrap().control().unwrap().spell_slots
            [g.things.get(idx).unwrap().control().unwrap().spell_slot_of(SpellKind::Speed).unwrap()]
        .duration;
        apply_spell_effect(&mut g, idx, SpellKind::Speed, 4, PlayerId(0));
        assert_eq!(occupancy(&g, idx), 1);
        let ctrl = g.things.get(idx).unwrap().control().unwrap();
        let slot = ctrl.spell_slot_of(SpellKind::Speed).unwrap();
        assert!(ctrl.spell_slots[slot].duration > before);
    }

    #[test]
    fn test_full_slots_evict_minimum_power() {
        let (mut g, idx) = game_with_creature();
        // Fill all five slots; Light has the smallest power (1)
        apply_spell_effect(&mut g, idx, SpellKind::Light, 0, PlayerId(0));
        apply_spell_effect(&mut g, idx, SpellKind::Speed, 0, PlayerId(0));
        apply_spell_effect(&mut g, idx, SpellKind::Invisibility, 0, PlayerId(0));
        apply_spell_effect(&mut g, idx, SpellKind::Fly, 0, PlayerId(0));
        apply_spell_effect(&mut g, idx, SpellKind::Rebound, 0, PlayerId(0));
        assert_eq!(occupancy(&g, idx), CREATURE_MAX_SPELLS_AFFECTED);

        apply_spell_effect(&mut g, idx, SpellKind::Disease, 0, PlayerId(0));
        let ctrl = g.things.get(idx).unwrap().control().unwrap();
        assert_eq!(occupancy(&g, idx), CREATURE_MAX_SPELLS_AFFECTED);
        assert!(!ctrl.affected_by(SpellKind::Light));
        assert!(ctrl.affected_by(SpellKind::Disease));
        assert!(ctrl.affected_by(SpellKind::Speed));
    }

    #[test]
    fn test_eviction_runs_cleanup_of_victim() {
        let (mut g, idx) = game_with_creature();
        apply_spell_effect(&mut g, idx, SpellKind::Armour, 0, PlayerId(0));
        let summons = g.things.get(idx).unwrap().control().unwrap().spell_slots
            [g.things.get(idx).unwrap().control().unwrap().spell_slot_of(SpellKind::Armour).unwrap()]
        .summons;
        assert!(summons.iter().all(|s| g.things.exists(*s)));

        // Make Armour the weakest remaining effect, then overflow the array
        apply_spell_effect(&mut g, idx, SpellKind::Speed, 0, PlayerId(0));
        apply_spell_effect(&mut g, idx, SpellKind::Disease, 0, PlayerId(0));
        apply_spell_effect(&mut g, idx, SpellKind::Chicken, 0, PlayerId(0));
        apply_spell_effect(&mut g, idx, SpellKind::Freeze, 0, PlayerId(0));
        // Armour (power 4) is now the minimum; this cast must evict it
        apply_spell_effect(&mut g, idx, SpellKind::Invisibility, 0, PlayerId(0));

        let ctrl = g.things.get(idx).unwrap().control().unwrap();
        assert!(!ctrl.affected_by(SpellKind::Armour));
        assert!(summons.iter().all(|s| !g.things.exists(*s)));
    }

    #[test]
    fn test_heal_clamps_to_max_health() {
        let (mut g, idx) = game_with_creature();
        let max = g.things.get(idx).unwrap().control().unwrap().max_health;
        g.things.get_mut(idx).unwrap().health = max - 10;
        apply_spell_effect(&mut g, idx, SpellKind::Heal, 8, PlayerId(0));
        assert_eq!(g.things.get(idx).unwrap().health, max);
        // Heal occupies no slot
        assert_eq!(occupancy(&g, idx), 0);
    }

    #[test]
    fn test_unknown_spell_is_noop() {
        let (mut g, idx) = game_with_creature();
        apply_spell_effect(&mut g, idx, SpellKind::None, 0, PlayerId(0));
        assert_eq!(occupancy(&g, idx), 0);
    }

    #[test]
    fn test_disease_kill_credits_caster() {
        let mut g = Game::new(20, 20, standard_rules(), 3);
        let victim = spawn_creature(&mut g, 3, PlayerId(1), SubtilePos::new(9, 9)).unwrap();
        apply_spell_effect(&mut g, victim, SpellKind::Disease, 0, PlayerId(0));
        g.things.get_mut(victim).unwrap().health = 1;
        // The damage-over-time tick fires on turns divisible by 20
        g.turn = 20;
        process_spell_effects(&mut g, victim);
        assert!(!g.things.exists(victim));
        assert_eq!(g.dungeons[0].battles_won, 1);
        assert_eq!(g.dungeons[1].battles_lost, 1);
    }

    #[test]
    fn test_effect_expires_and_restores_speed() {
        let (mut g, idx) = game_with_creature();
        apply_spell_effect(&mut g, idx, SpellKind::Slow, 0, PlayerId(0));
        assert_eq!(g.things.get(idx).unwrap().control().unwrap().speed, 0);
        let duration = {
            let ctrl = g.things.get(idx).unwrap().control().unwrap();
            ctrl.spell_slots[ctrl.spell_slot_of(SpellKind::Slow).unwrap()].duration
        };
        for _ in 0..duration {
            process_spell_effects(&mut g, idx);
        }
        let ctrl = g.things.get(idx).unwrap().control().unwrap();
        assert!(!ctrl.affected_by(SpellKind::Slow));
        assert_eq!(ctrl.speed, 100);
    }
}
