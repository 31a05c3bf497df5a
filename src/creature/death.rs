//! Kill and death resolution
//!
//! "Killing" a creature is not always destructive: with imprisonment
//! enabled on the victim's side and free prison capacity, the victim is
//! converted to an unconscious body awaiting pickup instead of being
//! destroyed. Already-unconscious victims are not double-processed.

use crate::core::types::{PlayerId, ThingIndex};
use crate::creature::states::{self, CreatureState};
use crate::game::Game;
use crate::things::{ThingClass, ThingData};

/// Turns an unconscious body lies before recovering on its own
const UNCONSCIOUS_RECOVERY_TURNS: i32 = 200;

#[derive(Debug, Clone, Copy, Default)]
pub struct KillFlags {
    /// Skip corpse/death side effects
    pub no_effects: bool,
    /// Force a full death even when imprisonment would apply
    pub always_destroy: bool,
    /// Permit the capture-instead-of-kill branch
    pub allow_unconscious: bool,
}

/// Resolve the death of `victim`.
///
/// `killer` is the thing credited with the kill when valid; counters fall
/// back to `default_player` when it is not (environment deaths). Returns
/// true when the victim was fully destroyed, false when it was captured
/// unconscious (or was not a live creature to begin with).
pub fn kill_creature(
    game: &mut Game,
    victim: ThingIndex,
    killer: Option<ThingIndex>,
    default_player: PlayerId,
    flags: KillFlags,
) -> bool {
    let Some(thing) = game.things.get(victim) else {
        return false;
    };
    if thing.class != ThingClass::Creature {
        return false;
    }
    let (victim_owner, model) = (thing.owner, thing.model);
    let already_unconscious = thing
        .control()
        .map(|c| c.unconscious)
        .unwrap_or(false);
    let explevel = thing.control().map(|c| c.explevel).unwrap_or(0);

    // 1. Clean up behavior state, combat traces, and group membership
    if let Some(ctrl) = game.things.get_mut(victim).and_then(|t| t.control_mut()) {
        ctrl.clear_combat();
        ctrl.leave_group();
        ctrl.move_target = None;
    }

    // 2. Bounded death-ring record for later reanimation effects
    if !victim_owner.is_neutral() {
        game.dungeon_mut(victim_owner)
            .dead_creatures
            .record(model, explevel);
    }

    // 3. Release satellite objects bound to the victim's active effects
    let slot_count = crate::core::types::CREATURE_MAX_SPELLS_AFFECTED;
    for slot in 0..slot_count {
        let occupied = game
            .things
            .get(victim)
            .and_then(|t| t.control())
            .map(|c| !c.spell_slots[slot].is_empty())
            .unwrap_or(false);
        if occupied {
            crate::creature::spells::terminate_spell_effect(game, victim, slot);
        }
    }

    // 4. Kill counters on both sides, falling back to default_player when
    //    the killer thing is gone (killed by environment)
    let killer_player = killer
        .and_then(|k| game.things.get(k))
        .map(|t| t.owner)
        .unwrap_or(default_player);
    if !killer_player.is_neutral() && killer_player.idx() < game.dungeons.len() {
        if killer_player == victim_owner {
            game.dungeon_mut(killer_player).friendly_kills += 1;
        } else {
            game.dungeon_mut(killer_player).battles_won += 1;
        }
    }
    if !victim_owner.is_neutral() && killer_player != victim_owner {
        game.dungeon_mut(victim_owner).battles_lost += 1;
    }

    // 5/6. Capture branch: no valid killer, neutral killer, or invalid
    //      victim dungeon always means a full death
    let capture_possible = !flags.always_destroy
        && flags.allow_unconscious
        && !already_unconscious
        && killer.map(|k| game.things.exists(k)).unwrap_or(false)
        && !killer_player.is_neutral()
        && !victim_owner.is_neutral()
        && game.dungeon(killer_player).imprison_tendency
        && game.rooms.free_prison_capacity(killer_player) > 0;

    if capture_possible {
        if let Some(thing) = game.things.get_mut(victim) {
            thing.health = 1;
            if let Some(ctrl) = thing.control_mut() {
                ctrl.unconscious = true;
                ctrl.unconscious_time = UNCONSCIOUS_RECOVERY_TURNS;
                ctrl.pending_pickup = true;
            }
        }
        states::internal_set_state(game, victim, CreatureState::CreatureUnconscious);
        tracing::debug!("creature {:?} captured unconscious by {:?}", victim, killer_player);
        return false;
    }

    // 7. Full death: drop carried gold, corpse side effects, removal
    let (pos, carried) = match game.things.get(victim) {
        Some(thing) => (
            thing.pos,
            thing.control().map(|c| c.gold_carried).unwrap_or(0),
        ),
        None => return false,
    };
    if carried > 0 {
        let mut pile = crate::things::Thing::new(
            ThingClass::Object,
            0,
            PlayerId(crate::core::types::NEUTRAL_PLAYER as u8),
            pos,
        );
        pile.data = ThingData::GoldPile { amount: carried };
        game.things.create(pile);
    }
    if !flags.no_effects {
        let mut corpse = crate::things::Thing::new(ThingClass::DeadCreature, model, victim_owner, pos);
        corpse.health = 1;
        game.things.create(corpse);
    }
    if !victim_owner.is_neutral() {
        game.dungeon_mut(victim_owner).note_creature_lost(model);
    }
    game.things.delete(victim);
    true
}
