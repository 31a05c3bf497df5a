//! Scavenger room work: accumulating turn points to lure enemy creatures
//!
//! A creature working a scavenger room accumulates turn points per turn.
//! Reaching the model's requirement converts one enemy creature of the
//! same model (or summons one from the pool when no enemy has it), paying
//! the model's scavenger cost in gold. A broke dungeon cannot scavenge:
//! the worker is sent back to its start state with a user notice.

use crate::actions::MessageId;
use crate::core::types::{ThingIndex, PLAYERS_COUNT};
use crate::creature::states::{self, StateReturn};
use crate::game::Game;
use crate::map::RoomKind;
use crate::things::ThingClass;

/// One step of scavenger-room work
pub fn process_scavenge(game: &mut Game, idx: ThingIndex) -> StateReturn {
    let Some(thing) = game.things.get(idx) else {
        return StateReturn::Terminal;
    };
    let (owner, model) = (thing.owner, thing.model);
    let work_room = thing.control().map(|c| c.work_room).unwrap_or_default();
    let explevel = thing.control().map(|c| c.explevel).unwrap_or(0);

    let Some(stats) = game.rules.creature(model) else {
        tracing::warn!("scavenging creature {:?} has unknown model {}", idx, model);
        states::set_start_state(game, idx);
        return StateReturn::Continue;
    };
    let (cost, require) = (stats.scavenger_cost as i64, stats.scavenge_require);

    let room_ok = game.rooms.room_still_valid_as_worksite(work_room, owner)
        && game
            .rooms
            .get(work_room)
            .map(|r| r.kind == RoomKind::Scavenger)
            .unwrap_or(false);
    if !room_ok {
        states::set_start_state(game, idx);
        return StateReturn::Continue;
    }

    if game.dungeon(owner).total_money() < cost {
        game.messages
            .output(game.turn, MessageId::NoGoldToScavenge, 500);
        states::set_start_state(game, idx);
        return StateReturn::Continue;
    }

    // Lock onto one victim and keep it across turns; a fresh scan only
    // happens when the stored target is gone or no longer an enemy
    let target = pick_scavenge_target(game, idx, model);
    game.dungeon_mut(owner).scavenge_target = target.unwrap_or(ThingIndex::INVALID);

    let points = {
        let d = game.dungeon_mut(owner);
        let entry = d.scavenge_points.entry(model).or_insert(0);
        *entry += explevel as i64 + 1;
        *entry
    };
    if points < require {
        return StateReturn::Continue;
    }

    // Threshold reached: convert the locked target, or pull from the pool
    game.dungeon_mut(owner).scavenge_points.insert(model, 0);
    if !game.dungeon_mut(owner).spend_gold(cost) {
        return StateReturn::Continue;
    }
    match target {
        Some(victim) => {
            let old_owner = game.things.get(victim).map(|t| t.owner);
            if let Some(old_owner) = old_owner {
                if old_owner.idx() < PLAYERS_COUNT && !old_owner.is_neutral() {
                    game.dungeon_mut(old_owner).note_creature_lost(model);
                }
            }
            if let Some(t) = game.things.get_mut(victim) {
                t.owner = owner;
                if let Some(ctrl) = t.control_mut() {
                    ctrl.clear_combat();
                    ctrl.anger = 0;
                }
            }
            states::set_start_state(game, victim);
            game.dungeon_mut(owner).note_creature_gained(model);
        }
        None => {
            // Pool conversion: a fresh creature appears at the room
            let spawn_at = game
                .rooms
                .get(game.things.get(idx).and_then(|t| t.control()).map(|c| c.work_room).unwrap_or_default())
                .and_then(|r| r.center_slab())
                .map(|s| s.center_subtile());
            if let Some(pos) = spawn_at {
                crate::creature::spawn_creature(game, model, owner, pos);
            }
        }
    }
    game.dungeon_mut(owner).scavenge_counters += 1;
    game.dungeon_mut(owner).scavenge_target = ThingIndex::INVALID;
    game.messages
        .output(game.turn, MessageId::MinionScavenged, 100);
    StateReturn::Continue
}

/// Current scavenge target if still valid, else the first enemy creature
/// of the same model.
fn pick_scavenge_target(game: &Game, scavenger: ThingIndex, model: u16) -> Option<ThingIndex> {
    let owner = game.things.get(scavenger)?.owner;
    let current = game.dungeon(owner).scavenge_target;
    if let Some(t) = game.things.get(current) {
        if t.model == model && game.players_are_enemies(owner, t.owner) {
            return Some(current);
        }
    }
    game.things
        .class_list(ThingClass::Creature)
        .into_iter()
        .find(|&c| {
            c != scavenger
                && game
                    .things
                    .get(c)
                    .map(|t| {
                        t.model == model
                            && game.players_are_enemies(owner, t.owner)
                            && t.control().map(|ctrl| !ctrl.picked_up).unwrap_or(false)
                    })
                    .unwrap_or(false)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::standard_rules;
    use crate::core::types::{PlayerId, SlabPos, SubtilePos};
    use crate::creature::spawn_creature;
    use crate::creature::states::CreatureState;

    fn scavenger_setup(money: i64) -> (Game, ThingIndex) {
        let mut g = Game::new(20, 20, standard_rules(), 9);
        let room = g.rooms.add_room(
            &mut g.grid,
            RoomKind::Scavenger,
            PlayerId(0),
            vec![SlabPos::new(3, 3)],
        );
        // Troll model: scavenger_cost 50
        let worker = spawn_creature(&mut g, 3, PlayerId(0), SubtilePos::new(10, 10)).unwrap();
        {
            let ctrl = g.things.get_mut(worker).unwrap().control_mut().unwrap();
            ctrl.work_room = room;
            ctrl.active_state = CreatureState::Scavengering;
        }
        g.dungeons[0].total_money_owned = money;
        (g, worker)
    }

    #[test]
    fn test_no_gold_resets_and_messages() {
        let (mut g, worker) = scavenger_setup(40);
        process_scavenge(&mut g, worker);
        assert!(g.messages.contains(MessageId::NoGoldToScavenge));
        let state = g.things.get(worker).unwrap().control().unwrap().active_state;
        assert_eq!(state, CreatureState::Idle);
        assert_eq!(g.dungeons[0].scavenge_points.get(&3).copied().unwrap_or(0), 0);
    }

    #[test]
    fn test_points_accumulate_with_gold() {
        let (mut g, worker) = scavenger_setup(1000);
        process_scavenge(&mut g, worker);
        process_scavenge(&mut g, worker);
        assert!(g.dungeons[0].scavenge_points[&3] >= 2);
        assert!(!g.messages.contains(MessageId::NoGoldToScavenge));
    }

    #[test]
    fn test_conversion_charges_cost_and_flips_owner() {
        let (mut g, worker) = scavenger_setup(1000);
        let enemy = spawn_creature(&mut g, 3, PlayerId(1), SubtilePos::new(15, 15)).unwrap();
        // Jump straight to the threshold
        g.dungeons[0]
            .scavenge_points
            .insert(3, g.rules.creature(3).unwrap().scavenge_require);
        process_scavenge(&mut g, worker);
        assert_eq!(g.things.get(enemy).unwrap().owner, PlayerId(0));
        assert_eq!(g.dungeons[0].money_spent, 50);
        assert_eq!(g.dungeons[0].scavenge_counters, 1);
        assert!(g.messages.contains(MessageId::MinionScavenged));
    }

    #[test]
    fn test_accumulation_locks_a_target() {
        let (mut g, worker) = scavenger_setup(1000);
        let enemy = spawn_creature(&mut g, 3, PlayerId(1), SubtilePos::new(15, 15)).unwrap();
        process_scavenge(&mut g, worker);
        assert_eq!(g.dungeons[0].scavenge_target, enemy);
    }

    #[test]
    fn test_locked_target_survives_later_arrivals() {
        let (mut g, worker) = scavenger_setup(1000);
        let first = spawn_creature(&mut g, 3, PlayerId(1), SubtilePos::new(15, 15)).unwrap();
        let locked = spawn_creature(&mut g, 3, PlayerId(2), SubtilePos::new(16, 16)).unwrap();
        g.dungeons[0].scavenge_target = locked;
        g.dungeons[0]
            .scavenge_points
            .insert(3, g.rules.creature(3).unwrap().scavenge_require);
        process_scavenge(&mut g, worker);
        // The stored target converts, not the first enemy in list order
        assert_eq!(g.things.get(locked).unwrap().owner, PlayerId(0));
        assert_eq!(g.things.get(first).unwrap().owner, PlayerId(1));
        assert_eq!(g.dungeons[0].scavenge_target, ThingIndex::INVALID);
    }

    #[test]
    fn test_lost_room_resets_worker() {
        let (mut g, worker) = scavenger_setup(1000);
        let room = g.things.get(worker).unwrap().control().unwrap().work_room;
        g.rooms.remove(room);
        process_scavenge(&mut g, worker);
        let state = g.things.get(worker).unwrap().control().unwrap().active_state;
        assert_eq!(state, CreatureState::Idle);
    }
}
