//! Creature behavior states and the per-turn dispatcher
//!
//! Each live, non-picked-up creature runs exactly one state step per turn.
//! States form a closed enum; per-state metadata lives in a static-style
//! info table and dispatch is a match over the enum. State 0 (`Unused`) is
//! reserved invalid: a creature found in it is forcibly reset to its start
//! state rather than crashing the turn.

use serde::{Deserialize, Serialize};

use crate::core::config::{ShotKind, SpellKind};
use crate::core::types::{PlayerId, SlabPos, SubtilePos, ThingIndex, AROUND_TILES};
use crate::creature::{scavenge, shots};
use crate::game::Game;
use crate::map::{RoomKind, SlabKind};
use crate::things::{ThingClass, ThingData};

/// Creature behavior states. `Unused` is the reserved invalid value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreatureState {
    Unused,
    /// Start state for ordinary creatures
    Idle,
    /// Start state for diggers: look for tagged slabs and work them
    ImpDoingNothing,
    MoveToPosition,
    /// Arrive at the scavenger room and validate it as a work site
    AtScavengerRoom,
    /// Work the scavenger room, accumulating turn points
    Scavengering,
    /// Brief pause after consuming a chicken-transformed creature
    Eat,
    Combat,
    CreatureUnconscious,
    /// Angry creature heading for the entrance to abandon the dungeon
    CreatureLeaves,
}

/// Classification used by transition rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateType {
    Invalid,
    Idle,
    Move,
    Work,
    Combat,
    Incapacitated,
}

/// Per-state metadata: classification and exit behavior
#[derive(Debug, Clone, Copy)]
pub struct StateInfo {
    pub state_type: StateType,
    /// Transitioning away must release the held work-room slot
    pub releases_room: bool,
}

/// Metadata row for a state
pub fn state_info(state: CreatureState) -> StateInfo {
    match state {
        CreatureState::Unused => StateInfo {
            state_type: StateType::Invalid,
            releases_room: false,
        },
        CreatureState::Idle | CreatureState::ImpDoingNothing => StateInfo {
            state_type: StateType::Idle,
            releases_room: false,
        },
        CreatureState::MoveToPosition | CreatureState::CreatureLeaves => StateInfo {
            state_type: StateType::Move,
            releases_room: false,
        },
        CreatureState::AtScavengerRoom | CreatureState::Scavengering => StateInfo {
            state_type: StateType::Work,
            releases_room: true,
        },
        CreatureState::Eat => StateInfo {
            state_type: StateType::Work,
            releases_room: false,
        },
        CreatureState::Combat => StateInfo {
            state_type: StateType::Combat,
            releases_room: false,
        },
        CreatureState::CreatureUnconscious => StateInfo {
            state_type: StateType::Incapacitated,
            releases_room: false,
        },
    }
}

/// Result of one state step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateReturn {
    /// No further processing this turn
    Terminal,
    /// State processing continues next turn
    Continue,
}

const ANGER_LEAVE_THRESHOLD: i32 = 500;
const HUNGER_ANGER_THRESHOLD: i32 = 2000;
const COMBAT_SIGHT_RANGE: i32 = 8;
const HEART_SIGHT_RANGE: i32 = 12;
const EAT_PAUSE_TURNS: i32 = 4;

/// Transition to `state`, running the exit behavior of the old state.
pub fn internal_set_state(game: &mut Game, idx: ThingIndex, state: CreatureState) {
    let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) else {
        return;
    };
    let old = ctrl.active_state;
    if state_info(old).releases_room {
        ctrl.work_room = crate::core::types::RoomIndex::INVALID;
    }
    if state_info(old).state_type == StateType::Combat {
        ctrl.clear_combat();
    }
    ctrl.active_state = state;
}

/// Reset a creature to its model's start state
pub fn set_start_state(game: &mut Game, idx: ThingIndex) {
    let Some(thing) = game.things.get(idx) else {
        return;
    };
    let is_digger = game
        .rules
        .creature(thing.model)
        .map(|c| c.is_digger)
        .unwrap_or(false);
    let start = if is_digger {
        CreatureState::ImpDoingNothing
    } else {
        CreatureState::Idle
    };
    internal_set_state(game, idx, start);
    if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
        ctrl.continue_state = CreatureState::Unused;
        ctrl.move_target = None;
    }
}

/// Run one turn of behavior for a creature.
///
/// Returns false when the creature needed no dispatch (picked up, gone).
pub fn process_creature_state(game: &mut Game, idx: ThingIndex) -> bool {
    let Some(thing) = game.things.get(idx) else {
        return false;
    };
    if thing.class != ThingClass::Creature {
        return false;
    }
    let Some(ctrl) = thing.control() else {
        return false;
    };
    if ctrl.picked_up {
        return false;
    }

    process_creature_needs(game, idx);
    if !game.things.exists(idx) {
        return false;
    }

    let state = match game.things.get(idx).and_then(|t| t.control()) {
        Some(ctrl) => ctrl.active_state,
        None => return false,
    };

    if state_info(state).state_type != StateType::Incapacitated {
        try_acquire_combat(game, idx);
    }

    // Self-heal: a creature stuck in the invalid state is reset, never crashed on
    let state = match game.things.get(idx).and_then(|t| t.control()) {
        Some(ctrl) => ctrl.active_state,
        None => return false,
    };
    let state = if state == CreatureState::Unused {
        tracing::error!("creature {:?} has invalid active_state, resetting", idx);
        set_start_state(game, idx);
        match game.things.get(idx).and_then(|t| t.control()) {
            Some(ctrl) => ctrl.active_state,
            None => return false,
        }
    } else {
        state
    };

    let concealed = game
        .things
        .get(idx)
        .and_then(|t| t.control())
        .map(|c| c.is_invisible())
        .unwrap_or(false);
    if !concealed && state_info(state).state_type != StateType::Incapacitated {
        opportunistic_pickup(game, idx);
        if !game.things.exists(idx) {
            return false;
        }
    }

    let state = match game.things.get(idx).and_then(|t| t.control()) {
        Some(ctrl) => ctrl.active_state,
        None => return false,
    };
    let ret = match state {
        CreatureState::Unused => StateReturn::Continue,
        CreatureState::Idle => state_idle(game, idx),
        CreatureState::ImpDoingNothing => state_imp_doing_nothing(game, idx),
        CreatureState::MoveToPosition => state_move_to_position(game, idx),
        CreatureState::AtScavengerRoom => state_at_scavenger_room(game, idx),
        CreatureState::Scavengering => scavenge::process_scavenge(game, idx),
        CreatureState::Eat => state_eat(game, idx),
        CreatureState::Combat => state_combat(game, idx),
        CreatureState::CreatureUnconscious => state_unconscious(game, idx),
        CreatureState::CreatureLeaves => state_leaves(game, idx),
    };
    ret == StateReturn::Terminal
}

/// Hunger tick, anger decay, leave threshold
fn process_creature_needs(game: &mut Game, idx: ThingIndex) {
    let mut leaves = false;
    if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
        ctrl.hunger += 1;
        if ctrl.hunger > HUNGER_ANGER_THRESHOLD {
            ctrl.anger += 1;
        } else if ctrl.anger > 0 && ctrl.wage_received > 0 {
            ctrl.anger -= 1;
            ctrl.wage_received -= 1;
        }
        if ctrl.instance_cooldown > 0 {
            ctrl.instance_cooldown -= 1;
        }
        leaves = ctrl.anger > ANGER_LEAVE_THRESHOLD
            && ctrl.active_state != CreatureState::CreatureLeaves
            && !ctrl.unconscious;
    }
    if leaves {
        tracing::debug!("creature {:?} is angry enough to leave", idx);
        internal_set_state(game, idx, CreatureState::CreatureLeaves);
    }
}

/// Establish combat intent against a visible enemy heart, creature, or door
fn try_acquire_combat(game: &mut Game, idx: ThingIndex) {
    let Some(thing) = game.things.get(idx) else {
        return;
    };
    let (pos, owner) = (thing.pos, thing.owner);
    if owner.is_neutral() {
        return;
    }
    let already_fighting = thing
        .control()
        .map(|c| c.combat_kind.is_some())
        .unwrap_or(false);
    if already_fighting {
        return;
    }
    let can_see_invisible = game
        .rules
        .creature(thing.model)
        .map(|c| c.can_see_invisible)
        .unwrap_or(false);

    // Nearest visible enemy creature
    let mut best: Option<(ThingIndex, i32)> = None;
    for other in game.things.class_list(ThingClass::Creature) {
        if other == idx {
            continue;
        }
        let Some(t) = game.things.get(other) else {
            continue;
        };
        if !game.players_are_enemies(owner, t.owner) {
            continue;
        }
        let Some(octrl) = t.control() else { continue };
        if octrl.unconscious || octrl.picked_up {
            continue;
        }
        if octrl.is_invisible() && !can_see_invisible {
            continue;
        }
        let dist = pos.chess_distance(&t.pos);
        if dist <= COMBAT_SIGHT_RANGE && best.map(|(_, d)| dist < d).unwrap_or(true) {
            best = Some((other, dist));
        }
    }
    if let Some((target, _)) = best {
        if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
            ctrl.combat_target = target;
            ctrl.combat_kind = Some(crate::creature::control::CombatKind::Creature);
        }
        internal_set_state(game, idx, CreatureState::Combat);
        return;
    }

    // Enemy dungeon heart in sight
    for slot in 0..crate::core::types::PLAYERS_COUNT {
        let enemy = PlayerId(slot as u8);
        if !game.players_are_enemies(owner, enemy) {
            continue;
        }
        let heart = game.dungeon(enemy).heart_idx;
        let Some(heart_thing) = game.things.get(heart) else {
            continue;
        };
        if pos.chess_distance(&heart_thing.pos) <= HEART_SIGHT_RANGE {
            if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
                ctrl.combat_target = heart;
                ctrl.combat_kind = Some(crate::creature::control::CombatKind::Object);
            }
            internal_set_state(game, idx, CreatureState::Combat);
            return;
        }
    }

    // Enemy door on an adjacent slab, unless door attacks were suppressed this turn
    let suppressed = game
        .things
        .get(idx)
        .and_then(|t| t.control())
        .map(|c| c.door_suppressed_turn == game.turn)
        .unwrap_or(false);
    if suppressed {
        return;
    }
    let slab = pos.slab();
    for (dx, dy) in crate::core::types::SMALL_AROUND {
        let npos = SlabPos::new(slab.x + dx, slab.y + dy);
        if game.grid.slab_kind_at(npos) != SlabKind::Door {
            continue;
        }
        if !game.players_are_enemies(owner, game.grid.owner_at(npos)) {
            continue;
        }
        let door = game
            .things
            .find_at(ThingClass::Door, npos.center_subtile(), |_| true);
        if let Some(door_idx) = door {
            if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
                ctrl.combat_target = door_idx;
                ctrl.combat_kind = Some(crate::creature::control::CombatKind::Door);
            }
            internal_set_state(game, idx, CreatureState::Combat);
            return;
        }
    }
}

/// Scan self + 8 neighbor subtiles for loose gold or a chicken to consume
fn opportunistic_pickup(game: &mut Game, idx: ThingIndex) {
    let Some(thing) = game.things.get(idx) else {
        return;
    };
    let (pos, owner, model) = (thing.pos, thing.owner, thing.model);
    let gold_hold = game
        .rules
        .creature(model)
        .map(|c| c.gold_hold)
        .unwrap_or(0);
    let carried = thing.control().map(|c| c.gold_carried).unwrap_or(0);

    for (dx, dy) in AROUND_TILES {
        let scan = SubtilePos::new(pos.x + dx, pos.y + dy);

        if carried < gold_hold {
            let pile = game.things.find_at(ThingClass::Object, scan, |t| {
                matches!(t.data, ThingData::GoldPile { .. })
            });
            if let Some(pile_idx) = pile {
                let amount = match game.things.get(pile_idx).map(|t| &t.data) {
                    Some(ThingData::GoldPile { amount }) => *amount,
                    _ => 0,
                };
                let capacity = gold_hold - carried;
                let taken = amount.min(capacity);
                if amount > capacity {
                    // Split: cap at gold_hold, the residual pile stays
                    if let Some(pile) = game.things.get_mut(pile_idx) {
                        pile.data = ThingData::GoldPile {
                            amount: amount - taken,
                        };
                    }
                } else {
                    game.things.delete(pile_idx);
                }
                if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
                    ctrl.gold_carried += taken;
                    ctrl.wage_received += taken;
                }
                return;
            }
        }

        let chicken = game.things.find_at(ThingClass::Creature, scan, |t| {
            t.index != idx
                && t.control()
                    .map(|c| c.affected_by(SpellKind::Chicken) && !c.picked_up)
                    .unwrap_or(false)
        });
        if let Some(chicken_idx) = chicken {
            crate::creature::death::kill_creature(
                game,
                chicken_idx,
                Some(idx),
                owner,
                crate::creature::death::KillFlags {
                    no_effects: true,
                    always_destroy: true,
                    allow_unconscious: false,
                },
            );
            if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
                ctrl.hunger = 0;
                ctrl.wage_received += 10;
                ctrl.move_target = None;
            }
            internal_set_state(game, idx, CreatureState::Eat);
            if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
                ctrl.unconscious_time = EAT_PAUSE_TURNS;
            }
            return;
        }
    }
}

fn state_idle(game: &mut Game, idx: ThingIndex) -> StateReturn {
    // Scavenger-capable creatures head for their scavenger room
    let Some(thing) = game.things.get(idx) else {
        return StateReturn::Terminal;
    };
    let (owner, model, pos) = (thing.owner, thing.model, thing.pos);
    let scavenges = game
        .rules
        .creature(model)
        .map(|c| c.scavenger_cost > 0)
        .unwrap_or(false);
    if scavenges {
        if let Some(room) = game.rooms.find_room_of_kind(owner, RoomKind::Scavenger) {
            let room_idx = room.index;
            let target = room.center_slab().map(|s| s.center_subtile());
            if let Some(target) = target {
                if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
                    ctrl.work_room = room_idx;
                    ctrl.move_target = Some(target);
                    ctrl.continue_state = CreatureState::AtScavengerRoom;
                }
                internal_set_state(game, idx, CreatureState::MoveToPosition);
                return StateReturn::Continue;
            }
        }
    }
    // Wander one subtile now and then
    if game.turn % 7 == 0 {
        use rand::Rng;
        let dx = game.rng.gen_range(-1..=1);
        let dy = game.rng.gen_range(-1..=1);
        let target = SubtilePos::new(pos.x + dx, pos.y + dy);
        if game.grid.slab_kind_at(target.slab()).is_passable() {
            if let Some(thing) = game.things.get_mut(idx) {
                thing.pos = target;
            }
        }
    }
    StateReturn::Continue
}

/// Diggers look for the nearest slab their owner tagged and work it
fn state_imp_doing_nothing(game: &mut Game, idx: ThingIndex) -> StateReturn {
    let Some(thing) = game.things.get(idx) else {
        return StateReturn::Terminal;
    };
    let (pos, owner) = (thing.pos, thing.owner);
    let slab = pos.slab();

    // Adjacent tagged slab: dig it out this turn
    for (dx, dy) in AROUND_TILES {
        let work = SlabPos::new(slab.x + dx, slab.y + dy);
        if !game.grid.is_tagged_for_digging(owner, work) {
            continue;
        }
        let kind = game.grid.slab_kind_at(work);
        game.grid.dig_out(work);
        if kind.is_gold_vein() {
            let mut pile =
                crate::things::Thing::new(ThingClass::Object, 0, owner, work.center_subtile());
            pile.data = ThingData::GoldPile { amount: 200 };
            game.things.create(pile);
        }
        return StateReturn::Continue;
    }

    // Otherwise walk toward the nearest tagged slab
    let max_radius = game.grid.width().max(game.grid.height());
    let target = game
        .grid
        .spiral_search(slab, max_radius, |g, p| g.is_tagged_for_digging(owner, p));
    if let Some(target) = target {
        if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
            ctrl.move_target = Some(target.center_subtile());
            ctrl.continue_state = CreatureState::ImpDoingNothing;
        }
        internal_set_state(game, idx, CreatureState::MoveToPosition);
    }
    StateReturn::Continue
}

fn state_move_to_position(game: &mut Game, idx: ThingIndex) -> StateReturn {
    let Some(thing) = game.things.get(idx) else {
        return StateReturn::Terminal;
    };
    let pos = thing.pos;
    let Some(ctrl) = thing.control() else {
        return StateReturn::Terminal;
    };
    let Some(target) = ctrl.move_target else {
        let next = ctrl.continue_state;
        resume_or_start(game, idx, next);
        return StateReturn::Continue;
    };
    if pos == target {
        let next = ctrl.continue_state;
        if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
            ctrl.move_target = None;
        }
        resume_or_start(game, idx, next);
        return StateReturn::Continue;
    }
    // One Chebyshev step per turn; blocked steps just wait for diggers
    let step = SubtilePos::new(
        pos.x + (target.x - pos.x).signum(),
        pos.y + (target.y - pos.y).signum(),
    );
    if game.grid.slab_kind_at(step.slab()).is_passable() || step.slab() == pos.slab() {
        if let Some(thing) = game.things.get_mut(idx) {
            thing.pos = step;
        }
    }
    StateReturn::Continue
}

fn resume_or_start(game: &mut Game, idx: ThingIndex, next: CreatureState) {
    if next == CreatureState::Unused {
        set_start_state(game, idx);
    } else {
        if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
            ctrl.continue_state = CreatureState::Unused;
        }
        internal_set_state(game, idx, next);
    }
}

fn state_at_scavenger_room(game: &mut Game, idx: ThingIndex) -> StateReturn {
    let Some(thing) = game.things.get(idx) else {
        return StateReturn::Terminal;
    };
    let owner = thing.owner;
    let room = thing.control().map(|c| c.work_room).unwrap_or_default();
    let valid = game.rooms.room_still_valid_as_worksite(room, owner)
        && game
            .rooms
            .get(room)
            .map(|r| r.kind == RoomKind::Scavenger)
            .unwrap_or(false);
    if !valid {
        set_start_state(game, idx);
        return StateReturn::Continue;
    }
    internal_set_state(game, idx, CreatureState::Scavengering);
    // Re-enter the room after the transition cleared it
    if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
        ctrl.work_room = room;
    }
    StateReturn::Continue
}

fn state_eat(game: &mut Game, idx: ThingIndex) -> StateReturn {
    let done = match game.things.get_mut(idx).and_then(|t| t.control_mut()) {
        Some(ctrl) => {
            ctrl.unconscious_time -= 1;
            ctrl.unconscious_time <= 0
        }
        None => return StateReturn::Terminal,
    };
    if done {
        set_start_state(game, idx);
    }
    StateReturn::Continue
}

fn state_combat(game: &mut Game, idx: ThingIndex) -> StateReturn {
    let Some(thing) = game.things.get(idx) else {
        return StateReturn::Terminal;
    };
    let (pos, model) = (thing.pos, thing.model);
    let Some(ctrl) = thing.control() else {
        return StateReturn::Terminal;
    };
    let target = ctrl.combat_target;
    let cooldown = ctrl.instance_cooldown;
    let Some(target_thing) = game.things.get(target) else {
        set_start_state(game, idx);
        return StateReturn::Continue;
    };
    let target_pos = target_thing.pos;
    let dist = pos.chess_distance(&target_pos);

    if cooldown == 0 {
        // Casters fight at range, everyone else closes to melee
        let ranged = game
            .rules
            .creature(model)
            .map(|c| c.can_see_invisible && !c.is_digger)
            .unwrap_or(false);
        let kind = if ranged && dist > 2 {
            ShotKind::Fireball
        } else if dist <= 2 {
            ShotKind::Melee
        } else {
            // Close the distance first
            step_towards(game, idx, target_pos);
            return StateReturn::Continue;
        };
        shots::creature_fire_shot(game, idx, Some(target), kind, 0);
        if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
            ctrl.instance_cooldown = 8;
        }
    } else if dist > 2 {
        step_towards(game, idx, target_pos);
    }
    StateReturn::Continue
}

fn step_towards(game: &mut Game, idx: ThingIndex, target: SubtilePos) {
    let Some(thing) = game.things.get(idx) else {
        return;
    };
    let pos = thing.pos;
    let step = SubtilePos::new(
        pos.x + (target.x - pos.x).signum(),
        pos.y + (target.y - pos.y).signum(),
    );
    if game.grid.slab_kind_at(step.slab()).is_passable() || step.slab() == pos.slab() {
        if let Some(thing) = game.things.get_mut(idx) {
            thing.pos = step;
        }
    }
}

fn state_unconscious(game: &mut Game, idx: ThingIndex) -> StateReturn {
    let recovered = match game.things.get_mut(idx).and_then(|t| t.control_mut()) {
        Some(ctrl) => {
            ctrl.unconscious_time -= 1;
            ctrl.unconscious_time <= 0
        }
        None => return StateReturn::Terminal,
    };
    if recovered {
        let max = game
            .things
            .get(idx)
            .and_then(|t| t.control())
            .map(|c| c.max_health)
            .unwrap_or(1);
        if let Some(thing) = game.things.get_mut(idx) {
            thing.health = (max / 10).max(1);
            if let Some(ctrl) = thing.control_mut() {
                ctrl.unconscious = false;
                ctrl.pending_pickup = false;
            }
        }
        set_start_state(game, idx);
    }
    StateReturn::Terminal
}

fn state_leaves(game: &mut Game, idx: ThingIndex) -> StateReturn {
    let Some(thing) = game.things.get(idx) else {
        return StateReturn::Terminal;
    };
    let (pos, owner, model) = (thing.pos, thing.owner, thing.model);
    let exit = game
        .rooms
        .find_room_of_kind(owner, RoomKind::Entrance)
        .and_then(|r| r.center_slab())
        .map(|s| s.center_subtile())
        .unwrap_or(SubtilePos::new(1, 1));
    if pos.slab() == exit.slab() {
        tracing::debug!("creature {:?} left the dungeon", idx);
        game.dungeon_mut(owner).note_creature_lost(model);
        game.things.delete(idx);
        return StateReturn::Terminal;
    }
    step_towards(game, idx, exit);
    StateReturn::Continue
}
