//! The player command surface
//!
//! `game_action` is the single dispatch point through which both human
//! input and computer tasks invoke primitive world mutations. Computer
//! code goes through `crate::computer::try_game_action`, which also
//! decrements the per-turn action budget on success.

use serde::{Deserialize, Serialize};

use crate::core::config::{ShotKind, SpellKind};
use crate::core::types::{GameTurn, PlayerId, SlabPos, SubtilePos, ThingIndex};
use crate::creature::{spells, states};
use crate::game::Game;
use crate::map::{RoomKind, SlabKind};
use crate::things::{ThingClass, ThingData};

/// Capacity of a player's hand
pub const HAND_MAX: usize = 8;

/// User-visible notices emitted by the simulation.
/// Fire-and-forget: the UI consumes these, the core never reads them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageId {
    NoGoldToScavenge,
    MinionScavenged,
    NotEnoughGold,
    CreatureImprisoned,
    BattleWon,
    BattleLost,
}

/// Queued output messages, deduplicated per id by a delay window
#[derive(Debug, Clone, Default)]
pub struct MessageQueue {
    emitted: Vec<(MessageId, GameTurn)>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `msg` unless it was already emitted within `delay` turns
    pub fn output(&mut self, turn: GameTurn, msg: MessageId, delay: GameTurn) {
        if let Some(&(_, last)) = self.emitted.iter().rev().find(|(m, _)| *m == msg) {
            if turn.saturating_sub(last) < delay {
                return;
            }
        }
        self.emitted.push((msg, turn));
    }

    pub fn emitted(&self) -> &[(MessageId, GameTurn)] {
        &self.emitted
    }

    pub fn contains(&self, msg: MessageId) -> bool {
        self.emitted.iter().any(|(m, _)| *m == msg)
    }
}

/// Castable keeper powers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MagicPower {
    Heal,
    Speed,
    Armour,
    Invisibility,
    Lightning,
    Freeze,
    Disease,
    Chicken,
    CallToArms,
}

impl MagicPower {
    /// Direct-effect spell carried by this power, if it is not a shot
    fn spell(&self) -> Option<SpellKind> {
        match self {
            MagicPower::Heal => Some(SpellKind::Heal),
            MagicPower::Speed => Some(SpellKind::Speed),
            MagicPower::Armour => Some(SpellKind::Armour),
            MagicPower::Invisibility => Some(SpellKind::Invisibility),
            MagicPower::Freeze => Some(SpellKind::Freeze),
            MagicPower::Disease => Some(SpellKind::Disease),
            MagicPower::Chicken => Some(SpellKind::Chicken),
            MagicPower::Lightning | MagicPower::CallToArms => None,
        }
    }
}

/// Gold cost of casting `power` at `level`
pub fn power_cost(power: MagicPower, level: u8) -> i64 {
    let base: i64 = match power {
        MagicPower::Heal => 60,
        MagicPower::Speed => 100,
        MagicPower::Armour => 80,
        MagicPower::Invisibility => 120,
        MagicPower::Lightning => 150,
        MagicPower::Freeze => 90,
        MagicPower::Disease => 200,
        MagicPower::Chicken => 180,
        MagicPower::CallToArms => 40,
    };
    base * (level as i64 + 1)
}

/// Primitive world-mutating operations
#[derive(Debug, Clone, Copy)]
pub enum GameAction {
    CastPowerOnThing {
        power: MagicPower,
        target: ThingIndex,
        level: u8,
    },
    CastPowerAtPos {
        power: MagicPower,
        pos: SubtilePos,
        level: u8,
    },
    TagDig {
        slab: SlabPos,
    },
    PlaceTrap {
        model: u16,
        slab: SlabPos,
    },
    PlaceDoor {
        model: u16,
        slab: SlabPos,
    },
    PlaceRoomSlab {
        kind: RoomKind,
        slab: SlabPos,
    },
    SellTrap {
        slab: SlabPos,
    },
    SellDoor {
        slab: SlabPos,
    },
    PickupCreature {
        target: ThingIndex,
    },
    DropCreature {
        target: ThingIndex,
        pos: SubtilePos,
    },
}

/// Outcome of a `game_action` dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResult {
    Ok,
    Fail,
    NoGold,
    InvalidTarget,
}

impl ActionResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, ActionResult::Ok)
    }
}

/// Single dispatch point for primitive world mutations
pub fn game_action(game: &mut Game, player: PlayerId, action: GameAction) -> ActionResult {
    match action {
        GameAction::CastPowerOnThing {
            power,
            target,
            level,
        } => cast_power_on_thing(game, player, power, target, level),
        GameAction::CastPowerAtPos { power, pos, level } => {
            cast_power_at_pos(game, player, power, pos, level)
        }
        GameAction::TagDig { slab } => {
            if game.grid.tag_for_digging(player, slab) {
                ActionResult::Ok
            } else {
                ActionResult::Fail
            }
        }
        GameAction::PlaceTrap { model, slab } => place_trap_or_door(game, player, model, slab, false),
        GameAction::PlaceDoor { model, slab } => place_trap_or_door(game, player, model, slab, true),
        GameAction::PlaceRoomSlab { kind, slab } => place_room_slab(game, player, kind, slab),
        GameAction::SellTrap { slab } => sell_trap_or_door(game, player, slab, false),
        GameAction::SellDoor { slab } => sell_trap_or_door(game, player, slab, true),
        GameAction::PickupCreature { target } => pickup_creature(game, player, target),
        GameAction::DropCreature { target, pos } => drop_creature(game, player, target, pos),
    }
}

fn cast_power_on_thing(
    game: &mut Game,
    player: PlayerId,
    power: MagicPower,
    target: ThingIndex,
    level: u8,
) -> ActionResult {
    let Some(thing) = game.things.get(target) else {
        tracing::warn!("cast {:?} on missing thing {:?}", power, target);
        return ActionResult::InvalidTarget;
    };
    if thing.class != ThingClass::Creature {
        return ActionResult::InvalidTarget;
    }
    if !game.dungeon_mut(player).spend_gold(power_cost(power, level)) {
        game.messages
            .output(game.turn, MessageId::NotEnoughGold, 50);
        return ActionResult::NoGold;
    }
    match power.spell() {
        Some(spell) => {
            spells::apply_spell_effect(game, target, spell, level, player);
            ActionResult::Ok
        }
        None => match power {
            MagicPower::Lightning => {
                let damage = game
                    .rules
                    .shot(ShotKind::Lightning)
                    .map(|s| s.damage)
                    .unwrap_or(0)
                    * (level as i32 + 1);
                crate::creature::apply_damage(game, target, damage, None, player);
                ActionResult::Ok
            }
            _ => ActionResult::Fail,
        },
    }
}

fn cast_power_at_pos(
    game: &mut Game,
    player: PlayerId,
    power: MagicPower,
    pos: SubtilePos,
    level: u8,
) -> ActionResult {
    if power != MagicPower::CallToArms {
        tracing::warn!("power {:?} cannot target a position", power);
        return ActionResult::Fail;
    }
    if !game.dungeon_mut(player).spend_gold(power_cost(power, level)) {
        return ActionResult::NoGold;
    }
    // Rally: every fit creature of the player heads for the banner
    for idx in game.things.class_list(ThingClass::Creature) {
        let Some(thing) = game.things.get(idx) else {
            continue;
        };
        if thing.owner != player {
            continue;
        }
        let is_digger = game
            .rules
            .creature(thing.model)
            .map(|c| c.is_digger)
            .unwrap_or(false);
        if is_digger {
            continue;
        }
        if let Some(ctrl) = game.things.get_mut(idx).and_then(|t| t.control_mut()) {
            if ctrl.unconscious || ctrl.picked_up {
                continue;
            }
            ctrl.move_target = Some(pos);
        }
        states::internal_set_state(game, idx, states::CreatureState::MoveToPosition);
    }
    ActionResult::Ok
}

fn place_trap_or_door(
    game: &mut Game,
    player: PlayerId,
    model: u16,
    slab: SlabPos,
    is_door: bool,
) -> ActionResult {
    let Some(stats) = game.rules.trap_door(model, is_door) else {
        tracing::warn!("unknown trap/door model {} (door={})", model, is_door);
        return ActionResult::InvalidTarget;
    };
    let kind = game.grid.slab_kind_at(slab);
    let placeable = if is_door {
        kind == SlabKind::Claimed
    } else {
        kind == SlabKind::Claimed || kind == SlabKind::RoomFloor
    };
    if !placeable || game.grid.owner_at(slab) != player {
        return ActionResult::Fail;
    }
    let cost = stats.place_cost as i64;
    if !game.dungeon_mut(player).spend_gold(cost) {
        return ActionResult::NoGold;
    }
    let class = if is_door {
        ThingClass::Door
    } else {
        ThingClass::Trap
    };
    let mut thing = crate::things::Thing::new(class, model, player, slab.center_subtile());
    thing.data = ThingData::TrapOrDoor { armed: true };
    if game.things.create(thing).is_none() {
        // Refund; the pool rejected the thing
        game.dungeon_mut(player).credit_gold(cost);
        return ActionResult::Fail;
    }
    if is_door {
        game.grid.set_slab(slab, SlabKind::Door, player);
    }
    ActionResult::Ok
}

fn place_room_slab(
    game: &mut Game,
    player: PlayerId,
    kind: RoomKind,
    slab: SlabPos,
) -> ActionResult {
    if game.grid.slab_kind_at(slab) != SlabKind::Claimed || game.grid.owner_at(slab) != player {
        return ActionResult::Fail;
    }
    let cost = game.rules.room_slab_cost as i64;
    if !game.dungeon_mut(player).spend_gold(cost) {
        return ActionResult::NoGold;
    }
    // Extend an adjacent room of the same kind when one touches this slab
    let adjacent = crate::core::types::SMALL_AROUND
        .iter()
        .map(|(dx, dy)| SlabPos::new(slab.x + dx, slab.y + dy))
        .find_map(|p| {
            game.rooms
                .room_at(p)
                .filter(|r| r.kind == kind && r.owner == player)
                .map(|r| r.index)
        });
    match adjacent {
        Some(room_idx) => {
            game.grid.set_slab(slab, SlabKind::RoomFloor, player);
            if let Some(room) = game.rooms.get_mut(room_idx) {
                room.slabs.push(slab);
            }
        }
        None => {
            game.rooms.add_room(&mut game.grid, kind, player, vec![slab]);
        }
    }
    ActionResult::Ok
}

fn sell_trap_or_door(
    game: &mut Game,
    player: PlayerId,
    slab: SlabPos,
    is_door: bool,
) -> ActionResult {
    let class = if is_door {
        ThingClass::Door
    } else {
        ThingClass::Trap
    };
    let found = game
        .things
        .find_at(class, slab.center_subtile(), |t| t.owner == player);
    let Some(idx) = found else {
        return ActionResult::InvalidTarget;
    };
    let model = game.things.get(idx).map(|t| t.model).unwrap_or(0);
    let value = game
        .rules
        .trap_door(model, is_door)
        .map(|s| s.sell_value as i64)
        .unwrap_or(0);
    game.things.delete(idx);
    if is_door {
        game.grid.set_slab(slab, SlabKind::Claimed, player);
    }
    game.dungeon_mut(player).credit_gold(value);
    ActionResult::Ok
}

fn pickup_creature(game: &mut Game, player: PlayerId, target: ThingIndex) -> ActionResult {
    if game.dungeon(player).hand.len() >= HAND_MAX {
        return ActionResult::Fail;
    }
    let Some(thing) = game.things.get(target) else {
        return ActionResult::InvalidTarget;
    };
    if thing.class != ThingClass::Creature || thing.owner != player {
        return ActionResult::InvalidTarget;
    }
    let Some(ctrl) = game.things.get_mut(target).and_then(|t| t.control_mut()) else {
        return ActionResult::InvalidTarget;
    };
    if ctrl.picked_up {
        return ActionResult::Fail;
    }
    ctrl.picked_up = true;
    ctrl.clear_combat();
    game.dungeon_mut(player).hand.push(target);
    ActionResult::Ok
}

fn drop_creature(
    game: &mut Game,
    player: PlayerId,
    target: ThingIndex,
    pos: SubtilePos,
) -> ActionResult {
    let hand = &mut game.dungeon_mut(player).hand;
    let Some(held_at) = hand.iter().position(|&t| t == target) else {
        return ActionResult::Fail;
    };
    // Only own claimed/open ground accepts a drop
    let slab_kind = game.grid.slab_kind_at(pos.slab());
    if !slab_kind.is_passable() {
        return ActionResult::Fail;
    }
    game.dungeon_mut(player).hand.remove(held_at);
    if let Some(thing) = game.things.get_mut(target) {
        thing.pos = pos;
        if let Some(ctrl) = thing.control_mut() {
            ctrl.picked_up = false;
        }
    }
    states::set_start_state(game, target);
    ActionResult::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_queue_delay_dedup() {
        let mut q = MessageQueue::new();
        q.output(10, MessageId::NoGoldToScavenge, 50);
        q.output(30, MessageId::NoGoldToScavenge, 50);
        assert_eq!(q.emitted().len(), 1);
        q.output(70, MessageId::NoGoldToScavenge, 50);
        assert_eq!(q.emitted().len(), 2);
        q.output(71, MessageId::MinionScavenged, 50);
        assert_eq!(q.emitted().len(), 3);
    }

    #[test]
    fn test_power_cost_scales_with_level() {
        assert!(power_cost(MagicPower::Heal, 4) > power_cost(MagicPower::Heal, 0));
    }
}
