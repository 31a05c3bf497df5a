//! Computer task pool and per-kind task stepping
//!
//! Tasks are long-running jobs (tunnel to gold, haul creatures to a room,
//! sell assets for cash) stored in a fixed global pool and threaded onto a
//! per-player singly linked list. Every task does a bounded unit of work
//! per scheduled pass; world mutation goes through `try_game_action`, so
//! the per-turn action budget applies uniformly.

use serde::{Deserialize, Serialize};

use crate::actions::{GameAction, MagicPower};
use crate::computer::dig::{tool_dig_to_pos2, ComputerDig, DigResult};
use crate::computer::Computer;
use crate::core::types::{
    GameTurn, PlayerId, RoomIndex, SubtilePos, TaskIndex, ThingIndex, COMPUTER_TASKS_COUNT,
};
use crate::events::{WorldEvent, WorldEventKind};
use crate::game::Game;
use crate::things::ThingClass;

/// Turns a wait-for-bridge task lingers before giving up
const BRIDGE_WAIT_TIMEOUT: GameTurn = 2000;

/// Task payloads. One variant per job; all resumable state lives inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskKind {
    DigToGold {
        dig: ComputerDig,
        gold_lookup_idx: usize,
        dug_subtiles: i32,
    },
    DigToEntrance {
        dig: ComputerDig,
    },
    MoveCreatureToRoom {
        room: RoomIndex,
        creatures_left: i32,
        picked: ThingIndex,
    },
    MoveCreaturesToDefend {
        pos: SubtilePos,
        creatures_left: i32,
        interval: GameTurn,
        last_move_turn: GameTurn,
        picked: ThingIndex,
    },
    SellTrapsAndDoors {
        gold_target: i64,
        gained: i64,
    },
    AttackMagic {
        target: ThingIndex,
        power: MagicPower,
        splevel: u8,
        repeat_num: i32,
    },
    WaitForBridge {
        pos: SubtilePos,
        gold_lookup_idx: usize,
    },
    MagicCallToArms {
        pos: SubtilePos,
        duration: GameTurn,
        cast_turn: GameTurn,
    },
    PickupForAttack {
        pos: SubtilePos,
        creatures_left: i32,
        picked: ThingIndex,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputerTask {
    pub active: bool,
    pub player: PlayerId,
    pub next_task: TaskIndex,
    pub created_turn: GameTurn,
    pub kind: TaskKind,
}

/// Fixed-capacity task arena shared by all computer players.
/// Slot 0 is reserved so `TaskIndex(0)` stays an invalid sentinel.
#[derive(Debug, Default)]
pub struct TaskPool {
    slots: Vec<Option<ComputerTask>>,
}

impl TaskPool {
    pub fn new() -> Self {
        Self {
            slots: vec![None; COMPUTER_TASKS_COUNT],
        }
    }

    pub fn get(&self, idx: TaskIndex) -> Option<&ComputerTask> {
        self.slots
            .get(idx.idx())
            .and_then(|s| s.as_ref())
            .filter(|t| t.active)
    }

    pub fn get_mut(&mut self, idx: TaskIndex) -> Option<&mut ComputerTask> {
        self.slots
            .get_mut(idx.idx())
            .and_then(|s| s.as_mut())
            .filter(|t| t.active)
    }

    fn alloc(&mut self, task: ComputerTask) -> Option<TaskIndex> {
        // Slot 0 is never handed out
        for i in 1..self.slots.len() {
            let free = match &self.slots[i] {
                None => true,
                Some(t) => !t.active,
            };
            if free {
                self.slots[i] = Some(task);
                return Some(TaskIndex(i as u16));
            }
        }
        tracing::warn!("task pool exhausted");
        None
    }
}

/// Allocate a task and link it at the head of the player's list.
pub fn create_task(
    pool: &mut TaskPool,
    head: &mut TaskIndex,
    player: PlayerId,
    turn: GameTurn,
    kind: TaskKind,
) -> Option<TaskIndex> {
    let idx = pool.alloc(ComputerTask {
        active: true,
        player,
        next_task: *head,
        created_turn: turn,
        kind,
    })?;
    *head = idx;
    Some(idx)
}

/// Unlink `idx` from the player's list and deactivate it.
///
/// Returns false (leaving the list untouched) when the task is not on the
/// list, so double-removal cannot corrupt the chain.
pub fn remove_task(pool: &mut TaskPool, head: &mut TaskIndex, idx: TaskIndex) -> bool {
    if !idx.is_valid() {
        return false;
    }
    let mut cur = *head;
    let mut prev = TaskIndex::INVALID;
    let mut steps = 0;
    while cur.is_valid() {
        if steps > COMPUTER_TASKS_COUNT {
            tracing::error!("infinite loop detected in task list");
            return false;
        }
        steps += 1;
        let next = match pool.get(cur) {
            Some(t) => t.next_task,
            None => break,
        };
        if cur == idx {
            if prev.is_valid() {
                if let Some(p) = pool.get_mut(prev) {
                    p.next_task = next;
                }
            } else {
                *head = next;
            }
            if let Some(t) = pool.get_mut(idx) {
                t.active = false;
                t.next_task = TaskIndex::INVALID;
            }
            return true;
        }
        prev = cur;
        cur = next;
    }
    false
}

/// Collect the player's task list front to back, with a capped sweep.
pub fn task_list(pool: &TaskPool, head: TaskIndex) -> Vec<TaskIndex> {
    let mut out = Vec::new();
    let mut cur = head;
    while cur.is_valid() {
        if out.len() > COMPUTER_TASKS_COUNT {
            tracing::error!("infinite loop detected in task list");
            break;
        }
        out.push(cur);
        cur = match pool.get(cur) {
            Some(t) => t.next_task,
            None => break,
        };
    }
    out
}

enum TaskControl {
    Keep,
    Remove,
}

/// One scheduled pass over the player's tasks.
pub fn process_tasks(game: &mut Game, comp: &mut Computer) {
    for idx in task_list(&game.tasks, comp.task_idx) {
        let Some(mut kind) = game.tasks.get(idx).map(|t| t.kind.clone()) else {
            continue;
        };
        let created = game.tasks.get(idx).map(|t| t.created_turn).unwrap_or(0);
        let control = step_task(game, comp, created, &mut kind);
        match control {
            TaskControl::Keep => {
                if let Some(t) = game.tasks.get_mut(idx) {
                    t.kind = kind;
                }
            }
            TaskControl::Remove => {
                remove_task(&mut game.tasks, &mut comp.task_idx, idx);
            }
        }
    }
}

fn step_task(
    game: &mut Game,
    comp: &mut Computer,
    created_turn: GameTurn,
    kind: &mut TaskKind,
) -> TaskControl {
    match kind {
        TaskKind::DigToGold {
            dig,
            gold_lookup_idx,
            dug_subtiles,
        } => task_dig_to_gold(game, comp, dig, *gold_lookup_idx, dug_subtiles),
        TaskKind::DigToEntrance { dig } => task_dig_to_entrance(game, comp, dig),
        TaskKind::MoveCreatureToRoom {
            room,
            creatures_left,
            picked,
        } => task_move_creature_to_room(game, comp, *room, creatures_left, picked),
        TaskKind::MoveCreaturesToDefend {
            pos,
            creatures_left,
            interval,
            last_move_turn,
            picked,
        } => task_move_creatures_to_defend(
            game,
            comp,
            *pos,
            creatures_left,
            *interval,
            last_move_turn,
            picked,
        ),
        TaskKind::SellTrapsAndDoors { gold_target, gained } => {
            task_sell_traps_and_doors(game, comp, *gold_target, gained)
        }
        TaskKind::AttackMagic {
            target,
            power,
            splevel,
            repeat_num,
        } => task_attack_magic(game, comp, *target, *power, *splevel, repeat_num),
        TaskKind::WaitForBridge {
            pos,
            gold_lookup_idx,
        } => task_wait_for_bridge(game, comp, created_turn, *pos, *gold_lookup_idx),
        TaskKind::MagicCallToArms {
            pos,
            duration,
            cast_turn,
        } => task_magic_call_to_arms(game, comp, *pos, *duration, cast_turn),
        TaskKind::PickupForAttack {
            pos,
            creatures_left,
            picked,
        } => task_pickup_for_attack(game, comp, *pos, creatures_left, picked),
    }
}

fn task_dig_to_gold(
    game: &mut Game,
    comp: &mut Computer,
    dig: &mut ComputerDig,
    gold_lookup_idx: usize,
    dug_subtiles: &mut i32,
) -> TaskControl {
    if comp.tasks_did <= 0 {
        return TaskControl::Keep;
    }
    let player = comp.player;
    let result = tool_dig_to_pos2(game, player, dig, false);
    match result {
        DigResult::Progress => {
            comp.tasks_did -= 1;
            *dug_subtiles += 1;
            // Periodic gold charge for the digging effort, paid regardless
            // of whether this stretch actually tags anything
            if *dug_subtiles % game.rules.dig_cost_subtiles == 0 {
                let cost = game.rules.dig_cost_gold as i64;
                game.dungeon_mut(player).spend_gold(cost);
            }
            TaskControl::Keep
        }
        DigResult::Arrived => {
            comp.tasks_did -= 1;
            if let Some(lookup) = game.gold_lookups.get_mut(gold_lookup_idx) {
                lookup.player_interested[player.idx()] = true;
                let pos = lookup.pos;
                game.grid.tag_for_digging(player, pos);
                game.events.push(WorldEvent {
                    kind: WorldEventKind::GoldDug,
                    owner: player,
                    pos: pos.center_subtile(),
                    target: ThingIndex::INVALID,
                });
            }
            tracing::debug!("player {:?} dig-to-gold arrived", player);
            TaskControl::Remove
        }
        DigResult::Blocked => {
            // Unreachable deposit: consume the claim so it is not retried
            if let Some(lookup) = game.gold_lookups.get_mut(gold_lookup_idx) {
                lookup.player_interested[player.idx()] = true;
            }
            tracing::debug!("player {:?} dig-to-gold blocked", player);
            TaskControl::Remove
        }
        DigResult::Liquid => {
            let pos = dig.pos_next;
            create_task(
                &mut game.tasks,
                &mut comp.task_idx,
                player,
                game.turn,
                TaskKind::WaitForBridge {
                    pos,
                    gold_lookup_idx,
                },
            );
            TaskControl::Remove
        }
    }
}

fn task_dig_to_entrance(
    game: &mut Game,
    comp: &mut Computer,
    dig: &mut ComputerDig,
) -> TaskControl {
    if comp.tasks_did <= 0 {
        return TaskControl::Keep;
    }
    let result = tool_dig_to_pos2(game, comp.player, dig, false);
    match result {
        DigResult::Progress => {
            comp.tasks_did -= 1;
            TaskControl::Keep
        }
        _ => TaskControl::Remove,
    }
}

/// An own creature fit to be carried around by the computer's hand
fn find_haulable_creature(game: &Game, player: PlayerId, fighter: bool) -> Option<ThingIndex> {
    let mut best: Option<(u8, ThingIndex)> = None;
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
        if fighter && is_digger {
            continue;
        }
        let Some(ctrl) = thing.control() else {
            continue;
        };
        if ctrl.picked_up || ctrl.unconscious || ctrl.combat_target.is_valid() {
            continue;
        }
        let level = ctrl.explevel;
        if best.map(|(l, _)| level > l).unwrap_or(true) {
            best = Some((level, idx));
        }
    }
    best.map(|(_, idx)| idx)
}

fn task_move_creature_to_room(
    game: &mut Game,
    comp: &mut Computer,
    room: RoomIndex,
    creatures_left: &mut i32,
    picked: &mut ThingIndex,
) -> TaskControl {
    let Some(drop_pos) = game
        .rooms
        .get(room)
        .filter(|r| r.owner == comp.player)
        .and_then(|r| r.center_slab())
        .map(|s| s.center_subtile())
    else {
        return TaskControl::Remove;
    };
    if picked.is_valid() {
        let result = crate::computer::try_game_action(
            game,
            comp,
            GameAction::DropCreature {
                target: *picked,
                pos: drop_pos,
            },
        );
        if result.is_ok() {
            *picked = ThingIndex::INVALID;
            *creatures_left -= 1;
            if *creatures_left <= 0 {
                return TaskControl::Remove;
            }
        }
        return TaskControl::Keep;
    }
    let Some(candidate) = find_haulable_creature(game, comp.player, false) else {
        return TaskControl::Remove;
    };
    let result = crate::computer::try_game_action(
        game,
        comp,
        GameAction::PickupCreature { target: candidate },
    );
    if result.is_ok() {
        *picked = candidate;
    }
    TaskControl::Keep
}

#[allow(clippy::too_many_arguments)]
fn task_move_creatures_to_defend(
    game: &mut Game,
    comp: &mut Computer,
    pos: SubtilePos,
    creatures_left: &mut i32,
    interval: GameTurn,
    last_move_turn: &mut GameTurn,
    picked: &mut ThingIndex,
) -> TaskControl {
    if picked.is_valid() {
        let result = crate::computer::try_game_action(
            game,
            comp,
            GameAction::DropCreature {
                target: *picked,
                pos,
            },
        );
        if result.is_ok() {
            *picked = ThingIndex::INVALID;
            *creatures_left -= 1;
            *last_move_turn = game.turn;
            if *creatures_left <= 0 {
                return TaskControl::Remove;
            }
        }
        return TaskControl::Keep;
    }
    if game.turn.saturating_sub(*last_move_turn) < interval {
        return TaskControl::Keep;
    }
    let Some(candidate) = find_haulable_creature(game, comp.player, true) else {
        return TaskControl::Remove;
    };
    let result = crate::computer::try_game_action(
        game,
        comp,
        GameAction::PickupCreature { target: candidate },
    );
    if result.is_ok() {
        *picked = candidate;
    }
    TaskControl::Keep
}

fn task_sell_traps_and_doors(
    game: &mut Game,
    comp: &mut Computer,
    gold_target: i64,
    gained: &mut i64,
) -> TaskControl {
    if *gained >= gold_target {
        return TaskControl::Remove;
    }
    let player = comp.player;
    let sellable = |class: ThingClass| {
        game.things
            .class_list(class)
            .into_iter()
            .find(|&idx| game.things.get(idx).map(|t| t.owner == player).unwrap_or(false))
            .and_then(|idx| game.things.get(idx).map(|t| (t.model, t.pos.slab())))
    };
    let (action, value) = if let Some((model, slab)) = sellable(ThingClass::Trap) {
        (
            GameAction::SellTrap { slab },
            game.rules
                .trap_door(model, false)
                .map(|s| s.sell_value as i64)
                .unwrap_or(0),
        )
    } else if let Some((model, slab)) = sellable(ThingClass::Door) {
        (
            GameAction::SellDoor { slab },
            game.rules
                .trap_door(model, true)
                .map(|s| s.sell_value as i64)
                .unwrap_or(0),
        )
    } else {
        return TaskControl::Remove;
    };
    if crate::computer::try_game_action(game, comp, action).is_ok() {
        *gained += value;
        if *gained >= gold_target {
            return TaskControl::Remove;
        }
    }
    TaskControl::Keep
}

fn task_attack_magic(
    game: &mut Game,
    comp: &mut Computer,
    target: ThingIndex,
    power: MagicPower,
    splevel: u8,
    repeat_num: &mut i32,
) -> TaskControl {
    if *repeat_num <= 0 || !game.things.exists(target) {
        return TaskControl::Remove;
    }
    let result = crate::computer::try_game_action(
        game,
        comp,
        GameAction::CastPowerOnThing {
            power,
            target,
            level: splevel,
        },
    );
    match result {
        crate::actions::ActionResult::Ok => {
            *repeat_num -= 1;
            if *repeat_num <= 0 {
                TaskControl::Remove
            } else {
                TaskControl::Keep
            }
        }
        crate::actions::ActionResult::NoGold => TaskControl::Remove,
        crate::actions::ActionResult::InvalidTarget => TaskControl::Remove,
        crate::actions::ActionResult::Fail => TaskControl::Keep,
    }
}

fn task_wait_for_bridge(
    game: &mut Game,
    comp: &mut Computer,
    created_turn: GameTurn,
    pos: SubtilePos,
    gold_lookup_idx: usize,
) -> TaskControl {
    if game.grid.slab_kind_at(pos.slab()).is_passable() {
        // Bridge is in: resume the dig from where it stalled
        let dest = game
            .gold_lookups
            .get(gold_lookup_idx)
            .map(|l| l.pos.center_subtile())
            .unwrap_or(pos);
        create_task(
            &mut game.tasks,
            &mut comp.task_idx,
            comp.player,
            game.turn,
            TaskKind::DigToGold {
                dig: ComputerDig::new(pos, dest),
                gold_lookup_idx,
                dug_subtiles: 0,
            },
        );
        return TaskControl::Remove;
    }
    if game.turn.saturating_sub(created_turn) > BRIDGE_WAIT_TIMEOUT {
        return TaskControl::Remove;
    }
    TaskControl::Keep
}

fn task_magic_call_to_arms(
    game: &mut Game,
    comp: &mut Computer,
    pos: SubtilePos,
    duration: GameTurn,
    cast_turn: &mut GameTurn,
) -> TaskControl {
    if *cast_turn == 0 {
        let result = crate::computer::try_game_action(
            game,
            comp,
            GameAction::CastPowerAtPos {
                power: MagicPower::CallToArms,
                pos,
                level: 0,
            },
        );
        match result {
            crate::actions::ActionResult::Ok => {
                *cast_turn = game.turn;
                TaskControl::Keep
            }
            crate::actions::ActionResult::NoGold => TaskControl::Remove,
            _ => TaskControl::Keep,
        }
    } else if game.turn.saturating_sub(*cast_turn) >= duration {
        TaskControl::Remove
    } else {
        TaskControl::Keep
    }
}

fn task_pickup_for_attack(
    game: &mut Game,
    comp: &mut Computer,
    pos: SubtilePos,
    creatures_left: &mut i32,
    picked: &mut ThingIndex,
) -> TaskControl {
    if picked.is_valid() {
        let result = crate::computer::try_game_action(
            game,
            comp,
            GameAction::DropCreature {
                target: *picked,
                pos,
            },
        );
        if result.is_ok() {
            *picked = ThingIndex::INVALID;
            *creatures_left -= 1;
            if *creatures_left <= 0 {
                return TaskControl::Remove;
            }
        }
        return TaskControl::Keep;
    }
    let Some(candidate) = find_haulable_creature(game, comp.player, true) else {
        return TaskControl::Remove;
    };
    let result = crate::computer::try_game_action(
        game,
        comp,
        GameAction::PickupCreature { target: candidate },
    );
    if result.is_ok() {
        *picked = candidate;
    }
    TaskControl::Keep
}
