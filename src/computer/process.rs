//! Long-horizon computer processes
//!
//! A process is a strategic goal (build a room, tunnel to gold, open a
//! route to an entrance) that the scheduler drives through a
//! check/setup/step lifecycle. At most one process per computer is in its
//! step phase at a time; everything else waits on priority.

use serde::{Deserialize, Serialize};

use crate::actions::GameAction;
use crate::computer::dig::{tool_dig_to_pos2, ComputerDig, DigResult};
use crate::computer::tasks::{self, TaskKind};
use crate::computer::Computer;
use crate::core::types::{GameTurn, PlayerId, SlabPos, SubtilePos};
use crate::game::Game;
use crate::map::{RoomKind, SlabKind};
use crate::things::ThingClass;

/// Check-phase verdict. Numeric codes 1/0/4 in the classic scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessCheck {
    /// Conditions met, run setup now (1)
    Go,
    /// Blocked on a transient condition, retry soon (0)
    Wait,
    /// Not applicable in the current situation, retry much later (4)
    Later,
}

/// Step-phase verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStep {
    Continue,
    Complete,
    /// Back off without completing; the process stays eligible
    Pause,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProcessKind {
    BuildRoom {
        kind: RoomKind,
        min_slabs: i32,
        max_slabs: i32,
        gold_needed: i64,
    },
    DigToGold {
        money_below: i64,
        simulate_first: bool,
    },
    DigToEntrance,
}

#[derive(Debug, Clone)]
pub struct ComputerProcess {
    pub name: &'static str,
    pub priority: i32,
    pub kind: ProcessKind,
    pub last_run_turn: GameTurn,
    pub suspend_until: GameTurn,
    pub complete: bool,
    pub started: bool,
    /// Build-room scratch: slabs still to be placed
    pub pending_slabs: Vec<SlabPos>,
}

impl ComputerProcess {
    pub fn new(name: &'static str, priority: i32, kind: ProcessKind) -> Self {
        Self {
            name,
            priority,
            kind,
            last_run_turn: 0,
            suspend_until: 0,
            complete: false,
            started: false,
            pending_slabs: Vec::new(),
        }
    }
}

/// Anchor position for base-relative searches: the dungeon heart when it
/// exists, else the center of the first owned room, else the map center.
pub fn player_base_pos(game: &Game, player: PlayerId) -> SubtilePos {
    if let Some(heart) = game.things.get(game.dungeon(player).heart_idx) {
        return heart.pos;
    }
    if let Some(slab) = game
        .rooms
        .iter()
        .find(|r| r.owner == player)
        .and_then(|r| r.center_slab())
    {
        return slab.center_subtile();
    }
    SlabPos::new(game.grid.width() / 2, game.grid.height() / 2).center_subtile()
}

fn has_task_matching<F>(game: &Game, comp: &Computer, pred: F) -> bool
where
    F: Fn(&TaskKind) -> bool,
{
    tasks::task_list(&game.tasks, comp.task_idx)
        .into_iter()
        .any(|idx| game.tasks.get(idx).map(|t| pred(&t.kind)).unwrap_or(false))
}

/// Highest-priority eligible process, if any.
pub fn find_best_process(comp: &Computer, turn: GameTurn) -> Option<usize> {
    comp.processes
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.complete && !p.started && p.suspend_until <= turn)
        .max_by_key(|(_, p)| p.priority)
        .map(|(i, _)| i)
}

pub fn process_check(game: &Game, comp: &Computer, idx: usize) -> ProcessCheck {
    let player = comp.player;
    match &comp.processes[idx].kind {
        ProcessKind::BuildRoom {
            kind,
            min_slabs,
            gold_needed,
            ..
        } => {
            if game.rooms.slab_count(player, *kind) >= *min_slabs {
                return ProcessCheck::Later;
            }
            if game.dungeon(player).total_money() < *gold_needed {
                return ProcessCheck::Wait;
            }
            ProcessCheck::Go
        }
        ProcessKind::DigToGold { money_below, .. } => {
            if game.dungeon(player).total_money() >= *money_below {
                return ProcessCheck::Later;
            }
            if game.rooms.find_room_of_kind(player, RoomKind::Treasure).is_none() {
                return ProcessCheck::Wait;
            }
            if has_task_matching(game, comp, |k| {
                matches!(k, TaskKind::DigToGold { .. } | TaskKind::WaitForBridge { .. })
            }) {
                return ProcessCheck::Wait;
            }
            let any_unclaimed = game
                .gold_lookups
                .iter()
                .any(|l| !l.player_interested[player.idx()] && l.num_gold_slabs > 0);
            if any_unclaimed {
                ProcessCheck::Go
            } else {
                ProcessCheck::Later
            }
        }
        ProcessKind::DigToEntrance => {
            if has_task_matching(game, comp, |k| matches!(k, TaskKind::DigToEntrance { .. })) {
                return ProcessCheck::Wait;
            }
            let neutral_entrance = game
                .rooms
                .iter()
                .any(|r| r.kind == RoomKind::Entrance && r.owner.is_neutral());
            if neutral_entrance {
                ProcessCheck::Go
            } else {
                ProcessCheck::Later
            }
        }
    }
}

/// Setup phase: allocate the concrete work. Returns false when the world
/// no longer supports the plan the check approved.
pub fn process_setup(game: &mut Game, comp: &mut Computer, idx: usize) -> bool {
    let player = comp.player;
    let base = player_base_pos(game, player);
    let kind = comp.processes[idx].kind.clone();
    match kind {
        ProcessKind::BuildRoom { max_slabs, min_slabs, .. } => {
            // Gather own claimed slabs radiating out from the base
            let mut chosen = Vec::new();
            let max_radius = game.grid.width().max(game.grid.height());
            let mut radius = 1;
            while (chosen.len() as i32) < max_slabs && radius <= max_radius {
                let found = game.grid.spiral_search(base.slab(), radius, |g, p| {
                    g.slab_kind_at(p) == SlabKind::Claimed
                        && g.owner_at(p) == player
                        && !chosen.contains(&p)
                });
                match found {
                    Some(p) => chosen.push(p),
                    None => radius += 1,
                }
            }
            if (chosen.len() as i32) < min_slabs {
                return false;
            }
            comp.processes[idx].pending_slabs = chosen;
            true
        }
        ProcessKind::DigToGold { simulate_first, .. } => {
            setup_dig_to_gold(game, comp, simulate_first)
        }
        ProcessKind::DigToEntrance => {
            let entrance = game
                .rooms
                .iter()
                .filter(|r| r.kind == RoomKind::Entrance && r.owner.is_neutral())
                .filter_map(|r| r.center_slab())
                .min_by_key(|s| s.chess_distance(&base.slab()));
            let Some(entrance) = entrance else {
                return false;
            };
            tasks::create_task(
                &mut game.tasks,
                &mut comp.task_idx,
                player,
                game.turn,
                TaskKind::DigToEntrance {
                    dig: ComputerDig::new(base, entrance.center_subtile()),
                },
            )
            .is_some()
        }
    }
}

/// Plan a tunnel to the nearest unclaimed gold deposit and spawn the dig
/// task. Shared by the dig-to-gold process and the low-money check.
pub fn setup_dig_to_gold(game: &mut Game, comp: &mut Computer, simulate_first: bool) -> bool {
    let player = comp.player;
    let base = player_base_pos(game, player);
    // Depleted records stay in the list but are never planned against
    let lookup = game
        .gold_lookups
        .iter()
        .enumerate()
        .filter(|(_, l)| !l.player_interested[player.idx()] && l.num_gold_slabs > 0)
        .min_by_key(|(_, l)| l.pos.chess_distance(&base.slab()));
    let Some((lookup_idx, lookup)) = lookup else {
        return false;
    };
    let dest = lookup.pos.center_subtile();
    if simulate_first {
        // Dry run under the same call cap; an unreachable deposit is
        // consumed so it is never planned again
        let mut probe = ComputerDig::new(base, dest);
        loop {
            match tool_dig_to_pos2(game, player, &mut probe, true) {
                DigResult::Progress => continue,
                DigResult::Arrived => break,
                _ => {
                    game.gold_lookups[lookup_idx].player_interested[player.idx()] = true;
                    return false;
                }
            }
        }
    }
    tasks::create_task(
        &mut game.tasks,
        &mut comp.task_idx,
        player,
        game.turn,
        TaskKind::DigToGold {
            dig: ComputerDig::new(base, dest),
            gold_lookup_idx: lookup_idx,
            dug_subtiles: 0,
        },
    )
    .is_some()
}

pub fn process_step(game: &mut Game, comp: &mut Computer, idx: usize) -> ProcessStep {
    let kind = comp.processes[idx].kind.clone();
    match kind {
        ProcessKind::BuildRoom { kind: room_kind, .. } => {
            let Some(&slab) = comp.processes[idx].pending_slabs.last() else {
                return ProcessStep::Complete;
            };
            let result = crate::computer::try_game_action(
                game,
                comp,
                GameAction::PlaceRoomSlab {
                    kind: room_kind,
                    slab,
                },
            );
            match result {
                crate::actions::ActionResult::Ok => {
                    comp.processes[idx].pending_slabs.pop();
                    if comp.processes[idx].pending_slabs.is_empty() {
                        ProcessStep::Complete
                    } else {
                        ProcessStep::Continue
                    }
                }
                crate::actions::ActionResult::NoGold => ProcessStep::Pause,
                crate::actions::ActionResult::Fail
                | crate::actions::ActionResult::InvalidTarget => {
                    // Slab was claimed by something else in the meantime
                    comp.processes[idx].pending_slabs.pop();
                    ProcessStep::Continue
                }
            }
        }
        ProcessKind::DigToGold { .. } => {
            if has_task_matching(game, comp, |k| {
                matches!(k, TaskKind::DigToGold { .. } | TaskKind::WaitForBridge { .. })
            }) {
                ProcessStep::Continue
            } else {
                ProcessStep::Complete
            }
        }
        ProcessKind::DigToEntrance => {
            if has_task_matching(game, comp, |k| matches!(k, TaskKind::DigToEntrance { .. })) {
                ProcessStep::Continue
            } else {
                ProcessStep::Complete
            }
        }
    }
}

/// The standard opening book: rooms first, gold when the coffers run dry,
/// an entrance route for creature inflow.
pub fn standard_processes() -> Vec<ComputerProcess> {
    vec![
        ComputerProcess::new(
            "build treasure room",
            90,
            ProcessKind::BuildRoom {
                kind: RoomKind::Treasure,
                min_slabs: 4,
                max_slabs: 9,
                gold_needed: 250,
            },
        ),
        ComputerProcess::new(
            "build lair",
            80,
            ProcessKind::BuildRoom {
                kind: RoomKind::Lair,
                min_slabs: 4,
                max_slabs: 9,
                gold_needed: 250,
            },
        ),
        ComputerProcess::new(
            "build hatchery",
            70,
            ProcessKind::BuildRoom {
                kind: RoomKind::Hatchery,
                min_slabs: 4,
                max_slabs: 9,
                gold_needed: 250,
            },
        ),
        ComputerProcess::new(
            "dig to gold",
            60,
            ProcessKind::DigToGold {
                money_below: 2000,
                simulate_first: true,
            },
        ),
        ComputerProcess::new("dig to entrance", 50, ProcessKind::DigToEntrance),
    ]
}

/// Count of this player's creatures, used by check gating.
pub fn count_player_creatures(game: &Game, player: PlayerId) -> i32 {
    game.things
        .class_list(ThingClass::Creature)
        .into_iter()
        .filter(|&idx| game.things.get(idx).map(|t| t.owner == player).unwrap_or(false))
        .count() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::standard_rules;

    #[test]
    fn test_find_best_process_honors_priority_and_flags() {
        let mut comp = Computer::new_for_test(PlayerId(0));
        comp.processes = standard_processes();
        assert_eq!(find_best_process(&comp, 10), Some(0));
        comp.processes[0].complete = true;
        assert_eq!(find_best_process(&comp, 10), Some(1));
        comp.processes[1].suspend_until = 100;
        assert_eq!(find_best_process(&comp, 10), Some(2));
        assert_eq!(find_best_process(&comp, 100), Some(1));
    }

    #[test]
    fn test_build_room_check_gates_on_gold() {
        let game = Game::new(20, 20, standard_rules(), 1);
        let mut comp = Computer::new_for_test(PlayerId(0));
        comp.processes = standard_processes();
        // Broke: treasure room build must wait
        assert_eq!(process_check(&game, &comp, 0), ProcessCheck::Wait);
    }

    #[test]
    fn test_build_room_check_go_with_gold() {
        let mut game = Game::new(20, 20, standard_rules(), 1);
        game.dungeons[0].total_money_owned = 1000;
        let mut comp = Computer::new_for_test(PlayerId(0));
        comp.processes = standard_processes();
        assert_eq!(process_check(&game, &comp, 0), ProcessCheck::Go);
    }

    #[test]
    fn test_build_room_already_built_is_later() {
        use crate::core::types::SlabPos;
        let mut game = Game::new(20, 20, standard_rules(), 1);
        game.dungeons[0].total_money_owned = 1000;
        game.rooms.add_room(
            &mut game.grid,
            RoomKind::Treasure,
            PlayerId(0),
            (0..4).map(|i| SlabPos::new(2 + i, 2)).collect(),
        );
        let mut comp = Computer::new_for_test(PlayerId(0));
        comp.processes = standard_processes();
        assert_eq!(process_check(&game, &comp, 0), ProcessCheck::Later);
    }

    #[test]
    fn test_dig_to_gold_setup_creates_task() {
        use crate::core::types::SlabPos;
        let mut game = Game::new(30, 30, standard_rules(), 1);
        for x in 0..30 {
            for y in 0..30 {
                game.grid
                    .set_slab(SlabPos::new(x, y), SlabKind::Earth, PlayerId(4));
            }
        }
        game.rooms.add_room(
            &mut game.grid,
            RoomKind::Treasure,
            PlayerId(0),
            vec![SlabPos::new(5, 5)],
        );
        game.register_gold_lookup(SlabPos::new(20, 20), 6);
        let mut comp = Computer::new_for_test(PlayerId(0));
        comp.processes = standard_processes();
        assert_eq!(process_check(&game, &comp, 3), ProcessCheck::Go);
        assert!(process_setup(&mut game, &mut comp, 3));
        let list = tasks::task_list(&game.tasks, comp.task_idx);
        assert_eq!(list.len(), 1);
        assert!(matches!(
            game.tasks.get(list[0]).unwrap().kind,
            TaskKind::DigToGold { .. }
        ));
        // While the task lives, the check must not start a second dig
        assert_eq!(process_check(&game, &comp, 3), ProcessCheck::Wait);
        assert_eq!(process_step(&mut game, &mut comp, 3), ProcessStep::Continue);
    }

    #[test]
    fn test_dig_to_gold_skips_depleted_lookups() {
        use crate::core::types::SlabPos;
        let mut game = Game::new(30, 30, standard_rules(), 1);
        for x in 0..30 {
            for y in 0..30 {
                game.grid
                    .set_slab(SlabPos::new(x, y), SlabKind::Earth, PlayerId(4));
            }
        }
        game.rooms.add_room(
            &mut game.grid,
            RoomKind::Treasure,
            PlayerId(0),
            vec![SlabPos::new(5, 5)],
        );
        // The nearer deposit is mined out; the farther one must win
        game.register_gold_lookup(SlabPos::new(8, 8), 0);
        game.register_gold_lookup(SlabPos::new(20, 20), 6);
        let mut comp = Computer::new_for_test(PlayerId(0));
        assert!(setup_dig_to_gold(&mut game, &mut comp, false));
        let list = tasks::task_list(&game.tasks, comp.task_idx);
        assert_eq!(list.len(), 1);
        match &game.tasks.get(list[0]).unwrap().kind {
            TaskKind::DigToGold { gold_lookup_idx, .. } => assert_eq!(*gold_lookup_idx, 1),
            other => panic!("expected a dig task, got {:?}", other),
        }
        // A list of only depleted records never produces a plan
        game.gold_lookups[1].num_gold_slabs = 0;
        let mut comp2 = Computer::new_for_test(PlayerId(1));
        assert!(!setup_dig_to_gold(&mut game, &mut comp2, false));
    }

    #[test]
    fn test_dig_to_gold_simulation_consumes_unreachable() {
        use crate::core::types::SlabPos;
        let mut game = Game::new(30, 30, standard_rules(), 1);
        // All rock: nothing is diggable, the deposit is unreachable
        for x in 0..30 {
            for y in 0..30 {
                game.grid
                    .set_slab(SlabPos::new(x, y), SlabKind::Rock, PlayerId(4));
            }
        }
        game.rooms.add_room(
            &mut game.grid,
            RoomKind::Treasure,
            PlayerId(0),
            vec![SlabPos::new(5, 5)],
        );
        game.register_gold_lookup(SlabPos::new(25, 25), 6);
        let mut comp = Computer::new_for_test(PlayerId(0));
        comp.processes = standard_processes();
        assert!(!process_setup(&mut game, &mut comp, 3));
        assert!(game.gold_lookups[0].player_interested[0]);
        assert!(tasks::task_list(&game.tasks, comp.task_idx).is_empty());
    }
}
