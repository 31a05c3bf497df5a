//! Computer reactions to world events
//!
//! Reactive entries scan last turn's world event log for matching entries
//! and dispatch tasks. Periodic entries run a self-test on an interval;
//! only the test timestamp is updated and the returned value is ignored.
//! Game balance depends on the periodic returns staying unwired.

use crate::actions::{MagicPower, HAND_MAX};
use crate::computer::process::count_player_creatures;
use crate::computer::tasks::{self, TaskKind};
use crate::computer::Computer;
use crate::core::types::{GameTurn, SubtilePos, ThingIndex};
use crate::events::{WorldEvent, WorldEventKind};
use crate::game::Game;
use crate::map::RoomKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputerEventKind {
    /// Own creatures under attack: reinforce the battle
    Battle,
    /// An enemy door was spotted: raid it
    EnemyDoor,
    /// Payday came due: make sure wages are covered
    Payday,
    /// The dungeon heart took a hit: strike the attacker with magic
    AttackMagicFoe,
    /// Periodic fighter headcount
    CheckFighters,
    /// Periodic room inventory
    CheckRooms,
}

#[derive(Debug, Clone)]
pub struct ComputerEvent {
    pub name: &'static str,
    /// 0 reacts to the world event log; anything else is a periodic test
    pub cetype: u8,
    pub kind: ComputerEventKind,
    pub test_interval: GameTurn,
    pub last_test_gameturn: GameTurn,
    /// Kind-specific tuning: [spell level (-1 = derive), repeat count]
    pub params: [i32; 2],
}

impl ComputerEvent {
    pub fn reactive(name: &'static str, kind: ComputerEventKind, params: [i32; 2]) -> Self {
        Self {
            name,
            cetype: 0,
            kind,
            test_interval: 0,
            last_test_gameturn: 0,
            params,
        }
    }

    pub fn periodic(
        name: &'static str,
        kind: ComputerEventKind,
        cetype: u8,
        test_interval: GameTurn,
    ) -> Self {
        Self {
            name,
            cetype,
            kind,
            test_interval,
            last_test_gameturn: 0,
            params: [0, 0],
        }
    }
}

pub fn standard_events() -> Vec<ComputerEvent> {
    vec![
        ComputerEvent::reactive("event battle", ComputerEventKind::Battle, [0, 0]),
        ComputerEvent::reactive("event enemy door", ComputerEventKind::EnemyDoor, [0, 0]),
        ComputerEvent::reactive("event payday", ComputerEventKind::Payday, [0, 0]),
        ComputerEvent::reactive(
            "event attack magic foe",
            ComputerEventKind::AttackMagicFoe,
            [-1, 3],
        ),
        ComputerEvent::periodic("event check fighters", ComputerEventKind::CheckFighters, 1, 300),
        ComputerEvent::periodic("event check rooms", ComputerEventKind::CheckRooms, 2, 600),
    ]
}

fn world_kind_of(kind: ComputerEventKind) -> Option<WorldEventKind> {
    match kind {
        ComputerEventKind::Battle => Some(WorldEventKind::Battle),
        ComputerEventKind::EnemyDoor => Some(WorldEventKind::EnemyDoor),
        ComputerEventKind::Payday => Some(WorldEventKind::Payday),
        ComputerEventKind::AttackMagicFoe => Some(WorldEventKind::HeartAttacked),
        ComputerEventKind::CheckFighters | ComputerEventKind::CheckRooms => None,
    }
}

pub fn process_computer_events(game: &mut Game, comp: &mut Computer) {
    for i in 0..comp.events.len() {
        let ev = comp.events[i].clone();
        if ev.cetype == 0 {
            let Some(world_kind) = world_kind_of(ev.kind) else {
                continue;
            };
            let matching = game.events.matching(world_kind, comp.player);
            for event in matching {
                handle_event(game, comp, &ev, &event);
            }
        } else {
            let due =
                game.turn.saturating_sub(ev.last_test_gameturn) >= ev.test_interval;
            if !due {
                continue;
            }
            let _ = run_periodic_test(game, comp, ev.kind);
            comp.events[i].last_test_gameturn = game.turn;
        }
    }
}

fn handle_event(game: &mut Game, comp: &mut Computer, ev: &ComputerEvent, event: &WorldEvent) {
    match ev.kind {
        ComputerEventKind::Battle => event_battle(game, comp, event.pos),
        ComputerEventKind::EnemyDoor => event_enemy_door(game, comp, event.pos),
        ComputerEventKind::Payday => event_payday(game, comp),
        ComputerEventKind::AttackMagicFoe => {
            event_attack_magic_foe(game, comp, event.target, ev.params)
        }
        _ => {}
    }
}

fn has_task_matching<F>(game: &Game, comp: &Computer, pred: F) -> bool
where
    F: Fn(&TaskKind) -> bool,
{
    tasks::task_list(&game.tasks, comp.task_idx)
        .into_iter()
        .any(|idx| game.tasks.get(idx).map(|t| pred(&t.kind)).unwrap_or(false))
}

/// Reinforce a battle near `pos`: haul fighters in by hand when the hand
/// has room, otherwise rally everyone with a call to arms.
fn event_battle(game: &mut Game, comp: &mut Computer, pos: SubtilePos) {
    let player = comp.player;
    if count_player_creatures(game, player) < 2 {
        return;
    }
    if has_task_matching(game, comp, |k| {
        matches!(
            k,
            TaskKind::MoveCreaturesToDefend { .. } | TaskKind::MagicCallToArms { .. }
        )
    }) {
        return;
    }
    // A drop point must be open ground near the fight
    let drop = game
        .grid
        .spiral_search(pos.slab(), 4, |g, p| g.slab_kind_at(p).is_passable());
    let Some(drop) = drop else {
        return;
    };
    if game.dungeon(player).hand.len() < HAND_MAX {
        tasks::create_task(
            &mut game.tasks,
            &mut comp.task_idx,
            player,
            game.turn,
            TaskKind::MoveCreaturesToDefend {
                pos: drop.center_subtile(),
                creatures_left: 3,
                interval: 2,
                last_move_turn: 0,
                picked: ThingIndex::INVALID,
            },
        );
    } else {
        tasks::create_task(
            &mut game.tasks,
            &mut comp.task_idx,
            player,
            game.turn,
            TaskKind::MagicCallToArms {
                pos: drop.center_subtile(),
                duration: 200,
                cast_turn: 0,
            },
        );
    }
}

fn event_enemy_door(game: &mut Game, comp: &mut Computer, pos: SubtilePos) {
    if has_task_matching(game, comp, |k| matches!(k, TaskKind::PickupForAttack { .. })) {
        return;
    }
    let drop = game
        .grid
        .spiral_search(pos.slab(), 3, |g, p| g.slab_kind_at(p).is_passable());
    let Some(drop) = drop else {
        return;
    };
    tasks::create_task(
        &mut game.tasks,
        &mut comp.task_idx,
        comp.player,
        game.turn,
        TaskKind::PickupForAttack {
            pos: drop.center_subtile(),
            creatures_left: 2,
            picked: ThingIndex::INVALID,
        },
    );
}

/// Wages came due: when the coffers cannot cover another payday, wake the
/// dig-to-gold process immediately instead of waiting for its check.
fn event_payday(game: &mut Game, comp: &mut Computer) {
    let player = comp.player;
    let wage_bill: i64 = game
        .things
        .class_list(crate::things::ThingClass::Creature)
        .into_iter()
        .filter_map(|idx| game.things.get(idx))
        .filter(|t| t.owner == player)
        .filter_map(|t| game.rules.creature(t.model))
        .map(|c| c.pay as i64)
        .sum();
    if game.dungeon(player).total_money() >= wage_bill * 2 {
        return;
    }
    for proc in comp.processes.iter_mut() {
        if matches!(proc.kind, crate::computer::process::ProcessKind::DigToGold { .. }) {
            proc.complete = false;
            proc.suspend_until = 0;
        }
    }
}

/// Heart attacker gets a lightning volley. A negative configured spell
/// level falls back to the attacker's experience level; the repeat count
/// is taken from config untouched.
fn event_attack_magic_foe(
    game: &mut Game,
    comp: &mut Computer,
    attacker: ThingIndex,
    params: [i32; 2],
) {
    let Some(thing) = game.things.get(attacker) else {
        return;
    };
    if !game.players_are_enemies(comp.player, thing.owner) {
        return;
    }
    if has_task_matching(game, comp, |k| matches!(k, TaskKind::AttackMagic { .. })) {
        return;
    }
    let mut splevel = params[0];
    if splevel < 0 {
        splevel = thing.control().map(|c| c.explevel as i32).unwrap_or(0);
    }
    let repeat_num = params[1].max(1);
    tasks::create_task(
        &mut game.tasks,
        &mut comp.task_idx,
        comp.player,
        game.turn,
        TaskKind::AttackMagic {
            target: attacker,
            power: MagicPower::Lightning,
            splevel: splevel.clamp(0, crate::core::types::SPELL_MAX_LEVEL as i32) as u8,
            repeat_num,
        },
    );
}

fn run_periodic_test(game: &Game, comp: &Computer, kind: ComputerEventKind) -> i32 {
    match kind {
        ComputerEventKind::CheckFighters => {
            if count_player_creatures(game, comp.player) < 4 {
                1
            } else {
                0
            }
        }
        ComputerEventKind::CheckRooms => {
            let missing = [RoomKind::Treasure, RoomKind::Lair, RoomKind::Hatchery]
                .iter()
                .filter(|&&k| game.rooms.find_room_of_kind(comp.player, k).is_none())
                .count();
            missing as i32
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::standard_rules;
    use crate::core::types::{PlayerId, SlabPos};
    use crate::creature::spawn_creature;
    use crate::map::SlabKind;

    fn open_game() -> (Game, Computer) {
        let mut g = Game::new(20, 20, standard_rules(), 13);
        for x in 0..20 {
            for y in 0..20 {
                g.grid
                    .set_slab(SlabPos::new(x, y), SlabKind::Path, PlayerId(4));
            }
        }
        let mut comp = Computer::new_for_test(PlayerId(0));
        comp.events = standard_events();
        (g, comp)
    }

    #[test]
    fn test_battle_event_prefers_hand_drop() {
        let (mut g, mut comp) = open_game();
        for i in 0..3 {
            spawn_creature(&mut g, 3, PlayerId(0), SubtilePos::new(4 + i, 4)).unwrap();
        }
        g.events.push(WorldEvent {
            kind: WorldEventKind::Battle,
            owner: PlayerId(0),
            pos: SubtilePos::new(30, 30),
            target: ThingIndex::INVALID,
        });
        process_computer_events(&mut g, &mut comp);
        assert!(has_task_matching(&g, &comp, |k| matches!(
            k,
            TaskKind::MoveCreaturesToDefend { .. }
        )));
        assert!(!has_task_matching(&g, &comp, |k| matches!(
            k,
            TaskKind::MagicCallToArms { .. }
        )));
    }

    #[test]
    fn test_battle_event_full_hand_falls_back_to_rally() {
        let (mut g, mut comp) = open_game();
        for i in 0..3 {
            spawn_creature(&mut g, 3, PlayerId(0), SubtilePos::new(4 + i, 4)).unwrap();
        }
        g.dungeons[0].hand = vec![ThingIndex(9); HAND_MAX];
        g.events.push(WorldEvent {
            kind: WorldEventKind::Battle,
            owner: PlayerId(0),
            pos: SubtilePos::new(30, 30),
            target: ThingIndex::INVALID,
        });
        process_computer_events(&mut g, &mut comp);
        assert!(has_task_matching(&g, &comp, |k| matches!(
            k,
            TaskKind::MagicCallToArms { .. }
        )));
    }

    #[test]
    fn test_attack_magic_foe_level_fallback() {
        let (mut g, mut comp) = open_game();
        let foe = spawn_creature(&mut g, 5, PlayerId(1), SubtilePos::new(30, 30)).unwrap();
        g.things
            .get_mut(foe)
            .unwrap()
            .control_mut()
            .unwrap()
            .explevel = 4;
        g.events.push(WorldEvent {
            kind: WorldEventKind::HeartAttacked,
            owner: PlayerId(0),
            pos: SubtilePos::new(30, 30),
            target: foe,
        });
        process_computer_events(&mut g, &mut comp);
        let list = tasks::task_list(&g.tasks, comp.task_idx);
        assert_eq!(list.len(), 1);
        let TaskKind::AttackMagic {
            splevel,
            repeat_num,
            target,
            ..
        } = g.tasks.get(list[0]).unwrap().kind
        else {
            panic!("expected an attack-magic task");
        };
        // Config level -1 derives the level from the foe; the repeat
        // count comes from config untouched
        assert_eq!(splevel, 4);
        assert_eq!(repeat_num, 3);
        assert_eq!(target, foe);
    }

    #[test]
    fn test_periodic_test_only_stamps_timestamp() {
        let (mut g, mut comp) = open_game();
        // No fighters at all: the fighter test would report a shortage,
        // but periodic tests never act on their result
        g.turn = 1000;
        process_computer_events(&mut g, &mut comp);
        let fighters_ev = comp
            .events
            .iter()
            .find(|e| e.kind == ComputerEventKind::CheckFighters)
            .unwrap();
        assert_eq!(fighters_ev.last_test_gameturn, 1000);
        assert!(tasks::task_list(&g.tasks, comp.task_idx).is_empty());
    }

    #[test]
    fn test_reactive_ignores_other_players_events() {
        let (mut g, mut comp) = open_game();
        for i in 0..3 {
            spawn_creature(&mut g, 3, PlayerId(0), SubtilePos::new(4 + i, 4)).unwrap();
        }
        g.events.push(WorldEvent {
            kind: WorldEventKind::Battle,
            owner: PlayerId(1),
            pos: SubtilePos::new(30, 30),
            target: ThingIndex::INVALID,
        });
        process_computer_events(&mut g, &mut comp);
        assert!(tasks::task_list(&g.tasks, comp.task_idx).is_empty());
    }
}
