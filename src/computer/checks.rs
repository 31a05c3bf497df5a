//! Periodic computer checks
//!
//! Checks run on fixed turn intervals and patch up tactical situations the
//! long-horizon processes do not cover: emergency cash, claim raids, door
//! assaults, trap placement, room growth. Each check dispatches at most
//! one new task per firing.

use rand::Rng;

use crate::actions::GameAction;
use crate::computer::process::{self, ProcessKind};
use crate::computer::tasks::{self, TaskKind};
use crate::computer::Computer;
use crate::core::types::{
    GameTurn, PlayerId, SlabPos, ThingIndex, COMPUTER_TRAP_LOC_COUNT, SMALL_AROUND,
};
use crate::game::Game;
use crate::map::{RoomKind, SlabKind};
use crate::things::ThingClass;

/// Player slot conventionally held by the roaming hero faction
const HERO_PLAYER: PlayerId = PlayerId(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// Low-money emergency dig, bypassing process priorities
    DigToGold { money_below: i64 },
    /// Raise cash by selling traps and doors when nearly broke
    Money { money_below: i64, gold_target: i64 },
    /// Assault reachable enemy doors with dropped fighters
    DoorAttacks,
    /// Raid valuable unowned ground near enemy territory
    Claims,
    /// Arm stored trap locations
    PlaceTraps { trap_model: u16 },
    /// Re-enable room building when a room runs out of capacity
    ExpandRoom { kind: RoomKind, used_ratio_pct: i32 },
}

#[derive(Debug, Clone)]
pub struct ComputerCheck {
    pub name: &'static str,
    pub kind: CheckKind,
    pub turns_interval: GameTurn,
    pub last_run_turn: GameTurn,
    pub disabled: bool,
}

impl ComputerCheck {
    pub fn new(name: &'static str, kind: CheckKind, turns_interval: GameTurn) -> Self {
        Self {
            name,
            kind,
            turns_interval,
            last_run_turn: 0,
            disabled: false,
        }
    }
}

pub fn standard_checks() -> Vec<ComputerCheck> {
    vec![
        ComputerCheck::new(
            "check dig to gold",
            CheckKind::DigToGold { money_below: 500 },
            200,
        ),
        ComputerCheck::new(
            "check money",
            CheckKind::Money {
                money_below: 100,
                gold_target: 500,
            },
            300,
        ),
        ComputerCheck::new("check for door attacks", CheckKind::DoorAttacks, 400),
        ComputerCheck::new("check for claims", CheckKind::Claims, 250),
        ComputerCheck::new(
            "check for place traps",
            CheckKind::PlaceTraps { trap_model: 1 },
            350,
        ),
        ComputerCheck::new(
            "check expand treasure room",
            CheckKind::ExpandRoom {
                kind: RoomKind::Treasure,
                used_ratio_pct: 80,
            },
            500,
        ),
    ]
}

/// Run every check whose interval has elapsed.
pub fn process_checks(game: &mut Game, comp: &mut Computer) {
    for i in 0..comp.checks.len() {
        if comp.checks[i].disabled {
            continue;
        }
        // Strictly greater: checks sit out the whole interval, unlike the
        // periodic event tests which fire on the boundary turn
        let due = game.turn.saturating_sub(comp.checks[i].last_run_turn)
            > comp.checks[i].turns_interval;
        if !due {
            continue;
        }
        comp.checks[i].last_run_turn = game.turn;
        let kind = comp.checks[i].kind;
        run_check(game, comp, kind);
    }
}

fn run_check(game: &mut Game, comp: &mut Computer, kind: CheckKind) {
    match kind {
        CheckKind::DigToGold { money_below } => check_dig_to_gold(game, comp, money_below),
        CheckKind::Money {
            money_below,
            gold_target,
        } => check_money(game, comp, money_below, gold_target),
        CheckKind::DoorAttacks => check_for_door_attacks(game, comp),
        CheckKind::Claims => check_for_claims(game, comp),
        CheckKind::PlaceTraps { trap_model } => check_for_place_traps(game, comp, trap_model),
        CheckKind::ExpandRoom {
            kind,
            used_ratio_pct,
        } => check_for_expand_room(game, comp, kind, used_ratio_pct),
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

fn check_dig_to_gold(game: &mut Game, comp: &mut Computer, money_below: i64) {
    let player = comp.player;
    if game.dungeon(player).total_money() >= money_below {
        return;
    }
    if game
        .rooms
        .find_room_of_kind(player, RoomKind::Treasure)
        .is_none()
    {
        return;
    }
    if has_task_matching(game, comp, |k| {
        matches!(k, TaskKind::DigToGold { .. } | TaskKind::WaitForBridge { .. })
    }) {
        return;
    }
    // Emergency path skips the dry run; digging something wrong beats
    // starving while simulating
    process::setup_dig_to_gold(game, comp, false);
}

fn check_money(game: &mut Game, comp: &mut Computer, money_below: i64, gold_target: i64) {
    let player = comp.player;
    if game.dungeon(player).total_money() >= money_below {
        return;
    }
    if has_task_matching(game, comp, |k| matches!(k, TaskKind::SellTrapsAndDoors { .. })) {
        return;
    }
    let owns_assets = game
        .things
        .class_list(ThingClass::Trap)
        .into_iter()
        .chain(game.things.class_list(ThingClass::Door))
        .any(|idx| game.things.get(idx).map(|t| t.owner == player).unwrap_or(false));
    if owns_assets {
        tasks::create_task(
            &mut game.tasks,
            &mut comp.task_idx,
            player,
            game.turn,
            TaskKind::SellTrapsAndDoors {
                gold_target,
                gained: 0,
            },
        );
        return;
    }
    // Nothing to sell: wake the dig-to-gold process instead
    for proc in comp.processes.iter_mut() {
        if matches!(proc.kind, ProcessKind::DigToGold { .. }) {
            proc.complete = false;
            proc.suspend_until = 0;
        }
    }
}

/// Distance from `slab` to the nearest enemy dungeon heart, if any.
fn distance_to_enemy_heart(game: &Game, player: PlayerId, slab: SlabPos) -> Option<i32> {
    (0..game.dungeons.len())
        .filter(|&p| game.players_are_enemies(player, PlayerId(p as u8)))
        .filter_map(|p| game.things.get(game.dungeons[p].heart_idx))
        .map(|heart| heart.pos.slab().chess_distance(&slab))
        .min()
}

/// Score a raid candidate. Higher is better; None disqualifies the slab.
fn score_raid_slab(
    game: &mut Game,
    player: PlayerId,
    slab: SlabPos,
    base_value: i32,
) -> Option<i32> {
    // Any unevaluated neighbor disqualifies the position outright
    for (dx, dy) in SMALL_AROUND {
        if !game.grid.in_bounds(SlabPos::new(slab.x + dx, slab.y + dy)) {
            return None;
        }
    }
    // A friendly fighter already on the spot means the raid is underway
    let occupied = game
        .things
        .find_at(ThingClass::Creature, slab.center_subtile(), |t| {
            t.owner == player
                && !game
                    .rules
                    .creature(t.model)
                    .map(|c| c.is_digger)
                    .unwrap_or(false)
        })
        .is_some();
    if occupied {
        return None;
    }
    let mut score = base_value;
    if let Some(dist) = distance_to_enemy_heart(game, player, slab) {
        score -= dist;
    }
    if game.grid.slab(slab).map(|s| s.trap_suspected).unwrap_or(false) {
        score /= 2;
    }
    if game.grid.owner_at(slab) == HERO_PLAYER {
        score /= 3;
    }
    score += game.rng.gen_range(0..8);
    Some(score)
}

fn dispatch_raid(game: &mut Game, comp: &mut Computer, slab: SlabPos, fighters: i32) {
    if has_task_matching(game, comp, |k| matches!(k, TaskKind::PickupForAttack { .. })) {
        return;
    }
    tasks::create_task(
        &mut game.tasks,
        &mut comp.task_idx,
        comp.player,
        game.turn,
        TaskKind::PickupForAttack {
            pos: slab.center_subtile(),
            creatures_left: fighters,
            picked: ThingIndex::INVALID,
        },
    );
}

fn check_for_door_attacks(game: &mut Game, comp: &mut Computer) {
    let player = comp.player;
    if process::count_player_creatures(game, player) < 3 {
        return;
    }
    let doors: Vec<SlabPos> = game
        .things
        .class_list(ThingClass::Door)
        .into_iter()
        .filter_map(|idx| game.things.get(idx))
        .filter(|t| game.players_are_enemies(player, t.owner))
        .map(|t| t.pos.slab())
        .collect();
    let mut best: Option<(i32, SlabPos)> = None;
    for door in doors {
        // Fighters drop onto open ground next to the door
        let drop = SMALL_AROUND
            .iter()
            .map(|(dx, dy)| SlabPos::new(door.x + dx, door.y + dy))
            .find(|&p| game.grid.slab_kind_at(p).is_passable());
        let Some(drop) = drop else {
            continue;
        };
        if let Some(score) = score_raid_slab(game, player, drop, 256) {
            if best.map(|(s, _)| score > s).unwrap_or(true) {
                best = Some((score, drop));
            }
        }
    }
    if let Some((_, slab)) = best {
        dispatch_raid(game, comp, slab, 2);
    }
}

fn check_for_claims(game: &mut Game, comp: &mut Computer) {
    let player = comp.player;
    if process::count_player_creatures(game, player) < 2 {
        return;
    }
    let mut best: Option<(i32, SlabPos)> = None;
    for x in 0..game.grid.width() {
        for y in 0..game.grid.height() {
            let slab = SlabPos::new(x, y);
            let kind = game.grid.slab_kind_at(slab);
            let owner = game.grid.owner_at(slab);
            let claimable = match kind {
                SlabKind::Path => true,
                SlabKind::Claimed => game.players_are_enemies(player, owner),
                _ => false,
            };
            if !claimable {
                continue;
            }
            if let Some(score) = score_raid_slab(game, player, slab, 128) {
                if best.map(|(s, _)| score > s).unwrap_or(true) {
                    best = Some((score, slab));
                }
            }
        }
    }
    if let Some((_, slab)) = best {
        dispatch_raid(game, comp, slab, 1);
    }
}

fn check_for_place_traps(game: &mut Game, comp: &mut Computer, trap_model: u16) {
    let player = comp.player;
    if comp.trap_locations.is_empty() {
        refill_trap_locations(game, comp);
    }
    let Some(&slab) = comp.trap_locations.last() else {
        return;
    };
    let result = crate::computer::try_game_action(
        game,
        comp,
        GameAction::PlaceTrap {
            model: trap_model,
            slab,
        },
    );
    match result {
        crate::actions::ActionResult::Ok => {
            comp.trap_locations.pop();
            tracing::debug!("player {:?} placed trap at {:?}", player, slab);
        }
        crate::actions::ActionResult::NoGold => {}
        // Location no longer valid: discard it
        _ => {
            comp.trap_locations.pop();
        }
    }
}

/// Own claimed slabs bordering unowned ground make good trap spots.
fn refill_trap_locations(game: &Game, comp: &mut Computer) {
    let player = comp.player;
    'outer: for x in 0..game.grid.width() {
        for y in 0..game.grid.height() {
            if comp.trap_locations.len() >= COMPUTER_TRAP_LOC_COUNT {
                break 'outer;
            }
            let slab = SlabPos::new(x, y);
            if game.grid.slab_kind_at(slab) != SlabKind::Claimed
                || game.grid.owner_at(slab) != player
            {
                continue;
            }
            let borders_open = SMALL_AROUND.iter().any(|(dx, dy)| {
                let n = SlabPos::new(slab.x + dx, slab.y + dy);
                game.grid.slab_kind_at(n) == SlabKind::Path
            });
            if borders_open && !comp.trap_locations.contains(&slab) {
                comp.trap_locations.push(slab);
            }
        }
    }
}

fn check_for_expand_room(
    game: &mut Game,
    comp: &mut Computer,
    kind: RoomKind,
    used_ratio_pct: i32,
) {
    let player = comp.player;
    let Some(room) = game.rooms.find_room_of_kind(player, kind) else {
        return;
    };
    let capacity = room.total_capacity().max(1);
    if room.used_capacity * 100 / capacity < used_ratio_pct {
        return;
    }
    // Room is nearly full: let the build process add more slabs
    for proc in comp.processes.iter_mut() {
        if let ProcessKind::BuildRoom {
            kind: pk,
            min_slabs,
            ..
        } = &mut proc.kind
        {
            if *pk == kind {
                *min_slabs = game.rooms.slab_count(player, kind) + 4;
                proc.complete = false;
                proc.suspend_until = 0;
                tracing::debug!("player {:?} expanding {:?}", player, kind);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::standard_rules;
    use crate::core::types::SubtilePos;
    use crate::creature::spawn_creature;
    use crate::things::{Thing, ThingData};

    fn game_with_computer() -> (Game, Computer) {
        let game = Game::new(20, 20, standard_rules(), 7);
        let mut comp = Computer::new_for_test(PlayerId(0));
        comp.checks = standard_checks();
        comp.processes = process::standard_processes();
        (game, comp)
    }

    #[test]
    fn test_interval_gating() {
        let (mut game, mut comp) = game_with_computer();
        comp.checks[0].last_run_turn = 0;
        game.turn = 50;
        process_checks(&mut game, &mut comp);
        // Interval 200 not elapsed: stamp untouched
        assert_eq!(comp.checks[0].last_run_turn, 0);
        // The boundary turn itself is not due
        game.turn = 200;
        process_checks(&mut game, &mut comp);
        assert_eq!(comp.checks[0].last_run_turn, 0);
        game.turn = 201;
        process_checks(&mut game, &mut comp);
        assert_eq!(comp.checks[0].last_run_turn, 201);
    }

    #[test]
    fn test_check_money_creates_sell_task() {
        let (mut game, mut comp) = game_with_computer();
        // Broke player with one trap on claimed ground
        game.grid
            .set_slab(SlabPos::new(5, 5), SlabKind::Claimed, PlayerId(0));
        let mut trap = Thing::new(
            ThingClass::Trap,
            1,
            PlayerId(0),
            SlabPos::new(5, 5).center_subtile(),
        );
        trap.data = ThingData::TrapOrDoor { armed: true };
        game.things.create(trap);
        check_money(&mut game, &mut comp, 100, 500);
        assert!(has_task_matching(&game, &comp, |k| matches!(
            k,
            TaskKind::SellTrapsAndDoors { .. }
        )));
    }

    #[test]
    fn test_check_money_rich_player_does_nothing() {
        let (mut game, mut comp) = game_with_computer();
        game.dungeons[0].total_money_owned = 10_000;
        check_money(&mut game, &mut comp, 100, 500);
        assert!(tasks::task_list(&game.tasks, comp.task_idx).is_empty());
    }

    #[test]
    fn test_door_attack_dispatches_single_raid() {
        let (mut game, mut comp) = game_with_computer();
        for i in 0..3 {
            spawn_creature(&mut game, 3, PlayerId(0), SubtilePos::new(4 + i, 4)).unwrap();
        }
        // Two enemy doors; open ground around them
        for x in 0..20 {
            for y in 0..20 {
                game.grid
                    .set_slab(SlabPos::new(x, y), SlabKind::Path, PlayerId(4));
            }
        }
        for door_x in [10, 14] {
            game.grid
                .set_slab(SlabPos::new(door_x, 10), SlabKind::Door, PlayerId(1));
            let mut door = Thing::new(
                ThingClass::Door,
                1,
                PlayerId(1),
                SlabPos::new(door_x, 10).center_subtile(),
            );
            door.data = ThingData::TrapOrDoor { armed: true };
            game.things.create(door);
        }
        check_for_door_attacks(&mut game, &mut comp);
        let raids: Vec<_> = tasks::task_list(&game.tasks, comp.task_idx)
            .into_iter()
            .filter(|&i| {
                matches!(
                    game.tasks.get(i).unwrap().kind,
                    TaskKind::PickupForAttack { .. }
                )
            })
            .collect();
        assert_eq!(raids.len(), 1);
    }

    #[test]
    fn test_trap_suspected_halves_score() {
        let (mut game, _comp) = game_with_computer();
        for x in 0..20 {
            for y in 0..20 {
                game.grid
                    .set_slab(SlabPos::new(x, y), SlabKind::Path, PlayerId(4));
            }
        }
        let clean = SlabPos::new(5, 5);
        let sus = SlabPos::new(6, 5);
        game.grid.slab_mut(sus).unwrap().trap_suspected = true;
        // Average over jitter: suspected slab must score clearly lower
        let mut clean_total = 0;
        let mut sus_total = 0;
        for _ in 0..20 {
            clean_total += score_raid_slab(&mut game, PlayerId(0), clean, 200).unwrap();
            sus_total += score_raid_slab(&mut game, PlayerId(0), sus, 200).unwrap();
        }
        assert!(sus_total < clean_total);
    }

    #[test]
    fn test_map_edge_disqualified() {
        let (mut game, _comp) = game_with_computer();
        game.grid
            .set_slab(SlabPos::new(0, 5), SlabKind::Path, PlayerId(4));
        assert!(score_raid_slab(&mut game, PlayerId(0), SlabPos::new(0, 5), 200).is_none());
    }

    #[test]
    fn test_refill_trap_locations_bounded() {
        let (mut game, mut comp) = game_with_computer();
        for x in 0..20 {
            for y in 0..10 {
                game.grid
                    .set_slab(SlabPos::new(x, y), SlabKind::Claimed, PlayerId(0));
            }
            for y in 10..20 {
                game.grid
                    .set_slab(SlabPos::new(x, y), SlabKind::Path, PlayerId(4));
            }
        }
        refill_trap_locations(&game, &mut comp);
        assert!(!comp.trap_locations.is_empty());
        assert!(comp.trap_locations.len() <= COMPUTER_TRAP_LOC_COUNT);
    }
}
