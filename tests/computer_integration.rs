//! Integration tests for the computer player
//!
//! These tests drive full game turns and verify the complete AI pipeline:
//! - The scheduler picks, sets up, steps, and completes processes
//! - Dig-to-gold plans a tunnel that imps then excavate
//! - The per-turn action budget is never exceeded or overdrawn
//! - The shared task pool stays bounded and uncorrupted over long runs

use underkeep::computer::{process::ProcessKind, tasks, Computer};
use underkeep::core::config::standard_rules;
use underkeep::core::types::{PlayerId, SlabPos, COMPUTER_TASKS_COUNT};
use underkeep::creature::spawn_creature;
use underkeep::game::Game;
use underkeep::map::{RoomKind, SlabKind};
use underkeep::things::{Thing, ThingClass};

/// Earth map with a claimed starting area, heart, and treasure room for
/// player 0, plus a gold deposit some distance away.
fn dig_scenario(money: i64) -> Game {
    let neutral = PlayerId(4);
    let mut game = Game::new(30, 30, standard_rules(), 99);
    for dx in 0..4 {
        for dy in 0..4 {
            game.grid.set_slab(
                SlabPos::new(4 + dx, 4 + dy),
                SlabKind::Claimed,
                PlayerId(0),
            );
        }
    }
    game.rooms.add_room(
        &mut game.grid,
        RoomKind::Treasure,
        PlayerId(0),
        vec![SlabPos::new(4, 4)],
    );
    let mut heart = Thing::new(
        ThingClass::Object,
        0,
        PlayerId(0),
        SlabPos::new(6, 6).center_subtile(),
    );
    heart.health = 1000;
    let heart_idx = game.things.create(heart).unwrap();
    game.dungeons[0].heart_idx = heart_idx;
    game.dungeons[0].total_money_owned = money;

    for (dx, dy) in [(0, 0), (1, 0), (0, 1)] {
        game.grid.set_slab(
            SlabPos::new(20 + dx, 20 + dy),
            SlabKind::Gold,
            neutral,
        );
    }
    game.register_gold_lookup(SlabPos::new(20, 20), 3);
    game
}

#[test]
fn test_dig_to_gold_pipeline_reaches_the_vein() {
    let mut game = dig_scenario(1000);
    let mut comp = Computer::new(PlayerId(0));
    // Isolate the dig process so room builds do not compete for budget
    comp.processes
        .retain(|p| matches!(p.kind, ProcessKind::DigToGold { .. }));
    comp.checks.clear();
    comp.events.clear();
    game.computers[0] = Some(comp);

    // Two imps to do the digging
    for i in 0..2 {
        spawn_creature(
            &mut game,
            1,
            PlayerId(0),
            SlabPos::new(5 + i, 5).center_subtile(),
        )
        .unwrap();
    }

    for _ in 0..2000 {
        game.process_turn();
    }

    // The planner claimed the deposit and the imps opened the tunnel up to
    // and including the vein slab
    assert!(game.gold_lookups[0].player_interested[0]);
    assert_eq!(game.grid.slab_kind_at(SlabPos::new(20, 20)), SlabKind::Path);
    // Digging a vein drops a gold pile
    let piles = game
        .things
        .class_list(ThingClass::Object)
        .into_iter()
        .filter(|&idx| {
            matches!(
                game.things.get(idx).unwrap().data,
                underkeep::things::ThingData::GoldPile { .. }
            )
        })
        .count();
    let imp_carrying = game
        .things
        .class_list(ThingClass::Creature)
        .into_iter()
        .any(|idx| {
            game.things
                .get(idx)
                .and_then(|t| t.control())
                .map(|c| c.gold_carried > 0)
                .unwrap_or(false)
        });
    assert!(piles > 0 || imp_carrying, "dug gold must end up somewhere");
    // The dig task is finished and removed
    let comp = game.computers[0].as_ref().unwrap();
    assert!(tasks::task_list(&game.tasks, comp.task_idx).is_empty());
}

#[test]
fn test_action_budget_holds_over_long_run() {
    let mut game = dig_scenario(5000);
    game.computers[0] = Some(Computer::new(PlayerId(0)));
    for i in 0..2 {
        spawn_creature(
            &mut game,
            1,
            PlayerId(0),
            SlabPos::new(5 + i, 5).center_subtile(),
        )
        .unwrap();
    }
    for _ in 0..1500 {
        game.process_turn();
        let comp = game.computers[0].as_ref().unwrap();
        assert!(
            (0..=1).contains(&comp.tasks_did),
            "budget {} out of range at turn {}",
            comp.tasks_did,
            game.turn
        );
    }
}

#[test]
fn test_task_pool_stays_bounded_and_unique() {
    let mut game = dig_scenario(5000);
    game.computers[0] = Some(Computer::new(PlayerId(0)));
    for i in 0..2 {
        spawn_creature(
            &mut game,
            1,
            PlayerId(0),
            SlabPos::new(5 + i, 5).center_subtile(),
        )
        .unwrap();
    }
    for _ in 0..2000 {
        game.process_turn();
        let comp = game.computers[0].as_ref().unwrap();
        let list = tasks::task_list(&game.tasks, comp.task_idx);
        assert!(list.len() < COMPUTER_TASKS_COUNT);
        let mut seen = std::collections::HashSet::new();
        for idx in &list {
            assert!(seen.insert(*idx), "task list contains a cycle or duplicate");
        }
    }
}

#[test]
fn test_scheduler_builds_opening_rooms() {
    let mut game = Game::new(30, 30, standard_rules(), 7);
    // Generous claimed area and money: the opening book should build its
    // treasure room, lair, and hatchery unaided
    for x in 2..16 {
        for y in 2..16 {
            game.grid
                .set_slab(SlabPos::new(x, y), SlabKind::Claimed, PlayerId(0));
        }
    }
    game.dungeons[0].total_money_owned = 10_000;
    game.computers[0] = Some(Computer::new(PlayerId(0)));

    for _ in 0..300 {
        game.process_turn();
    }

    for kind in [RoomKind::Treasure, RoomKind::Lair, RoomKind::Hatchery] {
        assert!(
            game.rooms.find_room_of_kind(PlayerId(0), kind).is_some(),
            "opening book must build {:?}",
            kind
        );
    }
    // Room slabs were paid for
    assert!(game.dungeons[0].money_spent > 0);
}

#[test]
fn test_deterministic_replay_same_seed() {
    let run = |seed: u64| {
        let mut game = dig_scenario(2000);
        game.rng = {
            use rand::SeedableRng;
            rand_chacha::ChaCha8Rng::seed_from_u64(seed)
        };
        game.computers[0] = Some(Computer::new(PlayerId(0)));
        for i in 0..2 {
            spawn_creature(
                &mut game,
                1,
                PlayerId(0),
                SlabPos::new(5 + i, 5).center_subtile(),
            )
            .unwrap();
        }
        for _ in 0..600 {
            game.process_turn();
        }
        (
            game.dungeons[0].total_money(),
            game.dungeons[0].money_spent,
            game.things.class_list(ThingClass::Creature).len(),
            game.grid.slab_kind_at(SlabPos::new(20, 20)),
        )
    };
    assert_eq!(run(42), run(42));
}
