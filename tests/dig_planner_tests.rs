//! Property tests for the incremental tunnel planner
//!
//! The planner must terminate within its call cap on every map it is
//! handed, never tag anything in simulation mode, and never tag a slab
//! that cannot be dug.

use proptest::prelude::*;

use underkeep::computer::dig::{tool_dig_to_pos2, ComputerDig, DigResult};
use underkeep::core::config::standard_rules;
use underkeep::core::types::{PlayerId, SlabPos, SubtilePos, DIG_CALLS_MAX};
use underkeep::game::Game;
use underkeep::map::SlabKind;

const MAP: i32 = 28;

/// Earth map with rock stripes broken by gaps, so paths exist but are not
/// straight lines.
fn striped_game(seed: u64, gap: i32) -> Game {
    let neutral = PlayerId(4);
    let mut game = Game::new(MAP, MAP, standard_rules(), seed);
    for x in 0..MAP {
        for y in 0..MAP {
            game.grid.set_slab(SlabPos::new(x, y), SlabKind::Earth, neutral);
        }
    }
    for y in (4..MAP - 4).step_by(5) {
        for x in 0..MAP {
            if x % (gap + 3) != 0 {
                game.grid.set_slab(SlabPos::new(x, y), SlabKind::Rock, neutral);
            }
        }
    }
    game
}

proptest! {
    #[test]
    fn planner_always_terminates_within_cap(
        sx in 1..MAP - 1, sy in 1..MAP - 1,
        dx in 1..MAP - 1, dy in 1..MAP - 1,
        seed in 0..500u64,
        gap in 1..4i32,
    ) {
        let mut game = striped_game(seed, gap);
        let mut dig = ComputerDig::new(
            SubtilePos::new(sx * 3 + 1, sy * 3 + 1),
            SubtilePos::new(dx * 3 + 1, dy * 3 + 1),
        );
        let mut calls = 0u32;
        loop {
            let result = tool_dig_to_pos2(&mut game, PlayerId(0), &mut dig, false);
            calls += 1;
            prop_assert!(calls <= DIG_CALLS_MAX, "planner ran past its call cap");
            if result.is_terminal() {
                break;
            }
        }
    }

    #[test]
    fn simulation_mode_never_tags(
        sx in 1..MAP - 1, sy in 1..MAP - 1,
        dx in 1..MAP - 1, dy in 1..MAP - 1,
        seed in 0..500u64,
    ) {
        let mut game = striped_game(seed, 2);
        let mut dig = ComputerDig::new(
            SubtilePos::new(sx * 3 + 1, sy * 3 + 1),
            SubtilePos::new(dx * 3 + 1, dy * 3 + 1),
        );
        loop {
            if tool_dig_to_pos2(&mut game, PlayerId(0), &mut dig, true).is_terminal() {
                break;
            }
        }
        for x in 0..MAP {
            for y in 0..MAP {
                prop_assert!(!game.grid.is_tagged_for_digging(PlayerId(0), SlabPos::new(x, y)));
            }
        }
    }

    #[test]
    fn tags_land_only_on_diggable_slabs(
        sx in 1..MAP - 1, sy in 1..MAP - 1,
        dx in 1..MAP - 1, dy in 1..MAP - 1,
        seed in 0..500u64,
    ) {
        let mut game = striped_game(seed, 2);
        let mut dig = ComputerDig::new(
            SubtilePos::new(sx * 3 + 1, sy * 3 + 1),
            SubtilePos::new(dx * 3 + 1, dy * 3 + 1),
        );
        loop {
            if tool_dig_to_pos2(&mut game, PlayerId(0), &mut dig, false).is_terminal() {
                break;
            }
        }
        for x in 0..MAP {
            for y in 0..MAP {
                let pos = SlabPos::new(x, y);
                if game.grid.is_tagged_for_digging(PlayerId(0), pos) {
                    prop_assert!(game.grid.slab_kind_at(pos).is_diggable());
                }
            }
        }
    }
}

#[test]
fn arrival_on_reachable_open_map() {
    let neutral = PlayerId(4);
    let mut game = Game::new(MAP, MAP, standard_rules(), 1);
    for x in 0..MAP {
        for y in 0..MAP {
            game.grid.set_slab(SlabPos::new(x, y), SlabKind::Earth, neutral);
        }
    }
    let mut dig = ComputerDig::new(SubtilePos::new(4, 4), SubtilePos::new(76, 76));
    let mut result = DigResult::Progress;
    while result == DigResult::Progress {
        result = tool_dig_to_pos2(&mut game, PlayerId(0), &mut dig, false);
    }
    assert_eq!(result, DigResult::Arrived);
}
