//! Headless simulation runner
//!
//! Builds a small demo level with two computer keepers, runs a fixed
//! number of turns, and prints a JSON summary of the outcome. Useful for
//! balance smoke tests and deterministic-replay checks.

use clap::Parser;
use serde::Serialize;

use underkeep::computer::Computer;
use underkeep::core::config::standard_rules;
use underkeep::core::error::Result;
use underkeep::core::types::{PlayerId, SlabPos, NEUTRAL_PLAYER};
use underkeep::creature::spawn_creature;
use underkeep::game::Game;
use underkeep::map::{RoomKind, SlabKind};
use underkeep::things::{Thing, ThingClass};

#[derive(Parser, Debug)]
#[command(name = "underkeep")]
#[command(about = "Run a headless dungeon simulation and output a JSON summary")]
struct Args {
    /// Number of turns to simulate
    #[arg(long, default_value_t = 5000)]
    turns: u64,

    /// Random seed for deterministic runs
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Map width in slabs
    #[arg(long, default_value_t = 40)]
    width: i32,

    /// Map height in slabs
    #[arg(long, default_value_t = 40)]
    height: i32,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,
}

#[derive(Serialize)]
struct PlayerSummary {
    player: u8,
    money: i64,
    creatures: i32,
    rooms: usize,
    battles_won: i32,
    battles_lost: i32,
}

#[derive(Serialize)]
struct RunSummary {
    turns: u64,
    seed: u64,
    players: Vec<PlayerSummary>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "underkeep=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut game = build_demo_level(args.width, args.height, args.seed);

    tracing::info!("running {} turns (seed {})", args.turns, args.seed);
    for _ in 0..args.turns {
        game.process_turn();
    }

    let summary = RunSummary {
        turns: game.turn,
        seed: args.seed,
        players: (0..2u8)
            .map(|p| {
                let player = PlayerId(p);
                PlayerSummary {
                    player: p,
                    money: game.dungeon(player).total_money(),
                    creatures: game
                        .dungeon(player)
                        .owned_creatures
                        .values()
                        .copied()
                        .sum(),
                    rooms: game.rooms.iter().filter(|r| r.owner == player).count(),
                    battles_won: game.dungeon(player).battles_won,
                    battles_lost: game.dungeon(player).battles_lost,
                }
            })
            .collect(),
    };

    if args.format == "text" {
        for p in &summary.players {
            println!(
                "player {}: {} gold, {} creatures, {} rooms, {}/{} battles",
                p.player, p.money, p.creatures, p.rooms, p.battles_won, p.battles_lost
            );
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

/// Symmetric two-keeper level: claimed starting areas in opposite
/// corners, gold veins between them, a neutral entrance in the middle.
fn build_demo_level(width: i32, height: i32, seed: u64) -> Game {
    let neutral = PlayerId(NEUTRAL_PLAYER as u8);
    let mut game = Game::new(width, height, standard_rules(), seed);

    // Rock border
    for x in 0..width {
        game.grid.set_slab(SlabPos::new(x, 0), SlabKind::Rock, neutral);
        game.grid
            .set_slab(SlabPos::new(x, height - 1), SlabKind::Rock, neutral);
    }
    for y in 0..height {
        game.grid.set_slab(SlabPos::new(0, y), SlabKind::Rock, neutral);
        game.grid
            .set_slab(SlabPos::new(width - 1, y), SlabKind::Rock, neutral);
    }

    // Gold veins along the midline
    for (cx, cy) in [(width / 2, height / 4), (width / 2, 3 * height / 4)] {
        for dx in -1..=1 {
            for dy in -1..=1 {
                game.grid
                    .set_slab(SlabPos::new(cx + dx, cy + dy), SlabKind::Gold, neutral);
            }
        }
        game.register_gold_lookup(SlabPos::new(cx, cy), 9);
    }

    // Neutral entrance in the center
    let center = SlabPos::new(width / 2, height / 2);
    game.rooms.add_room(
        &mut game.grid,
        RoomKind::Entrance,
        neutral,
        vec![center, SlabPos::new(center.x + 1, center.y)],
    );

    for (player, corner) in [
        (PlayerId(0), SlabPos::new(4, 4)),
        (PlayerId(1), SlabPos::new(width - 8, height - 8)),
    ] {
        for dx in 0..5 {
            for dy in 0..5 {
                game.grid.set_slab(
                    SlabPos::new(corner.x + dx, corner.y + dy),
                    SlabKind::Claimed,
                    player,
                );
            }
        }
        let heart_pos = SlabPos::new(corner.x + 2, corner.y + 2).center_subtile();
        let mut heart = Thing::new(ThingClass::Object, 0, player, heart_pos);
        heart.health = 1000;
        if let Some(idx) = game.things.create(heart) {
            game.dungeon_mut(player).heart_idx = idx;
        }
        game.dungeon_mut(player).total_money_owned = 3000;

        for i in 0..2 {
            spawn_creature(
                &mut game,
                1,
                player,
                SlabPos::new(corner.x + i, corner.y).center_subtile(),
            );
            spawn_creature(
                &mut game,
                3,
                player,
                SlabPos::new(corner.x + i, corner.y + 1).center_subtile(),
            );
        }
        game.computers[player.idx()] = Some(Computer::new(player));
    }
    game
}
