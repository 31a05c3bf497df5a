//! Incremental tunnel planner
//!
//! A resumable greedy search stepped once per task turn: it never runs a
//! whole dig in one call, so multi-hundred-slab tunnels cannot stall the
//! simulation. State persists in `ComputerDig` between calls; a hard call
//! cap forces an abort instead of an unbounded retry loop.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, SlabPos, SubtilePos, DIG_CALLS_MAX, SMALL_AROUND};
use crate::game::Game;
use crate::map::RoomKind;

/// Within this many slabs of the goal the planner switches to
/// slab-by-slab placement
const FINE_DIG_DISTANCE: i32 = 8;

/// Longest consecutive run of bridgeable liquid the planner will span
const LIQUID_RUN_MAX: i32 = 16;

/// Planner outcome. The numeric codes mirror the classic return values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigResult {
    /// Progress made, call again next turn (0)
    Progress,
    /// Destination slab reached (-1)
    Arrived,
    /// Blocked or call cap exhausted (-2)
    Blocked,
    /// Blocked by liquid the player could bridge over (-5)
    Liquid,
}

impl DigResult {
    pub fn code(&self) -> i32 {
        match self {
            DigResult::Progress => 0,
            DigResult::Arrived => -1,
            DigResult::Blocked => -2,
            DigResult::Liquid => -5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DigResult::Progress)
    }
}

/// Persistent dig continuation state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputerDig {
    pub pos_begin: SubtilePos,
    /// Current probe position, advanced one slab per call
    pub pos_next: SubtilePos,
    pub pos_dest: SubtilePos,
    /// Best-known remaining distance estimate in slabs
    pub distance: i32,
    /// Monotone per-attempt call counter; capped at `DIG_CALLS_MAX`
    pub calls_count: u32,
    /// Wall-hug direction when obstructed: +1 or -1
    pub hug_side: i8,
    /// Consecutive liquid slabs crossed on the current run
    pub liquid_run: i32,
}

impl ComputerDig {
    pub fn new(begin: SubtilePos, dest: SubtilePos) -> Self {
        Self {
            pos_begin: begin,
            pos_next: begin,
            pos_dest: dest,
            distance: begin.slab().chess_distance(&dest.slab()),
            calls_count: 0,
            hug_side: 1,
            liquid_run: 0,
        }
    }
}

/// Angle-bucketed cardinal direction toward the destination, with a small
/// random deflection so long digs do not degenerate into perfectly
/// axis-aligned trenches.
pub fn small_around_index_towards_destination<R: Rng>(
    from: SlabPos,
    to: SlabPos,
    rng: &mut R,
) -> usize {
    let dx = (to.x - from.x) as f32;
    let dy = (to.y - from.y) as f32;
    let angle = dy.atan2(dx);
    // Buckets: 0=N(-y), 1=E(+x), 2=S(+y), 3=W(-x)
    let quarter = std::f32::consts::FRAC_PI_2;
    let bucket = if angle.abs() <= quarter / 2.0 {
        1
    } else if (angle - quarter).abs() <= quarter / 2.0 {
        2
    } else if (angle + quarter).abs() <= quarter / 2.0 {
        0
    } else {
        3
    };
    if rng.gen_range(0..4) == 0 {
        let shift: i32 = if rng.gen_bool(0.5) { 1 } else { -1 };
        ((bucket as i32 + shift).rem_euclid(4)) as usize
    } else {
        bucket
    }
}

fn player_can_bridge(game: &Game, player: PlayerId) -> bool {
    game.rooms.find_room_of_kind(player, RoomKind::Bridge).is_some()
}

/// Attempt to occupy `slab` for the dig: open ground is walked, diggable
/// ground is tagged (unless simulating). Returns None when the slab cannot
/// be part of the tunnel at all.
fn try_enter_slab(
    game: &mut Game,
    player: PlayerId,
    slab: SlabPos,
    simulation: bool,
) -> Option<()> {
    let kind = game.grid.slab_kind_at(slab);
    if kind.is_passable() {
        return Some(());
    }
    if kind.is_diggable() {
        if !simulation && !game.grid.is_tagged_for_digging(player, slab) {
            game.grid.tag_for_digging(player, slab);
        }
        return Some(());
    }
    None
}

/// One planner step: tag at most one slab and advance the probe.
///
/// `simulation` runs the identical walk without tagging anything, used by
/// dig-to-gold setup to pre-validate reachability under the same call cap.
pub fn tool_dig_to_pos2(
    game: &mut Game,
    player: PlayerId,
    dig: &mut ComputerDig,
    simulation: bool,
) -> DigResult {
    dig.calls_count += 1;
    if dig.calls_count >= DIG_CALLS_MAX {
        tracing::warn!(
            "dig for player {:?} exceeded call cap, aborting",
            player
        );
        return DigResult::Blocked;
    }

    let cur = dig.pos_next.slab();
    let dest = dig.pos_dest.slab();
    if cur == dest {
        return DigResult::Arrived;
    }
    let dist = cur.chess_distance(&dest);
    dig.distance = dig.distance.min(dist);

    let dir = if dist <= FINE_DIG_DISTANCE {
        // Fine mode: deterministic slab-by-slab placement toward the goal
        let dx = dest.x - cur.x;
        let dy = dest.y - cur.y;
        if dx.abs() >= dy.abs() {
            if dx > 0 {
                1
            } else {
                3
            }
        } else if dy > 0 {
            2
        } else {
            0
        }
    } else {
        small_around_index_towards_destination(cur, dest, &mut game.rng)
    };

    // Preferred direction, then hug-side deflections, then the reverse
    let order = [
        dir,
        (dir as i32 + dig.hug_side as i32).rem_euclid(4) as usize,
        (dir as i32 - dig.hug_side as i32).rem_euclid(4) as usize,
        (dir + 2) % 4,
    ];
    for (attempt, &d) in order.iter().enumerate() {
        let (sx, sy) = SMALL_AROUND[d];
        let next = SlabPos::new(cur.x + sx, cur.y + sy);
        if !game.grid.in_bounds(next) {
            continue;
        }
        let kind = game.grid.slab_kind_at(next);
        if kind.is_liquid() {
            dig.liquid_run += 1;
            if player_can_bridge(game, player) && dig.liquid_run <= LIQUID_RUN_MAX {
                // Bridgeable water: walk on as if open
                dig.pos_next = next.center_subtile();
                if next == dest {
                    return DigResult::Arrived;
                }
                return DigResult::Progress;
            }
            if attempt == 0 {
                return DigResult::Liquid;
            }
            continue;
        }
        if try_enter_slab(game, player, next, simulation).is_some() {
            dig.liquid_run = 0;
            if attempt != 0 {
                // Remember which way we slid around the obstacle
                dig.hug_side = if d == (dir + 1) % 4 { 1 } else { -1 };
            }
            dig.pos_next = next.center_subtile();
            if next == dest {
                return DigResult::Arrived;
            }
            return DigResult::Progress;
        }
    }
    DigResult::Blocked
}

/// Locate the nearest remaining untagged gold slab and tunnel toward it,
/// re-planning sub-paths as veins are exhausted. Bounded by the planner's
/// own call cap.
pub fn find_next_gold(game: &mut Game, player: PlayerId, dig: &mut ComputerDig) -> DigResult {
    let max_radius = game.grid.width().max(game.grid.height());
    loop {
        let from = dig.pos_next.slab();
        let target = game.grid.spiral_search(from, max_radius, |g, p| {
            g.slab_kind_at(p).is_gold_vein() && !g.is_tagged_for_digging(player, p)
        });
        let Some(target) = target else {
            return DigResult::Blocked;
        };
        dig.pos_dest = target.center_subtile();
        loop {
            let result = tool_dig_to_pos2(game, player, dig, false);
            match result {
                DigResult::Progress => continue,
                DigResult::Arrived => {
                    // Tag the vein itself and look for the next one
                    game.grid.tag_for_digging(player, target);
                    if dig.calls_count >= DIG_CALLS_MAX {
                        return DigResult::Arrived;
                    }
                    break;
                }
                other => return other,
            }
        }
    }
}
