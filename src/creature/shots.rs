//! Shot creation and flight
//!
//! A firing creature launches from an offset in front of its body, aims at
//! the target (or its own facing), and creates either a single homing
//! projectile, a jittered spray, or an instantaneous beam. Impact points
//! beyond the shot's range clamp to the nearest wall along the firing angle.

use rand::Rng;

use crate::core::config::{ShotKind, ShotStats};
use crate::core::types::{PlayerId, SubtilePos, ThingIndex};
use crate::game::Game;
use crate::things::{Thing, ThingClass, ThingData};

/// Shared melee damage formula: base strength scaled by experience, with a
/// luck chance of a double hit.
pub fn compute_creature_attack_damage<R: Rng>(
    base: i32,
    luck: i32,
    explevel: u8,
    rng: &mut R,
) -> i32 {
    let damage = base + base * explevel as i32 / 5;
    if luck > 0 && rng.gen_range(0..100) < luck {
        damage * 2
    } else {
        damage
    }
}

/// Fire a shot from `firer` at `target` (or along its facing when None).
pub fn creature_fire_shot(
    game: &mut Game,
    firer: ThingIndex,
    target: Option<ThingIndex>,
    kind: ShotKind,
    shot_lev: u8,
) {
    let Some(stats) = game.rules.shot(kind).cloned() else {
        tracing::warn!("creature_fire_shot: unknown shot kind {:?}", kind);
        return;
    };
    let Some(firer_thing) = game.things.get(firer) else {
        return;
    };
    let (firer_pos, firer_model, owner, facing) = (
        firer_thing.pos,
        firer_thing.model,
        firer_thing.owner,
        firer_thing.facing,
    );

    let target_idx = target.filter(|t| game.things.exists(*t));
    let target_pos = target_idx.and_then(|t| game.things.get(t)).map(|t| t.pos);

    // Aim angle toward the target, else the firer's current facing.
    // Melee-type shots pin aim to the target's exact position.
    let angle = match target_pos {
        Some(tp) => ((tp.y - firer_pos.y) as f32).atan2((tp.x - firer_pos.x) as f32),
        None => facing,
    };

    // Launch offset one subtile in front of the firer's body
    let launch = SubtilePos::new(
        firer_pos.x + angle.cos().round() as i32,
        firer_pos.y + angle.sin().round() as i32,
    );

    let damage = if stats.is_melee {
        let (strength, luck) = game
            .rules
            .creature(firer_model)
            .map(|c| (c.strength, c.luck))
            .unwrap_or((1, 0));
        let explevel = game
            .things
            .get(firer)
            .and_then(|t| t.control())
            .map(|c| c.explevel)
            .unwrap_or(0);
        compute_creature_attack_damage(strength, luck, explevel, &mut game.rng)
    } else {
        stats.damage * (shot_lev as i32 + 1)
    };

    // Impact point clamped to the nearest wall within range
    let impact = clamp_to_wall(
        game,
        firer_pos,
        target_pos.unwrap_or(SubtilePos::new(
            firer_pos.x + (angle.cos() * stats.max_range as f32) as i32,
            firer_pos.y + (angle.sin() * stats.max_range as f32) as i32,
        )),
        stats.max_range,
    );

    if stats.is_beam {
        // Instantaneous: no travelling projectile, apply along the ray
        if let Some(target_idx) = target_idx {
            let hit = game
                .things
                .get(target_idx)
                .map(|t| t.pos.chess_distance(&firer_pos) <= stats.max_range)
                .unwrap_or(false);
            if hit {
                crate::creature::apply_damage(game, target_idx, damage, Some(firer), owner);
            }
        }
        return;
    }

    if stats.count > 1 {
        // Independent spray with randomized angular jitter per projectile
        for _ in 0..stats.count {
            let jitter: f32 = game.rng.gen_range(-0.35..0.35);
            let spread = angle + jitter;
            let spread_impact = SubtilePos::new(
                firer_pos.x + (spread.cos() * stats.max_range as f32).round() as i32,
                firer_pos.y + (spread.sin() * stats.max_range as f32).round() as i32,
            );
            let spread_impact = clamp_to_wall(game, firer_pos, spread_impact, stats.max_range);
            spawn_shot(
                game,
                &stats,
                owner,
                firer,
                launch,
                ThingIndex::INVALID,
                spread_impact,
                damage,
            );
        }
    } else {
        spawn_shot(
            game,
            &stats,
            owner,
            firer,
            launch,
            target_idx.unwrap_or(ThingIndex::INVALID),
            impact,
            damage,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_shot(
    game: &mut Game,
    stats: &ShotStats,
    owner: PlayerId,
    firer: ThingIndex,
    launch: SubtilePos,
    target: ThingIndex,
    target_pos: SubtilePos,
    damage: i32,
) {
    let mut shot = Thing::new(ThingClass::Shot, 0, owner, launch);
    shot.parent = firer;
    shot.data = ThingData::Shot {
        kind: stats.kind,
        damage,
        target,
        target_pos,
        hit_friendly: stats.hit_friendly,
        remaining_range: stats.max_range,
    };
    game.things.create(shot);
}

/// Walk the ray from `from` toward `to`, stopping at the first impassable
/// slab or at `max_range` subtiles. Returns the last reachable position.
fn clamp_to_wall(game: &Game, from: SubtilePos, to: SubtilePos, max_range: i32) -> SubtilePos {
    let mut pos = from;
    let mut traveled = 0;
    while pos != to && traveled < max_range {
        let step = SubtilePos::new(
            pos.x + (to.x - pos.x).signum(),
            pos.y + (to.y - pos.y).signum(),
        );
        if !game.grid.slab_kind_at(step.slab()).is_passable() && step.slab() != from.slab() {
            return pos;
        }
        pos = step;
        traveled += 1;
    }
    pos
}

/// Advance every live shot: move toward the (possibly homing) target,
/// apply damage on contact, expire at range end.
pub fn update_shots(game: &mut Game) {
    for idx in game.things.class_list(ThingClass::Shot) {
        let Some(shot) = game.things.get(idx) else {
            continue;
        };
        let (pos, owner, firer) = (shot.pos, shot.owner, shot.parent);
        let ThingData::Shot {
            kind,
            damage,
            target,
            target_pos,
            hit_friendly,
            remaining_range,
        } = shot.data.clone()
        else {
            continue;
        };
        if remaining_range <= 0 {
            game.things.delete(idx);
            continue;
        }
        // Homing: chase the live target, else fly to the recorded point
        let dest = game
            .things
            .get(target)
            .map(|t| t.pos)
            .unwrap_or(target_pos);
        let speed = game.rules.shot(kind).map(|s| s.speed).unwrap_or(1).max(1);
        let mut new_pos = pos;
        for _ in 0..speed {
            if new_pos == dest {
                break;
            }
            new_pos = SubtilePos::new(
                new_pos.x + (dest.x - new_pos.x).signum(),
                new_pos.y + (dest.y - new_pos.y).signum(),
            );
            if !game.grid.slab_kind_at(new_pos.slab()).is_passable() {
                break;
            }
        }
        // Contact check at the new position
        let victim = game.things.find_at(ThingClass::Creature, new_pos, |t| {
            t.index != firer
                && (hit_friendly || t.owner != owner)
                && t.control().map(|c| !c.picked_up).unwrap_or(false)
        });
        let arrived = new_pos == dest;
        if let Some(victim) = victim {
            crate::creature::apply_damage(game, victim, damage, Some(firer), owner);
            game.things.delete(idx);
            continue;
        }
        if arrived {
            // Object targets (hearts, doors) take damage on arrival
            if let Some(target_thing) = game.things.get_mut(target) {
                if target_thing.pos == new_pos {
                    target_thing.health -= damage;
                }
            }
            game.things.delete(idx);
            continue;
        }
        if let Some(shot) = game.things.get_mut(idx) {
            shot.pos = new_pos;
            if let ThingData::Shot {
                remaining_range, ..
            } = &mut shot.data
            {
                *remaining_range -= speed;
            }
        }
    }
}
