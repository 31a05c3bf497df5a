//! Read-only stat tables consumed by the simulation
//!
//! Config file parsing lives outside this crate; these structures arrive
//! already parsed. The `standard_rules` set mirrors the shipped game data
//! closely enough for the runner and the scenario tests.

use serde::{Deserialize, Serialize};

use crate::core::types::SPELL_MAX_LEVEL;

/// Spell kinds a creature can be affected by or cast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpellKind {
    None,
    Freeze,
    Armour,
    Rebound,
    Heal,
    Invisibility,
    Teleport,
    Speed,
    Slow,
    Fly,
    Light,
    Disease,
    Chicken,
}

/// Per-spell stat row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpellStats {
    pub kind: SpellKind,
    /// Whether the power is delivered as a fired shot rather than a direct effect
    pub fires_shot: bool,
    pub self_cast: bool,
    /// Base duration in turns, scaled by spell level
    pub duration: i32,
    /// Base magnitude (healing amount, speed delta, disease damage)
    pub power: u8,
}

/// Shot kinds creatures and powers can fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShotKind {
    Melee,
    Arrow,
    Fireball,
    Poison,
    Lightning,
    Grenade,
    Hail,
    WordOfPower,
}

/// Per-shot-kind stat row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotStats {
    pub kind: ShotKind,
    pub damage: i32,
    pub speed: i32,
    /// Max unobstructed range in subtiles; aim beyond it clamps to the nearest wall
    pub max_range: i32,
    /// Projectiles created per firing (sprays fire several with angular jitter)
    pub count: u8,
    pub is_melee: bool,
    /// Delivered instantly along the ray instead of as a travelling projectile
    pub is_beam: bool,
    pub hit_friendly: bool,
}

/// Per-creature-model stat row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatureStats {
    pub model: u16,
    pub name: &'static str,
    pub health: i32,
    pub strength: i32,
    pub luck: i32,
    /// Gold carry cap; loose piles beyond it are split, not consumed
    pub gold_hold: i32,
    /// Gold charged per scavenge conversion in a scavenger room
    pub scavenger_cost: i32,
    /// Turn points required before a scavenge conversion happens
    pub scavenge_require: i64,
    /// Diggers get work start states and are skipped by drop-attack checks
    pub is_digger: bool,
    pub can_see_invisible: bool,
    /// Pay per payday; also the annoyance relief baseline
    pub pay: i32,
}

/// Trap and door stat rows consumed by sell and placement actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrapDoorStats {
    pub model: u16,
    pub is_door: bool,
    pub sell_value: i32,
    pub place_cost: i32,
}

/// The aggregated read-only rule set
#[derive(Debug, Clone)]
pub struct Rules {
    pub spells: Vec<SpellStats>,
    pub shots: Vec<ShotStats>,
    pub creatures: Vec<CreatureStats>,
    pub traps_doors: Vec<TrapDoorStats>,
    /// Gold deducted per this many subtiles dug by a computer player
    pub dig_cost_subtiles: i32,
    pub dig_cost_gold: i32,
    /// Cost of one room slab when a build process places it
    pub room_slab_cost: i32,
}

impl Rules {
    pub fn spell(&self, kind: SpellKind) -> Option<&SpellStats> {
        self.spells.iter().find(|s| s.kind == kind)
    }

    pub fn shot(&self, kind: ShotKind) -> Option<&ShotStats> {
        self.shots.iter().find(|s| s.kind == kind)
    }

    pub fn creature(&self, model: u16) -> Option<&CreatureStats> {
        self.creatures.iter().find(|c| c.model == model)
    }

    pub fn trap_door(&self, model: u16, is_door: bool) -> Option<&TrapDoorStats> {
        self.traps_doors
            .iter()
            .find(|t| t.model == model && t.is_door == is_door)
    }
}

/// Clamp a requested spell level to the legal range
pub fn clamp_spell_level(level: u8) -> u8 {
    level.min(SPELL_MAX_LEVEL)
}

/// Duration scaling shared by timed spell effects
pub fn spell_duration(stats: &SpellStats, level: u8) -> i32 {
    stats.duration * (level as i32 + 1)
}

/// The shipped rule set
pub fn standard_rules() -> Rules {
    Rules {
        spells: vec![
            SpellStats { kind: SpellKind::Freeze, fires_shot: false, self_cast: false, duration: 20, power: 5 },
            SpellStats { kind: SpellKind::Armour, fires_shot: false, self_cast: true, duration: 60, power: 4 },
            SpellStats { kind: SpellKind::Rebound, fires_shot: false, self_cast: true, duration: 40, power: 2 },
            SpellStats { kind: SpellKind::Heal, fires_shot: false, self_cast: true, duration: 0, power: 60 },
            SpellStats { kind: SpellKind::Invisibility, fires_shot: false, self_cast: true, duration: 50, power: 3 },
            SpellStats { kind: SpellKind::Teleport, fires_shot: false, self_cast: true, duration: 0, power: 0 },
            SpellStats { kind: SpellKind::Speed, fires_shot: false, self_cast: true, duration: 80, power: 5 },
            SpellStats { kind: SpellKind::Slow, fires_shot: false, self_cast: false, duration: 40, power: 1 },
            SpellStats { kind: SpellKind::Fly, fires_shot: false, self_cast: true, duration: 60, power: 2 },
            SpellStats { kind: SpellKind::Light, fires_shot: false, self_cast: true, duration: 100, power: 1 },
            SpellStats { kind: SpellKind::Disease, fires_shot: false, self_cast: false, duration: 120, power: 6 },
            SpellStats { kind: SpellKind::Chicken, fires_shot: false, self_cast: false, duration: 80, power: 7 },
        ],
        shots: vec![
            ShotStats { kind: ShotKind::Melee, damage: 8, speed: 0, max_range: 3, count: 1, is_melee: true, is_beam: false, hit_friendly: false },
            ShotStats { kind: ShotKind::Arrow, damage: 12, speed: 8, max_range: 24, count: 1, is_melee: false, is_beam: false, hit_friendly: false },
            ShotStats { kind: ShotKind::Fireball, damage: 20, speed: 6, max_range: 20, count: 1, is_melee: false, is_beam: false, hit_friendly: false },
            ShotStats { kind: ShotKind::Poison, damage: 10, speed: 6, max_range: 18, count: 1, is_melee: false, is_beam: false, hit_friendly: false },
            ShotStats { kind: ShotKind::Lightning, damage: 30, speed: 0, max_range: 16, count: 1, is_melee: false, is_beam: true, hit_friendly: false },
            ShotStats { kind: ShotKind::Grenade, damage: 16, speed: 5, max_range: 14, count: 3, is_melee: false, is_beam: false, hit_friendly: true },
            ShotStats { kind: ShotKind::Hail, damage: 6, speed: 7, max_range: 16, count: 5, is_melee: false, is_beam: false, hit_friendly: true },
            ShotStats { kind: ShotKind::WordOfPower, damage: 40, speed: 0, max_range: 6, count: 1, is_melee: false, is_beam: true, hit_friendly: false },
        ],
        creatures: vec![
            CreatureStats { model: 1, name: "imp", health: 40, strength: 4, luck: 4, gold_hold: 500, scavenger_cost: 0, scavenge_require: 0, is_digger: true, can_see_invisible: false, pay: 20 },
            CreatureStats { model: 2, name: "fly", health: 30, strength: 6, luck: 6, gold_hold: 100, scavenger_cost: 30, scavenge_require: 600, is_digger: false, can_see_invisible: true, pay: 25 },
            CreatureStats { model: 3, name: "troll", health: 120, strength: 20, luck: 8, gold_hold: 200, scavenger_cost: 50, scavenge_require: 900, is_digger: false, can_see_invisible: false, pay: 60 },
            CreatureStats { model: 4, name: "warlock", health: 80, strength: 12, luck: 12, gold_hold: 300, scavenger_cost: 80, scavenge_require: 800, is_digger: false, can_see_invisible: true, pay: 110 },
            CreatureStats { model: 5, name: "dragon", health: 320, strength: 40, luck: 10, gold_hold: 900, scavenger_cost: 300, scavenge_require: 1800, is_digger: false, can_see_invisible: false, pay: 400 },
        ],
        traps_doors: vec![
            TrapDoorStats { model: 1, is_door: false, sell_value: 250, place_cost: 500 },
            TrapDoorStats { model: 2, is_door: false, sell_value: 400, place_cost: 800 },
            TrapDoorStats { model: 1, is_door: true, sell_value: 200, place_cost: 400 },
            TrapDoorStats { model: 2, is_door: true, sell_value: 450, place_cost: 900 },
        ],
        dig_cost_subtiles: 5,
        dig_cost_gold: 12,
        room_slab_cost: 50,
    }
}
