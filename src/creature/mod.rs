//! Creature behavior: states, spells, shots, death, scavenging

pub mod control;
pub mod death;
pub mod scavenge;
pub mod shots;
pub mod spells;
pub mod states;

use crate::core::types::{PlayerId, SubtilePos, ThingIndex};
use crate::game::Game;
use crate::things::{Thing, ThingClass, ThingData};

pub use control::{CombatKind, CreatureControl, SpellSlot};
pub use states::{CreatureState, StateReturn};

/// Spawn a creature of `model` for `owner` at `pos`.
///
/// Unknown models log a warning and spawn nothing.
pub fn spawn_creature(
    game: &mut Game,
    model: u16,
    owner: PlayerId,
    pos: SubtilePos,
) -> Option<ThingIndex> {
    let Some(stats) = game.rules.creature(model) else {
        tracing::warn!("spawn_creature: unknown model {}", model);
        return None;
    };
    let health = stats.health;
    let mut thing = Thing::new(ThingClass::Creature, model, owner, pos);
    thing.health = health;
    thing.data = ThingData::Creature(Box::new(CreatureControl::new(health)));
    let idx = game.things.create(thing)?;
    states::set_start_state(game, idx);
    if !owner.is_neutral() {
        game.dungeon_mut(owner).note_creature_gained(model);
    }
    Some(idx)
}

/// Apply damage to a creature, resolving death when health runs out.
pub fn apply_damage(
    game: &mut Game,
    victim: ThingIndex,
    damage: i32,
    killer: Option<ThingIndex>,
    default_player: PlayerId,
) {
    let Some(thing) = game.things.get_mut(victim) else {
        return;
    };
    if thing.class != ThingClass::Creature {
        thing.health -= damage;
        return;
    }
    // Unconscious bodies take no further combat processing
    if thing.control().map(|c| c.unconscious).unwrap_or(false) {
        return;
    }
    thing.health -= damage;
    if thing.health <= 0 {
        death::kill_creature(
            game,
            victim,
            killer,
            default_player,
            death::KillFlags {
                allow_unconscious: true,
                ..Default::default()
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::standard_rules;

    #[test]
    fn test_unknown_model_spawns_nothing() {
        let mut g = Game::new(10, 10, standard_rules(), 1);
        assert!(spawn_creature(&mut g, 77, PlayerId(0), SubtilePos::new(4, 4)).is_none());
    }

    #[test]
    fn test_damage_to_unconscious_is_idempotent() {
        let mut g = Game::new(10, 10, standard_rules(), 1);
        let c = spawn_creature(&mut g, 3, PlayerId(0), SubtilePos::new(4, 4)).unwrap();
        {
            let thing = g.things.get_mut(c).unwrap();
            thing.health = 1;
            thing.control_mut().unwrap().unconscious = true;
        }
        apply_damage(&mut g, c, 50, None, PlayerId(1));
        assert!(g.things.exists(c));
        assert_eq!(g.things.get(c).unwrap().health, 1);
    }

    #[test]
    fn test_lethal_damage_kills() {
        let mut g = Game::new(10, 10, standard_rules(), 1);
        let c = spawn_creature(&mut g, 3, PlayerId(0), SubtilePos::new(4, 4)).unwrap();
        apply_damage(&mut g, c, 10_000, None, PlayerId(1));
        assert!(!g.things.exists(c));
    }
}
