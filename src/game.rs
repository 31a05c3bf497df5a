//! Game world container and the per-turn update loop
//!
//! Single-threaded, cooperative, turn-stepped: computer players and
//! creatures are independent state machines interleaved at fixed points
//! within one turn, each doing a bounded amount of work. The ordering
//! (computer events/checks/tasks first, creature state stepping after)
//! is part of the balance contract and must not be reordered.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::actions::MessageQueue;
use crate::computer::tasks::TaskPool;
use crate::computer::Computer;
use crate::core::config::Rules;
use crate::core::types::{GameTurn, PlayerId, SlabPos, PLAYERS_COUNT};
use crate::creature;
use crate::events::{EventLog, WorldEvent, WorldEventKind};
use crate::map::{MapGrid, RoomRegistry};
use crate::player::Dungeon;
use crate::things::{ThingClass, ThingStore};

/// Turns between creature paydays
pub const PAYDAY_INTERVAL: GameTurn = 500;

/// A discovered gold deposit with per-player claim interest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldLookup {
    pub pos: SlabPos,
    pub num_gold_slabs: i32,
    pub player_interested: [bool; PLAYERS_COUNT],
}

/// The shared mutable world model
pub struct Game {
    pub turn: GameTurn,
    pub rules: Rules,
    pub grid: MapGrid,
    pub rooms: RoomRegistry,
    pub things: ThingStore,
    pub dungeons: Vec<Dungeon>,
    /// Computer players; None for human-controlled or empty slots
    pub computers: Vec<Option<Computer>>,
    /// Global task pool shared by all computer players
    pub tasks: TaskPool,
    pub gold_lookups: Vec<GoldLookup>,
    pub events: EventLog,
    pub messages: MessageQueue,
    pub rng: ChaCha8Rng,
}

impl Game {
    pub fn new(width: i32, height: i32, rules: Rules, seed: u64) -> Self {
        Self {
            turn: 0,
            rules,
            grid: MapGrid::new(width, height, crate::map::SlabKind::Earth),
            rooms: RoomRegistry::new(),
            things: ThingStore::new(),
            dungeons: (0..PLAYERS_COUNT).map(|_| Dungeon::new()).collect(),
            computers: (0..PLAYERS_COUNT).map(|_| None).collect(),
            tasks: TaskPool::new(),
            gold_lookups: Vec::new(),
            events: EventLog::new(),
            messages: MessageQueue::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn dungeon(&self, player: PlayerId) -> &Dungeon {
        &self.dungeons[player.idx()]
    }

    pub fn dungeon_mut(&mut self, player: PlayerId) -> &mut Dungeon {
        &mut self.dungeons[player.idx()]
    }

    pub fn players_are_enemies(&self, a: PlayerId, b: PlayerId) -> bool {
        a != b && !a.is_neutral() && !b.is_neutral()
    }

    /// Register a discovered gold deposit
    pub fn register_gold_lookup(&mut self, pos: SlabPos, num_gold_slabs: i32) {
        self.gold_lookups.push(GoldLookup {
            pos,
            num_gold_slabs,
            player_interested: [false; PLAYERS_COUNT],
        });
    }

    /// Advance the world one turn.
    ///
    /// Order: computer players (scanning last turn's events, then one unit
    /// of scheduler work each) -> event log truncation -> shot flight ->
    /// creature state stepping in stable list order -> payday bookkeeping.
    pub fn process_turn(&mut self) {
        self.turn += 1;

        for slot in 0..PLAYERS_COUNT {
            if self.computers[slot].is_some() {
                crate::computer::process_computer_player(self, PlayerId(slot as u8));
            }
        }
        self.events.clear();

        creature::shots::update_shots(self);

        for idx in self.things.class_list(ThingClass::Creature) {
            if !self.things.exists(idx) {
                continue;
            }
            creature::spells::process_spell_effects(self, idx);
            if !self.things.exists(idx) {
                continue;
            }
            creature::states::process_creature_state(self, idx);
        }

        if self.turn % PAYDAY_INTERVAL == 0 {
            self.process_payday();
        }
    }

    /// Charge each creature's pay and raise anger where the owner is broke
    fn process_payday(&mut self) {
        for slot in 0..PLAYERS_COUNT {
            if slot == crate::core::types::NEUTRAL_PLAYER {
                continue;
            }
            self.events.push(WorldEvent {
                kind: WorldEventKind::Payday,
                owner: PlayerId(slot as u8),
                pos: crate::core::types::SubtilePos::default(),
                target: crate::core::types::ThingIndex::INVALID,
            });
        }
        for idx in self.things.class_list(ThingClass::Creature) {
            let Some(thing) = self.things.get(idx) else {
                continue;
            };
            if thing.owner.is_neutral() {
                continue;
            }
            let owner = thing.owner;
            let pay = self
                .rules
                .creature(thing.model)
                .map(|c| c.pay as i64)
                .unwrap_or(0);
            let paid = self.dungeon_mut(owner).spend_gold(pay);
            if let Some(ctrl) = self.things.get_mut(idx).and_then(|t| t.control_mut()) {
                if paid {
                    ctrl.wage_received += pay as i32;
                    ctrl.paydays_owed = 0;
                } else {
                    ctrl.anger += 50;
                    ctrl.paydays_owed = ctrl.paydays_owed.saturating_add(1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::standard_rules;

    #[test]
    fn test_turn_advances_and_clears_events() {
        let mut game = Game::new(20, 20, standard_rules(), 1);
        game.events.push(WorldEvent {
            kind: WorldEventKind::Battle,
            owner: PlayerId(0),
            pos: crate::core::types::SubtilePos::new(3, 3),
            target: crate::core::types::ThingIndex::INVALID,
        });
        game.process_turn();
        assert_eq!(game.turn, 1);
        assert_eq!(game.events.iter().count(), 0);
    }

    #[test]
    fn test_neutral_not_enemy() {
        let game = Game::new(10, 10, standard_rules(), 1);
        let neutral = PlayerId(crate::core::types::NEUTRAL_PLAYER as u8);
        assert!(!game.players_are_enemies(PlayerId(0), neutral));
        assert!(!game.players_are_enemies(PlayerId(0), PlayerId(0)));
        assert!(game.players_are_enemies(PlayerId(0), PlayerId(1)));
    }
}
