//! Shared test helpers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dicebag::DiceRng;

use crate::arena::Arena;
use crate::combatant::{Combatant, CombatantId, Side};
use crate::encounter::Encounter;
use crate::strategy::{Inert, Strategy};

/// A fresh arena with a fixed seed.
pub fn arena() -> Arena {
    Arena::new(DiceRng::from_seed(0xDEAD))
}

/// Spawns an inert combatant with exactly `hp` hit points.
pub fn dummy(arena: &mut Arena, side: Side, name: &str, hp: i32) -> CombatantId {
    let combatant = Combatant::new(name, side, false);
    let id = arena.spawn(combatant, Box::new(Inert));
    set_hp(arena, id, hp);
    id
}

/// Forces a combatant's hit points and maximum.
pub fn set_hp(arena: &mut Arena, id: CombatantId, hp: i32) {
    let c = arena.combatant_mut(id);
    c.max_hp = hp;
    c.hp = hp;
}

/// A fresh encounter over the arena's current rosters.
pub fn encounter(arena: &mut Arena) -> Encounter {
    Encounter::new(arena, 0, 0)
}

/// A strategy that counts how often its hooks run.
pub struct CountingStrategy {
    pub turns: Arc<AtomicU32>,
    pub legendary: Arc<AtomicU32>,
}

impl CountingStrategy {
    pub fn new() -> (Self, Arc<AtomicU32>, Arc<AtomicU32>) {
        let turns = Arc::new(AtomicU32::new(0));
        let legendary = Arc::new(AtomicU32::new(0));
        (
            Self {
                turns: Arc::clone(&turns),
                legendary: Arc::clone(&legendary),
            },
            turns,
            legendary,
        )
    }
}

impl Strategy for CountingStrategy {
    fn take_turn(&mut self, _me: CombatantId, _enc: &Encounter, _arena: &mut Arena) {
        self.turns.fetch_add(1, Ordering::Relaxed);
    }

    fn legendary_action(&mut self, _me: CombatantId, _enc: &Encounter, _arena: &mut Arena) {
        self.legendary.fetch_add(1, Ordering::Relaxed);
    }
}
