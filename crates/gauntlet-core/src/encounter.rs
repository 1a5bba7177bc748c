//! The encounter engine: initiative, round loop and targeting.
//!
//! An encounter runs two rosters against each other until one side has no
//! conscious combatant. Initiative is computed once at setup and fixed for
//! the encounter's lifetime; lair actions join the order as phantom entries
//! locked at initiative 20.
//!
//! # Tie-breaks
//!
//! Initiative ties resolve deterministically: lair actions lose ties to
//! everyone, side A combatants beat side B combatants, and remaining ties
//! keep roster order. This falls out of a stable descending sort over the
//! sequence `[side A..., side B..., lair actions...]`.

use tracing::debug;

use crate::arena::Arena;
use crate::combatant::{CombatantId, Side};

/// One slot in the initiative order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TurnEntry {
    /// A combatant's own turn.
    Combatant(CombatantId),
    /// A lair action owned by a combatant, acting at initiative 20.
    Lair(CombatantId),
}

/// A combat encounter between two rosters.
pub struct Encounter {
    side_a: Vec<CombatantId>,
    side_b: Vec<CombatantId>,
    pub(crate) order: Vec<TurnEntry>,
    /// Rounds completed or in progress.
    pub rounds: u32,
    /// Encounters fought since the party's last short rest.
    pub encounters_since_short_rest: u32,
    /// Encounters fought since the party's last long rest.
    pub encounters_since_long_rest: u32,
}

impl Encounter {
    /// Sets up an encounter: rolls initiative for every combatant in the
    /// arena, inserts lair-action entries, and fires the `start_encounter`
    /// hook on every participant in initiative order.
    pub fn new(
        arena: &mut Arena,
        encounters_since_short_rest: u32,
        encounters_since_long_rest: u32,
    ) -> Self {
        let side_a = arena.side_ids(Side::A);
        let side_b = arena.side_ids(Side::B);

        let mut keyed: Vec<(i32, TurnEntry)> = Vec::new();
        for &id in side_a.iter().chain(side_b.iter()) {
            let roll = arena.roll_initiative(id, false);
            keyed.push((roll, TurnEntry::Combatant(id)));
        }
        // Lair actions are fixed at initiative 20 and appended last, so the
        // stable sort makes them lose all ties.
        for &id in side_a.iter().chain(side_b.iter()) {
            if arena.has_lair_action(id) {
                keyed.push((20, TurnEntry::Lair(id)));
            }
        }
        let order = sort_initiative(keyed);

        if arena.ids().any(|id| arena.combatant(id).verbose) {
            let mut message = String::from("Initiative order:");
            for entry in &order {
                let id = match *entry {
                    TurnEntry::Combatant(id) => id,
                    TurnEntry::Lair(id) => id,
                };
                message.push(' ');
                message.push_str(&arena.combatant(id).tag());
            }
            debug!("{message}");
        }

        let encounter = Self {
            side_a,
            side_b,
            order,
            rounds: 0,
            encounters_since_short_rest,
            encounters_since_long_rest,
        };

        // Encounter-start hooks fire in initiative order.
        for entry in encounter.order.clone() {
            if let TurnEntry::Combatant(id) = entry {
                arena.with_strategy(id, |strategy, arena| {
                    strategy.start_encounter(id, &encounter, arena);
                });
            }
        }

        encounter
    }

    /// Whether both sides still have a conscious combatant.
    #[must_use]
    pub fn active(&self, arena: &Arena) -> bool {
        self.side_a.iter().any(|&id| arena.alive(id))
            && self.side_b.iter().any(|&id| arena.alive(id))
    }

    /// Runs rounds until one side is defeated.
    pub fn run(&mut self, arena: &mut Arena) {
        while self.active(arena) {
            self.one_round(arena);
        }
    }

    /// Resolves one round of combat.
    pub fn one_round(&mut self, arena: &mut Arena) {
        self.rounds += 1;

        for entry in self.order.clone() {
            if !self.active(arena) {
                break;
            }
            match entry {
                TurnEntry::Combatant(id) => {
                    if arena.combatant(id).hp <= 0 {
                        continue;
                    }
                    self.take_turn(arena, id);
                }
                TurnEntry::Lair(owner) => {
                    let c = arena.combatant(owner);
                    if c.hp > 0 && !c.is_incapacitated() {
                        arena.with_strategy(owner, |strategy, arena| {
                            strategy.lair_action(owner, self, arena);
                        });
                    }
                }
            }
        }
    }

    /// Runs one combatant's full turn.
    fn take_turn(&self, arena: &mut Arena, id: CombatantId) {
        // Regeneration fires before anything else and re-arms for next turn.
        {
            let c = arena.combatant(id);
            if let Some(amount) = c.regeneration {
                if c.cond.regeneration_active {
                    arena.heal(id, amount, false);
                }
            }
            arena.combatant_mut(id).cond.regeneration_active = true;
        }

        // Recover the action economy. Turned creatures spend their action
        // fleeing; slowed creatures get no reaction.
        {
            let c = arena.combatant_mut(id);
            c.cond.surprised = false;
            c.cond.legendary_remaining = c.legendary_actions;
            c.cond.bonus = true;
            if c.cond.turned.is_none() {
                c.cond.action = true;
                if c.cond.slowed == 0 {
                    c.cond.reaction = true;
                }
            }
        }

        arena.fire_start_of_turn(id);

        if arena.combatant(id).hp > 0 {
            arena.fire_spirit_guardians(id);
        }

        let conscious_and_able =
            arena.combatant(id).hp > 0 && !arena.combatant(id).is_incapacitated();
        if conscious_and_able {
            arena.combatant_mut(id).cond.prone = false;

            // Concentration spells count down on their caster's turn.
            if let Some(conc) = arena.combatant(id).cond.concentration {
                let remaining = arena.effects().get(conc).remaining;
                if remaining.is_some_and(|r| r > 0) {
                    arena.tick_effect(conc);
                }
            }

            let c = arena.combatant(id);
            if c.cond.action && !c.cond.priority_actions.is_empty() {
                // A queued forced action replaces the normal turn.
                arena.combatant_mut(id).cond.action = false;
                arena.run_priority_action(id);
            } else {
                arena.with_strategy(id, |strategy, arena| {
                    strategy.take_turn(id, self, arena);
                });
            }
        }

        // End-of-turn effects fire whether or not the combatant is still up.
        arena.fire_end_of_turn(self, id);
        arena.with_strategy(id, |strategy, arena| {
            strategy.end_turn(id, self, arena);
        });
    }

    // =========================================================================
    // Targeting
    // =========================================================================

    /// The roster a combatant belongs to.
    #[must_use]
    pub fn allies_of(&self, arena: &Arena, id: CombatantId) -> &[CombatantId] {
        match arena.combatant(id).side {
            Side::A => &self.side_a,
            Side::B => &self.side_b,
        }
    }

    /// The opposing roster.
    #[must_use]
    pub fn foes_of(&self, arena: &Arena, id: CombatantId) -> &[CombatantId] {
        match arena.combatant(id).side {
            Side::A => &self.side_b,
            Side::B => &self.side_a,
        }
    }

    /// Chooses one living foe uniformly at random; `None` when no target is
    /// valid. A swallowed chooser can only target its swallower.
    pub fn choose_target(&self, arena: &mut Arena, chooser: CombatantId) -> Option<CombatantId> {
        self.choose_side_targets(arena, chooser, 1, false, false)
            .first()
            .copied()
    }

    /// Chooses up to `n` living foes.
    pub fn choose_targets(
        &self,
        arena: &mut Arena,
        chooser: CombatantId,
        n: usize,
        replacement: bool,
    ) -> Vec<CombatantId> {
        self.choose_side_targets(arena, chooser, n, false, replacement)
    }

    /// Chooses up to `n` living targets from either roster.
    ///
    /// Asking for at least as many unique targets as are available returns
    /// all of them (order unspecified). An empty result is the defined
    /// no-target outcome, never an error.
    pub fn choose_side_targets(
        &self,
        arena: &mut Arena,
        chooser: CombatantId,
        n: usize,
        allies: bool,
        replacement: bool,
    ) -> Vec<CombatantId> {
        let valid: Vec<CombatantId> = if let Some(swallower) = arena.swallower_of(chooser) {
            vec![swallower]
        } else {
            let pool = if allies {
                self.allies_of(arena, chooser)
            } else {
                self.foes_of(arena, chooser)
            };
            pool.iter().copied().filter(|&id| arena.alive(id)).collect()
        };

        if valid.is_empty() {
            return Vec::new();
        }
        if n == 1 {
            let index = arena.rng_mut().choose_index(valid.len());
            return vec![valid[index]];
        }
        if n >= valid.len() && !replacement {
            return valid;
        }
        arena
            .rng_mut()
            .sample_indices(valid.len(), n, replacement)
            .into_iter()
            .map(|i| valid[i])
            .collect()
    }

    /// Uniform single choice from an explicit candidate list.
    #[allow(clippy::unused_self)]
    pub fn choice(&self, arena: &mut Arena, options: &[CombatantId]) -> Option<CombatantId> {
        if options.is_empty() {
            None
        } else {
            let index = arena.rng_mut().choose_index(options.len());
            Some(options[index])
        }
    }

    /// Uniform choice of up to `n` candidates from an explicit list.
    #[allow(clippy::unused_self)]
    pub fn choice_n(
        &self,
        arena: &mut Arena,
        options: &[CombatantId],
        n: usize,
        replacement: bool,
    ) -> Vec<CombatantId> {
        if options.is_empty() {
            return Vec::new();
        }
        if !replacement && n >= options.len() {
            return options.to_vec();
        }
        arena
            .rng_mut()
            .sample_indices(options.len(), n, replacement)
            .into_iter()
            .map(|i| options[i])
            .collect()
    }
}

/// Stable descending sort over `(roll, entry)` pairs.
///
/// Equal rolls keep their input order, which encodes the whole tie-break
/// chain given the `[side A, side B, lairs]` construction sequence.
pub(crate) fn sort_initiative(mut keyed: Vec<(i32, TurnEntry)>) -> Vec<TurnEntry> {
    keyed.sort_by(|a, b| b.0.cmp(&a.0));
    keyed.into_iter().map(|(_, entry)| entry).collect()
}
