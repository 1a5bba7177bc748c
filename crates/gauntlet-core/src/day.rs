//! The adventuring day: a gauntlet of encounters with interleaved rests.
//!
//! A day runs the party against a fixed adversary template until the long
//! rest budget is exhausted or every player character is down. Adversaries
//! are fully refreshed between encounters; the party only rests on its
//! schedule, so attrition carries forward.

use tracing::debug;

use crate::arena::Arena;
use crate::combatant::{CombatantId, Side};
use crate::encounter::Encounter;

/// One adventuring day over a fixed party and adversary roster.
pub struct AdventuringDay {
    pcs: Vec<CombatantId>,
    adversaries: Vec<CombatantId>,
    /// Encounters before the day ends at a long rest.
    pub encounters_per_long_rest: u32,
    /// Encounters between short rests.
    pub encounters_per_short_rest: u32,
    encounter_index: u32,
}

impl AdventuringDay {
    /// Builds a day over the arena's rosters (side A is the party) and runs
    /// the per-day usage-rate precomputation for every player character.
    pub fn new(
        arena: &mut Arena,
        encounters_per_long_rest: u32,
        encounters_per_short_rest: u32,
    ) -> Self {
        let day = Self {
            pcs: arena.side_ids(Side::A),
            adversaries: arena.side_ids(Side::B),
            encounters_per_long_rest,
            encounters_per_short_rest,
            encounter_index: 0,
        };
        for &pc in &day.pcs {
            arena.with_strategy(pc, |strategy, arena| {
                strategy.set_usage_rates(
                    pc,
                    arena,
                    encounters_per_long_rest,
                    encounters_per_short_rest,
                );
            });
        }
        day
    }

    /// Number of living player characters.
    #[must_use]
    pub fn survivors(&self, arena: &Arena) -> u32 {
        u32::try_from(self.pcs.iter().filter(|&&pc| arena.alive(pc)).count())
            .expect("party size fits in u32")
    }

    /// Resolves one adventuring day: encounters until the long-rest budget
    /// runs out or the whole party is down.
    pub fn run(&mut self, arena: &mut Arena) {
        self.one_encounter(arena);

        while self.pcs.iter().any(|&pc| arena.alive(pc))
            && self.encounter_index < self.encounters_per_long_rest
        {
            arena.clear_effects();
            if self.encounter_index % self.encounters_per_short_rest == 0 {
                self.take_short_rest(arena);
            } else {
                self.reset_pcs(arena);
            }
            self.reset_adversaries(arena);
            self.one_encounter(arena);
        }
    }

    /// Resolves one encounter and fires `end_encounter` hooks for surviving
    /// player characters.
    pub fn one_encounter(&mut self, arena: &mut Arena) {
        let mut encounter = Encounter::new(
            arena,
            self.encounter_index % self.encounters_per_short_rest,
            self.encounter_index,
        );
        encounter.run(arena);

        for &pc in &self.pcs {
            if arena.alive(pc) {
                arena.with_strategy(pc, |strategy, arena| {
                    strategy.end_encounter(pc, &encounter, arena);
                });
            }
        }

        self.encounter_index += 1;
    }

    /// Refreshes the adversaries back to their template state.
    pub fn reset_adversaries(&mut self, arena: &mut Arena) {
        for &id in &self.adversaries {
            arena.reset_conditions(id);
            arena.with_strategy(id, |strategy, arena| strategy.reset_conditions(id, arena));
            arena.reset_hp(id);
        }
    }

    /// Resets the party's condition state without resting.
    pub fn reset_pcs(&mut self, arena: &mut Arena) {
        for &pc in &self.pcs {
            arena.reset_conditions(pc);
            arena.with_strategy(pc, |strategy, arena| strategy.reset_conditions(pc, arena));
        }
    }

    /// The party takes a short rest: condition reset, short-rest features,
    /// ability-damage recovery and hit-dice healing.
    pub fn take_short_rest(&mut self, arena: &mut Arena) {
        if self.pcs.iter().any(|&pc| arena.combatant(pc).verbose) {
            debug!("The party took a short rest");
        }

        for &pc in &self.pcs {
            arena.reset_conditions(pc);
            arena.with_strategy(pc, |strategy, arena| strategy.reset_conditions(pc, arena));
            arena.with_strategy(pc, |strategy, arena| strategy.reset_short_rest(pc, arena));

            {
                let c = arena.combatant_mut(pc);
                c.abilities = c.base_abilities;
            }

            // Roll hit dice until hit points clear the threshold: half of
            // maximum, or one full die, whichever leaves less to recover.
            let (die, hit_die_modifier) = {
                let c = arena.combatant(pc);
                let modifier = c.pc.map_or(0, |pc_state| pc_state.hit_die_modifier);
                (c.hp_formula.die(), modifier)
            };
            loop {
                let c = arena.combatant(pc);
                let threshold =
                    c.max_hp - (c.max_hp / 2).min(die.sides() + hit_die_modifier);
                let has_dice = c.pc.is_some_and(|pc_state| pc_state.hit_dice > 0);
                if !(c.hp > 0 && has_dice && c.hp <= threshold) {
                    break;
                }
                let con = c.abilities.get(crate::stats::Ability::Con);
                if let Some(pc_state) = &mut arena.combatant_mut(pc).pc {
                    pc_state.hit_dice -= 1;
                }
                let healing = die.roll(arena.rng_mut()) + con + hit_die_modifier;
                arena.heal(pc, healing, false);
            }

            arena.with_strategy(pc, |strategy, arena| strategy.after_short_rest(pc, arena));
        }
    }

    /// The party takes a long rest, restoring everything and restarting the
    /// day's encounter count.
    pub fn take_long_rest(&mut self, arena: &mut Arena) {
        if self.pcs.iter().any(|&pc| arena.combatant(pc).verbose) {
            debug!("The party took a long rest");
        }

        self.encounter_index = 0;
        arena.clear_effects();

        for &pc in &self.pcs {
            arena.reset_conditions(pc);
            arena.with_strategy(pc, |strategy, arena| strategy.reset_conditions(pc, arena));
            arena.reset_hp(pc);
            arena.with_strategy(pc, |strategy, arena| strategy.reset_short_rest(pc, arena));
            arena.with_strategy(pc, |strategy, arena| strategy.reset_long_rest(pc, arena));
        }
    }
}
