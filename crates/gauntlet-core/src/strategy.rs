//! The decision-strategy interface.
//!
//! A strategy decides what a combatant does with its turn. The engine owns
//! sequencing and legality (action economy, triggers, incapacitation); the
//! strategy reads the combatant's state and the encounter's helper queries
//! and calls back into the engine's attack, save and effect primitives.
//!
//! Strategies live beside their combatants in the arena and are detached
//! while running, so a strategy holds `&mut Arena` without aliasing its own
//! storage slot.

use crate::arena::Arena;
use crate::combatant::CombatantId;
use crate::encounter::Encounter;

/// Per-combatant decision logic and lifecycle hooks.
///
/// Only `take_turn` is required. The other hooks are the override points the
/// engine calls at encounter boundaries and rests; the defaults do nothing.
pub trait Strategy {
    /// Takes the combatant's turn. The engine has already granted the action
    /// economy and fired start-of-turn effects.
    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena);

    /// Whether this combatant contributes a lair action at initiative 20.
    fn has_lair_action(&self) -> bool {
        false
    }

    /// Takes the lair action. Only called when [`Strategy::has_lair_action`]
    /// is true and the owner is conscious and able.
    fn lair_action(&mut self, _me: CombatantId, _enc: &Encounter, _arena: &mut Arena) {}

    /// Spends one legendary action at the end of another combatant's turn.
    fn legendary_action(&mut self, _me: CombatantId, _enc: &Encounter, _arena: &mut Arena) {}

    /// Registers encounter-wide effects before the first round.
    fn start_encounter(&mut self, _me: CombatantId, _enc: &Encounter, _arena: &mut Arena) {}

    /// Runs after the encounter resolves, for survivors only (out-of-combat
    /// healing and the like).
    fn end_encounter(&mut self, _me: CombatantId, _enc: &Encounter, _arena: &mut Arena) {}

    /// Runs at the very end of the combatant's own turn, after end-of-turn
    /// effects have fired.
    fn end_turn(&mut self, _me: CombatantId, _enc: &Encounter, _arena: &mut Arena) {}

    /// Re-derives strategy state when condition state resets between
    /// encounters (recharge flags, armor quirks, pre-cast buffs).
    fn reset_conditions(&mut self, _me: CombatantId, _arena: &mut Arena) {}

    /// Restores short-rest resources; also the hook for spending them on the
    /// way in (Second Wind before it refreshes).
    fn reset_short_rest(&mut self, _me: CombatantId, _arena: &mut Arena) {}

    /// Runs after the rest of the short-rest sequence (hit-dice healing
    /// included) has finished.
    fn after_short_rest(&mut self, _me: CombatantId, _arena: &mut Arena) {}

    /// Restores long-rest resources.
    fn reset_long_rest(&mut self, _me: CombatantId, _arena: &mut Arena) {}

    /// Precomputes "how much should be left by encounter N" rationing
    /// schedules for the adventuring day.
    fn set_usage_rates(
        &mut self,
        _me: CombatantId,
        _arena: &mut Arena,
        _encounters_per_long_rest: u32,
        _encounters_per_short_rest: u32,
    ) {
    }
}

/// A strategy that does nothing; placeholder for test dummies.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inert;

impl Strategy for Inert {
    fn take_turn(&mut self, _me: CombatantId, _enc: &Encounter, _arena: &mut Arena) {}
}

/// Linear rationing with the remainder consumed in the *later* encounters:
/// entry `i` is how many uses should still remain after encounter `i`.
///
/// With 14 uses over 6 encounters the per-encounter budget is
/// `[2, 2, 2, 2, 3, 3]` and the remaining-use schedule `[12, 10, 8, 6, 3, 0]`.
#[must_use]
pub fn ration_late(total: u32, encounters: u32) -> Vec<u32> {
    let base = total / encounters;
    let remainder = total % encounters;
    let mut remaining = total;
    (0..encounters)
        .map(|i| {
            let spend = base + u32::from(encounters - i <= remainder);
            remaining -= spend;
            remaining
        })
        .collect()
}

/// Linear rationing with the remainder consumed in the *earlier* encounters.
///
/// With 1 use over 2 encounters the schedule is `[0, 0]`: the use is expected
/// to be spent in the first fight.
#[must_use]
pub fn ration_early(total: u32, encounters: u32) -> Vec<u32> {
    let base = total / encounters;
    let remainder = total % encounters;
    let mut remaining = total;
    (0..encounters)
        .map(|i| {
            let spend = base + u32::from(i < remainder);
            remaining -= spend;
            remaining
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ration_late_spends_remainder_last() {
        assert_eq!(ration_late(14, 6), vec![12, 10, 8, 6, 3, 0]);
        assert_eq!(ration_late(3, 2), vec![2, 0]);
        assert_eq!(ration_late(0, 2), vec![0, 0]);
    }

    #[test]
    fn ration_early_spends_remainder_first() {
        assert_eq!(ration_early(1, 2), vec![0, 0]);
        assert_eq!(ration_early(3, 2), vec![1, 0]);
        assert_eq!(ration_early(0, 2), vec![0, 0]);
    }

    #[test]
    fn rationing_always_ends_at_zero() {
        for total in 0..20 {
            for encounters in 1..8 {
                assert_eq!(*ration_late(total, encounters).last().unwrap(), 0);
                assert_eq!(*ration_early(total, encounters).last().unwrap(), 0);
            }
        }
    }
}
