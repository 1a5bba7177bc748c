//! Property-based invariants.

use dicebag::DiceRng;
use proptest::prelude::*;

use crate::arena::Arena;
use crate::combatant::Side;
use crate::effect::EffectKind;
use crate::stats::{Ability, DamageType, DamageTypes};
use crate::strategy::Inert;

use super::helpers::{dummy, set_hp};

proptest! {
    /// Hit points stay within `[0, max]` under any interleaving of damage
    /// and healing.
    #[test]
    fn hp_stays_in_bounds(
        seed in any::<u64>(),
        ops in prop::collection::vec((0..80i32, 0..80i32, any::<bool>()), 1..40),
    ) {
        let mut arena = Arena::new(DiceRng::from_seed(seed));
        let id = dummy(&mut arena, Side::A, "d", 37);

        for (damage, healing, magic) in ops {
            arena.take_damage(id, damage, DamageType::Fire, None, false, 0, None);
            let c = arena.combatant(id);
            prop_assert!(c.hp >= 0 && c.hp <= c.max_hp);

            arena.heal(id, healing, magic);
            let c = arena.combatant(id);
            prop_assert!(c.hp >= 0 && c.hp <= c.max_hp);
        }
    }

    /// Resistance-then-vulnerability composes to halve-then-double with the
    /// documented rounding: taken damage is `(d / 2) * 2`.
    #[test]
    fn resist_and_vuln_compose(damage in 0..500i32) {
        let mut arena = Arena::new(DiceRng::from_seed(0));
        let id = dummy(&mut arena, Side::A, "d", 10_000);
        arena.combatant_mut(id).resistances |= DamageTypes::FIRE;
        arena.combatant_mut(id).vulnerabilities |= DamageTypes::FIRE;

        let (taken, _) = arena.take_damage(id, damage, DamageType::Fire, None, false, 0, None);
        prop_assert_eq!(taken, damage / 2 * 2);
    }

    /// Saving-throw rolls are bounded by the d20 range plus modifiers.
    #[test]
    fn save_rolls_stay_in_range(
        seed in any::<u64>(),
        modifier in -8..12i32,
        adv in any::<bool>(),
        disadv in any::<bool>(),
    ) {
        let mut arena = Arena::new(DiceRng::from_seed(seed));
        let id = dummy(&mut arena, Side::A, "d", 10);
        arena.combatant_mut(id).save_modifiers[Ability::Wis.index()] = modifier;

        let roll = arena.roll_save(id, Ability::Wis, adv, disadv);
        prop_assert!(roll >= 1 + modifier);
        prop_assert!(roll <= 20 + modifier);
    }

    /// Creating and ending a condition effect restores every counter it
    /// touched, for arbitrary parameters.
    #[test]
    fn condition_round_trip(
        seed in any::<u64>(),
        save_dc in -10..40i32,
        duration in 1..30i32,
    ) {
        let mut arena = Arena::new(DiceRng::from_seed(seed));
        let source = dummy(&mut arena, Side::B, "s", 20);
        let target = dummy(&mut arena, Side::A, "t", 20);

        let before = arena.combatant(target).cond.clone();
        let id = arena.apply_effect(
            EffectKind::Stunned { source, target, save_dc },
            Some(duration),
        );
        prop_assert_eq!(arena.combatant(target).cond.stunned, 1);
        arena.end_effect(id);
        arena.end_effect(id);
        prop_assert_eq!(&arena.combatant(target).cond, &before);
    }

    /// Target selection never returns a downed combatant and never errors.
    #[test]
    fn targeting_only_returns_the_living(seed in any::<u64>(), downed in 0..4usize) {
        let mut arena = Arena::new(DiceRng::from_seed(seed));
        let chooser = dummy(&mut arena, Side::A, "chooser", 10);
        let foes: Vec<_> = (0..4)
            .map(|i| dummy(&mut arena, Side::B, &format!("foe{i}"), 10))
            .collect();
        let enc = crate::encounter::Encounter::new(&mut arena, 0, 0);

        for &foe in foes.iter().take(downed) {
            set_hp(&mut arena, foe, 10);
            arena.take_damage(foe, 100, DamageType::Fire, None, false, 0, None);
        }

        for n in 1..6 {
            for target in enc.choose_targets(&mut arena, chooser, n, false) {
                prop_assert!(arena.alive(target));
            }
        }
    }
}

// Inert is exercised implicitly everywhere; keep a direct anchor so the
// strategy trait's object safety is pinned.
#[test]
fn strategy_trait_is_object_safe() {
    let _boxed: Box<dyn crate::strategy::Strategy> = Box::new(Inert);
}
