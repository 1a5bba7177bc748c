//! Combat-resolution and duration-subsystem semantics.

use dicebag::{DiceExpr, D10, D6};

use crate::combatant::Side;
use crate::effect::EffectKind;
use crate::stats::{Ability, DamageType, DamageTypes, Skill, Traits};
use crate::weapon::{AttackOptions, AttackOutcome, Weapon};

use super::helpers::{arena, dummy, encounter, set_hp, CountingStrategy};

// =============================================================================
// Damage pipeline
// =============================================================================

#[test]
fn damage_clamps_at_zero() {
    let mut arena = arena();
    let id = dummy(&mut arena, Side::A, "d", 10);
    let (taken, _) = arena.take_damage(id, 50, DamageType::Fire, None, false, 0, None);
    assert_eq!(taken, 50);
    assert_eq!(arena.combatant(id).hp, 0);
}

#[test]
fn heal_clamps_at_max() {
    let mut arena = arena();
    let id = dummy(&mut arena, Side::A, "d", 10);
    arena.take_damage(id, 3, DamageType::Fire, None, false, 0, None);
    arena.heal(id, 100, false);
    assert_eq!(arena.combatant(id).hp, 10);
}

#[test]
fn resistance_halves_with_floor() {
    let mut arena = arena();
    let id = dummy(&mut arena, Side::A, "d", 100);
    arena.combatant_mut(id).resistances |= DamageTypes::FIRE;
    let (taken, _) = arena.take_damage(id, 5, DamageType::Fire, None, false, 0, None);
    assert_eq!(taken, 2);
}

#[test]
fn vulnerability_doubles() {
    let mut arena = arena();
    let id = dummy(&mut arena, Side::A, "d", 100);
    arena.combatant_mut(id).vulnerabilities |= DamageTypes::FIRE;
    let (taken, _) = arena.take_damage(id, 5, DamageType::Fire, None, false, 0, None);
    assert_eq!(taken, 10);
}

#[test]
fn resistance_then_vulnerability_rounding() {
    // 5 -> floor(5/2) = 2 -> *2 = 4, not 5: halving rounds before doubling
    let mut arena = arena();
    let id = dummy(&mut arena, Side::A, "d", 100);
    arena.combatant_mut(id).resistances |= DamageTypes::FIRE;
    arena.combatant_mut(id).vulnerabilities |= DamageTypes::FIRE;
    let (taken, _) = arena.take_damage(id, 5, DamageType::Fire, None, false, 0, None);
    assert_eq!(taken, 4);

    let (taken, _) = arena.take_damage(id, 6, DamageType::Fire, None, false, 0, None);
    assert_eq!(taken, 6);
}

#[test]
fn immunity_zeroes_damage() {
    let mut arena = arena();
    let id = dummy(&mut arena, Side::A, "d", 10);
    arena.combatant_mut(id).immunities |= DamageTypes::POISON;
    let (taken, _) = arena.take_damage(id, 50, DamageType::Poison, None, false, 0, None);
    assert_eq!(taken, 0);
    assert_eq!(arena.combatant(id).hp, 10);
}

#[test]
fn heavy_armor_master_reduces_physical_damage() {
    let mut arena = arena();
    let id = dummy(&mut arena, Side::A, "d", 100);
    arena.combatant_mut(id).traits |= Traits::HEAVY_ARMOR_MASTER;

    let (taken, _) = arena.take_damage(id, 5, DamageType::Slashing, None, false, 0, None);
    assert_eq!(taken, 2);

    // Reduction below zero deals nothing
    let (taken, _) = arena.take_damage(id, 3, DamageType::Piercing, None, false, 0, None);
    assert_eq!(taken, 0);

    // Non-physical damage is unaffected
    let (taken, _) = arena.take_damage(id, 5, DamageType::Fire, None, false, 0, None);
    assert_eq!(taken, 5);
}

#[test]
fn secondary_component_resolves_independently() {
    let mut arena = arena();
    let id = dummy(&mut arena, Side::A, "d", 100);
    arena.combatant_mut(id).immunities |= DamageTypes::POISON;
    let (primary, secondary) = arena.take_damage(
        id,
        7,
        DamageType::Piercing,
        None,
        false,
        9,
        Some(DamageType::Poison),
    );
    assert_eq!(primary, 7);
    assert_eq!(secondary, 0);
    assert_eq!(arena.combatant(id).hp, 93);
}

#[test]
fn evasion_asymmetry() {
    let mut arena = arena();
    let id = dummy(&mut arena, Side::A, "d", 100);
    arena.combatant_mut(id).traits |= Traits::EVASION;

    // Guaranteed success: Evasion negates everything
    let saved = arena.half_saving_throw(
        id,
        Ability::Dex,
        -100,
        40,
        DamageType::Fire,
        0,
        None,
        false,
        false,
        None,
    );
    assert!(saved);
    assert_eq!(arena.combatant(id).hp, 100);

    // Guaranteed failure: Evasion still halves
    let saved = arena.half_saving_throw(
        id,
        Ability::Dex,
        100,
        40,
        DamageType::Fire,
        0,
        None,
        false,
        false,
        None,
    );
    assert!(!saved);
    assert_eq!(arena.combatant(id).hp, 80);
}

#[test]
fn half_save_without_evasion() {
    let mut arena = arena();
    let id = dummy(&mut arena, Side::A, "d", 100);

    // Failure takes full damage
    arena.half_saving_throw(
        id,
        Ability::Dex,
        100,
        40,
        DamageType::Fire,
        0,
        None,
        false,
        false,
        None,
    );
    assert_eq!(arena.combatant(id).hp, 60);

    // Success takes half, floored
    arena.half_saving_throw(
        id,
        Ability::Dex,
        -100,
        41,
        DamageType::Fire,
        0,
        None,
        false,
        false,
        None,
    );
    assert_eq!(arena.combatant(id).hp, 40);
}

#[test]
fn concentration_breaks_on_failed_check() {
    let mut arena = arena();
    let caster = dummy(&mut arena, Side::A, "caster", 50);
    // Hopeless Constitution saves
    arena.combatant_mut(caster).save_modifiers[Ability::Con.index()] = -100;

    arena.apply_effect(
        EffectKind::Bless {
            caster,
            targets: vec![caster],
        },
        Some(10),
    );
    assert_eq!(arena.combatant(caster).cond.blessed, 1);

    arena.take_damage(caster, 5, DamageType::Fire, None, false, 0, None);
    assert!(arena.combatant(caster).cond.concentration.is_none());
    assert_eq!(arena.combatant(caster).cond.blessed, 0);
}

#[test]
fn concentration_holds_on_certain_save() {
    let mut arena = arena();
    let caster = dummy(&mut arena, Side::A, "caster", 50);
    arena.combatant_mut(caster).save_modifiers[Ability::Con.index()] = 100;

    arena.apply_effect(
        EffectKind::Bless {
            caster,
            targets: vec![caster],
        },
        Some(10),
    );
    arena.take_damage(caster, 5, DamageType::Fire, None, false, 0, None);
    assert!(arena.combatant(caster).cond.concentration.is_some());
}

#[test]
fn death_ward_catches_the_drop() {
    let mut arena = arena();
    let id = dummy(&mut arena, Side::A, "d", 10);
    arena.combatant_mut(id).cond.death_ward = true;

    arena.take_damage(id, 30, DamageType::Fire, None, false, 0, None);
    assert_eq!(arena.combatant(id).hp, 1);
    assert!(!arena.combatant(id).cond.death_ward);
    assert!(!arena.combatant(id).cond.prone);

    // The second drop sticks
    arena.take_damage(id, 30, DamageType::Fire, None, false, 0, None);
    assert_eq!(arena.combatant(id).hp, 0);
    assert!(arena.combatant(id).cond.prone);
}

#[test]
fn unconsciousness_releases_grapples_and_swallows() {
    let mut arena = arena();
    let grappler = dummy(&mut arena, Side::B, "grappler", 30);
    let held = dummy(&mut arena, Side::A, "held", 30);
    let swallowed = dummy(&mut arena, Side::A, "swallowed", 30);

    arena.apply_effect(
        EffectKind::Grapple {
            grappler,
            target: held,
            restrained: true,
            stunned: true,
            escape_priority: false,
        },
        None,
    );
    arena.apply_effect(
        EffectKind::Swallowed {
            swallower: grappler,
            target: swallowed,
            threshold: 30,
            save_dc: 14,
        },
        None,
    );
    assert_eq!(arena.combatant(held).cond.restrained, 1);
    assert_eq!(arena.combatant(held).cond.stunned, 1);
    assert_eq!(arena.combatant(swallowed).cond.blinded, 1);
    assert_eq!(arena.combatant(swallowed).cond.restrained, 1);

    arena.take_damage(grappler, 100, DamageType::Fire, None, false, 0, None);

    // Everything the downed creature maintained is released, with counters
    // back at their pre-effect values
    assert_eq!(arena.combatant(held).cond.restrained, 0);
    assert_eq!(arena.combatant(held).cond.stunned, 0);
    assert!(arena.combatant(held).cond.grappled.is_empty());
    assert_eq!(arena.combatant(swallowed).cond.blinded, 0);
    assert_eq!(arena.combatant(swallowed).cond.restrained, 0);
    assert!(arena.combatant(swallowed).cond.swallowed.is_none());
    assert!(arena.combatant(grappler).cond.swallowed_creatures.is_empty());
}

// =============================================================================
// Duration lifecycle
// =============================================================================

/// Every creatable effect kind must restore all counters and list
/// memberships when ended, exactly once.
#[test]
fn effect_round_trip_is_identity() {
    let weapon = Weapon::new(DiceExpr::single(D6), DamageType::Force);
    let kinds = |a, b| {
        vec![
            EffectKind::Bleeding {
                target: b,
                dice: DiceExpr::single(D10),
                damage_type: DamageType::Slashing,
                wounds: 1,
            },
            EffectKind::Grapple {
                grappler: a,
                target: b,
                restrained: true,
                stunned: true,
                escape_priority: true,
            },
            EffectKind::Engulfed {
                engulfer: a,
                target: b,
                escape_dc: 14,
                blinds: true,
            },
            EffectKind::Frightened {
                source: a,
                target: b,
                save_dc: 13,
            },
            EffectKind::FrightenedOneTurn { target: b },
            EffectKind::Paralyzed {
                source: a,
                target: b,
                save_dc: 10,
            },
            EffectKind::Poisoned {
                source: a,
                target: b,
                save_dc: 12,
            },
            EffectKind::Stunned {
                source: a,
                target: b,
                save_dc: 15,
            },
            EffectKind::Slowed {
                source: a,
                target: b,
                save_dc: 17,
            },
            EffectKind::WebRestrained {
                target: b,
                check_dc: 12,
            },
            EffectKind::Reckless { target: b },
            EffectKind::TurnedUndead {
                turner: a,
                target: b,
            },
            EffectKind::StuckWeapon {
                target: b,
                check_dc: 11,
            },
            EffectKind::GuidingBolt {
                caster: a,
                target: b,
            },
            EffectKind::ViciousMockery { target: b },
            EffectKind::Shield { caster: b },
            EffectKind::Bless {
                caster: a,
                targets: vec![a, b],
            },
            EffectKind::Bane {
                caster: a,
                targets: vec![b],
            },
            EffectKind::SpiritGuardians {
                caster: a,
                targets: vec![b],
                dice: 3,
                save_dc: 13,
                damage_type: DamageType::Radiant,
            },
            EffectKind::GreaterInvisibility {
                caster: a,
                target: b,
            },
            EffectKind::ShieldOfFaith { caster: a },
            EffectKind::SpiritualWeapon {
                caster: a,
                weapon: weapon.clone(),
            },
        ]
    };

    let probe = {
        let mut probe_arena = arena();
        let a = dummy(&mut probe_arena, Side::A, "a", 20);
        let b = dummy(&mut probe_arena, Side::B, "b", 20);
        kinds(a, b)
    };

    for (index, _) in probe.iter().enumerate() {
        let mut arena = arena();
        let a = dummy(&mut arena, Side::A, "a", 20);
        let b = dummy(&mut arena, Side::B, "b", 20);
        let kind = kinds(a, b).swap_remove(index);
        let label = format!("{kind:?}");

        let before_a = (arena.combatant(a).cond.clone(), arena.combatant(a).base_armor_class);
        let before_b = (arena.combatant(b).cond.clone(), arena.combatant(b).base_armor_class);

        let id = arena.apply_effect(kind, Some(5));
        arena.end_effect(id);
        // A second end must be a no-op
        arena.end_effect(id);

        assert_eq!(
            before_a,
            (arena.combatant(a).cond.clone(), arena.combatant(a).base_armor_class),
            "round trip failed for {label}"
        );
        assert_eq!(
            before_b,
            (arena.combatant(b).cond.clone(), arena.combatant(b).base_armor_class),
            "round trip failed for {label}"
        );
        assert!(arena.effects().is_ended(id));
    }
}

#[test]
fn swallow_round_trip_restores_counters_and_leaves_prone() {
    let mut arena = arena();
    let swallower = dummy(&mut arena, Side::B, "s", 30);
    let target = dummy(&mut arena, Side::A, "t", 30);

    let id = arena.apply_effect(
        EffectKind::Swallowed {
            swallower,
            target,
            threshold: 30,
            save_dc: 14,
        },
        None,
    );
    arena.end_effect(id);

    let t = arena.combatant(target);
    assert_eq!(t.cond.blinded, 0);
    assert_eq!(t.cond.restrained, 0);
    assert!(t.cond.swallowed.is_none());
    assert!(t.cond.start_turn.is_empty());
    assert!(t.cond.end_turn.is_empty());
    // Regurgitated creatures land prone; that is the one deliberate residue
    assert!(t.cond.prone);
}

#[test]
fn bleeding_reapplication_stacks_wounds() {
    let mut arena = arena();
    let target = dummy(&mut arena, Side::A, "t", 100);

    let first = arena.apply_effect(
        EffectKind::Bleeding {
            target,
            dice: DiceExpr::single(D10),
            damage_type: DamageType::Slashing,
            wounds: 1,
        },
        Some(4),
    );
    let second = arena.apply_effect(
        EffectKind::Bleeding {
            target,
            dice: DiceExpr::single(D10),
            damage_type: DamageType::Slashing,
            wounds: 1,
        },
        Some(10),
    );

    // One instance, two wounds, the longer clock
    assert_eq!(first, second);
    assert_eq!(arena.combatant(target).cond.start_turn.len(), 1);
    match arena.effects().kind(first) {
        EffectKind::Bleeding { wounds, .. } => assert_eq!(*wounds, 2),
        other => panic!("unexpected kind {other:?}"),
    }
    assert_eq!(arena.effects().get(first).remaining, Some(10));

    // Each stack rolls its own damage, applied as one hit
    arena.fire_start_of_turn(target);
    let lost = 100 - arena.combatant(target).hp;
    assert!((2..=20).contains(&lost), "two d10 wounds dealt {lost}");
    assert_eq!(arena.effects().get(first).remaining, Some(9));
}

#[test]
fn magical_healing_ends_bleeding() {
    let mut arena = arena();
    let target = dummy(&mut arena, Side::A, "t", 100);
    let id = arena.apply_effect(
        EffectKind::Bleeding {
            target,
            dice: DiceExpr::single(D10),
            damage_type: DamageType::Slashing,
            wounds: 1,
        },
        Some(10),
    );

    // Mundane healing does not help
    arena.heal(target, 1, false);
    assert!(!arena.effects().is_ended(id));

    arena.heal(target, 1, true);
    assert!(arena.effects().is_ended(id));
    assert!(arena.combatant(target).cond.start_turn.is_empty());
}

#[test]
fn guiding_bolt_consumed_unless_read_only() {
    let mut arena = arena();
    let attacker = dummy(&mut arena, Side::A, "a", 10);
    let target = dummy(&mut arena, Side::B, "t", 10);
    let id = arena.apply_effect(
        EffectKind::GuidingBolt {
            caster: attacker,
            target,
        },
        Some(2),
    );

    // Probing must not consume the one-shot
    assert!(arena.has_attack_advantage(attacker, target, true));
    assert!(!arena.effects().is_ended(id));

    // Resolving does
    assert!(arena.has_attack_advantage(attacker, target, false));
    assert!(arena.effects().is_ended(id));
    assert!(arena.combatant(target).cond.guiding_bolt.is_none());
}

#[test]
fn vicious_mockery_consumed_on_attack_roll() {
    let mut arena = arena();
    let attacker = dummy(&mut arena, Side::A, "a", 10);
    let target = dummy(&mut arena, Side::B, "t", 10);
    let id = arena.apply_effect(EffectKind::ViciousMockery { target: attacker }, Some(1));

    assert!(arena.has_attack_disadvantage(attacker, target, true));
    assert!(!arena.effects().is_ended(id));
    assert!(arena.has_attack_disadvantage(attacker, target, false));
    assert!(arena.effects().is_ended(id));
}

#[test]
fn clock_ticks_on_applier_save_on_victim() {
    let mut arena = arena();
    let source = dummy(&mut arena, Side::B, "source", 10);
    let target = dummy(&mut arena, Side::A, "target", 10);
    // The victim can never save
    arena.combatant_mut(target).save_modifiers[Ability::Wis.index()] = -100;

    let id = arena.apply_effect(
        EffectKind::Frightened {
            source,
            target,
            save_dc: 13,
        },
        Some(2),
    );

    // The victim's own turn start does not tick the clock
    arena.fire_start_of_turn(target);
    assert_eq!(arena.effects().get(id).remaining, Some(2));

    // The applier's turn start does
    arena.fire_start_of_turn(source);
    assert_eq!(arena.effects().get(id).remaining, Some(1));
    arena.fire_start_of_turn(source);
    assert!(arena.effects().is_ended(id));
    assert_eq!(arena.combatant(target).cond.frightened, 0);
}

#[test]
fn end_of_turn_save_can_end_condition_early() {
    let mut arena = arena();
    let source = dummy(&mut arena, Side::B, "source", 10);
    let target = dummy(&mut arena, Side::A, "target", 10);
    arena.combatant_mut(target).save_modifiers[Ability::Con.index()] = 100;

    let id = arena.apply_effect(
        EffectKind::Poisoned {
            source,
            target,
            save_dc: 12,
        },
        Some(10),
    );
    assert_eq!(arena.combatant(target).cond.poisoned, 1);

    let enc = encounter(&mut arena);
    arena.fire_end_of_turn(&enc, target);
    assert!(arena.effects().is_ended(id));
    assert_eq!(arena.combatant(target).cond.poisoned, 0);
}

#[test]
fn spirit_guardians_most_potent_first() {
    let mut arena = arena();
    let caster_a = dummy(&mut arena, Side::A, "a", 10);
    let caster_b = dummy(&mut arena, Side::A, "b", 10);
    let victim = dummy(&mut arena, Side::B, "v", 10);

    let weak = arena.apply_effect(
        EffectKind::SpiritGuardians {
            caster: caster_a,
            targets: vec![victim],
            dice: 3,
            save_dc: 13,
            damage_type: DamageType::Radiant,
        },
        Some(100),
    );
    let strong = arena.apply_effect(
        EffectKind::SpiritGuardians {
            caster: caster_b,
            targets: vec![victim],
            dice: 5,
            save_dc: 15,
            damage_type: DamageType::Radiant,
        },
        Some(100),
    );

    assert_eq!(
        arena.combatant(victim).cond.spirit_guardians,
        vec![strong, weak]
    );

    // Ending the potent instance promotes the weaker one
    arena.end_effect(strong);
    assert_eq!(arena.combatant(victim).cond.spirit_guardians, vec![weak]);
}

#[test]
fn swallow_regurgitates_past_damage_threshold() {
    let mut arena = arena();
    let swallower = dummy(&mut arena, Side::B, "s", 100);
    let victim = dummy(&mut arena, Side::A, "v", 30);
    // The swallower cannot keep it down
    arena.combatant_mut(swallower).save_modifiers[Ability::Con.index()] = -100;

    let id = arena.apply_effect(
        EffectKind::Swallowed {
            swallower,
            target: victim,
            threshold: 10,
            save_dc: 14,
        },
        None,
    );

    // Damage from the inside counts toward the threshold
    arena.take_damage(swallower, 12, DamageType::Piercing, Some(victim), false, 0, None);
    assert_eq!(arena.combatant(swallower).cond.damage_from_swallowed, 12);

    let enc = encounter(&mut arena);
    arena.fire_end_of_turn(&enc, victim);
    assert!(arena.effects().is_ended(id));
    assert!(arena.combatant(victim).cond.swallowed.is_none());
    assert!(arena.combatant(victim).cond.prone);
}

#[test]
fn swallow_damage_counter_resets_at_victim_turn_start() {
    let mut arena = arena();
    let swallower = dummy(&mut arena, Side::B, "s", 100);
    let victim = dummy(&mut arena, Side::A, "v", 30);
    arena.apply_effect(
        EffectKind::Swallowed {
            swallower,
            target: victim,
            threshold: 10,
            save_dc: 14,
        },
        None,
    );

    arena.take_damage(swallower, 8, DamageType::Piercing, Some(victim), false, 0, None);
    assert_eq!(arena.combatant(swallower).cond.damage_from_swallowed, 8);

    arena.fire_start_of_turn(victim);
    assert_eq!(arena.combatant(swallower).cond.damage_from_swallowed, 0);
}

#[test]
fn outside_damage_does_not_count_toward_regurgitation() {
    let mut arena = arena();
    let swallower = dummy(&mut arena, Side::B, "s", 100);
    let victim = dummy(&mut arena, Side::A, "v", 30);
    let ally = dummy(&mut arena, Side::A, "ally", 30);
    arena.apply_effect(
        EffectKind::Swallowed {
            swallower,
            target: victim,
            threshold: 10,
            save_dc: 14,
        },
        None,
    );

    arena.take_damage(swallower, 20, DamageType::Piercing, Some(ally), false, 0, None);
    assert_eq!(arena.combatant(swallower).cond.damage_from_swallowed, 0);
}

// =============================================================================
// Attack resolution
// =============================================================================

#[test]
fn paralyzed_target_promotes_hits_to_crits() {
    let mut arena = arena();
    let attacker = dummy(&mut arena, Side::A, "a", 10);
    let target = dummy(&mut arena, Side::B, "t", 1000);
    arena.combatant_mut(target).base_armor_class = -30;
    arena.combatant_mut(target).cond.paralyzed = 1;

    let weapon = Weapon::new(DiceExpr::single(D6), DamageType::Slashing);
    for _ in 0..100 {
        let outcome = arena
            .weapon_attack(attacker, &weapon, Some(target), AttackOptions::default())
            .unwrap();
        assert_ne!(outcome, AttackOutcome::Hit, "hits must promote to crits");
    }
}

#[test]
fn natural_one_always_misses() {
    let mut arena = arena();
    let attacker = dummy(&mut arena, Side::A, "a", 10);
    let target = dummy(&mut arena, Side::B, "t", 1000);
    // An unmissable target on paper
    arena.combatant_mut(target).base_armor_class = -100;
    arena.combatant_mut(attacker).attack_modifier = 100;

    let weapon = Weapon::new(DiceExpr::single(D6), DamageType::Slashing);
    let mut misses = 0;
    for _ in 0..2000 {
        let outcome = arena
            .weapon_attack(attacker, &weapon, Some(target), AttackOptions::default())
            .unwrap();
        if outcome == AttackOutcome::Miss {
            misses += 1;
        }
    }
    // Natural 1s happen about 5% of the time
    assert!(misses > 0, "natural 1 must miss despite any modifier");
}

#[test]
fn attack_against_missing_target_is_no_target() {
    let mut arena = arena();
    let attacker = dummy(&mut arena, Side::A, "a", 10);
    let weapon = Weapon::new(DiceExpr::single(D6), DamageType::Slashing);
    assert_eq!(
        arena.weapon_attack(attacker, &weapon, None, AttackOptions::default()),
        None
    );
}

#[test]
fn shield_reaction_spends_slot_and_raises_ac() {
    let mut arena = arena();
    let mage = dummy(&mut arena, Side::B, "mage", 40);
    {
        let c = arena.combatant_mut(mage);
        c.traits |= Traits::SHIELD_REACTION;
        c.spell_slots = crate::combatant::SpellSlots::new([2, 0, 0, 0, 0, 0, 0, 0, 0]);
        c.cond.reaction = true;
    }
    let base_ac = arena.combatant(mage).armor_class();

    assert!(arena.shield_reaction(mage));
    assert_eq!(arena.combatant(mage).armor_class(), base_ac + 5);
    assert_eq!(arena.combatant(mage).spell_slots.remaining(1), 1);
    assert!(!arena.combatant(mage).cond.reaction);

    // No reaction left: the second attempt cannot fire
    assert!(!arena.shield_reaction(mage));
}

#[test]
fn shield_reaction_requires_a_slot() {
    let mut arena = arena();
    let mage = dummy(&mut arena, Side::B, "mage", 40);
    arena.combatant_mut(mage).traits |= Traits::SHIELD_REACTION;
    arena.combatant_mut(mage).cond.reaction = true;
    assert!(!arena.shield_reaction(mage));
    assert!(arena.combatant(mage).cond.reaction);
}

#[test]
fn uncanny_dodge_halves_attack_damage() {
    let mut arena = arena();
    let attacker = dummy(&mut arena, Side::B, "a", 10);
    let rogue = dummy(&mut arena, Side::A, "r", 100);
    arena.combatant_mut(rogue).traits |= Traits::UNCANNY_DODGE;
    arena.combatant_mut(rogue).cond.reaction = true;

    let (taken, _) = arena.take_damage(rogue, 20, DamageType::Slashing, Some(attacker), false, 0, None);
    assert_eq!(taken, 10);
    assert!(!arena.combatant(rogue).cond.reaction);

    // Reaction spent: full damage now
    let (taken, _) = arena.take_damage(rogue, 20, DamageType::Slashing, Some(attacker), false, 0, None);
    assert_eq!(taken, 20);
}

// =============================================================================
// Spell catalog
// =============================================================================

#[test]
fn bane_supersedes_bless_concentration() {
    let mut arena = arena();
    let caster = dummy(&mut arena, Side::A, "caster", 30);
    let foe = dummy(&mut arena, Side::B, "foe", 30);
    arena.combatant_mut(caster).spell_slots =
        crate::combatant::SpellSlots::new([4, 0, 0, 0, 0, 0, 0, 0, 0]);
    // The foe cannot resist
    arena.combatant_mut(foe).save_modifiers[crate::stats::Ability::Cha.index()] = -100;

    crate::spells::bless(&mut arena, caster, 1, &[caster]);
    assert_eq!(arena.combatant(caster).cond.blessed, 1);

    // A second concentration spell replaces the first
    crate::spells::bane(&mut arena, caster, 1, &[foe]);
    assert_eq!(arena.combatant(caster).cond.blessed, 0);
    assert_eq!(arena.combatant(foe).cond.baned, 1);
    assert_eq!(arena.combatant(caster).spell_slots.remaining(1), 2);
}

#[test]
fn shield_of_faith_adjusts_base_armor_class() {
    let mut arena = arena();
    let caster = dummy(&mut arena, Side::A, "caster", 30);
    arena.combatant_mut(caster).spell_slots =
        crate::combatant::SpellSlots::new([2, 0, 0, 0, 0, 0, 0, 0, 0]);
    let base = arena.combatant(caster).armor_class();

    crate::spells::shield_of_faith(&mut arena, caster, 1);
    assert_eq!(arena.combatant(caster).armor_class(), base + 2);

    let id = arena.combatant(caster).cond.concentration.expect("concentrating");
    arena.end_effect(id);
    assert_eq!(arena.combatant(caster).armor_class(), base);
}

#[test]
fn vicious_mockery_marks_the_target_on_a_failed_save() {
    let mut arena = arena();
    let caster = dummy(&mut arena, Side::A, "caster", 30);
    let target = dummy(&mut arena, Side::B, "target", 30);
    arena.combatant_mut(target).save_modifiers[Ability::Wis.index()] = -100;

    crate::spells::vicious_mockery(&mut arena, caster, target);
    assert!(arena.combatant(target).cond.vicious_mockery.is_some());
    assert!(arena.combatant(target).hp < 30, "the insult stings");
}

// =============================================================================
// Turn flow
// =============================================================================

#[test]
fn turned_creature_gets_no_action_or_reaction() {
    let mut arena = arena();
    let turner = dummy(&mut arena, Side::A, "turner", 10);
    let undead = dummy(&mut arena, Side::B, "undead", 10);
    arena.apply_effect(
        EffectKind::TurnedUndead {
            turner,
            target: undead,
        },
        Some(10),
    );

    let mut enc = encounter(&mut arena);
    enc.one_round(&mut arena);

    let u = arena.combatant(undead);
    assert!(!u.cond.action);
    assert!(!u.cond.reaction);
    assert!(u.cond.bonus);
    // The unturned side got its full economy
    assert!(arena.combatant(turner).cond.action);
    // Taking a turn clears surprise for everyone who acted
    assert!(!arena.combatant(turner).cond.surprised);
    assert!(!u.cond.surprised);
}

#[test]
fn web_escape_consumes_the_action() {
    let mut arena = arena();
    let _foe = dummy(&mut arena, Side::B, "foe", 10);
    let stuck = dummy(&mut arena, Side::A, "stuck", 10);
    // Hopeless Strength checks: never escapes
    arena.combatant_mut(stuck).skill_modifiers[Skill::Strength.index()] = -100;
    let id = arena.apply_effect(
        EffectKind::WebRestrained {
            target: stuck,
            check_dc: 12,
        },
        None,
    );

    let mut enc = encounter(&mut arena);
    enc.one_round(&mut arena);

    assert!(!arena.effects().is_ended(id));
    assert!(!arena.combatant(stuck).cond.action, "the check ate the action");
    assert_eq!(arena.combatant(stuck).cond.restrained, 1);
}

#[test]
fn stuck_weapon_priority_action_replaces_the_turn() {
    let mut arena = arena();
    let (strategy, turns, _) = CountingStrategy::new();
    let fighter = {
        let c = crate::combatant::Combatant::new("fighter", Side::A, false);
        arena.spawn(c, Box::new(strategy))
    };
    set_hp(&mut arena, fighter, 10);
    let _foe = dummy(&mut arena, Side::B, "foe", 10);

    // Retrieval is guaranteed to succeed
    arena.combatant_mut(fighter).skill_modifiers[Skill::Strength.index()] = 100;
    let id = arena.apply_effect(
        EffectKind::StuckWeapon {
            target: fighter,
            check_dc: 11,
        },
        None,
    );

    let mut enc = encounter(&mut arena);
    enc.one_round(&mut arena);

    // The forced action ran instead of the strategy and freed the weapon
    assert_eq!(turns.load(std::sync::atomic::Ordering::Relaxed), 0);
    assert!(arena.effects().is_ended(id));

    enc.one_round(&mut arena);
    assert_eq!(turns.load(std::sync::atomic::Ordering::Relaxed), 1);
}

#[test]
fn legendary_actions_fire_on_other_turns() {
    let mut arena = arena();
    let hero = dummy(&mut arena, Side::A, "hero", 10);
    let (strategy, _, legendary) = CountingStrategy::new();
    let boss = {
        let mut c = crate::combatant::Combatant::new("boss", Side::B, false);
        c.legendary_actions = 3;
        arena.spawn(c, Box::new(strategy))
    };
    set_hp(&mut arena, boss, 50);
    arena.combatant_mut(boss).cond.legendary_remaining = 3;
    arena.apply_effect(EffectKind::LegendaryAction { creature: boss }, None);

    let enc = encounter(&mut arena);
    arena.fire_end_of_turn(&enc, hero);
    assert_eq!(legendary.load(std::sync::atomic::Ordering::Relaxed), 1);
    assert_eq!(arena.combatant(boss).cond.legendary_remaining, 2);

    // An incapacitated legendary creature stays down
    arena.combatant_mut(boss).cond.stunned = 1;
    arena.fire_end_of_turn(&enc, hero);
    assert_eq!(legendary.load(std::sync::atomic::Ordering::Relaxed), 1);
}

// =============================================================================
// Targeting
// =============================================================================

#[test]
fn swallowed_chooser_must_target_swallower() {
    let mut arena = arena();
    let victim = dummy(&mut arena, Side::A, "v", 10);
    let swallower = dummy(&mut arena, Side::B, "s", 50);
    let _other = dummy(&mut arena, Side::B, "other", 50);
    arena.apply_effect(
        EffectKind::Swallowed {
            swallower,
            target: victim,
            threshold: 30,
            save_dc: 14,
        },
        None,
    );

    let enc = encounter(&mut arena);
    for _ in 0..20 {
        assert_eq!(enc.choose_target(&mut arena, victim), Some(swallower));
    }
}

#[test]
fn no_living_target_returns_sentinel() {
    let mut arena = arena();
    let hero = dummy(&mut arena, Side::A, "h", 10);
    let foe = dummy(&mut arena, Side::B, "f", 10);
    let enc = encounter(&mut arena);

    set_hp(&mut arena, foe, 10);
    arena.take_damage(foe, 100, DamageType::Fire, None, false, 0, None);
    assert_eq!(enc.choose_target(&mut arena, hero), None);
    assert!(enc.choose_targets(&mut arena, hero, 3, false).is_empty());
}

#[test]
fn requesting_more_unique_targets_than_available_returns_all() {
    let mut arena = arena();
    let hero = dummy(&mut arena, Side::A, "h", 10);
    let f1 = dummy(&mut arena, Side::B, "f1", 10);
    let f2 = dummy(&mut arena, Side::B, "f2", 10);
    let enc = encounter(&mut arena);

    let mut targets = enc.choose_targets(&mut arena, hero, 5, false);
    targets.sort();
    assert_eq!(targets, vec![f1, f2]);
}
