//! The spell catalog.
//!
//! Spells are free functions over the engine primitives: attack rolls for
//! spell attacks, half-saving throws for area damage, effects for anything
//! with a lifetime. The caller (a class or monster strategy) has already
//! decided the slot; each leveled spell spends it here.

use dicebag::{DiceExpr, DicePool, Die, D10, D12, D4, D6, D8};
use tracing::debug;

use crate::arena::Arena;
use crate::combatant::CombatantId;
use crate::effect::EffectKind;
use crate::encounter::Encounter;
use crate::stats::{Ability, DamageType, SaveTag, Traits};
use crate::weapon::{AttackOptions, AttackOutcome, Weapon};

/// Spell save DC: 8 + spellcasting ability modifier + proficiency.
#[must_use]
pub fn save_dc(arena: &Arena, caster: CombatantId) -> i32 {
    let c = arena.combatant(caster);
    8 + c.abilities.get(c.spell_ability) + c.proficiency
}

/// Cantrip dice by caster level.
#[must_use]
pub fn cantrip_dice(level: u32) -> u32 {
    match level {
        17.. => 4,
        11.. => 3,
        5.. => 2,
        _ => 1,
    }
}

fn empowered_bonus(arena: &Arena, caster: CombatantId) -> i32 {
    let c = arena.combatant(caster);
    if c.has_trait(Traits::EMPOWERED_EVOCATION) {
        c.abilities.get(c.spell_ability)
    } else {
        0
    }
}

fn spell_weapon(
    arena: &Arena,
    caster: CombatantId,
    dice: DiceExpr,
    damage_type: DamageType,
) -> Weapon {
    let c = arena.combatant(caster);
    Weapon::new(dice, damage_type)
        .with_ability(c.spell_ability)
        .ranged()
        .with_modifiers(c.spell_attack_modifier, 0)
}

fn spend_slot(arena: &mut Arena, caster: CombatantId, slot: u32, name: &str) {
    arena.combatant_mut(caster).spell_slots.spend(slot);
    let c = arena.combatant(caster);
    if c.verbose {
        debug!("{} cast {} at level {}", c.tag(), name, slot);
    }
}

fn narrate_cantrip(arena: &Arena, caster: CombatantId, name: &str) {
    let c = arena.combatant(caster);
    if c.verbose {
        debug!("{} cast {}", c.tag(), name);
    }
}

fn hidden_from(arena: &Arena, target: CombatantId, caster: CombatantId) -> bool {
    arena
        .combatant(target)
        .is_hidden(arena.combatant(caster))
}

/// Healing dealt by a healing spell, honoring Disciple of Life, Blessed
/// Healer and Supreme Healing.
pub fn spell_healing(
    arena: &mut Arena,
    caster: CombatantId,
    slot: u32,
    die: Die,
    n_dice: u32,
) -> i32 {
    if arena.combatant(caster).has_trait(Traits::BLESSED_HEALER) {
        arena.heal(caster, 2 + slot as i32, false);
    }
    let (modifier, supreme, disciple) = {
        let c = arena.combatant(caster);
        (
            c.abilities.get(c.spell_ability),
            c.has_trait(Traits::SUPREME_HEALING),
            c.has_trait(Traits::DISCIPLE_OF_LIFE),
        )
    };
    let mut healing = if supreme {
        n_dice as i32 * die.sides() + modifier
    } else {
        die.sum(arena.rng_mut(), n_dice) + modifier
    };
    if disciple {
        healing += 2 + slot as i32;
    }
    healing
}

// =============================================================================
// Cantrips
// =============================================================================

/// Acid Splash: Dex save or acid damage, up to two targets, one damage roll.
pub fn acid_splash(arena: &mut Arena, caster: CombatantId, targets: &[CombatantId]) {
    narrate_cantrip(arena, caster, "Acid Splash");
    let dc = save_dc(arena, caster);
    let n = cantrip_dice(arena.combatant(caster).level);
    let damage = D6.sum(arena.rng_mut(), n);
    let potent = arena.combatant(caster).has_trait(Traits::POTENT_CANTRIP);

    for &target in targets {
        if hidden_from(arena, target, caster) {
            continue;
        }
        if potent {
            arena.half_saving_throw(
                target,
                Ability::Dex,
                dc,
                damage,
                DamageType::Acid,
                0,
                None,
                false,
                false,
                Some(SaveTag::Magic),
            );
        } else if !arena.saving_throw(target, Ability::Dex, dc, false, false, Some(SaveTag::Magic))
        {
            arena.take_damage(target, damage, DamageType::Acid, None, false, 0, None);
        }
    }
}

/// Fire Bolt: a ranged spell attack.
pub fn fire_bolt(arena: &mut Arena, caster: CombatantId, target: Option<CombatantId>) {
    narrate_cantrip(arena, caster, "Fire Bolt");
    let n = cantrip_dice(arena.combatant(caster).level);
    let weapon = spell_weapon(
        arena,
        caster,
        DiceExpr::Pool(DicePool::of(n, D10)),
        DamageType::Fire,
    );
    let add_ability = arena.combatant(caster).has_trait(Traits::EMPOWERED_EVOCATION);
    arena.weapon_attack(
        caster,
        &weapon,
        target,
        AttackOptions {
            add_ability,
            ..AttackOptions::default()
        },
    );
}

/// Poison Spray: Con save or poison damage.
pub fn poison_spray(arena: &mut Arena, caster: CombatantId, target: CombatantId) {
    narrate_cantrip(arena, caster, "Poison Spray");
    if hidden_from(arena, target, caster) {
        return;
    }
    let dc = save_dc(arena, caster);
    let n = cantrip_dice(arena.combatant(caster).level);
    if arena.combatant(caster).has_trait(Traits::POTENT_CANTRIP) {
        let damage = D12.sum(arena.rng_mut(), n);
        arena.half_saving_throw(
            target,
            Ability::Con,
            dc,
            damage,
            DamageType::Poison,
            0,
            None,
            false,
            false,
            Some(SaveTag::Magic),
        );
    } else if !arena.saving_throw(target, Ability::Con, dc, false, false, Some(SaveTag::Magic)) {
        let damage = D12.sum(arena.rng_mut(), n);
        arena.take_damage(target, damage, DamageType::Poison, None, false, 0, None);
    }
}

/// Sacred Flame: Dex save or radiant damage.
pub fn sacred_flame(arena: &mut Arena, caster: CombatantId, target: CombatantId) {
    narrate_cantrip(arena, caster, "Sacred Flame");
    if hidden_from(arena, target, caster) {
        return;
    }
    let dc = save_dc(arena, caster);
    let n = cantrip_dice(arena.combatant(caster).level);
    if arena.combatant(caster).has_trait(Traits::POTENT_CANTRIP) {
        let damage = D8.sum(arena.rng_mut(), n);
        arena.half_saving_throw(
            target,
            Ability::Dex,
            dc,
            damage,
            DamageType::Radiant,
            0,
            None,
            false,
            false,
            Some(SaveTag::Magic),
        );
    } else if !arena.saving_throw(target, Ability::Dex, dc, false, false, Some(SaveTag::Magic)) {
        let damage = D8.sum(arena.rng_mut(), n);
        arena.take_damage(target, damage, DamageType::Radiant, None, false, 0, None);
    }
}

/// Vicious Mockery: Wis save or psychic damage and disadvantage on the
/// target's next attack.
pub fn vicious_mockery(arena: &mut Arena, caster: CombatantId, target: CombatantId) {
    narrate_cantrip(arena, caster, "Vicious Mockery");
    if hidden_from(arena, target, caster) {
        return;
    }
    let dc = save_dc(arena, caster);
    let n = cantrip_dice(arena.combatant(caster).level);

    let saved = if arena.combatant(caster).has_trait(Traits::POTENT_CANTRIP) {
        let damage = D4.sum(arena.rng_mut(), n);
        arena.half_saving_throw(
            target,
            Ability::Wis,
            dc,
            damage,
            DamageType::Psychic,
            0,
            None,
            false,
            false,
            Some(SaveTag::Magic),
        )
    } else {
        let saved = arena.saving_throw(target, Ability::Wis, dc, false, false, Some(SaveTag::Magic));
        if !saved {
            let damage = D4.sum(arena.rng_mut(), n);
            arena.take_damage(target, damage, DamageType::Psychic, None, false, 0, None);
        }
        saved
    };

    if !saved {
        arena.apply_effect(EffectKind::ViciousMockery { target }, Some(1));
    }
}

// =============================================================================
// Leveled spells
// =============================================================================

/// Aid: +5 hit points per slot level above first, once per creature.
pub fn aid(arena: &mut Arena, caster: CombatantId, slot: u32, targets: &[CombatantId]) {
    spend_slot(arena, caster, slot, "Aid");
    let increase = 5 * (slot as i32 - 1);
    for &target in targets {
        if !arena.combatant(target).cond.aid {
            arena.narrate(target, "received Aid");
            arena.combatant_mut(target).cond.aid = true;
            arena.combatant_mut(target).max_hp += increase;
            arena.heal(target, increase, true);
        }
    }
}

/// Bane: Cha save or -1d4 on attacks and saves. Concentration.
pub fn bane(arena: &mut Arena, caster: CombatantId, slot: u32, targets: &[CombatantId]) {
    spend_slot(arena, caster, slot, "Bane");
    // Casting breaks existing concentration even if every target saves.
    if let Some(old) = arena.combatant(caster).cond.concentration {
        arena.end_effect(old);
    }
    let dc = save_dc(arena, caster);
    let mut affected = Vec::new();
    for &target in targets {
        if !arena.saving_throw(target, Ability::Cha, dc, false, false, Some(SaveTag::Magic)) {
            affected.push(target);
        }
    }
    if !affected.is_empty() {
        arena.apply_effect(
            EffectKind::Bane {
                caster,
                targets: affected,
            },
            Some(10),
        );
    }
}

/// Bless: +1d4 on attacks and saves. Concentration.
pub fn bless(arena: &mut Arena, caster: CombatantId, slot: u32, targets: &[CombatantId]) {
    spend_slot(arena, caster, slot, "Bless");
    arena.apply_effect(
        EffectKind::Bless {
            caster,
            targets: targets.to_vec(),
        },
        Some(10),
    );
}

/// Blight: Con save for half necrotic damage; no effect on constructs and
/// undead.
pub fn blight(arena: &mut Arena, caster: CombatantId, slot: u32, target: CombatantId) {
    spend_slot(arena, caster, slot, "Blight");
    let t = arena.combatant(target);
    if t.has_trait(Traits::CONSTRUCT) || t.undead.is_some() || hidden_from(arena, target, caster) {
        return;
    }
    let dc = save_dc(arena, caster);
    let damage = D8.sum(arena.rng_mut(), 4 + slot);
    arena.half_saving_throw(
        target,
        Ability::Con,
        dc,
        damage,
        DamageType::Necrotic,
        0,
        None,
        false,
        false,
        Some(SaveTag::Magic),
    );
}

/// Burning Hands: Dex save for half fire damage, one roll for all targets.
pub fn burning_hands(arena: &mut Arena, caster: CombatantId, slot: u32, targets: &[CombatantId]) {
    spend_slot(arena, caster, slot, "Burning Hands");
    let dc = save_dc(arena, caster);
    let damage = D6.sum(arena.rng_mut(), 2 + slot) + empowered_bonus(arena, caster);
    for &target in targets {
        arena.half_saving_throw(
            target,
            Ability::Dex,
            dc,
            damage,
            DamageType::Fire,
            0,
            None,
            false,
            false,
            Some(SaveTag::Magic),
        );
    }
}

/// Chromatic Orb: a spell attack with a chosen damage type.
pub fn chromatic_orb(
    arena: &mut Arena,
    caster: CombatantId,
    slot: u32,
    target: CombatantId,
    damage_type: DamageType,
) {
    spend_slot(arena, caster, slot, "Chromatic Orb");
    if hidden_from(arena, target, caster) {
        return;
    }
    let weapon = spell_weapon(
        arena,
        caster,
        DiceExpr::Pool(DicePool::of(2 + slot, D8)),
        damage_type,
    );
    let add_ability = arena.combatant(caster).has_trait(Traits::EMPOWERED_EVOCATION);
    arena.weapon_attack(
        caster,
        &weapon,
        Some(target),
        AttackOptions {
            add_ability,
            ..AttackOptions::default()
        },
    );
}

/// Cone of Cold: Con save for half cold damage.
pub fn cone_of_cold(arena: &mut Arena, caster: CombatantId, slot: u32, targets: &[CombatantId]) {
    spend_slot(arena, caster, slot, "Cone of Cold");
    let dc = save_dc(arena, caster);
    let damage = D8.sum(arena.rng_mut(), 3 + slot) + empowered_bonus(arena, caster);
    for &target in targets {
        arena.half_saving_throw(
            target,
            Ability::Con,
            dc,
            damage,
            DamageType::Cold,
            0,
            None,
            false,
            false,
            Some(SaveTag::Magic),
        );
    }
}

/// Cure Wounds: touch healing, 1d8 per slot level.
pub fn cure_wounds(arena: &mut Arena, caster: CombatantId, slot: u32, target: CombatantId) {
    spend_slot(arena, caster, slot, "Cure Wounds");
    let healing = spell_healing(arena, caster, slot, D8, slot);
    arena.heal(target, healing, true);
}

/// Fireball: Dex save for half fire damage, one roll for all targets.
pub fn fireball(arena: &mut Arena, caster: CombatantId, slot: u32, targets: &[CombatantId]) {
    spend_slot(arena, caster, slot, "Fireball");
    let dc = save_dc(arena, caster);
    let damage = D6.sum(arena.rng_mut(), 5 + slot) + empowered_bonus(arena, caster);
    for &target in targets {
        arena.half_saving_throw(
            target,
            Ability::Dex,
            dc,
            damage,
            DamageType::Fire,
            0,
            None,
            false,
            false,
            Some(SaveTag::Magic),
        );
    }
}

/// Greater Invisibility on one creature. Concentration.
pub fn greater_invisibility(
    arena: &mut Arena,
    caster: CombatantId,
    slot: u32,
    target: CombatantId,
) {
    spend_slot(arena, caster, slot, "Greater Invisibility");
    arena.apply_effect(EffectKind::GreaterInvisibility { caster, target }, Some(10));
}

/// Guiding Bolt: a spell attack; on a hit the next attack against the target
/// has advantage.
pub fn guiding_bolt(arena: &mut Arena, caster: CombatantId, slot: u32, target: Option<CombatantId>) {
    spend_slot(arena, caster, slot, "Guiding Bolt");
    let weapon = spell_weapon(
        arena,
        caster,
        DiceExpr::Pool(DicePool::of(3 + slot, D6)),
        DamageType::Radiant,
    );
    let outcome = arena.weapon_attack(
        caster,
        &weapon,
        target,
        AttackOptions {
            add_ability: false,
            ..AttackOptions::default()
        },
    );
    if let (Some(outcome), Some(target)) = (outcome, target) {
        if outcome.is_hit() && arena.alive(target) {
            arena.apply_effect(EffectKind::GuidingBolt { caster, target }, Some(2));
        }
    }
}

/// Healing Word: ranged healing as a bonus action, 1d4 per slot level.
pub fn healing_word(arena: &mut Arena, caster: CombatantId, slot: u32, target: CombatantId) {
    spend_slot(arena, caster, slot, "Healing Word");
    let healing = spell_healing(arena, caster, slot, D4, slot);
    arena.heal(target, healing, true);
}

/// Lightning Bolt: Dex save for half lightning damage.
pub fn lightning_bolt(arena: &mut Arena, caster: CombatantId, slot: u32, targets: &[CombatantId]) {
    spend_slot(arena, caster, slot, "Lightning Bolt");
    let dc = save_dc(arena, caster);
    let damage = D6.sum(arena.rng_mut(), 5 + slot) + empowered_bonus(arena, caster);
    for &target in targets {
        arena.half_saving_throw(
            target,
            Ability::Dex,
            dc,
            damage,
            DamageType::Lightning,
            0,
            None,
            false,
            false,
            Some(SaveTag::Magic),
        );
    }
}

/// Magic Missile: unerring force darts; the target may burn a Shield
/// reaction to negate them all.
pub fn magic_missile(arena: &mut Arena, caster: CombatantId, slot: u32, targets: &[CombatantId]) {
    spend_slot(arena, caster, slot, "Magic Missile");
    let damage = D4.roll(arena.rng_mut()) + 1 + empowered_bonus(arena, caster);
    for &target in targets {
        // The target can use its reaction to cast Shield.
        arena.shield_reaction(target);
        if !hidden_from(arena, target, caster) && arena.combatant(target).cond.shield.is_none() {
            arena.take_damage(target, damage, DamageType::Force, None, false, 0, None);
        }
    }
}

/// Mass Healing Word: bonus-action healing for up to six creatures.
pub fn mass_healing_word(
    arena: &mut Arena,
    caster: CombatantId,
    slot: u32,
    targets: &[CombatantId],
) {
    spend_slot(arena, caster, slot, "Mass Healing Word");
    let healing = spell_healing(arena, caster, slot, D4, slot - 2);
    for &target in targets {
        arena.heal(target, healing, true);
    }
}

/// Melf's Acid Arrow: a spell attack; a hit burns again at the end of the
/// target's next turn, a miss still splashes for half.
pub fn melfs_acid_arrow(arena: &mut Arena, caster: CombatantId, slot: u32, target: CombatantId) {
    spend_slot(arena, caster, slot, "Melf's Acid Arrow");
    let weapon = spell_weapon(
        arena,
        caster,
        DiceExpr::Pool(DicePool::of(2 + slot, D4)),
        DamageType::Acid,
    );
    let add_ability = arena.combatant(caster).has_trait(Traits::EMPOWERED_EVOCATION);
    let outcome = arena.weapon_attack(
        caster,
        &weapon,
        Some(target),
        AttackOptions {
            add_ability,
            ..AttackOptions::default()
        },
    );

    match outcome {
        Some(AttackOutcome::Miss) => {
            let damage = D4.sum(arena.rng_mut(), 2 + slot) + empowered_bonus(arena, caster);
            arena.take_damage(target, damage / 2, DamageType::Acid, None, false, 0, None);
        }
        Some(_) if arena.alive(target) => {
            arena.apply_effect(
                EffectKind::MelfsAcidArrow {
                    caster,
                    target,
                    dice: slot,
                },
                None,
            );
        }
        _ => {}
    }
}

/// Prayer of Healing: out-of-combat healing for up to six creatures.
pub fn prayer_of_healing(
    arena: &mut Arena,
    caster: CombatantId,
    slot: u32,
    targets: &[CombatantId],
) {
    spend_slot(arena, caster, slot, "Prayer of Healing");
    let healing = spell_healing(arena, caster, slot, D8, slot);
    for &target in targets {
        arena.heal(target, healing, true);
    }
}

/// Scorching Ray: spends the slot and fires the first ray. The caller fires
/// the remaining rays with [`scorching_ray_beam`] so each one picks its
/// target after the previous ray resolves.
pub fn scorching_ray(
    arena: &mut Arena,
    caster: CombatantId,
    slot: u32,
    target: Option<CombatantId>,
) {
    spend_slot(arena, caster, slot, "Scorching Ray");
    scorching_ray_beam(arena, caster, target);
}

/// One additional Scorching Ray beam.
pub fn scorching_ray_beam(arena: &mut Arena, caster: CombatantId, target: Option<CombatantId>) {
    let weapon = spell_weapon(
        arena,
        caster,
        DiceExpr::Pool(DicePool::of(2, D6)),
        DamageType::Fire,
    );
    let add_ability = arena.combatant(caster).has_trait(Traits::EMPOWERED_EVOCATION);
    arena.weapon_attack(
        caster,
        &weapon,
        target,
        AttackOptions {
            add_ability,
            ..AttackOptions::default()
        },
    );
}

/// Shield: +5 armor class until the caster's next turn.
pub fn shield(arena: &mut Arena, caster: CombatantId, slot: u32) {
    spend_slot(arena, caster, slot, "Shield");
    arena.apply_effect(EffectKind::Shield { caster }, Some(1));
}

/// Shield of Faith: +2 armor class. Concentration.
pub fn shield_of_faith(arena: &mut Arena, caster: CombatantId, slot: u32) {
    spend_slot(arena, caster, slot, "Shield of Faith");
    arena.apply_effect(EffectKind::ShieldOfFaith { caster }, Some(100));
}

/// Spirit Guardians: recurring radiant (or necrotic) damage around the
/// caster. Concentration; only the most potent instance on a creature fires.
pub fn spirit_guardians(
    arena: &mut Arena,
    caster: CombatantId,
    slot: u32,
    targets: &[CombatantId],
    damage_type: DamageType,
) {
    spend_slot(arena, caster, slot, "Spirit Guardians");
    let dc = save_dc(arena, caster);
    arena.apply_effect(
        EffectKind::SpiritGuardians {
            caster,
            targets: targets.to_vec(),
            dice: slot,
            save_dc: dc,
            damage_type,
        },
        Some(100),
    );
}

/// Spiritual Weapon: a floating weapon that attacks as a bonus action.
pub fn spiritual_weapon(arena: &mut Arena, caster: CombatantId, slot: u32) {
    spend_slot(arena, caster, slot, "Spiritual Weapon");
    let weapon = spell_weapon(
        arena,
        caster,
        DiceExpr::Pool(DicePool::of(slot / 2, D8)),
        DamageType::Force,
    );
    arena.apply_effect(EffectKind::SpiritualWeapon { caster, weapon }, Some(10));
}

/// Attacks with the caster's active Spiritual Weapon, if any.
pub fn spiritual_weapon_attack(arena: &mut Arena, enc: &Encounter, caster: CombatantId) {
    let Some(eid) = arena.combatant(caster).cond.spiritual_weapon else {
        return;
    };
    if arena.effects().is_ended(eid) {
        return;
    }
    let EffectKind::SpiritualWeapon { weapon, .. } = arena.effects().kind(eid).clone() else {
        return;
    };
    let target = enc.choose_target(arena, caster);
    arena.weapon_attack(caster, &weapon, target, AttackOptions::default());
}

/// Thunderwave: Con save for half thunder damage.
pub fn thunderwave(arena: &mut Arena, caster: CombatantId, slot: u32, targets: &[CombatantId]) {
    spend_slot(arena, caster, slot, "Thunderwave");
    let dc = save_dc(arena, caster);
    let damage = D8.sum(arena.rng_mut(), 1 + slot) + empowered_bonus(arena, caster);
    for &target in targets {
        arena.half_saving_throw(
            target,
            Ability::Con,
            dc,
            damage,
            DamageType::Thunder,
            0,
            None,
            false,
            false,
            Some(SaveTag::Magic),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cantrip_dice_scales_with_level() {
        assert_eq!(cantrip_dice(1), 1);
        assert_eq!(cantrip_dice(4), 1);
        assert_eq!(cantrip_dice(5), 2);
        assert_eq!(cantrip_dice(10), 2);
        assert_eq!(cantrip_dice(11), 3);
        assert_eq!(cantrip_dice(16), 3);
        assert_eq!(cantrip_dice(17), 4);
        assert_eq!(cantrip_dice(20), 4);
    }
}
