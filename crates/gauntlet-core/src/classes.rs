//! Player-character classes: stat blocks and decision strategies.
//!
//! Each class is a fixed build at a given level — one concrete character per
//! class, with its feats, gear and spell list chosen up front — plus a greedy
//! decision strategy that rations limited resources across the adventuring
//! day using the precomputed usage schedules.

use dicebag::{DiceExpr, DicePool, D10, D6, D8};
use tracing::debug;

use crate::arena::Arena;
use crate::combatant::{Combatant, CombatantId, HpFormula, PcState, Side, SpellSlots};
use crate::encounter::Encounter;
use crate::spells;
use crate::stats::{Abilities, Ability, ArmorKind, DamageType, DamageTypes, SaveTag, Skill, Traits};
use crate::strategy::{ration_early, ration_late, Strategy};
use crate::weapon::{AttackOptions, AttackOutcome, Weapon};
use crate::RosterError;

/// Proficiency bonus by character level.
#[must_use]
pub fn proficiency_for_level(level: u32) -> i32 {
    (level as i32 - 1) / 4 + 2
}

/// The full-caster spell slot table (index 0 = first-level slots).
fn full_caster_slots(level: u32) -> [u32; 9] {
    match level {
        1 => [2, 0, 0, 0, 0, 0, 0, 0, 0],
        2 => [3, 0, 0, 0, 0, 0, 0, 0, 0],
        3 => [4, 2, 0, 0, 0, 0, 0, 0, 0],
        4 => [4, 3, 0, 0, 0, 0, 0, 0, 0],
        5 => [4, 3, 2, 0, 0, 0, 0, 0, 0],
        6 => [4, 3, 3, 0, 0, 0, 0, 0, 0],
        7 => [4, 3, 3, 1, 0, 0, 0, 0, 0],
        8 => [4, 3, 3, 2, 0, 0, 0, 0, 0],
        9 => [4, 3, 3, 3, 1, 0, 0, 0, 0],
        10 => [4, 3, 3, 3, 2, 0, 0, 0, 0],
        11 | 12 => [4, 3, 3, 3, 2, 1, 0, 0, 0],
        13 | 14 => [4, 3, 3, 3, 2, 1, 1, 0, 0],
        15 | 16 => [4, 3, 3, 3, 2, 1, 1, 1, 0],
        17 => [4, 3, 3, 3, 2, 1, 1, 1, 1],
        18 => [4, 3, 3, 3, 3, 1, 1, 1, 1],
        19 => [4, 3, 3, 3, 3, 2, 1, 1, 1],
        _ => [4, 3, 3, 3, 3, 2, 2, 1, 1],
    }
}

/// Builds a player character by class name.
pub fn spawn_character(
    arena: &mut Arena,
    class: &str,
    level: u32,
    name: &str,
    verbose: bool,
) -> Result<CombatantId, RosterError> {
    let (combatant, strategy): (Combatant, Box<dyn Strategy>) = match class {
        "Cleric" => life_domain_cleric(level, name, verbose),
        "Fighter" => champion_fighter(level, name, verbose),
        "Rogue" => assassin_rogue(level, name, verbose),
        "Wizard" => evocation_wizard(level, name, verbose),
        _ => return Err(RosterError::UnknownClass(class.to_string())),
    };
    let id = arena.spawn(combatant, strategy);
    // Match the construction sequence: conditions, then long- and short-rest
    // features, so the character enters the first encounter fully provisioned.
    arena.with_strategy(id, |s, a| s.reset_conditions(id, a));
    arena.with_strategy(id, |s, a| s.reset_long_rest(id, a));
    arena.with_strategy(id, |s, a| s.reset_short_rest(id, a));
    Ok(id)
}

fn base_character(name: &str, verbose: bool, level: u32) -> Combatant {
    let mut c = Combatant::new(name, Side::A, verbose);
    c.level = level;
    c.proficiency = proficiency_for_level(level);
    c.pc = Some(PcState {
        hit_dice: level,
        hit_die_modifier: 0,
    });
    c
}

// =============================================================================
// Life Domain Cleric
// =============================================================================

/// Variant human Life Domain cleric: War Caster, heavy armor, mace.
fn life_domain_cleric(level: u32, name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = base_character(name, verbose, level);

    let mut abilities = Abilities::new(2, -1, 2, 0, 3, 1);
    if level >= 4 {
        *abilities.get_mut(Ability::Str) += 1;
    }
    if level >= 8 {
        *abilities.get_mut(Ability::Wis) += 1;
    }
    if level >= 12 {
        *abilities.get_mut(Ability::Con) += 1;
    }
    if level >= 16 {
        *abilities.get_mut(Ability::Wis) += 1;
    }
    if level >= 19 {
        *abilities.get_mut(Ability::Con) += 1;
    }
    c.abilities = abilities;
    c.base_abilities = abilities;

    c.armor_kind = ArmorKind::Heavy;
    c.base_armor_class = if level >= 5 { 20 } else { 18 };

    for skill in [
        Skill::Insight,
        Skill::Medicine,
        Skill::Persuasion,
        Skill::Religion,
    ] {
        c.skill_proficiencies[skill.index()] = true;
    }

    c.save_proficiencies[Ability::Wis.index()] = true;
    c.save_proficiencies[Ability::Cha.index()] = true;

    c.traits |= Traits::WAR_CASTER | Traits::DISCIPLE_OF_LIFE;
    if level >= 6 {
        c.traits |= Traits::BLESSED_HEALER;
    }
    if level >= 17 {
        c.traits |= Traits::SUPREME_HEALING;
    }

    c.spell_ability = Ability::Wis;
    c.spell_slots = SpellSlots::new(full_caster_slots(level));
    c.hp_formula = HpFormula::Character {
        die: D8,
        level,
        tough: false,
    };

    // Mace, upgrading to +1 and Divine Strike with level.
    let weapon = if level >= 14 {
        Weapon::new(DiceExpr::single(D6), DamageType::MagicBludgeoning)
            .with_secondary(DiceExpr::pool(2, D8), DamageType::Radiant)
            .with_modifiers(1, 1)
    } else if level >= 8 {
        Weapon::new(DiceExpr::single(D6), DamageType::MagicBludgeoning)
            .with_secondary(DiceExpr::single(D8), DamageType::Radiant)
            .with_modifiers(1, 1)
    } else if level >= 6 {
        Weapon::new(DiceExpr::single(D6), DamageType::MagicBludgeoning).with_modifiers(1, 1)
    } else {
        Weapon::new(DiceExpr::single(D6), DamageType::Bludgeoning)
    };

    let total_channel_divinity = match level {
        18.. => 3,
        6.. => 2,
        2.. => 1,
        _ => 0,
    };
    let destroy_undead = match level {
        17.. => 4.0,
        14.. => 3.0,
        11.. => 2.0,
        8.. => 1.0,
        5.. => 0.5,
        _ => 0.0,
    };

    let strategy = LifeDomainCleric {
        level,
        weapon,
        total_channel_divinity,
        channel_divinity: total_channel_divinity,
        destroy_undead,
        spell_slot_usage: Vec::new(),
        channel_divinity_usage: Vec::new(),
    };
    (c, Box::new(strategy))
}

struct LifeDomainCleric {
    level: u32,
    weapon: Weapon,
    total_channel_divinity: u32,
    channel_divinity: u32,
    destroy_undead: f32,
    spell_slot_usage: Vec<u32>,
    channel_divinity_usage: Vec<u32>,
}

impl LifeDomainCleric {
    fn slots(arena: &Arena, me: CombatantId) -> SpellSlots {
        arena.combatant(me).spell_slots
    }

    /// Allies at zero hit points that can still be brought back.
    fn unconscious_allies(
        arena: &Arena,
        allies: &[CombatantId],
        in_combat: bool,
    ) -> Vec<CombatantId> {
        allies
            .iter()
            .copied()
            .filter(|&pc| {
                let c = arena.combatant(pc);
                c.hp == 0
                    && c.max_hp > 0
                    && (!in_combat || c.cond.swallowed.is_none())
            })
            .collect()
    }

    /// Up to `cap` healing targets, unconscious allies first.
    fn healing_targets(
        enc: &Encounter,
        arena: &mut Arena,
        valid: &[CombatantId],
        unconscious: &[CombatantId],
        cap: usize,
    ) -> Vec<CombatantId> {
        if valid.len() <= cap {
            return valid.to_vec();
        }
        if unconscious.len() >= cap {
            return enc.choice_n(arena, unconscious, cap, false);
        }
        let mut targets = unconscious.to_vec();
        let standing: Vec<CombatantId> = valid
            .iter()
            .copied()
            .filter(|&pc| arena.alive(pc))
            .collect();
        targets.extend(enc.choice_n(arena, &standing, cap - unconscious.len(), false));
        targets
    }

    /// Channel Divinity: Preserve Life, distributing 5 x level points of
    /// healing among allies at or below half hit points, lowest first.
    fn use_preserve_life(&mut self, arena: &mut Arena, me: CombatantId, allies: &[CombatantId]) {
        arena.narrate(me, "used Preserve Life");
        self.channel_divinity -= 1;

        let mut healing = vec![0i32; allies.len()];
        let thresholds: Vec<i32> = allies
            .iter()
            .map(|&pc| arena.combatant(pc).max_hp / 2)
            .collect();

        let mut valid: Vec<usize> = (0..allies.len())
            .filter(|&i| {
                let c = arena.combatant(allies[i]);
                c.hp <= thresholds[i] && c.max_hp > 0
            })
            .collect();

        for _ in 0..(5 * self.level) {
            if valid.is_empty() {
                break;
            }
            // Lowest current hit points gets the next point.
            let lowest = valid
                .iter()
                .copied()
                .min_by_key(|&i| arena.combatant(allies[i]).hp)
                .expect("non-empty target list");
            healing[lowest] += 1;
            if arena.combatant(allies[lowest]).hp + healing[lowest] >= thresholds[lowest] {
                valid.retain(|&i| i != lowest);
            }
        }

        for (i, &points) in healing.iter().enumerate() {
            if points > 0 {
                arena.heal(allies[i], points, true);
            }
        }
    }

    fn channel_divinity_budget(&self, enc: &Encounter) -> u32 {
        self.channel_divinity_usage
            .get(enc.encounters_since_short_rest as usize)
            .copied()
            .unwrap_or(0)
    }
}

impl Strategy for LifeDomainCleric {
    fn reset_conditions(&mut self, me: CombatantId, arena: &mut Arena) {
        // Heavy armor imposes disadvantage on Stealth checks.
        arena.combatant_mut(me).cond.skill_disadv[Skill::Stealth.index()] += 1;
    }

    fn reset_short_rest(&mut self, _me: CombatantId, _arena: &mut Arena) {
        self.channel_divinity = self.total_channel_divinity;
    }

    fn reset_long_rest(&mut self, me: CombatantId, arena: &mut Arena) {
        arena.combatant_mut(me).spell_slots.restore_all();
        // A fourth-level slot goes to Death Ward cast after every long rest.
        if self.level >= 7 {
            arena.combatant_mut(me).spell_slots.spend(4);
            arena.combatant_mut(me).cond.death_ward = true;
        }
    }

    fn set_usage_rates(
        &mut self,
        me: CombatantId,
        arena: &mut Arena,
        encounters_per_long_rest: u32,
        encounters_per_short_rest: u32,
    ) {
        let mut sum_slots = arena.combatant(me).spell_slots.full_total();
        if self.level >= 7 {
            sum_slots -= 1;
        }
        self.spell_slot_usage = ration_late(sum_slots, encounters_per_long_rest);
        self.channel_divinity_usage =
            ration_late(self.total_channel_divinity, encounters_per_short_rest);
    }

    fn end_encounter(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        let allies = enc.allies_of(arena, me).to_vec();

        if self.channel_divinity > self.channel_divinity_budget(enc) {
            self.use_preserve_life(arena, me, &allies);
        }

        let unconscious = Self::unconscious_allies(arena, &allies, false);
        if unconscious.is_empty() {
            return;
        }

        let slots = Self::slots(arena, me);
        if slots.remaining_total() as usize >= unconscious.len() {
            // Enough slots to bring everyone up with Cure Wounds.
            for &ally in &unconscious {
                if let Some(slot) = Self::slots(arena, me).lowest_available(1) {
                    spells::cure_wounds(arena, me, slot, ally);
                }
            }
        } else if let Some(slot) = slots.lowest_available(2) {
            let valid: Vec<CombatantId> = allies
                .iter()
                .copied()
                .filter(|&pc| {
                    let c = arena.combatant(pc);
                    c.hp != c.max_hp && c.max_hp > 0
                })
                .collect();
            let targets = Self::healing_targets(enc, arena, &valid, &unconscious, 6);
            spells::prayer_of_healing(arena, me, slot, &targets);
        } else if slots.lowest_available(1) == Some(1) {
            let count = slots.remaining(1) as usize;
            for ally in enc.choice_n(arena, &unconscious, count, false) {
                spells::cure_wounds(arena, me, 1, ally);
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        let allies = enc.allies_of(arena, me).to_vec();
        let opponents = enc.foes_of(arena, me).to_vec();

        let unconscious = Self::unconscious_allies(arena, &allies, true);
        let immune_force = opponents
            .iter()
            .any(|&e| arena.combatant(e).immunities.has(DamageType::Force));
        let immune_radiant = opponents
            .iter()
            .any(|&e| arena.combatant(e).immunities.has(DamageType::Radiant));
        let undead_opponents: Vec<CombatantId> = opponents
            .iter()
            .copied()
            .filter(|&e| {
                let c = arena.combatant(e);
                c.undead.is_some() && c.hp > 0
            })
            .collect();
        let slots = Self::slots(arena, me);

        let me_state = arena.combatant(me);
        let bonus = me_state.cond.bonus;
        let action = me_state.cond.action;
        let blinded = me_state.cond.blinded > 0;
        let slowed = me_state.cond.slowed > 0;
        let swallowed = me_state.cond.swallowed.is_some();
        let quarter_hp = me_state.hp <= me_state.max_hp / 4;

        let spend_bonus = |arena: &mut Arena| {
            arena.combatant_mut(me).cond.bonus = false;
            if slowed {
                arena.combatant_mut(me).cond.action = false;
            }
        };
        let spend_action = |arena: &mut Arena| {
            arena.combatant_mut(me).cond.action = false;
            if slowed {
                arena.combatant_mut(me).cond.bonus = false;
            }
        };

        if unconscious.len() > 1 && slots.lowest_available(3).is_some() && bonus && !blinded {
            // Mass Healing Word when more than one ally is down.
            spend_bonus(arena);
            let slot = slots.lowest_available(3).expect("checked above");
            let valid: Vec<CombatantId> = allies
                .iter()
                .copied()
                .filter(|&pc| {
                    let c = arena.combatant(pc);
                    c.hp != c.max_hp && c.max_hp > 0 && c.cond.swallowed.is_none()
                })
                .collect();
            let targets = Self::healing_targets(enc, arena, &valid, &unconscious, 6);
            spells::mass_healing_word(arena, me, slot, &targets);
        } else if unconscious
            .iter()
            .filter(|&&pc| !arena.combatant(pc).cond.aid)
            .count()
            > 1
            && slots.lowest_available(2).is_some()
            && action
        {
            // Aid lifts several downed allies at once.
            spend_action(arena);
            let slot = slots.lowest_available(2).expect("checked above");
            let valid: Vec<CombatantId> = allies
                .iter()
                .copied()
                .filter(|&pc| {
                    let c = arena.combatant(pc);
                    !c.cond.aid && c.max_hp > 0 && c.cond.swallowed.is_none()
                })
                .collect();
            let valid_unconscious: Vec<CombatantId> = unconscious
                .iter()
                .copied()
                .filter(|&pc| !arena.combatant(pc).cond.aid)
                .collect();
            let targets = Self::healing_targets(enc, arena, &valid, &valid_unconscious, 3);
            spells::aid(arena, me, slot, &targets);
        } else if !unconscious.is_empty() && slots.lowest_available(1).is_some() && bonus && !blinded
        {
            spend_bonus(arena);
            let slot = slots.lowest_available(1).expect("checked above");
            if let Some(target) = enc.choice(arena, &unconscious) {
                spells::healing_word(arena, me, slot, target);
            }
        } else if quarter_hp && slots.lowest_available(1).is_some() && bonus && !blinded {
            spend_bonus(arena);
            let slot = slots.lowest_available(1).expect("checked above");
            spells::healing_word(arena, me, slot, me);
        } else if undead_opponents.len() > 1
            && action
            && !swallowed
            && self.channel_divinity > self.channel_divinity_budget(enc)
        {
            spend_action(arena);
            arena.narrate(me, "used Turn Undead");
            self.channel_divinity -= 1;

            let dc = spells::save_dc(arena, me);
            let targets = if undead_opponents.len() <= 2 {
                undead_opponents
            } else {
                enc.choice_n(arena, &undead_opponents, 2, false)
            };
            for target in targets {
                if !arena.saving_throw(
                    target,
                    Ability::Wis,
                    dc,
                    false,
                    false,
                    Some(SaveTag::TurnUndead),
                ) {
                    let rank = arena.combatant(target).undead.unwrap_or(0.0);
                    if rank <= self.destroy_undead {
                        // Destroyed outright.
                        let c = arena.combatant_mut(target);
                        c.max_hp = 0;
                        c.hp = 0;
                        arena.fall_unconscious(target);
                    } else {
                        arena.apply_effect(
                            crate::effect::EffectKind::TurnedUndead { turner: me, target },
                            Some(10),
                        );
                    }
                }
            }
        } else if slots.remaining_total()
            > self
                .spell_slot_usage
                .get(enc.encounters_since_long_rest as usize)
                .copied()
                .unwrap_or(0)
        {
            // Spend a leveled spell: there is budget left for this encounter.
            let valid_sg_targets: Vec<CombatantId> = opponents
                .iter()
                .copied()
                .filter(|&e| {
                    let c = arena.combatant(e);
                    c.cond.spirit_guardians.is_empty() && c.hp > 0
                })
                .collect();
            let concentrating = arena.combatant(me).cond.concentration.is_some();

            if slots.lowest_available(3).is_some()
                && !concentrating
                && !immune_radiant
                && action
                && !blinded
                && valid_sg_targets.len() > 1
            {
                spend_action(arena);
                let slot = slots.lowest_available(3).expect("checked above");
                let targets = if valid_sg_targets.len() <= 2 {
                    valid_sg_targets
                } else {
                    enc.choice_n(arena, &valid_sg_targets, 2, false)
                };
                spells::spirit_guardians(arena, me, slot, &targets, DamageType::Radiant);
            } else if slots.lowest_available(2).is_some()
                && arena.combatant(me).cond.spiritual_weapon.is_none()
                && !immune_force
                && bonus
            {
                spend_bonus(arena);
                let slot = slots.lowest_available(2).expect("checked above");
                spells::spiritual_weapon(arena, me, slot);
                spells::spiritual_weapon_attack(arena, enc, me);
            } else if slots.lowest_available(1) == Some(1)
                && !concentrating
                && action
                && !swallowed
                && allies
                    .iter()
                    .filter(|&&pc| arena.combatant(pc).cond.blessed == 0)
                    .count()
                    >= 3
            {
                spend_action(arena);
                let unblessed: Vec<CombatantId> = allies
                    .iter()
                    .copied()
                    .filter(|&pc| arena.combatant(pc).cond.blessed == 0)
                    .collect();
                let targets = if unblessed.len() <= 3 {
                    unblessed
                } else {
                    enc.choice_n(arena, &unblessed, 3, false)
                };
                spells::bless(arena, me, 1, &targets);
            } else if action && !immune_radiant {
                spend_action(arena);
                if let Some(slot) = slots.lowest_available(1) {
                    let target = enc.choose_target(arena, me);
                    spells::guiding_bolt(arena, me, slot, target);
                }
            }
        }

        // An active Spiritual Weapon swings every turn as a bonus action.
        if arena.combatant(me).cond.bonus
            && arena.combatant(me).cond.spiritual_weapon.is_some()
            && arena.alive(me)
        {
            arena.narrate(me, "made an attack with Spiritual Weapon");
            spend_bonus(arena);
            spells::spiritual_weapon_attack(arena, enc, me);
        }

        // Whatever action is left goes to a mace swing or Sacred Flame.
        if arena.combatant(me).cond.action && arena.alive(me) {
            spend_action(arena);
            let Some(target) = enc.choose_target(arena, me) else {
                return;
            };
            let target_hidden = arena
                .combatant(target)
                .is_hidden(arena.combatant(me));
            let coin = arena.rng_mut().random() < 0.5;
            if immune_radiant
                || target_hidden
                || arena.combatant(me).cond.blinded > 0
                || arena.combatant(me).cond.swallowed.is_some()
                || coin
            {
                arena.narrate(me, "made an attack with Mace");
                arena.weapon_attack(me, &self.weapon, Some(target), AttackOptions::default());
            } else {
                spells::sacred_flame(arena, me, target);
            }
        }
    }
}

// =============================================================================
// Champion Fighter
// =============================================================================

/// Mountain dwarf Champion fighter: greatsword, Heavy Armor Master, Great
/// Weapon Master.
fn champion_fighter(level: u32, name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = base_character(name, verbose, level);

    let mut abilities = Abilities::new(3, 1, 3, -1, 1, 0);
    if level >= 4 {
        *abilities.get_mut(Ability::Str) += 1;
    }
    if level >= 6 {
        *abilities.get_mut(Ability::Con) += 1;
    }
    if level >= 8 {
        *abilities.get_mut(Ability::Str) += 1;
    }
    if level >= 14 {
        *abilities.get_mut(Ability::Con) += 1;
    }
    if level >= 16 {
        *abilities.get_mut(Ability::Dex) += 1;
    }
    c.abilities = abilities;
    c.base_abilities = abilities;

    c.armor_kind = ArmorKind::Heavy;
    c.base_armor_class = match level {
        10.. => 19,
        5.. => 18,
        3.. => 17,
        _ => 16,
    };

    // Mountain dwarf
    c.resistances |= DamageTypes::POISON;
    c.traits |= Traits::POISON_ADV;

    for skill in [
        Skill::Acrobatics,
        Skill::Athletics,
        Skill::Intimidation,
        Skill::Perception,
    ] {
        c.skill_proficiencies[skill.index()] = true;
    }

    c.crit_threshold = match level {
        15.. => 18,
        3.. => 19,
        _ => 20,
    };

    // Remarkable Athlete: half proficiency to unproficient Str/Dex/Con checks.
    if level >= 7 {
        c.skill_modifiers[Skill::SleightOfHand.index()] += c.proficiency / 2;
        c.skill_modifiers[Skill::Stealth.index()] += c.proficiency / 2;
    }

    if level >= 4 {
        c.traits |= Traits::HEAVY_ARMOR_MASTER;
    }

    c.save_proficiencies[Ability::Str.index()] = true;
    c.save_proficiencies[Ability::Con.index()] = true;
    c.save_proficiencies[Ability::Dex.index()] = level >= 16;

    c.hp_formula = HpFormula::Character {
        die: D10,
        level,
        tough: level >= 19,
    };

    let weapon = if level >= 6 {
        Weapon::new(DiceExpr::GreatWeapon, DamageType::MagicSlashing).with_modifiers(1, 1)
    } else {
        Weapon::new(DiceExpr::GreatWeapon, DamageType::Slashing)
    };

    let n_attacks = match level {
        20.. => 4,
        11.. => 3,
        5.. => 2,
        _ => 1,
    };
    let total_action_surge = match level {
        17.. => 2,
        2.. => 1,
        _ => 0,
    };
    let total_indomitable = match level {
        17.. => 3,
        13.. => 2,
        9.. => 1,
        _ => 0,
    };

    let strategy = ChampionFighter {
        level,
        weapon,
        n_attacks,
        total_action_surge,
        action_surge: total_action_surge,
        total_indomitable,
        second_wind: true,
        great_weapon_master: level >= 12,
        action_surge_usage: Vec::new(),
    };
    (c, Box::new(strategy))
}

struct ChampionFighter {
    level: u32,
    weapon: Weapon,
    n_attacks: u32,
    total_action_surge: u32,
    action_surge: u32,
    total_indomitable: u32,
    second_wind: bool,
    great_weapon_master: bool,
    action_surge_usage: Vec<u32>,
}

impl ChampionFighter {
    fn use_second_wind(&mut self, me: CombatantId, arena: &mut Arena) {
        arena.narrate(me, "used Second Wind");
        self.second_wind = false;
        arena.combatant_mut(me).cond.bonus = false;
        let healing = D10.roll(arena.rng_mut()) + self.level as i32;
        arena.heal(me, healing, false);
    }

    /// One greatsword swing, with the Great Weapon Master calculus and its
    /// bonus-action follow-up on a crit or kill.
    fn weapon_attack(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        let Some(target) = enc.choose_target(arena, me) else {
            return;
        };

        // Power-attack unless the swing would have unmitigated disadvantage.
        let use_gwm = self.great_weapon_master
            && !(arena.has_attack_disadvantage(me, target, true)
                && !arena.has_attack_advantage(me, target, true));

        let outcome = arena.weapon_attack(
            me,
            &self.weapon,
            Some(target),
            AttackOptions {
                power_attack: use_gwm,
                ..AttackOptions::default()
            },
        );

        let killed = outcome == Some(AttackOutcome::Hit) && arena.combatant(target).hp == 0;
        if self.great_weapon_master
            && arena.combatant(me).cond.bonus
            && (outcome == Some(AttackOutcome::Crit) || killed)
        {
            arena.narrate(me, "used Great Weapon Master to attack with Greatsword");
            arena.combatant_mut(me).cond.bonus = false;
            self.weapon_attack(me, enc, arena);
        }
    }
}

impl Strategy for ChampionFighter {
    fn reset_conditions(&mut self, me: CombatantId, arena: &mut Arena) {
        arena.combatant_mut(me).cond.skill_disadv[Skill::Stealth.index()] += 1;
    }

    fn reset_short_rest(&mut self, me: CombatantId, arena: &mut Arena) {
        // Spend a lingering Second Wind on the way into the rest.
        let c = arena.combatant(me);
        if c.hp > 0 && c.hp < c.max_hp && self.second_wind {
            self.use_second_wind(me, arena);
        }
        self.second_wind = true;
        self.action_surge = self.total_action_surge;
    }

    fn reset_long_rest(&mut self, me: CombatantId, arena: &mut Arena) {
        arena.combatant_mut(me).indomitable = self.total_indomitable;
    }

    fn set_usage_rates(
        &mut self,
        _me: CombatantId,
        _arena: &mut Arena,
        _encounters_per_long_rest: u32,
        encounters_per_short_rest: u32,
    ) {
        self.action_surge_usage = ration_early(self.total_action_surge, encounters_per_short_rest);
    }

    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        // Second Wind when enough hit points are missing to use a full die.
        let (hp, max_hp, bonus, slowed) = {
            let c = arena.combatant(me);
            (c.hp, c.max_hp, c.cond.bonus, c.cond.slowed > 0)
        };
        let second_wind_threshold = max_hp - (max_hp / 2).min(10 + self.level as i32);
        if self.second_wind && bonus && !slowed && hp <= second_wind_threshold {
            self.use_second_wind(me, arena);
        }

        if arena.combatant(me).cond.action {
            arena.narrate(me, "made an attack with Greatsword");
            arena.combatant_mut(me).cond.action = false;

            if slowed {
                arena.combatant_mut(me).cond.bonus = false;
                self.weapon_attack(me, enc, arena);
            } else {
                for _ in 0..self.n_attacks {
                    if arena.alive(me) {
                        self.weapon_attack(me, enc, arena);
                    }
                }
            }
        }

        // Action Surge when ahead of the rationing schedule.
        let budget = self
            .action_surge_usage
            .get(enc.encounters_since_short_rest as usize)
            .copied()
            .unwrap_or(0);
        let foes_alive = enc
            .foes_of(arena, me)
            .iter()
            .any(|&e| arena.alive(e));
        if self.action_surge > 0
            && !slowed
            && arena.alive(me)
            && self.action_surge > budget
            && foes_alive
        {
            arena.narrate(me, "used Action Surge");
            arena.narrate(me, "made an attack with Greatsword");
            self.action_surge -= 1;
            for _ in 0..self.n_attacks {
                if arena.alive(me) {
                    self.weapon_attack(me, enc, arena);
                }
            }
        }
    }
}

// =============================================================================
// Assassin Rogue
// =============================================================================

/// Wood elf Assassin rogue: dual rapiers, Cunning Action, Assassinate.
fn assassin_rogue(level: u32, name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = base_character(name, verbose, level);

    let mut abilities = Abilities::new(-1, 3, 2, 1, 2, 0);
    if level >= 8 {
        *abilities.get_mut(Ability::Dex) += 1;
    }
    if level >= 10 {
        *abilities.get_mut(Ability::Dex) += 1;
    }
    if level >= 16 {
        *abilities.get_mut(Ability::Con) += 1;
    }
    if level >= 19 {
        *abilities.get_mut(Ability::Wis) += 1;
    }
    c.abilities = abilities;
    c.base_abilities = abilities;

    c.base_armor_class = match level {
        4.. => 13,
        2.. => 12,
        _ => 11,
    };

    // Wood elf
    c.skill_proficiencies[Skill::Perception.index()] = true;
    c.traits |= Traits::CHARM_ADV | Traits::GHOUL_PARALYSIS_IMMUNITY;

    for skill in [
        Skill::Acrobatics,
        Skill::Deception,
        Skill::Insight,
        Skill::Investigation,
        Skill::SleightOfHand,
        Skill::Stealth,
    ] {
        c.skill_proficiencies[skill.index()] = true;
    }

    // Expertise
    c.skill_modifiers[Skill::Stealth.index()] = c.proficiency;
    if level >= 6 {
        c.skill_modifiers[Skill::Acrobatics.index()] = c.proficiency;
        c.skill_modifiers[Skill::Perception.index()] = c.proficiency;
    }

    if level >= 12 {
        c.initiative_modifier += 5;
        c.traits |= Traits::ALERT;
    }
    if level >= 5 {
        c.traits |= Traits::UNCANNY_DODGE;
    }
    if level >= 7 {
        c.traits |= Traits::EVASION;
    }
    if level >= 11 {
        c.traits |= Traits::RELIABLE_TALENT;
    }
    if level >= 18 {
        c.traits |= Traits::ELUSIVE;
    }

    c.save_proficiencies[Ability::Dex.index()] = true;
    c.save_proficiencies[Ability::Int.index()] = true;
    c.save_proficiencies[Ability::Wis.index()] = level >= 15;
    c.save_proficiencies[Ability::Con.index()] = level >= 16;

    c.hp_formula = HpFormula::Character {
        die: D8,
        level,
        tough: false,
    };

    let n_sneak_dice = (level + 1) / 2;
    let sneak = DiceExpr::WithExtra {
        base: DicePool::of(1, D8),
        extra: DicePool::of(n_sneak_dice, D6),
    };

    let (weapon, sneak_weapon) = if level >= 6 {
        (
            Weapon::new(DiceExpr::single(D8), DamageType::MagicPiercing)
                .with_ability(Ability::Dex)
                .with_modifiers(1, 1),
            Weapon::new(sneak, DamageType::MagicPiercing)
                .with_ability(Ability::Dex)
                .with_modifiers(1, 1),
        )
    } else {
        (
            Weapon::new(DiceExpr::single(D8), DamageType::Piercing).with_ability(Ability::Dex),
            Weapon::new(sneak, DamageType::Piercing).with_ability(Ability::Dex),
        )
    };
    let (offhand, offhand_sneak) = (
        Weapon::new(DiceExpr::single(D8), DamageType::Piercing).with_ability(Ability::Dex),
        Weapon::new(sneak, DamageType::Piercing).with_ability(Ability::Dex),
    );

    let strategy = AssassinRogue {
        level,
        weapon,
        sneak_weapon,
        offhand,
        offhand_sneak,
        sneak_attack: true,
        stroke_of_luck: false,
    };
    (c, Box::new(strategy))
}

struct AssassinRogue {
    level: u32,
    weapon: Weapon,
    sneak_weapon: Weapon,
    offhand: Weapon,
    offhand_sneak: Weapon,
    sneak_attack: bool,
    stroke_of_luck: bool,
}

impl AssassinRogue {
    fn pick_weapon(&self, sneak: bool, offhand: bool) -> &Weapon {
        match (sneak, offhand) {
            (true, false) => &self.sneak_weapon,
            (true, true) => &self.offhand_sneak,
            (false, false) => &self.weapon,
            (false, true) => &self.offhand,
        }
    }

    /// A rapier attack with Sneak Attack, Assassinate, Death Strike and
    /// Stroke of Luck layered on.
    fn attack(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena, offhand: bool) {
        let allies = enc.allies_of(arena, me).to_vec();
        let opponents = enc.foes_of(arena, me).to_vec();

        let surprised: Vec<CombatantId> = opponents
            .iter()
            .copied()
            .filter(|&e| {
                let c = arena.combatant(e);
                c.cond.surprised && c.hp > 0
            })
            .collect();

        // Prefer a surprised target for the automatic crit.
        let target = if let Some(swallower) = arena.swallower_of(me) {
            Some(swallower)
        } else if surprised.is_empty() {
            enc.choose_target(arena, me)
        } else {
            enc.choice(arena, &surprised)
        };
        let Some(target) = target else { return };

        if self.level >= 3 && arena.combatant(target).cond.surprised {
            // Assassinate: advantage, and any hit becomes a crit.
            let weapon = self.pick_weapon(self.sneak_attack, offhand).clone();
            let mut outcome = arena.roll_attack(me, &weapon, target, AttackOptions::advantage());

            if outcome == AttackOutcome::Miss && self.stroke_of_luck {
                arena.narrate(me, "used Stroke of Luck");
                self.stroke_of_luck = false;
                outcome = AttackOutcome::Hit;
            }

            if outcome.is_hit() {
                self.sneak_attack = false;
                let mut damage = arena.roll_weapon_damage(me, &weapon, !offhand, 2, false);

                // Death Strike: failed Con save doubles the whole hit.
                if self.level >= 17 {
                    let dc = 8
                        + arena.combatant(me).abilities.get(Ability::Dex)
                        + arena.combatant(me).proficiency;
                    if !arena.saving_throw(target, Ability::Con, dc, false, false, None) {
                        damage *= 2;
                    }
                }

                if arena.combatant(me).verbose {
                    debug!(
                        "{} scored a crit on {} for {} {} damage",
                        arena.combatant(me).tag(),
                        arena.combatant(target).tag(),
                        damage,
                        weapon.damage_type
                    );
                }
                arena.take_damage(target, damage, weapon.damage_type, Some(me), false, 0, None);
            }
        } else {
            let active_allies = allies
                .iter()
                .filter(|&&pc| {
                    let c = arena.combatant(pc);
                    c.hp > 0 && !c.is_incapacitated()
                })
                .count();
            let use_sneak = self.sneak_attack
                && (arena.has_attack_advantage(me, target, true)
                    || (active_allies > 1 && !arena.has_attack_disadvantage(me, target, true)));

            let weapon = self.pick_weapon(use_sneak, offhand).clone();
            let outcome = arena.weapon_attack(
                me,
                &weapon,
                Some(target),
                AttackOptions {
                    add_ability: !offhand,
                    ..AttackOptions::default()
                },
            );
            if outcome.is_some_and(AttackOutcome::is_hit) {
                self.sneak_attack = false;
            }
        }

        // Attacking gives away position.
        arena.combatant_mut(me).cond.stealth = 0;
    }
}

impl Strategy for AssassinRogue {
    fn reset_short_rest(&mut self, _me: CombatantId, _arena: &mut Arena) {
        if self.level >= 20 {
            self.stroke_of_luck = true;
        }
    }

    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        // Sneak Attack refreshes each turn.
        self.sneak_attack = true;

        if arena.combatant(me).cond.action {
            arena.narrate(me, "made an attack with Rapier");
            arena.combatant_mut(me).cond.action = false;
            if arena.combatant(me).cond.slowed > 0 {
                arena.combatant_mut(me).cond.bonus = false;
            }

            self.attack(me, enc, arena, false);

            // Offhand attack only if Sneak Attack has not landed yet.
            if self.level >= 4
                && self.sneak_attack
                && arena.combatant(me).cond.bonus
                && arena.alive(me)
            {
                arena.narrate(me, "made an attack with offhand Rapier");
                arena.combatant_mut(me).cond.bonus = false;
                self.attack(me, enc, arena, true);
            }
        }

        // Cunning Action: hide as a bonus action.
        if self.level >= 2 && arena.combatant(me).cond.bonus && arena.alive(me) {
            arena.combatant_mut(me).cond.bonus = false;
            let stealth = arena.roll_skill(me, Skill::Stealth, false, false);
            arena.combatant_mut(me).cond.stealth = stealth;
            if arena.combatant(me).verbose {
                debug!(
                    "{} used Hide and rolled {} on Stealth",
                    arena.combatant(me).tag(),
                    stealth
                );
            }
        }
    }
}

// =============================================================================
// Evocation Wizard
// =============================================================================

/// Forest gnome Evocation wizard.
fn evocation_wizard(level: u32, name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = base_character(name, verbose, level);

    let mut abilities = Abilities::new(-1, 2, 2, 3, 1, 0);
    if level >= 4 {
        *abilities.get_mut(Ability::Int) += 1;
    }
    if level >= 8 {
        *abilities.get_mut(Ability::Int) += 1;
    }
    if level >= 12 {
        *abilities.get_mut(Ability::Con) += 1;
    }
    if level >= 16 {
        *abilities.get_mut(Ability::Dex) += 1;
    }
    c.abilities = abilities;
    c.base_abilities = abilities;

    // Assumes Mage Armor is up; the slot is paid at each long rest.
    c.base_armor_class = 13;

    c.traits |= Traits::GNOME_CUNNING;
    if level >= 6 {
        c.traits |= Traits::POTENT_CANTRIP;
    }
    if level >= 10 {
        c.traits |= Traits::EMPOWERED_EVOCATION;
    }

    for skill in [
        Skill::Arcana,
        Skill::History,
        Skill::Insight,
        Skill::Investigation,
    ] {
        c.skill_proficiencies[skill.index()] = true;
    }

    if level >= 6 {
        c.spell_attack_modifier += 1;
    }

    c.save_proficiencies[Ability::Int.index()] = true;
    c.save_proficiencies[Ability::Wis.index()] = true;
    c.save_proficiencies[Ability::Con.index()] = level >= 12;

    c.spell_ability = Ability::Int;
    c.spell_slots = SpellSlots::new(full_caster_slots(level));
    c.hp_formula = HpFormula::Character {
        die: D6,
        level,
        tough: false,
    };

    let strategy = EvocationWizard {
        level,
        arcane_recovery: true,
        spell_slot_usage: Vec::new(),
    };
    (c, Box::new(strategy))
}

struct EvocationWizard {
    level: u32,
    arcane_recovery: bool,
    spell_slot_usage: Vec<u32>,
}

impl EvocationWizard {
    fn any_immune(arena: &Arena, opponents: &[CombatantId], damage_type: DamageType) -> bool {
        opponents
            .iter()
            .any(|&e| arena.combatant(e).immunities.has(damage_type))
    }
}

impl Strategy for EvocationWizard {
    fn reset_long_rest(&mut self, me: CombatantId, arena: &mut Arena) {
        arena.combatant_mut(me).spell_slots.restore_all();
        // Mage Armor is cast from the first-level slots after each long rest.
        arena.combatant_mut(me).spell_slots.spend(1);
        self.arcane_recovery = true;
    }

    fn after_short_rest(&mut self, me: CombatantId, arena: &mut Arena) {
        // Arcane Recovery once per day, after the rest completes.
        if self.arcane_recovery && arena.alive(me) {
            arena.narrate(me, "used Arcane Recovery");
            self.arcane_recovery = false;
            let mut recovery = (self.level as i32 + 1) / 2;
            for slot_index in (0..=5u32).rev() {
                let level = slot_index + 1;
                while arena.combatant(me).spell_slots.spent(level) > 0
                    && recovery > slot_index as i32
                {
                    if arena.combatant(me).verbose {
                        debug!(
                            "{} recovered a spell slot of level {}",
                            arena.combatant(me).tag(),
                            level
                        );
                    }
                    arena.combatant_mut(me).spell_slots.recover(level);
                    recovery -= level as i32;
                }
            }
        }
    }

    fn set_usage_rates(
        &mut self,
        me: CombatantId,
        arena: &mut Arena,
        encounters_per_long_rest: u32,
        _encounters_per_short_rest: u32,
    ) {
        let sum_slots = arena.combatant(me).spell_slots.full_total() - 1;
        self.spell_slot_usage = ration_late(sum_slots, encounters_per_long_rest);
    }

    #[allow(clippy::too_many_lines)]
    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        let slots = arena.combatant(me).spell_slots;

        let opponents: Vec<CombatantId> = enc
            .foes_of(arena, me)
            .iter()
            .copied()
            .filter(|&e| arena.alive(e))
            .collect();
        let n_opponents = opponents.len();

        let visible: Vec<CombatantId> = if arena.combatant(me).cond.blinded > 0 {
            Vec::new()
        } else {
            opponents
                .iter()
                .copied()
                .filter(|&e| !arena.combatant(e).is_hidden(arena.combatant(me)))
                .collect()
        };
        let n_visible = visible.len();

        let immune_acid = Self::any_immune(arena, &opponents, DamageType::Acid);
        let immune_cold = Self::any_immune(arena, &opponents, DamageType::Cold);
        let immune_fire = Self::any_immune(arena, &opponents, DamageType::Fire);
        let immune_force = Self::any_immune(arena, &opponents, DamageType::Force);
        let immune_lightning = Self::any_immune(arena, &opponents, DamageType::Lightning);
        let immune_necrotic = Self::any_immune(arena, &opponents, DamageType::Necrotic);
        let immune_poison = Self::any_immune(arena, &opponents, DamageType::Poison);
        let immune_thunder = Self::any_immune(arena, &opponents, DamageType::Thunder);
        let construct_or_undead = opponents.iter().any(|&e| {
            let c = arena.combatant(e);
            c.has_trait(Traits::CONSTRUCT) || c.undead.is_some()
        });

        let slowed = arena.combatant(me).cond.slowed > 0;
        let swallowed = arena.combatant(me).cond.swallowed.is_some();
        let budget = self
            .spell_slot_usage
            .get(enc.encounters_since_long_rest as usize)
            .copied()
            .unwrap_or(0);

        // Spend a leveled spell while ahead of the rationing schedule.
        if arena.combatant(me).cond.action && slots.remaining_total() > budget {
            arena.combatant_mut(me).cond.action = false;
            if slowed {
                arena.combatant_mut(me).cond.bonus = false;
            }

            if slots.lowest_available(4).is_some()
                && n_opponents == 1
                && !immune_necrotic
                && !construct_or_undead
                && n_visible > 0
            {
                let slot = slots.lowest_available(4).expect("checked above");
                if let Some(target) = enc.choice(arena, &visible) {
                    spells::blight(arena, me, slot, target);
                }
            } else if slots.lowest_available(3).is_some()
                && n_opponents > 1
                && !swallowed
                && !(immune_fire && immune_lightning)
            {
                let slot = slots.lowest_available(3).expect("checked above");
                let targets = enc.choose_targets(arena, me, 2, false);
                if immune_lightning || (!immune_fire && arena.rng_mut().random() < 0.5) {
                    spells::fireball(arena, me, slot, &targets);
                } else {
                    spells::lightning_bolt(arena, me, slot, &targets);
                }
            } else if slots.lowest_available(2).is_some() && !(immune_fire && immune_acid) {
                let slot = slots.lowest_available(2).expect("checked above");
                if immune_fire || (!immune_acid && arena.rng_mut().random() < 0.5) {
                    if let Some(target) = enc.choose_target(arena, me) {
                        spells::melfs_acid_arrow(arena, me, slot, target);
                    }
                } else {
                    // First ray is part of the cast; later rays each pick a
                    // target after the previous one resolves.
                    let target = enc.choose_target(arena, me);
                    spells::scorching_ray(arena, me, slot, target);
                    for _ in 0..slot {
                        let target = enc.choose_target(arena, me);
                        spells::scorching_ray_beam(arena, me, target);
                    }
                }
            } else if slots.lowest_available(1).is_some() && !swallowed {
                let slot = slots.lowest_available(1).expect("checked above");
                let coin = arena.rng_mut().random();

                if n_opponents == 1 && n_visible > 0 {
                    let damage_type = if immune_cold {
                        DamageType::Thunder
                    } else {
                        DamageType::Cold
                    };
                    if let Some(target) = enc.choose_target(arena, me) {
                        spells::chromatic_orb(arena, me, slot, target, damage_type);
                    }
                } else if immune_fire {
                    if immune_thunder || (!immune_force && n_visible > 0 && coin < 0.5) {
                        let targets =
                            enc.choose_targets(arena, me, slot as usize + 2, true);
                        spells::magic_missile(arena, me, slot, &targets);
                    } else {
                        let targets = enc.choose_targets(arena, me, 2, false);
                        spells::thunderwave(arena, me, slot, &targets);
                    }
                } else if immune_thunder {
                    if immune_force || n_visible == 0 || coin < 0.5 {
                        let targets = enc.choose_targets(arena, me, 2, false);
                        spells::burning_hands(arena, me, slot, &targets);
                    } else {
                        let targets =
                            enc.choose_targets(arena, me, slot as usize + 2, true);
                        spells::magic_missile(arena, me, slot, &targets);
                    }
                } else if immune_force || n_visible == 0 {
                    if coin < 0.5 {
                        let targets = enc.choose_targets(arena, me, 2, false);
                        spells::burning_hands(arena, me, slot, &targets);
                    } else {
                        let targets = enc.choose_targets(arena, me, 2, false);
                        spells::thunderwave(arena, me, slot, &targets);
                    }
                } else if coin < 1.0 / 3.0 {
                    let targets = enc.choose_targets(arena, me, 2, false);
                    spells::burning_hands(arena, me, slot, &targets);
                } else if coin < 2.0 / 3.0 {
                    let targets = enc.choose_targets(arena, me, slot as usize + 2, true);
                    spells::magic_missile(arena, me, slot, &targets);
                } else {
                    let targets = enc.choose_targets(arena, me, 2, false);
                    spells::thunderwave(arena, me, slot, &targets);
                }
            } else {
                // A slot remains but nothing castable while swallowed; fall
                // through to cantrips.
                arena.combatant_mut(me).cond.action = true;
            }
        }

        // Cantrips.
        if arena.combatant(me).cond.action {
            arena.combatant_mut(me).cond.action = false;
            if slowed {
                arena.combatant_mut(me).cond.bonus = false;
            }
            let coin = arena.rng_mut().random();

            if n_visible == 0 {
                let target = enc.choose_target(arena, me);
                spells::fire_bolt(arena, me, target);
            } else if immune_poison {
                if immune_fire || (!immune_acid && coin < 0.5) {
                    let targets = enc.choice_n(arena, &visible, 2, false);
                    spells::acid_splash(arena, me, &targets);
                } else {
                    let target = enc.choose_target(arena, me);
                    spells::fire_bolt(arena, me, target);
                }
            } else if immune_fire {
                if !immune_acid && coin < 0.5 {
                    let targets = enc.choice_n(arena, &visible, 2, false);
                    spells::acid_splash(arena, me, &targets);
                } else if let Some(target) = enc.choice(arena, &visible) {
                    spells::poison_spray(arena, me, target);
                }
            } else if immune_acid {
                if coin < 0.5 {
                    let target = enc.choose_target(arena, me);
                    spells::fire_bolt(arena, me, target);
                } else if let Some(target) = enc.choice(arena, &visible) {
                    spells::poison_spray(arena, me, target);
                }
            } else if coin < 1.0 / 3.0 {
                let targets = enc.choice_n(arena, &visible, 2, false);
                spells::acid_splash(arena, me, &targets);
            } else if coin < 2.0 / 3.0 {
                let target = enc.choose_target(arena, me);
                spells::fire_bolt(arena, me, target);
            } else if let Some(target) = enc.choice(arena, &visible) {
                spells::poison_spray(arena, me, target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicebag::DiceRng;

    #[test]
    fn proficiency_scales_every_four_levels() {
        assert_eq!(proficiency_for_level(1), 2);
        assert_eq!(proficiency_for_level(4), 2);
        assert_eq!(proficiency_for_level(5), 3);
        assert_eq!(proficiency_for_level(9), 4);
        assert_eq!(proficiency_for_level(13), 5);
        assert_eq!(proficiency_for_level(17), 6);
        assert_eq!(proficiency_for_level(20), 6);
    }

    #[test]
    fn spawn_characters_by_name() {
        let mut arena = Arena::new(DiceRng::from_seed(1));
        for class in ["Cleric", "Fighter", "Rogue", "Wizard"] {
            let id = spawn_character(&mut arena, class, 5, class, false).unwrap();
            assert!(arena.combatant(id).hp > 0);
            assert_eq!(arena.combatant(id).proficiency, 3);
        }
        assert!(matches!(
            spawn_character(&mut arena, "Barbarian", 5, "x", false),
            Err(RosterError::UnknownClass(_))
        ));
    }

    #[test]
    fn level_one_fighter_stat_block() {
        let mut arena = Arena::new(DiceRng::from_seed(1));
        let id = spawn_character(&mut arena, "Fighter", 1, "Fighter", false).unwrap();
        let c = arena.combatant(id);
        // 10 - 6 + 1 * (6 + 3) = 13 hit points, deterministic
        assert_eq!(c.max_hp, 13);
        assert_eq!(c.armor_class(), 16);
        assert_eq!(c.crit_threshold, 20);
        assert!(c.resistances.has(DamageType::Poison));
    }

    #[test]
    fn wizard_pays_for_mage_armor() {
        let mut arena = Arena::new(DiceRng::from_seed(1));
        let id = spawn_character(&mut arena, "Wizard", 1, "Wizard", false).unwrap();
        // Two first-level slots, one spent on Mage Armor
        assert_eq!(arena.combatant(id).spell_slots.remaining(1), 1);
    }

    #[test]
    fn cleric_death_ward_at_level_seven() {
        let mut arena = Arena::new(DiceRng::from_seed(1));
        let id = spawn_character(&mut arena, "Cleric", 7, "Cleric", false).unwrap();
        assert!(arena.combatant(id).cond.death_ward);
        assert_eq!(arena.combatant(id).spell_slots.remaining(4), 0);
    }
}
