//! The monster catalog.
//!
//! Each monster is a stat block plus a decision strategy; the roster is a
//! deliberate cross-section of the engine's mechanisms — pack tactics, webs,
//! paralysis, fear, bleeding wounds, grapples and swallowing, engulfing,
//! slows, regeneration, head loss, reactive spellcasting, legendary and lair
//! actions — so every subsystem has at least one live consumer.

use dicebag::{DiceExpr, DicePool, D10, D12, D6, D8};
use serde::{Deserialize, Serialize};

use crate::arena::Arena;
use crate::combatant::{Combatant, CombatantId, HpFormula, Side};
use crate::effect::EffectKind;
use crate::encounter::Encounter;
use crate::spells;
use crate::stats::{Abilities, Ability, DamageType, DamageTypes, SaveTag, Skill, Traits};
use crate::strategy::Strategy;
use crate::weapon::{AttackOptions, AttackOutcome, Weapon};
use crate::RosterError;

/// Builds a monster by name on side B of the arena.
pub fn spawn_monster(
    arena: &mut Arena,
    kind: &str,
    name: &str,
    verbose: bool,
) -> Result<CombatantId, RosterError> {
    let (combatant, strategy): (Combatant, Box<dyn Strategy>) = match kind {
        "Kobold" => kobold(name, verbose),
        "Jackal" => jackal(name, verbose),
        "Thug" => thug(name, verbose),
        "GiantSpider" => giant_spider(name, verbose),
        "Ghoul" => ghoul(name, verbose),
        "Banshee" => banshee(name, verbose),
        "BeardedDevil" => bearded_devil(name, verbose),
        "Behir" => behir(name, verbose),
        "ShamblingMound" => shambling_mound(name, verbose),
        "StoneGolem" => stone_golem(name, verbose),
        "Troll" => troll(name, verbose),
        "Hydra" => hydra(name, verbose),
        "Mage" => mage(name, verbose),
        "Aboleth" => aboleth(name, verbose),
        _ => return Err(RosterError::UnknownCreature(kind.to_string())),
    };
    let id = arena.spawn(combatant, strategy);
    arena.with_strategy(id, |s, a| s.reset_conditions(id, a));
    Ok(id)
}

fn monster(name: &str, verbose: bool) -> Combatant {
    Combatant::new(name, Side::B, verbose)
}

/// Whether a living ally other than the actor is up (pack tactics).
fn pack_tactics(arena: &Arena, enc: &Encounter, me: CombatantId) -> bool {
    enc.allies_of(arena, me)
        .iter()
        .filter(|&&ally| arena.alive(ally))
        .count()
        > 1
}

fn living_foes(arena: &Arena, enc: &Encounter, me: CombatantId) -> Vec<CombatantId> {
    enc.foes_of(arena, me)
        .iter()
        .copied()
        .filter(|&e| arena.alive(e))
        .collect()
}

/// One-in-three recharge roll for expended abilities.
fn recharge(arena: &mut Arena, flag: &mut bool) {
    if !*flag && arena.rng_mut().random() >= 2.0 / 3.0 {
        *flag = true;
    }
}

fn take_action(arena: &mut Arena, me: CombatantId) -> bool {
    if arena.combatant(me).cond.action {
        arena.combatant_mut(me).cond.action = false;
        true
    } else {
        false
    }
}

// =============================================================================
// Kobold
// =============================================================================

fn kobold(name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = monster(name, verbose);
    c.abilities = Abilities::new(-2, 2, -1, -1, -2, -1);
    c.base_abilities = c.abilities;
    c.base_armor_class = 10;
    c.proficiency = 2;
    c.hp_formula = HpFormula::Monster { die: D6, count: 2 };

    let weapon = Weapon::new(DiceExpr::single(dicebag::D4), DamageType::Piercing)
        .with_ability(Ability::Dex);
    (c, Box::new(Kobold { weapon }))
}

struct Kobold {
    weapon: Weapon,
}

impl Strategy for Kobold {
    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        if take_action(arena, me) {
            arena.narrate(me, "made an attack with Dagger");
            let target = enc.choose_target(arena, me);
            // Pack Tactics gives advantage if an ally is within reach
            let adv = pack_tactics(arena, enc, me);
            arena.weapon_attack(
                me,
                &self.weapon,
                target,
                AttackOptions {
                    adv,
                    ..AttackOptions::default()
                },
            );
        }
    }
}

// =============================================================================
// Jackal
// =============================================================================

fn jackal(name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = monster(name, verbose);
    c.abilities = Abilities::new(-1, 2, 0, -4, 1, -2);
    c.base_abilities = c.abilities;
    c.base_armor_class = 10;
    c.proficiency = 2;
    c.skill_proficiencies[Skill::Perception.index()] = true;
    c.hp_formula = HpFormula::Monster { die: D6, count: 1 };

    let weapon = Weapon::new(DiceExpr::single(dicebag::D4), DamageType::Piercing);
    (c, Box::new(Jackal { weapon }))
}

struct Jackal {
    weapon: Weapon,
}

impl Strategy for Jackal {
    fn reset_conditions(&mut self, me: CombatantId, arena: &mut Arena) {
        // Keen hearing and smell
        arena.combatant_mut(me).cond.skill_adv[Skill::Perception.index()] += 1;
    }

    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        if take_action(arena, me) {
            arena.narrate(me, "made an attack with Bite");
            let target = enc.choose_target(arena, me);
            let adv = pack_tactics(arena, enc, me);
            arena.weapon_attack(
                me,
                &self.weapon,
                target,
                AttackOptions {
                    adv,
                    ..AttackOptions::default()
                },
            );
        }
    }
}

// =============================================================================
// Thug
// =============================================================================

fn thug(name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = monster(name, verbose);
    c.abilities = Abilities::new(2, 0, 2, 0, 0, 0);
    c.base_abilities = c.abilities;
    c.base_armor_class = 11;
    c.proficiency = 2;
    c.skill_proficiencies[Skill::Intimidation.index()] = true;
    c.hp_formula = HpFormula::Monster { die: D8, count: 5 };

    let weapon = Weapon::new(DiceExpr::single(D6), DamageType::Bludgeoning);
    (c, Box::new(Thug { weapon }))
}

struct Thug {
    weapon: Weapon,
}

impl Strategy for Thug {
    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        if take_action(arena, me) {
            arena.narrate(me, "made an attack with Mace");
            for _ in 0..2 {
                let target = enc.choose_target(arena, me);
                let adv = pack_tactics(arena, enc, me);
                arena.weapon_attack(
                    me,
                    &self.weapon,
                    target,
                    AttackOptions {
                        adv,
                        ..AttackOptions::default()
                    },
                );
            }
        }
    }
}

// =============================================================================
// Giant Spider
// =============================================================================

fn giant_spider(name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = monster(name, verbose);
    c.abilities = Abilities::new(2, 3, 1, -4, 0, -3);
    c.base_abilities = c.abilities;
    c.base_armor_class = 11;
    c.proficiency = 2;
    c.hp_formula = HpFormula::Monster { die: D10, count: 4 };

    let bite = Weapon::new(DiceExpr::single(D8), DamageType::Piercing).with_ability(Ability::Dex);
    // The web is a contested attack roll only; it deals no dice damage.
    let web = Weapon::new(DiceExpr::None, DamageType::Bludgeoning).with_ability(Ability::Dex);
    (c, Box::new(GiantSpider { bite, web_weapon: web, web: true }))
}

struct GiantSpider {
    bite: Weapon,
    web_weapon: Weapon,
    web: bool,
}

impl Strategy for GiantSpider {
    fn reset_conditions(&mut self, _me: CombatantId, _arena: &mut Arena) {
        self.web = true;
    }

    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        recharge(arena, &mut self.web);

        if take_action(arena, me) {
            let Some(target) = enc.choose_target(arena, me) else {
                return;
            };

            let (str_mod, con_mod, proficiency) = {
                let c = arena.combatant(me);
                (
                    c.abilities.get(Ability::Str),
                    c.abilities.get(Ability::Con),
                    c.proficiency,
                )
            };

            if self.web && arena.combatant(target).cond.restrained == 0 {
                arena.narrate(me, "made an attack with Web");
                self.web = false;
                let outcome = arena.roll_attack(me, &self.web_weapon, target, AttackOptions::default());
                if outcome.is_hit() {
                    arena.apply_effect(
                        EffectKind::WebRestrained {
                            target,
                            check_dc: 8 + proficiency + str_mod,
                        },
                        None,
                    );
                }
            } else {
                arena.narrate(me, "made an attack with Bite");
                let outcome =
                    arena.weapon_attack(me, &self.bite, Some(target), AttackOptions::default());
                if outcome.is_some_and(AttackOutcome::is_hit) {
                    let damage = D8.sum(arena.rng_mut(), 2);
                    arena.half_saving_throw(
                        target,
                        Ability::Con,
                        8 + proficiency + con_mod,
                        damage,
                        DamageType::Poison,
                        0,
                        None,
                        false,
                        false,
                        Some(SaveTag::Poison),
                    );
                    // Poison knocks the dying out cold for wrapping up
                    if arena.combatant(target).hp == 0 {
                        arena.combatant_mut(target).cond.paralyzed += 1;
                    }
                }
            }
        }
    }
}

// =============================================================================
// Ghoul
// =============================================================================

fn ghoul(name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = monster(name, verbose);
    c.abilities = Abilities::new(1, 2, 0, -2, 0, -2);
    c.base_abilities = c.abilities;
    c.base_armor_class = 10;
    c.proficiency = 2;
    c.immunities |= DamageTypes::POISON;
    c.undead = Some(1.0);
    c.hp_formula = HpFormula::Monster { die: D8, count: 5 };

    let bite = Weapon::new(DiceExpr::pool(2, D6), DamageType::Piercing)
        .with_ability(Ability::Dex)
        .unproficient();
    let claws = Weapon::new(DiceExpr::pool(2, dicebag::D4), DamageType::Slashing)
        .with_ability(Ability::Dex);
    (c, Box::new(Ghoul { bite, claws }))
}

struct Ghoul {
    bite: Weapon,
    claws: Weapon,
}

impl Strategy for Ghoul {
    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        if take_action(arena, me) {
            let Some(target) = enc.choose_target(arena, me) else {
                return;
            };

            // Bite paralyzed prey, claw everyone else
            if arena.combatant(target).cond.paralyzed > 0 {
                arena.narrate(me, "made an attack with Bite");
                arena.weapon_attack(me, &self.bite, Some(target), AttackOptions::default());
            } else {
                arena.narrate(me, "made an attack with Claws");
                let outcome =
                    arena.weapon_attack(me, &self.claws, Some(target), AttackOptions::default());

                let dc = 8
                    + arena.combatant(me).proficiency
                    + arena.combatant(me).abilities.get(Ability::Con);
                if outcome.is_some_and(AttackOutcome::is_hit)
                    && !arena.combatant(target).has_trait(Traits::GHOUL_PARALYSIS_IMMUNITY)
                    && !arena.saving_throw(target, Ability::Con, dc, false, false, None)
                {
                    arena.apply_effect(
                        EffectKind::Paralyzed {
                            source: me,
                            target,
                            save_dc: dc,
                        },
                        Some(10),
                    );
                }
            }
        }
    }
}

// =============================================================================
// Banshee
// =============================================================================

fn banshee(name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = monster(name, verbose);
    c.abilities = Abilities::new(-5, 2, 0, 1, 0, 3);
    c.base_abilities = c.abilities;
    c.base_armor_class = 10;
    c.proficiency = 2;
    c.immunities |= DamageTypes::COLD | DamageTypes::NECROTIC | DamageTypes::POISON;
    c.resistances |= DamageTypes::ACID
        | DamageTypes::BLUDGEONING
        | DamageTypes::FIRE
        | DamageTypes::LIGHTNING
        | DamageTypes::PIERCING
        | DamageTypes::SLASHING
        | DamageTypes::THUNDER;
    c.save_proficiencies[Ability::Wis.index()] = true;
    c.save_proficiencies[Ability::Cha.index()] = true;
    c.undead = Some(4.0);
    c.hp_formula = HpFormula::Monster { die: D8, count: 13 };

    let weapon =
        Weapon::new(DiceExpr::pool(3, D6), DamageType::Necrotic).with_ability(Ability::Dex);
    (c, Box::new(Banshee { weapon, wail: true }))
}

struct Banshee {
    weapon: Weapon,
    wail: bool,
}

impl Strategy for Banshee {
    fn reset_conditions(&mut self, _me: CombatantId, _arena: &mut Arena) {
        self.wail = true;
    }

    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        let valid = living_foes(arena, enc, me);
        let unfrightened: Vec<CombatantId> = valid
            .iter()
            .copied()
            .filter(|&e| arena.combatant(e).cond.frightened == 0)
            .collect();

        if take_action(arena, me) {
            let dc = 8
                + arena.combatant(me).proficiency
                + arena.combatant(me).abilities.get(Ability::Cha);

            if self.wail {
                arena.narrate(me, "used Wail");
                self.wail = false;

                let targets = if valid.len() <= 2 {
                    valid
                } else {
                    enc.choice_n(arena, &valid, 2, false)
                };
                // One damage roll for everyone caught in the wail
                let damage = D6.sum(arena.rng_mut(), 3);
                for target in targets {
                    if arena.saving_throw(target, Ability::Con, dc, false, false, None) {
                        arena.take_damage(
                            target,
                            damage,
                            DamageType::Psychic,
                            None,
                            false,
                            0,
                            None,
                        );
                    } else {
                        // A failed save against the wail drops to zero outright
                        arena.combatant_mut(target).hp = 0;
                        arena.fall_unconscious(target);
                    }
                }
            } else if unfrightened.len() > 1 {
                arena.narrate(me, "used Horrifying Visage");
                let targets = if unfrightened.len() <= 2 {
                    unfrightened
                } else {
                    enc.choice_n(arena, &unfrightened, 2, false)
                };
                for target in targets {
                    if !arena.saving_throw(target, Ability::Wis, dc, false, false, None) {
                        arena.apply_effect(
                            EffectKind::Frightened {
                                source: me,
                                target,
                                save_dc: dc,
                            },
                            Some(10),
                        );
                    }
                }
            } else {
                arena.narrate(me, "made an attack with Corrupting Touch");
                let target = enc.choose_target(arena, me);
                arena.weapon_attack(me, &self.weapon, target, AttackOptions::default());
            }
        }
    }
}

// =============================================================================
// Bearded Devil
// =============================================================================

fn bearded_devil(name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = monster(name, verbose);
    c.abilities = Abilities::new(3, 2, 2, -1, 0, 0);
    c.base_abilities = c.abilities;
    c.base_armor_class = 11;
    c.proficiency = 2;
    c.immunities |= DamageTypes::FIRE | DamageTypes::POISON;
    c.resistances |= DamageTypes::COLD;
    c.save_proficiencies[Ability::Str.index()] = true;
    c.save_proficiencies[Ability::Con.index()] = true;
    c.save_proficiencies[Ability::Wis.index()] = true;
    c.hp_formula = HpFormula::Monster { die: D8, count: 8 };

    let beard = Weapon::new(DiceExpr::single(D8), DamageType::Piercing);
    let glaive = Weapon::new(DiceExpr::single(D10), DamageType::Slashing);
    (c, Box::new(BeardedDevil { beard, glaive }))
}

struct BeardedDevil {
    beard: Weapon,
    glaive: Weapon,
}

impl Strategy for BeardedDevil {
    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        if take_action(arena, me) {
            arena.narrate(me, "made an attack with Beard and Glaive");

            // Beard: poison on a hit
            if let Some(target) = enc.choose_target(arena, me) {
                let outcome =
                    arena.weapon_attack(me, &self.beard, Some(target), AttackOptions::default());
                if outcome.is_some_and(AttackOutcome::is_hit)
                    && arena.alive(target)
                    && !arena.saving_throw(
                        target,
                        Ability::Con,
                        12,
                        false,
                        false,
                        Some(SaveTag::Poison),
                    )
                {
                    arena.apply_effect(
                        EffectKind::Poisoned {
                            source: me,
                            target,
                            save_dc: 12,
                        },
                        Some(10),
                    );
                }
            }

            // Glaive: an infernal wound that bleeds until magically healed
            if let Some(target) = enc.choose_target(arena, me) {
                let outcome =
                    arena.weapon_attack(me, &self.glaive, Some(target), AttackOptions::default());
                let t = arena.combatant(target);
                if outcome.is_some_and(AttackOutcome::is_hit)
                    && t.hp > 0
                    && !t.has_trait(Traits::CONSTRUCT)
                    && t.undead.is_none()
                    && !arena.saving_throw(target, Ability::Con, 12, false, false, None)
                {
                    arena.apply_effect(
                        EffectKind::Bleeding {
                            target,
                            dice: DiceExpr::single(D10),
                            damage_type: DamageType::Slashing,
                            wounds: 1,
                        },
                        Some(10),
                    );
                }
            }
        }
    }
}

// =============================================================================
// Behir
// =============================================================================

fn behir(name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = monster(name, verbose);
    c.abilities = Abilities::new(6, 3, 4, -2, 2, 1);
    c.base_abilities = c.abilities;
    c.base_armor_class = 14;
    c.proficiency = 4;
    c.immunities |= DamageTypes::LIGHTNING;
    c.skill_proficiencies[Skill::Perception.index()] = true;
    c.skill_proficiencies[Skill::Stealth.index()] = true;
    c.hp_formula = HpFormula::Monster { die: D12, count: 16 };

    let bite = Weapon::new(DiceExpr::pool(3, D10), DamageType::Piercing);
    let constrict = Weapon::new(DiceExpr::pool(2, D10), DamageType::Bludgeoning)
        .with_secondary(DiceExpr::pool(2, D10), DamageType::Slashing);
    (c, Box::new(Behir { bite, constrict, breath: true }))
}

struct Behir {
    bite: Weapon,
    constrict: Weapon,
    breath: bool,
}

impl Strategy for Behir {
    fn reset_conditions(&mut self, _me: CombatantId, _arena: &mut Arena) {
        self.breath = true;
    }

    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        recharge(arena, &mut self.breath);

        // Stomach acid, one roll for everything swallowed
        let damage = D6.sum(arena.rng_mut(), 6);
        let inside = arena.combatant(me).cond.swallowed_creatures.clone();
        for creature in inside {
            if arena.alive(creature) {
                arena.take_damage(creature, damage, DamageType::Acid, None, false, 0, None);
            }
        }

        // Stop grappling unconscious creatures
        let grapples = arena.combatant(me).cond.grappling.clone();
        for gid in grapples {
            if arena.effects().is_ended(gid) {
                continue;
            }
            if let EffectKind::Grapple { target, .. } = *arena.effects().kind(gid) {
                if !arena.alive(target) {
                    arena.end_effect(gid);
                }
            }
        }

        let valid: Vec<CombatantId> = living_foes(arena, enc, me)
            .into_iter()
            .filter(|&e| arena.combatant(e).cond.swallowed.is_none())
            .collect();

        if !valid.is_empty() && take_action(arena, me) {
            let dc = 8
                + arena.combatant(me).proficiency
                + arena.combatant(me).abilities.get(Ability::Con);

            if self.breath {
                arena.narrate(me, "used Lightning Breath");
                self.breath = false;

                let damage = D10.sum(arena.rng_mut(), 12);
                let targets = if valid.len() <= 2 {
                    valid
                } else {
                    enc.choice_n(arena, &valid, 2, false)
                };
                for target in targets {
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
                        None,
                    );
                }
            } else if !arena.combatant(me).cond.grappling.is_empty()
                && arena.combatant(me).cond.swallowed_creatures.len() <= 1
            {
                arena.narrate(me, "used Swallow");
                let gid = arena.combatant(me).cond.grappling[0];
                let EffectKind::Grapple { target, .. } = *arena.effects().kind(gid) else {
                    return;
                };

                let outcome =
                    arena.weapon_attack(me, &self.bite, Some(target), AttackOptions::default());
                if arena.alive(target) && outcome.is_some_and(AttackOutcome::is_hit) {
                    let held = arena.combatant(target).cond.grappled.clone();
                    for grapple in held {
                        arena.end_effect(grapple);
                    }
                    arena.apply_effect(
                        EffectKind::Swallowed {
                            swallower: me,
                            target,
                            threshold: 30,
                            save_dc: 14,
                        },
                        None,
                    );
                }
            } else {
                arena.narrate(me, "made an attack with Bite and Constrict");
                let target = enc.choice(arena, &valid);
                arena.weapon_attack(me, &self.bite, target, AttackOptions::default());

                let valid: Vec<CombatantId> = living_foes(arena, enc, me)
                    .into_iter()
                    .filter(|&e| arena.combatant(e).cond.swallowed.is_none())
                    .collect();
                if let Some(target) = enc.choice(arena, &valid) {
                    let outcome = arena.weapon_attack(
                        me,
                        &self.constrict,
                        Some(target),
                        AttackOptions::default(),
                    );
                    if arena.alive(target)
                        && arena.combatant(me).cond.grappling.is_empty()
                        && outcome.is_some_and(AttackOutcome::is_hit)
                    {
                        arena.apply_effect(
                            EffectKind::Grapple {
                                grappler: me,
                                target,
                                restrained: true,
                                stunned: false,
                                escape_priority: false,
                            },
                            None,
                        );
                    }
                }
            }
        }
    }
}

// =============================================================================
// Shambling Mound
// =============================================================================

fn shambling_mound(name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = monster(name, verbose);
    c.abilities = Abilities::new(4, -1, 3, -3, 0, -3);
    c.base_abilities = c.abilities;
    c.base_armor_class = 16;
    c.proficiency = 3;
    c.traits |= Traits::BLINDSIGHT | Traits::ABSORB_LIGHTNING;
    c.immunities |= DamageTypes::LIGHTNING;
    c.resistances |= DamageTypes::COLD | DamageTypes::FIRE;
    c.hp_formula = HpFormula::Monster { die: D10, count: 16 };

    let weapon = Weapon::new(DiceExpr::pool(2, D8), DamageType::Bludgeoning);
    (c, Box::new(ShamblingMound { weapon }))
}

struct ShamblingMound {
    weapon: Weapon,
}

impl Strategy for ShamblingMound {
    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        // Release anything that has gone down, then crush the rest
        let engulfed = arena.combatant(me).cond.engulfed_creatures.clone();
        for creature in engulfed {
            if !arena.alive(creature) {
                if let Some(eid) = arena.combatant(creature).cond.engulfed {
                    arena.end_effect(eid);
                }
            }
        }

        let dc = 8
            + arena.combatant(me).proficiency
            + arena.combatant(me).abilities.get(Ability::Con);
        let str_mod = arena.combatant(me).abilities.get(Ability::Str);

        let engulfed = arena.combatant(me).cond.engulfed_creatures.clone();
        for creature in engulfed {
            if !arena.saving_throw(creature, Ability::Con, dc, false, false, None) {
                let damage = D8.sum(arena.rng_mut(), 2) + str_mod;
                arena.take_damage(
                    creature,
                    damage,
                    DamageType::Bludgeoning,
                    None,
                    false,
                    0,
                    None,
                );
                if !arena.alive(creature) {
                    if let Some(eid) = arena.combatant(creature).cond.engulfed {
                        arena.end_effect(eid);
                    }
                }
            }
        }

        let valid: Vec<CombatantId> = living_foes(arena, enc, me)
            .into_iter()
            .filter(|&e| arena.combatant(e).cond.engulfed.is_none())
            .collect();

        if take_action(arena, me) {
            arena.narrate(me, "made an attack with Slam");
            if let Some(target) = enc.choice(arena, &valid) {
                let first =
                    arena.weapon_attack(me, &self.weapon, Some(target), AttackOptions::default());
                let second =
                    arena.weapon_attack(me, &self.weapon, Some(target), AttackOptions::default());

                // Both slams connecting means the target is engulfed
                if first.is_some_and(AttackOutcome::is_hit)
                    && second.is_some_and(AttackOutcome::is_hit)
                    && arena.alive(target)
                {
                    arena.narrate(me, "used Engulf");
                    arena.apply_effect(
                        EffectKind::Engulfed {
                            engulfer: me,
                            target,
                            escape_dc: dc,
                            blinds: true,
                        },
                        None,
                    );
                }
            } else {
                let target = enc.choose_target(arena, me);
                arena.weapon_attack(me, &self.weapon, target, AttackOptions::default());
                let target = enc.choose_target(arena, me);
                arena.weapon_attack(me, &self.weapon, target, AttackOptions::default());
            }
        }
    }
}

// =============================================================================
// Stone Golem
// =============================================================================

fn stone_golem(name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = monster(name, verbose);
    c.abilities = Abilities::new(6, -1, 5, -4, 0, -5);
    c.base_abilities = c.abilities;
    c.base_armor_class = 18;
    c.proficiency = 4;
    c.traits |= Traits::CONSTRUCT | Traits::MAGIC_RESISTANCE;
    c.immunities |= DamageTypes::BLUDGEONING
        | DamageTypes::PIERCING
        | DamageTypes::POISON
        | DamageTypes::PSYCHIC
        | DamageTypes::SLASHING;
    c.hp_formula = HpFormula::Monster { die: D10, count: 17 };

    let weapon = Weapon::new(DiceExpr::pool(3, D8), DamageType::MagicBludgeoning);
    (c, Box::new(StoneGolem { weapon, slow: true }))
}

struct StoneGolem {
    weapon: Weapon,
    slow: bool,
}

impl Strategy for StoneGolem {
    fn reset_conditions(&mut self, _me: CombatantId, _arena: &mut Arena) {
        self.slow = true;
    }

    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        recharge(arena, &mut self.slow);

        if take_action(arena, me) {
            let valid: Vec<CombatantId> = living_foes(arena, enc, me)
                .into_iter()
                .filter(|&e| arena.combatant(e).cond.slowed == 0)
                .collect();

            if self.slow && !valid.is_empty() {
                self.slow = false;
                arena.narrate(me, "used Slow");

                let dc = 8
                    + arena.combatant(me).proficiency
                    + arena.combatant(me).abilities.get(Ability::Con);
                let targets = if valid.len() <= 2 {
                    valid
                } else {
                    enc.choice_n(arena, &valid, 2, false)
                };
                for target in targets {
                    if !arena.saving_throw(
                        target,
                        Ability::Wis,
                        dc,
                        false,
                        false,
                        Some(SaveTag::Magic),
                    ) {
                        arena.apply_effect(
                            EffectKind::Slowed {
                                source: me,
                                target,
                                save_dc: dc,
                            },
                            Some(10),
                        );
                    }
                }
            } else {
                arena.narrate(me, "made an attack with Fist");
                let target = enc.choose_target(arena, me);
                arena.weapon_attack(me, &self.weapon, target, AttackOptions::default());
                let target = enc.choose_target(arena, me);
                arena.weapon_attack(me, &self.weapon, target, AttackOptions::default());
            }
        }
    }
}

// =============================================================================
// Troll
// =============================================================================

fn troll(name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = monster(name, verbose);
    c.abilities = Abilities::new(4, 1, 5, -2, -1, -2);
    c.base_abilities = c.abilities;
    c.base_armor_class = 14;
    c.proficiency = 3;
    c.skill_proficiencies[Skill::Perception.index()] = true;
    c.regeneration = Some(10);
    c.hp_formula = HpFormula::Monster { die: D10, count: 8 };

    let bite = Weapon::new(DiceExpr::single(D6), DamageType::Piercing);
    let claw = Weapon::new(DiceExpr::pool(2, D6), DamageType::Slashing);
    (c, Box::new(Troll { bite, claw }))
}

struct Troll {
    bite: Weapon,
    claw: Weapon,
}

impl Strategy for Troll {
    fn reset_conditions(&mut self, me: CombatantId, arena: &mut Arena) {
        // Keen smell
        arena.combatant_mut(me).cond.skill_adv[Skill::Perception.index()] += 1;
    }

    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        if take_action(arena, me) {
            arena.narrate(me, "made an attack with Bite and Claws");
            let target = enc.choose_target(arena, me);
            arena.weapon_attack(me, &self.bite, target, AttackOptions::default());
            let target = enc.choose_target(arena, me);
            arena.weapon_attack(me, &self.claw, target, AttackOptions::default());
            let target = enc.choose_target(arena, me);
            arena.weapon_attack(me, &self.claw, target, AttackOptions::default());
        }
    }
}

// =============================================================================
// Hydra
// =============================================================================

fn hydra(name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = monster(name, verbose);
    c.abilities = Abilities::new(5, 1, 5, -4, 0, -2);
    c.base_abilities = c.abilities;
    c.base_armor_class = 14;
    c.proficiency = 3;
    c.skill_modifiers[Skill::Perception.index()] = c.proficiency;
    c.skill_proficiencies[Skill::Perception.index()] = true;
    c.total_heads = Some(5);
    c.hp_formula = HpFormula::Monster { die: D12, count: 15 };

    let weapon = Weapon::new(DiceExpr::single(D10), DamageType::Piercing);
    (c, Box::new(Hydra { weapon }))
}

struct Hydra {
    weapon: Weapon,
}

impl Strategy for Hydra {
    fn start_encounter(&mut self, me: CombatantId, _enc: &Encounter, arena: &mut Arena) {
        // Watch for 25 damage in a single turn severing a head
        arena.apply_effect(
            EffectKind::HeadLoss {
                creature: me,
                threshold: 25,
            },
            None,
        );
    }

    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        if take_action(arena, me) {
            arena.narrate(me, "made an attack with Bite");
            let heads = arena.combatant(me).cond.heads;
            for _ in 0..heads {
                let target = enc.choose_target(arena, me);
                arena.weapon_attack(me, &self.weapon, target, AttackOptions::default());
            }
        }
    }

    fn end_turn(&mut self, me: CombatantId, _enc: &Encounter, arena: &mut Arena) {
        // Severed heads grow back two-for-one unless fire stopped them
        let (regrow, lost) = {
            let c = arena.combatant(me);
            (c.cond.regrow_heads, c.cond.heads_lost_this_round)
        };
        if regrow && lost > 0 {
            if arena.combatant(me).verbose {
                tracing::debug!(
                    "{} regrew {} heads",
                    arena.combatant(me).tag(),
                    2 * lost
                );
            }
            arena.combatant_mut(me).cond.heads += 2 * lost;
            arena.heal(me, 20 * lost as i32, false);
        }
        let c = arena.combatant_mut(me);
        c.cond.heads_lost_this_round = 0;
        c.cond.regrow_heads = true;
    }
}

// =============================================================================
// Mage
// =============================================================================

fn mage(name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = monster(name, verbose);
    c.abilities = Abilities::new(-1, 2, 0, 3, 1, 0);
    c.base_abilities = c.abilities;
    c.base_armor_class = 13;
    c.proficiency = 3;
    c.level = 9;
    c.save_proficiencies[Ability::Int.index()] = true;
    c.save_proficiencies[Ability::Wis.index()] = true;
    c.skill_proficiencies[Skill::Arcana.index()] = true;
    c.skill_proficiencies[Skill::History.index()] = true;
    c.spell_ability = Ability::Int;
    c.traits |= Traits::SHIELD_REACTION;
    // Slots assume Mage Armor was cast from a first-level slot
    c.spell_slots = crate::combatant::SpellSlots::new([3, 3, 3, 3, 1, 0, 0, 0, 0]);
    c.hp_formula = HpFormula::Monster { die: D8, count: 9 };

    (c, Box::new(Mage))
}

struct Mage;

impl Strategy for Mage {
    fn reset_conditions(&mut self, me: CombatantId, arena: &mut Arena) {
        // Recover spell slots, then open invisible
        arena.combatant_mut(me).spell_slots.restore_all();
        spells::greater_invisibility(arena, me, 4, me);
    }

    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        let slots = arena.combatant(me).spell_slots;

        if take_action(arena, me) {
            if let Some(slot) = slots.lowest_available(5) {
                let targets = enc.choose_targets(arena, me, 2, false);
                spells::cone_of_cold(arena, me, slot, &targets);
            } else if let Some(slot) = slots.lowest_available(3) {
                let targets = enc.choose_targets(arena, me, 2, false);
                spells::fireball(arena, me, slot, &targets);
            } else if let Some(slot) = slots.lowest_available(1) {
                let targets = enc.choose_targets(arena, me, slot as usize + 2, true);
                spells::magic_missile(arena, me, slot, &targets);
            } else {
                let target = enc.choose_target(arena, me);
                spells::fire_bolt(arena, me, target);
            }
        }
    }
}

// =============================================================================
// Aboleth
// =============================================================================

fn aboleth(name: &str, verbose: bool) -> (Combatant, Box<dyn Strategy>) {
    let mut c = monster(name, verbose);
    c.abilities = Abilities::new(5, -1, 2, 4, 2, 4);
    c.base_abilities = c.abilities;
    c.base_armor_class = 18;
    c.proficiency = 4;
    c.save_proficiencies[Ability::Con.index()] = true;
    c.save_proficiencies[Ability::Int.index()] = true;
    c.save_proficiencies[Ability::Wis.index()] = true;
    c.skill_modifiers[Skill::History.index()] = c.proficiency;
    c.skill_modifiers[Skill::Perception.index()] = c.proficiency;
    c.skill_proficiencies[Skill::History.index()] = true;
    c.skill_proficiencies[Skill::Perception.index()] = true;
    c.legendary_actions = 3;
    c.hp_formula = HpFormula::Monster { die: D10, count: 18 };

    let tentacle = Weapon::new(DiceExpr::pool(2, D6), DamageType::Bludgeoning);
    let tail = Weapon::new(DiceExpr::pool(3, D6), DamageType::Bludgeoning);
    (c, Box::new(Aboleth { tentacle, tail, psychic_lair_action: true }))
}

struct Aboleth {
    tentacle: Weapon,
    tail: Weapon,
    psychic_lair_action: bool,
}

impl Strategy for Aboleth {
    fn has_lair_action(&self) -> bool {
        true
    }

    fn reset_conditions(&mut self, _me: CombatantId, _arena: &mut Arena) {
        self.psychic_lair_action = true;
    }

    fn start_encounter(&mut self, me: CombatantId, _enc: &Encounter, arena: &mut Arena) {
        arena.apply_effect(EffectKind::LegendaryAction { creature: me }, None);
    }

    fn lair_action(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        let valid = living_foes(arena, enc, me);
        let targets = if valid.len() <= 2 {
            valid
        } else {
            enc.choice_n(arena, &valid, 2, false)
        };
        let dc = 8
            + arena.combatant(me).proficiency
            + arena.combatant(me).abilities.get(Ability::Wis);

        // Alternate between the psychic pulse and the knockdown
        if self.psychic_lair_action {
            self.psychic_lair_action = false;
            arena.narrate(me, "used psychic lair action");
            let damage = D6.sum(arena.rng_mut(), 2);
            for target in targets {
                if !arena.saving_throw(target, Ability::Wis, dc, false, false, None) {
                    arena.take_damage(target, damage, DamageType::Psychic, None, false, 0, None);
                }
            }
        } else {
            self.psychic_lair_action = true;
            arena.narrate(me, "used prone lair action");
            for target in targets {
                if !arena.saving_throw(target, Ability::Str, dc, false, false, None) {
                    arena.combatant_mut(target).cond.prone = true;
                }
            }
        }
    }

    fn legendary_action(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        arena.narrate(me, "made an attack with Tail");
        let target = enc.choose_target(arena, me);
        arena.weapon_attack(me, &self.tail, target, AttackOptions::default());
    }

    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        if take_action(arena, me) {
            arena.narrate(me, "made an attack with Tentacle");
            for _ in 0..3 {
                let target = enc.choose_target(arena, me);
                arena.weapon_attack(me, &self.tentacle, target, AttackOptions::default());
            }
        }
    }
}

// =============================================================================
// Mind Flayer
// =============================================================================

/// Builds a mind flayer; not in the name dispatch table of the original
/// roster but exercised directly by tests for stun-grapples.
pub fn spawn_mind_flayer(arena: &mut Arena, name: &str, verbose: bool) -> CombatantId {
    let mut c = monster(name, verbose);
    c.abilities = Abilities::new(0, 1, 1, 4, 3, 3);
    c.base_abilities = c.abilities;
    c.base_armor_class = 14;
    c.proficiency = 3;
    c.traits |= Traits::MAGIC_RESISTANCE;
    c.save_proficiencies[Ability::Int.index()] = true;
    c.save_proficiencies[Ability::Wis.index()] = true;
    c.save_proficiencies[Ability::Cha.index()] = true;
    c.hp_formula = HpFormula::Monster { die: D8, count: 13 };

    let extract_brain = Weapon::new(DiceExpr::pool(10, D10), DamageType::Piercing)
        .with_ability(Ability::Int);
    let tentacles =
        Weapon::new(DiceExpr::pool(2, D10), DamageType::Psychic).with_ability(Ability::Int);
    arena.spawn(
        c,
        Box::new(MindFlayer {
            extract_brain,
            tentacles,
            mind_blast: true,
        }),
    )
}

struct MindFlayer {
    extract_brain: Weapon,
    tentacles: Weapon,
    mind_blast: bool,
}

impl Strategy for MindFlayer {
    fn reset_conditions(&mut self, _me: CombatantId, _arena: &mut Arena) {
        self.mind_blast = true;
    }

    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        recharge(arena, &mut self.mind_blast);

        let active: Vec<CombatantId> = living_foes(arena, enc, me)
            .into_iter()
            .filter(|&e| !arena.combatant(e).is_incapacitated())
            .collect();

        if take_action(arena, me) {
            let dc = 8
                + arena.combatant(me).proficiency
                + arena.combatant(me).abilities.get(Ability::Int);

            if self.mind_blast && !active.is_empty() {
                arena.narrate(me, "used Mind Blast");
                self.mind_blast = false;

                let damage =
                    D8.sum(arena.rng_mut(), 4) + arena.combatant(me).abilities.get(Ability::Int);
                let targets = if active.len() <= 2 {
                    active
                } else {
                    enc.choice_n(arena, &active, 2, false)
                };
                for target in targets {
                    if !arena.saving_throw(
                        target,
                        Ability::Int,
                        dc,
                        false,
                        false,
                        Some(SaveTag::Magic),
                    ) {
                        arena.take_damage(
                            target,
                            damage,
                            DamageType::Psychic,
                            None,
                            false,
                            0,
                            None,
                        );
                        arena.apply_effect(
                            EffectKind::Stunned {
                                source: me,
                                target,
                                save_dc: dc,
                            },
                            Some(10),
                        );
                    }
                }
            } else {
                // Eat incapacitated grappled prey, otherwise grab someone
                let held: Vec<CombatantId> = arena
                    .combatant(me)
                    .cond
                    .grappling
                    .iter()
                    .filter_map(|&gid| {
                        if arena.effects().is_ended(gid) {
                            return None;
                        }
                        match *arena.effects().kind(gid) {
                            EffectKind::Grapple { target, .. } => Some(target),
                            _ => None,
                        }
                    })
                    .filter(|&t| {
                        let c = arena.combatant(t);
                        c.is_incapacitated() && c.hp > 0
                    })
                    .collect();

                if let Some(target) = enc.choice(arena, &held) {
                    arena.narrate(me, "made an attack with Extract Brain");
                    arena.weapon_attack(
                        me,
                        &self.extract_brain,
                        Some(target),
                        AttackOptions {
                            add_ability: false,
                            ..AttackOptions::default()
                        },
                    );
                    if !arena.alive(target) {
                        arena.combatant_mut(target).max_hp = 0;
                    }
                } else {
                    arena.narrate(me, "made an attack with Tentacles");
                    let Some(target) = enc.choose_target(arena, me) else {
                        return;
                    };
                    let outcome = arena.weapon_attack(
                        me,
                        &self.tentacles,
                        Some(target),
                        AttackOptions::default(),
                    );
                    if outcome.is_some_and(AttackOutcome::is_hit) {
                        let stunned =
                            !arena.saving_throw(target, Ability::Int, dc, false, false, None);
                        arena.apply_effect(
                            EffectKind::Grapple {
                                grappler: me,
                                target,
                                restrained: false,
                                stunned,
                                escape_priority: false,
                            },
                            None,
                        );
                    }
                }
            }
        }
    }
}

// =============================================================================
// Test creature
// =============================================================================

/// Literal stat block for the synthetic `Test` adversary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStats {
    /// Total attack modifier, proficiency included.
    pub attack: i32,
    /// Armor class.
    pub armor_class: i32,
    /// Total damage per turn across all attacks.
    pub damage: i32,
    /// Hit point total the block is fitted to.
    pub hit_points: i32,
    /// Attacks per turn.
    pub attacks: u32,
    /// Proficiency bonus.
    pub proficiency: i32,
}

/// Builds a synthetic test creature driven entirely by explicit numbers.
///
/// Damage per attack is fitted to a multiple of 2d6 plus a constant, hit
/// points to a multiple of 2d8 plus a constant, the way the playtest harness
/// fits tiers.
pub fn spawn_test(
    arena: &mut Arena,
    side: Side,
    stats: TestStats,
    name: &str,
    verbose: bool,
) -> CombatantId {
    let mut c = Combatant::new(name, side, verbose);
    c.base_armor_class = stats.armor_class;
    c.proficiency = stats.proficiency;
    c.save_proficiencies[Ability::Dex.index()] = true;
    c.save_proficiencies[Ability::Con.index()] = true;
    c.save_proficiencies[Ability::Wis.index()] = true;
    c.skill_proficiencies[Skill::Perception.index()] = true;
    c.hp_formula = HpFormula::Test {
        hp: stats.hit_points,
    };

    let damage_per_attack = stats.damage / stats.attacks as i32;
    let dice = 2 * ((damage_per_attack + 2) / 7);
    let weapon = Weapon::new(
        DiceExpr::Pool(DicePool::of(dice.max(0) as u32, D6)),
        DamageType::Bludgeoning,
    )
    .with_modifiers(
        stats.attack - stats.proficiency,
        (damage_per_attack + 2) % 7 - 2,
    );

    arena.spawn(
        c,
        Box::new(TestCreature {
            weapon,
            attacks: stats.attacks,
        }),
    )
}

struct TestCreature {
    weapon: Weapon,
    attacks: u32,
}

impl Strategy for TestCreature {
    fn take_turn(&mut self, me: CombatantId, enc: &Encounter, arena: &mut Arena) {
        if take_action(arena, me) {
            for _ in 0..self.attacks {
                let target = enc.choose_target(arena, me);
                arena.weapon_attack(me, &self.weapon, target, AttackOptions::default());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicebag::DiceRng;

    #[test]
    fn spawn_every_monster() {
        let mut arena = Arena::new(DiceRng::from_seed(7));
        for kind in [
            "Kobold",
            "Jackal",
            "Thug",
            "GiantSpider",
            "Ghoul",
            "Banshee",
            "BeardedDevil",
            "Behir",
            "ShamblingMound",
            "StoneGolem",
            "Troll",
            "Hydra",
            "Mage",
            "Aboleth",
        ] {
            let id = spawn_monster(&mut arena, kind, kind, false).unwrap();
            assert!(arena.combatant(id).hp >= 1, "{kind} spawned at {} hp", arena.combatant(id).hp);
        }
        assert!(matches!(
            spawn_monster(&mut arena, "Tarrasque", "t", false),
            Err(RosterError::UnknownCreature(_))
        ));
    }

    #[test]
    fn mage_spawns_invisible() {
        let mut arena = Arena::new(DiceRng::from_seed(7));
        let id = spawn_monster(&mut arena, "Mage", "Mage", false).unwrap();
        assert!(arena.combatant(id).cond.invisible > 0);
        // Greater Invisibility consumed the fourth-level slot
        assert_eq!(arena.combatant(id).spell_slots.remaining(4), 0);
    }

    #[test]
    fn hydra_resets_to_five_heads() {
        let mut arena = Arena::new(DiceRng::from_seed(7));
        let id = spawn_monster(&mut arena, "Hydra", "Hydra", false).unwrap();
        assert_eq!(arena.combatant(id).cond.heads, 5);
    }

    #[test]
    fn test_creature_zero_damage_block() {
        let mut arena = Arena::new(DiceRng::from_seed(7));
        let id = spawn_test(
            &mut arena,
            Side::B,
            TestStats {
                attack: 0,
                armor_class: 20,
                damage: 0,
                hit_points: 1,
                attacks: 1,
                proficiency: 2,
            },
            "Test",
            false,
        );
        assert_eq!(arena.combatant(id).hp, 1);
        assert_eq!(arena.combatant(id).armor_class(), 20);
    }
}
