//! The combatant arena and every cross-combatant operation.
//!
//! The `Arena` owns the combatants, their decision strategies, the effect
//! registry and the random generator for one simulation run. Combatants are
//! addressed by [`CombatantId`] handles and relations between them (grapples,
//! swallows, durations) are stored as handle links, never as object
//! references.
//!
//! Everything that can cascade across combatants lives here: damage
//! resolution with its mitigation pipeline, unconsciousness handling,
//! concentration checks, attack rolls with reactive armor class, and the
//! saving-throw wrappers. All cascades resolve synchronously before control
//! returns to the caller.

use dicebag::{roll_d20, DiceRng, D4};
use tracing::debug;

use crate::combatant::{Combatant, CombatantId, Side};
use crate::effect::{EffectKind, Effects};
use crate::stats::{Ability, DamageType, DamageTypes, SaveTag, Skill, Traits};
use crate::strategy::Strategy;
use crate::weapon::{AttackOptions, AttackOutcome, Weapon};

/// Container for all combatants, strategies and effects of one run.
pub struct Arena {
    pub(crate) combatants: Vec<Combatant>,
    pub(crate) strategies: Vec<Option<Box<dyn Strategy>>>,
    pub(crate) effects: Effects,
    pub(crate) rng: DiceRng,
}

impl Arena {
    /// Creates an empty arena around an explicit random generator.
    #[must_use]
    pub fn new(rng: DiceRng) -> Self {
        Self {
            combatants: Vec::new(),
            strategies: Vec::new(),
            effects: Effects::default(),
            rng,
        }
    }

    /// Spawns a combatant with its decision strategy, rolling hit points and
    /// resetting condition state. Returns the new handle.
    pub fn spawn(&mut self, mut combatant: Combatant, strategy: Box<dyn Strategy>) -> CombatantId {
        combatant.reset_hp(&mut self.rng);
        combatant.reset_conditions();
        let id = CombatantId::new(u32::try_from(self.combatants.len()).expect("arena overflow"));
        self.combatants.push(combatant);
        self.strategies.push(Some(strategy));
        id
    }

    /// Number of combatants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    /// Whether the arena has no combatants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }

    /// All combatant handles in spawn order.
    pub fn ids(&self) -> impl Iterator<Item = CombatantId> {
        (0..u32::try_from(self.combatants.len()).expect("arena overflow")).map(CombatantId::new)
    }

    /// Handles of one side, in spawn order.
    #[must_use]
    pub fn side_ids(&self, side: Side) -> Vec<CombatantId> {
        self.ids()
            .filter(|id| self.combatants[id.index()].side == side)
            .collect()
    }

    /// Read access to a combatant.
    #[must_use]
    pub fn combatant(&self, id: CombatantId) -> &Combatant {
        &self.combatants[id.index()]
    }

    /// Mutable access to a combatant.
    pub fn combatant_mut(&mut self, id: CombatantId) -> &mut Combatant {
        &mut self.combatants[id.index()]
    }

    /// Whether a combatant is conscious.
    #[must_use]
    pub fn alive(&self, id: CombatantId) -> bool {
        self.combatants[id.index()].hp > 0
    }

    /// The shared random generator.
    pub fn rng_mut(&mut self) -> &mut DiceRng {
        &mut self.rng
    }

    /// Read access to the effect registry.
    #[must_use]
    pub fn effects(&self) -> &Effects {
        &self.effects
    }

    /// Clears the effect registry; used when every combatant's condition
    /// state resets between encounters.
    pub fn clear_effects(&mut self) {
        self.effects.clear();
    }

    /// Resets a combatant's dynamic condition state.
    pub fn reset_conditions(&mut self, id: CombatantId) {
        self.combatants[id.index()].reset_conditions();
    }

    /// Rerolls a combatant's hit points back to full.
    pub fn reset_hp(&mut self, id: CombatantId) {
        let (combatants, rng) = (&mut self.combatants, &mut self.rng);
        combatants[id.index()].reset_hp(rng);
    }

    /// Runs a closure against a combatant's strategy, temporarily detaching
    /// it so the strategy can mutate the arena freely.
    pub fn with_strategy<R>(
        &mut self,
        id: CombatantId,
        f: impl FnOnce(&mut dyn Strategy, &mut Arena) -> R,
    ) -> R {
        let mut strategy = self.strategies[id.index()]
            .take()
            .expect("strategy re-entered for the same combatant");
        let result = f(strategy.as_mut(), self);
        self.strategies[id.index()] = Some(strategy);
        result
    }

    /// Whether a combatant's strategy supplies a lair action.
    #[must_use]
    pub fn has_lair_action(&self, id: CombatantId) -> bool {
        self.strategies[id.index()]
            .as_ref()
            .is_some_and(|s| s.has_lair_action())
    }

    /// The combatant that swallowed `id`, if any.
    #[must_use]
    pub fn swallower_of(&self, id: CombatantId) -> Option<CombatantId> {
        let eid = self.combatants[id.index()].cond.swallowed?;
        match *self.effects.kind(eid) {
            EffectKind::Swallowed { swallower, .. } => Some(swallower),
            _ => None,
        }
    }

    // =========================================================================
    // Rolls
    // =========================================================================

    /// Rolls initiative for a combatant.
    pub fn roll_initiative(&mut self, id: CombatantId, adv: bool) -> i32 {
        let (combatants, rng) = (&mut self.combatants, &mut self.rng);
        combatants[id.index()].roll_initiative(rng, adv)
    }

    /// Rolls a saving throw value for a combatant.
    pub fn roll_save(&mut self, id: CombatantId, ability: Ability, adv: bool, disadv: bool) -> i32 {
        let (combatants, rng) = (&mut self.combatants, &mut self.rng);
        combatants[id.index()].roll_save(rng, ability, adv, disadv)
    }

    /// Resolves a saving throw for a combatant.
    pub fn saving_throw(
        &mut self,
        id: CombatantId,
        ability: Ability,
        dc: i32,
        adv: bool,
        disadv: bool,
        tag: Option<SaveTag>,
    ) -> bool {
        let (combatants, rng) = (&mut self.combatants, &mut self.rng);
        combatants[id.index()].saving_throw(rng, ability, dc, adv, disadv, tag)
    }

    /// Rolls a skill check value for a combatant.
    pub fn roll_skill(&mut self, id: CombatantId, skill: Skill, adv: bool, disadv: bool) -> i32 {
        let (combatants, rng) = (&mut self.combatants, &mut self.rng);
        combatants[id.index()].roll_skill(rng, skill, adv, disadv)
    }

    /// Resolves a skill check for a combatant.
    pub fn skill_check(
        &mut self,
        id: CombatantId,
        skill: Skill,
        dc: i32,
        adv: bool,
        disadv: bool,
    ) -> bool {
        let (combatants, rng) = (&mut self.combatants, &mut self.rng);
        combatants[id.index()].skill_check(rng, skill, dc, adv, disadv)
    }

    /// Rolls the better of Athletics and Acrobatics to escape a grapple.
    pub fn escape_grapple(&mut self, id: CombatantId, adv: bool) -> i32 {
        let (combatants, rng) = (&mut self.combatants, &mut self.rng);
        combatants[id.index()].escape_grapple(rng, adv)
    }

    // =========================================================================
    // Damage and healing
    // =========================================================================

    /// Recovers hit points; magical healing also stops any bleeding.
    pub fn heal(&mut self, target: CombatantId, healing: i32, magic: bool) {
        self.combatants[target.index()].heal_raw(healing);
        if magic {
            let snapshot = self.combatants[target.index()].cond.start_turn.clone();
            for eid in snapshot {
                if !self.effects.is_ended(eid)
                    && matches!(self.effects.kind(eid), EffectKind::Bleeding { .. })
                {
                    self.end_effect(eid);
                }
            }
        }
    }

    /// Resolves incoming damage.
    ///
    /// Each component runs the mitigation pipeline (Heavy Armor Master −3 on
    /// physical types, then resistance halving, then vulnerability doubling,
    /// then immunity), hit points clamp to `[0, max]`, and the cascades fire
    /// in order: unconsciousness, the concentration check (DC
    /// `max(10, taken/2)`, advantage with War Caster), and the end of any
    /// turned condition. Returns the post-mitigation amounts actually
    /// subtracted.
    #[allow(clippy::too_many_arguments)]
    pub fn take_damage(
        &mut self,
        target: CombatantId,
        mut primary: i32,
        primary_type: DamageType,
        dealer: Option<CombatantId>,
        ranged: bool,
        mut secondary: i32,
        secondary_type: Option<DamageType>,
    ) -> (i32, i32) {
        let _ = ranged;

        // Uncanny Dodge halves damage from a visible attacker.
        if let Some(dealer_id) = dealer {
            let t = &self.combatants[target.index()];
            let d = &self.combatants[dealer_id.index()];
            if t.has_trait(Traits::UNCANNY_DODGE)
                && t.cond.reaction
                && t.hp > 0
                && !t.is_incapacitated()
                && !d.is_hidden(t)
            {
                self.combatants[target.index()].cond.reaction = false;
                primary /= 2;
                secondary /= 2;
                self.narrate(target, "used Uncanny Dodge");
            }
        }

        // Lightning absorption converts the lightning component to healing.
        if self.combatants[target.index()].has_trait(Traits::ABSORB_LIGHTNING) {
            if primary_type == DamageType::Lightning {
                self.heal(target, primary, false);
                return match secondary_type {
                    Some(st) => {
                        let (taken, _) =
                            self.take_damage(target, secondary, st, dealer, false, 0, None);
                        (taken, 0)
                    }
                    None => (0, 0),
                };
            } else if secondary_type == Some(DamageType::Lightning) {
                self.heal(target, secondary, false);
                return self.take_damage(target, primary, primary_type, dealer, false, 0, None);
            }
        }

        let primary_taken = self.apply_damage_component(target, primary, primary_type);
        let secondary_taken = match secondary_type {
            Some(st) => self.apply_damage_component(target, secondary, st),
            None => 0,
        };
        let taken = primary_taken + secondary_taken;

        {
            let c = &mut self.combatants[target.index()];
            c.cond.damage_taken_this_turn += taken;
            if let Some(dealer_id) = dealer {
                if c.cond.swallowed_creatures.contains(&dealer_id) {
                    c.cond.damage_from_swallowed += taken;
                }
            }
            let fire_or_acid = matches!(primary_type, DamageType::Fire | DamageType::Acid)
                || matches!(
                    secondary_type,
                    Some(DamageType::Fire) | Some(DamageType::Acid)
                );
            if taken > 0 && fire_or_acid {
                c.cond.regeneration_active = false;
            }
            let fire =
                primary_type == DamageType::Fire || secondary_type == Some(DamageType::Fire);
            if taken > 0 && fire {
                c.cond.regrow_heads = false;
            }
        }

        if self.combatants[target.index()].hp == 0 {
            self.fall_unconscious(target);
        }

        // Concentration check on any positive damage taken.
        if taken > 0 {
            if let Some(conc) = self.combatants[target.index()].cond.concentration {
                let war_caster = self.combatants[target.index()].has_trait(Traits::WAR_CASTER);
                let dc = (taken / 2).max(10);
                if !self.saving_throw(target, Ability::Con, dc, war_caster, false, None) {
                    self.end_effect(conc);
                }
            }
        }

        // Taking damage ends the turned condition.
        if let Some(turned) = self.combatants[target.index()].cond.turned {
            self.end_effect(turned);
        }

        (primary_taken, secondary_taken)
    }

    /// Applies one damage component through the mitigation pipeline.
    fn apply_damage_component(
        &mut self,
        target: CombatantId,
        mut damage: i32,
        damage_type: DamageType,
    ) -> i32 {
        let c = &mut self.combatants[target.index()];
        if c.has_trait(Traits::HEAVY_ARMOR_MASTER) && DamageTypes::PHYSICAL.has(damage_type) {
            damage -= 3;
        }
        // Resistance, then vulnerability, then immunity, in that fixed order.
        if c.resistances.has(damage_type) {
            damage /= 2;
        }
        if c.vulnerabilities.has(damage_type) {
            damage *= 2;
        }
        if damage <= 0 || c.immunities.has(damage_type) {
            return 0;
        }
        c.hp -= damage;
        if c.hp < 0 {
            c.hp = 0;
        }
        if c.verbose {
            debug!("{} took {} {} damage", c.tag(), damage, damage_type);
        }
        damage
    }

    /// Handles a drop to zero hit points.
    ///
    /// A standing Death Ward is consumed instead (leaving one hit point);
    /// otherwise the combatant falls prone, releases everything it was
    /// maintaining (grapples, swallowed and engulfed creatures) and loses
    /// concentration.
    pub fn fall_unconscious(&mut self, id: CombatantId) {
        {
            let c = &mut self.combatants[id.index()];
            if c.cond.death_ward && c.max_hp > 0 {
                c.cond.death_ward = false;
                c.hp = 1;
                if c.verbose {
                    debug!("{} used Death Ward", c.tag());
                }
                return;
            }
            c.cond.prone = true;
        }

        let grapples = self.combatants[id.index()].cond.grappling.clone();
        for gid in grapples {
            self.end_effect(gid);
        }
        let swallowed = self.combatants[id.index()].cond.swallowed_creatures.clone();
        for creature in swallowed {
            if let Some(eid) = self.combatants[creature.index()].cond.swallowed {
                self.end_effect(eid);
            }
        }
        let engulfed = self.combatants[id.index()].cond.engulfed_creatures.clone();
        for creature in engulfed {
            if let Some(eid) = self.combatants[creature.index()].cond.engulfed {
                self.end_effect(eid);
            }
        }
        if let Some(conc) = self.combatants[id.index()].cond.concentration {
            self.end_effect(conc);
        }
    }

    /// Resolves a save-for-half-damage effect.
    ///
    /// Failure takes full damage; success takes half — unless the target has
    /// Evasion and the save is Dexterity-based, in which case success negates
    /// everything and failure still only takes half.
    #[allow(clippy::too_many_arguments)]
    pub fn half_saving_throw(
        &mut self,
        target: CombatantId,
        ability: Ability,
        dc: i32,
        damage: i32,
        damage_type: DamageType,
        secondary_damage: i32,
        secondary_type: Option<DamageType>,
        adv: bool,
        disadv: bool,
        tag: Option<SaveTag>,
    ) -> bool {
        let result = self.saving_throw(target, ability, dc, adv, disadv, tag);
        let dex_evasion =
            ability == Ability::Dex && self.combatants[target.index()].has_trait(Traits::EVASION);

        if !result && !dex_evasion {
            self.take_damage(
                target,
                damage,
                damage_type,
                None,
                false,
                secondary_damage,
                secondary_type,
            );
        } else if !(result && dex_evasion) {
            self.take_damage(
                target,
                damage / 2,
                damage_type,
                None,
                false,
                secondary_damage / 2,
                secondary_type,
            );
        }

        result
    }

    // =========================================================================
    // Attack resolution
    // =========================================================================

    /// Whether an attack by `attacker` against `target` has advantage.
    ///
    /// With `read_only` set this only probes; otherwise a pending Guiding
    /// Bolt is consumed by the query. Callers deciding *whether* to attack
    /// must pass `read_only`.
    pub fn has_attack_advantage(
        &mut self,
        attacker: CombatantId,
        target: CombatantId,
        read_only: bool,
    ) -> bool {
        if let Some(gb) = self.combatants[target.index()].cond.guiding_bolt {
            if !read_only {
                self.end_effect(gb);
            }
            return true;
        }

        let a = &self.combatants[attacker.index()];
        let t = &self.combatants[target.index()];
        t.is_incapacitated()
            || (!t.has_trait(Traits::ELUSIVE)
                && (a.cond.attack_adv > 0
                    || t.cond.target_adv > 0
                    || t.cond.prone
                    || t.cond.blinded > 0
                    || t.cond.restrained > 0
                    || (a.is_hidden(t) && !t.has_trait(Traits::ALERT))))
    }

    /// Whether an attack by `attacker` against `target` has disadvantage.
    ///
    /// Same consuming/read-only duality as [`Arena::has_attack_advantage`],
    /// here for a pending Vicious Mockery on the attacker.
    pub fn has_attack_disadvantage(
        &mut self,
        attacker: CombatantId,
        target: CombatantId,
        read_only: bool,
    ) -> bool {
        if let Some(vm) = self.combatants[attacker.index()].cond.vicious_mockery {
            if !read_only {
                self.end_effect(vm);
            }
            return true;
        }

        let a = &self.combatants[attacker.index()];
        let t = &self.combatants[target.index()];
        a.cond.attack_disadv > 0
            || t.cond.target_disadv > 0
            || a.cond.poisoned > 0
            || a.cond.prone
            || a.cond.blinded > 0
            || a.cond.frightened > 0
            || a.cond.restrained > 0
            || t.is_hidden(a)
    }

    /// Makes an attack roll: d20 (with combined advantage sources) plus
    /// ability, proficiency and fixed modifiers, adjusted by Bless and Bane.
    /// A natural 1 always misses; a natural roll at or above the wielder's
    /// crit threshold always crits.
    pub fn roll_attack(
        &mut self,
        attacker: CombatantId,
        weapon: &Weapon,
        target: CombatantId,
        opts: AttackOptions,
    ) -> AttackOutcome {
        // Call-site advantage short-circuits the intrinsic query, so one-shot
        // advantage sources are not consumed redundantly.
        let advantage = opts.adv || self.has_attack_advantage(attacker, target, false);
        let disadvantage = opts.disadv || self.has_attack_disadvantage(attacker, target, false);

        let raw = roll_d20(&mut self.rng, advantage, disadvantage);

        let (mut bonus, baned, blessed, crit_threshold) = {
            let a = &self.combatants[attacker.index()];
            let mut bonus =
                a.abilities.get(weapon.ability) + a.attack_modifier + weapon.attack_modifier;
            if weapon.proficient {
                bonus += a.proficiency;
            }
            (bonus, a.cond.baned > 0, a.cond.blessed > 0, a.crit_threshold)
        };
        if baned {
            bonus -= D4.roll(&mut self.rng);
        }
        if blessed {
            bonus += D4.roll(&mut self.rng);
        }
        if opts.power_attack {
            bonus -= 5;
        }

        if self.combatants[attacker.index()].verbose {
            debug!(
                "{} rolled {} on an attack against {} with AC {}",
                self.combatants[attacker.index()].tag(),
                raw + bonus,
                self.combatants[target.index()].tag(),
                self.combatants[target.index()].armor_class()
            );
        }

        if raw >= crit_threshold {
            AttackOutcome::Crit
        } else if raw > 1 && self.hit_armor_class(target, raw + bonus) {
            AttackOutcome::Hit
        } else {
            AttackOutcome::Miss
        }
    }

    /// Whether an attack roll meets the target's armor class, giving the
    /// target's Shield reaction a chance to change the answer mid-resolution.
    fn hit_armor_class(&mut self, target: CombatantId, attack_roll: i32) -> bool {
        let mut diff = attack_roll - self.combatants[target.index()].armor_class();
        if (0..5).contains(&diff) && self.shield_reaction(target) {
            diff = attack_roll - self.combatants[target.index()].armor_class();
        }
        diff >= 0
    }

    /// Casts Shield as a reaction if the combatant can: has the trait, a
    /// reaction, consciousness and a spell slot. Returns whether it fired.
    pub(crate) fn shield_reaction(&mut self, id: CombatantId) -> bool {
        let c = &self.combatants[id.index()];
        if !(c.has_trait(Traits::SHIELD_REACTION)
            && c.cond.reaction
            && c.hp > 0
            && !c.is_incapacitated())
        {
            return false;
        }
        let Some(slot) = c.spell_slots.lowest_available(1) else {
            return false;
        };
        self.combatants[id.index()].cond.reaction = false;
        crate::spells::shield(self, id, slot);
        true
    }

    /// Rolls weapon damage: base dice plus modifiers, with the *number of
    /// dice* multiplied on a critical hit, plus the power-attack bonus.
    pub fn roll_weapon_damage(
        &mut self,
        attacker: CombatantId,
        weapon: &Weapon,
        add_ability: bool,
        dice_multiplier: u32,
        power_attack: bool,
    ) -> i32 {
        let mut damage = weapon.dice.roll(&mut self.rng);
        {
            let a = &self.combatants[attacker.index()];
            damage += a.damage_modifier + weapon.damage_modifier;
            if add_ability {
                damage += a.abilities.get(weapon.ability);
            }
        }
        if power_attack {
            damage += 10;
        }
        for _ in 1..dice_multiplier {
            damage += weapon.dice.roll(&mut self.rng);
        }
        damage
    }

    /// The full attack routine: attack roll, crit promotion against paralyzed
    /// targets, damage roll (and independent secondary roll) and damage
    /// application. Returns `None` for a missing target.
    pub fn weapon_attack(
        &mut self,
        attacker: CombatantId,
        weapon: &Weapon,
        target: Option<CombatantId>,
        opts: AttackOptions,
    ) -> Option<AttackOutcome> {
        let target = target?;
        let mut outcome = self.roll_attack(attacker, weapon, target, opts);

        if outcome.is_hit() {
            // A hit against a paralyzed target is always a crit.
            if self.combatants[target.index()].cond.paralyzed > 0 {
                outcome = AttackOutcome::Crit;
            }
            let dice_multiplier = if outcome == AttackOutcome::Crit {
                self.combatants[attacker.index()].crit_dice_multiplier
            } else {
                1
            };

            let mut damage = self.roll_weapon_damage(
                attacker,
                weapon,
                opts.add_ability,
                dice_multiplier,
                opts.power_attack,
            );
            if outcome == AttackOutcome::Crit {
                // Even a degenerate zero-dice weapon lands a crit.
                damage = damage.max(1);
            }

            let (secondary, secondary_type) = match &weapon.secondary {
                Some((dice, ty)) => {
                    let mut rolled = dice.roll(&mut self.rng);
                    for _ in 1..dice_multiplier {
                        rolled += dice.roll(&mut self.rng);
                    }
                    (rolled, Some(*ty))
                }
                None => (0, None),
            };

            if self.combatants[attacker.index()].verbose {
                let verb = if outcome == AttackOutcome::Crit { "crit" } else { "hit" };
                match secondary_type {
                    Some(st) => debug!(
                        "{} scored a {} on {} for {} {} and {} {} damage",
                        self.combatants[attacker.index()].tag(),
                        verb,
                        self.combatants[target.index()].tag(),
                        damage,
                        weapon.damage_type,
                        secondary,
                        st
                    ),
                    None => debug!(
                        "{} scored a {} on {} for {} {} damage",
                        self.combatants[attacker.index()].tag(),
                        verb,
                        self.combatants[target.index()].tag(),
                        damage,
                        weapon.damage_type
                    ),
                }
            }

            self.take_damage(
                target,
                damage,
                weapon.damage_type,
                Some(attacker),
                weapon.ranged,
                secondary,
                secondary_type,
            );
        }

        Some(outcome)
    }

    pub(crate) fn narrate(&self, who: CombatantId, what: &str) {
        let c = &self.combatants[who.index()];
        if c.verbose {
            debug!("{} {}", c.tag(), what);
        }
    }
}
