//! Weapons: attack generators bound to a wielder at the call site.
//!
//! A [`Weapon`] is a plain value. It holds damage dice, damage types and
//! fixed modifiers; everything else (ability modifiers, proficiency bonus,
//! Bless and Bane, crit threshold) is read from the wielder when the arena
//! resolves the attack.

use dicebag::DiceExpr;
use serde::{Deserialize, Serialize};

use crate::stats::{Ability, DamageType};

/// Outcome of an attack roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackOutcome {
    /// The attack missed.
    Miss,
    /// The attack hit.
    Hit,
    /// The attack was a critical hit.
    Crit,
}

impl AttackOutcome {
    /// Whether any damage lands.
    #[must_use]
    pub const fn is_hit(self) -> bool {
        matches!(self, Self::Hit | Self::Crit)
    }
}

/// Per-call attack options.
#[derive(Debug, Clone, Copy)]
pub struct AttackOptions {
    /// Grant advantage from the call site.
    pub adv: bool,
    /// Impose disadvantage from the call site.
    pub disadv: bool,
    /// Add the wielder's ability modifier to the damage roll.
    pub add_ability: bool,
    /// Power attack: -5 to hit, +10 damage.
    pub power_attack: bool,
}

impl Default for AttackOptions {
    fn default() -> Self {
        Self {
            adv: false,
            disadv: false,
            add_ability: true,
            power_attack: false,
        }
    }
}

impl AttackOptions {
    /// Options granting advantage.
    #[must_use]
    pub fn advantage() -> Self {
        Self {
            adv: true,
            ..Self::default()
        }
    }
}

/// A weapon or weapon-like attack routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    /// Damage dice for the primary component.
    pub dice: DiceExpr,
    /// Primary damage type.
    pub damage_type: DamageType,
    /// Governing ability for attack and damage.
    pub ability: Ability,
    /// Whether the wielder adds its proficiency bonus.
    pub proficient: bool,
    /// Ranged attack (suppresses melee-triggered ripostes).
    pub ranged: bool,
    /// Optional secondary damage component, rolled independently.
    pub secondary: Option<(DiceExpr, DamageType)>,
    /// Flat attack-roll bonus (magic weapon and the like).
    pub attack_modifier: i32,
    /// Flat damage bonus.
    pub damage_modifier: i32,
}

impl Weapon {
    /// A Strength-based, proficient melee weapon with no extras.
    #[must_use]
    pub fn new(dice: DiceExpr, damage_type: DamageType) -> Self {
        Self {
            dice,
            damage_type,
            ability: Ability::Str,
            proficient: true,
            ranged: false,
            secondary: None,
            attack_modifier: 0,
            damage_modifier: 0,
        }
    }

    /// Sets the governing ability.
    #[must_use]
    pub fn with_ability(mut self, ability: Ability) -> Self {
        self.ability = ability;
        self
    }

    /// Marks the weapon as non-proficient.
    #[must_use]
    pub fn unproficient(mut self) -> Self {
        self.proficient = false;
        self
    }

    /// Marks the weapon as ranged.
    #[must_use]
    pub fn ranged(mut self) -> Self {
        self.ranged = true;
        self
    }

    /// Adds a secondary damage component.
    #[must_use]
    pub fn with_secondary(mut self, dice: DiceExpr, damage_type: DamageType) -> Self {
        self.secondary = Some((dice, damage_type));
        self
    }

    /// Sets flat attack and damage bonuses.
    #[must_use]
    pub fn with_modifiers(mut self, attack: i32, damage: i32) -> Self {
        self.attack_modifier = attack;
        self.damage_modifier = damage;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicebag::{DicePool, D6, D8};

    #[test]
    fn builder_chain() {
        let weapon = Weapon::new(DiceExpr::single(D8), DamageType::Piercing)
            .with_ability(Ability::Dex)
            .ranged()
            .with_secondary(DiceExpr::pool(2, D6), DamageType::Poison)
            .with_modifiers(1, 1);
        assert_eq!(weapon.ability, Ability::Dex);
        assert!(weapon.ranged);
        assert!(weapon.proficient);
        assert_eq!(weapon.attack_modifier, 1);
        assert_eq!(
            weapon.secondary,
            Some((DiceExpr::Pool(DicePool::of(2, D6)), DamageType::Poison))
        );
    }

    #[test]
    fn outcome_predicates() {
        assert!(AttackOutcome::Hit.is_hit());
        assert!(AttackOutcome::Crit.is_hit());
        assert!(!AttackOutcome::Miss.is_hit());
    }
}
