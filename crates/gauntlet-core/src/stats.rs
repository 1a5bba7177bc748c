//! Core rule vocabulary: abilities, skills, damage types, trait flags.
//!
//! These are the small value types the whole engine speaks in. Damage types
//! and creature traits are bitflag sets so a stat block can flag each one
//! independently and membership tests stay cheap.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

// =============================================================================
// Abilities
// =============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    /// Strength
    Str,
    /// Dexterity
    Dex,
    /// Constitution
    Con,
    /// Intelligence
    Int,
    /// Wisdom
    Wis,
    /// Charisma
    Cha,
}

impl Ability {
    /// All abilities in canonical order.
    pub const ALL: [Ability; 6] = [
        Ability::Str,
        Ability::Dex,
        Ability::Con,
        Ability::Int,
        Ability::Wis,
        Ability::Cha,
    ];

    /// Index into per-ability arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Str => "str",
            Self::Dex => "dex",
            Self::Con => "con",
            Self::Int => "int",
            Self::Wis => "wis",
            Self::Cha => "cha",
        };
        write!(f, "{name}")
    }
}

/// A block of six ability score modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abilities([i32; 6]);

impl Abilities {
    /// Creates a block from the six modifiers in Str..Cha order.
    #[must_use]
    pub const fn new(str_: i32, dex: i32, con: i32, int: i32, wis: i32, cha: i32) -> Self {
        Self([str_, dex, con, int, wis, cha])
    }

    /// Modifier for one ability.
    #[must_use]
    pub const fn get(&self, ability: Ability) -> i32 {
        self.0[ability.index()]
    }

    /// Mutable access to one modifier.
    pub fn get_mut(&mut self, ability: Ability) -> &mut i32 {
        &mut self.0[ability.index()]
    }
}

// =============================================================================
// Skills
// =============================================================================

/// Skills, including the six raw ability checks.
///
/// Raw ability checks (an unskilled Strength check to tear out of a web, say)
/// go through the same roll path as named skills, so they live in the same
/// enum with themselves as the governing ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Skill {
    Acrobatics,
    AnimalHandling,
    Arcana,
    Athletics,
    Deception,
    History,
    Insight,
    Intimidation,
    Investigation,
    Medicine,
    Nature,
    Perception,
    Performance,
    Persuasion,
    Religion,
    SleightOfHand,
    Stealth,
    Survival,
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Skill {
    /// Number of skill slots (for per-skill arrays).
    pub const COUNT: usize = 24;

    /// Index into per-skill arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The ability that governs this skill.
    #[must_use]
    pub const fn ability(self) -> Ability {
        match self {
            Self::Athletics | Self::Strength => Ability::Str,
            Self::Acrobatics | Self::SleightOfHand | Self::Stealth | Self::Dexterity => {
                Ability::Dex
            }
            Self::Constitution => Ability::Con,
            Self::Arcana | Self::History | Self::Investigation | Self::Nature
            | Self::Religion | Self::Intelligence => Ability::Int,
            Self::AnimalHandling | Self::Insight | Self::Medicine | Self::Perception
            | Self::Survival | Self::Wisdom => Ability::Wis,
            Self::Deception | Self::Intimidation | Self::Performance | Self::Persuasion
            | Self::Charisma => Ability::Cha,
        }
    }
}

// =============================================================================
// Damage types
// =============================================================================

/// The sixteen damage types.
///
/// The three `Magic*` variants are the magical flavors of the physical types,
/// kept distinct so mundane-physical resistance does not apply to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum DamageType {
    Acid,
    Bludgeoning,
    Cold,
    Fire,
    Force,
    Lightning,
    MagicBludgeoning,
    MagicPiercing,
    MagicSlashing,
    Necrotic,
    Piercing,
    Poison,
    Psychic,
    Radiant,
    Slashing,
    Thunder,
}

impl DamageType {
    /// The corresponding single-bit set.
    #[must_use]
    pub const fn bit(self) -> DamageTypes {
        DamageTypes::from_bits_truncate(1 << self as u16)
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Acid => "acid",
            Self::Bludgeoning => "bludgeoning",
            Self::Cold => "cold",
            Self::Fire => "fire",
            Self::Force => "force",
            Self::Lightning => "lightning",
            Self::MagicBludgeoning => "magic bludgeoning",
            Self::MagicPiercing => "magic piercing",
            Self::MagicSlashing => "magic slashing",
            Self::Necrotic => "necrotic",
            Self::Piercing => "piercing",
            Self::Poison => "poison",
            Self::Psychic => "psychic",
            Self::Radiant => "radiant",
            Self::Slashing => "slashing",
            Self::Thunder => "thunder",
        };
        write!(f, "{name}")
    }
}

bitflags! {
    /// A set of damage types, used for resistances, vulnerabilities and
    /// immunities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct DamageTypes: u16 {
        /// Acid damage.
        const ACID = 1 << DamageType::Acid as u16;
        /// Bludgeoning damage.
        const BLUDGEONING = 1 << DamageType::Bludgeoning as u16;
        /// Cold damage.
        const COLD = 1 << DamageType::Cold as u16;
        /// Fire damage.
        const FIRE = 1 << DamageType::Fire as u16;
        /// Force damage.
        const FORCE = 1 << DamageType::Force as u16;
        /// Lightning damage.
        const LIGHTNING = 1 << DamageType::Lightning as u16;
        /// Magical bludgeoning damage.
        const MAGIC_BLUDGEONING = 1 << DamageType::MagicBludgeoning as u16;
        /// Magical piercing damage.
        const MAGIC_PIERCING = 1 << DamageType::MagicPiercing as u16;
        /// Magical slashing damage.
        const MAGIC_SLASHING = 1 << DamageType::MagicSlashing as u16;
        /// Necrotic damage.
        const NECROTIC = 1 << DamageType::Necrotic as u16;
        /// Piercing damage.
        const PIERCING = 1 << DamageType::Piercing as u16;
        /// Poison damage.
        const POISON = 1 << DamageType::Poison as u16;
        /// Psychic damage.
        const PSYCHIC = 1 << DamageType::Psychic as u16;
        /// Radiant damage.
        const RADIANT = 1 << DamageType::Radiant as u16;
        /// Slashing damage.
        const SLASHING = 1 << DamageType::Slashing as u16;
        /// Thunder damage.
        const THUNDER = 1 << DamageType::Thunder as u16;
    }
}

impl DamageTypes {
    /// The physical types reduced by Heavy Armor Master.
    pub const PHYSICAL: DamageTypes = DamageTypes::BLUDGEONING
        .union(DamageTypes::PIERCING)
        .union(DamageTypes::SLASHING)
        .union(DamageTypes::MAGIC_BLUDGEONING)
        .union(DamageTypes::MAGIC_PIERCING)
        .union(DamageTypes::MAGIC_SLASHING);

    /// Whether the set contains the given type.
    #[must_use]
    pub fn has(self, damage_type: DamageType) -> bool {
        self.contains(damage_type.bit())
    }
}

// =============================================================================
// Traits
// =============================================================================

bitflags! {
    /// Boolean creature traits checked by the core operations.
    ///
    /// These are the rule exceptions common enough to deserve a first-class
    /// flag rather than a bespoke behavior hook.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct Traits: u32 {
        /// Cannot be surprised and ignores hidden-attacker advantage.
        const ALERT = 1 << 0;
        /// Heals a little whenever casting a healing spell on others.
        const BLESSED_HEALER = 1 << 1;
        /// Sees hidden and invisible creatures.
        const BLINDSIGHT = 1 << 2;
        /// Advantage on saves against being charmed.
        const CHARM_ADV = 1 << 3;
        /// Construct; some spells refuse to target it.
        const CONSTRUCT = 1 << 4;
        /// Healing spells restore extra hit points.
        const DISCIPLE_OF_LIFE = 1 << 5;
        /// Attack rolls against this creature can never have advantage.
        const ELUSIVE = 1 << 6;
        /// Adds the spellcasting modifier to evocation damage.
        const EMPOWERED_EVOCATION = 1 << 7;
        /// Dexterity half-saves: success negates, failure halves.
        const EVASION = 1 << 8;
        /// Immune to ghoul claw paralysis.
        const GHOUL_PARALYSIS_IMMUNITY = 1 << 9;
        /// Advantage on Int/Wis/Cha saves against magic.
        const GNOME_CUNNING = 1 << 10;
        /// Reduces incoming physical damage by 3.
        const HEAVY_ARMOR_MASTER = 1 << 11;
        /// Advantage on saves against magic.
        const MAGIC_RESISTANCE = 1 << 12;
        /// Advantage on saves against poison.
        const POISON_ADV = 1 << 13;
        /// Cantrips deal half damage on a successful save.
        const POTENT_CANTRIP = 1 << 14;
        /// Proficient skill checks never roll below 10 + modifiers.
        const RELIABLE_TALENT = 1 << 15;
        /// Healing dice always roll their maximum.
        const SUPREME_HEALING = 1 << 16;
        /// Halves attack damage from a visible attacker as a reaction.
        const UNCANNY_DODGE = 1 << 17;
        /// Advantage on concentration saving throws.
        const WAR_CASTER = 1 << 18;
        /// Casts Shield as a reaction against near-hits and Magic Missile.
        const SHIELD_REACTION = 1 << 19;
        /// Absorbs lightning damage as healing.
        const ABSORB_LIGHTNING = 1 << 20;
    }
}

// =============================================================================
// Armor and save tags
// =============================================================================

/// Worn armor category; caps the Dexterity contribution to armor class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArmorKind {
    /// Unarmored or light armor: full Dexterity modifier.
    #[default]
    Light,
    /// Medium armor: Dexterity modifier capped at +2.
    Medium,
    /// Heavy armor: no Dexterity modifier.
    Heavy,
}

/// Label attached to a saving throw so trait-based advantage can match it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveTag {
    /// A charm effect.
    Charm,
    /// A magical effect.
    Magic,
    /// A poison effect.
    Poison,
    /// The Turn Undead channel feature.
    TurnUndead,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_type_bits_are_distinct() {
        let mut all = DamageTypes::empty();
        for ty in [
            DamageType::Acid,
            DamageType::Bludgeoning,
            DamageType::Cold,
            DamageType::Fire,
            DamageType::Force,
            DamageType::Lightning,
            DamageType::MagicBludgeoning,
            DamageType::MagicPiercing,
            DamageType::MagicSlashing,
            DamageType::Necrotic,
            DamageType::Piercing,
            DamageType::Poison,
            DamageType::Psychic,
            DamageType::Radiant,
            DamageType::Slashing,
            DamageType::Thunder,
        ] {
            assert!(!all.has(ty));
            all |= ty.bit();
        }
        assert_eq!(all, DamageTypes::all());
    }

    #[test]
    fn physical_set_matches_heavy_armor_master_list() {
        for ty in [
            DamageType::Bludgeoning,
            DamageType::Piercing,
            DamageType::Slashing,
            DamageType::MagicBludgeoning,
            DamageType::MagicPiercing,
            DamageType::MagicSlashing,
        ] {
            assert!(DamageTypes::PHYSICAL.has(ty));
        }
        assert!(!DamageTypes::PHYSICAL.has(DamageType::Fire));
        assert!(!DamageTypes::PHYSICAL.has(DamageType::Radiant));
    }

    #[test]
    fn skill_abilities() {
        assert_eq!(Skill::Athletics.ability(), Ability::Str);
        assert_eq!(Skill::Stealth.ability(), Ability::Dex);
        assert_eq!(Skill::Perception.ability(), Ability::Wis);
        assert_eq!(Skill::Strength.ability(), Ability::Str);
        assert_eq!(Skill::Charisma.ability(), Ability::Cha);
    }

    #[test]
    fn abilities_block_round_trip() {
        let mut abilities = Abilities::new(3, 1, 2, -1, 0, -2);
        assert_eq!(abilities.get(Ability::Str), 3);
        assert_eq!(abilities.get(Ability::Cha), -2);
        *abilities.get_mut(Ability::Dex) += 2;
        assert_eq!(abilities.get(Ability::Dex), 3);
    }

    #[test]
    fn flag_sets_serialize_round_trip() {
        let damage = DamageTypes::FIRE | DamageTypes::POISON;
        let json = serde_json::to_string(&damage).unwrap();
        let back: DamageTypes = serde_json::from_str(&json).unwrap();
        assert_eq!(damage, back);

        let traits = Traits::EVASION | Traits::WAR_CASTER;
        let json = serde_json::to_string(&traits).unwrap();
        let back: Traits = serde_json::from_str(&json).unwrap();
        assert_eq!(traits, back);
    }
}
