//! # Gauntlet Core
//!
//! Turn-based combat resolution engine for Monte-Carlo playtesting.
//!
//! Gauntlet simulates simplified tabletop combat encounters to estimate
//! survival statistics for a party of player characters across repeated
//! adventuring days. The engine is a deterministic (given a fixed seed)
//! discrete-event simulation: initiative ordering, turn sequencing, the
//! action economy, attack rolls and saving throws, damage resolution with
//! resistance/vulnerability/immunity, and a temporary-effect subsystem that
//! models conditions with variable lifetimes and cross-references between
//! combatants.
//!
//! ## Architecture
//!
//! - **Combatants** live in an [`Arena`] and are addressed by
//!   [`CombatantId`] handles; relations between them (grapples, swallows,
//!   durations) are handle links, never object references.
//! - **Effects** are entries in a per-arena registry with an explicit
//!   create/tick/end lifecycle and idempotent removal.
//! - **Strategies** decide what a combatant does with its turn; the engine
//!   owns sequencing and legality.
//! - The **random generator** is threaded explicitly, so independent runs
//!   are reproducible and can execute in parallel.
//!
//! ## Usage
//!
//! ```
//! use dicebag::DiceRng;
//! use gauntlet_core::{spawn_character, spawn_monster, AdventuringDay, Arena};
//!
//! let mut arena = Arena::new(DiceRng::from_seed(42));
//! spawn_character(&mut arena, "Fighter", 1, "Fighter", false).unwrap();
//! spawn_monster(&mut arena, "Kobold", "Kobold1", false).unwrap();
//!
//! let mut day = AdventuringDay::new(&mut arena, 6, 2);
//! day.run(&mut arena);
//! assert!(day.survivors(&arena) <= 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod arena;
pub mod bestiary;
pub mod classes;
pub mod combatant;
pub mod day;
pub mod effect;
pub mod encounter;
pub mod spells;
pub mod stats;
pub mod strategy;
pub mod weapon;

#[cfg(test)]
mod tests;

pub use arena::Arena;
pub use bestiary::{spawn_monster, spawn_test, TestStats};
pub use classes::spawn_character;
pub use combatant::{Combatant, CombatantId, Conditions, HpFormula, PcState, Side, SpellSlots};
pub use day::AdventuringDay;
pub use effect::{EffectId, EffectKind, Effects};
pub use encounter::Encounter;
pub use stats::{
    Abilities, Ability, ArmorKind, DamageType, DamageTypes, SaveTag, Skill, Traits,
};
pub use strategy::{Inert, Strategy};
pub use weapon::{AttackOptions, AttackOutcome, Weapon};

use thiserror::Error;

/// Setup-time roster construction errors.
///
/// These are configuration mistakes detected once while building a party or
/// adversary list; they are fatal to the run. The engine itself has no
/// error surface — "no valid target" and similar conditions are ordinary
/// sentinel results.
#[derive(Debug, Error)]
pub enum RosterError {
    /// The requested creature is not in the bestiary.
    #[error("unknown creature type {0}")]
    UnknownCreature(String),
    /// The requested class is not implemented.
    #[error("unknown character class {0}")]
    UnknownClass(String),
    /// Creature-name and creature-count lists have different lengths.
    #[error("number of creature types {types} does not match number of creature counts {counts}")]
    MismatchedCounts {
        /// How many creature types were listed.
        types: usize,
        /// How many counts were listed.
        counts: usize,
    },
    /// The synthetic test block needs exactly six integers.
    #[error("test stats must be a comma-separated list of six integers")]
    MalformedTestStats,
    /// A `Test` adversary was requested without its stat block.
    #[error("creature type Test requires test stats to be set")]
    MissingTestStats,
}
