//! Composite dice expressions for damage rolls.

use serde::{Deserialize, Serialize};

use crate::die::{two_d6_reroll_1_2, Die};
use crate::rng::DiceRng;

/// A fixed count of one kind of die, e.g. `3d10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DicePool {
    /// The die being rolled.
    pub die: Die,
    /// How many of them.
    pub count: u32,
}

impl DicePool {
    /// Creates a pool of `count` dice.
    #[must_use]
    pub const fn of(count: u32, die: Die) -> Self {
        Self { die, count }
    }

    /// Rolls the pool and returns the sum.
    pub fn roll(self, rng: &mut DiceRng) -> i32 {
        self.die.sum(rng, self.count)
    }
}

/// A damage-dice expression attached to a weapon or effect.
///
/// `None` models contested attack rolls that deal no dice damage (a web
/// attack, for instance). `WithExtra` composes a base pool with bonus dice of
/// another kind, the shape of sneak attack and similar riders. `GreatWeapon`
/// is 2d6 with 1s and 2s rerolled once per die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiceExpr {
    /// No dice at all; always rolls zero.
    None,
    /// A single homogeneous pool.
    Pool(DicePool),
    /// A base pool plus extra dice of a second kind.
    WithExtra {
        /// Base damage dice.
        base: DicePool,
        /// Rider dice added on top.
        extra: DicePool,
    },
    /// 2d6 rerolling 1s and 2s once (Great Weapon Fighting).
    GreatWeapon,
}

impl DiceExpr {
    /// Shorthand for a pool of `count` dice.
    #[must_use]
    pub const fn pool(count: u32, die: Die) -> Self {
        Self::Pool(DicePool::of(count, die))
    }

    /// Shorthand for a single die.
    #[must_use]
    pub const fn single(die: Die) -> Self {
        Self::Pool(DicePool::of(1, die))
    }

    /// Rolls the expression once.
    pub fn roll(self, rng: &mut DiceRng) -> i32 {
        match self {
            Self::None => 0,
            Self::Pool(pool) => pool.roll(rng),
            Self::WithExtra { base, extra } => base.roll(rng) + extra.roll(rng),
            Self::GreatWeapon => two_d6_reroll_1_2(rng),
        }
    }
}
