//! Single dice and the d20 mechanic.

use serde::{Deserialize, Serialize};

use crate::rng::DiceRng;

/// A die with a fixed number of sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Die {
    sides: u16,
}

/// Four-sided die.
pub const D4: Die = Die::new(4);
/// Six-sided die.
pub const D6: Die = Die::new(6);
/// Eight-sided die.
pub const D8: Die = Die::new(8);
/// Ten-sided die.
pub const D10: Die = Die::new(10);
/// Twelve-sided die.
pub const D12: Die = Die::new(12);
/// Twenty-sided die.
pub const D20: Die = Die::new(20);
/// Percentile die.
pub const D100: Die = Die::new(100);

impl Die {
    /// Creates a die with the given number of sides.
    #[must_use]
    pub const fn new(sides: u16) -> Self {
        Self { sides }
    }

    /// Number of sides.
    #[must_use]
    pub const fn sides(self) -> i32 {
        self.sides as i32
    }

    /// Mean of a single roll rounded up to the nearest integer.
    #[must_use]
    pub const fn mean(self) -> i32 {
        self.sides as i32 / 2 + 1
    }

    /// Rolls the die once.
    pub fn roll(self, rng: &mut DiceRng) -> i32 {
        rng.range(1, self.sides())
    }

    /// Rolls `n` dice and returns their sum.
    pub fn sum(self, rng: &mut DiceRng, n: u32) -> i32 {
        (0..n).map(|_| self.roll(rng)).sum()
    }

    /// Rolls once, rerolling once if the result is at or below `threshold`.
    pub fn reroll_low(self, rng: &mut DiceRng, threshold: i32) -> i32 {
        let result = self.roll(rng);
        if result <= threshold {
            self.roll(rng)
        } else {
            result
        }
    }
}

/// Rolls a d20, handling advantage and disadvantage.
///
/// Advantage draws two dice and keeps the maximum, disadvantage keeps the
/// minimum, and holding both at once cancels down to a single plain roll.
pub fn roll_d20(rng: &mut DiceRng, advantage: bool, disadvantage: bool) -> i32 {
    if advantage && !disadvantage {
        D20.roll(rng).max(D20.roll(rng))
    } else if disadvantage && !advantage {
        D20.roll(rng).min(D20.roll(rng))
    } else {
        D20.roll(rng)
    }
}

/// Rolls 2d6, rerolling 1s and 2s once on each die (Great Weapon Fighting).
pub fn two_d6_reroll_1_2(rng: &mut DiceRng) -> i32 {
    D6.reroll_low(rng, 2) + D6.reroll_low(rng, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roll_in_range() {
        let mut rng = DiceRng::from_seed(0);
        for _ in 0..200 {
            let r = D20.roll(&mut rng);
            assert!((1..=20).contains(&r));
        }
    }

    #[test]
    fn test_sum_in_range() {
        let mut rng = DiceRng::from_seed(0);
        for _ in 0..200 {
            let r = D6.sum(&mut rng, 4);
            assert!((4..=24).contains(&r));
        }
    }

    #[test]
    fn test_mean_rounds_up() {
        assert_eq!(D4.mean(), 3);
        assert_eq!(D6.mean(), 4);
        assert_eq!(D8.mean(), 5);
        assert_eq!(D10.mean(), 6);
        assert_eq!(D12.mean(), 7);
    }

    #[test]
    fn test_advantage_and_disadvantage_cancel() {
        // Both flags at once must consume exactly one roll: a cancelled roll
        // leaves the generator in the same state as a plain roll.
        let mut cancelled = DiceRng::from_seed(99);
        let mut plain = DiceRng::from_seed(99);
        for _ in 0..50 {
            assert_eq!(
                roll_d20(&mut cancelled, true, true),
                D20.roll(&mut plain),
            );
        }
    }

    #[test]
    fn test_advantage_keeps_maximum() {
        let mut adv = DiceRng::from_seed(5);
        let mut raw = DiceRng::from_seed(5);
        for _ in 0..50 {
            let kept = roll_d20(&mut adv, true, false);
            let (a, b) = (D20.roll(&mut raw), D20.roll(&mut raw));
            assert_eq!(kept, a.max(b));
        }
    }

    #[test]
    fn test_disadvantage_keeps_minimum() {
        let mut disadv = DiceRng::from_seed(5);
        let mut raw = DiceRng::from_seed(5);
        for _ in 0..50 {
            let kept = roll_d20(&mut disadv, false, true);
            let (a, b) = (D20.roll(&mut raw), D20.roll(&mut raw));
            assert_eq!(kept, a.min(b));
        }
    }

    #[test]
    fn test_reroll_low_never_below_one() {
        let mut rng = DiceRng::from_seed(3);
        for _ in 0..200 {
            let r = two_d6_reroll_1_2(&mut rng);
            assert!((2..=12).contains(&r));
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_die_rolls_in_range(sides in 1u16..200, seed in any::<u64>()) {
                let mut rng = DiceRng::from_seed(seed);
                let die = Die::new(sides);
                let roll = die.roll(&mut rng);
                prop_assert!(roll >= 1 && roll <= i32::from(sides));
            }

            #[test]
            fn d20_in_range_under_all_flags(
                seed in any::<u64>(),
                adv in any::<bool>(),
                disadv in any::<bool>(),
            ) {
                let mut rng = DiceRng::from_seed(seed);
                let roll = roll_d20(&mut rng, adv, disadv);
                prop_assert!((1..=20).contains(&roll));
            }
        }
    }
}
