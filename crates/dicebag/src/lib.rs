//! # Dicebag
//!
//! Deterministic dice primitives for combat simulation.
//!
//! Every stochastic decision in the simulator flows through a [`DiceRng`], a
//! seedable ChaCha-based generator. Independent simulation runs derive their
//! own generator streams from one master seed, so results are reproducible
//! and runs can execute in parallel without sharing state.
//!
//! ## Quick start
//!
//! ```
//! use dicebag::{DiceRng, Die, roll_d20, D6};
//!
//! let mut rng = DiceRng::from_seed(42);
//!
//! // 3d6
//! let damage = D6.sum(&mut rng, 3);
//! assert!((3..=18).contains(&damage));
//!
//! // d20 with advantage: roll twice, keep the higher
//! let roll = roll_d20(&mut rng, true, false);
//! assert!((1..=20).contains(&roll));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod die;
pub mod expr;
pub mod rng;

pub use die::{roll_d20, two_d6_reroll_1_2, Die, D10, D100, D12, D20, D4, D6, D8};
pub use expr::{DiceExpr, DicePool};
pub use rng::{seed_from_entropy, DiceRng};
