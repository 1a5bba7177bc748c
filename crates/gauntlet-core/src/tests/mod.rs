//! In-crate test suite.
//!
//! - `helpers`: shared builders for arenas and dummy combatants
//! - `engine`: combat-resolution and duration-subsystem semantics
//! - `scenarios`: end-to-end encounter and adventuring-day scenarios
//! - `determinism`: fixed-seed reproducibility
//! - `properties`: property-based invariants

mod determinism;
mod engine;
mod helpers;
mod properties;
