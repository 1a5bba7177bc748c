//! Temporary-effect (duration) subsystem.
//!
//! An effect is a small state machine with states `active` and `ended`;
//! `ended` is terminal. Creating an effect registers every piece of state it
//! adds (stacking counters, trigger-list memberships, exclusive slots,
//! relation links) and ending it reverses each piece exactly once — ending an
//! already-ended effect is a no-op.
//!
//! Effects are entries in a per-arena registry addressed by [`EffectId`];
//! combatants reference them by handle from their trigger lists. An effect
//! may sit on a *different* combatant's trigger list than its target: many
//! conditions give the victim a save at the end of the victim's turn while
//! the duration clock ticks down at the start of the applier's turn. The
//! clock owner is fixed at creation and is the only place the counter is
//! decremented.
//!
//! Trigger dispatch walks a snapshot of the owner's list in append order, so
//! effects that end (or add) other effects mid-flight cannot skip entries.

use std::fmt;

use dicebag::{DiceExpr, D4, D8};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::arena::Arena;
use crate::combatant::CombatantId;
use crate::encounter::Encounter;
use crate::stats::{Ability, DamageType, SaveTag, Skill};
use crate::weapon::Weapon;

// =============================================================================
// Registry
// =============================================================================

/// Stable handle for an effect within an arena's registry.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EffectId(u32);

impl EffectId {
    /// Raw index into the registry.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EffectId({})", self.0)
    }
}

/// One registered effect.
#[derive(Debug, Clone)]
pub struct EffectEntry {
    /// What the effect does and to whom.
    pub kind: EffectKind,
    /// Rounds left on the duration clock, if the effect has one.
    pub remaining: Option<i32>,
    /// Terminal flag; an ended effect never fires or re-ends.
    pub ended: bool,
}

/// The per-arena effect registry.
///
/// Entries are never removed, only marked ended; the registry is cleared
/// wholesale between encounters when every combatant's condition state is
/// reset.
#[derive(Debug, Clone, Default)]
pub struct Effects {
    entries: Vec<EffectEntry>,
}

impl Effects {
    /// Number of entries ever registered this encounter.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read access to one entry.
    #[must_use]
    pub fn get(&self, id: EffectId) -> &EffectEntry {
        &self.entries[id.index()]
    }

    /// Mutable access to one entry.
    pub fn get_mut(&mut self, id: EffectId) -> &mut EffectEntry {
        &mut self.entries[id.index()]
    }

    /// The kind of one entry.
    #[must_use]
    pub fn kind(&self, id: EffectId) -> &EffectKind {
        &self.entries[id.index()].kind
    }

    /// Whether an entry has reached its terminal state.
    #[must_use]
    pub fn is_ended(&self, id: EffectId) -> bool {
        self.entries[id.index()].ended
    }

    pub(crate) fn push(&mut self, kind: EffectKind, remaining: Option<i32>) -> EffectId {
        let id = EffectId(u32::try_from(self.entries.len()).expect("effect registry overflow"));
        self.entries.push(EffectEntry {
            kind,
            remaining,
            ended: false,
        });
        id
    }

    /// Drops every entry; used when condition state resets between encounters.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Removes one handle from a trigger list.
///
/// Membership is an invariant: an active effect is in exactly the lists its
/// registration added it to, so a missing handle means broken bookkeeping.
fn detach(list: &mut Vec<EffectId>, id: EffectId) {
    match list.iter().position(|&e| e == id) {
        Some(pos) => {
            list.remove(pos);
        }
        None => debug_assert!(false, "effect {id:?} missing from trigger list"),
    }
}

fn detach_combatant(list: &mut Vec<CombatantId>, id: CombatantId) {
    match list.iter().position(|&e| e == id) {
        Some(pos) => {
            list.remove(pos);
        }
        None => debug_assert!(false, "combatant {id:?} missing from relation list"),
    }
}

// =============================================================================
// Effect kinds
// =============================================================================

/// Every temporary effect the engine knows how to run.
///
/// One closed enum instead of an open class hierarchy: each variant carries
/// its owner/target handles and parameters, and the arena matches on the kind
/// at registration, trigger and end time.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectKind {
    /// Stacking wounds that bleed at the start of the target's turn; ended by
    /// magical healing. Re-application adds a wound and refreshes the clock.
    Bleeding {
        /// Bleeding combatant.
        target: CombatantId,
        /// Damage rolled per wound per tick.
        dice: DiceExpr,
        /// Damage type of the bleeding.
        damage_type: DamageType,
        /// Current wound count.
        wounds: u32,
    },
    /// A bidirectional grapple link.
    Grapple {
        /// The creature maintaining the grapple.
        grappler: CombatantId,
        /// The creature held.
        target: CombatantId,
        /// Also restrains the target.
        restrained: bool,
        /// Also stuns the target.
        stunned: bool,
        /// The target must spend its action trying to break free.
        escape_priority: bool,
    },
    /// Engulfed: restrained (and optionally blinded) inside another creature;
    /// escape is a grapple check against a fixed DC at the turn start.
    Engulfed {
        /// The engulfing creature.
        engulfer: CombatantId,
        /// The engulfed creature.
        target: CombatantId,
        /// DC of the escape check.
        escape_dc: i32,
        /// Whether the target is also blinded.
        blinds: bool,
    },
    /// Swallowed: blinded and restrained inside a container that regurgitates
    /// everything it swallowed once it takes enough damage from within.
    Swallowed {
        /// The swallowing creature.
        swallower: CombatantId,
        /// The swallowed creature.
        target: CombatantId,
        /// Damage from swallowed creatures in one turn that forces the save.
        threshold: i32,
        /// Constitution save DC to keep everything down.
        save_dc: i32,
    },
    /// Frightened with a disadvantaged Wisdom save at the end of the target's
    /// turn; the clock ticks on the frightener's turn.
    Frightened {
        /// The frightening creature (clock owner).
        source: CombatantId,
        /// The frightened creature.
        target: CombatantId,
        /// Wisdom save DC.
        save_dc: i32,
    },
    /// Frightened until the end of the target's next turn.
    FrightenedOneTurn {
        /// The frightened creature.
        target: CombatantId,
    },
    /// Paralyzed with a Constitution save at the end of the target's turn.
    Paralyzed {
        /// The paralyzing creature (clock owner).
        source: CombatantId,
        /// The paralyzed creature.
        target: CombatantId,
        /// Constitution save DC.
        save_dc: i32,
    },
    /// Poisoned with a Constitution save at the end of the target's turn.
    Poisoned {
        /// The poisoning creature (clock owner).
        source: CombatantId,
        /// The poisoned creature.
        target: CombatantId,
        /// Constitution save DC.
        save_dc: i32,
    },
    /// Stunned with an Intelligence save at the end of the target's turn.
    Stunned {
        /// The stunning creature (clock owner).
        source: CombatantId,
        /// The stunned creature.
        target: CombatantId,
        /// Intelligence save DC.
        save_dc: i32,
    },
    /// Slowed with a Wisdom save at the end of the target's turn.
    Slowed {
        /// The slowing creature (clock owner).
        source: CombatantId,
        /// The slowed creature.
        target: CombatantId,
        /// Wisdom save DC.
        save_dc: i32,
    },
    /// Restrained by webbing; escape is an unskilled Strength check that
    /// consumes the action.
    WebRestrained {
        /// The restrained creature.
        target: CombatantId,
        /// Strength check DC.
        check_dc: i32,
    },
    /// Reckless: attacks against the creature have advantage for a round.
    Reckless {
        /// The reckless creature.
        target: CombatantId,
    },
    /// Turned undead: loses its action and reaction while the clock runs on
    /// the turner's turn; broken by taking damage.
    TurnedUndead {
        /// The turning creature (clock owner).
        turner: CombatantId,
        /// The turned creature.
        target: CombatantId,
    },
    /// Legendary actions: fires at the end of every *other* combatant's turn.
    /// Never ends.
    LegendaryAction {
        /// The legendary creature.
        creature: CombatantId,
    },
    /// Head-loss bookkeeping: at the end of every combatant's turn, checks
    /// whether the watched creature took enough damage to sever a head, then
    /// resets the per-turn damage counter. Never ends.
    HeadLoss {
        /// The many-headed creature.
        creature: CombatantId,
        /// Damage in one turn that severs a head.
        threshold: i32,
    },
    /// The combatant's weapon is stuck; it must spend its action on a
    /// Strength check to retrieve it. Dispatched through the priority-action
    /// queue in place of a normal turn.
    StuckWeapon {
        /// The disarmed combatant.
        target: CombatantId,
        /// Strength check DC.
        check_dc: i32,
    },
    /// Guiding Bolt: the next attack against the target has advantage.
    GuidingBolt {
        /// The caster (clock owner).
        caster: CombatantId,
        /// The marked target.
        target: CombatantId,
    },
    /// Vicious Mockery: the target's next attack has disadvantage.
    ViciousMockery {
        /// The mocked creature.
        target: CombatantId,
    },
    /// Shield spell: +5 armor class until the caster's next turn starts.
    Shield {
        /// The caster.
        caster: CombatantId,
    },
    /// Bless: targets add 1d4 to attacks and saves. Concentration.
    Bless {
        /// The caster.
        caster: CombatantId,
        /// Blessed creatures.
        targets: Vec<CombatantId>,
    },
    /// Bane: targets subtract 1d4 from attacks and saves. Concentration.
    Bane {
        /// The caster.
        caster: CombatantId,
        /// Baned creatures.
        targets: Vec<CombatantId>,
    },
    /// Spirit Guardians: damage at the start of affected creatures' turns;
    /// only the most potent instance on a creature fires. Concentration.
    SpiritGuardians {
        /// The caster.
        caster: CombatantId,
        /// Affected creatures.
        targets: Vec<CombatantId>,
        /// Number of d8s rolled (potency ordinal).
        dice: u32,
        /// Wisdom save DC.
        save_dc: i32,
        /// Damage type dealt.
        damage_type: DamageType,
    },
    /// Greater Invisibility on one target. Concentration.
    GreaterInvisibility {
        /// The caster.
        caster: CombatantId,
        /// The invisible creature.
        target: CombatantId,
    },
    /// Shield of Faith: +2 base armor class. Concentration.
    ShieldOfFaith {
        /// The warded caster.
        caster: CombatantId,
    },
    /// Spiritual Weapon: a bonus-action spell attack each turn.
    SpiritualWeapon {
        /// The caster.
        caster: CombatantId,
        /// The conjured weapon.
        weapon: Weapon,
    },
    /// Melf's Acid Arrow: acid damage at the end of the target's next turn.
    MelfsAcidArrow {
        /// The caster.
        caster: CombatantId,
        /// The struck target.
        target: CombatantId,
        /// Number of d4s on the delayed damage.
        dice: u32,
    },
}

impl EffectKind {
    /// Priority of this effect in the forced-action queue, if it belongs
    /// there. Higher values dispatch first.
    #[must_use]
    pub fn priority(&self) -> Option<i32> {
        match self {
            Self::StuckWeapon { .. } => Some(1),
            _ => None,
        }
    }
}

// =============================================================================
// Lifecycle: registration, ticking, ending
// =============================================================================

impl Arena {
    /// Registers a new effect and applies everything it adds.
    ///
    /// `remaining` is the duration clock in rounds; `None` means the effect
    /// only ends through an explicit check or an external event. Returns the
    /// effect handle — for a bleeding re-application this is the existing
    /// instance, with one more wound and the longer of the two clocks.
    pub fn apply_effect(&mut self, kind: EffectKind, remaining: Option<i32>) -> EffectId {
        // Bleeding stacks onto an existing instance instead of re-registering.
        if let EffectKind::Bleeding { target, .. } = kind {
            let existing = self.combatants[target.index()]
                .cond
                .start_turn
                .iter()
                .copied()
                .find(|&eid| {
                    !self.effects.is_ended(eid)
                        && matches!(self.effects.kind(eid), EffectKind::Bleeding { .. })
                });
            if let Some(eid) = existing {
                if let EffectKind::Bleeding { wounds, .. } = &mut self.effects.get_mut(eid).kind {
                    *wounds += 1;
                }
                let entry = self.effects.get_mut(eid);
                entry.remaining = match (entry.remaining, remaining) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
                return eid;
            }
        }

        let id = self.effects.push(kind.clone(), remaining);
        self.register_effect(id, &kind);
        id
    }

    fn register_effect(&mut self, id: EffectId, kind: &EffectKind) {
        match *kind {
            EffectKind::Bleeding { target, .. } => {
                self.narrate_condition(target, "is bleeding");
                self.combatants[target.index()].cond.start_turn.push(id);
            }
            EffectKind::Grapple {
                grappler,
                target,
                restrained,
                stunned,
                escape_priority,
            } => {
                self.combatants[grappler.index()].cond.grappling.push(id);
                let t = &mut self.combatants[target.index()];
                t.cond.grappled.push(id);
                if escape_priority {
                    t.cond.start_turn.push(id);
                }
                if restrained {
                    t.cond.restrained += 1;
                }
                if stunned {
                    t.cond.stunned += 1;
                }
                if self.combatants[grappler.index()].verbose
                    || self.combatants[target.index()].verbose
                {
                    debug!(
                        "{} is grappled by {}",
                        self.combatants[target.index()].tag(),
                        self.combatants[grappler.index()].tag()
                    );
                }
            }
            EffectKind::Engulfed {
                engulfer,
                target,
                blinds,
                ..
            } => {
                let t = &mut self.combatants[target.index()];
                t.cond.restrained += 1;
                if blinds {
                    t.cond.blinded += 1;
                }
                t.cond.engulfed = Some(id);
                t.cond.start_turn.push(id);
                self.combatants[engulfer.index()]
                    .cond
                    .engulfed_creatures
                    .push(target);
                self.narrate_condition(target, "is engulfed");
            }
            EffectKind::Swallowed {
                swallower, target, ..
            } => {
                self.combatants[swallower.index()]
                    .cond
                    .swallowed_creatures
                    .push(target);
                let t = &mut self.combatants[target.index()];
                t.cond.swallowed = Some(id);
                t.cond.start_turn.push(id);
                t.cond.end_turn.push(id);
                t.cond.blinded += 1;
                t.cond.restrained += 1;
                self.narrate_condition(target, "is swallowed");
            }
            EffectKind::Frightened { source, target, .. } => {
                self.combatants[target.index()].cond.frightened += 1;
                self.combatants[target.index()].cond.end_turn.push(id);
                self.combatants[source.index()].cond.start_turn.push(id);
                self.narrate_condition(target, "is frightened");
            }
            EffectKind::FrightenedOneTurn { target } => {
                self.combatants[target.index()].cond.frightened += 1;
                self.combatants[target.index()].cond.end_turn.push(id);
                self.narrate_condition(target, "is frightened");
            }
            EffectKind::Paralyzed { source, target, .. } => {
                self.combatants[target.index()].cond.paralyzed += 1;
                self.combatants[target.index()].cond.end_turn.push(id);
                self.combatants[source.index()].cond.start_turn.push(id);
                self.narrate_condition(target, "is paralyzed");
                // Paralysis breaks concentration.
                if let Some(conc) = self.combatants[target.index()].cond.concentration {
                    self.end_effect(conc);
                }
            }
            EffectKind::Poisoned { source, target, .. } => {
                self.combatants[target.index()].cond.poisoned += 1;
                self.combatants[target.index()].cond.end_turn.push(id);
                self.combatants[source.index()].cond.start_turn.push(id);
                self.narrate_condition(target, "is poisoned");
            }
            EffectKind::Stunned { source, target, .. } => {
                self.combatants[target.index()].cond.stunned += 1;
                self.combatants[target.index()].cond.end_turn.push(id);
                self.combatants[source.index()].cond.start_turn.push(id);
                self.narrate_condition(target, "is stunned");
                // Being stunned breaks concentration.
                if let Some(conc) = self.combatants[target.index()].cond.concentration {
                    self.end_effect(conc);
                }
            }
            EffectKind::Slowed { source, target, .. } => {
                self.combatants[target.index()].cond.slowed += 1;
                self.combatants[target.index()].cond.end_turn.push(id);
                self.combatants[source.index()].cond.start_turn.push(id);
                self.narrate_condition(target, "is slowed");
            }
            EffectKind::WebRestrained { target, .. } => {
                self.combatants[target.index()].cond.restrained += 1;
                self.combatants[target.index()].cond.start_turn.push(id);
                self.narrate_condition(target, "is restrained");
            }
            EffectKind::Reckless { target } => {
                self.combatants[target.index()].cond.target_adv += 1;
                self.combatants[target.index()].cond.start_turn.push(id);
            }
            EffectKind::TurnedUndead { turner, target } => {
                self.combatants[target.index()].cond.turned = Some(id);
                self.combatants[turner.index()].cond.start_turn.push(id);
                self.narrate_condition(target, "is turned");
            }
            EffectKind::LegendaryAction { creature } => {
                let all: Vec<CombatantId> = self.ids().collect();
                for other in all {
                    if other != creature {
                        self.combatants[other.index()].cond.end_turn.push(id);
                    }
                }
            }
            EffectKind::HeadLoss { .. } => {
                let all: Vec<CombatantId> = self.ids().collect();
                for member in all {
                    self.combatants[member.index()].cond.end_turn.push(id);
                }
            }
            EffectKind::StuckWeapon { target, .. } => {
                self.combatants[target.index()].cond.priority_actions.push(id);
                self.narrate_condition(target, "lost its weapon");
            }
            EffectKind::GuidingBolt { caster, target } => {
                if let Some(old) = self.combatants[target.index()].cond.guiding_bolt {
                    self.end_effect(old);
                }
                self.combatants[target.index()].cond.guiding_bolt = Some(id);
                self.combatants[caster.index()].cond.end_turn.push(id);
                self.narrate_condition(target, "received Guiding Bolt");
            }
            EffectKind::ViciousMockery { target } => {
                if let Some(old) = self.combatants[target.index()].cond.vicious_mockery {
                    self.end_effect(old);
                }
                self.combatants[target.index()].cond.vicious_mockery = Some(id);
                self.combatants[target.index()].cond.end_turn.push(id);
                self.narrate_condition(target, "received Vicious Mockery");
            }
            EffectKind::Shield { caster } => {
                // A new Shield replaces any old one.
                if let Some(old) = self.combatants[caster.index()].cond.shield {
                    self.end_effect(old);
                }
                self.combatants[caster.index()].cond.shield = Some(id);
                self.combatants[caster.index()].cond.start_turn.push(id);
            }
            EffectKind::Bless { caster, ref targets } => {
                self.begin_concentration(caster, id);
                for &t in targets {
                    self.combatants[t.index()].cond.blessed += 1;
                    self.narrate_condition(t, "received Bless");
                }
            }
            EffectKind::Bane { caster, ref targets } => {
                self.begin_concentration(caster, id);
                for &t in targets {
                    self.combatants[t.index()].cond.baned += 1;
                    self.narrate_condition(t, "received Bane");
                }
            }
            EffectKind::SpiritGuardians {
                caster, ref targets, ..
            } => {
                self.begin_concentration(caster, id);
                for &t in targets {
                    self.combatants[t.index()].cond.spirit_guardians.push(id);
                    self.sort_spirit_guardians(t);
                    self.narrate_condition(t, "received Spirit Guardians");
                }
            }
            EffectKind::GreaterInvisibility { caster, target } => {
                self.begin_concentration(caster, id);
                self.combatants[target.index()].cond.invisible += 1;
                self.narrate_condition(target, "became invisible");
            }
            EffectKind::ShieldOfFaith { caster } => {
                self.begin_concentration(caster, id);
                self.combatants[caster.index()].base_armor_class += 2;
            }
            EffectKind::SpiritualWeapon { caster, .. } => {
                if let Some(old) = self.combatants[caster.index()].cond.spiritual_weapon {
                    self.end_effect(old);
                }
                self.combatants[caster.index()].cond.spiritual_weapon = Some(id);
                self.combatants[caster.index()].cond.start_turn.push(id);
            }
            EffectKind::MelfsAcidArrow { target, .. } => {
                self.combatants[target.index()].cond.end_turn.push(id);
                self.narrate_condition(target, "received Melf's Acid Arrow");
            }
        }
    }

    /// Ends concentration already in progress and claims the slot.
    fn begin_concentration(&mut self, caster: CombatantId, id: EffectId) {
        if let Some(old) = self.combatants[caster.index()].cond.concentration {
            self.end_effect(old);
        }
        self.combatants[caster.index()].cond.concentration = Some(id);
    }

    /// Keeps a combatant's Spirit Guardians handles ordered most potent
    /// first, so only the strongest instance fires.
    fn sort_spirit_guardians(&mut self, target: CombatantId) {
        let mut handles = std::mem::take(&mut self.combatants[target.index()].cond.spirit_guardians);
        handles.sort_by_key(|&eid| {
            let dice = match self.effects.kind(eid) {
                EffectKind::SpiritGuardians { dice, .. } => *dice,
                _ => 0,
            };
            std::cmp::Reverse(dice)
        });
        self.combatants[target.index()].cond.spirit_guardians = handles;
    }

    /// Decrements an effect's clock, ending it at zero. Effects without a
    /// clock never tick.
    pub(crate) fn tick_effect(&mut self, id: EffectId) {
        let entry = self.effects.get_mut(id);
        if entry.ended {
            return;
        }
        if let Some(remaining) = entry.remaining {
            entry.remaining = Some(remaining - 1);
            if remaining - 1 == 0 {
                self.end_effect(id);
            }
        }
    }

    /// Transitions an effect to its terminal state, reversing everything its
    /// registration added. Idempotent: a second call is a no-op.
    pub fn end_effect(&mut self, id: EffectId) {
        if self.effects.is_ended(id) {
            return;
        }
        self.effects.get_mut(id).ended = true;
        let kind = self.effects.kind(id).clone();

        match kind {
            EffectKind::Bleeding { target, .. } => {
                detach(&mut self.combatants[target.index()].cond.start_turn, id);
                self.narrate_condition(target, "is no longer bleeding");
            }
            EffectKind::Grapple {
                grappler,
                target,
                restrained,
                stunned,
                escape_priority,
            } => {
                detach(&mut self.combatants[grappler.index()].cond.grappling, id);
                let t = &mut self.combatants[target.index()];
                detach(&mut t.cond.grappled, id);
                if escape_priority {
                    detach(&mut t.cond.start_turn, id);
                }
                if restrained {
                    t.cond.restrained -= 1;
                }
                if stunned {
                    t.cond.stunned -= 1;
                }
                self.narrate_condition(target, "is no longer grappled");
            }
            EffectKind::Engulfed {
                engulfer,
                target,
                blinds,
                ..
            } => {
                let t = &mut self.combatants[target.index()];
                t.cond.restrained -= 1;
                if blinds {
                    t.cond.blinded -= 1;
                }
                t.cond.engulfed = None;
                detach(&mut t.cond.start_turn, id);
                detach_combatant(
                    &mut self.combatants[engulfer.index()].cond.engulfed_creatures,
                    target,
                );
                self.narrate_condition(target, "is no longer engulfed");
            }
            EffectKind::Swallowed {
                swallower, target, ..
            } => {
                detach_combatant(
                    &mut self.combatants[swallower.index()].cond.swallowed_creatures,
                    target,
                );
                let t = &mut self.combatants[target.index()];
                t.cond.swallowed = None;
                detach(&mut t.cond.start_turn, id);
                detach(&mut t.cond.end_turn, id);
                t.cond.blinded -= 1;
                t.cond.restrained -= 1;
                t.cond.prone = true;
                self.narrate_condition(target, "is no longer swallowed");
            }
            EffectKind::Frightened { source, target, .. } => {
                self.combatants[target.index()].cond.frightened -= 1;
                detach(&mut self.combatants[target.index()].cond.end_turn, id);
                detach(&mut self.combatants[source.index()].cond.start_turn, id);
                self.narrate_condition(target, "is no longer frightened");
            }
            EffectKind::FrightenedOneTurn { target } => {
                self.combatants[target.index()].cond.frightened -= 1;
                detach(&mut self.combatants[target.index()].cond.end_turn, id);
                self.narrate_condition(target, "is no longer frightened");
            }
            EffectKind::Paralyzed { source, target, .. } => {
                self.combatants[target.index()].cond.paralyzed -= 1;
                detach(&mut self.combatants[target.index()].cond.end_turn, id);
                detach(&mut self.combatants[source.index()].cond.start_turn, id);
                self.narrate_condition(target, "is no longer paralyzed");
            }
            EffectKind::Poisoned { source, target, .. } => {
                self.combatants[target.index()].cond.poisoned -= 1;
                detach(&mut self.combatants[target.index()].cond.end_turn, id);
                detach(&mut self.combatants[source.index()].cond.start_turn, id);
                self.narrate_condition(target, "is no longer poisoned");
            }
            EffectKind::Stunned { source, target, .. } => {
                self.combatants[target.index()].cond.stunned -= 1;
                detach(&mut self.combatants[target.index()].cond.end_turn, id);
                detach(&mut self.combatants[source.index()].cond.start_turn, id);
                self.narrate_condition(target, "is no longer stunned");
            }
            EffectKind::Slowed { source, target, .. } => {
                self.combatants[target.index()].cond.slowed -= 1;
                detach(&mut self.combatants[target.index()].cond.end_turn, id);
                detach(&mut self.combatants[source.index()].cond.start_turn, id);
                self.narrate_condition(target, "is no longer slowed");
            }
            EffectKind::WebRestrained { target, .. } => {
                self.combatants[target.index()].cond.restrained -= 1;
                detach(&mut self.combatants[target.index()].cond.start_turn, id);
                self.narrate_condition(target, "is no longer restrained");
            }
            EffectKind::Reckless { target } => {
                self.combatants[target.index()].cond.target_adv -= 1;
                detach(&mut self.combatants[target.index()].cond.start_turn, id);
            }
            EffectKind::TurnedUndead { turner, target } => {
                self.combatants[target.index()].cond.turned = None;
                detach(&mut self.combatants[turner.index()].cond.start_turn, id);
                self.narrate_condition(target, "is no longer turned");
            }
            EffectKind::LegendaryAction { .. } | EffectKind::HeadLoss { .. } => {
                // Encounter-long bookkeeping; nothing to reverse.
            }
            EffectKind::StuckWeapon { target, .. } => {
                detach(
                    &mut self.combatants[target.index()].cond.priority_actions,
                    id,
                );
                self.narrate_condition(target, "recovered its weapon");
            }
            EffectKind::GuidingBolt { caster, target } => {
                self.combatants[target.index()].cond.guiding_bolt = None;
                detach(&mut self.combatants[caster.index()].cond.end_turn, id);
                self.narrate_condition(target, "lost Guiding Bolt");
            }
            EffectKind::ViciousMockery { target } => {
                self.combatants[target.index()].cond.vicious_mockery = None;
                detach(&mut self.combatants[target.index()].cond.end_turn, id);
                self.narrate_condition(target, "lost Vicious Mockery");
            }
            EffectKind::Shield { caster } => {
                self.combatants[caster.index()].cond.shield = None;
                detach(&mut self.combatants[caster.index()].cond.start_turn, id);
            }
            EffectKind::Bless { caster, targets } => {
                self.combatants[caster.index()].cond.concentration = None;
                for t in targets {
                    self.combatants[t.index()].cond.blessed -= 1;
                    self.narrate_condition(t, "lost Bless");
                }
            }
            EffectKind::Bane { caster, targets } => {
                self.combatants[caster.index()].cond.concentration = None;
                for t in targets {
                    self.combatants[t.index()].cond.baned -= 1;
                    self.narrate_condition(t, "lost Bane");
                }
            }
            EffectKind::SpiritGuardians {
                caster, targets, ..
            } => {
                self.combatants[caster.index()].cond.concentration = None;
                for t in targets {
                    detach(&mut self.combatants[t.index()].cond.spirit_guardians, id);
                    self.narrate_condition(t, "lost Spirit Guardians");
                }
            }
            EffectKind::GreaterInvisibility { caster, target } => {
                self.combatants[caster.index()].cond.concentration = None;
                self.combatants[target.index()].cond.invisible -= 1;
                self.narrate_condition(target, "is no longer invisible");
            }
            EffectKind::ShieldOfFaith { caster } => {
                self.combatants[caster.index()].cond.concentration = None;
                self.combatants[caster.index()].base_armor_class -= 2;
            }
            EffectKind::SpiritualWeapon { caster, .. } => {
                self.combatants[caster.index()].cond.spiritual_weapon = None;
                detach(&mut self.combatants[caster.index()].cond.start_turn, id);
            }
            EffectKind::MelfsAcidArrow {
                caster,
                target,
                dice,
            } => {
                // The delayed acid lands when the effect ends.
                let mut damage = D4.sum(&mut self.rng, dice);
                if self.combatants[caster.index()]
                    .has_trait(crate::stats::Traits::EMPOWERED_EVOCATION)
                {
                    let ability = self.combatants[caster.index()].spell_ability;
                    damage += self.combatants[caster.index()].abilities.get(ability);
                }
                self.take_damage(target, damage, DamageType::Acid, None, false, 0, None);
                detach(&mut self.combatants[target.index()].cond.end_turn, id);
                self.narrate_condition(target, "lost Melf's Acid Arrow");
            }
        }
    }

    fn narrate_condition(&self, who: CombatantId, what: &str) {
        let c = &self.combatants[who.index()];
        if c.verbose {
            debug!("{} {}", c.tag(), what);
        }
    }
}

// =============================================================================
// Trigger dispatch
// =============================================================================

impl Arena {
    /// Fires every start-of-turn effect registered on `owner`, in append
    /// order over a snapshot of the list.
    pub fn fire_start_of_turn(&mut self, owner: CombatantId) {
        let snapshot = self.combatants[owner.index()].cond.start_turn.clone();
        for id in snapshot {
            if self.effects.is_ended(id) {
                continue;
            }
            match self.effects.kind(id).clone() {
                EffectKind::Bleeding {
                    target,
                    dice,
                    damage_type,
                    wounds,
                } => {
                    // Every wound rolls its own dice; one combined application.
                    let mut damage = 0;
                    for _ in 0..wounds {
                        damage += dice.roll(&mut self.rng);
                    }
                    self.take_damage(target, damage, damage_type, None, false, 0, None);
                    self.tick_effect(id);
                }
                EffectKind::Grapple {
                    target,
                    escape_priority,
                    ..
                } => {
                    if escape_priority && self.combatants[target.index()].cond.action {
                        self.combatants[target.index()].cond.action = false;
                        let roll = self.escape_grapple(target, false);
                        if self.combatants[target.index()].verbose {
                            debug!(
                                "{} rolled {} to escape a grapple",
                                self.combatants[target.index()].tag(),
                                roll
                            );
                        }
                        let held_by = self.combatants[target.index()].cond.grappled.clone();
                        for gid in held_by {
                            if self.effects.is_ended(gid) {
                                continue;
                            }
                            if let EffectKind::Grapple { grappler, .. } = *self.effects.kind(gid) {
                                let g = &self.combatants[grappler.index()];
                                let escape_dc =
                                    8 + g.proficiency + g.abilities.get(Ability::Str);
                                if roll >= escape_dc {
                                    self.end_effect(gid);
                                }
                            }
                        }
                    }
                }
                EffectKind::Engulfed {
                    target, escape_dc, ..
                } => {
                    if self.combatants[target.index()].cond.action {
                        self.combatants[target.index()].cond.action = false;
                        if self.escape_grapple(target, false) >= escape_dc {
                            self.end_effect(id);
                        }
                    }
                }
                EffectKind::Swallowed { swallower, .. } => {
                    self.combatants[swallower.index()].cond.damage_from_swallowed = 0;
                }
                EffectKind::WebRestrained { target, check_dc } => {
                    if self.combatants[target.index()].cond.action {
                        self.combatants[target.index()].cond.action = false;
                        if self.skill_check(target, Skill::Strength, check_dc, false, false) {
                            self.end_effect(id);
                        }
                    }
                }
                // Clock owners: the countdown runs here.
                EffectKind::Reckless { .. }
                | EffectKind::Frightened { .. }
                | EffectKind::Paralyzed { .. }
                | EffectKind::Poisoned { .. }
                | EffectKind::Stunned { .. }
                | EffectKind::Slowed { .. }
                | EffectKind::TurnedUndead { .. }
                | EffectKind::Shield { .. }
                | EffectKind::SpiritualWeapon { .. } => self.tick_effect(id),
                _ => {}
            }
        }
    }

    /// Fires every end-of-turn effect registered on `owner`, in append order
    /// over a snapshot. Runs whether or not the owner is still conscious.
    pub fn fire_end_of_turn(&mut self, enc: &Encounter, owner: CombatantId) {
        let snapshot = self.combatants[owner.index()].cond.end_turn.clone();
        for id in snapshot {
            if self.effects.is_ended(id) {
                continue;
            }
            match self.effects.kind(id).clone() {
                EffectKind::Frightened { target, save_dc, .. } => {
                    if self.saving_throw(target, Ability::Wis, save_dc, false, true, None) {
                        self.end_effect(id);
                    }
                }
                EffectKind::FrightenedOneTurn { .. } => self.end_effect(id),
                EffectKind::Paralyzed { target, save_dc, .. } => {
                    if self.saving_throw(target, Ability::Con, save_dc, false, false, None) {
                        self.end_effect(id);
                    }
                }
                EffectKind::Poisoned { target, save_dc, .. } => {
                    if self.saving_throw(target, Ability::Con, save_dc, false, false, None) {
                        self.end_effect(id);
                    }
                }
                EffectKind::Stunned { target, save_dc, .. } => {
                    if self.saving_throw(target, Ability::Int, save_dc, false, false, None) {
                        self.end_effect(id);
                    }
                }
                EffectKind::Slowed { target, save_dc, .. } => {
                    if self.saving_throw(target, Ability::Wis, save_dc, false, false, None) {
                        self.end_effect(id);
                    }
                }
                EffectKind::Swallowed {
                    swallower,
                    threshold,
                    save_dc,
                    ..
                } => {
                    // Enough damage from inside forces a save or everything
                    // comes back up.
                    if self.combatants[swallower.index()].cond.damage_from_swallowed >= threshold
                        && !self.saving_throw(swallower, Ability::Con, save_dc, false, false, None)
                    {
                        let inside =
                            self.combatants[swallower.index()].cond.swallowed_creatures.clone();
                        for creature in inside {
                            if let Some(eid) = self.combatants[creature.index()].cond.swallowed {
                                self.end_effect(eid);
                            }
                        }
                    }
                }
                EffectKind::LegendaryAction { creature } => {
                    let c = &self.combatants[creature.index()];
                    if c.cond.legendary_remaining > 0 && c.hp > 0 && !c.is_incapacitated() {
                        self.combatants[creature.index()].cond.legendary_remaining -= 1;
                        self.with_strategy(creature, |strategy, arena| {
                            strategy.legendary_action(creature, enc, arena);
                        });
                    }
                }
                EffectKind::HeadLoss {
                    creature,
                    threshold,
                } => {
                    let c = &mut self.combatants[creature.index()];
                    if c.cond.damage_taken_this_turn >= threshold && c.cond.heads > 0 {
                        if c.verbose {
                            debug!("{} lost a head", c.tag());
                        }
                        c.cond.heads -= 1;
                        c.cond.heads_lost_this_round += 1;
                        if c.cond.heads == 0 {
                            c.hp = 0;
                            c.max_hp = 0;
                            if c.verbose {
                                debug!("{} has zero heads", c.tag());
                            }
                        }
                    }
                    self.combatants[creature.index()].cond.damage_taken_this_turn = 0;
                }
                EffectKind::GuidingBolt { .. } | EffectKind::ViciousMockery { .. } => {
                    self.tick_effect(id);
                }
                EffectKind::MelfsAcidArrow { .. } => self.end_effect(id),
                _ => {}
            }
        }
    }

    /// Fires the single most potent Spirit Guardians instance on `owner`.
    pub fn fire_spirit_guardians(&mut self, owner: CombatantId) {
        let Some(&id) = self.combatants[owner.index()].cond.spirit_guardians.first() else {
            return;
        };
        if self.effects.is_ended(id) {
            return;
        }
        if let EffectKind::SpiritGuardians {
            dice,
            save_dc,
            damage_type,
            ..
        } = *self.effects.kind(id)
        {
            if self.combatants[owner.index()].verbose {
                debug!("{} triggered Spirit Guardians", self.combatants[owner.index()].tag());
            }
            let damage = D8.sum(&mut self.rng, dice);
            self.half_saving_throw(
                owner,
                Ability::Wis,
                save_dc,
                damage,
                damage_type,
                0,
                None,
                false,
                false,
                Some(SaveTag::Magic),
            );
        }
    }

    /// Dispatches the highest-priority queued forced action for `owner`, in
    /// place of its normal turn. The action has already been consumed.
    pub fn run_priority_action(&mut self, owner: CombatantId) {
        let queue = self.combatants[owner.index()].cond.priority_actions.clone();
        let chosen = queue
            .iter()
            .copied()
            .filter(|&id| !self.effects.is_ended(id))
            .max_by_key(|&id| self.effects.kind(id).priority().unwrap_or(i32::MIN));
        let Some(id) = chosen else { return };

        if let EffectKind::StuckWeapon { target, check_dc } = *self.effects.kind(id) {
            if self.skill_check(target, Skill::Strength, check_dc, false, false) {
                self.end_effect(id);
            }
        }
    }
}
