//! Tableau variable records.

use super::atoms::AtomId;
use super::reason::ReasonId;
use silex_core::SmtAffineTerm;
use silex_math::{ExactInfNumber, InfNumber, Rational};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// A linear-arithmetic variable: an input term or a slack variable for a
/// canonical linear combination of input terms.
#[derive(Debug)]
pub struct LinVar {
    /// The definition over input terms. External variables have a single
    /// summand with coefficient one; slack variables carry their
    /// gcd-normalized combination.
    pub def: SmtAffineTerm,
    /// Integer-valued?
    pub is_int: bool,
    /// Currently basic (owns a tableau row)?
    pub basic: bool,
    /// Simplified out of the tableau; `def`-independent expansion lives
    /// in the solver's simplification map.
    pub dead: bool,
    /// Created as a slack variable for a linear combination?
    pub initially_basic: bool,
    /// Assertion-stack level at creation; variables above the popped
    /// level are discarded.
    pub assert_level: u32,
    /// The current assignment.
    pub value: InfNumber,
    /// Head of the upper-bound reason chain.
    pub upper: Option<ReasonId>,
    /// Head of the lower-bound reason chain.
    pub lower: Option<ReasonId>,
    /// Basic only: number of row columns whose upper-supporting bound is
    /// infinite. Zero means `upper_sum` is a valid derived upper bound.
    pub num_upper_inf: u32,
    /// Basic only: infinite lower-supporting bounds in the row.
    pub num_lower_inf: u32,
    /// Sum of the finite upper-supporting bound contributions. The
    /// epsilon multiplicity is kept exact so incremental updates never
    /// lose strictness information.
    pub upper_sum: ExactInfNumber,
    /// Sum of the finite lower-supporting bound contributions.
    pub lower_sum: ExactInfNumber,
    /// Registered bound-constraint atoms keyed by bound.
    pub constraints: BTreeMap<InfNumber, AtomId>,
    /// Registered equality atoms keyed by bound.
    pub equalities: BTreeMap<InfNumber, AtomId>,
    /// Currently asserted disequalities, by disequal value.
    pub diseqs: FxHashMap<Rational, AtomId>,
}

impl LinVar {
    /// A fresh non-basic variable.
    pub fn new(def: SmtAffineTerm, is_int: bool, assert_level: u32) -> Self {
        LinVar {
            def,
            is_int,
            basic: false,
            dead: false,
            initially_basic: false,
            assert_level,
            value: InfNumber::zero(),
            upper: None,
            lower: None,
            num_upper_inf: 0,
            num_lower_inf: 0,
            upper_sum: ExactInfNumber::zero(),
            lower_sum: ExactInfNumber::zero(),
            constraints: BTreeMap::new(),
            equalities: BTreeMap::new(),
            diseqs: FxHashMap::default(),
        }
    }

    /// The granularity of a strict bound: `1` for integers, `eps` for
    /// reals. `x < c` is `x <= c - epsilon()`.
    pub fn epsilon(&self) -> InfNumber {
        if self.is_int {
            InfNumber::one()
        } else {
            InfNumber::new(Rational::zero(), 1)
        }
    }

    /// Round a bound for this variable: floor for upper bounds, ceil for
    /// lower bounds on integers; identity on reals.
    pub fn round_bound(&self, bound: InfNumber, is_upper: bool) -> InfNumber {
        if !self.is_int {
            bound
        } else if is_upper {
            bound.floor()
        } else {
            bound.ceil()
        }
    }

    /// Does the variable have neither an upper nor a lower bound and no
    /// registered atoms? Such real variables make their row trivially
    /// satisfiable.
    pub fn unconstrained(&self) -> bool {
        self.upper.is_none()
            && self.lower.is_none()
            && self.constraints.is_empty()
            && self.equalities.is_empty()
            && self.diseqs.is_empty()
    }

    /// Reset the composite-bound bookkeeping (row recomputation follows).
    pub fn reset_composites(&mut self) {
        self.num_upper_inf = 0;
        self.num_lower_inf = 0;
        self.upper_sum = ExactInfNumber::zero();
        self.lower_sum = ExactInfNumber::zero();
    }
}
