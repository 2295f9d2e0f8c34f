//! Theory atoms owned by the linear-arithmetic solver.
//!
//! A bound-constraint atom asserts `var <= bound` positively and
//! `var >= bound + granularity` negatively. An equality atom asserts
//! `var = bound` positively and the disequality negatively. Both carry
//! the quoted SMT term they stand for, so conflict clauses and proofs can
//! be phrased over input terms.

use super::matrix::VarId;
use silex_core::{Lit, TermId, Var};
use silex_math::{InfNumber, Rational};
use rustc_hash::FxHashMap;

/// Index of an LA atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomId(pub u32);

/// The two atom shapes.
#[derive(Debug, Clone)]
pub enum LaAtomKind {
    /// `var <= bound`.
    Bound {
        /// The constrained variable.
        var: VarId,
        /// The (already rounded) bound.
        bound: InfNumber,
    },
    /// `var = bound`.
    Equality {
        /// The constrained variable.
        var: VarId,
        /// The equality value (no infinitesimal part).
        bound: Rational,
    },
}

/// One registered atom.
#[derive(Debug)]
pub struct LaAtom {
    /// The shape.
    pub kind: LaAtomKind,
    /// The DPLL variable standing for this atom.
    pub dpll_var: Var,
    /// The quoted atom term (`(<= t 0)`, `(< t 0)` or `(= t 0)` under a
    /// `:quoted` wrapper).
    pub term: TermId,
    /// Assertion-stack level at creation.
    pub assert_level: u32,
}

impl LaAtom {
    /// The positive literal of this atom.
    pub fn lit(&self) -> Lit {
        Lit::positive(self.dpll_var)
    }
}

/// The atom registry.
#[derive(Debug, Default)]
pub struct AtomTable {
    atoms: Vec<LaAtom>,
    by_var: FxHashMap<Var, AtomId>,
}

impl AtomTable {
    /// An empty registry.
    pub fn new() -> Self {
        AtomTable::default()
    }

    /// Register an atom.
    pub fn insert(&mut self, atom: LaAtom) -> AtomId {
        let id = AtomId(self.atoms.len() as u32);
        self.by_var.insert(atom.dpll_var, id);
        self.atoms.push(atom);
        id
    }

    /// Look up by atom id.
    pub fn get(&self, id: AtomId) -> &LaAtom {
        &self.atoms[id.0 as usize]
    }

    /// Look up by DPLL variable.
    pub fn by_dpll_var(&self, var: Var) -> Option<AtomId> {
        self.by_var.get(&var).copied()
    }

    /// Attach the materialized quoted term of an atom.
    pub fn set_term(&mut self, id: AtomId, term: TermId) {
        self.atoms[id.0 as usize].term = term;
    }

    /// Number of registered atoms.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Is the registry empty?
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Drop every atom created above `level` (assertion-stack pop). The
    /// caller already removed them from the per-variable maps.
    pub fn pop_to_level(&mut self, level: u32) {
        while let Some(last) = self.atoms.last() {
            if last.assert_level <= level {
                break;
            }
            self.by_var.remove(&last.dpll_var);
            self.atoms.pop();
        }
    }
}
