//! Theory solvers for the silex SMT engine.
//!
//! - [`la`] — the linear-arithmetic decision procedure: a general simplex
//!   with bounds (Dutertre/de Moura), bound-refinement propagation, Gomory
//!   mixed-integer cuts, Farkas conflict explanation and model repair.
//! - [`euf`] — congruence closure with an explanation forest that yields
//!   checkable `:CC` lemma paths.
//! - [`array`] — lazy instantiation of the array axioms over the
//!   congruence graph.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod array;
pub mod euf;
pub mod la;

use silex_core::{Lit, TermId, Var};
use silex_math::Rational;
use smallvec::SmallVec;
use std::cell::Cell;
use std::rc::Rc;

/// A shared DPLL-variable allocator. The engine and every theory draw
/// fresh variables from the same pool, so theory-created atoms (cut
/// bounds, equality links) get globally unique ids.
#[derive(Debug, Clone, Default)]
pub struct VarPool(Rc<Cell<Var>>);

impl VarPool {
    /// A pool starting at variable zero.
    pub fn new() -> Self {
        VarPool::default()
    }

    /// Allocate a fresh variable.
    pub fn fresh(&self) -> Var {
        let v = self.0.get();
        self.0.set(v + 1);
        v
    }

    /// The number of allocated variables.
    pub fn len(&self) -> usize {
        self.0.get() as usize
    }

    /// Has no variable been allocated yet?
    pub fn is_empty(&self) -> bool {
        self.0.get() == 0
    }
}

/// A clause produced by a theory, together with the annotation the proof
/// producer needs to build the matching lemma or tautology leaf.
#[derive(Debug, Clone)]
pub struct TheoryClause {
    /// The clause literals.
    pub lits: SmallVec<[Lit; 4]>,
    /// The proof annotation.
    pub annot: LemmaAnnotation,
}

impl TheoryClause {
    /// A clause with the given annotation.
    pub fn new(lits: impl IntoIterator<Item = Lit>, annot: LemmaAnnotation) -> Self {
        TheoryClause {
            lits: lits.into_iter().collect(),
            annot,
        }
    }
}

/// What kind of leaf proves a theory clause.
#[derive(Debug, Clone)]
pub enum LemmaAnnotation {
    /// An `:LA` lemma with Farkas coefficients parallel to the literals.
    La(Vec<Rational>),
    /// A `:trichotomy` lemma.
    Trichotomy,
    /// An `:EQ` lemma linking two renditions of one equality.
    EqLink,
    /// A `:CC` congruence lemma with its paths.
    Cc(CcLemma),
    /// A `:read-over-weakeq` array lemma.
    ReadOverWeakeq(CcLemma),
    /// A `:weakeq-ext` array lemma.
    WeakeqExt(CcLemma),
    /// The `:store` tautology `(= (select (store a i v) i) v)`.
    StoreTaut,
    /// The `:diff` extensionality tautology.
    DiffTaut,
}

/// The path annotation of a congruence or array lemma.
#[derive(Debug, Clone)]
pub struct CcLemma {
    /// The proved equality term, absent for pure disequality conflicts.
    pub goal: Option<TermId>,
    /// The paths, main path last-checked first (emission order).
    pub paths: Vec<CcPath>,
}

/// One `:subpath` / `:weakpath` chain of terms.
#[derive(Debug, Clone)]
pub struct CcPath {
    /// The weak index for `:weakpath` entries; `None` for `:subpath`.
    pub weak_index: Option<TermId>,
    /// The chain, at least two terms.
    pub terms: Vec<TermId>,
}
