//! Bound reasons.
//!
//! Every asserted or derived bound on a tableau variable is justified by
//! an [`LaReason`]: either a DPLL literal, or a composite derived by bound
//! refinement from the reasons of the non-basic variables in a row. The
//! reasons of one variable and side form a chain ordered from tightest
//! (head) to weakest; backtracking unlinks the reasons introduced by the
//! retracted literal, together with every composite that named it as its
//! last literal.
//!
//! Reasons live in an index arena owned by the solver, so composite
//! back-references never form ownership cycles.

use super::matrix::VarId;
use silex_core::Lit;
use silex_math::{InfNumber, Rational};

/// Index of a reason in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReasonId(pub u32);

/// The justification kind.
#[derive(Debug)]
pub enum ReasonKind {
    /// A bound asserted by a DPLL literal.
    Literal {
        /// The asserted literal.
        lit: Lit,
        /// Reasons that were created on the back of this literal and must
        /// be removed with it.
        dependents: Vec<ReasonId>,
    },
    /// A bound derived from the rows' non-basic reasons by bound
    /// refinement, with the Farkas factor per child.
    Composite {
        /// `(child reason, expansion coefficient)` pairs.
        children: Box<[(ReasonId, Rational)]>,
    },
}

/// One node of a variable's reason chain.
#[derive(Debug)]
pub struct LaReason {
    /// The bounded variable.
    pub var: VarId,
    /// Upper (`true`) or lower bound.
    pub is_upper: bool,
    /// The asserted bound, rounded to an integer for integer variables.
    pub bound: InfNumber,
    /// The bound before integer rounding.
    pub exact_bound: InfNumber,
    /// The next weaker reason on the same side.
    pub old_reason: Option<ReasonId>,
    /// The literal reason whose assertion completed this reason's
    /// evidence (itself, for literal reasons).
    pub last_literal: ReasonId,
    /// Global assertion order index.
    pub stack_pos: u64,
    /// The justification.
    pub kind: ReasonKind,
}

impl LaReason {
    /// The literal of a literal reason.
    pub fn literal(&self) -> Option<Lit> {
        match &self.kind {
            ReasonKind::Literal { lit, .. } => Some(*lit),
            ReasonKind::Composite { .. } => None,
        }
    }
}

/// The reason arena with a free list.
#[derive(Debug, Default)]
pub struct ReasonArena {
    nodes: Vec<Option<LaReason>>,
    free: Vec<ReasonId>,
}

impl ReasonArena {
    /// An empty arena.
    pub fn new() -> Self {
        ReasonArena::default()
    }

    /// Allocate a reason.
    pub fn alloc(&mut self, reason: LaReason) -> ReasonId {
        if let Some(id) = self.free.pop() {
            self.nodes[id.0 as usize] = Some(reason);
            id
        } else {
            let id = ReasonId(self.nodes.len() as u32);
            self.nodes.push(Some(reason));
            id
        }
    }

    /// Allocate a literal reason whose `last_literal` is itself.
    pub fn alloc_literal(
        &mut self,
        var: VarId,
        is_upper: bool,
        bound: InfNumber,
        lit: Lit,
        stack_pos: u64,
    ) -> ReasonId {
        let id = self.alloc(LaReason {
            var,
            is_upper,
            exact_bound: bound.clone(),
            bound,
            old_reason: None,
            last_literal: ReasonId(u32::MAX),
            stack_pos,
            kind: ReasonKind::Literal {
                lit,
                dependents: Vec::new(),
            },
        });
        self.get_mut(id).last_literal = id;
        id
    }

    /// Release a reason. The caller guarantees nothing references it.
    pub fn release(&mut self, id: ReasonId) {
        debug_assert!(self.nodes[id.0 as usize].is_some());
        self.nodes[id.0 as usize] = None;
        self.free.push(id);
    }

    /// Borrow a reason.
    pub fn get(&self, id: ReasonId) -> &LaReason {
        self.nodes[id.0 as usize]
            .as_ref()
            .expect("released reason accessed")
    }

    /// Borrow a reason mutably.
    pub fn get_mut(&mut self, id: ReasonId) -> &mut LaReason {
        self.nodes[id.0 as usize]
            .as_mut()
            .expect("released reason accessed")
    }

    /// Record `dependent` on the literal reason `lit_reason`.
    pub fn add_dependent(&mut self, lit_reason: ReasonId, dependent: ReasonId) {
        match &mut self.get_mut(lit_reason).kind {
            ReasonKind::Literal { dependents, .. } => dependents.push(dependent),
            ReasonKind::Composite { .. } => {
                debug_assert!(false, "dependent on composite reason")
            }
        }
    }

    /// Check the strictly-tightening chain invariant starting at `head`.
    pub fn check_chain(&self, head: ReasonId) -> bool {
        let mut cur = head;
        loop {
            let r = self.get(cur);
            match r.old_reason {
                None => return true,
                Some(older) => {
                    let o = self.get(older);
                    let ok = if r.is_upper {
                        r.exact_bound < o.exact_bound
                    } else {
                        o.exact_bound < r.exact_bound
                    };
                    if !ok {
                        return false;
                    }
                    cur = older;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_invariant() {
        let mut arena = ReasonArena::new();
        let weak = arena.alloc_literal(
            VarId(0),
            true,
            InfNumber::from_rational(Rational::from_integer(10)),
            Lit::positive(0),
            0,
        );
        let tight = arena.alloc_literal(
            VarId(0),
            true,
            InfNumber::from_rational(Rational::from_integer(5)),
            Lit::positive(1),
            1,
        );
        arena.get_mut(tight).old_reason = Some(weak);
        assert!(arena.check_chain(tight));
        // a chain that loosens upward is broken
        arena.get_mut(weak).old_reason = None;
        arena.get_mut(weak).bound = InfNumber::from_rational(Rational::from_integer(3));
        arena.get_mut(weak).exact_bound = InfNumber::from_rational(Rational::from_integer(3));
        assert!(!arena.check_chain(tight));
    }

    #[test]
    fn test_free_list_reuse() {
        let mut arena = ReasonArena::new();
        let a = arena.alloc_literal(VarId(0), true, InfNumber::zero(), Lit::positive(0), 0);
        arena.release(a);
        let b = arena.alloc_literal(VarId(1), false, InfNumber::one(), Lit::positive(1), 1);
        assert_eq!(a, b);
        assert_eq!(arena.get(b).var, VarId(1));
    }
}
