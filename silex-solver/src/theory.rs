//! Theory combination.
//!
//! One front coordinates the linear-arithmetic solver, the congruence
//! closure and the array instantiator behind the DPLL engine: it owns
//! the atom registry (which DPLL variable stands for which quoted atom
//! term and which theory owns it), routes assertions and explanations,
//! links numeric equalities between CC and LA through `:EQ` lemma
//! clauses, and drives the final-check round (LA feasibility, integer
//! cuts, model mutation, array instantiation, shared-variable merge
//! suggestions).

use rustc_hash::FxHashMap;
use silex_core::{
    Cancel, Config, Lit, Op, QuoteKind, Result, SilexError, SmtAffineTerm, TermId, TermKind,
    TermManager, Var,
};
use silex_math::Rational;
use silex_proof::{LemmaKind, LemmaPath, ProofId, ProofTracker, TautRule, Tracked};
use silex_theories::array::ArraySolver;
use silex_theories::euf::CcSolver;
use silex_theories::la::{LinArSolver, SharedVar, VarId as LaVarId};
use silex_theories::{CcLemma, LemmaAnnotation, TheoryClause, VarPool};
use tracing::debug;

/// Which component owns an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// A linear-arithmetic bound or equality atom.
    La,
    /// A congruence-closure equality atom.
    Cc,
    /// A Boolean proxy with no theory content.
    Bool,
}

/// Registry data per DPLL variable.
#[derive(Debug, Clone)]
pub struct AtomInfo {
    /// The quoted atom term the positive literal stands for.
    pub term: TermId,
    /// The owning component.
    pub owner: Owner,
}

/// A clause queued by the theories for the engine, with its annotation.
pub struct PendingClause {
    /// The literals.
    pub lits: Vec<Lit>,
    /// The annotation for proof production.
    pub annot: LemmaAnnotation,
}

/// The theory front.
pub struct TheoryFront {
    /// The shared variable pool.
    pub pool: VarPool,
    /// Linear arithmetic.
    pub la: LinArSolver,
    /// Congruence closure.
    pub cc: CcSolver,
    /// Array axiom instantiation.
    pub arrays: ArraySolver,
    atoms: FxHashMap<Var, AtomInfo>,
    by_term: FxHashMap<TermId, Lit>,
    la_vars: FxHashMap<TermId, LaVarId>,
    shared_terms: Vec<TermId>,
    /// Clauses the theories want added (links, instantiations).
    pub pending_clauses: Vec<PendingClause>,
    level: u32,
}

impl TheoryFront {
    /// Create the front with a fresh pool and solvers.
    pub fn new(cfg: &Config, cancel: Cancel) -> Self {
        let pool = VarPool::new();
        TheoryFront {
            la: LinArSolver::new(pool.clone(), cancel, cfg.bland_use_factor, cfg.max_cuts),
            cc: CcSolver::new(pool.clone()),
            arrays: ArraySolver::new(),
            pool,
            atoms: FxHashMap::default(),
            by_term: FxHashMap::default(),
            la_vars: FxHashMap::default(),
            shared_terms: Vec::new(),
            pending_clauses: Vec::new(),
            level: 0,
        }
    }

    /// Atom info for a variable.
    pub fn atom(&self, var: Var) -> Option<&AtomInfo> {
        self.atoms.get(&var)
    }

    /// The term of a literal: the quoted atom, under `not` for negative
    /// polarity. Proxy variables without registered terms panic.
    pub fn lit_term(&self, tm: &mut TermManager, lit: Lit) -> TermId {
        let info = self.atoms.get(&lit.var()).expect("literal without atom");
        if lit.is_positive() {
            info.term
        } else {
            tm.mk_not(info.term)
        }
    }

    /// Register a plain Boolean proxy variable for `term` (quoted).
    pub fn register_proxy(&mut self, tm: &mut TermManager, term: TermId) -> Lit {
        if let Some(&lit) = self.by_term.get(&term) {
            return lit;
        }
        let quoted = tm.mk_quoted(term, QuoteKind::Plain);
        let var = self.pool.fresh();
        self.atoms.insert(
            var,
            AtomInfo {
                term: quoted,
                owner: Owner::Bool,
            },
        );
        let lit = Lit::positive(var);
        self.by_term.insert(term, lit);
        lit
    }

    /// Known literal for a term, if registered.
    pub fn literal_for(&self, term: TermId) -> Option<Lit> {
        self.by_term.get(&term).copied()
    }

    /// The linear variable standing for an input term, creating it (and
    /// sharing it with the congruence closure when relevant) on demand.
    pub fn la_var_of(&mut self, tm: &TermManager, term: TermId) -> LaVarId {
        if let Some(&v) = self.la_vars.get(&term) {
            return v;
        }
        let sort = tm.sort(term);
        let is_int = sort == tm.sorts.int_sort;
        let v = self.la.add_external_var(term, is_int, sort, self.level);
        self.la_vars.insert(term, v);
        v
    }

    /// Break an affine form over input terms into LA summands.
    fn summands_of(&mut self, tm: &TermManager, affine: &SmtAffineTerm) -> (Vec<(LaVarId, Rational)>, Rational) {
        let mut summands = Vec::with_capacity(affine.num_summands());
        for (t, c) in affine.summands() {
            let v = self.la_var_of(tm, t);
            summands.push((v, Rational::Finite(c.clone())));
        }
        (summands, Rational::Finite(affine.constant_part().clone()))
    }

    /// The literal of an arithmetic comparison atom `(<= t 0)` or
    /// `(< t 0)`; returns the literal and the literal's term (the
    /// quoted normalized atom, negated when the normalization flipped
    /// the bound direction).
    pub fn arith_literal(
        &mut self,
        tm: &mut TermManager,
        atom_term: TermId,
    ) -> Result<(Lit, TermId)> {
        if let Some(&lit) = self.by_term.get(&atom_term) {
            let term = self.lit_term(tm, lit);
            return Ok((lit, term));
        }
        let (op, lhs) = match tm.kind(atom_term) {
            TermKind::App(op @ (Op::Le | Op::Lt), args) => (op.clone(), args[0]),
            _ => {
                debug_assert!(false, "arithmetic literal for a non-comparison");
                return Err(SilexError::Internal(
                    "arithmetic literal requested for a non-comparison atom",
                ));
            }
        };
        let affine = SmtAffineTerm::from_term(tm, lhs);
        let (summands, constant) = self.summands_of(tm, &affine);
        let strict = op == Op::Lt;
        let lit = self.la.generate_constraint(summands, constant, strict);
        self.drain_la_atoms(tm, Some(lit), atom_term);
        self.by_term.insert(atom_term, lit);
        let term = self.lit_term(tm, lit);
        Ok((lit, term))
    }

    /// The literal of a numeric equality `(= a b)`: a CC atom linked to
    /// the LA equality atom through two `:EQ` clauses.
    pub fn numeric_eq_literal(
        &mut self,
        tm: &mut TermManager,
        a: TermId,
        b: TermId,
    ) -> (Lit, TermId) {
        let eq_term = tm.mk_eq(a, b);
        if let Some(&lit) = self.by_term.get(&eq_term) {
            let quoted = self.atoms[&lit.var()].term;
            return (lit, quoted);
        }
        let cc_idx = self.cc.create_eq_atom(tm, a, b);
        let cc_var = self.cc.atoms[cc_idx].dpll_var;
        let cc_term = self.cc.atoms[cc_idx].term;
        self.register_cc_pending(tm);
        let cc_lit = Lit::positive(cc_var);
        self.by_term.insert(eq_term, cc_lit);

        // the LA side of the same equality
        let diff = SmtAffineTerm::from_term(tm, a)
            .add(&SmtAffineTerm::from_term(tm, b).negate());
        let (summands, constant) = self.summands_of(tm, &diff);
        if !summands.is_empty() {
            let la_atom = self.la.create_equality(summands, constant);
            let la_lit = self.la.atoms.get(la_atom).lit();
            self.drain_la_atoms(tm, None, eq_term);
            self.pending_clauses.push(PendingClause {
                lits: vec![cc_lit.negate(), la_lit],
                annot: LemmaAnnotation::EqLink,
            });
            self.pending_clauses.push(PendingClause {
                lits: vec![cc_lit, la_lit.negate()],
                annot: LemmaAnnotation::EqLink,
            });
        }
        self.share_numeric(tm, a);
        self.share_numeric(tm, b);
        (cc_lit, cc_term)
    }

    /// The literal of a non-numeric equality or Boolean application.
    pub fn cc_eq_literal(
        &mut self,
        tm: &mut TermManager,
        a: TermId,
        b: TermId,
    ) -> (Lit, TermId) {
        let eq_term = tm.mk_eq(a, b);
        if let Some(&lit) = self.by_term.get(&eq_term) {
            let quoted = self.atoms[&lit.var()].term;
            return (lit, quoted);
        }
        let idx = self.cc.create_eq_atom(tm, a, b);
        let var = self.cc.atoms[idx].dpll_var;
        let term = self.cc.atoms[idx].term;
        self.register_cc_pending(tm);
        let lit = Lit::positive(var);
        self.by_term.insert(eq_term, lit);
        self.share_numeric(tm, a);
        self.share_numeric(tm, b);
        (lit, term)
    }

    /// Register a numeric term that also lives in the congruence graph
    /// as shared between LA and CC.
    fn share_numeric(&mut self, tm: &TermManager, t: TermId) {
        if !tm.sorts.is_numeric(tm.sort(t)) {
            return;
        }
        if self.shared_terms.contains(&t) {
            return;
        }
        self.shared_terms.push(t);
        match tm.kind(t) {
            TermKind::Const(c) => {
                self.la.share(SharedVar {
                    term: t,
                    var: None,
                    factor: Rational::one(),
                    offset: Rational::Finite(c.clone()),
                });
            }
            _ => {
                let v = self.la_var_of(tm, t);
                self.la.share(SharedVar {
                    term: t,
                    var: Some(v),
                    factor: Rational::one(),
                    offset: Rational::zero(),
                });
            }
        }
    }

    /// Register freshly created LA atoms in the registry; returns the
    /// quoted term of the atom behind `lit_of_interest` (or of the last
    /// created atom when `None`). `src` only guides debugging.
    fn drain_la_atoms(
        &mut self,
        tm: &mut TermManager,
        lit_of_interest: Option<Lit>,
        src: TermId,
    ) -> TermId {
        let _ = src;
        let mut interesting = TermId(0);
        let pending: Vec<_> = self.la.pending_atoms.drain(..).collect();
        for atom_id in pending {
            let term = self.la.build_atom_term(tm, atom_id);
            let var = self.la.atoms.get(atom_id).dpll_var;
            self.atoms.insert(
                var,
                AtomInfo {
                    term,
                    owner: Owner::La,
                },
            );
            if lit_of_interest.map_or(true, |l| l.var() == var) {
                interesting = term;
            }
        }
        if let Some(l) = lit_of_interest {
            if let Some(info) = self.atoms.get(&l.var()) {
                interesting = info.term;
            }
        }
        interesting
    }

    fn register_cc_pending(&mut self, _tm: &mut TermManager) {
        let pending: Vec<usize> = self.cc.pending_atoms.drain(..).collect();
        for idx in pending {
            let var = self.cc.atoms[idx].dpll_var;
            let term = self.cc.atoms[idx].term;
            self.atoms.insert(
                var,
                AtomInfo {
                    term,
                    owner: Owner::Cc,
                },
            );
        }
    }

    /// Drain any atoms the theories created outside an explicit literal
    /// request (cuts, array instantiation).
    pub fn drain_new_atoms(&mut self, tm: &mut TermManager) {
        self.drain_la_atoms(tm, None, TermId(0));
        self.register_cc_pending(tm);
    }

    // --- assertion protocol ---

    /// Route an assignment to its owner.
    pub fn set_literal(&mut self, tm: &mut TermManager, lit: Lit) -> Result<Option<TheoryClause>> {
        let Some(info) = self.atoms.get(&lit.var()) else {
            return Ok(None);
        };
        match info.owner {
            Owner::Bool => Ok(None),
            Owner::La => self.la.set_literal(lit),
            Owner::Cc => Ok(self.cc.set_literal(tm, lit)),
        }
    }

    /// Undo an assignment.
    pub fn backtrack_literal(&mut self, lit: Lit) {
        let Some(info) = self.atoms.get(&lit.var()) else {
            return;
        };
        match info.owner {
            Owner::Bool => {}
            Owner::La => self.la.backtrack_literal(lit),
            Owner::Cc => self.cc.backtrack_literal(lit),
        }
    }

    /// Run the cheap per-propagation check.
    pub fn checkpoint(&mut self) -> Result<Option<TheoryClause>> {
        self.la.checkpoint()
    }

    /// Next theory-propagated literal from any component.
    pub fn propagated_literal(&mut self) -> Option<Lit> {
        if let Some(l) = self.la.propagated_literal() {
            return Some(l);
        }
        self.cc.propagated_literal()
    }

    /// Next decision suggestion.
    pub fn suggestion(&mut self) -> Option<Lit> {
        self.la.suggestion()
    }

    /// Is anything queued anywhere (clauses, propagations,
    /// suggestions)?
    pub fn has_pending(&self) -> bool {
        !self.pending_clauses.is_empty()
            || self.la.has_propagations()
            || self.la.has_suggestions()
            || self.cc.has_propagations()
    }

    /// Unit-clause explanation of a theory propagation.
    pub fn explain_propagation(&mut self, tm: &TermManager, lit: Lit) -> TheoryClause {
        let info = self.atoms.get(&lit.var()).expect("unknown propagated literal");
        match info.owner {
            Owner::La => self.la.explain_propagation(lit),
            Owner::Cc => self.cc.explain_propagation(tm, lit),
            Owner::Bool => unreachable!("boolean proxies are never theory-propagated"),
        }
    }

    /// The end-of-search check. Returns a conflict, or `None`; progress
    /// may instead appear as propagations, suggestions or pending
    /// clauses.
    pub fn final_check(&mut self, tm: &mut TermManager) -> Result<Option<TheoryClause>> {
        if let Some(c) = self.la.compute_conflict_clause()? {
            return Ok(Some(c));
        }
        // array instantiation over the current congruence graph
        let new_clauses = self.arrays.final_check(tm, &mut self.cc);
        self.register_cc_pending(tm);
        self.drain_new_atoms(tm);
        for clause in new_clauses {
            self.pending_clauses.push(PendingClause {
                lits: clause.lits.to_vec(),
                annot: clause.annot,
            });
        }
        // model-based theory combination: suggest merging shared terms
        // that ended up with equal values
        for group in self.la.shared_congruences() {
            for pair in group.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if self.cc.are_equal(a, b) {
                    continue;
                }
                debug!("suggesting shared-term merge");
                let (lit, _) = if tm.sorts.is_numeric(tm.sort(a)) {
                    self.numeric_eq_literal(tm, a, b)
                } else {
                    self.cc_eq_literal(tm, a, b)
                };
                self.la.add_suggestion(lit);
            }
        }
        Ok(None)
    }

    /// Collect the leaf values of a satisfying assignment: exact
    /// rationals for the arithmetic variables, Booleans for predicates,
    /// congruence classes for the rest.
    pub fn model_values(&mut self, tm: &TermManager) -> Vec<(TermId, crate::model::Value)> {
        use crate::model::Value;
        let mut out = Vec::new();
        for (&term, &var) in &self.la_vars {
            let value = self.la.real_value(var);
            out.push((term, Value::Num(value)));
        }
        let tt = tm.mk_true();
        let cc_terms: Vec<TermId> = self.cc.terms().collect();
        for t in cc_terms {
            if self.la_vars.contains_key(&t) {
                continue;
            }
            let sort = tm.sort(t);
            if sort == tm.sorts.bool_sort {
                let truth = self.cc.is_registered(tt) && self.cc.are_equal(t, tt);
                out.push((t, Value::Bool(truth)));
            } else if !tm.sorts.is_numeric(sort) {
                out.push((t, Value::Abstract(self.cc.class_id(t))));
            }
        }
        out
    }

    /// Open an assertion scope.
    pub fn push(&mut self) {
        self.level += 1;
        self.la.push();
    }

    /// Close an assertion scope.
    pub fn pop(&mut self) -> Result<()> {
        self.level -= 1;
        self.la.pop()
    }

    // --- proof plumbing ---

    /// Turn a theory clause into literals plus the proof leaf.
    pub fn clause_proof(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        clause: &TheoryClause,
    ) -> (Vec<Lit>, ProofId) {
        let lits: Vec<Lit> = clause.lits.to_vec();
        let terms: Vec<TermId> = lits.iter().map(|&l| self.lit_term(tm, l)).collect();
        let clause_term = tm.clause_to_term(&terms);
        let tracked: Tracked = match &clause.annot {
            LemmaAnnotation::La(coeffs) => tracker.la_lemma(clause_term, coeffs.clone()),
            LemmaAnnotation::Trichotomy => tracker.lemma(clause_term, LemmaKind::Trichotomy),
            LemmaAnnotation::EqLink => tracker.lemma(clause_term, LemmaKind::Eq),
            LemmaAnnotation::Cc(lemma) => {
                let kind = LemmaKind::Cc {
                    goal: lemma.goal,
                    paths: convert_paths(lemma),
                };
                tracker.lemma(clause_term, kind)
            }
            LemmaAnnotation::ReadOverWeakeq(lemma) => {
                let kind = LemmaKind::ReadOverWeakeq {
                    goal: lemma.goal.expect("read-over-weakeq without goal"),
                    paths: convert_paths(lemma),
                };
                tracker.lemma(clause_term, kind)
            }
            LemmaAnnotation::WeakeqExt(lemma) => {
                let kind = LemmaKind::WeakeqExt {
                    goal: lemma.goal.expect("weakeq-ext without goal"),
                    paths: convert_paths(lemma),
                };
                tracker.lemma(clause_term, kind)
            }
            LemmaAnnotation::StoreTaut => tracker.tautology(clause_term, TautRule::Store),
            LemmaAnnotation::DiffTaut => tracker.tautology(clause_term, TautRule::Diff),
        };
        (lits, tracked.proof)
    }
}

fn convert_paths(lemma: &CcLemma) -> Vec<LemmaPath> {
    lemma
        .paths
        .iter()
        .map(|p| LemmaPath {
            weak_index: p.weak_index,
            terms: p.terms.clone(),
        })
        .collect()
}
