//! The clausifier.
//!
//! Takes a compiled formula (only `not`, `or`, `ite`, binary `=`,
//! `<= 0` remain) and turns it into clauses over DPLL literals: nested
//! Boolean structure gets proxy literals with their defining
//! tautologies, atoms get their theory literals with `@intern`
//! equivalence proofs, negated disjunctions split through
//! `@split :notOr`, and every produced clause carries a proof.

use crate::compiler::Compiler;
use crate::dpll::DpllEngine;
use crate::theory::TheoryFront;
use rustc_hash::FxHashSet;
use silex_core::{Lit, Op, Result, SilexError, TermId, TermKind, TermManager};
use silex_proof::{ProofTracker, RewriteRule, SplitRule, TautRule, Tracked};

/// The clausifier with its per-session bookkeeping.
#[derive(Debug, Default)]
pub struct Clausifier {
    proxies_defined: FxHashSet<TermId>,
    ites_axiomatized: FxHashSet<TermId>,
}

impl Clausifier {
    /// A fresh clausifier.
    pub fn new() -> Self {
        Clausifier::default()
    }

    /// Compile and assert a formula.
    #[allow(clippy::too_many_arguments)]
    pub fn assert_formula(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        compiler: &mut Compiler,
        front: &mut TheoryFront,
        engine: &mut DpllEngine,
        formula: TermId,
    ) -> Result<()> {
        let compiled = compiler.compile(tm, tracker, formula)?;
        let asserted = tracker.asserted(formula);
        let root = tracker.rewrite_proof(asserted, compiled);
        self.axiomatize_term_ites(tm, tracker, front, engine, root.term)?;
        self.add_root(tm, tracker, front, engine, root)
    }

    fn add_root(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        front: &mut TheoryFront,
        engine: &mut DpllEngine,
        root: Tracked,
    ) -> Result<()> {
        let term = root.term;
        if term == tm.mk_true() {
            return Ok(());
        }
        if term == tm.mk_false() {
            engine.add_clause(&[], root.proof);
            return Ok(());
        }
        match tm.kind(term).clone() {
            TermKind::App(Op::Or, args) => {
                self.clause_from_parts(tm, tracker, front, engine, args.to_vec(), root)
            }
            TermKind::App(Op::Not, args) => {
                let inner = args[0];
                if let TermKind::App(Op::Or, disjuncts) = tm.kind(inner).clone() {
                    // a negated disjunction splits into one unit per
                    // disjunct
                    for &d in disjuncts.iter() {
                        let neg = tm.mk_not(d);
                        let split = tracker.split(root, neg, SplitRule::NotOr);
                        self.clause_from_parts(
                            tm,
                            tracker,
                            front,
                            engine,
                            vec![neg],
                            split,
                        )?;
                    }
                    Ok(())
                } else {
                    self.clause_from_parts(tm, tracker, front, engine, vec![term], root)
                }
            }
            _ => self.clause_from_parts(tm, tracker, front, engine, vec![term], root),
        }
    }

    /// Build the engine clause for a list of disjunct terms proved by
    /// `base`. Nested disjunctions are flattened first.
    fn clause_from_parts(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        front: &mut TheoryFront,
        engine: &mut DpllEngine,
        parts: Vec<TermId>,
        base: Tracked,
    ) -> Result<()> {
        let mut base = base;
        let mut parts = parts;
        if parts.len() > 1 && parts.iter().any(|&p| tm.is_app(p, &Op::Or)) {
            let mut flat = Vec::new();
            let mut stack: Vec<TermId> = parts.iter().rev().copied().collect();
            while let Some(p) = stack.pop() {
                match tm.kind(p).clone() {
                    TermKind::App(Op::Or, inner) => {
                        for &x in inner.iter().rev() {
                            stack.push(x);
                        }
                    }
                    _ => flat.push(p),
                }
            }
            let flat_term = tm.mk_or(&flat);
            let rw = tracker.rewrite(tm, base.term, flat_term, RewriteRule::Flatten);
            base = tracker.transitivity(base, rw);
            parts = flat;
        }
        let mut lits = Vec::with_capacity(parts.len());
        let mut interns = Vec::with_capacity(parts.len());
        for &p in &parts {
            let (lit, eq) = self.literal_of(tm, tracker, front, engine, p)?;
            lits.push(lit);
            interns.push(eq);
        }
        let final_tracked = if parts.len() == 1 {
            tracker.rewrite_proof(base, interns[0])
        } else {
            let refl = tracker.reflexivity(base.term);
            let cong = tracker.congruence(tm, refl, &interns);
            tracker.rewrite_proof(base, cong)
        };
        front.drain_new_atoms(tm);
        engine.add_clause(&lits, final_tracked.proof);
        Ok(())
    }

    /// The literal of a (possibly negated) disjunct, with the proof
    /// `(= part literal-term)`. Stacked negations flip the polarity per
    /// layer and the proof is lifted through each `not`.
    fn literal_of(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        front: &mut TheoryFront,
        engine: &mut DpllEngine,
        part: TermId,
    ) -> Result<(Lit, Tracked)> {
        let mut layers: Vec<TermId> = Vec::new();
        let mut cur = part;
        while let TermKind::App(Op::Not, args) = tm.kind(cur) {
            layers.push(cur);
            cur = args[0];
        }
        let (mut lit, mut eq) = self.atom_literal(tm, tracker, front, engine, cur)?;
        for &layer in layers.iter().rev() {
            lit = lit.negate();
            let refl = tracker.reflexivity(layer);
            eq = tracker.congruence(tm, refl, &[eq]);
        }
        // collapse double negations introduced by flipped atoms, so the
        // proved term matches the literal's canonical term
        loop {
            let TermKind::App(Op::Not, outer) = tm.kind(eq.term) else {
                break;
            };
            let inner = outer[0];
            let TermKind::App(Op::Not, inner_args) = tm.kind(inner) else {
                break;
            };
            let target = inner_args[0];
            let rw = tracker.rewrite(tm, eq.term, target, RewriteRule::NotSimp);
            eq = tracker.transitivity(eq, rw);
        }
        Ok((lit, eq))
    }

    /// The literal of an atom or proxy term with its `@intern` proof.
    fn atom_literal(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        front: &mut TheoryFront,
        engine: &mut DpllEngine,
        atom: TermId,
    ) -> Result<(Lit, Tracked)> {
        match tm.kind(atom).clone() {
            TermKind::Quoted(inner, _) => {
                // an already-internalized literal (from proxy clauses)
                let lit = front
                    .literal_for(inner)
                    .ok_or(SilexError::Internal("quoted term without literal"))?;
                Ok((lit, tracker.reflexivity(atom)))
            }
            TermKind::App(Op::Le | Op::Lt, _) => {
                let (lit, quoted) = front.arith_literal(tm, atom)?;
                let eq = tracker.intern(tm, atom, quoted);
                Ok((lit, eq))
            }
            TermKind::App(Op::Eq, args) => {
                let (a, b) = (args[0], args[1]);
                if tm.sort(a) == tm.sorts.bool_sort {
                    // a Boolean equality becomes a proxy literal
                    return self.proxy_literal(tm, tracker, front, engine, atom);
                }
                let (lit, quoted) = if tm.sorts.is_numeric(tm.sort(a)) {
                    front.numeric_eq_literal(tm, a, b)
                } else {
                    front.cc_eq_literal(tm, a, b)
                };
                let eq = tracker.intern(tm, atom, quoted);
                Ok((lit, eq))
            }
            TermKind::App(Op::Or | Op::Ite, _) => {
                self.proxy_literal(tm, tracker, front, engine, atom)
            }
            TermKind::App(Op::Func(_) | Op::Select, _) => {
                // an uninterpreted predicate is the equality with true
                let tt = tm.mk_true();
                let (lit, quoted) = front.cc_eq_literal(tm, atom, tt);
                let eq = tracker.intern(tm, atom, quoted);
                Ok((lit, eq))
            }
            _ => Err(SilexError::Internal("unclausifiable literal")),
        }
    }

    /// A proxy literal for nested Boolean structure, with its defining
    /// tautologies added on first sight.
    fn proxy_literal(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        front: &mut TheoryFront,
        engine: &mut DpllEngine,
        term: TermId,
    ) -> Result<(Lit, Tracked)> {
        let lit = front.register_proxy(tm, term);
        let quoted = front.lit_term(tm, lit);
        let eq = tracker.intern(tm, term, quoted);
        if !self.proxies_defined.insert(term) {
            return Ok((lit, eq));
        }
        let not_quoted = tm.mk_not(quoted);
        match tm.kind(term).clone() {
            TermKind::App(Op::Or, args) => {
                // (or (not q) p1 ... pn)
                let mut pos_parts = vec![not_quoted];
                pos_parts.extend(args.iter().copied());
                let pos_term = tm.mk_or(&pos_parts);
                let pos = tracker.tautology(pos_term, TautRule::OrPos);
                self.clause_from_parts(tm, tracker, front, engine, pos_parts, pos)?;
                // (or q (not pi)) per disjunct
                for &p in args.iter() {
                    let not_p = tm.mk_not(p);
                    let neg_parts = vec![quoted, not_p];
                    let neg_term = tm.mk_or(&neg_parts);
                    let neg = tracker.tautology(neg_term, TautRule::OrNeg);
                    self.clause_from_parts(tm, tracker, front, engine, neg_parts, neg)?;
                }
            }
            TermKind::App(Op::Ite, args) => {
                let (c, t, e) = (args[0], args[1], args[2]);
                let not_c = tm.mk_not(c);
                let not_t = tm.mk_not(t);
                let not_e = tm.mk_not(e);
                let schemas = [
                    (TautRule::ItePos1, vec![not_quoted, not_c, t]),
                    (TautRule::ItePos2, vec![not_quoted, c, e]),
                    (TautRule::IteNeg1, vec![quoted, not_c, not_t]),
                    (TautRule::IteNeg2, vec![quoted, c, not_e]),
                ];
                for (rule, parts) in schemas {
                    let clause_term = tm.mk_or(&parts);
                    let taut = tracker.tautology(clause_term, rule);
                    self.clause_from_parts(tm, tracker, front, engine, parts, taut)?;
                }
            }
            TermKind::App(Op::Eq, args) => {
                let (a, b) = (args[0], args[1]);
                let not_a = tm.mk_not(a);
                let not_b = tm.mk_not(b);
                let schemas = [
                    (TautRule::EqPos1, vec![not_quoted, a, not_b]),
                    (TautRule::EqPos2, vec![not_quoted, not_a, b]),
                    (TautRule::EqNeg1, vec![quoted, a, b]),
                    (TautRule::EqNeg2, vec![quoted, not_a, not_b]),
                ];
                for (rule, parts) in schemas {
                    let clause_term = tm.mk_or(&parts);
                    let taut = tracker.tautology(clause_term, rule);
                    self.clause_from_parts(tm, tracker, front, engine, parts, taut)?;
                }
            }
            _ => return Err(SilexError::Internal("proxy for unexpected term")),
        }
        Ok((lit, eq))
    }

    /// Add the `:termITE` axioms for every term-level ite in the
    /// formula.
    fn axiomatize_term_ites(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        front: &mut TheoryFront,
        engine: &mut DpllEngine,
        root: TermId,
    ) -> Result<()> {
        let mut stack = vec![root];
        let mut visited = FxHashSet::default();
        while let Some(t) = stack.pop() {
            if !visited.insert(t) {
                continue;
            }
            match tm.kind(t).clone() {
                TermKind::App(op, args) => {
                    for &a in args.iter() {
                        stack.push(a);
                    }
                    if op == Op::Ite && tm.sort(t) != tm.sorts.bool_sort {
                        if !self.ites_axiomatized.insert(t) {
                            continue;
                        }
                        let (c, then, els) = (args[0], args[1], args[2]);
                        let not_c = tm.mk_not(c);
                        let then_eq = tm.mk_eq(t, then);
                        let els_eq = tm.mk_eq(t, els);
                        for (cond_lit, eq) in [(not_c, then_eq), (c, els_eq)] {
                            let parts = vec![cond_lit, eq];
                            let clause_term = tm.mk_or(&parts);
                            let taut = tracker.tautology(clause_term, TautRule::TermIte);
                            self.clause_from_parts(
                                tm,
                                tracker,
                                front,
                                engine,
                                parts,
                                taut,
                            )?;
                        }
                    }
                }
                TermKind::Quoted(inner, _) => stack.push(inner),
                _ => {}
            }
        }
        Ok(())
    }
}
