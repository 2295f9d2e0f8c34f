//! Lazy instantiation of the array axioms.
//!
//! Arrays live inside the congruence closure; this module walks the
//! congruence graph at final check and instantiates, once per witness:
//! - the `:store` tautology `select(store(a,i,v), i) = v`,
//! - the `:read-over-weakeq` lemma
//!   `i = j \/ select(store(a,i,v), j) = select(a, j)`,
//! - the `:diff` extensionality tautology
//!   `a = b \/ select(a, @diff(a,b)) != select(b, @diff(a,b))`
//!   for array pairs asserted disequal.
//!
//! The freshly created select terms feed back into the closure, so
//! repeated final checks unfold store chains step by step until nothing
//! new appears.

use crate::euf::CcSolver;
use crate::{CcLemma, CcPath, LemmaAnnotation, TheoryClause};
use rustc_hash::FxHashSet;
use silex_core::{Lit, Op, TermId, TermKind, TermManager};
use tracing::debug;

/// The array axiom instantiator.
#[derive(Debug, Default)]
pub struct ArraySolver {
    store_taut_seen: FxHashSet<TermId>,
    row_seen: FxHashSet<(TermId, TermId)>,
    ext_seen: FxHashSet<(TermId, TermId)>,
}

impl ArraySolver {
    /// A fresh instantiator.
    pub fn new() -> Self {
        ArraySolver::default()
    }

    /// Instantiate all missing axioms over the current congruence graph.
    /// Returns the new clauses; an empty result means arrays are stable.
    pub fn final_check(
        &mut self,
        tm: &mut TermManager,
        cc: &mut CcSolver,
    ) -> Vec<TheoryClause> {
        let mut clauses = Vec::new();
        let terms: Vec<TermId> = cc.terms().collect();

        // read-over-write at the store index
        for &t in &terms {
            if let TermKind::App(Op::Store, args) = tm.kind(t) {
                let (_a, i, v) = (args[0], args[1], args[2]);
                if self.store_taut_seen.insert(t) {
                    let sel = tm.mk_select(t, i);
                    let atom = cc.create_eq_atom(tm, sel, v);
                    let lit = Lit::positive(cc.atoms[atom].dpll_var);
                    debug!("instantiating select-over-store tautology");
                    clauses.push(TheoryClause::new([lit], LemmaAnnotation::StoreTaut));
                }
            }
        }

        // read-over-write across a disequal index
        for &t in &terms {
            let TermKind::App(Op::Select, sel_args) = tm.kind(t) else {
                continue;
            };
            let (x, j) = (sel_args[0], sel_args[1]);
            for s in cc.class_of(x) {
                let TermKind::App(Op::Store, store_args) = tm.kind(s) else {
                    continue;
                };
                let (a, i, _v) = (store_args[0], store_args[1], store_args[2]);
                if i == j {
                    continue;
                }
                if !self.row_seen.insert((s, j)) {
                    continue;
                }
                let sel_s = tm.mk_select(s, j);
                let sel_a = tm.mk_select(a, j);
                let idx_atom = cc.create_eq_atom(tm, i, j);
                let val_atom = cc.create_eq_atom(tm, sel_s, sel_a);
                let idx_lit = Lit::positive(cc.atoms[idx_atom].dpll_var);
                let val_lit = Lit::positive(cc.atoms[val_atom].dpll_var);
                let goal = tm.mk_eq(sel_s, sel_a);
                debug!("instantiating read-over-weakeq lemma");
                clauses.push(TheoryClause::new(
                    [idx_lit, val_lit],
                    LemmaAnnotation::ReadOverWeakeq(CcLemma {
                        goal: Some(goal),
                        paths: vec![CcPath {
                            weak_index: Some(j),
                            terms: vec![s, a],
                        }],
                    }),
                ));
            }
        }

        // extensionality for arrays asserted disequal
        for (a, b) in cc.asserted_diseqs() {
            if !tm.sorts.is_array(tm.sort(a)) {
                continue;
            }
            let key = if a <= b { (a, b) } else { (b, a) };
            if !self.ext_seen.insert(key) {
                continue;
            }
            let diff = tm.mk_app(Op::Diff, &[a, b]);
            let sel_a = tm.mk_select(a, diff);
            let sel_b = tm.mk_select(b, diff);
            let arr_atom = cc.create_eq_atom(tm, a, b);
            let sel_atom = cc.create_eq_atom(tm, sel_a, sel_b);
            let arr_lit = Lit::positive(cc.atoms[arr_atom].dpll_var);
            let sel_lit = Lit::positive(cc.atoms[sel_atom].dpll_var);
            debug!("instantiating extensionality witness");
            clauses.push(TheoryClause::new(
                [arr_lit, sel_lit.negate()],
                LemmaAnnotation::DiffTaut,
            ));
        }
        clauses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VarPool;

    #[test]
    fn test_store_instantiation() {
        let mut tm = TermManager::new();
        let int = tm.sorts.int_sort;
        let arr_sort = tm.sorts.array(int, int);
        let a = tm.declare_const("a", arr_sort);
        let i = tm.declare_const("i", int);
        let v = tm.declare_const("v", int);
        let st = tm.mk_store(a, i, v);
        let j = tm.declare_const("j", int);
        let sel = tm.mk_select(st, j);

        let mut cc = CcSolver::new(VarPool::new());
        cc.register_term(&tm, sel);

        let mut arrays = ArraySolver::new();
        let clauses = arrays.final_check(&mut tm, &mut cc);
        // one :store tautology for the store term, one read-over-weakeq
        // for the (store, j) pair
        assert_eq!(clauses.len(), 2);
        assert!(clauses
            .iter()
            .any(|c| matches!(c.annot, LemmaAnnotation::StoreTaut)));
        assert!(clauses
            .iter()
            .any(|c| matches!(c.annot, LemmaAnnotation::ReadOverWeakeq(_))));
        // a second round instantiates nothing new for the same witnesses
        let again = arrays.final_check(&mut tm, &mut cc);
        assert!(again
            .iter()
            .all(|c| !matches!(c.annot, LemmaAnnotation::StoreTaut)));
    }
}
