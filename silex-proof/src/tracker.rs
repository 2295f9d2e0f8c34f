//! The proof producer.
//!
//! Every intermediate formula of the compiler travels as a [`Tracked`]
//! pair of the current term and the proof of its equivalence to (or
//! derivation from) the original. Reflexivity proofs are elided when
//! combined, so untouched subterms leave no trace in the final proof.

use crate::node::{LemmaKind, ProofArena, ProofId, ProofNode};
use crate::rules::{RewriteRule, SplitRule, TautRule};
use silex_core::{TermId, TermManager, TermKind};
use silex_math::Rational;

/// A term with the proof that produced it.
#[derive(Debug, Clone, Copy)]
pub struct Tracked {
    /// The current (rewritten) term.
    pub term: TermId,
    /// The proof annotation.
    pub proof: ProofId,
}

/// Builds proof nodes while the compiler and clausifier transform input.
#[derive(Debug, Default)]
pub struct ProofTracker {
    /// The node arena; the checker walks it after `get-proof`.
    pub arena: ProofArena,
}

impl ProofTracker {
    /// A fresh tracker.
    pub fn new() -> Self {
        ProofTracker::default()
    }

    fn is_refl(&self, p: ProofId) -> bool {
        matches!(self.arena.get(p), ProofNode::Refl(_))
    }

    /// `(@refl t)` — `t` proved equal to itself.
    pub fn reflexivity(&mut self, t: TermId) -> Tracked {
        let proof = self.arena.alloc(ProofNode::Refl(t));
        Tracked { term: t, proof }
    }

    /// `(@asserted f)` — an input assertion.
    pub fn asserted(&mut self, f: TermId) -> Tracked {
        let proof = self.arena.alloc(ProofNode::Asserted(f));
        Tracked { term: f, proof }
    }

    /// A rewrite axiom `(= orig res)` named by `rule`; collapses to
    /// reflexivity when nothing changed.
    pub fn rewrite(
        &mut self,
        tm: &mut TermManager,
        orig: TermId,
        res: TermId,
        rule: RewriteRule,
    ) -> Tracked {
        if orig == res {
            return self.reflexivity(res);
        }
        let equality = tm.mk_eq(orig, res);
        let proof = self.arena.alloc(ProofNode::Rewrite { rule, equality });
        Tracked { term: res, proof }
    }

    /// An `@intern` equality between an atom and its quoted normal form.
    pub fn intern(&mut self, tm: &mut TermManager, orig: TermId, res: TermId) -> Tracked {
        if orig == res {
            return self.reflexivity(res);
        }
        let equality = tm.mk_eq(orig, res);
        let proof = self.arena.alloc(ProofNode::Intern { equality });
        Tracked { term: res, proof }
    }

    /// Chain two equivalence proofs. Reflexivity on either side is
    /// elided.
    pub fn transitivity(&mut self, first: Tracked, second: Tracked) -> Tracked {
        if self.is_refl(first.proof) {
            return second;
        }
        if self.is_refl(second.proof) {
            return Tracked {
                term: second.term,
                proof: first.proof,
            };
        }
        let proof = self
            .arena
            .alloc(ProofNode::Trans(Box::new([first.proof, second.proof])));
        Tracked {
            term: second.term,
            proof,
        }
    }

    /// Rewrite the arguments of an application: `a` proves
    /// `(= lhs (f old_args))`, `args[i]` proves `(= old_i new_i)`.
    /// Produces `(= lhs (f new_args))`.
    pub fn congruence(&mut self, tm: &mut TermManager, a: Tracked, args: &[Tracked]) -> Tracked {
        let TermKind::App(op, _) = tm.kind(a.term) else {
            debug_assert!(false, "congruence on non-application");
            return a;
        };
        let op = op.clone();
        let new_args: Vec<TermId> = args.iter().map(|t| t.term).collect();
        let new_term = tm.mk_app(op, &new_args);
        let mut parts = vec![a.proof];
        for arg in args {
            if !self.is_refl(arg.proof) {
                parts.push(arg.proof);
            }
        }
        if parts.len() == 1 {
            return Tracked {
                term: new_term,
                proof: a.proof,
            };
        }
        let proof = self.arena.alloc(ProofNode::Cong(parts.into_boxed_slice()));
        Tracked {
            term: new_term,
            proof,
        }
    }

    /// Combine the proof of a formula with the rewrite proof of its
    /// simplification: `(@eq p_f p_rewrite)` proves the simplified form.
    pub fn rewrite_proof(&mut self, asserted: Tracked, simplified: Tracked) -> Tracked {
        if self.is_refl(simplified.proof) {
            return Tracked {
                term: simplified.term,
                proof: asserted.proof,
            };
        }
        let proof = self
            .arena
            .alloc(ProofNode::Eq(asserted.proof, simplified.proof));
        Tracked {
            term: simplified.term,
            proof,
        }
    }

    /// A tautology leaf proving `clause`.
    pub fn tautology(&mut self, clause: TermId, rule: TautRule) -> Tracked {
        let proof = self.arena.alloc(ProofNode::Taut { rule, clause });
        Tracked {
            term: clause,
            proof,
        }
    }

    /// A theory lemma leaf proving `clause`.
    pub fn lemma(&mut self, clause: TermId, kind: LemmaKind) -> Tracked {
        let proof = self.arena.alloc(ProofNode::Lemma { kind, clause });
        Tracked {
            term: clause,
            proof,
        }
    }

    /// An `:LA` lemma leaf.
    pub fn la_lemma(&mut self, clause: TermId, coeffs: Vec<Rational>) -> Tracked {
        self.lemma(clause, LemmaKind::La(coeffs))
    }

    /// `(@split (! p :rule) result)`.
    pub fn split(&mut self, input: Tracked, result: TermId, rule: SplitRule) -> Tracked {
        let proof = self.arena.alloc(ProofNode::Split {
            rule,
            sub: input.proof,
            result,
        });
        Tracked {
            term: result,
            proof,
        }
    }

    /// `(@clause p expected)` — fix the literal order of a proved
    /// clause.
    pub fn clause(&mut self, input: Tracked, expected: TermId) -> Tracked {
        if input.term == expected {
            return input;
        }
        let proof = self.arena.alloc(ProofNode::Clause {
            sub: input.proof,
            clause: expected,
        });
        Tracked {
            term: expected,
            proof,
        }
    }

    /// `(@res main (! side :pivot l) ...)`.
    pub fn resolution(
        &mut self,
        main: ProofId,
        steps: Vec<(TermId, ProofId)>,
    ) -> ProofId {
        if steps.is_empty() {
            return main;
        }
        self.arena.alloc(ProofNode::Res {
            main,
            steps: steps.into_boxed_slice(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitivity_elides_reflexivity() {
        let mut tm = TermManager::new();
        let mut tracker = ProofTracker::new();
        let p = tm.declare_const("p", tm.sorts.bool_sort);
        let q = tm.declare_const("q", tm.sorts.bool_sort);
        let refl = tracker.reflexivity(p);
        let rw = tracker.rewrite(&mut tm, p, q, RewriteRule::NotSimp);
        let chained = tracker.transitivity(refl, rw);
        assert_eq!(chained.proof, rw.proof);
        let refl_q = tracker.reflexivity(q);
        let chained2 = tracker.transitivity(rw, refl_q);
        assert_eq!(chained2.proof, rw.proof);
        assert_eq!(chained2.term, q);
    }

    #[test]
    fn test_congruence_skips_unchanged_args() {
        let mut tm = TermManager::new();
        let mut tracker = ProofTracker::new();
        let int = tm.sorts.int_sort;
        let f = tm.declare_fun("f", vec![int, int], int);
        let a = tm.declare_const("a", int);
        let b = tm.declare_const("b", int);
        let fab = tm.mk_app(silex_core::Op::Func(f), &[a, b]);
        let start = tracker.reflexivity(fab);
        let arg0 = tracker.reflexivity(a);
        let arg1 = tracker.rewrite(&mut tm, b, a, RewriteRule::CanonicalSum);
        let result = tracker.congruence(&mut tm, start, &[arg0, arg1]);
        let faa = tm.mk_app(silex_core::Op::Func(f), &[a, a]);
        assert_eq!(result.term, faa);
        match tracker.arena.get(result.proof) {
            ProofNode::Cong(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected congruence, got {:?}", other),
        }
    }
}
