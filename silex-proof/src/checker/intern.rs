//! `@intern` verification: the right side must be the internal (quoted)
//! form of the left-side atom, including `<= 0` normalization, integer
//! tightening when a `<=` is negated, gcd normalization, and constant
//! flooring on integer atoms.

use super::ProofChecker;
use num_rational::BigRational;
use num_traits::{One, Zero};
use silex_core::{Op, SmtAffineTerm, TermId, TermKind};

impl ProofChecker<'_> {
    pub(crate) fn check_intern_node(&mut self, equality: TermId) {
        let Some((lhs, rhs)) = self.eq_sides(equality) else {
            self.report_error(format!(
                "expected equality: {}",
                self.tm.display(equality)
            ));
            return;
        };
        if self.tm.sort(lhs) != self.tm.sorts.bool_sort || !self.check_intern(lhs, rhs) {
            self.report_error(format!(
                "malformed intern application: {}",
                self.tm.display(equality)
            ));
        }
    }

    fn check_intern(&mut self, lhs: TermId, mut rhs: TermId) -> bool {
        let TermKind::App(op, _) = self.tm.kind(lhs).clone() else {
            return false;
        };
        // uninterpreted predicates become equalities with true
        if let Op::Func(_) = op {
            let args_empty = self
                .tm
                .app_args(lhs, &op)
                .map_or(true, |a| a.is_empty());
            if args_empty {
                // boolean constants are not quoted
                return rhs == lhs;
            }
            let inner = self.unquote_opt(rhs);
            let Some((l, r)) = self.eq_sides(inner) else {
                return false;
            };
            return l == lhs && r == self.tm.mk_true();
        }
        if op == Op::Select {
            let inner = self.unquote_opt(rhs);
            let Some((l, r)) = self.eq_sides(inner) else {
                return false;
            };
            return l == lhs && r == self.tm.mk_true();
        }

        if op == Op::Le {
            let params = self.tm.app_args(lhs, &Op::Le).expect("checked op");
            let (p0, p1) = (params[0], params[1]);
            let is_int = self.tm.sort(p0) == self.tm.sorts.int_sort;
            if !self.tm.is_zero(p1) {
                return false;
            }
            let mut affine = SmtAffineTerm::from_term(self.tm, p0);
            // (<= a 0) may be internalized negated: (not (< (- a) 0)),
            // with integer tightening adding one
            let is_negated = self.tm.is_app(rhs, &Op::Not);
            let mut is_strict = false;
            if is_negated {
                rhs = self.tm.negate(rhs);
                affine = affine.negate();
                if is_int {
                    affine = affine.add_constant(&BigRational::one());
                } else {
                    is_strict = true;
                }
            }
            let inner = self.unquote(rhs);
            let expected_op = if is_strict { Op::Lt } else { Op::Le };
            let Some(inner_args) = self.tm.app_args(inner, &expected_op) else {
                return false;
            };
            let (q0, q1) = (inner_args[0], inner_args[1]);
            // normalize coefficients, round the constant for integers
            affine = affine.normalize_gcd();
            if is_int {
                let c = affine.constant_part().clone();
                let frac = &c - c.floor();
                affine = affine.add_constant(&-frac);
            }
            return SmtAffineTerm::from_term(self.tm, q0) == affine && self.tm.is_zero(q1);
        }

        if op == Op::Eq && self.tm.sort(self.first_arg(lhs)) != self.tm.sorts.bool_sort {
            let inner = self.unquote(rhs);
            let Some((l0, l1)) = self.eq_sides(lhs) else {
                return false;
            };
            let Some((r0, r1)) = self.eq_sides(inner) else {
                return false;
            };
            if lhs == inner || (l0 == r1 && l1 == r0) {
                return true;
            }
            if !self.tm.sorts.is_numeric(self.tm.sort(l0)) {
                return false;
            }
            let lhs_affine = SmtAffineTerm::from_term(self.tm, l0)
                .add(&SmtAffineTerm::from_term(self.tm, l1).negate());
            let rhs_affine = SmtAffineTerm::from_term(self.tm, r0)
                .add(&SmtAffineTerm::from_term(self.tm, r1).negate());
            return lhs_affine.matches_up_to_sign(&rhs_affine);
        }

        // auxiliary proxy literals keep their shape under the quote
        if matches!(op, Op::Ite | Op::Or | Op::Eq) {
            let inner = self.unquote(rhs);
            return lhs == inner;
        }
        false
    }

    fn first_arg(&self, t: TermId) -> TermId {
        match self.tm.kind(t) {
            TermKind::App(_, args) if !args.is_empty() => args[0],
            _ => t,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::node::ProofArena;
    use crate::ProofChecker;
    use num_rational::BigRational;
    use silex_core::{Op, QuoteKind, TermManager};

    #[test]
    fn test_intern_integer_tightening() {
        // (not (<= x 0)) internalizes to (<= (- 1 x) 0) on integers:
        // the negation flips the affine form and tightens by one.
        let mut tm = TermManager::new();
        let x = tm.declare_const("x", tm.sorts.int_sort);
        let zero = tm.mk_int(0);
        let le = tm.mk_le(x, zero);
        // internal form of the negation: -x + 1 <= 0
        let minus_one = BigRational::from_integer((-1).into());
        let int = tm.sorts.int_sort;
        let neg_x = silex_core::SmtAffineTerm::from_summand(minus_one, x, int)
            .add_constant(&BigRational::from_integer(1.into()));
        let lhs_term = neg_x.to_term(&mut tm);
        let inner = tm.mk_le(lhs_term, zero);
        let quoted = tm.mk_quoted(inner, QuoteKind::Plain);
        let not_quoted = tm.mk_not(quoted);
        let equality = tm.mk_eq(le, not_quoted);

        let arena = ProofArena::new();
        let mut checker = ProofChecker::new(&mut tm, &arena, &[]);
        checker.check_intern_node(equality);
        assert!(checker.errors().is_empty(), "{:?}", checker.errors());
    }

    #[test]
    fn test_intern_rejects_wrong_constant() {
        let mut tm = TermManager::new();
        let x = tm.declare_const("x", tm.sorts.int_sort);
        let zero = tm.mk_int(0);
        let le = tm.mk_le(x, zero);
        // wrong internal form: (<= x 0) quoted as (<= (+ x 1) 0)
        let one = tm.mk_int(1);
        let xp1 = tm.mk_app(Op::Add, &[x, one]);
        let inner = tm.mk_le(xp1, zero);
        let quoted = tm.mk_quoted(inner, QuoteKind::Plain);
        let equality = tm.mk_eq(le, quoted);

        let arena = ProofArena::new();
        let mut checker = ProofChecker::new(&mut tm, &arena, &[]);
        checker.check_intern_node(equality);
        assert!(!checker.errors().is_empty());
    }
}
