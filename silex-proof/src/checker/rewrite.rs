//! Rewrite axiom verification.
//!
//! Every `@rewrite` node carries an equality `(= lhs rhs)` and a rule
//! name; the checker re-derives the right side by structural pattern
//! matching and, for the arithmetic rules, by normalizing both sides to
//! the canonical affine representation.

use super::ProofChecker;
use crate::rules::RewriteRule;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use rustc_hash::FxHashMap;
use silex_core::{Op, SmtAffineTerm, TermId, TermKind};

/// `div` rounding toward negative infinity for positive divisors and
/// toward positive infinity for negative ones (SMT-LIB semantics).
pub(crate) fn const_div(c0: &BigRational, c1: &BigRational) -> BigRational {
    let div = c0 / c1;
    if c1.is_negative() {
        div.ceil()
    } else {
        div.floor()
    }
}

impl ProofChecker<'_> {
    pub(crate) fn check_rewrite_node(&mut self, rule: RewriteRule, equality: TermId) {
        let Some((lhs, rhs)) = self.eq_sides(equality) else {
            self.report_error("rewrite rule is not a binary equality".to_string());
            return;
        };
        let okay = self.check_rewrite(rule, lhs, rhs);
        if !okay {
            self.report_error(format!(
                "malformed/unknown @rewrite rule {} {}",
                rule.key(),
                self.tm.display(equality)
            ));
        }
    }

    pub(crate) fn check_rewrite(&mut self, rule: RewriteRule, lhs: TermId, rhs: TermId) -> bool {
        match rule {
            RewriteRule::Expand => self.rw_expand(lhs, rhs),
            RewriteRule::ExpandDef => self.rw_expand_def(lhs, rhs),
            RewriteRule::TrueNotFalse => self.rw_true_not_false(lhs, rhs),
            RewriteRule::ConstDiff => self.rw_const_diff(lhs, rhs),
            RewriteRule::EqTrue => self.rw_eq_true_false(true, lhs, rhs),
            RewriteRule::EqFalse => self.rw_eq_true_false(false, lhs, rhs),
            RewriteRule::EqSimp | RewriteRule::EqSame => self.rw_eq_simp(rule, lhs, rhs),
            RewriteRule::EqBinary => self.rw_eq_binary(lhs, rhs),
            RewriteRule::DistinctBool
            | RewriteRule::DistinctSame
            | RewriteRule::DistinctNeg
            | RewriteRule::DistinctTrue
            | RewriteRule::DistinctFalse
            | RewriteRule::DistinctBoolEq
            | RewriteRule::DistinctBinary => self.rw_distinct(rule, lhs, rhs),
            RewriteRule::NotSimp => self.rw_not(lhs, rhs),
            RewriteRule::OrSimp => self.rw_or_simp(lhs, rhs),
            RewriteRule::OrTaut => self.rw_or_taut(lhs, rhs),
            RewriteRule::IteTrue
            | RewriteRule::IteFalse
            | RewriteRule::IteSame
            | RewriteRule::IteBool1
            | RewriteRule::IteBool2
            | RewriteRule::IteBool3
            | RewriteRule::IteBool4
            | RewriteRule::IteBool5
            | RewriteRule::IteBool6 => self.rw_ite(rule, lhs, rhs),
            RewriteRule::AndToOr => self.rw_and_to_or(lhs, rhs),
            RewriteRule::XorToDistinct => self.rw_xor_to_distinct(lhs, rhs),
            RewriteRule::ImpToOr => self.rw_imp_to_or(lhs, rhs),
            RewriteRule::Strip => self.rw_strip(lhs, rhs),
            RewriteRule::CanonicalSum => self.rw_canonical_sum(lhs, rhs),
            RewriteRule::LeqToLeq0
            | RewriteRule::LtToLeq0
            | RewriteRule::GeqToLeq0
            | RewriteRule::GtToLeq0 => self.rw_to_leq0(rule, lhs, rhs),
            RewriteRule::LeqTrue | RewriteRule::LeqFalse => self.rw_leq(rule, lhs, rhs),
            RewriteRule::Desugar => self.rw_desugar(lhs, rhs),
            RewriteRule::Divisible => self.rw_divisible(lhs, rhs),
            RewriteRule::DivOne => self.rw_div_const(lhs, rhs, DivKind::One),
            RewriteRule::DivMinusOne => self.rw_div_const(lhs, rhs, DivKind::MinusOne),
            RewriteRule::DivConst => self.rw_div_const(lhs, rhs, DivKind::Const),
            RewriteRule::ModuloOne => self.rw_mod_const(lhs, rhs, DivKind::One),
            RewriteRule::ModuloMinusOne => self.rw_mod_const(lhs, rhs, DivKind::MinusOne),
            RewriteRule::ModuloConst => self.rw_mod_const(lhs, rhs, DivKind::Const),
            RewriteRule::Modulo => self.rw_modulo(lhs, rhs),
            RewriteRule::ToInt => self.rw_to_int(lhs, rhs),
            RewriteRule::ToReal => self.rw_canonical_sum(lhs, rhs),
            RewriteRule::StoreOverStore => self.rw_store_over_store(lhs, rhs),
            RewriteRule::SelectOverStore => self.rw_select_over_store(lhs, rhs),
            RewriteRule::Flatten => self.rw_flatten(lhs, rhs),
            RewriteRule::StoreRewrite => self.rw_store_rewrite(lhs, rhs),
        }
    }

    fn args_of(&self, t: TermId, op: &Op) -> Option<Vec<TermId>> {
        self.tm.app_args(t, op).map(|a| a.to_vec())
    }

    fn affine(&self, t: TermId) -> SmtAffineTerm {
        SmtAffineTerm::from_term(self.tm, t)
    }

    /// Binarize a chainable comparison, a right-associative implication
    /// or a left-associative subtraction/division chain.
    fn rw_expand(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let TermKind::App(op, params) = self.tm.kind(lhs).clone() else {
            return false;
        };
        let params: Vec<TermId> = params.to_vec();
        if params.len() < 3 {
            return false;
        }
        match op {
            // chainable comparisons become a conjunction of pairs
            Op::Le | Op::Lt | Op::Ge | Op::Gt => {
                let Some(conjs) = self.args_of(rhs, &Op::And) else {
                    return false;
                };
                if conjs.len() + 1 != params.len() {
                    return false;
                }
                for (i, &c) in conjs.iter().enumerate() {
                    let expected = self.tm.mk_app(op.clone(), &[params[i], params[i + 1]]);
                    if c != expected {
                        return false;
                    }
                }
                true
            }
            // left-associative
            Op::Sub | Op::Divide | Op::IntDiv => {
                let mut right = rhs;
                for i in (1..params.len()).rev() {
                    let Some(bin) = self.args_of(right, &op) else {
                        return false;
                    };
                    if bin.len() != 2 || bin[1] != params[i] {
                        return false;
                    }
                    right = bin[0];
                }
                right == params[0]
            }
            // right-associative
            Op::Implies => {
                let mut right = rhs;
                for i in 0..params.len() - 1 {
                    let Some(bin) = self.args_of(right, &Op::Implies) else {
                        return false;
                    };
                    if bin.len() != 2 || bin[0] != params[i] {
                        return false;
                    }
                    right = bin[1];
                }
                right == params[params.len() - 1]
            }
            _ => false,
        }
    }

    /// A defined function application expands to its body with the
    /// actual arguments substituted for the formals.
    fn rw_expand_def(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let TermKind::App(Op::Func(f), args) = self.tm.kind(lhs).clone() else {
            return false;
        };
        let (formals, body) = match self.tm.func(f).definition.as_ref() {
            Some(def) => (def.formals.to_vec(), def.body),
            None => return false,
        };
        if formals.len() != args.len() {
            return false;
        }
        let mut map = FxHashMap::default();
        for (&formal, &actual) in formals.iter().zip(args.iter()) {
            map.insert(formal, actual);
        }
        rhs == self.tm.substitute(body, &map)
    }

    fn rw_true_not_false(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let Some(params) = self.args_of(lhs, &Op::Eq) else {
            return false;
        };
        if rhs != self.tm.mk_false() {
            return false;
        }
        let t = self.tm.mk_true();
        let f = self.tm.mk_false();
        params.contains(&t) && params.contains(&f)
    }

    fn rw_const_diff(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let Some(params) = self.args_of(lhs, &Op::Eq) else {
            return false;
        };
        if rhs != self.tm.mk_false() || !self.tm.sorts.is_numeric(self.tm.sort(params[0])) {
            return false;
        }
        let mut last: Option<BigRational> = None;
        for t in params {
            let value = self.affine(t);
            if value.is_constant() {
                match &last {
                    None => last = Some(value.constant_part().clone()),
                    Some(prev) => {
                        if prev != value.constant_part() {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }

    fn rw_eq_true_false(&mut self, true_case: bool, lhs: TermId, rhs: TermId) -> bool {
        let Some(params) = self.args_of(lhs, &Op::Eq) else {
            return false;
        };
        let marker = if true_case {
            self.tm.mk_true()
        } else {
            self.tm.mk_false()
        };
        let mut found = false;
        let mut args: Vec<TermId> = Vec::new();
        for t in params {
            if t == marker {
                found = true;
            } else if !args.contains(&t) {
                args.push(t);
            }
        }
        if !found {
            return false;
        }
        if args.len() == 1 {
            // (= true x) --> x, (= false x) --> (not x)
            let x = args[0];
            return if true_case {
                rhs == x
            } else {
                rhs == self.tm.mk_not(x)
            };
        }
        if !self.tm.is_app(rhs, &Op::Not) {
            return false;
        }
        let inner = self.tm.negate(rhs);
        let Some(rhs_args) = self.args_of(inner, &Op::Or) else {
            return false;
        };
        if rhs_args.len() != args.len() {
            return false;
        }
        args.iter().zip(rhs_args).all(|(&a, r)| {
            if true_case {
                r == self.tm.mk_not(a)
            } else {
                r == a
            }
        })
    }

    fn rw_eq_simp(&mut self, rule: RewriteRule, lhs: TermId, rhs: TermId) -> bool {
        let Some(params) = self.args_of(lhs, &Op::Eq) else {
            return false;
        };
        let mut args: Vec<TermId> = Vec::new();
        for t in params {
            if !args.contains(&t) {
                args.push(t);
            }
        }
        if args.len() == 1 {
            return rule == RewriteRule::EqSame && rhs == self.tm.mk_true();
        }
        if rule != RewriteRule::EqSimp {
            return false;
        }
        let Some(rhs_args) = self.args_of(rhs, &Op::Eq) else {
            return false;
        };
        rhs_args == args
    }

    fn rw_eq_binary(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let Some(params) = self.args_of(lhs, &Op::Eq) else {
            return false;
        };
        if params.len() < 3 || !self.tm.is_app(rhs, &Op::Not) {
            return false;
        }
        let inner = self.tm.negate(rhs);
        let Some(rhs_args) = self.args_of(inner, &Op::Or) else {
            return false;
        };
        if rhs_args.len() + 1 != params.len() {
            return false;
        }
        for (i, &r) in rhs_args.iter().enumerate() {
            let eq = self.tm.mk_eq(params[i], params[i + 1]);
            if r != self.tm.mk_not(eq) {
                return false;
            }
        }
        true
    }

    fn rw_distinct(&mut self, rule: RewriteRule, lhs: TermId, mut rhs: TermId) -> bool {
        let Some(args) = self.args_of(lhs, &Op::Distinct) else {
            return false;
        };
        let bool_sort = self.tm.sorts.bool_sort;
        match rule {
            RewriteRule::DistinctBool => {
                args.len() > 2
                    && self.tm.sort(args[0]) == bool_sort
                    && rhs == self.tm.mk_false()
            }
            RewriteRule::DistinctSame => {
                let mut seen = Vec::new();
                for t in args {
                    if seen.contains(&t) {
                        return rhs == self.tm.mk_false();
                    }
                    seen.push(t);
                }
                false
            }
            RewriteRule::DistinctNeg => {
                if args.len() != 2 {
                    return false;
                }
                args[0] == self.tm.negate(args[1]) && rhs == self.tm.mk_true()
            }
            RewriteRule::DistinctTrue => {
                if args.len() != 2 {
                    return false;
                }
                let t = self.tm.mk_true();
                (args[0] == t && rhs == self.tm.mk_not(args[1]))
                    || (args[1] == t && rhs == self.tm.mk_not(args[0]))
            }
            RewriteRule::DistinctFalse => {
                if args.len() != 2 {
                    return false;
                }
                let f = self.tm.mk_false();
                (args[0] == f && rhs == args[1]) || (args[1] == f && rhs == args[0])
            }
            RewriteRule::DistinctBoolEq => {
                if args.len() != 2 || self.tm.sort(args[0]) != bool_sort {
                    return false;
                }
                let not_a1 = self.tm.mk_not(args[1]);
                let v1 = self.tm.mk_eq(args[0], not_a1);
                let not_a0 = self.tm.mk_not(args[0]);
                let v2 = self.tm.mk_eq(not_a0, args[1]);
                rhs == v1 || rhs == v2
            }
            RewriteRule::DistinctBinary => {
                rhs = self.tm.negate(rhs);
                if args.len() == 2 {
                    return rhs == self.tm.mk_eq(args[0], args[1]);
                }
                let Some(rhs_args) = self.args_of(rhs, &Op::Or) else {
                    return false;
                };
                let mut offset = 0;
                for i in 0..args.len() - 1 {
                    for j in i + 1..args.len() {
                        if offset >= rhs_args.len()
                            || rhs_args[offset] != self.tm.mk_eq(args[i], args[j])
                        {
                            return false;
                        }
                        offset += 1;
                    }
                }
                offset == rhs_args.len()
            }
            _ => false,
        }
    }

    fn rw_not(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let Some(args) = self.args_of(lhs, &Op::Not) else {
            return false;
        };
        let inner = args[0];
        if inner == self.tm.mk_false() {
            return rhs == self.tm.mk_true();
        }
        if inner == self.tm.mk_true() {
            return rhs == self.tm.mk_false();
        }
        if let Some(inner_args) = self.args_of(inner, &Op::Not) {
            return rhs == inner_args[0];
        }
        false
    }

    fn rw_or_simp(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let Some(params) = self.args_of(lhs, &Op::Or) else {
            return false;
        };
        let f = self.tm.mk_false();
        let mut args: Vec<TermId> = Vec::new();
        for t in params {
            if t != f && !args.contains(&t) {
                args.push(t);
            }
        }
        match args.len() {
            0 => rhs == f,
            1 => rhs == args[0],
            _ => match self.args_of(rhs, &Op::Or) {
                Some(rhs_args) => rhs_args == args,
                None => false,
            },
        }
    }

    fn rw_or_taut(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let Some(params) = self.args_of(lhs, &Op::Or) else {
            return false;
        };
        if rhs != self.tm.mk_true() {
            return false;
        }
        let t = self.tm.mk_true();
        let mut seen: Vec<TermId> = Vec::new();
        for p in params {
            if p == t {
                return true;
            }
            let neg = self.tm.negate(p);
            if seen.contains(&neg) {
                return true;
            }
            seen.push(p);
        }
        false
    }

    fn rw_ite(&mut self, rule: RewriteRule, lhs: TermId, rhs: TermId) -> bool {
        let Some(args) = self.args_of(lhs, &Op::Ite) else {
            return false;
        };
        let (cond, t1, t2) = (args[0], args[1], args[2]);
        let tt = self.tm.mk_true();
        let ff = self.tm.mk_false();
        match rule {
            RewriteRule::IteTrue => cond == tt && rhs == t1,
            RewriteRule::IteFalse => cond == ff && rhs == t2,
            RewriteRule::IteSame => t1 == t2 && rhs == t1,
            RewriteRule::IteBool1 => t1 == tt && t2 == ff && rhs == cond,
            RewriteRule::IteBool2 => t1 == ff && t2 == tt && rhs == self.tm.mk_not(cond),
            RewriteRule::IteBool3 => t1 == tt && rhs == self.tm.mk_or(&[cond, t2]),
            RewriteRule::IteBool4 => {
                if t1 != ff {
                    return false;
                }
                let not_t2 = self.tm.mk_not(t2);
                let or = self.tm.mk_or(&[cond, not_t2]);
                rhs == self.tm.mk_not(or)
            }
            RewriteRule::IteBool5 => {
                if t2 != tt {
                    return false;
                }
                let not_cond = self.tm.mk_not(cond);
                rhs == self.tm.mk_or(&[not_cond, t1])
            }
            RewriteRule::IteBool6 => {
                if t2 != ff {
                    return false;
                }
                let not_cond = self.tm.mk_not(cond);
                let not_t1 = self.tm.mk_not(t1);
                let or = self.tm.mk_or(&[not_cond, not_t1]);
                rhs == self.tm.mk_not(or)
            }
            _ => false,
        }
    }

    fn rw_and_to_or(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let Some(and_params) = self.args_of(lhs, &Op::And) else {
            return false;
        };
        if !self.tm.is_app(rhs, &Op::Not) {
            return false;
        }
        let inner = self.tm.negate(rhs);
        let Some(or_params) = self.args_of(inner, &Op::Or) else {
            return false;
        };
        if and_params.len() != or_params.len() {
            return false;
        }
        and_params
            .iter()
            .zip(or_params)
            .all(|(&a, o)| o == self.tm.mk_not(a))
    }

    fn rw_xor_to_distinct(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let (Some(xor_params), Some(d_params)) =
            (self.args_of(lhs, &Op::Xor), self.args_of(rhs, &Op::Distinct))
        else {
            return false;
        };
        xor_params.len() == 2 && d_params.len() == 2 && xor_params == d_params
    }

    fn rw_imp_to_or(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let (Some(imp), Some(or_params)) =
            (self.args_of(lhs, &Op::Implies), self.args_of(rhs, &Op::Or))
        else {
            return false;
        };
        if imp.len() != or_params.len() {
            return false;
        }
        for i in 0..imp.len() - 1 {
            if or_params[i + 1] != self.tm.mk_not(imp[i]) {
                return false;
            }
        }
        or_params[0] == imp[imp.len() - 1]
    }

    fn rw_strip(&mut self, lhs: TermId, rhs: TermId) -> bool {
        self.tm.unquote(lhs) == Some(rhs)
    }

    fn rw_canonical_sum(&mut self, lhs: TermId, rhs: TermId) -> bool {
        self.affine(lhs) == self.affine(rhs)
    }

    fn rw_to_leq0(&mut self, rule: RewriteRule, lhs: TermId, mut rhs: TermId) -> bool {
        let (op, is_negated, first_arg) = match rule {
            RewriteRule::LeqToLeq0 => (Op::Le, false, 0usize),
            RewriteRule::LtToLeq0 => (Op::Lt, true, 1),
            RewriteRule::GeqToLeq0 => (Op::Ge, false, 1),
            RewriteRule::GtToLeq0 => (Op::Gt, true, 0),
            _ => return false,
        };
        let Some(params) = self.args_of(lhs, &op) else {
            return false;
        };
        if is_negated {
            rhs = self.tm.negate(rhs);
        }
        let Some(rhs_params) = self.args_of(rhs, &Op::Le) else {
            return false;
        };
        let expected = self
            .affine(params[first_arg])
            .add(&self.affine(params[1 - first_arg]).negate());
        self.affine(rhs_params[0]) == expected && self.tm.is_zero(rhs_params[1])
    }

    fn rw_leq(&mut self, rule: RewriteRule, lhs: TermId, rhs: TermId) -> bool {
        let Some(params) = self.args_of(lhs, &Op::Le) else {
            return false;
        };
        if !self.tm.is_zero(params[1]) {
            return false;
        }
        let value = self.affine(params[0]);
        if !value.is_constant() {
            return false;
        }
        match rule {
            RewriteRule::LeqTrue => {
                !value.constant_part().is_positive() && rhs == self.tm.mk_true()
            }
            RewriteRule::LeqFalse => {
                value.constant_part().is_positive() && rhs == self.tm.mk_false()
            }
            _ => false,
        }
    }

    fn rw_desugar(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let (TermKind::App(op_l, params_l), TermKind::App(op_r, params_r)) =
            (self.tm.kind(lhs).clone(), self.tm.kind(rhs).clone())
        else {
            return false;
        };
        if op_l != op_r || params_l.len() != params_r.len() {
            return false;
        }
        let int_sort = self.tm.sorts.int_sort;
        for (&l, &r) in params_l.iter().zip(params_r.iter()) {
            let expected = if self.tm.sort(l) == int_sort {
                self.tm.mk_app(Op::ToReal, &[l])
            } else {
                l
            };
            if r != expected {
                return false;
            }
        }
        true
    }

    fn rw_divisible(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let TermKind::App(Op::Divisible(n), args) = self.tm.kind(lhs).clone() else {
            return false;
        };
        let arg = args[0];
        let n_rat = BigRational::from_integer(n.clone());
        if n.is_one() {
            return rhs == self.tm.mk_true();
        }
        let arg_affine = self.affine(arg);
        if arg_affine.is_constant() {
            let c = arg_affine.constant_part();
            debug_assert!(c.is_integer());
            let divisible = c.numer().mod_floor(&n).is_zero();
            let expected = if divisible {
                self.tm.mk_true()
            } else {
                self.tm.mk_false()
            };
            return rhs == expected;
        }
        // (= x (* n (div x n)))
        let Some(rhs_args) = self.args_of(rhs, &Op::Eq) else {
            return false;
        };
        if rhs_args[0] != arg {
            return false;
        }
        let n_term = self.tm.mk_const(n_rat.clone(), self.tm.sorts.int_sort);
        let div = self.tm.mk_app(Op::IntDiv, &[arg, n_term]);
        let expected = SmtAffineTerm::from_summand(n_rat, div, self.tm.sorts.int_sort);
        self.affine(rhs_args[1]) == expected
    }

    fn rw_div_const(&mut self, lhs: TermId, rhs: TermId, kind: DivKind) -> bool {
        let Some(args) = self.args_of(lhs, &Op::IntDiv) else {
            return false;
        };
        let divisor = self.affine(args[1]);
        if !divisor.is_constant() {
            return false;
        }
        let divisor = divisor.constant_part().clone();
        match kind {
            DivKind::One => {
                divisor.is_one() && self.affine(rhs) == self.affine(args[0])
            }
            DivKind::MinusOne => {
                divisor == -BigRational::one()
                    && self.affine(rhs) == self.affine(args[0]).negate()
            }
            DivKind::Const => {
                if divisor.is_zero() {
                    return false;
                }
                let dividend = self.affine(args[0]);
                if !dividend.is_constant() {
                    return false;
                }
                let expected = const_div(dividend.constant_part(), &divisor);
                let result = self.affine(rhs);
                result.is_constant() && result.constant_part() == &expected
            }
        }
    }

    fn rw_mod_const(&mut self, lhs: TermId, rhs: TermId, kind: DivKind) -> bool {
        let Some(args) = self.args_of(lhs, &Op::Mod) else {
            return false;
        };
        let divisor = self.affine(args[1]);
        if !divisor.is_constant() {
            return false;
        }
        let divisor = divisor.constant_part().clone();
        let result = self.affine(rhs);
        match kind {
            DivKind::One => divisor.is_one() && result.is_constant() && result.constant_part().is_zero(),
            DivKind::MinusOne => {
                divisor == -BigRational::one()
                    && result.is_constant()
                    && result.constant_part().is_zero()
            }
            DivKind::Const => {
                if divisor.is_zero() {
                    return false;
                }
                let dividend = self.affine(args[0]);
                if !dividend.is_constant() {
                    return false;
                }
                let c0 = dividend.constant_part();
                let expected = c0 - const_div(c0, &divisor) * &divisor;
                result.is_constant() && result.constant_part() == &expected
            }
        }
    }

    /// `(mod x y)` with constant `y` becomes `x - y * (div x y)`.
    fn rw_modulo(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let Some(args) = self.args_of(lhs, &Op::Mod) else {
            return false;
        };
        let (x, y) = (args[0], args[1]);
        let y_affine = self.affine(y);
        if !y_affine.is_constant() || y_affine.constant_part().is_zero() {
            return false;
        }
        let divisor = y_affine.constant_part().clone();
        let div = self.tm.mk_app(Op::IntDiv, &[x, y]);
        let expected = self
            .affine(x)
            .add(&SmtAffineTerm::from_summand(divisor, div, self.tm.sort(x)).negate());
        self.affine(rhs) == expected
    }

    fn rw_to_int(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let Some(args) = self.args_of(lhs, &Op::ToInt) else {
            return false;
        };
        let arg = self.affine(args[0]);
        if !arg.is_constant() {
            return false;
        }
        let expected = arg.constant_part().floor();
        let result = self.affine(rhs);
        result.is_constant() && result.constant_part() == &expected
    }

    fn rw_store_over_store(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let Some(outer) = self.args_of(lhs, &Op::Store) else {
            return false;
        };
        let Some(inner) = self.args_of(outer[0], &Op::Store) else {
            return false;
        };
        let diff = self.affine(inner[1]).add(&self.affine(outer[1]).negate());
        if !diff.is_constant() || !diff.constant_part().is_zero() {
            return false;
        }
        rhs == self.tm.mk_store(inner[0], outer[1], outer[2])
    }

    fn rw_select_over_store(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let Some(select_args) = self.args_of(lhs, &Op::Select) else {
            return false;
        };
        let Some(store_args) = self.args_of(select_args[0], &Op::Store) else {
            return false;
        };
        let diff = self
            .affine(store_args[1])
            .add(&self.affine(select_args[1]).negate());
        if !diff.is_constant() {
            return false;
        }
        if diff.constant_part().is_zero() {
            rhs == store_args[2]
        } else {
            rhs == self.tm.mk_select(store_args[0], select_args[1])
        }
    }

    fn rw_flatten(&mut self, lhs: TermId, rhs: TermId) -> bool {
        let (Some(lhs_args), Some(rhs_args)) =
            (self.args_of(lhs, &Op::Or), self.args_of(rhs, &Op::Or))
        else {
            return false;
        };
        let mut queue: std::collections::VecDeque<TermId> = lhs_args.into_iter().collect();
        let mut offset = 0;
        while let Some(first) = queue.pop_front() {
            if offset < rhs_args.len() && rhs_args[offset] == first {
                offset += 1;
            } else {
                let Some(nested) = self.args_of(first, &Op::Or) else {
                    return false;
                };
                for t in nested.into_iter().rev() {
                    queue.push_front(t);
                }
            }
        }
        offset == rhs_args.len()
    }

    fn rw_store_rewrite(&mut self, lhs: TermId, rhs: TermId) -> bool {
        // (= (store a i v) a) --> (= (select a i) v)
        let Some(eq_args) = self.args_of(lhs, &Op::Eq) else {
            return false;
        };
        let store_args = if let Some(sa) = self.args_of(eq_args[0], &Op::Store) {
            if sa[0] == eq_args[1] {
                Some(sa)
            } else {
                None
            }
        } else {
            None
        };
        let store_args = match store_args {
            Some(sa) => sa,
            None => match self.args_of(eq_args[1], &Op::Store) {
                Some(sa) if sa[0] == eq_args[0] => sa,
                _ => return false,
            },
        };
        let select = self.tm.mk_select(store_args[0], store_args[1]);
        rhs == self.tm.mk_eq(select, store_args[2])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DivKind {
    One,
    MinusOne,
    Const,
}
