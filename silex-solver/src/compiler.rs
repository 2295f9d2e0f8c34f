//! The proof-tracked term compiler.
//!
//! Rewrites an input formula into the normal form over `{not, or, ite,
//! binary =, <= 0}`: n-ary connectives are expanded or simplified,
//! comparisons are normalized to `<= 0` with the right side moved left,
//! arithmetic is flattened into the canonical affine sum, `div`/`mod`
//! with constant divisors are folded (introducing the opaque `@/0`,
//! `@div0`, `@mod0` markers for zero divisors), and store/select chains
//! are reduced. Every step is annotated with its rewrite rule, so the
//! result carries a checkable proof of equivalence with the input.
//!
//! Results are cached per term id; shared subterms share their rewrite
//! proofs.

use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use rustc_hash::FxHashMap;
use silex_core::{
    Op, Result, SilexError, SmtAffineTerm, SortId, TermId, TermKind, TermManager,
};
use silex_proof::{ProofTracker, RewriteRule, Tracked};

/// `div` rounding: floor for positive divisors, ceiling for negative.
pub fn const_div(c0: &BigRational, c1: &BigRational) -> BigRational {
    let div = c0 / c1;
    if c1.is_negative() {
        div.ceil()
    } else {
        div.floor()
    }
}

/// The compiler with its per-term cache.
#[derive(Debug, Default)]
pub struct Compiler {
    cache: FxHashMap<TermId, Tracked>,
}

impl Compiler {
    /// A fresh compiler.
    pub fn new() -> Self {
        Compiler::default()
    }

    /// Compile `t`, returning the normalized term with a proof of
    /// `(= t result)`.
    pub fn compile(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        t: TermId,
    ) -> Result<Tracked> {
        if let Some(&cached) = self.cache.get(&t) {
            return Ok(cached);
        }
        let result = self.compile_uncached(tm, tracker, t)?;
        self.cache.insert(t, result);
        Ok(result)
    }

    fn compile_uncached(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        t: TermId,
    ) -> Result<Tracked> {
        let kind = tm.kind(t).clone();
        let TermKind::App(op, args) = kind else {
            return Ok(tracker.reflexivity(t));
        };
        let args: Vec<TermId> = args.to_vec();

        // chainable comparisons expand into a conjunction of pairs
        if matches!(op, Op::Le | Op::Lt | Op::Ge | Op::Gt) && args.len() > 2 {
            let mut conjs = Vec::with_capacity(args.len() - 1);
            for w in args.windows(2) {
                conjs.push(tm.mk_app(op.clone(), &[w[0], w[1]]));
            }
            let expanded = tm.mk_app(Op::And, &conjs);
            let rw = tracker.rewrite(tm, t, expanded, RewriteRule::Expand);
            let inner = self.compile(tm, tracker, expanded)?;
            return Ok(tracker.transitivity(rw, inner));
        }

        let mut compiled_args = Vec::with_capacity(args.len());
        for &a in &args {
            compiled_args.push(self.compile(tm, tracker, a)?);
        }
        let refl = tracker.reflexivity(t);
        let base = tracker.congruence(tm, refl, &compiled_args);

        // defined functions are macros: substitute the (converted)
        // arguments into the body and keep compiling
        if let Op::Func(f) = &op {
            let f = *f;
            if tm.func(f).definition.is_some() {
                let params = self.params(tm, base.term);
                let (formals, body) = {
                    let def = tm.func(f).definition.as_ref().expect("checked above");
                    (def.formals.to_vec(), def.body)
                };
                let mut map = FxHashMap::default();
                for (&formal, &actual) in formals.iter().zip(params.iter()) {
                    map.insert(formal, actual);
                }
                let expanded = tm.substitute(body, &map);
                let rw = tracker.rewrite(tm, base.term, expanded, RewriteRule::ExpandDef);
                let cur = tracker.transitivity(base, rw);
                let inner = self.compile(tm, tracker, expanded)?;
                return Ok(tracker.transitivity(cur, inner));
            }
        }

        match op {
            Op::Not => Ok(self.convert_not_step(tm, tracker, base)),
            Op::Or => Ok(self.convert_or_step(tm, tracker, base)),
            Op::And => Ok(self.convert_and(tm, tracker, base)),
            Op::Xor => {
                let params = self.params(tm, base.term);
                let distinct = tm.mk_app(Op::Distinct, &params);
                let rw = tracker.rewrite(tm, base.term, distinct, RewriteRule::XorToDistinct);
                let cur = tracker.transitivity(base, rw);
                Ok(self.convert_distinct(tm, tracker, cur))
            }
            Op::Implies => {
                let params = self.params(tm, base.term);
                let mut or_args = vec![params[params.len() - 1]];
                for &p in &params[..params.len() - 1] {
                    or_args.push(tm.mk_not(p));
                }
                let or_term = tm.mk_or(&or_args);
                let rw = tracker.rewrite(tm, base.term, or_term, RewriteRule::ImpToOr);
                let cur = tracker.transitivity(base, rw);
                Ok(self.simplify_or_args(tm, tracker, cur))
            }
            Op::Ite => Ok(self.convert_ite(tm, tracker, base)),
            Op::Eq => self.convert_eq(tm, tracker, base),
            Op::Distinct => Ok(self.convert_distinct(tm, tracker, base)),
            Op::Le => Ok(self.convert_comparison(tm, tracker, base, RewriteRule::LeqToLeq0)),
            Op::Ge => Ok(self.convert_comparison(tm, tracker, base, RewriteRule::GeqToLeq0)),
            Op::Lt => Ok(self.convert_strict(tm, tracker, base, RewriteRule::LtToLeq0)),
            Op::Gt => Ok(self.convert_strict(tm, tracker, base, RewriteRule::GtToLeq0)),
            Op::Add | Op::Sub => Ok(self.canonical_sum(tm, tracker, base)),
            Op::Mul => {
                let params = self.params(tm, base.term);
                let non_const = params
                    .iter()
                    .filter(|&&p| !SmtAffineTerm::from_term(tm, p).is_constant())
                    .count();
                if non_const > 1 {
                    return Err(SilexError::NonLinear(tm.display(base.term)));
                }
                Ok(self.canonical_sum(tm, tracker, base))
            }
            Op::Divide => self.convert_divide(tm, tracker, base),
            Op::IntDiv => self.convert_int_div(tm, tracker, base),
            Op::Mod => self.convert_mod(tm, tracker, base),
            Op::Divisible(n) => Ok(self.convert_divisible(tm, tracker, base, n)),
            Op::ToInt => {
                let params = self.params(tm, base.term);
                let arg = SmtAffineTerm::from_term(tm, params[0]);
                if arg.is_constant() {
                    let value = arg.constant_part().floor();
                    let rhs = tm.mk_const(value, tm.sorts.int_sort);
                    let rw = tracker.rewrite(tm, base.term, rhs, RewriteRule::ToInt);
                    Ok(tracker.transitivity(base, rw))
                } else {
                    Ok(base)
                }
            }
            Op::ToReal => Ok(self.canonical_to_real(tm, tracker, base)),
            Op::Select => Ok(self.convert_select(tm, tracker, base)),
            Op::Store => Ok(self.convert_store(tm, tracker, base)),
            _ => Ok(base),
        }
    }

    fn params(&self, tm: &TermManager, t: TermId) -> Vec<TermId> {
        match tm.kind(t) {
            TermKind::App(_, args) => args.to_vec(),
            _ => Vec::new(),
        }
    }

    /// Simplify a `not` at the root: constants and double negation.
    fn convert_not_step(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Tracked {
        let Some(args) = tm.app_args(base.term, &Op::Not) else {
            return base;
        };
        let inner = args[0];
        let f = tm.mk_false();
        let tt = tm.mk_true();
        let target = if inner == f {
            Some(tt)
        } else if inner == tt {
            Some(f)
        } else if let TermKind::App(Op::Not, inner_args) = tm.kind(inner) {
            Some(inner_args[0])
        } else {
            None
        };
        match target {
            Some(res) => {
                let rw = tracker.rewrite(tm, base.term, res, RewriteRule::NotSimp);
                tracker.transitivity(base, rw)
            }
            None => base,
        }
    }

    /// Simplify an `or` at the root: tautologies, duplicates, `false`.
    fn convert_or_step(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Tracked {
        let Some(args) = tm.app_args(base.term, &Op::Or) else {
            return base;
        };
        let args: Vec<TermId> = args.to_vec();
        let tt = tm.mk_true();
        let ff = tm.mk_false();
        let mut ctx: Vec<TermId> = Vec::with_capacity(args.len());
        for &a in &args {
            if a == tt {
                let rw = tracker.rewrite(tm, base.term, tt, RewriteRule::OrTaut);
                return tracker.transitivity(base, rw);
            }
            if a != ff {
                let neg = tm.negate(a);
                if ctx.contains(&neg) {
                    let rw = tracker.rewrite(tm, base.term, tt, RewriteRule::OrTaut);
                    return tracker.transitivity(base, rw);
                }
                if !ctx.contains(&a) {
                    ctx.push(a);
                }
            }
        }
        let target = match ctx.len() {
            0 => ff,
            1 => ctx[0],
            n if n == args.len() => return base,
            _ => tm.mk_or(&ctx),
        };
        let rw = tracker.rewrite(tm, base.term, target, RewriteRule::OrSimp);
        tracker.transitivity(base, rw)
    }

    /// Rewrite the `not` arguments of an `or` and simplify the `or`.
    fn simplify_or_args(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Tracked {
        let Some(args) = tm.app_args(base.term, &Op::Or) else {
            return base;
        };
        let args: Vec<TermId> = args.to_vec();
        let mut tracks = Vec::with_capacity(args.len());
        for &a in &args {
            let refl = tracker.reflexivity(a);
            let track = if tm.is_app(a, &Op::Not) {
                self.convert_not_step(tm, tracker, refl)
            } else {
                refl
            };
            tracks.push(track);
        }
        let refl = tracker.reflexivity(base.term);
        let cong = tracker.congruence(tm, refl, &tracks);
        let cur = tracker.transitivity(base, cong);
        self.convert_or_step(tm, tracker, cur)
    }

    /// Simplify below `(not (or ...))`: the `or` arguments, the `or`
    /// itself and the outer negation.
    fn simplify_not_or(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Tracked {
        let Some(not_args) = tm.app_args(base.term, &Op::Not) else {
            return base;
        };
        let or_term = not_args[0];
        let refl = tracker.reflexivity(or_term);
        let or_simpl = self.simplify_or_args(tm, tracker, refl);
        let outer_refl = tracker.reflexivity(base.term);
        let cong = tracker.congruence(tm, outer_refl, &[or_simpl]);
        let cur = tracker.transitivity(base, cong);
        self.convert_not_step(tm, tracker, cur)
    }

    /// `(and ...)` becomes `(not (or (not ...)))`, then simplifies.
    fn convert_and(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Tracked {
        let params = self.params(tm, base.term);
        let not_args: Vec<TermId> = params.iter().map(|&p| tm.mk_not(p)).collect();
        let or_term = tm.mk_or(&not_args);
        let non = tm.mk_not(or_term);
        let rw = tracker.rewrite(tm, base.term, non, RewriteRule::AndToOr);
        let cur = tracker.transitivity(base, rw);
        self.simplify_not_or(tm, tracker, cur)
    }

    fn convert_ite(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Tracked {
        let params = self.params(tm, base.term);
        let (cond, t1, t2) = (params[0], params[1], params[2]);
        if tm.sort(t1) != tm.sorts.bool_sort {
            // term-level ite stays; the clausifier axiomatizes it
            if cond == tm.mk_true() {
                let rw = tracker.rewrite(tm, base.term, t1, RewriteRule::IteTrue);
                return tracker.transitivity(base, rw);
            }
            if cond == tm.mk_false() {
                let rw = tracker.rewrite(tm, base.term, t2, RewriteRule::IteFalse);
                return tracker.transitivity(base, rw);
            }
            if t1 == t2 {
                let rw = tracker.rewrite(tm, base.term, t1, RewriteRule::IteSame);
                return tracker.transitivity(base, rw);
            }
            return base;
        }
        let tt = tm.mk_true();
        let ff = tm.mk_false();
        if cond == tt {
            let rw = tracker.rewrite(tm, base.term, t1, RewriteRule::IteTrue);
            return tracker.transitivity(base, rw);
        }
        if cond == ff {
            let rw = tracker.rewrite(tm, base.term, t2, RewriteRule::IteFalse);
            return tracker.transitivity(base, rw);
        }
        if t1 == t2 {
            let rw = tracker.rewrite(tm, base.term, t1, RewriteRule::IteSame);
            return tracker.transitivity(base, rw);
        }
        if t1 == tt && t2 == ff {
            let rw = tracker.rewrite(tm, base.term, cond, RewriteRule::IteBool1);
            return tracker.transitivity(base, rw);
        }
        if t1 == ff && t2 == tt {
            let not_cond = tm.mk_not(cond);
            let rw = tracker.rewrite(tm, base.term, not_cond, RewriteRule::IteBool2);
            let cur = tracker.transitivity(base, rw);
            return self.convert_not_step(tm, tracker, cur);
        }
        if t1 == tt {
            let or = tm.mk_or(&[cond, t2]);
            let rw = tracker.rewrite(tm, base.term, or, RewriteRule::IteBool3);
            let cur = tracker.transitivity(base, rw);
            return self.convert_or_step(tm, tracker, cur);
        }
        if t1 == ff {
            let not_t2 = tm.mk_not(t2);
            let or = tm.mk_or(&[cond, not_t2]);
            let non = tm.mk_not(or);
            let rw = tracker.rewrite(tm, base.term, non, RewriteRule::IteBool4);
            let cur = tracker.transitivity(base, rw);
            return self.simplify_not_or(tm, tracker, cur);
        }
        if t2 == tt {
            let not_cond = tm.mk_not(cond);
            let or = tm.mk_or(&[not_cond, t1]);
            let rw = tracker.rewrite(tm, base.term, or, RewriteRule::IteBool5);
            let cur = tracker.transitivity(base, rw);
            return self.simplify_or_args(tm, tracker, cur);
        }
        if t2 == ff {
            let not_cond = tm.mk_not(cond);
            let not_t1 = tm.mk_not(t1);
            let or = tm.mk_or(&[not_cond, not_t1]);
            let non = tm.mk_not(or);
            let rw = tracker.rewrite(tm, base.term, non, RewriteRule::IteBool6);
            let cur = tracker.transitivity(base, rw);
            return self.simplify_not_or(tm, tracker, cur);
        }
        base
    }

    fn convert_eq(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Result<Tracked> {
        let args = self.params(tm, base.term);
        let sort = tm.sort(args[0]);
        let tt = tm.mk_true();
        let ff = tm.mk_false();
        if tm.sorts.is_numeric(sort) {
            // two distinct constants refute the whole equality
            let mut last: Option<BigRational> = None;
            for &a in &args {
                let value = SmtAffineTerm::from_term(tm, a);
                if value.is_constant() {
                    match &last {
                        None => last = Some(value.constant_part().clone()),
                        Some(prev) => {
                            if prev != value.constant_part() {
                                let rw = tracker.rewrite(
                                    tm,
                                    base.term,
                                    ff,
                                    RewriteRule::ConstDiff,
                                );
                                return Ok(tracker.transitivity(base, rw));
                            }
                        }
                    }
                }
            }
        } else if sort == tm.sorts.bool_sort {
            let found_true = args.contains(&tt);
            let found_false = args.contains(&ff);
            if found_true && found_false {
                let rw = tracker.rewrite(tm, base.term, ff, RewriteRule::TrueNotFalse);
                return Ok(tracker.transitivity(base, rw));
            }
            if found_true || found_false {
                let marker = if found_true { tt } else { ff };
                let rest: Vec<TermId> = {
                    let mut rest = Vec::new();
                    for &a in &args {
                        if a != marker && !rest.contains(&a) {
                            rest.push(a);
                        }
                    }
                    rest
                };
                if rest.is_empty() {
                    let rw = tracker.rewrite(tm, base.term, tt, RewriteRule::EqSame);
                    return Ok(tracker.transitivity(base, rw));
                }
                let rule = if found_true {
                    RewriteRule::EqTrue
                } else {
                    RewriteRule::EqFalse
                };
                if rest.len() == 1 {
                    let target = if found_true {
                        rest[0]
                    } else {
                        tm.mk_not(rest[0])
                    };
                    let rw = tracker.rewrite(tm, base.term, target, rule);
                    let cur = tracker.transitivity(base, rw);
                    return Ok(if found_true {
                        cur
                    } else {
                        self.convert_not_step(tm, tracker, cur)
                    });
                }
                let or_args: Vec<TermId> = if found_true {
                    rest.iter().map(|&r| tm.mk_not(r)).collect()
                } else {
                    rest.clone()
                };
                let or = tm.mk_or(&or_args);
                let non = tm.mk_not(or);
                let rw = tracker.rewrite(tm, base.term, non, rule);
                let cur = tracker.transitivity(base, rw);
                return Ok(self.simplify_not_or(tm, tracker, cur));
            }
        }
        // remove duplicates
        let mut dedup: Vec<TermId> = Vec::with_capacity(args.len());
        for &a in &args {
            if !dedup.contains(&a) {
                dedup.push(a);
            }
        }
        if dedup.len() == 1 {
            let rw = tracker.rewrite(tm, base.term, tt, RewriteRule::EqSame);
            return Ok(tracker.transitivity(base, rw));
        }
        let mut cur = base;
        if dedup.len() != args.len() {
            let simp = tm.mk_app(Op::Eq, &dedup);
            let rw = tracker.rewrite(tm, cur.term, simp, RewriteRule::EqSimp);
            cur = tracker.transitivity(cur, rw);
        }
        if dedup.len() == 2 {
            return Ok(self.make_binary_eq(tm, tracker, cur, dedup[0], dedup[1]));
        }
        // chainable equality: not (or (not pairwise))
        let mut disj = Vec::with_capacity(dedup.len() - 1);
        for w in dedup.windows(2) {
            let eq = tm.mk_eq(w[0], w[1]);
            disj.push(tm.mk_not(eq));
        }
        let or = tm.mk_or(&disj);
        let non = tm.mk_not(or);
        let rw = tracker.rewrite(tm, cur.term, non, RewriteRule::EqBinary);
        Ok(tracker.transitivity(cur, rw))
    }

    /// A binary equality; store idempotency becomes a select equality.
    fn make_binary_eq(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        cur: Tracked,
        a: TermId,
        b: TermId,
    ) -> Tracked {
        if tm.sorts.is_array(tm.sort(a)) {
            for (store, other) in [(a, b), (b, a)] {
                if let Some(args) = tm.app_args(store, &Op::Store) {
                    let (arr, idx, val) = (args[0], args[1], args[2]);
                    if arr == other {
                        let select = tm.mk_select(arr, idx);
                        let rhs = tm.mk_eq(select, val);
                        let rw =
                            tracker.rewrite(tm, cur.term, rhs, RewriteRule::StoreRewrite);
                        return tracker.transitivity(cur, rw);
                    }
                }
            }
        }
        cur
    }

    fn convert_distinct(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Tracked {
        let args = self.params(tm, base.term);
        let tt = tm.mk_true();
        let ff = tm.mk_false();
        if tm.sort(args[0]) == tm.sorts.bool_sort {
            if args.len() > 2 {
                let rw = tracker.rewrite(tm, base.term, ff, RewriteRule::DistinctBool);
                return tracker.transitivity(base, rw);
            }
            let (t0, t1) = (args[0], args[1]);
            if t0 == t1 {
                let rw = tracker.rewrite(tm, base.term, ff, RewriteRule::DistinctSame);
                return tracker.transitivity(base, rw);
            }
            if t0 == tm.negate(t1) {
                let rw = tracker.rewrite(tm, base.term, tt, RewriteRule::DistinctNeg);
                return tracker.transitivity(base, rw);
            }
            for (c, other) in [(t0, t1), (t1, t0)] {
                if c == tt {
                    let target = tm.mk_not(other);
                    let rw = tracker.rewrite(tm, base.term, target, RewriteRule::DistinctTrue);
                    let cur = tracker.transitivity(base, rw);
                    return self.convert_not_step(tm, tracker, cur);
                }
                if c == ff {
                    let rw = tracker.rewrite(tm, base.term, other, RewriteRule::DistinctFalse);
                    return tracker.transitivity(base, rw);
                }
            }
            let not_t1 = tm.mk_not(t1);
            let target = tm.mk_eq(t0, not_t1);
            let rw = tracker.rewrite(tm, base.term, target, RewriteRule::DistinctBoolEq);
            return tracker.transitivity(base, rw);
        }
        let mut seen: Vec<TermId> = Vec::new();
        for &a in &args {
            if seen.contains(&a) {
                let rw = tracker.rewrite(tm, base.term, ff, RewriteRule::DistinctSame);
                return tracker.transitivity(base, rw);
            }
            seen.push(a);
        }
        if args.len() == 2 {
            let eq = tm.mk_eq(args[0], args[1]);
            let target = tm.mk_not(eq);
            let rw = tracker.rewrite(tm, base.term, target, RewriteRule::DistinctBinary);
            return tracker.transitivity(base, rw);
        }
        let mut eqs = Vec::new();
        for i in 0..args.len() - 1 {
            for j in i + 1..args.len() {
                eqs.push(tm.mk_eq(args[i], args[j]));
            }
        }
        let or = tm.mk_or(&eqs);
        let target = tm.mk_not(or);
        let rw = tracker.rewrite(tm, base.term, target, RewriteRule::DistinctBinary);
        tracker.transitivity(base, rw)
    }

    fn comparison_affine(&self, tm: &TermManager, base: TermId, flip: bool) -> SmtAffineTerm {
        let params = self.params(tm, base);
        let (p0, p1) = if flip {
            (params[1], params[0])
        } else {
            (params[0], params[1])
        };
        let sort = self.join_sort(tm, params[0], params[1]);
        SmtAffineTerm::from_term(tm, p0)
            .add(&SmtAffineTerm::from_term(tm, p1).negate())
            .with_sort(sort)
    }

    fn join_sort(&self, tm: &TermManager, a: TermId, b: TermId) -> SortId {
        if tm.sort(a) == tm.sorts.real_sort || tm.sort(b) == tm.sorts.real_sort {
            tm.sorts.real_sort
        } else {
            tm.sort(a)
        }
    }

    /// `<=` / `>=` normalize to `(<= canonical 0)`.
    fn convert_comparison(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
        rule: RewriteRule,
    ) -> Tracked {
        let flip = rule == RewriteRule::GeqToLeq0;
        let affine = self.comparison_affine(tm, base.term, flip);
        let lhs = affine.to_term(tm);
        let zero = tm.mk_zero(affine.sort());
        let leq = tm.mk_le(lhs, zero);
        let rw = tracker.rewrite(tm, base.term, leq, rule);
        let cur = tracker.transitivity(base, rw);
        self.convert_leq0(tm, tracker, cur)
    }

    /// `<` / `>` normalize to `(not (<= canonical 0))`.
    fn convert_strict(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
        rule: RewriteRule,
    ) -> Tracked {
        let flip = rule == RewriteRule::LtToLeq0;
        let affine = self.comparison_affine(tm, base.term, flip);
        let lhs = affine.to_term(tm);
        let zero = tm.mk_zero(affine.sort());
        let leq = tm.mk_le(lhs, zero);
        let not_leq = tm.mk_not(leq);
        let rw = tracker.rewrite(tm, base.term, not_leq, rule);
        let cur = tracker.transitivity(base, rw);
        // simplify the inner (<= c 0) and the outer negation
        let leq_refl = tracker.reflexivity(leq);
        let leq_conv = self.convert_leq0(tm, tracker, leq_refl);
        let outer_refl = tracker.reflexivity(cur.term);
        let cong = tracker.congruence(tm, outer_refl, &[leq_conv]);
        let cur = tracker.transitivity(cur, cong);
        self.convert_not_step(tm, tracker, cur)
    }

    /// `(<= c 0)` with constant `c` folds to `true` / `false`.
    fn convert_leq0(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Tracked {
        let Some(args) = tm.app_args(base.term, &Op::Le) else {
            return base;
        };
        let lhs = args[0];
        let affine = SmtAffineTerm::from_term(tm, lhs);
        if !affine.is_constant() {
            return base;
        }
        let (target, rule) = if affine.constant_part().is_positive() {
            (tm.mk_false(), RewriteRule::LeqFalse)
        } else {
            (tm.mk_true(), RewriteRule::LeqTrue)
        };
        let rw = tracker.rewrite(tm, base.term, target, rule);
        tracker.transitivity(base, rw)
    }

    fn canonical_sum(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Tracked {
        let affine = SmtAffineTerm::from_term(tm, base.term);
        let rhs = affine.to_term(tm);
        let rw = tracker.rewrite(tm, base.term, rhs, RewriteRule::CanonicalSum);
        tracker.transitivity(base, rw)
    }

    fn canonical_to_real(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Tracked {
        let affine = SmtAffineTerm::from_term(tm, base.term);
        let rhs = affine.to_term(tm);
        let rw = tracker.rewrite(tm, base.term, rhs, RewriteRule::ToReal);
        tracker.transitivity(base, rw)
    }

    fn convert_divide(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Result<Tracked> {
        let params = self.params(tm, base.term);
        let mut quotient = SmtAffineTerm::from_term(tm, params[0]);
        for &p in &params[1..] {
            let divisor = SmtAffineTerm::from_term(tm, p);
            if !divisor.is_constant() {
                return Err(SilexError::NonLinear(tm.display(base.term)));
            }
            if divisor.constant_part().is_zero() {
                // the opaque division-by-zero marker; congruence gives it
                // meaning, arithmetic does not
                let marker = tm.mk_app(Op::By0, &[params[0]]);
                let refl = tracker.reflexivity(marker);
                return Ok(tracker.transitivity(base, refl));
            }
            quotient = quotient.mul(&divisor.constant_part().recip());
        }
        let rhs = quotient.to_term(tm);
        let rw = tracker.rewrite(tm, base.term, rhs, RewriteRule::CanonicalSum);
        Ok(tracker.transitivity(base, rw))
    }

    fn convert_int_div(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Result<Tracked> {
        let params = self.params(tm, base.term);
        let arg0 = SmtAffineTerm::from_term(tm, params[0]);
        let arg1 = SmtAffineTerm::from_term(tm, params[1]);
        if !arg1.is_constant() || !arg1.constant_part().is_integer() {
            return Err(SilexError::NonLinear(tm.display(base.term)));
        }
        let divisor = arg1.constant_part().clone();
        if divisor.is_zero() {
            let marker = tm.mk_app(Op::Div0, &[params[0]]);
            let refl = tracker.reflexivity(marker);
            return Ok(tracker.transitivity(base, refl));
        }
        if divisor.is_one() {
            let rhs = arg0.to_term(tm);
            let rw = tracker.rewrite(tm, base.term, rhs, RewriteRule::DivOne);
            return Ok(tracker.transitivity(base, rw));
        }
        if divisor == -BigRational::one() {
            let rhs = arg0.negate().to_term(tm);
            let rw = tracker.rewrite(tm, base.term, rhs, RewriteRule::DivMinusOne);
            return Ok(tracker.transitivity(base, rw));
        }
        if arg0.is_constant() {
            let value = const_div(arg0.constant_part(), &divisor);
            let rhs = tm.mk_const(value, tm.sorts.int_sort);
            let rw = tracker.rewrite(tm, base.term, rhs, RewriteRule::DivConst);
            return Ok(tracker.transitivity(base, rw));
        }
        Ok(base)
    }

    fn convert_mod(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Result<Tracked> {
        let params = self.params(tm, base.term);
        let arg0 = SmtAffineTerm::from_term(tm, params[0]);
        let arg1 = SmtAffineTerm::from_term(tm, params[1]);
        if !arg1.is_constant() || !arg1.constant_part().is_integer() {
            return Err(SilexError::NonLinear(tm.display(base.term)));
        }
        let divisor = arg1.constant_part().clone();
        let int_sort = tm.sorts.int_sort;
        if divisor.is_zero() {
            let marker = tm.mk_app(Op::Mod0, &[params[0]]);
            let refl = tracker.reflexivity(marker);
            return Ok(tracker.transitivity(base, refl));
        }
        if divisor.is_one() || divisor == -BigRational::one() {
            let rhs = tm.mk_zero(int_sort);
            let rule = if divisor.is_one() {
                RewriteRule::ModuloOne
            } else {
                RewriteRule::ModuloMinusOne
            };
            let rw = tracker.rewrite(tm, base.term, rhs, rule);
            return Ok(tracker.transitivity(base, rw));
        }
        if arg0.is_constant() {
            let c0 = arg0.constant_part();
            let value = c0 - const_div(c0, &divisor) * &divisor;
            let rhs = tm.mk_const(value, int_sort);
            let rw = tracker.rewrite(tm, base.term, rhs, RewriteRule::ModuloConst);
            return Ok(tracker.transitivity(base, rw));
        }
        // (mod x y) --> x - y * (div x y)
        let div = tm.mk_app(Op::IntDiv, &[params[0], params[1]]);
        let expected = arg0.add(&SmtAffineTerm::from_summand(divisor, div, int_sort).negate());
        let rhs = expected.to_term(tm);
        let rw = tracker.rewrite(tm, base.term, rhs, RewriteRule::Modulo);
        Ok(tracker.transitivity(base, rw))
    }

    fn convert_divisible(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
        n: num_bigint::BigInt,
    ) -> Tracked {
        let params = self.params(tm, base.term);
        let arg = params[0];
        let tt = tm.mk_true();
        let n_rat = BigRational::from_integer(n);
        if n_rat.is_one() {
            let rw = tracker.rewrite(tm, base.term, tt, RewriteRule::Divisible);
            return tracker.transitivity(base, rw);
        }
        let arg_affine = SmtAffineTerm::from_term(tm, arg);
        if arg_affine.is_constant() {
            let c = arg_affine.constant_part();
            let rem = c - const_div(c, &n_rat) * &n_rat;
            let target = if rem.is_zero() { tt } else { tm.mk_false() };
            let rw = tracker.rewrite(tm, base.term, target, RewriteRule::Divisible);
            return tracker.transitivity(base, rw);
        }
        let int_sort = tm.sorts.int_sort;
        let n_term = tm.mk_const(n_rat.clone(), int_sort);
        let div = tm.mk_app(Op::IntDiv, &[arg, n_term]);
        let product = SmtAffineTerm::from_summand(n_rat, div, int_sort);
        let rhs_term = product.to_term(tm);
        let target = tm.mk_eq(arg, rhs_term);
        let rw = tracker.rewrite(tm, base.term, target, RewriteRule::Divisible);
        tracker.transitivity(base, rw)
    }

    fn convert_select(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Tracked {
        let params = self.params(tm, base.term);
        let (array, idx) = (params[0], params[1]);
        let Some(store_args) = tm.app_args(array, &Op::Store) else {
            return base;
        };
        let (inner, store_idx, value) = (store_args[0], store_args[1], store_args[2]);
        let diff = SmtAffineTerm::from_term(tm, store_idx)
            .add(&SmtAffineTerm::from_term(tm, idx).negate());
        if !diff.is_constant() {
            return base;
        }
        let target = if diff.constant_part().is_zero() {
            value
        } else {
            tm.mk_select(inner, idx)
        };
        let rw = tracker.rewrite(tm, base.term, target, RewriteRule::SelectOverStore);
        tracker.transitivity(base, rw)
    }

    fn convert_store(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        base: Tracked,
    ) -> Tracked {
        let params = self.params(tm, base.term);
        let (array, idx, value) = (params[0], params[1], params[2]);
        let Some(inner_args) = tm.app_args(array, &Op::Store) else {
            return base;
        };
        let (inner_array, inner_idx) = (inner_args[0], inner_args[1]);
        let diff = SmtAffineTerm::from_term(tm, inner_idx)
            .add(&SmtAffineTerm::from_term(tm, idx).negate());
        if !diff.is_constant() || !diff.constant_part().is_zero() {
            return base;
        }
        let target = tm.mk_store(inner_array, idx, value);
        let rw = tracker.rewrite(tm, base.term, target, RewriteRule::StoreOverStore);
        tracker.transitivity(base, rw)
    }
}
