//! Rule-level checker tests: every rewrite instance the compiler can
//! produce must verify, mangled instances must not, and the documented
//! ambiguities stay pinned.

use num_rational::BigRational;
use silex_core::{Op, QuoteKind, SmtAffineTerm, TermId, TermManager};
use silex_proof::node::{LemmaKind, LemmaPath, ProofNode};
use silex_proof::{ProofArena, ProofChecker, RewriteRule, TautRule};
use silex_math::Rational;

fn check_rewrite(tm: &mut TermManager, rule: RewriteRule, lhs: TermId, rhs: TermId) -> bool {
    let mut arena = ProofArena::new();
    let eq = tm.mk_eq(lhs, rhs);
    let node = arena.alloc(ProofNode::Rewrite { rule, equality: eq });
    let mut checker = ProofChecker::new(tm, &arena, &[]);
    checker.walk(node);
    checker.errors().is_empty()
}

fn check_taut(tm: &mut TermManager, rule: TautRule, clause: TermId) -> bool {
    let mut arena = ProofArena::new();
    let node = arena.alloc(ProofNode::Taut { rule, clause });
    let mut checker = ProofChecker::new(tm, &arena, &[]);
    checker.walk(node);
    checker.errors().is_empty()
}

fn check_lemma(tm: &mut TermManager, kind: LemmaKind, clause: TermId) -> bool {
    let mut arena = ProofArena::new();
    let node = arena.alloc(ProofNode::Lemma { kind, clause });
    let mut checker = ProofChecker::new(tm, &arena, &[]);
    checker.walk(node);
    checker.errors().is_empty()
}

#[test]
fn test_rewrite_not_simp() {
    let mut tm = TermManager::new();
    let p = tm.declare_const("p", tm.sorts.bool_sort);
    let np = tm.mk_not(p);
    let nnp = tm.mk_not(np);
    assert!(check_rewrite(&mut tm, RewriteRule::NotSimp, nnp, p));
    let t = tm.mk_true();
    let f = tm.mk_false();
    let nt = tm.mk_not(t);
    assert!(check_rewrite(&mut tm, RewriteRule::NotSimp, nt, f));
    // double negation to the wrong side must fail
    assert!(!check_rewrite(&mut tm, RewriteRule::NotSimp, nnp, np));
}

#[test]
fn test_rewrite_or_simp_and_taut() {
    let mut tm = TermManager::new();
    let p = tm.declare_const("p", tm.sorts.bool_sort);
    let q = tm.declare_const("q", tm.sorts.bool_sort);
    let f = tm.mk_false();
    let lhs = tm.mk_or(&[p, f, p, q]);
    let rhs = tm.mk_or(&[p, q]);
    assert!(check_rewrite(&mut tm, RewriteRule::OrSimp, lhs, rhs));
    let np = tm.mk_not(p);
    let taut = tm.mk_or(&[p, np]);
    let t = tm.mk_true();
    assert!(check_rewrite(&mut tm, RewriteRule::OrTaut, taut, t));
    // dropping the wrong literal must fail
    let bad = tm.mk_or(&[q, q]);
    assert!(!check_rewrite(&mut tm, RewriteRule::OrSimp, lhs, bad));
}

#[test]
fn test_rewrite_and_to_or() {
    let mut tm = TermManager::new();
    let p = tm.declare_const("p", tm.sorts.bool_sort);
    let q = tm.declare_const("q", tm.sorts.bool_sort);
    let and = tm.mk_app(Op::And, &[p, q]);
    let np = tm.mk_not(p);
    let nq = tm.mk_not(q);
    let or = tm.mk_or(&[np, nq]);
    let rhs = tm.mk_not(or);
    assert!(check_rewrite(&mut tm, RewriteRule::AndToOr, and, rhs));
}

#[test]
fn test_rewrite_expand_def() {
    let mut tm = TermManager::new();
    let int = tm.sorts.int_sort;
    let u = tm.declare_const("u", int);
    let body = tm.mk_app(Op::Add, &[u, u]);
    let double = tm.define_fun("double", vec![u], int, body);
    let three = tm.mk_int(3);
    let app = tm.mk_app(Op::Func(double), &[three]);
    let expanded = tm.mk_app(Op::Add, &[three, three]);
    assert!(check_rewrite(&mut tm, RewriteRule::ExpandDef, app, expanded));
    // substituting the wrong argument is rejected
    let four = tm.mk_int(4);
    let wrong = tm.mk_app(Op::Add, &[four, four]);
    assert!(!check_rewrite(&mut tm, RewriteRule::ExpandDef, app, wrong));
    // an uninterpreted function has nothing to expand
    let g = tm.declare_fun("g", vec![int], int);
    let g_app = tm.mk_app(Op::Func(g), &[three]);
    assert!(!check_rewrite(&mut tm, RewriteRule::ExpandDef, g_app, expanded));
}

#[test]
fn test_rewrite_canonical_sum() {
    let mut tm = TermManager::new();
    let int = tm.sorts.int_sort;
    let x = tm.declare_const("x", int);
    let y = tm.declare_const("y", int);
    let sum1 = tm.mk_app(Op::Add, &[x, y]);
    let sum2 = tm.mk_app(Op::Add, &[y, x]);
    assert!(check_rewrite(&mut tm, RewriteRule::CanonicalSum, sum1, sum2));
    let canonical = SmtAffineTerm::from_term(&tm, sum1).to_term(&mut tm);
    assert!(check_rewrite(&mut tm, RewriteRule::CanonicalSum, sum1, canonical));
    // a different sum is rejected
    let two = tm.mk_int(2);
    let wrong = tm.mk_app(Op::Add, &[x, y, two]);
    assert!(!check_rewrite(&mut tm, RewriteRule::CanonicalSum, sum1, wrong));
}

#[test]
fn test_rewrite_lt_to_leq0() {
    let mut tm = TermManager::new();
    let int = tm.sorts.int_sort;
    let x = tm.declare_const("x", int);
    let y = tm.declare_const("y", int);
    let lt = tm.mk_app(Op::Lt, &[x, y]);
    // (< x y) --> (not (<= (y - x... with the right side moved left:
    // the checker expects affine(y) - affine(x) on the left of <= 0
    let diff = SmtAffineTerm::from_term(&tm, y).add(&SmtAffineTerm::from_term(&tm, x).negate());
    let lhs_term = diff.to_term(&mut tm);
    let zero = tm.mk_int(0);
    let leq = tm.mk_le(lhs_term, zero);
    let rhs = tm.mk_not(leq);
    assert!(check_rewrite(&mut tm, RewriteRule::LtToLeq0, lt, rhs));
    // without the negation it is not an :ltToLeq0 instance
    assert!(!check_rewrite(&mut tm, RewriteRule::LtToLeq0, lt, leq));
}

#[test]
fn test_rewrite_div_mod_constants() {
    let mut tm = TermManager::new();
    let seven = tm.mk_int(7);
    let two = tm.mk_int(2);
    let div = tm.mk_app(Op::IntDiv, &[seven, two]);
    let three = tm.mk_int(3);
    assert!(check_rewrite(&mut tm, RewriteRule::DivConst, div, three));
    let modt = tm.mk_app(Op::Mod, &[seven, two]);
    let one = tm.mk_int(1);
    assert!(check_rewrite(&mut tm, RewriteRule::ModuloConst, modt, one));
    // -7 div 2 floors to -4
    let minus_seven = tm.mk_const(BigRational::from_integer((-7).into()), tm.sorts.int_sort);
    let div2 = tm.mk_app(Op::IntDiv, &[minus_seven, two]);
    let minus_four = tm.mk_const(BigRational::from_integer((-4).into()), tm.sorts.int_sort);
    assert!(check_rewrite(&mut tm, RewriteRule::DivConst, div2, minus_four));
    let wrong = tm.mk_const(BigRational::from_integer((-3).into()), tm.sorts.int_sort);
    assert!(!check_rewrite(&mut tm, RewriteRule::DivConst, div2, wrong));
}

#[test]
fn test_rewrite_modulo_expansion() {
    let mut tm = TermManager::new();
    let int = tm.sorts.int_sort;
    let x = tm.declare_const("x", int);
    let five = tm.mk_int(5);
    let modt = tm.mk_app(Op::Mod, &[x, five]);
    let div = tm.mk_app(Op::IntDiv, &[x, five]);
    let expected = SmtAffineTerm::from_term(&tm, x).add(
        &SmtAffineTerm::from_summand(BigRational::from_integer(5.into()), div, int).negate(),
    );
    let rhs = expected.to_term(&mut tm);
    assert!(check_rewrite(&mut tm, RewriteRule::Modulo, modt, rhs));
}

#[test]
fn test_rewrite_select_over_store() {
    let mut tm = TermManager::new();
    let int = tm.sorts.int_sort;
    let arr = tm.sorts.array(int, int);
    let a = tm.declare_const("a", arr);
    let v = tm.declare_const("v", int);
    let one = tm.mk_int(1);
    let two = tm.mk_int(2);
    let st = tm.mk_store(a, one, v);
    let sel_same = tm.mk_select(st, one);
    assert!(check_rewrite(&mut tm, RewriteRule::SelectOverStore, sel_same, v));
    let sel_other = tm.mk_select(st, two);
    let expected = tm.mk_select(a, two);
    assert!(check_rewrite(
        &mut tm,
        RewriteRule::SelectOverStore,
        sel_other,
        expected
    ));
    // symbolic indices cannot use the rewrite
    let i = tm.declare_const("i", int);
    let st2 = tm.mk_store(a, i, v);
    let sel2 = tm.mk_select(st2, two);
    let wrong = tm.mk_select(a, two);
    assert!(!check_rewrite(&mut tm, RewriteRule::SelectOverStore, sel2, wrong));
}

#[test]
fn test_tautology_or_pos_neg() {
    let mut tm = TermManager::new();
    let p = tm.declare_const("p", tm.sorts.bool_sort);
    let q = tm.declare_const("q", tm.sorts.bool_sort);
    let or = tm.mk_or(&[p, q]);
    let quoted = tm.mk_quoted(or, QuoteKind::Plain);
    let not_quoted = tm.mk_not(quoted);
    let pos = tm.mk_or(&[not_quoted, p, q]);
    assert!(check_taut(&mut tm, TautRule::OrPos, pos));
    let np = tm.mk_not(p);
    let neg = tm.mk_or(&[quoted, np]);
    assert!(check_taut(&mut tm, TautRule::OrNeg, neg));
    // a foreign literal is rejected
    let r = tm.declare_const("r", tm.sorts.bool_sort);
    let nr = tm.mk_not(r);
    let bad = tm.mk_or(&[quoted, nr]);
    assert!(!check_taut(&mut tm, TautRule::OrNeg, bad));
}

#[test]
fn test_tautology_store() {
    let mut tm = TermManager::new();
    let int = tm.sorts.int_sort;
    let arr = tm.sorts.array(int, int);
    let a = tm.declare_const("a", arr);
    let i = tm.declare_const("i", int);
    let v = tm.declare_const("v", int);
    let st = tm.mk_store(a, i, v);
    let sel = tm.mk_select(st, i);
    let clause = tm.mk_eq(sel, v);
    assert!(check_taut(&mut tm, TautRule::Store, clause));
    // select at a different index is not the :store schema
    let j = tm.declare_const("j", int);
    let sel2 = tm.mk_select(st, j);
    let bad = tm.mk_eq(sel2, v);
    assert!(!check_taut(&mut tm, TautRule::Store, bad));
}

#[test]
fn test_la_lemma_farkas() {
    let mut tm = TermManager::new();
    let int = tm.sorts.int_sort;
    let x = tm.declare_const("x", int);
    // x - 1 <= 0 and 2 - x <= 0: coefficients (1, 1) sum to 1 > 0
    let one = BigRational::from_integer(1.into());
    let a1 = SmtAffineTerm::from_summand(one.clone(), x, int)
        .add_constant(&BigRational::from_integer((-1).into()));
    let t1 = a1.to_term(&mut tm);
    let zero = tm.mk_int(0);
    let le1 = tm.mk_le(t1, zero);
    let q1 = tm.mk_quoted(le1, QuoteKind::Plain);
    let l1 = tm.mk_not(q1);
    let a2 = SmtAffineTerm::from_summand(-one, x, int)
        .add_constant(&BigRational::from_integer(2.into()));
    let t2 = a2.to_term(&mut tm);
    let le2 = tm.mk_le(t2, zero);
    let q2 = tm.mk_quoted(le2, QuoteKind::Plain);
    let l2 = tm.mk_not(q2);
    let clause = tm.mk_or(&[l1, l2]);
    let coeffs = vec![Rational::one(), Rational::one()];
    assert!(check_lemma(&mut tm, LemmaKind::La(coeffs), clause));
    // flipped coefficients do not cancel the variable
    let coeffs = vec![Rational::one(), Rational::from_integer(2)];
    assert!(!check_lemma(&mut tm, LemmaKind::La(coeffs), clause));
}

#[test]
fn test_cc_lemma_paths() {
    let mut tm = TermManager::new();
    let u = tm.sorts.declare();
    let a = tm.declare_const("a", u);
    let b = tm.declare_const("b", u);
    let c = tm.declare_const("c", u);
    let ab = tm.mk_eq(a, b);
    let bc = tm.mk_eq(b, c);
    let ac = tm.mk_eq(a, c);
    let qab = tm.mk_quoted(ab, QuoteKind::Cc);
    let qbc = tm.mk_quoted(bc, QuoteKind::Cc);
    let qac = tm.mk_quoted(ac, QuoteKind::Cc);
    let nab = tm.mk_not(qab);
    let nbc = tm.mk_not(qbc);
    let clause = tm.mk_or(&[qac, nab, nbc]);
    let kind = LemmaKind::Cc {
        goal: Some(ac),
        paths: vec![LemmaPath {
            weak_index: None,
            terms: vec![a, b, c],
        }],
    };
    assert!(check_lemma(&mut tm, kind, clause));
    // a path step with no covering literal is rejected
    let d = tm.declare_const("d", u);
    let kind = LemmaKind::Cc {
        goal: Some(ac),
        paths: vec![LemmaPath {
            weak_index: None,
            terms: vec![a, d, c],
        }],
    };
    assert!(!check_lemma(&mut tm, kind, clause));
}

/// Pin (spec): an array `:subpath` whose store step has no covering
/// weak path is an "unexplained equality" error, even though a
/// degenerate reading might accept it.
#[test]
fn test_array_subpath_without_weakpath_is_rejected() {
    let mut tm = TermManager::new();
    let int = tm.sorts.int_sort;
    let arr = tm.sorts.array(int, int);
    let a = tm.declare_const("a", arr);
    let i = tm.declare_const("i", int);
    let v = tm.declare_const("v", int);
    let st = tm.mk_store(a, i, v);
    let goal = tm.mk_eq(st, a);
    let qgoal = tm.mk_quoted(goal, QuoteKind::Cc);
    let clause = tm.mk_or(&[qgoal]);
    // main subpath [store(a,i,v), a] with no :weakpath for index i
    let kind = LemmaKind::Cc {
        goal: Some(goal),
        paths: vec![LemmaPath {
            weak_index: None,
            terms: vec![st, a],
        }],
    };
    assert!(!check_lemma(&mut tm, kind, clause));
}

/// Pin (spec): the `:EQ` lemma reads each literal's own parameters;
/// two literals over genuinely different affine forms must be rejected
/// (a checker that reuses the first literal's parameters would accept
/// them).
#[test]
fn test_eq_lemma_reads_both_literals() {
    let mut tm = TermManager::new();
    let int = tm.sorts.int_sort;
    let x = tm.declare_const("x", int);
    let y = tm.declare_const("y", int);
    let z = tm.declare_const("z", int);
    let zero = tm.mk_int(0);
    // matching pair: (= (x - y) 0) and scaled negation
    let diff = SmtAffineTerm::from_term(&tm, x).add(&SmtAffineTerm::from_term(&tm, y).negate());
    let d1 = diff.to_term(&mut tm);
    let eq1 = tm.mk_eq(d1, zero);
    let scaled = diff.clone().mul(&BigRational::from_integer((-2).into()));
    let d2 = scaled.to_term(&mut tm);
    let eq2 = tm.mk_eq(d2, zero);
    let q1 = tm.mk_quoted(eq1, QuoteKind::Plain);
    let q2 = tm.mk_quoted(eq2, QuoteKind::Plain);
    let nq2 = tm.mk_not(q2);
    let good = tm.mk_or(&[q1, nq2]);
    assert!(check_lemma(&mut tm, LemmaKind::Eq, good));
    // a second literal over a different variable must be rejected
    let diff_z = SmtAffineTerm::from_term(&tm, x).add(&SmtAffineTerm::from_term(&tm, z).negate());
    let d3 = diff_z.to_term(&mut tm);
    let eq3 = tm.mk_eq(d3, zero);
    let q3 = tm.mk_quoted(eq3, QuoteKind::Plain);
    let nq3 = tm.mk_not(q3);
    let bad = tm.mk_or(&[q1, nq3]);
    assert!(!check_lemma(&mut tm, LemmaKind::Eq, bad));
}

#[test]
fn test_resolution_and_clause_nodes() {
    let mut tm = TermManager::new();
    let p = tm.declare_const("p", tm.sorts.bool_sort);
    let q = tm.declare_const("q", tm.sorts.bool_sort);
    let np = tm.mk_not(p);
    let c1 = tm.mk_or(&[p, q]);
    let mut arena = ProofArena::new();
    let a1 = arena.alloc(ProofNode::Asserted(c1));
    let a2 = arena.alloc(ProofNode::Asserted(np));
    let res = arena.alloc(ProofNode::Res {
        main: a1,
        steps: Box::new([(np, a2)]),
    });
    let mut checker = ProofChecker::new(&mut tm, &arena, &[c1, np]);
    let proved = checker.walk(res);
    assert_eq!(proved, q);
    assert!(checker.errors().is_empty(), "{:?}", checker.errors());
}

#[test]
fn test_full_refutation_checks() {
    // (or p) with (not p): @res closes to false
    let mut tm = TermManager::new();
    let p = tm.declare_const("p", tm.sorts.bool_sort);
    let np = tm.mk_not(p);
    let mut arena = ProofArena::new();
    let a1 = arena.alloc(ProofNode::Asserted(p));
    let a2 = arena.alloc(ProofNode::Asserted(np));
    let res = arena.alloc(ProofNode::Res {
        main: a1,
        steps: Box::new([(np, a2)]),
    });
    let mut checker = ProofChecker::new(&mut tm, &arena, &[p, np]);
    assert!(checker.check(res));
}
