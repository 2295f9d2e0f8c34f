//! Integration tests for the linear-arithmetic solver: bound conflicts,
//! bound refinement over slack rows, and backtracking.

use silex_core::{Cancel, TermManager};
use silex_math::{InfNumber, Rational};
use silex_theories::la::LinArSolver;
use silex_theories::{LemmaAnnotation, TheoryClause, VarPool};

fn solver() -> LinArSolver {
    LinArSolver::new(VarPool::new(), Cancel::new(), 8, 64)
}

#[test]
fn test_direct_bound_conflict() {
    let mut tm = TermManager::new();
    let mut la = solver();
    let x_term = tm.declare_const("x", tm.sorts.int_sort);
    let x = la.add_external_var(x_term, true, tm.sorts.int_sort, 0);

    // x <= 1
    let le = la.generate_constraint(vec![(x, Rational::one())], Rational::minus_one(), false);
    // 2x >= 5, which floors to x >= 3 on integers
    let ge = la.generate_constraint(
        vec![(x, Rational::from_integer(-2))],
        Rational::from_integer(5),
        false,
    );
    assert!(la.set_literal(le).unwrap().is_none());
    let conflict = la.set_literal(ge).unwrap().expect("bound conflict");
    assert_eq!(conflict.lits.len(), 2);
    match conflict.annot {
        LemmaAnnotation::La(coeffs) => assert_eq!(coeffs.len(), 2),
        other => panic!("expected :LA annotation, got {:?}", other),
    }
}

#[test]
fn test_bound_refinement_over_slack_row() {
    let mut tm = TermManager::new();
    let mut la = solver();
    let x_term = tm.declare_const("x", tm.sorts.real_sort);
    let y_term = tm.declare_const("y", tm.sorts.real_sort);
    let x = la.add_external_var(x_term, false, tm.sorts.real_sort, 0);
    let y = la.add_external_var(y_term, false, tm.sorts.real_sort, 0);

    // x + y <= 0, x >= 1, y >= 1: the slack row refines to 2 <= x+y
    let sum_le = la.generate_constraint(
        vec![(x, Rational::one()), (y, Rational::one())],
        Rational::zero(),
        false,
    );
    let x_ge = la.generate_constraint(vec![(x, Rational::minus_one())], Rational::one(), false);
    let y_ge = la.generate_constraint(vec![(y, Rational::minus_one())], Rational::one(), false);

    let mut conflict: Option<TheoryClause> = None;
    for lit in [sum_le, x_ge, y_ge] {
        if conflict.is_none() {
            conflict = la.set_literal(lit).unwrap();
        }
    }
    if conflict.is_none() {
        conflict = la.checkpoint().unwrap();
    }
    let conflict = conflict.expect("composite bound conflict");
    assert!(conflict.lits.len() >= 3);
    match conflict.annot {
        LemmaAnnotation::La(coeffs) => assert_eq!(coeffs.len(), conflict.lits.len()),
        other => panic!("expected :LA annotation, got {:?}", other),
    }
}

#[test]
fn test_satisfiable_bounds_and_values() {
    let mut tm = TermManager::new();
    let mut la = solver();
    let x_term = tm.declare_const("x", tm.sorts.real_sort);
    let x = la.add_external_var(x_term, false, tm.sorts.real_sort, 0);

    let le = la.generate_constraint(vec![(x, Rational::one())], Rational::from_integer(-3), false);
    let ge = la.generate_constraint(vec![(x, Rational::minus_one())], Rational::one(), false);
    assert!(la.set_literal(le).unwrap().is_none());
    assert!(la.set_literal(ge).unwrap().is_none());
    la.start_check(false).unwrap();
    assert!(la.checkpoint().unwrap().is_none());
    assert!(la.compute_conflict_clause().unwrap().is_none());
    la.end_check();

    assert_eq!(la.upper_bound(x), InfNumber::from_rational(Rational::from_integer(3)));
    assert_eq!(la.lower_bound(x), InfNumber::from_rational(Rational::one()));
    let value = la.exact_value(x);
    assert!(value.real >= Rational::one());
    assert!(value.real <= Rational::from_integer(3));
}

#[test]
fn test_backtrack_restores_bounds() {
    let mut tm = TermManager::new();
    let mut la = solver();
    let x_term = tm.declare_const("x", tm.sorts.real_sort);
    let x = la.add_external_var(x_term, false, tm.sorts.real_sort, 0);

    let le = la.generate_constraint(vec![(x, Rational::one())], Rational::from_integer(-3), false);
    assert!(la.set_literal(le).unwrap().is_none());
    assert_eq!(
        la.upper_bound(x),
        InfNumber::from_rational(Rational::from_integer(3))
    );
    la.backtrack_literal(le);
    assert!(la.upper_bound(x).is_infinite());
    // re-asserting works after the retraction
    assert!(la.set_literal(le).unwrap().is_none());
    assert_eq!(
        la.upper_bound(x),
        InfNumber::from_rational(Rational::from_integer(3))
    );
}

#[test]
fn test_strict_bounds_use_epsilon() {
    let mut tm = TermManager::new();
    let mut la = solver();
    let x_term = tm.declare_const("x", tm.sorts.real_sort);
    let x = la.add_external_var(x_term, false, tm.sorts.real_sort, 0);

    // x < 3 becomes the bound 3 - eps
    let lt = la.generate_constraint(vec![(x, Rational::one())], Rational::from_integer(-3), true);
    assert!(la.set_literal(lt).unwrap().is_none());
    let ub = la.upper_bound(x);
    assert_eq!(ub.real, Rational::from_integer(3));
    assert_eq!(ub.eps, -1);

    // x > 3 on top is a conflict with Farkas coefficients
    let gt = la.generate_constraint(vec![(x, Rational::minus_one())], Rational::from_integer(3), true);
    let conflict = la.set_literal(gt).unwrap().expect("strict conflict");
    match conflict.annot {
        LemmaAnnotation::La(coeffs) => assert_eq!(coeffs.len(), conflict.lits.len()),
        other => panic!("expected :LA annotation, got {:?}", other),
    }
}

#[test]
fn test_push_pop_discards_variables() {
    let mut tm = TermManager::new();
    let mut la = solver();
    let x_term = tm.declare_const("x", tm.sorts.real_sort);
    let x = la.add_external_var(x_term, false, tm.sorts.real_sort, 0);
    let before = la.num_vars();

    la.push();
    let y_term = tm.declare_const("y", tm.sorts.real_sort);
    let y = la.add_external_var(y_term, false, tm.sorts.real_sort, 1);
    let sum = la.generate_constraint(
        vec![(x, Rational::one()), (y, Rational::one())],
        Rational::zero(),
        false,
    );
    assert!(la.set_literal(sum).unwrap().is_none());
    assert!(la.num_vars() > before + 1);
    la.backtrack_literal(sum);
    la.pop().unwrap();
    assert_eq!(la.num_vars(), before);
    let _ = y;
}
