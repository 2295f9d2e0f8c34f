//! End-to-end scenarios over the full stack: compile, clausify, search,
//! prove, check.

use silex_core::{Config, Op};
use silex_solver::{SatResult, Solver, Value};

fn proof_solver() -> Solver {
    Solver::new(Config::with_proofs())
}

/// `(or a false)` and `(not a)` refute each other purely at the
/// Boolean level.
#[test]
fn test_or_false_unsat() {
    let mut solver = proof_solver();
    let tm = solver.terms();
    let a = tm.declare_const("a", tm.sorts.bool_sort);
    let f = tm.mk_false();
    let or = tm.mk_or(&[a, f]);
    let not_a = tm.mk_not(a);
    solver.assert_formula(or).unwrap();
    solver.assert_formula(not_a).unwrap();
    assert_eq!(solver.check_sat(), SatResult::Unsat);
    assert_eq!(solver.check_proof(), Some(true));
    let proof = solver.proof_sexpr().expect("proof");
    assert!(proof.contains("@asserted"), "proof: {}", proof);
    assert!(proof.contains("@res"), "proof: {}", proof);
}

/// `(< x 0)` against `(= x 0)`: the equality link and a Farkas step.
#[test]
fn test_reflexive_inequality_unsat() {
    let mut solver = proof_solver();
    let tm = solver.terms();
    let x = tm.declare_const("x", tm.sorts.real_sort);
    let zero = tm.mk_const(num_rational::BigRational::from_integer(0.into()), tm.sorts.real_sort);
    let lt = tm.mk_app(Op::Lt, &[x, zero]);
    let eq = tm.mk_eq(x, zero);
    solver.assert_formula(lt).unwrap();
    solver.assert_formula(eq).unwrap();
    assert_eq!(solver.check_sat(), SatResult::Unsat);
    assert_eq!(solver.check_proof(), Some(true));
    let proof = solver.proof_sexpr().expect("proof");
    assert!(proof.contains(":LA") || proof.contains(":EQ"), "proof: {}", proof);
}

/// Array closure: `(= i j)` with
/// `(not (= (select (store a i v) j) v))`.
#[test]
fn test_array_closure_unsat() {
    let mut solver = proof_solver();
    let tm = solver.terms();
    let int = tm.sorts.int_sort;
    let arr = tm.sorts.array(int, int);
    let a = tm.declare_const("a", arr);
    let i = tm.declare_const("i", int);
    let j = tm.declare_const("j", int);
    let v = tm.declare_const("v", int);
    let st = tm.mk_store(a, i, v);
    let sel = tm.mk_select(st, j);
    let eq_ij = tm.mk_eq(i, j);
    let sel_eq = tm.mk_eq(sel, v);
    let neg = tm.mk_not(sel_eq);
    solver.assert_formula(eq_ij).unwrap();
    solver.assert_formula(neg).unwrap();
    assert_eq!(solver.check_sat(), SatResult::Unsat);
    assert_eq!(solver.check_proof(), Some(true));
}

/// The select-over-store rewrite with constant indices closes the
/// sibling of the array scenario entirely inside the compiler.
#[test]
fn test_select_over_store_rewrite() {
    let mut solver = proof_solver();
    let tm = solver.terms();
    let int = tm.sorts.int_sort;
    let arr = tm.sorts.array(int, int);
    let a = tm.declare_const("a", arr);
    let one = tm.mk_int(1);
    let v = tm.declare_const("v", int);
    let st = tm.mk_store(a, one, v);
    let sel = tm.mk_select(st, one);
    let eq = tm.mk_eq(sel, v);
    let neg = tm.mk_not(eq);
    solver.assert_formula(neg).unwrap();
    assert_eq!(solver.check_sat(), SatResult::Unsat);
    assert_eq!(solver.check_proof(), Some(true));
    let proof = solver.proof_sexpr().expect("proof");
    assert!(proof.contains(":selectOverStore"), "proof: {}", proof);
}

/// Trichotomy: `x != y`, `not (x < y)`, `not (y < x)`.
#[test]
fn test_trichotomy_unsat() {
    let mut solver = proof_solver();
    let tm = solver.terms();
    let real = tm.sorts.real_sort;
    let x = tm.declare_const("x", real);
    let y = tm.declare_const("y", real);
    let eq = tm.mk_eq(x, y);
    let neq = tm.mk_not(eq);
    let lt_xy = tm.mk_app(Op::Lt, &[x, y]);
    let not_lt_xy = tm.mk_not(lt_xy);
    let lt_yx = tm.mk_app(Op::Lt, &[y, x]);
    let not_lt_yx = tm.mk_not(lt_yx);
    solver.assert_formula(neq).unwrap();
    solver.assert_formula(not_lt_xy).unwrap();
    solver.assert_formula(not_lt_yx).unwrap();
    assert_eq!(solver.check_sat(), SatResult::Unsat);
    assert_eq!(solver.check_proof(), Some(true));
    let proof = solver.proof_sexpr().expect("proof");
    assert!(proof.contains(":trichotomy"), "proof: {}", proof);
}

/// The integer gap `x <= 1`, `x >= 2`.
#[test]
fn test_integer_gap_unsat() {
    let mut solver = proof_solver();
    let tm = solver.terms();
    let x = tm.declare_const("x", tm.sorts.int_sort);
    let one = tm.mk_int(1);
    let two = tm.mk_int(2);
    let le = tm.mk_le(x, one);
    let ge = tm.mk_app(Op::Ge, &[x, two]);
    solver.assert_formula(le).unwrap();
    solver.assert_formula(ge).unwrap();
    assert_eq!(solver.check_sat(), SatResult::Unsat);
    assert_eq!(solver.check_proof(), Some(true));
    let proof = solver.proof_sexpr().expect("proof");
    assert!(proof.contains(":LA"), "proof: {}", proof);
}

/// Sat with a model: `x <= 3`, `x >= 1`, `y = x + 1`.
#[test]
fn test_sat_with_model() {
    let mut solver = Solver::with_defaults();
    let tm = solver.terms();
    let int = tm.sorts.int_sort;
    let x = tm.declare_const("x", int);
    let y = tm.declare_const("y", int);
    let one = tm.mk_int(1);
    let three = tm.mk_int(3);
    let le = tm.mk_le(x, three);
    let ge = tm.mk_app(Op::Ge, &[x, one]);
    let x_plus_1 = tm.mk_app(Op::Add, &[x, one]);
    let eq = tm.mk_eq(y, x_plus_1);
    solver.assert_formula(le).unwrap();
    solver.assert_formula(ge).unwrap();
    solver.assert_formula(eq).unwrap();
    assert_eq!(solver.check_sat(), SatResult::Sat);
    let model = solver.model().expect("model");
    let tm = solver.terms();
    let vx = match model.eval(tm, x) {
        Some(Value::Num(q)) => q,
        other => panic!("no numeric value for x: {:?}", other),
    };
    assert!(vx >= silex_math::Rational::from_integer(1));
    assert!(vx <= silex_math::Rational::from_integer(3));
    let le2 = model.eval(tm, le);
    assert_eq!(le2, Some(Value::Bool(true)));
    let ge2 = model.eval(tm, ge);
    assert_eq!(ge2, Some(Value::Bool(true)));
    let eq2 = model.eval(tm, eq);
    assert_eq!(eq2, Some(Value::Bool(true)));
}

/// A defined function expands through `:expandDef`:
/// `double(x) = x + x`, so `double(3) <= 5` folds to `false`.
#[test]
fn test_defined_function_expansion() {
    let mut solver = proof_solver();
    let tm = solver.terms();
    let int = tm.sorts.int_sort;
    let u = tm.declare_const("u", int);
    let body = tm.mk_app(Op::Add, &[u, u]);
    let double = tm.define_fun("double", vec![u], int, body);
    let three = tm.mk_int(3);
    let app = tm.mk_app(Op::Func(double), &[three]);
    let five = tm.mk_int(5);
    let le = tm.mk_le(app, five);
    solver.assert_formula(le).unwrap();
    assert_eq!(solver.check_sat(), SatResult::Unsat);
    assert_eq!(solver.check_proof(), Some(true));
    let proof = solver.proof_sexpr().expect("proof");
    assert!(proof.contains(":expandDef"), "proof: {}", proof);
}

/// Congruence over uninterpreted functions.
#[test]
fn test_uf_congruence_unsat() {
    let mut solver = proof_solver();
    let tm = solver.terms();
    let u = tm.sorts.declare();
    let f = tm.declare_fun("f", vec![u], u);
    let a = tm.declare_const("a", u);
    let b = tm.declare_const("b", u);
    let fa = tm.mk_app(Op::Func(f), &[a]);
    let fb = tm.mk_app(Op::Func(f), &[b]);
    let eq_ab = tm.mk_eq(a, b);
    let eq_f = tm.mk_eq(fa, fb);
    let neg = tm.mk_not(eq_f);
    solver.assert_formula(eq_ab).unwrap();
    solver.assert_formula(neg).unwrap();
    assert_eq!(solver.check_sat(), SatResult::Unsat);
    assert_eq!(solver.check_proof(), Some(true));
    let proof = solver.proof_sexpr().expect("proof");
    assert!(proof.contains(":CC"), "proof: {}", proof);
}

/// Push/pop leaves the engine reusable: an unsat scope pops back to a
/// sat state.
#[test]
fn test_push_pop_roundtrip() {
    let mut solver = Solver::with_defaults();
    let tm = solver.terms();
    let x = tm.declare_const("x", tm.sorts.int_sort);
    let one = tm.mk_int(1);
    let three = tm.mk_int(3);
    let le = tm.mk_le(x, three);
    solver.assert_formula(le).unwrap();
    assert_eq!(solver.check_sat(), SatResult::Sat);

    solver.push();
    let tm = solver.terms();
    let ge = tm.mk_app(Op::Ge, &[x, one]);
    let lt_zero = {
        let zero = tm.mk_int(0);
        tm.mk_app(Op::Lt, &[x, zero])
    };
    solver.assert_formula(ge).unwrap();
    solver.assert_formula(lt_zero).unwrap();
    assert_eq!(solver.check_sat(), SatResult::Unsat);
    solver.pop().unwrap();

    assert_eq!(solver.check_sat(), SatResult::Sat);
}

/// A propositional chain through proxy literals: `(or p q)`, `(not p)`,
/// `(not q)`.
#[test]
fn test_boolean_chain_unsat() {
    let mut solver = proof_solver();
    let tm = solver.terms();
    let p = tm.declare_const("p", tm.sorts.bool_sort);
    let q = tm.declare_const("q", tm.sorts.bool_sort);
    let or = tm.mk_or(&[p, q]);
    let np = tm.mk_not(p);
    let nq = tm.mk_not(q);
    solver.assert_formula(or).unwrap();
    solver.assert_formula(np).unwrap();
    solver.assert_formula(nq).unwrap();
    assert_eq!(solver.check_sat(), SatResult::Unsat);
    assert_eq!(solver.check_proof(), Some(true));
}

/// Strict real bounds meet in the middle: `x > 0` and `x < 1` is sat
/// thanks to the infinitesimal bound encoding.
#[test]
fn test_open_interval_sat() {
    let mut solver = Solver::with_defaults();
    let tm = solver.terms();
    let real = tm.sorts.real_sort;
    let x = tm.declare_const("x", real);
    let zero = tm.mk_const(num_rational::BigRational::from_integer(0.into()), real);
    let one = tm.mk_const(num_rational::BigRational::from_integer(1.into()), real);
    let gt = tm.mk_app(Op::Gt, &[x, zero]);
    let lt = tm.mk_app(Op::Lt, &[x, one]);
    solver.assert_formula(gt).unwrap();
    solver.assert_formula(lt).unwrap();
    assert_eq!(solver.check_sat(), SatResult::Sat);
    let model = solver.model().expect("model");
    let tm = solver.terms();
    match model.eval(tm, x) {
        Some(Value::Num(q)) => {
            assert!(q > silex_math::Rational::zero());
            assert!(q < silex_math::Rational::one());
        }
        other => panic!("no numeric value for x: {:?}", other),
    }
}
