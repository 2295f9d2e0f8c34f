//! The silex SMT engine: CDCL(T) over linear arithmetic, uninterpreted
//! functions and arrays, with machine-checkable proofs.
//!
//! The [`Solver`] façade accepts typed assertions over the term DAG,
//! answers sat/unsat/unknown, and on demand produces a refutation proof
//! (independently re-checked by `silex-proof`) or a model.
//!
//! # Example
//!
//! ```
//! use silex_solver::{SatResult, Solver};
//!
//! let mut solver = Solver::with_defaults();
//! let tm = solver.terms();
//! let x = tm.declare_const("x", tm.sorts.int_sort);
//! let one = tm.mk_int(1);
//! let two = tm.mk_int(2);
//! // x <= 1 and x >= 2 is an integer gap
//! let le = tm.mk_le(x, one);
//! let ge = tm.mk_app(silex_core::Op::Ge, &[x, two]);
//! solver.assert_formula(le).unwrap();
//! solver.assert_formula(ge).unwrap();
//! assert_eq!(solver.check_sat(), SatResult::Unsat);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod clausifier;
pub mod compiler;
pub mod dpll;
pub mod model;
pub mod solver;
pub mod theory;

pub use compiler::Compiler;
pub use model::{Model, Value};
pub use solver::{ReasonUnknown, SatResult, Solver};
pub use theory::TheoryFront;
