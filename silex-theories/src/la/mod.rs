//! Linear arithmetic over rationals and integers.
//!
//! The decision procedure of Dutertre and de Moura: a tableau of sparse
//! rows over slack variables, bounds asserted through reason chains,
//! simplex repair with a Bland's-rule fallback, bound-refinement
//! propagation, Gomory cuts for integrality, and Farkas-annotated
//! conflict clauses.

mod atoms;
mod cut;
mod linvar;
mod matrix;
mod reason;
mod solver;

pub use atoms::{AtomId, AtomTable, LaAtom, LaAtomKind};
pub use linvar::LinVar;
pub use matrix::{Matrix, VarId};
pub use reason::{LaReason, ReasonArena, ReasonId, ReasonKind};
pub use solver::{LaStats, LinArSolver, SharedVar};
