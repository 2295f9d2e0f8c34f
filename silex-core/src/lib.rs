//! Core types for the silex SMT engine.
//!
//! This crate provides the foundation the theory solvers, the proof
//! framework and the CDCL engine build on:
//! - a hash-consed term DAG with [`TermId`] identity equality,
//! - interned sorts,
//! - the canonical affine form [`SmtAffineTerm`],
//! - packed DPLL literals,
//! - configuration, the shared error type and a cancellation token.
//!
//! # Example
//!
//! ```
//! use silex_core::term::{Op, TermManager};
//!
//! let mut tm = TermManager::new();
//! let x = tm.declare_const("x", tm.sorts.int_sort);
//! let zero = tm.mk_int(0);
//! let atom = tm.mk_le(x, zero);
//! assert_eq!(atom, tm.mk_app(Op::Le, &[x, zero]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod affine;
pub mod cancel;
pub mod config;
pub mod error;
pub mod literal;
pub mod sort;
pub mod term;

pub use affine::SmtAffineTerm;
pub use cancel::Cancel;
pub use config::Config;
pub use error::{Result, SilexError};
pub use literal::{Lit, Var};
pub use sort::{SortId, SortKind, SortTable};
pub use term::{FuncDecl, FuncDef, FuncId, Op, QuoteKind, TermId, TermKind, TermManager};
