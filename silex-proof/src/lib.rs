//! Proof production and checking for the silex SMT engine.
//!
//! - [`node`] — the proof-term arena: one tagged variant per rule
//!   (`@res`, `@eq`, `@cong`, `@trans`, `@refl`, `@lemma`, `@tautology`,
//!   `@asserted`, `@rewrite`, `@intern`, `@clause`, `@split`).
//! - [`tracker`] — the producer that annotates every compiler and
//!   clausifier step with a proof object.
//! - [`checker`] — the independent checker that recomputes the proved
//!   formula of every node and validates each rule against its
//!   published semantics, continuing past failures.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod checker;
pub mod node;
pub mod rules;
pub mod tracker;

pub use checker::ProofChecker;
pub use node::{LemmaKind, LemmaPath, ProofArena, ProofId, ProofNode};
pub use rules::{RewriteRule, SplitRule, TautRule};
pub use tracker::{ProofTracker, Tracked};
