//! Exact arithmetic for the silex SMT engine.
//!
//! Two number types back the linear-arithmetic core:
//! - [`Rational`] — arbitrary-precision rationals extended with `-inf` and
//!   `+inf` sentinels (unasserted bounds),
//! - [`InfNumber`] / [`ExactInfNumber`] — rationals extended with a
//!   symbolic positive infinitesimal used to encode strict bounds
//!   (`x < c` becomes `x <= c - eps`).

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod infinitesimal;
pub mod rational;

pub use infinitesimal::{ExactInfNumber, InfNumber};
pub use rational::Rational;
