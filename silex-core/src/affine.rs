//! Canonical affine forms `sum c_i * t_i + c` over term ids.
//!
//! The compiler flattens arithmetic into this representation before
//! re-emitting a canonical sum term, and the proof checker recomputes the
//! same form to validate `:canonicalSum`, `:LA` lemmas and `@intern`
//! normalizations. Summands are kept in a `BTreeMap` ordered by term id,
//! which fixes the canonical argument order.

use crate::sort::SortId;
use crate::term::{Op, TermId, TermKind, TermManager};
use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use std::collections::BTreeMap;

/// An affine combination of terms with rational coefficients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtAffineTerm {
    summands: BTreeMap<TermId, BigRational>,
    constant: BigRational,
    sort: SortId,
}

impl SmtAffineTerm {
    /// The zero affine term of the given sort.
    pub fn zero(sort: SortId) -> Self {
        SmtAffineTerm {
            summands: BTreeMap::new(),
            constant: BigRational::zero(),
            sort,
        }
    }

    /// A constant affine term.
    pub fn constant(value: BigRational, sort: SortId) -> Self {
        SmtAffineTerm {
            summands: BTreeMap::new(),
            constant: value,
            sort,
        }
    }

    /// A single summand `coeff * term`.
    pub fn from_summand(coeff: BigRational, term: TermId, sort: SortId) -> Self {
        let mut summands = BTreeMap::new();
        if !coeff.is_zero() {
            summands.insert(term, coeff);
        }
        SmtAffineTerm {
            summands,
            constant: BigRational::zero(),
            sort,
        }
    }

    /// Flatten a term into affine form. Descends only into `+`, `-`, `*`,
    /// `/` (with constant divisor), `to_real` and constants; anything else
    /// becomes an atomic summand.
    pub fn from_term(tm: &TermManager, t: TermId) -> Self {
        let sort = tm.sort(t);
        match tm.kind(t) {
            TermKind::Const(q) => SmtAffineTerm::constant(q.clone(), sort),
            TermKind::App(Op::Add, args) => {
                let mut sum = SmtAffineTerm::zero(sort);
                for &a in args.iter() {
                    sum = sum.add(&SmtAffineTerm::from_term(tm, a));
                }
                sum
            }
            TermKind::App(Op::Sub, args) => {
                let mut sum = SmtAffineTerm::from_term(tm, args[0]);
                if args.len() == 1 {
                    sum = sum.negate();
                } else {
                    for &a in args[1..].iter() {
                        sum = sum.add(&SmtAffineTerm::from_term(tm, a).negate());
                    }
                }
                sum.with_sort(sort)
            }
            TermKind::App(Op::Mul, args) => {
                let mut prod = SmtAffineTerm::from_term(tm, args[0]);
                for &a in args[1..].iter() {
                    let other = SmtAffineTerm::from_term(tm, a);
                    if prod.is_constant() {
                        prod = other.mul(&prod.constant);
                    } else if other.is_constant() {
                        prod = prod.mul(&other.constant);
                    } else {
                        // non-linear product stays atomic
                        return SmtAffineTerm::from_summand(BigRational::one(), t, sort);
                    }
                }
                prod.with_sort(sort)
            }
            TermKind::App(Op::Divide, args) => {
                let mut quot = SmtAffineTerm::from_term(tm, args[0]);
                for &a in args[1..].iter() {
                    let other = SmtAffineTerm::from_term(tm, a);
                    if other.is_constant() && !other.constant.is_zero() {
                        quot = quot.mul(&other.constant.recip());
                    } else {
                        return SmtAffineTerm::from_summand(BigRational::one(), t, sort);
                    }
                }
                quot.with_sort(sort)
            }
            TermKind::App(Op::ToReal, args) => {
                SmtAffineTerm::from_term(tm, args[0]).with_sort(sort)
            }
            _ => SmtAffineTerm::from_summand(BigRational::one(), t, sort),
        }
    }

    /// Change the nominal sort (Int to Real typecast).
    pub fn with_sort(mut self, sort: SortId) -> Self {
        self.sort = sort;
        self
    }

    /// The nominal sort.
    pub fn sort(&self) -> SortId {
        self.sort
    }

    /// Is this a plain constant?
    pub fn is_constant(&self) -> bool {
        self.summands.is_empty()
    }

    /// The constant part.
    pub fn constant_part(&self) -> &BigRational {
        &self.constant
    }

    /// The summands in canonical order.
    pub fn summands(&self) -> impl Iterator<Item = (TermId, &BigRational)> {
        self.summands.iter().map(|(&t, c)| (t, c))
    }

    /// The number of summands.
    pub fn num_summands(&self) -> usize {
        self.summands.len()
    }

    /// Are all coefficients and the constant integers?
    pub fn is_integral(&self) -> bool {
        self.constant.is_integer() && self.summands.values().all(|c| c.is_integer())
    }

    /// Pointwise sum.
    pub fn add(mut self, other: &SmtAffineTerm) -> SmtAffineTerm {
        for (&t, c) in &other.summands {
            let entry = self.summands.entry(t).or_insert_with(BigRational::zero);
            *entry += c;
            if entry.is_zero() {
                self.summands.remove(&t);
            }
        }
        self.constant += &other.constant;
        self
    }

    /// Add a rational constant.
    pub fn add_constant(mut self, c: &BigRational) -> SmtAffineTerm {
        self.constant += c;
        self
    }

    /// Negation.
    pub fn negate(mut self) -> SmtAffineTerm {
        for c in self.summands.values_mut() {
            *c = -&*c;
        }
        self.constant = -self.constant;
        self
    }

    /// Scale by a rational.
    pub fn mul(mut self, factor: &BigRational) -> SmtAffineTerm {
        if factor.is_zero() {
            self.summands.clear();
            self.constant = BigRational::zero();
            return self;
        }
        for c in self.summands.values_mut() {
            *c *= factor;
        }
        self.constant *= factor;
        self
    }

    /// Divide by a non-zero rational.
    pub fn div(self, divisor: &BigRational) -> SmtAffineTerm {
        debug_assert!(!divisor.is_zero());
        self.mul(&divisor.recip())
    }

    /// The positive gcd of the summand coefficients
    /// (`gcd(a/b, c/d) = gcd(a,c)/lcm(b,d)`); one for constants.
    pub fn gcd(&self) -> BigRational {
        let mut num = BigInt::zero();
        let mut den = BigInt::one();
        for c in self.summands.values() {
            num = num.gcd(&c.numer().abs());
            den = den.lcm(c.denom());
        }
        if num.is_zero() {
            BigRational::one()
        } else {
            BigRational::new(num, den)
        }
    }

    /// Divide through by the gcd of the summand coefficients.
    pub fn normalize_gcd(self) -> SmtAffineTerm {
        let g = self.gcd();
        self.div(&g)
    }

    /// Does `self` equal `other` or its negation after gcd normalization?
    /// (The `:EQ` lemma comparison.)
    pub fn matches_up_to_sign(&self, other: &SmtAffineTerm) -> bool {
        let a = self.clone().normalize_gcd();
        let b = other.clone().normalize_gcd();
        a == b || a == b.clone().negate()
    }

    /// Emit the canonical sum term: summands in term-id order, each as
    /// `t` or `(* c t)`, with a trailing constant when non-zero.
    pub fn to_term(&self, tm: &mut TermManager) -> TermId {
        if self.summands.is_empty() {
            return tm.mk_const(self.constant.clone(), self.sort);
        }
        let mut parts: Vec<TermId> = Vec::with_capacity(self.summands.len() + 1);
        for (&t, c) in &self.summands {
            if c.is_one() {
                parts.push(t);
            } else {
                let c_term = tm.mk_const(c.clone(), self.sort);
                parts.push(tm.mk_app(Op::Mul, &[c_term, t]));
            }
        }
        if !self.constant.is_zero() {
            parts.push(tm.mk_const(self.constant.clone(), self.sort));
        }
        if parts.len() == 1 {
            parts[0]
        } else {
            tm.mk_app(Op::Add, &parts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (TermManager, TermId, TermId) {
        let mut tm = TermManager::new();
        let x = tm.declare_const("x", tm.sorts.int_sort);
        let y = tm.declare_const("y", tm.sorts.int_sort);
        (tm, x, y)
    }

    #[test]
    fn test_flatten_sum() {
        let (mut tm, x, y) = setup();
        // (+ x (* 2 y) 3)
        let two = tm.mk_int(2);
        let three = tm.mk_int(3);
        let two_y = tm.mk_app(Op::Mul, &[two, y]);
        let sum = tm.mk_app(Op::Add, &[x, two_y, three]);
        let affine = SmtAffineTerm::from_term(&tm, sum);
        assert_eq!(affine.num_summands(), 2);
        assert_eq!(*affine.constant_part(), BigRational::from_integer(3.into()));
    }

    #[test]
    fn test_sub_cancels() {
        let (mut tm, x, _) = setup();
        let sub = tm.mk_app(Op::Sub, &[x, x]);
        let affine = SmtAffineTerm::from_term(&tm, sub);
        assert!(affine.is_constant());
        assert!(affine.constant_part().is_zero());
    }

    #[test]
    fn test_roundtrip_canonical() {
        let (mut tm, x, y) = setup();
        let two = tm.mk_int(2);
        let two_y = tm.mk_app(Op::Mul, &[two, y]);
        let sum = tm.mk_app(Op::Add, &[two_y, x]);
        let affine = SmtAffineTerm::from_term(&tm, sum);
        let canon = affine.to_term(&mut tm);
        let reparsed = SmtAffineTerm::from_term(&tm, canon);
        assert_eq!(affine, reparsed);
        // same affine content regardless of original argument order
        let sum2 = tm.mk_app(Op::Add, &[x, two_y]);
        assert_eq!(SmtAffineTerm::from_term(&tm, sum2).to_term(&mut tm), canon);
    }

    #[test]
    fn test_gcd_normalization() {
        let (mut tm, x, y) = setup();
        let four = tm.mk_int(4);
        let six = tm.mk_int(6);
        let fx = tm.mk_app(Op::Mul, &[four, x]);
        let sy = tm.mk_app(Op::Mul, &[six, y]);
        let sum = tm.mk_app(Op::Add, &[fx, sy]);
        let affine = SmtAffineTerm::from_term(&tm, sum);
        assert_eq!(affine.gcd(), BigRational::from_integer(2.into()));
        let norm = affine.normalize_gcd();
        let coeffs: Vec<_> = norm.summands().map(|(_, c)| c.clone()).collect();
        assert_eq!(
            coeffs,
            vec![
                BigRational::from_integer(2.into()),
                BigRational::from_integer(3.into())
            ]
        );
    }

    #[test]
    fn test_matches_up_to_sign() {
        let (tm, x, y) = setup();
        let int = tm.sorts.int_sort;
        let a = SmtAffineTerm::from_summand(BigRational::from_integer(2.into()), x, int).add(
            &SmtAffineTerm::from_summand(BigRational::from_integer((-2).into()), y, int),
        );
        let b = SmtAffineTerm::from_summand(BigRational::from_integer((-1).into()), x, int)
            .add(&SmtAffineTerm::from_summand(BigRational::one(), y, int));
        assert!(a.matches_up_to_sign(&b));
    }
}
