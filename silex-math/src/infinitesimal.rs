//! Numbers of the form `a + b * delta` for a symbolic positive
//! infinitesimal `delta`.
//!
//! [`InfNumber`] restricts `b` to a sign (`-1`, `0`, `+1`) and is the bound
//! representation of the simplex core: the strict bound `x < c` is encoded
//! as `x <= c - delta`. [`ExactInfNumber`] keeps the full rational
//! multiplicity of `delta` and is used for variable values during model
//! repair and for freedom intervals.

use crate::rational::Rational;
use std::cmp::Ordering;
use std::fmt;

/// A rational bound value with an infinitesimal offset of fixed sign.
///
/// Ordered lexicographically: `a + e*delta < a' + e'*delta` iff `a < a'`,
/// or `a = a'` and `e < e'`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfNumber {
    /// The real part; may be an infinity sentinel.
    pub real: Rational,
    /// The infinitesimal sign, one of `-1`, `0`, `+1`.
    pub eps: i8,
}

impl InfNumber {
    /// Build a new number. `eps` is clamped to its sign.
    pub fn new(real: Rational, eps: i8) -> Self {
        InfNumber {
            real,
            eps: eps.signum(),
        }
    }

    /// Zero.
    pub fn zero() -> Self {
        InfNumber::new(Rational::zero(), 0)
    }

    /// One.
    pub fn one() -> Self {
        InfNumber::new(Rational::one(), 0)
    }

    /// The unbounded lower bound.
    pub fn neg_infinity() -> Self {
        InfNumber::new(Rational::NegInfinity, 0)
    }

    /// The unbounded upper bound.
    pub fn pos_infinity() -> Self {
        InfNumber::new(Rational::PosInfinity, 0)
    }

    /// A plain rational value.
    pub fn from_rational(real: Rational) -> Self {
        InfNumber::new(real, 0)
    }

    /// Is the real part infinite (i.e. no bound asserted)?
    pub fn is_infinite(&self) -> bool {
        self.real.is_infinite()
    }

    /// Is this an integer with no infinitesimal part?
    pub fn is_integral(&self) -> bool {
        self.real.is_integral() && self.eps == 0
    }

    /// Sign of the value, taking the infinitesimal into account.
    pub fn signum(&self) -> i32 {
        let s = self.real.signum();
        if s != 0 {
            s
        } else {
            self.eps as i32
        }
    }

    /// Sum. Infinitesimal signs saturate.
    pub fn add(&self, other: &InfNumber) -> InfNumber {
        InfNumber::new(&self.real + &other.real, self.eps + other.eps)
    }

    /// Difference.
    pub fn sub(&self, other: &InfNumber) -> InfNumber {
        InfNumber::new(&self.real - &other.real, self.eps - other.eps)
    }

    /// Negation.
    pub fn negate(&self) -> InfNumber {
        InfNumber::new(-&self.real, -self.eps)
    }

    /// Scale by a rational factor.
    pub fn mul(&self, factor: &Rational) -> InfNumber {
        InfNumber::new(&self.real * factor, self.eps * factor.signum() as i8)
    }

    /// Divide by a rational factor.
    pub fn div(&self, factor: &Rational) -> InfNumber {
        InfNumber::new(self.real.div(factor), self.eps * factor.signum() as i8)
    }

    /// `self + diff * factor`.
    pub fn add_mul(&self, diff: &InfNumber, factor: &Rational) -> InfNumber {
        InfNumber::new(
            self.real.add_mul(&diff.real, factor),
            self.eps + diff.eps * factor.signum() as i8,
        )
    }

    /// Round down to the largest integer value `<=` this one. A negative
    /// infinitesimal on an integer boundary pushes the result one below.
    pub fn floor(&self) -> InfNumber {
        if !self.real.is_integral() {
            InfNumber::new(self.real.floor(), 0)
        } else if self.eps < 0 {
            InfNumber::new(&self.real - &Rational::one(), 0)
        } else {
            InfNumber::new(self.real.clone(), 0)
        }
    }

    /// Round up to the smallest integer value `>=` this one.
    pub fn ceil(&self) -> InfNumber {
        if !self.real.is_integral() {
            InfNumber::new(self.real.ceil(), 0)
        } else if self.eps > 0 {
            InfNumber::new(&self.real + &Rational::one(), 0)
        } else {
            InfNumber::new(self.real.clone(), 0)
        }
    }

    /// Multiplicative inverse of the real part (used by the epsilon
    /// computation of model preparation; the infinitesimal is dropped).
    pub fn inverse_real(&self) -> Rational {
        self.real.inverse()
    }

    /// `self <= other`.
    pub fn less_eq(&self, other: &InfNumber) -> bool {
        self <= other
    }

    /// `self < other`.
    pub fn less(&self, other: &InfNumber) -> bool {
        self < other
    }
}

impl fmt::Display for InfNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.eps {
            0 => write!(f, "{}", self.real),
            1 => write!(f, "{}+eps", self.real),
            _ => write!(f, "{}-eps", self.real),
        }
    }
}

impl fmt::Debug for InfNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A value `a + b * delta` with exact rational `delta`-multiplicity.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ExactInfNumber {
    /// The real part; may be infinite.
    pub real: Rational,
    /// The exact infinitesimal multiplicity.
    pub eps: Rational,
}

impl ExactInfNumber {
    /// Build a new exact number.
    pub fn new(real: Rational, eps: Rational) -> Self {
        ExactInfNumber { real, eps }
    }

    /// Zero.
    pub fn zero() -> Self {
        ExactInfNumber::new(Rational::zero(), Rational::zero())
    }

    /// Negative infinity.
    pub fn neg_infinity() -> Self {
        ExactInfNumber::new(Rational::NegInfinity, Rational::zero())
    }

    /// Positive infinity.
    pub fn pos_infinity() -> Self {
        ExactInfNumber::new(Rational::PosInfinity, Rational::zero())
    }

    /// Widen an [`InfNumber`].
    pub fn from_inf(n: &InfNumber) -> Self {
        ExactInfNumber::new(n.real.clone(), Rational::from_integer(n.eps as i64))
    }

    /// Is the real part infinite?
    pub fn is_infinite(&self) -> bool {
        self.real.is_infinite()
    }

    /// Sign of the value.
    pub fn signum(&self) -> i32 {
        let s = self.real.signum();
        if s != 0 {
            s
        } else {
            self.eps.signum()
        }
    }

    /// Sum.
    pub fn add(&self, other: &ExactInfNumber) -> ExactInfNumber {
        ExactInfNumber::new(&self.real + &other.real, &self.eps + &other.eps)
    }

    /// Difference.
    pub fn sub(&self, other: &ExactInfNumber) -> ExactInfNumber {
        ExactInfNumber::new(&self.real - &other.real, &self.eps - &other.eps)
    }

    /// `other - self` for an [`InfNumber`] operand.
    pub fn diff_to(&self, other: &InfNumber) -> ExactInfNumber {
        ExactInfNumber::from_inf(other).sub(self)
    }

    /// Scale by a rational factor.
    pub fn mul(&self, factor: &Rational) -> ExactInfNumber {
        ExactInfNumber::new(&self.real * factor, &self.eps * factor)
    }

    /// Divide by a non-zero rational factor.
    pub fn div(&self, factor: &Rational) -> ExactInfNumber {
        ExactInfNumber::new(self.real.div(factor), self.eps.div(factor))
    }

    /// Collapse to an [`InfNumber`] when the multiplicity is a sign.
    pub fn to_inf_number(&self) -> Option<InfNumber> {
        let e = &self.eps;
        if e.is_zero() || e.is_one() || *e == Rational::minus_one() {
            Some(InfNumber::new(self.real.clone(), e.signum() as i8))
        } else {
            None
        }
    }

    /// Conservative collapse, keeping only the infinitesimal sign. Callers
    /// must re-check chosen values against the exact bounds.
    pub fn to_inf_number_lossy(&self) -> InfNumber {
        InfNumber::new(self.real.clone(), self.eps.signum() as i8)
    }

    /// The exact infinitesimal multiplicity.
    pub fn epsilon(&self) -> &Rational {
        &self.eps
    }
}

impl PartialOrd for ExactInfNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExactInfNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.real
            .cmp(&other.real)
            .then_with(|| self.eps.cmp(&other.eps))
    }
}

impl fmt::Display for ExactInfNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.eps.is_zero() {
            write!(f, "{}", self.real)
        } else {
            write!(f, "{}+{}*eps", self.real, self.eps)
        }
    }
}

impl fmt::Debug for ExactInfNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: i64) -> InfNumber {
        InfNumber::from_rational(Rational::from_integer(n))
    }

    #[test]
    fn test_strict_bound_ordering() {
        // 3 - eps < 3 < 3 + eps < 4 - eps
        let below = InfNumber::new(Rational::from_integer(3), -1);
        let exact = num(3);
        let above = InfNumber::new(Rational::from_integer(3), 1);
        let next = InfNumber::new(Rational::from_integer(4), -1);
        assert!(below < exact);
        assert!(exact < above);
        assert!(above < next);
    }

    #[test]
    fn test_mul_flips_eps() {
        let b = InfNumber::new(Rational::from_integer(2), -1);
        let r = b.mul(&Rational::from_integer(-3));
        assert_eq!(r, InfNumber::new(Rational::from_integer(-6), 1));
    }

    #[test]
    fn test_floor_of_strict_integer_bound() {
        // floor(3 - eps) = 2: the largest integer strictly below 3.
        let b = InfNumber::new(Rational::from_integer(3), -1);
        assert_eq!(b.floor(), num(2));
        // floor(7/2 - eps) = 3.
        let b = InfNumber::new(Rational::of(7, 2), -1);
        assert_eq!(b.floor(), num(3));
        // ceil(3 + eps) = 4.
        let b = InfNumber::new(Rational::from_integer(3), 1);
        assert_eq!(b.ceil(), num(4));
    }

    #[test]
    fn test_infinities() {
        assert!(InfNumber::neg_infinity() < num(-1000));
        assert!(num(1000) < InfNumber::pos_infinity());
        assert!(InfNumber::neg_infinity().is_infinite());
    }

    #[test]
    fn test_exact_roundtrip() {
        let e = ExactInfNumber::new(Rational::of(1, 2), Rational::minus_one());
        assert_eq!(
            e.to_inf_number(),
            Some(InfNumber::new(Rational::of(1, 2), -1))
        );
        let wide = ExactInfNumber::new(Rational::zero(), Rational::from_integer(5));
        assert_eq!(wide.to_inf_number(), None);
        assert_eq!(wide.to_inf_number_lossy().eps, 1);
    }

    #[test]
    fn test_exact_ordering() {
        let a = ExactInfNumber::new(Rational::zero(), Rational::from_integer(2));
        let b = ExactInfNumber::new(Rational::zero(), Rational::from_integer(3));
        assert!(a < b);
        let c = ExactInfNumber::new(Rational::of(1, 1000), Rational::from_integer(-50));
        assert!(b < c);
    }
}
