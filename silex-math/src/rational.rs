//! Arbitrary-precision rational numbers with infinity sentinels.
//!
//! Bound arithmetic in the simplex core needs rationals that can also be
//! `+inf` or `-inf` (a variable without an asserted bound). The finite
//! payload is a reduced [`BigRational`]; the sentinels order below and
//! above every finite value.

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// A rational number extended with `-inf` and `+inf`.
///
/// The derived ordering is the numeric one: `NegInfinity` sorts below all
/// finite values, `PosInfinity` above.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rational {
    /// Negative infinity.
    NegInfinity,
    /// A finite, reduced rational.
    Finite(BigRational),
    /// Positive infinity.
    PosInfinity,
}

impl Rational {
    /// Zero.
    pub fn zero() -> Self {
        Rational::Finite(BigRational::zero())
    }

    /// One.
    pub fn one() -> Self {
        Rational::Finite(BigRational::one())
    }

    /// Minus one.
    pub fn minus_one() -> Self {
        Rational::Finite(-BigRational::one())
    }

    /// Two.
    pub fn two() -> Self {
        Rational::from_integer(2)
    }

    /// Build from an `i64`.
    pub fn from_integer(n: i64) -> Self {
        Rational::Finite(BigRational::from_integer(BigInt::from(n)))
    }

    /// Build `num / den`. `den` must be non-zero.
    pub fn of(num: i64, den: i64) -> Self {
        debug_assert!(den != 0);
        Rational::Finite(BigRational::new(BigInt::from(num), BigInt::from(den)))
    }

    /// Build from big numerator and denominator. `den` must be non-zero.
    pub fn from_big(num: BigInt, den: BigInt) -> Self {
        debug_assert!(!den.is_zero());
        Rational::Finite(BigRational::new(num, den))
    }

    /// Build from a `BigInt`.
    pub fn from_bigint(n: BigInt) -> Self {
        Rational::Finite(BigRational::from_integer(n))
    }

    /// The finite payload, if any.
    pub fn as_finite(&self) -> Option<&BigRational> {
        match self {
            Rational::Finite(q) => Some(q),
            _ => None,
        }
    }

    /// Is this a finite rational?
    pub fn is_finite(&self) -> bool {
        matches!(self, Rational::Finite(_))
    }

    /// Is this one of the infinity sentinels?
    pub fn is_infinite(&self) -> bool {
        !self.is_finite()
    }

    /// Is this exactly zero?
    pub fn is_zero(&self) -> bool {
        matches!(self, Rational::Finite(q) if q.is_zero())
    }

    /// Is this exactly one?
    pub fn is_one(&self) -> bool {
        matches!(self, Rational::Finite(q) if q.is_one())
    }

    /// Is this a (finite) integer?
    pub fn is_integral(&self) -> bool {
        matches!(self, Rational::Finite(q) if q.is_integer())
    }

    /// Is this finite and strictly negative?
    pub fn is_negative(&self) -> bool {
        self.signum() < 0
    }

    /// Sign: `-1`, `0` or `1`. Infinities count as their sign.
    pub fn signum(&self) -> i32 {
        match self {
            Rational::NegInfinity => -1,
            Rational::PosInfinity => 1,
            Rational::Finite(q) => {
                if q.is_zero() {
                    0
                } else if q.is_negative() {
                    -1
                } else {
                    1
                }
            }
        }
    }

    /// Numerator of a finite value.
    pub fn numerator(&self) -> &BigInt {
        match self {
            Rational::Finite(q) => q.numer(),
            _ => panic!("numerator of infinite rational"),
        }
    }

    /// Denominator of a finite value (always positive).
    pub fn denominator(&self) -> &BigInt {
        match self {
            Rational::Finite(q) => q.denom(),
            _ => panic!("denominator of infinite rational"),
        }
    }

    /// Multiplicative inverse. The inverse of an infinity is zero, the
    /// inverse of zero is `+inf` (only meaningful under the conventions of
    /// the epsilon computation in model preparation).
    pub fn inverse(&self) -> Rational {
        match self {
            Rational::NegInfinity | Rational::PosInfinity => Rational::zero(),
            Rational::Finite(q) => {
                if q.is_zero() {
                    Rational::PosInfinity
                } else {
                    Rational::Finite(q.recip())
                }
            }
        }
    }

    /// Absolute value.
    pub fn abs(&self) -> Rational {
        match self {
            Rational::NegInfinity | Rational::PosInfinity => Rational::PosInfinity,
            Rational::Finite(q) => Rational::Finite(q.abs()),
        }
    }

    /// Largest integer `<= self`. Identity on infinities.
    pub fn floor(&self) -> Rational {
        match self {
            Rational::Finite(q) => Rational::Finite(q.floor()),
            other => other.clone(),
        }
    }

    /// Smallest integer `>= self`. Identity on infinities.
    pub fn ceil(&self) -> Rational {
        match self {
            Rational::Finite(q) => Rational::Finite(q.ceil()),
            other => other.clone(),
        }
    }

    /// The fractional part `self - floor(self)`, in `[0, 1)`.
    pub fn frac(&self) -> Rational {
        match self {
            Rational::Finite(q) => Rational::Finite(q - q.floor()),
            _ => panic!("frac of infinite rational"),
        }
    }

    /// Division. `div` by an infinity yields zero for finite dividends.
    pub fn div(&self, other: &Rational) -> Rational {
        match (self, other) {
            (Rational::Finite(a), Rational::Finite(b)) => {
                debug_assert!(!b.is_zero(), "rational division by zero");
                Rational::Finite(a / b)
            }
            (Rational::Finite(_), _) => Rational::zero(),
            (inf, Rational::Finite(b)) => {
                debug_assert!(!b.is_zero());
                if b.is_negative() {
                    inf.clone().neg()
                } else {
                    inf.clone()
                }
            }
            _ => panic!("division of two infinite rationals"),
        }
    }

    /// The gcd of two non-negative rationals:
    /// `gcd(a/b, c/d) = gcd(a, c) / lcm(b, d)`.
    pub fn gcd(&self, other: &Rational) -> Rational {
        match (self, other) {
            (Rational::Finite(a), Rational::Finite(b)) => {
                if a.is_zero() {
                    return other.clone();
                }
                if b.is_zero() {
                    return self.clone();
                }
                let num = a.numer().gcd(b.numer());
                let den = a.denom().lcm(b.denom());
                Rational::Finite(BigRational::new(num, den))
            }
            _ => panic!("gcd of infinite rational"),
        }
    }

    /// `self + factor * other`, saving one clone in hot paths.
    pub fn add_mul(&self, other: &Rational, factor: &Rational) -> Rational {
        match (self, other, factor) {
            (Rational::Finite(a), Rational::Finite(b), Rational::Finite(f)) => {
                Rational::Finite(a + b * f)
            }
            _ => self + &(other * factor),
        }
    }
}

impl Add for &Rational {
    type Output = Rational;

    fn add(self, other: &Rational) -> Rational {
        match (self, other) {
            (Rational::Finite(a), Rational::Finite(b)) => Rational::Finite(a + b),
            (Rational::PosInfinity, Rational::NegInfinity)
            | (Rational::NegInfinity, Rational::PosInfinity) => {
                debug_assert!(false, "inf + -inf");
                Rational::PosInfinity
            }
            (Rational::PosInfinity, _) | (_, Rational::PosInfinity) => Rational::PosInfinity,
            (Rational::NegInfinity, _) | (_, Rational::NegInfinity) => Rational::NegInfinity,
        }
    }
}

impl Sub for &Rational {
    type Output = Rational;

    fn sub(self, other: &Rational) -> Rational {
        self + &(-other)
    }
}

impl Mul for &Rational {
    type Output = Rational;

    fn mul(self, other: &Rational) -> Rational {
        match (self, other) {
            (Rational::Finite(a), Rational::Finite(b)) => Rational::Finite(a * b),
            (a, b) => {
                debug_assert!(a.signum() != 0 && b.signum() != 0, "0 * inf");
                if a.signum() * b.signum() > 0 {
                    Rational::PosInfinity
                } else {
                    Rational::NegInfinity
                }
            }
        }
    }
}

impl Neg for &Rational {
    type Output = Rational;

    fn neg(self) -> Rational {
        match self {
            Rational::NegInfinity => Rational::PosInfinity,
            Rational::PosInfinity => Rational::NegInfinity,
            Rational::Finite(q) => Rational::Finite(-q),
        }
    }
}

impl Neg for Rational {
    type Output = Rational;

    fn neg(self) -> Rational {
        (&self).neg()
    }
}

impl From<BigRational> for Rational {
    fn from(q: BigRational) -> Self {
        Rational::Finite(q)
    }
}

impl PartialEq<BigRational> for Rational {
    fn eq(&self, other: &BigRational) -> bool {
        matches!(self, Rational::Finite(q) if q == other)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rational::NegInfinity => write!(f, "-inf"),
            Rational::PosInfinity => write!(f, "inf"),
            Rational::Finite(q) => write!(f, "{}", q),
        }
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Total comparison helper usable in sorted containers.
pub fn cmp_rationals(a: &Rational, b: &Rational) -> Ordering {
    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_with_infinities() {
        let vals = [
            Rational::NegInfinity,
            Rational::from_integer(-3),
            Rational::zero(),
            Rational::of(1, 2),
            Rational::from_integer(7),
            Rational::PosInfinity,
        ];
        for w in vals.windows(2) {
            assert!(w[0] < w[1], "{} < {}", w[0], w[1]);
        }
    }

    #[test]
    fn test_gcd() {
        // gcd(2/3, 4/9) = gcd(2,4)/lcm(3,9) = 2/9
        let g = Rational::of(2, 3).gcd(&Rational::of(4, 9));
        assert_eq!(g, Rational::of(2, 9));
        assert_eq!(Rational::zero().gcd(&Rational::of(5, 7)), Rational::of(5, 7));
    }

    #[test]
    fn test_floor_ceil_frac() {
        assert_eq!(Rational::of(7, 2).floor(), Rational::from_integer(3));
        assert_eq!(Rational::of(7, 2).ceil(), Rational::from_integer(4));
        assert_eq!(Rational::of(-7, 2).floor(), Rational::from_integer(-4));
        assert_eq!(Rational::of(7, 2).frac(), Rational::of(1, 2));
        assert_eq!(Rational::PosInfinity.floor(), Rational::PosInfinity);
    }

    #[test]
    fn test_infinite_arithmetic() {
        let x = Rational::from_integer(5);
        assert_eq!(&Rational::PosInfinity + &x, Rational::PosInfinity);
        assert_eq!(&Rational::NegInfinity + &x, Rational::NegInfinity);
        assert_eq!(-&Rational::PosInfinity, Rational::NegInfinity);
        assert_eq!(Rational::PosInfinity.inverse(), Rational::zero());
        assert_eq!(
            &Rational::PosInfinity * &Rational::minus_one(),
            Rational::NegInfinity
        );
    }

    #[test]
    fn test_signum() {
        assert_eq!(Rational::NegInfinity.signum(), -1);
        assert_eq!(Rational::zero().signum(), 0);
        assert_eq!(Rational::of(-1, 9).signum(), -1);
        assert_eq!(Rational::PosInfinity.signum(), 1);
    }

    #[test]
    fn test_add_mul() {
        let r = Rational::from_integer(10).add_mul(&Rational::of(1, 2), &Rational::from_integer(4));
        assert_eq!(r, Rational::from_integer(12));
    }
}
