//! Property tests for the arithmetic layer.

use proptest::prelude::*;
use silex_math::{ExactInfNumber, InfNumber, Rational};

fn rational() -> impl Strategy<Value = Rational> {
    (-1000i64..1000, 1i64..60).prop_map(|(n, d)| Rational::of(n, d))
}

fn inf_number() -> impl Strategy<Value = InfNumber> {
    (rational(), -1i8..=1).prop_map(|(r, e)| InfNumber::new(r, e))
}

proptest! {
    #[test]
    fn prop_add_commutes(a in rational(), b in rational()) {
        prop_assert_eq!(&a + &b, &b + &a);
    }

    #[test]
    fn prop_add_neg_cancels(a in rational()) {
        prop_assert_eq!(&a + &(-&a), Rational::zero());
    }

    #[test]
    fn prop_gcd_divides(a in rational(), b in rational()) {
        prop_assume!(!a.is_zero() && !b.is_zero());
        let g = a.abs().gcd(&b.abs());
        prop_assert!(g.signum() > 0);
        let qa = a.div(&g);
        let qb = b.div(&g);
        prop_assert!(qa.is_integral());
        prop_assert!(qb.is_integral());
    }

    #[test]
    fn prop_floor_ceil_bracket(a in rational()) {
        let f = a.floor();
        let c = a.ceil();
        prop_assert!(f <= a && a <= c);
        prop_assert!(f.is_integral() && c.is_integral());
        if a.is_integral() {
            prop_assert_eq!(f, c);
        }
    }

    #[test]
    fn prop_inf_number_order_is_lexicographic(a in inf_number(), b in inf_number()) {
        let expected = a.real.cmp(&b.real).then_with(|| a.eps.cmp(&b.eps));
        prop_assert_eq!(a.cmp(&b), expected);
    }

    #[test]
    fn prop_inf_number_add_sub_roundtrip(a in inf_number(), b in inf_number()) {
        // eps saturates, so the roundtrip holds whenever no clamp fired
        prop_assume!((a.eps + b.eps).abs() <= 1);
        let sum = a.add(&b);
        let back = sum.sub(&b);
        prop_assert_eq!(back.real, a.real);
    }

    #[test]
    fn prop_mul_flips_eps_sign(a in inf_number(), f in rational()) {
        prop_assume!(!f.is_zero());
        let scaled = a.mul(&f);
        prop_assert_eq!(scaled.eps, a.eps * f.signum() as i8);
    }

    #[test]
    fn prop_floor_is_largest_integer_below(a in inf_number()) {
        let f = a.floor();
        prop_assert!(f <= a);
        prop_assert!(f.is_integral());
        let next = f.add(&InfNumber::one());
        prop_assert!(a < next);
    }

    #[test]
    fn prop_exact_collapse_preserves_order(a in rational(), e1 in -1i64..=1, e2 in -1i64..=1) {
        let x = ExactInfNumber::new(a.clone(), Rational::from_integer(e1));
        let y = ExactInfNumber::new(a, Rational::from_integer(e2));
        let xi = x.to_inf_number().unwrap();
        let yi = y.to_inf_number().unwrap();
        prop_assert_eq!(x.cmp(&y), xi.cmp(&yi));
    }
}
