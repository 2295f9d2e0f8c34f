//! Gomory mixed-integer cuts.
//!
//! When the rational relaxation is satisfied but an integer basic
//! variable sits at a fractional value, its tableau row yields a valid
//! cutting plane over the non-basic columns (each of which rests at one
//! of its bounds in a vertex solution). The cut is registered as a fresh
//! bound constraint and enqueued as a branch suggestion; when no cut can
//! be derived, a plain branch on the fractional variable is suggested
//! instead. The per-check cut budget bounds the number of new atoms.

use super::matrix::VarId;
use super::solver::LinArSolver;
use silex_core::Result;
use silex_math::Rational;
use tracing::debug;

/// How a non-basic column enters the cut.
struct CutColumn {
    var: VarId,
    /// The row expansion coefficient of the column.
    coeff: Rational,
    /// Resting at its lower bound (else upper).
    at_lower: bool,
    /// The bound value.
    bound: Rational,
    is_int: bool,
}

/// Generate cuts or branch suggestions for all fractional integer
/// variables.
pub(crate) fn generate_cuts(solver: &mut LinArSolver) -> Result<()> {
    let candidates: Vec<VarId> = solver
        .int_vars()
        .iter()
        .copied()
        .filter(|&v| {
            let var = solver.var(v);
            !var.dead && var.value.eps == 0 && !var.value.real.is_integral()
        })
        .collect();
    for v in candidates {
        if !solver.cut_budget_left() {
            branch(solver, v);
            continue;
        }
        match collect_columns(solver, v) {
            Some(columns) => {
                let value = solver.var(v).value.real.clone();
                let f0 = value.frac();
                match gomory_mi_cut(&f0, &columns) {
                    Some((summands, rhs)) => {
                        debug!(var = v.0, "generating Gomory mixed-integer cut");
                        solver.note_cut();
                        // sum >= rhs  <=>  -sum + rhs <= 0
                        let negated: Vec<(VarId, Rational)> =
                            summands.into_iter().map(|(w, c)| (w, -&c)).collect();
                        let lit = solver.generate_constraint(negated, rhs, false);
                        solver.suggest(lit);
                    }
                    None => branch(solver, v),
                }
            }
            None => branch(solver, v),
        }
    }
    Ok(())
}

/// Suggest branching on `v <= floor(value)`.
fn branch(solver: &mut LinArSolver, v: VarId) {
    let floor = solver.var(v).value.real.floor();
    debug!(var = v.0, "suggesting integer branch");
    solver.note_branch();
    let lit = solver.generate_constraint(
        vec![(v, Rational::one())],
        -&floor,
        false,
    );
    solver.suggest(lit);
}

/// Snapshot the row columns of `v`; every column must rest at a
/// non-strict bound for the cut to be sound.
fn collect_columns(solver: &LinArSolver, v: VarId) -> Option<Vec<CutColumn>> {
    if !solver.var(v).basic {
        return None;
    }
    let denom = Rational::from_bigint(solver.matrix().denominator(v));
    let mut columns = Vec::new();
    for (col, coeff) in solver.matrix().row(v) {
        let value = solver.var(col).value.clone();
        if value.eps != 0 {
            return None;
        }
        let lower = solver.lower_bound(col);
        let upper = solver.upper_bound(col);
        let at_lower = value == lower;
        let at_upper = value == upper;
        if !at_lower && !at_upper {
            return None;
        }
        let bound = if at_lower { lower } else { upper };
        if bound.eps != 0 {
            return None;
        }
        columns.push(CutColumn {
            var: col,
            coeff: Rational::from_bigint(coeff).div(&denom),
            at_lower,
            bound: bound.real,
            is_int: solver.var(col).is_int,
        });
    }
    Some(columns)
}

/// The Gomory mixed-integer cut for a row with fractional basic value
/// `f0`. Returns `(summands, rhs)` with the reading `sum >= rhs`.
fn gomory_mi_cut(
    f0: &Rational,
    columns: &[CutColumn],
) -> Option<(Vec<(VarId, Rational)>, Rational)> {
    debug_assert!(f0.signum() > 0);
    let one = Rational::one();
    let one_minus_f0 = &one - f0;
    if one_minus_f0.signum() <= 0 {
        return None;
    }
    let mut summands: Vec<(VarId, Rational)> = Vec::with_capacity(columns.len());
    let mut rhs = f0.clone();
    let mut nontrivial = false;
    for col in columns {
        // the shifted column s = x - l (at lower) or u - x (at upper)
        // enters with coefficient t
        let t = if col.at_lower {
            col.coeff.clone()
        } else {
            -&col.coeff
        };
        let g = if col.is_int {
            let f = t.frac();
            if f.is_zero() {
                continue;
            }
            if &f <= f0 {
                f
            } else {
                (f0 * &(&one - &f)).div(&one_minus_f0)
            }
        } else if t.signum() >= 0 {
            t.clone()
        } else {
            (f0 * &(-&t)).div(&one_minus_f0)
        };
        if g.is_zero() {
            continue;
        }
        nontrivial = true;
        // substitute the shift back: g*s = +/- g*x -/+ g*bound
        if col.at_lower {
            summands.push((col.var, g.clone()));
            rhs = &rhs + &(&g * &col.bound);
        } else {
            summands.push((col.var, -&g));
            rhs = &rhs - &(&g * &col.bound);
        }
    }
    if !nontrivial || summands.is_empty() {
        return None;
    }
    Some((summands, rhs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: i64, d: i64) -> Rational {
        Rational::of(n, d)
    }

    #[test]
    fn test_gomory_cut_pure_integer_row() {
        // b = 1/2 * x + 1/2 * y with x, y integer at lower bound 0 and
        // value(b) = 7/2: the cut is 1/2 x + 1/2 y >= 1/2, i.e. x+y >= 1
        // after scaling inside the solver.
        let cols = vec![
            CutColumn {
                var: VarId(0),
                coeff: q(1, 2),
                at_lower: true,
                bound: Rational::zero(),
                is_int: true,
            },
            CutColumn {
                var: VarId(1),
                coeff: q(1, 2),
                at_lower: true,
                bound: Rational::zero(),
                is_int: true,
            },
        ];
        let (summands, rhs) = gomory_mi_cut(&q(1, 2), &cols).expect("cut");
        assert_eq!(summands.len(), 2);
        assert_eq!(summands[0].1, q(1, 2));
        assert_eq!(rhs, q(1, 2));
    }

    #[test]
    fn test_gomory_cut_continuous_column() {
        // continuous column with negative coefficient picks up the
        // f0/(1-f0) scaling
        let cols = vec![CutColumn {
            var: VarId(0),
            coeff: q(-1, 1),
            at_lower: true,
            bound: Rational::zero(),
            is_int: false,
        }];
        let (summands, rhs) = gomory_mi_cut(&q(1, 3), &cols).expect("cut");
        // t = -1, g = f0 * 1 / (1 - f0) = 1/2
        assert_eq!(summands[0].1, q(1, 2));
        assert_eq!(rhs, q(1, 3));
    }

    #[test]
    fn test_integral_row_yields_no_cut() {
        let cols = vec![CutColumn {
            var: VarId(0),
            coeff: Rational::one(),
            at_lower: true,
            bound: Rational::zero(),
            is_int: true,
        }];
        assert!(gomory_mi_cut(&q(1, 2), &cols).is_none());
    }
}
