//! The linear-arithmetic decision procedure.
//!
//! A general simplex with bounds in the style of Dutertre and de Moura.
//! Slack variables are created for canonical linear combinations of input
//! terms; bounds are asserted through literal-backed reasons and refined
//! into composite reasons by bound refinement over tableau rows. Conflict
//! clauses carry Farkas coefficients. After the rational relaxation is
//! satisfied, integer variables are driven to integral values by Gomory
//! cuts enqueued as branch literals, and the model-repair pass nudges
//! shared variables apart before equality propagation across theories.

use super::atoms::{AtomId, AtomTable, LaAtom, LaAtomKind};
use super::linvar::LinVar;
use super::matrix::{Matrix, VarId};
use super::reason::{LaReason, ReasonArena, ReasonId, ReasonKind};
use crate::{LemmaAnnotation, TheoryClause, VarPool};
use num_bigint::BigInt;
use num_traits::Signed;
use rustc_hash::{FxHashMap, FxHashSet};
use silex_core::{Cancel, Lit, Op, QuoteKind, Result, SilexError, SmtAffineTerm, TermId, TermManager};
use silex_math::{ExactInfNumber, InfNumber, Rational};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// Statistics of one solver instance.
#[derive(Debug, Clone, Default)]
pub struct LaStats {
    /// Pivot operations.
    pub pivots: u64,
    /// Pivots performed under Bland's rule.
    pub bland_pivots: u64,
    /// Switches to Bland's rule.
    pub switches_to_bland: u64,
    /// Composite bound literals created.
    pub composite_literals: u64,
    /// Gomory cuts generated.
    pub cuts: u64,
    /// Branch suggestions generated.
    pub branches: u64,
}

/// A term shared with the congruence closure, as `factor * var + offset`.
#[derive(Debug, Clone)]
pub struct SharedVar {
    /// The shared input term.
    pub term: TermId,
    /// The linear variable, `None` for constants.
    pub var: Option<VarId>,
    /// The scale factor.
    pub factor: Rational,
    /// The constant offset.
    pub offset: Rational,
}

struct Scope {
    num_vars: usize,
    num_shared: usize,
    term_keys: Vec<Vec<(VarId, Rational)>>,
}

/// The linear-arithmetic solver.
pub struct LinArSolver {
    vars: Vec<LinVar>,
    int_vars: Vec<VarId>,
    matrix: Matrix,
    reasons: ReasonArena,
    /// Registered atoms.
    pub atoms: AtomTable,
    /// Atoms created since the last drain, for engine registration.
    pub pending_atoms: Vec<AtomId>,
    terms: FxHashMap<Vec<(VarId, Rational)>, VarId>,
    oob: BTreeSet<VarId>,
    prop_bounds: BTreeSet<VarId>,
    prop_list: VecDeque<Lit>,
    suggestions: VecDeque<Lit>,
    simps: FxHashMap<VarId, Vec<(VarId, Rational)>>,
    shared: Vec<SharedVar>,
    scopes: Vec<Scope>,
    diseq_suggested: FxHashSet<(u32, Rational)>,
    diseq_stuck: bool,
    conflict_var: Option<VarId>,
    stack_pos: u64,
    in_check: bool,
    model_eps: Option<Rational>,
    cuts_this_check: u32,
    pool: VarPool,
    cancel: Cancel,
    bland_use_factor: u32,
    max_cuts: u32,
    /// Counters.
    pub stats: LaStats,
}

impl LinArSolver {
    /// Create a solver drawing DPLL variables from `pool`.
    pub fn new(pool: VarPool, cancel: Cancel, bland_use_factor: u32, max_cuts: u32) -> Self {
        LinArSolver {
            vars: Vec::new(),
            int_vars: Vec::new(),
            matrix: Matrix::new(),
            reasons: ReasonArena::new(),
            atoms: AtomTable::new(),
            pending_atoms: Vec::new(),
            terms: FxHashMap::default(),
            oob: BTreeSet::new(),
            prop_bounds: BTreeSet::new(),
            prop_list: VecDeque::new(),
            suggestions: VecDeque::new(),
            simps: FxHashMap::default(),
            shared: Vec::new(),
            scopes: Vec::new(),
            diseq_suggested: FxHashSet::default(),
            diseq_stuck: false,
            conflict_var: None,
            stack_pos: 0,
            in_check: false,
            model_eps: None,
            cuts_this_check: 0,
            pool,
            cancel,
            bland_use_factor,
            max_cuts,
            stats: LaStats::default(),
        }
    }

    /// The number of variables.
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Borrow a variable record.
    pub fn var(&self, v: VarId) -> &LinVar {
        &self.vars[v.0 as usize]
    }

    fn var_mut(&mut self, v: VarId) -> &mut LinVar {
        &mut self.vars[v.0 as usize]
    }

    /// Borrow the matrix (cut generation walks rows directly).
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// The integer variables.
    pub fn int_vars(&self) -> &[VarId] {
        &self.int_vars
    }

    // --- Bounds ---

    /// The current (rounded) upper bound.
    pub fn upper_bound(&self, v: VarId) -> InfNumber {
        match self.var(v).upper {
            Some(r) => self.reasons.get(r).bound.clone(),
            None => InfNumber::pos_infinity(),
        }
    }

    /// The current (rounded) lower bound.
    pub fn lower_bound(&self, v: VarId) -> InfNumber {
        match self.var(v).lower {
            Some(r) => self.reasons.get(r).bound.clone(),
            None => InfNumber::neg_infinity(),
        }
    }

    fn exact_upper_bound(&self, v: VarId) -> InfNumber {
        match self.var(v).upper {
            Some(r) => self.reasons.get(r).exact_bound.clone(),
            None => InfNumber::pos_infinity(),
        }
    }

    fn exact_lower_bound(&self, v: VarId) -> InfNumber {
        match self.var(v).lower {
            Some(r) => self.reasons.get(r).exact_bound.clone(),
            None => InfNumber::neg_infinity(),
        }
    }

    fn out_of_bounds(&self, v: VarId) -> bool {
        let var = self.var(v);
        var.value < self.lower_bound(v) || self.upper_bound(v) < var.value
    }

    // --- Variable creation ---

    /// Register the linear variable standing for an input term.
    pub fn add_external_var(&mut self, term: TermId, is_int: bool, sort: silex_core::SortId, level: u32) -> VarId {
        let v = VarId(self.vars.len() as u32);
        let def = SmtAffineTerm::from_summand(num_rational::BigRational::from_integer(1.into()), term, sort);
        self.vars.push(LinVar::new(def, is_int, level));
        self.matrix.add_var(v);
        if is_int {
            self.int_vars.push(v);
        }
        v
    }

    /// The variable for a normalized linear combination, creating a slack
    /// variable with a tableau row on first sight. The summands must be
    /// gcd-normalized with a positive leading coefficient.
    pub fn generate_lin_var(&mut self, summands: Vec<(VarId, Rational)>, level: u32) -> VarId {
        debug_assert!(!summands.is_empty());
        if summands.len() == 1 {
            debug_assert!(summands[0].1.is_one());
            let v = summands[0].0;
            self.ensure_unsimplified(v);
            return v;
        }
        if let Some(&v) = self.terms.get(&summands) {
            self.ensure_unsimplified(v);
            return v;
        }
        let is_int = summands.iter().all(|(v, _)| self.var(*v).is_int);
        let mut def = SmtAffineTerm::zero(self.vars[summands[0].0 .0 as usize].def.sort());
        let mut cur = BTreeMap::new();
        for (v, c) in &summands {
            let q = c.as_finite().expect("infinite coefficient").clone();
            def = def.add(&self.var(*v).def.clone().mul(&q));
            self.unsimplify_and_add(*v, c, &mut cur);
        }
        let v = VarId(self.vars.len() as u32);
        let mut lv = LinVar::new(def, is_int, level);
        lv.initially_basic = true;
        self.vars.push(lv);
        self.matrix.add_var(v);
        if is_int {
            self.int_vars.push(v);
        }
        self.insert_var(v, &cur);
        if let Some(scope) = self.scopes.last_mut() {
            scope.term_keys.push(summands.clone());
        }
        self.terms.insert(summands, v);
        v
    }

    /// Express `factor * v` over the current non-basic variables.
    fn unsimplify_and_add(&self, v: VarId, factor: &Rational, out: &mut BTreeMap<VarId, Rational>) {
        if self.var(v).dead {
            for (w, c) in self.simps.get(&v).expect("dead var without expansion") {
                self.unsimplify_and_add(*w, &(factor * c), out);
            }
        } else if self.var(v).basic {
            let denom = Rational::from_bigint(self.matrix.denominator(v));
            for (col, coeff) in self.matrix.row(v) {
                let c = Rational::from_bigint(coeff).div(&denom);
                self.unsimplify_and_add(col, &(factor * &c), out);
            }
        } else {
            let entry = out.entry(v).or_insert_with(Rational::zero);
            *entry = &*entry + factor;
            if entry.is_zero() {
                out.remove(&v);
            }
        }
    }

    /// Make `v` basic with the row `v = sum coeffs`, all over non-basic
    /// variables.
    fn insert_var(&mut self, v: VarId, coeffs: &BTreeMap<VarId, Rational>) {
        debug_assert!(!coeffs.is_empty());
        // scale by the lcm of the denominators to get an integer row
        let mut lambda = BigInt::from(1);
        for c in coeffs.values() {
            let q = c.as_finite().expect("finite coefficient");
            lambda = num_integer::Integer::lcm(&lambda, q.denom());
        }
        let mut entries: Vec<(VarId, BigInt)> = Vec::with_capacity(coeffs.len());
        let mut value = InfNumber::zero();
        for (&w, c) in coeffs {
            debug_assert!(!self.var(w).basic && !self.var(w).dead);
            let q = c.as_finite().expect("finite coefficient");
            let scaled = q * num_rational::BigRational::from_integer(lambda.clone());
            debug_assert!(scaled.is_integer());
            entries.push((w, scaled.numer().clone()));
            value = value.add_mul(&self.var(w).value, c);
        }
        let mut head = -lambda;
        Matrix::normalize_row(&mut head, &mut entries);
        self.var_mut(v).basic = true;
        self.var_mut(v).value = value;
        self.matrix.set_row(v, head, &entries);
        self.refresh_row_support(v);
        let var = self.var(v);
        if var.num_upper_inf == 0 || var.num_lower_inf == 0 {
            self.prop_bounds.insert(v);
        }
        if self.out_of_bounds(v) {
            self.oob.insert(v);
        }
    }

    fn ensure_unsimplified(&mut self, v: VarId) {
        if self.var(v).dead {
            debug!(var = v.0, "reviving simplified variable");
            let mut coeffs = BTreeMap::new();
            self.unsimplify_and_add(v, &Rational::one(), &mut coeffs);
            self.simps.remove(&v);
            self.var_mut(v).dead = false;
            self.insert_var(v, &coeffs);
        }
    }

    // --- Composite bound bookkeeping ---

    /// Recompute the bound-refinement counters and sums of a basic row.
    fn refresh_row_support(&mut self, b: VarId) {
        let denom = Rational::from_bigint(self.matrix.denominator(b));
        let mut num_upper_inf = 0;
        let mut num_lower_inf = 0;
        let mut upper_sum = ExactInfNumber::zero();
        let mut lower_sum = ExactInfNumber::zero();
        for (col, coeff) in self.matrix.row(b) {
            let ratio = Rational::from_bigint(coeff).div(&denom);
            let (upper_side, lower_side) = if ratio.signum() > 0 {
                (self.upper_bound(col), self.lower_bound(col))
            } else {
                (self.lower_bound(col), self.upper_bound(col))
            };
            if upper_side.is_infinite() {
                num_upper_inf += 1;
            } else {
                upper_sum = upper_sum.add(&ExactInfNumber::from_inf(&upper_side).mul(&ratio));
            }
            if lower_side.is_infinite() {
                num_lower_inf += 1;
            } else {
                lower_sum = lower_sum.add(&ExactInfNumber::from_inf(&lower_side).mul(&ratio));
            }
        }
        let var = self.var_mut(b);
        var.num_upper_inf = num_upper_inf;
        var.num_lower_inf = num_lower_inf;
        var.upper_sum = upper_sum;
        var.lower_sum = lower_sum;
    }

    /// Adjust one row's support after a column bound change.
    fn update_row_support(
        &mut self,
        row: VarId,
        ratio: &Rational,
        old_bound: &InfNumber,
        new_bound: &InfNumber,
        touches_upper: bool,
    ) {
        let var = self.var_mut(row);
        let (counter, sum) = if touches_upper {
            (&mut var.num_upper_inf, &mut var.upper_sum)
        } else {
            (&mut var.num_lower_inf, &mut var.lower_sum)
        };
        if old_bound.is_infinite() {
            *counter -= 1;
        } else {
            *sum = sum.sub(&ExactInfNumber::from_inf(old_bound).mul(ratio));
        }
        if new_bound.is_infinite() {
            *counter += 1;
        } else {
            *sum = sum.add(&ExactInfNumber::from_inf(new_bound).mul(ratio));
        }
    }

    /// Propagate a bound change of non-basic `col` into all dependent
    /// rows: counters, sums and (for tightened bounds) the affected
    /// variable values.
    fn update_variable(
        &mut self,
        col: VarId,
        is_upper: bool,
        old_bound: &InfNumber,
        new_bound: &InfNumber,
    ) {
        debug_assert!(!self.var(col).basic);
        let diff = {
            let value = &self.var(col).value;
            let d = new_bound.sub(value);
            if (d.signum() > 0) == is_upper {
                None
            } else {
                Some(d)
            }
        };
        if diff.is_some() {
            self.var_mut(col).value = new_bound.clone();
        }
        let col_entries: Vec<(VarId, BigInt)> = self.matrix.col(col).collect();
        for (row, coeff) in col_entries {
            let denom = Rational::from_bigint(self.matrix.denominator(row));
            let ratio = Rational::from_bigint(coeff.clone()).div(&denom);
            if let Some(d) = &diff {
                let value = self.var(row).value.add_mul(d, &ratio);
                self.var_mut(row).value = value;
                if self.out_of_bounds(row) {
                    self.oob.insert(row);
                }
            }
            // a column upper bound supports the row side matching the
            // sign of the expansion coefficient
            let touches_upper = is_upper == (coeff.sign() != num_bigint::Sign::Minus);
            self.update_row_support(row, &ratio, old_bound, new_bound, touches_upper);
            let var = self.var(row);
            if var.num_upper_inf == 0 || var.num_lower_inf == 0 {
                self.prop_bounds.insert(row);
            }
        }
    }

    // --- Asserting bounds ---

    /// Install `reason` as the new head of its side's chain and run the
    /// resulting propagations. The caller guarantees the reason is
    /// strictly tighter than the current exact bound.
    fn set_bound(&mut self, reason_id: ReasonId) -> Option<TheoryClause> {
        let (v, is_upper, bound) = {
            let r = self.reasons.get(reason_id);
            (r.var, r.is_upper, r.bound.clone())
        };
        let old_bound = if is_upper {
            self.upper_bound(v)
        } else {
            self.lower_bound(v)
        };
        {
            let var = self.var_mut(v);
            if is_upper {
                let old = var.upper.take();
                var.upper = Some(reason_id);
                self.reasons.get_mut(reason_id).old_reason = old;
            } else {
                let old = var.lower.take();
                var.lower = Some(reason_id);
                self.reasons.get_mut(reason_id).old_reason = old;
            }
        }
        if !self.var(v).basic && !self.var(v).dead {
            self.update_variable(v, is_upper, &old_bound, &bound);
        } else if self.var(v).basic && self.out_of_bounds(v) {
            self.oob.insert(v);
        }

        // propagate atoms subsumed by the new bound
        if is_upper {
            let props: Vec<Lit> = self
                .var(v)
                .constraints
                .range(bound.clone()..old_bound.clone())
                .map(|(_, &a)| self.atoms.get(a).lit())
                .collect();
            self.prop_list.extend(props);
            let eps = self.var(v).epsilon();
            let diseq_props: Vec<Lit> = self
                .var(v)
                .equalities
                .range(bound.add(&eps)..old_bound.add(&eps))
                .map(|(_, &a)| self.atoms.get(a).lit().negate())
                .collect();
            self.prop_list.extend(diseq_props);
        } else {
            let props: Vec<Lit> = self
                .var(v)
                .constraints
                .range(old_bound.clone()..bound.clone())
                .map(|(_, &a)| self.atoms.get(a).lit().negate())
                .collect();
            self.prop_list.extend(props);
            let diseq_props: Vec<Lit> = self
                .var(v)
                .equalities
                .range(old_bound.clone()..bound.clone())
                .map(|(_, &a)| self.atoms.get(a).lit().negate())
                .collect();
            self.prop_list.extend(diseq_props);
        }

        let ubound = self.upper_bound(v);
        let lbound = self.lower_bound(v);
        if lbound == ubound {
            // bounds pinch to an equality; propagate the atom when the
            // explanation stays inside the trichotomy format
            if let Some(&eq) = self.var(v).equalities.get(&lbound) {
                if self.pinch_explainable(v, &lbound) {
                    self.prop_list.push_back(self.atoms.get(eq).lit());
                }
            }
        } else if ubound < lbound {
            let exact_ub = self.exact_upper_bound(v);
            let exact_lb = self.exact_lower_bound(v);
            if exact_ub < exact_lb {
                self.conflict_var = Some(v);
                return self.check_pending_conflict();
            }
            // only the integer-rounded bounds conflict; surface the
            // rounded side as a fresh literal so the certificate stays
            // within plain Farkas reasoning
            let upper_rounded = {
                let r = self.var(v).upper.expect("conflict without upper");
                let r = self.reasons.get(r);
                r.bound != r.exact_bound
            };
            return self.create_composite_literal(v, upper_rounded);
        }
        None
    }

    /// Can the pinched equality at `bound` be explained by two
    /// bound-constraint literal reasons with exactly that bound? Only
    /// then does the explanation fit the trichotomy format.
    fn pinch_explainable(&self, v: VarId, bound: &InfNumber) -> bool {
        self.chain_literal_at(self.var(v).upper, bound).is_some()
            && self.chain_literal_at(self.var(v).lower, bound).is_some()
    }

    /// Surface an integer-rounded composite bound as a new atom on the
    /// propagation queue.
    fn create_composite_literal(&mut self, v: VarId, is_upper: bool) -> Option<TheoryClause> {
        self.stats.composite_literals += 1;
        let bound = if is_upper {
            self.upper_bound(v)
        } else {
            self.lower_bound(v)
        };
        debug!(var = v.0, %bound, is_upper, "creating composite bound literal");
        let atom_bound = if is_upper {
            bound
        } else {
            bound.sub(&self.var(v).epsilon())
        };
        let atom = self.get_or_create_bound_atom(v, atom_bound);
        let lit = self.atoms.get(atom).lit();
        self.prop_list
            .push_back(if is_upper { lit } else { lit.negate() });
        None
    }

    /// Handle a literal assertion from the DPLL engine.
    pub fn set_literal(&mut self, lit: Lit) -> Result<Option<TheoryClause>> {
        if let Some(conflict) = self.check_pending_bound_propagations()? {
            return Ok(Some(conflict));
        }
        let Some(atom_id) = self.atoms.by_dpll_var(lit.var()) else {
            return Ok(None);
        };
        self.stack_pos += 1;
        let stack_pos = self.stack_pos;
        let atom = self.atoms.get(atom_id);
        let conflict = match atom.kind.clone() {
            LaAtomKind::Bound { var, bound } => {
                if lit.is_positive() {
                    if bound < self.exact_upper_bound(var) {
                        let r = self.reasons.alloc_literal(var, true, bound, lit, stack_pos);
                        self.set_bound(r)
                    } else {
                        None
                    }
                } else {
                    let inv = bound.add(&self.var(var).epsilon());
                    if self.exact_lower_bound(var) < inv {
                        let r = self.reasons.alloc_literal(var, false, inv, lit, stack_pos);
                        self.set_bound(r)
                    } else {
                        None
                    }
                }
            }
            LaAtomKind::Equality { var, bound } => {
                let ibound = InfNumber::from_rational(bound.clone());
                if lit.is_positive() {
                    let mut conflict = None;
                    if ibound < self.exact_upper_bound(var) {
                        let r = self
                            .reasons
                            .alloc_literal(var, true, ibound.clone(), lit, stack_pos);
                        conflict = self.set_bound(r);
                    }
                    if conflict.is_none() && self.exact_lower_bound(var) < ibound {
                        let r = self.reasons.alloc_literal(var, false, ibound, lit, stack_pos);
                        conflict = self.set_bound(r);
                    }
                    conflict
                } else {
                    self.var_mut(var).diseqs.insert(bound, atom_id);
                    None
                }
            }
        };
        Ok(conflict)
    }

    /// Undo a literal assertion.
    pub fn backtrack_literal(&mut self, lit: Lit) {
        let Some(atom_id) = self.atoms.by_dpll_var(lit.var()) else {
            return;
        };
        let atom = self.atoms.get(atom_id);
        let var = match atom.kind.clone() {
            LaAtomKind::Bound { var, .. } => var,
            LaAtomKind::Equality { var, bound } => {
                if !lit.is_positive() {
                    self.var_mut(var).diseqs.remove(&bound);
                    return;
                }
                var
            }
        };
        for upper in [true, false] {
            let mut cursor = if upper {
                self.var(var).upper
            } else {
                self.var(var).lower
            };
            while let Some(r) = cursor {
                let reason = self.reasons.get(r);
                if reason.literal() == Some(lit) && reason.last_literal == r {
                    self.remove_literal_reason(r);
                    break;
                }
                cursor = reason.old_reason;
            }
        }
    }

    fn remove_literal_reason(&mut self, r: ReasonId) {
        let dependents = match &self.reasons.get(r).kind {
            ReasonKind::Literal { dependents, .. } => dependents.clone(),
            ReasonKind::Composite { .. } => Vec::new(),
        };
        for dep in dependents {
            self.remove_reason(dep);
        }
        self.remove_reason(r);
    }

    fn remove_reason(&mut self, r: ReasonId) {
        let (v, is_upper, bound) = {
            let reason = self.reasons.get(r);
            (reason.var, reason.is_upper, reason.bound.clone())
        };
        if self.var(v).basic {
            self.prop_bounds.insert(v);
        }
        let head = if is_upper {
            self.var(v).upper
        } else {
            self.var(v).lower
        };
        if head == Some(r) {
            let older = self.reasons.get(r).old_reason;
            if is_upper {
                self.var_mut(v).upper = older;
            } else {
                self.var_mut(v).lower = older;
            }
            if self.var(v).dead {
                // nothing to fix for simplified variables
            } else if !self.var(v).basic {
                let new_bound = if is_upper {
                    self.upper_bound(v)
                } else {
                    self.lower_bound(v)
                };
                let col_entries: Vec<(VarId, BigInt)> = self.matrix.col(v).collect();
                for (row, coeff) in col_entries {
                    let denom = Rational::from_bigint(self.matrix.denominator(row));
                    let ratio = Rational::from_bigint(coeff.clone()).div(&denom);
                    let touches_upper = is_upper == (coeff.sign() != num_bigint::Sign::Minus);
                    self.update_row_support(row, &ratio, &bound, &new_bound, touches_upper);
                }
                // snap the value back inside the surviving bounds
                let lower = self.lower_bound(v);
                if self.var(v).value < lower {
                    self.update_value(v, lower);
                } else {
                    let upper = self.upper_bound(v);
                    if upper < self.var(v).value {
                        self.update_value(v, upper);
                    }
                }
            } else if self.out_of_bounds(v) {
                self.oob.insert(v);
            }
        } else {
            // unlink from the middle of the chain
            let mut cursor = head.expect("reason not on its chain");
            while self.reasons.get(cursor).old_reason != Some(r) {
                cursor = self.reasons.get(cursor).old_reason.expect("reason not on chain");
            }
            let older = self.reasons.get(r).old_reason;
            self.reasons.get_mut(cursor).old_reason = older;
        }
        self.reasons.release(r);
        if self.conflict_var == Some(v) && !self.still_conflicting(v) {
            self.conflict_var = None;
        }
    }

    fn still_conflicting(&self, v: VarId) -> bool {
        self.exact_upper_bound(v) < self.exact_lower_bound(v)
    }

    /// Set a non-basic variable's value and update all dependent rows.
    fn update_value(&mut self, v: VarId, new_value: InfNumber) {
        debug_assert!(!self.var(v).basic);
        let diff = new_value.sub(&self.var(v).value);
        self.var_mut(v).value = new_value;
        let col_entries: Vec<(VarId, BigInt)> = self.matrix.col(v).collect();
        for (row, coeff) in col_entries {
            let denom = Rational::from_bigint(self.matrix.denominator(row));
            let ratio = Rational::from_bigint(coeff).div(&denom);
            let value = self.var(row).value.add_mul(&diff, &ratio);
            self.var_mut(row).value = value;
            if self.out_of_bounds(row) {
                self.oob.insert(row);
            }
        }
    }

    // --- Bound refinement ---

    fn check_pending_bound_propagations(&mut self) -> Result<Option<TheoryClause>> {
        while let Some(&b) = self.prop_bounds.iter().next() {
            self.prop_bounds.remove(&b);
            if self.var(b).dead || !self.var(b).basic {
                continue;
            }
            if self.var(b).num_upper_inf == 0 {
                if let Some(conflict) = self.propagate_bound(b, true) {
                    return Ok(Some(conflict));
                }
            }
            if self.var(b).num_lower_inf == 0 {
                if let Some(conflict) = self.propagate_bound(b, false) {
                    return Ok(Some(conflict));
                }
            }
        }
        Ok(None)
    }

    /// Derive a composite bound for basic `b` from its row and install it
    /// if it refines the current bound.
    fn propagate_bound(&mut self, b: VarId, is_upper: bool) -> Option<TheoryClause> {
        let exact = if is_upper {
            self.var(b).upper_sum.to_inf_number_lossy()
        } else {
            self.var(b).lower_sum.to_inf_number_lossy()
        };
        let bound = self.var(b).round_bound(exact.clone(), is_upper);
        let current = if is_upper {
            self.exact_upper_bound(b)
        } else {
            self.exact_lower_bound(b)
        };
        let refines = if is_upper {
            exact < current
        } else {
            current < exact
        };
        if !refines {
            return None;
        }
        let denom = Rational::from_bigint(self.matrix.denominator(b));
        let mut children: Vec<(ReasonId, Rational)> = Vec::new();
        let mut last_literal: Option<ReasonId> = None;
        for (col, coeff) in self.matrix.row(b).collect::<Vec<_>>() {
            let ratio = Rational::from_bigint(coeff).div(&denom);
            let child = if (ratio.signum() > 0) == is_upper {
                self.var(col).upper
            } else {
                self.var(col).lower
            };
            let child = child.expect("supporting bound missing with zero counter");
            children.push((child, ratio));
            let last_of_child = self.reasons.get(child).last_literal;
            let pos = self.reasons.get(last_of_child).stack_pos;
            if last_literal.map_or(true, |l| self.reasons.get(l).stack_pos < pos) {
                last_literal = Some(last_of_child);
            }
        }
        let last_literal = last_literal.expect("composite without children");
        let stack_pos = self.reasons.get(last_literal).stack_pos;
        let composite = self.reasons.alloc(LaReason {
            var: b,
            is_upper,
            bound,
            exact_bound: exact,
            old_reason: None,
            last_literal,
            stack_pos,
            kind: ReasonKind::Composite {
                children: children.into_boxed_slice(),
            },
        });
        self.reasons.add_dependent(last_literal, composite);
        self.set_bound(composite)
    }

    // --- Conflicts and explanations ---

    /// Re-check a conflict recorded before backtracking.
    pub fn check_pending_conflict(&mut self) -> Option<TheoryClause> {
        let v = self.conflict_var?;
        if self.still_conflicting(v) {
            let upper = self.var(v).upper.expect("conflict without upper bound");
            let lower = self.var(v).lower.expect("conflict without lower bound");
            let mut explainer = Explainer::default();
            self.explain_reason(upper, &Rational::one(), &mut explainer);
            self.explain_reason(lower, &Rational::minus_one(), &mut explainer);
            return Some(explainer.into_conflict());
        }
        self.conflict_var = None;
        None
    }

    fn explain_reason(&self, r: ReasonId, factor: &Rational, explainer: &mut Explainer) {
        let reason = self.reasons.get(r);
        match &reason.kind {
            ReasonKind::Literal { lit, .. } => explainer.add_asserted(*lit, factor.clone()),
            ReasonKind::Composite { children } => {
                for (child, coeff) in children.iter() {
                    self.explain_reason(*child, &(factor * coeff), explainer);
                }
            }
        }
    }

    /// Build the unit clause explaining a theory-propagated literal.
    pub fn explain_propagation(&self, lit: Lit) -> TheoryClause {
        let atom_id = self
            .atoms
            .by_dpll_var(lit.var())
            .expect("propagated literal without atom");
        let atom = self.atoms.get(atom_id);
        match atom.kind.clone() {
            LaAtomKind::Bound { var, bound } => {
                let mut explainer = Explainer::default();
                if lit.is_positive() {
                    // var.upper <= bound entails the atom
                    explainer.add_conclusion(lit, Rational::minus_one());
                    let mut r = self.var(var).upper.expect("propagation without bound");
                    // use the weakest reason that still entails the atom
                    while let Some(older) = self.reasons.get(r).old_reason {
                        if self.reasons.get(older).bound <= bound {
                            r = older;
                        } else {
                            break;
                        }
                    }
                    self.explain_reason(r, &Rational::one(), &mut explainer);
                } else {
                    let inv = bound.add(&self.var(var).epsilon());
                    explainer.add_conclusion(lit, Rational::one());
                    let mut r = self.var(var).lower.expect("propagation without bound");
                    while let Some(older) = self.reasons.get(r).old_reason {
                        if inv <= self.reasons.get(older).bound {
                            r = older;
                        } else {
                            break;
                        }
                    }
                    self.explain_reason(r, &Rational::minus_one(), &mut explainer);
                }
                explainer.into_conflict()
            }
            LaAtomKind::Equality { var, bound } => {
                if lit.is_positive() {
                    // pinched bounds: trichotomy over the two bound literals
                    let ibound = InfNumber::from_rational(bound);
                    let upper_lit = self
                        .chain_literal_at(self.var(var).upper, &ibound)
                        .expect("unexplainable equality propagation");
                    let lower_lit = self
                        .chain_literal_at(self.var(var).lower, &ibound)
                        .expect("unexplainable equality propagation");
                    TheoryClause::new(
                        [lit, upper_lit.negate(), lower_lit.negate()],
                        LemmaAnnotation::Trichotomy,
                    )
                } else {
                    // disequality propagated from a bound passing the value
                    let ibound = InfNumber::from_rational(bound);
                    let mut explainer = Explainer::default();
                    if self.upper_bound(var) < ibound {
                        explainer.add_conclusion(lit, Rational::minus_one());
                        let r = self.var(var).upper.expect("bound missing");
                        self.explain_reason(r, &Rational::one(), &mut explainer);
                    } else {
                        debug_assert!(ibound < self.lower_bound(var));
                        explainer.add_conclusion(lit, Rational::one());
                        let r = self.var(var).lower.expect("bound missing");
                        self.explain_reason(r, &Rational::minus_one(), &mut explainer);
                    }
                    explainer.into_conflict()
                }
            }
        }
    }

    /// Find a bound-constraint literal reason asserting exactly `bound`
    /// on the chain.
    fn chain_literal_at(&self, mut head: Option<ReasonId>, bound: &InfNumber) -> Option<Lit> {
        while let Some(r) = head {
            let reason = self.reasons.get(r);
            if &reason.bound == bound {
                if let Some(lit) = reason.literal() {
                    let is_bound_atom = self
                        .atoms
                        .by_dpll_var(lit.var())
                        .map(|a| matches!(self.atoms.get(a).kind, LaAtomKind::Bound { .. }))
                        .unwrap_or(false);
                    if is_bound_atom {
                        return Some(lit);
                    }
                }
            }
            head = reason.old_reason;
        }
        None
    }

    // --- The simplex loop ---

    /// Run pending propagations and, inside a check, repair all
    /// out-of-bounds variables.
    pub fn checkpoint(&mut self) -> Result<Option<TheoryClause>> {
        if let Some(conflict) = self.check_pending_bound_propagations()? {
            return Ok(Some(conflict));
        }
        if !self.in_check {
            return Ok(None);
        }
        self.fix_out_of_bounds()
    }

    /// Begin a check-sat: reset the model epsilon and simplify the
    /// tableau.
    pub fn start_check(&mut self, simplify: bool) -> Result<Option<TheoryClause>> {
        self.model_eps = None;
        self.in_check = true;
        self.cuts_this_check = 0;
        self.diseq_suggested.clear();
        self.diseq_stuck = false;
        if simplify {
            self.simplify_tableau()
        } else {
            Ok(None)
        }
    }

    /// End a check-sat.
    pub fn end_check(&mut self) {
        self.in_check = false;
    }

    fn fix_epsilon(&mut self, b: VarId) {
        if !self.var(b).basic {
            return;
        }
        let denom = Rational::from_bigint(self.matrix.denominator(b));
        let mut eps = Rational::zero();
        for (col, coeff) in self.matrix.row(b) {
            let ratio = Rational::from_bigint(coeff).div(&denom);
            let col_eps = Rational::from_integer(self.var(col).value.eps as i64);
            eps = eps.add_mul(&col_eps, &ratio);
        }
        self.var_mut(b).value.eps = eps.signum() as i8;
    }

    /// The exact epsilon multiplicity of a basic variable's value.
    pub fn compute_epsilon(&self, b: VarId) -> Rational {
        if !self.var(b).basic {
            return Rational::from_integer(self.var(b).value.eps as i64);
        }
        let denom = Rational::from_bigint(self.matrix.denominator(b));
        let mut eps = Rational::zero();
        for (col, coeff) in self.matrix.row(b) {
            let ratio = Rational::from_bigint(coeff).div(&denom);
            let col_eps = Rational::from_integer(self.var(col).value.eps as i64);
            eps = eps.add_mul(&col_eps, &ratio);
        }
        eps
    }

    /// Repair all out-of-bounds basic variables by pivoting and value
    /// updates, switching to Bland's rule against cycling.
    pub fn fix_out_of_bounds(&mut self) -> Result<Option<TheoryClause>> {
        let switch_to_bland = self.bland_use_factor as u64 * self.vars.len() as u64;
        let mut pivots_here: u64 = 0;
        let mut use_bland = false;
        'poll: loop {
            if self.cancel.is_cancelled() {
                return Err(SilexError::ResourceLimit("cancelled in pivot loop"));
            }
            let Some(oob) = self.next_out_of_bounds(use_bland) else {
                break;
            };
            debug_assert!(self.var(oob).basic);
            self.fix_epsilon(oob);
            let value = self.var(oob).value.clone();
            let lower = self.exact_lower_bound(oob);
            let upper = self.exact_upper_bound(oob);
            let (bound, below_lower) = if value < lower {
                (self.lower_bound(oob), true)
            } else if upper < value {
                (self.upper_bound(oob), false)
            } else {
                continue;
            };
            let mut diff = value.sub(&bound);
            if diff.signum() < 0 {
                diff = diff.negate();
            }
            // columns with a negative coefficient must move toward their
            // lower bound to raise this variable
            let want_lower = below_lower;
            let denom = self.matrix.denominator(oob);
            // sign-matched denominator so computed slacks come out positive
            let denom_signed = if below_lower { -denom.clone() } else { denom };

            loop {
                let entry = self.find_pivot_column(oob, want_lower, use_bland);
                let Some((col, coeff)) = entry else {
                    // no column can absorb anything: the row's composite
                    // bound opposes the asserted bound
                    let side_upper = !below_lower;
                    if let Some(conflict) = self.propagate_bound(oob, side_upper) {
                        return Ok(Some(conflict));
                    }
                    if let Some(conflict) = self.check_pending_conflict() {
                        return Ok(Some(conflict));
                    }
                    debug_assert!(!self.out_of_bounds(oob), "unrepairable row without conflict");
                    continue 'poll;
                };
                let check_lower = coeff.is_negative() == want_lower;
                let col_bound = if check_lower {
                    self.lower_bound(col)
                } else {
                    self.upper_bound(col)
                };
                let ratio = Rational::from_bigint(coeff.clone())
                    .div(&Rational::from_bigint(denom_signed.clone()));
                let slack = self.var(col).value.sub(&col_bound).mul(&ratio);
                debug_assert!(slack.signum() > 0 || slack.is_infinite());
                if !use_bland && !slack.is_infinite() && slack < diff {
                    // push the column to its bound without pivoting
                    self.update_value(col, col_bound);
                    self.oob.remove(&oob);
                    if !self.out_of_bounds(oob) {
                        continue 'poll;
                    }
                    self.fix_epsilon(oob);
                    diff = self.var(oob).value.sub(&bound);
                    if diff.signum() < 0 {
                        diff = diff.negate();
                    }
                    continue;
                }
                self.pivot(oob, col)?;
                if use_bland {
                    self.stats.bland_pivots += 1;
                }
                pivots_here += 1;
                if !use_bland && pivots_here > switch_to_bland {
                    debug!("switching to Bland's rule");
                    use_bland = true;
                    self.stats.switches_to_bland += 1;
                }
                self.update_value(oob, bound);
                if let Some(conflict) = self.check_pending_bound_propagations()? {
                    return Ok(Some(conflict));
                }
                continue 'poll;
            }
        }
        Ok(None)
    }

    fn next_out_of_bounds(&mut self, use_bland: bool) -> Option<VarId> {
        loop {
            let v = if use_bland {
                self.oob.iter().next().copied()?
            } else {
                // prefer the shortest row
                let mut best: Option<(usize, VarId)> = None;
                for &v in &self.oob {
                    let len = self.matrix.row(v).count();
                    if best.map_or(true, |(b, _)| len < b) {
                        best = Some((len, v));
                    }
                }
                best?.1
            };
            self.oob.remove(&v);
            if !self.var(v).basic || self.var(v).dead {
                continue;
            }
            if self.out_of_bounds(v) {
                return Some(v);
            }
        }
    }

    /// Select the pivot column of `oob`'s row: Bland's rule picks the
    /// first eligible column by index, the heuristic prefers unbounded
    /// columns and short dependency chains.
    fn find_pivot_column(
        &self,
        oob: VarId,
        want_lower: bool,
        use_bland: bool,
    ) -> Option<(VarId, BigInt)> {
        let mut best: Option<(VarId, BigInt, u32, bool)> = None;
        for (col, coeff) in self.matrix.row(oob) {
            let check_lower = (coeff.is_negative()) == want_lower;
            let colvar = self.var(col);
            if colvar.upper.is_none() && colvar.lower.is_none() {
                // unconstrained column absorbs everything
                return Some((col, coeff));
            }
            let eligible = if check_lower {
                self.lower_bound(col) < colvar.value
            } else {
                colvar.value < self.upper_bound(col)
            };
            if !eligible {
                continue;
            }
            if use_bland {
                return Some((col, coeff));
            }
            let unbounded = if check_lower {
                colvar.lower.is_none()
            } else {
                colvar.upper.is_none()
            };
            let chain = self.matrix.col_len(col);
            let better = match &best {
                None => true,
                Some((_, _, best_chain, best_unbounded)) => {
                    (unbounded && !best_unbounded)
                        || (unbounded == *best_unbounded && chain < *best_chain)
                }
            };
            if better {
                best = Some((col, coeff, chain, unbounded));
            }
        }
        best.map(|(c, q, _, _)| (c, q))
    }

    /// Pivot basic `b` out against non-basic `n`.
    fn pivot(&mut self, b: VarId, n: VarId) -> Result<()> {
        self.stats.pivots += 1;
        debug!(basic = b.0, nonbasic = n.0, "pivot");
        let b_head = self.matrix.head_coeff(b).clone();
        let b_row = self.matrix.row_to_vec(b);
        let n_coeff = b_row
            .iter()
            .find(|(c, _)| *c == n)
            .map(|(_, q)| q.clone())
            .ok_or(SilexError::Internal("pivot entry vanished"))?;

        // new row for n: same linear form, head moved to n
        let mut new_entries: Vec<(VarId, BigInt)> = b_row
            .iter()
            .filter(|(c, _)| *c != n)
            .cloned()
            .collect();
        new_entries.push((b, b_head.clone()));
        new_entries.sort_by_key(|(c, _)| *c);
        let mut new_head = n_coeff.clone();
        Matrix::normalize_row(&mut new_head, &mut new_entries);

        self.matrix.clear_row(b);
        self.var_mut(b).basic = false;
        self.var_mut(b).reset_composites();
        self.var_mut(n).basic = true;
        // other rows containing n before installing the new row
        let dependents: Vec<(VarId, BigInt)> = self.matrix.col(n).collect();
        self.matrix.set_row(n, new_head.clone(), &new_entries);
        self.refresh_row_support(n);
        if self.var(n).num_upper_inf == 0 || self.var(n).num_lower_inf == 0 {
            self.prop_bounds.insert(n);
        }

        for (row, t_coeff) in dependents {
            if row == n {
                continue;
            }
            let t_head = self.matrix.head_coeff(row).clone();
            let t_row = self.matrix.row_to_vec(row);
            let (h, entries) = Matrix::eliminate(
                row, &t_head, &t_row, n, &new_head, &new_entries, &t_coeff,
            );
            self.matrix.set_row(row, h, &entries);
            self.refresh_row_support(row);
            let var = self.var(row);
            if var.num_upper_inf == 0 || var.num_lower_inf == 0 {
                self.prop_bounds.insert(row);
            }
            if self.out_of_bounds(row) {
                self.oob.insert(row);
            }
        }
        Ok(())
    }

    // --- Tableau simplification ---

    /// Remove trivially satisfiable real rows: a basic real variable
    /// whose row contains an unconstrained column (or that is itself
    /// unconstrained) can be solved for and dropped.
    fn simplify_tableau(&mut self) -> Result<Option<TheoryClause>> {
        let candidates: Vec<VarId> = (0..self.vars.len() as u32).map(VarId).collect();
        for v in candidates {
            let var = self.var(v);
            if var.is_int || var.dead || !var.unconstrained() {
                continue;
            }
            if self.var(v).basic {
                self.kill_row(v);
            } else {
                let rows: Vec<(VarId, BigInt)> = self.matrix.col(v).collect();
                for (basic, _) in rows {
                    if !self.var(basic).unconstrained() && !self.var(basic).dead {
                        self.pivot(basic, v)?;
                        let bound = {
                            let lb = self.lower_bound(basic);
                            if lb.is_infinite() {
                                self.upper_bound(basic)
                            } else {
                                lb
                            }
                        };
                        if !bound.is_infinite() {
                            self.update_value(basic, bound);
                        }
                        self.oob.remove(&basic);
                        self.kill_row(v);
                        break;
                    }
                }
            }
        }
        self.check_pending_bound_propagations()
    }

    /// Drop a basic variable's row, recording its expansion.
    fn kill_row(&mut self, v: VarId) {
        debug_assert!(self.var(v).basic);
        let denom = Rational::from_bigint(self.matrix.denominator(v));
        let expansion: Vec<(VarId, Rational)> = self
            .matrix
            .row(v)
            .map(|(c, q)| (c, Rational::from_bigint(q).div(&denom)))
            .collect();
        self.matrix.clear_row(v);
        self.var_mut(v).basic = false;
        self.var_mut(v).dead = true;
        self.var_mut(v).reset_composites();
        self.oob.remove(&v);
        self.prop_bounds.remove(&v);
        self.update_simps(v, &expansion);
        self.simps.insert(v, expansion);
    }

    fn update_simps(&mut self, v: VarId, expansion: &[(VarId, Rational)]) {
        for exp in self.simps.values_mut() {
            if let Some(pos) = exp.iter().position(|(w, _)| *w == v) {
                let (_, factor) = exp.remove(pos);
                for (w, c) in expansion {
                    let add = &factor * c;
                    if let Some(slot) = exp.iter_mut().find(|(x, _)| x == w) {
                        slot.1 = &slot.1 + &add;
                    } else {
                        exp.push((*w, add));
                    }
                }
                exp.retain(|(_, c)| !c.is_zero());
            }
        }
    }

    // --- Atoms ---

    fn canonical_atom_affine(&self, v: VarId, bound: &Rational) -> SmtAffineTerm {
        let def = self.var(v).def.clone();
        match bound.as_finite() {
            Some(q) => def.add_constant(&-q),
            None => def,
        }
    }

    fn get_or_create_bound_atom(&mut self, v: VarId, bound: InfNumber) -> AtomId {
        if let Some(&a) = self.var(v).constraints.get(&bound) {
            return a;
        }
        let level = self.scopes.len() as u32;
        let dpll_var = self.pool.fresh();
        let atom = LaAtom {
            kind: LaAtomKind::Bound {
                var: v,
                bound: bound.clone(),
            },
            dpll_var,
            term: TermId(0),
            assert_level: level,
        };
        let id = self.atoms.insert(atom);
        self.var_mut(v).constraints.insert(bound.clone(), id);
        self.pending_atoms.push(id);
        // initial propagation against current bounds
        if self.upper_bound(v) <= bound {
            self.prop_list.push_back(Lit::positive(dpll_var));
        }
        if bound < self.lower_bound(v) {
            self.prop_list.push_back(Lit::negative(dpll_var));
        }
        id
    }

    /// Materialize the quoted SMT term of an atom. Called by the
    /// integration layer while draining `pending_atoms`.
    pub fn build_atom_term(&mut self, tm: &mut TermManager, id: AtomId) -> TermId {
        let atom = self.atoms.get(id);
        if atom.term != TermId(0) {
            return atom.term;
        }
        let term = match atom.kind.clone() {
            LaAtomKind::Bound { var, bound } => {
                let affine = self.canonical_atom_affine(var, &bound.real);
                let lhs = affine.to_term(tm);
                let zero = tm.mk_zero(affine.sort());
                let cmp = if bound.eps < 0 {
                    tm.mk_app(Op::Lt, &[lhs, zero])
                } else {
                    tm.mk_le(lhs, zero)
                };
                tm.mk_quoted(cmp, QuoteKind::Plain)
            }
            LaAtomKind::Equality { var, bound } => {
                let affine = self.canonical_atom_affine(var, &bound);
                let lhs = affine.to_term(tm);
                let zero = tm.mk_zero(affine.sort());
                let eq = tm.mk_eq(lhs, zero);
                tm.mk_quoted(eq, QuoteKind::Plain)
            }
        };
        self.atoms.set_term(id, term);
        term
    }

    /// Create (or fetch) the bound-constraint literal for
    /// `combination <= bound` (or `>=` when `is_lower`).
    pub fn generate_constraint(
        &mut self,
        summands: Vec<(VarId, Rational)>,
        constant: Rational,
        strict: bool,
    ) -> Lit {
        let (summands, constant, negated) = normalize_combination(summands, constant);
        let level = self.scopes.len() as u32;
        let v = self.generate_lin_var(summands, level);
        let bound = -&constant;
        self.generate_constraint_var(v, bound, negated, strict)
    }

    fn generate_constraint_var(
        &mut self,
        v: VarId,
        bound: Rational,
        is_lower: bool,
        strict: bool,
    ) -> Lit {
        let eps = if strict != is_lower { -1 } else { 0 };
        let mut rbound = InfNumber::new(bound, eps);
        if self.var(v).is_int {
            rbound = rbound.floor();
        }
        self.ensure_unsimplified(v);
        let atom = self.get_or_create_bound_atom(v, rbound);
        let lit = self.atoms.get(atom).lit();
        if is_lower {
            lit.negate()
        } else {
            lit
        }
    }

    /// Create (or fetch) the equality atom for `combination = constant`.
    pub fn create_equality(&mut self, summands: Vec<(VarId, Rational)>, constant: Rational) -> AtomId {
        let (summands, constant, _) = normalize_combination(summands, constant);
        let level = self.scopes.len() as u32;
        let v = self.generate_lin_var(summands, level);
        let bound = -&constant;
        self.ensure_unsimplified(v);
        let key = InfNumber::from_rational(bound.clone());
        if let Some(&a) = self.var(v).equalities.get(&key) {
            return a;
        }
        let dpll_var = self.pool.fresh();
        let id = self.atoms.insert(LaAtom {
            kind: LaAtomKind::Equality { var: v, bound },
            dpll_var,
            term: TermId(0),
            assert_level: level,
        });
        self.var_mut(v).equalities.insert(key, id);
        self.pending_atoms.push(id);
        id
    }

    // --- Propagation and suggestion queues ---

    /// Dequeue a theory-propagated literal.
    pub fn propagated_literal(&mut self) -> Option<Lit> {
        self.prop_list.pop_front()
    }

    /// Are propagations queued?
    pub fn has_propagations(&self) -> bool {
        !self.prop_list.is_empty()
    }

    /// Dequeue a decision suggestion.
    pub fn suggestion(&mut self) -> Option<Lit> {
        self.suggestions.pop_front()
    }

    /// Are suggestions queued?
    pub fn has_suggestions(&self) -> bool {
        !self.suggestions.is_empty()
    }

    // --- Final check ---

    /// The end-of-search check: repair, cut, mutate, and collect shared
    /// congruences. Returns a conflict, or `None` with possibly new
    /// entries on the propagation and suggestion queues.
    pub fn compute_conflict_clause(&mut self) -> Result<Option<TheoryClause>> {
        self.suggestions.clear();
        self.diseq_stuck = false;
        debug!("LA final check");
        if let Some(c) = self.fix_out_of_bounds()? {
            return Ok(Some(c));
        }
        if let Some(c) = self.ensure_integrals()? {
            return Ok(Some(c));
        }
        if !self.suggestions.is_empty() || !self.prop_list.is_empty() {
            return Ok(None);
        }
        debug_assert!(self.oob.is_empty());
        self.mutate()?;
        debug_assert!(self.oob.is_empty());
        // disequalities that still bite become decision suggestions
        let vars: Vec<VarId> = (0..self.vars.len() as u32).map(VarId).collect();
        for v in vars {
            if self.var(v).dead {
                continue;
            }
            self.fix_epsilon(v);
            let value = self.var(v).value.clone();
            if value.eps != 0 {
                continue;
            }
            let Some(&_atom) = self.var(v).diseqs.get(&value.real) else {
                continue;
            };
            match self.ensure_disequality(v, value.real.clone()) {
                Some(lit) => {
                    debug!(var = v.0, "suggesting disequality split");
                    self.suggestions.push_back(lit);
                }
                None => self.diseq_stuck = true,
            }
        }
        Ok(None)
    }

    /// Did the final check leave a violated disequality it could not
    /// split on? The caller must answer `unknown` rather than `sat`.
    pub fn has_stuck_disequality(&self) -> bool {
        self.diseq_stuck
    }

    /// Drive integer variables to integral values: delegate to the cut
    /// generator, which enqueues branch literals.
    fn ensure_integrals(&mut self) -> Result<Option<TheoryClause>> {
        let mut all_integral = true;
        for &v in &self.int_vars.clone() {
            self.fix_epsilon(v);
            if !self.var(v).value.is_integral() {
                all_integral = false;
            }
        }
        if all_integral {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            return Err(SilexError::ResourceLimit("cancelled before cut generation"));
        }
        debug_assert!(self.oob.is_empty());
        super::cut::generate_cuts(self)?;
        if let Some(c) = self.check_pending_conflict() {
            return Ok(Some(c));
        }
        self.checkpoint()
    }

    pub(crate) fn cut_budget_left(&mut self) -> bool {
        if self.cuts_this_check >= self.max_cuts {
            return false;
        }
        self.cuts_this_check += 1;
        true
    }

    pub(crate) fn note_cut(&mut self) {
        self.stats.cuts += 1;
    }

    pub(crate) fn note_branch(&mut self) {
        self.stats.branches += 1;
    }

    pub(crate) fn suggest(&mut self, lit: Lit) {
        self.suggestions.push_back(lit);
    }

    /// Enqueue a decision suggestion from the combination layer.
    pub fn add_suggestion(&mut self, lit: Lit) {
        self.suggestions.push_back(lit);
    }

    /// Pick a literal that moves `v` away from a violated disequality.
    /// Each `(variable, value)` pair is suggested at most once per
    /// check, so a rejected split cannot recur forever.
    fn ensure_disequality(&mut self, v: VarId, value: Rational) -> Option<Lit> {
        if !self.diseq_suggested.insert((v.0, value.clone())) {
            return None;
        }
        let bound = InfNumber::from_rational(value.clone());
        if let Some(&bc) = self.var(v).constraints.get(&bound) {
            return Some(self.atoms.get(bc).lit().negate());
        }
        let strict = bound.sub(&self.var(v).epsilon());
        if let Some(&bc) = self.var(v).constraints.get(&strict) {
            return Some(self.atoms.get(bc).lit());
        }
        Some(self.generate_constraint_var(v, value, false, true))
    }

    // --- Model repair ---

    /// Freedom interval of a non-basic variable: how far its value can
    /// move without pushing a dependent basic variable over a bound.
    fn freedom(&self, v: VarId) -> (ExactInfNumber, ExactInfNumber) {
        let mut lower = ExactInfNumber::from_inf(&self.exact_lower_bound(v));
        let mut upper = ExactInfNumber::from_inf(&self.exact_upper_bound(v));
        if lower == upper {
            return (lower, upper);
        }
        let mut max_below = ExactInfNumber::neg_infinity();
        let mut min_above = ExactInfNumber::pos_infinity();
        for (row, coeff) in self.matrix.col(v) {
            // moving v by d moves row by ratio * d; invert for the row
            let inv = Rational::from_bigint(self.matrix.denominator(row))
                .div(&Rational::from_bigint(coeff));
            let row_value = self.exact_value(row);
            let mut below = ExactInfNumber::from_inf(&self.exact_lower_bound(row))
                .sub(&row_value)
                .mul(&inv);
            let mut above = ExactInfNumber::from_inf(&self.exact_upper_bound(row))
                .sub(&row_value)
                .mul(&inv);
            if inv.is_negative() {
                std::mem::swap(&mut below, &mut above);
            }
            if below.signum() > 0 {
                below = ExactInfNumber::zero();
            }
            if above.signum() < 0 {
                above = ExactInfNumber::zero();
            }
            if below > max_below {
                max_below = below;
            }
            if above < min_above {
                min_above = above;
            }
        }
        let here = self.exact_value(v);
        let max_below = max_below.add(&here);
        let min_above = min_above.add(&here);
        if max_below > lower {
            lower = max_below;
        }
        if min_above < upper {
            upper = min_above;
        }
        (lower, upper)
    }

    /// The exact value of a variable (epsilon multiplicity included).
    pub fn exact_value(&self, v: VarId) -> ExactInfNumber {
        ExactInfNumber::new(self.var(v).value.real.clone(), self.compute_epsilon(v))
    }

    /// Nudge non-basic variables off disequality points and apart from
    /// other shared variables, within their freedom intervals.
    fn mutate(&mut self) -> Result<()> {
        let vars: Vec<VarId> = (0..self.vars.len() as u32).map(VarId).collect();
        for v in vars {
            if self.cancel.is_cancelled() {
                return Err(SilexError::ResourceLimit("cancelled in mutate"));
            }
            let var = self.var(v);
            if var.basic || var.dead || self.upper_bound(v) == self.lower_bound(v) {
                continue;
            }
            let (lower, upper) = self.freedom(v);
            if lower == upper {
                continue;
            }
            let mut prohibited: BTreeSet<InfNumber> = BTreeSet::new();
            for diseq in self.var(v).diseqs.keys() {
                prohibited.insert(InfNumber::from_rational(diseq.clone()));
            }
            let exact_here = self.exact_value(v);
            let mut gcd = if self.var(v).is_int {
                Rational::one()
            } else {
                Rational::zero()
            };
            let mut factors: FxHashMap<VarId, Rational> = FxHashMap::default();
            for (row, coeff) in self.matrix.col(v).collect::<Vec<_>>() {
                let ratio = Rational::from_bigint(coeff)
                    .div(&Rational::from_bigint(self.matrix.denominator(row)));
                if self.var(row).is_int {
                    gcd = gcd.gcd(&ratio.abs());
                }
                for diseq in self.var(row).diseqs.keys() {
                    let row_value = self.exact_value(row);
                    let bad = ExactInfNumber::new(diseq.clone(), Rational::zero())
                        .sub(&row_value)
                        .div(&ratio)
                        .add(&exact_here);
                    if let Some(b) = bad.to_inf_number() {
                        prohibited.insert(b);
                    }
                }
                factors.insert(row, ratio);
            }
            // collect shared points per slope so the move does not merge
            // two shared terms that are currently apart
            let mut shared_points: BTreeMap<Rational, BTreeSet<ExactInfNumber>> = BTreeMap::new();
            for shared in &self.shared {
                let slope = shared
                    .var
                    .and_then(|sv| {
                        if sv == v {
                            Some(shared.factor.clone())
                        } else {
                            factors.get(&sv).map(|f| f * &shared.factor)
                        }
                    })
                    .unwrap_or_else(Rational::zero);
                let value = self.shared_value(shared);
                shared_points.entry(slope).or_default().insert(value);
            }
            let lcm = gcd.inverse();
            let current = self.var(v).value.clone();
            let chosen = choose(&prohibited, &shared_points, &lcm, &current, &lower, &upper, &exact_here);
            if chosen != current {
                debug!(var = v.0, from = %current, to = %chosen, "mutating model value");
                self.update_value(v, chosen);
            }
        }
        Ok(())
    }

    fn shared_value(&self, shared: &SharedVar) -> ExactInfNumber {
        let mut value = ExactInfNumber::new(shared.offset.clone(), Rational::zero());
        if let Some(v) = shared.var {
            let var_value = if self.var(v).dead {
                self.simp_value(v)
            } else {
                self.exact_value(v)
            };
            value = value.add(&var_value.mul(&shared.factor));
        }
        value
    }

    fn simp_value(&self, v: VarId) -> ExactInfNumber {
        let mut value = ExactInfNumber::zero();
        if let Some(exp) = self.simps.get(&v) {
            for (w, c) in exp {
                value = value.add(&self.exact_value(*w).mul(c));
            }
        }
        value
    }

    // --- Theory combination ---

    /// Register a shared term as `factor * var + offset`.
    pub fn share(&mut self, shared: SharedVar) {
        self.shared.push(shared);
    }

    /// Group shared terms by their current exact value. Groups of two or
    /// more are merge candidates for the congruence closure.
    pub fn shared_congruences(&self) -> Vec<Vec<TermId>> {
        let mut groups: BTreeMap<ExactInfNumber, Vec<TermId>> = BTreeMap::new();
        for shared in &self.shared {
            groups
                .entry(self.shared_value(shared))
                .or_default()
                .push(shared.term);
        }
        groups.into_values().filter(|g| g.len() > 1).collect()
    }

    // --- Model output ---

    fn prepare_model(&mut self) {
        if self.model_eps.is_some() {
            return;
        }
        let mut prohibitions: BTreeSet<Rational> = BTreeSet::new();
        let maxeps = self.compute_max_epsilon(&mut prohibitions);
        let mut eps = if maxeps == InfNumber::pos_infinity() {
            Rational::one()
        } else {
            maxeps.inverse_real().ceil().inverse()
        };
        if eps.signum() <= 0 {
            eps = Rational::one();
        }
        // keep distinct shared values distinct under the concrete eps
        let shared_exact: Vec<ExactInfNumber> = self
            .shared
            .iter()
            .map(|s| self.shared_value(s))
            .collect();
        loop {
            let collision = prohibitions.contains(&eps) || {
                let mut seen = BTreeSet::new();
                shared_exact.iter().any(|value| {
                    let concrete = &value.real + &(&value.eps * &eps);
                    !seen.insert(concrete)
                })
            };
            if !collision {
                break;
            }
            eps = (&eps.inverse() + &Rational::one()).inverse();
        }
        self.model_eps = Some(eps);
    }

    fn compute_max_epsilon(&self, prohibitions: &mut BTreeSet<Rational>) -> InfNumber {
        let mut maxeps = InfNumber::pos_infinity();
        for (i, var) in self.vars.iter().enumerate() {
            let v = VarId(i as u32);
            if var.dead {
                continue;
            }
            let epsilons = self.compute_epsilon(v);
            match epsilons.signum() {
                1 => {
                    let diff = self
                        .upper_bound(v)
                        .sub(&InfNumber::from_rational(var.value.real.clone()))
                        .div(&epsilons);
                    if diff < maxeps {
                        maxeps = diff;
                    }
                }
                -1 => {
                    let diff = self
                        .lower_bound(v)
                        .sub(&InfNumber::from_rational(var.value.real.clone()))
                        .div(&epsilons);
                    if diff < maxeps {
                        maxeps = diff;
                    }
                }
                _ => {}
            }
            if epsilons.signum() != 0 {
                for diseq in var.diseqs.keys() {
                    prohibitions.insert((diseq - &var.value.real).div(&epsilons));
                }
            }
        }
        maxeps
    }

    /// The concrete rational value of a variable under the prepared
    /// model epsilon.
    pub fn real_value(&mut self, v: VarId) -> Rational {
        self.prepare_model();
        let eps = self.model_eps.clone().expect("model prepared");
        if self.var(v).dead {
            let value = self.simp_value(v);
            return &value.real + &(&value.eps * &eps);
        }
        let exact = self.exact_value(v);
        &exact.real + &(&exact.eps * &eps)
    }

    // --- Assertion stack ---

    /// Open a scope.
    pub fn push(&mut self) {
        self.scopes.push(Scope {
            num_vars: self.vars.len(),
            num_shared: self.shared.len(),
            term_keys: Vec::new(),
        });
    }

    /// Close the innermost scope, discarding its variables and atoms.
    pub fn pop(&mut self) -> Result<()> {
        let scope = self
            .scopes
            .pop()
            .ok_or(SilexError::Internal("pop without push"))?;
        for key in scope.term_keys {
            self.terms.remove(&key);
        }
        self.shared.truncate(scope.num_shared);
        // remove the tail variables, pivoting them out of the matrix
        while self.vars.len() > scope.num_vars {
            let v = VarId(self.vars.len() as u32 - 1);
            self.oob.remove(&v);
            self.prop_bounds.remove(&v);
            if self.conflict_var == Some(v) {
                self.conflict_var = None;
            }
            if self.var(v).dead {
                self.simps.remove(&v);
            } else {
                self.remove_lin_var(v)?;
            }
            if self.var(v).is_int {
                self.int_vars.retain(|&w| w != v);
            }
            self.vars.pop();
            self.matrix.remove_last_var(v);
        }
        let level = self.scopes.len() as u32;
        self.atoms.pop_to_level(level);
        self.suggestions.clear();
        self.prop_list.clear();
        Ok(())
    }

    fn remove_lin_var(&mut self, v: VarId) -> Result<()> {
        if !self.var(v).basic {
            if self.matrix.col_is_empty(v) {
                return Ok(());
            }
            let (row, _) = self
                .matrix
                .col(v)
                .next()
                .ok_or(SilexError::Internal("empty column"))?;
            self.pivot(row, v)?;
        }
        let denom = Rational::from_bigint(self.matrix.denominator(v));
        let expansion: Vec<(VarId, Rational)> = self
            .matrix
            .row(v)
            .map(|(c, q)| (c, Rational::from_bigint(q).div(&denom)))
            .collect();
        self.matrix.clear_row(v);
        self.var_mut(v).basic = false;
        self.update_simps(v, &expansion);
        Ok(())
    }
}

/// gcd-normalize a linear combination: divide by the signed gcd so the
/// leading coefficient is positive and the gcd is one. Returns the
/// normalized summands, the scaled constant, and whether the sign was
/// flipped (which turns an upper bound into a lower bound).
fn normalize_combination(
    mut summands: Vec<(VarId, Rational)>,
    constant: Rational,
) -> (Vec<(VarId, Rational)>, Rational, bool) {
    summands.retain(|(_, c)| !c.is_zero());
    summands.sort_by_key(|(v, _)| *v);
    debug_assert!(!summands.is_empty());
    let mut gcd = Rational::zero();
    for (_, c) in &summands {
        gcd = gcd.gcd(&c.abs());
    }
    let negated = summands[0].1.is_negative();
    if negated {
        gcd = -&gcd;
    }
    for (_, c) in summands.iter_mut() {
        *c = c.div(&gcd);
    }
    (summands, constant.div(&gcd), negated)
}

/// Pick a value in `[lower, upper]` that avoids the prohibited points
/// and does not newly merge two shared values; integers step by `lcm`.
#[allow(clippy::too_many_arguments)]
fn choose(
    prohibited: &BTreeSet<InfNumber>,
    shared_points: &BTreeMap<Rational, BTreeSet<ExactInfNumber>>,
    lcm: &Rational,
    current: &InfNumber,
    lower: &ExactInfNumber,
    upper: &ExactInfNumber,
    exact_here: &ExactInfNumber,
) -> InfNumber {
    let ok = |candidate: &InfNumber| -> bool {
        if prohibited.contains(candidate) {
            return false;
        }
        let diff = exact_here.diff_to(candidate);
        !has_sharing(shared_points, &diff)
    };
    let in_range = |candidate: &InfNumber| -> bool {
        let c = ExactInfNumber::from_inf(candidate);
        &c >= lower && &c <= upper
    };
    if lower == upper || ok(current) {
        return current.clone();
    }
    if lcm.is_infinite() {
        // real variable: walk outward, or bisect a bounded interval
        if upper.is_infinite() {
            let mut cur = current.clone();
            loop {
                cur = cur.add(&InfNumber::one());
                if ok(&cur) {
                    return cur;
                }
            }
        }
        if lower.is_infinite() {
            let mut cur = current.clone();
            loop {
                cur = cur.sub(&InfNumber::one());
                if ok(&cur) {
                    return cur;
                }
            }
        }
        if lower.real == upper.real {
            // only the infinitesimal can move
            for eps in [-1i8, 0, 1] {
                let candidate = InfNumber::new(current.real.clone(), eps);
                if candidate != *current && in_range(&candidate) && ok(&candidate) {
                    return candidate;
                }
            }
            return current.clone();
        }
        let mut mid = lower.real.clone();
        for _ in 0..64 {
            mid = (&mid + &upper.real).div(&Rational::two());
            for eps in [0i8, 1, -1] {
                let candidate = InfNumber::new(mid.clone(), eps);
                if in_range(&candidate) && ok(&candidate) {
                    return candidate;
                }
            }
        }
        current.clone()
    } else {
        // integer-preserving steps by lcm in both directions
        let step = InfNumber::from_rational(lcm.clone());
        let mut up = current.clone();
        let mut down = current.clone();
        loop {
            up = up.add(&step);
            let up_ok = in_range(&up);
            if up_ok && ok(&up) {
                return up;
            }
            down = down.sub(&step);
            let down_ok = in_range(&down);
            if down_ok && ok(&down) {
                return down;
            }
            if !up_ok && !down_ok {
                return current.clone();
            }
        }
    }
}

fn has_sharing(
    shared_points: &BTreeMap<Rational, BTreeSet<ExactInfNumber>>,
    diff: &ExactInfNumber,
) -> bool {
    let mut used: BTreeSet<ExactInfNumber> = BTreeSet::new();
    for (slope, values) in shared_points {
        let shared_diff = diff.mul(slope);
        for value in values {
            if !used.insert(value.add(&shared_diff)) {
                return true;
            }
        }
    }
    false
}

/// Accumulates the Farkas combination of a conflict or unit clause.
#[derive(Debug, Default)]
struct Explainer {
    lits: Vec<Lit>,
    coeffs: Vec<Rational>,
    index: FxHashMap<Lit, usize>,
}

impl Explainer {
    /// Record an asserted bound literal; it appears negated in the
    /// clause with the accumulated Farkas coefficient.
    fn add_asserted(&mut self, lit: Lit, coeff: Rational) {
        let clause_lit = lit.negate();
        match self.index.get(&clause_lit) {
            Some(&i) => self.coeffs[i] = &self.coeffs[i] + &coeff,
            None => {
                self.index.insert(clause_lit, self.lits.len());
                self.lits.push(clause_lit);
                self.coeffs.push(coeff);
            }
        }
    }

    /// Record the propagated literal itself (unit clauses).
    fn add_conclusion(&mut self, lit: Lit, coeff: Rational) {
        debug_assert!(!self.index.contains_key(&lit));
        self.index.insert(lit, self.lits.len());
        self.lits.push(lit);
        self.coeffs.push(coeff);
    }

    fn into_conflict(self) -> TheoryClause {
        TheoryClause {
            lits: SmallVec::from_vec(self.lits),
            annot: LemmaAnnotation::La(self.coeffs),
        }
    }
}

