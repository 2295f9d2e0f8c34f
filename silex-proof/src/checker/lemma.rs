//! Theory lemma verification.

use super::ProofChecker;
use crate::node::{LemmaKind, LemmaPath};
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use rustc_hash::{FxHashMap, FxHashSet};
use silex_core::{Op, SmtAffineTerm, TermId};
use silex_math::Rational;

type TermPair = (TermId, TermId);

fn pair(a: TermId, b: TermId) -> TermPair {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl ProofChecker<'_> {
    pub(crate) fn check_lemma(&mut self, kind: &LemmaKind, clause: TermId) {
        let lits: Vec<TermId> = self.tm.term_to_clause(clause).to_vec();
        match kind {
            LemmaKind::La(coeffs) => self.check_la_lemma(&lits, coeffs),
            LemmaKind::Trichotomy => self.check_trichotomy(&lits),
            LemmaKind::Eq => self.check_eq_lemma(&lits),
            LemmaKind::Cc { goal, paths } => {
                self.check_array_lemma(true, *goal, paths, &lits);
            }
            LemmaKind::ReadOverWeakeq { goal, paths } => {
                self.check_array_lemma(false, Some(*goal), paths, &lits);
            }
            LemmaKind::WeakeqExt { goal, paths } => {
                self.check_array_lemma(false, Some(*goal), paths, &lits);
            }
        }
    }

    fn affine_of(&self, t: TermId) -> SmtAffineTerm {
        SmtAffineTerm::from_term(self.tm, t)
    }

    /// Verify the Farkas combination of an `:LA` lemma: the weighted sum
    /// of the negated literals must be a constant `> 0`, or `>= 0` with
    /// at least one strict contribution.
    fn check_la_lemma(&mut self, clause: &[TermId], coeffs: &[Rational]) {
        if clause.len() != coeffs.len() {
            self.report_error("clause and coefficients have different length".to_string());
            return;
        }
        let mut sum_has_strict = false;
        let mut sum: Option<SmtAffineTerm> = None;
        for (lit, coeff) in clause.iter().zip(coeffs) {
            let Some(coeff) = coeff.as_finite().cloned() else {
                self.report_error("infinite coefficient in LA lemma".to_string());
                continue;
            };
            if coeff.is_zero() {
                self.report_warning("coefficient in LA lemma is zero".to_string());
                continue;
            }
            let mut literal = *lit;
            let is_negated = self.tm.is_app(literal, &Op::Not);
            if is_negated {
                literal = self.tm.negate(literal);
            }
            let literal = self.unquote(literal);
            let is_strict;
            if is_negated {
                if self.tm.is_app(literal, &Op::Le) {
                    is_strict = false;
                    if coeff.is_negative() {
                        self.report_error("negative coefficient for <=".to_string());
                    }
                } else if self.tm.is_app(literal, &Op::Eq) {
                    is_strict = false;
                } else if self.tm.is_app(literal, &Op::Lt) {
                    is_strict = true;
                    if coeff.is_negative() {
                        self.report_error("negative coefficient for <".to_string());
                    }
                } else {
                    self.report_error(format!(
                        "unknown atom in LA lemma: {}",
                        self.tm.display(literal)
                    ));
                    continue;
                }
            } else if self.tm.is_app(literal, &Op::Le) {
                is_strict = true;
                if !coeff.is_negative() {
                    self.report_error("positive coefficient for negated <=".to_string());
                }
            } else if self.tm.is_app(literal, &Op::Lt) {
                is_strict = false;
                if !coeff.is_negative() {
                    self.report_error("positive coefficient for negated <".to_string());
                }
            } else {
                self.report_error(format!(
                    "unknown atom in LA lemma: {}",
                    self.tm.display(literal)
                ));
                continue;
            }
            let params = match self.tm.kind(literal) {
                silex_core::TermKind::App(_, args) if args.len() == 2 => (args[0], args[1]),
                _ => {
                    self.report_error("not a binary comparison in LA lemma".to_string());
                    continue;
                }
            };
            if !self.tm.is_zero(params.1) {
                self.report_error("right hand side is not zero".to_string());
            }
            let mut affine = self.affine_of(params.0);
            let mut strict_here = is_strict;
            if is_strict && self.tm.sort(params.0) == self.tm.sorts.int_sort {
                // x < 0 iff x + 1 <= 0 over the integers
                let adjust = if is_negated {
                    BigRational::one()
                } else {
                    -BigRational::one()
                };
                affine = affine.add_constant(&adjust);
                strict_here = false;
            }
            let affine = affine.mul(&coeff);
            sum = Some(match sum {
                None => affine,
                Some(acc) => acc.add(&affine),
            });
            sum_has_strict |= strict_here;
        }
        let Some(sum) = sum else {
            self.report_error("empty LA lemma".to_string());
            return;
        };
        if sum.is_constant() {
            let signum = if sum.constant_part().is_positive() {
                1
            } else if sum.constant_part().is_zero() {
                0
            } else {
                -1
            };
            if signum > 0 || (sum_has_strict && signum == 0) {
                return;
            }
        }
        self.report_error("LA lemma does not sum to a contradiction".to_string());
    }

    /// `(= t 0)`, `(< t 0)` and `(< 0 t)` over one affine term.
    fn check_trichotomy(&mut self, clause: &[TermId]) {
        const NEQ: u8 = 1;
        const LEQ: u8 = 2;
        const GEQ: u8 = 4;
        if clause.len() != 3 {
            self.report_error("malformed trichotomy clause".to_string());
            return;
        }
        let mut found: u8 = 0;
        let mut trichotomy_term: Option<SmtAffineTerm> = None;
        for lit in clause {
            let mut lit = *lit;
            let is_negated = self.tm.is_app(lit, &Op::Not);
            if is_negated {
                lit = self.tm.negate(lit);
            }
            let lit = self.unquote(lit);
            let mut offset = BigRational::zero();
            if self.tm.is_app(lit, &Op::Eq) {
                if is_negated {
                    self.report_error("equality in trichotomy has wrong polarity".to_string());
                    return;
                }
                if found & NEQ != 0 {
                    self.report_error("two disequalities in trichotomy".to_string());
                    return;
                }
                found |= NEQ;
            } else if self.tm.is_app(lit, &Op::Le) {
                if is_negated {
                    if found & GEQ != 0 {
                        self.report_error("two > in trichotomy".to_string());
                        return;
                    }
                    found |= GEQ;
                } else {
                    if found & LEQ != 0 {
                        self.report_error("two <= in trichotomy".to_string());
                        return;
                    }
                    found |= LEQ;
                    offset = -BigRational::one(); // x <= 0 iff x - 1 < 0
                }
            } else if self.tm.is_app(lit, &Op::Lt) {
                if is_negated {
                    if found & GEQ != 0 {
                        self.report_error("two >= in trichotomy".to_string());
                        return;
                    }
                    found |= GEQ;
                    offset = BigRational::one(); // x >= 0 iff x + 1 > 0
                } else {
                    if found & LEQ != 0 {
                        self.report_error("two < in trichotomy".to_string());
                        return;
                    }
                    found |= LEQ;
                }
            } else {
                self.report_error("unknown literal in trichotomy".to_string());
                return;
            }
            let (lhs, rhs) = match self.tm.kind(lit) {
                silex_core::TermKind::App(_, args) if args.len() == 2 => (args[0], args[1]),
                _ => {
                    self.report_error("not a binary comparison in trichotomy".to_string());
                    return;
                }
            };
            if !self.tm.is_zero(rhs) {
                self.report_error("right hand side is not zero".to_string());
            }
            if !offset.is_zero() && self.tm.sort(lhs) != self.tm.sorts.int_sort {
                self.report_error("<= or >= in non-integer trichotomy".to_string());
            }
            let affine = self.affine_of(lhs).add_constant(&offset);
            match &trichotomy_term {
                None => trichotomy_term = Some(affine),
                Some(t) => {
                    if t != &affine {
                        self.report_error("invalid trichotomy".to_string());
                    }
                }
            }
        }
        if found != NEQ | LEQ | GEQ {
            self.report_error("trichotomy misses a case".to_string());
        }
    }

    /// One equality and one disequality over affine forms that coincide
    /// up to sign and gcd normalization.
    fn check_eq_lemma(&mut self, clause: &[TermId]) {
        if clause.len() != 2 {
            self.report_error("lemma :EQ must have two literals".to_string());
            return;
        }
        let (mut lit1, mut lit2) = (clause[0], clause[1]);
        if self.tm.is_app(lit1, &Op::Not) {
            lit1 = self.tm.negate(lit1);
        } else if self.tm.is_app(lit2, &Op::Not) {
            lit2 = self.tm.negate(lit2);
        } else {
            self.report_error("lemma :EQ must have one negated literal".to_string());
            return;
        }
        let lit1 = self.unquote(lit1);
        let lit2 = self.unquote(lit2);
        let (Some((l1, r1)), Some((l2, r2))) = (self.eq_sides(lit1), self.eq_sides(lit2)) else {
            self.report_error("lemma :EQ must have one equality and one disequality".to_string());
            return;
        };
        // each literal contributes its own sides
        let diff1 = self.affine_of(l1).add(&self.affine_of(r1).negate());
        let diff2 = self.affine_of(l2).add(&self.affine_of(r2).negate());
        if !diff1.matches_up_to_sign(&diff2) {
            self.report_error("error in lemma :EQ".to_string());
        }
    }

    /// Congruence and array lemmas: every clause literal feeds the path
    /// check, every path step must be covered.
    fn check_array_lemma(
        &mut self,
        is_cc: bool,
        goal: Option<TermId>,
        paths: &[LemmaPath],
        clause: &[TermId],
    ) {
        let mut strong_paths: FxHashSet<TermPair> = FxHashSet::default();
        let mut index_diseqs: FxHashSet<TermPair> = FxHashSet::default();
        let mut found_diseq = false;
        for lit in clause {
            if self.tm.is_app(*lit, &Op::Not) {
                let atom = self.tm.negate(*lit);
                let atom = self.unquote(atom);
                let Some((a, b)) = self.eq_sides(atom) else {
                    self.report_error("unknown literal in CC lemma".to_string());
                    return;
                };
                strong_paths.insert(pair(a, b));
            } else {
                let atom = self.unquote_opt(*lit);
                let Some((a, b)) = self.eq_sides(atom) else {
                    self.report_error("unknown literal in CC lemma".to_string());
                    return;
                };
                if Some(atom) != goal {
                    if is_cc {
                        self.report_error("unexpected positive literal in CC lemma".to_string());
                    }
                    index_diseqs.insert(pair(a, b));
                }
                found_diseq = true;
            }
        }

        // check in reverse so dependency paths land in the premise sets
        // before the paths that use them
        let mut weak_paths: FxHashMap<TermPair, FxHashSet<TermId>> = FxHashMap::default();
        let mut last_path: Option<TermPair> = None;
        for path in paths.iter().rev() {
            if path.terms.len() < 2 {
                self.report_error("short path in array lemma".to_string());
                return;
            }
            let ends = pair(
                path.terms[0],
                *path.terms.last().expect("non-empty path"),
            );
            match path.weak_index {
                Some(idx) => {
                    self.check_array_path(
                        Some(idx),
                        &path.terms,
                        &strong_paths,
                        None,
                        &index_diseqs,
                    );
                    weak_paths.entry(ends).or_default().insert(idx);
                }
                None => {
                    let weak_here = weak_paths.get(&ends).cloned();
                    self.check_array_path(
                        None,
                        &path.terms,
                        &strong_paths,
                        weak_here.as_ref(),
                        &index_diseqs,
                    );
                    strong_paths.insert(ends);
                    last_path = Some(ends);
                }
            }
        }

        match goal {
            None => {
                // a conflict without a disequality: the main path must
                // connect two constantly distinct terms
                let Some((a, b)) = last_path else {
                    self.report_error("no main path in CC lemma".to_string());
                    return;
                };
                let diff = self.affine_of(a).add(&self.affine_of(b).negate());
                if !diff.is_constant() || diff.constant_part().is_zero() {
                    self.report_error("no diseq, but main path is not a constant clash".to_string());
                }
            }
            Some(goal) => {
                if !found_diseq {
                    self.report_error("did not find goal equality in CC lemma".to_string());
                }
                let Some((a, b)) = self.eq_sides(goal) else {
                    self.report_error("goal equality is not an equality in CC lemma".to_string());
                    return;
                };
                if strong_paths.contains(&pair(a, b)) {
                    return;
                }
                // select terms over weakly connected arrays with the
                // weak index also close the goal
                if let (Some(sel_a), Some(sel_b)) = (
                    self.tm.app_args(a, &Op::Select).map(|s| (s[0], s[1])),
                    self.tm.app_args(b, &Op::Select).map(|s| (s[0], s[1])),
                ) {
                    let indices_match = sel_a.1 == sel_b.1
                        || strong_paths.contains(&pair(sel_a.1, sel_b.1));
                    if indices_match {
                        if let Some(weak) = weak_paths.get(&pair(sel_a.0, sel_b.0)) {
                            if weak.contains(&sel_a.1) || weak.contains(&sel_b.1) {
                                return;
                            }
                        }
                    }
                }
                self.report_error(format!(
                    "cannot explain main equality {}",
                    self.tm.display(goal)
                ));
            }
        }
    }

    /// Check one step chain. Each adjacent pair must be a strong path, a
    /// select edge at the weak index, a store step skipping a disequal
    /// index, or a congruence whose argument pairs are covered.
    fn check_array_path(
        &mut self,
        weak_idx: Option<TermId>,
        path: &[TermId],
        strong_paths: &FxHashSet<TermPair>,
        weak_paths: Option<&FxHashSet<TermId>>,
        index_diseqs: &FxHashSet<TermPair>,
    ) {
        for w in path.windows(2) {
            let (x, y) = (w[0], w[1]);
            if strong_paths.contains(&pair(x, y)) {
                continue;
            }
            if let Some(idx) = weak_idx {
                if self.check_select_edge(x, y, idx, strong_paths) {
                    continue;
                }
            }
            if let Some(store_index) = self.store_index(x, y) {
                match weak_idx {
                    Some(idx) => {
                        if index_diseqs.contains(&pair(idx, store_index)) {
                            continue;
                        }
                        let diff = self
                            .affine_of(idx)
                            .add(&self.affine_of(store_index).negate());
                        if diff.is_constant() && !diff.constant_part().is_zero() {
                            continue;
                        }
                    }
                    None => {
                        // a store step on the main path needs a weak path
                        // for its index; a missing one falls through to
                        // the unexplained-equality report below
                        if let Some(weak) = weak_paths {
                            if weak.contains(&store_index) {
                                continue;
                            }
                        }
                    }
                }
            }
            if self.check_congruence_edge(x, y, strong_paths) {
                continue;
            }
            self.report_error(format!(
                "unexplained equality {} == {}",
                self.tm.display(x),
                self.tm.display(y)
            ));
        }
    }

    /// A select edge: some strong path connects `(select x i1)` and
    /// `(select y i2)` with both indices (weakly) equal to `idx`.
    fn check_select_edge(
        &self,
        x: TermId,
        y: TermId,
        idx: TermId,
        strong_paths: &FxHashSet<TermPair>,
    ) -> bool {
        for &(p, q) in strong_paths {
            let (Some(sp), Some(sq)) = (
                self.tm.app_args(p, &Op::Select).map(|s| (s[0], s[1])),
                self.tm.app_args(q, &Op::Select).map(|s| (s[0], s[1])),
            ) else {
                continue;
            };
            if pair(sp.0, sq.0) != pair(x, y) {
                continue;
            }
            let p_ok = sp.1 == idx || strong_paths.contains(&pair(sp.1, idx));
            let q_ok = sq.1 == idx || strong_paths.contains(&pair(sq.1, idx));
            if p_ok && q_ok {
                return true;
            }
        }
        false
    }

    fn store_index(&self, x: TermId, y: TermId) -> Option<TermId> {
        if let Some(args) = self.tm.app_args(x, &Op::Store) {
            if args[0] == y {
                return Some(args[1]);
            }
        }
        if let Some(args) = self.tm.app_args(y, &Op::Store) {
            if args[0] == x {
                return Some(args[1]);
            }
        }
        None
    }

    fn check_congruence_edge(
        &mut self,
        x: TermId,
        y: TermId,
        strong_paths: &FxHashSet<TermPair>,
    ) -> bool {
        let (xk, yk) = (self.tm.kind(x).clone(), self.tm.kind(y).clone());
        let (silex_core::TermKind::App(op_x, args_x), silex_core::TermKind::App(op_y, args_y)) =
            (xk, yk)
        else {
            return false;
        };
        if op_x != op_y || args_x.len() != args_y.len() {
            return false;
        }
        for (&u, &v) in args_x.iter().zip(args_y.iter()) {
            if u == v {
                continue;
            }
            if !strong_paths.contains(&pair(u, v)) {
                self.report_error("unexplained congruence argument".to_string());
            }
        }
        true
    }
}
