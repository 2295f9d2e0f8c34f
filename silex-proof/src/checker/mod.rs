//! The independent proof checker.
//!
//! The checker recomputes, for every proof node, the clause or equality
//! it proves, entirely from the node's children and annotations; the
//! producer is never trusted. The walk is non-recursive (an explicit
//! visit/finish stack) and memoizes the proved formula per node id.
//! Failures are reported and counted but never stop the walk, so one
//! broken rule cannot mask later ones; `check` returns `false` if any
//! error was recorded.

mod intern;
mod lemma;
mod rewrite;
mod tautology;

use crate::node::{ProofArena, ProofId, ProofNode};
use rustc_hash::{FxHashMap, FxHashSet};
use silex_core::{Op, TermId, TermKind, TermManager};
use smallvec::SmallVec;
use tracing::error;

/// The checker state for one `check` run.
pub struct ProofChecker<'a> {
    pub(crate) tm: &'a mut TermManager,
    arena: &'a ProofArena,
    assertions: FxHashSet<TermId>,
    cache: FxHashMap<ProofId, TermId>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl<'a> ProofChecker<'a> {
    /// A checker over the given arena, with the set of formulas the
    /// `@asserted` leaves may reference.
    pub fn new(tm: &'a mut TermManager, arena: &'a ProofArena, assertions: &[TermId]) -> Self {
        ProofChecker {
            tm,
            arena,
            assertions: assertions.iter().copied().collect(),
            cache: FxHashMap::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Check a refutation: the root must prove `false` and every node
    /// must verify. Returns `true` iff no error was reported.
    pub fn check(&mut self, root: ProofId) -> bool {
        let proved = self.walk(root);
        if proved != self.tm.mk_false() {
            self.report_error(format!(
                "the proof did not yield a contradiction but {}",
                self.tm.display(proved)
            ));
        }
        self.errors.is_empty()
    }

    /// Compute the formula proved by a node (memoized, non-recursive).
    pub fn walk(&mut self, root: ProofId) -> TermId {
        enum Task {
            Visit(ProofId),
            Finish(ProofId),
        }
        let mut stack = vec![Task::Visit(root)];
        while let Some(task) = stack.pop() {
            match task {
                Task::Visit(id) => {
                    if self.cache.contains_key(&id) {
                        continue;
                    }
                    stack.push(Task::Finish(id));
                    for child in self.children(id) {
                        stack.push(Task::Visit(child));
                    }
                }
                Task::Finish(id) => {
                    if self.cache.contains_key(&id) {
                        continue;
                    }
                    let proved = self.compute(id);
                    self.cache.insert(id, proved);
                }
            }
        }
        self.cache[&root]
    }

    fn children(&self, id: ProofId) -> SmallVec<[ProofId; 4]> {
        match self.arena.get(id) {
            ProofNode::Trans(parts) | ProofNode::Cong(parts) => parts.iter().copied().collect(),
            ProofNode::Eq(a, b) => SmallVec::from_slice(&[*a, *b]),
            ProofNode::Res { main, steps } => {
                let mut v: SmallVec<[ProofId; 4]> = SmallVec::new();
                v.push(*main);
                v.extend(steps.iter().map(|(_, p)| *p));
                v
            }
            ProofNode::Clause { sub, .. } | ProofNode::Split { sub, .. } => {
                SmallVec::from_slice(&[*sub])
            }
            _ => SmallVec::new(),
        }
    }

    fn proved(&self, id: ProofId) -> TermId {
        self.cache[&id]
    }

    fn compute(&mut self, id: ProofId) -> TermId {
        match self.arena.get(id).clone() {
            ProofNode::Asserted(t) => {
                if !self.assertions.contains(&t) {
                    self.report_error(format!(
                        "could not find asserted term {}",
                        self.tm.display(t)
                    ));
                }
                t
            }
            ProofNode::Refl(t) => self.tm.mk_eq(t, t),
            ProofNode::Trans(parts) => self.check_transitivity(&parts),
            ProofNode::Cong(parts) => self.check_congruence(&parts),
            ProofNode::Eq(a, b) => self.check_eq(a, b),
            ProofNode::Res { main, steps } => self.check_resolution(main, &steps),
            ProofNode::Clause { sub, clause } => self.check_clause(sub, clause),
            ProofNode::Split { rule, sub, result } => self.check_split(rule, sub, result),
            ProofNode::Taut { rule, clause } => {
                if !self.check_tautology(rule, clause) {
                    self.report_error(format!(
                        "malformed/unknown tautology {} {}",
                        rule.key(),
                        self.tm.display(clause)
                    ));
                }
                clause
            }
            ProofNode::Rewrite { rule, equality } => {
                self.check_rewrite_node(rule, equality);
                equality
            }
            ProofNode::Intern { equality } => {
                self.check_intern_node(equality);
                equality
            }
            ProofNode::Lemma { kind, clause } => {
                self.check_lemma(&kind, clause);
                clause
            }
        }
    }

    fn check_transitivity(&mut self, parts: &[ProofId]) -> TermId {
        let mut sides: Vec<(TermId, TermId)> = Vec::with_capacity(parts.len());
        for &p in parts {
            let proved = self.proved(p);
            match self.eq_sides(proved) {
                Some(pair) => sides.push(pair),
                None => {
                    self.report_error(format!(
                        "@trans on a proof of a non-equality: {}",
                        self.tm.display(proved)
                    ));
                    return proved;
                }
            }
        }
        for w in sides.windows(2) {
            if w[0].1 != w[1].0 {
                self.report_error("@trans does not chain".to_string());
            }
        }
        let first = sides.first().expect("empty @trans").0;
        let last = sides.last().expect("empty @trans").1;
        self.tm.mk_eq(first, last)
    }

    fn check_congruence(&mut self, parts: &[ProofId]) -> TermId {
        let head = self.proved(parts[0]);
        let Some((lhs, func_term)) = self.eq_sides(head) else {
            self.report_error("@cong head is not an equality".to_string());
            return head;
        };
        let TermKind::App(op, args) = self.tm.kind(func_term).clone() else {
            self.report_error("@cong right side is not an application".to_string());
            return head;
        };
        let mut new_args: Vec<TermId> = args.to_vec();
        let mut offset = 0usize;
        for &p in &parts[1..] {
            let proved = self.proved(p);
            let Some((from, to)) = self.eq_sides(proved) else {
                self.report_error("@cong on a proof of a non-equality".to_string());
                continue;
            };
            while offset < new_args.len() && args[offset] != from {
                offset += 1;
            }
            if offset == new_args.len() {
                self.report_error(format!(
                    "cannot find rewritten parameter in @cong: {}",
                    self.tm.display(proved)
                ));
                break;
            }
            new_args[offset] = to;
            offset += 1;
        }
        let new_func = self.tm.mk_app(op, &new_args);
        self.tm.mk_eq(lhs, new_func)
    }

    fn check_eq(&mut self, a: ProofId, b: ProofId) -> TermId {
        let orig = self.proved(a);
        let rewrite = self.proved(b);
        if let Some((lhs, rhs)) = self.eq_sides(rewrite) {
            if lhs != orig {
                self.report_error(format!(
                    "malformed @eq application: {} and {}",
                    self.tm.display(orig),
                    self.tm.display(rewrite)
                ));
            }
            rhs
        } else {
            self.report_error("second @eq argument is not an equality".to_string());
            orig
        }
    }

    fn check_resolution(&mut self, main: ProofId, steps: &[(TermId, ProofId)]) -> TermId {
        let main_clause = self.proved(main);
        let mut disjuncts: Vec<TermId> = self.tm.term_to_clause(main_clause).to_vec();
        for &(pivot, side) in steps {
            let neg_pivot = self.tm.negate(pivot);
            match disjuncts.iter().position(|&d| d == neg_pivot) {
                Some(pos) => {
                    disjuncts.remove(pos);
                }
                None => {
                    self.report_warning("could not find negated pivot in main clause".to_string());
                }
            }
            let side_clause = self.proved(side);
            let side_lits = self.tm.term_to_clause(side_clause);
            let mut pivot_found = false;
            for &l in side_lits.iter() {
                if l == pivot {
                    pivot_found = true;
                } else if !disjuncts.contains(&l) {
                    disjuncts.push(l);
                }
            }
            if !pivot_found {
                self.report_warning("could not find pivot in secondary clause".to_string());
            }
        }
        self.tm.clause_to_term(&disjuncts)
    }

    fn check_clause(&mut self, sub: ProofId, expected: TermId) -> TermId {
        let proved = self.proved(sub);
        let proved_lits = self.tm.term_to_clause(proved);
        let expected_lits = self.tm.term_to_clause(expected);
        if proved_lits.len() != expected_lits.len() {
            self.report_error("@clause has a different number of literals".to_string());
        }
        let a: FxHashSet<TermId> = proved_lits.iter().copied().collect();
        let b: FxHashSet<TermId> = expected_lits.iter().copied().collect();
        if a != b || a.len() != proved_lits.len() {
            self.report_error("the @clause operation did not permute correctly".to_string());
        }
        expected
    }

    fn check_split(
        &mut self,
        rule: crate::rules::SplitRule,
        sub: ProofId,
        result: TermId,
    ) -> TermId {
        use crate::rules::SplitRule;
        let orig = self.proved(sub);
        let ok = match rule {
            SplitRule::NotOr => self.check_split_not_or(orig, result),
            SplitRule::EqPos1 | SplitRule::EqPos2 | SplitRule::EqNeg1 | SplitRule::EqNeg2 => {
                self.check_split_eq(rule, orig, result)
            }
            SplitRule::ItePos1 | SplitRule::ItePos2 | SplitRule::IteNeg1 | SplitRule::IteNeg2 => {
                self.check_split_ite(rule, orig, result)
            }
        };
        if !ok {
            self.report_error(format!(
                "malformed/unknown split rule {} for {}",
                rule.key(),
                self.tm.display(result)
            ));
        }
        result
    }

    fn check_split_not_or(&mut self, orig: TermId, result: TermId) -> bool {
        let or_term = self.tm.negate(orig);
        let Some(lits) = self.tm.app_args(or_term, &Op::Or) else {
            return false;
        };
        let lits: Vec<TermId> = lits.to_vec();
        if !self.tm.is_app(result, &Op::Not) {
            return false;
        }
        let disjunct = self.tm.negate(result);
        lits.contains(&disjunct)
    }

    fn check_split_eq(
        &mut self,
        rule: crate::rules::SplitRule,
        orig: TermId,
        result: TermId,
    ) -> bool {
        use crate::rules::SplitRule;
        let positive = !self.tm.is_app(orig, &Op::Not);
        let inner = if positive { orig } else { self.tm.negate(orig) };
        let Some(eq_params) = self.tm.app_args(inner, &Op::Eq) else {
            return false;
        };
        let (t1, t2) = match eq_params {
            [a, b] => (*a, *b),
            _ => return false,
        };
        let Some(clause) = self.tm.app_args(result, &Op::Or) else {
            return false;
        };
        let clause = match clause {
            [a, b] => [*a, *b],
            _ => return false,
        };
        let not_t1 = self.tm.mk_not(t1);
        let not_t2 = self.tm.mk_not(t2);
        match rule {
            SplitRule::EqPos1 => positive && clause == [t1, not_t2],
            SplitRule::EqPos2 => positive && clause == [not_t1, t2],
            SplitRule::EqNeg1 => !positive && clause == [t1, t2],
            SplitRule::EqNeg2 => !positive && clause == [not_t1, not_t2],
            _ => false,
        }
    }

    fn check_split_ite(
        &mut self,
        rule: crate::rules::SplitRule,
        orig: TermId,
        result: TermId,
    ) -> bool {
        use crate::rules::SplitRule;
        let positive = !self.tm.is_app(orig, &Op::Not);
        let inner = if positive { orig } else { self.tm.negate(orig) };
        let Some(ite_params) = self.tm.app_args(inner, &Op::Ite) else {
            return false;
        };
        let (cond, then, els) = (ite_params[0], ite_params[1], ite_params[2]);
        let Some(clause) = self.tm.app_args(result, &Op::Or) else {
            return false;
        };
        let clause = match clause {
            [a, b] => [*a, *b],
            _ => return false,
        };
        let not_cond = self.tm.mk_not(cond);
        let not_then = self.tm.mk_not(then);
        let not_els = self.tm.mk_not(els);
        match rule {
            SplitRule::ItePos1 => positive && clause == [not_cond, then],
            SplitRule::ItePos2 => positive && clause == [cond, els],
            SplitRule::IteNeg1 => !positive && clause == [not_cond, not_then],
            SplitRule::IteNeg2 => !positive && clause == [cond, not_els],
            _ => false,
        }
    }

    // --- shared helpers ---

    /// The sides of a binary equality term.
    pub(crate) fn eq_sides(&self, t: TermId) -> Option<(TermId, TermId)> {
        match self.tm.app_args(t, &Op::Eq) {
            Some([a, b]) => Some((*a, *b)),
            _ => None,
        }
    }

    /// Strip a quote wrapper, reporting when it is absent.
    pub(crate) fn unquote(&mut self, t: TermId) -> TermId {
        match self.tm.unquote(t) {
            Some(inner) => inner,
            None => {
                self.report_error(format!(
                    "expected quoted literal, but got {}",
                    self.tm.display(t)
                ));
                t
            }
        }
    }

    /// Strip a quote wrapper if present.
    pub(crate) fn unquote_opt(&self, t: TermId) -> TermId {
        self.tm.unquote(t).unwrap_or(t)
    }

    pub(crate) fn report_error(&mut self, msg: String) {
        error!(target: "proof-check", "{}", msg);
        self.errors.push(msg);
    }

    pub(crate) fn report_warning(&mut self, msg: String) {
        self.warnings.push(msg);
    }

    /// The recorded error messages.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// The recorded warnings.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
