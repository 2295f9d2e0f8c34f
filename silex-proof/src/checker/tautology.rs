//! Tautology schema verification.

use super::ProofChecker;
use crate::rules::TautRule;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use silex_core::{Op, SmtAffineTerm, TermId};

impl ProofChecker<'_> {
    pub(crate) fn check_tautology(&mut self, rule: TautRule, clause_term: TermId) -> bool {
        let clause: Vec<TermId> = self.tm.term_to_clause(clause_term).to_vec();
        match rule {
            TautRule::TrueNotFalse => {
                if clause.len() != 1 {
                    return false;
                }
                let t = self.tm.mk_true();
                let f = self.tm.mk_false();
                let eq = self.tm.mk_eq(t, f);
                clause[0] == self.tm.mk_not(eq)
            }
            TautRule::OrPos => self.check_taut_or_pos(&clause),
            TautRule::OrNeg => self.check_taut_or_neg(&clause),
            TautRule::ItePos1
            | TautRule::ItePos2
            | TautRule::ItePosRed
            | TautRule::IteNeg1
            | TautRule::IteNeg2
            | TautRule::IteNegRed => self.check_taut_ite(rule, &clause),
            TautRule::EqPos1 | TautRule::EqPos2 | TautRule::EqNeg1 | TautRule::EqNeg2 => {
                self.check_taut_eq(rule, &clause)
            }
            TautRule::TermIte => self.check_taut_term_ite(&clause),
            TautRule::ExcludedMiddle1 | TautRule::ExcludedMiddle2 => {
                self.check_taut_excluded_middle(&clause)
            }
            TautRule::DivHigh | TautRule::DivLow | TautRule::ToIntHigh | TautRule::ToIntLow => {
                self.check_taut_low_high(rule, &clause)
            }
            TautRule::Store => self.check_taut_store(&clause),
            TautRule::Diff => self.check_taut_diff(&clause),
        }
    }

    /// `(or (not (! (or p1 ... pn) :quoted)) p1 ... pn)`
    fn check_taut_or_pos(&mut self, clause: &[TermId]) -> bool {
        if clause.is_empty() {
            return false;
        }
        let neg = self.tm.negate(clause[0]);
        let lit = self.unquote(neg);
        let Some(params) = self.tm.app_args(lit, &Op::Or) else {
            return false;
        };
        if params.len() != clause.len() - 1 {
            return false;
        }
        params.iter().zip(&clause[1..]).all(|(&p, &c)| p == c)
    }

    /// `(or (! (or p1 ... pn) :quoted) (not pi))`
    fn check_taut_or_neg(&mut self, clause: &[TermId]) -> bool {
        if clause.len() != 2 {
            return false;
        }
        let lit = self.unquote(clause[0]);
        let Some(params) = self.tm.app_args(lit, &Op::Or) else {
            return false;
        };
        let params: Vec<TermId> = params.to_vec();
        if !self.tm.is_app(clause[1], &Op::Not) {
            return false;
        }
        let other = self.tm.negate(clause[1]);
        params.contains(&other)
    }

    fn check_taut_ite(&mut self, rule: TautRule, clause: &[TermId]) -> bool {
        if clause.len() != 3 {
            return false;
        }
        let negated = self.tm.is_app(clause[0], &Op::Not);
        let lit = if negated {
            self.tm.negate(clause[0])
        } else {
            clause[0]
        };
        let lit = self.unquote(lit);
        let Some(params) = self.tm.app_args(lit, &Op::Ite) else {
            return false;
        };
        let (cond, then, els) = (params[0], params[1], params[2]);
        let not_cond = self.tm.mk_not(cond);
        let not_then = self.tm.mk_not(then);
        let not_els = self.tm.mk_not(els);
        match rule {
            // (or (not (! (ite c t e) :quoted)) (not c) t)
            TautRule::ItePos1 => negated && clause[1] == not_cond && clause[2] == then,
            TautRule::ItePos2 => negated && clause[1] == cond && clause[2] == els,
            TautRule::ItePosRed => negated && clause[1] == then && clause[2] == els,
            TautRule::IteNeg1 => !negated && clause[1] == not_cond && clause[2] == not_then,
            TautRule::IteNeg2 => !negated && clause[1] == cond && clause[2] == not_els,
            TautRule::IteNegRed => !negated && clause[1] == not_then && clause[2] == not_els,
            _ => false,
        }
    }

    fn check_taut_eq(&mut self, rule: TautRule, clause: &[TermId]) -> bool {
        if clause.len() != 3 {
            return false;
        }
        let negated = self.tm.is_app(clause[0], &Op::Not);
        let lit = if negated {
            self.tm.negate(clause[0])
        } else {
            clause[0]
        };
        let lit = self.unquote(lit);
        let Some((t1, t2)) = self.eq_sides(lit) else {
            return false;
        };
        let not_t1 = self.tm.mk_not(t1);
        let not_t2 = self.tm.mk_not(t2);
        match rule {
            TautRule::EqPos1 => negated && clause[1] == t1 && clause[2] == not_t2,
            TautRule::EqPos2 => negated && clause[1] == not_t1 && clause[2] == t2,
            TautRule::EqNeg1 => !negated && clause[1] == t1 && clause[2] == t2,
            TautRule::EqNeg2 => !negated && clause[1] == not_t1 && clause[2] == not_t2,
            _ => false,
        }
    }

    /// `(or (not c1) c2 ... (= (ite c1 (ite c2 ...) ...) x))`
    fn check_taut_term_ite(&mut self, clause: &[TermId]) -> bool {
        if clause.len() < 2 {
            return false;
        }
        let ite_eq = clause[clause.len() - 1];
        let Some((mut term, expected)) = self.eq_sides(ite_eq) else {
            return false;
        };
        for &cond_lit in &clause[..clause.len() - 1] {
            let Some(params) = self.tm.app_args(term, &Op::Ite) else {
                return false;
            };
            let (cond, then, els) = (params[0], params[1], params[2]);
            let not_cond = self.tm.mk_not(cond);
            if cond_lit == not_cond {
                term = then;
            } else if cond_lit == cond {
                term = els;
            } else {
                return false;
            }
        }
        term == expected
    }

    /// `(or (not p) (= p true))` or `(or p (= p false))`
    fn check_taut_excluded_middle(&mut self, clause: &[TermId]) -> bool {
        if clause.len() != 2 {
            return false;
        }
        let negated = self.tm.is_app(clause[0], &Op::Not);
        let lit = if negated {
            self.tm.negate(clause[0])
        } else {
            clause[0]
        };
        let Some((lhs, rhs)) = self.eq_sides(clause[1]) else {
            return false;
        };
        let expected_rhs = if negated {
            self.tm.mk_true()
        } else {
            self.tm.mk_false()
        };
        lhs == lit && rhs == expected_rhs
    }

    /// The div/to_int bounding axioms:
    /// low:  `(<= (+ (- arg) (* d cand)) 0)`
    /// high: `(not (<= (+ (- arg) (* d cand) |d|) 0))`
    fn check_taut_low_high(&mut self, rule: TautRule, clause: &[TermId]) -> bool {
        if clause.len() != 1 {
            return false;
        }
        let is_to_int = matches!(rule, TautRule::ToIntHigh | TautRule::ToIntLow);
        let is_high = matches!(rule, TautRule::DivHigh | TautRule::ToIntHigh);
        let mut literal = clause[0];
        if is_high {
            if !self.tm.is_app(literal, &Op::Not) {
                return false;
            }
            literal = self.tm.negate(literal);
        }
        let literal = self.unquote_opt(literal);
        let Some(le_args) = self.tm.app_args(literal, &Op::Le) else {
            return false;
        };
        let (lhs_term, rhs_term) = (le_args[0], le_args[1]);
        if !self.tm.is_zero(rhs_term) {
            return false;
        }
        let lhs = SmtAffineTerm::from_term(self.tm, lhs_term);
        let candidate_op = if is_to_int { Op::ToInt } else { Op::IntDiv };
        // scan the summands for the candidate application
        let summands: Vec<TermId> = lhs.summands().map(|(t, _)| t).collect();
        for candidate in summands {
            let Some(args) = self.tm.app_args(candidate, &candidate_op) else {
                continue;
            };
            let (arg0_term, divisor) = if is_to_int {
                (args[0], BigRational::one())
            } else {
                let arg1 = SmtAffineTerm::from_term(self.tm, args[1]);
                if !arg1.is_constant() || arg1.constant_part().is_zero() {
                    continue;
                }
                (args[0], arg1.constant_part().clone())
            };
            let arg0 = SmtAffineTerm::from_term(self.tm, arg0_term);
            let summand =
                SmtAffineTerm::from_summand(divisor.clone(), candidate, lhs.sort());
            let mut expected = arg0.negate().add(&summand);
            if is_high {
                let abs = if divisor.is_negative() {
                    -divisor.clone()
                } else {
                    divisor.clone()
                };
                expected = expected.add_constant(&abs);
            }
            if lhs == expected {
                return true;
            }
        }
        false
    }

    /// `(= (select (store a i v) i) v)`
    fn check_taut_store(&mut self, clause: &[TermId]) -> bool {
        if clause.len() != 1 {
            return false;
        }
        let lit = self.unquote_opt(clause[0]);
        let Some((sel, v)) = self.eq_sides(lit) else {
            return false;
        };
        let Some(sel_args) = self.tm.app_args(sel, &Op::Select) else {
            return false;
        };
        let (store, sel_idx) = (sel_args[0], sel_args[1]);
        let Some(store_args) = self.tm.app_args(store, &Op::Store) else {
            return false;
        };
        store_args[1] == sel_idx && store_args[2] == v
    }

    /// `(or (= a b) (not (= (select a (@diff a b)) (select b (@diff a b)))))`
    fn check_taut_diff(&mut self, clause: &[TermId]) -> bool {
        if clause.len() != 2 {
            return false;
        }
        let arr_eq = self.unquote_opt(clause[0]);
        if !self.tm.is_app(clause[1], &Op::Not) {
            return false;
        }
        let select_eq = self.tm.negate(clause[1]);
        let select_eq = self.unquote_opt(select_eq);
        let (Some((a, b)), Some((sel_a, sel_b))) =
            (self.eq_sides(arr_eq), self.eq_sides(select_eq))
        else {
            return false;
        };
        let arrays = [a, b];
        let selects = [sel_a, sel_b];
        for i in 0..2 {
            let Some(sel_args) = self.tm.app_args(selects[i], &Op::Select) else {
                return false;
            };
            if sel_args[0] != arrays[i] {
                return false;
            }
            let Some(diff_args) = self.tm.app_args(sel_args[1], &Op::Diff) else {
                return false;
            };
            if diff_args[0] != arrays[0] || diff_args[1] != arrays[1] {
                return false;
            }
        }
        true
    }
}
