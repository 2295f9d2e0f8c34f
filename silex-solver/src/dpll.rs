//! The CDCL engine with theory hooks.
//!
//! Two-watched-literal propagation, first-UIP conflict analysis with
//! resolution-proof recording, theory propagation through the
//! combination front, decision suggestions, and a final-check loop that
//! keeps searching while the theories produce new clauses, literals or
//! suggestions. Every clause carries the proof of its derivation, so
//! the empty clause's proof is the refutation handed to `get-proof`.

use crate::theory::TheoryFront;
use silex_core::{Cancel, Lit, Result, SilexError, TermManager, Var};
use silex_proof::{ProofId, ProofTracker};
use smallvec::SmallVec;
use tracing::debug;

/// Search outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResult {
    /// Satisfiable; the assignment is complete and theory-consistent.
    Sat,
    /// Unsatisfiable; the empty-clause proof is recorded.
    Unsat,
    /// Gave up (budget).
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reason {
    Decision,
    Clause(u32),
    Theory,
}

struct ClauseData {
    lits: SmallVec<[Lit; 4]>,
    proof: ProofId,
}

struct Scope {
    num_clauses: usize,
}

/// The engine.
pub struct DpllEngine {
    clauses: Vec<ClauseData>,
    watches: Vec<Vec<u32>>,
    /// Unit clauses; re-fired after every backtrack since they carry no
    /// watches.
    units: Vec<u32>,
    assign: Vec<i8>,
    level: Vec<u32>,
    reason: Vec<Reason>,
    trail: Vec<Lit>,
    lim: Vec<usize>,
    qhead: usize,
    scopes: Vec<Scope>,
    unsat_proof: Option<ProofId>,
    /// Conflicts seen in the current check (budget).
    pub conflicts: u64,
    /// Conflict budget per check before giving up.
    pub conflict_budget: u64,
}

impl DpllEngine {
    /// A fresh engine.
    pub fn new() -> Self {
        DpllEngine {
            clauses: Vec::new(),
            watches: Vec::new(),
            units: Vec::new(),
            assign: Vec::new(),
            level: Vec::new(),
            reason: Vec::new(),
            trail: Vec::new(),
            lim: Vec::new(),
            qhead: 0,
            scopes: Vec::new(),
            unsat_proof: None,
            conflicts: 0,
            conflict_budget: 200_000,
        }
    }

    /// The proof of the empty clause after an unsat answer.
    pub fn unsat_proof(&self) -> Option<ProofId> {
        self.unsat_proof
    }

    fn ensure_var(&mut self, v: Var) {
        let needed = v as usize + 1;
        if self.assign.len() < needed {
            self.assign.resize(needed, 0);
            self.level.resize(needed, 0);
            self.reason.resize(needed, Reason::Decision);
            self.watches.resize(needed * 2, Vec::new());
        }
    }

    fn value(&self, lit: Lit) -> i8 {
        let v = self.assign[lit.var() as usize];
        if lit.is_positive() {
            v
        } else {
            -v
        }
    }

    fn decide_level(&self) -> u32 {
        self.lim.len() as u32
    }

    /// Add a clause with its proof. Returns `false` when the clause is
    /// the empty clause (immediate unsat).
    pub fn add_clause(&mut self, lits: &[Lit], proof: ProofId) -> bool {
        debug_assert_eq!(self.decide_level(), 0);
        let mut dedup: SmallVec<[Lit; 4]> = SmallVec::new();
        for &l in lits {
            self.ensure_var(l.var());
            if dedup.contains(&l.negate()) {
                return true; // tautological clause
            }
            if !dedup.contains(&l) {
                dedup.push(l);
            }
        }
        if dedup.is_empty() {
            self.unsat_proof = Some(proof);
            return false;
        }
        let id = self.clauses.len() as u32;
        if dedup.len() >= 2 {
            self.watches[dedup[0].negate().index()].push(id);
            self.watches[dedup[1].negate().index()].push(id);
        } else {
            self.units.push(id);
        }
        self.clauses.push(ClauseData {
            lits: dedup,
            proof,
        });
        true
    }

    /// Attach a clause during search: watches plus immediate unit
    /// propagation or conflict detection. Returns a conflicting clause
    /// id if the clause is falsified by the current assignment.
    fn attach_dynamic(&mut self, lits: SmallVec<[Lit; 4]>, proof: ProofId) -> Option<u32> {
        for &l in &lits {
            self.ensure_var(l.var());
        }
        let id = self.clauses.len() as u32;
        // order: non-false literals first
        let mut ordered = lits;
        ordered.sort_by_key(|&l| match self.value(l) {
            1 => 0,
            0 => 1,
            _ => 2,
        });
        if ordered.len() >= 2 {
            self.watches[ordered[0].negate().index()].push(id);
            self.watches[ordered[1].negate().index()].push(id);
        } else {
            self.units.push(id);
        }
        let non_false = ordered.iter().filter(|&&l| self.value(l) >= 0).count();
        let first = ordered[0];
        let first_value = self.value(first);
        self.clauses.push(ClauseData {
            lits: ordered,
            proof,
        });
        if first_value < 0 {
            return Some(id);
        }
        if non_false == 1 && first_value == 0 {
            self.enqueue(first, Reason::Clause(id));
        }
        None
    }

    fn enqueue(&mut self, lit: Lit, reason: Reason) {
        debug_assert_eq!(self.value(lit), 0);
        let v = lit.var() as usize;
        self.assign[v] = if lit.is_positive() { 1 } else { -1 };
        self.level[v] = self.decide_level();
        self.reason[v] = reason;
        self.trail.push(lit);
    }

    /// Boolean and theory propagation to fixpoint. Returns a
    /// conflicting clause id.
    fn propagate(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        front: &mut TheoryFront,
    ) -> Result<Option<u32>> {
        loop {
            // unit clauses have no watches; re-fire them here
            for i in 0..self.units.len() {
                let id = self.units[i];
                let lit = self.clauses[id as usize].lits[0];
                match self.value(lit) {
                    0 => self.enqueue(lit, Reason::Clause(id)),
                    -1 => return Ok(Some(id)),
                    _ => {}
                }
            }
            // boolean propagation
            while self.qhead < self.trail.len() {
                let lit = self.trail[self.qhead];
                self.qhead += 1;
                if let Some(conflict) = self.propagate_watches(lit) {
                    return Ok(Some(conflict));
                }
                // hand the literal to the theories
                if let Some(tc) = front.set_literal(tm, lit)? {
                    let (lits, proof) = front.clause_proof(tm, tracker, &tc);
                    front.drain_new_atoms(tm);
                    let conflict = self.attach_dynamic(SmallVec::from_vec(lits), proof);
                    return Ok(Some(conflict.expect("theory conflict must be falsified")));
                }
            }
            // theory-propagated literals
            let mut moved = false;
            while let Some(p) = front.propagated_literal() {
                front.drain_new_atoms(tm);
                self.ensure_var(p.var());
                match self.value(p) {
                    1 => {}
                    0 => {
                        self.enqueue(p, Reason::Theory);
                        moved = true;
                    }
                    _ => {
                        // the propagated literal is already false: its
                        // unit explanation is a conflicting clause
                        let tc = front.explain_propagation(tm, p);
                        let (lits, proof) = front.clause_proof(tm, tracker, &tc);
                        let conflict = self.attach_dynamic(SmallVec::from_vec(lits), proof);
                        return Ok(Some(conflict.expect("explanation must be falsified")));
                    }
                }
            }
            // clauses queued by the theories
            let pending: Vec<_> = front.pending_clauses.drain(..).collect();
            for clause in pending {
                moved = true;
                let tc = silex_theories::TheoryClause::new(clause.lits.clone(), clause.annot);
                let (lits, proof) = front.clause_proof(tm, tracker, &tc);
                if let Some(conflict) = self.attach_dynamic(SmallVec::from_vec(lits), proof) {
                    return Ok(Some(conflict));
                }
            }
            if self.qhead == self.trail.len() && !moved {
                // the cheap theory check before leaving the fixpoint
                if let Some(tc) = front.checkpoint()? {
                    let (lits, proof) = front.clause_proof(tm, tracker, &tc);
                    front.drain_new_atoms(tm);
                    let conflict = self.attach_dynamic(SmallVec::from_vec(lits), proof);
                    return Ok(Some(conflict.expect("checkpoint conflict must be falsified")));
                }
                if self.qhead == self.trail.len() && !front.has_pending() {
                    return Ok(None);
                }
            }
        }
    }

    fn propagate_watches(&mut self, lit: Lit) -> Option<u32> {
        let false_lit = lit.negate();
        let widx = lit.index();
        let mut i = 0;
        'next_clause: while i < self.watches[widx].len() {
            let cid = self.watches[widx][i];
            // keep the falsified watch at position 1
            {
                let c = &mut self.clauses[cid as usize];
                if c.lits[0] == false_lit {
                    c.lits.swap(0, 1);
                }
                debug_assert_eq!(c.lits[1], false_lit);
            }
            let first = self.clauses[cid as usize].lits[0];
            if self.value(first) == 1 {
                i += 1;
                continue;
            }
            // find a replacement watch among the tail literals
            let len = self.clauses[cid as usize].lits.len();
            for j in 2..len {
                let l = self.clauses[cid as usize].lits[j];
                if self.value(l) >= 0 {
                    self.clauses[cid as usize].lits.swap(1, j);
                    self.watches[widx].swap_remove(i);
                    self.watches[l.negate().index()].push(cid);
                    continue 'next_clause;
                }
            }
            // unit under the first watch, or conflicting
            match self.value(first) {
                0 => {
                    self.enqueue(first, Reason::Clause(cid));
                    i += 1;
                }
                _ => return Some(cid),
            }
        }
        None
    }

    /// First-UIP conflict analysis with resolution recording. Returns
    /// `false` when the conflict bottoms out at level zero (unsat).
    fn analyze(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        front: &mut TheoryFront,
        conflict: u32,
    ) -> bool {
        self.conflicts += 1;
        let mut resolvent: Vec<Lit> = self.clauses[conflict as usize].lits.to_vec();
        let main_proof = self.clauses[conflict as usize].proof;
        let mut steps: Vec<(silex_core::TermId, ProofId)> = Vec::new();
        let level = self.decide_level();

        if level == 0 {
            // resolve everything away for the empty-clause proof
            let mut idx = self.trail.len();
            while !resolvent.is_empty() && idx > 0 {
                idx -= 1;
                let lit = self.trail[idx];
                if !resolvent.contains(&lit.negate()) {
                    continue;
                }
                let reason_clause = self.reason_clause(tm, tracker, front, lit);
                let (r_lits, r_proof) = reason_clause;
                let pivot = front.lit_term(tm, lit);
                steps.push((pivot, r_proof));
                resolvent.retain(|&l| l != lit.negate());
                for l in r_lits {
                    if l != lit && !resolvent.contains(&l) {
                        resolvent.push(l);
                    }
                }
            }
            debug_assert!(resolvent.is_empty(), "level-zero conflict left literals");
            self.unsat_proof = Some(tracker.resolution(main_proof, steps));
            return false;
        }

        // count current-level literals, resolve down to the first UIP
        let mut idx = self.trail.len();
        loop {
            let at_level = resolvent
                .iter()
                .filter(|l| self.level[l.var() as usize] == level && self.value(**l) < 0)
                .count();
            if at_level <= 1 {
                break;
            }
            // find the most recent current-level literal in the resolvent
            let lit = loop {
                idx -= 1;
                let cand = self.trail[idx];
                if self.level[cand.var() as usize] == level
                    && resolvent.contains(&cand.negate())
                {
                    break cand;
                }
            };
            if self.reason[lit.var() as usize] == Reason::Decision {
                break;
            }
            let (r_lits, r_proof) = self.reason_clause(tm, tracker, front, lit);
            let pivot = front.lit_term(tm, lit);
            steps.push((pivot, r_proof));
            resolvent.retain(|&l| l != lit.negate());
            for l in r_lits {
                if l != lit && !resolvent.contains(&l) {
                    resolvent.push(l);
                }
            }
        }

        let proof = tracker.resolution(main_proof, steps);
        // backtrack level: second-highest level in the learned clause
        let mut back = 0;
        for &l in &resolvent {
            let ll = self.level[l.var() as usize];
            if ll != level && ll > back {
                back = ll;
            }
        }
        let uip = resolvent
            .iter()
            .copied()
            .find(|l| self.level[l.var() as usize] == level && self.value(*l) < 0);
        debug!(level, back, lits = resolvent.len(), "learned clause");
        self.backtrack_to(front, back);
        let id = self.clauses.len() as u32;
        let mut lits: SmallVec<[Lit; 4]> = SmallVec::from_vec(resolvent);
        // watch the asserting literal first
        if let Some(u) = uip {
            if let Some(pos) = lits.iter().position(|&l| l == u) {
                lits.swap(0, pos);
            }
        }
        if lits.len() >= 2 {
            self.watches[lits[0].negate().index()].push(id);
            self.watches[lits[1].negate().index()].push(id);
        }
        let asserting = lits[0];
        self.clauses.push(ClauseData { lits, proof });
        match self.value(asserting) {
            0 => {
                self.enqueue(asserting, Reason::Clause(id));
                true
            }
            -1 => {
                // the learned clause is still falsified below the
                // backtrack level; analyze again from there
                self.analyze(tm, tracker, front, id)
            }
            _ => true,
        }
    }

    /// The reason clause of an assigned literal, materializing theory
    /// explanations on demand.
    fn reason_clause(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        front: &mut TheoryFront,
        lit: Lit,
    ) -> (Vec<Lit>, ProofId) {
        match self.reason[lit.var() as usize] {
            Reason::Clause(id) => {
                let c = &self.clauses[id as usize];
                (c.lits.to_vec(), c.proof)
            }
            Reason::Theory => {
                let tc = front.explain_propagation(tm, lit);
                let (lits, proof) = front.clause_proof(tm, tracker, &tc);
                front.drain_new_atoms(tm);
                (lits, proof)
            }
            Reason::Decision => unreachable!("decision literal has no reason"),
        }
    }

    fn backtrack_to(&mut self, front: &mut TheoryFront, target: u32) {
        while self.decide_level() > target {
            let mark = self.lim.pop().expect("level without limit");
            while self.trail.len() > mark {
                let lit = self.trail.pop().expect("trail underflow");
                self.assign[lit.var() as usize] = 0;
                front.backtrack_literal(lit);
            }
        }
        self.qhead = self.trail.len();
    }

    fn decide(&mut self, lit: Lit) {
        self.lim.push(self.trail.len());
        self.enqueue(lit, Reason::Decision);
    }

    fn pick_branch(&mut self, front: &mut TheoryFront) -> Option<Lit> {
        while let Some(s) = front.suggestion() {
            self.ensure_var(s.var());
            if self.value(s) == 0 {
                return Some(s);
            }
        }
        for v in 0..self.assign.len() {
            if self.assign[v] == 0 {
                return Some(Lit::negative(v as Var));
            }
        }
        None
    }

    /// Run the search to completion.
    pub fn solve(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        front: &mut TheoryFront,
        cancel: &Cancel,
        simplify: bool,
    ) -> Result<SearchResult> {
        if self.unsat_proof.is_some() {
            return Ok(SearchResult::Unsat);
        }
        self.conflicts = 0;
        if let Some(tc) = front.la.start_check(simplify)? {
            let (lits, proof) = front.clause_proof(tm, tracker, &tc);
            front.drain_new_atoms(tm);
            if self.attach_dynamic(SmallVec::from_vec(lits), proof).is_some()
                && !self.resolve_toplevel(tm, tracker, front)
            {
                front.la.end_check();
                return Ok(SearchResult::Unsat);
            }
        }
        let result = loop {
            if cancel.is_cancelled() {
                front.la.end_check();
                return Err(SilexError::ResourceLimit("cancelled in search"));
            }
            if self.conflicts > self.conflict_budget {
                break SearchResult::Unknown;
            }
            match self.propagate(tm, tracker, front)? {
                Some(conflict) => {
                    if !self.analyze(tm, tracker, front, conflict) {
                        break SearchResult::Unsat;
                    }
                    continue;
                }
                None => {}
            }
            if let Some(lit) = self.pick_branch(front) {
                self.decide(lit);
                continue;
            }
            // complete assignment: the expensive final check
            match front.final_check(tm)? {
                Some(tc) => {
                    let (lits, proof) = front.clause_proof(tm, tracker, &tc);
                    front.drain_new_atoms(tm);
                    match self.attach_dynamic(SmallVec::from_vec(lits), proof) {
                        Some(conflict) => {
                            if !self.analyze(tm, tracker, front, conflict) {
                                break SearchResult::Unsat;
                            }
                        }
                        None => continue,
                    }
                }
                None => {
                    front.drain_new_atoms(tm);
                    if !front.has_pending() {
                        if front.la.has_stuck_disequality() {
                            break SearchResult::Unknown;
                        }
                        break SearchResult::Sat;
                    }
                }
            }
        };
        front.la.end_check();
        Ok(result)
    }

    fn resolve_toplevel(
        &mut self,
        tm: &mut TermManager,
        tracker: &mut ProofTracker,
        front: &mut TheoryFront,
    ) -> bool {
        let conflict = self.clauses.len() as u32 - 1;
        self.analyze(tm, tracker, front, conflict)
    }

    /// Current truth value of a variable, if assigned.
    pub fn var_value(&self, v: Var) -> Option<bool> {
        match self.assign.get(v as usize) {
            Some(1) => Some(true),
            Some(-1) => Some(false),
            _ => None,
        }
    }

    /// Open an assertion scope. The engine must be at decision level 0.
    pub fn push(&mut self) {
        debug_assert_eq!(self.decide_level(), 0);
        self.scopes.push(Scope {
            num_clauses: self.clauses.len(),
        });
    }

    /// Close a scope: drop its clauses and reset the assignment.
    pub fn pop(&mut self, front: &mut TheoryFront) {
        let scope = self.scopes.pop().expect("pop without push");
        // retract the whole trail so the theories roll back
        while let Some(lit) = self.trail.pop() {
            self.assign[lit.var() as usize] = 0;
            front.backtrack_literal(lit);
        }
        self.lim.clear();
        self.qhead = 0;
        self.clauses.truncate(scope.num_clauses);
        for w in &mut self.watches {
            w.clear();
        }
        self.units.clear();
        for id in 0..self.clauses.len() as u32 {
            let lits = self.clauses[id as usize].lits.clone();
            if lits.len() >= 2 {
                self.watches[lits[0].negate().index()].push(id);
                self.watches[lits[1].negate().index()].push(id);
            } else {
                self.units.push(id);
            }
        }
        self.unsat_proof = None;
    }

    /// Reset the assignment (between checks) without dropping clauses.
    pub fn reset_assignment(&mut self, front: &mut TheoryFront) {
        while let Some(lit) = self.trail.pop() {
            self.assign[lit.var() as usize] = 0;
            front.backtrack_literal(lit);
        }
        self.lim.clear();
        self.qhead = 0;
    }
}

impl Default for DpllEngine {
    fn default() -> Self {
        Self::new()
    }
}
