//! The solver façade.
//!
//! Owns the term manager, the proof tracker, the compiler and
//! clausifier, the theory front and the CDCL engine, and exposes the
//! narrow command surface: assert a typed formula, check, push/pop,
//! fetch the proof or the model.

use crate::clausifier::Clausifier;
use crate::compiler::Compiler;
use crate::dpll::{DpllEngine, SearchResult};
use crate::model::{Model, Value};
use crate::theory::TheoryFront;
use silex_core::{Cancel, Config, Result, SilexError, TermId, TermManager};
use silex_proof::{ProofArena, ProofChecker, ProofId, ProofTracker};
use tracing::debug;

/// Why a check came back `unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonUnknown {
    /// The cancellation token fired.
    Canceled,
    /// The per-check budget ran out.
    Budget,
}

/// The outcome of `check_sat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatResult {
    /// Satisfiable.
    Sat,
    /// Unsatisfiable.
    Unsat,
    /// Undetermined.
    Unknown(ReasonUnknown),
}

/// The solver.
pub struct Solver {
    tm: TermManager,
    cfg: Config,
    cancel: Cancel,
    tracker: ProofTracker,
    compiler: Compiler,
    clausifier: Clausifier,
    front: TheoryFront,
    engine: DpllEngine,
    assertions: Vec<TermId>,
    assertion_scopes: Vec<usize>,
    status: Option<SatResult>,
}

impl Solver {
    /// A solver with the given configuration.
    pub fn new(cfg: Config) -> Self {
        let cancel = Cancel::new();
        let front = TheoryFront::new(&cfg, cancel.clone());
        Solver {
            tm: TermManager::new(),
            cfg,
            cancel,
            tracker: ProofTracker::new(),
            compiler: Compiler::new(),
            clausifier: Clausifier::new(),
            front,
            engine: DpllEngine::new(),
            assertions: Vec::new(),
            assertion_scopes: Vec::new(),
            status: None,
        }
    }

    /// A solver with the default configuration.
    pub fn with_defaults() -> Self {
        Solver::new(Config::default())
    }

    /// The term manager, for building input terms.
    pub fn terms(&mut self) -> &mut TermManager {
        &mut self.tm
    }

    /// A clone of the cancellation token.
    pub fn cancel_token(&self) -> Cancel {
        self.cancel.clone()
    }

    /// Assert a Boolean formula. A usage error rejects the assertion
    /// and leaves the previous state intact.
    pub fn assert_formula(&mut self, f: TermId) -> Result<()> {
        if self.tm.sort(f) != self.tm.sorts.bool_sort {
            return Err(SilexError::SortMismatch {
                expected: "Bool".to_string(),
                found: format!("{}", self.tm.sorts.kind(self.tm.sort(f))),
            });
        }
        // clear any leftover search assignment before touching clauses
        self.engine.reset_assignment(&mut self.front);
        self.status = None;
        self.clausifier.assert_formula(
            &mut self.tm,
            &mut self.tracker,
            &mut self.compiler,
            &mut self.front,
            &mut self.engine,
            f,
        )?;
        self.assertions.push(f);
        Ok(())
    }

    /// Run a satisfiability check.
    pub fn check_sat(&mut self) -> SatResult {
        self.engine.reset_assignment(&mut self.front);
        self.cancel.reset();
        let result = self.engine.solve(
            &mut self.tm,
            &mut self.tracker,
            &mut self.front,
            &self.cancel,
            self.cfg.simplify_tableau,
        );
        let status = match result {
            Ok(SearchResult::Sat) => SatResult::Sat,
            Ok(SearchResult::Unsat) => SatResult::Unsat,
            Ok(SearchResult::Unknown) => SatResult::Unknown(ReasonUnknown::Budget),
            Err(SilexError::ResourceLimit(_)) => SatResult::Unknown(ReasonUnknown::Canceled),
            Err(err) => {
                debug!(%err, "internal error during check");
                SatResult::Unknown(ReasonUnknown::Budget)
            }
        };
        if status == SatResult::Unsat && self.cfg.proof_check_mode {
            let valid = self.check_proof().unwrap_or(false);
            debug_assert!(valid, "produced proof failed its own check");
        }
        self.status = Some(status);
        status
    }

    /// The proof of the empty clause after an unsat answer.
    pub fn proof(&self) -> Option<ProofId> {
        match self.status {
            Some(SatResult::Unsat) => self.engine.unsat_proof(),
            _ => None,
        }
    }

    /// The proof arena (for inspection and independent checking).
    pub fn proof_arena(&self) -> &ProofArena {
        &self.tracker.arena
    }

    /// Render the refutation as an s-expression.
    pub fn proof_sexpr(&self) -> Option<String> {
        let root = self.proof()?;
        Some(self.tracker.arena.display(&self.tm, root))
    }

    /// Run the independent checker over the produced proof.
    pub fn check_proof(&mut self) -> Option<bool> {
        let root = self.engine.unsat_proof()?;
        let mut checker = ProofChecker::new(&mut self.tm, &self.tracker.arena, &self.assertions);
        let ok = checker.check(root);
        if !ok {
            debug!(errors = checker.errors().len(), "proof check failed");
        }
        Some(ok)
    }

    /// The model after a sat answer.
    pub fn model(&mut self) -> Option<Model> {
        if self.status != Some(SatResult::Sat) {
            return None;
        }
        let mut model = Model::default();
        for (term, value) in self.front.model_values(&self.tm) {
            model.insert(term, value);
        }
        if cfg!(debug_assertions) {
            for &f in &self.assertions {
                if let Some(v) = model.eval(&self.tm, f) {
                    debug_assert_eq!(v, Value::Bool(true), "model refutes an assertion");
                }
            }
        }
        Some(model)
    }

    /// Open an assertion scope.
    pub fn push(&mut self) {
        self.engine.reset_assignment(&mut self.front);
        self.assertion_scopes.push(self.assertions.len());
        self.engine.push();
        self.front.push();
        self.status = None;
    }

    /// Close the innermost assertion scope.
    pub fn pop(&mut self) -> Result<()> {
        let mark = self
            .assertion_scopes
            .pop()
            .ok_or(SilexError::Internal("pop without push"))?;
        self.engine.pop(&mut self.front);
        self.front.pop()?;
        self.assertions.truncate(mark);
        self.status = None;
        Ok(())
    }

    /// The number of asserted formulas.
    pub fn num_assertions(&self) -> usize {
        self.assertions.len()
    }
}
