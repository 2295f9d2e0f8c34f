//! Solver configuration.

/// Tunables and feature switches carried by a solver instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// Annotate every derivation with a proof object.
    pub produce_proofs: bool,
    /// Run the independent proof checker on every unsat result.
    pub proof_check_mode: bool,
    /// Keep enough state to answer `get-model` after sat.
    pub produce_models: bool,
    /// Switch to Bland's rule after `bland_use_factor * num_vars`
    /// consecutive pivots without resolving all out-of-bounds variables.
    pub bland_use_factor: u32,
    /// Upper limit on Gomory cuts per check.
    pub max_cuts: u32,
    /// Remove trivially satisfiable real rows before a check.
    pub simplify_tableau: bool,
    /// Run the expensive internal consistency checks (debug builds).
    pub expensive_asserts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            produce_proofs: false,
            proof_check_mode: false,
            produce_models: true,
            bland_use_factor: 8,
            max_cuts: 256,
            simplify_tableau: true,
            expensive_asserts: cfg!(debug_assertions),
        }
    }
}

impl Config {
    /// A configuration with proof production and checking enabled.
    pub fn with_proofs() -> Self {
        Config {
            produce_proofs: true,
            proof_check_mode: true,
            ..Config::default()
        }
    }
}
