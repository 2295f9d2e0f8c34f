//! Proof terms.
//!
//! A proof is a DAG of nodes of the distinguished sort `@Proof`, one
//! tagged variant per rule. Each node proves either a clause (a term
//! read as a set of disjuncts) or an equality; the root of a closed
//! refutation proves `false`. Nodes live in an arena so sharing is by
//! [`ProofId`] and the non-recursive walkers can memoize per node.

use crate::rules::{RewriteRule, SplitRule, TautRule};
use silex_core::{TermId, TermManager};
use silex_math::Rational;

/// Index of a proof node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProofId(pub u32);

/// One `:subpath` or `:weakpath` annotation of a congruence or array
/// lemma.
#[derive(Debug, Clone)]
pub struct LemmaPath {
    /// The weak index (`:weakpath`), or `None` for a `:subpath`.
    pub weak_index: Option<TermId>,
    /// The chain of terms.
    pub terms: Vec<TermId>,
}

/// The annotation of a `@lemma` leaf.
#[derive(Debug, Clone)]
pub enum LemmaKind {
    /// `:LA` with Farkas coefficients parallel to the clause literals.
    La(Vec<Rational>),
    /// `:CC` with a goal equality and paths.
    Cc {
        /// The proved equality; `None` for constant clashes.
        goal: Option<TermId>,
        /// Main path first, dependency subpaths after.
        paths: Vec<LemmaPath>,
    },
    /// `:read-over-weakeq`.
    ReadOverWeakeq {
        /// The proved select equality.
        goal: TermId,
        /// The weak paths.
        paths: Vec<LemmaPath>,
    },
    /// `:weakeq-ext`.
    WeakeqExt {
        /// The proved array equality.
        goal: TermId,
        /// Main path plus weak paths.
        paths: Vec<LemmaPath>,
    },
    /// `:trichotomy`.
    Trichotomy,
    /// `:EQ`.
    Eq,
}

impl LemmaKind {
    /// The printed annotation key.
    pub fn key(&self) -> &'static str {
        match self {
            LemmaKind::La(_) => ":LA",
            LemmaKind::Cc { .. } => ":CC",
            LemmaKind::ReadOverWeakeq { .. } => ":read-over-weakeq",
            LemmaKind::WeakeqExt { .. } => ":weakeq-ext",
            LemmaKind::Trichotomy => ":trichotomy",
            LemmaKind::Eq => ":EQ",
        }
    }
}

/// A proof node.
#[derive(Debug, Clone)]
pub enum ProofNode {
    /// `(@asserted f)` — an input assertion.
    Asserted(TermId),
    /// `(@refl t)` proves `(= t t)`.
    Refl(TermId),
    /// `(@trans p1 ... pk)` chains equalities.
    Trans(Box<[ProofId]>),
    /// `(@cong p0 p1 ... pk)` rewrites arguments left to right.
    Cong(Box<[ProofId]>),
    /// `(@eq pf prewrite)` proves the right side of the rewrite.
    Eq(ProofId, ProofId),
    /// `(@res main (! p :pivot l) ...)` — resolution, pivots in order.
    Res {
        /// The main clause proof.
        main: ProofId,
        /// `(pivot, side clause proof)` pairs.
        steps: Box<[(TermId, ProofId)]>,
    },
    /// `(@clause p expected)` — reorders a proved clause.
    Clause {
        /// The underlying proof.
        sub: ProofId,
        /// The expected (permuted) clause term.
        clause: TermId,
    },
    /// `(@split (! p :rule) result)`.
    Split {
        /// The split rule.
        rule: SplitRule,
        /// Proof of the formula being split.
        sub: ProofId,
        /// The extracted result.
        result: TermId,
    },
    /// `(@tautology (! cl :rule))`.
    Taut {
        /// The schema.
        rule: TautRule,
        /// The tautological clause.
        clause: TermId,
    },
    /// `(@rewrite (! (= lhs rhs) :rule))`.
    Rewrite {
        /// The rewrite axiom name.
        rule: RewriteRule,
        /// The equality `(= lhs rhs)`.
        equality: TermId,
    },
    /// `(@intern (= lhs rhs))` — the internal (quoted) form of an atom.
    Intern {
        /// The equality `(= lhs rhs)`.
        equality: TermId,
    },
    /// `(@lemma (! cl :kind annotation))`.
    Lemma {
        /// The lemma kind and its annotation payload.
        kind: LemmaKind,
        /// The lemma clause.
        clause: TermId,
    },
}

/// The proof arena.
#[derive(Debug, Default)]
pub struct ProofArena {
    nodes: Vec<ProofNode>,
}

impl ProofArena {
    /// An empty arena.
    pub fn new() -> Self {
        ProofArena::default()
    }

    /// Allocate a node.
    pub fn alloc(&mut self, node: ProofNode) -> ProofId {
        let id = ProofId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Borrow a node.
    pub fn get(&self, id: ProofId) -> &ProofNode {
        &self.nodes[id.0 as usize]
    }

    /// The number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Is the arena empty?
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Render a proof as an s-expression.
    pub fn display(&self, tm: &TermManager, id: ProofId) -> String {
        let mut out = String::new();
        self.write(tm, id, &mut out);
        out
    }

    fn write(&self, tm: &TermManager, id: ProofId, out: &mut String) {
        match self.get(id) {
            ProofNode::Asserted(t) => {
                out.push_str("(@asserted ");
                out.push_str(&tm.display(*t));
                out.push(')');
            }
            ProofNode::Refl(t) => {
                out.push_str("(@refl ");
                out.push_str(&tm.display(*t));
                out.push(')');
            }
            ProofNode::Trans(parts) => {
                out.push_str("(@trans");
                for &p in parts.iter() {
                    out.push(' ');
                    self.write(tm, p, out);
                }
                out.push(')');
            }
            ProofNode::Cong(parts) => {
                out.push_str("(@cong");
                for &p in parts.iter() {
                    out.push(' ');
                    self.write(tm, p, out);
                }
                out.push(')');
            }
            ProofNode::Eq(a, b) => {
                out.push_str("(@eq ");
                self.write(tm, *a, out);
                out.push(' ');
                self.write(tm, *b, out);
                out.push(')');
            }
            ProofNode::Res { main, steps } => {
                out.push_str("(@res ");
                self.write(tm, *main, out);
                for (pivot, proof) in steps.iter() {
                    out.push_str(" (! ");
                    self.write(tm, *proof, out);
                    out.push_str(" :pivot ");
                    out.push_str(&tm.display(*pivot));
                    out.push(')');
                }
                out.push(')');
            }
            ProofNode::Clause { sub, clause } => {
                out.push_str("(@clause ");
                self.write(tm, *sub, out);
                out.push(' ');
                out.push_str(&tm.display(*clause));
                out.push(')');
            }
            ProofNode::Split { rule, sub, result } => {
                out.push_str("(@split (! ");
                self.write(tm, *sub, out);
                out.push(' ');
                out.push_str(rule.key());
                out.push_str(") ");
                out.push_str(&tm.display(*result));
                out.push(')');
            }
            ProofNode::Taut { rule, clause } => {
                out.push_str("(@tautology (! ");
                out.push_str(&tm.display(*clause));
                out.push(' ');
                out.push_str(rule.key());
                out.push_str("))");
            }
            ProofNode::Rewrite { rule, equality } => {
                out.push_str("(@rewrite (! ");
                out.push_str(&tm.display(*equality));
                out.push(' ');
                out.push_str(rule.key());
                out.push_str("))");
            }
            ProofNode::Intern { equality } => {
                out.push_str("(@intern ");
                out.push_str(&tm.display(*equality));
                out.push(')');
            }
            ProofNode::Lemma { kind, clause } => {
                out.push_str("(@lemma (! ");
                out.push_str(&tm.display(*clause));
                out.push(' ');
                out.push_str(kind.key());
                match kind {
                    LemmaKind::La(coeffs) => {
                        out.push_str(" (");
                        for (i, c) in coeffs.iter().enumerate() {
                            if i > 0 {
                                out.push(' ');
                            }
                            out.push_str(&c.to_string());
                        }
                        out.push(')');
                    }
                    LemmaKind::Cc { goal, paths } => {
                        if let Some(g) = goal {
                            out.push(' ');
                            out.push_str(&tm.display(*g));
                        }
                        Self::write_paths(tm, paths, out);
                    }
                    LemmaKind::ReadOverWeakeq { goal, paths }
                    | LemmaKind::WeakeqExt { goal, paths } => {
                        out.push(' ');
                        out.push_str(&tm.display(*goal));
                        Self::write_paths(tm, paths, out);
                    }
                    LemmaKind::Trichotomy | LemmaKind::Eq => {}
                }
                out.push_str("))");
            }
        }
    }

    fn write_paths(tm: &TermManager, paths: &[LemmaPath], out: &mut String) {
        for path in paths {
            match path.weak_index {
                Some(idx) => {
                    out.push_str(" :weakpath (");
                    out.push_str(&tm.display(idx));
                    out.push_str(" (");
                }
                None => out.push_str(" :subpath ("),
            }
            for (i, t) in path.terms.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(&tm.display(*t));
            }
            out.push(')');
            if path.weak_index.is_some() {
                out.push(')');
            }
        }
    }
}
