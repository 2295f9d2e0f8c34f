//! The hash-consed term DAG.
//!
//! Terms are immutable and structurally shared: building the same term
//! twice yields the same [`TermId`], so identity comparison is term
//! equality. All downstream components (theories, compiler, proof checker)
//! pattern-match on [`TermKind`] / [`Op`] and never inspect strings.

use crate::sort::{SortId, SortKind, SortTable};
use lasso::{Rodeo, Spur};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Index of a hash-consed term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(pub u32);

/// Index of a declared function symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncId(pub u32);

/// How an atom is quoted when it crosses into the Boolean layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteKind {
    /// `:quoted` — a plain theory atom proxy.
    Plain,
    /// `:quotedCC` — an equality proxy owned by the congruence closure.
    Cc,
}

/// Interpreted operators plus declared symbols.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    /// Boolean negation.
    Not,
    /// N-ary disjunction.
    Or,
    /// N-ary conjunction (input only; compiled away).
    And,
    /// Binary exclusive or (input only).
    Xor,
    /// Right-associative implication (input only).
    Implies,
    /// If-then-else.
    Ite,
    /// Equality (binary after compilation, n-ary in input).
    Eq,
    /// Pairwise disequality (input only).
    Distinct,
    /// `<=`.
    Le,
    /// `<` (input only; compiled to a negated `<=`).
    Lt,
    /// `>=` (input only).
    Ge,
    /// `>` (input only).
    Gt,
    /// N-ary addition.
    Add,
    /// Subtraction / unary minus.
    Sub,
    /// N-ary multiplication (linear uses only).
    Mul,
    /// Real division.
    Divide,
    /// Integer division.
    IntDiv,
    /// Integer modulus.
    Mod,
    /// Int-to-real coercion.
    ToReal,
    /// Real-to-int floor coercion.
    ToInt,
    /// `(_ divisible n)`.
    Divisible(BigInt),
    /// Array read.
    Select,
    /// Array write.
    Store,
    /// The extensionality witness `@diff`.
    Diff,
    /// The opaque `@/0` division-by-zero marker.
    By0,
    /// The opaque `@div0` marker.
    Div0,
    /// The opaque `@mod0` marker.
    Mod0,
    /// A declared function or constant symbol.
    Func(FuncId),
}

/// The shape of a term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermKind {
    /// The constant `true`.
    True,
    /// The constant `false`.
    False,
    /// A numeral or decimal constant (sort Int or Real).
    Const(BigRational),
    /// An operator applied to arguments.
    App(Op, Box<[TermId]>),
    /// A quoted atom (`:quoted` / `:quotedCC` wrapper).
    Quoted(TermId, QuoteKind),
}

/// The macro body of a defined function.
#[derive(Debug)]
pub struct FuncDef {
    /// Placeholder terms standing for the formal parameters, in order.
    pub formals: Box<[TermId]>,
    /// The body over the placeholders.
    pub body: TermId,
}

/// A declared function symbol.
#[derive(Debug)]
pub struct FuncDecl {
    /// Interned name.
    pub name: Spur,
    /// Parameter sorts.
    pub params: Box<[SortId]>,
    /// Return sort.
    pub ret: SortId,
    /// The definition for `define-fun` symbols; `None` for
    /// uninterpreted ones.
    pub definition: Option<FuncDef>,
}

struct TermData {
    kind: TermKind,
    sort: SortId,
}

/// The term manager: interning tables plus constructors.
pub struct TermManager {
    /// The sort table.
    pub sorts: SortTable,
    names: Rodeo,
    funcs: Vec<FuncDecl>,
    terms: Vec<TermData>,
    unify: FxHashMap<(TermKind, SortId), TermId>,
    true_term: TermId,
    false_term: TermId,
}

impl TermManager {
    /// Create a manager holding only `true` and `false`.
    pub fn new() -> Self {
        let mut tm = TermManager {
            sorts: SortTable::new(),
            names: Rodeo::default(),
            funcs: Vec::new(),
            terms: Vec::new(),
            unify: FxHashMap::default(),
            true_term: TermId(0),
            false_term: TermId(0),
        };
        let bool_sort = tm.sorts.bool_sort;
        tm.true_term = tm.intern(TermKind::True, bool_sort);
        tm.false_term = tm.intern(TermKind::False, bool_sort);
        tm
    }

    fn intern(&mut self, kind: TermKind, sort: SortId) -> TermId {
        let key = (kind, sort);
        if let Some(&id) = self.unify.get(&key) {
            return id;
        }
        let id = TermId(self.terms.len() as u32);
        self.terms.push(TermData {
            kind: key.0.clone(),
            sort,
        });
        self.unify.insert(key, id);
        id
    }

    /// The number of interned terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Is the DAG empty? (Never; `true`/`false` always exist.)
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The shape of a term.
    pub fn kind(&self, t: TermId) -> &TermKind {
        &self.terms[t.0 as usize].kind
    }

    /// The sort of a term.
    pub fn sort(&self, t: TermId) -> SortId {
        self.terms[t.0 as usize].sort
    }

    /// `true`.
    pub fn mk_true(&self) -> TermId {
        self.true_term
    }

    /// `false`.
    pub fn mk_false(&self) -> TermId {
        self.false_term
    }

    /// A numeric constant of the given sort.
    pub fn mk_const(&mut self, value: BigRational, sort: SortId) -> TermId {
        debug_assert!(self.sorts.is_numeric(sort));
        debug_assert!(
            sort != self.sorts.int_sort || value.is_integer(),
            "non-integral Int constant"
        );
        self.intern(TermKind::Const(value), sort)
    }

    /// An integer constant.
    pub fn mk_int(&mut self, n: impl Into<BigInt>) -> TermId {
        let sort = self.sorts.int_sort;
        self.mk_const(BigRational::from_integer(n.into()), sort)
    }

    /// Zero of the given numeric sort.
    pub fn mk_zero(&mut self, sort: SortId) -> TermId {
        self.mk_const(BigRational::zero(), sort)
    }

    /// Declare a function symbol.
    pub fn declare_fun(&mut self, name: &str, params: Vec<SortId>, ret: SortId) -> FuncId {
        let id = FuncId(self.funcs.len() as u32);
        self.funcs.push(FuncDecl {
            name: self.names.get_or_intern(name),
            params: params.into_boxed_slice(),
            ret,
            definition: None,
        });
        id
    }

    /// Define a function symbol: `formals` are placeholder terms (one
    /// per parameter, typically fresh constants) and `body` is the
    /// macro body over them. Applications expand by substitution.
    pub fn define_fun(
        &mut self,
        name: &str,
        formals: Vec<TermId>,
        ret: SortId,
        body: TermId,
    ) -> FuncId {
        debug_assert_eq!(self.sort(body), ret);
        let params: Vec<SortId> = formals.iter().map(|&f| self.sort(f)).collect();
        let id = FuncId(self.funcs.len() as u32);
        self.funcs.push(FuncDecl {
            name: self.names.get_or_intern(name),
            params: params.into_boxed_slice(),
            ret,
            definition: Some(FuncDef {
                formals: formals.into_boxed_slice(),
                body,
            }),
        });
        id
    }

    /// Declare a constant symbol and return its (0-ary application) term.
    pub fn declare_const(&mut self, name: &str, sort: SortId) -> TermId {
        let f = self.declare_fun(name, Vec::new(), sort);
        self.mk_app(Op::Func(f), &[])
    }

    /// Replace every occurrence of the map's keys in `t`, rebuilding
    /// the surrounding structure.
    pub fn substitute(&mut self, t: TermId, map: &FxHashMap<TermId, TermId>) -> TermId {
        if let Some(&replacement) = map.get(&t) {
            return replacement;
        }
        match self.kind(t).clone() {
            TermKind::App(op, args) => {
                let new_args: Vec<TermId> =
                    args.iter().map(|&a| self.substitute(a, map)).collect();
                if new_args.as_slice() == &*args {
                    t
                } else {
                    self.mk_app(op, &new_args)
                }
            }
            TermKind::Quoted(inner, quote) => {
                let new_inner = self.substitute(inner, map);
                if new_inner == inner {
                    t
                } else {
                    self.mk_quoted(new_inner, quote)
                }
            }
            _ => t,
        }
    }

    /// A declared function's record.
    pub fn func(&self, f: FuncId) -> &FuncDecl {
        &self.funcs[f.0 as usize]
    }

    /// A declared function's name.
    pub fn func_name(&self, f: FuncId) -> &str {
        self.names.resolve(&self.funcs[f.0 as usize].name)
    }

    /// Iterate over all declared functions.
    pub fn funcs(&self) -> impl Iterator<Item = (FuncId, &FuncDecl)> {
        self.funcs
            .iter()
            .enumerate()
            .map(|(i, d)| (FuncId(i as u32), d))
    }

    fn result_sort(&self, op: &Op, args: &[TermId]) -> SortId {
        match op {
            Op::Not
            | Op::Or
            | Op::And
            | Op::Xor
            | Op::Implies
            | Op::Eq
            | Op::Distinct
            | Op::Le
            | Op::Lt
            | Op::Ge
            | Op::Gt
            | Op::Divisible(_) => self.sorts.bool_sort,
            Op::Ite => self.sort(args[1]),
            Op::Add | Op::Sub | Op::Mul => {
                let real = self.sorts.real_sort;
                if args.iter().any(|&a| self.sort(a) == real) {
                    real
                } else {
                    self.sorts.int_sort
                }
            }
            Op::Divide | Op::ToReal => self.sorts.real_sort,
            Op::IntDiv | Op::Mod | Op::ToInt | Op::Div0 | Op::Mod0 => self.sorts.int_sort,
            Op::By0 => self.sort(args[0]),
            Op::Select => self
                .sorts
                .array_element(self.sort(args[0]))
                .expect("select on non-array"),
            Op::Store => self.sort(args[0]),
            Op::Diff => self
                .sorts
                .array_index(self.sort(args[0]))
                .expect("@diff on non-array"),
            Op::Func(f) => self.funcs[f.0 as usize].ret,
        }
    }

    /// Build an application term.
    pub fn mk_app(&mut self, op: Op, args: &[TermId]) -> TermId {
        debug_assert!(self.check_app(&op, args), "ill-sorted {:?}", op);
        let sort = self.result_sort(&op, args);
        self.intern(TermKind::App(op, args.into()), sort)
    }

    fn check_app(&self, op: &Op, args: &[TermId]) -> bool {
        match op {
            Op::Not => args.len() == 1 && self.sorts.is_bool(self.sort(args[0])),
            Op::Or | Op::And => args.iter().all(|&a| self.sorts.is_bool(self.sort(a))),
            Op::Xor | Op::Implies => {
                args.len() >= 2 && args.iter().all(|&a| self.sorts.is_bool(self.sort(a)))
            }
            Op::Ite => {
                args.len() == 3
                    && self.sorts.is_bool(self.sort(args[0]))
                    && self.sort(args[1]) == self.sort(args[2])
            }
            Op::Eq | Op::Distinct => {
                args.len() >= 2 && args.iter().all(|&a| self.sort(a) == self.sort(args[0]))
            }
            Op::Le | Op::Lt | Op::Ge | Op::Gt => {
                args.len() == 2
                    && self.sorts.is_numeric(self.sort(args[0]))
                    && self.sorts.is_numeric(self.sort(args[1]))
            }
            Op::Divisible(n) => args.len() == 1 && n.is_positive(),
            Op::Select => args.len() == 2 && self.sorts.is_array(self.sort(args[0])),
            Op::Store => args.len() == 3 && self.sorts.is_array(self.sort(args[0])),
            Op::Diff => args.len() == 2 && self.sort(args[0]) == self.sort(args[1]),
            Op::Func(f) => {
                let decl = &self.funcs[f.0 as usize];
                decl.params.len() == args.len()
                    && decl
                        .params
                        .iter()
                        .zip(args)
                        .all(|(&p, &a)| p == self.sort(a))
            }
            _ => true,
        }
    }

    /// `(not t)`.
    pub fn mk_not(&mut self, t: TermId) -> TermId {
        self.mk_app(Op::Not, &[t])
    }

    /// `(or args...)`. Not simplified.
    pub fn mk_or(&mut self, args: &[TermId]) -> TermId {
        self.mk_app(Op::Or, args)
    }

    /// Binary `(= l r)`.
    pub fn mk_eq(&mut self, l: TermId, r: TermId) -> TermId {
        self.mk_app(Op::Eq, &[l, r])
    }

    /// `(ite c t e)`.
    pub fn mk_ite(&mut self, c: TermId, t: TermId, e: TermId) -> TermId {
        self.mk_app(Op::Ite, &[c, t, e])
    }

    /// `(<= l r)`.
    pub fn mk_le(&mut self, l: TermId, r: TermId) -> TermId {
        self.mk_app(Op::Le, &[l, r])
    }

    /// `(select a i)`.
    pub fn mk_select(&mut self, a: TermId, i: TermId) -> TermId {
        self.mk_app(Op::Select, &[a, i])
    }

    /// `(store a i v)`.
    pub fn mk_store(&mut self, a: TermId, i: TermId, v: TermId) -> TermId {
        self.mk_app(Op::Store, &[a, i, v])
    }

    /// Wrap an atom in a quote annotation.
    pub fn mk_quoted(&mut self, t: TermId, kind: QuoteKind) -> TermId {
        let sort = self.sort(t);
        debug_assert!(self.sorts.is_bool(sort));
        self.intern(TermKind::Quoted(t, kind), sort)
    }

    /// Negate, avoiding double negation: `negate((not x)) = x`.
    pub fn negate(&mut self, t: TermId) -> TermId {
        if let TermKind::App(Op::Not, args) = self.kind(t) {
            args[0]
        } else {
            self.mk_not(t)
        }
    }

    /// The arguments of `t` if it is an application of `op`.
    pub fn app_args(&self, t: TermId, op: &Op) -> Option<&[TermId]> {
        match self.kind(t) {
            TermKind::App(o, args) if o == op => Some(args),
            _ => None,
        }
    }

    /// Is `t` an application of `op`?
    pub fn is_app(&self, t: TermId, op: &Op) -> bool {
        matches!(self.kind(t), TermKind::App(o, _) if o == op)
    }

    /// The operator of `t`, if it is an application.
    pub fn op_of(&self, t: TermId) -> Option<&Op> {
        match self.kind(t) {
            TermKind::App(o, _) => Some(o),
            _ => None,
        }
    }

    /// Strip a quote annotation, if present.
    pub fn unquote(&self, t: TermId) -> Option<TermId> {
        match self.kind(t) {
            TermKind::Quoted(inner, _) => Some(*inner),
            _ => None,
        }
    }

    /// The constant value of `t`, if it is a numeric constant.
    pub fn const_value(&self, t: TermId) -> Option<&BigRational> {
        match self.kind(t) {
            TermKind::Const(q) => Some(q),
            _ => None,
        }
    }

    /// Is `t` the zero constant of its sort?
    pub fn is_zero(&self, t: TermId) -> bool {
        matches!(self.kind(t), TermKind::Const(q) if q.is_zero())
    }

    /// Is `t` the constant one?
    pub fn is_one(&self, t: TermId) -> bool {
        matches!(self.kind(t), TermKind::Const(q) if q.is_one())
    }

    /// View a Boolean term as a clause: the disjuncts of an `or`, nothing
    /// for `false`, a singleton otherwise.
    pub fn term_to_clause(&self, t: TermId) -> SmallVec<[TermId; 8]> {
        match self.kind(t) {
            TermKind::App(Op::Or, args) => args.iter().copied().collect(),
            TermKind::False => SmallVec::new(),
            _ => {
                let mut v = SmallVec::new();
                v.push(t);
                v
            }
        }
    }

    /// Build the clause term for a list of disjuncts.
    pub fn clause_to_term(&mut self, lits: &[TermId]) -> TermId {
        match lits.len() {
            0 => self.mk_false(),
            1 => lits[0],
            _ => self.mk_or(lits),
        }
    }

    /// Render a term as an s-expression (used by proof output and tests).
    pub fn display(&self, t: TermId) -> String {
        let mut out = String::new();
        self.write_term(&mut out, t);
        out
    }

    fn write_term(&self, out: &mut String, t: TermId) {
        match self.kind(t) {
            TermKind::True => out.push_str("true"),
            TermKind::False => out.push_str("false"),
            TermKind::Const(q) => {
                if q.is_negative() {
                    out.push_str("(- ");
                    Self::write_const(out, &-q);
                    out.push(')');
                } else {
                    Self::write_const(out, q);
                }
            }
            TermKind::Quoted(inner, kind) => {
                out.push_str("(! ");
                self.write_term(out, *inner);
                out.push_str(match kind {
                    QuoteKind::Plain => " :quoted)",
                    QuoteKind::Cc => " :quotedCC)",
                });
            }
            TermKind::App(op, args) => {
                if args.is_empty() {
                    out.push_str(self.op_name(op));
                    return;
                }
                out.push('(');
                out.push_str(self.op_name(op));
                for &a in args.iter() {
                    out.push(' ');
                    self.write_term(out, a);
                }
                out.push(')');
            }
        }
    }

    fn write_const(out: &mut String, q: &BigRational) {
        if q.is_integer() {
            out.push_str(&q.numer().to_string());
        } else {
            out.push_str(&format!("(/ {} {})", q.numer(), q.denom()));
        }
    }

    fn op_name<'a>(&'a self, op: &'a Op) -> &'a str {
        match op {
            Op::Not => "not",
            Op::Or => "or",
            Op::And => "and",
            Op::Xor => "xor",
            Op::Implies => "=>",
            Op::Ite => "ite",
            Op::Eq => "=",
            Op::Distinct => "distinct",
            Op::Le => "<=",
            Op::Lt => "<",
            Op::Ge => ">=",
            Op::Gt => ">",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Divide => "/",
            Op::IntDiv => "div",
            Op::Mod => "mod",
            Op::ToReal => "to_real",
            Op::ToInt => "to_int",
            Op::Divisible(_) => "divisible",
            Op::Select => "select",
            Op::Store => "store",
            Op::Diff => "@diff",
            Op::By0 => "@/0",
            Op::Div0 => "@div0",
            Op::Mod0 => "@mod0",
            Op::Func(f) => self.func_name(*f),
        }
    }
}

impl Default for TermManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consing() {
        let mut tm = TermManager::new();
        let x = tm.declare_const("x", tm.sorts.int_sort);
        let zero = tm.mk_int(0);
        let le1 = tm.mk_le(x, zero);
        let le2 = tm.mk_le(x, zero);
        assert_eq!(le1, le2);
    }

    #[test]
    fn test_const_sorts_distinct() {
        let mut tm = TermManager::new();
        let int_sort = tm.sorts.int_sort;
        let real_sort = tm.sorts.real_sort;
        let five_int = tm.mk_const(BigRational::from_integer(5.into()), int_sort);
        let five_real = tm.mk_const(BigRational::from_integer(5.into()), real_sort);
        assert_ne!(five_int, five_real);
    }

    #[test]
    fn test_negate_avoids_double_negation() {
        let mut tm = TermManager::new();
        let p = tm.declare_const("p", tm.sorts.bool_sort);
        let np = tm.mk_not(p);
        assert_eq!(tm.negate(np), p);
        assert_eq!(tm.negate(p), np);
    }

    #[test]
    fn test_term_to_clause() {
        let mut tm = TermManager::new();
        let p = tm.declare_const("p", tm.sorts.bool_sort);
        let q = tm.declare_const("q", tm.sorts.bool_sort);
        let or = tm.mk_or(&[p, q]);
        assert_eq!(tm.term_to_clause(or).as_slice(), &[p, q]);
        let f = tm.mk_false();
        assert!(tm.term_to_clause(f).is_empty());
        assert_eq!(tm.term_to_clause(p).as_slice(), &[p]);
    }

    #[test]
    fn test_display() {
        let mut tm = TermManager::new();
        let x = tm.declare_const("x", tm.sorts.int_sort);
        let zero = tm.mk_int(0);
        let le = tm.mk_le(x, zero);
        let not = tm.mk_not(le);
        assert_eq!(tm.display(not), "(not (<= x 0))");
    }

    #[test]
    fn test_define_fun_substitution() {
        let mut tm = TermManager::new();
        let int = tm.sorts.int_sort;
        let u = tm.declare_const("u", int);
        let body = tm.mk_app(Op::Add, &[u, u]);
        let double = tm.define_fun("double", vec![u], int, body);
        let def = tm.func(double).definition.as_ref().expect("definition");
        assert_eq!(def.formals.len(), 1);
        assert_eq!(def.formals[0], u);
        let three = tm.mk_int(3);
        let mut map = rustc_hash::FxHashMap::default();
        map.insert(u, three);
        let expanded = tm.substitute(body, &map);
        let expected = tm.mk_app(Op::Add, &[three, three]);
        assert_eq!(expanded, expected);
        // untouched terms come back unchanged
        let x = tm.declare_const("x", int);
        assert_eq!(tm.substitute(x, &map), x);
    }
}
