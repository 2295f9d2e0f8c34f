//! Models.
//!
//! A model maps the relevant leaf terms (numeric variables, predicate
//! and function applications, array reads) to values; interpreted
//! structure on top is evaluated on demand. Numeric values are exact
//! rationals with the model epsilon already folded in.

use num_rational::BigRational;
use rustc_hash::FxHashMap;
use silex_core::{Op, TermId, TermKind, TermManager};
use silex_math::Rational;

/// A model value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A Boolean.
    Bool(bool),
    /// An exact rational.
    Num(Rational),
    /// An element of an uninterpreted (or array) domain, named by its
    /// congruence class.
    Abstract(u32),
}

/// A finished model.
#[derive(Debug, Default)]
pub struct Model {
    values: FxHashMap<TermId, Value>,
}

impl Model {
    pub(crate) fn insert(&mut self, term: TermId, value: Value) {
        self.values.insert(term, value);
    }

    /// The stored value of a leaf term.
    pub fn value(&self, term: TermId) -> Option<&Value> {
        self.values.get(&term)
    }

    /// Evaluate a term under this model. Returns `None` when a leaf has
    /// no recorded value.
    pub fn eval(&self, tm: &TermManager, term: TermId) -> Option<Value> {
        if let Some(v) = self.values.get(&term) {
            return Some(v.clone());
        }
        match tm.kind(term) {
            TermKind::True => Some(Value::Bool(true)),
            TermKind::False => Some(Value::Bool(false)),
            TermKind::Const(q) => Some(Value::Num(Rational::Finite(q.clone()))),
            TermKind::Quoted(inner, _) => self.eval(tm, *inner),
            TermKind::App(op, args) => {
                let args: Vec<TermId> = args.to_vec();
                self.eval_app(tm, op.clone(), &args)
            }
        }
    }

    fn eval_app(&self, tm: &TermManager, op: Op, args: &[TermId]) -> Option<Value> {
        match op {
            Op::Not => match self.eval(tm, args[0])? {
                Value::Bool(b) => Some(Value::Bool(!b)),
                _ => None,
            },
            Op::Or => {
                let mut any = false;
                for &a in args {
                    match self.eval(tm, a)? {
                        Value::Bool(true) => any = true,
                        Value::Bool(false) => {}
                        _ => return None,
                    }
                }
                Some(Value::Bool(any))
            }
            Op::And => {
                let mut all = true;
                for &a in args {
                    match self.eval(tm, a)? {
                        Value::Bool(b) => all &= b,
                        _ => return None,
                    }
                }
                Some(Value::Bool(all))
            }
            Op::Implies => {
                let mut value = self.eval_bool(tm, args[args.len() - 1])?;
                for &a in args[..args.len() - 1].iter().rev() {
                    value = !self.eval_bool(tm, a)? || value;
                }
                Some(Value::Bool(value))
            }
            Op::Xor => {
                let a = self.eval_bool(tm, args[0])?;
                let b = self.eval_bool(tm, args[1])?;
                Some(Value::Bool(a ^ b))
            }
            Op::Ite => {
                if self.eval_bool(tm, args[0])? {
                    self.eval(tm, args[1])
                } else {
                    self.eval(tm, args[2])
                }
            }
            Op::Eq => {
                let first = self.eval(tm, args[0])?;
                for &a in &args[1..] {
                    if self.eval(tm, a)? != first {
                        return Some(Value::Bool(false));
                    }
                }
                Some(Value::Bool(true))
            }
            Op::Distinct => {
                let mut seen: Vec<Value> = Vec::new();
                for &a in args {
                    let v = self.eval(tm, a)?;
                    if seen.contains(&v) {
                        return Some(Value::Bool(false));
                    }
                    seen.push(v);
                }
                Some(Value::Bool(true))
            }
            Op::Le | Op::Lt | Op::Ge | Op::Gt => {
                let a = self.eval_num(tm, args[0])?;
                let b = self.eval_num(tm, args[1])?;
                let holds = match op {
                    Op::Le => a <= b,
                    Op::Lt => a < b,
                    Op::Ge => a >= b,
                    _ => a > b,
                };
                Some(Value::Bool(holds))
            }
            Op::Add => {
                let mut sum = Rational::zero();
                for &a in args {
                    sum = &sum + &self.eval_num(tm, a)?;
                }
                Some(Value::Num(sum))
            }
            Op::Sub => {
                let mut value = self.eval_num(tm, args[0])?;
                if args.len() == 1 {
                    return Some(Value::Num(-&value));
                }
                for &a in &args[1..] {
                    value = &value - &self.eval_num(tm, a)?;
                }
                Some(Value::Num(value))
            }
            Op::Mul => {
                let mut prod = Rational::one();
                for &a in args {
                    prod = &prod * &self.eval_num(tm, a)?;
                }
                Some(Value::Num(prod))
            }
            Op::Divide => {
                let a = self.eval_num(tm, args[0])?;
                let b = self.eval_num(tm, args[1])?;
                if b.is_zero() {
                    return None;
                }
                Some(Value::Num(a.div(&b)))
            }
            Op::ToReal => self.eval(tm, args[0]),
            Op::ToInt => {
                let a = self.eval_num(tm, args[0])?;
                Some(Value::Num(a.floor()))
            }
            _ => None,
        }
    }

    fn eval_bool(&self, tm: &TermManager, t: TermId) -> Option<bool> {
        match self.eval(tm, t)? {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    fn eval_num(&self, tm: &TermManager, t: TermId) -> Option<Rational> {
        match self.eval(tm, t)? {
            Value::Num(q) => Some(q),
            _ => None,
        }
    }

    /// Render a value.
    pub fn display_value(value: &Value) -> String {
        match value {
            Value::Bool(b) => b.to_string(),
            Value::Num(q) => q.to_string(),
            Value::Abstract(c) => format!("@class{}", c),
        }
    }
}

/// Convenience: a `BigRational` as a model value.
pub fn num(q: BigRational) -> Value {
    Value::Num(Rational::Finite(q))
}
