//! Specifiers and the resolver.
//!
//! A `Spec` is a composable description of one generated value: a constant,
//! a container of further specifiers, or a stateful generator. `resolve` is
//! the single dispatch that turns a specifier into a concrete [`Value`],
//! invoking generators with whatever context the call site supplies (the
//! already-resolved prefix of an argument tuple, or an element index).

use crate::value::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A stateful zero-argument generator. The slice carries resolution
/// context; most generators ignore it.
pub type GenFn = dyn FnMut(&[Value]) -> Value;

/// A value specifier.
///
/// Cloning a `Gen` shares its private state: a `sequence` specifier keeps
/// one cursor no matter how many signatures it appears in.
#[derive(Clone)]
pub enum Spec {
    /// A constant; resolves to itself.
    Value(Value),
    /// An ordered container of specifiers; resolves elementwise to an array.
    List(Vec<Spec>),
    /// An object-shaped container; resolves each field value per call.
    Record(Vec<(String, Spec)>),
    /// A generator invoked once per resolution.
    Gen(Rc<RefCell<GenFn>>),
}

impl Spec {
    pub fn gen(f: impl FnMut(&[Value]) -> Value + 'static) -> Spec {
        Spec::Gen(Rc::new(RefCell::new(f)))
    }
}

impl fmt::Debug for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Spec::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Spec::List(items) => f.debug_tuple("List").field(items).finish(),
            Spec::Record(fields) => f.debug_tuple("Record").field(fields).finish(),
            Spec::Gen(_) => f.write_str("Gen(..)"),
        }
    }
}

/// Resolve a specifier to a concrete value.
///
/// Constants pass through unchanged, so resolution is idempotent on
/// anything that is not a generator.
pub fn resolve(spec: &Spec, ctx: &[Value]) -> Value {
    match spec {
        Spec::Value(v) => v.clone(),
        Spec::List(items) => Value::Array(items.iter().map(|item| resolve(item, ctx)).collect()),
        Spec::Record(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, field)| (key.clone(), resolve(field, ctx)))
                .collect(),
        ),
        Spec::Gen(f) => (f.borrow_mut())(ctx),
    }
}

impl From<Value> for Spec {
    fn from(v: Value) -> Spec {
        Spec::Value(v)
    }
}

impl From<bool> for Spec {
    fn from(b: bool) -> Spec {
        Spec::Value(Value::Bool(b))
    }
}

impl From<i32> for Spec {
    fn from(n: i32) -> Spec {
        Spec::Value(Value::Int(n as i64))
    }
}

impl From<i64> for Spec {
    fn from(n: i64) -> Spec {
        Spec::Value(Value::Int(n))
    }
}

impl From<f64> for Spec {
    fn from(x: f64) -> Spec {
        Spec::Value(Value::Float(x))
    }
}

impl From<char> for Spec {
    fn from(c: char) -> Spec {
        Spec::Value(Value::Char(c))
    }
}

impl From<&str> for Spec {
    fn from(s: &str) -> Spec {
        Spec::Value(Value::String(s.to_string()))
    }
}

impl From<String> for Spec {
    fn from(s: String) -> Spec {
        Spec::Value(Value::String(s))
    }
}

impl From<Vec<Spec>> for Spec {
    fn from(items: Vec<Spec>) -> Spec {
        Spec::List(items)
    }
}

impl From<Vec<(String, Spec)>> for Spec {
    fn from(fields: Vec<(String, Spec)>) -> Spec {
        Spec::Record(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_resolve_to_themselves() {
        let spec = Spec::from(42i64);
        assert_eq!(resolve(&spec, &[]), Value::Int(42));
        // Idempotent: resolving again changes nothing.
        assert_eq!(resolve(&spec, &[]), Value::Int(42));
        assert_eq!(resolve(&Spec::Value(Value::Null), &[]), Value::Null);
    }

    #[test]
    fn generators_are_invoked_with_context() {
        let spec = Spec::gen(|ctx| ctx.first().cloned().unwrap_or(Value::Null));
        assert_eq!(resolve(&spec, &[Value::Int(9)]), Value::Int(9));
        assert_eq!(resolve(&spec, &[]), Value::Null);
    }

    #[test]
    fn lists_resolve_elementwise() {
        let mut calls = 0;
        let spec = Spec::List(vec![
            Spec::from(1i64),
            Spec::gen(move |_| {
                calls += 1;
                Value::Int(calls)
            }),
        ]);
        assert_eq!(
            resolve(&spec, &[]),
            Value::Array(vec![Value::Int(1), Value::Int(1)])
        );
        assert_eq!(
            resolve(&spec, &[]),
            Value::Array(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn records_resolve_field_values() {
        let spec = Spec::Record(vec![
            ("a".to_string(), Spec::from(true)),
            ("b".to_string(), Spec::gen(|_| Value::Int(5))),
        ]);
        assert_eq!(
            resolve(&spec, &[]),
            Value::Object(vec![
                ("a".to_string(), Value::Bool(true)),
                ("b".to_string(), Value::Int(5)),
            ])
        );
    }

    #[test]
    fn cloned_generators_share_state() {
        let mut n = 0;
        let spec = Spec::gen(move |_| {
            n += 1;
            Value::Int(n)
        });
        let twin = spec.clone();
        assert_eq!(resolve(&spec, &[]), Value::Int(1));
        assert_eq!(resolve(&twin, &[]), Value::Int(2));
    }
}
