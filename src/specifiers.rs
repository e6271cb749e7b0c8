//! The specifier combinator library.
//!
//! Every combinator is a method on [`Checker`] so the produced generators
//! share the checker's randomness (and, for the unbounded `integer`, its
//! per-run prime state). Combinators accept `impl Into<Spec>` wherever a
//! plain value or a specifier is accepted, so arguments compose to
//! arbitrary depth.

use crate::engine::Checker;
use crate::error::SpecError;
use crate::spec::{resolve, Spec};
use crate::value::Value;
use rand::Rng;
use std::convert::TryFrom;
use std::rc::Rc;

fn char_from_code(code: i64) -> Value {
    let c = u32::try_from(code)
        .ok()
        .and_then(std::char::from_u32)
        .unwrap_or('\u{FFFD}');
    Value::Char(c)
}

impl Checker {
    /// A constant specifier: resolves to `value` every time.
    pub fn literal(&self, value: impl Into<Value>) -> Spec {
        Spec::Value(value.into())
    }

    /// A fair boolean.
    pub fn boolean(&self) -> Spec {
        self.boolean_biased(0.5)
    }

    /// True with probability `bias`.
    pub fn boolean_biased(&self, bias: f64) -> Spec {
        let rng = Rc::clone(&self.rng);
        Spec::gen(move |_| Value::Bool(rng.borrow_mut().gen::<f64>() < bias))
    }

    /// The unbounded integer specifier: a deterministic enumerator of
    /// successive primes. Within one run the values are strictly
    /// increasing and never repeat, which makes them usable as
    /// collision-free tags; the state resets at the start of each claim's
    /// generation loop.
    pub fn integer(&self) -> Spec {
        let primes = Rc::clone(&self.primes);
        Spec::gen(move |_| Value::Int(primes.borrow_mut().next_prime() as i64))
    }

    /// Uniform integer in `[1, n]`.
    pub fn integer_to(&self, n: impl Into<Spec>) -> Spec {
        self.integer_range(1, n)
    }

    /// Uniform integer in `[min(i, j), max(i, j)]`, bounds inclusive.
    /// Bounds are resolved and integer-coerced once, at build time; equal
    /// bounds collapse to a constant.
    pub fn integer_range(&self, i: impl Into<Spec>, j: impl Into<Spec>) -> Spec {
        let i = resolve(&i.into(), &[]).as_int().unwrap_or(0);
        let j = resolve(&j.into(), &[]).as_int().unwrap_or(0);
        let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
        if lo == hi {
            return Spec::Value(Value::Int(lo));
        }
        let rng = Rc::clone(&self.rng);
        Spec::gen(move |_| Value::Int(rng.borrow_mut().gen_range(lo..=hi)))
    }

    /// Uniform real in `[0, j)`; `j == 0` falls back to `[0, 1)`.
    pub fn number_to(&self, j: f64) -> Spec {
        if j == 0.0 {
            self.number(0.0, 1.0)
        } else {
            self.number(0.0, j)
        }
    }

    /// Uniform real in `[min(i, j), max(i, j))`; equal bounds collapse to
    /// a constant. A non-finite lower bound is taken as zero; a non-finite
    /// upper bound falls back to `[0, i)`.
    pub fn number(&self, i: impl Into<Spec>, j: impl Into<Spec>) -> Spec {
        let mut i = resolve(&i.into(), &[]).as_float().unwrap_or(0.0);
        let mut j = resolve(&j.into(), &[]).as_float().unwrap_or(0.0);
        if !i.is_finite() {
            i = 0.0;
        }
        if !j.is_finite() {
            j = i;
            i = 0.0;
        }
        let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
        if lo == hi {
            return Spec::Value(Value::Float(lo));
        }
        let rng = Rc::clone(&self.rng);
        Spec::gen(move |_| Value::Float(rng.borrow_mut().gen_range(lo..hi)))
    }

    /// A single character with the given code point (resolved and coerced
    /// per call; a string coerces to its first character's code).
    pub fn character(&self, code: impl Into<Spec>) -> Spec {
        let code = code.into();
        Spec::gen(move |ctx| char_from_code(resolve(&code, ctx).as_int().unwrap_or(0)))
    }

    /// A single character with a code point uniform in `[i, j]`.
    pub fn character_range(&self, i: impl Into<Spec>, j: impl Into<Spec>) -> Spec {
        let codes = self.integer_range(i, j);
        Spec::gen(move |ctx| char_from_code(resolve(&codes, ctx).as_int().unwrap_or(0)))
    }

    /// The quoted/escaped JSON rendering of the resolved value, useful for
    /// embedding arbitrary generated structures as display strings.
    pub fn string(&self, value: impl Into<Spec>) -> Spec {
        let value = value.into();
        Spec::gen(move |ctx| Value::String(resolve(&value, ctx).to_json()))
    }

    /// An array specifier's elements joined into one string (unquoted
    /// element rendering).
    pub fn string_of(&self, dimension: impl Into<Spec>, value: impl Into<Spec>) -> Spec {
        let elements = self.array(dimension, value);
        Spec::gen(move |ctx| match resolve(&elements, ctx) {
            Value::Array(items) => {
                Value::String(items.iter().map(|item| item.to_string()).collect())
            }
            other => Value::String(other.to_string()),
        })
    }

    /// An array. An array-shaped `dimension` (a list of specifiers or a
    /// literal array) resolves elementwise, ignoring `value`; otherwise
    /// `dimension` resolves to a count and each of the `value` elements is
    /// resolved with its index as context, enabling index-dependent
    /// generation.
    pub fn array(&self, dimension: impl Into<Spec>, value: impl Into<Spec>) -> Spec {
        let dimension = dimension.into();
        let value = value.into();
        if let Spec::Value(Value::Array(items)) = dimension {
            // Already concrete; elementwise resolution is the identity.
            return Spec::Value(Value::Array(items));
        }
        if let Spec::List(items) = dimension {
            return Spec::gen(move |ctx| {
                Value::Array(items.iter().map(|item| resolve(item, ctx)).collect())
            });
        }
        Spec::gen(move |ctx| {
            let count = match resolve(&dimension, ctx).as_int() {
                Some(n) if n > 0 => n as usize,
                _ => 0,
            };
            let mut result = Vec::with_capacity(count);
            for index in 0..count {
                result.push(resolve(&value, &[Value::Int(index as i64)]));
            }
            Value::Array(result)
        })
    }

    /// An object whose property values are resolved per call. Anything
    /// that does not resolve to an object yields `Null`.
    pub fn object(&self, keys: impl Into<Spec>) -> Spec {
        let keys = keys.into();
        Spec::gen(move |ctx| match resolve(&keys, ctx) {
            Value::Object(fields) => Value::Object(fields),
            _ => Value::Null,
        })
    }

    /// An object built from a resolved array of keys. A list-shaped
    /// `values` is cycled by index modulo its length, each selected
    /// element resolved with the wrapped index as context; otherwise
    /// `values` is resolved once and an array result is cycled, anything
    /// else being re-resolved per key. Non-array keys yield `Null`.
    pub fn object_with(&self, keys: impl Into<Spec>, values: impl Into<Spec>) -> Spec {
        let keys = keys.into();
        let values = values.into();
        Spec::gen(move |ctx| {
            let key_list = match resolve(&keys, ctx) {
                Value::Array(items) => items,
                _ => return Value::Null,
            };
            let pool = match &values {
                Spec::List(_) => None,
                other => Some(resolve(other, ctx)),
            };
            let mut fields = Vec::with_capacity(key_list.len());
            for (index, key) in key_list.into_iter().enumerate() {
                let value = match (&values, &pool) {
                    (Spec::List(items), _) if !items.is_empty() => {
                        let k = index % items.len();
                        resolve(&items[k], &[Value::Int(k as i64)])
                    }
                    (Spec::List(_), _) => Value::Null,
                    (_, Some(Value::Array(pool))) if !pool.is_empty() => {
                        pool[index % pool.len()].clone()
                    }
                    (other, _) => resolve(other, &[Value::Int(index as i64)]),
                };
                fields.push((key.to_string(), value));
            }
            Value::Object(fields)
        })
    }

    /// Uniform selection. A string yields one of its characters; a list or
    /// array yields one element, resolved. Empty or non-collection input
    /// is a build-time contract violation.
    pub fn one_of(&self, collection: impl Into<Spec>) -> Result<Spec, SpecError> {
        let rng = Rc::clone(&self.rng);
        match collection.into() {
            Spec::Value(Value::String(s)) if !s.is_empty() => {
                let chars: Vec<char> = s.chars().collect();
                Ok(Spec::gen(move |_| {
                    let k = rng.borrow_mut().gen_range(0..chars.len());
                    Value::Char(chars[k])
                }))
            }
            Spec::Value(Value::Array(items)) if !items.is_empty() => Ok(Spec::gen(move |_| {
                let k = rng.borrow_mut().gen_range(0..items.len());
                items[k].clone()
            })),
            Spec::List(items) if !items.is_empty() => Ok(Spec::gen(move |ctx| {
                let k = rng.borrow_mut().gen_range(0..items.len());
                resolve(&items[k], ctx)
            })),
            _ => Err(SpecError::EmptyChoices),
        }
    }

    /// Weighted selection over parallel item and weight lists. Weights
    /// need not sum to one; they are normalized into a cumulative
    /// partition of `[0, 1)`.
    pub fn one_of_weighted(
        &self,
        items: Vec<Spec>,
        weights: &[f64],
    ) -> Result<Spec, SpecError> {
        if items.is_empty() {
            return Err(SpecError::EmptyChoices);
        }
        if items.len() != weights.len() {
            return Err(SpecError::WeightMismatch {
                choices: items.len(),
                weights: weights.len(),
            });
        }
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) {
            return Err(SpecError::NonPositiveWeights);
        }
        let mut base = 0.0;
        let cumulative: Vec<f64> = weights
            .iter()
            .map(|w| {
                base += w / total;
                base
            })
            .collect();
        let rng = Rc::clone(&self.rng);
        let last = items.len() - 1;
        Ok(Spec::gen(move |ctx| {
            let x = rng.borrow_mut().gen::<f64>();
            for (k, bound) in cumulative.iter().enumerate().take(last) {
                if x < *bound {
                    return resolve(&items[k], ctx);
                }
            }
            resolve(&items[last], ctx)
        }))
    }

    /// Cycles through the items in order, resolving the current one, and
    /// wraps after the last. The cursor is private to the specifier.
    pub fn sequence(&self, items: Vec<Spec>) -> Spec {
        let mut cursor = 0usize;
        Spec::gen(move |ctx| {
            if items.is_empty() {
                return Value::Null;
            }
            let item = &items[cursor];
            cursor = (cursor + 1) % items.len();
            resolve(item, ctx)
        })
    }
}
