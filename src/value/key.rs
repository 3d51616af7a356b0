use std::hash::{Hash, Hasher};

use super::Value;
use crate::stack::ensure_sufficient_stack;

/// A value used as a hash-map key or set element.
///
/// Equality is [`Value`]'s structural equality; hashing agrees with it, so
/// `0` and `-0` land on the same entry and lists hash by their elements.
#[derive(Debug, Clone)]
pub struct Key(Value);

impl Key {
    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(&self.0, state)
    }
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Nil => 0u8.hash(state),
        Value::Bool(b) => {
            1u8.hash(state);
            b.hash(state);
        }
        Value::Number(n) => {
            2u8.hash(state);
            let canonical = if n.is_nan() {
                f64::NAN
            } else if *n == 0.0 {
                0.0
            } else {
                *n
            };
            canonical.to_bits().hash(state);
        }
        Value::String(s) => {
            3u8.hash(state);
            s.hash(state);
        }
        Value::Symbol(s) => {
            4u8.hash(state);
            s.hash(state);
        }
        Value::List(list) => {
            5u8.hash(state);
            list.len().hash(state);
            for item in list.items() {
                ensure_sufficient_stack(|| hash_value(item, state));
            }
        }
        // equal maps and sets may iterate in different orders
        Value::HashMap(map) => {
            6u8.hash(state);
            map.len().hash(state);
        }
        Value::Set(set) => {
            7u8.hash(state);
            set.len().hash(state);
        }
        Value::Regex(regex) => {
            8u8.hash(state);
            regex.pattern().hash(state);
        }
        Value::Atom(atom) => {
            9u8.hash(state);
            atom.addr().hash(state);
        }
        Value::Callable(callable) | Value::Macro(callable) => {
            10u8.hash(state);
            callable.addr().hash(state);
        }
        Value::Recur(values) => {
            11u8.hash(state);
            for item in values.iter() {
                ensure_sufficient_stack(|| hash_value(item, state));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Key;
    use crate::value::{Set, Value};
    use assert2::check;

    #[test]
    fn keys_compare_by_value() {
        let mut set = Set::new();
        check!(set.insert(Key::from(Value::Number(0.0))));
        check!(!set.insert(Key::from(Value::Number(-0.0))));
        check!(set.insert(Key::from(Value::sequence(vec![Value::Number(1.0)]))));
        check!(!set.insert(Key::from(Value::invocation(vec![Value::Number(1.0)]))));
        check!(set.insert(Key::from(Value::string("1"))));
        check!(set.len() == 3);
    }

    fn nested(depth: usize) -> Value {
        (0..depth).fold(Value::Nil, |inner, _| Value::invocation(vec![inner]))
    }

    #[test]
    fn deep_lists_hash_and_compare() {
        let mut set = Set::new();
        check!(set.insert(Key::from(nested(200_000))));
        check!(!set.insert(Key::from(nested(200_000))));
        check!(set.insert(Key::from(nested(199_999))));
        check!(set.len() == 2);
    }
}
