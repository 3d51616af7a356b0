//! Representation of runtime values
use core::fmt;
use std::{cell::RefCell, mem, rc::Rc};

use indexmap::{IndexMap, IndexSet};
use regex::{Regex, RegexBuilder};

use crate::{runtime::Callable, stack::ensure_sufficient_stack};

pub use key::Key;

mod key;

/// Symbols are interned, see [`crate::Interpreter::intern`]
pub type Symbol = lasso::Spur;
/// Insertion-ordered mapping, keys compared by value
pub type Map = IndexMap<Key, Value>;
/// Insertion-ordered set, elements compared by value
pub type Set = IndexSet<Key>;

/// How a list behaves when it is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    /// `(f a b)`: the head is applied to the evaluated tail
    Invocation,
    /// `[a b]`: every element is evaluated, none is applied
    Sequence,
}

#[derive(Debug, Clone)]
pub struct List {
    kind: ListKind,
    items: Rc<[Value]>,
}

impl List {
    pub fn new(kind: ListKind, items: impl Into<Rc<[Value]>>) -> Self {
        Self {
            kind,
            items: items.into(),
        }
    }

    pub fn invocation(items: impl Into<Rc<[Value]>>) -> Self {
        Self::new(ListKind::Invocation, items)
    }

    pub fn sequence(items: impl Into<Rc<[Value]>>) -> Self {
        Self::new(ListKind::Sequence, items)
    }

    pub fn kind(&self) -> ListKind {
        self.kind
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// A new list of the same kind holding `items`
    pub fn with_items(&self, items: impl Into<Rc<[Value]>>) -> Self {
        Self::new(self.kind, items)
    }
}

/// Lists built by a loop can nest far deeper than the native stack allows,
/// so the last owner takes nested collections apart one level at a time.
impl Drop for List {
    fn drop(&mut self) {
        let mut pending = vec![];
        detach_nested(&mut self.items, &mut pending);
        while let Some(value) = pending.pop() {
            match value {
                Value::List(mut list) => detach_nested(&mut list.items, &mut pending),
                Value::Recur(mut items) => detach_nested(&mut items, &mut pending),
                Value::HashMap(mut map) => {
                    if let Some(map) = Rc::get_mut(&mut map) {
                        for (key, value) in map.drain(..) {
                            pending.extend([key.into_value(), value].into_iter().filter(Value::is_collection));
                        }
                    }
                }
                Value::Set(mut set) => {
                    if let Some(set) = Rc::get_mut(&mut set) {
                        pending.extend(set.drain(..).map(Key::into_value).filter(Value::is_collection));
                    }
                }
                _ => {}
            }
        }
    }
}

/// Moves the collections held by `items` onto `pending` when nothing else shares them
fn detach_nested(items: &mut Rc<[Value]>, pending: &mut Vec<Value>) {
    if let Some(items) = Rc::get_mut(items) {
        pending.extend(items.iter_mut().filter(|item| item.is_collection()).map(mem::take));
    }
}

/// A single mutable cell. Cloning an atom aliases it.
#[derive(Clone, Default)]
pub struct Atom(Rc<RefCell<Value>>);

impl Atom {
    pub fn new(value: Value) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    pub fn get(&self) -> Value {
        self.0.borrow().clone()
    }

    /// Replaces the held value, returning the previous one
    pub fn replace(&self, value: Value) -> Value {
        self.0.replace(value)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<atom {:p}>", self.0)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RegexError {
    #[error("unknown regex flag `{0}`")]
    Flag(char),
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

/// A regex compiled when its literal is read
#[derive(Clone)]
pub struct RegexValue {
    pattern: Box<str>,
    flags: Box<str>,
    regex: Regex,
}

impl RegexValue {
    pub fn new(pattern: &str, flags: &str) -> Result<Self, RegexError> {
        let mut builder = RegexBuilder::new(pattern);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                // global/sticky/unicode only change how a match is driven, or are always on
                'g' | 'y' | 'u' => &mut builder,
                other => return Err(RegexError::Flag(other)),
            };
        }
        Ok(Self {
            pattern: Box::from(pattern),
            flags: Box::from(flags),
            regex: builder.build()?,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl fmt::Debug for RegexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}\"{}\"", self.flags, self.pattern)
    }
}

// Type that stores all possible values!
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    // a quoted literal, never resolved as a variable
    String(Rc<str>),
    Symbol(Symbol),
    List(List),
    HashMap(Rc<Map>),
    Set(Rc<Set>),
    Regex(Rc<RegexValue>),
    Atom(Atom),
    Callable(Callable),
    // the same callable, but run over unevaluated forms before evaluation
    Macro(Callable),
    // produced by `recur`, consumed by the nearest `loop`
    Recur(Rc<[Value]>),
}

impl Value {
    pub fn string(text: impl AsRef<str>) -> Self {
        Self::String(Rc::from(text.as_ref()))
    }

    pub fn invocation(items: impl Into<Rc<[Value]>>) -> Self {
        Self::List(List::invocation(items))
    }

    pub fn sequence(items: impl Into<Rc<[Value]>>) -> Self {
        Self::List(List::sequence(items))
    }

    pub fn map(map: Map) -> Self {
        Self::HashMap(Rc::new(map))
    }

    /// Only `false` and `nil` are falsy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::HashMap(_) | Self::Set(_) | Self::Recur(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            Self::Symbol(symbol) => Some(*symbol),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::List(_) => "list",
            Self::HashMap(_) => "hash-map",
            Self::Set(_) => "set",
            Self::Regex(_) => "regex",
            Self::Atom(_) => "atom",
            Self::Callable(_) => "function",
            Self::Macro(_) => "macro",
            Self::Recur(_) => "recur",
        }
    }
}

fn same_number(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Structural equality. Lists compare by elements regardless of kind, and
/// reference values (atoms, callables) compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        ensure_sufficient_stack(|| self.eq_shallow(other))
    }
}

impl Value {
    fn eq_shallow(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => same_number(*a, *b),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::List(a), Self::List(b)) => a.items() == b.items(),
            (Self::HashMap(a), Self::HashMap(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => a == b,
            (Self::Regex(a), Self::Regex(b)) => a.pattern == b.pattern && a.flags == b.flags,
            (Self::Atom(a), Self::Atom(b)) => a.ptr_eq(b),
            (Self::Callable(a), Self::Callable(b)) | (Self::Macro(a), Self::Macro(b)) => {
                a.ptr_eq(b)
            }
            (Self::Recur(a), Self::Recur(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<Callable> for Value {
    fn from(value: Callable) -> Self {
        Self::Callable(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Atom, Key, Map, RegexError, RegexValue, Value};
    use assert2::{check, let_assert};

    #[test]
    fn truthiness() {
        check!(!Value::Nil.is_truthy());
        check!(!Value::Bool(false).is_truthy());
        check!(Value::Bool(true).is_truthy());
        check!(Value::Number(0.0).is_truthy());
        check!(Value::string("").is_truthy());
        check!(Value::sequence(vec![]).is_truthy());
    }

    #[test]
    fn lists_compare_by_elements() {
        let items = vec![Value::Number(1.0), Value::string("a")];
        check!(Value::invocation(items.clone()) == Value::sequence(items));
        check!(Value::sequence(vec![Value::Nil]) != Value::sequence(vec![]));
    }

    #[test]
    fn maps_compare_by_value() {
        let mut a = Map::new();
        a.insert(Key::from(Value::string("x")), Value::Number(1.0));
        a.insert(Key::from(Value::Number(2.0)), Value::Nil);
        let mut b = Map::new();
        b.insert(Key::from(Value::Number(2.0)), Value::Nil);
        b.insert(Key::from(Value::string("x")), Value::Number(1.0));
        check!(Value::map(a.clone()) == Value::map(b));
        check!(a.get(&Key::from(Value::string("x"))) == Some(&Value::Number(1.0)));
    }

    #[test]
    fn deep_values_drop_and_compare() {
        let depth = 200_000;
        let nested = (0..depth).fold(Value::Nil, |inner, level| {
            if level % 2 == 0 {
                Value::invocation(vec![inner])
            } else {
                let mut map = Map::new();
                map.insert(Key::from(Value::string("next")), inner);
                Value::sequence(vec![Value::map(map)])
            }
        });
        let shared = nested.clone();
        check!(nested == shared);
        drop(nested);
        let_assert!(Value::List(outer) = &shared);
        check!(outer.len() == 1);
        drop(shared);
    }

    #[test]
    fn atoms_alias() {
        let atom = Atom::new(Value::Number(1.0));
        let alias = atom.clone();
        check!(alias.replace(Value::Number(2.0)) == Value::Number(1.0));
        check!(atom.get() == Value::Number(2.0));
        check!(Value::Atom(atom) == Value::Atom(alias));
        check!(Value::Atom(Atom::default()) != Value::Atom(Atom::default()));
    }

    #[test]
    fn regex_flags() {
        let_assert!(Ok(regex) = RegexValue::new("^abc$", "i"));
        check!(regex.regex().is_match("ABC"));
        let_assert!(Err(RegexError::Flag('q')) = RegexValue::new("a", "q"));
        let_assert!(Err(RegexError::Pattern(_)) = RegexValue::new("(", ""));
    }
}
