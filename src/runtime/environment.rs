use core::fmt;
use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{
    stack::ensure_sufficient_stack,
    value::{List, Symbol, Value},
};

use super::{Error, Interpreter};

/// Frames are shared, closures keep the frame they were made in alive
pub type Env = Rc<Environment>;

/// Environments map symbols to values, with up to 1 reference to a parent
/// environment consulted on a miss.
#[derive(Default)]
pub struct Environment {
    parent: Option<Env>,
    values: RefCell<HashMap<Symbol, Value>>,
}

impl Environment {
    pub fn root() -> Env {
        Rc::new(Self::default())
    }

    pub fn new_frame(parent: &Env) -> Env {
        Rc::new(Self {
            parent: Some(parent.clone()),
            values: RefCell::default(),
        })
    }

    /// Walks outward until a frame binds `name`
    pub fn get(&self, name: Symbol) -> Option<Value> {
        let mut frame = self;
        loop {
            if let Some(value) = frame.values.borrow().get(&name) {
                return Some(value.clone());
            }
            frame = frame.parent.as_deref()?;
        }
    }

    /// Binds in this frame only, returning what was shadowed here
    pub fn define(&self, name: Symbol, value: Value) -> Option<Value> {
        self.values.borrow_mut().insert(name, value)
    }

    /// Every binding made in this frame, ignoring the parents
    pub(crate) fn bindings(&self) -> Vec<(Symbol, Value)> {
        self.values
            .borrow()
            .iter()
            .map(|(name, value)| (*name, value.clone()))
            .collect()
    }

    // Closures stored in a frame hold the frame itself, drop those edges
    pub(crate) fn clear(&self) {
        let values = std::mem::take(&mut *self.values.borrow_mut());
        drop(values);
    }

    /// Binds `pattern` against `value` in this frame.
    ///
    /// A symbol binds directly. A list pattern walks the value element by
    /// element; missing elements bind `nil`, and `rest_marker` binds the
    /// pattern after it to the remaining elements as a sequence.
    pub fn destructure(&self, pattern: &Value, value: Value, rest_marker: Symbol) -> Result<(), Error> {
        match pattern {
            Value::Symbol(name) => {
                self.define(*name, value);
                Ok(())
            }
            Value::List(elements) => {
                let items: &[Value] = match &value {
                    Value::List(list) => list.items(),
                    Value::Nil => &[],
                    other => {
                        return Err(Error::Pattern(
                            format!("cannot destructure a {} against a list pattern", other.type_name())
                                .into(),
                        ))
                    }
                };
                let elements = elements.items();
                for (index, element) in elements.iter().enumerate() {
                    if element.as_symbol() == Some(rest_marker) {
                        let Some(rest) = elements.get(index + 1) else {
                            return Err(Error::Pattern("`&` must be followed by a pattern".into()));
                        };
                        let tail = items.get(index..).unwrap_or_default();
                        return ensure_sufficient_stack(|| {
                            self.destructure(rest, Value::List(List::sequence(tail)), rest_marker)
                        });
                    }
                    let item = items.get(index).cloned().unwrap_or_default();
                    ensure_sufficient_stack(|| self.destructure(element, item, rest_marker))?;
                }
                Ok(())
            }
            other => Err(Error::Pattern(
                format!("a {} cannot be used as a binding pattern", other.type_name()).into(),
            )),
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("bindings", &self.values.borrow().len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Interpreter {
    /// Builds one frame off `parent` from flat `pattern expr` pairs, in order.
    /// Each expr sees the bindings made before it when `evaluate` is set.
    pub fn bind(&self, pairs: &[Value], parent: &Env, evaluate: bool) -> Result<Env, Error> {
        if pairs.len() % 2 != 0 {
            return Err(Error::invalid_form(
                "binding list",
                format!("expected pattern/value pairs, got {} forms", pairs.len()),
            ));
        }
        let frame = Environment::new_frame(parent);
        for pair in pairs.chunks_exact(2) {
            let value = if evaluate {
                self.evaluate(&pair[1], &frame)?
            } else {
                pair[1].clone()
            };
            frame.destructure(&pair[0], value, self.symbols().ampersand)?;
        }
        Ok(frame)
    }
}
