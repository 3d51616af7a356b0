//! The runtime evaluates values read from source against chained environments

use core::fmt;
use std::rc::Rc;

use crate::{reader::SyntaxError, value::Value};

pub use environment::{Env, Environment};
pub use interpreter::{run, Interpreter, RunReport};
pub use special_forms::SpecialForm;

pub mod base;
pub mod environment;
pub mod host;
pub mod interpreter;
mod json;
mod quasiquote;
pub mod special_forms;

/// Everything that can abort a run. None of them can be caught from inside
/// the language, they unwind to whoever called the interpreter.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("unbound symbol: {0}")]
    UnboundSymbol(Box<str>),
    #[error("cannot apply {0}")]
    Apply(Box<str>),
    #[error("{name} expects {expected} argument(s), got {got}")]
    Arity {
        name: Box<str>,
        expected: Arity,
        got: usize,
    },
    #[error("{context}: expected {expected}, found {found}")]
    Type {
        context: Box<str>,
        expected: &'static str,
        found: &'static str,
    },
    #[error("invalid argument to {name}: {reason}")]
    Argument { name: Box<str>, reason: Box<str> },
    #[error("{0}")]
    Thrown(Box<str>),
    #[error("malformed {form}: {reason}")]
    InvalidForm { form: &'static str, reason: Box<str> },
    #[error("invalid binding pattern: {0}")]
    Pattern(Box<str>),
    #[error("recur expects {expected} value(s) to match the loop bindings, got {got}")]
    RecurArity { expected: usize, got: usize },
    #[error("maximum evaluation depth of {0} exceeded")]
    DepthExceeded(usize),
    #[error("no script named {0}")]
    MissingScript(Box<str>),
    #[error("host error: {0}")]
    Host(Box<str>),
}

impl Error {
    pub fn type_mismatch(context: &str, expected: &'static str, found: &Value) -> Self {
        Self::Type {
            context: context.into(),
            expected,
            found: found.type_name(),
        }
    }

    pub fn argument(name: &str, reason: impl Into<Box<str>>) -> Self {
        Self::Argument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_form(form: &'static str, reason: impl Into<Box<str>>) -> Self {
        Self::InvalidForm {
            form,
            reason: reason.into(),
        }
    }
}

/// Something the interpreter can invoke with already-evaluated arguments.
#[derive(Clone)]
pub enum Callable {
    Native(NativeProcedure),
    Closure(Rc<Closure>),
}

impl Callable {
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Native(a), Self::Native(b)) => Rc::ptr_eq(&a.0, &b.0),
            (Self::Closure(a), Self::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn addr(&self) -> usize {
        match self {
            Self::Native(native) => Rc::as_ptr(&native.0) as *const () as usize,
            Self::Closure(closure) => Rc::as_ptr(closure) as *const () as usize,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(native) => native.fmt(f),
            Self::Closure(closure) => write!(f, "#<fn {:p}>", Rc::as_ptr(closure)),
        }
    }
}

impl<T: Callback + 'static> From<T> for Callable {
    fn from(value: T) -> Self {
        Self::Native(value.into())
    }
}

/// A closure made by `fn` or `defmacro`
pub struct Closure {
    /// Destructured against the argument list on every call
    pub(crate) params: Value,
    pub(crate) body: Rc<[Value]>,
    pub(crate) env: Env,
}

#[derive(Clone)]
pub struct NativeProcedure(Rc<dyn Callback>);

impl NativeProcedure {
    pub fn name(&self) -> Option<&str> {
        self.0.name()
    }

    pub(crate) fn invoke(&self, interpreter: &Interpreter, args: Vec<Value>) -> Result<Value, Error> {
        let arity = self.0.arity();
        if !arity.is_satisfied(args.len()) {
            return Err(Error::Arity {
                name: self.name().unwrap_or("native procedure").into(),
                expected: arity,
                got: args.len(),
            });
        }
        self.0.call(interpreter, args)
    }
}

impl<T: Callback + 'static> From<T> for NativeProcedure {
    fn from(value: T) -> Self {
        Self(Rc::new(value))
    }
}

impl fmt::Debug for NativeProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.0.name() {
            write!(f, "#<native {name} {:p}>", self.0)
        } else {
            write!(f, "#<native {:p}>", self.0)
        }
    }
}

/// Native code exposed to the language. Calls may re-enter the interpreter,
/// so implementations only get shared access to themselves.
pub trait Callback {
    fn name(&self) -> Option<&str> {
        None
    }
    fn arity(&self) -> Arity;
    fn call(&self, interpreter: &Interpreter, args: Vec<Value>) -> Result<Value, Error>;
}

/// Adapts a plain Rust function or closure into a [`Callback`]
pub struct NativeFn<F> {
    name: Box<str>,
    arity: Arity,
    func: F,
}

impl<F> NativeFn<F>
where
    F: Fn(&Interpreter, Vec<Value>) -> Result<Value, Error>,
{
    pub fn new(name: impl Into<Box<str>>, arity: Arity, func: F) -> Self {
        Self {
            name: name.into(),
            arity,
            func,
        }
    }
}

impl<F> Callback for NativeFn<F>
where
    F: Fn(&Interpreter, Vec<Value>) -> Result<Value, Error>,
{
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn arity(&self) -> Arity {
        self.arity
    }

    fn call(&self, interpreter: &Interpreter, args: Vec<Value>) -> Result<Value, Error> {
        (self.func)(interpreter, args)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Min(usize),
    Between(usize, usize),
}

impl Arity {
    pub fn is_satisfied(&self, count: usize) -> bool {
        match self {
            Self::Exact(n) => count == *n,
            Self::Min(n) => count >= *n,
            Self::Between(min, max) => (*min..=*max).contains(&count),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{n}"),
            Self::Min(n) => write!(f, "at least {n}"),
            Self::Between(min, max) => write!(f, "{min} to {max}"),
        }
    }
}
