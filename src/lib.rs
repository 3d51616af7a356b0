//! A small Lisp meant to be embedded: a host invokes a program once with an
//! input value and collects its textual output.
pub mod lexer;
pub mod options;
pub mod printer;
pub mod reader;
pub mod runtime;
mod stack;
pub mod value;

pub use options::Options;
pub use reader::{read_all, read_one, SyntaxError, SyntaxErrorKind};
pub use runtime::{
    host::{
        DataStore, Host, Interop, LogSink, MemoryDataStore, MemoryLog, MemoryScriptStore, ScriptStore,
        TracingLog, ValueInterop,
    },
    run, Arity, Callable, Callback, Env, Environment, Error, Interpreter, NativeFn, RunReport,
};
pub use value::{Key, List, ListKind, Value};
