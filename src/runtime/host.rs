//! Collaborators supplied by whoever embeds the interpreter: where named
//! scripts come from, a document store, a log, and member access on values.
use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{
    options::CORE_LIBRARY,
    value::{Key, Map, Value},
};

use super::{interpreter::index, Error, Interpreter};

/// Library source bundled with the crate, written in the language itself
pub const CORE_SOURCE: &str = include_str!("core.sprig");

pub trait ScriptStore {
    fn get(&self, name: &str) -> Option<Rc<str>>;
}

#[derive(Debug, Default)]
pub struct MemoryScriptStore {
    scripts: RefCell<HashMap<Box<str>, Rc<str>>>,
}

impl MemoryScriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding just the bundled core library
    pub fn with_core() -> Self {
        let store = Self::new();
        store.insert(CORE_LIBRARY, CORE_SOURCE);
        store
    }

    pub fn insert(&self, name: &str, source: &str) {
        self.scripts.borrow_mut().insert(name.into(), source.into());
    }
}

impl ScriptStore for MemoryScriptStore {
    fn get(&self, name: &str) -> Option<Rc<str>> {
        self.scripts.borrow().get(name).cloned()
    }
}

/// Queries and changes are hash-maps; a document matches a query when every
/// key of the query is present in it with an equal value.
pub trait DataStore {
    fn find(&self, query: &Value, projection: &Value) -> Result<Vec<Value>, Error>;
    fn insert(&self, document: Value) -> Result<Value, Error>;
    /// Returns how many documents changed
    fn update(&self, query: &Value, changes: &Value) -> Result<Value, Error>;
    /// Like update, inserting the query merged with the changes when nothing matched
    fn upsert(&self, query: &Value, changes: &Value) -> Result<Value, Error>;
    /// Returns how many documents were removed
    fn remove(&self, query: &Value) -> Result<Value, Error>;
}

#[derive(Debug, Default)]
pub struct MemoryDataStore {
    documents: RefCell<Vec<Rc<Map>>>,
}

fn as_map<'v>(context: &str, value: &'v Value) -> Result<Option<&'v Map>, Error> {
    match value {
        Value::HashMap(map) => Ok(Some(map)),
        Value::Nil => Ok(None),
        other => Err(Error::type_mismatch(context, "a hash-map", other)),
    }
}

fn matches(document: &Map, query: Option<&Map>) -> bool {
    query.map_or(true, |query| {
        query
            .iter()
            .all(|(key, expected)| document.get(key) == Some(expected))
    })
}

fn merged(document: &Map, changes: &Map) -> Map {
    let mut document = document.clone();
    for (key, value) in changes {
        document.insert(key.clone(), value.clone());
    }
    document
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DataStore for MemoryDataStore {
    fn find(&self, query: &Value, projection: &Value) -> Result<Vec<Value>, Error> {
        let query = as_map("find", query)?;
        let projection = as_map("find", projection)?;
        let documents = self.documents.borrow();
        Ok(documents
            .iter()
            .filter(|document| matches(document, query))
            .map(|document| match projection {
                Some(projection) => Value::map(
                    document
                        .iter()
                        .filter(|(key, _)| projection.get(*key).is_some_and(Value::is_truthy))
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect(),
                ),
                None => Value::HashMap(document.clone()),
            })
            .collect())
    }

    fn insert(&self, document: Value) -> Result<Value, Error> {
        let Value::HashMap(map) = &document else {
            return Err(Error::type_mismatch("insert", "a hash-map", &document));
        };
        self.documents.borrow_mut().push(map.clone());
        Ok(document)
    }

    fn update(&self, query: &Value, changes: &Value) -> Result<Value, Error> {
        let query = as_map("update", query)?;
        let Some(changes) = as_map("update", changes)? else {
            return Ok(Value::Number(0.0));
        };
        let mut count = 0;
        for document in self.documents.borrow_mut().iter_mut() {
            if matches(document, query) {
                *document = Rc::new(merged(document, changes));
                count += 1;
            }
        }
        Ok(Value::Number(count as f64))
    }

    fn upsert(&self, query: &Value, changes: &Value) -> Result<Value, Error> {
        let updated = self.update(query, changes)?;
        if updated != Value::Number(0.0) {
            return Ok(updated);
        }
        let base = as_map("upsert", query)?.cloned().unwrap_or_default();
        let document = match as_map("upsert", changes)? {
            Some(changes) => merged(&base, changes),
            None => base,
        };
        self.documents.borrow_mut().push(Rc::new(document));
        Ok(Value::Number(1.0))
    }

    fn remove(&self, query: &Value) -> Result<Value, Error> {
        let query = as_map("remove", query)?;
        let mut documents = self.documents.borrow_mut();
        let before = documents.len();
        documents.retain(|document| !matches(document, query));
        Ok(Value::Number((before - documents.len()) as f64))
    }
}

pub trait LogSink {
    fn write(&self, text: &str);
}

/// Forwards log lines to `tracing`
#[derive(Debug, Default)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn write(&self, text: &str) {
        tracing::info!(target: "sprig::log", "{text}");
    }
}

/// Keeps every line, handy when a host wants to show them later
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: RefCell<Vec<String>>,
}

impl MemoryLog {
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl LogSink for MemoryLog {
    fn write(&self, text: &str) {
        self.lines.borrow_mut().push(text.to_string());
    }
}

fn unsupported(operation: &str) -> Error {
    Error::Host(format!("{operation} is not supported by this host").into())
}

/// Native-object interop. Only member reads and type names have a meaning
/// over plain values, the rest are left to hosts with real objects.
pub trait Interop {
    fn construct(&self, interpreter: &Interpreter, class: &Value, args: Vec<Value>) -> Result<Value, Error> {
        _ = (interpreter, class, args);
        Err(unsupported("construct"))
    }

    /// `target[member]`, also what `("member" target)` means
    fn get(&self, interpreter: &Interpreter, target: &Value, member: &Value) -> Result<Value, Error> {
        member_of(interpreter, target, member)
    }

    fn set(&self, interpreter: &Interpreter, target: &Value, member: &Value, value: Value) -> Result<Value, Error> {
        _ = (interpreter, target, member, value);
        Err(unsupported("set"))
    }

    fn delete(&self, interpreter: &Interpreter, target: &Value, member: &Value) -> Result<Value, Error> {
        _ = (interpreter, target, member);
        Err(unsupported("delete"))
    }

    fn call_member(
        &self,
        interpreter: &Interpreter,
        target: &Value,
        member: &Value,
        args: Vec<Value>,
    ) -> Result<Value, Error> {
        match self.get(interpreter, target, member)? {
            Value::Callable(callable) => interpreter.call(&callable, args),
            Value::Nil => Err(Error::Host(
                format!("{} has no member {}", target.type_name(), interpreter.print(member, true)).into(),
            )),
            other => Err(Error::type_mismatch("call", "a function", &other)),
        }
    }

    fn type_of(&self, interpreter: &Interpreter, target: &Value) -> Result<Value, Error> {
        _ = interpreter;
        Ok(Value::string(target.type_name()))
    }

    fn instance_of(&self, interpreter: &Interpreter, target: &Value, class: &Value) -> Result<Value, Error> {
        _ = (interpreter, target, class);
        Err(unsupported("instanceof"))
    }
}

/// Interop over the interpreter's own values only
#[derive(Debug, Default)]
pub struct ValueInterop;

impl Interop for ValueInterop {}

fn member_of(interpreter: &Interpreter, target: &Value, member: &Value) -> Result<Value, Error> {
    let name = match member {
        Value::String(name) => Some(name.to_string()),
        Value::Symbol(symbol) => Some(interpreter.resolve(*symbol)),
        _ => None,
    };
    Ok(match (target, member) {
        (Value::Nil, _) => {
            return Err(Error::Host(
                format!("cannot read {} of nil", interpreter.print(member, true)).into(),
            ))
        }
        (Value::HashMap(map), _) => interpreter.get_named(map, member).unwrap_or_default(),
        (Value::List(list), Value::Number(n)) => index(*n)
            .and_then(|i| list.get(i).cloned())
            .unwrap_or_default(),
        (Value::List(list), _) if name.as_deref() == Some("length") => Value::Number(list.len() as f64),
        (Value::String(text), _) if name.as_deref() == Some("length") => {
            Value::Number(text.chars().count() as f64)
        }
        (Value::Set(set), _) if name.as_deref() == Some("size") => Value::Number(set.len() as f64),
        (Value::Set(set), _) => Value::Bool(set.contains(&Key::from(member.clone()))),
        _ => Value::Nil,
    })
}

/// The collaborators an interpreter talks to
#[derive(Clone)]
pub struct Host {
    pub scripts: Rc<dyn ScriptStore>,
    pub data: Option<Rc<dyn DataStore>>,
    pub log: Rc<dyn LogSink>,
    pub interop: Rc<dyn Interop>,
}

impl Default for Host {
    fn default() -> Self {
        Self {
            scripts: Rc::new(MemoryScriptStore::with_core()),
            data: None,
            log: Rc::new(TracingLog),
            interop: Rc::new(ValueInterop),
        }
    }
}

impl Host {
    pub fn with_scripts(mut self, scripts: Rc<dyn ScriptStore>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn with_data(mut self, data: Rc<dyn DataStore>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_log(mut self, log: Rc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    pub fn with_interop(mut self, interop: Rc<dyn Interop>) -> Self {
        self.interop = interop;
        self
    }
}
