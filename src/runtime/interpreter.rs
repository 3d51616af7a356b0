use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    time::{Duration, Instant},
};

use lasso::Rodeo;

use crate::{
    options::Options,
    printer,
    reader::{self, SyntaxError},
    stack::ensure_sufficient_stack,
    value::{Key, ListKind, Map, Symbol, Value},
};

use super::{
    base,
    environment::{Env, Environment},
    host::Host,
    special_forms::SpecialForm,
    Arity, Callable, Error, NativeFn,
};

/// Symbols the evaluator itself needs to recognize
pub(crate) struct Symbols {
    pub(crate) ampersand: Symbol,
    pub(crate) unquote: Symbol,
    pub(crate) splice_unquote: Symbol,
    pub(crate) db: Symbol,
    pub(crate) args: Symbol,
    pub(crate) env: Symbol,
}

impl Symbols {
    fn new(rodeo: &mut Rodeo) -> Self {
        Self {
            ampersand: rodeo.get_or_intern_static("&"),
            unquote: rodeo.get_or_intern_static("unquote"),
            splice_unquote: rodeo.get_or_intern_static("splice-unquote"),
            db: rodeo.get_or_intern_static("$db"),
            args: rodeo.get_or_intern_static("$args"),
            env: rodeo.get_or_intern_static("$env"),
        }
    }
}

/// A tree-walking interpreter owning one root environment.
///
/// The special-form table is fixed at construction; everything else the
/// language can see lives in environments passed explicitly to
/// [`Interpreter::evaluate`].
pub struct Interpreter {
    options: Options,
    host: Host,
    rodeo: RefCell<Rodeo>,
    symbols: Symbols,
    special_forms: HashMap<Symbol, SpecialForm>,
    root: Env,
    output: RefCell<String>,
    counter: Cell<u64>,
    depth: Cell<usize>,
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl Interpreter {
    /// Builds the root environment: special forms, then primitives and
    /// collaborators, then the preloaded libraries.
    pub fn new(options: Options, host: Host) -> Result<Self, Error> {
        let mut rodeo = Rodeo::default();
        let symbols = Symbols::new(&mut rodeo);
        let special_forms = SpecialForm::ALL
            .iter()
            .map(|form| (rodeo.get_or_intern_static(form.name()), *form))
            .collect();
        let interpreter = Self {
            options,
            host,
            rodeo: RefCell::new(rodeo),
            symbols,
            special_forms,
            root: Environment::root(),
            output: RefCell::default(),
            counter: Cell::new(0),
            depth: Cell::new(0),
        };
        base::register(&interpreter);
        interpreter.preload()?;
        Ok(interpreter)
    }

    pub fn with_defaults() -> Result<Self, Error> {
        Self::new(Options::default(), Host::default())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn preload(&self) -> Result<(), Error> {
        if self.options.preload.is_empty() {
            return Ok(());
        }
        // libraries see `$db`, user code does not
        let privileged = Environment::new_frame(&self.root);
        if let Some(data) = &self.host.data {
            privileged.define(self.symbols.db, base::data_store_bindings(data.clone()));
        }
        for name in &self.options.preload {
            self.load(name, &privileged)?;
        }
        Ok(())
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn root(&self) -> &Env {
        &self.root
    }

    /// The root bindings as a hash-map from name to value, taken when called
    pub fn root_snapshot(&self) -> Value {
        let mut bindings: Vec<_> = {
            let rodeo = self.rodeo.borrow();
            self.root
                .bindings()
                .into_iter()
                .map(|(name, value)| (rodeo.resolve(&name).to_string(), value))
                .collect()
        };
        bindings.sort_by(|(a, _), (b, _)| a.cmp(b));
        Value::map(
            bindings
                .into_iter()
                .map(|(name, value)| (Key::from(Value::string(name)), value))
                .collect(),
        )
    }

    pub(crate) fn symbols(&self) -> &Symbols {
        &self.symbols
    }

    pub fn intern(&self, name: &str) -> Symbol {
        self.rodeo.borrow_mut().get_or_intern(name)
    }

    pub fn resolve(&self, symbol: Symbol) -> String {
        self.rodeo.borrow().resolve(&symbol).to_string()
    }

    /// Looks a name up without interning it
    pub(crate) fn existing_symbol(&self, name: &str) -> Option<Symbol> {
        self.rodeo.borrow().get(name)
    }

    pub fn symbol(&self, name: &str) -> Value {
        Value::Symbol(self.intern(name))
    }

    /// Binds `name` in the root environment
    pub fn define(&self, name: &str, value: Value) {
        self.root.define(self.intern(name), value);
    }

    pub fn define_native<F>(&self, name: &'static str, arity: Arity, func: F)
    where
        F: Fn(&Interpreter, Vec<Value>) -> Result<Value, Error> + 'static,
    {
        self.define(name, Value::Callable(NativeFn::new(name, arity, func).into()));
    }

    pub fn read_one(&self, source: &str) -> Result<Option<(Value, usize)>, SyntaxError> {
        reader::read_one(source, &mut self.rodeo.borrow_mut())
    }

    pub fn read_all(&self, source: &str) -> Result<Vec<Value>, SyntaxError> {
        reader::read_all(source, &mut self.rodeo.borrow_mut())
    }

    pub fn print(&self, value: &Value, readable: bool) -> String {
        printer::print(value, readable, &self.rodeo.borrow())
    }

    /// Appends to the run transcript
    pub fn write_output(&self, text: &str) {
        self.output.borrow_mut().push_str(text);
    }

    pub fn take_output(&self) -> String {
        std::mem::take(&mut *self.output.borrow_mut())
    }

    pub(crate) fn next_id(&self) -> u64 {
        let id = self.counter.get() + 1;
        self.counter.set(id);
        id
    }

    /// Reads all of `source` first, then evaluates its forms in order in the
    /// root environment, returning the last value.
    pub fn eval_str(&self, source: &str) -> Result<Value, Error> {
        let forms = self.read_all(source)?;
        self.evaluate_body(&forms, &self.root)
    }

    /// Fetches a script from the host's store and evaluates it in `env`
    #[tracing::instrument(level = "debug", skip(self, env))]
    pub fn load(&self, name: &str, env: &Env) -> Result<Value, Error> {
        let Some(source) = self.host.scripts.get(name) else {
            return Err(Error::MissingScript(name.into()));
        };
        let forms = self.read_all(&source)?;
        tracing::debug!(forms = forms.len(), "loaded script");
        self.evaluate_body(&forms, env)
    }

    fn enter(&self) -> Result<DepthGuard<'_>, Error> {
        let depth = self.depth.get() + 1;
        if depth > self.options.max_depth {
            return Err(Error::DepthExceeded(self.options.max_depth));
        }
        self.depth.set(depth);
        Ok(DepthGuard(&self.depth))
    }

    pub fn evaluate(&self, form: &Value, env: &Env) -> Result<Value, Error> {
        let _guard = self.enter()?;
        ensure_sufficient_stack(|| self.evaluate_inner(form, env))
    }

    fn evaluate_inner(&self, form: &Value, env: &Env) -> Result<Value, Error> {
        let form = self.macroexpand(form, env)?;
        let list = match form {
            Value::Symbol(name) => {
                return match env.get(name) {
                    Some(value) => Ok(value),
                    None if name == self.symbols.env => Ok(self.root_snapshot()),
                    None => Err(Error::UnboundSymbol(self.resolve(name).into())),
                }
            }
            Value::List(list) => list,
            other => return Ok(other),
        };
        let (head, operands) = match list.items() {
            [head, operands @ ..] => (head, operands),
            [] => return Ok(Value::List(list.clone())),
        };
        match list.kind() {
            ListKind::Sequence => {
                let items = list
                    .items()
                    .iter()
                    .map(|item| self.evaluate(item, env))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::sequence(items))
            }
            ListKind::Invocation => {
                if let Some(form) = head.as_symbol().and_then(|name| self.special_forms.get(&name)) {
                    return self.special_form(*form, env, operands);
                }
                let callee = self.evaluate(head, env)?;
                let args = operands
                    .iter()
                    .map(|operand| self.evaluate(operand, env))
                    .collect::<Result<Vec<_>, _>>()?;
                self.apply(&callee, args)
            }
        }
    }

    pub(crate) fn evaluate_body(&self, body: &[Value], env: &Env) -> Result<Value, Error> {
        let mut last = Value::Nil;
        for form in body {
            last = self.evaluate(form, env)?;
        }
        Ok(last)
    }

    /// One expansion step: `None` unless `form` is an invocation whose head
    /// names a macro.
    pub fn expand_once(&self, form: &Value, env: &Env) -> Result<Option<Value>, Error> {
        let Value::List(list) = form else {
            return Ok(None);
        };
        if list.kind() != ListKind::Invocation {
            return Ok(None);
        }
        let Some((Value::Symbol(head), operands)) = list.items().split_first() else {
            return Ok(None);
        };
        let Some(Value::Macro(transformer)) = env.get(*head) else {
            return Ok(None);
        };
        tracing::trace!(name = %self.resolve(*head), "expanding macro");
        self.call(&transformer, operands.to_vec()).map(Some)
    }

    /// Expands until the head no longer names a macro
    pub fn macroexpand(&self, form: &Value, env: &Env) -> Result<Value, Error> {
        let mut form = form.clone();
        // an expansion that never settles counts against the depth limit
        let mut guards = vec![];
        while let Some(expanded) = self.expand_once(&form, env)? {
            guards.push(self.enter()?);
            form = expanded;
        }
        Ok(form)
    }

    /// Applies `callee` to already-evaluated arguments, dispatching on its shape
    pub fn apply(&self, callee: &Value, args: Vec<Value>) -> Result<Value, Error> {
        match callee {
            Value::Callable(callable) | Value::Macro(callable) => self.call(callable, args),
            Value::String(_) | Value::Symbol(_) => {
                let Some(target) = args.first() else {
                    return Err(Error::Apply(
                        format!("member accessor {} without a target", self.print(callee, true)).into(),
                    ));
                };
                self.host.interop.get(self, target, callee)
            }
            Value::Set(set) => {
                let key = Key::from(args.into_iter().next().unwrap_or_default());
                Ok(if set.contains(&key) {
                    key.into_value()
                } else {
                    Value::Bool(false)
                })
            }
            Value::HashMap(map) if matches!(args.first(), Some(Value::String(_) | Value::Symbol(_))) => {
                Ok(self.get_named(map, &args[0]).unwrap_or_default())
            }
            Value::List(list)
                if list.kind() == ListKind::Sequence && matches!(args.first(), Some(Value::Number(_))) =>
            {
                Ok(args[0]
                    .as_number()
                    .and_then(index)
                    .and_then(|index| list.get(index).cloned())
                    .unwrap_or_default())
            }
            other => Err(Error::Apply(self.print(other, true).into())),
        }
    }

    pub fn call(&self, callable: &Callable, args: Vec<Value>) -> Result<Value, Error> {
        match callable {
            Callable::Native(native) => native.invoke(self, args),
            Callable::Closure(closure) => {
                let frame = Environment::new_frame(&closure.env);
                frame.destructure(&closure.params, Value::sequence(args), self.symbols.ampersand)?;
                self.evaluate_body(&closure.body, &frame)
            }
        }
    }

    /// Looks `key` up as given, then under the string or symbol of the same name
    pub fn get_named(&self, map: &Map, key: &Value) -> Option<Value> {
        if let Some(value) = map.get(&Key::from(key.clone())) {
            return Some(value.clone());
        }
        let counterpart = match key {
            Value::String(name) => Value::Symbol(self.existing_symbol(name)?),
            Value::Symbol(symbol) => Value::string(self.resolve(*symbol)),
            _ => return None,
        };
        map.get(&Key::from(counterpart)).cloned()
    }

    /// Evaluates a whole program the way a host invokes it once: `$args` is
    /// bound, output is collected, and failures become part of the report.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn run(&self, source: &str, args: Value) -> RunReport {
        let started = Instant::now();
        let timed = match &args {
            Value::HashMap(map) => self
                .get_named(map, &Value::string("time"))
                .is_some_and(|time| time.is_truthy()),
            _ => false,
        };
        self.root.define(self.symbols.args, args);
        let result = self.eval_str(source);
        let mut message = self.take_output();
        let ok = match result {
            Ok(_) => true,
            Err(error) => {
                tracing::debug!(%error, "run failed");
                message.insert_str(0, &format!("{error}\n"));
                false
            }
        };
        RunReport {
            ok,
            message,
            elapsed: timed.then(|| started.elapsed()),
        }
    }
}

/// Drops the root bindings, closures defined at the top level keep the root
/// alive otherwise.
impl Drop for Interpreter {
    fn drop(&mut self) {
        self.root.clear();
    }
}

pub(crate) fn index(number: f64) -> Option<usize> {
    (number >= 0.0 && number.fract() == 0.0 && number < usize::MAX as f64).then_some(number as usize)
}

/// The outcome of one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub ok: bool,
    /// Everything printed during the run, led by the error when `ok` is false
    pub message: String,
    pub elapsed: Option<Duration>,
}

/// Evaluates `source` in a fresh interpreter
pub fn run(source: &str, args: Value, options: Options, host: Host) -> RunReport {
    match Interpreter::new(options, host) {
        Ok(interpreter) => interpreter.run(source, args),
        Err(error) => RunReport {
            ok: false,
            message: format!("{error}\n"),
            elapsed: None,
        },
    }
}
