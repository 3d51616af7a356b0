use std::rc::Rc;

use crate::value::Value;

use super::{
    environment::{Env, Environment},
    Callable, Closure, Error, Interpreter,
};

/// Head symbols the evaluator handles itself, each receiving its operands
/// unevaluated. They cannot be shadowed by bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialForm {
    // binding
    Def,
    Let,
    Loop,

    // sequencing and branching
    Do,
    If,

    // closures
    Fn,
    Defmacro,

    // quoting
    Quote,
    Quasiquote,

    // evaluation
    Macroexpand,
    Eval,
    Load,
}

impl SpecialForm {
    pub const ALL: [Self; 12] = [
        Self::Def,
        Self::Let,
        Self::Loop,
        Self::Do,
        Self::If,
        Self::Fn,
        Self::Defmacro,
        Self::Quote,
        Self::Quasiquote,
        Self::Macroexpand,
        Self::Eval,
        Self::Load,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Def => "def",
            Self::Let => "let",
            Self::Loop => "loop",
            Self::Do => "do",
            Self::If => "if",
            Self::Fn => "fn",
            Self::Defmacro => "defmacro",
            Self::Quote => "quote",
            Self::Quasiquote => "quasiquote",
            Self::Macroexpand => "macroexpand",
            Self::Eval => "eval",
            Self::Load => "load",
        }
    }
}

fn operand(operands: &[Value], index: usize) -> Value {
    operands.get(index).cloned().unwrap_or_default()
}

impl Interpreter {
    pub(crate) fn special_form(&self, form: SpecialForm, env: &Env, operands: &[Value]) -> Result<Value, Error> {
        match form {
            SpecialForm::Def => {
                let Some(Value::Symbol(name)) = operands.first() else {
                    return Err(Error::invalid_form("def", "expected a symbol to bind"));
                };
                let value = self.evaluate(&operand(operands, 1), env)?;
                // always global, whatever frame the def appears in
                self.root().define(*name, value.clone());
                Ok(value)
            }
            SpecialForm::Do => self.evaluate_body(operands, env),
            SpecialForm::Let => {
                let (bindings, body) = binding_list("let", operands)?;
                let frame = self.bind(bindings, env, true)?;
                self.evaluate_body(body, &frame)
            }
            SpecialForm::Loop => self.evaluate_loop(env, operands),
            SpecialForm::Fn => self.closure("fn", env, operands).map(Value::Callable),
            SpecialForm::Defmacro => {
                let Some((Value::Symbol(name), rest)) = operands.split_first() else {
                    return Err(Error::invalid_form("defmacro", "expected a symbol to bind"));
                };
                let transformer = Value::Macro(self.closure("defmacro", env, rest)?);
                self.root().define(*name, transformer.clone());
                Ok(transformer)
            }
            SpecialForm::If => {
                if !(2..=3).contains(&operands.len()) {
                    return Err(Error::invalid_form(
                        "if",
                        format!("expected a test, a branch and an optional else, got {} forms", operands.len()),
                    ));
                }
                let branch = if self.evaluate(&operands[0], env)?.is_truthy() {
                    operand(operands, 1)
                } else {
                    operand(operands, 2)
                };
                self.evaluate(&branch, env)
            }
            SpecialForm::Quote => Ok(operand(operands, 0)),
            SpecialForm::Quasiquote => self.quasiquote(&operand(operands, 0), env),
            SpecialForm::Macroexpand => {
                let form = operand(operands, 0);
                Ok(self.expand_once(&form, env)?.unwrap_or(form))
            }
            SpecialForm::Eval => {
                let form = self.evaluate(&operand(operands, 0), env)?;
                self.evaluate(&form, env)
            }
            SpecialForm::Load => match self.evaluate(&operand(operands, 0), env)? {
                Value::List(names) => {
                    let results = names
                        .items()
                        .iter()
                        .map(|name| self.load_named(name, env))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::sequence(results))
                }
                name => self.load_named(&name, env),
            },
        }
    }

    fn load_named(&self, name: &Value, env: &Env) -> Result<Value, Error> {
        match name {
            Value::String(name) => self.load(name, env),
            Value::Symbol(symbol) => self.load(&self.resolve(*symbol), env),
            other => Err(Error::type_mismatch("load", "a script name", other)),
        }
    }

    fn closure(&self, form: &'static str, env: &Env, operands: &[Value]) -> Result<Callable, Error> {
        let Some((params, body)) = operands.split_first() else {
            return Err(Error::invalid_form(form, "expected a parameter pattern"));
        };
        if !matches!(params, Value::Symbol(_) | Value::List(_)) {
            return Err(Error::invalid_form(
                form,
                format!("a {} is not a parameter pattern", params.type_name()),
            ));
        }
        Ok(Callable::Closure(Rc::new(Closure {
            params: params.clone(),
            body: Rc::from(body),
            env: env.clone(),
        })))
    }

    /// Runs the body until it yields anything but a recur, rebinding the loop
    /// patterns in a fresh frame each time around.
    fn evaluate_loop(&self, env: &Env, operands: &[Value]) -> Result<Value, Error> {
        let (bindings, body) = binding_list("loop", operands)?;
        let mut frame = self.bind(bindings, env, true)?;
        let patterns = bindings.iter().step_by(2);
        loop {
            let values = match self.evaluate_body(body, &frame)? {
                Value::Recur(values) => values,
                value => return Ok(value),
            };
            let expected = bindings.len() / 2;
            if values.len() != expected {
                return Err(Error::RecurArity {
                    expected,
                    got: values.len(),
                });
            }
            frame = Environment::new_frame(env);
            for (pattern, value) in patterns.clone().zip(values.iter()) {
                frame.destructure(pattern, value.clone(), self.symbols().ampersand)?;
            }
        }
    }
}

fn binding_list<'a>(form: &'static str, operands: &'a [Value]) -> Result<(&'a [Value], &'a [Value]), Error> {
    match operands.split_first() {
        Some((Value::List(bindings), body)) => Ok((bindings.items(), body)),
        _ => Err(Error::invalid_form(form, "expected a binding list")),
    }
}
