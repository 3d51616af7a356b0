use std::collections::HashMap;

use crate::{
    stack::ensure_sufficient_stack,
    value::{List, Symbol, Value},
};

use super::{environment::Env, Error, Interpreter};

/// Renames made during one top-level quasiquote call
struct Expansion {
    id: u64,
    renamed: HashMap<Symbol, Symbol>,
}

enum Fragment {
    One(Value),
    Splice(Vec<Value>),
}

impl Interpreter {
    /// Instantiates `template`: unquoted forms are evaluated in `env`, spliced
    /// ones are flattened into their list, and `name#` symbols get a name
    /// unique to this call.
    pub(crate) fn quasiquote(&self, template: &Value, env: &Env) -> Result<Value, Error> {
        let mut expansion = Expansion {
            id: self.next_id(),
            renamed: HashMap::new(),
        };
        match self.instantiate(template, env, &mut expansion)? {
            Fragment::One(value) => Ok(value),
            Fragment::Splice(_) => Err(Error::invalid_form(
                "quasiquote",
                "splice-unquote must appear inside a list",
            )),
        }
    }

    fn instantiate(&self, template: &Value, env: &Env, expansion: &mut Expansion) -> Result<Fragment, Error> {
        let list = match template {
            Value::Symbol(symbol) => return Ok(Fragment::One(Value::Symbol(self.hygienic(*symbol, expansion)))),
            Value::List(list) if !list.is_empty() => list,
            other => return Ok(Fragment::One(other.clone())),
        };
        if let Some(operand) = marked(list, self.symbols().unquote) {
            return self.evaluate(operand, env).map(Fragment::One);
        }
        if let Some(operand) = marked(list, self.symbols().splice_unquote) {
            return match self.evaluate(operand, env)? {
                Value::List(spliced) => Ok(Fragment::Splice(spliced.items().to_vec())),
                Value::Nil => Ok(Fragment::Splice(vec![])),
                other => Err(Error::type_mismatch("splice-unquote", "a list", &other)),
            };
        }
        let mut items = Vec::with_capacity(list.len());
        for item in list.items() {
            match ensure_sufficient_stack(|| self.instantiate(item, env, expansion))? {
                Fragment::One(value) => items.push(value),
                Fragment::Splice(values) => items.extend(values),
            }
        }
        Ok(Fragment::One(Value::List(list.with_items(items))))
    }

    fn hygienic(&self, symbol: Symbol, expansion: &mut Expansion) -> Symbol {
        if let Some(renamed) = expansion.renamed.get(&symbol) {
            return *renamed;
        }
        let name = self.resolve(symbol);
        let renamed = match name.strip_suffix(self.options().gensym_marker) {
            Some(stem) if !stem.is_empty() => self.intern(&format!("{stem}__auto_{}", expansion.id)),
            _ => symbol,
        };
        expansion.renamed.insert(symbol, renamed);
        renamed
    }
}

/// The operand of `(marker operand)`
fn marked(list: &List, marker: Symbol) -> Option<&Value> {
    match list.items() {
        [Value::Symbol(head), operand] if *head == marker => Some(operand),
        _ => None,
    }
}
