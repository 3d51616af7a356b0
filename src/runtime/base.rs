//! Primitives bound in every root environment, and the callables through
//! which the language reaches the host's collaborators.
use std::{
    cmp::Ordering,
    rc::Rc,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::value::{Atom, Key, List, ListKind, Map, Set, Value};

use super::{host::DataStore, interpreter::index, json, Arity, Callable, Error, Interpreter, NativeFn};

pub fn register(interpreter: &Interpreter) {
    arithmetic(interpreter);
    comparison(interpreter);
    sequences(interpreter);
    collections(interpreter);
    strings(interpreter);
    output(interpreter);
    atoms(interpreter);
    control(interpreter);
    predicates(interpreter);
    interop(interpreter);
    json::register(interpreter);
}

fn number(context: &str, value: &Value) -> Result<f64, Error> {
    value
        .as_number()
        .ok_or_else(|| Error::type_mismatch(context, "a number", value))
}

/// Counts and positions: negative and NaN are 0, fractions truncate
fn count_of(context: &str, value: &Value) -> Result<usize, Error> {
    let n = number(context, value)?;
    Ok(if n.is_nan() || n <= 0.0 { 0 } else { n as usize })
}

fn text<'v>(context: &str, value: &'v Value) -> Result<&'v str, Error> {
    value
        .as_str()
        .ok_or_else(|| Error::type_mismatch(context, "a string", value))
}

/// The elements of a list, or none for nil
fn items<'v>(context: &str, value: &'v Value) -> Result<&'v [Value], Error> {
    match value {
        Value::List(list) => Ok(list.items()),
        Value::Nil => Ok(&[]),
        other => Err(Error::type_mismatch(context, "a list", other)),
    }
}

/// Anything that can be walked in order: lists, nil, sets, and hash-maps as
/// `[key value]` pairs
fn elements(context: &str, value: &Value) -> Result<Vec<Value>, Error> {
    match value {
        Value::Set(set) => Ok(set.iter().map(|key| key.value().clone()).collect()),
        Value::HashMap(map) => Ok(map
            .iter()
            .map(|(key, value)| Value::sequence(vec![key.value().clone(), value.clone()]))
            .collect()),
        other => items(context, other).map(<[Value]>::to_vec),
    }
}

/// Lists derived from `source` keep its kind
fn derived(source: &Value, items: Vec<Value>) -> Value {
    match source {
        Value::List(list) => Value::List(list.with_items(items)),
        _ => Value::sequence(items),
    }
}

fn fold(name: &str, args: &[Value], op: impl Fn(f64, f64) -> f64) -> Result<Value, Error> {
    let Some((first, rest)) = args.split_first() else {
        return Err(Error::argument(name, "expected at least one number"));
    };
    let mut acc = number(name, first)?;
    for arg in rest {
        acc = op(acc, number(name, arg)?);
    }
    Ok(Value::Number(acc))
}

fn unary(interpreter: &Interpreter, name: &'static str, op: fn(f64) -> f64) {
    interpreter.define_native(name, Arity::Exact(1), move |_, args| {
        Ok(Value::Number(op(number(name, &args[0])?)))
    });
}

fn arithmetic(i: &Interpreter) {
    i.define_native("+", Arity::Min(0), |_, args| {
        if args.is_empty() {
            return Ok(Value::Number(0.0));
        }
        fold("+", &args, |a, b| a + b)
    });
    i.define_native("*", Arity::Min(0), |_, args| {
        if args.is_empty() {
            return Ok(Value::Number(1.0));
        }
        fold("*", &args, |a, b| a * b)
    });
    i.define_native("-", Arity::Min(1), |_, args| {
        if let [only] = args.as_slice() {
            return Ok(Value::Number(-number("-", only)?));
        }
        fold("-", &args, |a, b| a - b)
    });
    i.define_native("/", Arity::Min(1), |_, args| {
        if let [only] = args.as_slice() {
            return Ok(Value::Number(1.0 / number("/", only)?));
        }
        fold("/", &args, |a, b| a / b)
    });
    i.define_native("mod", Arity::Exact(2), |_, args| fold("mod", &args, |a, b| a % b));
    i.define_native("max", Arity::Min(1), |_, args| fold("max", &args, f64::max));
    i.define_native("min", Arity::Min(1), |_, args| fold("min", &args, f64::min));
    unary(i, "inc", |n| n + 1.0);
    unary(i, "dec", |n| n - 1.0);
    unary(i, "floor", f64::floor);
    unary(i, "ceil", f64::ceil);
    // halves round up, -2.5 becomes -2
    unary(i, "round", |n| (n + 0.5).floor());
    unary(i, "abs", f64::abs);
    i.define_native("number", Arity::Exact(1), |_, args| {
        Ok(match &args[0] {
            Value::Number(n) => Value::Number(*n),
            Value::String(s) => s.trim().parse().map(Value::Number).unwrap_or_default(),
            Value::Bool(b) => Value::Number(if *b { 1.0 } else { 0.0 }),
            _ => Value::Nil,
        })
    });
}

fn order(name: &str, a: &Value, b: &Value) -> Result<Option<Ordering>, Error> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => Ok(a.partial_cmp(b)),
        (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
        (Value::Number(_) | Value::String(_), other) => {
            Err(Error::type_mismatch(name, a.type_name(), other))
        }
        (other, _) => Err(Error::type_mismatch(name, "a number or string", other)),
    }
}

fn comparison_native(i: &Interpreter, name: &'static str, accept: fn(Ordering) -> bool) {
    i.define_native(name, Arity::Min(1), move |_, args| {
        for pair in args.windows(2) {
            if !order(name, &pair[0], &pair[1])?.is_some_and(accept) {
                return Ok(Value::Bool(false));
            }
        }
        Ok(Value::Bool(true))
    });
}

fn comparison(i: &Interpreter) {
    i.define_native("=", Arity::Min(1), |_, args| {
        Ok(Value::Bool(args.windows(2).all(|pair| pair[0] == pair[1])))
    });
    i.define_native("not=", Arity::Min(1), |_, args| {
        Ok(Value::Bool(!args.windows(2).all(|pair| pair[0] == pair[1])))
    });
    comparison_native(i, "<", Ordering::is_lt);
    comparison_native(i, ">", Ordering::is_gt);
    comparison_native(i, "<=", Ordering::is_le);
    comparison_native(i, ">=", Ordering::is_ge);
    i.define_native("not", Arity::Exact(1), |_, args| Ok(Value::Bool(!args[0].is_truthy())));
}

fn sort_values(items: &mut [Value]) -> Result<(), Error> {
    if items.iter().all(|item| matches!(item, Value::Number(_))) {
        items.sort_by(|a, b| {
            let (a, b) = (a.as_number().unwrap_or(f64::NAN), b.as_number().unwrap_or(f64::NAN));
            a.total_cmp(&b)
        });
        Ok(())
    } else if items.iter().all(|item| matches!(item, Value::String(_))) {
        items.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
        Ok(())
    } else {
        Err(Error::argument("sort", "expected only numbers or only strings"))
    }
}

/// Most elements a single `range` may produce
const MAX_RANGE: f64 = 10_000_000.0;

fn range(start: f64, end: f64, step: f64) -> Result<Vec<Value>, Error> {
    if step == 0.0 || step.is_nan() {
        return Err(Error::argument("range", "step must be a non-zero number"));
    }
    let count = ((end - start) / step).ceil();
    if count.is_nan() || count > MAX_RANGE {
        return Err(Error::argument("range", "too many elements"));
    }
    // the count is integral and in bounds here
    let count = count.max(0.0) as usize;
    Ok((0..count).map(|k| Value::Number(start + k as f64 * step)).collect())
}

fn sequences(i: &Interpreter) {
    i.define_native("list", Arity::Min(0), |_, args| Ok(Value::invocation(args)));
    i.define_native("vector", Arity::Min(0), |_, args| Ok(Value::sequence(args)));
    i.define_native("range", Arity::Between(1, 3), |_, args| {
        let (start, end, step) = match args.as_slice() {
            [end] => (0.0, number("range", end)?, 1.0),
            [start, end] => (number("range", start)?, number("range", end)?, 1.0),
            [start, end, step] => (
                number("range", start)?,
                number("range", end)?,
                number("range", step)?,
            ),
            _ => return Err(Error::argument("range", "expected 1 to 3 numbers")),
        };
        range(start, end, step).map(Value::sequence)
    });
    i.define_native("cons", Arity::Exact(2), |_, args| {
        let mut items = vec![args[0].clone()];
        items.extend_from_slice(self::items("cons", &args[1])?);
        Ok(match &args[1] {
            Value::List(list) => Value::List(list.with_items(items)),
            _ => Value::invocation(items),
        })
    });
    i.define_native("concat", Arity::Min(0), |_, args| {
        let kind = args
            .iter()
            .find_map(|arg| arg.as_list().map(List::kind))
            .unwrap_or(ListKind::Sequence);
        let mut items = vec![];
        for arg in &args {
            items.extend_from_slice(self::items("concat", arg)?);
        }
        Ok(Value::List(List::new(kind, items)))
    });
    i.define_native("count", Arity::Exact(1), |_, args| {
        let count = match &args[0] {
            Value::List(list) => list.len(),
            Value::HashMap(map) => map.len(),
            Value::Set(set) => set.len(),
            Value::String(s) => s.chars().count(),
            Value::Nil => 0,
            other => return Err(Error::type_mismatch("count", "a collection", other)),
        };
        Ok(Value::Number(count as f64))
    });
    i.define_native("empty?", Arity::Exact(1), |_, args| {
        Ok(Value::Bool(match &args[0] {
            Value::List(list) => list.is_empty(),
            Value::HashMap(map) => map.is_empty(),
            Value::Set(set) => set.is_empty(),
            Value::String(s) => s.is_empty(),
            Value::Nil => true,
            other => return Err(Error::type_mismatch("empty?", "a collection", other)),
        }))
    });
    i.define_native("seq", Arity::Exact(1), |_, args| {
        let items = match &args[0] {
            Value::String(s) => s.chars().map(|c| Value::string(c.to_string())).collect(),
            other => elements("seq", other)?,
        };
        Ok(if items.is_empty() {
            Value::Nil
        } else {
            derived(&args[0], items)
        })
    });
    // (nth index coll), index first
    i.define_native("nth", Arity::Exact(2), |_, args| {
        let position = number("nth", &args[0])?;
        Ok(match &args[1] {
            Value::String(s) => index(position)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::string(c.to_string()))
                .unwrap_or_default(),
            coll => {
                let items = items("nth", coll)?;
                index(position)
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default()
            }
        })
    });
    i.define_native("first", Arity::Exact(1), |_, args| {
        Ok(items("first", &args[0])?.first().cloned().unwrap_or_default())
    });
    i.define_native("second", Arity::Exact(1), |_, args| {
        Ok(items("second", &args[0])?.get(1).cloned().unwrap_or_default())
    });
    i.define_native("last", Arity::Exact(1), |_, args| {
        Ok(items("last", &args[0])?.last().cloned().unwrap_or_default())
    });
    i.define_native("rest", Arity::Exact(1), |_, args| {
        let items = items("rest", &args[0])?;
        Ok(derived(&args[0], items.get(1..).unwrap_or_default().to_vec()))
    });
    i.define_native("take", Arity::Exact(2), |_, args| {
        let n = count_of("take", &args[0])?;
        let items = items("take", &args[1])?;
        Ok(derived(&args[1], items[..n.min(items.len())].to_vec()))
    });
    i.define_native("drop", Arity::Exact(2), |_, args| {
        let n = count_of("drop", &args[0])?;
        let items = items("drop", &args[1])?;
        Ok(derived(&args[1], items[n.min(items.len())..].to_vec()))
    });
    i.define_native("reverse", Arity::Exact(1), |_, args| {
        let mut items = elements("reverse", &args[0])?;
        items.reverse();
        Ok(derived(&args[0], items))
    });
    i.define_native("sort", Arity::Exact(1), |_, args| {
        let mut items = elements("sort", &args[0])?;
        sort_values(&mut items)?;
        Ok(derived(&args[0], items))
    });
    i.define_native("conj", Arity::Min(1), |_, args| {
        let (coll, additions) = args.split_at(1);
        Ok(match &coll[0] {
            Value::Set(set) => {
                let mut set = Set::clone(set);
                set.extend(additions.iter().cloned().map(Key::from));
                Value::Set(Rc::new(set))
            }
            Value::HashMap(map) => {
                let mut map = Map::clone(map);
                for entry in additions {
                    let [key, value] = items("conj", entry)? else {
                        return Err(Error::argument("conj", "hash-map entries are [key value] pairs"));
                    };
                    map.insert(Key::from(key.clone()), value.clone());
                }
                Value::map(map)
            }
            other => {
                let mut items = items("conj", other)?.to_vec();
                items.extend_from_slice(additions);
                derived(other, items)
            }
        })
    });
    // (apply f a b [c d]) calls (f a b c d)
    i.define_native("apply", Arity::Min(1), |interpreter, mut args| {
        let callee = args.remove(0);
        if let Some(spread) = args.pop() {
            args.extend_from_slice(items("apply", &spread)?);
        }
        interpreter.apply(&callee, args)
    });
    i.define_native("map", Arity::Exact(2), |interpreter, args| {
        let mapped = elements("map", &args[1])?
            .into_iter()
            .map(|item| interpreter.apply(&args[0], vec![item]))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(derived(&args[1], mapped))
    });
    i.define_native("filter", Arity::Exact(2), |interpreter, args| {
        let mut kept = vec![];
        for item in elements("filter", &args[1])? {
            if interpreter.apply(&args[0], vec![item.clone()])?.is_truthy() {
                kept.push(item);
            }
        }
        Ok(derived(&args[1], kept))
    });
    // (reduce f init coll), or (reduce f coll) starting from the first element
    i.define_native("reduce", Arity::Between(2, 3), |interpreter, args| {
        let (f, init, coll) = match args.as_slice() {
            [f, coll] => {
                let items = elements("reduce", coll)?;
                let mut items = items.into_iter();
                (f, items.next().unwrap_or_default(), items.collect::<Vec<_>>())
            }
            [f, init, coll] => (f, init.clone(), elements("reduce", coll)?),
            _ => return Err(Error::argument("reduce", "expected a function and a collection")),
        };
        init_fold(interpreter, f, init, coll)
    });
    i.define_native("reduce-right", Arity::Exact(3), |interpreter, args| {
        let mut items = elements("reduce-right", &args[2])?;
        items.reverse();
        init_fold(interpreter, &args[0], args[1].clone(), items)
    });
    i.define_native("every?", Arity::Exact(2), |interpreter, args| {
        for item in elements("every?", &args[1])? {
            if !interpreter.apply(&args[0], vec![item])?.is_truthy() {
                return Ok(Value::Bool(false));
            }
        }
        Ok(Value::Bool(true))
    });
    i.define_native("some?", Arity::Exact(2), |interpreter, args| {
        for item in elements("some?", &args[1])? {
            if interpreter.apply(&args[0], vec![item])?.is_truthy() {
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(false))
    });
}

fn init_fold(interpreter: &Interpreter, f: &Value, init: Value, items: Vec<Value>) -> Result<Value, Error> {
    items
        .into_iter()
        .try_fold(init, |acc, item| interpreter.apply(f, vec![acc, item]))
}

/// Keyed lookup shared by `get` and `contains?`
fn lookup(interpreter: &Interpreter, coll: &Value, key: &Value) -> Option<Value> {
    match (coll, key) {
        (Value::HashMap(map), Value::String(_) | Value::Symbol(_)) => interpreter.get_named(map, key),
        (Value::HashMap(map), key) => map.get(&Key::from(key.clone())).cloned(),
        (Value::Set(set), key) => set.get(&Key::from(key.clone())).map(|key| key.value().clone()),
        (Value::List(list), Value::Number(n)) => index(*n).and_then(|i| list.get(i).cloned()),
        (Value::String(s), Value::Number(n)) => index(*n)
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::string(c.to_string())),
        _ => None,
    }
}

fn map_arg<'v>(context: &str, value: &'v Value) -> Result<Option<&'v Map>, Error> {
    match value {
        Value::HashMap(map) => Ok(Some(map)),
        Value::Nil => Ok(None),
        other => Err(Error::type_mismatch(context, "a hash-map", other)),
    }
}

fn pairs_into(name: &str, map: &mut Map, pairs: &[Value]) -> Result<(), Error> {
    if pairs.len() % 2 != 0 {
        return Err(Error::argument(name, "expected an even number of keys and values"));
    }
    for pair in pairs.chunks_exact(2) {
        map.insert(Key::from(pair[0].clone()), pair[1].clone());
    }
    Ok(())
}

fn collections(i: &Interpreter) {
    i.define_native("hash-map", Arity::Min(0), |_, args| {
        let mut map = Map::new();
        pairs_into("hash-map", &mut map, &args)?;
        Ok(Value::map(map))
    });
    i.define_native("hash-set", Arity::Min(0), |_, args| {
        Ok(Value::Set(Rc::new(args.into_iter().map(Key::from).collect())))
    });
    i.define_native("set", Arity::Exact(1), |_, args| {
        let set: Set = elements("set", &args[0])?.into_iter().map(Key::from).collect();
        Ok(Value::Set(Rc::new(set)))
    });
    i.define_native("keys", Arity::Exact(1), |_, args| {
        let keys: Vec<Value> = map_arg("keys", &args[0])?
            .map(|map| map.keys().map(|key| key.value().clone()).collect())
            .unwrap_or_default();
        Ok(Value::sequence(keys))
    });
    i.define_native("vals", Arity::Exact(1), |_, args| {
        let vals: Vec<Value> = map_arg("vals", &args[0])?
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default();
        Ok(Value::sequence(vals))
    });
    i.define_native("get", Arity::Between(2, 3), |interpreter, args| {
        let fallback = args.get(2).cloned().unwrap_or_default();
        Ok(lookup(interpreter, &args[0], &args[1]).unwrap_or(fallback))
    });
    i.define_native("contains?", Arity::Exact(2), |interpreter, args| {
        Ok(Value::Bool(lookup(interpreter, &args[0], &args[1]).is_some()))
    });
    // membership with the key first
    i.define_native("$in", Arity::Exact(2), |interpreter, args| {
        Ok(Value::Bool(lookup(interpreter, &args[1], &args[0]).is_some()))
    });
    i.define_native("assoc", Arity::Min(3), |_, args| {
        let mut map = map_arg("assoc", &args[0])?.cloned().unwrap_or_default();
        pairs_into("assoc", &mut map, &args[1..])?;
        Ok(Value::map(map))
    });
    i.define_native("dissoc", Arity::Min(1), |interpreter, args| {
        let Some(map) = map_arg("dissoc", &args[0])? else {
            return Ok(Value::Nil);
        };
        let mut map = map.clone();
        for key in &args[1..] {
            let counterpart = match key {
                Value::String(name) => interpreter.existing_symbol(name).map(Value::Symbol),
                Value::Symbol(symbol) => Some(Value::string(interpreter.resolve(*symbol))),
                _ => None,
            };
            map.shift_remove(&Key::from(key.clone()));
            if let Some(counterpart) = counterpart {
                map.shift_remove(&Key::from(counterpart));
            }
        }
        Ok(Value::map(map))
    });
}

fn joined(interpreter: &Interpreter, args: &[Value], readable: bool, separator: &str) -> String {
    args.iter()
        .map(|arg| interpreter.print(arg, readable))
        .collect::<Vec<_>>()
        .join(separator)
}

fn strings(i: &Interpreter) {
    i.define_native("str", Arity::Min(0), |interpreter, args| {
        let mut out = String::new();
        for arg in args.iter().filter(|arg| !arg.is_nil()) {
            out.push_str(&interpreter.print(arg, false));
        }
        Ok(Value::string(out))
    });
    i.define_native("prn-str", Arity::Min(0), |interpreter, args| {
        Ok(Value::string(joined(interpreter, &args, true, " ")))
    });
    i.define_native("print-str", Arity::Min(0), |interpreter, args| {
        Ok(Value::string(joined(interpreter, &args, false, " ")))
    });
    i.define_native("symbol", Arity::Exact(1), |interpreter, args| match &args[0] {
        Value::String(name) => Ok(interpreter.symbol(name)),
        Value::Symbol(_) => Ok(args[0].clone()),
        other => Err(Error::type_mismatch("symbol", "a string", other)),
    });
    i.define_native("name", Arity::Exact(1), |interpreter, args| match &args[0] {
        Value::Symbol(symbol) => Ok(Value::string(interpreter.resolve(*symbol))),
        Value::String(_) => Ok(args[0].clone()),
        other => Err(Error::type_mismatch("name", "a symbol or string", other)),
    });
    i.define_native("read-string", Arity::Exact(1), |interpreter, args| {
        let source = text("read-string", &args[0])?;
        Ok(interpreter
            .read_one(source)?
            .map(|(form, _)| form)
            .unwrap_or_default())
    });
    i.define_native("read-all", Arity::Exact(1), |interpreter, args| {
        let source = text("read-all", &args[0])?;
        Ok(Value::sequence(interpreter.read_all(source)?))
    });
    i.define_native("subs", Arity::Between(2, 3), |_, args| {
        let s = text("subs", &args[0])?;
        let start = count_of("subs", &args[1])?;
        let chars = s.chars().skip(start);
        let out: String = match args.get(2) {
            Some(end) => chars.take(count_of("subs", end)?.saturating_sub(start)).collect(),
            None => chars.collect(),
        };
        Ok(Value::string(out))
    });
    i.define_native("upper-case", Arity::Exact(1), |_, args| {
        Ok(Value::string(text("upper-case", &args[0])?.to_uppercase()))
    });
    i.define_native("lower-case", Arity::Exact(1), |_, args| {
        Ok(Value::string(text("lower-case", &args[0])?.to_lowercase()))
    });
    i.define_native("re-find", Arity::Exact(2), |_, args| {
        let Value::Regex(regex) = &args[0] else {
            return Err(Error::type_mismatch("re-find", "a regex", &args[0]));
        };
        let haystack = text("re-find", &args[1])?;
        let Some(captures) = regex.regex().captures(haystack) else {
            return Ok(Value::Nil);
        };
        let group = |m: Option<regex::Match>| m.map(|m| Value::string(m.as_str())).unwrap_or_default();
        Ok(if captures.len() == 1 {
            group(captures.get(0))
        } else {
            Value::sequence(captures.iter().map(group).collect::<Vec<_>>())
        })
    });
    i.define_native("re-test", Arity::Exact(2), |_, args| {
        let Value::Regex(regex) = &args[0] else {
            return Err(Error::type_mismatch("re-test", "a regex", &args[0]));
        };
        Ok(Value::Bool(regex.regex().is_match(text("re-test", &args[1])?)))
    });
    i.define_native("split", Arity::Exact(2), |_, args| {
        let s = text("split", &args[0])?;
        let parts: Vec<Value> = match &args[1] {
            Value::String(separator) if separator.is_empty() => {
                s.chars().map(|c| Value::string(c.to_string())).collect()
            }
            Value::String(separator) => s.split(&**separator).map(Value::string).collect(),
            Value::Regex(regex) => regex.regex().split(s).map(Value::string).collect(),
            other => return Err(Error::type_mismatch("split", "a string or regex", other)),
        };
        Ok(Value::sequence(parts))
    });
    i.define_native("replace", Arity::Exact(3), |_, args| {
        let s = text("replace", &args[0])?;
        let replacement = text("replace", &args[2])?;
        Ok(Value::string(match &args[1] {
            Value::String(pattern) => s.replace(&**pattern, replacement),
            Value::Regex(regex) => regex.regex().replace_all(s, replacement).into_owned(),
            other => return Err(Error::type_mismatch("replace", "a string or regex", other)),
        }))
    });
    // (join coll) or (join separator coll)
    i.define_native("join", Arity::Between(1, 2), |interpreter, args| {
        let (separator, coll) = match args.as_slice() {
            [coll] => ("", coll),
            [separator, coll] => (text("join", separator)?, coll),
            _ => return Err(Error::argument("join", "expected a collection")),
        };
        Ok(Value::string(joined(interpreter, &elements("join", coll)?, false, separator)))
    });
}

fn output(i: &Interpreter) {
    i.define_native("print", Arity::Min(0), |interpreter, args| {
        interpreter.write_output(&joined(interpreter, &args, false, " "));
        Ok(Value::Nil)
    });
    i.define_native("println", Arity::Min(0), |interpreter, args| {
        let mut line = joined(interpreter, &args, false, " ");
        line.push('\n');
        interpreter.write_output(&line);
        Ok(Value::Nil)
    });
    i.define_native("prn", Arity::Min(0), |interpreter, args| {
        let mut line = joined(interpreter, &args, true, " ");
        line.push('\n');
        interpreter.write_output(&line);
        Ok(Value::Nil)
    });
    for name in ["log", "$dbg"] {
        i.define_native(name, Arity::Min(0), |interpreter, args| {
            interpreter.host().log.write(&joined(interpreter, &args, false, " "));
            Ok(Value::Nil)
        });
    }
}

fn atoms(i: &Interpreter) {
    i.define_native("atom", Arity::Exact(1), |_, mut args| Ok(Value::Atom(Atom::new(args.remove(0)))));
    i.define_native("deref", Arity::Exact(1), |_, args| match &args[0] {
        Value::Atom(atom) => Ok(atom.get()),
        other => Err(Error::type_mismatch("deref", "an atom", other)),
    });
    i.define_native("reset!", Arity::Exact(2), |_, args| match &args[0] {
        Value::Atom(atom) => {
            atom.replace(args[1].clone());
            Ok(args[1].clone())
        }
        other => Err(Error::type_mismatch("reset!", "an atom", other)),
    });
    i.define_native("$push!", Arity::Min(1), |_, args| {
        let Some((Value::Atom(atom), pushed)) = args.split_first() else {
            return Err(Error::type_mismatch("$push!", "an atom", &args[0]));
        };
        let held = atom.get();
        let mut items = items("$push!", &held)?.to_vec();
        items.extend_from_slice(pushed);
        atom.replace(derived(&held, items));
        Ok(args[0].clone())
    });
}

fn control(i: &Interpreter) {
    i.define_native("recur", Arity::Min(0), |_, args| Ok(Value::Recur(args.into())));
    i.define_native("throw", Arity::Exact(1), |interpreter, args| {
        Err(Error::Thrown(interpreter.print(&args[0], false).into()))
    });
    i.define_native("gensym", Arity::Between(0, 1), |interpreter, args| {
        let prefix = match args.first() {
            Some(prefix) => interpreter.print(prefix, false),
            None => "G__".to_string(),
        };
        Ok(interpreter.symbol(&format!("{prefix}{}", interpreter.next_id())))
    });
    i.define_native("now", Arity::Exact(0), |_, _| {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|error| Error::Host(error.to_string().into()))?;
        Ok(Value::Number(elapsed.as_secs_f64() * 1000.0))
    });
}

fn predicate(i: &Interpreter, name: &'static str, test: fn(&Value) -> bool) {
    i.define_native(name, Arity::Exact(1), move |_, args| Ok(Value::Bool(test(&args[0]))));
}

fn predicates(i: &Interpreter) {
    predicate(i, "nil?", |v| matches!(v, Value::Nil));
    predicate(i, "boolean?", |v| matches!(v, Value::Bool(_)));
    predicate(i, "number?", |v| matches!(v, Value::Number(_)));
    predicate(i, "string?", |v| matches!(v, Value::String(_)));
    predicate(i, "symbol?", |v| matches!(v, Value::Symbol(_)));
    predicate(i, "list?", |v| matches!(v, Value::List(_)));
    predicate(i, "seq?", |v| matches!(v, Value::List(_)));
    predicate(i, "map?", |v| matches!(v, Value::HashMap(_)));
    predicate(i, "hash-map?", |v| matches!(v, Value::HashMap(_)));
    predicate(i, "set?", |v| matches!(v, Value::Set(_)));
    predicate(i, "fn?", |v| matches!(v, Value::Callable(_)));
    predicate(i, "macro?", |v| matches!(v, Value::Macro(_)));
    predicate(i, "atom?", |v| matches!(v, Value::Atom(_)));
    predicate(i, "regex?", |v| matches!(v, Value::Regex(_)));
    i.define_native("type", Arity::Exact(1), |_, args| Ok(Value::string(args[0].type_name())));
}

fn interop(i: &Interpreter) {
    i.define_native("$new", Arity::Min(1), |interpreter, mut args| {
        let class = args.remove(0);
        interpreter.host().interop.construct(interpreter, &class, args)
    });
    i.define_native("$get", Arity::Exact(2), |interpreter, args| {
        interpreter.host().interop.get(interpreter, &args[0], &args[1])
    });
    i.define_native("$set!", Arity::Exact(3), |interpreter, mut args| {
        let value = args.remove(2);
        interpreter.host().interop.set(interpreter, &args[0], &args[1], value)
    });
    i.define_native("$delete!", Arity::Exact(2), |interpreter, args| {
        interpreter.host().interop.delete(interpreter, &args[0], &args[1])
    });
    i.define_native("$call", Arity::Min(2), |interpreter, mut args| {
        let rest = args.split_off(2);
        interpreter.host().interop.call_member(interpreter, &args[0], &args[1], rest)
    });
    i.define_native("$typeof", Arity::Exact(1), |interpreter, args| {
        interpreter.host().interop.type_of(interpreter, &args[0])
    });
    i.define_native("$isa", Arity::Exact(2), |interpreter, args| {
        interpreter.host().interop.instance_of(interpreter, &args[0], &args[1])
    });
}

/// The `$db` hash-map handed to preloaded libraries
pub(crate) fn data_store_bindings(data: Rc<dyn DataStore>) -> Value {
    let mut map = Map::new();
    let mut bind = |name: &'static str, callable: Callable| {
        map.insert(Key::from(Value::string(name)), Value::Callable(callable));
    };
    let store = data.clone();
    bind(
        "find",
        NativeFn::new("find", Arity::Between(1, 2), move |_, args| {
            let projection = args.get(1).cloned().unwrap_or_default();
            Ok(Value::sequence(store.find(&args[0], &projection)?))
        })
        .into(),
    );
    let store = data.clone();
    bind(
        "insert",
        NativeFn::new("insert", Arity::Exact(1), move |_, mut args| store.insert(args.remove(0))).into(),
    );
    let store = data.clone();
    bind(
        "update",
        NativeFn::new("update", Arity::Exact(2), move |_, args| store.update(&args[0], &args[1])).into(),
    );
    let store = data.clone();
    bind(
        "upsert",
        NativeFn::new("upsert", Arity::Exact(2), move |_, args| store.upsert(&args[0], &args[1])).into(),
    );
    bind(
        "remove",
        NativeFn::new("remove", Arity::Exact(1), move |_, args| data.remove(&args[0])).into(),
    );
    Value::map(map)
}
