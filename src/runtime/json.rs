//! `write-json` and `read-json`: JSON text to and from values.
//!
//! Hash-maps become objects, lists and sets become arrays. Numbers that are
//! not finite are written as `null`, and integral ones without a fraction.
use serde_json::{Map as Object, Number, Value as Json};

use crate::value::{Key, Value};

use super::{Arity, Error, Interpreter};

/// Deepest nesting written, the same bound `serde_json` applies when reading
const MAX_NESTING: usize = 128;
/// Integral numbers up to here are written without a fraction
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub(crate) fn register(i: &Interpreter) {
    i.define_native("write-json", Arity::Between(1, 2), |interpreter, args| {
        let json = to_json(interpreter, &args[0], 0)?;
        let pretty = args.get(1).is_some_and(Value::is_truthy);
        let text = if pretty {
            serde_json::to_string_pretty(&json)
        } else {
            serde_json::to_string(&json)
        };
        text.map(Value::string)
            .map_err(|error| Error::argument("write-json", error.to_string()))
    });
    i.define_native("read-json", Arity::Exact(1), |_, args| {
        let Value::String(text) = &args[0] else {
            return Err(Error::type_mismatch("read-json", "a string", &args[0]));
        };
        let json: Json =
            serde_json::from_str(text).map_err(|error| Error::argument("read-json", error.to_string()))?;
        Ok(from_json(json))
    });
}

pub(crate) fn to_json(interpreter: &Interpreter, value: &Value, depth: usize) -> Result<Json, Error> {
    if depth > MAX_NESTING {
        return Err(Error::argument("write-json", "value is nested too deeply"));
    }
    let nested = |value: &Value| to_json(interpreter, value, depth + 1);
    match value {
        Value::Nil => Ok(Json::Null),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Number(n) => Ok(number(*n)),
        Value::String(s) => Ok(Json::String(s.to_string())),
        Value::Symbol(symbol) => Ok(Json::String(interpreter.resolve(*symbol))),
        Value::List(list) => list.items().iter().map(nested).collect::<Result<_, _>>().map(Json::Array),
        Value::Set(set) => set
            .iter()
            .map(|key| nested(key.value()))
            .collect::<Result<_, _>>()
            .map(Json::Array),
        Value::HashMap(map) => {
            let mut object = Object::new();
            for (key, value) in map.iter() {
                let name = match key.value() {
                    Value::String(name) => name.to_string(),
                    other => interpreter.print(other, false),
                };
                object.insert(name, nested(value)?);
            }
            Ok(Json::Object(object))
        }
        other => Err(Error::type_mismatch("write-json", "nil, a boolean, number, string or collection", other)),
    }
}

fn number(n: f64) -> Json {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Json::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Json::Null, Json::Number)
    }
}

pub(crate) fn from_json(json: Json) -> Value {
    match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        Json::String(s) => Value::string(s),
        Json::Array(items) => Value::sequence(items.into_iter().map(from_json).collect::<Vec<_>>()),
        Json::Object(object) => Value::map(
            object
                .into_iter()
                .map(|(name, value)| (Key::from(Value::string(name)), from_json(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use crate::{Error, Interpreter, Value};

    fn eval(source: &str) -> Result<Value, Error> {
        let interpreter = Interpreter::with_defaults().unwrap();
        interpreter.eval_str(source)
    }

    #[test]
    fn writes_collections() {
        let_assert!(Ok(value) = eval(r#"(write-json {"a" [1 2.5 nil true] "b" {"c" 'd} 3 (hash-set "x")})"#));
        check!(value == Value::string(r#"{"a":[1,2.5,null,true],"b":{"c":"d"},"3":["x"]}"#));

        let_assert!(Ok(value) = eval("(write-json [(/ 1 0) -0 1e300])"));
        check!(value == Value::string("[null,0,1e300]"));
    }

    #[test]
    fn pretty_output_is_indented() {
        let_assert!(Ok(value) = eval(r#"(write-json {"a" [1]} true)"#));
        check!(value == Value::string("{\n  \"a\": [\n    1\n  ]\n}"));
    }

    #[test]
    fn reads_objects_in_order() {
        let interpreter = Interpreter::with_defaults().unwrap();
        let_assert!(Ok(value) = interpreter.eval_str(r#"(read-json "{\"z\": [1, {\"y\": null}], \"a\": false}")"#));
        check!(interpreter.print(&value, true) == r#"{"z" (1 {"y" nil}) "a" false}"#);
    }

    #[test]
    fn rejects_what_json_cannot_hold() {
        let_assert!(Err(Error::Type { .. }) = eval("(write-json (atom 1))"));
        let_assert!(Err(Error::Type { .. }) = eval("(write-json [inc])"));
        let_assert!(Err(Error::Argument { name, .. }) = eval(r#"(read-json "{\"a\": ")"#));
        check!(&*name == "read-json");

        let_assert!(
            Err(Error::Argument { reason, .. }) =
                eval("(write-json (loop [i 0 acc nil] (if (< i 500) (recur (inc i) [acc]) acc)))")
        );
        check!(&*reason == "value is nested too deeply");
    }
}
