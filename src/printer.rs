//! Renders values back to text. Readable output of strings, numbers, symbols,
//! booleans and nil reads back to an equal value.
use lasso::Rodeo;

use crate::{runtime::Callable, stack::ensure_sufficient_stack, value::Value};

pub fn print(value: &Value, readable: bool, rodeo: &Rodeo) -> String {
    let mut out = String::new();
    Printer { rodeo, readable }.write(value, &mut out);
    out
}

pub fn format_number(number: f64) -> String {
    if number.is_nan() {
        "NaN".to_string()
    } else if number.is_infinite() {
        let sign = if number > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if number != 0.0 && !(1e-6..1e21).contains(&number.abs()) {
        // exponent form outside the range plain digits stay readable in
        let text = format!("{number:e}");
        if text.contains("e-") {
            text
        } else {
            text.replacen('e', "e+", 1)
        }
    } else {
        number.to_string()
    }
}

pub fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

struct Printer<'a> {
    rodeo: &'a Rodeo,
    readable: bool,
}

impl Printer<'_> {
    fn write(&self, value: &Value, out: &mut String) {
        ensure_sufficient_stack(|| self.write_shallow(value, out))
    }

    fn write_shallow(&self, value: &Value, out: &mut String) {
        match value {
            Value::Nil => out.push_str("nil"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) => out.push_str(&format_number(*n)),
            Value::String(s) if self.readable => out.push_str(&escape_string(s)),
            Value::String(s) => out.push_str(s),
            Value::Symbol(symbol) => out.push_str(self.rodeo.resolve(symbol)),
            Value::List(list) => self.write_all("(", list.items().iter(), ")", out),
            Value::Set(set) => self.write_all("#{", set.iter().map(|key| key.value()), "}", out),
            Value::HashMap(map) => {
                out.push('{');
                for (index, (key, value)) in map.iter().enumerate() {
                    if index > 0 {
                        out.push(' ');
                    }
                    self.write(key.value(), out);
                    out.push(' ');
                    self.write(value, out);
                }
                out.push('}');
            }
            Value::Regex(regex) => {
                out.push('r');
                out.push_str(regex.flags());
                out.push('"');
                out.push_str(regex.pattern());
                out.push('"');
            }
            // atoms may hold themselves
            Value::Atom(_) => out.push_str("#<atom>"),
            Value::Callable(Callable::Native(native)) => match native.name() {
                Some(name) => {
                    out.push_str("#<native ");
                    out.push_str(name);
                    out.push('>');
                }
                None => out.push_str("#<native>"),
            },
            Value::Callable(Callable::Closure(_)) => out.push_str("#<fn>"),
            Value::Macro(_) => out.push_str("#<macro>"),
            Value::Recur(_) => out.push_str("#<recur>"),
        }
    }

    fn write_all<'v>(
        &self,
        open: &str,
        items: impl Iterator<Item = &'v Value>,
        close: &str,
        out: &mut String,
    ) {
        out.push_str(open);
        for (index, item) in items.enumerate() {
            if index > 0 {
                out.push(' ');
            }
            self.write(item, out);
        }
        out.push_str(close);
    }
}

#[cfg(test)]
mod tests {
    use super::{format_number, print};
    use crate::{
        reader::read_all,
        value::{Key, Map, Value},
    };
    use arbtest::arbtest;
    use assert2::{check, let_assert};
    use lasso::Rodeo;

    fn reprint(source: &str, readable: bool) -> String {
        let mut rodeo = Rodeo::default();
        let_assert!(Ok(forms) = read_all(source, &mut rodeo));
        forms
            .iter()
            .map(|form| print(form, readable, &rodeo))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn numbers() {
        check!(format_number(3.0) == "3");
        check!(format_number(-0.5) == "-0.5");
        check!(format_number(0.1 + 0.2) == "0.30000000000000004");
        check!(format_number(f64::NAN) == "NaN");
        check!(format_number(f64::NEG_INFINITY) == "-Infinity");
        check!(format_number(1e21) == "1e+21");
        check!(format_number(-1e300) == "-1e+300");
        check!(format_number(1.5e-7) == "1.5e-7");
        check!(format_number(123456789012345680000.0) == "123456789012345680000");
        check!(format_number(0.000001) == "0.000001");
        check!(reprint("1e21 2E-7 -1e+300", true) == "1e+21 2e-7 -1e+300");
    }

    #[test]
    fn deep_values() {
        let rodeo = Rodeo::default();
        let depth = 200_000;
        let nested = (0..depth).fold(Value::Nil, |inner, _| Value::invocation(vec![inner]));
        let text = print(&nested, true, &rodeo);
        check!(text.len() == 2 * depth + 3);
        check!(text.starts_with("((("));
        check!(text.ends_with("(nil)))"));
    }

    #[test]
    fn strings() {
        check!(reprint(r#""a\"b\nc""#, true) == r#""a\"b\nc""#);
        check!(reprint(r#""a\"b""#, false) == r#"a"b"#);
    }

    #[test]
    fn collections() {
        check!(reprint("(a [1 2] ())", true) == "(a (1 2) ())");
        check!(reprint("'x nil true", true) == "(quote x) nil true");
        check!(reprint(r#"ri"a+""#, true) == r#"ri"a+""#);

        let mut map = Map::new();
        map.insert(Key::from(Value::string("k")), Value::Number(1.0));
        map.insert(Key::from(Value::Nil), Value::string("v"));
        check!(print(&Value::map(map), true, &Rodeo::default()) == r#"{"k" 1 nil "v"}"#);
    }

    fn round_trip(value: &Value) -> Value {
        let mut rodeo = Rodeo::default();
        let printed = print(value, true, &rodeo);
        let_assert!(Ok(forms) = read_all(&printed, &mut rodeo), "`{printed}` does not read");
        let_assert!([form] = forms.as_slice());
        form.clone()
    }

    #[test]
    fn numbers_round_trip() {
        arbtest(|u| {
            let number: f64 = u.arbitrary()?;
            if number.is_finite() {
                check!(round_trip(&Value::Number(number)) == Value::Number(number));
            }
            Ok(())
        });
    }

    #[test]
    fn strings_round_trip() {
        arbtest(|u| {
            let text: String = u.arbitrary()?;
            check!(round_trip(&Value::string(&text)) == Value::string(&text), "{text:?}");
            Ok(())
        });
    }

    #[test]
    fn constants_round_trip() {
        for value in [Value::Nil, Value::Bool(true), Value::Bool(false)] {
            check!(round_trip(&value) == value);
        }
    }
}
